//! Timed command list used as a sequencer by the demo and tests.

use sp_engine::{Engine, Lfo, TrackId};
use sp_ir::{Instrument, NoteInfo};

use crate::{Sequencer, SequencerStatus};

/// One scripted action.
#[derive(Clone, Debug)]
pub enum Command {
    /// Start a note with an instrument from the script's table.
    NoteOn { track: TrackId, instrument: usize, note: NoteInfo },
    /// Release the channel playing `key` on the track.
    NoteOff { track: TrackId, key: u8 },
    /// Release every channel on the track.
    ReleaseTrack(TrackId),
    Volume { track: TrackId, volume: u8 },
    Pan { track: TrackId, pan: i8 },
    Bend { track: TrackId, bend: i8 },
    Priority { track: TrackId, priority: u8 },
    Lfo { track: TrackId, lfo: Lfo },
    FadeOut { ms: u32 },
}

#[derive(Clone, Debug)]
struct Event {
    tick: u32,
    command: Command,
}

/// Plays a fixed list of commands at given ticks.
#[derive(Clone, Debug, Default)]
pub struct ScriptedSequencer {
    instruments: Vec<Instrument>,
    events: Vec<Event>,
    cursor: usize,
    tick: u32,
}

impl ScriptedSequencer {
    pub fn new(instruments: Vec<Instrument>) -> Self {
        Self { instruments, ..Self::default() }
    }

    /// Add a command at `tick`. Commands at the same tick run in the order
    /// they were added.
    pub fn at(mut self, tick: u32, command: Command) -> Self {
        self.push(tick, command);
        self
    }

    pub fn push(&mut self, tick: u32, command: Command) {
        let pos = self.events.partition_point(|e| e.tick <= tick);
        self.events.insert(pos, Event { tick, command });
    }

    /// Note on `tick`, released `length` ticks later.
    pub fn note(
        self,
        tick: u32,
        track: TrackId,
        instrument: usize,
        note: u8,
        velocity: u8,
        length: u32,
    ) -> Self {
        let note = NoteInfo::new(note, velocity).with_duration(length);
        self.at(tick, Command::NoteOn { track, instrument, note })
    }

    /// Tick of the last command.
    pub fn last_tick(&self) -> u32 {
        self.events.last().map_or(0, |e| e.tick)
    }

    pub fn instruments(&self) -> &[Instrument] {
        &self.instruments
    }

    fn apply(&self, command: &Command, engine: &mut Engine) {
        match command {
            Command::NoteOn { track, instrument, note } => {
                if let Some(inst) = self.instruments.get(*instrument) {
                    engine.note_on(*track, *note, inst);
                }
            }
            Command::NoteOff { track, key } => engine.release(*track, *key),
            Command::ReleaseTrack(track) => engine.release_track(*track),
            Command::FadeOut { ms } => engine.begin_fade_out(*ms),
            Command::Volume { track, volume } => {
                if let Some(t) = engine.track_mut(*track) {
                    t.volume = (*volume).min(127);
                }
            }
            Command::Pan { track, pan } => {
                if let Some(t) = engine.track_mut(*track) {
                    t.pan = *pan;
                }
            }
            Command::Bend { track, bend } => {
                if let Some(t) = engine.track_mut(*track) {
                    t.bend = *bend;
                }
            }
            Command::Priority { track, priority } => {
                if let Some(t) = engine.track_mut(*track) {
                    t.priority = *priority;
                }
            }
            Command::Lfo { track, lfo } => {
                if let Some(t) = engine.track_mut(*track) {
                    t.lfo = lfo.clone();
                }
            }
        }
    }
}

impl Sequencer for ScriptedSequencer {
    fn tick(&mut self, engine: &mut Engine) -> SequencerStatus {
        while let Some(event) = self.events.get(self.cursor) {
            if event.tick > self.tick {
                break;
            }
            self.apply(&event.command, engine);
            self.cursor += 1;
        }
        self.tick += 1;
        if self.cursor >= self.events.len() {
            SequencerStatus::Finished
        } else {
            SequencerStatus::Playing
        }
    }

    fn rewind(&mut self) {
        self.cursor = 0;
        self.tick = 0;
    }
}
