//! Track: one instrument line and its LFO.

use heapless::Vec as FixedVec;

use crate::channel::{TrackId, TrackMix};
use crate::config::MAX_CHANNELS;
use crate::voice_pool::ChannelId;

/// What the LFO modulates.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LfoTarget {
    #[default]
    Pitch,
    Volume,
    Pan,
}

/// Triangle LFO advanced once per tick.
#[derive(Clone, Debug, Default)]
pub struct Lfo {
    pub speed: u8,
    pub depth: u8,
    /// Ticks to wait after a note-on before modulating
    pub delay: u8,
    pub target: LfoTarget,
    phase: u8,
    delay_count: u8,
}

impl Lfo {
    pub fn new(speed: u8, depth: u8, delay: u8, target: LfoTarget) -> Self {
        Self { speed, depth, delay, target, ..Self::default() }
    }

    pub fn tick(&mut self) {
        if self.depth == 0 || self.speed == 0 {
            return;
        }
        if self.delay_count < self.delay {
            self.delay_count += 1;
            return;
        }
        self.phase = self.phase.wrapping_add(self.speed);
    }

    /// Restart the delay and phase (new note on the track).
    pub fn retrigger(&mut self) {
        self.phase = 0;
        self.delay_count = 0;
    }

    /// Triangle value scaled by depth.
    fn amount(&self, target: LfoTarget) -> i32 {
        if self.target != target || self.depth == 0 {
            return 0;
        }
        let phase = self.phase as i32;
        let tri = if phase < 0x40 {
            phase
        } else if phase < 0xC0 {
            0x80 - phase
        } else {
            phase - 0x100
        };
        tri * self.depth as i32
    }
}

/// Track state seen by the voice core.
#[derive(Clone, Debug)]
pub struct Track {
    pub index: TrackId,
    /// Higher wins when channels run out
    pub priority: u8,
    /// 0-127
    pub volume: u8,
    /// -64 to 63 (AlphaDream: -128 to 127)
    pub pan: i8,
    /// -64 to 63
    pub bend: i8,
    /// Semitones at full bend
    pub bend_range: u8,
    /// 1/64 semitone offset
    pub tune: i8,
    pub lfo: Lfo,
    channels: FixedVec<ChannelId, MAX_CHANNELS>,
}

impl Track {
    pub fn new(index: TrackId) -> Self {
        Self {
            index,
            priority: 0,
            volume: 100,
            pan: 0,
            bend: 0,
            bend_range: 2,
            tune: 0,
            lfo: Lfo::default(),
            channels: FixedVec::new(),
        }
    }

    /// Restore song-start values. Channel links are left to the pool.
    pub fn reset(&mut self) {
        let channels = core::mem::take(&mut self.channels);
        *self = Self { channels, ..Self::new(self.index) };
    }

    /// Channels currently owned by this track.
    pub fn channels(&self) -> &[ChannelId] {
        &self.channels
    }

    /// Copy of the channel list, so the pool can be changed while walking it.
    pub(crate) fn channel_ids(&self) -> FixedVec<ChannelId, MAX_CHANNELS> {
        self.channels.clone()
    }

    pub(crate) fn attach(&mut self, id: ChannelId) {
        if !self.channels.contains(&id) {
            let pushed = self.channels.push(id);
            debug_assert!(
                pushed.is_ok(),
                "track {} owns more than {MAX_CHANNELS} channels",
                self.index
            );
        }
    }

    pub(crate) fn detach(&mut self, id: ChannelId) {
        if let Some(pos) = self.channels.iter().position(|&c| c == id) {
            self.channels.swap_remove(pos);
        }
    }

    pub fn tick(&mut self) {
        self.lfo.tick();
    }

    /// Volume after LFO, 0-127.
    pub fn volume(&self) -> u8 {
        let lfo = (self.lfo.amount(LfoTarget::Volume) * 3 * self.volume as i32) >> 19;
        (self.volume as i32 + lfo).clamp(0, 0x7F) as u8
    }

    /// Pan after LFO. Range clamping happens per engine in the channel.
    pub fn pan(&self) -> i32 {
        let lfo = (self.lfo.amount(LfoTarget::Pan) * 3) >> 12;
        self.pan as i32 + lfo
    }

    /// Pitch offset in 1/64 semitones.
    pub fn pitch(&self) -> i32 {
        let lfo = self.lfo.amount(LfoTarget::Pitch) >> 8;
        self.bend as i32 * self.bend_range as i32 + self.tune as i32 + lfo
    }

    pub fn mix(&self) -> TrackMix {
        TrackMix { volume: self.volume(), pan: self.pan(), pitch: self.pitch() }
    }
}
