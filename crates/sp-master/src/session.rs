//! One engine plus the sequencer that drives it.

use log::{debug, warn};
use sp_audio::RecordingSink;
use sp_engine::{Engine, Frame};

use crate::{PlayerError, Sequencer, SequencerStatus};

/// Boxed recording destination owned by a session.
pub type BoxedSink = Box<dyn RecordingSink + Send>;

/// Tick and render clock domains for one song.
///
/// Each [`Session::render_next`] first runs the sequencer ticks that are due,
/// then renders exactly one engine buffer. Tick debt carries fractional ticks
/// across buffers so the tick rate stays exact when the buffer size does not
/// divide the output rate.
pub struct Session {
    engine: Engine,
    sequencer: Box<dyn Sequencer>,
    ticks_per_buffer: f32,
    tick_debt: f32,
    ticks: u64,
    sequence_done: bool,
    recorder: Option<BoxedSink>,
}

impl Session {
    pub fn new(engine: Engine, sequencer: impl Sequencer + 'static) -> Self {
        let ticks_per_buffer = ticks_per_buffer(&engine);
        Self {
            engine,
            sequencer: Box::new(sequencer),
            ticks_per_buffer,
            // The first buffer runs tick 0
            tick_debt: 1.0,
            ticks: 0,
            sequence_done: false,
            recorder: None,
        }
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut Engine {
        &mut self.engine
    }

    /// Sequencer ticks run so far.
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Frames written by each [`Session::render_next`].
    pub fn samples_per_buffer(&self) -> usize {
        self.engine.samples_per_buffer()
    }

    /// The sequence ended and every channel has died, or a fade-out ran to
    /// silence.
    pub fn is_finished(&self) -> bool {
        (self.sequence_done && self.engine.active_channels() == 0) || self.engine.is_faded_out()
    }

    /// Follow a new output rate.
    pub fn set_sample_rate(&mut self, sample_rate: u32) {
        self.engine.set_sample_rate(sample_rate);
        self.ticks_per_buffer = ticks_per_buffer(&self.engine);
    }

    /// Run due ticks, render one buffer into `out` and pass it to the
    /// recorder. Returns the frames written.
    pub fn render_next(&mut self, out: &mut [Frame]) -> usize {
        while self.tick_debt >= 1.0 {
            self.tick_debt -= 1.0;
            self.tick();
        }
        self.tick_debt += self.ticks_per_buffer;

        let frames = self.engine.render_frames(out);
        if let Some(recorder) = self.recorder.as_mut() {
            if let Err(e) = recorder.write(&out[..frames]) {
                warn!("recording stopped: {e}");
                self.recorder = None;
            }
        }
        frames
    }

    fn tick(&mut self) {
        if !self.sequence_done
            && self.sequencer.tick(&mut self.engine) == SequencerStatus::Finished
        {
            debug!("sequence finished at tick {}", self.ticks);
            self.sequence_done = true;
        }
        self.engine.tick();
        self.ticks += 1;
    }

    /// Back to tick 0: channels stopped, tracks and fade restored, and the
    /// sequencer rewound.
    pub fn rewind(&mut self) {
        debug!("rewind at tick {}", self.ticks);
        self.engine.reset();
        self.sequencer.rewind();
        self.tick_debt = 1.0;
        self.ticks = 0;
        self.sequence_done = false;
    }

    /// Silence every channel now.
    pub fn stop(&mut self) {
        self.engine.stop_all();
    }

    pub fn is_recording(&self) -> bool {
        self.recorder.is_some()
    }

    /// Start recording, finishing any recording already in progress.
    pub fn start_recording(&mut self, sink: BoxedSink) -> Result<(), PlayerError> {
        self.stop_recording()?;
        debug!("recording started at tick {}", self.ticks);
        self.recorder = Some(sink);
        Ok(())
    }

    /// Finish the current recording and return how many frames it holds.
    /// Without an active recording this is a no-op returning `None`.
    pub fn stop_recording(&mut self) -> Result<Option<u64>, PlayerError> {
        let Some(mut recorder) = self.recorder.take() else {
            return Ok(None);
        };
        recorder.finish()?;
        Ok(Some(recorder.frames_written()))
    }
}

fn ticks_per_buffer(engine: &Engine) -> f32 {
    let config = engine.config();
    config.ticks_per_second * engine.samples_per_buffer() as f32 / config.sample_rate as f32
}
