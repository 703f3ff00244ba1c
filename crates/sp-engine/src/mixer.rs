//! Mixer: per-track buffers summed into the master with the fade applied.

use alloc::vec;
use alloc::vec::Vec;
use sp_ir::AudioBuffer;

use crate::channel::{Channel, RenderContext};
use crate::config::EngineConfig;
use crate::fade::{ms_to_buffers, Fade};
use crate::track::Track;
use crate::voice_pool::VoicePool;

pub struct Mixer {
    track_buffers: Vec<AudioBuffer>,
    master: AudioBuffer,
    mutes: Vec<bool>,
    fade: Fade,
    sample_rate: u32,
    frames: usize,
}

impl Mixer {
    pub fn new(config: &EngineConfig) -> Self {
        let frames = config.samples_per_buffer.max(1);
        let tracks = config.track_count();
        Self {
            track_buffers: (0..tracks).map(|_| AudioBuffer::new(frames)).collect(),
            master: AudioBuffer::new(frames),
            mutes: vec![false; tracks],
            fade: Fade::new(config.fade_curve),
            sample_rate: config.sample_rate,
            frames,
        }
    }

    /// Reallocate the buffers for a new rate and buffer size. Mutes and the
    /// fade state carry over.
    pub fn resize(&mut self, config: &EngineConfig) {
        let frames = config.samples_per_buffer.max(1);
        for buffer in &mut self.track_buffers {
            *buffer = AudioBuffer::new(frames);
        }
        self.master = AudioBuffer::new(frames);
        self.sample_rate = config.sample_rate;
        self.frames = frames;
    }

    /// Frames produced by every render call.
    pub fn frames(&self) -> usize {
        self.frames
    }

    /// Master buffer of the last render.
    pub fn master(&self) -> &AudioBuffer {
        &self.master
    }

    /// Step every owned channel once and mix one buffer.
    pub fn render(
        &mut self,
        pool: &mut VoicePool,
        tracks: &mut [Track],
        ctx: &RenderContext,
    ) -> &AudioBuffer {
        for buffer in &mut self.track_buffers {
            buffer.silence();
        }
        self.master.silence();

        for id in 0..pool.len() {
            let Some(owner) = pool.get(id).and_then(Channel::owner) else {
                continue;
            };
            if let Some(buffer) = self.track_buffers.get_mut(owner) {
                pool.process(tracks, id, buffer.as_mut_slice(), ctx);
            }
        }

        let (level, step) = self.fade.advance(self.frames);
        for (buffer, &muted) in self.track_buffers.iter().zip(&self.mutes) {
            if !muted {
                self.master.mix_from_ramped(buffer, level, step);
            }
        }
        &self.master
    }

    pub fn set_mute(&mut self, track: usize, muted: bool) {
        if let Some(flag) = self.mutes.get_mut(track) {
            *flag = muted;
        }
    }

    pub fn is_muted(&self, track: usize) -> bool {
        self.mutes.get(track).copied().unwrap_or(false)
    }

    pub fn begin_fade_in(&mut self, ms: u32) {
        self.fade.begin_in(ms_to_buffers(ms, self.sample_rate, self.frames));
    }

    pub fn begin_fade_out(&mut self, ms: u32) {
        self.fade.begin_out(ms_to_buffers(ms, self.sample_rate, self.frames));
    }

    pub fn reset_fade(&mut self) {
        self.fade.reset();
    }

    pub fn is_fade_done(&self) -> bool {
        self.fade.is_done()
    }

    pub fn fade(&self) -> &Fade {
        &self.fade
    }
}
