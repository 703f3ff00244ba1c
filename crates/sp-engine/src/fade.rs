//! Master fade-in / fade-out.

use crate::config::FadeCurve;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FadeDirection {
    In,
    Out,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum FadeState {
    Idle,
    Fading { direction: FadeDirection, buffers_remaining: u32, buffers_total: u32 },
    /// A completed fade-out; holds silence until reset.
    Silenced,
}

/// Fade position and curve. `position` runs 0.0 (silent) to 1.0 (full).
#[derive(Clone, Debug)]
pub struct Fade {
    state: FadeState,
    curve: FadeCurve,
    position: f32,
}

impl Fade {
    pub fn new(curve: FadeCurve) -> Self {
        Self { state: FadeState::Idle, curve, position: 1.0 }
    }

    /// Start fading out over `buffers` render calls.
    pub fn begin_out(&mut self, buffers: u32) {
        if buffers == 0 {
            self.position = 0.0;
            self.state = FadeState::Silenced;
            return;
        }
        self.state = FadeState::Fading {
            direction: FadeDirection::Out,
            buffers_remaining: buffers,
            buffers_total: buffers,
        };
    }

    /// Start fading in from silence over `buffers` render calls.
    pub fn begin_in(&mut self, buffers: u32) {
        self.position = 0.0;
        if buffers == 0 {
            self.reset();
            return;
        }
        self.state = FadeState::Fading {
            direction: FadeDirection::In,
            buffers_remaining: buffers,
            buffers_total: buffers,
        };
    }

    pub fn reset(&mut self) {
        self.state = FadeState::Idle;
        self.position = 1.0;
    }

    /// No fade in progress.
    pub fn is_done(&self) -> bool {
        !matches!(self.state, FadeState::Fading { .. })
    }

    /// A fade-out has completed.
    pub fn is_silenced(&self) -> bool {
        self.state == FadeState::Silenced
    }

    pub fn direction(&self) -> Option<FadeDirection> {
        match self.state {
            FadeState::Fading { direction, .. } => Some(direction),
            _ => None,
        }
    }

    fn gain(&self) -> f32 {
        match self.curve {
            FadeCurve::Linear => self.position,
            FadeCurve::Power => libm::powf(self.position, 10.0 / 6.0),
        }
    }

    /// Advance one render call of `frames` frames. Returns the gain at the
    /// first frame and the per-frame step towards the gain at the end.
    pub fn advance(&mut self, frames: usize) -> (f32, f32) {
        let FadeState::Fading { direction, buffers_remaining, buffers_total } = self.state else {
            return (self.gain(), 0.0);
        };

        let start = self.gain();
        let delta = 1.0 / buffers_total as f32;
        let remaining = buffers_remaining - 1;
        self.position = match direction {
            FadeDirection::In => (self.position + delta).min(1.0),
            FadeDirection::Out => (self.position - delta).max(0.0),
        };
        if remaining == 0 {
            match direction {
                FadeDirection::In => self.reset(),
                FadeDirection::Out => {
                    self.position = 0.0;
                    self.state = FadeState::Silenced;
                }
            }
        } else {
            self.state =
                FadeState::Fading { direction, buffers_remaining: remaining, buffers_total };
        }
        let end = self.gain();
        (start, (end - start) / frames.max(1) as f32)
    }
}

/// Render calls needed to span `ms` milliseconds.
pub fn ms_to_buffers(ms: u32, sample_rate: u32, samples_per_buffer: usize) -> u32 {
    let frames = ms as u64 * sample_rate as u64 / 1000;
    let spb = samples_per_buffer.max(1) as u64;
    frames.div_ceil(spb) as u32
}
