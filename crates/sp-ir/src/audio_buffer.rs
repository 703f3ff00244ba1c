//! Interleaved stereo f32 mix buffer.

use alloc::vec;
use alloc::vec::Vec;

/// Samples per frame of every mix buffer.
pub const STEREO: usize = 2;

/// An interleaved stereo f32 buffer.
///
/// `data[frame * 2]` is the left sample of `frame`, `data[frame * 2 + 1]`
/// the right one. Buffers are allocated once and reused for every render.
#[derive(Clone, Debug)]
pub struct AudioBuffer {
    data: Vec<f32>,
    frames: usize,
}

impl AudioBuffer {
    /// Create a new silent buffer of `frames` stereo frames.
    pub fn new(frames: usize) -> Self {
        Self {
            data: vec![0.0; frames * STEREO],
            frames,
        }
    }

    /// Fill all samples with zero.
    pub fn silence(&mut self) {
        self.data.fill(0.0);
    }

    /// Number of frames.
    pub fn frames(&self) -> usize {
        self.frames
    }

    /// Interleaved samples.
    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    /// Mutable interleaved samples.
    pub fn as_mut_slice(&mut self) -> &mut [f32] {
        &mut self.data
    }

    /// (left, right) of one frame.
    pub fn frame(&self, frame: usize) -> (f32, f32) {
        (self.data[frame * STEREO], self.data[frame * STEREO + 1])
    }

    /// Sum overlapping frames from `source` into this buffer with a gain
    /// that starts at `level` and moves by `step` after every frame.
    pub fn mix_from_ramped(&mut self, source: &AudioBuffer, level: f32, step: f32) {
        let frames = self.frames.min(source.frames);
        let mut gain = level;
        for frame in 0..frames {
            let i = frame * STEREO;
            self.data[i] += source.data[i] * gain;
            self.data[i + 1] += source.data[i + 1] * gain;
            gain += step;
        }
    }
}
