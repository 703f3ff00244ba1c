//! Sample data types.

use alloc::vec::Vec;
use arrayvec::ArrayString;

slotmap::new_key_type! {
    /// Key for referencing samples in the engine's sample bank.
    pub struct SampleKey;
}

/// Frames decoded from one MP2K DPCM block.
pub const DPCM_BLOCK_FRAMES: usize = 0x40;
/// Bytes per MP2K DPCM block: one raw seed byte plus 32 delta bytes.
pub const DPCM_BLOCK_BYTES: usize = 0x21;

/// A sample definition as handed over by the header readers.
///
/// The engine trusts these values; validating them is the reader's job.
#[derive(Clone, Debug)]
pub struct Sample {
    /// Sample name
    pub name: ArrayString<26>,
    /// Audio data
    pub data: SampleData,
    /// Playback rate of the recording at its root key, in Hz
    pub sample_rate: u32,
    /// Loop start position (in frames)
    pub loop_start: u32,
    /// Whether playback wraps to `loop_start` at the end
    pub looped: bool,
}

impl Default for Sample {
    fn default() -> Self {
        Self {
            name: ArrayString::new(),
            data: SampleData::Pcm8(Vec::new()),
            sample_rate: 13379,
            loop_start: 0,
            looped: false,
        }
    }
}

impl Sample {
    /// Create a new empty sample.
    pub fn new(name: &str) -> Self {
        let mut sample = Self::default();
        let _ = sample.name.try_push_str(name);
        sample
    }

    /// One-shot signed 8-bit sample.
    pub fn pcm8(name: &str, data: Vec<i8>, sample_rate: u32) -> Self {
        let mut sample = Self::new(name);
        sample.data = SampleData::Pcm8(data);
        sample.sample_rate = sample_rate;
        sample
    }

    /// Enable looping from `loop_start` to the end of the data.
    pub fn looping(mut self, loop_start: u32) -> Self {
        self.looped = true;
        self.loop_start = loop_start;
        self
    }

    /// Get the length of the sample in frames.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns true if the sample has no data.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Returns true if playback wraps back to a valid loop start.
    pub fn has_loop(&self) -> bool {
        self.looped && (self.loop_start as usize) < self.len()
    }

    /// Golden Sun synth parameters, when this "sample" is a synth descriptor.
    pub fn synth(&self) -> Option<&SynthParams> {
        match &self.data {
            SampleData::Synth(params) => Some(params),
            _ => None,
        }
    }
}

/// Sample audio data.
#[derive(Clone, Debug)]
pub enum SampleData {
    /// Signed 8-bit PCM
    Pcm8(Vec<i8>),
    /// Signed 16-bit PCM
    Pcm16(Vec<i16>),
    /// MP2K delta-compressed 8-bit PCM (33-byte blocks of 64 frames)
    Dpcm { data: Vec<u8>, frames: u32 },
    /// IMA-ADPCM with the 4-byte NDS header at the front of `data`
    Adpcm { data: Vec<u8>, frames: u32 },
    /// Golden Sun synthesizer; produces its waveform procedurally
    Synth(SynthParams),
}

impl SampleData {
    /// Get the number of sample frames.
    pub fn len(&self) -> usize {
        match self {
            SampleData::Pcm8(v) => v.len(),
            SampleData::Pcm16(v) => v.len(),
            SampleData::Dpcm { frames, .. } | SampleData::Adpcm { frames, .. } => *frames as usize,
            SampleData::Synth(_) => 0,
        }
    }

    /// Returns true if empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Waveform produced by the Golden Sun synthesizer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SynthWave {
    /// Pulse with a sweeping duty cycle
    #[default]
    Square,
    /// Filtered sawtooth
    Saw,
    /// Triangle
    Triangle,
}

/// Parameters of the Golden Sun synthesizer header.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SynthParams {
    pub wave: SynthWave,
    pub initial_cycle: u8,
    pub cycle_speed: u8,
    pub cycle_amplitude: u8,
    pub minimum_cycle: u8,
}
