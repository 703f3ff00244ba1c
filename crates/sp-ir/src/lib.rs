//! Core data types for the sapphire handheld sound engines.
//!
//! This crate defines the values that flow between the sample-header
//! readers, the sequencer and the playback engine: ADSR parameters, note
//! descriptions, instruments, samples and the interleaved mix buffer.
//!
//! Designed to be `no_std` compatible with the `alloc` crate.

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

mod adsr;
mod audio_buffer;
mod instrument;
mod note;
mod sample;

pub use adsr::Adsr;
pub use audio_buffer::{AudioBuffer, STEREO};
pub use instrument::{DutyCycle, Instrument, NoiseWidth, VoiceKind};
pub use note::NoteInfo;
pub use sample::{
    Sample, SampleData, SampleKey, SynthParams, SynthWave, DPCM_BLOCK_BYTES, DPCM_BLOCK_FRAMES,
};
