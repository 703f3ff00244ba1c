//! Audio output and recording sinks for sapphire.

mod cpal_backend;
mod traits;
mod wav_recorder;

pub use cpal_backend::CpalOutput;
pub use traits::{AudioError, AudioOutput, RecordingSink};
pub use wav_recorder::{frames_to_wav, WavRecorder};
