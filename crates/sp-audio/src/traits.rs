//! Sink traits and error types.

use sp_engine::Frame;
use thiserror::Error;

/// Error type for audio operations.
#[derive(Debug, Error)]
pub enum AudioError {
    /// Failed to initialize audio device
    #[error("device init error: {0}")]
    DeviceInit(String),
    /// Failed to create audio stream
    #[error("stream create error: {0}")]
    StreamCreate(String),
    /// Playback error
    #[error("playback error: {0}")]
    Playback(String),
    /// No audio device available
    #[error("no audio device available")]
    NoDevice,
    /// Recording file could not be written
    #[error("recording error: {0}")]
    Recording(#[from] hound::Error),
    /// Write after the recording was finished
    #[error("recording already finished")]
    RecordingClosed,
}

/// Trait for live audio output backends.
pub trait AudioOutput {
    /// Get the sample rate.
    fn sample_rate(&self) -> u32;

    /// Write frames to the output, blocking until all are queued.
    fn write(&mut self, frames: &[Frame]) -> Result<(), AudioError>;

    /// Start playback.
    fn start(&mut self) -> Result<(), AudioError>;

    /// Stop playback.
    fn stop(&mut self) -> Result<(), AudioError>;
}

/// Append-only destination for rendered frames.
pub trait RecordingSink {
    fn write(&mut self, frames: &[Frame]) -> Result<(), AudioError>;

    /// Flush and close. Finishing twice is a no-op.
    fn finish(&mut self) -> Result<(), AudioError>;

    fn frames_written(&self) -> u64;
}

/// In-memory recording, mostly for tests and offline rendering.
impl RecordingSink for Vec<Frame> {
    fn write(&mut self, frames: &[Frame]) -> Result<(), AudioError> {
        self.extend_from_slice(frames);
        Ok(())
    }

    fn finish(&mut self) -> Result<(), AudioError> {
        Ok(())
    }

    fn frames_written(&self) -> u64 {
        self.len() as u64
    }
}
