//! WAV recording sink.

use std::fs::File;
use std::io::{BufWriter, Cursor, Seek, Write};
use std::path::Path;

use hound::{SampleFormat, WavSpec, WavWriter};
use log::debug;
use sp_engine::Frame;

use crate::traits::{AudioError, RecordingSink};

fn wav_spec(sample_rate: u32) -> WavSpec {
    WavSpec {
        channels: 2,
        sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    }
}

/// 16-bit stereo WAV writer.
pub struct WavRecorder<W: Write + Seek> {
    writer: Option<WavWriter<W>>,
    frames: u64,
}

impl WavRecorder<BufWriter<File>> {
    /// Create (or truncate) a WAV file at `path`.
    pub fn create(path: impl AsRef<Path>, sample_rate: u32) -> Result<Self, AudioError> {
        debug!("recording to {} at {sample_rate} Hz", path.as_ref().display());
        let writer = WavWriter::create(path, wav_spec(sample_rate))?;
        Ok(Self { writer: Some(writer), frames: 0 })
    }
}

impl<W: Write + Seek> WavRecorder<W> {
    pub fn new(inner: W, sample_rate: u32) -> Result<Self, AudioError> {
        let writer = WavWriter::new(inner, wav_spec(sample_rate))?;
        Ok(Self { writer: Some(writer), frames: 0 })
    }

    pub fn is_finished(&self) -> bool {
        self.writer.is_none()
    }
}

impl<W: Write + Seek> RecordingSink for WavRecorder<W> {
    fn write(&mut self, frames: &[Frame]) -> Result<(), AudioError> {
        let writer = self.writer.as_mut().ok_or(AudioError::RecordingClosed)?;
        let mut samples = writer.get_i16_writer(frames.len() as u32 * 2);
        for frame in frames {
            samples.write_sample(frame.left);
            samples.write_sample(frame.right);
        }
        samples.flush()?;
        self.frames += frames.len() as u64;
        Ok(())
    }

    fn finish(&mut self) -> Result<(), AudioError> {
        if let Some(writer) = self.writer.take() {
            writer.finalize()?;
            debug!("recording finished: {} frames", self.frames);
        }
        Ok(())
    }

    fn frames_written(&self) -> u64 {
        self.frames
    }
}

impl<W: Write + Seek> Drop for WavRecorder<W> {
    fn drop(&mut self) {
        if let Err(e) = self.finish() {
            log::warn!("failed to finalize recording: {e}");
        }
    }
}

/// Encode frames as a complete in-memory WAV file.
pub fn frames_to_wav(frames: &[Frame], sample_rate: u32) -> Result<Vec<u8>, AudioError> {
    let mut cursor = Cursor::new(Vec::new());
    {
        let mut recorder = WavRecorder::new(&mut cursor, sample_rate)?;
        recorder.write(frames)?;
        recorder.finish()?;
    }
    Ok(cursor.into_inner())
}
