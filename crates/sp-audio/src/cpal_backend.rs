//! CPAL-based audio output backend.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, Stream, StreamConfig};
use log::{debug, warn};
use ringbuf::traits::{Consumer, Producer, Split};
use ringbuf::{HeapCons, HeapProd, HeapRb};
use sp_engine::Frame;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::traits::{AudioError, AudioOutput};

/// CPAL-based audio output on the default device.
///
/// The engine renders at the device rate; `sample_rate()` reports it so the
/// session can be configured to match.
pub struct CpalOutput {
    device: Device,
    config: StreamConfig,
    stream: Option<Stream>,
    producer: HeapProd<Frame>,
    consumer: Option<HeapCons<Frame>>,
    running: Arc<AtomicBool>,
}

impl CpalOutput {
    /// Open the default output device.
    pub fn new() -> Result<Self, AudioError> {
        let host = cpal::default_host();
        let device = host.default_output_device().ok_or(AudioError::NoDevice)?;

        let config = device
            .default_output_config()
            .map_err(|e| AudioError::DeviceInit(e.to_string()))?;

        let mut config: StreamConfig = config.into();
        // The callback assumes 2-channel interleaving
        config.channels = 2;
        debug!(
            "audio device {:?} at {} Hz",
            device.name().unwrap_or_default(),
            config.sample_rate.0
        );

        // About 100ms of buffered audio
        let buffer_size = (config.sample_rate.0 as usize / 10) * 2;
        let (producer, consumer) = HeapRb::<Frame>::new(buffer_size).split();

        Ok(Self {
            device,
            config,
            stream: None,
            producer,
            consumer: Some(consumer),
            running: Arc::new(AtomicBool::new(false)),
        })
    }

    fn build_stream(&mut self, mut consumer: HeapCons<Frame>) -> Result<Stream, AudioError> {
        let running = self.running.clone();
        let channels = self.config.channels as usize;

        self.device
            .build_output_stream(
                &self.config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    if !running.load(Ordering::Relaxed) {
                        data.fill(0.0);
                        return;
                    }

                    for chunk in data.chunks_mut(channels) {
                        let (left, right) = consumer.try_pop().unwrap_or_default().to_f32();
                        for (i, sample) in chunk.iter_mut().enumerate() {
                            *sample = match i {
                                0 => left,
                                1 => right,
                                _ => 0.0,
                            };
                        }
                    }
                },
                |err| warn!("audio stream error: {err}"),
                None,
            )
            .map_err(|e| AudioError::StreamCreate(e.to_string()))
    }
}

impl AudioOutput for CpalOutput {
    fn sample_rate(&self) -> u32 {
        self.config.sample_rate.0
    }

    fn write(&mut self, frames: &[Frame]) -> Result<(), AudioError> {
        if self.stream.is_none() {
            return Err(AudioError::Playback("stream not started".into()));
        }
        let mut written = 0;
        while written < frames.len() {
            written += self.producer.push_slice(&frames[written..]);
            if written < frames.len() {
                std::thread::yield_now();
            }
        }
        Ok(())
    }

    fn start(&mut self) -> Result<(), AudioError> {
        if self.stream.is_none() {
            let consumer = self
                .consumer
                .take()
                .ok_or_else(|| AudioError::StreamCreate("consumer already taken".into()))?;
            self.stream = Some(self.build_stream(consumer)?);
        }
        self.running.store(true, Ordering::Relaxed);
        if let Some(ref stream) = self.stream {
            stream.play().map_err(|e| AudioError::Playback(e.to_string()))?;
        }
        Ok(())
    }

    fn stop(&mut self) -> Result<(), AudioError> {
        self.running.store(false, Ordering::Relaxed);
        if let Some(ref stream) = self.stream {
            stream.pause().map_err(|e| AudioError::Playback(e.to_string()))?;
        }
        Ok(())
    }
}
