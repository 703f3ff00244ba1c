//! Headless player for the sapphire sound engines.
//!
//! Owns one engine session behind a mutex and drives it either on a
//! playback thread feeding an [`AudioOutput`], or offline on the caller's
//! thread. The CLI and the integration tests share this API.

mod script;
mod session;

use log::{debug, warn};
use parking_lot::{Mutex, MutexGuard};
use sp_audio::{AudioError, AudioOutput, CpalOutput, RecordingSink, WavRecorder};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::thread::JoinHandle;
use thiserror::Error;

// Re-export common types so callers don't need the lower crates directly.
pub use sp_audio::frames_to_wav;
pub use sp_engine::{Engine, EngineConfig, EngineKind, Frame, Interpolation, Lfo, LfoTarget};
pub use sp_formats::{load_mp2k_wave, load_swav, FormatError};
pub use sp_ir::{Adsr, DutyCycle, Instrument, NoiseWidth, NoteInfo, Sample, SampleKey, VoiceKind};

pub use script::{Command, ScriptedSequencer};
pub use session::{BoxedSink, Session};

/// Result of one sequencer tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SequencerStatus {
    Playing,
    /// No more events; the session ends once every channel has died.
    Finished,
}

/// Drives the engine once per tick with note and track commands.
pub trait Sequencer: Send {
    fn tick(&mut self, engine: &mut Engine) -> SequencerStatus;

    /// Go back to the first tick. The default keeps playing from where it is.
    fn rewind(&mut self) {}
}

#[derive(Debug, Error)]
pub enum PlayerError {
    #[error(transparent)]
    Audio(#[from] AudioError),
    #[error("already playing")]
    AlreadyPlaying,
    #[error("playback thread panicked")]
    ThreadPanicked,
}

/// Headless controller: owns a session and manages playback.
pub struct Player {
    session: Arc<Mutex<Session>>,
    playback: Option<PlaybackHandle>,
}

struct PlaybackHandle {
    stop_signal: Arc<AtomicBool>,
    finished: Arc<AtomicBool>,
    thread: Option<JoinHandle<Result<(), AudioError>>>,
}

impl Player {
    pub fn new(engine: Engine, sequencer: impl Sequencer + 'static) -> Self {
        Self {
            session: Arc::new(Mutex::new(Session::new(engine, sequencer))),
            playback: None,
        }
    }

    /// Lock the session. Rendering waits while the guard is held.
    pub fn session(&self) -> MutexGuard<'_, Session> {
        self.session.lock()
    }

    // --- Real-time playback ---

    /// Play through the default cpal device.
    pub fn play(&mut self) -> Result<(), PlayerError> {
        self.play_with(CpalOutput::new)
    }

    /// Play through an output opened on the playback thread. Returns once
    /// the output has started, or with the error that prevented it.
    pub fn play_with<O, F>(&mut self, open: F) -> Result<(), PlayerError>
    where
        O: AudioOutput,
        F: FnOnce() -> Result<O, AudioError> + Send + 'static,
    {
        if self.is_playing() {
            return Err(PlayerError::AlreadyPlaying);
        }
        self.stop()?;

        let stop_signal = Arc::new(AtomicBool::new(false));
        let finished = Arc::new(AtomicBool::new(false));
        let (started_tx, started_rx) = mpsc::sync_channel(1);

        let session = self.session.clone();
        let stop = stop_signal.clone();
        let done = finished.clone();
        let thread = std::thread::spawn(move || {
            let result = audio_thread(session, open, stop, started_tx);
            done.store(true, Ordering::Relaxed);
            result
        });

        match started_rx.recv() {
            Ok(Ok(sample_rate)) => debug!("playback started at {sample_rate} Hz"),
            Ok(Err(e)) => {
                let _ = thread.join();
                return Err(e.into());
            }
            Err(_) => {
                // Thread ended without reporting; surface its result
                return match thread.join() {
                    Ok(result) => result.map_err(Into::into),
                    Err(_) => Err(PlayerError::ThreadPanicked),
                };
            }
        }

        self.playback = Some(PlaybackHandle {
            stop_signal,
            finished,
            thread: Some(thread),
        });
        Ok(())
    }

    /// Stop playback. Every channel is silenced before the thread is joined,
    /// so nothing more is rendered after this returns.
    pub fn stop(&mut self) -> Result<(), PlayerError> {
        let Some(mut pb) = self.playback.take() else {
            return Ok(());
        };
        pb.stop_signal.store(true, Ordering::Relaxed);
        self.session.lock().stop();
        match pb.thread.take().map(JoinHandle::join) {
            Some(Ok(result)) => result.map_err(Into::into),
            Some(Err(_)) => Err(PlayerError::ThreadPanicked),
            None => Ok(()),
        }
    }

    pub fn is_playing(&self) -> bool {
        self.playback
            .as_ref()
            .is_some_and(|p| !p.finished.load(Ordering::Relaxed))
    }

    /// Playback ran to the end of the song on its own.
    pub fn is_finished(&self) -> bool {
        self.playback
            .as_ref()
            .is_some_and(|p| p.finished.load(Ordering::Relaxed))
    }

    /// Sequencer ticks run so far.
    pub fn ticks(&self) -> u64 {
        self.session.lock().ticks()
    }

    /// Restart the song from its first tick. Works while playing.
    pub fn rewind(&self) {
        self.session.lock().rewind();
    }

    /// Fade the whole mix out; playback finishes once it is silent.
    pub fn fade_out(&self, ms: u32) {
        self.session.lock().engine_mut().begin_fade_out(ms);
    }

    // --- Recording ---

    /// Record every rendered frame from now on.
    pub fn start_recording(
        &self,
        sink: impl RecordingSink + Send + 'static,
    ) -> Result<(), PlayerError> {
        self.session.lock().start_recording(Box::new(sink))
    }

    /// Record to a WAV file at the engine's current rate.
    pub fn record_to_wav(&self, path: impl AsRef<Path>) -> Result<(), PlayerError> {
        let mut session = self.session.lock();
        let recorder = WavRecorder::create(path, session.engine().config().sample_rate)?;
        session.start_recording(Box::new(recorder))
    }

    /// Finish the recording; returns the frame count, or `None` if nothing
    /// was being recorded.
    pub fn stop_recording(&self) -> Result<Option<u64>, PlayerError> {
        self.session.lock().stop_recording()
    }

    // --- Offline rendering ---

    /// Render on the calling thread until the session finishes or
    /// `max_frames` have been produced.
    pub fn render_frames(&mut self, max_frames: usize) -> Result<Vec<Frame>, PlayerError> {
        if self.is_playing() {
            return Err(PlayerError::AlreadyPlaying);
        }
        let mut session = self.session.lock();
        let mut buffer = vec![Frame::silence(); session.samples_per_buffer()];
        let mut frames = Vec::with_capacity(max_frames);
        while !session.is_finished() && frames.len() < max_frames {
            let n = session.render_next(&mut buffer);
            let take = n.min(max_frames - frames.len());
            frames.extend_from_slice(&buffer[..take]);
        }
        Ok(frames)
    }

    /// Render offline into a WAV file. Returns the frames written.
    pub fn render_to_wav(
        &mut self,
        path: impl AsRef<Path>,
        max_seconds: u32,
    ) -> Result<u64, PlayerError> {
        let sample_rate = self.session.lock().engine().config().sample_rate;
        let frames = self.render_frames((sample_rate * max_seconds) as usize)?;
        let mut recorder = WavRecorder::create(path, sample_rate)?;
        recorder.write(&frames)?;
        recorder.finish()?;
        Ok(recorder.frames_written())
    }
}

impl Drop for Player {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            warn!("stopping playback: {e}");
        }
        if let Err(e) = self.session.lock().stop_recording() {
            warn!("finishing recording: {e}");
        }
    }
}

fn audio_thread<O, F>(
    session: Arc<Mutex<Session>>,
    open: F,
    stop_signal: Arc<AtomicBool>,
    started: mpsc::SyncSender<Result<u32, AudioError>>,
) -> Result<(), AudioError>
where
    O: AudioOutput,
    F: FnOnce() -> Result<O, AudioError>,
{
    let opened = open().and_then(|mut output| output.start().map(|()| output));
    let mut output = match opened {
        Ok(output) => output,
        Err(e) => {
            // Reported to `play_with` instead of the join result
            let _ = started.send(Err(e));
            return Ok(());
        }
    };

    let sample_rate = output.sample_rate();
    let spb = {
        let mut session = session.lock();
        session.set_sample_rate(sample_rate);
        session.samples_per_buffer()
    };
    let _ = started.send(Ok(sample_rate));

    let mut buffer = vec![Frame::silence(); spb];
    while !stop_signal.load(Ordering::Relaxed) {
        let frames = {
            let mut session = session.lock();
            if session.is_finished() || stop_signal.load(Ordering::Relaxed) {
                break;
            }
            session.render_next(&mut buffer)
        };
        output.write(&buffer[..frames])?;
    }

    if !stop_signal.load(Ordering::Relaxed) {
        // Let the device drain before the stream is paused
        buffer.fill(Frame::silence());
        for _ in 0..(sample_rate as usize / 10).div_ceil(spb) {
            output.write(&buffer)?;
        }
    }
    output.stop()
}
