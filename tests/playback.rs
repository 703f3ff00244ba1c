//! Player integration tests: live playback through a capturing output,
//! offline rendering and sample headers feeding the engine.

use sp_audio::{AudioError, AudioOutput};
use sp_master::{
    load_mp2k_wave, load_swav, Adsr, Command, DutyCycle, Engine, EngineConfig, Frame, Instrument,
    NoteInfo, Player, PlayerError, Sample, ScriptedSequencer, VoiceKind,
};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Collects everything written; optionally slows each write down.
struct CaptureOutput {
    frames: Frames,
    sample_rate: u32,
    delay: Duration,
}

impl AudioOutput for CaptureOutput {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn write(&mut self, frames: &[Frame]) -> Result<(), AudioError> {
        self.frames.lock().unwrap().extend_from_slice(frames);
        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }
        Ok(())
    }

    fn start(&mut self) -> Result<(), AudioError> {
        Ok(())
    }

    fn stop(&mut self) -> Result<(), AudioError> {
        Ok(())
    }
}

type Frames = Arc<Mutex<Vec<Frame>>>;

fn capture(
    sample_rate: u32,
    delay: Duration,
) -> (Frames, impl FnOnce() -> Result<CaptureOutput, AudioError> + Send + 'static) {
    let frames = Arc::new(Mutex::new(Vec::new()));
    let shared = frames.clone();
    (frames, move || Ok(CaptureOutput { frames: shared, sample_rate, delay }))
}

fn wait_until(mut done: impl FnMut() -> bool) {
    let start = Instant::now();
    while !done() {
        assert!(start.elapsed() < Duration::from_secs(10), "timed out");
        std::thread::sleep(Duration::from_millis(2));
    }
}

fn square_song(length: u32) -> (Engine, ScriptedSequencer) {
    let engine = Engine::new(EngineConfig::mp2k());
    let square = Instrument::new("sq", VoiceKind::Square2 { duty: DutyCycle::Half })
        .with_adsr(Adsr::new(0, 0, 15, 0));
    let seq = ScriptedSequencer::new(vec![square]).note(0, 0, 0, 69, 127, length);
    (engine, seq)
}

fn pcm_song() -> (Engine, ScriptedSequencer) {
    let mut engine = Engine::new(EngineConfig::mp2k());
    let wave = (0..64).map(|i| if i < 32 { 100 } else { -100 }).collect();
    let key = engine.add_sample(Sample::pcm8("sq", wave, 13379).looping(0));
    let inst = Instrument::new("pcm", VoiceKind::Pcm { sample: key, fixed: false })
        .with_adsr(Adsr::new(0xFF, 0, 0xFF, 0));
    let seq = ScriptedSequencer::new(vec![inst]).note(0, 0, 0, 60, 127, 10_000);
    (engine, seq)
}

#[test]
fn live_playback_runs_to_the_end() {
    let (engine, seq) = square_song(5);
    let mut player = Player::new(engine, seq);
    let (frames, open) = capture(13379, Duration::ZERO);

    player.play_with(open).unwrap();
    wait_until(|| player.is_finished());
    player.stop().unwrap();

    let frames = frames.lock().unwrap();
    assert_eq!(frames.len() % 224, 0);
    assert!(frames.iter().any(|f| *f != Frame::silence()));
    // Drain tail after the song is silent
    assert_eq!(frames.last(), Some(&Frame::silence()));
    assert!(player.ticks() >= 5);
}

#[test]
fn playback_adopts_the_device_rate() {
    let (engine, seq) = pcm_song();
    let mut player = Player::new(engine, seq);
    let (frames, open) = capture(48000, Duration::from_millis(1));

    player.play_with(open).unwrap();
    assert_eq!(player.session().engine().config().sample_rate, 48000);
    assert_eq!(player.session().samples_per_buffer(), 803);
    wait_until(|| frames.lock().unwrap().len() >= 803 * 3);
    player.stop().unwrap();
    assert_eq!(frames.lock().unwrap().len() % 803, 0);
}

#[test]
fn stop_silences_immediately() {
    let (engine, seq) = pcm_song();
    let mut player = Player::new(engine, seq);
    let (frames, open) = capture(13379, Duration::from_millis(2));

    player.play_with(open).unwrap();
    wait_until(|| player.session().engine().active_channels() == 1);
    assert!(player.is_playing());

    player.stop().unwrap();
    assert!(!player.is_playing());
    assert_eq!(player.session().engine().active_channels(), 0);

    let written = frames.lock().unwrap().len();
    std::thread::sleep(Duration::from_millis(20));
    assert_eq!(frames.lock().unwrap().len(), written);
    // Stopping again is a no-op
    player.stop().unwrap();
}

#[test]
fn second_play_is_rejected_while_playing() {
    let (engine, seq) = pcm_song();
    let mut player = Player::new(engine, seq);
    let (_, open) = capture(13379, Duration::from_millis(2));
    player.play_with(open).unwrap();

    let (_, again) = capture(13379, Duration::ZERO);
    assert!(matches!(player.play_with(again), Err(PlayerError::AlreadyPlaying)));
    assert!(matches!(player.render_frames(10), Err(PlayerError::AlreadyPlaying)));
    player.stop().unwrap();
}

#[test]
fn device_failure_is_reported_by_play() {
    let (engine, seq) = square_song(5);
    let mut player = Player::new(engine, seq);
    let result = player.play_with(|| Err::<CaptureOutput, _>(AudioError::NoDevice));
    assert!(matches!(result, Err(PlayerError::Audio(AudioError::NoDevice))));
    assert!(!player.is_playing());
}

#[test]
fn offline_render_stops_when_song_ends() {
    let (engine, seq) = square_song(3);
    let mut player = Player::new(engine, seq);
    let frames = player.render_frames(13379 * 10).unwrap();
    assert!(!frames.is_empty());
    assert_eq!(frames.len() % 224, 0);
    assert!(frames.len() < 13379 * 10);
    assert!(player.session().is_finished());
}

#[test]
fn rewind_replays_the_same_song() {
    let (engine, seq) = square_song(6);
    let mut player = Player::new(engine, seq.at(2, Command::Pan { track: 0, pan: 40 }));
    let first = player.render_frames(13379 * 5).unwrap();
    assert!(player.session().is_finished());

    player.rewind();
    assert_eq!(player.ticks(), 0);
    assert_eq!(player.session().engine().track(0).map(|t| t.pan), Some(0));
    let second = player.render_frames(13379 * 5).unwrap();
    assert_eq!(first, second);
}

#[test]
fn offline_render_honours_frame_limit() {
    let (engine, seq) = pcm_song();
    let mut player = Player::new(engine, seq);
    let frames = player.render_frames(1000).unwrap();
    assert_eq!(frames.len(), 1000);
}

#[test]
fn fade_out_command_ends_the_song() {
    let (engine, seq) = pcm_song();
    let seq = seq.at(4, Command::FadeOut { ms: 100 });
    let mut player = Player::new(engine, seq);
    let frames = player.render_frames(13379 * 5).unwrap();
    assert!(frames.len() < 13379);
    assert!(player.session().engine().is_faded_out());
    let last = frames.last().copied().unwrap_or_default();
    assert!(last.left.unsigned_abs() < 256 && last.right.unsigned_abs() < 256);
}

#[test]
fn mp2k_wave_header_plays() {
    // Looped 8-bit wave: flags, pitch (rate * 1024), loop start, length
    let mut bytes = Vec::new();
    bytes.extend_from_slice(&0x4000_0000u32.to_le_bytes());
    bytes.extend_from_slice(&(13379u32 * 1024).to_le_bytes());
    bytes.extend_from_slice(&0u32.to_le_bytes());
    bytes.extend_from_slice(&64u32.to_le_bytes());
    bytes.extend((0..64).map(|i| if i < 32 { 0x60u8 } else { 0xA0 }));
    let sample = load_mp2k_wave("wave", &bytes, false).unwrap();
    assert!(sample.has_loop());

    let mut engine = Engine::new(EngineConfig::mp2k());
    let key = engine.add_sample(sample);
    let inst = Instrument::new("wave", VoiceKind::Pcm { sample: key, fixed: false });
    assert!(engine.note_on(0, NoteInfo::new(60, 127), &inst).is_some());
    let mut out = vec![Frame::silence(); 224];
    assert_eq!(engine.render_frames(&mut out), 224);
    assert!(out.iter().any(|f| f.left != 0));
}

#[test]
fn swav_plays_on_sdat_engine() {
    // Bare SWAV info: PCM8, looped, 16384 Hz, timer, loop offset 0, 16 words
    let mut bytes = vec![0u8, 1];
    bytes.extend_from_slice(&16384u16.to_le_bytes());
    bytes.extend_from_slice(&(16_756_991u32 / 16384).to_le_bytes()[..2]);
    bytes.extend_from_slice(&0u16.to_le_bytes());
    bytes.extend_from_slice(&16u32.to_le_bytes());
    bytes.extend((0..64).map(|i| if i % 16 < 8 { 0x50u8 } else { 0xB0 }));
    let sample = load_swav("swav", &bytes).unwrap();

    let mut engine = Engine::new(EngineConfig::sdat());
    let key = engine.add_sample(sample);
    let inst = Instrument::new("swav", VoiceKind::Pcm { sample: key, fixed: false });
    assert!(engine.note_on(0, NoteInfo::new(60, 127), &inst).is_some());
    let mut out = vec![Frame::silence(); engine.samples_per_buffer()];
    engine.render_frames(&mut out);
    assert!(out.iter().any(|f| f.left != 0));
}
