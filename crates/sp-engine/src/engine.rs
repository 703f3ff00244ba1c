//! Engine: one playback session.
//!
//! Owns the sample bank, tracks, channel pool and mixer for one loaded song.
//! The sequencer drives it with [`Engine::note_on`] / [`Engine::release`] and
//! one [`Engine::tick`] per sequencer tick; the audio side calls
//! [`Engine::render`] once per buffer.

use alloc::vec::Vec;
use log::{debug, trace};
use slotmap::SlotMap;
use sp_ir::{AudioBuffer, Instrument, NoteInfo, Sample, SampleKey, VoiceKind, STEREO};

use crate::channel::{Channel, RenderContext, TrackId};
use crate::config::EngineConfig;
use crate::envelope::EnvelopeState;
use crate::frame::Frame;
use crate::mixer::Mixer;
use crate::track::Track;
use crate::voice_pool::{ChannelId, VoiceClass, VoicePool};
use crate::waveform::Waveforms;

/// The playback engine.
pub struct Engine {
    config: EngineConfig,
    bank: SlotMap<SampleKey, Sample>,
    waves: Waveforms,
    tracks: Vec<Track>,
    pool: VoicePool,
    mixer: Mixer,
}

impl Engine {
    /// Create a session. Every buffer and table is allocated here.
    pub fn new(config: EngineConfig) -> Self {
        let tracks = (0..config.track_count()).map(Track::new).collect();
        let pool = VoicePool::new(&config);
        let mixer = Mixer::new(&config);
        debug!(
            "engine {:?}: {} Hz, {} frames/buffer, {} tracks, {} channels",
            config.kind,
            config.sample_rate,
            mixer.frames(),
            config.track_count(),
            pool.len()
        );
        Self {
            bank: SlotMap::with_key(),
            waves: Waveforms::new(),
            tracks,
            pool,
            mixer,
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Switch the output rate. Sounding channels keep their pitch; the buffer
    /// size is recomputed so one render still spans one tick.
    pub fn set_sample_rate(&mut self, sample_rate: u32) {
        if sample_rate == self.config.sample_rate {
            return;
        }
        self.config = self.config.clone().with_sample_rate(sample_rate);
        self.mixer.resize(&self.config);
        debug!(
            "engine resampled to {} Hz, {} frames/buffer",
            self.config.sample_rate,
            self.mixer.frames()
        );
    }

    /// Frames produced by every render call.
    pub fn samples_per_buffer(&self) -> usize {
        self.mixer.frames()
    }

    pub fn add_sample(&mut self, sample: Sample) -> SampleKey {
        self.bank.insert(sample)
    }

    pub fn sample(&self, key: SampleKey) -> Option<&Sample> {
        self.bank.get(key)
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn track(&self, track: TrackId) -> Option<&Track> {
        self.tracks.get(track)
    }

    pub fn track_mut(&mut self, track: TrackId) -> Option<&mut Track> {
        self.tracks.get_mut(track)
    }

    pub fn pool(&self) -> &VoicePool {
        &self.pool
    }

    pub fn channel(&self, id: ChannelId) -> Option<&Channel> {
        self.pool.get(id)
    }

    /// Channels that are still producing sound.
    pub fn active_channels(&self) -> usize {
        self.pool.active_count()
    }

    /// Start a note. Returns `None` when the note was dropped because no
    /// channel could be allocated.
    pub fn note_on(
        &mut self,
        track: TrackId,
        note: NoteInfo,
        instrument: &Instrument,
    ) -> Option<ChannelId> {
        if track >= self.tracks.len() {
            return None;
        }
        let class = VoiceClass::of(&instrument.kind);
        let Some(id) = self.pool.allocate(&self.tracks, track, class) else {
            trace!("track {track}: no {class:?} channel for note {}, dropped", note.note);
            return None;
        };
        let previous = self.pool.get(id).filter(|c| !c.is_free()).and_then(Channel::owner);
        if let Some(previous) = previous {
            trace!("track {track}: channel {id} taken from track {previous}");
        }

        let sample = match instrument.kind {
            VoiceKind::Pcm { sample, .. } => self.bank.get(sample),
            _ => None,
        };
        self.tracks[track].lfo.retrigger();
        self.pool.start(&mut self.tracks, id, track, note, instrument, sample);
        self.debug_check();
        Some(id)
    }

    /// Release every sounding note of `track` played with `key`.
    pub fn release(&mut self, track: TrackId, key: u8) {
        let Some(channels) = self.tracks.get(track).map(|t| t.channel_ids()) else {
            return;
        };
        for id in channels {
            if let Some(channel) = self.pool.get_mut(id) {
                if channel.note().key == key && channel.state() < EnvelopeState::Releasing {
                    channel.release();
                }
            }
        }
    }

    /// Release every note of `track`.
    pub fn release_track(&mut self, track: TrackId) {
        let Some(channels) = self.tracks.get(track).map(|t| t.channel_ids()) else {
            return;
        };
        for id in channels {
            self.pool.release(id);
        }
    }

    /// Silence every note of `track` immediately.
    pub fn stop_track(&mut self, track: TrackId) {
        let Some(channels) = self.tracks.get(track).map(|t| t.channel_ids()) else {
            return;
        };
        for id in channels {
            self.pool.stop(&mut self.tracks, id);
        }
        self.debug_check();
    }

    /// Silence every channel immediately.
    pub fn stop_all(&mut self) {
        self.pool.stop_all(&mut self.tracks);
        self.debug_check();
    }

    /// Stop everything and restore track and fade state for a new pass.
    pub fn reset(&mut self) {
        self.stop_all();
        for track in &mut self.tracks {
            track.reset();
        }
        self.mixer.reset_fade();
    }

    /// One sequencer tick: advance LFOs and note durations, then push the
    /// track's volume, pan and pitch into its channels.
    pub fn tick(&mut self) {
        for track in &mut self.tracks {
            track.tick();
            let mix = track.mix();
            for &id in track.channels() {
                let Some(channel) = self.pool.get_mut(id) else {
                    continue;
                };
                if channel.count_down() {
                    channel.release();
                }
                channel.set_volume(mix.volume, mix.pan);
                channel.set_pitch(mix.pitch);
            }
        }
    }

    /// Render one buffer into the master mix and return it.
    pub fn render_buffer(&mut self) -> &AudioBuffer {
        let ctx = RenderContext {
            kind: self.config.kind,
            sample_rate: self.config.sample_rate,
            mixer_rate: self.config.mixer_rate,
            interpolation: self.config.interpolation,
            pcm_volume: self.config.pcm_volume,
            psg_volume: self.config.psg_volume,
            bank: &self.bank,
            waves: &self.waves,
        };
        #[cfg(feature = "alloc_check")]
        {
            let mixer = &mut self.mixer;
            let pool = &mut self.pool;
            let tracks = &mut self.tracks;
            assert_no_alloc::assert_no_alloc(|| {
                mixer.render(pool, tracks, &ctx);
            });
        }
        #[cfg(not(feature = "alloc_check"))]
        self.mixer.render(&mut self.pool, &mut self.tracks, &ctx);

        debug_assert!(self.pool.check_links(&self.tracks));
        self.mixer.master()
    }

    /// Render one buffer as interleaved stereo floats. Writes
    /// `min(out.len() / 2, samples_per_buffer)` frames and returns that count.
    /// Anything in `out` past those frames is zeroed.
    pub fn render(&mut self, out: &mut [f32]) -> usize {
        let master = self.render_buffer().as_slice();
        let len = master.len().min(out.len() - out.len() % STEREO);
        out[..len].copy_from_slice(&master[..len]);
        out[len..].fill(0.0);
        len / STEREO
    }

    /// Render one buffer as 16-bit frames; returns the frame count written.
    /// Frames of `out` past that count are set to silence.
    pub fn render_frames(&mut self, out: &mut [Frame]) -> usize {
        let master = self.render_buffer();
        let frames = master.frames().min(out.len());
        for (i, frame) in out[..frames].iter_mut().enumerate() {
            let (left, right) = master.frame(i);
            *frame = Frame::from_f32(left, right);
        }
        out[frames..].fill(Frame::silence());
        frames
    }

    pub fn set_mute(&mut self, track: TrackId, muted: bool) {
        self.mixer.set_mute(track, muted);
    }

    pub fn is_muted(&self, track: TrackId) -> bool {
        self.mixer.is_muted(track)
    }

    pub fn begin_fade_in(&mut self, ms: u32) {
        self.mixer.begin_fade_in(ms);
    }

    pub fn begin_fade_out(&mut self, ms: u32) {
        self.mixer.begin_fade_out(ms);
    }

    pub fn reset_fade(&mut self) {
        self.mixer.reset_fade();
    }

    pub fn is_fade_done(&self) -> bool {
        self.mixer.is_fade_done()
    }

    /// A fade-out has run to silence.
    pub fn is_faded_out(&self) -> bool {
        self.mixer.fade().is_silenced()
    }

    fn debug_check(&self) {
        debug_assert!(self.pool.check_links(&self.tracks), "channel/track links out of sync");
        debug_assert_eq!(self.pool.active_count() + self.pool.free_count(), self.pool.len());
    }
}
