//! Channel: one polyphonic voice.
//!
//! A channel owns its sample cursor, envelope and mix state. The waveform
//! class is matched once per [`Channel::process`] call and the per-frame work
//! runs in a monomorphized inner loop.

use sp_ir::{
    DutyCycle, Instrument, NoiseWidth, NoteInfo, Sample, SampleData, SampleKey, VoiceKind, STEREO,
};
use slotmap::SlotMap;

use crate::config::{EngineKind, Interpolation};
use crate::envelope::{Envelope, EnvelopeState, SUSTAIN_TABLE};
use crate::frequency::{
    cgb_noise_frequency, frequency_to_increment, nds_noise_frequency, pcm_frequency,
    square_frequency, wave_frequency,
};
use crate::waveform::{square_table, wave_table, AdpcmDecoder, DpcmDecoder, SynthState, Waveforms};

/// Index of a track in the session.
pub type TrackId = usize;

/// Result of processing one buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Playback {
    Sounding,
    /// The envelope died or a one-shot sample ran out; the channel should be
    /// returned to the pool.
    Finished,
}

/// Track parameters pushed into a channel at note-on and on every tick.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TrackMix {
    /// 0-127
    pub volume: u8,
    /// Track pan before the instrument offset
    pub pan: i32,
    /// Pitch offset in 1/64 semitones
    pub pitch: i32,
}

/// Read-only session state a channel needs while rendering.
pub struct RenderContext<'a> {
    pub kind: EngineKind,
    pub sample_rate: u32,
    pub mixer_rate: u32,
    pub interpolation: Interpolation,
    pub pcm_volume: f32,
    pub psg_volume: f32,
    pub bank: &'a SlotMap<SampleKey, Sample>,
    pub waves: &'a Waveforms,
}

/// Per-class decoding state of a sample source.
#[derive(Clone, Debug)]
enum Decoder {
    Direct,
    Dpcm(DpcmDecoder),
    Adpcm(AdpcmDecoder),
    Synth(SynthState),
}

#[derive(Clone, Debug)]
enum Source {
    Silent,
    Sample { key: SampleKey, fixed: bool, decoder: Decoder },
    Square { duty: DutyCycle },
    Wave { table: [f32; 32] },
    Noise { width: NoiseWidth },
}

/// Integer frame index plus a 16-bit fraction.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
struct Cursor {
    position: u32,
    frac: u32,
}

impl Cursor {
    #[inline]
    fn advance(&mut self, step: u32) {
        let total = self.frac as u64 + step as u64;
        self.position = self.position.saturating_add((total >> 16) as u32);
        self.frac = (total & 0xFFFF) as u32;
    }
}

/// A synthesis voice.
#[derive(Clone, Debug)]
pub struct Channel {
    owner: Option<TrackId>,
    kind: EngineKind,
    note: NoteInfo,
    envelope: Envelope,
    source: Source,
    psg: bool,
    root_key: u8,
    base_rate: u32,
    inst_pan: i32,
    volume: u8,
    pan: i32,
    /// 16.16 Hz
    frequency: u64,
    cursor: Cursor,
}

impl Default for Channel {
    fn default() -> Self {
        Self::new(EngineKind::Mp2k)
    }
}

impl Channel {
    /// A free, silent channel.
    pub fn new(kind: EngineKind) -> Self {
        Self {
            owner: None,
            kind,
            note: NoteInfo::default(),
            envelope: Envelope::default(),
            source: Source::Silent,
            psg: false,
            root_key: 60,
            base_rate: 0,
            inst_pan: 0,
            volume: 0,
            pan: 0,
            frequency: 0,
            cursor: Cursor::default(),
        }
    }

    /// Re-initialize in place for a new note. `sample` is the bank entry the
    /// instrument refers to, if it is a sample voice.
    pub fn init(
        &mut self,
        owner: TrackId,
        note: NoteInfo,
        instrument: &Instrument,
        sample: Option<&Sample>,
        mix: TrackMix,
    ) {
        self.owner = Some(owner);
        self.note = note;
        self.psg = instrument.kind.is_psg();
        self.root_key = instrument.root_key;
        self.inst_pan = instrument.pan_offset();
        self.cursor = Cursor::default();
        self.base_rate = sample.map_or(0, |s| s.sample_rate);
        self.source = match instrument.kind {
            VoiceKind::Pcm { sample: key, fixed } => match sample {
                Some(sample) => Source::Sample { key, fixed, decoder: decoder_for(sample) },
                None => Source::Silent,
            },
            VoiceKind::Square1 { duty, .. } | VoiceKind::Square2 { duty } => {
                Source::Square { duty }
            }
            VoiceKind::Wave { pattern } => Source::Wave { table: wave_table(&pattern) },
            VoiceKind::Noise { width } => Source::Noise { width },
        };
        self.volume = mix.volume.min(0x7F);
        self.pan = self.kind.clamp_pan(mix.pan + self.inst_pan);
        self.envelope = Envelope::for_voice(
            self.kind,
            self.psg,
            instrument.adsr,
            note.clamped_velocity(),
            self.volume,
        );
        self.set_pitch(mix.pitch);
    }

    pub fn owner(&self) -> Option<TrackId> {
        self.owner
    }

    pub fn note(&self) -> &NoteInfo {
        &self.note
    }

    pub fn state(&self) -> EnvelopeState {
        self.envelope.state()
    }

    pub fn envelope(&self) -> &Envelope {
        &self.envelope
    }

    /// Combined, clamped pan.
    pub fn pan(&self) -> i32 {
        self.pan
    }

    pub fn volume(&self) -> u8 {
        self.volume
    }

    /// Current playback rate in 16.16 Hz.
    pub fn frequency(&self) -> u64 {
        self.frequency
    }

    /// Frame index of the sample cursor.
    pub fn position(&self) -> u32 {
        self.cursor.position
    }

    /// Whether the channel is a PSG voice.
    pub fn is_psg(&self) -> bool {
        self.psg
    }

    /// Free for reuse: no owner, or nothing left to play.
    pub fn is_free(&self) -> bool {
        self.owner.is_none() || self.state() == EnvelopeState::Dead
    }

    /// Update track volume and pan. Ignored once the note is released.
    pub fn set_volume(&mut self, volume: u8, pan: i32) {
        if self.state() >= EnvelopeState::Releasing {
            return;
        }
        self.volume = volume.min(0x7F);
        self.pan = self.kind.clamp_pan(pan + self.inst_pan);
        let velocity = self.note.clamped_velocity();
        if let Envelope::Cgb(env) = &mut self.envelope {
            env.set_levels(velocity, self.volume);
        }
    }

    /// Recompute the playback rate for a pitch offset in 1/64 semitones.
    pub fn set_pitch(&mut self, pitch: i32) {
        let note = self.note.note;
        self.frequency = match &self.source {
            Source::Silent | Source::Sample { fixed: true, .. } => 0,
            Source::Sample { .. } => pcm_frequency(self.base_rate, note, self.root_key, pitch),
            Source::Square { .. } => square_frequency(note, pitch),
            Source::Wave { .. } => wave_frequency(note, pitch),
            Source::Noise { .. } => match self.kind {
                EngineKind::Sdat => nds_noise_frequency(note, pitch),
                EngineKind::Mp2k | EngineKind::AlphaDream => cgb_noise_frequency(note, pitch),
            },
        };
    }

    /// Count one tick off the note duration. Returns true when it just ran out.
    pub fn count_down(&mut self) -> bool {
        match self.note.duration {
            Some(0) | None => false,
            Some(ticks) => {
                self.note.duration = Some(ticks - 1);
                ticks == 1
            }
        }
    }

    pub fn release(&mut self) {
        self.envelope.release();
    }

    /// Silence immediately and drop the owner. Calling it again is a no-op.
    pub fn stop(&mut self) {
        self.envelope.kill();
        self.owner = None;
    }

    /// Step the envelope and add one buffer of audio into `out`
    /// (interleaved stereo).
    pub fn process(&mut self, out: &mut [f32], ctx: &RenderContext) -> Playback {
        if self.owner.is_none() {
            return Playback::Finished;
        }
        self.envelope.step();
        if self.envelope.is_dead() {
            return Playback::Finished;
        }

        let (left, right) = self.stereo_gain(ctx);
        let step = match self.source {
            Source::Sample { fixed: true, .. } => {
                frequency_to_increment((ctx.mixer_rate as u64) << 16, ctx.sample_rate)
            }
            _ => frequency_to_increment(self.frequency, ctx.sample_rate),
        };

        let cursor = &mut self.cursor;
        let finished = match &mut self.source {
            Source::Silent => true,
            Source::Sample { key, decoder, .. } => match ctx.bank.get(*key) {
                Some(sample) => {
                    play_sample(sample, decoder, cursor, step, ctx.interpolation, out, left, right)
                }
                None => true,
            },
            Source::Square { duty } => {
                play_periodic(square_table(*duty), cursor, step, out, left, right);
                false
            }
            Source::Wave { table } => {
                play_periodic(table, cursor, step, out, left, right);
                false
            }
            Source::Noise { width } => {
                play_periodic(ctx.waves.noise(*width), cursor, step, out, left, right);
                false
            }
        };

        if finished {
            self.envelope.kill();
            Playback::Finished
        } else {
            Playback::Sounding
        }
    }

    /// Left / right gain for the current envelope level.
    fn stereo_gain(&self, ctx: &RenderContext) -> (f32, f32) {
        let master = if self.psg { ctx.psg_volume } else { ctx.pcm_volume };
        let velocity = self.note.clamped_velocity() as i32;
        let volume = self.volume as i32;
        let pan = self.pan;
        match &self.envelope {
            Envelope::Decibel(env) => {
                let db = SUSTAIN_TABLE[velocity as usize] as i32
                    + SUSTAIN_TABLE[volume as usize] as i32
                    + (env.level() >> 7);
                let amp = libm::powf(10.0, db.max(-723) as f32 / 400.0) * master;
                let hw = (pan + 64) as f32;
                (amp * (127.0 - hw) / 127.0, amp * hw / 127.0)
            }
            Envelope::Cgb(env) => {
                let gain = env.level() as f32 / 32.0 * master;
                if pan < -21 {
                    (gain, 0.0)
                } else if pan > 20 {
                    (0.0, gain)
                } else {
                    (gain, gain)
                }
            }
            Envelope::Linear(env) if self.kind == EngineKind::Mp2k => {
                let left = velocity * volume * (64 - pan) / 0x2000;
                let right = velocity * volume * (pan + 64) / 0x2000;
                let level = env.level() as f32 / 65536.0 * master;
                (left as f32 * level, right as f32 * level)
            }
            Envelope::Linear(env) => {
                let vol = velocity * volume / 127;
                let left = (vol * (0x80 - pan)) >> 8;
                let right = (vol * (0x80 + pan)) >> 8;
                let level = env.level() as f32 / env.peak() as f32 * master / 127.0;
                (left as f32 * level, right as f32 * level)
            }
        }
    }
}

fn decoder_for(sample: &Sample) -> Decoder {
    match &sample.data {
        SampleData::Dpcm { .. } => Decoder::Dpcm(DpcmDecoder::default()),
        SampleData::Adpcm { data, .. } => {
            let mut decoder = AdpcmDecoder::default();
            decoder.reset(data);
            Decoder::Adpcm(decoder)
        }
        SampleData::Synth(_) => Decoder::Synth(SynthState::default()),
        SampleData::Pcm8(_) | SampleData::Pcm16(_) => Decoder::Direct,
    }
}

#[inline]
fn lerp(a: f32, b: f32, frac: u32) -> f32 {
    a + (b - a) * (frac as f32 / 65536.0)
}

/// Mix a sample source; returns true when a one-shot ran out.
#[allow(clippy::too_many_arguments)]
fn play_sample(
    sample: &Sample,
    decoder: &mut Decoder,
    cursor: &mut Cursor,
    step: u32,
    interpolation: Interpolation,
    out: &mut [f32],
    left: f32,
    right: f32,
) -> bool {
    let len = sample.len() as u32;
    let loop_start = sample.has_loop().then_some(sample.loop_start);
    let span = Span { len, loop_start };

    match (&sample.data, decoder) {
        (SampleData::Synth(params), Decoder::Synth(state)) => {
            state.render(params, step.wrapping_shl(16), out, left, right);
            false
        }
        _ if len == 0 => true,
        (SampleData::Pcm8(data), _) => {
            let at = |i: u32| data.get(i as usize).map_or(0.0, |&s| s as f32 / 128.0);
            match interpolation {
                Interpolation::Nearest => {
                    span.play(cursor, step, out, left, right, |pos, _| at(pos))
                }
                Interpolation::Linear => span.play(cursor, step, out, left, right, |pos, frac| {
                    lerp(at(pos), at(span.next(pos)), frac)
                }),
            }
        }
        (SampleData::Pcm16(data), _) => {
            let at = |i: u32| data.get(i as usize).map_or(0.0, |&s| s as f32 / 32768.0);
            match interpolation {
                Interpolation::Nearest => {
                    span.play(cursor, step, out, left, right, |pos, _| at(pos))
                }
                Interpolation::Linear => span.play(cursor, step, out, left, right, |pos, frac| {
                    lerp(at(pos), at(span.next(pos)), frac)
                }),
            }
        }
        (SampleData::Dpcm { data, .. }, Decoder::Dpcm(dpcm)) => {
            span.play(cursor, step, out, left, right, |pos, _| {
                dpcm.sample_at(data, pos as usize) as f32 / 128.0
            })
        }
        (SampleData::Adpcm { data, .. }, Decoder::Adpcm(adpcm)) => {
            let loop_at = loop_start.unwrap_or(u32::MAX);
            span.play(cursor, step, out, left, right, |pos, _| {
                adpcm.sample_at(data, pos, loop_at) as f32 / 32768.0
            })
        }
        _ => true,
    }
}

/// Length and loop of the sample being played.
#[derive(Clone, Copy)]
struct Span {
    len: u32,
    loop_start: Option<u32>,
}

impl Span {
    /// Frame following `pos`, wrapping into the loop. Past the end of a
    /// one-shot this is out of range and reads as silence.
    #[inline]
    fn next(&self, pos: u32) -> u32 {
        match self.loop_start {
            Some(start) if pos + 1 >= self.len => start,
            _ => pos + 1,
        }
    }

    /// Run `read` for every output frame; returns true if the cursor ran off
    /// the end of a one-shot. Frames after that point are left untouched.
    #[inline]
    fn play(
        &self,
        cursor: &mut Cursor,
        step: u32,
        out: &mut [f32],
        left: f32,
        right: f32,
        mut read: impl FnMut(u32, u32) -> f32,
    ) -> bool {
        for frame in out.chunks_exact_mut(STEREO) {
            let value = read(cursor.position, cursor.frac);
            frame[0] += value * left;
            frame[1] += value * right;
            cursor.advance(step);
            if cursor.position >= self.len {
                match self.loop_start {
                    Some(start) => {
                        let loop_len = self.len - start;
                        cursor.position = start + (cursor.position - self.len) % loop_len;
                    }
                    None => return true,
                }
            }
        }
        false
    }
}

/// Mix a looping table (square, wave RAM, noise).
fn play_periodic(
    table: &[f32],
    cursor: &mut Cursor,
    step: u32,
    out: &mut [f32],
    left: f32,
    right: f32,
) {
    let len = table.len() as u32;
    if len == 0 {
        return;
    }
    for frame in out.chunks_exact_mut(STEREO) {
        let value = table[(cursor.position % len) as usize];
        frame[0] += value * left;
        frame[1] += value * right;
        cursor.advance(step);
        cursor.position %= len;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sp_ir::Adsr;

    struct Fixture {
        bank: SlotMap<SampleKey, Sample>,
        waves: Waveforms,
    }

    impl Fixture {
        fn new() -> Self {
            Self { bank: SlotMap::with_key(), waves: Waveforms::new() }
        }

        fn ctx(&self, kind: EngineKind, interpolation: Interpolation) -> RenderContext<'_> {
            self.ctx_at(kind, interpolation, 13379)
        }

        fn ctx_at(
            &self,
            kind: EngineKind,
            interpolation: Interpolation,
            sample_rate: u32,
        ) -> RenderContext<'_> {
            RenderContext {
                kind,
                sample_rate,
                mixer_rate: 13379,
                interpolation,
                pcm_volume: 1.0,
                psg_volume: 1.0,
                bank: &self.bank,
                waves: &self.waves,
            }
        }
    }

    const FULL: TrackMix = TrackMix { volume: 127, pan: 0, pitch: 0 };

    fn pcm_instrument(key: SampleKey, fixed: bool) -> Instrument {
        Instrument::new("pcm", VoiceKind::Pcm { sample: key, fixed })
            .with_adsr(Adsr::new(0xFF, 0, 0xFF, 0))
    }

    fn start(kind: EngineKind, fx: &Fixture, instrument: &Instrument, mix: TrackMix) -> Channel {
        let mut ch = Channel::new(kind);
        let sample = match instrument.kind {
            VoiceKind::Pcm { sample, .. } => fx.bank.get(sample),
            _ => None,
        };
        ch.init(0, NoteInfo::new(60, 127), instrument, sample, mix);
        ch
    }

    #[test]
    fn one_shot_stops_early_and_leaves_tail_untouched() {
        let mut fx = Fixture::new();
        let key = fx.bank.insert(Sample::pcm8("one-shot", vec![64; 100], 13379));
        let mut ch = start(EngineKind::Mp2k, &fx, &pcm_instrument(key, false), FULL);
        assert_eq!(frequency_to_increment(ch.frequency(), 13379), 1 << 16);

        let mut out = vec![0.25f32; 150 * STEREO];
        let result = ch.process(&mut out, &fx.ctx(EngineKind::Mp2k, Interpolation::Nearest));

        assert_eq!(result, Playback::Finished);
        assert_eq!(ch.state(), EnvelopeState::Dead);
        assert!(out[..100 * STEREO].iter().all(|&s| s > 0.25));
        assert!(out[100 * STEREO..].iter().all(|&s| s == 0.25));
    }

    #[test]
    fn loop_wraps_to_loop_start() {
        let mut fx = Fixture::new();
        let key = fx.bank.insert(Sample::pcm8("loop", vec![16, 32, 48, 64], 13379).looping(2));
        let mut ch = start(EngineKind::Mp2k, &fx, &pcm_instrument(key, true), FULL);

        let mut out = vec![0.0f32; 8 * STEREO];
        let result = ch.process(&mut out, &fx.ctx(EngineKind::Mp2k, Interpolation::Nearest));
        assert_eq!(result, Playback::Sounding);

        let left: Vec<f32> = out.chunks(STEREO).map(|f| f[0]).collect();
        let unit = left[0] / 16.0;
        let expected = [16.0, 32.0, 48.0, 64.0, 48.0, 64.0, 48.0, 64.0];
        for (got, want) in left.iter().zip(expected) {
            assert!((got - want * unit).abs() < 1e-5, "{left:?}");
        }
        assert!(ch.position() >= 2 && ch.position() < 4);
    }

    #[test]
    fn linear_interpolation_blends_neighbours() {
        let mut fx = Fixture::new();
        let key = fx.bank.insert(Sample::pcm8("ramp", vec![0, 64, 0, 0], 13379).looping(0));
        let mut ch = start(EngineKind::Mp2k, &fx, &pcm_instrument(key, false), FULL);
        ch.set_pitch(-crate::frequency::PITCH_PER_OCTAVE);

        let mut out = vec![0.0f32; 2 * STEREO];
        ch.process(&mut out, &fx.ctx(EngineKind::Mp2k, Interpolation::Linear));
        // Half-speed playback: second frame sits halfway between 0 and 64.
        assert_eq!(out[0], 0.0);
        let mut full = vec![0.0f32; 2 * STEREO];
        let mut reference = start(EngineKind::Mp2k, &fx, &pcm_instrument(key, true), FULL);
        reference.process(&mut full, &fx.ctx(EngineKind::Mp2k, Interpolation::Nearest));
        assert!((out[2] - full[2] / 2.0).abs() < 1e-5);
    }

    #[test]
    fn fixed_sample_keeps_mixer_rate_at_higher_output_rate() {
        let mut fx = Fixture::new();
        let key = fx.bank.insert(Sample::pcm8("drum", vec![32; 4000], 8000));
        let mut ch = start(EngineKind::Mp2k, &fx, &pcm_instrument(key, true), FULL);

        let mut out = vec![0.0f32; 803 * STEREO];
        let ctx = fx.ctx_at(EngineKind::Mp2k, Interpolation::Nearest, 48000);
        assert_eq!(ch.process(&mut out, &ctx), Playback::Sounding);
        // 803 output frames at 48 kHz span about 224 frames at 13379 Hz
        assert!((222..=224).contains(&ch.position()), "position {}", ch.position());
    }

    #[test]
    fn stop_is_idempotent() {
        let mut fx = Fixture::new();
        let key = fx.bank.insert(Sample::pcm8("s", vec![1; 10], 13379));
        let mut ch = start(EngineKind::Mp2k, &fx, &pcm_instrument(key, false), FULL);
        ch.stop();
        ch.stop();
        assert_eq!(ch.state(), EnvelopeState::Dead);
        assert_eq!(ch.owner(), None);
        assert!(ch.is_free());
        let mut out = vec![0.0f32; 4];
        let ctx = fx.ctx(EngineKind::Mp2k, Interpolation::Nearest);
        assert_eq!(ch.process(&mut out, &ctx), Playback::Finished);
        assert!(out.iter().all(|&s| s == 0.0));
    }

    #[test]
    fn pan_is_clamped_per_engine() {
        let mut fx = Fixture::new();
        let key = fx.bank.insert(Sample::pcm8("s", vec![1; 10], 13379));
        let inst = pcm_instrument(key, false).with_pan(20);
        let mix = TrackMix { volume: 100, pan: 60, pitch: 0 };
        assert_eq!(start(EngineKind::Mp2k, &fx, &inst, mix).pan(), 63);
        assert_eq!(start(EngineKind::AlphaDream, &fx, &inst, mix).pan(), 80);
        assert_eq!(start(EngineKind::Sdat, &fx, &inst, mix).pan(), 63);
    }

    #[test]
    fn set_volume_ignored_after_release() {
        let mut fx = Fixture::new();
        let key = fx.bank.insert(Sample::pcm8("s", vec![1; 1000], 13379));
        let mut ch = start(EngineKind::Mp2k, &fx, &pcm_instrument(key, false), FULL);
        ch.set_volume(50, -10);
        assert_eq!((ch.volume(), ch.pan()), (50, -10));
        ch.release();
        ch.set_volume(90, 30);
        assert_eq!((ch.volume(), ch.pan()), (50, -10));
    }

    #[test]
    fn mp2k_psg_hard_pan_silences_one_side() {
        let fx = Fixture::new();
        let inst = Instrument::new("sq", VoiceKind::Square2 { duty: DutyCycle::Half })
            .with_adsr(Adsr::new(0, 0, 0xF, 0));
        let mix = TrackMix { volume: 127, pan: -40, pitch: 0 };
        let mut ch = start(EngineKind::Mp2k, &fx, &inst, mix);
        let mut out = vec![0.0f32; 64 * STEREO];
        ch.process(&mut out, &fx.ctx(EngineKind::Mp2k, Interpolation::Nearest));
        assert!(out.chunks(STEREO).all(|f| f[1] == 0.0));
        assert!(out.chunks(STEREO).any(|f| f[0] != 0.0));
        assert!(out.iter().all(|s| s.abs() <= 0.5));
    }

    #[test]
    fn sdat_full_level_is_unity_gain() {
        let fx = Fixture::new();
        let inst = Instrument::new("noise", VoiceKind::Noise { width: NoiseWidth::Long })
            .with_adsr(Adsr::new(0x7F, 0x7F, 0x7F, 0x7F));
        let mut ch = start(EngineKind::Sdat, &fx, &inst, FULL);
        let ctx = fx.ctx(EngineKind::Sdat, Interpolation::Nearest);
        let mut out = vec![0.0f32; 16 * STEREO];
        ch.process(&mut out, &ctx);
        let (left, right) = ch.stereo_gain(&ctx);
        assert!((left - 63.0 / 127.0).abs() < 1e-4);
        assert!((right - 64.0 / 127.0).abs() < 1e-4);
    }

    #[test]
    fn duration_counts_down_to_release() {
        let fx = Fixture::new();
        let inst = Instrument::new("sq", VoiceKind::Square1 { duty: DutyCycle::Eighth, sweep: 0 });
        let mut ch = start(EngineKind::AlphaDream, &fx, &inst, FULL);
        ch.note = NoteInfo::new(60, 127).with_duration(2);
        assert!(!ch.count_down());
        assert!(ch.count_down());
        assert!(!ch.count_down());
    }

    #[test]
    fn missing_sample_finishes_immediately() {
        let mut fx = Fixture::new();
        let key = fx.bank.insert(Sample::pcm8("gone", vec![1; 4], 13379));
        fx.bank.remove(key);
        let mut ch = start(EngineKind::Mp2k, &fx, &pcm_instrument(key, false), FULL);
        let mut out = vec![0.0f32; 8];
        let ctx = fx.ctx(EngineKind::Mp2k, Interpolation::Nearest);
        assert_eq!(ch.process(&mut out, &ctx), Playback::Finished);
    }
}
