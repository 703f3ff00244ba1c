//! ADSR envelope state machines.
//!
//! Three integer envelopes cover the supported drivers:
//!
//! - [`LinearEnvelope`]: MP2K / AlphaDream PCM (8-bit) and AlphaDream PSG
//!   (4-bit). Multiplicative decay and release, additive attack.
//! - [`CgbEnvelope`]: MP2K PSG. One level unit per `rate` steps, with state
//!   changes deferred through a pending state.
//! - [`DecibelEnvelope`]: NDS. Level is a 7-bit-shifted centibel value that
//!   rises from the floor towards 0 and falls back to it.
//!
//! Every envelope is stepped once per render buffer.

use sp_ir::Adsr;

use crate::config::EngineKind;

/// Envelope phase. The ordering follows the lifetime of a note, so
/// `state >= Releasing` means "already let go".
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EnvelopeState {
    Initializing,
    Rising,
    Decaying,
    Playing,
    Releasing,
    Dying,
    #[default]
    Dead,
}

/// MP2K / AlphaDream linear envelope.
#[derive(Clone, Debug)]
pub struct LinearEnvelope {
    state: EnvelopeState,
    level: u32,
    peak: u32,
    shift: u32,
    attack: u32,
    decay: u32,
    sustain: u32,
    release: u32,
}

impl LinearEnvelope {
    /// 8-bit PCM envelope.
    pub fn pcm(adsr: Adsr) -> Self {
        Self::with_peak(adsr, 0xFF, 8)
    }

    /// 4-bit AlphaDream PSG envelope.
    pub fn psg(adsr: Adsr) -> Self {
        Self::with_peak(adsr.masked_nibbles(), 0xF, 4)
    }

    fn with_peak(adsr: Adsr, peak: u32, shift: u32) -> Self {
        Self {
            state: EnvelopeState::Initializing,
            level: 0,
            peak,
            shift,
            attack: adsr.attack as u32,
            decay: adsr.decay as u32,
            sustain: (adsr.sustain as u32).min(peak),
            release: adsr.release as u32,
        }
    }

    pub fn state(&self) -> EnvelopeState {
        self.state
    }

    pub fn level(&self) -> u32 {
        self.level
    }

    pub fn peak(&self) -> u32 {
        self.peak
    }

    pub fn step(&mut self) {
        match self.state {
            EnvelopeState::Initializing => {
                self.level = self.attack.min(self.peak);
                self.state = EnvelopeState::Rising;
                if self.level >= self.peak {
                    self.reach_peak();
                }
            }
            EnvelopeState::Rising => {
                let next = self.level + self.attack;
                if next >= self.peak {
                    self.reach_peak();
                } else {
                    self.level = next;
                }
            }
            EnvelopeState::Decaying => {
                let next = (self.level * self.decay) >> self.shift;
                if next <= self.sustain {
                    self.level = self.sustain;
                    self.state = EnvelopeState::Playing;
                } else {
                    self.level = next;
                }
            }
            EnvelopeState::Releasing => {
                self.level = (self.level * self.release) >> self.shift;
                if self.level == 0 {
                    self.state = EnvelopeState::Dying;
                }
            }
            EnvelopeState::Dying => {
                self.level = 0;
                self.state = EnvelopeState::Dead;
            }
            EnvelopeState::Playing | EnvelopeState::Dead => {}
        }
    }

    fn reach_peak(&mut self) {
        self.level = self.peak;
        self.state = if self.sustain >= self.peak {
            EnvelopeState::Playing
        } else {
            EnvelopeState::Decaying
        };
    }

    pub fn release(&mut self) {
        if self.state < EnvelopeState::Releasing {
            self.state = EnvelopeState::Releasing;
        }
    }

    pub fn kill(&mut self) {
        self.level = 0;
        self.state = EnvelopeState::Dead;
    }
}

/// MP2K PSG envelope.
///
/// The current state only changes once its rate counter expires; until then
/// a requested change waits in `next_state`.
#[derive(Clone, Debug)]
pub struct CgbEnvelope {
    state: EnvelopeState,
    next_state: EnvelopeState,
    level: u8,
    peak: u8,
    sustain: u8,
    process_step: u8,
    adsr: Adsr,
}

impl CgbEnvelope {
    pub fn new(adsr: Adsr, velocity: u8, volume: u8) -> Self {
        let mut env = Self {
            state: EnvelopeState::Initializing,
            next_state: EnvelopeState::Rising,
            level: 0,
            peak: 0,
            sustain: 0,
            process_step: 0,
            adsr: adsr.masked_cgb(),
        };
        env.set_levels(velocity, volume);
        env
    }

    pub fn state(&self) -> EnvelopeState {
        self.state
    }

    /// Current level, 0 to 15.
    pub fn level(&self) -> u8 {
        self.level
    }

    /// Recompute peak and sustain from note velocity and track volume
    /// (both 0-127). Ignored once the note is released.
    pub fn set_levels(&mut self, velocity: u8, volume: u8) {
        if self.state >= EnvelopeState::Releasing {
            return;
        }
        self.peak = ((velocity.min(0x7F) as u32 * volume.min(0x7F) as u32) >> 10) as u8;
        self.sustain = ((self.peak as u32 * self.adsr.sustain as u32 + 0xF) >> 4) as u8;
        if self.state == EnvelopeState::Playing {
            self.level = self.sustain;
        }
    }

    pub fn step(&mut self) {
        let EnvelopeState::Initializing = self.state else {
            self.advance();
            return;
        };

        // A release requested before the first step stays pending.
        if self.next_state != EnvelopeState::Releasing {
            self.next_state = EnvelopeState::Rising;
        }
        self.process_step = 0;
        let Adsr { attack, decay, sustain, .. } = self.adsr;
        if (attack | decay) == 0 || (self.sustain == 0 && self.peak == 0) {
            self.state = EnvelopeState::Playing;
            self.level = self.sustain;
        } else if attack == 0 && sustain < 0xF {
            self.state = EnvelopeState::Decaying;
            self.level = self.peak.saturating_sub(1).max(self.sustain);
        } else if attack == 0 {
            self.state = EnvelopeState::Playing;
            self.level = self.sustain;
        } else {
            self.state = EnvelopeState::Rising;
            self.level = 1;
        }
    }

    fn advance(&mut self) {
        loop {
            match self.state {
                EnvelopeState::Rising => {
                    self.process_step += 1;
                    if self.process_step < self.adsr.attack {
                        return;
                    }
                    if matches!(
                        self.next_state,
                        EnvelopeState::Decaying | EnvelopeState::Playing | EnvelopeState::Releasing
                    ) {
                        self.state = self.next_state;
                        continue;
                    }
                    self.process_step = 0;
                    self.level = self.level.saturating_add(1);
                    if self.level >= self.peak {
                        self.level = self.peak;
                        self.next_state = if self.adsr.decay == 0 || self.peak == self.sustain {
                            EnvelopeState::Playing
                        } else {
                            EnvelopeState::Decaying
                        };
                    }
                    return;
                }
                EnvelopeState::Decaying => {
                    self.process_step += 1;
                    if self.process_step < self.adsr.decay {
                        return;
                    }
                    if matches!(
                        self.next_state,
                        EnvelopeState::Playing | EnvelopeState::Releasing
                    ) {
                        self.state = self.next_state;
                        continue;
                    }
                    self.process_step = 0;
                    if self.level.saturating_sub(1) <= self.sustain {
                        self.level = self.sustain.min(self.level);
                        self.next_state = EnvelopeState::Playing;
                    } else {
                        self.level -= 1;
                    }
                    return;
                }
                EnvelopeState::Playing => {
                    self.process_step += 1;
                    if self.next_state == EnvelopeState::Releasing {
                        self.state = EnvelopeState::Releasing;
                        continue;
                    }
                    self.process_step = 0;
                    return;
                }
                EnvelopeState::Releasing => {
                    self.process_step = self.process_step.saturating_add(1);
                    if self.process_step < self.adsr.release {
                        return;
                    }
                    if self.next_state == EnvelopeState::Dying || self.adsr.release == 0 {
                        self.kill();
                        return;
                    }
                    self.process_step = 0;
                    if self.level <= 1 {
                        self.level = 0;
                        self.next_state = EnvelopeState::Dying;
                    } else {
                        self.level -= 1;
                    }
                    return;
                }
                EnvelopeState::Dying => {
                    self.kill();
                    return;
                }
                EnvelopeState::Initializing | EnvelopeState::Dead => return,
            }
        }
    }

    pub fn release(&mut self) {
        if self.state < EnvelopeState::Releasing {
            self.next_state = EnvelopeState::Releasing;
        }
    }

    pub fn kill(&mut self) {
        self.level = 0;
        self.state = EnvelopeState::Dead;
        self.next_state = EnvelopeState::Dead;
    }
}

/// Lowest level of the NDS envelope: -723 centibels, shifted by 7.
pub const DECIBEL_FLOOR: i32 = -723 << 7;

/// Attack multipliers for the seven fastest attack rates.
const ATTACK_TABLE: [u8; 19] = [
    0x00, 0x01, 0x05, 0x0E, 0x1A, 0x26, 0x33, 0x3F, 0x49, 0x54, 0x5C, 0x64, 0x6D, 0x74, 0x7B, 0x7F,
    0x84, 0x89, 0x8F,
];

/// 7-bit linear value to centibels (`400 * log10(v / 127)`); also used for
/// velocity and volume attenuation.
pub const SUSTAIN_TABLE: [i16; 128] = [
    -32768, -722, -721, -651, -601, -562, -530, -503, -480, -460, -442, -425, -410, -396, -383,
    -371, -360, -349, -339, -330, -321, -313, -305, -297, -289, -282, -276, -269, -263, -257, -251,
    -245, -239, -234, -229, -224, -219, -214, -210, -205, -201, -196, -192, -188, -184, -180, -176,
    -173, -169, -165, -162, -158, -155, -152, -149, -145, -142, -139, -136, -133, -130, -127, -125,
    -122, -119, -116, -114, -111, -109, -106, -103, -101, -99, -96, -94, -91, -89, -87, -85, -82,
    -80, -78, -76, -74, -72, -70, -68, -66, -64, -62, -60, -58, -56, -54, -52, -50, -49, -47, -45,
    -43, -42, -40, -38, -36, -35, -33, -31, -30, -28, -27, -25, -23, -22, -20, -19, -17, -16, -14,
    -13, -11, -10, -8, -7, -6, -4, -3, -1, 0,
];

fn attack_multiplier(attack: u8) -> i32 {
    if attack < 0x6D {
        0xFF - attack as i32
    } else {
        ATTACK_TABLE[(0x7F - attack.min(0x7F)) as usize] as i32
    }
}

fn fall_rate(rate: u8) -> i32 {
    match rate {
        0x7F..=0xFF => 0xFFFF,
        0x7E => 0x3C00,
        r if r < 0x32 => (r as i32) * 2 + 1,
        r => 0x1E00 / (0x7E - r as i32),
    }
}

/// NDS decibel envelope.
#[derive(Clone, Debug)]
pub struct DecibelEnvelope {
    state: EnvelopeState,
    level: i32,
    attack: i32,
    decay: i32,
    sustain: i32,
    release: i32,
}

impl DecibelEnvelope {
    pub fn new(adsr: Adsr) -> Self {
        let adsr = adsr.clamped_7bit();
        Self {
            state: EnvelopeState::Initializing,
            level: DECIBEL_FLOOR,
            attack: attack_multiplier(adsr.attack),
            decay: fall_rate(adsr.decay),
            sustain: (SUSTAIN_TABLE[adsr.sustain as usize] as i32) << 7,
            release: fall_rate(adsr.release),
        }
    }

    pub fn state(&self) -> EnvelopeState {
        self.state
    }

    /// Current level in centibels << 7 (0 = full, [`DECIBEL_FLOOR`] = silent).
    pub fn level(&self) -> i32 {
        self.level
    }

    pub fn step(&mut self) {
        match self.state {
            EnvelopeState::Initializing => {
                self.level = DECIBEL_FLOOR;
                self.state = EnvelopeState::Rising;
                self.rise();
            }
            EnvelopeState::Rising => self.rise(),
            EnvelopeState::Decaying => {
                self.level -= self.decay;
                if self.level <= self.sustain {
                    self.level = self.sustain;
                    self.state = EnvelopeState::Playing;
                }
            }
            EnvelopeState::Releasing => {
                self.level -= self.release;
                if self.level <= DECIBEL_FLOOR {
                    self.level = DECIBEL_FLOOR;
                    self.state = EnvelopeState::Dying;
                }
            }
            EnvelopeState::Dying => self.state = EnvelopeState::Dead,
            EnvelopeState::Playing | EnvelopeState::Dead => {}
        }
    }

    fn rise(&mut self) {
        self.level = self.attack * self.level / 0xFF;
        if self.level == 0 {
            self.state = EnvelopeState::Decaying;
        }
    }

    pub fn release(&mut self) {
        if self.state < EnvelopeState::Releasing {
            self.state = EnvelopeState::Releasing;
        }
    }

    pub fn kill(&mut self) {
        self.level = DECIBEL_FLOOR;
        self.state = EnvelopeState::Dead;
    }
}

/// Envelope of one channel; the variant is chosen at note-on.
#[derive(Clone, Debug)]
pub enum Envelope {
    Linear(LinearEnvelope),
    Cgb(CgbEnvelope),
    Decibel(DecibelEnvelope),
}

impl Default for Envelope {
    fn default() -> Self {
        let mut env = LinearEnvelope::pcm(Adsr::default());
        env.kill();
        Envelope::Linear(env)
    }
}

impl Envelope {
    /// Build the envelope a voice of the given class uses on `kind`.
    pub fn for_voice(kind: EngineKind, psg: bool, adsr: Adsr, velocity: u8, volume: u8) -> Self {
        match (kind, psg) {
            (EngineKind::Mp2k, false) | (EngineKind::AlphaDream, false) => {
                Envelope::Linear(LinearEnvelope::pcm(adsr))
            }
            (EngineKind::Mp2k, true) => Envelope::Cgb(CgbEnvelope::new(adsr, velocity, volume)),
            (EngineKind::AlphaDream, true) => Envelope::Linear(LinearEnvelope::psg(adsr)),
            (EngineKind::Sdat, _) => Envelope::Decibel(DecibelEnvelope::new(adsr)),
        }
    }

    pub fn state(&self) -> EnvelopeState {
        match self {
            Envelope::Linear(e) => e.state(),
            Envelope::Cgb(e) => e.state(),
            Envelope::Decibel(e) => e.state(),
        }
    }

    /// Advance one render buffer.
    pub fn step(&mut self) {
        match self {
            Envelope::Linear(e) => e.step(),
            Envelope::Cgb(e) => e.step(),
            Envelope::Decibel(e) => e.step(),
        }
    }

    /// Enter the release phase. No-op once releasing.
    pub fn release(&mut self) {
        match self {
            Envelope::Linear(e) => e.release(),
            Envelope::Cgb(e) => e.release(),
            Envelope::Decibel(e) => e.release(),
        }
    }

    /// Jump straight to `Dead`.
    pub fn kill(&mut self) {
        match self {
            Envelope::Linear(e) => e.kill(),
            Envelope::Cgb(e) => e.kill(),
            Envelope::Decibel(e) => e.kill(),
        }
    }

    pub fn is_dead(&self) -> bool {
        self.state() == EnvelopeState::Dead
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run_linear(env: &mut LinearEnvelope, steps: usize) -> alloc::vec::Vec<(EnvelopeState, u32)> {
        (0..steps)
            .map(|_| {
                env.step();
                (env.state(), env.level())
            })
            .collect()
    }

    #[test]
    fn instant_attack_full_sustain_plays_at_peak() {
        let mut env = LinearEnvelope::pcm(Adsr::new(0xFF, 0x00, 0xFF, 0x00));
        env.step();
        assert_eq!(env.state(), EnvelopeState::Playing);
        assert_eq!(env.level(), 0xFF);
    }

    #[test]
    fn linear_attack_then_decay_to_sustain() {
        let mut env = LinearEnvelope::pcm(Adsr::new(0x40, 0x80, 0x20, 0x80));
        let trace = run_linear(&mut env, 12);
        assert_eq!(trace[0], (EnvelopeState::Rising, 0x40));
        assert_eq!(trace[1], (EnvelopeState::Rising, 0x80));
        assert_eq!(trace[2], (EnvelopeState::Rising, 0xC0));
        assert_eq!(trace[3], (EnvelopeState::Decaying, 0xFF));
        assert_eq!(trace[4], (EnvelopeState::Decaying, 0x7F));
        assert_eq!(trace.last().copied(), Some((EnvelopeState::Playing, 0x20)));

        let mut peak_seen = 0;
        for window in trace.windows(2) {
            let (state, level) = window[1];
            if state == EnvelopeState::Rising {
                assert!(level >= window[0].1);
            }
            if window[0].0 == EnvelopeState::Decaying {
                assert!(level <= window[0].1);
            }
            peak_seen = peak_seen.max(level);
        }
        assert_eq!(peak_seen, 0xFF);
    }

    #[test]
    fn linear_release_reaches_dead() {
        let mut env = LinearEnvelope::pcm(Adsr::new(0xFF, 0, 0xFF, 0xC0));
        env.step();
        env.release();
        let mut last = env.level();
        for _ in 0..64 {
            env.step();
            if env.state() == EnvelopeState::Releasing {
                assert!(env.level() <= last);
            }
            last = env.level();
        }
        assert_eq!(env.state(), EnvelopeState::Dead);
        assert_eq!(env.level(), 0);
    }

    #[test]
    fn release_is_monotonic() {
        let mut env = LinearEnvelope::pcm(Adsr::new(0xFF, 0, 0xFF, 0x00));
        env.step();
        env.release();
        env.step();
        assert_eq!(env.state(), EnvelopeState::Dying);
        env.release();
        assert_eq!(env.state(), EnvelopeState::Dying);
        env.step();
        env.release();
        assert_eq!(env.state(), EnvelopeState::Dead);
    }

    #[test]
    fn alpha_dream_psg_uses_nibble_peak() {
        let mut env = LinearEnvelope::psg(Adsr::new(0xF, 0, 0xF, 0));
        env.step();
        assert_eq!(env.peak(), 0xF);
        assert_eq!((env.state(), env.level()), (EnvelopeState::Playing, 0xF));
    }

    #[test]
    fn cgb_levels_follow_velocity_and_volume() {
        let env = CgbEnvelope::new(Adsr::new(1, 1, 8, 1), 127, 127);
        assert_eq!(env.peak, 15);
        assert_eq!(env.sustain, (15 * 8 + 0xF) >> 4);
    }

    #[test]
    fn cgb_no_attack_no_decay_plays_at_sustain() {
        let mut env = CgbEnvelope::new(Adsr::new(0, 0, 8, 2), 127, 127);
        env.step();
        assert_eq!(env.state(), EnvelopeState::Playing);
        assert_eq!(env.level(), 8);
    }

    #[test]
    fn cgb_rises_one_unit_per_attack_period() {
        let mut env = CgbEnvelope::new(Adsr::new(2, 1, 0xF, 1), 127, 127);
        env.step();
        assert_eq!((env.state(), env.level()), (EnvelopeState::Rising, 1));
        env.step();
        assert_eq!(env.level(), 1);
        env.step();
        assert_eq!(env.level(), 2);
        let mut last = env.level();
        for _ in 0..64 {
            env.step();
            if env.state() == EnvelopeState::Rising {
                assert!(env.level() >= last);
            }
            last = env.level();
        }
        assert_eq!((env.state(), env.level()), (EnvelopeState::Playing, 15));
    }

    #[test]
    fn cgb_decays_to_sustain() {
        let mut env = CgbEnvelope::new(Adsr::new(0, 1, 4, 1), 127, 127);
        env.step();
        assert_eq!(env.state(), EnvelopeState::Decaying);
        assert_eq!(env.level(), 14);
        let mut last = env.level();
        for _ in 0..32 {
            env.step();
            assert!(env.level() <= last);
            last = env.level();
        }
        assert_eq!(env.state(), EnvelopeState::Playing);
        assert_eq!(env.level(), (15 * 4 + 0xF) >> 4);
    }

    #[test]
    fn cgb_zero_release_dies_immediately() {
        let mut env = CgbEnvelope::new(Adsr::new(0, 0, 0xF, 0), 127, 127);
        env.step();
        env.release();
        env.step();
        assert_eq!(env.state(), EnvelopeState::Dead);
        assert_eq!(env.level(), 0);
    }

    #[test]
    fn cgb_release_counts_down_then_dies() {
        let mut env = CgbEnvelope::new(Adsr::new(0, 0, 0xF, 1), 64, 64);
        env.step();
        let start = env.level();
        assert_eq!(start, 4);
        env.release();
        let mut steps = 0;
        while env.state() != EnvelopeState::Dead && steps < 32 {
            env.step();
            steps += 1;
        }
        assert_eq!(env.state(), EnvelopeState::Dead);
        assert!(steps >= start as usize);
    }

    #[test]
    fn cgb_release_before_first_step_is_kept() {
        let mut env = CgbEnvelope::new(Adsr::new(3, 1, 0xF, 0), 127, 127);
        env.release();
        env.step();
        assert_eq!(env.state(), EnvelopeState::Rising);
        for _ in 0..3 {
            env.step();
        }
        assert_eq!(env.state(), EnvelopeState::Dead);
    }

    #[test]
    fn cgb_volume_change_ignored_after_release() {
        let mut env = CgbEnvelope::new(Adsr::new(0, 0, 0xF, 7), 127, 127);
        env.step();
        env.release();
        env.step();
        let level = env.level();
        env.set_levels(10, 10);
        assert_eq!(env.level(), level);
    }

    #[test]
    fn decibel_tables() {
        assert_eq!(attack_multiplier(0), 0xFF);
        assert_eq!(attack_multiplier(0x7F), 0);
        assert_eq!(attack_multiplier(0x6D), 0x8F);
        assert_eq!(fall_rate(0x7F), 0xFFFF);
        assert_eq!(fall_rate(0x7E), 0x3C00);
        assert_eq!(fall_rate(0x10), 0x21);
        assert_eq!(fall_rate(0x64), 0x1E00 / 0x1A);
        assert_eq!(SUSTAIN_TABLE[127], 0);
        assert_eq!(SUSTAIN_TABLE[64], -119);
    }

    #[test]
    fn decibel_instant_attack_then_sustain() {
        let mut env = DecibelEnvelope::new(Adsr::new(0x7F, 0x7F, 0x7F, 0x7F));
        env.step();
        assert_eq!((env.state(), env.level()), (EnvelopeState::Decaying, 0));
        env.step();
        assert_eq!((env.state(), env.level()), (EnvelopeState::Playing, 0));
    }

    #[test]
    fn decibel_attack_rises_from_floor() {
        let mut env = DecibelEnvelope::new(Adsr::new(0x70, 0x7F, 0x40, 0x7F));
        let mut last = DECIBEL_FLOOR;
        for _ in 0..64 {
            env.step();
            if env.state() == EnvelopeState::Rising {
                assert!(env.level() >= last);
            }
            last = env.level();
            if env.state() == EnvelopeState::Playing {
                break;
            }
        }
        assert_eq!(env.state(), EnvelopeState::Playing);
        assert_eq!(env.level(), (SUSTAIN_TABLE[0x40] as i32) << 7);
    }

    #[test]
    fn decibel_release_ends_at_floor() {
        let mut env = DecibelEnvelope::new(Adsr::new(0x7F, 0x7F, 0x7F, 0x7E));
        env.step();
        env.release();
        let mut last = env.level();
        while env.state() == EnvelopeState::Releasing {
            env.step();
            assert!(env.level() <= last);
            last = env.level();
        }
        assert_eq!((env.state(), env.level()), (EnvelopeState::Dying, DECIBEL_FLOOR));
        env.step();
        assert_eq!(env.state(), EnvelopeState::Dead);
    }

    #[test]
    fn wrapper_picks_variant_per_engine() {
        let adsr = Adsr::new(1, 1, 1, 1);
        let for_voice = |kind, psg| Envelope::for_voice(kind, psg, adsr, 127, 127);
        assert!(matches!(for_voice(EngineKind::Mp2k, true), Envelope::Cgb(_)));
        assert!(matches!(for_voice(EngineKind::Mp2k, false), Envelope::Linear(_)));
        assert!(matches!(for_voice(EngineKind::Sdat, true), Envelope::Decibel(_)));
        assert!(Envelope::default().is_dead());
    }
}
