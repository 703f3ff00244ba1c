//! Sample sources that are generated or decoded rather than read directly:
//! PSG square / wave RAM / noise, MP2K DPCM, NDS IMA-ADPCM and the Golden
//! Sun synthesizer.

use alloc::vec::Vec;
use sp_ir::{DutyCycle, NoiseWidth, SynthParams, SynthWave, DPCM_BLOCK_BYTES, DPCM_BLOCK_FRAMES};

/// Steps in one square-wave cycle.
pub const SQUARE_STEPS: u32 = 8;
/// Nibbles in one wave RAM cycle.
pub const WAVE_STEPS: u32 = 32;

const SQUARE_12: [f32; 8] = [0.875, -0.125, -0.125, -0.125, -0.125, -0.125, -0.125, -0.125];
const SQUARE_25: [f32; 8] = [0.75, 0.75, -0.25, -0.25, -0.25, -0.25, -0.25, -0.25];
const SQUARE_50: [f32; 8] = [0.5, 0.5, 0.5, 0.5, -0.5, -0.5, -0.5, -0.5];
const SQUARE_75: [f32; 8] = [0.25, 0.25, 0.25, 0.25, 0.25, 0.25, -0.75, -0.75];

/// DC-balanced square table for `duty`.
pub fn square_table(duty: DutyCycle) -> &'static [f32; 8] {
    match duty {
        DutyCycle::Eighth => &SQUARE_12,
        DutyCycle::Quarter => &SQUARE_25,
        DutyCycle::Half => &SQUARE_50,
        DutyCycle::ThreeQuarters => &SQUARE_75,
    }
}

/// Expand 16 bytes of wave RAM into 32 centred samples (high nibble first).
pub fn wave_table(pattern: &[u8; 16]) -> [f32; 32] {
    let mut table = [0.0; 32];
    for (i, byte) in pattern.iter().enumerate() {
        table[i * 2] = (byte >> 4) as f32 / 16.0 - 0.5;
        table[i * 2 + 1] = (byte & 0xF) as f32 / 16.0 - 0.5;
    }
    table
}

/// Tables shared by every channel of a session, built once at load time.
#[derive(Clone, Debug)]
pub struct Waveforms {
    noise_long: Vec<f32>,
    noise_short: Vec<f32>,
}

impl Default for Waveforms {
    fn default() -> Self {
        Self::new()
    }
}

impl Waveforms {
    pub fn new() -> Self {
        Self {
            noise_long: lfsr_table(15),
            noise_short: lfsr_table(7),
        }
    }

    /// One full LFSR period for `width`.
    pub fn noise(&self, width: NoiseWidth) -> &[f32] {
        match width {
            NoiseWidth::Long => &self.noise_long,
            NoiseWidth::Short => &self.noise_short,
        }
    }
}

/// Output of the Game Boy noise LFSR over one period.
fn lfsr_table(bits: u32) -> Vec<f32> {
    let period = (1usize << bits) - 1;
    let mut reg: u16 = ((1u32 << bits) - 1) as u16;
    let mut table = Vec::with_capacity(period);
    for _ in 0..period {
        let bit = (reg ^ (reg >> 1)) & 1;
        reg = (reg >> 1) | (bit << (bits - 1));
        table.push(if reg & 1 == 1 { 0.5 } else { -0.5 });
    }
    table
}

const DPCM_DELTAS: [i8; 16] = [0, 1, 4, 9, 16, 25, 36, 49, -64, -49, -36, -25, -16, -9, -4, -1];

/// Decodes MP2K DPCM one 64-frame block at a time and caches the last block.
#[derive(Clone, Debug)]
pub struct DpcmDecoder {
    block: Option<usize>,
    frames: [i8; DPCM_BLOCK_FRAMES],
}

impl Default for DpcmDecoder {
    fn default() -> Self {
        Self { block: None, frames: [0; DPCM_BLOCK_FRAMES] }
    }
}

impl DpcmDecoder {
    pub fn sample_at(&mut self, data: &[u8], frame: usize) -> i8 {
        let block = frame / DPCM_BLOCK_FRAMES;
        if self.block != Some(block) {
            self.decode_block(data, block);
        }
        self.frames[frame % DPCM_BLOCK_FRAMES]
    }

    fn decode_block(&mut self, data: &[u8], block: usize) {
        let start = block * DPCM_BLOCK_BYTES;
        let byte = |i: usize| data.get(start + i).copied().unwrap_or(0);
        let mut sample = byte(0) as i8;
        self.frames[0] = sample;
        for k in 1..DPCM_BLOCK_FRAMES {
            let packed = byte(1 + k / 2);
            let nibble = if k % 2 == 0 { packed >> 4 } else { packed & 0xF };
            sample = sample.wrapping_add(DPCM_DELTAS[nibble as usize]);
            self.frames[k] = sample;
        }
        self.block = Some(block);
    }
}

const ADPCM_STEPS: [i32; 89] = [
    7, 8, 9, 10, 11, 12, 13, 14, 16, 17, 19, 21, 23, 25, 28, 31, 34, 37, 41, 45, 50, 55, 60, 66, 73,
    80, 88, 97, 107, 118, 130, 143, 157, 173, 190, 209, 230, 253, 279, 307, 337, 371, 408, 449, 494,
    544, 598, 658, 724, 796, 876, 963, 1060, 1166, 1282, 1411, 1552, 1707, 1878, 2066, 2272, 2499,
    2749, 3024, 3327, 3660, 4026, 4428, 4871, 5358, 5894, 6484, 7132, 7845, 8630, 9493, 10442,
    11487, 12635, 13899, 15289, 16818, 18500, 20350, 22385, 24623, 27086, 29794, 32767,
];

const ADPCM_INDEX_SHIFT: [i32; 8] = [-1, -1, -1, -1, 2, 4, 6, 8];

/// Bytes of predictor / step-index header in front of NDS ADPCM data.
pub const ADPCM_HEADER_BYTES: usize = 4;

/// Streaming NDS IMA-ADPCM decoder.
///
/// Decoding is sequential; the state at the loop start is captured the
/// first time it is passed so that wrapping back does not restart from the
/// header.
#[derive(Clone, Debug, Default)]
pub struct AdpcmDecoder {
    predictor: i32,
    index: i32,
    decoded: u32,
    loop_state: Option<(i32, i32)>,
}

impl AdpcmDecoder {
    /// Reset to the header state.
    pub fn reset(&mut self, data: &[u8]) {
        self.predictor = match data {
            [lo, hi, ..] => i16::from_le_bytes([*lo, *hi]) as i32,
            _ => 0,
        };
        self.index = data.get(2).map_or(0, |&i| (i as i32).min(88));
        self.decoded = 0;
        self.loop_state = None;
    }

    pub fn sample_at(&mut self, data: &[u8], frame: u32, loop_start: u32) -> i16 {
        let target = frame + 1;
        if target < self.decoded {
            match self.loop_state {
                Some((predictor, index)) if frame >= loop_start => {
                    self.predictor = predictor;
                    self.index = index;
                    self.decoded = loop_start;
                }
                _ => self.reset(data),
            }
        }
        while self.decoded < target {
            if self.decoded == loop_start && self.loop_state.is_none() {
                self.loop_state = Some((self.predictor, self.index));
            }
            let offset = ADPCM_HEADER_BYTES + self.decoded as usize / 2;
            let byte = data.get(offset).copied().unwrap_or(0);
            let nibble = if self.decoded % 2 == 0 { byte & 0xF } else { byte >> 4 };
            self.decode_nibble(nibble);
            self.decoded += 1;
        }
        self.predictor as i16
    }

    fn decode_nibble(&mut self, nibble: u8) {
        let step = ADPCM_STEPS[self.index as usize];
        let mut diff = step >> 3;
        if nibble & 1 != 0 {
            diff += step >> 2;
        }
        if nibble & 2 != 0 {
            diff += step >> 1;
        }
        if nibble & 4 != 0 {
            diff += step;
        }
        self.predictor = if nibble & 8 != 0 {
            (self.predictor - diff).max(-0x7FFF)
        } else {
            (self.predictor + diff).min(0x7FFF)
        };
        self.index = (self.index + ADPCM_INDEX_SHIFT[(nibble & 7) as usize]).clamp(0, 88);
    }
}

/// Golden Sun synthesizer voice state.
///
/// `phase` is a 0.32 fraction of one waveform cycle.
#[derive(Clone, Debug, Default)]
pub struct SynthState {
    phase: u32,
    acc: i32,
}

const PHASE_ONE: f32 = 4_294_967_296.0;

impl SynthState {
    /// Add one buffer of synthesized samples into `out` (interleaved stereo).
    pub fn render(
        &mut self,
        params: &SynthParams,
        step: u32,
        out: &mut [f32],
        left: f32,
        right: f32,
    ) {
        match params.wave {
            SynthWave::Square => {
                self.acc = self.acc.wrapping_add((params.cycle_speed as i32).wrapping_shl(24));
                let mut t = ((params.minimum_cycle as i32).wrapping_shl(24)).wrapping_add(self.acc);
                t = if t < 0 { !t } else { t } >> 8;
                t = t
                    .wrapping_mul(params.cycle_amplitude as i32)
                    .wrapping_add((params.initial_cycle as i32).wrapping_shl(24));
                let threshold = (t as u32) as f32 / PHASE_ONE;
                for frame in out.chunks_exact_mut(2) {
                    let high = (self.phase as f32 / PHASE_ONE) < threshold;
                    let samp = if high { 0.5 } else { -0.5 } + 0.5 - threshold;
                    frame[0] += samp * left;
                    frame[1] += samp * right;
                    self.phase = self.phase.wrapping_add(step);
                }
            }
            SynthWave::Saw => {
                for frame in out.chunks_exact_mut(2) {
                    self.phase = self.phase.wrapping_add(step);
                    let coarse = (self.phase >> 24) as i32 - 0x70;
                    let fine = ((self.phase >> 16) as i32).wrapping_shl(17);
                    self.acc = coarse - (fine >> 27) + (self.acc >> 1);
                    let samp = self.acc as f32 / 256.0;
                    frame[0] += samp * left;
                    frame[1] += samp * right;
                }
            }
            SynthWave::Triangle => {
                for frame in out.chunks_exact_mut(2) {
                    self.phase = self.phase.wrapping_add(step);
                    let f = self.phase as f32 / PHASE_ONE;
                    let samp = if f < 0.5 { f * 4.0 - 1.0 } else { 3.0 - f * 4.0 };
                    frame[0] += samp * left;
                    frame[1] += samp * right;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn square_tables_are_dc_balanced() {
        let duties =
            [DutyCycle::Eighth, DutyCycle::Quarter, DutyCycle::Half, DutyCycle::ThreeQuarters];
        for duty in duties {
            let sum: f32 = square_table(duty).iter().sum();
            assert!(sum.abs() < 1e-6, "{duty:?} sums to {sum}");
        }
    }

    #[test]
    fn wave_ram_reads_high_nibble_first() {
        let mut pattern = [0u8; 16];
        pattern[0] = 0xF0;
        let table = wave_table(&pattern);
        assert_eq!(table[0], 15.0 / 16.0 - 0.5);
        assert_eq!(table[1], -0.5);
    }

    #[test]
    fn lfsr_periods() {
        let waves = Waveforms::new();
        assert_eq!(waves.noise(NoiseWidth::Long).len(), 32767);
        assert_eq!(waves.noise(NoiseWidth::Short).len(), 127);
        let short = waves.noise(NoiseWidth::Short);
        let highs = short.iter().filter(|&&s| s > 0.0).count();
        // Maximal-length sequence: one more 1 than 0.
        assert_eq!(highs, 64);
    }

    #[test]
    fn dpcm_block_seed_and_deltas() {
        let mut data = vec![0u8; DPCM_BLOCK_BYTES * 2];
        data[0] = 10;
        data[1] = 0x21; // low nibble: frame 1 +1
        data[2] = 0x0F; // high: frame 2 +0, low: frame 3 -1
        data[DPCM_BLOCK_BYTES] = (-20i8) as u8;
        let mut dec = DpcmDecoder::default();
        assert_eq!(dec.sample_at(&data, 0), 10);
        assert_eq!(dec.sample_at(&data, 1), 11);
        assert_eq!(dec.sample_at(&data, 2), 11);
        assert_eq!(dec.sample_at(&data, 3), 10);
        assert_eq!(dec.sample_at(&data, 64), -20);
        assert_eq!(dec.sample_at(&data, 3), 10);
    }

    #[test]
    fn adpcm_first_nibble_from_header() {
        // predictor 0, index 0, first nibble 4 -> step + step / 8
        let data = [0, 0, 0, 0, 0x04, 0x00];
        let mut dec = AdpcmDecoder::default();
        dec.reset(&data);
        assert_eq!(dec.sample_at(&data, 0, u32::MAX), 7 + (7 >> 3));
    }

    #[test]
    fn adpcm_loop_wrap_matches_straight_decode() {
        let mut data = vec![0x10, 0x00, 0x05, 0x00];
        data.extend((0..32u8).map(|i| i.wrapping_mul(37)));
        let mut straight = AdpcmDecoder::default();
        straight.reset(&data);
        let expected = straight.sample_at(&data, 20, 8);

        let mut looped = AdpcmDecoder::default();
        looped.reset(&data);
        looped.sample_at(&data, 40, 8);
        looped.sample_at(&data, 8, 8);
        assert_eq!(looped.sample_at(&data, 20, 8), expected);
    }

    #[test]
    fn synth_triangle_spans_full_range() {
        let mut state = SynthState::default();
        let params = SynthParams { wave: SynthWave::Triangle, ..Default::default() };
        let mut out = vec![0.0; 64 * 2];
        state.render(&params, u32::MAX / 64 + 1, &mut out, 1.0, 1.0);
        let max = out.iter().cloned().fold(f32::MIN, f32::max);
        let min = out.iter().cloned().fold(f32::MAX, f32::min);
        assert!(max > 0.9 && min < -0.9);
    }

    #[test]
    fn synth_square_is_bounded() {
        let mut state = SynthState::default();
        let params = SynthParams {
            wave: SynthWave::Square,
            initial_cycle: 0x40,
            cycle_speed: 3,
            cycle_amplitude: 0x10,
            minimum_cycle: 0x20,
        };
        let mut out = vec![0.0; 128 * 2];
        for _ in 0..8 {
            out.fill(0.0);
            state.render(&params, 0x0400_0000, &mut out, 1.0, 0.5);
            assert!(out.iter().all(|s| s.abs() <= 1.0));
        }
    }
}
