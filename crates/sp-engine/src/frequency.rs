//! Pitch-to-frequency conversion for every waveform class.
//!
//! Pitch is expressed in engine units: 64 per semitone, 768 per octave.
//! Frequencies are 16.16 fixed-point Hz so that the per-sample increment is
//! a single integer division by the output rate.

/// Pitch units per semitone.
pub const PITCH_PER_SEMITONE: i32 = 64;

/// Pitch units per octave.
pub const PITCH_PER_OCTAVE: i32 = 12 * PITCH_PER_SEMITONE;

/// Square PSG step rate at note 69 (8 steps per cycle at 440 Hz).
const SQUARE_BASE_HZ: u64 = 3520;

/// Wave RAM step rate at note 69 (32 steps per cycle at 220 Hz).
const WAVE_BASE_HZ: u64 = 7040;

/// NDS noise LFSR clock at note 60.
const NDS_NOISE_BASE_HZ: u64 = 32768;

/// CGB noise clock before the divider and shift are applied.
const CGB_NOISE_CLOCK: u64 = 524288;

/// MP2K noise register values for keys 21..=80: shift in the high nibble,
/// divisor in the low three bits.
const CGB_NOISE_TABLE: [u8; 60] = [
    0xD7, 0xD6, 0xD5, 0xD4, 0xC7, 0xC6, 0xC5, 0xC4, 0xB7, 0xB6, 0xB5, 0xB4,
    0xA7, 0xA6, 0xA5, 0xA4, 0x97, 0x96, 0x95, 0x94, 0x87, 0x86, 0x85, 0x84,
    0x77, 0x76, 0x75, 0x74, 0x67, 0x66, 0x65, 0x64, 0x57, 0x56, 0x55, 0x54,
    0x47, 0x46, 0x45, 0x44, 0x37, 0x36, 0x35, 0x34, 0x27, 0x26, 0x25, 0x24,
    0x17, 0x16, 0x15, 0x14, 0x07, 0x06, 0x05, 0x04, 0x03, 0x02, 0x01, 0x00,
];

/// round(2^(n/12) * 65536) for 0-11 semitones.
const SEMITONE_MUL: [u64; 12] = [
    65536, 69433, 73562, 77936, 82570, 87480, 92682, 98193, 104032, 110218, 116772, 123715,
];

/// round(2^(f/768) * 65536) for 0-63 pitch units.
const FINE_MUL: [u64; 64] = [
    65536, 65595, 65654, 65714, 65773, 65832, 65892, 65951,
    66011, 66071, 66130, 66190, 66250, 66309, 66369, 66429,
    66489, 66549, 66609, 66670, 66730, 66790, 66850, 66911,
    66971, 67032, 67092, 67153, 67213, 67274, 67335, 67395,
    67456, 67517, 67578, 67639, 67700, 67761, 67823, 67884,
    67945, 68007, 68068, 68129, 68191, 68252, 68314, 68376,
    68438, 68499, 68561, 68623, 68685, 68747, 68809, 68871,
    68933, 68996, 69058, 69120, 69183, 69245, 69308, 69370,
];

/// Scale a 16.16 fixed-point frequency by 2^(units/768).
fn shift_pitch(freq: u64, units: i32) -> u64 {
    let octaves = units.div_euclid(PITCH_PER_OCTAVE);
    let within = units.rem_euclid(PITCH_PER_OCTAVE);
    let semitone = (within / PITCH_PER_SEMITONE) as usize;
    let fine = (within % PITCH_PER_SEMITONE) as usize;

    let ratio = (SEMITONE_MUL[semitone] * FINE_MUL[fine]) >> 16;
    let scaled = (freq * ratio) >> 16;
    if octaves >= 0 {
        scaled.checked_shl(octaves as u32).unwrap_or(u64::MAX >> 16)
    } else {
        scaled.checked_shr((-octaves) as u32).unwrap_or(0)
    }
}

/// Pitch units between `note` and `reference`, plus the fine `pitch` offset.
fn units(note: u8, reference: u8, pitch: i32) -> i32 {
    (note as i32 - reference as i32) * PITCH_PER_SEMITONE + pitch
}

/// PCM sample playback rate: the recording rate at `root_key`.
pub fn pcm_frequency(sample_rate: u32, note: u8, root_key: u8, pitch: i32) -> u64 {
    shift_pitch((sample_rate as u64) << 16, units(note, root_key, pitch))
}

/// Square PSG step rate.
pub fn square_frequency(note: u8, pitch: i32) -> u64 {
    shift_pitch(SQUARE_BASE_HZ << 16, units(note, 69, pitch))
}

/// Wave RAM step rate.
pub fn wave_frequency(note: u8, pitch: i32) -> u64 {
    shift_pitch(WAVE_BASE_HZ << 16, units(note, 69, pitch))
}

/// CGB noise LFSR clock. Fine pitch is rounded to whole semitones because the
/// hardware register only has per-key settings.
pub fn cgb_noise_frequency(note: u8, pitch: i32) -> u64 {
    let key = note as i32 + div_round(pitch, PITCH_PER_SEMITONE);
    let index = if key <= 20 { 0 } else { (key - 21).min(59) } as usize;
    let reg = CGB_NOISE_TABLE[index];
    let shift = (reg >> 4) as u32 + 1;
    let divisor = (reg & 0x7) as u64;
    // Divisor 0 acts as 0.5 on hardware.
    let clock = CGB_NOISE_CLOCK << 16;
    let base = if divisor == 0 { clock * 2 } else { clock / divisor };
    base >> shift
}

/// NDS noise LFSR clock.
pub fn nds_noise_frequency(note: u8, pitch: i32) -> u64 {
    shift_pitch(NDS_NOISE_BASE_HZ << 16, units(note, 60, pitch))
}

/// Convert a 16.16 fixed-point frequency into a 16.16 per-output-frame increment.
pub fn frequency_to_increment(freq: u64, output_rate: u32) -> u32 {
    if output_rate == 0 {
        return 0;
    }
    (freq / output_rate as u64).min(u32::MAX as u64) as u32
}

/// Integer division rounding half away from zero.
fn div_round(value: i32, divisor: i32) -> i32 {
    if value >= 0 {
        (value + divisor / 2) / divisor
    } else {
        (value - divisor / 2) / divisor
    }
}
