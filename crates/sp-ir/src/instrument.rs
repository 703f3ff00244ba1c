//! Instrument (voice) definitions.

use arrayvec::ArrayString;

use crate::adsr::Adsr;
use crate::sample::SampleKey;

/// Square-wave duty cycle of a PSG square voice.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DutyCycle {
    /// 12.5%
    Eighth,
    /// 25%
    Quarter,
    /// 50%
    #[default]
    Half,
    /// 75%
    ThreeQuarters,
}

impl DutyCycle {
    /// Decode the 2-bit duty field of a voice definition.
    pub fn from_bits(bits: u8) -> Self {
        match bits & 0x3 {
            0 => DutyCycle::Eighth,
            1 => DutyCycle::Quarter,
            2 => DutyCycle::Half,
            _ => DutyCycle::ThreeQuarters,
        }
    }
}

/// Length of the noise channel's LFSR.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum NoiseWidth {
    /// 15-bit LFSR (32767-step period)
    #[default]
    Long,
    /// 7-bit LFSR (127-step period)
    Short,
}

/// Waveform class of a voice.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VoiceKind {
    /// Sample playback. `fixed` plays at the engine rate regardless of note.
    Pcm { sample: SampleKey, fixed: bool },
    /// PSG square 1 (with frequency sweep register)
    Square1 { duty: DutyCycle, sweep: u8 },
    /// PSG square 2
    Square2 { duty: DutyCycle },
    /// PSG 4-bit wave RAM: 16 bytes, 32 nibbles, high nibble first
    Wave { pattern: [u8; 16] },
    /// PSG noise
    Noise { width: NoiseWidth },
}

impl VoiceKind {
    /// Whether this voice runs on a PSG unit rather than the PCM mixer.
    pub fn is_psg(&self) -> bool {
        !matches!(self, VoiceKind::Pcm { .. })
    }
}

/// An instrument definition.
#[derive(Clone, Debug)]
pub struct Instrument {
    /// Instrument name
    pub name: ArrayString<26>,
    /// Waveform class and its source
    pub kind: VoiceKind,
    /// Envelope rates copied into the channel at note-on
    pub adsr: Adsr,
    /// Note at which a sample plays at its recorded rate
    pub root_key: u8,
    /// Instrument pan offset (-64 to +63); `None` leaves the track pan alone
    pub pan: Option<i8>,
}

impl Instrument {
    /// Create a new instrument of the given kind with a neutral envelope.
    pub fn new(name: &str, kind: VoiceKind) -> Self {
        let mut name_buf = ArrayString::new();
        let _ = name_buf.try_push_str(name);
        Self {
            name: name_buf,
            kind,
            adsr: Adsr::new(0xFF, 0x00, 0xFF, 0x00),
            root_key: 60,
            pan: None,
        }
    }

    /// Replace the envelope.
    pub fn with_adsr(mut self, adsr: Adsr) -> Self {
        self.adsr = adsr;
        self
    }

    /// Replace the instrument pan offset.
    pub fn with_pan(mut self, pan: i8) -> Self {
        self.pan = Some(pan);
        self
    }

    /// Replace the root key.
    pub fn with_root_key(mut self, root_key: u8) -> Self {
        self.root_key = root_key;
        self
    }

    /// Pan offset applied on top of the track pan.
    pub fn pan_offset(&self) -> i32 {
        self.pan.map_or(0, |p| p as i32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duty_bits_wrap_to_two_bits() {
        assert_eq!(DutyCycle::from_bits(0), DutyCycle::Eighth);
        assert_eq!(DutyCycle::from_bits(2), DutyCycle::Half);
        assert_eq!(DutyCycle::from_bits(7), DutyCycle::ThreeQuarters);
    }

    #[test]
    fn psg_classification() {
        let noise = VoiceKind::Noise { width: NoiseWidth::Short };
        assert!(noise.is_psg());
        let sq = VoiceKind::Square2 { duty: DutyCycle::Quarter };
        assert!(sq.is_psg());
    }

    #[test]
    fn builder_sets_fields() {
        let inst = Instrument::new("lead", VoiceKind::Square2 { duty: DutyCycle::Half })
            .with_adsr(Adsr::new(1, 2, 3, 4))
            .with_pan(-20)
            .with_root_key(48);
        assert_eq!(inst.name.as_str(), "lead");
        assert_eq!(inst.adsr, Adsr::new(1, 2, 3, 4));
        assert_eq!(inst.pan_offset(), -20);
        assert_eq!(inst.root_key, 48);
    }
}
