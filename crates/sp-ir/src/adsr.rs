//! ADSR envelope parameters.

/// Attack / decay / sustain / release rates as read from a voice definition.
///
/// The meaning and legal width of each field depends on the engine and the
/// waveform class; the engine masks or clamps them at note-on.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Adsr {
    pub attack: u8,
    pub decay: u8,
    pub sustain: u8,
    pub release: u8,
}

impl Adsr {
    pub const fn new(attack: u8, decay: u8, sustain: u8, release: u8) -> Self {
        Self { attack, decay, sustain, release }
    }

    /// MP2K CGB (PSG) layout: 3-bit attack/decay/release, 4-bit sustain.
    pub const fn masked_cgb(self) -> Self {
        Self {
            attack: self.attack & 0x7,
            decay: self.decay & 0x7,
            sustain: self.sustain & 0xF,
            release: self.release & 0x7,
        }
    }

    /// 4-bit layout used by the AlphaDream PSG channels.
    pub const fn masked_nibbles(self) -> Self {
        Self {
            attack: self.attack & 0xF,
            decay: self.decay & 0xF,
            sustain: self.sustain & 0xF,
            release: self.release & 0xF,
        }
    }

    /// 7-bit layout used by NDS instruments.
    pub fn clamped_7bit(self) -> Self {
        Self {
            attack: self.attack.min(0x7F),
            decay: self.decay.min(0x7F),
            sustain: self.sustain.min(0x7F),
            release: self.release.min(0x7F),
        }
    }
}
