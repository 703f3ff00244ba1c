//! Note-on description handed from the sequencer to the engine.

/// One note as the sequencer requested it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct NoteInfo {
    /// Key used by the sequencer to address the note on release.
    pub key: u8,
    /// Sounding note after transposition / key-split resolution.
    pub note: u8,
    /// Note velocity (0-127).
    pub velocity: u8,
    /// Remaining length in ticks; `None` holds until released.
    pub duration: Option<u32>,
}

impl NoteInfo {
    /// A held note whose key and sounding note are the same.
    pub const fn new(note: u8, velocity: u8) -> Self {
        Self { key: note, note, velocity, duration: None }
    }

    /// Same note, released automatically after `ticks` ticks.
    pub const fn with_duration(mut self, ticks: u32) -> Self {
        self.duration = Some(ticks);
        self
    }

    /// Velocity clamped to the 7-bit MIDI range.
    pub fn clamped_velocity(&self) -> u8 {
        self.velocity.min(0x7F)
    }
}
