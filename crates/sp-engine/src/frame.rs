//! Audio frame type.

/// A stereo audio frame (16-bit integer).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Frame {
    pub left: i16,
    pub right: i16,
}

impl Frame {
    /// Create a silent frame.
    pub const fn silence() -> Self {
        Self { left: 0, right: 0 }
    }

    /// Convert a float pair in [-1.0, 1.0], clamping overshoot.
    pub fn from_f32(left: f32, right: f32) -> Self {
        Self {
            left: to_i16(left),
            right: to_i16(right),
        }
    }

    /// Back to floats in [-1.0, 1.0).
    pub fn to_f32(self) -> (f32, f32) {
        (self.left as f32 / 32768.0, self.right as f32 / 32768.0)
    }

    /// Mix another frame into this one.
    pub fn mix(&mut self, other: Frame) {
        // Use i32 to avoid overflow, then clamp
        let left = (self.left as i32 + other.left as i32).clamp(-32768, 32767);
        let right = (self.right as i32 + other.right as i32).clamp(-32768, 32767);
        self.left = left as i16;
        self.right = right as i16;
    }
}

fn to_i16(sample: f32) -> i16 {
    (sample * 32768.0).clamp(-32768.0, 32767.0) as i16
}
