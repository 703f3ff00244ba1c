//! Sample header readers for sapphire.
//!
//! Turns the two sample layouts playback needs into [`sp_ir::Sample`]
//! values: the MP2K 16-byte wave header (with the Golden Sun synth block
//! that may follow it) and the NDS SWAV header. Container formats (ROM
//! voice tables, SDAT archives) are parsed elsewhere.

mod mp2k;
mod swav;

pub use mp2k::{load_mp2k_wave, SynthHeader, WaveHeader, WAVE_HEADER_LEN};
pub use swav::{load_swav, SwavInfo, SwavType, SWAV_INFO_LEN};

use thiserror::Error;

/// Error type for sample header parsing.
#[derive(Debug, Error)]
pub enum FormatError {
    /// Not enough bytes for the header or the data it announces
    #[error("unexpected end of data: need {needed} bytes, have {available}")]
    UnexpectedEof { needed: usize, available: usize },
    /// Unknown sample encoding
    #[error("unsupported wave type {0}")]
    UnsupportedWaveType(u8),
    /// Header fields that contradict each other
    #[error("invalid header: {0}")]
    InvalidHeader(&'static str),
    /// Low-level read failure
    #[error(transparent)]
    Read(#[from] binrw::Error),
}

/// Check that `data` holds at least `needed` bytes.
fn require(data: &[u8], needed: usize) -> Result<(), FormatError> {
    if data.len() < needed {
        return Err(FormatError::UnexpectedEof { needed, available: data.len() });
    }
    Ok(())
}
