//! NDS SWAV wave header.

use std::io::Cursor;

use binrw::BinRead;
use log::debug;
use sp_ir::{Sample, SampleData};

use crate::{require, FormatError};

/// Size of the SWAV info header in bytes.
pub const SWAV_INFO_LEN: usize = 12;

/// Offset of the info header inside a standalone `SWAV` file
/// (16-byte file header plus the 8-byte `DATA` block header).
const SWAV_FILE_INFO_OFFSET: usize = 0x18;

/// Encoding of the wave data.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SwavType {
    Pcm8,
    Pcm16,
    Adpcm,
}

impl TryFrom<u8> for SwavType {
    type Error = FormatError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(SwavType::Pcm8),
            1 => Ok(SwavType::Pcm16),
            2 => Ok(SwavType::Adpcm),
            other => Err(FormatError::UnsupportedWaveType(other)),
        }
    }
}

/// The 12-byte header in front of SWAV wave data.
#[derive(BinRead, Clone, Copy, Debug, PartialEq, Eq)]
#[br(little)]
pub struct SwavInfo {
    pub wave_type: u8,
    pub looped: u8,
    /// Hz
    pub sample_rate: u16,
    /// Hardware timer value (33513982 / 2 / rate)
    pub timer: u16,
    /// Loop start in 32-bit words, ADPCM header included
    pub loop_offset: u16,
    /// Words after the loop start
    pub length: u32,
}

impl SwavInfo {
    /// Bytes of wave data following the header.
    pub fn data_len(&self) -> usize {
        (self.loop_offset as usize + self.length as usize) * 4
    }

    /// Convert a word offset into a frame index for this encoding.
    fn words_to_frames(&self, kind: SwavType, words: usize) -> usize {
        match kind {
            SwavType::Pcm8 => words * 4,
            SwavType::Pcm16 => words * 2,
            SwavType::Adpcm => words.saturating_sub(1) * 8,
        }
    }
}

/// Read a SWAV wave: either a standalone `SWAV` file or a bare info header
/// followed by its data (as stored inside an SWAR archive).
pub fn load_swav(name: &str, data: &[u8]) -> Result<Sample, FormatError> {
    let data = if data.starts_with(b"SWAV") {
        require(data, SWAV_FILE_INFO_OFFSET)?;
        &data[SWAV_FILE_INFO_OFFSET..]
    } else {
        data
    };
    require(data, SWAV_INFO_LEN)?;
    let info = SwavInfo::read(&mut Cursor::new(data))?;
    let kind = SwavType::try_from(info.wave_type)?;
    let body = &data[SWAV_INFO_LEN..];
    require(body, info.data_len())?;
    let body = &body[..info.data_len()];

    let frames = info.words_to_frames(kind, info.data_len() / 4);
    let mut sample = Sample::new(name);
    sample.sample_rate = info.sample_rate as u32;
    sample.data = match kind {
        SwavType::Pcm8 => SampleData::Pcm8(body.iter().map(|&b| b as i8).collect()),
        SwavType::Pcm16 => SampleData::Pcm16(
            body.chunks_exact(2)
                .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
                .collect(),
        ),
        SwavType::Adpcm => {
            if body.len() < 4 {
                return Err(FormatError::InvalidHeader("ADPCM wave without a header word"));
            }
            SampleData::Adpcm { data: body.to_vec(), frames: frames as u32 }
        }
    };
    if info.looped != 0 {
        sample = sample.looping(info.words_to_frames(kind, info.loop_offset as usize) as u32);
    }
    debug!("{name}: {kind:?} {frames} frames at {} Hz", info.sample_rate);
    Ok(sample)
}
