//! MP2K wave header and Golden Sun synth block.

use std::io::Cursor;

use binrw::BinRead;
use log::debug;
use sp_ir::{Sample, SampleData, SynthParams, SynthWave, DPCM_BLOCK_BYTES, DPCM_BLOCK_FRAMES};

use crate::{require, FormatError};

/// Size of the wave header in bytes.
pub const WAVE_HEADER_LEN: usize = 16;

const LOOP_FLAG: u32 = 0x4000_0000;
const COMPRESSED_FLAG: u32 = 0x0000_0001;

/// The 16-byte header in front of every MP2K sample.
#[derive(BinRead, Clone, Copy, Debug, PartialEq, Eq)]
#[br(little)]
pub struct WaveHeader {
    /// Bit 30: loop. Bit 0: DPCM compressed.
    pub flags: u32,
    /// Playback rate at the root key, times 1024
    pub pitch: u32,
    /// Loop start in frames
    pub loop_start: u32,
    /// Length in frames
    pub length: u32,
}

impl WaveHeader {
    pub fn looped(&self) -> bool {
        self.flags & LOOP_FLAG != 0
    }

    pub fn compressed(&self) -> bool {
        self.flags & COMPRESSED_FLAG != 0
    }

    /// Playback rate in Hz.
    pub fn sample_rate(&self) -> u32 {
        self.pitch / 1024
    }

    /// Golden Sun stores its synth descriptors as zero-length waves.
    pub fn is_synth_stub(&self) -> bool {
        self.length == 0
    }
}

/// Golden Sun synthesizer block following a zero-length wave header.
#[derive(BinRead, Clone, Copy, Debug, PartialEq, Eq)]
#[br(little)]
pub struct SynthHeader {
    #[br(pad_before = 1)]
    pub wave: u8,
    pub initial_cycle: u8,
    pub cycle_speed: u8,
    #[br(pad_before = 1)]
    pub cycle_amplitude: u8,
    #[br(pad_before = 1)]
    pub minimum_cycle: u8,
}

impl SynthHeader {
    const LEN: usize = 8;

    pub fn params(&self) -> Result<SynthParams, FormatError> {
        let wave = match self.wave {
            0 => SynthWave::Square,
            1 => SynthWave::Saw,
            2 => SynthWave::Triangle,
            other => return Err(FormatError::UnsupportedWaveType(other)),
        };
        Ok(SynthParams {
            wave,
            initial_cycle: self.initial_cycle,
            cycle_speed: self.cycle_speed,
            cycle_amplitude: self.cycle_amplitude,
            minimum_cycle: self.minimum_cycle,
        })
    }
}

/// Read a sample that starts with an MP2K wave header.
///
/// `golden_sun` enables the synth interpretation of zero-length waves.
pub fn load_mp2k_wave(name: &str, data: &[u8], golden_sun: bool) -> Result<Sample, FormatError> {
    require(data, WAVE_HEADER_LEN)?;
    let header = WaveHeader::read(&mut Cursor::new(data))?;
    let body = &data[WAVE_HEADER_LEN..];

    let mut sample = Sample::new(name);
    sample.sample_rate = header.sample_rate();

    if golden_sun && header.is_synth_stub() {
        require(body, SynthHeader::LEN)?;
        let synth = SynthHeader::read(&mut Cursor::new(body))?;
        sample.data = SampleData::Synth(synth.params()?);
        sample.looped = true;
        debug!("{name}: golden sun synth {:?}", synth.wave);
        return Ok(sample);
    }

    let frames = header.length as usize;
    sample.data = if header.compressed() {
        let bytes = frames.div_ceil(DPCM_BLOCK_FRAMES) * DPCM_BLOCK_BYTES;
        require(body, bytes)?;
        SampleData::Dpcm { data: body[..bytes].to_vec(), frames: header.length }
    } else {
        require(body, frames)?;
        SampleData::Pcm8(body[..frames].iter().map(|&b| b as i8).collect())
    };

    if header.looped() {
        if header.loop_start > header.length {
            return Err(FormatError::InvalidHeader("loop start past end of wave"));
        }
        sample = sample.looping(header.loop_start);
    }
    debug!(
        "{name}: {} frames at {} Hz{}",
        frames,
        sample.sample_rate,
        if sample.looped { ", looped" } else { "" }
    );
    Ok(sample)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(flags: u32, rate: u32, loop_start: u32, length: u32) -> Vec<u8> {
        [flags, rate * 1024, loop_start, length].iter().flat_map(|v| v.to_le_bytes()).collect()
    }

    #[test]
    fn reads_looped_pcm8() {
        let mut data = header(LOOP_FLAG, 13379, 2, 4);
        data.extend([0x10, 0xF0, 0x7F, 0x80]);
        let sample = load_mp2k_wave("loop", &data, false).unwrap();
        assert_eq!(sample.sample_rate, 13379);
        assert!(sample.has_loop());
        assert_eq!(sample.loop_start, 2);
        match sample.data {
            SampleData::Pcm8(pcm) => assert_eq!(pcm, vec![16, -16, 127, -128]),
            other => panic!("unexpected data {other:?}"),
        }
    }

    #[test]
    fn truncated_body_is_an_error() {
        let mut data = header(0, 8000, 0, 10);
        data.extend([0; 4]);
        let err = load_mp2k_wave("short", &data, false).unwrap_err();
        assert!(matches!(err, FormatError::UnexpectedEof { needed: 10, available: 4 }));
    }

    #[test]
    fn compressed_wave_keeps_whole_blocks() {
        let mut data = header(COMPRESSED_FLAG, 8000, 0, 70);
        data.extend(vec![0; DPCM_BLOCK_BYTES * 2]);
        let sample = load_mp2k_wave("dpcm", &data, false).unwrap();
        match sample.data {
            SampleData::Dpcm { data, frames } => {
                assert_eq!(frames, 70);
                assert_eq!(data.len(), DPCM_BLOCK_BYTES * 2);
            }
            other => panic!("unexpected data {other:?}"),
        }
    }

    #[test]
    fn golden_sun_synth_block() {
        let mut data = header(LOOP_FLAG, 0, 0, 0);
        data.extend([0, 1, 0x40, 0x02, 0, 0x10, 0, 0x08]);
        let sample = load_mp2k_wave("gs", &data, true).unwrap();
        let params = sample.synth().copied().unwrap();
        assert_eq!(params.wave, SynthWave::Saw);
        assert_eq!(params.initial_cycle, 0x40);
        assert_eq!(params.cycle_speed, 0x02);
        assert_eq!(params.cycle_amplitude, 0x10);
        assert_eq!(params.minimum_cycle, 0x08);
    }

    #[test]
    fn zero_length_without_golden_sun_is_empty_pcm() {
        let data = header(0, 8000, 0, 0);
        let sample = load_mp2k_wave("empty", &data, false).unwrap();
        assert!(sample.is_empty());
        assert!(sample.synth().is_none());
    }

    #[test]
    fn loop_past_end_rejected() {
        let mut data = header(LOOP_FLAG, 8000, 9, 4);
        data.extend([0; 4]);
        assert!(matches!(load_mp2k_wave("bad", &data, false), Err(FormatError::InvalidHeader(_))));
    }
}
