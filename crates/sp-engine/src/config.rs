//! Engine family selection and session configuration.

/// Hard ceiling on the channel pool (PCM plus PSG units).
pub const MAX_CHANNELS: usize = 32;

/// Hard ceiling on tracks per session.
pub const MAX_TRACKS: usize = 256;

/// GBA frame rate: 16.78 MHz / 280896 cycles per frame.
pub const GBA_FRAME_RATE: f32 = 59.7275;

/// NDS sequencer tick rate: 33513982 Hz / (64 * 2728).
pub const NDS_TICK_RATE: f32 = 191.9567;

/// Sound engine family. Each family carries its own literal constants.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EngineKind {
    /// Nintendo "MusicPlayer2000" (Sappy) driver
    Mp2k,
    /// AlphaDream's GBA driver
    AlphaDream,
    /// NDS SDAT sequence player
    Sdat,
}

impl EngineKind {
    /// Legal range of the combined note + instrument pan.
    pub fn pan_range(self) -> (i32, i32) {
        match self {
            EngineKind::Mp2k | EngineKind::Sdat => (-64, 63),
            EngineKind::AlphaDream => (-128, 127),
        }
    }

    /// Clamp a combined pan to this engine's legal range.
    pub fn clamp_pan(self, pan: i32) -> i32 {
        let (lo, hi) = self.pan_range();
        pan.clamp(lo, hi)
    }
}

/// How PCM sources are read between sample positions.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Interpolation {
    /// Hardware behaviour: hold the current sample
    #[default]
    Nearest,
    /// Linear blend between neighbours (uncompressed PCM only)
    Linear,
}

/// Master fade curve.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FadeCurve {
    Linear,
    /// `position ^ (10/6)`, as the MP2K fader
    Power,
}

/// Configuration for one engine session.
#[derive(Clone, Debug)]
pub struct EngineConfig {
    pub kind: EngineKind,
    /// Output rate in Hz
    pub sample_rate: u32,
    /// The driver's own mixing rate. Fixed-frequency samples play at this
    /// rate whatever the output rate is.
    pub mixer_rate: u32,
    /// Frames per render call; also the envelope step granularity
    pub samples_per_buffer: usize,
    /// Sequencer ticks per second
    pub ticks_per_second: f32,
    /// Number of tracks
    pub tracks: usize,
    /// Number of pooled PCM channels (SDAT: hardware channels)
    pub pcm_channels: usize,
    /// PCM master gain (0.0-1.0)
    pub pcm_volume: f32,
    /// PSG master gain (0.0-1.0)
    pub psg_volume: f32,
    pub interpolation: Interpolation,
    pub fade_curve: FadeCurve,
}

impl EngineConfig {
    /// MP2K defaults: 13379 Hz, 12 PCM channels, 16 tracks.
    pub fn mp2k() -> Self {
        Self {
            kind: EngineKind::Mp2k,
            sample_rate: 13379,
            mixer_rate: 13379,
            samples_per_buffer: gba_buffer_size(13379),
            ticks_per_second: GBA_FRAME_RATE,
            tracks: 16,
            pcm_channels: 12,
            pcm_volume: 1.0,
            psg_volume: 1.0,
            interpolation: Interpolation::Nearest,
            fade_curve: FadeCurve::Power,
        }
    }

    /// AlphaDream defaults: same clock as MP2K, linear fader.
    pub fn alpha_dream() -> Self {
        Self {
            kind: EngineKind::AlphaDream,
            fade_curve: FadeCurve::Linear,
            ..Self::mp2k()
        }
    }

    /// SDAT defaults: 32728 Hz mixer, 16 hardware channels, 192 Hz ticks.
    pub fn sdat() -> Self {
        let sample_rate = 32728;
        Self {
            kind: EngineKind::Sdat,
            sample_rate,
            mixer_rate: sample_rate,
            samples_per_buffer: (sample_rate as f32 / NDS_TICK_RATE) as usize,
            ticks_per_second: NDS_TICK_RATE,
            tracks: 16,
            pcm_channels: 16,
            pcm_volume: 1.0,
            psg_volume: 1.0,
            interpolation: Interpolation::Nearest,
            fade_curve: FadeCurve::Linear,
        }
    }

    /// Change the output rate; the buffer size follows so that one render
    /// call still spans one engine tick. `mixer_rate` is left alone.
    pub fn with_sample_rate(mut self, sample_rate: u32) -> Self {
        self.sample_rate = sample_rate.max(1);
        let frames = self.sample_rate as f32 / self.ticks_per_second;
        self.samples_per_buffer = (frames as usize).max(1);
        self
    }

    /// Override the frames per render call.
    pub fn with_samples_per_buffer(mut self, frames: usize) -> Self {
        self.samples_per_buffer = frames.max(1);
        self
    }

    pub fn with_tracks(mut self, tracks: usize) -> Self {
        self.tracks = tracks.clamp(1, MAX_TRACKS);
        self
    }

    pub fn with_pcm_channels(mut self, channels: usize) -> Self {
        self.pcm_channels = channels;
        self
    }

    pub fn with_interpolation(mut self, interpolation: Interpolation) -> Self {
        self.interpolation = interpolation;
        self
    }

    pub fn with_volumes(mut self, pcm: f32, psg: f32) -> Self {
        self.pcm_volume = pcm.clamp(0.0, 1.0);
        self.psg_volume = psg.clamp(0.0, 1.0);
        self
    }

    /// PCM channels after applying the pool ceiling and reserved PSG units.
    pub fn pooled_channels(&self) -> usize {
        match self.kind {
            EngineKind::Mp2k => self.pcm_channels.clamp(1, MAX_CHANNELS - 4),
            EngineKind::AlphaDream => self.pcm_channels.clamp(1, MAX_CHANNELS - 3),
            EngineKind::Sdat => self.pcm_channels.clamp(1, 16),
        }
    }

    /// Tracks after applying the ceiling.
    pub fn track_count(&self) -> usize {
        self.tracks.clamp(1, MAX_TRACKS)
    }
}

/// Frames per GBA video frame at `sample_rate`.
fn gba_buffer_size(sample_rate: u32) -> usize {
    (sample_rate as f32 / GBA_FRAME_RATE + 0.5) as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mp2k_buffer_matches_driver_table() {
        assert_eq!(EngineConfig::mp2k().samples_per_buffer, 224);
        assert_eq!(EngineConfig::mp2k().with_sample_rate(5734).samples_per_buffer, 96);
    }

    #[test]
    fn sdat_buffer_spans_one_tick() {
        assert_eq!(EngineConfig::sdat().samples_per_buffer, 170);
    }

    #[test]
    fn pan_clamps_per_engine() {
        assert_eq!(EngineKind::Mp2k.clamp_pan(100), 63);
        assert_eq!(EngineKind::Mp2k.clamp_pan(-100), -64);
        assert_eq!(EngineKind::AlphaDream.clamp_pan(100), 100);
        assert_eq!(EngineKind::AlphaDream.clamp_pan(-200), -128);
    }

    #[test]
    fn pool_ceilings() {
        assert_eq!(EngineConfig::mp2k().with_pcm_channels(64).pooled_channels(), 28);
        assert_eq!(EngineConfig::sdat().with_pcm_channels(64).pooled_channels(), 16);
        assert_eq!(EngineConfig::mp2k().with_tracks(1000).track_count(), MAX_TRACKS);
    }
}
