//! Voice core for the sapphire handheld sound engines.
//!
//! Reproduces the mixing behaviour of the GBA MP2K and AlphaDream drivers and
//! the NDS SDAT player: integer envelopes, fixed-point pitch, a fixed channel
//! pool with voice stealing, and a per-buffer mixer with master fades.
//!
//! The render path never allocates; everything is sized when the
//! [`Engine`] is created.

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

mod channel;
mod config;
mod engine;
mod envelope;
mod fade;
mod frame;
pub mod frequency;
mod mixer;
mod track;
mod voice_pool;
pub mod waveform;

pub use channel::{Channel, Playback, RenderContext, TrackId, TrackMix};
pub use config::{EngineConfig, EngineKind, FadeCurve, Interpolation, MAX_CHANNELS, MAX_TRACKS};
pub use engine::Engine;
pub use envelope::{CgbEnvelope, DecibelEnvelope, Envelope, EnvelopeState, LinearEnvelope};
pub use fade::{Fade, FadeDirection};
pub use frame::Frame;
pub use mixer::Mixer;
pub use track::{Lfo, LfoTarget, Track};
pub use voice_pool::{ChannelId, VoiceClass, VoicePool};
