//! VoicePool: fixed channel arena, allocation and voice stealing.
//!
//! Pooled channels are shared by every track. The GBA drivers additionally
//! own single PSG units that are never pooled; a note for one of those can
//! only take that exact unit.

use alloc::vec::Vec;
use core::cmp::Reverse;

use sp_ir::{Instrument, NoteInfo, Sample, VoiceKind};

use crate::channel::{Channel, Playback, RenderContext, TrackId};
use crate::config::{EngineConfig, EngineKind};
use crate::envelope::EnvelopeState;
use crate::track::Track;

/// Identifier for a channel slot in the pool.
pub type ChannelId = usize;

/// Which channels can play a voice.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VoiceClass {
    Pcm,
    Square1,
    Square2,
    Wave,
    Noise,
}

impl VoiceClass {
    pub fn of(kind: &VoiceKind) -> Self {
        match kind {
            VoiceKind::Pcm { .. } => VoiceClass::Pcm,
            VoiceKind::Square1 { .. } => VoiceClass::Square1,
            VoiceKind::Square2 { .. } => VoiceClass::Square2,
            VoiceKind::Wave { .. } => VoiceClass::Wave,
            VoiceKind::Noise { .. } => VoiceClass::Noise,
        }
    }

    fn mask(self) -> u8 {
        match self {
            VoiceClass::Pcm => ACCEPTS_PCM,
            VoiceClass::Square1 | VoiceClass::Square2 => ACCEPTS_SQUARE,
            VoiceClass::Wave => ACCEPTS_WAVE,
            VoiceClass::Noise => ACCEPTS_NOISE,
        }
    }
}

const ACCEPTS_PCM: u8 = 1 << 0;
const ACCEPTS_SQUARE: u8 = 1 << 1;
const ACCEPTS_WAVE: u8 = 1 << 2;
const ACCEPTS_NOISE: u8 = 1 << 3;

/// How a slot participates in allocation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Slot {
    /// Shared; accepts the classes in the mask.
    Pooled(u8),
    /// The one hardware unit for this class.
    Reserved(VoiceClass),
}

/// Fixed-size channel pool.
pub struct VoicePool {
    kind: EngineKind,
    channels: Vec<Channel>,
    slots: Vec<Slot>,
}

impl VoicePool {
    /// Build the pool layout for the configured engine.
    pub fn new(config: &EngineConfig) -> Self {
        let pooled = config.pooled_channels();
        let slots: Vec<Slot> = match config.kind {
            EngineKind::Mp2k => (0..pooled)
                .map(|_| Slot::Pooled(ACCEPTS_PCM))
                .chain([
                    Slot::Reserved(VoiceClass::Square1),
                    Slot::Reserved(VoiceClass::Square2),
                    Slot::Reserved(VoiceClass::Wave),
                    Slot::Reserved(VoiceClass::Noise),
                ])
                .collect(),
            EngineKind::AlphaDream => (0..pooled)
                .map(|_| Slot::Pooled(ACCEPTS_PCM))
                .chain([
                    Slot::Reserved(VoiceClass::Square1),
                    Slot::Reserved(VoiceClass::Square2),
                    Slot::Reserved(VoiceClass::Noise),
                ])
                .collect(),
            EngineKind::Sdat => (0..pooled)
                .map(|i| match i {
                    8..=13 => Slot::Pooled(ACCEPTS_PCM | ACCEPTS_SQUARE),
                    14..=15 => Slot::Pooled(ACCEPTS_PCM | ACCEPTS_NOISE),
                    _ => Slot::Pooled(ACCEPTS_PCM),
                })
                .collect(),
        };
        let channels = slots.iter().map(|_| Channel::new(config.kind)).collect();
        Self { kind: config.kind, channels, slots }
    }

    /// Number of channels, pooled and reserved.
    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    pub fn get(&self, id: ChannelId) -> Option<&Channel> {
        self.channels.get(id)
    }

    pub fn get_mut(&mut self, id: ChannelId) -> Option<&mut Channel> {
        self.channels.get_mut(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (ChannelId, &Channel)> {
        self.channels.iter().enumerate()
    }

    /// Channels with an owner and something left to play.
    pub fn active_count(&self) -> usize {
        self.channels.iter().filter(|c| !c.is_free()).count()
    }

    pub fn free_count(&self) -> usize {
        self.channels.iter().filter(|c| c.is_free()).count()
    }

    fn accepts(&self, id: ChannelId, class: VoiceClass) -> bool {
        matches!(self.slots[id], Slot::Pooled(mask) if mask & class.mask() != 0)
    }

    fn reserved_unit(&self, class: VoiceClass) -> Option<ChannelId> {
        self.slots.iter().position(|&s| s == Slot::Reserved(class))
    }

    /// Free for allocation. MP2K also recycles channels in their last step.
    fn is_reusable(&self, channel: &Channel) -> bool {
        channel.is_free()
            || (self.kind == EngineKind::Mp2k && channel.state() == EnvelopeState::Dying)
    }

    /// Visit order: descending owner index (free first), then pool index.
    fn order(&self, id: ChannelId) -> (Reverse<usize>, ChannelId) {
        let owner = self.channels[id].owner().filter(|_| !self.channels[id].is_free());
        (Reverse(owner.unwrap_or(usize::MAX)), id)
    }

    fn priority_of(&self, tracks: &[Track], id: ChannelId) -> u8 {
        self.channels[id]
            .owner()
            .and_then(|o| tracks.get(o))
            .map_or(0, |t| t.priority)
    }

    /// Pick a channel for a note of `class` on track `owner`, or `None` to
    /// drop the note.
    pub fn allocate(
        &self,
        tracks: &[Track],
        owner: TrackId,
        class: VoiceClass,
    ) -> Option<ChannelId> {
        let priority = tracks.get(owner).map_or(0, |t| t.priority);

        let gba = matches!(self.kind, EngineKind::Mp2k | EngineKind::AlphaDream);
        if gba && class != VoiceClass::Pcm {
            let id = self.reserved_unit(class)?;
            let channel = &self.channels[id];
            let yielding = channel.state() >= EnvelopeState::Releasing;
            return match channel.owner() {
                _ if self.is_reusable(channel) || yielding => Some(id),
                Some(o) if o == owner => Some(id),
                Some(o) if tracks.get(o).map_or(0, |t| t.priority) >= priority => None,
                _ => Some(id),
            };
        }

        let candidates = || (0..self.channels.len()).filter(move |&id| self.accepts(id, class));

        if let Some(id) = candidates()
            .filter(|&id| self.is_reusable(&self.channels[id]))
            .min_by_key(|&id| self.order(id))
        {
            return Some(id);
        }

        if let Some(id) = candidates()
            .filter(|&id| self.channels[id].state() >= EnvelopeState::Releasing)
            .min_by_key(|&id| self.order(id))
        {
            return Some(id);
        }

        // Lowest priority first; a lower-priority owner always yields, any
        // other owner only when its track index is not below the requester's.
        let victim =
            candidates().min_by_key(|&id| (self.priority_of(tracks, id), self.order(id)))?;
        let lower_priority = self.priority_of(tracks, victim) < priority;
        let later_track = self.channels[victim].owner().is_some_and(|o| o >= owner);
        (lower_priority || later_track).then_some(victim)
    }

    /// Start a note on channel `id`, moving it from its previous owner's
    /// list to `owner`'s.
    pub fn start(
        &mut self,
        tracks: &mut [Track],
        id: ChannelId,
        owner: TrackId,
        note: NoteInfo,
        instrument: &Instrument,
        sample: Option<&Sample>,
    ) {
        let Some(mix) = tracks.get(owner).map(Track::mix) else {
            return;
        };
        self.detach(tracks, id);
        if let Some(channel) = self.channels.get_mut(id) {
            channel.init(owner, note, instrument, sample, mix);
            tracks[owner].attach(id);
        }
    }

    fn detach(&mut self, tracks: &mut [Track], id: ChannelId) {
        let owner = self.channels.get(id).and_then(Channel::owner);
        if let Some(track) = owner.and_then(|o| tracks.get_mut(o)) {
            track.detach(id);
        }
    }

    pub fn release(&mut self, id: ChannelId) {
        if let Some(channel) = self.channels.get_mut(id) {
            channel.release();
        }
    }

    /// Silence a channel and unlink it from its track. Idempotent.
    pub fn stop(&mut self, tracks: &mut [Track], id: ChannelId) {
        self.detach(tracks, id);
        if let Some(channel) = self.channels.get_mut(id) {
            channel.stop();
        }
    }

    pub fn stop_all(&mut self, tracks: &mut [Track]) {
        for id in 0..self.channels.len() {
            self.stop(tracks, id);
        }
    }

    /// Process channel `id` into `out`; a finished channel is returned to
    /// the pool.
    pub fn process(
        &mut self,
        tracks: &mut [Track],
        id: ChannelId,
        out: &mut [f32],
        ctx: &RenderContext,
    ) {
        let Some(channel) = self.channels.get_mut(id) else {
            return;
        };
        if channel.process(out, ctx) == Playback::Finished {
            self.stop(tracks, id);
        }
    }

    /// Owner links agree in both directions.
    pub fn check_links(&self, tracks: &[Track]) -> bool {
        let owned_by = |id: ChannelId, track: TrackId| {
            self.channels.get(id).and_then(Channel::owner) == Some(track)
        };
        let forward = tracks.iter().all(|t| t.channels().iter().all(|&id| owned_by(id, t.index)));
        let backward = self.channels.iter().enumerate().all(|(id, c)| match c.owner() {
            Some(o) => tracks.get(o).is_some_and(|t| t.channels().contains(&id)),
            None => true,
        });
        forward && backward
    }
}
