//! Playing sound instances and the play/stop policy.

use tracing::{trace, warn};

use crate::cache::CacheKey;
use crate::frame::Frame;

/// Where a sound is located in the world.
///
/// Positional sources are attenuated and panned relative to the listener;
/// ambient sources always play at full volume on both ears.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum SoundSource {
    /// A sound with no position, played at full volume on both ears.
    Ambient,
    /// A sound emitted by the actor with the given index. Index 0 is the
    /// listener's own avatar.
    Actor(u16),
    /// A sound emitted by the door with the given index.
    Door(u16),
    /// A sound emitted by the moving wall.
    Wall,
}

impl SoundSource {
    #[must_use]
    pub(crate) fn is_positional(self) -> bool {
        self != SoundSource::Ambient
    }

    /// Whether this source is the listener's own avatar. Only avatar voices
    /// contribute to the channel-active bitmask.
    #[must_use]
    pub(crate) fn is_avatar(self) -> bool {
        self == SoundSource::Actor(0)
    }
}

/// The playback channel a sound occupies on its source.
///
/// A source plays at most one sound per channel; a new request for an
/// occupied channel either steals it or is rejected based on priority.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum PlaybackChannel {
    /// Spoken lines and creature vocalizations.
    Voice,
    /// Weapon fire.
    Weapon,
    /// Item pickup and usage sounds.
    Item,
    /// Bumping into a wall.
    HitWall,
    /// The "blocked movement" feedback sound.
    NoWay,
    /// Interrogation and interaction sounds.
    Interrogation,
}

impl PlaybackChannel {
    #[must_use]
    pub(crate) fn bit(self) -> u8 {
        1 << self as u8
    }
}

/// One currently playing sound instance.
pub(crate) struct Voice {
    /// The cache entry this voice reads samples from.
    pub(crate) key: CacheKey,
    /// Higher values win when competing for the same source and channel.
    pub(crate) priority: u32,
    /// Private read position into the cache's decoded region.
    pub(crate) cursor: usize,
    pub(crate) source: SoundSource,
    pub(crate) channel: PlaybackChannel,
    /// The per-ear gains computed from the last spatial snapshot.
    pub(crate) gains: Frame,
}

/// The list of active voices and the policy for adding and removing them.
pub(crate) struct VoiceList {
    voices: Vec<Voice>,
    capacity: usize,
    channel_bits: u8,
}

impl VoiceList {
    #[must_use]
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            voices: Vec::with_capacity(capacity),
            capacity,
            channel_bits: 0,
        }
    }

    #[must_use]
    pub(crate) fn is_empty(&self) -> bool {
        self.voices.is_empty()
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.voices.len()
    }

    #[cfg(test)]
    pub(crate) fn iter(&self) -> impl Iterator<Item = &Voice> {
        self.voices.iter()
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = &mut Voice> {
        self.voices.iter_mut()
    }

    /// The channel-active bitmask for the listener's avatar.
    #[must_use]
    pub(crate) fn channel_bits(&self) -> u8 {
        self.channel_bits
    }

    #[must_use]
    pub(crate) fn music_playing(&self) -> bool {
        self.voices.iter().any(|voice| voice.key.category.is_music())
    }

    #[must_use]
    pub(crate) fn effect_count(&self) -> usize {
        self.voices
            .iter()
            .filter(|voice| !voice.key.category.is_music())
            .count()
    }

    /// Applies the play policy for a sound whose cache entry is ready.
    ///
    /// Music always displaces the previous music voice. A positional effect
    /// competing for an occupied (source, channel) slot is rejected when the
    /// occupant has strictly higher priority and steals the slot otherwise.
    /// Returns `true` if a new voice was inserted.
    pub(crate) fn handle_play(
        &mut self,
        key: CacheKey,
        priority: u32,
        source: SoundSource,
        channel: PlaybackChannel,
    ) -> bool {
        if key.category.is_music() {
            self.voices.retain(|voice| !voice.key.category.is_music());
        } else if source.is_positional() {
            let occupied_by_higher = self
                .voices
                .iter()
                .any(|voice| voice.source == source && voice.channel == channel && voice.priority > priority);
            if occupied_by_higher {
                trace!(?source, ?channel, priority, "play request lost to a higher priority voice");
                return false;
            }
            self.voices
                .retain(|voice| !(voice.source == source && voice.channel == channel));
        }

        if self.voices.len() == self.capacity {
            warn!(capacity = self.capacity, "voice list is full, dropping play request");
            self.rebuild_channel_bits();
            return false;
        }

        self.voices.push(Voice {
            key,
            priority,
            cursor: 0,
            source,
            channel,
            gains: Frame::ZERO,
        });
        self.rebuild_channel_bits();
        true
    }

    /// Removes the music voice, if any.
    pub(crate) fn remove_music(&mut self) {
        self.voices.retain(|voice| !voice.key.category.is_music());
        self.rebuild_channel_bits();
    }

    /// Removes every non-music voice.
    pub(crate) fn remove_effects(&mut self) {
        self.voices.retain(|voice| voice.key.category.is_music());
        self.rebuild_channel_bits();
    }

    /// Keeps only the voices for which `keep` returns `true`, then refreshes
    /// the channel-active bitmask.
    pub(crate) fn retain(&mut self, keep: impl FnMut(&mut Voice) -> bool) {
        self.voices.retain_mut(keep);
        self.rebuild_channel_bits();
    }

    fn rebuild_channel_bits(&mut self) {
        self.channel_bits = self
            .voices
            .iter()
            .filter(|voice| voice.source.is_avatar())
            .fold(0, |bits, voice| bits | voice.channel.bit());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::SoundCategory;

    fn effect_key(id: u16) -> CacheKey {
        CacheKey {
            category: SoundCategory::FmEffect,
            id,
        }
    }

    #[test]
    fn lower_priority_request_is_rejected() {
        let mut voices = VoiceList::new(8);
        let source = SoundSource::Actor(3);
        assert!(voices.handle_play(effect_key(1), 5, source, PlaybackChannel::Weapon));

        assert!(!voices.handle_play(effect_key(2), 3, source, PlaybackChannel::Weapon));

        assert_eq!(voices.len(), 1);
        let survivor = voices.iter().next().unwrap();
        assert_eq!(survivor.key, effect_key(1));
        assert_eq!(survivor.priority, 5);
    }

    #[test]
    fn higher_priority_request_steals_the_slot() {
        let mut voices = VoiceList::new(8);
        let source = SoundSource::Actor(3);
        assert!(voices.handle_play(effect_key(1), 5, source, PlaybackChannel::Weapon));

        assert!(voices.handle_play(effect_key(2), 7, source, PlaybackChannel::Weapon));

        assert_eq!(voices.len(), 1);
        let survivor = voices.iter().next().unwrap();
        assert_eq!(survivor.key, effect_key(2));
        assert_eq!(survivor.priority, 7);
    }

    #[test]
    fn equal_priority_request_steals_the_slot() {
        let mut voices = VoiceList::new(8);
        let source = SoundSource::Door(1);
        assert!(voices.handle_play(effect_key(1), 4, source, PlaybackChannel::Voice));
        assert!(voices.handle_play(effect_key(2), 4, source, PlaybackChannel::Voice));

        assert_eq!(voices.len(), 1);
        assert_eq!(voices.iter().next().unwrap().key, effect_key(2));
    }

    #[test]
    fn different_channels_do_not_compete() {
        let mut voices = VoiceList::new(8);
        let source = SoundSource::Actor(3);
        assert!(voices.handle_play(effect_key(1), 5, source, PlaybackChannel::Weapon));
        assert!(voices.handle_play(effect_key(2), 1, source, PlaybackChannel::Voice));

        assert_eq!(voices.len(), 2);
    }

    #[test]
    fn ambient_effects_do_not_steal() {
        let mut voices = VoiceList::new(8);
        assert!(voices.handle_play(effect_key(1), 5, SoundSource::Ambient, PlaybackChannel::Voice));
        assert!(voices.handle_play(effect_key(2), 1, SoundSource::Ambient, PlaybackChannel::Voice));

        assert_eq!(voices.len(), 2);
    }

    #[test]
    fn music_replaces_previous_music() {
        let mut voices = VoiceList::new(8);
        let music = |id| CacheKey {
            category: SoundCategory::Music,
            id,
        };
        assert!(voices.handle_play(music(0), 0, SoundSource::Ambient, PlaybackChannel::Voice));
        assert!(voices.handle_play(music(1), 0, SoundSource::Ambient, PlaybackChannel::Voice));

        assert_eq!(voices.len(), 1);
        assert_eq!(voices.iter().next().unwrap().key, music(1));
    }

    #[test]
    fn avatar_voices_set_channel_bits() {
        let mut voices = VoiceList::new(8);
        voices.handle_play(effect_key(1), 5, SoundSource::Actor(0), PlaybackChannel::Weapon);
        voices.handle_play(effect_key(2), 5, SoundSource::Actor(1), PlaybackChannel::Item);

        assert_eq!(voices.channel_bits(), PlaybackChannel::Weapon.bit());

        voices.remove_effects();
        assert_eq!(voices.channel_bits(), 0);
    }

    #[test]
    fn full_voice_list_rejects_new_requests() {
        let mut voices = VoiceList::new(2);
        assert!(voices.handle_play(effect_key(1), 1, SoundSource::Ambient, PlaybackChannel::Voice));
        assert!(voices.handle_play(effect_key(2), 1, SoundSource::Ambient, PlaybackChannel::Voice));
        assert!(!voices.handle_play(effect_key(3), 1, SoundSource::Ambient, PlaybackChannel::Voice));
        assert_eq!(voices.len(), 2);
    }
}
