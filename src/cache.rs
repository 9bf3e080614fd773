//! Per-sound decoded sample storage.
//!
//! Each (category, id) pair owns one cache entry holding the sound's decoder
//! and its append-only sample buffer. Decoding happens on demand in bounded
//! windows from the mixing context; the region below the decode frontier is
//! never rewritten, so any number of voices can read it at their own cursors.

use tracing::{trace, warn};

use crate::decoder::{Decoder, DecoderFactory, SoundCategory};

/// Identifies one cache entry.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub(crate) struct CacheKey {
    pub(crate) category: SoundCategory,
    pub(crate) id: u16,
}

/// The lazily decoded sample storage for one sound.
///
/// An entry is either inactive (never played), active and valid, or active
/// and invalid. Invalid is sticky: a sound that failed to initialize stays
/// rejected until its slot is explicitly reset.
struct CacheItem<D> {
    is_active: bool,
    is_invalid: bool,
    total_samples: usize,
    decoded_count: usize,
    samples: Vec<i16>,
    decoder: Option<D>,
}

impl<D> CacheItem<D> {
    fn empty() -> Self {
        Self {
            is_active: false,
            is_invalid: false,
            total_samples: 0,
            decoded_count: 0,
            samples: Vec::new(),
            decoder: None,
        }
    }

    fn is_playable(&self) -> bool {
        self.is_active && !self.is_invalid
    }
}

/// All cache entries, keyed by category and id.
///
/// Effect and sampled entries persist once created. The single music slot is
/// reset when the music stops or a different track starts, so music always
/// re-decodes from the beginning.
pub(crate) struct SoundCache<F: DecoderFactory> {
    factory: F,
    output_rate: u32,
    decode_window: usize,
    effects: Vec<CacheItem<F::Decoder>>,
    sampled: Vec<CacheItem<F::Decoder>>,
    music: CacheItem<F::Decoder>,
    music_id: Option<u16>,
}

impl<F: DecoderFactory> SoundCache<F> {
    #[must_use]
    pub(crate) fn new(
        factory: F,
        output_rate: u32,
        decode_window: usize,
        effect_count: u16,
        sampled_count: u16,
    ) -> Self {
        Self {
            factory,
            output_rate,
            decode_window,
            effects: (0..effect_count).map(|_| CacheItem::empty()).collect(),
            sampled: (0..sampled_count).map(|_| CacheItem::empty()).collect(),
            music: CacheItem::empty(),
            music_id: None,
        }
    }

    fn item(&self, key: CacheKey) -> Option<&CacheItem<F::Decoder>> {
        match key.category {
            SoundCategory::Music => Some(&self.music),
            SoundCategory::FmEffect => self.effects.get(key.id as usize),
            SoundCategory::Sampled => self.sampled.get(key.id as usize),
        }
    }

    fn item_mut(&mut self, key: CacheKey) -> Option<&mut CacheItem<F::Decoder>> {
        match key.category {
            SoundCategory::Music => Some(&mut self.music),
            SoundCategory::FmEffect => self.effects.get_mut(key.id as usize),
            SoundCategory::Sampled => self.sampled.get_mut(key.id as usize),
        }
    }

    /// Returns or creates the entry for `key`, reporting whether it is
    /// playable.
    ///
    /// Creation is all-or-nothing: if the decoder fails to initialize or
    /// reports an empty sound, the decoder is discarded and the entry is
    /// marked invalid, making every later request for this id a cheap reject.
    pub(crate) fn get_or_create(&mut self, key: CacheKey, data: &[u8]) -> bool {
        if key.category.is_music() && self.music_id != Some(key.id) {
            // A different track was requested, re-decode from scratch.
            self.reset_music();
            self.music_id = Some(key.id);
        }

        let output_rate = self.output_rate;
        match self.item(key) {
            None => {
                warn!(?key, "sound id is out of range for its category");
                return false;
            }
            Some(item) if item.is_active => return item.is_playable(),
            Some(_) => {}
        }

        let mut decoder = self.factory.create(key.category);
        let item = self.item_mut(key).expect("entry existed above");
        item.is_active = true;
        if !decoder.initialize(data, output_rate) {
            warn!(?key, "sound data failed to initialize, rejecting this id from now on");
            item.is_invalid = true;
            return false;
        }
        let total_samples = decoder.length_in_samples();
        if total_samples == 0 {
            warn!(?key, "sound decodes to zero samples, rejecting this id from now on");
            decoder.uninitialize();
            item.is_invalid = true;
            return false;
        }
        item.total_samples = total_samples;
        item.samples = vec![0; total_samples];
        item.decoder = Some(decoder);
        trace!(?key, total_samples, "created sound cache entry");
        true
    }

    /// Whether the entry for `key` exists and can produce samples.
    #[must_use]
    pub(crate) fn is_playable(&self, key: CacheKey) -> bool {
        self.item(key).is_some_and(CacheItem::is_playable)
    }

    /// The decoded samples, decode frontier and total length for `key`.
    #[must_use]
    pub(crate) fn view(&self, key: CacheKey) -> Option<(&[i16], usize, usize)> {
        let item = self.item(key)?;
        item.is_playable()
            .then_some((item.samples.as_slice(), item.decoded_count, item.total_samples))
    }

    /// Advances the decode frontier towards `up_to`, bounded by one decode
    /// window per call. A no-op when the frontier is already there, so voices
    /// sharing an entry can request overlapping regions freely.
    pub(crate) fn decode_ahead(&mut self, key: CacheKey, up_to: usize) {
        let window = self.decode_window;
        let Some(item) = self.item_mut(key) else { return };
        if !item.is_playable() {
            return;
        }
        let target = up_to.min(item.total_samples);
        if item.decoded_count >= target {
            return;
        }

        let request = (target - item.decoded_count).min(window);
        let decoder = item.decoder.as_mut().expect("playable entries own a decoder");
        let out = &mut item.samples[item.decoded_count..item.decoded_count + request];
        let written = decoder.decode(request, out);
        item.decoded_count += written.min(request);

        if written == 0 {
            // The decoder stalled short of its own reported length. Poison
            // the entry so its voices get dropped instead of hanging silent.
            warn!(?key, frontier = item.decoded_count, "decoder produced no samples, marking entry invalid");
            if let Some(mut decoder) = item.decoder.take() {
                decoder.uninitialize();
            }
            item.is_invalid = true;
        }
    }

    /// Clears the music slot so the next music request decodes from scratch.
    pub(crate) fn reset_music(&mut self) {
        if let Some(mut decoder) = self.music.decoder.take() {
            decoder.uninitialize();
        }
        self.music = CacheItem::empty();
        self.music_id = None;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use super::*;
    use crate::decoder::test_decoders::PulseFactory;

    const RATE: u32 = 44_100;

    fn sampled_key(id: u16) -> CacheKey {
        CacheKey {
            category: SoundCategory::Sampled,
            id,
        }
    }

    fn music_key(id: u16) -> CacheKey {
        CacheKey {
            category: SoundCategory::Music,
            id,
        }
    }

    #[test]
    fn bounded_decoding_accumulates_to_the_full_length() {
        let total = 1000;
        let window = 128;
        let factory = PulseFactory {
            sampled_length: total,
            ..PulseFactory::default()
        };
        let mut cache = SoundCache::new(factory, RATE, window, 4, 4);
        let key = sampled_key(0);
        assert!(cache.get_or_create(key, &[1, 2, 3]));

        let mut steps = 0;
        loop {
            let (_, decoded, total_samples) = cache.view(key).unwrap();
            if decoded == total_samples {
                break;
            }
            cache.decode_ahead(key, decoded + window);
            let (_, new_decoded, _) = cache.view(key).unwrap();
            assert!(new_decoded > decoded, "each call must make progress");
            assert!(new_decoded - decoded <= window);
            steps += 1;
        }
        assert_eq!(cache.view(key).unwrap().1, total);
        assert_eq!(steps, total.div_ceil(window));

        // Decoding everything in one request gives the same frontier.
        let factory = PulseFactory {
            sampled_length: total,
            ..PulseFactory::default()
        };
        let mut one_shot = SoundCache::new(factory, RATE, total, 4, 4);
        assert!(one_shot.get_or_create(key, &[1, 2, 3]));
        one_shot.decode_ahead(key, total);
        assert_eq!(one_shot.view(key).unwrap().1, total);
    }

    #[test]
    fn decode_ahead_is_idempotent_below_the_frontier() {
        let factory = PulseFactory::default();
        let mut cache = SoundCache::new(factory, RATE, 64, 4, 4);
        let key = sampled_key(1);
        assert!(cache.get_or_create(key, &[0]));

        cache.decode_ahead(key, 64);
        let frontier = cache.view(key).unwrap().1;
        cache.decode_ahead(key, 32);
        cache.decode_ahead(key, frontier);
        assert_eq!(cache.view(key).unwrap().1, frontier);
    }

    #[test]
    fn failed_initialization_is_sticky_and_does_not_retry() {
        let factory = PulseFactory::default();
        let created = factory.created.clone();
        let mut cache = SoundCache::new(factory, RATE, 64, 4, 4);
        let key = sampled_key(0);

        // Empty data makes the test decoder refuse to initialize.
        assert!(!cache.get_or_create(key, &[]));
        assert_eq!(created.load(Ordering::Relaxed), 1);

        // Valid data cannot revive the poisoned entry, and no new decoder is
        // constructed for it.
        assert!(!cache.get_or_create(key, &[1, 2, 3]));
        assert!(!cache.is_playable(key));
        assert_eq!(created.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn out_of_range_ids_are_rejected() {
        let factory = PulseFactory::default();
        let mut cache = SoundCache::new(factory, RATE, 64, 4, 4);
        assert!(!cache.get_or_create(sampled_key(4), &[1]));
    }

    #[test]
    fn music_slot_resets_for_replay_and_for_other_tracks() {
        let factory = PulseFactory::default();
        let mut cache = SoundCache::new(factory, RATE, 64, 4, 4);

        assert!(cache.get_or_create(music_key(0), &[1]));
        cache.decode_ahead(music_key(0), 64);
        assert_eq!(cache.view(music_key(0)).unwrap().1, 64);

        // Stopping the music clears the slot, replaying starts fresh.
        cache.reset_music();
        assert!(!cache.is_playable(music_key(0)));
        assert!(cache.get_or_create(music_key(0), &[1]));
        assert_eq!(cache.view(music_key(0)).unwrap().1, 0);

        // A different track also recreates the slot.
        cache.decode_ahead(music_key(0), 64);
        assert!(cache.get_or_create(music_key(1), &[1]));
        assert_eq!(cache.view(music_key(1)).unwrap().1, 0);
    }
}
