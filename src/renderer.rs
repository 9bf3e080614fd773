//! The mixing context.
//!
//! Once per cycle the renderer drains pending commands, refreshes the
//! spatial snapshot, advances decoding for every active voice, accumulates
//! the voices into a stereo floating-point buffer, normalizes each ear
//! independently and publishes the finished `i16` block to the output
//! mailbox. It is the only writer of the cache and the voice list, so none
//! of that state needs locking.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicU32, Ordering};

use tracing::trace;

use crate::cache::{CacheKey, SoundCache};
use crate::command::{Command, CommandConsumer, StateReader};
use crate::decoder::DecoderFactory;
use crate::engine::EngineSettings;
use crate::frame::Frame;
use crate::mailbox::OutputMailbox;
use crate::spatial::{AttenuationTable, SpatialSnapshot};
use crate::voice::VoiceList;

/// State shared between the engine handle, the mixing context and the
/// output callback.
///
/// Playback flags are written by the mixing context with release ordering
/// and read by gameplay code with acquire ordering. Volumes and mute travel
/// the other way.
pub(crate) struct EngineShared {
    music_playing: AtomicBool,
    any_effect_playing: AtomicBool,
    channel_bits: AtomicU8,
    muted: AtomicBool,
    effect_volume: AtomicU32,
    music_volume: AtomicU32,
}

impl EngineShared {
    #[must_use]
    pub(crate) fn new() -> Self {
        Self {
            music_playing: AtomicBool::new(false),
            any_effect_playing: AtomicBool::new(false),
            channel_bits: AtomicU8::new(0),
            muted: AtomicBool::new(false),
            effect_volume: AtomicU32::new(1.0f32.to_bits()),
            music_volume: AtomicU32::new(1.0f32.to_bits()),
        }
    }

    #[must_use]
    pub(crate) fn music_playing(&self) -> bool {
        self.music_playing.load(Ordering::Acquire)
    }

    #[must_use]
    pub(crate) fn any_effect_playing(&self) -> bool {
        self.any_effect_playing.load(Ordering::Acquire)
    }

    #[must_use]
    pub(crate) fn channel_bits(&self) -> u8 {
        self.channel_bits.load(Ordering::Acquire)
    }

    #[must_use]
    pub(crate) fn muted(&self) -> bool {
        self.muted.load(Ordering::Acquire)
    }

    pub(crate) fn set_muted(&self, muted: bool) {
        self.muted.store(muted, Ordering::Release);
    }

    #[must_use]
    pub(crate) fn effect_volume(&self) -> f32 {
        f32::from_bits(self.effect_volume.load(Ordering::Acquire))
    }

    pub(crate) fn set_effect_volume(&self, volume: f32) {
        self.effect_volume.store(volume.to_bits(), Ordering::Release);
    }

    #[must_use]
    pub(crate) fn music_volume(&self) -> f32 {
        f32::from_bits(self.music_volume.load(Ordering::Acquire))
    }

    pub(crate) fn set_music_volume(&self, volume: f32) {
        self.music_volume.store(volume.to_bits(), Ordering::Release);
    }
}

/// Mixes all active voices into periodic stereo output blocks.
pub(crate) struct Renderer<F: DecoderFactory> {
    cache: SoundCache<F>,
    voices: VoiceList,
    commands: CommandConsumer,
    snapshot_reader: StateReader<SpatialSnapshot>,
    snapshot: SpatialSnapshot,
    attenuation: AttenuationTable,
    accumulator: Vec<Frame>,
    block: Vec<i16>,
    mailbox: Arc<OutputMailbox>,
    shared: Arc<EngineShared>,
    cycle_frames: usize,
}

impl<F: DecoderFactory> Renderer<F> {
    #[must_use]
    pub(crate) fn new(
        factory: F,
        settings: &EngineSettings,
        output_rate: u32,
        commands: CommandConsumer,
        snapshot_reader: StateReader<SpatialSnapshot>,
        mailbox: Arc<OutputMailbox>,
        shared: Arc<EngineShared>,
    ) -> Self {
        Self {
            cache: SoundCache::new(
                factory,
                output_rate,
                settings.cycle_frames,
                settings.effect_id_count,
                settings.sampled_id_count,
            ),
            voices: VoiceList::new(settings.voice_capacity),
            commands,
            snapshot_reader,
            snapshot: SpatialSnapshot::default(),
            attenuation: AttenuationTable::new(),
            accumulator: vec![Frame::ZERO; settings.cycle_frames],
            block: Vec::with_capacity(settings.cycle_frames * 2),
            mailbox,
            shared,
            cycle_frames: settings.cycle_frames,
        }
    }

    #[cfg(test)]
    pub(crate) fn voices(&self) -> &VoiceList {
        &self.voices
    }

    /// Runs one mix cycle. Returns `false` when there was nothing to mix, so
    /// the caller can back off instead of spinning.
    pub(crate) fn process_cycle(&mut self) -> bool {
        self.drain_commands();
        if let Some(snapshot) = self.snapshot_reader.read() {
            self.snapshot = snapshot;
        }
        if self.voices.is_empty() {
            self.publish_flags();
            return false;
        }

        for voice in self.voices.iter_mut() {
            voice.gains = if voice.key.category.is_music() {
                // Music is not part of the world, it always plays centered.
                Frame::from_mono(1.0)
            } else {
                self.attenuation.spatialize(&self.snapshot, voice.source)
            };
        }

        let cycle_frames = self.cycle_frames;
        let effect_volume = self.shared.effect_volume();
        let music_volume = self.shared.music_volume();
        self.accumulator.fill(Frame::ZERO);

        let cache = &mut self.cache;
        let accumulator = &mut self.accumulator;
        self.voices.retain(|voice| {
            if !cache.is_playable(voice.key) {
                return false;
            }
            cache.decode_ahead(voice.key, voice.cursor + cycle_frames);
            let Some((samples, frontier, total)) = cache.view(voice.key) else {
                // Decoding just poisoned the entry.
                return false;
            };

            let volume = if voice.key.category.is_music() { music_volume } else { effect_volume };
            let scale = voice.key.category.amplitude_scale() * volume;
            let mut frame_index = 0;
            while frame_index < cycle_frames && voice.cursor < frontier {
                let sample = f32::from(samples[voice.cursor]) * scale;
                accumulator[frame_index] += Frame::new(sample * voice.gains.left, sample * voice.gains.right);
                voice.cursor += 1;
                frame_index += 1;
            }

            if voice.cursor == total {
                if voice.key.category.is_music() {
                    voice.cursor = 0;
                    true
                } else {
                    false
                }
            } else {
                true
            }
        });

        let left_scale = normalization_scale(self.accumulator.iter().map(|frame| frame.left));
        let right_scale = normalization_scale(self.accumulator.iter().map(|frame| frame.right));

        self.block.clear();
        for frame in &self.accumulator {
            self.block.push(quantize(frame.left * left_scale));
            self.block.push(quantize(frame.right * right_scale));
        }
        self.mailbox.publish(&self.block);

        self.publish_flags();
        true
    }

    fn drain_commands(&mut self) {
        while let Some(command) = self.commands.pop() {
            match command {
                Command::Play {
                    category,
                    id,
                    priority,
                    data,
                    source,
                    channel,
                } => {
                    let key = CacheKey { category, id };
                    if !self.cache.get_or_create(key, &data) {
                        trace!(?key, "rejecting play request for an unplayable sound");
                        continue;
                    }
                    self.voices.handle_play(key, priority, source, channel);
                }
                Command::StopMusic => {
                    self.voices.remove_music();
                    self.cache.reset_music();
                }
                Command::StopAllEffects => self.voices.remove_effects(),
            }
        }
    }

    fn publish_flags(&self) {
        self.shared.music_playing.store(self.voices.music_playing(), Ordering::Release);
        self.shared
            .any_effect_playing
            .store(self.voices.effect_count() > 0, Ordering::Release);
        self.shared.channel_bits.store(self.voices.channel_bits(), Ordering::Release);
    }
}

/// The factor that brings a channel's most extreme excursion exactly onto
/// the `i16` boundary it violates, or `1.0` if the channel fits.
///
/// Each ear is normalized on its own; a loud left channel never dims the
/// right one.
pub(crate) fn normalization_scale(samples: impl Iterator<Item = f32>) -> f32 {
    let mut most_negative = 0.0f32;
    let mut most_positive = 0.0f32;
    for sample in samples {
        most_negative = most_negative.min(sample);
        most_positive = most_positive.max(sample);
    }
    let negative_excess = most_negative / f32::from(i16::MIN);
    let positive_excess = most_positive / f32::from(i16::MAX);
    let worst = negative_excess.max(positive_excess);
    if worst > 1.0 { 1.0 / worst } else { 1.0 }
}

fn quantize(sample: f32) -> i16 {
    sample.round().clamp(f32::from(i16::MIN), f32::from(i16::MAX)) as i16
}
