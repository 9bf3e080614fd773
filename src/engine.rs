//! The main entrypoint for controlling audio from gameplay code.
//!
//! In order to play audio, you'll need to create an [`AudioEngine`]. The
//! engine validates requests, hands them to the mixing thread and exposes
//! the playback flags the mixing thread reports back. Once the
//! [`AudioEngine`] is dropped, its audio output is stopped.

use std::sync::Arc;
use std::time::Duration;

use tracing::trace;

use crate::backend::{Backend, DefaultBackend};
use crate::command::{Command, CommandProducer, StateWriter, command_queue, state_writer_and_reader};
use crate::decoder::{DecoderFactory, SoundCategory};
use crate::error::PlayRequestError;
use crate::mailbox::{OutputConsumer, OutputMailbox};
use crate::renderer::{EngineShared, Renderer};
use crate::spatial::SpatialSnapshot;
use crate::thread::{MixerController, spawn_mixer};
use crate::voice::{PlaybackChannel, SoundSource};

/// Settings for an [`AudioEngine`].
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct EngineSettings {
    /// The maximum number of commands that can be queued up before new
    /// requests are dropped.
    pub command_capacity: usize,
    /// The maximum number of simultaneously playing voices.
    pub voice_capacity: usize,
    /// The number of stereo frames mixed per cycle. Also bounds how far a
    /// cache entry decodes ahead per cycle.
    pub cycle_frames: usize,
    /// The number of valid FM effect sound ids.
    pub effect_id_count: u16,
    /// The number of valid sampled sound ids.
    pub sampled_id_count: u16,
    /// The number of valid music track ids.
    pub music_id_count: u16,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            command_capacity: 128,
            voice_capacity: 32,
            cycle_frames: 512,
            effect_id_count: 100,
            sampled_id_count: 100,
            music_id_count: 32,
        }
    }
}

/// Controls audio from gameplay code.
pub struct AudioEngine<B: Backend = DefaultBackend> {
    commands: CommandProducer,
    snapshot: StateWriter<SpatialSnapshot>,
    shared: Arc<EngineShared>,
    settings: EngineSettings,
    // The mixer is declared before the backend so it stops producing blocks
    // before the output stream goes away.
    _mixer: MixerController,
    _backend: B,
}

impl<B: Backend> AudioEngine<B> {
    /// Creates a new [`AudioEngine`] that decodes sounds with decoders built
    /// by `factory`.
    pub fn new<F: DecoderFactory>(factory: F, settings: EngineSettings) -> Result<Self, B::Error> {
        let (mut backend, sample_rate) = B::setup()?;
        let shared = Arc::new(EngineShared::new());
        let mailbox = Arc::new(OutputMailbox::new());
        let (commands, command_consumer) = command_queue(settings.command_capacity);
        let (snapshot, snapshot_reader) = state_writer_and_reader();

        let renderer = Renderer::new(
            factory,
            &settings,
            sample_rate,
            command_consumer,
            snapshot_reader,
            mailbox.clone(),
            shared.clone(),
        );
        backend.start(OutputConsumer::new(mailbox, shared.clone()))?;

        let cycle = Duration::from_secs_f64(settings.cycle_frames as f64 / f64::from(sample_rate));
        let mixer = spawn_mixer(renderer, cycle);

        Ok(Self {
            commands,
            snapshot,
            shared,
            settings,
            _mixer: mixer,
            _backend: backend,
        })
    }

    /// Starts playing the music track `id`, replacing the current one. The
    /// track loops until it is stopped or replaced.
    pub fn play_music(&mut self, id: u16, data: Arc<[u8]>) -> bool {
        report(self.try_play_music(id, data))
    }

    /// Like [`play_music`](Self::play_music), but reports why a request was
    /// rejected or dropped.
    pub fn try_play_music(&mut self, id: u16, data: Arc<[u8]>) -> Result<(), PlayRequestError> {
        self.try_play(SoundCategory::Music, id, 0, data, SoundSource::Ambient, PlaybackChannel::Voice)
    }

    /// Requests playback of the FM effect `id` on the given source and
    /// channel. Returns `false` if the request was rejected or dropped.
    pub fn play_effect(&mut self, id: u16, priority: u32, data: Arc<[u8]>, source: SoundSource, channel: PlaybackChannel) -> bool {
        report(self.try_play_effect(id, priority, data, source, channel))
    }

    /// Like [`play_effect`](Self::play_effect), but reports why a request
    /// was rejected or dropped.
    pub fn try_play_effect(
        &mut self,
        id: u16,
        priority: u32,
        data: Arc<[u8]>,
        source: SoundSource,
        channel: PlaybackChannel,
    ) -> Result<(), PlayRequestError> {
        self.try_play(SoundCategory::FmEffect, id, priority, data, source, channel)
    }

    /// Requests playback of the sampled sound `id` on the given source and
    /// channel. Returns `false` if the request was rejected or dropped.
    pub fn play_sampled(&mut self, id: u16, priority: u32, data: Arc<[u8]>, source: SoundSource, channel: PlaybackChannel) -> bool {
        report(self.try_play_sampled(id, priority, data, source, channel))
    }

    /// Like [`play_sampled`](Self::play_sampled), but reports why a request
    /// was rejected or dropped.
    pub fn try_play_sampled(
        &mut self,
        id: u16,
        priority: u32,
        data: Arc<[u8]>,
        source: SoundSource,
        channel: PlaybackChannel,
    ) -> Result<(), PlayRequestError> {
        self.try_play(SoundCategory::Sampled, id, priority, data, source, channel)
    }

    /// Stops the music and discards its decoded samples.
    pub fn stop_music(&mut self) -> bool {
        self.commands.push(Command::StopMusic)
    }

    /// Stops every currently playing effect. The music keeps playing.
    pub fn stop_all_effects(&mut self) -> bool {
        self.commands.push(Command::StopAllEffects)
    }

    /// Publishes the listener pose and source positions the next mix cycle
    /// should spatialize against.
    pub fn set_spatial_snapshot(&self, snapshot: SpatialSnapshot) {
        self.snapshot.write(snapshot);
    }

    /// Mutes or unmutes the output without stopping any voice.
    pub fn set_muted(&self, muted: bool) {
        self.shared.set_muted(muted);
    }

    /// Sets the effect volume. Returns `false` for volumes outside of
    /// `0.0..=1.0`.
    pub fn set_effect_volume(&self, volume: f32) -> bool {
        if !(0.0..=1.0).contains(&volume) {
            return report(Err(PlayRequestError::InvalidVolume));
        }
        self.shared.set_effect_volume(volume);
        true
    }

    /// Sets the music volume. Returns `false` for volumes outside of
    /// `0.0..=1.0`.
    pub fn set_music_volume(&self, volume: f32) -> bool {
        if !(0.0..=1.0).contains(&volume) {
            return report(Err(PlayRequestError::InvalidVolume));
        }
        self.shared.set_music_volume(volume);
        true
    }

    /// Whether a music track is currently playing.
    #[must_use]
    pub fn is_music_playing(&self) -> bool {
        self.shared.music_playing()
    }

    /// Whether any effect voice is currently playing.
    #[must_use]
    pub fn is_any_effect_playing(&self) -> bool {
        self.shared.any_effect_playing()
    }

    /// Whether the listener's avatar is currently playing a sound on
    /// `channel`.
    #[must_use]
    pub fn is_channel_playing(&self, channel: PlaybackChannel) -> bool {
        self.shared.channel_bits() & channel.bit() != 0
    }

    fn try_play(
        &mut self,
        category: SoundCategory,
        id: u16,
        priority: u32,
        data: Arc<[u8]>,
        source: SoundSource,
        channel: PlaybackChannel,
    ) -> Result<(), PlayRequestError> {
        if data.is_empty() {
            return Err(PlayRequestError::EmptyData);
        }
        let id_count = match category {
            SoundCategory::Music => self.settings.music_id_count,
            SoundCategory::FmEffect => self.settings.effect_id_count,
            SoundCategory::Sampled => self.settings.sampled_id_count,
        };
        if id >= id_count {
            return Err(PlayRequestError::InvalidId { category, id });
        }
        let pushed = self.commands.push(Command::Play {
            category,
            id,
            priority,
            data,
            source,
            channel,
        });
        if pushed { Ok(()) } else { Err(PlayRequestError::QueueFull) }
    }
}

fn report(result: Result<(), PlayRequestError>) -> bool {
    match result {
        Ok(()) => true,
        Err(error) => {
            trace!(%error, "audio request rejected");
            false
        }
    }
}
