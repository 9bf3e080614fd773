//! A real-time audio engine for a 2D game.
//!
//! Gameplay code creates an [`AudioEngine`] and sends it play and stop
//! requests together with a per-tick [`SpatialSnapshot`] of the world. A
//! dedicated mixing thread decodes sounds on demand through the
//! [`DecoderFactory`] the game provides, spatializes every voice against
//! the listener, normalizes the mix per ear and hands finished stereo
//! blocks to the audio backend.
#![forbid(missing_docs)]

pub mod backend;
mod cache;
mod command;
mod decoder;
mod engine;
mod error;
mod frame;
mod mailbox;
mod renderer;
mod spatial;
mod thread;
mod voice;

pub use decoder::{Decoder, DecoderFactory, SoundCategory};
pub use engine::{AudioEngine, EngineSettings};
pub use error::PlayRequestError;
pub use mailbox::OutputConsumer;
pub use spatial::{ListenerPose, SpatialSnapshot};
pub use voice::{PlaybackChannel, SoundSource};
