//! Communication between the audio engine and the low-level audio API.

pub mod cpal;

use crate::mailbox::OutputConsumer;

/// The default backend used by [`AudioEngine`](crate::AudioEngine)s.
pub type DefaultBackend = cpal::CpalBackend;

/// Connects an [`OutputConsumer`] to a lower level audio API.
pub trait Backend: Sized {
    /// Errors that can occur when using this backend.
    type Error;

    /// Starts the backend and returns itself and the output sample rate.
    fn setup() -> Result<(Self, u32), Self::Error>;

    /// Sends the output consumer to the backend to start audio playback.
    fn start(&mut self, output: OutputConsumer) -> Result<(), Self::Error>;
}
