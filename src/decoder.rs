//! The contract between the engine and the sound decoders.
//!
//! The engine does not know how to turn FM register dumps or compressed PCM
//! into samples. Each sound category is backed by a decoder the application
//! provides through a [`DecoderFactory`]. A factory usually returns a closed
//! enum over its concrete decoder kinds, so the engine stays free of open
//! virtual dispatch and every cache entry owns exactly one decoder instance.

/// The categories of sound data the engine can play.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum SoundCategory {
    /// FM-synthesized background music. Only one music voice exists at a
    /// time and it loops until stopped or replaced.
    Music,
    /// A short FM-synthesized sound effect.
    FmEffect,
    /// A sampled (PCM) sound effect.
    Sampled,
}

/// Synthesized output has a much lower raw amplitude than sampled audio, so
/// FM categories are boosted before accumulation.
const FM_AMPLITUDE_SCALE: f32 = 6.0;

impl SoundCategory {
    /// Whether this category follows the single-slot music semantics.
    #[must_use]
    pub(crate) fn is_music(self) -> bool {
        self == SoundCategory::Music
    }

    /// The amplitude boost applied to samples of this category during mixing.
    #[must_use]
    pub(crate) fn amplitude_scale(self) -> f32 {
        match self {
            SoundCategory::Music | SoundCategory::FmEffect => FM_AMPLITUDE_SCALE,
            SoundCategory::Sampled => 1.0,
        }
    }
}

/// A stateful, incremental sound decoder.
///
/// Decoders are owned exclusively by their cache entry and are only driven
/// from the mixing context, so implementations never need interior
/// mutability. All methods must be cheap enough to call from a real-time
/// context; in particular [`decode`](Decoder::decode) is called with small
/// bounded windows rather than whole sounds.
pub trait Decoder: Send {
    /// Prepares the decoder to produce samples at `output_rate` Hz from the
    /// given raw sound data. Returns `false` if the data is unusable.
    fn initialize(&mut self, data: &[u8], output_rate: u32) -> bool;

    /// Decodes up to `max_samples` further samples into `out`, returning how
    /// many were actually written. `out` is at least `max_samples` long.
    fn decode(&mut self, max_samples: usize, out: &mut [i16]) -> usize;

    /// Resets the decoder to the beginning of the sound. Returns `false` if
    /// the decoder cannot rewind.
    fn rewind(&mut self) -> bool;

    /// Releases any resources held by the decoder. Called before the decoder
    /// is discarded.
    fn uninitialize(&mut self);

    /// The total number of samples this sound decodes to. Only valid after a
    /// successful [`initialize`](Decoder::initialize).
    fn length_in_samples(&self) -> usize;
}

/// Creates decoder instances for the engine, keyed by sound category.
pub trait DecoderFactory: Send + 'static {
    /// The decoder type produced by this factory, typically an enum over the
    /// application's concrete decoders.
    type Decoder: Decoder;

    /// Creates a fresh, uninitialized decoder for the given category.
    fn create(&self, category: SoundCategory) -> Self::Decoder;
}

#[cfg(test)]
pub(crate) mod test_decoders {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::{Decoder, DecoderFactory, SoundCategory};

    /// Decodes to `length` samples of a constant `amplitude`, regardless of
    /// the input bytes. Initialization fails on empty data.
    pub(crate) struct PulseDecoder {
        pub(crate) length: usize,
        pub(crate) amplitude: i16,
        pub(crate) position: usize,
        pub(crate) initialized: bool,
    }

    impl Decoder for PulseDecoder {
        fn initialize(&mut self, data: &[u8], _output_rate: u32) -> bool {
            self.initialized = !data.is_empty();
            self.initialized
        }

        fn decode(&mut self, max_samples: usize, out: &mut [i16]) -> usize {
            if !self.initialized {
                return 0;
            }
            let remaining = self.length.saturating_sub(self.position);
            let count = remaining.min(max_samples);
            out[..count].fill(self.amplitude);
            self.position += count;
            count
        }

        fn rewind(&mut self) -> bool {
            self.position = 0;
            true
        }

        fn uninitialize(&mut self) {
            self.initialized = false;
        }

        fn length_in_samples(&self) -> usize {
            self.length
        }
    }

    /// Produces [`PulseDecoder`]s with per-category lengths and amplitudes.
    /// Counts how many decoders were created so tests can verify that sticky
    /// failures do not retry decoder construction.
    pub(crate) struct PulseFactory {
        pub(crate) music_length: usize,
        pub(crate) effect_length: usize,
        pub(crate) sampled_length: usize,
        pub(crate) amplitude: i16,
        pub(crate) created: Arc<AtomicUsize>,
    }

    impl Default for PulseFactory {
        fn default() -> Self {
            Self {
                music_length: 2048,
                effect_length: 512,
                sampled_length: 512,
                amplitude: 1000,
                created: Arc::new(AtomicUsize::new(0)),
            }
        }
    }

    impl DecoderFactory for PulseFactory {
        type Decoder = PulseDecoder;

        fn create(&self, category: SoundCategory) -> PulseDecoder {
            self.created.fetch_add(1, Ordering::Relaxed);
            let length = match category {
                SoundCategory::Music => self.music_length,
                SoundCategory::FmEffect => self.effect_length,
                SoundCategory::Sampled => self.sampled_length,
            };
            PulseDecoder {
                length,
                amplitude: self.amplitude,
                position: 0,
                initialized: false,
            }
        }
    }
}
