//! Plays audio using [cpal](https://crates.io/crates/cpal).

use std::error::Error as StdError;
use std::fmt::Display;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{BufferSize, BuildStreamError, Device, PlayStreamError, SampleRate, StreamConfig};
use rtrb::RingBuffer;
use tracing::error;

use crate::backend::Backend;
use crate::mailbox::OutputConsumer;

const CHECK_STREAM_INTERVAL: Duration = Duration::from_millis(500);

/// Errors that can occur when using the cpal backend.
#[derive(Debug)]
pub enum Error {
    /// A default audio output device could not be determined.
    NoDefaultOutputDevice,
    /// An error occurred when building the audio stream.
    BuildStreamError(BuildStreamError),
    /// An error occurred when starting the audio stream.
    PlayStreamError(PlayStreamError),
}

impl Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::NoDefaultOutputDevice => f.write_str("Cannot find the default audio output device"),
            Error::BuildStreamError(error) => error.fmt(f),
            Error::PlayStreamError(error) => error.fmt(f),
        }
    }
}

impl StdError for Error {}

impl From<BuildStreamError> for Error {
    fn from(error: BuildStreamError) -> Self {
        Self::BuildStreamError(error)
    }
}

impl From<PlayStreamError> for Error {
    fn from(error: PlayStreamError) -> Self {
        Self::PlayStreamError(error)
    }
}

enum State {
    Uninitialized { device: Device, config: StreamConfig },
    Initialized { should_drop: Arc<AtomicBool> },
}

/// A backend that uses [cpal](https://crates.io/crates/cpal) to connect an
/// [`OutputConsumer`] to the operating system's audio driver.
pub struct CpalBackend {
    state: Option<State>,
}

impl Backend for CpalBackend {
    type Error = Error;

    fn setup() -> Result<(Self, u32), Self::Error> {
        let host = cpal::default_host();
        let device = host.default_output_device().ok_or(Error::NoDefaultOutputDevice)?;
        // We don't use the default stream configuration. Sounds are decoded
        // for one fixed output rate, so the stream has to run at that rate.
        // Stereo with 48 kHz should be supported by any device and is the
        // standard for many operating systems.
        let config = StreamConfig {
            channels: 2,
            sample_rate: SampleRate(48_000),
            buffer_size: BufferSize::Fixed(1200),
        };
        let sample_rate = config.sample_rate.0;

        Ok((
            Self {
                state: Some(State::Uninitialized { device, config }),
            },
            sample_rate,
        ))
    }

    fn start(&mut self, output: OutputConsumer) -> Result<(), Self::Error> {
        let Some(State::Uninitialized { device, config }) = self.state.take() else {
            panic!("cannot start the cpal backend multiple times")
        };

        let should_drop = Arc::new(AtomicBool::new(false));
        let should_drop_clone = should_drop.clone();

        // The stream is not `Send` on every platform, so a dedicated thread
        // builds it, owns it and drops it.
        let (mut initial_result_producer, mut initial_result_consumer) = RingBuffer::new(1);
        std::thread::spawn(move || {
            let stream = build_stream(&device, &config, output);
            let stream = match stream {
                Ok(stream) => {
                    let _ = initial_result_producer.push(Ok(()));
                    stream
                }
                Err(err) => {
                    let _ = initial_result_producer.push(Err(err));
                    return;
                }
            };
            while !should_drop.load(Ordering::SeqCst) {
                std::thread::sleep(CHECK_STREAM_INTERVAL);
            }
            drop(stream);
        });

        loop {
            if let Ok(result) = initial_result_consumer.pop() {
                result?;
                break;
            }
            std::thread::sleep(Duration::from_micros(100));
        }

        self.state = Some(State::Initialized {
            should_drop: should_drop_clone,
        });
        Ok(())
    }
}

impl Drop for CpalBackend {
    fn drop(&mut self) {
        if let Some(State::Initialized { should_drop }) = &self.state {
            should_drop.store(true, Ordering::SeqCst);
        }
    }
}

fn build_stream(device: &Device, config: &StreamConfig, mut output: OutputConsumer) -> Result<cpal::Stream, Error> {
    let stream = device.build_output_stream(
        config,
        move |data: &mut [f32], _| {
            output.fill(data);
        },
        move |stream_error| {
            error!(%stream_error, "audio stream error");
        },
        None,
    )?;
    stream.play()?;
    Ok(stream)
}
