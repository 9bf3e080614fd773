//! The dedicated mixing thread.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use tracing::debug;

use crate::decoder::DecoderFactory;
use crate::renderer::Renderer;

/// How long the mixing thread sleeps between cycles when no voice is active.
const IDLE_BACKOFF: Duration = Duration::from_millis(2);

/// Owns the mixing thread and stops it on drop.
pub(crate) struct MixerController {
    should_stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl MixerController {
    fn stop(&mut self) {
        self.should_stop.store(true, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for MixerController {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Spawns the mixing thread.
///
/// The thread runs one [`Renderer::process_cycle`] per `cycle` period,
/// subtracting the time the cycle itself took from the sleep so block
/// production keeps pace with playback. While no voice is active it drops to
/// a short fixed backoff instead.
pub(crate) fn spawn_mixer<F: DecoderFactory>(mut renderer: Renderer<F>, cycle: Duration) -> MixerController {
    let should_stop = Arc::new(AtomicBool::new(false));
    let stop_flag = Arc::clone(&should_stop);

    let handle = std::thread::Builder::new()
        .name("audio-mixer".to_owned())
        .spawn(move || {
            debug!(?cycle, "mixing thread started");
            while !stop_flag.load(Ordering::Acquire) {
                let cycle_start = Instant::now();
                if renderer.process_cycle() {
                    std::thread::sleep(cycle.saturating_sub(cycle_start.elapsed()));
                } else {
                    std::thread::sleep(IDLE_BACKOFF);
                }
            }
            debug!("mixing thread stopped");
        })
        .expect("failed to spawn the mixing thread");

    MixerController {
        should_stop,
        handle: Some(handle),
    }
}
