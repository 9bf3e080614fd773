//! Handoff of finished output blocks to the audio device.
//!
//! The mixing context and the device callback meet at a single-slot mailbox:
//! publishing overwrites whatever block is still sitting there, so the device
//! always hears the freshest mix instead of working through a backlog. The
//! consumer side never blocks the device callback.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use crate::renderer::EngineShared;

/// A single-slot, overwrite-on-publish handoff for interleaved `i16` blocks.
pub(crate) struct OutputMailbox {
    block: Mutex<Vec<i16>>,
    available: AtomicBool,
}

impl OutputMailbox {
    #[must_use]
    pub(crate) fn new() -> Self {
        Self {
            block: Mutex::new(Vec::new()),
            available: AtomicBool::new(false),
        }
    }

    /// Publishes a finished block, overwriting any unconsumed one.
    pub(crate) fn publish(&self, samples: &[i16]) {
        let mut slot = self.block.lock().expect("output mailbox mutex poisoned");
        slot.clear();
        slot.extend_from_slice(samples);
        drop(slot);
        self.available.store(true, Ordering::Release);
    }

    /// Swaps `buffer` with the published block if one is available.
    ///
    /// Uses `try_lock()` so a real-time caller is never blocked by a publish
    /// in progress; a contended exchange just fails and gets retried on the
    /// next callback.
    pub(crate) fn try_exchange(&self, buffer: &mut Vec<i16>) -> bool {
        if !self.available.load(Ordering::Acquire) {
            return false;
        }
        let Ok(mut slot) = self.block.try_lock() else {
            return false;
        };
        std::mem::swap(buffer, &mut *slot);
        self.available.store(false, Ordering::Release);
        true
    }
}

/// The pull side of the output path, owned by the device callback.
///
/// Feeds the device from the most recently published block, converting to
/// `f32`, and emits silence while muted or when no block is available.
pub struct OutputConsumer {
    mailbox: Arc<OutputMailbox>,
    shared: Arc<EngineShared>,
    current: Vec<i16>,
    position: usize,
}

impl OutputConsumer {
    #[must_use]
    pub(crate) fn new(mailbox: Arc<OutputMailbox>, shared: Arc<EngineShared>) -> Self {
        Self {
            mailbox,
            shared,
            current: Vec::new(),
            position: 0,
        }
    }

    /// Fills `out` with interleaved stereo samples.
    pub fn fill(&mut self, out: &mut [f32]) {
        if self.shared.muted() {
            out.fill(0.0);
            return;
        }

        let mut written = 0;
        while written < out.len() {
            if self.position == self.current.len() {
                self.current.clear();
                self.position = 0;
                if !self.mailbox.try_exchange(&mut self.current) {
                    break;
                }
            }
            let remaining = &self.current[self.position..];
            let count = remaining.len().min(out.len() - written);
            for (target, sample) in out[written..written + count].iter_mut().zip(remaining) {
                *target = f32::from(*sample) / 32_768.0;
            }
            self.position += count;
            written += count;
        }
        out[written..].fill(0.0);
    }
}
