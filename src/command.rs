//! Cross-thread handoff between gameplay code and the mixing context.
//!
//! Play and stop requests travel through a bounded, non-blocking ring buffer.
//! The producer never waits for the mixing context: a full queue drops the
//! request, because stalling the simulation is worse than losing a sound
//! under extreme load.

use std::sync::{Arc, Mutex};

use rtrb::{Consumer, Producer, RingBuffer};

use crate::decoder::SoundCategory;
use crate::voice::{PlaybackChannel, SoundSource};

/// A request from gameplay code to the mixing context.
pub(crate) enum Command {
    /// Start playing a sound, creating its cache entry on first use.
    Play {
        category: SoundCategory,
        id: u16,
        priority: u32,
        data: Arc<[u8]>,
        source: SoundSource,
        channel: PlaybackChannel,
    },
    /// Stop the music voice and reset the music cache slot.
    StopMusic,
    /// Stop every non-music voice.
    StopAllEffects,
}

/// The producer half of the command queue.
pub(crate) struct CommandProducer(Producer<Command>);

impl CommandProducer {
    /// Enqueues a command without blocking. Returns `false` and drops the
    /// command if the queue is full.
    pub(crate) fn push(&mut self, command: Command) -> bool {
        self.0.push(command).is_ok()
    }
}

/// The consumer half of the command queue, owned by the mixing context.
pub(crate) struct CommandConsumer(Consumer<Command>);

impl CommandConsumer {
    #[must_use]
    pub(crate) fn pop(&mut self) -> Option<Command> {
        self.0.pop().ok()
    }
}

/// Creates a bounded command queue with room for `capacity` commands.
#[must_use]
pub(crate) fn command_queue(capacity: usize) -> (CommandProducer, CommandConsumer) {
    let (producer, consumer) = RingBuffer::new(capacity);
    (CommandProducer(producer), CommandConsumer(consumer))
}

/// Writes values that can be read by a [`StateReader`].
///
/// Only the latest value is kept; writing twice before a read replaces the
/// first value. Used for state where freshness matters more than history,
/// like the per-cycle spatial snapshot.
pub(crate) struct StateWriter<T: Send>(Arc<Mutex<Option<T>>>);

impl<T: Send> StateWriter<T> {
    /// Writes a new value, overwriting any previous value.
    pub(crate) fn write(&self, value: T) {
        self.0.lock().expect("state slot mutex poisoned").replace(value);
    }
}

/// Reads the latest value written to a [`StateWriter`].
pub(crate) struct StateReader<T: Send>(Arc<Mutex<Option<T>>>);

impl<T: Send> StateReader<T> {
    /// Returns the latest value, if a new one has been written.
    ///
    /// Uses `try_lock()` so the mixing context never blocks on the writer; a
    /// contended read simply returns `None` and the value is picked up on the
    /// next cycle.
    #[must_use]
    pub(crate) fn read(&self) -> Option<T> {
        self.0.try_lock().ok()?.take()
    }
}

/// Creates a state writer/reader pair.
#[must_use]
pub(crate) fn state_writer_and_reader<T: Send>() -> (StateWriter<T>, StateReader<T>) {
    let slot = Arc::new(Mutex::new(None));
    (StateWriter(Arc::clone(&slot)), StateReader(slot))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queue_rejects_pushes_beyond_capacity() {
        let capacity = 4;
        let (mut producer, mut consumer) = command_queue(capacity);

        for _ in 0..capacity {
            assert!(producer.push(Command::StopMusic));
        }
        assert!(!producer.push(Command::StopMusic));

        assert!(consumer.pop().is_some());
        assert!(producer.push(Command::StopMusic));
    }

    #[test]
    fn queue_is_first_in_first_out() {
        let (mut producer, mut consumer) = command_queue(8);
        producer.push(Command::StopAllEffects);
        producer.push(Command::StopMusic);

        assert!(matches!(consumer.pop(), Some(Command::StopAllEffects)));
        assert!(matches!(consumer.pop(), Some(Command::StopMusic)));
        assert!(consumer.pop().is_none());
    }

    #[test]
    fn state_slot_keeps_only_the_latest_value() {
        let (writer, reader) = state_writer_and_reader();
        writer.write(1);
        writer.write(2);

        assert_eq!(reader.read(), Some(2));
        assert_eq!(reader.read(), None);
    }
}
