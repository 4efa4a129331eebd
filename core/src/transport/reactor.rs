//! Shared-memory reactor (spec §4.9): the single authorized consumer of
//! shared-memory queues. Polls every registered reader round-robin;
//! between passes it stages a busy-wait, then a paused/yielding wait, up
//! to `SPIN_RETRIES_WARM`, before parking on the first reader's futex.
//! Any reader producing data during a pass marks it `busy` and resets
//! the spinner, so a steady trickle of messages never lets the reactor
//! sleep at all.

use super::shm::ShmRing;
use crate::control::StopToken;
use crate::queues::INLINE_PAYLOAD;

const SPIN_RETRIES_WARM: u32 = 10_000;

/// One registered reader: a ring plus its own read cursor and the
/// callback invoked with each drained message's bytes.
struct Reader<'a> {
    ring: ShmRing<'a>,
    read_index: u64,
    on_message: Box<dyn FnMut(&[u8]) + Send + 'a>,
}

pub struct ShmReactor<'a> {
    readers: Vec<Reader<'a>>,
    stop: StopToken,
}

impl<'a> ShmReactor<'a> {
    pub fn new(stop: StopToken) -> Self {
        ShmReactor {
            readers: Vec::new(),
            stop,
        }
    }

    pub fn register(&mut self, ring: ShmRing<'a>, on_message: impl FnMut(&[u8]) + Send + 'a) {
        self.readers.push(Reader {
            ring,
            read_index: 0,
            on_message: Box::new(on_message),
        });
    }

    /// Runs one round-robin pass over every registered reader, draining
    /// whatever is immediately available. Returns the number of messages
    /// drained across all readers.
    fn poll_once(&mut self) -> usize {
        let mut drained = 0;
        let mut buf = [0u8; INLINE_PAYLOAD];
        for reader in &mut self.readers {
            while let Some(len) = reader.ring.try_read(&mut reader.read_index, &mut buf) {
                (reader.on_message)(&buf[..len]);
                drained += 1;
            }
        }
        drained
    }

    /// Runs the reactor loop on the calling thread until `stop` fires.
    pub fn run(&mut self) {
        let mut idle_spins = 0u32;
        while !self.stop.is_stopped() {
            let drained = self.poll_once();
            if drained > 0 {
                idle_spins = 0;
                continue;
            }
            idle_spins += 1;
            if idle_spins < SPIN_RETRIES_WARM {
                std::hint::spin_loop();
                if idle_spins % 256 == 0 {
                    std::thread::yield_now();
                }
                continue;
            }
            // Re-check once more before committing to a park, in case a
            // message landed in the gap above.
            if self.poll_once() > 0 {
                idle_spins = 0;
                continue;
            }
            if let Some(first) = self.readers.first() {
                first.ring.park();
            }
            idle_spins = 0;
        }
    }

    /// Wakes every registered reader's futex so a parked [`run`] loop
    /// re-checks `stop` promptly. Called from another thread.
    pub fn notify_all(&self) {
        for reader in &self.readers {
            reader.ring.notify();
        }
    }
}
