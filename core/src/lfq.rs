//! LFQ worker: bridges a producer thread to a consumer thread through a
//! bounded SPSC queue with futex-based park/wake (spec §4.11).
//!
//! The reader stage-spins before parking: `SPIN_RETRIES_HOT` busy-wait
//! iterations, then `SPIN_RETRIES_WARM` iterations that insert a CPU
//! pause and occasionally yield, then a final queue check before it
//! commits to `futex_wait`. The writer sets `sleeping` and checks it with
//! `SeqCst` before deciding whether to bump the futex, so a writer that
//! publishes just as the reader is about to park can never leave it
//! asleep (spec §9 "keep this exact pattern").

use crate::control::StopToken;
use crate::error::{CoreError, CoreResult};
use crate::queues::SequencedSpsc;
use std::hint;
use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

const SPIN_RETRIES_HOT: u32 = 1_000;
const SPIN_RETRIES_WARM: u32 = 10_000;
const POST_RETRIES: u32 = 64;

#[cfg(target_os = "linux")]
mod futex {
    use std::sync::atomic::AtomicI32;

    pub fn wait(word: &AtomicI32, expected: i32) {
        unsafe {
            libc::syscall(
                libc::SYS_futex,
                word as *const AtomicI32 as *const i32,
                libc::FUTEX_WAIT,
                expected,
                std::ptr::null::<libc::timespec>(),
            );
        }
    }

    pub fn wake_one(word: &AtomicI32) {
        unsafe {
            libc::syscall(
                libc::SYS_futex,
                word as *const AtomicI32 as *const i32,
                libc::FUTEX_WAKE,
                1,
            );
        }
    }
}

#[cfg(not(target_os = "linux"))]
mod futex {
    use std::sync::atomic::AtomicI32;
    use std::time::Duration;

    /// Non-Linux fallback: a short sleep instead of a real futex wait.
    /// Correct but not latency-competitive; this crate targets Linux.
    pub fn wait(_word: &AtomicI32, _expected: i32) {
        std::thread::sleep(Duration::from_micros(50));
    }

    pub fn wake_one(_word: &AtomicI32) {}
}

/// Bridges a producer (usually the network thread) to a consumer callable
/// run on a dedicated, pinned thread, via an `N`-slot sequenced SPSC ring.
pub struct LfqWorker<const N: usize> {
    queue: Arc<SequencedSpsc<N>>,
    futex_word: Arc<AtomicI32>,
    sleeping: Arc<AtomicBool>,
    stop: StopToken,
    handle: Option<JoinHandle<()>>,
}

impl<const N: usize> LfqWorker<N> {
    pub fn new(stop: StopToken) -> Self {
        LfqWorker {
            queue: Arc::new(SequencedSpsc::new()),
            futex_word: Arc::new(AtomicI32::new(0)),
            sleeping: Arc::new(AtomicBool::new(false)),
            stop,
            handle: None,
        }
    }

    /// Spawns the pinned reader thread. `consumer` is invoked with each
    /// message's bytes as they drain from the queue; `on_ready` is called
    /// once, from the new thread, right before it enters its loop.
    pub fn run(
        &mut self,
        name: &str,
        core_id: Option<usize>,
        mut consumer: impl FnMut(&[u8]) + Send + 'static,
        on_ready: impl FnOnce() + Send + 'static,
    ) {
        let queue = self.queue.clone();
        let futex_word = self.futex_word.clone();
        let sleeping = self.sleeping.clone();
        let stop = self.stop.clone();
        let handle = crate::affinity::spawn_pinned(name, core_id, true, move || {
            on_ready();
            let mut buf = [0u8; crate::queues::INLINE_PAYLOAD];
            let mut spins = 0u32;
            while !stop.is_stopped() {
                if let Some(len) = queue.try_read(&mut buf) {
                    consumer(&buf[..len]);
                    spins = 0;
                    continue;
                }
                spins += 1;
                if spins < SPIN_RETRIES_HOT {
                    hint::spin_loop();
                    continue;
                }
                if spins < SPIN_RETRIES_HOT + SPIN_RETRIES_WARM {
                    hint::spin_loop();
                    if spins % 256 == 0 {
                        std::thread::yield_now();
                    }
                    continue;
                }
                // Final check before committing to a futex wait: a
                // message may have landed between the last try_read and
                // here.
                if let Some(len) = queue.try_read(&mut buf) {
                    consumer(&buf[..len]);
                    spins = 0;
                    continue;
                }
                sleeping.store(true, Ordering::SeqCst);
                if !queue.is_empty() {
                    sleeping.store(false, Ordering::SeqCst);
                    spins = 0;
                    continue;
                }
                futex::wait(&futex_word, 0);
                sleeping.store(false, Ordering::SeqCst);
                spins = 0;
            }
        });
        self.handle = Some(handle);
    }

    /// Serialize-copies `bytes` into the queue. Retries up to
    /// `POST_RETRIES` times if momentarily full (the reader is mid-drain);
    /// returns [`CoreError::LfqRetriesExhausted`] if the budget runs out.
    /// Bumps the futex if the reader was parked.
    pub fn post(&self, bytes: &[u8]) -> CoreResult<()> {
        for _ in 0..POST_RETRIES {
            if self.queue.try_write(bytes) {
                if self.sleeping.load(Ordering::SeqCst) {
                    self.futex_word.fetch_add(1, Ordering::SeqCst);
                    futex::wake_one(&self.futex_word);
                }
                return Ok(());
            }
            hint::spin_loop();
        }
        Err(CoreError::LfqRetriesExhausted)
    }

    /// Flips the stop token, wakes the reader, and joins its thread.
    pub fn stop(&mut self) {
        self.stop.stop();
        self.futex_word.fetch_add(1, Ordering::SeqCst);
        futex::wake_one(&self.futex_word);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;
    use std::sync::Barrier;
    use std::time::Duration;

    #[test]
    fn post_and_consume_round_trip() {
        let stop = StopToken::new();
        let mut worker: LfqWorker<64> = LfqWorker::new(stop.clone());
        let received = Arc::new(AtomicU32::new(0));
        let received2 = received.clone();
        let ready = Arc::new(Barrier::new(2));
        let ready2 = ready.clone();
        worker.run(
            "test-lfq",
            None,
            move |bytes| {
                received2.store(bytes[0] as u32, Ordering::SeqCst);
            },
            move || {
                ready2.wait();
            },
        );
        ready.wait();

        worker.post(&[7u8]).unwrap();
        let deadline = std::time::Instant::now() + Duration::from_secs(2);
        while received.load(Ordering::SeqCst) != 7 && std::time::Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(1));
        }
        assert_eq!(received.load(Ordering::SeqCst), 7);
        worker.stop();
    }
}
