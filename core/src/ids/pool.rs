//! Lock-free slot-ID pool (spec §4.1).
//!
//! Contract: single acquiring thread, single releasing thread (may be the
//! same thread or different threads — the gateway acquires on its own
//! thread and the LFQ worker's consumer releases on a different one). The
//! acquirer owns a small local stack; when empty it drains a bounded
//! chunk from the shared return queue, then falls back to extending the
//! fresh-index frontier in chunks. Tie-break when both are empty: fresh
//! allocation.

use super::slot_id::SlotId;
use crossbeam_queue::SegQueue;
use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicU32, Ordering};

const LOCAL_STACK_CAPACITY: usize = 64 * 1024;
const RETURN_DRAIN_CHUNK: usize = 1024;
const FRONTIER_CHUNK: u32 = 16 * 1024;

pub struct SlotIdPool<const INDEX_BITS: u32> {
    generations: Box<[AtomicU32]>,
    return_queue: SegQueue<u32>,
    local_stack: UnsafeCell<Vec<u32>>,
    frontier: UnsafeCell<u32>,
}

// Safety: `local_stack` and `frontier` are only ever touched from the
// single acquiring thread (the pool's contract, not enforced by the type
// system — the same trade-off `debasishg-ringmpsc-rs`'s `Ring` makes for
// its per-role cached cursors). `generations` and `return_queue` are
// atomics/lock-free and safe to share.
unsafe impl<const INDEX_BITS: u32> Sync for SlotIdPool<INDEX_BITS> {}

impl<const INDEX_BITS: u32> SlotIdPool<INDEX_BITS> {
    pub fn new() -> Self {
        let capacity = SlotId::<INDEX_BITS>::CAPACITY;
        Self {
            generations: (0..capacity).map(|_| AtomicU32::new(0)).collect(),
            return_queue: SegQueue::new(),
            local_stack: UnsafeCell::new(Vec::with_capacity(LOCAL_STACK_CAPACITY.min(capacity))),
            frontier: UnsafeCell::new(0),
        }
    }

    /// Returns a fresh or reused ID with generation >= 1, or `None` if the
    /// pool is exhausted (capacity reached and no returns pending).
    pub fn acquire(&self) -> Option<SlotId<INDEX_BITS>> {
        let local = unsafe { &mut *self.local_stack.get() };

        if local.is_empty() {
            self.refill_from_returns(local);
        }
        if local.is_empty() {
            self.refill_from_frontier(local);
        }

        let index = local.pop()?;
        let generation = self.generations[index as usize].load(Ordering::Acquire);
        Some(SlotId::new(index, generation.max(1)))
    }

    /// Increments the slot's generation (wrapping 0 → 1) and enqueues it
    /// for reuse. Safe to call from a thread other than the acquirer.
    pub fn release(&self, id: SlotId<INDEX_BITS>) {
        let index = id.index();
        let slot = &self.generations[index as usize];
        let current = slot.load(Ordering::Acquire);
        let next = SlotId::<INDEX_BITS>::next_generation(current.max(1));
        slot.store(next, Ordering::Release);
        self.return_queue.push(index);
    }

    fn refill_from_returns(&self, local: &mut Vec<u32>) {
        for _ in 0..RETURN_DRAIN_CHUNK {
            match self.return_queue.pop() {
                Some(index) => local.push(index),
                None => break,
            }
        }
    }

    fn refill_from_frontier(&self, local: &mut Vec<u32>) {
        let capacity = SlotId::<INDEX_BITS>::CAPACITY as u32;
        let frontier = unsafe { &mut *self.frontier.get() };
        if *frontier >= capacity {
            return;
        }
        let chunk_end = (*frontier + FRONTIER_CHUNK).min(capacity);
        for index in *frontier..chunk_end {
            self.generations[index as usize].store(1, Ordering::Release);
            local.push(index);
        }
        *frontier = chunk_end;
    }
}

impl<const INDEX_BITS: u32> Default for SlotIdPool<INDEX_BITS> {
    fn default() -> Self {
        Self::new()
    }
}
