//! Shared-memory transport (spec §4.7 "Shared-memory transport", §6
//! "Shared-memory layout").
//!
//! A single memory-mapped file holds four cache-line-aligned queues —
//! `upstream`, `downstream`, `broadcast`, `telemetry` — each a futex word
//! plus a 128Ki-slot sequenced SPSC ring. The layout is identical to
//! [`crate::queues::spsc::SequencedSpsc`]'s slot protocol, re-implemented
//! here directly over mapped bytes instead of a heap `Box<[Slot]>`,
//! since the whole point of this transport is that the ring lives in a
//! file both processes map, not in either process's heap. The server
//! creates and sizes the file and locks it in RAM; the client attaches
//! to the same path.

use memmap2::{MmapMut, MmapOptions};
use std::fs::OpenOptions;
use std::sync::atomic::{AtomicBool, AtomicI32, AtomicU64, Ordering};

use crate::queues::INLINE_PAYLOAD;

pub const SHM_RING_SLOTS: usize = 128 * 1024;
const SLOT_STRIDE: usize = 64; // 8 (seq) + 4 (size) + 52 (payload) rounded to a cache line
const HEADER_STRIDE: usize = 64;
const QUEUE_STRIDE: usize = HEADER_STRIDE + SLOT_STRIDE * SHM_RING_SLOTS;
pub const SHM_REGION_BYTES: usize = QUEUE_STRIDE * 4;

#[repr(usize)]
#[derive(Clone, Copy, Debug)]
pub enum ShmQueueKind {
    Upstream = 0,
    Downstream = 1,
    Broadcast = 2,
    Telemetry = 3,
}

/// One `{futex word, futex counter, wait flag, 128Ki-slot ring}` region,
/// as a view into the shared mapping.
pub struct ShmRing<'a> {
    base: *mut u8,
    _marker: std::marker::PhantomData<&'a mut [u8]>,
}

// Safety: all access goes through atomics at fixed byte offsets; the
// SPSC discipline (one writer, one reader per ring) is the caller's
// contract, identical to `SequencedSpsc`.
unsafe impl<'a> Send for ShmRing<'a> {}
unsafe impl<'a> Sync for ShmRing<'a> {}

impl<'a> ShmRing<'a> {
    /// # Safety
    /// `base` must point to at least `QUEUE_STRIDE` valid, exclusively
    /// assigned bytes for the lifetime `'a`.
    unsafe fn new(base: *mut u8) -> Self {
        ShmRing {
            base,
            _marker: std::marker::PhantomData,
        }
    }

    fn futex_word(&self) -> &AtomicI32 {
        unsafe { &*(self.base as *const AtomicI32) }
    }

    fn futex_counter(&self) -> &AtomicU64 {
        unsafe { &*(self.base.add(8) as *const AtomicU64) }
    }

    fn wait_flag(&self) -> &AtomicBool {
        unsafe { &*(self.base.add(16) as *const AtomicBool) }
    }

    fn slot_seq(&self, index: usize) -> &AtomicU64 {
        let offset = HEADER_STRIDE + index * SLOT_STRIDE;
        unsafe { &*(self.base.add(offset) as *const AtomicU64) }
    }

    fn slot_size_ptr(&self, index: usize) -> *mut u32 {
        let offset = HEADER_STRIDE + index * SLOT_STRIDE + 8;
        unsafe { self.base.add(offset) as *mut u32 }
    }

    fn slot_payload_ptr(&self, index: usize) -> *mut u8 {
        let offset = HEADER_STRIDE + index * SLOT_STRIDE + 12;
        unsafe { self.base.add(offset) }
    }

    /// Zeroes the header and every slot's sequence number. Only the
    /// server side calls this, once, before the client attaches.
    fn init(&self) {
        self.futex_word().store(0, Ordering::Relaxed);
        self.futex_counter().store(0, Ordering::Relaxed);
        self.wait_flag().store(false, Ordering::Relaxed);
        for i in 0..SHM_RING_SLOTS {
            self.slot_seq(i).store(i as u64, Ordering::Relaxed);
        }
    }

    pub fn try_write(&self, write_index: &mut u64, bytes: &[u8]) -> bool {
        if bytes.len() > INLINE_PAYLOAD {
            return false;
        }
        let index = (*write_index as usize) & (SHM_RING_SLOTS - 1);
        let seq = self.slot_seq(index);
        if seq.load(Ordering::Acquire) != *write_index {
            return false;
        }
        unsafe {
            std::ptr::copy_nonoverlapping(bytes.as_ptr(), self.slot_payload_ptr(index), bytes.len());
            *self.slot_size_ptr(index) = bytes.len() as u32;
        }
        seq.store(*write_index + 1, Ordering::Release);
        *write_index += 1;
        true
    }

    pub fn try_read(&self, read_index: &mut u64, out: &mut [u8; INLINE_PAYLOAD]) -> Option<usize> {
        let index = (*read_index as usize) & (SHM_RING_SLOTS - 1);
        let seq = self.slot_seq(index);
        if seq.load(Ordering::Acquire) != *read_index + 1 {
            return None;
        }
        let size = unsafe {
            let size = *self.slot_size_ptr(index) as usize;
            std::ptr::copy_nonoverlapping(self.slot_payload_ptr(index), out.as_mut_ptr(), size);
            size
        };
        seq.store(*read_index + SHM_RING_SLOTS as u64, Ordering::Release);
        *read_index += 1;
        Some(size)
    }

    pub fn is_empty(&self, read_index: u64) -> bool {
        let index = (read_index as usize) & (SHM_RING_SLOTS - 1);
        self.slot_seq(index).load(Ordering::Acquire) != read_index + 1
    }

    /// True once a writer has set `wait_flag`, i.e. the reader committed
    /// to parking. The writer checks this with `SeqCst` ordering before
    /// deciding whether a wake is needed (spec §9).
    pub fn reader_is_sleeping(&self) -> bool {
        self.wait_flag().load(Ordering::SeqCst)
    }

    /// Bumps the futex word and wakes a parked reader. Called by a writer
    /// after observing [`reader_is_sleeping`].
    pub fn notify(&self) {
        self.futex_counter().fetch_add(1, Ordering::SeqCst);
        self.futex_word().fetch_add(1, Ordering::SeqCst);
        #[cfg(target_os = "linux")]
        unsafe {
            libc::syscall(
                libc::SYS_futex,
                self.futex_word() as *const AtomicI32 as *const i32,
                libc::FUTEX_WAKE,
                1,
            );
        }
    }

    /// Marks this ring's reader as parked and blocks on its futex word
    /// until woken. The reactor (§4.9) is responsible for the staged
    /// spin and the final empty-check before calling this — this method
    /// is the unconditional park, not the policy around it.
    pub fn park(&self) {
        let expected = self.futex_word().load(Ordering::SeqCst);
        self.wait_flag().store(true, Ordering::SeqCst);
        #[cfg(target_os = "linux")]
        unsafe {
            libc::syscall(
                libc::SYS_futex,
                self.futex_word() as *const AtomicI32 as *const i32,
                libc::FUTEX_WAIT,
                expected,
                std::ptr::null::<libc::timespec>(),
            );
        }
        #[cfg(not(target_os = "linux"))]
        std::thread::sleep(std::time::Duration::from_micros(50));
        self.wait_flag().store(false, Ordering::SeqCst);
    }
}

/// The whole mapped region: one ring per [`ShmQueueKind`]. Owns the
/// mapping; rings borrow from it.
pub struct ShmRegion {
    mmap: MmapMut,
}

impl ShmRegion {
    /// Server-side: creates (or truncates) `path` to the fixed region
    /// size, maps it, and zero-initializes every ring. Attempts
    /// `mlock` best-effort; failure is logged, not fatal (matches the
    /// huge-page allocator's fallback posture).
    pub fn create(path: &std::path::Path) -> std::io::Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        file.set_len(SHM_REGION_BYTES as u64)?;
        let mmap = unsafe { MmapOptions::new().len(SHM_REGION_BYTES).map_mut(&file)? };
        let region = ShmRegion { mmap };
        for kind in [
            ShmQueueKind::Upstream,
            ShmQueueKind::Downstream,
            ShmQueueKind::Broadcast,
            ShmQueueKind::Telemetry,
        ] {
            region.ring(kind).init();
        }
        region.mlock_best_effort();
        Ok(region)
    }

    /// Client-side: attaches to an already-created region. Does not
    /// initialize — the server owns that.
    pub fn attach(path: &std::path::Path) -> std::io::Result<Self> {
        let file = OpenOptions::new().read(true).write(true).open(path)?;
        let mmap = unsafe { MmapOptions::new().len(SHM_REGION_BYTES).map_mut(&file)? };
        Ok(ShmRegion { mmap })
    }

    pub fn ring(&self, kind: ShmQueueKind) -> ShmRing<'_> {
        let offset = kind as usize * QUEUE_STRIDE;
        unsafe { ShmRing::new(self.mmap.as_ptr().add(offset) as *mut u8) }
    }

    fn mlock_best_effort(&self) {
        let ret = unsafe { libc::mlock(self.mmap.as_ptr() as *const libc::c_void, self.mmap.len()) };
        if ret != 0 {
            tracing::warn!("failed to mlock shared-memory region, continuing without it");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queues::INLINE_PAYLOAD;

    #[test]
    fn write_then_read_round_trips_through_the_mapped_ring() {
        let dir = std::env::temp_dir();
        let path = dir.join(format!("hft-core-shm-test-{}.bin", std::process::id()));
        let region = ShmRegion::create(&path).unwrap();
        let ring = region.ring(ShmQueueKind::Upstream);

        let mut w = 0u64;
        let mut r = 0u64;
        assert!(ring.try_write(&mut w, b"hello"));
        let mut out = [0u8; INLINE_PAYLOAD];
        let n = ring.try_read(&mut r, &mut out).unwrap();
        assert_eq!(&out[..n], b"hello");

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn separate_rings_do_not_alias() {
        let dir = std::env::temp_dir();
        let path = dir.join(format!("hft-core-shm-test2-{}.bin", std::process::id()));
        let region = ShmRegion::create(&path).unwrap();

        let up = region.ring(ShmQueueKind::Upstream);
        let down = region.ring(ShmQueueKind::Downstream);
        let mut w = 0u64;
        assert!(up.try_write(&mut w, b"only-upstream"));

        let mut r = 0u64;
        let mut out = [0u8; INLINE_PAYLOAD];
        assert!(down.try_read(&mut r, &mut out).is_none());

        std::fs::remove_file(&path).ok();
    }
}
