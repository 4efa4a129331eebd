//! Sliding receive buffer (spec §4.5).
//!
//! A contiguous byte buffer with a read cursor (`tail`) and a write
//! cursor (`head`). `buffer()` hands the transport a writable suffix;
//! when that suffix shrinks below `min_read`, already-consumed bytes are
//! compacted to the front so a full-size read can still be issued without
//! growing the allocation.

pub struct SlidingBuffer {
    storage: Box<[u8]>,
    tail: usize,
    head: usize,
}

impl SlidingBuffer {
    pub fn new(capacity: usize) -> Self {
        SlidingBuffer {
            storage: vec![0u8; capacity].into_boxed_slice(),
            tail: 0,
            head: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.storage.len()
    }

    /// The writable suffix `[head..capacity)`, compacting first if it is
    /// smaller than `min_read`.
    pub fn buffer(&mut self, min_read: usize) -> &mut [u8] {
        if self.capacity() - self.head < min_read {
            self.compact();
        }
        &mut self.storage[self.head..]
    }

    /// The readable slice `[tail..head)`.
    pub fn data(&self) -> &[u8] {
        &self.storage[self.tail..self.head]
    }

    /// Advances `head` by `n` bytes just written into the slice returned
    /// by [`buffer`]. Panics if that would push `head` past `capacity`.
    pub fn commit_write(&mut self, n: usize) {
        assert!(self.head + n <= self.capacity(), "write commit overflows buffer");
        self.head += n;
        self.reset_if_empty();
    }

    /// Advances `tail` by `n` bytes consumed from [`data`]. Panics if that
    /// would push `tail` past `head`.
    pub fn commit_read(&mut self, n: usize) {
        assert!(self.tail + n <= self.head, "read commit overruns written data");
        self.tail += n;
        self.reset_if_empty();
    }

    /// Resets both cursors to zero. Called automatically whenever the
    /// buffer becomes empty so that `tail == head == 0` always holds for
    /// an idle buffer, per spec §8's boundary-behavior property.
    pub fn reset(&mut self) {
        self.tail = 0;
        self.head = 0;
    }

    fn reset_if_empty(&mut self) {
        if self.tail == self.head {
            self.reset();
        }
    }

    fn compact(&mut self) {
        if self.tail == 0 {
            return;
        }
        self.storage.copy_within(self.tail..self.head, 0);
        self.head -= self.tail;
        self.tail = 0;
    }

    #[cfg(test)]
    fn cursors(&self) -> (usize, usize) {
        (self.tail, self.head)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_then_read_round_trips() {
        let mut buf = SlidingBuffer::new(16);
        buf.buffer(4)[..4].copy_from_slice(b"abcd");
        buf.commit_write(4);
        assert_eq!(buf.data(), b"abcd");
        buf.commit_read(4);
        assert_eq!(buf.cursors(), (0, 0));
    }

    #[test]
    fn compacts_when_writable_suffix_too_small() {
        let mut buf = SlidingBuffer::new(8);
        buf.buffer(8)[..6].copy_from_slice(b"abcdef");
        buf.commit_write(6);
        buf.commit_read(4); // tail=4, head=6, leaves data "ef"
        assert_eq!(buf.data(), b"ef");

        // writable suffix is only capacity-head = 2 bytes; requesting 4
        // forces a compaction of the remaining "ef" to offset 0.
        let writable = buf.buffer(4);
        assert!(writable.len() >= 4);
        assert_eq!(buf.data(), b"ef");
        assert_eq!(buf.cursors(), (0, 2));
    }

    #[test]
    fn reset_after_any_valid_commit_sequence() {
        let mut buf = SlidingBuffer::new(32);
        buf.commit_write(10);
        buf.commit_read(10);
        assert_eq!(buf.cursors(), (0, 0));
    }

    #[test]
    #[should_panic]
    fn commit_read_past_head_panics() {
        let mut buf = SlidingBuffer::new(8);
        buf.commit_read(1);
    }
}
