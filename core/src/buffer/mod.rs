//! Receive-side sliding buffer and the outbound buffer pool (spec §4.5, §5).

pub mod pool;
pub mod sliding;

pub use pool::BufferPool;
pub use sliding::SlidingBuffer;
