//! Lock-free intra-process queues (spec §4.3, §4.4).

pub mod mpmc;
pub mod spsc;

pub use mpmc::MpmcQueue;
pub use spsc::{SequencedSpsc, INLINE_PAYLOAD};
