//! Versioned slot identifiers and the pool that allocates them (spec §3, §4.1).

pub mod pool;
pub mod slot_id;

pub use pool::SlotIdPool;
pub use slot_id::{BookOrderId, SlotId, SystemOrderId};
