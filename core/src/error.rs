//! Crate-wide error types.
//!
//! Per-order failures (validation, exhaustion) are local: they become an
//! `OrderStatus::Rejected` and never reach here. `CoreError` is for the
//! subsystem-level failures described in spec §7 ("Propagation"): protocol
//! errors, I/O errors, configuration errors, and the one resource
//! exhaustion case (the LFQ worker's retry budget) that is fatal rather
//! than per-order.

use thiserror::Error;

/// Subsystem-level error. Anything that reaches this point is reported via
/// `InternalError` on the system bus and is shutdown-inducing per spec §7.
#[derive(Debug, Error)]
pub enum CoreError {
    /// The wire framer saw a body size above the configured limit.
    #[error("oversize frame: body_size={body_size} exceeds limit={limit}")]
    OversizeFrame { body_size: usize, limit: usize },

    /// The codec could not parse a message of the claimed type/size.
    #[error("codec failed to deserialize {what}")]
    CodecError { what: &'static str },

    /// A transport-level I/O failure (read/write failed, peer closed).
    #[error("transport io error: {0}")]
    Io(#[from] std::io::Error),

    /// The slot-ID pool is exhausted (capacity reached, no returns pending).
    #[error("slot id pool exhausted (capacity={capacity})")]
    PoolExhausted { capacity: u32 },

    /// The LFQ worker's post-retry budget was exhausted.
    #[error("lfq worker post retry budget exhausted")]
    LfqRetriesExhausted,

    /// The shared buffer pool has no free buffers.
    #[error("buffer pool exhausted (capacity={capacity})")]
    BufferPoolExhausted { capacity: usize },

    /// A configuration invariant was violated (e.g. overlapping core ids).
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A huge-page/mmap-backed allocation failed at the OS level.
    #[error("allocation failed: {0}")]
    Allocation(String),
}

/// Result alias used throughout the crate for subsystem-level fallibility.
pub type CoreResult<T> = Result<T, CoreError>;
