//! Stream bus: bounded lock-free MPMC rings drained by a periodic timer
//! (spec §4.10). `post::<T>(msg)` pushes into `T`'s ring without blocking
//! the producer; a dedicated thread calls [`StreamBus::drain`] on its own
//! timer cadence (`rates.telemetry_ms`) to invoke handlers. Consumer
//! latency is therefore bounded by the drain interval, not by producer
//! speed — the intended trade for telemetry, where losing freshness is
//! cheaper than blocking the hot path.

use crate::queues::MpmcQueue;
use crate::wire::messages::TelemetryRecord;
use std::sync::OnceLock;

type Handler<T> = Box<dyn Fn(T) + Send + Sync>;

pub trait StreamRouted: Sized + 'static {
    fn queue(bus: &StreamBus) -> &MpmcQueue<Self>;
    fn slot(bus: &StreamBus) -> &OnceLock<Handler<Self>>;
}

const DEFAULT_RING_CAPACITY: usize = 4096;

pub struct StreamBus {
    telemetry_queue: MpmcQueue<TelemetryRecord>,
    telemetry_handler: OnceLock<Handler<TelemetryRecord>>,
}

impl Default for StreamBus {
    fn default() -> Self {
        StreamBus {
            telemetry_queue: MpmcQueue::new(DEFAULT_RING_CAPACITY),
            telemetry_handler: OnceLock::new(),
        }
    }
}

impl StreamRouted for TelemetryRecord {
    fn queue(bus: &StreamBus) -> &MpmcQueue<Self> {
        &bus.telemetry_queue
    }
    fn slot(bus: &StreamBus) -> &OnceLock<Handler<Self>> {
        &bus.telemetry_handler
    }
}

impl StreamBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_handler<T: StreamRouted>(&self, handler: impl Fn(T) + Send + Sync + 'static) {
        if T::slot(self).set(Box::new(handler)).is_err() {
            tracing::warn!("stream bus handler already registered for this type, ignoring");
        }
    }

    /// Pushes `msg` onto its ring. A full ring drops the message — the
    /// producer never blocks waiting on the drain thread.
    pub fn post<T: StreamRouted>(&self, msg: T) {
        if T::queue(self).push(msg).is_err() {
            tracing::warn!("stream bus ring full, dropping message");
        }
    }

    /// Drains every ring to its registered handler (or drops silently if
    /// none is registered) and returns the number of messages drained.
    /// Called by the owning thread on its timer cadence.
    pub fn drain(&self) -> usize {
        let mut drained = 0;
        while let Some(msg) = self.telemetry_queue.pop() {
            if let Some(handler) = self.telemetry_handler.get() {
                handler(msg);
            }
            drained += 1;
        }
        drained
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::messages::TelemetryKind;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn sample(rps: u32) -> TelemetryRecord {
        TelemetryRecord {
            timestamp_us: 1,
            rps,
            orders_opened: 0,
            kind: TelemetryKind::RuntimeMetrics,
        }
    }

    #[test]
    fn post_does_not_invoke_handler_until_drained() {
        let bus = StreamBus::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let calls2 = calls.clone();
        bus.set_handler::<TelemetryRecord>(move |_| {
            calls2.fetch_add(1, Ordering::SeqCst);
        });
        bus.post(sample(1));
        bus.post(sample(2));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(bus.drain(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn drain_on_empty_bus_is_a_no_op() {
        let bus = StreamBus::new();
        assert_eq!(bus.drain(), 0);
    }
}
