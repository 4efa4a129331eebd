//! Telemetry drain (spec §4.10 "a dedicated thread, driven by a periodic
//! timer, drains all [stream bus] rings and invokes their handlers").
//!
//! Shards post [`TelemetryRecord`]s onto the stream bus as they run; this
//! thread is the only consumer that ever calls [`StreamBus::drain`] — if
//! nothing drains a ring it fills and silently drops further records.

use crate::bus::BusHub;
use crate::control::StopToken;
use crate::wire::messages::TelemetryRecord;
use std::sync::Arc;
use std::time::Duration;

pub struct TelemetryDrain;

impl TelemetryDrain {
    /// Registers the default handler (structured logging via `tracing`)
    /// and spawns the drain thread, waking every `drain_period`. Runs
    /// until `stop` is set.
    pub fn start(bus: Arc<BusHub>, drain_period: Duration, stop: StopToken) -> std::thread::JoinHandle<()> {
        bus.stream.set_handler::<TelemetryRecord>(|record| {
            tracing::info!(
                rps = record.rps,
                orders_opened = record.orders_opened,
                kind = ?record.kind,
                "shard telemetry"
            );
        });
        crate::affinity::spawn_pinned("telemetry-drain", None, false, move || {
            while !stop.is_stopped() {
                std::thread::sleep(drain_period);
                bus.stream.drain();
            }
            // Final drain so records posted just before shutdown aren't lost.
            bus.stream.drain();
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::messages::TelemetryKind;
    use std::time::Duration;

    #[test]
    fn drain_thread_invokes_the_registered_handler() {
        let bus = Arc::new(BusHub::new());
        let stop = StopToken::new();
        let handle = TelemetryDrain::start(bus.clone(), Duration::from_millis(5), stop.clone());

        bus.stream.post(TelemetryRecord {
            timestamp_us: 1,
            rps: 3,
            orders_opened: 7,
            kind: TelemetryKind::RuntimeMetrics,
        });

        std::thread::sleep(Duration::from_millis(50));
        stop.stop();
        handle.join().unwrap();
    }
}
