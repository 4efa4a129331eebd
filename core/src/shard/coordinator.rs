//! Coordinator: starts the shard threads, dispatches `InternalOrderEvent`
//! to the owning shard, and brings the system to `Operational` once every
//! shard is up (spec §4.14).
//!
//! Each direction of the gateway ⇄ shard hand-off is its own [`LfqWorker`]
//! (spec §4.11): the gateway→shard worker's reader thread doubles as the
//! shard's pinned executor thread (it owns that shard's [`OrderBook`]
//! directly in its consumer closure); the shard→gateway worker's reader
//! thread forwards decoded statuses back onto the market bus.

use super::book::OrderBook;
use super::types::MarketData;
use crate::alloc::AllocFlags;
use crate::bus::{BusHub, SystemKey};
use crate::control::StopToken;
use crate::lfq::LfqWorker;
use crate::wire::messages::{
    InternalOrderEvent, InternalOrderStatus, OrderAction, OrderState, ServerEvent,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

impl SystemKey for ServerEvent {}

const SHARD_QUEUE_CAPACITY: usize = 4096;

fn encode_event(event: &InternalOrderEvent) -> [u8; 17] {
    let mut buf = [0u8; 17];
    buf[0..4].copy_from_slice(&event.system_id.raw().to_le_bytes());
    buf[4..8].copy_from_slice(&event.ticker);
    buf[8..12].copy_from_slice(&event.quantity.to_le_bytes());
    buf[12..16].copy_from_slice(&event.price.to_le_bytes());
    buf[16] = event.action as u8;
    buf
}

fn decode_event(bytes: &[u8]) -> Option<InternalOrderEvent> {
    if bytes.len() < 17 {
        return None;
    }
    Some(InternalOrderEvent {
        system_id: crate::ids::SystemOrderId::from_raw(u32::from_le_bytes(bytes[0..4].try_into().ok()?)),
        ticker: bytes[4..8].try_into().ok()?,
        quantity: u32::from_le_bytes(bytes[8..12].try_into().ok()?),
        price: u32::from_le_bytes(bytes[12..16].try_into().ok()?),
        action: OrderAction::from_u8(bytes[16])?,
    })
}

fn encode_status(status: &InternalOrderStatus) -> [u8; 17] {
    let mut buf = [0u8; 17];
    buf[0..4].copy_from_slice(&status.system_id.raw().to_le_bytes());
    buf[4..8].copy_from_slice(&status.book_id.raw().to_le_bytes());
    buf[8..12].copy_from_slice(&status.fill_qty.to_le_bytes());
    buf[12..16].copy_from_slice(&status.fill_price.to_le_bytes());
    buf[16] = status.state as u8;
    buf
}

fn decode_status(bytes: &[u8]) -> Option<InternalOrderStatus> {
    if bytes.len() < 17 {
        return None;
    }
    Some(InternalOrderStatus {
        system_id: crate::ids::SystemOrderId::from_raw(u32::from_le_bytes(bytes[0..4].try_into().ok()?)),
        book_id: crate::ids::BookOrderId::from_raw(u32::from_le_bytes(bytes[4..8].try_into().ok()?)),
        fill_qty: u32::from_le_bytes(bytes[8..12].try_into().ok()?),
        fill_price: u32::from_le_bytes(bytes[12..16].try_into().ok()?),
        state: OrderState::from_u8(bytes[16])?,
    })
}

pub struct Coordinator {
    market_data: Arc<MarketData>,
    inbound: Vec<LfqWorker<SHARD_QUEUE_CAPACITY>>,
    outbound: Vec<Arc<LfqWorker<SHARD_QUEUE_CAPACITY>>>,
}

impl Coordinator {
    /// `shard_cores[i]` is the optional pinned core for shard `i`'s
    /// executor thread; its length fixes the shard count `W`.
    pub fn start(
        market_data: Arc<MarketData>,
        bus: &Arc<BusHub>,
        shard_cores: &[Option<usize>],
        monitor_rate: Duration,
        stop: StopToken,
    ) -> crate::error::CoreResult<Arc<Self>> {
        let shard_count = shard_cores.len().max(1);
        let ready = Arc::new(AtomicUsize::new(0));

        let mut inbound = Vec::with_capacity(shard_count);
        let mut outbound = Vec::with_capacity(shard_count);

        for i in 0..shard_count {
            let mut out_worker: LfqWorker<SHARD_QUEUE_CAPACITY> = LfqWorker::new(stop.clone());
            let gw_bus = bus.clone();
            out_worker.run(
                &format!("shard-{i}-status"),
                None,
                move |bytes| {
                    if let Some(status) = decode_status(bytes) {
                        gw_bus.market.post(status);
                    } else {
                        tracing::warn!(shard = i, "failed to decode internal order status");
                    }
                },
                || {},
            );
            outbound.push(Arc::new(out_worker));
        }

        for (i, core_id) in shard_cores.iter().enumerate() {
            let mut in_worker: LfqWorker<SHARD_QUEUE_CAPACITY> = LfqWorker::new(stop.clone());
            let mut book = OrderBook::new(AllocFlags {
                huge: true,
                lock: true,
                prefault: false,
            })?;
            let status_out = outbound[i].clone();
            let ready = ready.clone();
            let bus_for_ready = bus.clone();
            let mut last_stat = Instant::now();
            let mut opened = 0u64;
            let mut opened_at_last_tick = 0u64;
            in_worker.run(
                &format!("shard-{i}"),
                *core_id,
                move |bytes| {
                    if let Some(event) = decode_event(bytes) {
                        match event.action {
                            OrderAction::Cancel | OrderAction::Modify => {
                                tracing::debug!(
                                    system_id = event.system_id.raw(),
                                    "cancel/modify has no book-side route yet, dropping"
                                );
                            }
                            OrderAction::Buy | OrderAction::Sell => {
                                opened += 1;
                                book.add(&event, &mut |status| {
                                    let _ = status_out.post(&encode_status(&status));
                                });
                            }
                        }
                    }
                    if last_stat.elapsed() >= monitor_rate {
                        let rps = opened - opened_at_last_tick;
                        if rps > 0 {
                            bus_for_ready.stream.post(crate::wire::messages::TelemetryRecord {
                                timestamp_us: 0,
                                rps: rps.min(u32::MAX as u64) as u32,
                                orders_opened: opened,
                                kind: crate::wire::messages::TelemetryKind::RuntimeMetrics,
                            });
                        }
                        opened_at_last_tick = opened;
                        last_stat = Instant::now();
                    }
                },
                move || {
                    if ready.fetch_add(1, Ordering::SeqCst) + 1 == shard_count {
                        bus_for_ready.system.post(ServerEvent::Operational);
                    }
                },
            );
            inbound.push(in_worker);
        }

        let coordinator = Arc::new(Coordinator {
            market_data,
            inbound,
            outbound,
        });
        coordinator.wire(bus);
        Ok(coordinator)
    }

    fn wire(self: &Arc<Self>, bus: &Arc<BusHub>) {
        let this = self.clone();
        bus.market.set_handler::<InternalOrderEvent>(move |event| {
            this.dispatch(event);
        });
    }

    fn dispatch(&self, event: InternalOrderEvent) {
        let shard = self.market_data.worker_for(&event.ticker).unwrap_or(0);
        let Some(worker) = self.inbound.get(shard) else {
            tracing::warn!(shard, "no shard for this worker id, dropping event");
            return;
        };
        if worker.post(&encode_event(&event)).is_err() {
            tracing::warn!(shard, "shard inbound queue full, dropping event");
        }
    }
}
