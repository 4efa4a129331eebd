//! Order gateway (spec §4.13). Single-threaded on its own dedicated
//! thread: owns the system-ID pool and the order-record table, translates
//! between the client-facing `ServerOrder`/`ServerOrderStatus` shape and
//! the shard-facing `InternalOrderEvent`/`InternalOrderStatus` shape.

use super::records::{OrderRecord, OrderRecordTable};
use crate::alloc::AllocFlags;
use crate::bus::BusHub;
use crate::ids::SlotIdPool;
use crate::wire::messages::{
    InternalOrderEvent, InternalOrderStatus, OrderAction, OrderState, OrderStatus, ServerOrder,
    ServerOrderStatus,
};
use std::sync::Arc;

pub struct OrderGateway {
    ids: SlotIdPool<24>,
    records: std::sync::Mutex<OrderRecordTable>,
}

impl OrderGateway {
    pub fn new(flags: AllocFlags) -> crate::error::CoreResult<Arc<Self>> {
        Ok(Arc::new(OrderGateway {
            ids: SlotIdPool::new(),
            records: std::sync::Mutex::new(OrderRecordTable::new(flags)?),
        }))
    }

    /// Registers this gateway's handlers on the market bus. Call once at
    /// startup. `ServerOrder` is the inbound hot path; `InternalOrderStatus`
    /// is the outbound hot path from the shard's LFQ worker consumer.
    pub fn wire(self: &Arc<Self>, bus: &Arc<BusHub>) {
        let this = self.clone();
        let market_bus = bus.clone();
        bus.market.set_handler::<ServerOrder>(move |order| {
            this.on_server_order(order, &market_bus);
        });

        let this = self.clone();
        let market_bus = bus.clone();
        bus.market
            .set_handler::<InternalOrderStatus>(move |status| {
                this.on_internal_order_status(status, &market_bus);
            });
    }

    /// Inbound handling (spec §4.13 "Inbound (`ServerOrder`) handling").
    fn on_server_order(&self, order: ServerOrder, bus: &BusHub) {
        if order.order.price == 0 {
            bus.market.post(ServerOrderStatus {
                client_id: order.client_id,
                status: OrderStatus {
                    order_id: order.order.id,
                    timestamp: order.order.created,
                    quantity: order.order.quantity,
                    fill_price: 0,
                    state: OrderState::Rejected,
                },
            });
            return;
        }

        match order.order.action {
            OrderAction::Cancel | OrderAction::Modify => {
                self.on_cancel_or_modify(order, bus);
            }
            OrderAction::Buy | OrderAction::Sell => {
                self.on_new_order(order, bus);
            }
        }
    }

    fn on_cancel_or_modify(&self, order: ServerOrder, bus: &BusHub) {
        // The client addresses the order it wants to cancel/modify by the
        // system-ID it was told at acceptance time; `Order::id` carries
        // that value back on cancel/modify requests.
        let system_id = crate::ids::SystemOrderId::from_raw(order.order.id as u32);
        let matches_client = {
            let records = self.records.lock().unwrap();
            records
                .get(system_id)
                .is_some_and(|r| r.client_id == order.client_id && r.system_id == system_id)
        };
        if !matches_client {
            bus.market.post(ServerOrderStatus {
                client_id: order.client_id,
                status: OrderStatus {
                    order_id: order.order.id,
                    timestamp: order.order.created,
                    quantity: order.order.quantity,
                    fill_price: 0,
                    state: OrderState::Rejected,
                },
            });
            return;
        }
        bus.market.post(InternalOrderEvent {
            system_id,
            ticker: order.order.ticker,
            quantity: order.order.quantity,
            price: order.order.price,
            action: order.order.action,
        });
    }

    fn on_new_order(&self, order: ServerOrder, bus: &BusHub) {
        let Some(system_id) = self.ids.acquire() else {
            tracing::warn!("system order id pool exhausted, rejecting order");
            bus.market.post(ServerOrderStatus {
                client_id: order.client_id,
                status: OrderStatus {
                    order_id: order.order.id,
                    timestamp: order.order.created,
                    quantity: order.order.quantity,
                    fill_price: 0,
                    state: OrderState::Rejected,
                },
            });
            return;
        };

        {
            let mut records = self.records.lock().unwrap();
            records.insert(
                system_id,
                OrderRecord {
                    external_id: order.order.id,
                    system_id,
                    book_id: crate::ids::BookOrderId::INVALID,
                    client_id: order.client_id,
                    ticker: order.order.ticker,
                },
            );
        }

        bus.market.post(InternalOrderEvent {
            system_id,
            ticker: order.order.ticker,
            quantity: order.order.quantity,
            price: order.order.price,
            action: order.order.action,
        });
    }

    /// Outbound handling (spec §4.13 "Outbound (`InternalOrderStatus`)
    /// handling").
    fn on_internal_order_status(&self, status: InternalOrderStatus, bus: &BusHub) {
        let record = {
            let records = self.records.lock().unwrap();
            records.get(status.system_id).copied()
        };
        let Some(record) = record else {
            tracing::warn!("internal order status for unknown system id, dropping");
            return;
        };

        bus.market.post(ServerOrderStatus {
            client_id: record.client_id,
            status: OrderStatus {
                order_id: record.external_id,
                timestamp: 0,
                quantity: status.fill_qty,
                fill_price: status.fill_price,
                state: status.state,
            },
        });

        match status.state {
            OrderState::Accepted | OrderState::Partial => {
                let mut records = self.records.lock().unwrap();
                records.set_book_id(status.system_id, status.book_id);
            }
            OrderState::Rejected | OrderState::Cancelled | OrderState::Full => {
                let mut records = self.records.lock().unwrap();
                records.clear(status.system_id);
                self.ids.release(status.system_id);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::messages::Order;

    fn order(action: OrderAction, price: u32) -> ServerOrder {
        ServerOrder {
            client_id: 1,
            order: Order {
                id: 42,
                created: 0,
                ticker: *b"GOOG",
                quantity: 10,
                price,
                action,
            },
        }
    }

    #[test]
    fn zero_price_is_rejected_without_touching_the_id_pool() {
        let gateway = OrderGateway::new(AllocFlags::default()).unwrap();
        let bus = Arc::new(BusHub::new());
        gateway.wire(&bus);
        let seen = Arc::new(std::sync::Mutex::new(None));
        let seen2 = seen.clone();
        bus.market.set_handler::<ServerOrderStatus>(move |s| {
            *seen2.lock().unwrap() = Some(s.status.state);
        });

        bus.market.post(order(OrderAction::Buy, 0));
        assert_eq!(*seen.lock().unwrap(), Some(OrderState::Rejected));
    }

    #[test]
    fn new_order_allocates_a_system_id_and_emits_an_internal_event() {
        let gateway = OrderGateway::new(AllocFlags::default()).unwrap();
        let bus = Arc::new(BusHub::new());
        gateway.wire(&bus);
        let seen = Arc::new(std::sync::Mutex::new(None));
        let seen2 = seen.clone();
        bus.market.set_handler::<InternalOrderEvent>(move |e| {
            *seen2.lock().unwrap() = Some(e.system_id);
        });

        bus.market.post(order(OrderAction::Buy, 100));
        assert!(seen.lock().unwrap().unwrap().is_valid());
    }

    #[test]
    fn terminal_status_releases_the_system_id_for_reuse() {
        let gateway = OrderGateway::new(AllocFlags::default()).unwrap();
        let bus = Arc::new(BusHub::new());
        gateway.wire(&bus);
        let allocated = Arc::new(std::sync::Mutex::new(None));
        let allocated2 = allocated.clone();
        bus.market.set_handler::<InternalOrderEvent>(move |e| {
            *allocated2.lock().unwrap() = Some(e.system_id);
        });

        bus.market.post(order(OrderAction::Buy, 100));
        let system_id = allocated.lock().unwrap().unwrap();

        bus.market.post(InternalOrderStatus {
            system_id,
            book_id: crate::ids::BookOrderId::INVALID,
            fill_qty: 10,
            fill_price: 100,
            state: OrderState::Full,
        });

        let cleared = gateway.records.lock().unwrap().get(system_id).copied();
        assert_eq!(cleared, Some(OrderRecord::default()));
    }
}
