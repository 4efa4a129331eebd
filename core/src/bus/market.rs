//! Market bus: synchronous, compile-time-routed direct dispatch (spec §4.10).
//!
//! `post::<T>(msg)` calls the one handler registered for `T` directly, in
//! the caller's stack frame — no allocation, no queue. This is the hot
//! path: `Order → Gateway → Shard → Status`. A type is market-routed by
//! implementing [`MarketRouted`] for it; `post` only compiles for types
//! that do.

use crate::wire::messages::{
    ChannelOrder, InternalOrderEvent, InternalOrderStatus, ServerOrder, ServerOrderStatus, TickerPrice,
};
use std::sync::OnceLock;

type Handler<T> = Box<dyn Fn(T) + Send + Sync>;

/// Marks a type as carried by the market bus, and names the bus slot its
/// handler lives in. Each type gets exactly one slot: `MarketBus` has one
/// field per routed type, never a type-erased map, so registering a
/// handler twice for the same type is a compile-time-visible `OnceLock`
/// already-set condition rather than a silent overwrite.
pub trait MarketRouted: Sized + 'static {
    fn slot(bus: &MarketBus) -> &OnceLock<Handler<Self>>;
}

macro_rules! market_routed {
    ($ty:ty, $field:ident) => {
        impl MarketRouted for $ty {
            fn slot(bus: &MarketBus) -> &OnceLock<Handler<Self>> {
                &bus.$field
            }
        }
    };
}

#[derive(Default)]
pub struct MarketBus {
    channel_order: OnceLock<Handler<ChannelOrder>>,
    server_order: OnceLock<Handler<ServerOrder>>,
    internal_order_event: OnceLock<Handler<InternalOrderEvent>>,
    internal_order_status: OnceLock<Handler<InternalOrderStatus>>,
    server_order_status: OnceLock<Handler<ServerOrderStatus>>,
    ticker_price: OnceLock<Handler<TickerPrice>>,
}

market_routed!(ChannelOrder, channel_order);
market_routed!(ServerOrder, server_order);
market_routed!(InternalOrderEvent, internal_order_event);
market_routed!(InternalOrderStatus, internal_order_status);
market_routed!(ServerOrderStatus, server_order_status);
market_routed!(TickerPrice, ticker_price);

impl MarketBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the single handler for `T`. Subsequent calls for the
    /// same `T` are ignored — a market bus is wired once at startup.
    pub fn set_handler<T: MarketRouted>(&self, handler: impl Fn(T) + Send + Sync + 'static) {
        if T::slot(self).set(Box::new(handler)).is_err() {
            tracing::warn!("market bus handler already registered for this type, ignoring");
        }
    }

    /// Dispatches `msg` to its registered handler. A missing handler is a
    /// wiring bug, not a runtime condition a caller should branch on —
    /// it is logged and the message is dropped.
    pub fn post<T: MarketRouted>(&self, msg: T) {
        match T::slot(self).get() {
            Some(handler) => handler(msg),
            None => tracing::warn!("no market bus handler registered, dropping message"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[test]
    fn post_invokes_the_registered_handler() {
        let bus = MarketBus::new();
        let seen = Arc::new(AtomicU32::new(0));
        let seen2 = seen.clone();
        bus.set_handler::<TickerPrice>(move |p| {
            seen2.store(p.price, Ordering::SeqCst);
        });
        bus.post(TickerPrice {
            ticker: *b"GOOG",
            price: 42,
        });
        assert_eq!(seen.load(Ordering::SeqCst), 42);
    }

    #[test]
    fn post_without_a_handler_does_not_panic() {
        let bus = MarketBus::new();
        bus.post(TickerPrice {
            ticker: *b"GOOG",
            price: 1,
        });
    }
}
