//! Restricted bus view (spec §4.10 "Restricted bus view").
//!
//! Pins a channel to the exact set of message types its session is
//! allowed to produce. `RestrictedBus<View>::post::<T>` only compiles if
//! `T: PostOn<View>` — posting any other type from that channel is a
//! compile-time rejection, not a runtime check.

use super::hub::BusHub;
use super::system::SystemKey;
use crate::wire::messages::{
    ChannelLoginRequest, ChannelOrder, ChannelStatusEvent, ChannelTokenBindRequest,
    ConnectionStatusEvent, LoginResponse, ServerOrderStatus, TickerPrice,
};
use std::marker::PhantomData;

impl SystemKey for ChannelLoginRequest {}
impl SystemKey for LoginResponse {}
impl SystemKey for ChannelStatusEvent {}
impl SystemKey for ConnectionStatusEvent {}
impl SystemKey for ChannelTokenBindRequest {}

/// Routes `Self` to whichever bus in `hub` carries it, for view `View`.
pub trait PostOn<View>: Sized {
    fn post_on(self, hub: &BusHub);
}

/// The upstream (command-flow) channel's allowed event set.
pub struct UpstreamView;
/// The downstream (notification-flow) channel's allowed event set.
pub struct DownstreamView;
/// The UDP broadcast channel's allowed event set.
pub struct BroadcastView;

macro_rules! via_market {
    ($view:ty, $ty:ty) => {
        impl PostOn<$view> for $ty {
            fn post_on(self, hub: &BusHub) {
                hub.market.post(self);
            }
        }
    };
}

macro_rules! via_system {
    ($view:ty, $ty:ty) => {
        impl PostOn<$view> for $ty {
            fn post_on(self, hub: &BusHub) {
                hub.system.post(self);
            }
        }
    };
}

via_market!(UpstreamView, ChannelOrder);
via_system!(UpstreamView, ChannelLoginRequest);
via_system!(UpstreamView, LoginResponse);
via_system!(UpstreamView, ChannelStatusEvent);
via_system!(UpstreamView, ConnectionStatusEvent);

via_system!(DownstreamView, ChannelTokenBindRequest);
via_system!(DownstreamView, LoginResponse);
via_market!(DownstreamView, ServerOrderStatus);
via_system!(DownstreamView, ChannelStatusEvent);
via_system!(DownstreamView, ConnectionStatusEvent);

via_market!(BroadcastView, TickerPrice);

pub struct RestrictedBus<'a, View> {
    hub: &'a BusHub,
    _marker: PhantomData<View>,
}

impl<'a, View> RestrictedBus<'a, View> {
    pub fn new(hub: &'a BusHub) -> Self {
        RestrictedBus {
            hub,
            _marker: PhantomData,
        }
    }

    pub fn post<T: PostOn<View>>(&self, msg: T) {
        msg.post_on(self.hub);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upstream_view_posts_channel_order_through_market_bus() {
        let hub = BusHub::new();
        let seen = std::sync::Arc::new(std::sync::atomic::AtomicU64::new(0));
        let seen2 = seen.clone();
        hub.market.set_handler::<ChannelOrder>(move |o| {
            seen2.store(o.order.id, std::sync::atomic::Ordering::SeqCst);
        });
        let view: RestrictedBus<UpstreamView> = RestrictedBus::new(&hub);
        view.post(ChannelOrder {
            channel_id: 1,
            order: crate::wire::messages::Order {
                id: 7,
                created: 0,
                ticker: *b"GOOG",
                quantity: 1,
                price: 1,
                action: crate::wire::messages::OrderAction::Buy,
            },
        });
        assert_eq!(seen.load(std::sync::atomic::Ordering::SeqCst), 7);
    }

    #[test]
    fn downstream_view_posts_login_response_through_system_bus() {
        let hub = BusHub::new();
        let seen = std::sync::Arc::new(std::sync::Mutex::new(None));
        let seen2 = seen.clone();
        hub.system.subscribe::<LoginResponse>(move |r| {
            *seen2.lock().unwrap() = Some(r.token);
        });
        let view: RestrictedBus<DownstreamView> = RestrictedBus::new(&hub);
        view.post(LoginResponse {
            token: 5,
            ok: true,
            error: String::new(),
        });
        hub.system.poll();
        assert_eq!(*seen.lock().unwrap(), Some(5));
    }
}
