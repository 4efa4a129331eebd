//! Crate-level integration tests for the end-to-end scenarios in spec §8:
//! login happy path, login failure, and a full order round trip through
//! the gateway and a sharded order book.

use hft_core::prelude::*;
use hft_core::wire::messages::{
    ChannelStatusEvent, LinkStatus, Order, OrderAction, OrderState, ServerLoginResponse,
    TokenBindRequest,
};
use hft_core::wire::WireMessage;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

struct RecordingRegistry {
    sent: Mutex<Vec<(u64, WireMessage)>>,
    closed: Mutex<Vec<u64>>,
}

impl RecordingRegistry {
    fn new() -> Arc<Self> {
        Arc::new(RecordingRegistry {
            sent: Mutex::new(Vec::new()),
            closed: Mutex::new(Vec::new()),
        })
    }
}

impl ChannelRegistry for RecordingRegistry {
    fn send(&self, channel_id: u64, msg: WireMessage) {
        self.sent.lock().unwrap().push((channel_id, msg));
    }
    fn close(&self, channel_id: u64) {
        self.closed.lock().unwrap().push(channel_id);
    }
}

fn wait_until(deadline_ms: u64, mut done: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_millis(deadline_ms);
    while !done() && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(1));
    }
    done()
}

#[test]
fn successful_login_then_bind_creates_a_routable_session() {
    let registry = RecordingRegistry::new();
    let manager = SessionManager::new(registry.clone());
    let bus = Arc::new(BusHub::new());
    manager.wire(&bus);

    manager.on_channel_connected(1, true);
    bus.system.post(ServerLoginResponse {
        connection_id: 1,
        client_id: 7,
        ok: true,
        error: String::new(),
    });
    bus.system.poll();
    assert_eq!(manager.session_count(), 1);

    let token = match &registry.sent.lock().unwrap()[0].1 {
        WireMessage::LoginResponse(r) => {
            assert!(r.ok);
            r.token
        }
        _ => panic!("expected a LoginResponse"),
    };

    manager.on_channel_connected(2, false);
    bus.system.post(hft_core::wire::messages::ChannelTokenBindRequest {
        channel_id: 2,
        request: TokenBindRequest { token },
    });
    bus.system.poll();

    assert!(manager.attach_client_id(1).is_some());
}

#[test]
fn failed_login_closes_the_channel_and_creates_no_session() {
    let registry = RecordingRegistry::new();
    let manager = SessionManager::new(registry.clone());
    let bus = Arc::new(BusHub::new());
    manager.wire(&bus);

    manager.on_channel_connected(1, true);
    bus.system.post(ServerLoginResponse {
        connection_id: 1,
        client_id: 0,
        ok: false,
        error: "AuthUserNotFound".to_string(),
    });
    bus.system.poll();

    assert_eq!(manager.session_count(), 0);
    assert_eq!(registry.closed.lock().unwrap().as_slice(), &[1]);
}

/// Full round trip: a logged-in, bound client submits a buy that crosses
/// a resting sell already in the book, and receives a `Full` status back
/// on its downstream channel — spec §2's data flow end to end, through
/// real gateway/coordinator/shard threads (not direct function calls).
#[test]
fn an_order_that_crosses_a_resting_order_delivers_a_full_status_downstream() {
    let registry = RecordingRegistry::new();
    let manager = SessionManager::new(registry.clone());
    let bus = Arc::new(BusHub::new());
    manager.wire(&bus);

    let gateway = OrderGateway::new(AllocFlags::default()).unwrap();
    gateway.wire(&bus);

    let tickers = [*b"GOOG"];
    let market_data = Arc::new(MarketData::assign(&tickers, 1));
    let stop = StopToken::new();
    let _coordinator =
        Coordinator::start(market_data, &bus, &[None], Duration::from_secs(3600), stop.clone())
            .unwrap();

    manager.on_channel_connected(1, true);
    bus.system.post(ServerLoginResponse {
        connection_id: 1,
        client_id: 99,
        ok: true,
        error: String::new(),
    });
    bus.system.poll();
    let token = match &registry.sent.lock().unwrap()[0].1 {
        WireMessage::LoginResponse(r) => r.token,
        _ => panic!("expected a LoginResponse"),
    };
    manager.on_channel_connected(2, false);
    bus.system.post(hft_core::wire::messages::ChannelTokenBindRequest {
        channel_id: 2,
        request: TokenBindRequest { token },
    });
    bus.system.poll();

    // A resting sell for 10 @ 100, then a crossing buy for 10 @ 100.
    bus.market.post(
        hft_core::wire::messages::ChannelOrder {
            channel_id: 1,
            order: Order {
                id: 1,
                created: 0,
                ticker: *b"GOOG",
                quantity: 10,
                price: 100,
                action: OrderAction::Sell,
            },
        },
    );

    let found = wait_until(2000, || {
        registry
            .sent
            .lock()
            .unwrap()
            .iter()
            .any(|(_, m)| matches!(m, WireMessage::OrderStatus(_)))
    });
    assert!(found, "expected at least the resting sell's Accepted status");
    registry.sent.lock().unwrap().clear();

    bus.market.post(
        hft_core::wire::messages::ChannelOrder {
            channel_id: 1,
            order: Order {
                id: 2,
                created: 0,
                ticker: *b"GOOG",
                quantity: 10,
                price: 100,
                action: OrderAction::Buy,
            },
        },
    );

    let saw_full = wait_until(2000, || {
        registry.sent.lock().unwrap().iter().any(|(_, m)| {
            matches!(m, WireMessage::OrderStatus(s) if s.state == OrderState::Full)
        })
    });
    assert!(saw_full, "expected the crossing buy to receive a Full status");

    stop.stop();
}

#[test]
fn disconnect_mid_session_is_visible_to_future_attach_lookups() {
    let registry = RecordingRegistry::new();
    let manager = SessionManager::new(registry.clone());
    let bus = Arc::new(BusHub::new());
    manager.wire(&bus);

    manager.on_channel_connected(1, true);
    bus.system.post(ServerLoginResponse {
        connection_id: 1,
        client_id: 5,
        ok: true,
        error: String::new(),
    });
    bus.system.poll();
    assert!(manager.attach_client_id(1).is_some());

    bus.system.post(ChannelStatusEvent {
        channel_id: 1,
        status: LinkStatus::Disconnected,
    });
    bus.system.poll();

    assert_eq!(manager.session_count(), 0);
    assert!(manager.attach_client_id(1).is_none());
}
