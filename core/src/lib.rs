//! Core of the mock trading platform: transport, framing, the typed bus
//! hub, session management, the order gateway, and the sharded matching
//! engine (spec §2 "System overview").

use mimalloc::MiMalloc;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

pub mod affinity;
pub mod alloc;
pub mod buffer;
pub mod bus;
pub mod channel;
pub mod config;
pub mod console;
pub mod control;
pub mod error;
pub mod gateway;
pub mod ids;
pub mod lfq;
pub mod pricefeed;
pub mod queues;
pub mod session;
pub mod shard;
pub mod telemetry;
pub mod transport;
pub mod wire;

pub mod prelude {
    pub use crate::alloc::{AllocFlags, HugePageArray};
    pub use crate::bus::{BusHub, MarketBus, RestrictedBus, StreamBus, SystemBus};
    pub use crate::channel::{
        BroadcastChannel, BroadcastProtocol, Channel, ChannelProtocol, ChannelState,
        DownstreamChannel, DownstreamProtocol, UpstreamChannel, UpstreamProtocol,
    };
    pub use crate::config::Config;
    pub use crate::console::{parse as parse_console_command, ConsoleCommand};
    pub use crate::control::StopToken;
    pub use crate::error::{CoreError, CoreResult};
    pub use crate::gateway::OrderGateway;
    pub use crate::ids::{BookOrderId, SlotId, SlotIdPool, SystemOrderId};
    pub use crate::pricefeed::PriceFeed;
    pub use crate::session::{ChannelRegistry, Session, SessionManager};
    pub use crate::shard::{Coordinator, MarketData, OrderBook};
    pub use crate::telemetry::TelemetryDrain;
    pub use crate::transport::{NetworkFront, NetworkRegistry, Transport};
    pub use crate::wire::{Codec, FlatCodec, Framer, SbeCodec, WireMessage};
}
