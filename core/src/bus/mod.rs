//! Typed message bus: market (sync), stream (lock-free + timer-drained),
//! and system (cooperative, keyed) (spec §4.10).

pub mod hub;
pub mod market;
pub mod restricted;
pub mod stream;
pub mod system;

pub use hub::BusHub;
pub use market::{MarketBus, MarketRouted};
pub use restricted::{BroadcastView, DownstreamView, PostOn, RestrictedBus, UpstreamView};
pub use stream::{StreamBus, StreamRouted};
pub use system::{SubscriberId, SystemBus, SystemKey};
