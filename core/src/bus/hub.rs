//! Bus hub: the three buses, held together (spec §4.10).
//!
//! There is no generic "route this type somewhere" dispatch here — each
//! bus only accepts the types it implements routing for ([`MarketRouted`],
//! [`StreamRouted`], or anything for the keyed/generic [`SystemBus`]).
//! `BusHub` just owns one of each and hands out shared references;
//! whether a given type goes to market or stream is decided by which
//! trait it implements, at compile time, in `market.rs`/`stream.rs`. A
//! type implementing both would be ambiguous, so the corpus of
//! message types in `wire::messages` is kept disjoint by construction —
//! each message type appears in exactly one of those two files' macro
//! invocations / trait impls.

use super::market::MarketBus;
use super::stream::StreamBus;
use super::system::SystemBus;

#[derive(Default)]
pub struct BusHub {
    pub market: MarketBus,
    pub stream: StreamBus,
    pub system: SystemBus,
}

impl BusHub {
    pub fn new() -> Self {
        Self::default()
    }
}
