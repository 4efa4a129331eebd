//! Domain message types (spec §3, §6).
//!
//! Wire-visible messages (`LoginRequest`, `LoginResponse`,
//! `TokenBindRequest`, `Order`, `OrderStatus`, `TickerPrice`) match the
//! field tables in spec §6 exactly. The remaining types are internal
//! hand-offs between components on the data-flow path in spec §2 and
//! never cross a wire — they carry typed slot IDs instead of raw `u64`s.

use crate::ids::{BookOrderId, SystemOrderId};

/// Fixed 4-byte ticker symbol (spec §3 "ticker (4-byte fixed)").
pub type Ticker = [u8; 4];

/// Order action (spec §6 wire table).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum OrderAction {
    Buy = 0,
    Sell = 1,
    Cancel = 2,
    Modify = 3,
}

impl OrderAction {
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(OrderAction::Buy),
            1 => Some(OrderAction::Sell),
            2 => Some(OrderAction::Cancel),
            3 => Some(OrderAction::Modify),
            _ => None,
        }
    }
}

/// Order lifecycle state reported back to the client (spec §6 wire table).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum OrderState {
    Accepted = 0,
    Rejected = 1,
    Partial = 2,
    Full = 3,
    Cancelled = 4,
}

impl OrderState {
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(OrderState::Accepted),
            1 => Some(OrderState::Rejected),
            2 => Some(OrderState::Partial),
            3 => Some(OrderState::Full),
            4 => Some(OrderState::Cancelled),
            _ => None,
        }
    }
}

/// client → server (spec §6).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LoginRequest {
    pub name: String,
    pub password: String,
}

/// server → client (spec §6).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LoginResponse {
    pub token: u64,
    pub ok: bool,
    pub error: String,
}

/// client → server, on the downstream channel (spec §6).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TokenBindRequest {
    pub token: u64,
}

/// client → server (spec §3, §6). Network-visible order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Order {
    pub id: u64,
    pub created: u64,
    pub ticker: Ticker,
    pub quantity: u32,
    pub price: u32,
    pub action: OrderAction,
}

/// server → client (spec §6).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OrderStatus {
    pub order_id: u64,
    pub timestamp: u64,
    pub quantity: u32,
    pub fill_price: u32,
    pub state: OrderState,
}

/// server → clients, UDP broadcast (spec §6).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TickerPrice {
    pub ticker: Ticker,
    pub price: u32,
}

/// Connection/channel lifecycle (spec §3 "Connection status event", §4.8).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LinkStatus {
    Connected,
    Disconnected,
    Error,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ConnectionStatusEvent {
    pub connection_id: u64,
    pub status: LinkStatus,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChannelStatusEvent {
    pub channel_id: u64,
    pub status: LinkStatus,
}

/// An inbound upstream `Order`, tagged with the channel it arrived on so
/// the session manager can look up the owning session and attach the
/// client's ID (spec §4.12 step 5, §2 data flow).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChannelOrder {
    pub channel_id: u64,
    pub order: Order,
}

/// An inbound `LoginRequest`, tagged with its originating upstream
/// channel (spec §4.12 step 2).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChannelLoginRequest {
    pub channel_id: u64,
    pub request: LoginRequest,
}

/// An inbound downstream `TokenBindRequest`, tagged with its channel
/// (spec §4.12 step 4).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChannelTokenBindRequest {
    pub channel_id: u64,
    pub request: TokenBindRequest,
}

/// An `Order` after the session manager has attached the sending client's
/// ID (spec §2 data flow, §4.12 step 5).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ServerOrder {
    pub client_id: u64,
    pub order: Order,
}

/// An `OrderStatus` after the gateway has re-attached the owning client's
/// ID (spec §4.13 outbound handling).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ServerOrderStatus {
    pub client_id: u64,
    pub status: OrderStatus,
}

/// The authenticator's reply to a `LoginRequest` published on the system
/// bus (spec §4.12 step 2). `error` is empty when `ok`; the credential
/// check itself is an external collaborator (spec §1) — this is just its
/// reply shape.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServerLoginResponse {
    pub connection_id: u64,
    pub client_id: u64,
    pub ok: bool,
    pub error: String,
}

/// Gateway → coordinator hand-off (spec §2 data flow). Carries the
/// gateway-allocated system ID instead of the client's raw order ID.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct InternalOrderEvent {
    pub system_id: SystemOrderId,
    pub ticker: Ticker,
    pub quantity: u32,
    pub price: u32,
    pub action: OrderAction,
}

/// Shard → gateway hand-off via the LFQ worker (spec §2 data flow, §4.15).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct InternalOrderStatus {
    pub system_id: SystemOrderId,
    pub book_id: BookOrderId,
    pub fill_qty: u32,
    pub fill_price: u32,
    pub state: OrderState,
}

/// System-wide lifecycle event (spec §4.14 "Startup").
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ServerEvent {
    Operational,
}

/// Published on the system bus for any subsystem-level failure (spec §7).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InternalError {
    pub code: u32,
    pub what: String,
}

/// Fixed-size telemetry record (SPEC_FULL §4.17).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TelemetryKind {
    RuntimeMetrics,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TelemetryRecord {
    pub timestamp_us: u64,
    pub rps: u32,
    pub orders_opened: u64,
    pub kind: TelemetryKind,
}
