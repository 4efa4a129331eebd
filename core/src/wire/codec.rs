//! Pluggable wire codec (spec §4.6).
//!
//! `Codec` is the serialization strategy: domain object ↔ bytes. Two
//! implementations are provided, matching the two flavors spec §4.6
//! names: [`FlatCodec`] (compact, variable-length, tag + length-prefixed
//! strings — used behind the length-prefixed [`super::framer::Framer`])
//! and [`SbeCodec`] (fixed-size, self-delimiting per message tag — used
//! behind [`super::framer::DummyFramer`]).

use super::messages::*;

const MAX_NAME_LEN: usize = 32;

fn write_bounded_string(s: &str, out: &mut [u8]) -> usize {
    let bytes = s.as_bytes();
    let len = bytes.len().min(MAX_NAME_LEN);
    out[0] = len as u8;
    out[1..1 + len].copy_from_slice(&bytes[..len]);
    1 + len
}

fn read_bounded_string(bytes: &[u8]) -> Option<(String, usize)> {
    let len = *bytes.first()? as usize;
    if len > MAX_NAME_LEN || bytes.len() < 1 + len {
        return None;
    }
    let s = std::str::from_utf8(&bytes[1..1 + len]).ok()?.to_string();
    Some((s, 1 + len))
}

/// One byte identifying a message's wire shape, shared by both codecs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
enum Tag {
    LoginRequest = 1,
    LoginResponse = 2,
    TokenBindRequest = 3,
    Order = 4,
    OrderStatus = 5,
    TickerPrice = 6,
}

impl Tag {
    fn of(msg: &WireMessage) -> Tag {
        match msg {
            WireMessage::LoginRequest(_) => Tag::LoginRequest,
            WireMessage::LoginResponse(_) => Tag::LoginResponse,
            WireMessage::TokenBindRequest(_) => Tag::TokenBindRequest,
            WireMessage::Order(_) => Tag::Order,
            WireMessage::OrderStatus(_) => Tag::OrderStatus,
            WireMessage::TickerPrice(_) => Tag::TickerPrice,
        }
    }

    fn from_u8(v: u8) -> Option<Tag> {
        match v {
            1 => Some(Tag::LoginRequest),
            2 => Some(Tag::LoginResponse),
            3 => Some(Tag::TokenBindRequest),
            4 => Some(Tag::Order),
            5 => Some(Tag::OrderStatus),
            6 => Some(Tag::TickerPrice),
            _ => None,
        }
    }
}

/// Tagged union of every message this crate frames on the wire.
#[derive(Clone, Debug, PartialEq)]
pub enum WireMessage {
    LoginRequest(LoginRequest),
    LoginResponse(LoginResponse),
    TokenBindRequest(TokenBindRequest),
    Order(Order),
    OrderStatus(OrderStatus),
    TickerPrice(TickerPrice),
}

/// Serialization strategy: domain object ↔ bytes (spec §4.6).
pub trait Codec: Send + Sync {
    /// Writes `msg` into `out`, returning the number of bytes written.
    /// Panics if `out` is too small — callers size their buffer from the
    /// buffer pool's fixed slot size, which is chosen to fit every
    /// message this crate frames.
    fn serialize(&self, msg: &WireMessage, out: &mut [u8]) -> usize;

    /// Attempts to parse one message from the front of `bytes`. Returns
    /// `Some((message, consumed))` on success, `None` if `bytes` is not
    /// (yet) a complete message.
    fn deserialize(&self, bytes: &[u8]) -> Option<(WireMessage, usize)>;
}

/// Compact variable-length encoding: `[tag:u8][type-specific body]`,
/// strings as a 1-byte length prefix followed by that many bytes. Used
/// behind the length-prefixed framer, which supplies the overall
/// message boundary, so this codec does not need to be self-delimiting.
#[derive(Default)]
pub struct FlatCodec;

impl Codec for FlatCodec {
    fn serialize(&self, msg: &WireMessage, out: &mut [u8]) -> usize {
        out[0] = Tag::of(msg) as u8;
        let body = &mut out[1..];
        1 + match msg {
            WireMessage::LoginRequest(m) => {
                let n = write_bounded_string(&m.name, body);
                n + write_bounded_string(&m.password, &mut body[n..])
            }
            WireMessage::LoginResponse(m) => {
                body[0..8].copy_from_slice(&m.token.to_le_bytes());
                body[8] = m.ok as u8;
                9 + write_bounded_string(&m.error, &mut body[9..])
            }
            WireMessage::TokenBindRequest(m) => {
                body[0..8].copy_from_slice(&m.token.to_le_bytes());
                8
            }
            WireMessage::Order(m) => {
                body[0..8].copy_from_slice(&m.id.to_le_bytes());
                body[8..16].copy_from_slice(&m.created.to_le_bytes());
                body[16..20].copy_from_slice(&m.ticker);
                body[20..24].copy_from_slice(&m.quantity.to_le_bytes());
                body[24..28].copy_from_slice(&m.price.to_le_bytes());
                body[28] = m.action as u8;
                29
            }
            WireMessage::OrderStatus(m) => {
                body[0..8].copy_from_slice(&m.order_id.to_le_bytes());
                body[8..16].copy_from_slice(&m.timestamp.to_le_bytes());
                body[16..20].copy_from_slice(&m.quantity.to_le_bytes());
                body[20..24].copy_from_slice(&m.fill_price.to_le_bytes());
                body[24] = m.state as u8;
                25
            }
            WireMessage::TickerPrice(m) => {
                body[0..4].copy_from_slice(&m.ticker);
                body[4..8].copy_from_slice(&m.price.to_le_bytes());
                8
            }
        }
    }

    fn deserialize(&self, bytes: &[u8]) -> Option<(WireMessage, usize)> {
        let tag = Tag::from_u8(*bytes.first()?)?;
        let body = &bytes[1..];
        let (msg, body_len) = match tag {
            Tag::LoginRequest => {
                let (name, n1) = read_bounded_string(body)?;
                let (password, n2) = read_bounded_string(&body[n1..])?;
                (
                    WireMessage::LoginRequest(LoginRequest { name, password }),
                    n1 + n2,
                )
            }
            Tag::LoginResponse => {
                if body.len() < 9 {
                    return None;
                }
                let token = u64::from_le_bytes(body[0..8].try_into().unwrap());
                let ok = body[8] != 0;
                let (error, n) = read_bounded_string(&body[9..])?;
                (
                    WireMessage::LoginResponse(LoginResponse { token, ok, error }),
                    9 + n,
                )
            }
            Tag::TokenBindRequest => {
                if body.len() < 8 {
                    return None;
                }
                let token = u64::from_le_bytes(body[0..8].try_into().unwrap());
                (WireMessage::TokenBindRequest(TokenBindRequest { token }), 8)
            }
            Tag::Order => {
                if body.len() < 29 {
                    return None;
                }
                let id = u64::from_le_bytes(body[0..8].try_into().unwrap());
                let created = u64::from_le_bytes(body[8..16].try_into().unwrap());
                let ticker: Ticker = body[16..20].try_into().unwrap();
                let quantity = u32::from_le_bytes(body[20..24].try_into().unwrap());
                let price = u32::from_le_bytes(body[24..28].try_into().unwrap());
                let action = OrderAction::from_u8(body[28])?;
                (
                    WireMessage::Order(Order {
                        id,
                        created,
                        ticker,
                        quantity,
                        price,
                        action,
                    }),
                    29,
                )
            }
            Tag::OrderStatus => {
                if body.len() < 25 {
                    return None;
                }
                let order_id = u64::from_le_bytes(body[0..8].try_into().unwrap());
                let timestamp = u64::from_le_bytes(body[8..16].try_into().unwrap());
                let quantity = u32::from_le_bytes(body[16..20].try_into().unwrap());
                let fill_price = u32::from_le_bytes(body[20..24].try_into().unwrap());
                let state = OrderState::from_u8(body[24])?;
                (
                    WireMessage::OrderStatus(OrderStatus {
                        order_id,
                        timestamp,
                        quantity,
                        fill_price,
                        state,
                    }),
                    25,
                )
            }
            Tag::TickerPrice => {
                if body.len() < 8 {
                    return None;
                }
                let ticker: Ticker = body[0..4].try_into().unwrap();
                let price = u32::from_le_bytes(body[4..8].try_into().unwrap());
                (WireMessage::TickerPrice(TickerPrice { ticker, price }), 8)
            }
        };
        Some((msg, 1 + body_len))
    }
}

/// Fixed-width, self-delimiting encoding: every instance of a given tag
/// has the same total length, so `deserialize` can tell from the tag byte
/// alone whether `bytes` holds a complete record — no external length
/// prefix needed. Strings are padded to their max length.
#[derive(Default)]
pub struct SbeCodec;

const SBE_STRING_FIELD: usize = 1 + MAX_NAME_LEN;
const SBE_LOGIN_REQUEST_LEN: usize = 1 + SBE_STRING_FIELD * 2;
const SBE_LOGIN_RESPONSE_LEN: usize = 1 + 8 + 1 + SBE_STRING_FIELD;
const SBE_TOKEN_BIND_LEN: usize = 1 + 8;
const SBE_ORDER_LEN: usize = 1 + 29;
const SBE_ORDER_STATUS_LEN: usize = 1 + 25;
const SBE_TICKER_PRICE_LEN: usize = 1 + 8;

fn sbe_write_string(s: &str, out: &mut [u8]) {
    let bytes = s.as_bytes();
    let len = bytes.len().min(MAX_NAME_LEN);
    out[0] = len as u8;
    out[1..1 + len].copy_from_slice(&bytes[..len]);
    for b in &mut out[1 + len..SBE_STRING_FIELD] {
        *b = 0;
    }
}

fn sbe_read_string(bytes: &[u8]) -> Option<String> {
    let len = *bytes.first()? as usize;
    if len > MAX_NAME_LEN {
        return None;
    }
    Some(std::str::from_utf8(&bytes[1..1 + len]).ok()?.to_string())
}

impl Codec for SbeCodec {
    fn serialize(&self, msg: &WireMessage, out: &mut [u8]) -> usize {
        out[0] = Tag::of(msg) as u8;
        let body = &mut out[1..];
        match msg {
            WireMessage::LoginRequest(m) => {
                sbe_write_string(&m.name, &mut body[0..SBE_STRING_FIELD]);
                sbe_write_string(&m.password, &mut body[SBE_STRING_FIELD..2 * SBE_STRING_FIELD]);
                SBE_LOGIN_REQUEST_LEN
            }
            WireMessage::LoginResponse(m) => {
                body[0..8].copy_from_slice(&m.token.to_le_bytes());
                body[8] = m.ok as u8;
                sbe_write_string(&m.error, &mut body[9..9 + SBE_STRING_FIELD]);
                SBE_LOGIN_RESPONSE_LEN
            }
            WireMessage::TokenBindRequest(m) => {
                body[0..8].copy_from_slice(&m.token.to_le_bytes());
                SBE_TOKEN_BIND_LEN
            }
            WireMessage::Order(m) => {
                body[0..8].copy_from_slice(&m.id.to_le_bytes());
                body[8..16].copy_from_slice(&m.created.to_le_bytes());
                body[16..20].copy_from_slice(&m.ticker);
                body[20..24].copy_from_slice(&m.quantity.to_le_bytes());
                body[24..28].copy_from_slice(&m.price.to_le_bytes());
                body[28] = m.action as u8;
                SBE_ORDER_LEN
            }
            WireMessage::OrderStatus(m) => {
                body[0..8].copy_from_slice(&m.order_id.to_le_bytes());
                body[8..16].copy_from_slice(&m.timestamp.to_le_bytes());
                body[16..20].copy_from_slice(&m.quantity.to_le_bytes());
                body[20..24].copy_from_slice(&m.fill_price.to_le_bytes());
                body[24] = m.state as u8;
                SBE_ORDER_STATUS_LEN
            }
            WireMessage::TickerPrice(m) => {
                body[0..4].copy_from_slice(&m.ticker);
                body[4..8].copy_from_slice(&m.price.to_le_bytes());
                SBE_TICKER_PRICE_LEN
            }
        }
    }

    fn deserialize(&self, bytes: &[u8]) -> Option<(WireMessage, usize)> {
        let tag = Tag::from_u8(*bytes.first()?)?;
        let total_len = match tag {
            Tag::LoginRequest => SBE_LOGIN_REQUEST_LEN,
            Tag::LoginResponse => SBE_LOGIN_RESPONSE_LEN,
            Tag::TokenBindRequest => SBE_TOKEN_BIND_LEN,
            Tag::Order => SBE_ORDER_LEN,
            Tag::OrderStatus => SBE_ORDER_STATUS_LEN,
            Tag::TickerPrice => SBE_TICKER_PRICE_LEN,
        };
        if bytes.len() < total_len {
            return None;
        }
        let body = &bytes[1..total_len];
        let msg = match tag {
            Tag::LoginRequest => WireMessage::LoginRequest(LoginRequest {
                name: sbe_read_string(&body[0..SBE_STRING_FIELD])?,
                password: sbe_read_string(&body[SBE_STRING_FIELD..2 * SBE_STRING_FIELD])?,
            }),
            Tag::LoginResponse => WireMessage::LoginResponse(LoginResponse {
                token: u64::from_le_bytes(body[0..8].try_into().unwrap()),
                ok: body[8] != 0,
                error: sbe_read_string(&body[9..9 + SBE_STRING_FIELD])?,
            }),
            Tag::TokenBindRequest => WireMessage::TokenBindRequest(TokenBindRequest {
                token: u64::from_le_bytes(body[0..8].try_into().unwrap()),
            }),
            Tag::Order => WireMessage::Order(Order {
                id: u64::from_le_bytes(body[0..8].try_into().unwrap()),
                created: u64::from_le_bytes(body[8..16].try_into().unwrap()),
                ticker: body[16..20].try_into().unwrap(),
                quantity: u32::from_le_bytes(body[20..24].try_into().unwrap()),
                price: u32::from_le_bytes(body[24..28].try_into().unwrap()),
                action: OrderAction::from_u8(body[28])?,
            }),
            Tag::OrderStatus => WireMessage::OrderStatus(OrderStatus {
                order_id: u64::from_le_bytes(body[0..8].try_into().unwrap()),
                timestamp: u64::from_le_bytes(body[8..16].try_into().unwrap()),
                quantity: u32::from_le_bytes(body[16..20].try_into().unwrap()),
                fill_price: u32::from_le_bytes(body[20..24].try_into().unwrap()),
                state: OrderState::from_u8(body[24])?,
            }),
            Tag::TickerPrice => WireMessage::TickerPrice(TickerPrice {
                ticker: body[0..4].try_into().unwrap(),
                price: u32::from_le_bytes(body[4..8].try_into().unwrap()),
            }),
        };
        Some((msg, total_len))
    }
}
