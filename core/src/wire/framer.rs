//! Message framing over a [`SlidingBuffer`] (spec §4.5, §4.6).
//!
//! A framer turns a byte stream from [`SlidingBuffer::data`] into a
//! sequence of codec messages, and turns an outbound message into bytes
//! plus whatever header the wire format needs. Two strategies are
//! provided, matching the two codecs in [`super::codec`]:
//!
//! - [`Framer`]: a 2-byte little-endian length prefix in front of
//!   whatever the codec serializes. Works with any codec, including
//!   [`FlatCodec`](super::codec::FlatCodec), which does not delimit its
//!   own output.
//! - [`DummyFramer`]: no header at all — it hands the whole readable
//!   slice to the codec and trusts the codec to report how much of it
//!   one message consumed. Only correct with a self-delimiting codec
//!   such as [`SbeCodec`](super::codec::SbeCodec).

use super::codec::{Codec, WireMessage};
use crate::error::{CoreError, CoreResult};

const LENGTH_HEADER: usize = 2;

/// Length-prefixed framer: `[len: u16 LE][codec body]`.
pub struct Framer {
    max_frame: usize,
}

impl Framer {
    pub fn new(max_frame: usize) -> Self {
        Framer { max_frame }
    }

    /// Writes one framed message into `out`, returning the number of
    /// bytes written. `codec` controls the body encoding.
    pub fn write(&self, codec: &dyn Codec, msg: &WireMessage, out: &mut [u8]) -> CoreResult<usize> {
        let body_len = codec.serialize(msg, &mut out[LENGTH_HEADER..]);
        if body_len > self.max_frame {
            return Err(CoreError::OversizeFrame {
                body_size: body_len,
                limit: self.max_frame,
            });
        }
        out[0..LENGTH_HEADER].copy_from_slice(&(body_len as u16).to_le_bytes());
        Ok(LENGTH_HEADER + body_len)
    }

    /// Attempts to read one framed message from the front of `bytes`.
    /// Returns `Some((message, consumed))` once a whole frame — header
    /// plus body — is present, `None` if more bytes are needed.
    pub fn read(&self, codec: &dyn Codec, bytes: &[u8]) -> CoreResult<Option<(WireMessage, usize)>> {
        if bytes.len() < LENGTH_HEADER {
            return Ok(None);
        }
        let body_len = u16::from_le_bytes(bytes[0..LENGTH_HEADER].try_into().unwrap()) as usize;
        if body_len > self.max_frame {
            return Err(CoreError::OversizeFrame {
                body_size: body_len,
                limit: self.max_frame,
            });
        }
        if bytes.len() < LENGTH_HEADER + body_len {
            return Ok(None);
        }
        let body = &bytes[LENGTH_HEADER..LENGTH_HEADER + body_len];
        let (msg, consumed) = codec
            .deserialize(body)
            .ok_or(CoreError::CodecError { what: "length-prefixed body failed to parse" })?;
        Ok(Some((msg, LENGTH_HEADER + consumed)))
    }
}

/// Header-free framer for self-delimiting codecs.
#[derive(Default)]
pub struct DummyFramer;

impl DummyFramer {
    pub fn write(&self, codec: &dyn Codec, msg: &WireMessage, out: &mut [u8]) -> usize {
        codec.serialize(msg, out)
    }

    /// Returns `Some((message, consumed))` if `bytes` holds a complete
    /// self-delimited record, `None` if the codec needs more bytes.
    pub fn read(&self, codec: &dyn Codec, bytes: &[u8]) -> Option<(WireMessage, usize)> {
        codec.deserialize(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::codec::{FlatCodec, SbeCodec};
    use crate::wire::messages::*;

    #[test]
    fn length_prefixed_framer_round_trips_a_single_message() {
        let framer = Framer::new(256);
        let codec = FlatCodec;
        let msg = WireMessage::TickerPrice(TickerPrice {
            ticker: *b"GOOG",
            price: 101,
        });
        let mut buf = [0u8; 256];
        let n = framer.write(&codec, &msg, &mut buf).unwrap();
        let (parsed, consumed) = framer.read(&codec, &buf[..n]).unwrap().unwrap();
        assert_eq!(consumed, n);
        assert_eq!(parsed, msg);
    }

    #[test]
    fn length_prefixed_framer_needs_more_bytes_returns_none() {
        let framer = Framer::new(256);
        let codec = FlatCodec;
        let msg = WireMessage::TokenBindRequest(TokenBindRequest { token: 1 });
        let mut buf = [0u8; 256];
        let n = framer.write(&codec, &msg, &mut buf).unwrap();
        assert!(framer.read(&codec, &buf[..n - 1]).unwrap().is_none());
    }

    #[test]
    fn length_prefixed_framer_parses_back_to_back_messages() {
        let framer = Framer::new(256);
        let codec = FlatCodec;
        let a = WireMessage::TokenBindRequest(TokenBindRequest { token: 1 });
        let b = WireMessage::TokenBindRequest(TokenBindRequest { token: 2 });
        let mut buf = [0u8; 256];
        let n1 = framer.write(&codec, &a, &mut buf).unwrap();
        let n2 = framer.write(&codec, &b, &mut buf[n1..]).unwrap();

        let (parsed_a, consumed_a) = framer.read(&codec, &buf[..n1 + n2]).unwrap().unwrap();
        assert_eq!(parsed_a, a);
        let (parsed_b, consumed_b) = framer
            .read(&codec, &buf[consumed_a..n1 + n2])
            .unwrap()
            .unwrap();
        assert_eq!(parsed_b, b);
        assert_eq!(consumed_a, n1);
        assert_eq!(consumed_b, n2);
    }

    #[test]
    fn oversize_frame_is_rejected_on_write() {
        let framer = Framer::new(4);
        let codec = FlatCodec;
        let msg = WireMessage::TokenBindRequest(TokenBindRequest { token: 1 });
        let mut buf = [0u8; 256];
        assert!(matches!(
            framer.write(&codec, &msg, &mut buf),
            Err(CoreError::OversizeFrame { .. })
        ));
    }

    #[test]
    fn dummy_framer_round_trips_with_sbe_codec() {
        let framer = DummyFramer;
        let codec = SbeCodec;
        let msg = WireMessage::Order(Order {
            id: 1,
            created: 2,
            ticker: *b"GOOG",
            quantity: 10,
            price: 100,
            action: OrderAction::Buy,
        });
        let mut buf = [0u8; 256];
        let n = framer.write(&codec, &msg, &mut buf);
        let (parsed, consumed) = framer.read(&codec, &buf[..n]).unwrap();
        assert_eq!(consumed, n);
        assert_eq!(parsed, msg);
    }

    #[test]
    fn dummy_framer_reports_none_on_truncated_record() {
        let framer = DummyFramer;
        let codec = SbeCodec;
        let msg = WireMessage::TokenBindRequest(TokenBindRequest { token: 1 });
        let mut buf = [0u8; 256];
        let n = framer.write(&codec, &msg, &mut buf);
        assert!(framer.read(&codec, &buf[..n - 1]).is_none());
    }
}
