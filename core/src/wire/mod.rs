//! Wire format: message types, codec, and framing (spec §4.5, §4.6, §6).

pub mod codec;
pub mod framer;
pub mod messages;

pub use codec::{Codec, FlatCodec, SbeCodec, WireMessage};
pub use framer::{DummyFramer, Framer};
