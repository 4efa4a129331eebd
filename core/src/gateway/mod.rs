//! Order gateway: system-ID allocation and the client ⇄ shard translation
//! boundary (spec §4.13).

mod gateway;
mod records;

pub use gateway::OrderGateway;
pub use records::{OrderRecord, OrderRecordTable};
