//! Session lifecycle: login, token binding, and disconnect teardown
//! (spec §4.12).

mod manager;

pub use manager::{ChannelRegistry, Session, SessionManager};
