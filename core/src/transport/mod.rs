//! Transport layer: socket and shared-memory implementations behind one
//! contract (spec §4.7), plus the shared-memory reactor (§4.9).

pub mod reactor;
pub mod server;
pub mod shm;
pub mod socket;
pub mod traits;

pub use reactor::ShmReactor;
pub use server::{NetworkFront, NetworkRegistry};
pub use shm::{ShmQueueKind, ShmRegion, ShmRing};
pub use socket::{bind_tcp_listener, bind_udp_socket, TcpTransport, UdpTransport};
pub use traits::{IoResult, Transport};
