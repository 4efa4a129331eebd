//! Network front end (spec §4.7/§4.8, §5 "front-end network I/O uses a
//! single cooperative executor on the network thread").
//!
//! Binds the two TCP listeners (upstream commands, downstream
//! notifications) and the UDP broadcast socket, accepts connections, and
//! drives every resulting [`Channel`] to completion as a `spawn_local`
//! task on a single-threaded `tokio` runtime. [`NetworkRegistry`] is the
//! [`ChannelRegistry`] the session manager addresses channels through —
//! `send`/`close` only ever hand a message to the owning task's outbox,
//! so nothing outside the network thread ever touches a live `Channel`.

use crate::bus::BusHub;
use crate::buffer::BufferPool;
use crate::channel::{
    Channel, ChannelProtocol, ChannelState, DownstreamProtocol, OUT_BUFFER_SIZE, UpstreamProtocol,
};
use crate::config::NetworkConfig;
use crate::control::StopToken;
use crate::error::CoreResult;
use crate::session::ChannelRegistry;
use crate::transport::socket::{bind_tcp_listener, bind_udp_socket, TcpTransport, UdpTransport};
use crate::wire::messages::TickerPrice;
use crate::wire::{Codec, Framer, WireMessage};
use dashmap::DashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio::task::LocalSet;

/// Recv-buffer size for an accepted TCP channel; compaction keeps this
/// from growing, see `buffer::sliding`.
const RECV_BUFFER_CAPACITY: usize = 64 * 1024;
const OUTBOX_CAPACITY: usize = 256;
const OUT_POOL_CAPACITY: usize = 64;

/// [`ChannelRegistry`] backed by the outbox of whichever `spawn_local`
/// task owns the live channel. `send`/`close` are callable from any
/// thread (the gateway, the shard coordinator, the session manager);
/// they never block and never touch transport state directly.
#[derive(Default)]
pub struct NetworkRegistry {
    outboxes: DashMap<u64, mpsc::Sender<WireMessage>>,
}

impl NetworkRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn register(&self, channel_id: u64) -> mpsc::Receiver<WireMessage> {
        let (tx, rx) = mpsc::channel(OUTBOX_CAPACITY);
        self.outboxes.insert(channel_id, tx);
        rx
    }

    fn unregister(&self, channel_id: u64) {
        self.outboxes.remove(&channel_id);
    }
}

impl ChannelRegistry for NetworkRegistry {
    fn send(&self, channel_id: u64, msg: WireMessage) {
        let Some(outbox) = self.outboxes.get(&channel_id) else {
            return;
        };
        if outbox.try_send(msg).is_err() {
            tracing::warn!(channel_id, "channel outbox full or closed, dropping message");
        }
    }

    fn close(&self, channel_id: u64) {
        self.outboxes.remove(&channel_id);
    }
}

/// Shared codec/framer/buffer-pool state every accepted channel is built
/// from; cloning is cheap, each field is already an `Arc`.
struct ChannelMaterials {
    bus: Arc<BusHub>,
    pool: Arc<BufferPool<OUT_BUFFER_SIZE>>,
    codec: Arc<dyn Codec>,
    framer: Arc<Framer>,
}

impl Clone for ChannelMaterials {
    fn clone(&self) -> Self {
        ChannelMaterials {
            bus: self.bus.clone(),
            pool: self.pool.clone(),
            codec: self.codec.clone(),
            framer: self.framer.clone(),
        }
    }
}

/// Reads and dispatches inbound frames, and forwards whatever the
/// registry queues for this channel, until the transport closes, errors,
/// or `stop` fires. Intended to run as a `spawn_local` task.
async fn run_channel<P: ChannelProtocol>(
    mut channel: Channel<TcpTransport, P>,
    mut outbox: mpsc::Receiver<WireMessage>,
    channel_id: u64,
    registry: Arc<NetworkRegistry>,
    stop: StopToken,
) {
    loop {
        if stop.is_stopped() {
            break;
        }
        tokio::select! {
            read = channel.poll_read() => {
                if read.is_err() || channel.state() != ChannelState::Connected {
                    break;
                }
            }
            queued = outbox.recv() => {
                match queued {
                    Some(msg) if channel.send(msg).is_ok() => {}
                    _ => break,
                }
            }
        }
    }
    channel.close();
    registry.unregister(channel_id);
}

/// Accepts connections on `listener` forever, building a `P`-protocol
/// channel for each and spawning its `run_channel` task on the current
/// `LocalSet`. Returns once `stop` fires or the listener errors.
async fn accept_loop<P: ChannelProtocol + 'static>(
    listener: tokio::net::TcpListener,
    materials: ChannelMaterials,
    registry: Arc<NetworkRegistry>,
    next_channel_id: Arc<AtomicU64>,
    stop: StopToken,
) {
    loop {
        if stop.is_stopped() {
            return;
        }
        let (stream, peer) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(e) => {
                tracing::warn!(error = %e, "accept failed, continuing");
                continue;
            }
        };
        let transport = match TcpTransport::new(stream) {
            Ok(t) => t,
            Err(e) => {
                tracing::warn!(error = %e, "failed to configure accepted socket");
                continue;
            }
        };
        let channel_id = next_channel_id.fetch_add(1, Ordering::Relaxed);
        let outbox = registry.register(channel_id);
        let channel: Channel<TcpTransport, P> = Channel::new(
            channel_id,
            transport,
            materials.bus.clone(),
            materials.pool.clone(),
            materials.codec.clone(),
            materials.framer.clone(),
            RECV_BUFFER_CAPACITY,
        );
        tracing::info!(channel_id, %peer, "accepted connection");
        tokio::task::spawn_local(run_channel(channel, outbox, channel_id, registry.clone(), stop.clone()));
    }
}

/// Subscribes the market bus's `TickerPrice` slot to a UDP broadcast
/// send. There is exactly one broadcast channel, so this takes the
/// `Mutex` the generic `Channel::send` signature requires rather than
/// giving `BroadcastChannel` its own interior-mutability variant.
fn wire_broadcast(socket: tokio::net::UdpSocket, target: SocketAddr, materials: ChannelMaterials) {
    let transport = UdpTransport::new(socket, target);
    let channel = Mutex::new(Channel::<UdpTransport, crate::channel::BroadcastProtocol>::new(
        0,
        transport,
        materials.bus.clone(),
        materials.pool.clone(),
        materials.codec.clone(),
        materials.framer.clone(),
        0,
    ));
    materials.bus.market.set_handler::<TickerPrice>(move |price| {
        let mut channel = channel.lock().unwrap_or_else(|e| e.into_inner());
        if channel.send(WireMessage::TickerPrice(price)).is_err() {
            tracing::warn!("failed to broadcast ticker price over udp");
        }
    });
}

/// The bound upstream/downstream listeners and the materials every
/// accepted channel needs. Accept loops are not running yet — call
/// [`NetworkFront::run`] to spawn them onto a `LocalSet` driven by a
/// single-threaded runtime (spec §5's "single cooperative executor on
/// the network thread").
pub struct NetworkFront {
    up_listener: tokio::net::TcpListener,
    down_listener: tokio::net::TcpListener,
    materials: ChannelMaterials,
    registry: Arc<NetworkRegistry>,
}

impl NetworkFront {
    /// Binds every listener named in `config` and wires the broadcast
    /// socket. `registry` is constructed separately (it needs no `tokio`
    /// context) so callers can hand it to a [`SessionManager`] before the
    /// network thread — and the runtime binding these sockets requires —
    /// exists.
    ///
    /// [`SessionManager`]: crate::session::SessionManager
    pub fn bind(
        config: &NetworkConfig,
        bus: Arc<BusHub>,
        codec: Arc<dyn Codec>,
        framer: Arc<Framer>,
        registry: Arc<NetworkRegistry>,
    ) -> CoreResult<Self> {
        let up_addr: SocketAddr = format!("{}:{}", config.url, config.port_tcp_up)
            .parse()
            .map_err(|e| crate::error::CoreError::Configuration(format!("network.url/port_tcp_up: {e}")))?;
        let down_addr: SocketAddr = format!("{}:{}", config.url, config.port_tcp_down)
            .parse()
            .map_err(|e| crate::error::CoreError::Configuration(format!("network.url/port_tcp_down: {e}")))?;
        let udp_addr: SocketAddr = format!("{}:{}", config.url, config.port_udp)
            .parse()
            .map_err(|e| crate::error::CoreError::Configuration(format!("network.url/port_udp: {e}")))?;

        let up_listener = bind_tcp_listener(up_addr)
            .map_err(|e| crate::error::CoreError::Configuration(format!("binding upstream listener: {e}")))?;
        let down_listener = bind_tcp_listener(down_addr)
            .map_err(|e| crate::error::CoreError::Configuration(format!("binding downstream listener: {e}")))?;
        let broadcast_socket = bind_udp_socket("0.0.0.0:0".parse().unwrap())
            .map_err(|e| crate::error::CoreError::Configuration(format!("binding broadcast socket: {e}")))?;

        let materials = ChannelMaterials {
            bus,
            pool: Arc::new(BufferPool::new(OUT_POOL_CAPACITY)),
            codec,
            framer,
        };
        wire_broadcast(broadcast_socket, udp_addr, materials.clone());

        Ok(NetworkFront {
            up_listener,
            down_listener,
            materials,
            registry,
        })
    }

    pub fn registry(&self) -> Arc<NetworkRegistry> {
        self.registry.clone()
    }

    /// Spawns the upstream and downstream accept loops onto `local`.
    /// `local` itself must still be driven (`local.run_until(...)` or
    /// `LocalSet::await` inside a single-threaded `tokio` runtime) for
    /// these loops to make progress — spec §5 requires exactly one
    /// cooperative executor on this thread.
    pub fn run(self, local: &LocalSet, stop: StopToken) {
        let next_channel_id = Arc::new(AtomicU64::new(1));
        local.spawn_local(accept_loop::<UpstreamProtocol>(
            self.up_listener,
            self.materials.clone(),
            self.registry.clone(),
            next_channel_id.clone(),
            stop.clone(),
        ));
        local.spawn_local(accept_loop::<DownstreamProtocol>(
            self.down_listener,
            self.materials.clone(),
            self.registry.clone(),
            next_channel_id,
            stop.clone(),
        ));
    }
}
