//! Channel: pairs one transport with a restricted bus view (spec §4.8).
//!
//! On read completion, bytes flow transport → sliding buffer → framer →
//! codec → bus. On write, the caller hands over a [`WireMessage`]; the
//! channel leases a buffer from the shared pool, frames into it, writes
//! it out, and releases the lease. State transitions
//! (`Connected`/`Disconnected`/`Error`) publish a [`ChannelStatusEvent`].
//!
//! Which inbound message types a channel accepts, and which bus each one
//! routes to, is fixed per direction by a [`ChannelProtocol`] — tagged by
//! type rather than decided at runtime, per the "prefer tagged variants"
//! guidance for re-architecting the source's channel/bus templating.

use crate::bus::{BroadcastView, BusHub, DownstreamView, PostOn, RestrictedBus, UpstreamView};
use crate::buffer::{BufferPool, SlidingBuffer};
use crate::error::{CoreError, CoreResult};
use crate::transport::Transport;
use crate::wire::{Codec, Framer, WireMessage};
use crate::wire::messages::{ChannelStatusEvent, LinkStatus, OrderStatus, TickerPrice};
use std::sync::Arc;

/// Outbound leases are sized for the largest framed message this crate
/// sends, with headroom; see `wire::codec` for the per-type byte counts.
pub const OUT_BUFFER_SIZE: usize = 256;
const MIN_READ_CHUNK: usize = 512;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChannelState {
    Connected,
    Disconnected,
    Error,
}

/// Fixes a channel direction's accepted inbound message set and bus view.
/// `channel_id` is threaded through so the dispatched message can carry
/// the channel it arrived on — the session manager needs that to look up
/// the owning session.
pub trait ChannelProtocol {
    type View;
    fn dispatch_inbound(channel_id: u64, msg: WireMessage, bus: &RestrictedBus<'_, Self::View>) -> CoreResult<()>;
}

pub struct UpstreamProtocol;
impl ChannelProtocol for UpstreamProtocol {
    type View = UpstreamView;
    fn dispatch_inbound(channel_id: u64, msg: WireMessage, bus: &RestrictedBus<'_, UpstreamView>) -> CoreResult<()> {
        use crate::wire::messages::{ChannelLoginRequest, ChannelOrder};
        match msg {
            WireMessage::Order(order) => {
                bus.post(ChannelOrder { channel_id, order });
                Ok(())
            }
            WireMessage::LoginRequest(request) => {
                bus.post(ChannelLoginRequest { channel_id, request });
                Ok(())
            }
            _ => Err(CoreError::CodecError {
                what: "unexpected message type on upstream channel",
            }),
        }
    }
}

pub struct DownstreamProtocol;
impl ChannelProtocol for DownstreamProtocol {
    type View = DownstreamView;
    fn dispatch_inbound(channel_id: u64, msg: WireMessage, bus: &RestrictedBus<'_, DownstreamView>) -> CoreResult<()> {
        use crate::wire::messages::ChannelTokenBindRequest;
        match msg {
            WireMessage::TokenBindRequest(request) => {
                bus.post(ChannelTokenBindRequest { channel_id, request });
                Ok(())
            }
            _ => Err(CoreError::CodecError {
                what: "unexpected message type on downstream channel",
            }),
        }
    }
}

/// The broadcast channel never receives; it only ever sends `TickerPrice`.
pub struct BroadcastProtocol;
impl ChannelProtocol for BroadcastProtocol {
    type View = BroadcastView;
    fn dispatch_inbound(_channel_id: u64, _msg: WireMessage, _bus: &RestrictedBus<'_, BroadcastView>) -> CoreResult<()> {
        Err(CoreError::CodecError {
            what: "broadcast channel does not accept inbound messages",
        })
    }
}

pub struct Channel<T: Transport, P: ChannelProtocol> {
    channel_id: u64,
    transport: T,
    bus: Arc<BusHub>,
    out_pool: Arc<BufferPool<OUT_BUFFER_SIZE>>,
    codec: Arc<dyn Codec>,
    framer: Arc<Framer>,
    recv_buffer: SlidingBuffer,
    state: ChannelState,
    _protocol: std::marker::PhantomData<P>,
}

impl<T: Transport, P: ChannelProtocol> Channel<T, P> {
    pub fn new(
        channel_id: u64,
        transport: T,
        bus: Arc<BusHub>,
        out_pool: Arc<BufferPool<OUT_BUFFER_SIZE>>,
        codec: Arc<dyn Codec>,
        framer: Arc<Framer>,
        recv_capacity: usize,
    ) -> Self {
        Channel {
            channel_id,
            transport,
            bus,
            out_pool,
            codec,
            framer,
            recv_buffer: SlidingBuffer::new(recv_capacity),
            state: ChannelState::Connected,
            _protocol: std::marker::PhantomData,
        }
    }

    pub fn state(&self) -> ChannelState {
        self.state
    }

    fn set_state(&mut self, state: ChannelState) {
        if self.state == state {
            return;
        }
        self.state = state;
        let status = match state {
            ChannelState::Connected => LinkStatus::Connected,
            ChannelState::Disconnected => LinkStatus::Disconnected,
            ChannelState::Error => LinkStatus::Error,
        };
        self.bus.system.post(ChannelStatusEvent {
            channel_id: self.channel_id,
            status,
        });
    }

    /// Reads whatever is available from the transport, unframes every
    /// complete message, and dispatches each to `P`'s bus view. On a
    /// protocol error, transitions to `Error` and returns it; the caller
    /// is expected to close the channel.
    pub async fn poll_read(&mut self) -> CoreResult<usize> {
        let write_target = self.recv_buffer.buffer(MIN_READ_CHUNK);
        let result = self.transport.async_rx(write_target).await;
        if result.closed {
            self.set_state(ChannelState::Disconnected);
            return Ok(0);
        }
        if result.error {
            self.set_state(ChannelState::Error);
            return Err(CoreError::CodecError { what: "transport read error" });
        }
        if result.would_block {
            return Ok(0);
        }
        self.recv_buffer.commit_write(result.bytes);

        let view = RestrictedBus::<P::View>::new(&self.bus);
        let mut dispatched = 0;
        loop {
            let data = self.recv_buffer.data();
            if data.is_empty() {
                break;
            }
            match self.framer.read(self.codec.as_ref(), data) {
                Ok(Some((msg, consumed))) => {
                    self.recv_buffer.commit_read(consumed);
                    if let Err(e) = P::dispatch_inbound(self.channel_id, msg, &view) {
                        self.set_state(ChannelState::Error);
                        return Err(e);
                    }
                    dispatched += 1;
                }
                Ok(None) => break,
                Err(e) => {
                    self.set_state(ChannelState::Error);
                    return Err(e);
                }
            }
        }
        Ok(dispatched)
    }

    /// Frames `msg` into a leased buffer, writes it out, and releases the
    /// lease. Synchronous (`sync_tx`) — the trusted-path write variant;
    /// callers on a cooperative executor can instead await `async_tx` by
    /// following the same lease/frame/release shape.
    pub fn send(&mut self, msg: WireMessage) -> CoreResult<()> {
        let index = self
            .out_pool
            .acquire()
            .ok_or(CoreError::BufferPoolExhausted {
                capacity: self.out_pool.capacity(),
            })?;
        let result = {
            let buf = unsafe { self.out_pool.get_mut(index) };
            let write_result = self.framer.write(self.codec.as_ref(), &msg, buf);
            match write_result {
                Ok(n) => self.transport.sync_tx(&buf[..n]),
                Err(e) => {
                    self.out_pool.release(index);
                    return Err(e);
                }
            }
        };
        self.out_pool.release(index);
        if result.error {
            self.set_state(ChannelState::Error);
            return Err(CoreError::CodecError { what: "transport write error" });
        }
        Ok(())
    }

    pub fn close(&mut self) {
        self.transport.close();
        self.set_state(ChannelState::Disconnected);
    }
}

pub type UpstreamChannel<T> = Channel<T, UpstreamProtocol>;
pub type DownstreamChannel<T> = Channel<T, DownstreamProtocol>;
pub type BroadcastChannel<T> = Channel<T, BroadcastProtocol>;

/// Convenience constructors for the outbound-only wire types each
/// channel direction actually sends, so callers don't construct
/// `WireMessage` variants by hand at call sites.
pub fn login_response_message(token: u64, ok: bool, error: String) -> WireMessage {
    WireMessage::LoginResponse(crate::wire::messages::LoginResponse { token, ok, error })
}

pub fn order_status_message(status: OrderStatus) -> WireMessage {
    WireMessage::OrderStatus(status)
}

pub fn ticker_price_message(price: TickerPrice) -> WireMessage {
    WireMessage::TickerPrice(price)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::messages::Order;
    use crate::wire::{FlatCodec, Framer};

    struct LoopbackTransport {
        inbox: std::collections::VecDeque<u8>,
    }

    impl Transport for LoopbackTransport {
        async fn async_rx(&mut self, buf: &mut [u8]) -> crate::transport::IoResult {
            if self.inbox.is_empty() {
                return crate::transport::IoResult::would_block();
            }
            let mut n = 0;
            while n < buf.len() {
                match self.inbox.pop_front() {
                    Some(b) => {
                        buf[n] = b;
                        n += 1;
                    }
                    None => break,
                }
            }
            crate::transport::IoResult::ok(n)
        }

        async fn async_tx(&mut self, bytes: &[u8]) -> crate::transport::IoResult {
            self.inbox.extend(bytes.iter());
            crate::transport::IoResult::ok(bytes.len())
        }

        fn sync_rx(&mut self, _buf: &mut [u8]) -> crate::transport::IoResult {
            crate::transport::IoResult::would_block()
        }

        fn sync_tx(&mut self, bytes: &[u8]) -> crate::transport::IoResult {
            self.inbox.extend(bytes.iter());
            crate::transport::IoResult::ok(bytes.len())
        }

        fn close(&mut self) {}
    }

    fn test_channel() -> Channel<LoopbackTransport, UpstreamProtocol> {
        let bus = Arc::new(BusHub::new());
        let pool = Arc::new(BufferPool::new(4));
        let codec: Arc<dyn Codec> = Arc::new(FlatCodec);
        let framer = Arc::new(Framer::new(256));
        Channel::new(
            1,
            LoopbackTransport {
                inbox: std::collections::VecDeque::new(),
            },
            bus,
            pool,
            codec,
            framer,
            1024,
        )
    }

    #[tokio::test]
    async fn order_written_by_send_is_read_back_and_dispatched() {
        let mut channel = test_channel();
        let seen = Arc::new(std::sync::atomic::AtomicU64::new(0));
        let seen2 = seen.clone();
        channel
            .bus
            .market
            .set_handler::<crate::wire::messages::ChannelOrder>(move |o| {
                seen2.store(o.order.id, std::sync::atomic::Ordering::SeqCst);
            });

        channel
            .send(WireMessage::Order(Order {
                id: 9,
                created: 1,
                ticker: *b"GOOG",
                quantity: 1,
                price: 1,
                action: crate::wire::messages::OrderAction::Buy,
            }))
            .unwrap();

        let dispatched = channel.poll_read().await.unwrap();
        assert_eq!(dispatched, 1);
        assert_eq!(seen.load(std::sync::atomic::Ordering::SeqCst), 9);
    }

    #[tokio::test]
    async fn unexpected_message_type_transitions_to_error() {
        let mut channel = test_channel();
        channel
            .send(WireMessage::TickerPrice(TickerPrice {
                ticker: *b"GOOG",
                price: 1,
            }))
            .unwrap();
        let result = channel.poll_read().await;
        assert!(result.is_err());
        assert_eq!(channel.state(), ChannelState::Error);
    }
}
