//! Session manager (spec §4.12).
//!
//! Owns no channels directly — a session only ever needs to *address* a
//! channel by id, never extend its lifetime, matching the "weak handles
//! where a background task must not extend lifetime" re-architecture
//! guidance (spec §9). Whatever owns the live channel objects (the
//! network thread) implements [`ChannelRegistry`] and is handed to the
//! manager at construction.

use crate::bus::{BusHub, SystemKey};
use crate::wire::messages::{
    ChannelLoginRequest, ChannelStatusEvent, ChannelTokenBindRequest, LinkStatus, LoginResponse,
    OrderStatus, ServerLoginResponse, ServerOrderStatus,
};
use crate::wire::WireMessage;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

impl SystemKey for ServerLoginResponse {}

/// Sends to, and requests the close of, a channel by id. Implemented by
/// whatever owns the live transport-backed channels.
pub trait ChannelRegistry: Send + Sync {
    fn send(&self, channel_id: u64, msg: WireMessage);
    fn close(&self, channel_id: u64);
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Session {
    pub client_id: u64,
    pub token: u64,
    pub upstream_channel: Option<u64>,
    pub downstream_channel: Option<u64>,
}

pub struct SessionManager {
    next_token: AtomicU64,
    sessions_by_token: DashMap<u64, Session>,
    token_by_client: DashMap<u64, u64>,
    token_by_channel: DashMap<u64, u64>,
    pending_upstream: DashMap<u64, ()>,
    pending_downstream: DashMap<u64, ()>,
    registry: Arc<dyn ChannelRegistry>,
}

impl SessionManager {
    pub fn new(registry: Arc<dyn ChannelRegistry>) -> Arc<Self> {
        Arc::new(SessionManager {
            next_token: AtomicU64::new(1),
            sessions_by_token: DashMap::new(),
            token_by_client: DashMap::new(),
            token_by_channel: DashMap::new(),
            pending_upstream: DashMap::new(),
            pending_downstream: DashMap::new(),
            registry,
        })
    }

    /// Subscribes this manager to the system-bus events it reacts to, and
    /// registers the market bus handler that attaches a sending client's ID
    /// to its order (`ChannelOrder` → `ServerOrder`, spec §4.12 step 5).
    /// Call once at startup, after the bus hub exists and before any
    /// channel connects.
    pub fn wire(self: &Arc<Self>, bus: &Arc<BusHub>) {
        let this = self.clone();
        bus.system.subscribe::<ChannelStatusEvent>(move |event| {
            this.on_channel_status(*event);
        });
        let this = self.clone();
        bus.system
            .subscribe::<ServerLoginResponse>(move |event| {
                this.on_login_response(event.clone());
            });
        let this = self.clone();
        bus.system
            .subscribe::<ChannelTokenBindRequest>(move |event| {
                this.on_bind_request(*event);
            });

        let this = self.clone();
        let market_bus = bus.clone();
        bus.market
            .set_handler::<crate::wire::messages::ChannelOrder>(move |co| {
                match this.attach_client_id(co.channel_id) {
                    Some(client_id) => market_bus.market.post(crate::wire::messages::ServerOrder {
                        client_id,
                        order: co.order,
                    }),
                    None => tracing::warn!(
                        channel_id = co.channel_id,
                        "order on channel with no session, dropping"
                    ),
                }
            });

        let this = self.clone();
        bus.market.set_handler::<ServerOrderStatus>(move |status| {
            this.deliver_status(status);
        });
    }

    pub fn session_count(&self) -> usize {
        self.sessions_by_token.len()
    }

    /// Step 1: a channel connects and is placed in the unauthenticated
    /// bucket for its direction.
    pub fn on_channel_connected(&self, channel_id: u64, is_upstream: bool) {
        if is_upstream {
            self.pending_upstream.insert(channel_id, ());
        } else {
            self.pending_downstream.insert(channel_id, ());
        }
    }

    /// Step 2 is the authenticator's job (external collaborator, spec §1)
    /// reacting to [`ChannelLoginRequest`] directly; this manager only
    /// needs the event to exist on the system bus for that subscriber —
    /// nothing to do here beyond documenting the wiring point.
    #[allow(clippy::needless_pass_by_value)]
    pub fn note_login_request_received(&self, _request: ChannelLoginRequest) {}

    /// Step 3: authenticator's reply.
    fn on_login_response(&self, response: ServerLoginResponse) {
        let ServerLoginResponse {
            connection_id,
            client_id,
            ok,
            error,
        } = response;
        if self.pending_upstream.remove(&connection_id).is_none() {
            // Not a channel we have pending — stale or duplicate reply.
            return;
        }
        if ok {
            let token = self.next_token.fetch_add(1, Ordering::Relaxed);
            let session = Session {
                client_id,
                token,
                upstream_channel: Some(connection_id),
                downstream_channel: None,
            };
            self.sessions_by_token.insert(token, session);
            self.token_by_client.insert(client_id, token);
            self.token_by_channel.insert(connection_id, token);
            self.registry.send(
                connection_id,
                WireMessage::LoginResponse(LoginResponse {
                    token,
                    ok: true,
                    error: String::new(),
                }),
            );
        } else {
            self.registry.send(
                connection_id,
                WireMessage::LoginResponse(LoginResponse {
                    token: 0,
                    ok: false,
                    error,
                }),
            );
            self.registry.close(connection_id);
        }
    }

    /// Step 4: downstream channel binds a previously issued token.
    fn on_bind_request(&self, request: ChannelTokenBindRequest) {
        let channel_id = request.channel_id;
        let token = request.request.token;
        self.pending_downstream.remove(&channel_id);
        match self.sessions_by_token.get_mut(&token) {
            Some(mut session) => {
                session.downstream_channel = Some(channel_id);
                self.token_by_channel.insert(channel_id, token);
                self.registry.send(
                    channel_id,
                    WireMessage::LoginResponse(LoginResponse {
                        token,
                        ok: true,
                        error: String::new(),
                    }),
                );
            }
            None => {
                self.registry.send(
                    channel_id,
                    WireMessage::LoginResponse(LoginResponse {
                        token,
                        ok: false,
                        error: "unknown token".to_string(),
                    }),
                );
                self.registry.close(channel_id);
            }
        }
    }

    /// Step 5: outbound status delivery. Drops the status if the client
    /// has no live session or no bound downstream channel.
    pub fn deliver_status(&self, event: ServerOrderStatus) {
        let Some(token) = self.token_by_client.get(&event.client_id).map(|t| *t) else {
            tracing::debug!(client_id = event.client_id, "no session for status, dropping");
            return;
        };
        let Some(downstream) = self
            .sessions_by_token
            .get(&token)
            .and_then(|s| s.downstream_channel)
        else {
            tracing::debug!(client_id = event.client_id, "no downstream channel, dropping status");
            return;
        };
        self.registry.send(
            downstream,
            WireMessage::OrderStatus(OrderStatus {
                order_id: event.status.order_id,
                timestamp: event.status.timestamp,
                quantity: event.status.quantity,
                fill_price: event.status.fill_price,
                state: event.status.state,
            }),
        );
    }

    /// Attaches the sending client's id to an inbound order (spec §4.12
    /// step 5, the `ChannelOrder → ServerOrder` hop). Called from the
    /// market-bus handler wired for `ChannelOrder`.
    pub fn attach_client_id(&self, channel_id: u64) -> Option<u64> {
        let token = self.token_by_channel.get(&channel_id).map(|t| *t)?;
        self.sessions_by_token.get(&token).map(|s| s.client_id)
    }

    /// Disconnect handling: any non-`Connected` channel status tears down
    /// whichever bucket or session holds that channel.
    fn on_channel_status(&self, event: ChannelStatusEvent) {
        if event.status == LinkStatus::Connected {
            return;
        }
        self.pending_upstream.remove(&event.channel_id);
        self.pending_downstream.remove(&event.channel_id);
        let Some((_, token)) = self.token_by_channel.remove(&event.channel_id) else {
            return;
        };
        if let Some((_, session)) = self.sessions_by_token.remove(&token) {
            self.token_by_client.remove(&session.client_id);
            if let Some(up) = session.upstream_channel {
                if up != event.channel_id {
                    self.registry.close(up);
                    self.token_by_channel.remove(&up);
                }
            }
            if let Some(down) = session.downstream_channel {
                if down != event.channel_id {
                    self.registry.close(down);
                    self.token_by_channel.remove(&down);
                }
            }
        }
    }
}
