//! Socket transport: async TCP/UDP (spec §4.7 "Socket transport").
//!
//! TCP carries the upstream (command) and downstream (notification)
//! channels; a UDP socket broadcasts `TickerPrice` ticks. TCP connections
//! are configured for no-delay and large kernel socket buffers — this is
//! the hot path and Nagle's algorithm would add tens of milliseconds of
//! latency for no benefit here.

use super::traits::{IoResult, Transport};
use socket2::{Domain, Socket, Type};
use std::net::SocketAddr;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream, UdpSocket};

const SOCKET_BUFFER_BYTES: usize = 4 * 1024 * 1024;

fn configure_tcp(socket: &Socket) -> std::io::Result<()> {
    socket.set_nodelay(true)?;
    socket.set_recv_buffer_size(SOCKET_BUFFER_BYTES)?;
    socket.set_send_buffer_size(SOCKET_BUFFER_BYTES)?;
    Ok(())
}

/// Binds a dual-stack-agnostic listener with the hot-path socket options
/// already applied, so every accepted connection inherits them.
pub fn bind_tcp_listener(addr: SocketAddr) -> std::io::Result<TcpListener> {
    let domain = if addr.is_ipv6() { Domain::IPV6 } else { Domain::IPV4 };
    let socket = Socket::new(domain, Type::STREAM, None)?;
    socket.set_reuse_address(true)?;
    configure_tcp(&socket)?;
    socket.bind(&addr.into())?;
    socket.listen(1024)?;
    socket.set_nonblocking(true)?;
    TcpListener::from_std(socket.into())
}

pub fn bind_udp_socket(addr: SocketAddr) -> std::io::Result<UdpSocket> {
    let domain = if addr.is_ipv6() { Domain::IPV6 } else { Domain::IPV4 };
    let socket = Socket::new(domain, Type::DGRAM, None)?;
    socket.set_reuse_address(true)?;
    socket.set_broadcast(true)?;
    socket.bind(&addr.into())?;
    socket.set_nonblocking(true)?;
    UdpSocket::from_std(socket.into())
}

pub struct TcpTransport {
    stream: TcpStream,
}

impl TcpTransport {
    pub fn new(stream: TcpStream) -> std::io::Result<Self> {
        let socket = socket2::SockRef::from(&stream);
        socket.set_nodelay(true)?;
        socket.set_recv_buffer_size(SOCKET_BUFFER_BYTES)?;
        socket.set_send_buffer_size(SOCKET_BUFFER_BYTES)?;
        Ok(TcpTransport { stream })
    }
}

impl Transport for TcpTransport {
    async fn async_rx(&mut self, buf: &mut [u8]) -> IoResult {
        match self.stream.read(buf).await {
            Ok(0) => IoResult::closed(),
            Ok(n) => IoResult::ok(n),
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => IoResult::would_block(),
            Err(_) => IoResult::error(),
        }
    }

    async fn async_tx(&mut self, bytes: &[u8]) -> IoResult {
        match self.stream.write_all(bytes).await {
            Ok(()) => IoResult::ok(bytes.len()),
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => IoResult::would_block(),
            Err(_) => IoResult::error(),
        }
    }

    fn sync_rx(&mut self, buf: &mut [u8]) -> IoResult {
        match self.stream.try_read(buf) {
            Ok(0) => IoResult::closed(),
            Ok(n) => IoResult::ok(n),
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => IoResult::would_block(),
            Err(_) => IoResult::error(),
        }
    }

    fn sync_tx(&mut self, bytes: &[u8]) -> IoResult {
        match self.stream.try_write(bytes) {
            Ok(n) => IoResult::ok(n),
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => IoResult::would_block(),
            Err(_) => IoResult::error(),
        }
    }

    fn close(&mut self) {
        let _ = self.stream.set_linger(Some(std::time::Duration::ZERO));
        let _ = self.stream.try_write(&[]);
    }
}

/// Send-only UDP transport for the broadcast-price channel. `async_rx`/
/// `sync_rx` are unused on this path and always report `would_block`.
pub struct UdpTransport {
    socket: UdpSocket,
    target: SocketAddr,
}

impl UdpTransport {
    pub fn new(socket: UdpSocket, target: SocketAddr) -> Self {
        UdpTransport { socket, target }
    }
}

impl Transport for UdpTransport {
    async fn async_rx(&mut self, _buf: &mut [u8]) -> IoResult {
        IoResult::would_block()
    }

    async fn async_tx(&mut self, bytes: &[u8]) -> IoResult {
        match self.socket.send_to(bytes, self.target).await {
            Ok(n) => IoResult::ok(n),
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => IoResult::would_block(),
            Err(_) => IoResult::error(),
        }
    }

    fn sync_rx(&mut self, _buf: &mut [u8]) -> IoResult {
        IoResult::would_block()
    }

    fn sync_tx(&mut self, bytes: &[u8]) -> IoResult {
        match self.socket.try_send_to(bytes, self.target) {
            Ok(n) => IoResult::ok(n),
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => IoResult::would_block(),
            Err(_) => IoResult::error(),
        }
    }

    fn close(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn tcp_round_trip_over_loopback() {
        let listener = bind_tcp_listener("127.0.0.1:0".parse().unwrap()).unwrap();
        let addr = listener.local_addr().unwrap();

        let client_task = tokio::spawn(async move {
            let stream = TcpStream::connect(addr).await.unwrap();
            let mut t = TcpTransport::new(stream).unwrap();
            t.async_tx(b"hello").await
        });

        let (stream, _) = listener.accept().await.unwrap();
        let mut server = TcpTransport::new(stream).unwrap();
        let mut buf = [0u8; 16];
        // Give the client a moment to connect and write.
        let result = loop {
            let r = server.async_rx(&mut buf).await;
            if r.ok {
                break r;
            }
        };
        assert_eq!(&buf[..result.bytes], b"hello");
        client_task.await.unwrap();
    }
}
