use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::net::UdpSocket;
use tracing::trace;

use crate::TransportError;

/// Largest response accepted; anything beyond is cut off by the socket.
pub const MAX_RESPONSE_LEN: usize = 1024;

/// One request out, one response back.
///
/// Implementations do not time out on their own; the resolver bounds each
/// attempt.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn exchange(&self, server: SocketAddr, request: &[u8]) -> Result<Bytes, TransportError>;
}

/// Plain UDP, a fresh ephemeral socket per exchange.
#[derive(Debug, Clone, Copy, Default)]
pub struct UdpTransport;

impl UdpTransport {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Transport for UdpTransport {
    async fn exchange(&self, server: SocketAddr, request: &[u8]) -> Result<Bytes, TransportError> {
        let bind: SocketAddr = if server.is_ipv4() {
            (Ipv4Addr::UNSPECIFIED, 0).into()
        } else {
            (Ipv6Addr::UNSPECIFIED, 0).into()
        };

        let sock = UdpSocket::bind(bind).await?;
        // Connecting makes the kernel drop datagrams from anyone else
        sock.connect(server).await?;
        sock.send(request).await?;

        let mut buf = [0; MAX_RESPONSE_LEN];
        let response_len = sock.recv(&mut buf).await?;
        trace!(%server, response_len, "received datagram");

        Ok(Bytes::copy_from_slice(&buf[..response_len]))
    }
}
