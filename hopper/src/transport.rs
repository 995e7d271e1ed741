// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use crate::ForwardError;
use async_trait::async_trait;
use std::{
    io,
    net::{Ipv4Addr, Ipv6Addr, SocketAddr},
};
use tokio::net::{lookup_host, UdpSocket};
use tracing::debug;

// Upstream answers may be bigger than the 512 bytes accepted from clients.
const MAX_ANSWER_SIZE: usize = 4096;

/// Sends an encoded query to an upstream resolver and returns the raw answer.
///
/// Every call is independent from the others, so a single [Transport] can be used for any
/// number of concurrent exchanges. Time limits are enforced by the caller.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send `query` and wait for the datagram that carries its transaction id.
    async fn exchange(&self, query: &[u8]) -> Result<Vec<u8>, ForwardError>;
}

/// A [Transport] that uses a fresh UDP socket for every exchange.
///
/// Because each sub-query owns its socket, answers are correlated by the socket they arrive
/// on and the transaction id can be reused between sub-queries. Datagrams from any other
/// source, or with another transaction id, are skipped while waiting.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct UdpTransport {
    upstream: SocketAddr,
}

impl UdpTransport {
    /// Forward to the given upstream address.
    pub fn new(upstream: SocketAddr) -> Self {
        UdpTransport { upstream }
    }

    /// Resolve `host:port` and forward to the first address found.
    pub async fn resolve(addr: &str) -> io::Result<Self> {
        lookup_host(addr)
            .await?
            .next()
            .map(Self::new)
            .ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::NotFound,
                    format!("{addr} did not resolve to any address"),
                )
            })
    }

    /// The upstream address.
    pub fn upstream(&self) -> SocketAddr {
        self.upstream
    }

    fn unspecified(&self) -> SocketAddr {
        match self.upstream {
            SocketAddr::V4(_) => (Ipv4Addr::UNSPECIFIED, 0).into(),
            SocketAddr::V6(_) => (Ipv6Addr::UNSPECIFIED, 0).into(),
        }
    }
}

#[async_trait]
impl Transport for UdpTransport {
    async fn exchange(&self, query: &[u8]) -> Result<Vec<u8>, ForwardError> {
        let socket = UdpSocket::bind(self.unspecified()).await?;
        socket.send_to(query, self.upstream).await?;
        let id = query.get(..2);
        let mut buff = vec![0; MAX_ANSWER_SIZE];
        loop {
            let (n, src) = socket.recv_from(&mut buff).await?;
            if src != self.upstream {
                debug!(%src, upstream = %self.upstream, "ignoring datagram from unexpected source");
                continue;
            }
            if buff[..n].get(..2) != id {
                debug!(%src, size = n, "ignoring datagram with another transaction id");
                continue;
            }
            buff.truncate(n);
            return Ok(buff);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unspecified_matches_family() {
        let v4 = UdpTransport::new("8.8.8.8:53".parse().unwrap());
        assert!(v4.unspecified().is_ipv4());
        let v6 = UdpTransport::new("[2001:4860:4860::8888]:53".parse().unwrap());
        assert!(v6.unspecified().is_ipv6());
    }

    #[tokio::test]
    async fn resolve_literal() {
        let t = UdpTransport::resolve("127.0.0.1:53").await.unwrap();
        assert_eq!(t.upstream(), "127.0.0.1:53".parse().unwrap());
    }

    #[tokio::test]
    async fn exchange_with_local_upstream() {
        let upstream = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let transport = UdpTransport::new(upstream.local_addr().unwrap());
        let server = tokio::spawn(async move {
            let mut buff = [0; 64];
            let (n, src) = upstream.recv_from(&mut buff).await.unwrap();
            let mut answer = buff[..n].to_vec();
            answer[2..].reverse();
            upstream.send_to(&answer, src).await.unwrap();
        });
        let answer = transport.exchange(&[1, 2, 3, 4, 5]).await.unwrap();
        assert_eq!(answer, vec![1, 2, 5, 4, 3]);
        server.await.unwrap();
    }

    #[tokio::test]
    async fn skips_other_transaction_ids() {
        let upstream = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let transport = UdpTransport::new(upstream.local_addr().unwrap());
        let server = tokio::spawn(async move {
            let mut buff = [0; 64];
            let (n, src) = upstream.recv_from(&mut buff).await.unwrap();
            upstream.send_to(&[0xde, 0xad, 0xff], src).await.unwrap();
            upstream.send_to(&[0x01], src).await.unwrap();
            upstream.send_to(&buff[..n], src).await.unwrap();
        });
        let answer = transport.exchange(&[0x12, 0x34, 0x56]).await.unwrap();
        assert_eq!(answer, vec![0x12, 0x34, 0x56]);
        server.await.unwrap();
    }
}
