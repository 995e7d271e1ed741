// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! # Hopper
//!
//! A DNS [Server] that splits every query into single-question sub-queries, forwards them to
//! an upstream resolver and answers with everything that came back in time.
//!
//! ## Forwarding
//!
//! ```no_run
//! use hopper::{Forwarder, Server, UdpTransport};
//!
//! # async fn run() -> std::io::Result<()> {
//! let upstream = UdpTransport::resolve("8.8.8.8:53").await?;
//! Server::default()
//!     .bind("127.0.0.1:2053".parse().unwrap())
//!     .await?
//!     .serve(Forwarder::new(upstream))
//!     .await;
//! # Ok(())
//! # }
//! ```
//!
//! ## Custom services
//!
//! ```rust
//! use hopper::{async_trait, DnsPacket, ServerService};
//! use std::net::SocketAddr;
//!
//! struct Silent;
//!
//! #[async_trait]
//! impl ServerService for Silent {
//!     async fn run<'a>(&self, _client: SocketAddr, _query: DnsPacket<'a>) -> Option<DnsPacket<'a>> {
//!         None
//!     }
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    rust_2018_idioms,
    missing_debug_implementations,
    rustdoc::broken_intra_doc_links
)]

use std::{io, net::SocketAddr, sync::Arc};

use tokio::net::UdpSocket;
use tracing::{debug, error, info, warn};

pub use async_trait::async_trait;
pub use hopper_parser::body::name::*;
pub use hopper_parser::body::*;
pub use hopper_parser::header::*;
pub use hopper_parser::*;

pub use error::ForwardError;
pub use forward::{Forwarder, PendingQuery, SubQuery, DEFAULT_TIMEOUT};
pub use stub::{Synthesizer, DEFAULT_STUB_ADDR};
pub use transport::{Transport, UdpTransport};

mod error;
mod forward;
mod response;
mod stub;
mod transport;

/// Address the server listens on when nothing else is configured.
pub const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:2053";

// Queries from clients are plain RFC 1035 messages.
const MAX_QUERY_SIZE: usize = 512;

/// A DNS service, it recieves a [DnsPacket] as a query and may return another one as the
/// response. Returning `None` sends nothing back.
#[async_trait]
pub trait ServerService: Send + Sync {
    /// Take a [DnsPacket] as a query and return the response to be sent to the client.
    async fn run<'a>(&self, client: SocketAddr, query: DnsPacket<'a>) -> Option<DnsPacket<'a>>;
}

#[doc(hidden)]
#[derive(Clone, Copy, Debug)]
pub struct Builder;
#[doc(hidden)]
#[derive(Clone, Debug)]
pub struct Runner(Arc<UdpSocket>);

/// A DNS server
#[derive(Debug)]
pub struct Server<S> {
    state: S,
}

impl Default for Server<Builder> {
    fn default() -> Self {
        Server { state: Builder }
    }
}

impl Server<Builder> {
    /// Create a new [Server]
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind to a [SocketAddr] to listen for [DnsPacket]s.
    pub async fn bind(self, addr: SocketAddr) -> Result<Server<Runner>, io::Error> {
        let socket = UdpSocket::bind(addr).await?;
        Ok(Server {
            state: Runner(Arc::new(socket)),
        })
    }
}

impl Server<Runner> {
    /// The address the server is listening on.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.state.0.local_addr()
    }

    /// Run the [ServerService] on every datagram received, each one in its own task.
    ///
    /// Datagrams that can not be parsed are dropped without an answer. No error coming from
    /// a single datagram stops the server.
    pub async fn serve<T>(self, srv: T)
    where
        T: ServerService + 'static,
    {
        let socket = self.state.0;
        let srv = Arc::new(srv);
        if let Ok(addr) = socket.local_addr() {
            info!(%addr, "listening for DNS queries");
        }
        let mut buff = [0; MAX_QUERY_SIZE];
        loop {
            let (n, src) = match socket.recv_from(&mut buff).await {
                Ok(received) => received,
                Err(e) => {
                    warn!(error = %e, "could not receive datagram");
                    continue;
                }
            };
            let datagram = buff[..n].to_vec();
            let (socket, srv) = (socket.clone(), srv.clone());
            tokio::spawn(async move { reply(&socket, srv.as_ref(), src, &datagram).await });
        }
    }
}

async fn reply<T>(socket: &UdpSocket, srv: &T, client: SocketAddr, datagram: &[u8])
where
    T: ServerService + ?Sized,
{
    let query = match DnsPacket::try_from(datagram) {
        Ok(packet) => packet,
        Err(e) => {
            warn!(%client, error = %e, "dropping malformed datagram");
            return;
        }
    };
    let Some(response) = srv.run(client, query).await else {
        debug!(%client, "no response for datagram");
        return;
    };
    let serialized = match Vec::<u8>::try_from(&response) {
        Ok(serialized) => serialized,
        Err(e) => {
            error!(%client, id = response.header.id, error = %e, "could not encode response");
            return;
        }
    };
    if let Err(e) = socket.send_to(&serialized[..], client).await {
        warn!(%client, error = %e, "could not send response");
    }
}
