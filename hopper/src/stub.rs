// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use crate::response::{assemble, early_reply, response_header};
use crate::ServerService;
use async_trait::async_trait;
use hopper_parser::body::ResourceRecord;
use hopper_parser::header::{QueryResponse, ResponseCode};
use hopper_parser::DnsPacket;
use std::net::{Ipv4Addr, SocketAddr};
use tracing::debug;

/// Address used by [Synthesizer::default].
pub const DEFAULT_STUB_ADDR: Ipv4Addr = Ipv4Addr::new(8, 8, 8, 8);

/// A [ServerService] that never leaves the host: every question gets an A record
/// pointing at the same address.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Synthesizer {
    addr: Ipv4Addr,
}

impl Default for Synthesizer {
    fn default() -> Self {
        Synthesizer::new(DEFAULT_STUB_ADDR)
    }
}

impl Synthesizer {
    /// Answer with `addr`.
    pub fn new(addr: Ipv4Addr) -> Self {
        Synthesizer { addr }
    }

    /// Build the response for `query`.
    pub fn answer<'a>(&self, query: DnsPacket<'a>) -> DnsPacket<'a> {
        if let Some(reply) = early_reply(&query) {
            return reply;
        }
        let answers = query
            .questions
            .iter()
            .map(|q| ResourceRecord::synthesize_a(q, self.addr))
            .collect();
        let header = response_header(&query.header, ResponseCode::NoError);
        assemble(header, query.questions, answers)
    }
}

#[async_trait]
impl ServerService for Synthesizer {
    async fn run<'a>(&self, client: SocketAddr, query: DnsPacket<'a>) -> Option<DnsPacket<'a>> {
        if query.header.flags.qr == QueryResponse::Response {
            debug!(%client, id = query.header.id, "ignoring packet flagged as a response");
            return None;
        }
        Some(self.answer(query))
    }
}
