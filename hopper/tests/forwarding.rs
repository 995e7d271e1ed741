// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

mod common;

use common::{addresses, answer, compressed_answer, compressed_query, query};
use hopper::*;
use std::{
    collections::HashMap,
    net::{Ipv4Addr, SocketAddr},
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};
use tokio::time::{self, Instant};

#[derive(Clone, Copy, Debug)]
enum Reply {
    After(Duration, Ipv4Addr),
    WrongId(Ipv4Addr),
    Compressed(Ipv4Addr),
    Never,
}

/// An upstream that answers every name according to a script.
#[derive(Clone, Debug, Default)]
struct Scripted {
    replies: HashMap<String, Reply>,
    calls: Arc<AtomicUsize>,
}

impl Scripted {
    fn reply(mut self, name: &str, reply: Reply) -> Self {
        self.replies.insert(name.to_string(), reply);
        self
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for Scripted {
    async fn exchange(&self, query: &[u8]) -> Result<Vec<u8>, ForwardError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let packet = DnsPacket::try_from(query)?;
        assert_eq!(packet.questions.len(), 1);
        let name = packet.questions[0].name.to_string();
        match self.replies.get(&name).copied().unwrap_or(Reply::Never) {
            Reply::After(delay, addr) => {
                time::sleep(delay).await;
                Ok(answer(&packet, packet.header.id, &[addr]))
            }
            Reply::WrongId(addr) => Ok(answer(&packet, packet.header.id ^ 1, &[addr])),
            Reply::Compressed(addr) => Ok(compressed_answer(&packet, packet.header.id, &[addr])),
            Reply::Never => std::future::pending().await,
        }
    }
}

const A: Ipv4Addr = Ipv4Addr::new(10, 0, 0, 1);
const B: Ipv4Addr = Ipv4Addr::new(10, 0, 0, 2);

fn client() -> SocketAddr {
    "127.0.0.1:40000".parse().unwrap()
}

#[tokio::test(start_paused = true)]
async fn other_opcodes_are_not_forwarded() {
    let upstream = Scripted::default().reply("a.com.", Reply::After(Duration::ZERO, A));
    let forwarder = Forwarder::new(upstream.clone());

    let q = query(0x0101, OpCode::Iquery, &["a.com", "b.com"]);
    let r = forwarder.forward(client(), q.clone()).await;

    assert_eq!(r.header.id, 0x0101);
    assert_eq!(r.header.flags.qr, QueryResponse::Response);
    assert_eq!(r.header.flags.rcode, ResponseCode::NotImp);
    assert_eq!(r.header.flags.ra, RecursionAvailable::Available);
    assert_eq!(r.header.flags.rd, RecursionDesired::Desired);
    assert_eq!(r.header.questions, 2);
    assert_eq!(r.header.answers, 0);
    assert_eq!(r.questions, q.questions);
    assert_eq!(upstream.calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn answers_follow_question_order() {
    let upstream = Scripted::default()
        .reply("a.com.", Reply::After(Duration::from_millis(50), A))
        .reply("b.com.", Reply::After(Duration::from_millis(10), B));
    let forwarder = Forwarder::new(upstream.clone());

    let r = forwarder
        .forward(client(), query(7, OpCode::Query, &["a.com", "b.com"]))
        .await;

    assert_eq!(upstream.calls(), 2);
    assert_eq!(r.header.id, 7);
    assert_eq!(r.header.flags.rcode, ResponseCode::NoError);
    assert_eq!(r.header.questions, 2);
    assert_eq!(r.header.answers, 2);
    assert_eq!(addresses(&r), [A, B]);
    assert_eq!(r.answers[0].preamble.name.to_string(), "a.com.");
    assert_eq!(r.answers[1].preamble.name.to_string(), "b.com.");
    assert!(Vec::<u8>::try_from(&r).is_ok());
}

#[tokio::test(start_paused = true)]
async fn sub_queries_run_concurrently() {
    let upstream = Scripted::default()
        .reply("a.com.", Reply::After(Duration::from_millis(300), A))
        .reply("b.com.", Reply::After(Duration::from_millis(300), B));
    let forwarder = Forwarder::new(upstream);

    let start = Instant::now();
    let r = forwarder
        .forward(client(), query(7, OpCode::Query, &["a.com", "b.com"]))
        .await;
    assert_eq!(r.header.answers, 2);
    assert!(start.elapsed() < Duration::from_millis(600));
}

#[tokio::test(start_paused = true)]
async fn timed_out_question_has_no_answers() {
    let upstream = Scripted::default().reply("a.com.", Reply::After(Duration::ZERO, A));
    let forwarder = Forwarder::new(upstream).timeout(Duration::from_secs(1));

    let start = Instant::now();
    let r = forwarder
        .forward(client(), query(9, OpCode::Query, &["a.com", "b.com"]))
        .await;

    assert!(start.elapsed() >= Duration::from_secs(1));
    assert_eq!(r.header.flags.rcode, ResponseCode::NoError);
    assert_eq!(r.header.questions, 2);
    assert_eq!(r.header.answers, 1);
    assert_eq!(addresses(&r), [A]);
}

#[tokio::test(start_paused = true)]
async fn default_timeout_is_used() {
    let forwarder = Forwarder::new(Scripted::default());
    let start = Instant::now();
    let r = forwarder
        .forward(client(), query(9, OpCode::Query, &["a.com"]))
        .await;
    assert!(start.elapsed() >= DEFAULT_TIMEOUT);
    assert!(start.elapsed() < DEFAULT_TIMEOUT + Duration::from_secs(1));
    assert_eq!(r.header.answers, 0);
}

#[tokio::test(start_paused = true)]
async fn mismatched_id_is_dropped() {
    let upstream = Scripted::default()
        .reply("a.com.", Reply::After(Duration::ZERO, A))
        .reply("b.com.", Reply::WrongId(B));
    let forwarder = Forwarder::new(upstream);

    let r = forwarder
        .forward(client(), query(0x7f00, OpCode::Query, &["a.com", "b.com"]))
        .await;
    assert_eq!(addresses(&r), [A]);
}

#[tokio::test(start_paused = true)]
async fn empty_query_is_a_format_error() {
    let upstream = Scripted::default();
    let forwarder = Forwarder::new(upstream.clone());
    let r = forwarder.forward(client(), query(3, OpCode::Query, &[])).await;
    assert_eq!(r.header.flags.rcode, ResponseCode::FormErr);
    assert_eq!(upstream.calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn responses_are_ignored() {
    let forwarder = Forwarder::new(Scripted::default());
    let mut q = query(3, OpCode::Query, &["a.com"]);
    q.header.flags.qr = QueryResponse::Response;
    assert!(forwarder.run(client(), q).await.is_none());
}

#[tokio::test(start_paused = true)]
async fn compressed_messages_are_expanded() {
    let upstream = Scripted::default()
        .reply("a.com.", Reply::Compressed(A))
        .reply("b.com.", Reply::Compressed(B));
    let forwarder = Forwarder::new(upstream.clone());

    let bytes = compressed_query(0x0c0c);
    let q = DnsPacket::try_from(&bytes[..]).unwrap();
    let r = forwarder.forward(client(), q).await;

    assert_eq!(upstream.calls(), 2);
    assert_eq!(r.header.id, 0x0c0c);
    assert_eq!(addresses(&r), [A, B]);
    assert_eq!(r.questions[1].name.to_string(), "b.com.");
    assert_eq!(r.answers[1].preamble.name.to_string(), "b.com.");
    // header, two questions and two answers, every name written in full
    let out = Vec::<u8>::try_from(&r).unwrap();
    assert_eq!(out.len(), 12 + 2 * (7 + 4) + 2 * (7 + 10 + 4));
}
