// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use crate::response::{assemble, early_reply, response_header};
use crate::{ForwardError, ServerService, Transport, UdpTransport};
use async_trait::async_trait;
use futures::stream::{FuturesUnordered, StreamExt};
use hopper_parser::body::{Question, ResourceRecord};
use hopper_parser::header::*;
use hopper_parser::{DnsPacket, EncodeError};
use std::{net::SocketAddr, time::Duration};
use tokio::time;
use tracing::{debug, warn};

/// Time to wait for each upstream answer when nothing else is configured.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// A [ServerService] that forwards every question to an upstream resolver.
///
/// Each question of a client query is sent as its own sub-query, all of them at the same
/// time. The response carries the answers of every sub-query that was answered before the
/// timeout, grouped by question in the order the client asked them.
#[derive(Clone, Debug)]
pub struct Forwarder<T = UdpTransport> {
    transport: T,
    timeout: Duration,
}

impl<T: Transport> Forwarder<T> {
    /// Forward through `transport` using the [DEFAULT_TIMEOUT].
    pub fn new(transport: T) -> Self {
        Forwarder {
            transport,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Set how long each sub-query may wait for its upstream answer.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Resolve a client query, always producing a response.
    ///
    /// Sub-queries that fail for any reason contribute no answers.
    pub async fn forward<'a>(&self, client: SocketAddr, query: DnsPacket<'a>) -> DnsPacket<'a> {
        if let Some(reply) = early_reply(&query) {
            debug!(
                %client,
                id = query.header.id,
                rcode = ?reply.header.flags.rcode,
                "answering without forwarding"
            );
            return reply;
        }
        let mut pending = PendingQuery::new(query.header, query.questions);
        let mut inflight: FuturesUnordered<_> =
            pending.split().into_iter().map(|sub| self.resolve(sub)).collect();
        while let Some((index, result)) = inflight.next().await {
            match result {
                Ok(answers) => pending.complete(index, answers),
                Err(e) => {
                    warn!(%client, id = pending.id(), index, error = %e, "sub-query failed");
                    pending.fail(index)
                }
            };
        }
        pending.into_response()
    }

    async fn resolve<'a>(
        &self,
        sub: SubQuery<'a>,
    ) -> (usize, Result<Vec<ResourceRecord<'static>>, ForwardError>) {
        let result = match time::timeout(self.timeout, self.exchange(&sub)).await {
            Ok(result) => result,
            Err(_) => Err(ForwardError::Timeout(self.timeout)),
        };
        (sub.index, result)
    }

    async fn exchange(
        &self,
        sub: &SubQuery<'_>,
    ) -> Result<Vec<ResourceRecord<'static>>, ForwardError> {
        let bytes = sub.encode()?;
        let answer = self.transport.exchange(&bytes).await?;
        read_answers(sub, &answer)
    }
}

#[async_trait]
impl<T: Transport> ServerService for Forwarder<T> {
    async fn run<'a>(&self, client: SocketAddr, query: DnsPacket<'a>) -> Option<DnsPacket<'a>> {
        if query.header.flags.qr == QueryResponse::Response {
            debug!(%client, id = query.header.id, "ignoring packet flagged as a response");
            return None;
        }
        Some(self.forward(client, query).await)
    }
}

/// Parse the upstream answer to `sub` and detach its answer records from the buffer.
///
/// The answer has to carry the id of `sub` and echo its question.
fn read_answers(
    sub: &SubQuery<'_>,
    buff: &[u8],
) -> Result<Vec<ResourceRecord<'static>>, ForwardError> {
    let packet = DnsPacket::try_from(buff)?;
    let id = sub.packet.header.id;
    if packet.header.id != id {
        return Err(ForwardError::IdMismatch {
            expected: id,
            received: packet.header.id,
        });
    }
    if packet.header.flags.qr != QueryResponse::Response {
        return Err(ForwardError::NotAResponse);
    }
    if packet.questions.first() != sub.packet.questions.first() {
        return Err(ForwardError::QuestionMismatch);
    }
    Ok(packet
        .answers
        .into_iter()
        .map(ResourceRecord::into_owned)
        .collect())
}

/// A query for a single question of a client query.
#[derive(Clone, Debug)]
pub struct SubQuery<'a> {
    /// Position of the question in the client query.
    pub index: usize,
    /// The packet sent upstream.
    pub packet: DnsPacket<'a>,
}

impl SubQuery<'_> {
    /// Encode the packet, questions are written without compression.
    pub fn encode(&self) -> Result<Vec<u8>, EncodeError> {
        Vec::try_from(&self.packet)
    }
}

/// Bookkeeping for a client query while its sub-queries are in flight.
///
/// There is one slot per question. A slot is filled exactly once, either with the answers
/// of its sub-query or with nothing when it failed, and the response can be built once no
/// slot is left empty.
#[derive(Clone, Debug)]
pub struct PendingQuery<'a> {
    header: DnsHeader,
    questions: Vec<Question<'a>>,
    slots: Vec<Option<Vec<ResourceRecord<'a>>>>,
    outstanding: usize,
}

impl<'a> PendingQuery<'a> {
    /// Start tracking the query with the given `header` and `questions`.
    pub fn new(header: DnsHeader, questions: Vec<Question<'a>>) -> Self {
        let outstanding = questions.len();
        PendingQuery {
            header,
            questions,
            slots: vec![None; outstanding],
            outstanding,
        }
    }

    /// Transaction id of the client query.
    pub fn id(&self) -> u16 {
        self.header.id
    }

    /// One sub-query per question, each with the client transaction id and RD flag.
    pub fn split(&self) -> Vec<SubQuery<'a>> {
        let flags = Flags {
            rd: self.header.flags.rd,
            ..Flags::default()
        };
        self.questions
            .iter()
            .enumerate()
            .map(|(index, question)| SubQuery {
                index,
                packet: assemble(
                    DnsHeader::new(self.header.id, flags),
                    vec![question.clone()],
                    Vec::new(),
                ),
            })
            .collect()
    }

    /// Store the answers for the question at `index`.
    ///
    /// Slots that are already filled, or out of range, are left untouched.
    pub fn complete(&mut self, index: usize, answers: Vec<ResourceRecord<'a>>) {
        match self.slots.get_mut(index) {
            Some(slot) if slot.is_none() => {
                *slot = Some(answers);
                self.outstanding -= 1;
            }
            _ => {}
        }
    }

    /// Mark the question at `index` as failed, it will have no answers.
    pub fn fail(&mut self, index: usize) {
        self.complete(index, Vec::new())
    }

    /// Number of sub-queries still waiting for an outcome.
    pub fn outstanding(&self) -> usize {
        self.outstanding
    }

    /// `true` once every sub-query has an outcome.
    pub fn is_complete(&self) -> bool {
        self.outstanding == 0
    }

    /// Build the client response with the answers gathered so far, in question order.
    pub fn into_response(self) -> DnsPacket<'a> {
        let header = response_header(&self.header, ResponseCode::NoError);
        let answers = self.slots.into_iter().flatten().flatten().collect();
        assemble(header, self.questions, answers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hopper_parser::body::name::Name;
    use hopper_parser::body::{Class, QType, RecordData};
    use std::net::Ipv4Addr;

    fn question(name: &'static str) -> Question<'static> {
        Question {
            name: Name::try_from(name).unwrap(),
            qtype: QType::A,
            class: Class::IN,
        }
    }

    fn pending(names: &[&'static str]) -> PendingQuery<'static> {
        let flags = Flags {
            rd: RecursionDesired::Desired,
            ..Flags::default()
        };
        let mut header = DnsHeader::new(0x1234, flags);
        header.questions = names.len() as u16;
        PendingQuery::new(header, names.iter().copied().map(question).collect())
    }

    fn answer(q: &Question<'static>, last: u8) -> ResourceRecord<'static> {
        ResourceRecord::synthesize_a(q, Ipv4Addr::new(10, 0, 0, last))
    }

    #[test]
    fn split_per_question() {
        let p = pending(&["a.com", "b.com"]);
        let subs = p.split();
        assert_eq!(subs.len(), 2);
        for (i, sub) in subs.iter().enumerate() {
            assert_eq!(sub.index, i);
            assert_eq!(sub.packet.header.id, 0x1234);
            assert_eq!(sub.packet.header.questions, 1);
            assert_eq!(sub.packet.header.flags.qr, QueryResponse::Query);
            assert_eq!(sub.packet.header.flags.rd, RecursionDesired::Desired);
            assert_eq!(sub.packet.questions[0], p.questions[i]);
        }
        let bytes = subs[1].encode().unwrap();
        assert_eq!(bytes.len(), 12 + 7 + 4);
        assert_eq!(&bytes[12..19], b"\x01b\x03com\x00");
    }

    #[test]
    fn answers_in_question_order() {
        let mut p = pending(&["a.com", "b.com", "c.com"]);
        let qa = p.questions[0].clone();
        let qb = p.questions[1].clone();
        let qc = p.questions[2].clone();
        p.complete(2, vec![answer(&qc, 3)]);
        p.complete(1, vec![answer(&qb, 2), answer(&qb, 22)]);
        assert_eq!(p.outstanding(), 1);
        assert!(!p.is_complete());
        p.complete(0, vec![answer(&qa, 1)]);
        assert!(p.is_complete());

        let r = p.into_response();
        assert_eq!(r.header.id, 0x1234);
        assert_eq!(r.header.flags.qr, QueryResponse::Response);
        assert_eq!(r.header.flags.ra, RecursionAvailable::Available);
        assert_eq!(r.header.flags.rcode, ResponseCode::NoError);
        assert_eq!(r.header.questions, 3);
        assert_eq!(r.header.answers, 4);
        let names: Vec<_> = r.answers.iter().map(|a| a.preamble.name.to_string()).collect();
        assert_eq!(names, ["a.com.", "b.com.", "b.com.", "c.com."]);
        assert!(Vec::<u8>::try_from(&r).is_ok());
    }

    #[test]
    fn failed_slot_is_empty() {
        let mut p = pending(&["a.com", "b.com"]);
        let qa = p.questions[0].clone();
        p.fail(1);
        p.complete(0, vec![answer(&qa, 1)]);
        let r = p.into_response();
        assert_eq!(r.header.questions, 2);
        assert_eq!(r.header.answers, 1);
    }

    #[test]
    fn slots_filled_once() {
        let mut p = pending(&["a.com"]);
        let qa = p.questions[0].clone();
        p.fail(0);
        p.complete(0, vec![answer(&qa, 1)]);
        p.complete(7, vec![answer(&qa, 1)]);
        assert_eq!(p.outstanding(), 0);
        assert_eq!(p.into_response().header.answers, 0);
    }

    fn reply_to(sub: &SubQuery<'_>, q: &Question<'static>) -> Vec<u8> {
        let mut header = response_header(&sub.packet.header, ResponseCode::NoError);
        header.questions = 1;
        header.answers = 1;
        let reply = DnsPacket {
            header,
            questions: vec![q.clone()],
            answers: vec![answer(q, 1)],
            authority: vec![],
            additional: vec![],
        };
        Vec::<u8>::try_from(&reply).unwrap()
    }

    #[test]
    fn read_answers_checks() {
        let p = pending(&["a.com"]);
        let subs = p.split();
        let sub = &subs[0];
        let q = question("a.com");
        let bytes = reply_to(sub, &q);
        assert_eq!(read_answers(sub, &bytes).unwrap(), vec![answer(&q, 1)]);

        let mut other_id = bytes.clone();
        other_id[1] = 0x35;
        assert!(matches!(
            read_answers(sub, &other_id),
            Err(ForwardError::IdMismatch {
                expected: 0x1234,
                received: 0x1235
            })
        ));
        assert!(matches!(
            read_answers(sub, &bytes[..20]),
            Err(ForwardError::Malformed(_))
        ));
        assert!(matches!(
            read_answers(sub, &sub.encode().unwrap()),
            Err(ForwardError::NotAResponse)
        ));
    }

    #[test]
    fn answer_must_echo_the_question() {
        let p = pending(&["a.com"]);
        let subs = p.split();
        let sub = &subs[0];
        let bytes = reply_to(sub, &question("b.com"));
        assert!(matches!(
            read_answers(sub, &bytes),
            Err(ForwardError::QuestionMismatch)
        ));

        let mut aaaa = question("a.com");
        aaaa.qtype = QType::Aaaa;
        let bytes = reply_to(sub, &aaaa);
        assert!(matches!(
            read_answers(sub, &bytes),
            Err(ForwardError::QuestionMismatch)
        ));
    }

    #[test]
    fn read_answers_follows_compression() {
        let p = pending(&["a.com"]);
        let subs = p.split();
        let sub = &subs[0];
        let mut bytes = sub.encode().unwrap();
        bytes[2] |= 0x80;
        bytes[7] = 2;
        for last in [1, 2] {
            // owner is a pointer to the question name
            bytes.extend([0xc0, 0x0c, 0x00, 0x01, 0x00, 0x01, 0x00, 0x00, 0x00, 0x3c]);
            bytes.extend([0x00, 0x04, 10, 0, 0, last]);
        }
        let answers = read_answers(sub, &bytes).unwrap();
        assert_eq!(answers.len(), 2);
        for (rr, last) in answers.iter().zip([1, 2]) {
            assert_eq!(rr.preamble.name.to_string(), "a.com.");
            assert_eq!(rr.data, RecordData::A(Ipv4Addr::new(10, 0, 0, last)));
        }
    }
}
