// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

#![allow(dead_code)]

use hopper::*;
use std::net::Ipv4Addr;

/// A query for the A record of every name in `names`.
pub fn query(id: u16, opcode: OpCode, names: &[&'static str]) -> DnsPacket<'static> {
    let flags = Flags {
        opcode,
        rd: RecursionDesired::Desired,
        ..Flags::default()
    };
    let mut header = DnsHeader::new(id, flags);
    header.questions = names.len() as u16;
    DnsPacket {
        header,
        questions: names.iter().copied().map(question).collect(),
        answers: vec![],
        authority: vec![],
        additional: vec![],
    }
}

pub fn question(name: &'static str) -> Question<'static> {
    Question {
        name: Name::try_from(name).unwrap(),
        qtype: QType::A,
        class: Class::IN,
    }
}

/// Encoded answer to the single question `query`, with `addrs` as A records.
pub fn answer(query: &DnsPacket<'_>, id: u16, addrs: &[Ipv4Addr]) -> Vec<u8> {
    let flags = Flags {
        qr: QueryResponse::Response,
        rd: query.header.flags.rd,
        ra: RecursionAvailable::Available,
        ..Flags::default()
    };
    let mut header = DnsHeader::new(id, flags);
    header.questions = query.questions.len() as u16;
    header.answers = addrs.len() as u16;
    let answers = addrs
        .iter()
        .map(|addr| {
            ResourceRecord::new(
                query.questions[0].name.clone(),
                Class::IN,
                300,
                RecordData::A(*addr),
            )
        })
        .collect();
    let reply = DnsPacket {
        header,
        questions: query.questions.clone(),
        answers,
        authority: vec![],
        additional: vec![],
    };
    Vec::try_from(&reply).unwrap()
}

/// Same as [answer], but every owner name is a compression pointer to the first question.
pub fn compressed_answer(query: &DnsPacket<'_>, id: u16, addrs: &[Ipv4Addr]) -> Vec<u8> {
    let mut reply = answer(query, id, &[]);
    reply[6..8].copy_from_slice(&(addrs.len() as u16).to_be_bytes());
    for addr in addrs {
        reply.extend([0xc0, 0x0c, 0x00, 0x01, 0x00, 0x01, 0x00, 0x00, 0x01, 0x2c, 0x00, 0x04]);
        reply.extend(addr.octets());
    }
    reply
}

/// Two questions for `a.com.` and `b.com.`, the second name compressed against the first.
pub fn compressed_query(id: u16) -> Vec<u8> {
    let mut query = id.to_be_bytes().to_vec();
    query.extend([0x01, 0x00, 0x00, 0x02, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00]);
    query.extend(b"\x01a\x03com\x00\x00\x01\x00\x01");
    // b + pointer to com. at offset 14
    query.extend(b"\x01b\xc0\x0e\x00\x01\x00\x01");
    query
}

/// Addresses of the A records in `packet`, in order.
pub fn addresses(packet: &DnsPacket<'_>) -> Vec<Ipv4Addr> {
    packet
        .answers
        .iter()
        .filter_map(|rr| match rr.data {
            RecordData::A(addr) => Some(addr),
            _ => None,
        })
        .collect()
}
