// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use hopper_parser::body::{Question, ResourceRecord};
use hopper_parser::header::*;
use hopper_parser::DnsPacket;

/// Header of the response to `query`: same id and opcode, RD copied, recursion available.
pub(crate) fn response_header(query: &DnsHeader, rcode: ResponseCode) -> DnsHeader {
    let flags = Flags {
        qr: QueryResponse::Response,
        opcode: query.flags.opcode,
        rd: query.flags.rd,
        ra: RecursionAvailable::Available,
        rcode,
        ..Flags::default()
    };
    DnsHeader::new(query.id, flags)
}

/// Queries that are answered without doing any work: NOTIMP for anything that is not a
/// standard query and FORMERR for queries without questions.
pub(crate) fn early_reply<'a>(query: &DnsPacket<'a>) -> Option<DnsPacket<'a>> {
    let rcode = if query.header.flags.opcode != OpCode::Query {
        ResponseCode::NotImp
    } else if query.questions.is_empty() {
        ResponseCode::FormErr
    } else {
        return None;
    };
    let header = response_header(&query.header, rcode);
    Some(assemble(header, query.questions.clone(), Vec::new()))
}

/// Build a response packet, setting every count from the sections.
pub(crate) fn assemble<'a>(
    mut header: DnsHeader,
    mut questions: Vec<Question<'a>>,
    mut answers: Vec<ResourceRecord<'a>>,
) -> DnsPacket<'a> {
    questions.truncate(u16::MAX as usize);
    answers.truncate(u16::MAX as usize);
    header.questions = questions.len() as u16;
    header.answers = answers.len() as u16;
    header.authority = 0;
    header.additional = 0;
    DnsPacket {
        header,
        questions,
        answers,
        authority: Vec::new(),
        additional: Vec::new(),
    }
}
