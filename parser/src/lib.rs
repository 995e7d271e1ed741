// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! # Hopper parser
//!
//! Decode and encode DNS messages as described in RFC 1035.
//!
//! Decoding follows compression pointers anywhere a domain name appears, encoding
//! always produces uncompressed names.
//!
//! ```
//! use hopper_parser::DnsPacket;
//!
//! let query = [
//!     0x04, 0xd2, 0x01, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, // header
//!     7, b'e', b'x', b'a', b'm', b'p', b'l', b'e', 3, b'c', b'o', b'm', 0, // example.com.
//!     0x00, 0x01, 0x00, 0x01, // A IN
//! ];
//! let packet = DnsPacket::try_from(&query[..]).unwrap();
//! assert_eq!(packet.questions[0].name.to_string(), "example.com.");
//!
//! let bytes = Vec::<u8>::try_from(&packet).unwrap();
//! assert_eq!(&bytes[..], &query[..]);
//! ```

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    rust_2018_idioms,
    missing_debug_implementations,
    rustdoc::broken_intra_doc_links
)]

use thiserror::Error;

use body::Question;
use body::ResourceRecord;
use header::DnsHeader;

mod binutils;
pub mod body;
pub mod header;

// +---------------------+
// |        Header       |
// +---------------------+
// |       Question      | the question(s) for the name server
// +---------------------+
// |        Answer       | RRs answering the question
// +---------------------+
// |      Authority      | RRs pointing toward an authority
// +---------------------+
// |      Additional     | RRs holding additional information
// +---------------------+
/// A complete DNS message.
///
/// When encoding, the counts in the [DnsHeader] are not inferred from the sections: they
/// have to be set by whoever builds the packet and must match the number of records present.
#[derive(Clone, Debug, PartialEq)]
pub struct DnsPacket<'a> {
    /// The message header.
    pub header: DnsHeader,
    /// The question section.
    pub questions: Vec<Question<'a>>,
    /// The answer section.
    pub answers: Vec<ResourceRecord<'a>>,
    /// The authority section.
    pub authority: Vec<ResourceRecord<'a>>,
    /// The additional section.
    pub additional: Vec<ResourceRecord<'a>>,
}

impl<'a> TryFrom<&'a [u8]> for DnsPacket<'a> {
    type Error = ParseError;

    fn try_from(buff: &'a [u8]) -> Result<Self, Self::Error> {
        let header = DnsHeader::try_from(buff)?;
        let left = buff.len() - header::HEADER_SIZE;
        let mut questions = Vec::with_capacity(capacity(header.questions, left, MIN_QUESTION_SIZE));
        let mut answers = Vec::with_capacity(capacity(header.answers, left, MIN_RECORD_SIZE));
        let mut authority = Vec::with_capacity(capacity(header.authority, left, MIN_RECORD_SIZE));
        let mut additional = Vec::with_capacity(capacity(header.additional, left, MIN_RECORD_SIZE));
        let mut pos = header::HEADER_SIZE;
        for _ in 0..header.questions {
            let (q, size) = Question::parse(buff, pos)?;
            pos += size;
            questions.push(q);
        }
        for _ in 0..header.answers {
            let (a, size) = ResourceRecord::parse(buff, pos)?;
            pos += size;
            answers.push(a)
        }
        for _ in 0..header.authority {
            let (a, size) = ResourceRecord::parse(buff, pos)?;
            pos += size;
            authority.push(a)
        }
        for _ in 0..header.additional {
            let (a, size) = ResourceRecord::parse(buff, pos)?;
            pos += size;
            additional.push(a)
        }
        Ok(Self {
            header,
            questions,
            answers,
            authority,
            additional,
        })
    }
}

impl TryFrom<&DnsPacket<'_>> for Vec<u8> {
    type Error = EncodeError;

    #[inline]
    fn try_from(packet: &DnsPacket<'_>) -> Result<Self, Self::Error> {
        let mut out = Vec::with_capacity(512);
        packet.serialize(&mut out)?;
        Ok(out)
    }
}

impl DnsPacket<'_> {
    /// Serialize the [DnsPacket] and append it to the end of the provided `packet`.
    ///
    /// # Errors
    ///
    /// Fails if a count in the header does not match the length of its section, or if a
    /// record violates an encoding invariant. Nothing useful is left in `packet` on error.
    pub fn serialize(&self, packet: &mut Vec<u8>) -> Result<(), EncodeError> {
        let h = &self.header;
        check_count("question", h.questions, self.questions.len())?;
        check_count("answer", h.answers, self.answers.len())?;
        check_count("authority", h.authority, self.authority.len())?;
        check_count("additional", h.additional, self.additional.len())?;

        h.serialize(packet);
        for q in &self.questions {
            q.serialize(packet)?;
        }
        for rr in self
            .answers
            .iter()
            .chain(&self.authority)
            .chain(&self.additional)
        {
            rr.serialize(packet)?;
        }
        Ok(())
    }
}

// Root name plus fixed fields.
const MIN_QUESTION_SIZE: usize = 1 + 4;
const MIN_RECORD_SIZE: usize = 1 + 10;

/// Counts come from the network, never reserve room for more entries than the rest of the
/// message could hold.
#[inline]
fn capacity(count: u16, left: usize, min_size: usize) -> usize {
    usize::from(count).min(left / min_size)
}

#[inline]
fn check_count(section: &'static str, declared: u16, actual: usize) -> Result<(), EncodeError> {
    if declared as usize == actual {
        Ok(())
    } else {
        Err(EncodeError::CountMismatch {
            section,
            declared,
            actual,
        })
    }
}

/// An error found while decoding a DNS message. Any of them means the message is malformed.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ParseError {
    #[error(
        "Length of package ({0} bytes) is too small to contain a DNS header (12 bytes in length)."
    )]
    /// The buffer is shorter than a header.
    HeaderLength(usize),
    #[error(
        "Specified name length ({0}) is too long, is bigger than DNS specification (maximum {}).",
        crate::body::name::MAX_NAME_SIZE
    )]
    /// The domain name is longer than 255 bytes.
    NameLength(usize),
    #[error("Jump points to a section of the package equal or greater than the current position.")]
    /// A compression pointer does not point backwards.
    InvalidJump,
    #[error("DNS compression contains excesive number of jumps ({0}).")]
    /// A name follows more compression pointers than the message has bytes.
    ExcesiveJumps(usize),
    #[error("Specified label length ({0}) is too long, it overflows the rest of the package or is bigger than DNS specification (maximum {}).",
        crate::body::name::MAX_LABEL_SIZE
    )]
    /// A label is longer than 63 bytes or overflows the buffer.
    LabelLength(usize),
    #[error("Byte {0:#b} does not have a pointer or length prefix.")]
    /// A label length byte uses one of the reserved prefixes.
    LabelPrefix(u8),
    #[error("Out-of-bounds read attempt at position {0}")]
    /// The message ended before a field could be read.
    OobRead(usize),
    #[error("Record of type {rrtype} declares {declared} bytes of data, expected {expected}")]
    /// The RDLENGTH of a fixed size record is wrong.
    RdataLength {
        /// Record type value
        rrtype: u16,
        /// RDLENGTH found in the message
        declared: u16,
        /// RDLENGTH mandated by the record type
        expected: u16,
    },
}

/// An error found while encoding a DNS message. They are contract violations of whoever built
/// the message, not problems of the input received from the network.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum EncodeError {
    #[error("Header declares {declared} {section} records but {actual} are present")]
    /// A header count does not match its section.
    CountMismatch {
        /// Name of the section
        section: &'static str,
        /// Count written in the header
        declared: u16,
        /// Records present in the section
        actual: usize,
    },
    #[error("Record declares RDLENGTH {declared} but its data takes {actual} bytes")]
    /// The RDLENGTH of a record does not match its data.
    RdataLength {
        /// RDLENGTH written in the record preamble
        declared: u16,
        /// Length of the encoded data
        actual: usize,
    },
    #[error(
        "Label of {0} bytes can not be encoded (maximum {}).",
        crate::body::name::MAX_LABEL_SIZE
    )]
    /// A label is too long to be length prefixed.
    LabelLength(usize),
    #[error("Data of type {data} does not fit a record of type {rrtype} and class {class}")]
    /// The RDATA would be decoded as something else from a record of this type and class.
    DataMismatch {
        /// TYPE written in the record preamble
        rrtype: u16,
        /// CLASS written in the record preamble
        class: u16,
        /// TYPE the data belongs to
        data: u16,
    },
}
