// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use crate::binutils::*;
use crate::ParseError;

/// Size in bytes of an encoded [DnsHeader].
pub const HEADER_SIZE: usize = 12;

macro_rules! u16_flag {
    (
        $(#[$outer:meta])*
        $bits:literal is $typ:tt with: $(
            #[$inner:meta]
            $variant:tt = $value:literal
        )+
    ) => {
        $(#[$outer])*
        #[derive(Copy, Clone, Debug, PartialEq, Eq)]
        pub enum $typ {
            $(
                #[$inner]
                $variant = $value,
            )*
        }

        impl From<u16> for $typ {
            #[inline]
            fn from(n: u16) -> Self {
                match $crate::header::mask_shift($bits, n) {
                    $($value => Self::$variant,)*
                    _ => ::std::unreachable!("Bitwise operations should make this imposible. Failed with mask {} for value {}", $bits, n),
                }
            }
        }

        impl From<$typ> for u16 {
            #[inline]
            fn from(flag: $typ) -> Self {
                $crate::header::unshift($bits, flag as u16)
            }
        }
    };
}

macro_rules! u16_code {
    (
        $(#[$outer:meta])*
        $bits:literal is $typ:tt with: $(
            #[$inner:meta]
            $variant:tt = $value:literal
        )+
    ) => {
        $(#[$outer])*
        ///
        /// Values are compared by their encoding, so `Unassigned` holding the value of a named
        /// variant equals that variant, and only the bits that fit the field are significant.
        #[derive(Copy, Clone, Debug)]
        pub enum $typ {
            $(
                #[$inner]
                $variant,
            )*
            /// A value without an assigned meaning in this crate. Decoding only produces it
            /// for values without a named variant.
            Unassigned(u16),
        }

        impl PartialEq for $typ {
            #[inline]
            fn eq(&self, other: &Self) -> bool {
                u16::from(*self) == u16::from(*other)
            }
        }

        impl Eq for $typ {}

        impl From<u16> for $typ {
            #[inline]
            fn from(n: u16) -> Self {
                match $crate::header::mask_shift($bits, n) {
                    $($value => Self::$variant,)*
                    n => Self::Unassigned(n),
                }
            }
        }

        impl From<$typ> for u16 {
            #[inline]
            fn from(code: $typ) -> Self {
                let n = match code {
                    $($typ::$variant => $value,)*
                    $typ::Unassigned(n) => n,
                };
                $crate::header::unshift($bits, n) & $bits
            }
        }
    };
}

#[inline]
fn mask_shift(mask: u16, n: u16) -> u16 {
    (n & mask) >> mask.trailing_zeros()
}

#[inline]
fn unshift(mask: u16, n: u16) -> u16 {
    n << mask.trailing_zeros()
}

/// The fixed 12 byte section at the start of every message.
///
/// ```text
///       0  1  2  3  4  5  6  7  0  1  2  3  4  5  6  7
///     +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
///     |                      ID                       |
///     +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
///     |QR|   Opcode  |AA|TC|RD|RA|   Z    |   RCODE   |
///     +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
///     |                    QDCOUNT                    |
///     +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
///     |                    ANCOUNT                    |
///     +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
///     |                    NSCOUNT                    |
///     +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
///     |                    ARCOUNT                    |
///     +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
/// ```
///
/// Counts are not kept in sync with the sections of a [DnsPacket](crate::DnsPacket)
/// automatically, whoever builds a packet sets them.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DnsHeader {
    /// Transaction id, a response carries the id of its query
    pub id: u16,
    /// Second 16 bit word
    pub flags: Flags,
    /// QDCOUNT
    pub questions: u16,
    /// ANCOUNT
    pub answers: u16,
    /// NSCOUNT
    pub authority: u16,
    /// ARCOUNT
    pub additional: u16,
}

impl TryFrom<&[u8]> for DnsHeader {
    type Error = ParseError;

    #[inline]
    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        if bytes.len() < HEADER_SIZE {
            return Err(ParseError::HeaderLength(bytes.len()));
        }
        let word = |i: usize| safe_u16_read(bytes, 2 * i);
        Ok(DnsHeader {
            id: word(0)?,
            flags: Flags::from(word(1)?),
            questions: word(2)?,
            answers: word(3)?,
            authority: word(4)?,
            additional: word(5)?,
        })
    }
}

impl From<&DnsHeader> for Vec<u8> {
    #[inline]
    fn from(header: &DnsHeader) -> Self {
        let mut target = Vec::with_capacity(HEADER_SIZE);
        header.serialize(&mut target);
        target
    }
}

impl DnsHeader {
    /// Create a header with the given `id` and `flags` and every count set to zero.
    #[inline]
    pub fn new(id: u16, flags: Flags) -> Self {
        DnsHeader {
            id,
            flags,
            questions: 0,
            answers: 0,
            authority: 0,
            additional: 0,
        }
    }

    /// Append the 12 encoded bytes to `target`.
    #[inline]
    pub fn serialize(&self, target: &mut Vec<u8>) {
        let words = [
            self.id,
            self.flags.into(),
            self.questions,
            self.answers,
            self.authority,
            self.additional,
        ];
        for word in words {
            push_u16(target, word);
        }
    }
}

/// Everything between the id and the counts.
///
/// The reserved `Z` bits are not represented: they are dropped when reading and always
/// written as zero. The default value is a standard query with every flag unset.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Flags {
    /// QR
    pub qr: QueryResponse,
    /// OPCODE, 4 bits
    pub opcode: OpCode,
    /// AA
    pub aa: AuthoritativeAnswer,
    /// TC
    pub tc: TrunCation,
    /// RD
    pub rd: RecursionDesired,
    /// RA
    pub ra: RecursionAvailable,
    /// RCODE, 4 bits
    pub rcode: ResponseCode,
}

impl From<u16> for Flags {
    #[inline]
    fn from(n: u16) -> Self {
        Flags {
            qr: n.into(),
            opcode: n.into(),
            aa: n.into(),
            tc: n.into(),
            rd: n.into(),
            ra: n.into(),
            rcode: n.into(),
        }
    }
}

impl From<Flags> for u16 {
    #[inline]
    fn from(flags: Flags) -> Self {
        u16::from(flags.qr)
            | u16::from(flags.opcode)
            | u16::from(flags.aa)
            | u16::from(flags.tc)
            | u16::from(flags.rd)
            | u16::from(flags.ra)
            | u16::from(flags.rcode)
    }
}

macro_rules! default_variant {
    ($($typ:tt => $variant:tt),+ $(,)?) => {
        $(
            impl Default for $typ {
                #[inline]
                fn default() -> Self {
                    Self::$variant
                }
            }
        )+
    };
}

u16_flag! {
    /// Whether the message asks or answers.
    0b1000000000000000 is QueryResponse with:
        /// A question from a client
        Query = 0
        /// An answer from a server
        Response = 1
}

// https://www.iana.org/assignments/dns-parameters/dns-parameters.xhtml#dns-parameters-5
u16_code! {
    /// Kind of query. Only [OpCode::Query] is forwarded, every other value gets NOTIMP.
    0b0111100000000000 is OpCode with:
        /// QUERY, the only one that gets answered
        Query = 0
        /// IQUERY, obsolete
        Iquery = 1
        /// STATUS
        Status = 2
        /// NOTIFY (RFC 1996)
        Notify = 4
        /// UPDATE (RFC 2136)
        Update = 5
        /// DNS stateful operations (RFC 8490)
        Dso = 6
}

u16_flag! {
    /// Set by servers that own the zone of the answer.
    0b0000010000000000 is AuthoritativeAnswer with:
        /// AA clear, always the case for forwarded answers
        NonAuthoritative = 0
        /// AA set
        Authoritative = 1
}

u16_flag! {
    /// Set when the message did not fit in the datagram.
    0b0000001000000000 is TrunCation with:
        /// TC clear
        NotTruncated = 0
        /// TC set
        Truncated = 1
}

u16_flag! {
    /// Set by clients that want the server to resolve on their behalf.
    0b0000000100000000 is RecursionDesired with:
        /// RD clear
        NotDesired = 0
        /// RD set
        Desired = 1
}

u16_flag! {
    /// Set by servers that resolve on behalf of their clients.
    0b0000000010000000 is RecursionAvailable with:
        /// RA clear
        NotAvailable = 0
        /// RA set
        Available = 1
}

// https://www.iana.org/assignments/dns-parameters/dns-parameters.xhtml#dns-parameters-6
u16_code! {
    /// Outcome of a query, the low 4 bits of the flags.
    0b0000000000001111 is ResponseCode with:
        /// NOERROR
        NoError = 0
        /// FORMERR, the query could not be understood
        FormErr = 1
        /// SERVFAIL
        ServFail = 2
        /// NXDOMAIN, the name does not exist
        NXDomain = 3
        /// NOTIMP, the kind of query is not supported
        NotImp = 4
        /// REFUSED
        Refused = 5
}

default_variant! {
    QueryResponse => Query,
    OpCode => Query,
    AuthoritativeAnswer => NonAuthoritative,
    TrunCation => NotTruncated,
    RecursionDesired => NotDesired,
    RecursionAvailable => NotAvailable,
    ResponseCode => NoError,
}
