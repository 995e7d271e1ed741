// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/// Domain names and their compression
pub mod name;

use crate::binutils::*;
use crate::body::name::Name;
use crate::{EncodeError, ParseError};
use std::borrow::Cow;
use std::net::{Ipv4Addr, Ipv6Addr};

const INIT_RR_SIZE: usize = 64;

/// TTL given to locally synthesized answers.
pub const SYNTHESIZED_TTL: i32 = 60;

macro_rules! types {
    (
        $(
            #[$inner:meta]
            $variant:tt = $value:literal
        )+
    ) => {
        /// TYPE of a [ResourceRecord].
        #[derive(Copy, Clone, Debug, Eq, PartialEq, PartialOrd)]
        pub enum Type {
            $(
                #[$inner]
                $variant,
            )*
            /// Forwarded as is, RDATA is kept opaque
            Unknown(u16),
        }

        impl TryFrom<QType> for Type {
            type Error = &'static str;

            #[inline]
            fn try_from(value: QType) -> Result<Self, Self::Error> {
                match value {
                    $(QType::$variant => Ok(Self::$variant),)*
                    QType::Unknown(n) => Ok(Self::Unknown(n)),
                    _ => Err("only valid as a QTYPE")
                }
            }
        }

        impl From<u16> for Type {
            #[inline]
            fn from(value: u16) -> Self {
                match value {
                    $($value => Self::$variant,)*
                    _ => Self::Unknown(value),
                }
            }
        }

        impl From<Type> for u16 {
            #[inline]
            fn from(value: Type) -> Self {
                match value {
                    $(Type::$variant => $value,)*
                    Type::Unknown(n) => n,
                }
            }
        }

        /// QTYPE of a [Question], every TYPE plus the `*` wildcard.
        #[derive(Copy, Clone, Debug, Eq, PartialEq, PartialOrd)]
        pub enum QType {
            $(
                #[$inner]
                $variant,
            )*
            /// `*`
            All,
            /// Any other value
            Unknown(u16),
        }

        impl From<Type> for QType {
            #[inline]
            fn from(value: Type) -> Self {
                match value {
                    $(Type::$variant => Self::$variant,)*
                    Type::Unknown(n) => Self::Unknown(n),
                }
            }
        }

        impl From<u16> for QType {
            #[inline]
            fn from(value: u16) -> Self {
                match value {
                    $($value => Self::$variant,)*
                    255 => Self::All,
                    _ => Self::Unknown(value),
                }
            }
        }

        impl From<QType> for u16 {
            #[inline]
            fn from(value: QType) -> Self {
                match value {
                    $(QType::$variant => $value,)*
                    QType::All => 255,
                    QType::Unknown(n) => n,
                }
            }
        }
    };
}

/// An entry of the question section: QNAME, QTYPE and QCLASS.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Question<'a> {
    /// QNAME
    pub name: Name<'a>,
    /// QTYPE
    pub qtype: QType,
    /// QCLASS
    pub class: Class,
}

impl TryFrom<&Question<'_>> for Vec<u8> {
    type Error = EncodeError;

    #[inline]
    fn try_from(question: &Question<'_>) -> Result<Self, Self::Error> {
        let mut out = Vec::with_capacity(question.name.wire_len() + 4);
        question.serialize(&mut out)?;
        Ok(out)
    }
}

impl<'a> Question<'a> {
    /// Decode the question at `start` of the message `buff`, returning it with the number
    /// of bytes it takes.
    #[inline]
    pub fn parse(buff: &'a [u8], start: usize) -> Result<(Self, usize), ParseError> {
        let (name, size) = Name::parse(buff, start)?;
        let fixed = start + size;
        let question = Question {
            name,
            qtype: QType::from(safe_u16_read(buff, fixed)?),
            class: Class::from(safe_u16_read(buff, fixed + 2)?),
        };
        Ok((question, size + 4))
    }

    /// Append the encoded question to `packet`, the name is not compressed.
    #[inline]
    pub fn serialize(&self, packet: &mut Vec<u8>) -> Result<(), EncodeError> {
        self.name.serialize(packet)?;
        push_u16(packet, self.qtype.into());
        push_u16(packet, self.class.into());
        Ok(())
    }

    /// Detach the question from the packet it was parsed from.
    #[inline]
    pub fn into_owned(self) -> Question<'static> {
        Question {
            name: self.name.into_owned(),
            qtype: self.qtype,
            class: self.class,
        }
    }
}

/// An entry of the answer, authority or additional sections.
///
/// `preamble.rdlen` always describes the uncompressed encoding of `data`. Names found inside
/// the RDATA of a parsed record are decompressed, so its `rdlen` may be bigger than the one
/// found on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceRecord<'a> {
    /// Owner name, type, class, TTL and RDLENGTH
    pub preamble: RecordPreamble<'a>,
    /// RDATA
    pub data: RecordData<'a>,
}

impl TryFrom<&ResourceRecord<'_>> for Vec<u8> {
    type Error = EncodeError;

    #[inline]
    fn try_from(rr: &ResourceRecord<'_>) -> Result<Self, Self::Error> {
        let mut out = Vec::with_capacity(INIT_RR_SIZE);
        rr.serialize(&mut out)?;
        Ok(out)
    }
}

impl<'a> ResourceRecord<'a> {
    /// Create a new record, its TYPE and RDLENGTH are taken from `data`.
    ///
    /// ```
    /// # use hopper_parser::body::{Class, RecordData, ResourceRecord, Type};
    /// # use hopper_parser::body::name::Name;
    /// let name = Name::try_from("example.com").unwrap();
    /// let data = RecordData::A([1, 2, 3, 4].into());
    /// let rr = ResourceRecord::new(name, Class::IN, 300, data);
    /// assert_eq!(rr.preamble.rrtype, Type::A);
    /// assert_eq!(rr.preamble.rdlen, 4);
    /// ```
    #[inline]
    pub fn new(name: Name<'a>, class: Class, ttl: i32, data: RecordData<'a>) -> Self {
        let preamble = RecordPreamble {
            name,
            rrtype: data.rrtype(),
            class,
            ttl,
            rdlen: data.len() as _,
        };
        ResourceRecord { preamble, data }
    }

    /// Build the local answer for `question`: the same name, type A, class IN, a TTL of
    /// [SYNTHESIZED_TTL] seconds and `addr` as the address.
    #[inline]
    pub fn synthesize_a(question: &Question<'a>, addr: Ipv4Addr) -> Self {
        Self::new(
            question.name.clone(),
            Class::IN,
            SYNTHESIZED_TTL,
            RecordData::A(addr),
        )
    }

    /// Parse from the specified `buff`, starting at position `pos`.
    ///
    /// # Errors
    ///
    /// Fails if the RDATA is shorter than its declared RDLENGTH, or if the RDLENGTH does not
    /// match what the record type requires.
    #[inline]
    pub fn parse(buff: &'a [u8], pos: usize) -> Result<(Self, usize), ParseError> {
        let (mut preamble, size) = RecordPreamble::parse(buff, pos)?;
        let data = RecordData::parse(buff, pos + size, &preamble)?;
        let size = size + preamble.rdlen as usize;
        preamble.rdlen = data.len() as _;
        Ok((Self { preamble, data }, size))
    }

    /// Serialize the [ResourceRecord] and append it tho the end of the provided `packet`.
    ///
    /// # Errors
    ///
    /// Fails if `preamble.rdlen` is not the length of the encoded data, or if `data` would not
    /// be decoded back from a record of this type and class. `packet` is left as it was.
    #[inline]
    pub fn serialize(&self, packet: &mut Vec<u8>) -> Result<(), EncodeError> {
        let (rrtype, class) = (self.preamble.rrtype, self.preamble.class);
        if !self.data.fits(rrtype, class) {
            return Err(EncodeError::DataMismatch {
                rrtype: rrtype.into(),
                class: class.into(),
                data: self.data.rrtype().into(),
            });
        }
        let start = packet.len();
        let result = self.preamble.serialize(packet).and_then(|_| {
            let rdata = packet.len();
            self.data.serialize(packet)?;
            let actual = packet.len() - rdata;
            if actual == self.preamble.rdlen as usize {
                Ok(())
            } else {
                Err(EncodeError::RdataLength {
                    declared: self.preamble.rdlen,
                    actual,
                })
            }
        });
        if result.is_err() {
            packet.truncate(start);
        }
        result
    }

    /// Detach the record from the packet it was parsed from.
    #[inline]
    pub fn into_owned(self) -> ResourceRecord<'static> {
        ResourceRecord {
            preamble: self.preamble.into_owned(),
            data: self.data.into_owned(),
        }
    }
}

/// The fields every [ResourceRecord] has before its RDATA.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordPreamble<'a> {
    /// Owner name
    pub name: Name<'a>,
    /// TYPE
    pub rrtype: Type,
    /// CLASS
    pub class: Class,
    /// Seconds the record may be cached
    pub ttl: i32,
    /// RDLENGTH
    pub rdlen: u16,
}

impl<'a> RecordPreamble<'a> {
    #[inline]
    fn parse(buff: &'a [u8], pos: usize) -> Result<(Self, usize), ParseError> {
        let (name, size) = Name::parse(buff, pos)?;
        let fixed = pos + size;
        let preamble = RecordPreamble {
            name,
            rrtype: Type::from(safe_u16_read(buff, fixed)?),
            class: Class::from(safe_u16_read(buff, fixed + 2)?),
            ttl: safe_i32_read(buff, fixed + 4)?,
            rdlen: safe_u16_read(buff, fixed + 8)?,
        };
        Ok((preamble, size + 10))
    }

    #[inline]
    fn serialize(&self, packet: &mut Vec<u8>) -> Result<(), EncodeError> {
        self.name.serialize(packet)?;
        push_u16(packet, self.rrtype.into());
        push_u16(packet, self.class.into());
        push_i32(packet, self.ttl);
        push_u16(packet, self.rdlen);
        Ok(())
    }

    #[inline]
    fn into_owned(self) -> RecordPreamble<'static> {
        RecordPreamble {
            name: self.name.into_owned(),
            rrtype: self.rrtype,
            class: self.class,
            ttl: self.ttl,
            rdlen: self.rdlen,
        }
    }
}

/// Decoded RDATA.
///
/// Only the types whose RDATA may contain compressed names are decoded, besides addresses of
/// class IN. Everything else is kept as opaque bytes and written back untouched.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordData<'a> {
    /// A host address.
    A(Ipv4Addr),
    /// An IPv6 host address.
    Aaaa(Ipv6Addr),
    /// An authoritative name server
    Ns(Name<'a>),
    /// The canonical name for an alias.
    Cname(Name<'a>),
    /// A domain name pointer.
    Ptr(Name<'a>),
    /// Mail exchange.
    Mx {
        /// The preference given to this RR among others at the same owner.
        preference: u16,
        /// A host willing to act as a mail exchange for the owner name.
        exchange: Name<'a>,
    },
    /// Start of a zone of authority.
    Soa {
        /// The name server that was the original or primary source of data for this zone.
        mname: Name<'a>,
        /// The mailbox of the person responsible for this zone.
        rname: Name<'a>,
        /// Version number of the original copy of the zone.
        serial: u32,
        /// Interval before the zone should be refreshed.
        refresh: i32,
        /// Interval that should elapse before a failed refresh should be retried.
        retry: i32,
        /// Upper limit on the time interval that can elapse before the zone is no longer authoritative.
        expire: i32,
        /// Minimum TTL that should be exported with any RR from this zone.
        minimum: u32,
    },
    /// RDATA of any other type, or of an address outside class IN, kept as found.
    Unknown {
        /// The type of the record holding it.
        rrtype: Type,
        /// Raw RDATA
        rdata: Cow<'a, [u8]>,
    },
}

// Addresses only have a known layout in class IN, names are read in any class.
#[inline]
fn is_decoded(rrtype: Type, class: Class) -> bool {
    match rrtype {
        Type::A | Type::Aaaa => class == Class::IN,
        Type::Ns | Type::Cname | Type::Ptr | Type::Mx | Type::Soa => true,
        _ => false,
    }
}

impl<'a> RecordData<'a> {
    #[inline]
    fn parse(
        buff: &'a [u8],
        pos: usize,
        preamble: &RecordPreamble<'_>,
    ) -> Result<Self, ParseError> {
        let rdlen = preamble.rdlen;
        let rdata = safe_slice_read(buff, pos, rdlen as _)?;
        let check_len = |expected: usize| {
            if rdlen as usize == expected {
                Ok(())
            } else {
                Err(ParseError::RdataLength {
                    rrtype: preamble.rrtype.into(),
                    declared: rdlen,
                    expected: expected as _,
                })
            }
        };
        if !is_decoded(preamble.rrtype, preamble.class) {
            return Ok(Self::Unknown {
                rrtype: preamble.rrtype,
                rdata: Cow::Borrowed(rdata),
            });
        }
        match preamble.rrtype {
            Type::A => {
                check_len(4)?;
                Ok(Self::A(safe_ipv4_read(buff, pos)?))
            }
            Type::Aaaa => {
                check_len(16)?;
                Ok(Self::Aaaa(safe_ipv6_read(buff, pos)?))
            }
            Type::Ns => {
                let (name, n) = Name::parse(buff, pos)?;
                check_len(n)?;
                Ok(Self::Ns(name))
            }
            Type::Cname => {
                let (name, n) = Name::parse(buff, pos)?;
                check_len(n)?;
                Ok(Self::Cname(name))
            }
            Type::Ptr => {
                let (name, n) = Name::parse(buff, pos)?;
                check_len(n)?;
                Ok(Self::Ptr(name))
            }
            Type::Mx => {
                let preference = safe_u16_read(buff, pos)?;
                let (exchange, n) = Name::parse(buff, pos + 2)?;
                check_len(n + 2)?;
                Ok(Self::Mx {
                    preference,
                    exchange,
                })
            }
            Type::Soa => {
                let (mname, n1) = Name::parse(buff, pos)?;
                let (rname, n2) = Name::parse(buff, pos + n1)?;
                let n = pos + n1 + n2;
                check_len(n1 + n2 + 20)?;
                Ok(Self::Soa {
                    mname,
                    rname,
                    serial: safe_u32_read(buff, n)?,
                    refresh: safe_i32_read(buff, n + 4)?,
                    retry: safe_i32_read(buff, n + 8)?,
                    expire: safe_i32_read(buff, n + 12)?,
                    minimum: safe_u32_read(buff, n + 16)?,
                })
            }
            rrtype => Ok(Self::Unknown {
                rrtype,
                rdata: Cow::Borrowed(rdata),
            }),
        }
    }

    /// The TYPE of a record holding this data.
    #[inline]
    pub fn rrtype(&self) -> Type {
        match self {
            Self::A(_) => Type::A,
            Self::Aaaa(_) => Type::Aaaa,
            Self::Ns(_) => Type::Ns,
            Self::Cname(_) => Type::Cname,
            Self::Ptr(_) => Type::Ptr,
            Self::Mx { .. } => Type::Mx,
            Self::Soa { .. } => Type::Soa,
            Self::Unknown { rrtype, .. } => *rrtype,
        }
    }

    /// True if decoding a record of `rrtype` and `class` holding this data gives it back.
    #[inline]
    pub fn fits(&self, rrtype: Type, class: Class) -> bool {
        match self {
            Self::Unknown { rrtype: own, .. } => *own == rrtype && !is_decoded(rrtype, class),
            data => data.rrtype() == rrtype && is_decoded(rrtype, class),
        }
    }

    #[inline]
    fn serialize(&self, packet: &mut Vec<u8>) -> Result<(), EncodeError> {
        match self {
            Self::A(ip) => packet.extend(ip.octets()),
            Self::Aaaa(ip) => packet.extend(ip.octets()),
            Self::Ns(name) | Self::Cname(name) | Self::Ptr(name) => name.serialize(packet)?,
            Self::Mx {
                preference,
                exchange,
            } => {
                push_u16(packet, *preference);
                exchange.serialize(packet)?;
            }
            Self::Soa {
                mname,
                rname,
                serial,
                refresh,
                retry,
                expire,
                minimum,
            } => {
                mname.serialize(packet)?;
                rname.serialize(packet)?;
                push_u32(packet, *serial);
                push_i32(packet, *refresh);
                push_i32(packet, *retry);
                push_i32(packet, *expire);
                push_u32(packet, *minimum);
            }
            Self::Unknown { rdata, .. } => packet.extend(rdata.iter()),
        }
        Ok(())
    }

    /// Length in bytes of the uncompressed encoding.
    #[inline]
    pub fn len(&self) -> usize {
        match self {
            Self::A(_) => 4,
            Self::Aaaa(_) => 16,
            Self::Ns(name) | Self::Cname(name) | Self::Ptr(name) => name.wire_len(),
            Self::Mx { exchange, .. } => 2 + exchange.wire_len(),
            Self::Soa { mname, rname, .. } => mname.wire_len() + rname.wire_len() + 20,
            Self::Unknown { rdata, .. } => rdata.len(),
        }
    }

    /// True if the encoded data takes no bytes at all.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    fn into_owned(self) -> RecordData<'static> {
        match self {
            Self::A(ip) => RecordData::A(ip),
            Self::Aaaa(ip) => RecordData::Aaaa(ip),
            Self::Ns(name) => RecordData::Ns(name.into_owned()),
            Self::Cname(name) => RecordData::Cname(name.into_owned()),
            Self::Ptr(name) => RecordData::Ptr(name.into_owned()),
            Self::Mx {
                preference,
                exchange,
            } => RecordData::Mx {
                preference,
                exchange: exchange.into_owned(),
            },
            Self::Soa {
                mname,
                rname,
                serial,
                refresh,
                retry,
                expire,
                minimum,
            } => RecordData::Soa {
                mname: mname.into_owned(),
                rname: rname.into_owned(),
                serial,
                refresh,
                retry,
                expire,
                minimum,
            },
            Self::Unknown { rrtype, rdata } => RecordData::Unknown {
                rrtype,
                rdata: Cow::Owned(rdata.into_owned()),
            },
        }
    }
}

types! {
    /// A host address (IPv4)
    A = 1
    /// An authoritative name server
    Ns = 2
    /// The canonical name for an alias
    Cname = 5
    /// Marks the start of a zone of authority
    Soa = 6
    /// A domain name pointer
    Ptr = 12
    /// A mail exchange
    Mx = 15
    /// Text strings
    Txt = 16
    /// A host address (IPv6)
    Aaaa = 28
}

macro_rules! classes {
    ($(#[$inner:meta] $variant:ident = $value:literal),+ $(,)?) => {
        /// CLASS and QCLASS values. Only [Class::IN] is used in practice.
        #[derive(Copy, Clone, Debug, Eq, PartialEq, PartialOrd)]
        pub enum Class {
            $(#[$inner] $variant,)+
            /// Any other value
            Unknown(u16),
        }

        impl From<u16> for Class {
            #[inline]
            fn from(value: u16) -> Self {
                match value {
                    $($value => Self::$variant,)+
                    _ => Self::Unknown(value),
                }
            }
        }

        impl From<Class> for u16 {
            #[inline]
            fn from(value: Class) -> Self {
                match value {
                    $(Class::$variant => $value,)+
                    Class::Unknown(n) => n,
                }
            }
        }
    };
}

classes! {
    /// Internet
    IN = 1,
    /// CSNET, obsolete
    CS = 2,
    /// CHAOS
    CH = 3,
    /// Hesiod
    HS = 4,
    /// QCLASS `*`
    Any = 255,
}
