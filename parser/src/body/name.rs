// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use crate::binutils::*;
use crate::{EncodeError, ParseError};
use std::borrow::Cow;
use std::fmt;
use std::ops::Range;

const INIT_NUM_LABELS: usize = 4;

pub(crate) const MAX_LABEL_SIZE: usize = 63;
pub(crate) const MAX_NAME_SIZE: usize = 255;

/// A domain name represented as an inverted list of labels.
///
/// Labels are kept as the raw bytes found on the wire, any octet is valid inside a label.
/// Labels parsed from a packet borrow from it; [Name::into_owned] detaches the name so it can
/// outlive the buffer it came from.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Name<'a>(Vec<Cow<'a, [u8]>>);

/// Prints the presentation format: printable ASCII as is, `.` and `\` escaped with a
/// backslash and every other octet as `\DDD`.
impl fmt::Display for Name<'_> {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for l in self.iter_human() {
            for &b in l {
                match b {
                    b'.' | b'\\' => write!(f, "\\{}", b as char)?,
                    0x21..=0x7e => write!(f, "{}", b as char)?,
                    _ => write!(f, "\\{:03}", b)?,
                }
            }
            f.write_str(".")?;
        }
        Ok(())
    }
}

impl fmt::Debug for Name<'_> {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Name({})", self)
    }
}

impl Default for Name<'_> {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl TryFrom<&Name<'_>> for Vec<u8> {
    type Error = EncodeError;

    #[inline]
    fn try_from(name: &Name<'_>) -> Result<Self, Self::Error> {
        let mut out = Vec::with_capacity(name.0.len() * 8);
        name.serialize(&mut out)?;
        Ok(out)
    }
}

impl<'a> TryFrom<&'a str> for Name<'a> {
    type Error = ParseError;

    /// Build a name from its dotted representation. The trailing dot is optional and the
    /// empty string (or a single dot) is the root.
    fn try_from(value: &'a str) -> Result<Self, Self::Error> {
        let mut name = Name::default();
        for label in value.rsplit('.') {
            if label.len() > MAX_LABEL_SIZE {
                return Err(ParseError::LabelLength(label.len()));
            }
            name.push_label(label);
        }
        name.check_len()?;
        Ok(name)
    }
}

impl<'a> Name<'a> {
    /// Decode the name at `pos` of a whole message `buff`. Returns the name and the number
    /// of bytes it takes at `pos`, a compression pointer counting as 2.
    ///
    /// # Errors
    ///
    /// Pointers have to point backwards, labels can not be longer than 63 bytes and the
    /// expanded name can not be longer than 255 bytes.
    #[inline]
    pub fn parse(buff: &'a [u8], pos: usize) -> Result<(Self, usize), ParseError> {
        let (labels, n) = find_labels(buff, pos)?;
        let name = parse_labels(buff, labels);
        name.check_len()?;
        Ok((name, n))
    }

    #[inline]
    fn check_len(&self) -> Result<(), ParseError> {
        match self.wire_len() {
            len if len > MAX_NAME_SIZE => Err(ParseError::NameLength(len)),
            _ => Ok(()),
        }
    }

    /// Append the uncompressed encoding to `packet`.
    #[inline]
    pub fn serialize(&self, packet: &mut Vec<u8>) -> Result<(), EncodeError> {
        for label in self.iter_human() {
            let len = u8::try_from(label.len())
                .ok()
                .filter(|&len| usize::from(len) <= MAX_LABEL_SIZE)
                .ok_or(EncodeError::LabelLength(label.len()))?;
            packet.push(len);
            packet.extend_from_slice(label);
        }
        packet.push(0);
        Ok(())
    }

    /// Create a new, empty, domain name.
    ///
    /// ```
    /// # use hopper_parser::body::name::Name;
    /// let name = Name::new();
    /// assert_eq!(name.to_string(), "".to_string())
    /// ```
    #[inline]
    pub fn new() -> Self {
        Name(Vec::with_capacity(INIT_NUM_LABELS))
    }

    /// Copy every borrowed label so the name no longer depends on the packet it was parsed
    /// from.
    #[inline]
    pub fn into_owned(self) -> Name<'static> {
        Name(
            self.0
                .into_iter()
                .map(|l| Cow::Owned(l.into_owned()))
                .collect(),
        )
    }

    /// Push a new label to the end of the domain name, as a subdomain of the current one. Empty
    /// labels will be ignored. Any octet is valid, the label is stored as UTF-8 bytes.
    ///
    /// ```
    /// # use hopper_parser::body::name::Name;
    /// let mut name = Name::new();
    /// name.push_label("com");
    /// name.push_label("example");
    /// assert_eq!(name.to_string(), "example.com.".to_string())
    /// ```
    #[inline]
    pub fn push_label(&mut self, label: impl Into<Cow<'a, str>>) {
        match label.into() {
            Cow::Borrowed(l) => self.push_raw(Cow::Borrowed(l.as_bytes())),
            Cow::Owned(l) => self.push_raw(Cow::Owned(l.into_bytes())),
        }
    }

    #[inline]
    fn push_raw(&mut self, label: Cow<'a, [u8]>) {
        if !label.is_empty() {
            self.0.push(label);
        }
    }

    /// Get the number of labels in the domain name.
    #[inline]
    pub fn label_count(&self) -> usize {
        self.0.len()
    }

    /// Length in bytes of the uncompressed wire representation.
    ///
    /// ```
    /// # use hopper_parser::body::name::Name;
    /// let name = Name::try_from("example.com").unwrap();
    /// assert_eq!(name.wire_len(), 13)
    /// ```
    #[inline]
    pub fn wire_len(&self) -> usize {
        self.0.iter().map(|l| l.len() + 1).sum::<usize>() + 1
    }

    /// Return an iterator over the labels in human order.
    ///
    /// ```
    /// # use hopper_parser::body::name::Name;
    /// let mut name = Name::try_from("subdomain.example.com").unwrap();
    /// let mut human = name.iter_human();
    ///
    /// assert_eq!(human.next(), Some(&b"subdomain"[..]));
    /// assert_eq!(human.next(), Some(&b"example"[..]));
    /// assert_eq!(human.next(), Some(&b"com"[..]));
    /// ```
    #[inline]
    pub fn iter_human(&self) -> impl DoubleEndedIterator<Item = &[u8]> + '_ {
        self.iter_hierarchy().rev()
    }

    /// Return an iterator over the labels in hierarchical order.
    ///
    /// ```
    /// # use hopper_parser::body::name::Name;
    /// let mut name = Name::try_from("subdomain.example.com").unwrap();
    /// let mut hierarchy = name.iter_hierarchy();
    ///
    /// assert_eq!(hierarchy.next(), Some(&b"com"[..]));
    /// assert_eq!(hierarchy.next(), Some(&b"example"[..]));
    /// assert_eq!(hierarchy.next(), Some(&b"subdomain"[..]));
    /// ```
    #[inline]
    pub fn iter_hierarchy(&self) -> impl DoubleEndedIterator<Item = &[u8]> + '_ {
        self.0.iter().map(|l| &**l)
    }
}

#[inline]
fn parse_labels(buff: &[u8], labels: Vec<Range<usize>>) -> Name<'_> {
    let mut name = Name::new();
    for range in labels.into_iter().rev() {
        name.push_raw(Cow::Borrowed(&buff[range]));
    }
    name
}

/// Walk the labels of the name at `start`, following compression pointers. Returns the byte
/// ranges of every label in wire order and the number of bytes the name takes at `start`.
///
/// A pointer must land strictly before the byte it was read from, so the walk can not loop.
fn find_labels(buff: &[u8], start: usize) -> Result<(Vec<Range<usize>>, usize), ParseError> {
    let mut labels = Vec::with_capacity(INIT_NUM_LABELS);
    let mut pos = start;
    // Set at the first pointer, later bytes belong to other names.
    let mut consumed = None;
    let mut jumps = 0;
    loop {
        match read_label_metadata(buff, pos)? {
            LabelMeta::End => {
                let n = consumed.unwrap_or_else(|| pos + 1 - start);
                return Ok((labels, n));
            }
            LabelMeta::Size(len) => {
                let end = pos + 1 + len;
                if end > buff.len() {
                    return Err(ParseError::LabelLength(len));
                }
                labels.push(pos + 1..end);
                pos = end;
            }
            LabelMeta::Pointer(ptr) => {
                if ptr >= pos {
                    return Err(ParseError::InvalidJump);
                }
                jumps += 1;
                if jumps > buff.len() {
                    return Err(ParseError::ExcesiveJumps(jumps));
                }
                if consumed.is_none() {
                    consumed = Some(pos + 2 - start);
                }
                pos = ptr;
            }
        }
    }
}

enum LabelMeta {
    End,
    // 1 to 63
    Size(usize),
    // 14 bit offset
    Pointer(usize),
}

#[inline]
fn read_label_metadata(buff: &[u8], pos: usize) -> Result<LabelMeta, ParseError> {
    match safe_u8_read(buff, pos)? {
        0 => Ok(LabelMeta::End),
        len @ 1..=0b0011_1111 => Ok(LabelMeta::Size(len as usize)),
        0b1100_0000..=0xFF => {
            let ptr = safe_u16_read(buff, pos)? & 0b0011_1111_1111_1111;
            Ok(LabelMeta::Pointer(ptr as usize))
        }
        prefix => Err(ParseError::LabelPrefix(prefix)),
    }
}
