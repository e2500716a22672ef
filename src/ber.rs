//! Tag-length-value encoding and conversion from BER to DER.
//!
//! CMS messages are frequently produced with the Basic Encoding Rules,
//! in particular in their streaming flavour where constructed values have an
//! indefinite length and are terminated by an end-of-contents marker. The
//! signature over such a message, however, is defined over the DER encoding
//! of certain parts. This module provides the means to get there.
//!
//! The [`Tlv`] type represents a single encoded value without interpreting
//! its content. The [`normalize`] function re-encodes arbitrary BER input
//! into DER with all lengths definite and minimal. Note that constructed
//! string encodings are kept constructed. Putting those back together is
//! left to whoever knows what the string means.
//!
//! Since the input to all of this is untrusted, parsing is bounded: all
//! lengths are checked against the available data before anything is
//! allocated and nesting of constructed values is limited to a configurable
//! depth.

use std::{error, fmt, io};
use bcder::{encode, Mode};
use bcder::decode::ContentError;
use bytes::Bytes;
use log::trace;


//------------ Configuration -------------------------------------------------

/// The default maximum nesting depth of constructed values.
///
/// This is the depth used by [`normalize`], [`Tlv::decode`], and
/// [`Tlv::decode_all`].
pub const DEFAULT_MAX_DEPTH: usize = 64;


//------------ normalize -----------------------------------------------------

/// Converts a BER encoded value into its DER encoding.
///
/// The input must contain exactly one value. All indefinite lengths are
/// resolved and end-of-contents markers dropped, all lengths are encoded in
/// their minimal form, and primitive content is copied verbatim.
///
/// Normalizing is idempotent: applying it to its own output returns the
/// same octets.
pub fn normalize(ber: &[u8]) -> Result<Bytes, MalformedError> {
    normalize_with_depth(ber, DEFAULT_MAX_DEPTH)
}

/// Converts a BER encoded value into DER using a custom nesting limit.
///
/// A constructed value nested `max_depth` levels deep results in an error
/// of kind [`MalformedKind::TooDeep`].
pub fn normalize_with_depth(
    ber: &[u8], max_depth: usize
) -> Result<Bytes, MalformedError> {
    Parser::new(ber, max_depth).take_one().map(|tlv| tlv.to_bytes())
}

/// Splits off the first complete value from the beginning of `data`.
///
/// Returns the encoded value and whatever follows it.
pub fn split_value(data: &[u8]) -> Result<(&[u8], &[u8]), MalformedError> {
    let mut parser = Parser::new(data, DEFAULT_MAX_DEPTH);
    let limit = data.len();
    parser.take_value(limit, 0, false)?;
    Ok(data.split_at(parser.pos))
}

/// Returns `data` if it consists of exactly one complete value.
///
/// Anything following the value results in an error of kind
/// [`MalformedKind::TrailingData`] at the offset where the value ends.
pub fn exact_value(data: &[u8]) -> Result<&[u8], MalformedError> {
    let (value, rest) = split_value(data)?;
    if !rest.is_empty() {
        return Err(MalformedError::new(
            MalformedKind::TrailingData, value.len()
        ))
    }
    Ok(value)
}


//------------ Class ---------------------------------------------------------

/// The class of a tag.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Class {
    Universal,
    Application,
    Context,
    Private,
}

impl Class {
    fn from_identifier(octet: u8) -> Self {
        match octet >> 6 {
            0 => Class::Universal,
            1 => Class::Application,
            2 => Class::Context,
            _ => Class::Private,
        }
    }

    fn to_identifier(self) -> u8 {
        match self {
            Class::Universal => 0x00,
            Class::Application => 0x40,
            Class::Context => 0x80,
            Class::Private => 0xC0,
        }
    }
}


//------------ Tlv -----------------------------------------------------------

/// A single encoded value.
///
/// The value consists of the class and number of its tag, whether it is
/// constructed, and its content octets. For a constructed value, the
/// content is the DER encoding of its children.
///
/// Values are only ever created in DER form, so two values are equal exactly
/// if their encodings are.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct Tlv {
    class: Class,
    number: u32,
    constructed: bool,
    content: Bytes,
}

/// # Universal Tag Numbers
///
impl Tlv {
    pub const INTEGER: u32 = 2;
    pub const OCTET_STRING: u32 = 4;
    pub const NULL: u32 = 5;
    pub const OID: u32 = 6;
    pub const SEQUENCE: u32 = 16;
    pub const SET: u32 = 17;
    pub const UTC_TIME: u32 = 23;
    pub const GENERALIZED_TIME: u32 = 24;
}

impl Tlv {
    /// Creates a new value from its parts.
    ///
    /// If `constructed` is true, `content` must be the DER encoding of
    /// the value’s children.
    pub fn new(
        class: Class, number: u32, constructed: bool, content: Bytes
    ) -> Self {
        Tlv { class, number, constructed, content }
    }

    /// Creates a new primitive value with a universal tag.
    pub fn primitive(number: u32, content: Bytes) -> Self {
        Self::new(Class::Universal, number, false, content)
    }

    pub fn class(&self) -> Class {
        self.class
    }

    pub fn number(&self) -> u32 {
        self.number
    }

    pub fn is_constructed(&self) -> bool {
        self.constructed
    }

    /// Returns the content octets of the value.
    pub fn content(&self) -> &Bytes {
        &self.content
    }

    /// Converts the value into its content octets.
    pub fn into_content(self) -> Bytes {
        self.content
    }

    /// Returns whether the value has the given universal tag and form.
    pub fn is_universal(&self, number: u32, constructed: bool) -> bool {
        self.class == Class::Universal
            && self.number == number
            && self.constructed == constructed
    }
}

/// # Decoding
///
impl Tlv {
    /// Decodes exactly one value from `data`.
    ///
    /// The data may be BER encoded. The resulting value will be in DER.
    pub fn decode(data: &[u8]) -> Result<Self, MalformedError> {
        Parser::new(data, DEFAULT_MAX_DEPTH).take_one()
    }

    /// Decodes a sequence of zero or more values that fill all of `data`.
    pub fn decode_all(data: &[u8]) -> Result<Vec<Self>, MalformedError> {
        let mut parser = Parser::new(data, DEFAULT_MAX_DEPTH);
        let mut res = Vec::new();
        while parser.pos < data.len() {
            if let Some(tlv) = parser.take_value(data.len(), 0, false)? {
                res.push(tlv)
            }
        }
        Ok(res)
    }

    /// Decodes the children of a constructed value.
    pub fn children(&self) -> Result<Vec<Self>, MalformedError> {
        if !self.constructed {
            return Ok(Vec::new())
        }
        Self::decode_all(self.content.as_ref())
    }
}

/// # Encoding
///
impl Tlv {
    fn header(&self) -> Header {
        Header::new(
            self.class, self.constructed, self.number, self.content.len()
        )
    }

    /// Returns the length of the DER encoding of the value.
    pub fn der_len(&self) -> usize {
        self.header().as_slice().len() + self.content.len()
    }

    /// Appends the DER encoding of the value to `target`.
    pub fn write_der(&self, target: &mut Vec<u8>) {
        target.extend_from_slice(self.header().as_slice());
        target.extend_from_slice(self.content.as_ref());
    }

    /// Returns the DER encoding of the value.
    pub fn to_bytes(&self) -> Bytes {
        let mut res = Vec::with_capacity(self.der_len());
        self.write_der(&mut res);
        res.into()
    }
}


//--- encode::Values

impl encode::Values for Tlv {
    fn encoded_len(&self, _mode: Mode) -> usize {
        self.der_len()
    }

    fn write_encoded<W: io::Write>(
        &self,
        _mode: Mode,
        target: &mut W
    ) -> Result<(), io::Error> {
        target.write_all(self.header().as_slice())?;
        target.write_all(self.content.as_ref())
    }
}


//------------ Header --------------------------------------------------------

/// The DER encoded identifier and length octets of a value.
///
/// Five octets suffice for a `u32` tag number and nine for a `usize` length,
/// so this always fits.
struct Header {
    buf: [u8; 16],
    len: usize,
}

impl Header {
    fn new(
        class: Class, constructed: bool, number: u32, content_len: usize
    ) -> Self {
        let mut res = Header { buf: [0; 16], len: 0 };
        let mut first = class.to_identifier();
        if constructed {
            first |= 0x20;
        }
        if number < 0x1F {
            res.push(first | number as u8);
        }
        else {
            res.push(first | 0x1F);
            let mut shift = 28;
            while shift > 0 && (number >> shift) == 0 {
                shift -= 7;
            }
            while shift > 0 {
                res.push(0x80 | ((number >> shift) & 0x7F) as u8);
                shift -= 7;
            }
            res.push((number & 0x7F) as u8);
        }
        if content_len < 0x80 {
            res.push(content_len as u8);
        }
        else {
            let octets = content_len.to_be_bytes();
            let skip = octets.iter().take_while(|&&x| x == 0).count();
            res.push(0x80 | (octets.len() - skip) as u8);
            for &octet in &octets[skip..] {
                res.push(octet)
            }
        }
        res
    }

    fn push(&mut self, octet: u8) {
        self.buf[self.len] = octet;
        self.len += 1;
    }

    fn as_slice(&self) -> &[u8] {
        &self.buf[..self.len]
    }
}


//------------ Parser --------------------------------------------------------

/// The recursive descent parser behind everything.
///
/// All positions are absolute offsets into `data`. Every method that reads
/// gets a limit that it must not read beyond. This is the end of the
/// innermost enclosing definite-length value or of the data.
struct Parser<'a> {
    data: &'a [u8],
    pos: usize,
    max_depth: usize,
}

impl<'a> Parser<'a> {
    fn new(data: &'a [u8], max_depth: usize) -> Self {
        Parser { data, pos: 0, max_depth }
    }

    /// Takes a single value that must make up all of the data.
    fn take_one(&mut self) -> Result<Tlv, MalformedError> {
        let limit = self.data.len();
        // Outside of an indefinite value, take_value never returns `None`.
        let res = match self.take_value(limit, 0, false)? {
            Some(res) => res,
            None => return Err(self.err(MalformedKind::UnexpectedEndOfContents))
        };
        if self.pos < limit {
            return Err(self.err(MalformedKind::TrailingData))
        }
        Ok(res)
    }

    /// Takes a value.
    ///
    /// If `indefinite` is true, the value is a child of an indefinite-length
    /// value and may be the end-of-contents marker, in which case `None` is
    /// returned.
    fn take_value(
        &mut self, limit: usize, depth: usize, indefinite: bool
    ) -> Result<Option<Tlv>, MalformedError> {
        let start = self.pos;
        let first = self.take_u8(limit)?;
        let class = Class::from_identifier(first);
        let constructed = first & 0x20 != 0;
        let number = self.take_tag_number(first, limit, start)?;
        let length = self.take_length(limit)?;

        if class == Class::Universal && number == 0 {
            if !indefinite || constructed || length != Some(0) {
                return Err(MalformedError::new(
                    MalformedKind::UnexpectedEndOfContents, start
                ))
            }
            return Ok(None)
        }

        if !constructed {
            let len = match length {
                Some(len) => len,
                None => {
                    return Err(MalformedError::new(
                        MalformedKind::IndefinitePrimitive, start
                    ))
                }
            };
            let content = self.take_slice(len, limit)?;
            return Ok(Some(Tlv::new(
                class, number, false, Bytes::copy_from_slice(content)
            )))
        }

        if depth >= self.max_depth {
            return Err(MalformedError::new(MalformedKind::TooDeep, start))
        }

        let mut content = Vec::new();
        match length {
            Some(len) => {
                if len > limit - self.pos {
                    return Err(MalformedError::new(
                        MalformedKind::Truncated, limit
                    ))
                }
                let end = self.pos + len;
                while self.pos < end {
                    if let Some(tlv) = self.take_value(end, depth + 1, false)? {
                        tlv.write_der(&mut content)
                    }
                }
            }
            None => {
                trace!("resolving indefinite length at offset {}", start);
                while let Some(tlv) = self.take_value(limit, depth + 1, true)? {
                    tlv.write_der(&mut content)
                }
            }
        }
        Ok(Some(Tlv::new(class, number, true, content.into())))
    }

    fn take_u8(&mut self, limit: usize) -> Result<u8, MalformedError> {
        if self.pos >= limit {
            return Err(self.err(MalformedKind::Truncated))
        }
        let res = self.data[self.pos];
        self.pos += 1;
        Ok(res)
    }

    fn take_slice(
        &mut self, len: usize, limit: usize
    ) -> Result<&'a [u8], MalformedError> {
        if len > limit - self.pos {
            return Err(MalformedError::new(MalformedKind::Truncated, limit))
        }
        let res = &self.data[self.pos..self.pos + len];
        self.pos += len;
        Ok(res)
    }

    /// Takes the remainder of the tag number after the first octet.
    ///
    /// High tag numbers must be minimally encoded, fit into a `u32`, and
    /// not be representable in the first octet.
    fn take_tag_number(
        &mut self, first: u8, limit: usize, start: usize
    ) -> Result<u32, MalformedError> {
        if first & 0x1F != 0x1F {
            return Ok(u32::from(first & 0x1F))
        }
        let invalid = MalformedError::new(MalformedKind::InvalidTag, start);
        let mut number = 0u32;
        let mut leading = true;
        loop {
            let octet = self.take_u8(limit)?;
            if leading && octet == 0x80 {
                return Err(invalid)
            }
            leading = false;
            if number > (u32::MAX >> 7) {
                return Err(invalid)
            }
            number = (number << 7) | u32::from(octet & 0x7F);
            if octet & 0x80 == 0 {
                break
            }
        }
        if number < 0x1F {
            return Err(invalid)
        }
        Ok(number)
    }

    /// Takes the length octets.
    ///
    /// Returns `None` for the indefinite form.
    fn take_length(
        &mut self, limit: usize
    ) -> Result<Option<usize>, MalformedError> {
        let start = self.pos;
        let first = self.take_u8(limit)?;
        if first < 0x80 {
            return Ok(Some(usize::from(first)))
        }
        if first == 0x80 {
            return Ok(None)
        }
        if first == 0xFF {
            return Err(MalformedError::new(MalformedKind::InvalidLength, start))
        }
        let mut len = 0usize;
        for _ in 0..(first & 0x7F) {
            let octet = self.take_u8(limit)?;
            len = len.checked_mul(0x100).and_then(|len| {
                len.checked_add(usize::from(octet))
            }).ok_or_else(|| {
                MalformedError::new(MalformedKind::InvalidLength, start)
            })?;
        }
        Ok(Some(len))
    }

    fn err(&self, kind: MalformedKind) -> MalformedError {
        MalformedError::new(kind, self.pos)
    }
}


//------------ MalformedKind -------------------------------------------------

/// The reason why an encoding is malformed.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum MalformedKind {
    /// The data ended before a value was complete.
    Truncated,

    /// An end-of-contents marker appeared where it isn’t allowed.
    UnexpectedEndOfContents,

    /// Constructed values are nested too deeply.
    TooDeep,

    /// The length octets are invalid.
    InvalidLength,

    /// A primitive value used the indefinite length form.
    IndefinitePrimitive,

    /// The tag number is not minimally encoded or too large.
    InvalidTag,

    /// There is data left after the value.
    TrailingData,
}

impl fmt::Display for MalformedKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match *self {
            MalformedKind::Truncated => "unexpected end of data",
            MalformedKind::UnexpectedEndOfContents => {
                "unexpected end-of-contents"
            }
            MalformedKind::TooDeep => "nesting too deep",
            MalformedKind::InvalidLength => "invalid length",
            MalformedKind::IndefinitePrimitive => {
                "indefinite length primitive value"
            }
            MalformedKind::InvalidTag => "invalid tag",
            MalformedKind::TrailingData => "trailing data",
        })
    }
}


//------------ MalformedError ------------------------------------------------

/// An encoding was malformed.
///
/// The error carries the kind of problem and the offset into the input data
/// where it was detected.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct MalformedError {
    kind: MalformedKind,
    offset: usize,
}

impl MalformedError {
    pub(crate) fn new(kind: MalformedKind, offset: usize) -> Self {
        MalformedError { kind, offset }
    }

    pub fn kind(&self) -> MalformedKind {
        self.kind
    }

    pub fn offset(&self) -> usize {
        self.offset
    }
}

impl fmt::Display for MalformedError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} at offset {}", self.kind, self.offset)
    }
}

impl error::Error for MalformedError { }

impl From<MalformedError> for ContentError {
    fn from(err: MalformedError) -> Self {
        ContentError::from_boxed(Box::new(err))
    }
}


//============ Tests =========================================================
