//! Content info and encapsulated content.
//!
//! Every CMS message is wrapped into a content info which names the type
//! of its content. For signed data, the signed content itself is again
//! wrapped into an encapsulated content info. Both are defined in
//! [RFC 5652].
//!
//! [RFC 5652]: https://tools.ietf.org/html/rfc5652

use bcder::{decode, encode};
use bcder::{Captured, Mode, OctetString, Oid, Tag};
use bcder::decode::DecodeError;
use bcder::encode::{PrimitiveContent, Values};
use bytes::{Bytes, BytesMut};
use log::debug;
use crate::ber::{self, Tlv};
use crate::crypto::{Digest, DigestAlgorithm};
use crate::error::Error;
use crate::oid;
use crate::sigdata::SignedData;


//------------ ContentInfo ---------------------------------------------------

/// The outermost wrapper of a CMS message.
///
/// ```txt
/// ContentInfo ::= SEQUENCE {
///     contentType ContentType,
///     content [0] EXPLICIT ANY DEFINED BY contentType }
/// ```
#[derive(Clone, Debug)]
pub struct ContentInfo {
    content_type: Oid<Bytes>,

    /// The encoded value inside the explicit tag.
    content: Captured,
}

impl ContentInfo {
    pub fn new(content_type: Oid<Bytes>, content: Captured) -> Self {
        ContentInfo { content_type, content }
    }

    /// Decodes a DER encoded content info.
    ///
    /// Only content infos of type data or signed data are accepted. Any
    /// data following the content info is an error.
    pub fn decode(der: &[u8]) -> Result<Self, Error> {
        let (value, rest) = ber::split_value(der)?;
        if !rest.is_empty() {
            return Err(Error::TrailingData)
        }
        let res = Mode::Der.decode(value, Self::take_from)?;
        if res.content_type != oid::DATA
            && res.content_type != oid::SIGNED_DATA
        {
            return Err(Error::unsupported_content_type(&res.content_type))
        }
        Ok(res)
    }

    /// Decodes a BER encoded content info.
    ///
    /// The data is normalized to DER first.
    pub fn decode_ber(ber: &[u8]) -> Result<Self, Error> {
        let der = ber::normalize(ber)?;
        if der.as_ref() != ber {
            debug!(
                "normalized BER content info from {} to {} octets",
                ber.len(), der.len()
            );
        }
        Self::decode(der.as_ref())
    }

    pub fn take_from<S: decode::Source>(
        cons: &mut decode::Constructed<S>
    ) -> Result<Self, DecodeError<S::Error>> {
        cons.take_sequence(|cons| {
            let content_type = Oid::take_from(cons)?;
            let content = cons.take_constructed_if(Tag::CTX_0, |cons| {
                cons.capture_one()
            })?;
            Ok(ContentInfo { content_type, content })
        })
    }

    pub fn content_type(&self) -> &Oid<Bytes> {
        &self.content_type
    }

    /// Returns the encoded content.
    pub fn content(&self) -> &Captured {
        &self.content
    }

    /// Decodes the content as signed data.
    ///
    /// Fails with a wrong type error if the content is something else.
    pub fn signed_data(&self) -> Result<SignedData, Error> {
        if self.content_type != oid::SIGNED_DATA {
            return Err(Error::WrongType)
        }
        SignedData::decode(self.content.as_slice())
    }

    pub fn encode_ref(&self) -> impl encode::Values + '_ {
        encode::sequence((
            self.content_type.encode_ref(),
            encode::sequence_as(Tag::CTX_0, &self.content),
        ))
    }

    /// Returns the DER encoding of the content info.
    pub fn to_bytes(&self) -> Bytes {
        self.encode_ref().to_captured(Mode::Der).into_bytes()
    }
}


//------------ EncapsulatedContentInfo ---------------------------------------

/// The content signed by signed data.
///
/// ```txt
/// EncapsulatedContentInfo ::= SEQUENCE {
///     eContentType ContentType,
///     eContent [0] EXPLICIT OCTET STRING OPTIONAL }
/// ```
///
/// If the content is missing, it is _detached_ and needs to be provided
/// separately when verifying. The OCTET STRING is kept as encoded. If it
/// is constructed, the content is the concatenation of its segments.
#[derive(Clone, Debug)]
pub struct EncapsulatedContentInfo {
    content_type: Oid<Bytes>,

    /// The encoded OCTET STRING inside the explicit tag.
    content: Option<Captured>,
}

/// # Creation
///
impl EncapsulatedContentInfo {
    /// Creates attached content of the given type.
    pub fn new(content_type: Oid<Bytes>, content: Bytes) -> Self {
        EncapsulatedContentInfo {
            content_type,
            content: Some(
                OctetString::encode_slice(content).to_captured(Mode::Der)
            ),
        }
    }

    /// Creates attached content of type data.
    pub fn new_data(content: Bytes) -> Self {
        Self::new(Oid(Bytes::from_static(oid::DATA.0)), content)
    }

    /// Creates attached content of type TSTInfo.
    ///
    /// The content must be a single DER encoded SEQUENCE. It is not
    /// inspected any further.
    pub fn new_tst_info(der: Bytes) -> Result<Self, Error> {
        Self::check_tst_info(der.as_ref())?;
        Ok(Self::new(Oid(Bytes::from_static(oid::TST_INFO.0)), der))
    }

    /// Creates detached content of the given type.
    pub fn detached(content_type: Oid<Bytes>) -> Self {
        EncapsulatedContentInfo { content_type, content: None }
    }

    fn check_tst_info(der: &[u8]) -> Result<(), Error> {
        if Tlv::decode(der)?.is_universal(Tlv::SEQUENCE, true) {
            Ok(())
        }
        else {
            Err(Error::WrongType)
        }
    }
}

/// # Decoding and Encoding
///
impl EncapsulatedContentInfo {
    pub fn take_from<S: decode::Source>(
        cons: &mut decode::Constructed<S>
    ) -> Result<Self, DecodeError<S::Error>> {
        cons.take_sequence(|cons| {
            let content_type = Oid::take_from(cons)?;
            let content = cons.take_opt_constructed_if(Tag::CTX_0, |cons| {
                cons.capture_one()
            })?;
            Ok(EncapsulatedContentInfo { content_type, content })
        })
    }

    pub fn encode_ref(&self) -> impl encode::Values + '_ {
        encode::sequence((
            self.content_type.encode_ref(),
            self.content.as_ref().map(|content| {
                encode::sequence_as(Tag::CTX_0, content)
            }),
        ))
    }
}

/// # Data Access
///
impl EncapsulatedContentInfo {
    pub fn content_type(&self) -> &Oid<Bytes> {
        &self.content_type
    }

    /// Returns whether the content has been detached.
    pub fn is_detached(&self) -> bool {
        self.content.is_none()
    }

    /// Returns the segments of the content.
    ///
    /// A primitive OCTET STRING has one segment, a constructed one has a
    /// segment for each of its primitive children. Anything else is a
    /// wrong type error.
    fn segments(&self) -> Result<Option<Vec<Bytes>>, Error> {
        let content = match self.content.as_ref() {
            Some(content) => content,
            None => return Ok(None)
        };
        let octets = Tlv::decode(content.as_slice())?;
        if !octets.is_universal(Tlv::OCTET_STRING, octets.is_constructed()) {
            return Err(Error::WrongType)
        }
        if !octets.is_constructed() {
            return Ok(Some(vec![octets.into_content()]))
        }
        octets.children()?.into_iter().map(|segment| {
            // Segments must not be constructed again.
            if segment.is_universal(Tlv::OCTET_STRING, false) {
                Ok(segment.into_content())
            }
            else {
                Err(Error::WrongType)
            }
        }).collect::<Result<Vec<_>, _>>().map(Some)
    }

    /// Returns the content.
    ///
    /// Returns `Ok(None)` if the content is detached.
    pub fn value(&self) -> Result<Option<Bytes>, Error> {
        let segments = match self.segments()? {
            Some(segments) => segments,
            None => return Ok(None)
        };
        if segments.len() == 1 {
            return Ok(segments.into_iter().next())
        }
        let mut res = BytesMut::with_capacity(
            segments.iter().map(Bytes::len).sum()
        );
        for segment in &segments {
            res.extend_from_slice(segment.as_ref())
        }
        Ok(Some(res.freeze()))
    }

    /// Returns the digest of the content.
    ///
    /// Returns `Ok(None)` if the content is detached.
    pub fn digest(
        &self, algorithm: DigestAlgorithm
    ) -> Result<Option<Digest>, Error> {
        let segments = match self.segments()? {
            Some(segments) => segments,
            None => return Ok(None)
        };
        let mut context = algorithm.start()?;
        segments.iter().for_each(|segment| context.update(segment));
        Ok(Some(context.finish()))
    }

    /// Returns whether the content is of type data.
    pub fn is_data(&self) -> bool {
        self.content_type == oid::DATA
    }

    /// Returns the content assuming it is of type data.
    pub fn data_content(&self) -> Result<Option<Bytes>, Error> {
        if !self.is_data() {
            return Err(Error::WrongType)
        }
        self.value()
    }

    /// Returns whether the content is of type TSTInfo.
    pub fn is_tst_info(&self) -> bool {
        self.content_type == oid::TST_INFO
    }

    /// Returns the encoded TSTInfo assuming that is what the content is.
    pub fn tst_info_content(&self) -> Result<Bytes, Error> {
        if !self.is_tst_info() {
            return Err(Error::WrongType)
        }
        let content = self.value()?.ok_or(Error::MissingContent)?;
        Self::check_tst_info(content.as_ref())?;
        Ok(content)
    }
}


//============ Tests =========================================================
