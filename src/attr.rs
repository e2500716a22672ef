//! Attributes of signer infos.
//!
//! Attributes are defined in section 5.3 of [RFC 5652] as:
//!
//! ```txt
//! Attribute ::= SEQUENCE {
//!     attrType OBJECT IDENTIFIER,
//!     attrValues SET OF AttributeValue }
//!
//! AttributeValue ::= ANY
//! ```
//!
//! The values are kept as an [`AnySet`] so that attributes of any type can
//! be carried. Typed access is available for the three attributes we need
//! for signing: content type, message digest, and signing time.
//!
//! [RFC 5652]: https://tools.ietf.org/html/rfc5652

use std::slice;
use bcder::{decode, encode};
use bcder::{Captured, Mode, Oid, Tag};
use bcder::decode::DecodeError;
use bcder::encode::{PrimitiveContent, Values};
use bytes::Bytes;
use crate::anyset::AnySet;
use crate::ber::Tlv;
use crate::error::Error;
use crate::oid;
use crate::x509::Time;


//------------ Attribute -----------------------------------------------------

/// A single attribute.
#[derive(Clone, Debug)]
pub struct Attribute {
    attr_type: Oid<Bytes>,
    values: AnySet,
}

impl Attribute {
    pub fn new(attr_type: Oid<Bytes>, values: AnySet) -> Self {
        Attribute { attr_type, values }
    }

    /// Creates a content type attribute.
    pub fn content_type(content_type: &Oid<impl AsRef<[u8]>>) -> Self {
        Self::new(
            Oid(Bytes::from_static(oid::CONTENT_TYPE.0)),
            AnySet::single(Tlv::primitive(
                Tlv::OID, Bytes::copy_from_slice(content_type.0.as_ref())
            ))
        )
    }

    /// Creates a message digest attribute.
    pub fn message_digest(digest: &[u8]) -> Self {
        Self::new(
            Oid(Bytes::from_static(oid::MESSAGE_DIGEST.0)),
            AnySet::single(Tlv::primitive(
                Tlv::OCTET_STRING, Bytes::copy_from_slice(digest)
            ))
        )
    }

    /// Creates a signing time attribute.
    pub fn signing_time(time: Time) -> Self {
        Self::new(
            Oid(Bytes::from_static(oid::SIGNING_TIME.0)),
            AnySet::single(time.to_tlv())
        )
    }

    pub fn attr_type(&self) -> &Oid<Bytes> {
        &self.attr_type
    }

    pub fn values(&self) -> &AnySet {
        &self.values
    }

    pub fn take_from<S: decode::Source>(
        cons: &mut decode::Constructed<S>
    ) -> Result<Self, DecodeError<S::Error>> {
        cons.take_sequence(Self::from_constructed)
    }

    fn take_opt_from<S: decode::Source>(
        cons: &mut decode::Constructed<S>
    ) -> Result<Option<Self>, DecodeError<S::Error>> {
        cons.take_opt_sequence(Self::from_constructed)
    }

    fn from_constructed<S: decode::Source>(
        cons: &mut decode::Constructed<S>
    ) -> Result<Self, DecodeError<S::Error>> {
        let attr_type = Oid::take_from(cons)?;
        let values = cons.take_set(|cons| {
            let content = cons.capture_all()?;
            AnySet::from_content(content.as_slice()).map_err(|err| {
                cons.content_err(err)
            })
        })?;
        Ok(Attribute { attr_type, values })
    }

    pub fn encode_ref(&self) -> impl encode::Values + '_ {
        encode::sequence((
            self.attr_type.encode_ref(),
            self.values.encode_ref(),
        ))
    }
}


//------------ Attributes ----------------------------------------------------

/// A set of attributes.
///
/// ```txt
/// SignedAttributes ::= SET SIZE (1..MAX) OF Attribute
/// UnsignedAttributes ::= SET SIZE (1..MAX) OF Attribute
/// ```
///
/// Both sets appear with implicit context tags in a signer info. The
/// attributes are kept in the order they were found in together with the
/// encoded content of the set since that is what signatures are calculated
/// over.
#[derive(Clone, Debug)]
pub struct Attributes {
    /// The content of the encoded set.
    raw: Captured,

    /// The decoded attributes in order of appearance.
    attrs: Vec<Attribute>,
}

impl Attributes {
    /// Creates a new set from a list of attributes.
    ///
    /// The attributes will be ordered as DER requires for a SET OF, i.e.,
    /// by their encoding.
    pub fn new(attrs: Vec<Attribute>) -> Self {
        let mut attrs: Vec<_> = attrs.into_iter().map(|attr| {
            let encoded = attr.encode_ref().to_captured(Mode::Der);
            (encoded, attr)
        }).collect();
        attrs.sort_by(|left, right| left.0.as_slice().cmp(right.0.as_slice()));

        let mut raw = Captured::builder(Mode::Der);
        for (encoded, _) in &attrs {
            raw.extend(encoded)
        }
        Attributes {
            raw: raw.freeze(),
            attrs: attrs.into_iter().map(|(_, attr)| attr).collect()
        }
    }

    /// Takes the attributes from the content of a set.
    pub fn take_content_from<S: decode::Source>(
        cons: &mut decode::Constructed<S>
    ) -> Result<Self, DecodeError<S::Error>> {
        let mut attrs = Vec::new();
        let raw = cons.capture(|cons| {
            while let Some(attr) = Attribute::take_opt_from(cons)? {
                attrs.push(attr)
            }
            Ok(())
        })?;
        Ok(Attributes { raw, attrs })
    }

    /// Returns the number of attributes in the set.
    pub fn len(&self) -> usize {
        self.attrs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attrs.is_empty()
    }

    pub fn iter(&self) -> slice::Iter<'_, Attribute> {
        self.attrs.iter()
    }

    /// Returns the encoded content of the set.
    pub fn as_slice(&self) -> &[u8] {
        self.raw.as_slice()
    }

    /// Returns the values of all attributes of the given type.
    pub fn get_values(
        &self, attr_type: &Oid<impl AsRef<[u8]>>
    ) -> Vec<&AnySet> {
        self.attrs.iter().filter(|attr| {
            attr.attr_type.0.as_ref() == attr_type.0.as_ref()
        }).map(|attr| &attr.values).collect()
    }

    /// Returns the only value of the only attribute of the given type.
    ///
    /// Fails if there isn’t exactly one such attribute or if that attribute
    /// doesn’t have exactly one value.
    pub fn get_single(
        &self, attr_type: &Oid<impl AsRef<[u8]>>
    ) -> Result<&Tlv, Error> {
        let found = self.get_values(attr_type);
        let cardinality = |attributes, values| {
            Error::AttributeCardinality {
                attr_type: Oid(Bytes::copy_from_slice(attr_type.0.as_ref())),
                attributes,
                values,
            }
        };
        match found.as_slice() {
            [values] => {
                match values.elements() {
                    [value] => Ok(value),
                    other => Err(cardinality(1, other.len()))
                }
            }
            other => Err(cardinality(other.len(), 0))
        }
    }

    /// Returns the value of the content type attribute.
    pub fn content_type(&self) -> Result<Oid<Bytes>, Error> {
        let value = self.get_single(&oid::CONTENT_TYPE)?;
        if !value.is_universal(Tlv::OID, false) {
            return Err(Error::WrongType)
        }
        let bytes = value.to_bytes();
        Mode::Der.decode(bytes.as_ref(), Oid::take_from).map_err(Into::into)
    }

    /// Returns the value of the message digest attribute.
    pub fn message_digest(&self) -> Result<Bytes, Error> {
        let value = self.get_single(&oid::MESSAGE_DIGEST)?;
        if !value.is_universal(Tlv::OCTET_STRING, false) {
            return Err(Error::WrongType)
        }
        Ok(value.content().clone())
    }

    /// Returns the value of the signing time attribute.
    pub fn signing_time(&self) -> Result<Time, Error> {
        Time::from_tlv(self.get_single(&oid::SIGNING_TIME)?)
    }

    /// Returns a value encoder for the set with the given implicit tag.
    pub fn encode_ref_as(&self, tag: Tag) -> impl encode::Values + '_ {
        encode::sequence_as(tag, &self.raw)
    }

    /// Returns the encoding the signature is calculated over.
    ///
    /// This is the set encoded with the regular SET OF tag rather than the
    /// implicit context tag it appears with in a signer info.
    pub fn encode_verify(&self) -> Bytes {
        encode::set(&self.raw).to_captured(Mode::Der).into_bytes()
    }
}


//--- IntoIterator

impl<'a> IntoIterator for &'a Attributes {
    type Item = &'a Attribute;
    type IntoIter = slice::Iter<'a, Attribute>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}


//============ Tests =========================================================
