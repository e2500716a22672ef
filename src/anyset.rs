//! Sets of values of any type.
//!
//! A number of places in CMS use a SET OF values whose type is determined
//! by something outside the set, for instance the values of an attribute or
//! the certificates of a signed-data message. The [`AnySet`] type keeps the
//! elements of such a set as opaque [`Tlv`] values in the order they were
//! encountered. Interpreting them is left to whoever knows their type.

use std::slice;
use bcder::encode;
use bytes::Bytes;
use crate::ber::{Class, MalformedError, Tlv};
use crate::error::Error;


//------------ AnySet --------------------------------------------------------

/// An ordered set of opaque values.
#[derive(Clone, Debug, Default, Eq, Hash, PartialEq)]
pub struct AnySet {
    elements: Vec<Tlv>,
}

impl AnySet {
    /// Creates a new, empty set.
    pub fn new() -> Self {
        AnySet { elements: Vec::new() }
    }

    /// Creates a set from a vec of elements.
    pub fn from_elements(elements: Vec<Tlv>) -> Self {
        AnySet { elements }
    }

    /// Creates a set with exactly one element.
    pub fn single(element: Tlv) -> Self {
        AnySet { elements: vec![element] }
    }

    /// Decodes a complete encoded SET.
    ///
    /// The value must be a constructed universal SET. Its children are not
    /// interpreted beyond their tag and length.
    pub fn decode(data: &[u8]) -> Result<Self, Error> {
        Self::from_tlv(Tlv::decode(data)?)
    }

    /// Creates a set from a value that must be a SET.
    pub fn from_tlv(tlv: Tlv) -> Result<Self, Error> {
        if !tlv.is_universal(Tlv::SET, true) {
            return Err(Error::WrongType)
        }
        Self::from_content(tlv.content().as_ref()).map_err(Into::into)
    }

    /// Decodes the elements from the content of a set.
    ///
    /// This is useful when the set is implicitly tagged and the content has
    /// been unwrapped already.
    pub fn from_content(content: &[u8]) -> Result<Self, MalformedError> {
        Tlv::decode_all(content).map(Self::from_elements)
    }

    pub fn push(&mut self, element: Tlv) {
        self.elements.push(element)
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn contains(&self, element: &Tlv) -> bool {
        self.elements.contains(element)
    }

    pub fn iter(&self) -> slice::Iter<'_, Tlv> {
        self.elements.iter()
    }

    /// Returns the elements as a slice.
    pub fn elements(&self) -> &[Tlv] {
        &self.elements
    }

    /// Returns a value encoder for the complete SET.
    ///
    /// The elements are encoded in their current order.
    pub fn encode_ref(&self) -> impl encode::Values + '_ {
        encode::set(self.encode_content())
    }

    /// Returns a value encoder for the elements only.
    ///
    /// Use this for implicitly tagged sets.
    pub fn encode_content(&self) -> impl encode::Values + '_ {
        encode::iter(self.elements.iter())
    }

    /// Returns the DER encoding of the complete SET.
    pub fn to_bytes(&self) -> Bytes {
        let content_len = self.elements.iter().map(Tlv::der_len).sum();
        let mut content = Vec::with_capacity(content_len);
        for element in &self.elements {
            element.write_der(&mut content)
        }
        Tlv::new(
            Class::Universal, Tlv::SET, true, content.into()
        ).to_bytes()
    }
}


//--- IntoIterator

impl IntoIterator for AnySet {
    type Item = Tlv;
    type IntoIter = std::vec::IntoIter<Tlv>;

    fn into_iter(self) -> Self::IntoIter {
        self.elements.into_iter()
    }
}

impl<'a> IntoIterator for &'a AnySet {
    type Item = &'a Tlv;
    type IntoIter = slice::Iter<'a, Tlv>;

    fn into_iter(self) -> Self::IntoIter {
        self.elements.iter()
    }
}


//============ Tests =========================================================

#[cfg(test)]
mod test {
    use bcder::Mode;
    use bcder::encode::Values;
    use crate::ber::MalformedKind;
    use super::*;

    #[test]
    fn decode_mixed_set() {
        let der = b"\x31\x0a\x06\x03\x2a\x03\x04\x04\x01x\x05\x00";
        let set = AnySet::decode(der).unwrap();
        assert_eq!(set.len(), 3);
        assert!(set.elements()[0].is_universal(Tlv::OID, false));
        assert!(set.elements()[1].is_universal(Tlv::OCTET_STRING, false));
        assert!(set.elements()[2].is_universal(Tlv::NULL, false));
        assert_eq!(set.to_bytes().as_ref(), der.as_ref());
        assert_eq!(
            set.encode_ref().to_captured(Mode::Der).as_slice(),
            der.as_ref()
        );
    }

    #[test]
    fn decode_ber_set() {
        let ber = b"\x31\x80\x04\x01x\x00\x00";
        let set = AnySet::decode(ber).unwrap();
        assert_eq!(set.to_bytes().as_ref(), b"\x31\x03\x04\x01x");
    }

    #[test]
    fn empty_set() {
        let set = AnySet::decode(b"\x31\x00").unwrap();
        assert!(set.is_empty());
        assert_eq!(set.to_bytes().as_ref(), b"\x31\x00");
    }

    #[test]
    fn not_a_set() {
        assert!(matches!(
            AnySet::decode(b"\x30\x00"), Err(Error::WrongType)
        ));
        assert!(matches!(
            AnySet::decode(b"\x11\x00"), Err(Error::WrongType)
        ));
    }

    #[test]
    fn malformed_children() {
        match AnySet::decode(b"\x31\x03\x04\x05x") {
            Err(Error::Malformed(err)) => {
                assert_eq!(err.kind(), MalformedKind::Truncated)
            }
            res => panic!("unexpected result {:?}", res)
        }
    }
}
