//! X.509 certificates.
//!
//! CMS messages carry the certificates of their signers and possibly of
//! the chains leading up to them. We only parse as much of a certificate as
//! is needed to identify a signer and verify its signature: the serial
//! number, issuer, validity, subject, public key, and the subject key
//! identifier extension. Everything else is skipped, although the complete
//! encoding is retained.
//!
//! There is no validation of any kind happening here.

use bcder::decode;
use bcder::{BitString, Captured, Mode, OctetString, Oid, Tag};
use bcder::decode::DecodeError;
use bytes::Bytes;
use crate::ber::{self, Tlv};
use crate::crypto::{PublicKey, SignatureAlgorithm};
use crate::error::Error;
use crate::oid;
use crate::x509::{AlgorithmIdentifier, Name, Serial, Validity};


//------------ Cert ----------------------------------------------------------

/// An X.509 certificate.
///
/// ```txt
/// Certificate  ::=  SEQUENCE  {
///     tbsCertificate       TBSCertificate,
///     signatureAlgorithm   AlgorithmIdentifier,
///     signatureValue       BIT STRING  }
///
/// TBSCertificate  ::=  SEQUENCE  {
///     version         [0]  EXPLICIT Version DEFAULT v1,
///     serialNumber         CertificateSerialNumber,
///     signature            AlgorithmIdentifier,
///     issuer               Name,
///     validity             Validity,
///     subject              Name,
///     subjectPublicKeyInfo SubjectPublicKeyInfo,
///     issuerUniqueID  [1]  IMPLICIT UniqueIdentifier OPTIONAL,
///     subjectUniqueID [2]  IMPLICIT UniqueIdentifier OPTIONAL,
///     extensions      [3]  EXPLICIT Extensions OPTIONAL
///     }
/// ```
#[derive(Clone, Debug)]
pub struct Cert {
    /// The complete encoding of the certificate.
    raw: Captured,

    serial_number: Serial,

    /// The algorithm the issuer used to sign the certificate.
    signature: AlgorithmIdentifier,

    issuer: Name,
    validity: Validity,
    subject: Name,
    subject_public_key_info: PublicKey,

    /// The content of the subject key identifier extension if present.
    subject_key_identifier: Option<Bytes>,
}

/// # Decoding and Encoding
///
impl Cert {
    /// Decodes a certificate.
    ///
    /// The data must contain exactly one DER encoded certificate.
    pub fn decode(der: &[u8]) -> Result<Self, Error> {
        Mode::Der.decode(
            ber::exact_value(der)?, Self::take_from
        ).map_err(Into::into)
    }

    /// Takes an encoded certificate from the beginning of a value.
    pub fn take_from<S: decode::Source>(
        cons: &mut decode::Constructed<S>
    ) -> Result<Self, DecodeError<S::Error>> {
        let raw = cons.capture_one()?;
        raw.clone().decode(|cons| {
            Self::from_constructed(cons, raw)
        }).map_err(DecodeError::convert)
    }

    /// Converts an opaque value into a certificate.
    pub fn from_tlv(tlv: &Tlv) -> Result<Self, Error> {
        if !tlv.is_universal(Tlv::SEQUENCE, true) {
            return Err(Error::WrongType)
        }
        let bytes = tlv.to_bytes();
        Self::decode(bytes.as_ref())
    }

    fn from_constructed<S: decode::Source>(
        cons: &mut decode::Constructed<S>,
        raw: Captured,
    ) -> Result<Self, DecodeError<S::Error>> {
        cons.take_sequence(|cons| {
            let res = cons.take_sequence(|cons| {
                cons.take_opt_constructed_if(Tag::CTX_0, |c| c.take_u8())?;
                let serial_number = Serial::take_from(cons)?;
                let signature = AlgorithmIdentifier::take_from(cons)?;
                let issuer = Name::take_from(cons)?;
                let validity = Validity::take_from(cons)?;
                let subject = Name::take_from(cons)?;
                let subject_public_key_info = PublicKey::take_from(cons)?;
                cons.take_opt_value_if(
                    Tag::CTX_1, |c| BitString::from_content(c)
                )?;
                cons.take_opt_value_if(
                    Tag::CTX_2, |c| BitString::from_content(c)
                )?;
                let mut subject_key_identifier = None;
                cons.take_opt_constructed_if(Tag::CTX_3, |c| {
                    c.take_sequence(|cons| {
                        while let Some(()) = cons.take_opt_sequence(|cons| {
                            let id = Oid::take_from(cons)?;
                            cons.take_opt_bool()?;
                            let value = OctetString::take_from(cons)?;
                            if id == oid::CE_SUBJECT_KEY_IDENTIFIER {
                                Self::take_subject_key_identifier(
                                    value, &mut subject_key_identifier
                                ).map_err(|err| cons.content_err(err))?;
                            }
                            // All other extensions are of no interest
                            // to us.
                            Ok(())
                        })? { }
                        Ok(())
                    })
                })?;
                Ok(Cert {
                    raw,
                    serial_number,
                    signature,
                    issuer,
                    validity,
                    subject,
                    subject_public_key_info,
                    subject_key_identifier,
                })
            })?;
            // The outer signature algorithm and value. They are left for
            // chain validation which we don’t do.
            AlgorithmIdentifier::take_from(cons)?;
            BitString::take_from(cons)?;
            Ok(res)
        })
    }

    /// Parses the Subject Key Identifier extension.
    ///
    /// ```txt
    /// SubjectKeyIdentifier ::= KeyIdentifier
    /// KeyIdentifier        ::= OCTET STRING
    /// ```
    fn take_subject_key_identifier(
        value: OctetString,
        subject_key_identifier: &mut Option<Bytes>,
    ) -> Result<(), &'static str> {
        if subject_key_identifier.is_some() {
            return Err("duplicate Subject Key Identifier extension")
        }
        let value = value.into_bytes();
        let key_id = ber::exact_value(value.as_ref()).ok().and_then(|der| {
            Mode::Der.decode(der, OctetString::take_from).ok()
        }).ok_or("invalid Subject Key Identifier extension")?;
        *subject_key_identifier = Some(key_id.into_bytes());
        Ok(())
    }

    /// Returns the complete encoding of the certificate.
    pub fn as_slice(&self) -> &[u8] {
        self.raw.as_slice()
    }

    /// Returns a value encoder for a reference to the certificate.
    pub fn encode_ref(&self) -> &Captured {
        &self.raw
    }

    /// Returns the certificate as an opaque value.
    pub fn to_tlv(&self) -> Result<Tlv, Error> {
        Tlv::decode(self.as_slice()).map_err(Into::into)
    }
}

/// # Data Access
///
impl Cert {
    /// Returns the serial number of the certificate.
    pub fn serial_number(&self) -> &Serial {
        &self.serial_number
    }

    /// Returns the algorithm identifier the issuer signed with.
    pub fn signature(&self) -> &AlgorithmIdentifier {
        &self.signature
    }

    /// Returns the signature algorithm the issuer signed with.
    ///
    /// This is also the algorithm used when this certificate’s key signs
    /// a CMS message.
    pub fn signature_algorithm(&self) -> Result<SignatureAlgorithm, Error> {
        SignatureAlgorithm::from_x509_oid(self.signature.algorithm())
    }

    pub fn issuer(&self) -> &Name {
        &self.issuer
    }

    pub fn validity(&self) -> Validity {
        self.validity
    }

    pub fn subject(&self) -> &Name {
        &self.subject
    }

    pub fn subject_public_key_info(&self) -> &PublicKey {
        &self.subject_public_key_info
    }

    /// Returns the content of the subject key identifier extension.
    pub fn subject_key_identifier(&self) -> Option<&[u8]> {
        self.subject_key_identifier.as_ref().map(AsRef::as_ref)
    }
}


//--- PartialEq and Eq

impl PartialEq for Cert {
    fn eq(&self, other: &Self) -> bool {
        self.as_slice() == other.as_slice()
    }
}

impl Eq for Cert { }


//============ Tests =========================================================

#[cfg(test)]
mod test {
    use super::*;
    use crate::x509::Time;

    #[test]
    fn decode_certs() {
        let rsa = Cert::decode(
            include_bytes!("../test-data/rsa.cer").as_ref()
        ).unwrap();
        let ca = Cert::decode(
            include_bytes!("../test-data/ca.cer").as_ref()
        ).unwrap();
        assert_eq!(rsa.as_slice(), include_bytes!("../test-data/rsa.cer"));
        assert_eq!(rsa.serial_number().as_slice(), b"\x10\x01");
        assert_eq!(rsa.issuer(), ca.subject());
        assert_eq!(ca.issuer(), ca.subject());
        assert_ne!(rsa.subject(), ca.subject());
        assert_eq!(
            rsa.signature_algorithm().unwrap(),
            SignatureAlgorithm::Sha256WithRsa
        );
        assert_eq!(
            rsa.validity().not_before(),
            Time::utc(2026, 10, 18, 14, 35, 44).unwrap()
        );
        assert_eq!(
            rsa.validity().not_after(),
            Time::utc(2126, 9, 24, 14, 35, 44).unwrap()
        );
        assert_eq!(rsa.subject_key_identifier().map(<[u8]>::len), Some(20));
        assert_ne!(rsa, ca);
    }

    #[test]
    fn ec_cert() {
        let ec = Cert::decode(
            include_bytes!("../test-data/ec.cer").as_ref()
        ).unwrap();
        assert_eq!(
            ec.signature_algorithm().unwrap(),
            SignatureAlgorithm::EcdsaWithSha256
        );
        assert_eq!(
            ec.subject_key_identifier().unwrap(),
            b"\xAF\xDB\x76\x43\xAB\xE7\xCB\x7F\x59\xE9\
              \x8E\x12\xE9\x05\x9F\x53\xBE\xB0\xAC\xE5"
        );
        assert_eq!(ec.to_tlv().unwrap().to_bytes().as_ref(), ec.as_slice());
    }

    #[test]
    fn from_tlv() {
        let tlv = Tlv::decode(include_bytes!("../test-data/ca.cer")).unwrap();
        assert!(Cert::from_tlv(&tlv).is_ok());
        let tlv = Tlv::primitive(Tlv::NULL, Bytes::new());
        assert!(matches!(Cert::from_tlv(&tlv), Err(Error::WrongType)));
        let tlv = Tlv::new(
            crate::ber::Class::Universal, Tlv::SEQUENCE, true, Bytes::new()
        );
        assert!(matches!(Cert::from_tlv(&tlv), Err(Error::Decode(_))));
    }

    /// Rebuilds a value, replacing all values `op` returns a new one for.
    fn rewrite(tlv: &Tlv, op: &impl Fn(&Tlv) -> Option<Tlv>) -> Tlv {
        if let Some(res) = op(tlv) {
            return res
        }
        if !tlv.is_constructed() {
            return tlv.clone()
        }
        let mut content = Vec::new();
        for child in tlv.children().unwrap() {
            rewrite(&child, op).write_der(&mut content);
        }
        Tlv::new(tlv.class(), tlv.number(), true, content.into())
    }

    /// Appends `extra` to the value of the subject key identifier extension.
    fn extend_key_identifier(der: &[u8], extra: &[u8]) -> Bytes {
        let cert = Tlv::decode(der).unwrap();
        rewrite(&cert, &|tlv| {
            if !tlv.is_universal(Tlv::SEQUENCE, true) {
                return None
            }
            let children = tlv.children().unwrap();
            if children.len() != 2
                || !children[0].is_universal(Tlv::OID, false)
                || children[0].content().as_ref()
                    != oid::CE_SUBJECT_KEY_IDENTIFIER.0
            {
                return None
            }
            let mut value = children[1].content().to_vec();
            value.extend_from_slice(extra);
            let mut content = Vec::new();
            children[0].write_der(&mut content);
            Tlv::primitive(Tlv::OCTET_STRING, value.into())
                .write_der(&mut content);
            Some(Tlv::new(tlv.class(), tlv.number(), true, content.into()))
        }).to_bytes()
    }

    #[test]
    fn trailing_data() {
        let ca = include_bytes!("../test-data/ca.cer");
        for tail in [
            &b"\x00"[..], &b"\x00\x00"[..], &b"\x05\x00"[..], &b"\xff"[..]
        ] {
            let mut data = ca.to_vec();
            data.extend_from_slice(tail);
            assert!(matches!(
                Cert::decode(data.as_slice()), Err(Error::TrailingData)
            ));
        }
    }

    #[test]
    fn trailing_key_identifier() {
        let ec = include_bytes!("../test-data/ec.cer");

        // Rewriting without changes must reproduce the certificate.
        let same = extend_key_identifier(ec, b"");
        assert_eq!(same.as_ref(), &ec[..]);
        assert!(Cert::decode(same.as_ref()).is_ok());

        let broken = extend_key_identifier(ec, b"\x00");
        assert_ne!(broken.as_ref(), &ec[..]);
        assert!(Cert::decode(broken.as_ref()).is_err());
    }
}
