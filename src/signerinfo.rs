//! Signer infos.
//!
//! A signer info contains the signature of one signer over the content of
//! signed data, together with the information needed to identify the signer
//! and verify the signature.

use bcder::{decode, encode};
use bcder::{Captured, ConstOid, Mode, OctetString, Oid, Tag};
use bcder::decode::DecodeError;
use bcder::encode::{PrimitiveContent, Values};
use bytes::Bytes;
use log::debug;
use crate::attr::Attributes;
use crate::ber::{Class, Tlv};
use crate::cert::Cert;
use crate::crypto::{
    DigestAlgorithm, Signature, SignatureAlgorithm, VerificationError
};
use crate::error::Error;
use crate::oid;
use crate::x509::{AlgorithmIdentifier, Name, Serial, Time};


//------------ SignerIdentifier ----------------------------------------------

/// The identifier of the certificate of a signer.
///
/// ```txt
/// SignerIdentifier ::= CHOICE {
///     issuerAndSerialNumber IssuerAndSerialNumber,
///     subjectKeyIdentifier [0] SubjectKeyIdentifier }
///
/// IssuerAndSerialNumber ::= SEQUENCE {
///     issuer Name,
///     serialNumber CertificateSerialNumber }
/// ```
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum SignerIdentifier {
    IssuerAndSerialNumber {
        issuer: Name,
        serial: Serial,
    },
    SubjectKeyIdentifier(Bytes),
}

impl SignerIdentifier {
    /// Creates an issuer and serial number identifier for a certificate.
    pub fn issuer_and_serial(cert: &Cert) -> Self {
        SignerIdentifier::IssuerAndSerialNumber {
            issuer: cert.issuer().clone(),
            serial: cert.serial_number().clone(),
        }
    }

    /// Returns the signer info version that goes with the identifier.
    pub fn version(&self) -> u8 {
        match *self {
            SignerIdentifier::IssuerAndSerialNumber { .. } => 1,
            SignerIdentifier::SubjectKeyIdentifier(_) => 3,
        }
    }

    /// Returns whether the identifier refers to the given certificate.
    ///
    /// Issuer names are compared by their encoding. Key identifiers are
    /// compared to the content of the subject key identifier extension.
    pub fn matches(&self, cert: &Cert) -> bool {
        match *self {
            SignerIdentifier::IssuerAndSerialNumber {
                ref issuer, ref serial
            } => {
                cert.issuer() == issuer && cert.serial_number() == serial
            }
            SignerIdentifier::SubjectKeyIdentifier(ref key_id) => {
                cert.subject_key_identifier() == Some(key_id.as_ref())
            }
        }
    }

    pub fn encode_ref(&self) -> impl encode::Values + '_ {
        match *self {
            SignerIdentifier::IssuerAndSerialNumber {
                ref issuer, ref serial
            } => {
                encode::Choice2::One(encode::sequence((
                    issuer.encode_ref(),
                    serial.encode_ref(),
                )))
            }
            SignerIdentifier::SubjectKeyIdentifier(ref key_id) => {
                encode::Choice2::Two(
                    OctetString::encode_slice_as(key_id.as_ref(), Tag::CTX_0)
                )
            }
        }
    }
}


//------------ SignerInfo ----------------------------------------------------

/// A single signer info of signed data.
///
/// ```txt
/// SignerInfo ::= SEQUENCE {
///     version CMSVersion,
///     sid SignerIdentifier,
///     digestAlgorithm DigestAlgorithmIdentifier,
///     signedAttrs [0] IMPLICIT SignedAttributes OPTIONAL,
///     signatureAlgorithm SignatureAlgorithmIdentifier,
///     signature SignatureValue,
///     unsignedAttrs [1] IMPLICIT UnsignedAttributes OPTIONAL }
/// ```
///
/// The signer identifier is only kept in its encoded form. It is
/// interpreted according to the version when it is needed.
#[derive(Clone, Debug)]
pub struct SignerInfo {
    version: u8,
    sid: Captured,
    digest_algorithm: AlgorithmIdentifier,
    signed_attrs: Option<Attributes>,
    signature_algorithm: AlgorithmIdentifier,
    signature: Bytes,
    unsigned_attrs: Option<Attributes>,
}

impl SignerInfo {
    /// Creates a new signer info from its parts.
    pub fn new(
        sid: &SignerIdentifier,
        signed_attrs: Attributes,
        signature: Signature,
    ) -> Self {
        let (algorithm, value) = signature.unwrap();
        SignerInfo {
            version: sid.version(),
            sid: sid.encode_ref().to_captured(Mode::Der),
            digest_algorithm: algorithm.digest_algorithm().identifier(),
            signed_attrs: Some(signed_attrs),
            signature_algorithm: algorithm.cms_identifier(),
            signature: value,
            unsigned_attrs: None,
        }
    }

    pub fn take_opt_from<S: decode::Source>(
        cons: &mut decode::Constructed<S>
    ) -> Result<Option<Self>, DecodeError<S::Error>> {
        cons.take_opt_sequence(|cons| {
            Ok(SignerInfo {
                version: cons.take_u8()?,
                sid: cons.capture_one()?,
                digest_algorithm: AlgorithmIdentifier::take_from(cons)?,
                signed_attrs: cons.take_opt_constructed_if(
                    Tag::CTX_0, Attributes::take_content_from
                )?,
                signature_algorithm: AlgorithmIdentifier::take_from(cons)?,
                signature: OctetString::take_from(cons)?.into_bytes(),
                unsigned_attrs: cons.take_opt_constructed_if(
                    Tag::CTX_1, Attributes::take_content_from
                )?,
            })
        })
    }

    pub fn encode_ref(&self) -> impl encode::Values + '_ {
        encode::sequence((
            (
                self.version.encode(),
                &self.sid,
                self.digest_algorithm.encode_ref(),
                self.signed_attrs.as_ref().map(|attrs| {
                    attrs.encode_ref_as(Tag::CTX_0)
                }),
            ),
            (
                self.signature_algorithm.encode_ref(),
                OctetString::encode_slice(self.signature.as_ref()),
                self.unsigned_attrs.as_ref().map(|attrs| {
                    attrs.encode_ref_as(Tag::CTX_1)
                }),
            )
        ))
    }
}

/// # Data Access
///
impl SignerInfo {
    pub fn version(&self) -> u8 {
        self.version
    }

    /// Returns the signer identifier.
    ///
    /// Version 1 requires an issuer and serial number, version 3 a subject
    /// key identifier. Other versions fail.
    pub fn signer_identifier(&self) -> Result<SignerIdentifier, Error> {
        let sid = Tlv::decode(self.sid.as_slice())?;
        match self.version {
            1 => {
                if !sid.is_universal(Tlv::SEQUENCE, true) {
                    return Err(Error::WrongType)
                }
                Mode::Der.decode(self.sid.as_slice(), |cons| {
                    cons.take_sequence(|cons| {
                        Ok(SignerIdentifier::IssuerAndSerialNumber {
                            issuer: Name::take_from(cons)?,
                            serial: Serial::take_from(cons)?,
                        })
                    })
                }).map_err(Into::into)
            }
            3 => {
                if sid.class() != Class::Context || sid.number() != 0
                    || sid.is_constructed()
                {
                    return Err(Error::WrongType)
                }
                Ok(SignerIdentifier::SubjectKeyIdentifier(sid.into_content()))
            }
            version => Err(Error::UnknownVersion(version))
        }
    }

    /// Finds the certificate of the signer among the candidates.
    ///
    /// Returns the first matching certificate.
    pub fn resolve_certificate<'a>(
        &self, candidates: &'a [Cert]
    ) -> Result<&'a Cert, Error> {
        let sid = self.signer_identifier()?;
        candidates.iter().find(|cert| sid.matches(cert)).ok_or(
            Error::NoMatchingCertificate
        )
    }

    /// Returns the digest algorithm identifier as found.
    pub fn digest_algorithm_identifier(&self) -> &AlgorithmIdentifier {
        &self.digest_algorithm
    }

    pub fn digest_algorithm(&self) -> Result<DigestAlgorithm, Error> {
        DigestAlgorithm::from_identifier(&self.digest_algorithm)
    }

    /// Returns the signature algorithm identifier as found.
    pub fn signature_algorithm_identifier(&self) -> &AlgorithmIdentifier {
        &self.signature_algorithm
    }

    /// Returns the signature algorithm.
    ///
    /// This is determined by both the signature and digest algorithm
    /// identifiers.
    pub fn signature_algorithm(&self) -> Result<SignatureAlgorithm, Error> {
        SignatureAlgorithm::from_cms_oids(
            self.signature_algorithm.algorithm(),
            self.digest_algorithm.algorithm(),
        )
    }

    pub fn signature(&self) -> &Bytes {
        &self.signature
    }

    pub fn signed_attrs(&self) -> Option<&Attributes> {
        self.signed_attrs.as_ref()
    }

    pub fn unsigned_attrs(&self) -> Option<&Attributes> {
        self.unsigned_attrs.as_ref()
    }

    /// Returns the signed attributes for looking up the given attribute.
    ///
    /// If there are no signed attributes, the attribute is missing.
    fn require_signed_attrs(
        &self, attr_type: ConstOid
    ) -> Result<&Attributes, Error> {
        self.signed_attrs.as_ref().ok_or_else(|| {
            Error::AttributeCardinality {
                attr_type: Oid(Bytes::from_static(attr_type.0)),
                attributes: 0,
                values: 0,
            }
        })
    }

    /// Returns the content type signed attribute.
    pub fn content_type_attr(&self) -> Result<Oid<Bytes>, Error> {
        self.require_signed_attrs(oid::CONTENT_TYPE)?.content_type()
    }

    /// Returns the message digest signed attribute.
    pub fn message_digest_attr(&self) -> Result<Bytes, Error> {
        self.require_signed_attrs(oid::MESSAGE_DIGEST)?.message_digest()
    }

    /// Returns the signing time signed attribute.
    pub fn signing_time_attr(&self) -> Result<Time, Error> {
        self.require_signed_attrs(oid::SIGNING_TIME)?.signing_time()
    }
}

/// # Verification
///
impl SignerInfo {
    /// Verifies the signature over content with the given certificate.
    ///
    /// If there are signed attributes, the content type attribute must
    /// be `content_type` and the message digest attribute must be the
    /// digest of `content`. The signature is then verified over the signed
    /// attributes. Otherwise it is verified directly over the content.
    ///
    /// The certificate is not checked for being the signer’s.
    pub fn verify(
        &self,
        cert: &Cert,
        content_type: &Oid<impl AsRef<[u8]>>,
        content: &[u8],
    ) -> Result<(), Error> {
        let algorithm = self.signature_algorithm()?;
        let message = match self.signed_attrs {
            Some(ref attrs) => {
                if attrs.content_type()?.0.as_ref() != content_type.0.as_ref() {
                    debug!("content type attribute doesn’t match content");
                    return Err(VerificationError.into())
                }
                let digest = algorithm.digest_algorithm().digest(content)?;
                if attrs.message_digest()?.as_ref() != digest.as_ref() {
                    debug!("message digest attribute doesn’t match content");
                    return Err(VerificationError.into())
                }
                attrs.encode_verify()
            }
            None => Bytes::copy_from_slice(content)
        };
        let res = cert.subject_public_key_info().verify(
            message.as_ref(),
            &Signature::new(algorithm, self.signature.clone())
        );
        if res.is_err() {
            debug!(
                "{} signature by certificate {} failed to verify",
                algorithm, cert.serial_number()
            );
        }
        res
    }
}


//============ Tests =========================================================

#[cfg(test)]
mod test {
    use super::*;
    use crate::content::ContentInfo;
    use crate::sigdata::SignedData;

    fn signed_data(der: &[u8]) -> SignedData {
        ContentInfo::decode_ber(der).unwrap().signed_data().unwrap()
    }

    fn rsa_cert() -> Cert {
        Cert::decode(include_bytes!("../test-data/rsa.cer").as_ref()).unwrap()
    }

    fn ca_cert() -> Cert {
        Cert::decode(include_bytes!("../test-data/ca.cer").as_ref()).unwrap()
    }

    #[test]
    fn resolve_issuer_and_serial() {
        let sd = signed_data(include_bytes!("../test-data/rsa-ber.p7"));
        let info = &sd.signer_infos()[0];
        assert_eq!(info.version(), 1);
        let certs = sd.certificates().unwrap();
        assert_eq!(certs.len(), 2);
        assert_eq!(info.resolve_certificate(&certs).unwrap(), &rsa_cert());
        assert_eq!(
            info.signer_identifier().unwrap(),
            SignerIdentifier::issuer_and_serial(&rsa_cert())
        );
    }

    #[test]
    fn resolve_key_identifier() {
        let sd = signed_data(include_bytes!("../test-data/rsa-keyid.p7"));
        let info = &sd.signer_infos()[0];
        assert_eq!(info.version(), 3);
        let cert = rsa_cert();
        assert_eq!(
            info.signer_identifier().unwrap(),
            SignerIdentifier::SubjectKeyIdentifier(Bytes::copy_from_slice(
                cert.subject_key_identifier().unwrap()
            ))
        );
        let candidates = [ca_cert(), cert.clone(), cert.clone()];
        assert_eq!(info.resolve_certificate(&candidates).unwrap(), &cert);
    }

    #[test]
    fn resolve_failures() {
        let sd = signed_data(include_bytes!("../test-data/rsa-ber.p7"));
        let info = &sd.signer_infos()[0];
        assert!(matches!(
            info.resolve_certificate(&[ca_cert()]),
            Err(Error::NoMatchingCertificate)
        ));
        assert!(matches!(
            info.resolve_certificate(&[]),
            Err(Error::NoMatchingCertificate)
        ));

        let mut unknown = info.clone();
        unknown.version = 2;
        assert!(matches!(
            unknown.resolve_certificate(&[rsa_cert()]),
            Err(Error::UnknownVersion(2))
        ));

        let mut mismatched = info.clone();
        mismatched.version = 3;
        assert!(matches!(
            mismatched.resolve_certificate(&[rsa_cert()]),
            Err(Error::WrongType)
        ));
    }

    #[test]
    fn signed_attributes() {
        let sd = signed_data(include_bytes!("../test-data/ec.p7"));
        let info = &sd.signer_infos()[0];
        assert!(info.content_type_attr().unwrap() == oid::DATA);
        assert_eq!(
            info.message_digest_attr().unwrap().as_ref(),
            DigestAlgorithm::Sha256.digest(b"hello").unwrap().as_ref()
        );
        assert_eq!(
            info.signing_time_attr().unwrap(),
            Time::utc(2026, 10, 18, 14, 35, 44).unwrap()
        );
        assert_eq!(
            info.signature_algorithm().unwrap(),
            SignatureAlgorithm::EcdsaWithSha256
        );

        let mut bare = info.clone();
        bare.signed_attrs = None;
        assert!(matches!(
            bare.content_type_attr(),
            Err(Error::AttributeCardinality { attributes: 0, .. })
        ));
    }

    #[test]
    fn verify() {
        let sd = signed_data(include_bytes!("../test-data/rsa-ber.p7"));
        let info = &sd.signer_infos()[0];
        let cert = rsa_cert();
        info.verify(&cert, &oid::DATA, b"hello").unwrap();
        assert!(matches!(
            info.verify(&cert, &oid::DATA, b"hullo"),
            Err(Error::Verification(_))
        ));
        assert!(matches!(
            info.verify(&cert, &oid::TST_INFO, b"hello"),
            Err(Error::Verification(_))
        ));
        assert!(matches!(
            info.verify(&ca_cert(), &oid::DATA, b"hello"),
            Err(Error::Verification(_))
        ));
    }

    #[test]
    fn reencode() {
        let sd = signed_data(include_bytes!("../test-data/rsa-keyid.p7"));
        let info = &sd.signer_infos()[0];
        let encoded = info.encode_ref().to_captured(Mode::Der);
        let decoded = Mode::Der.decode(encoded.as_slice(), |cons| {
            SignerInfo::take_opt_from(cons)
        }).unwrap().unwrap();
        assert_eq!(
            decoded.encode_ref().to_captured(Mode::Der).as_slice(),
            encoded.as_slice()
        );
        assert_eq!(
            decoded.signer_identifier().unwrap(),
            info.signer_identifier().unwrap()
        );
    }
}
