//! Signed data.
//!
//! This module contains the signed data content type of CMS both for
//! parsing existing messages and for creating new ones.

use bcder::{decode, encode};
use bcder::{Mode, Oid, Tag};
use bcder::decode::DecodeError;
use bcder::encode::{PrimitiveContent, Values};
use bytes::Bytes;
use log::debug;
use crate::anyset::AnySet;
use crate::attr::{Attribute, Attributes};
use crate::ber::{self, Tlv};
use crate::cert::Cert;
use crate::content::{ContentInfo, EncapsulatedContentInfo};
use crate::crypto::{DigestAlgorithm, Signer, VerificationError};
use crate::error::Error;
use crate::oid;
use crate::signerinfo::{SignerIdentifier, SignerInfo};
use crate::x509::{AlgorithmIdentifier, Time};


//------------ SignedData ----------------------------------------------------

/// Signed data.
///
/// ```txt
/// SignedData ::= SEQUENCE {
///     version CMSVersion,
///     digestAlgorithms DigestAlgorithmIdentifiers,
///     encapContentInfo EncapsulatedContentInfo,
///     certificates [0] IMPLICIT CertificateSet OPTIONAL,
///     crls [1] IMPLICIT RevocationInfoChoices OPTIONAL,
///     signerInfos SignerInfos }
/// ```
///
/// Certificates and CRLs are kept as opaque values. Certificates are only
/// parsed when asked for via [`certificates`][Self::certificates].
///
/// New signed data is created via [`new`][Self::new] and then signed by
/// one or more signers via [`add_signer_info`][Self::add_signer_info].
#[derive(Clone, Debug)]
pub struct SignedData {
    version: u8,
    digest_algorithms: Vec<AlgorithmIdentifier>,
    encap_content_info: EncapsulatedContentInfo,
    certificates: Option<AnySet>,
    crls: Option<AnySet>,
    signer_infos: Vec<SignerInfo>,
}

impl SignedData {
    /// Creates new signed data without any signers.
    ///
    /// The version will be 1 if the content is of type data or 3
    /// otherwise.
    pub fn new(encap_content_info: EncapsulatedContentInfo) -> Self {
        SignedData {
            version: if encap_content_info.is_data() { 1 } else { 3 },
            digest_algorithms: Vec::new(),
            encap_content_info,
            certificates: None,
            crls: None,
            signer_infos: Vec::new(),
        }
    }
}

/// # Decoding and Encoding
///
impl SignedData {
    /// Decodes DER encoded signed data.
    pub fn decode(der: &[u8]) -> Result<Self, Error> {
        let (value, rest) = ber::split_value(der)?;
        if !rest.is_empty() {
            return Err(Error::TrailingData)
        }
        Mode::Der.decode(value, Self::take_from).map_err(Into::into)
    }

    /// Decodes BER encoded signed data.
    pub fn decode_ber(ber: &[u8]) -> Result<Self, Error> {
        Self::decode(ber::normalize(ber)?.as_ref())
    }

    pub fn take_from<S: decode::Source>(
        cons: &mut decode::Constructed<S>
    ) -> Result<Self, DecodeError<S::Error>> {
        cons.take_sequence(|cons| {
            let version = cons.take_u8()?;
            let digest_algorithms = cons.take_set(|cons| {
                let mut res = Vec::new();
                while let Some(alg) = AlgorithmIdentifier::take_opt_from(
                    cons
                )? {
                    res.push(alg)
                }
                Ok(res)
            })?;
            let encap_content_info = EncapsulatedContentInfo::take_from(
                cons
            )?;
            let certificates = Self::take_opt_any_set(cons, Tag::CTX_0)?;
            let crls = Self::take_opt_any_set(cons, Tag::CTX_1)?;
            let signer_infos = cons.take_set(|cons| {
                let mut infos = Vec::new();
                while let Some(info) = SignerInfo::take_opt_from(cons)? {
                    infos.push(info);
                }
                Ok(infos)
            })?;
            Ok(SignedData {
                version,
                digest_algorithms,
                encap_content_info,
                certificates,
                crls,
                signer_infos,
            })
        })
    }

    /// Takes an optional implicitly tagged set of opaque values.
    fn take_opt_any_set<S: decode::Source>(
        cons: &mut decode::Constructed<S>,
        tag: Tag,
    ) -> Result<Option<AnySet>, DecodeError<S::Error>> {
        cons.take_opt_constructed_if(tag, |cons| {
            let content = cons.capture_all()?;
            AnySet::from_content(content.as_slice()).map_err(|err| {
                cons.content_err(err)
            })
        })
    }

    pub fn encode_ref(&self) -> impl encode::Values + '_ {
        encode::sequence((
            self.version.encode(),
            encode::set(
                encode::iter(self.digest_algorithms.iter().map(|item| {
                    item.encode_ref()
                }))
            ),
            self.encap_content_info.encode_ref(),
            self.certificates.as_ref().map(|certs| {
                encode::sequence_as(Tag::CTX_0, certs.encode_content())
            }),
            self.crls.as_ref().map(|crls| {
                encode::sequence_as(Tag::CTX_1, crls.encode_content())
            }),
            encode::set(
                encode::iter(self.signer_infos.iter().map(|item| {
                    item.encode_ref()
                }))
            ),
        ))
    }

    /// Returns the DER encoding of a content info wrapping the signed data.
    pub fn to_content_info_der(&self) -> Bytes {
        ContentInfo::new(
            Oid(Bytes::from_static(oid::SIGNED_DATA.0)),
            self.encode_ref().to_captured(Mode::Der)
        ).to_bytes()
    }
}

/// # Data Access
///
impl SignedData {
    pub fn version(&self) -> u8 {
        self.version
    }

    pub fn digest_algorithms(&self) -> &[AlgorithmIdentifier] {
        &self.digest_algorithms
    }

    pub fn encap_content_info(&self) -> &EncapsulatedContentInfo {
        &self.encap_content_info
    }

    /// Returns the set of certificates as opaque values.
    pub fn certificate_set(&self) -> Option<&AnySet> {
        self.certificates.as_ref()
    }

    /// Returns the set of CRLs as opaque values.
    pub fn crls(&self) -> Option<&AnySet> {
        self.crls.as_ref()
    }

    pub fn signer_infos(&self) -> &[SignerInfo] {
        &self.signer_infos
    }

    /// Parses and returns the included certificates.
    ///
    /// Fails with a wrong type error if the set contains anything but
    /// plain certificates.
    pub fn certificates(&self) -> Result<Vec<Cert>, Error> {
        self.certificates.iter().flatten().map(Cert::from_tlv).collect()
    }
}

/// # Signing
///
impl SignedData {
    /// Adds a signer.
    ///
    /// The signer’s certificate is the first certificate in `chain` with
    /// the public key of `key`. All certificates of the chain are added to
    /// the signed data. The signature algorithm is the one the certificate
    /// itself was signed with.
    ///
    /// If the method fails, the signed data is left unchanged.
    pub fn add_signer_info<S: Signer>(
        &mut self,
        chain: &[Cert],
        signer: &S,
        key: &S::KeyId,
    ) -> Result<(), Error> {
        self.add_signer_info_with(chain, signer, key, None)
    }

    /// Adds a signer including a signing time attribute.
    pub fn add_signer_info_at<S: Signer>(
        &mut self,
        chain: &[Cert],
        signer: &S,
        key: &S::KeyId,
        signing_time: Time,
    ) -> Result<(), Error> {
        self.add_signer_info_with(chain, signer, key, Some(signing_time))
    }

    fn add_signer_info_with<S: Signer>(
        &mut self,
        chain: &[Cert],
        signer: &S,
        key: &S::KeyId,
        signing_time: Option<Time>,
    ) -> Result<(), Error> {
        let public_key = signer.get_key_info(key).map_err(Error::signer)?;
        let cert = chain.iter().find(|cert| {
            *cert.subject_public_key_info() == public_key
        }).ok_or(Error::NoMatchingCertificate)?;
        let chain = chain.iter().map(Cert::to_tlv).collect::<Result<
            Vec<_>, _
        >>()?;

        let sid = SignerIdentifier::issuer_and_serial(cert);
        let algorithm = cert.signature_algorithm()?;
        let digest = self.encap_content_info.digest(
            algorithm.digest_algorithm()
        )?.ok_or(Error::AlreadyDetached)?;

        let mut attrs = vec![
            Attribute::content_type(self.encap_content_info.content_type()),
            Attribute::message_digest(digest.as_ref()),
        ];
        if let Some(signing_time) = signing_time {
            attrs.push(Attribute::signing_time(signing_time));
        }
        let signed_attrs = Attributes::new(attrs);
        let signature = signer.sign(
            key, algorithm, &signed_attrs.encode_verify()
        ).map_err(Error::signer)?;

        debug!(
            "adding {} signer with certificate {}",
            algorithm, cert.serial_number()
        );
        for cert in chain {
            self.add_certificate(cert);
        }
        self.add_digest_algorithm(algorithm.digest_algorithm());
        self.signer_infos.push(
            SignerInfo::new(&sid, signed_attrs, signature)
        );
        Ok(())
    }

    /// Adds a certificate unless it is already present.
    fn add_certificate(&mut self, cert: Tlv) {
        let certs = self.certificates.get_or_insert_with(AnySet::new);
        if !certs.contains(&cert) {
            certs.push(cert)
        }
    }

    /// Adds a digest algorithm unless it is already present.
    fn add_digest_algorithm(&mut self, algorithm: DigestAlgorithm) {
        if !self.digest_algorithms.iter().any(|item| {
            *item.algorithm() == algorithm.oid()
        }) {
            self.digest_algorithms.push(algorithm.identifier())
        }
    }
}

/// # Verification
///
impl SignedData {
    /// Verifies all signer infos.
    ///
    /// The content is taken from the signed data if present. Otherwise,
    /// `detached` is used. The signers’ certificates are taken from those
    /// included in the signed data. They are not validated in any way.
    ///
    /// Returns the certificate of each signer in order.
    pub fn verify(&self, detached: Option<&[u8]>) -> Result<Vec<Cert>, Error> {
        let content = match self.encap_content_info.value()? {
            Some(content) => content,
            None => {
                Bytes::copy_from_slice(detached.ok_or(Error::MissingContent)?)
            }
        };
        if self.signer_infos.is_empty() {
            debug!("signed data without signer infos");
            return Err(VerificationError.into())
        }
        let certs = self.certificates()?;
        let content_type = self.encap_content_info.content_type();
        self.signer_infos.iter().map(|info| {
            let cert = info.resolve_certificate(&certs)?;
            info.verify(cert, content_type, content.as_ref())?;
            Ok(cert.clone())
        }).collect()
    }
}


//============ Tests =========================================================

#[cfg(test)]
mod test {
    use super::*;
    use crate::crypto::{SignatureAlgorithm, SoftSigner};

    fn cert(der: &[u8]) -> Cert {
        Cert::decode(der).unwrap()
    }

    fn rsa_cert() -> Cert {
        cert(include_bytes!("../test-data/rsa.cer"))
    }

    fn ca_cert() -> Cert {
        cert(include_bytes!("../test-data/ca.cer"))
    }

    fn ec_cert() -> Cert {
        cert(include_bytes!("../test-data/ec.cer"))
    }

    fn signer() -> (SoftSigner, <SoftSigner as Signer>::KeyId,
                    <SoftSigner as Signer>::KeyId) {
        let signer = SoftSigner::new();
        let rsa = signer.key_from_pkcs8(
            include_bytes!("../test-data/rsa.key.pk8")
        ).unwrap();
        let ec = signer.key_from_pkcs8(
            include_bytes!("../test-data/ec.key.pk8")
        ).unwrap();
        (signer, rsa, ec)
    }

    fn hello() -> SignedData {
        SignedData::new(
            EncapsulatedContentInfo::new_data(Bytes::from_static(b"hello"))
        )
    }

    #[test]
    fn der_round_trip() {
        for der in [
            &include_bytes!("../test-data/ec.p7")[..],
            &include_bytes!("../test-data/rsa-detached.p7")[..],
            &include_bytes!("../test-data/rsa-keyid.p7")[..],
        ] {
            let sd = ContentInfo::decode(der).unwrap().signed_data().unwrap();
            assert_eq!(sd.to_content_info_der().as_ref(), der);
        }
    }

    #[test]
    fn ber_round_trip() {
        let ber = include_bytes!("../test-data/rsa-ber.p7");
        let der = ber::normalize(ber).unwrap();
        let sd = ContentInfo::decode_ber(ber).unwrap().signed_data().unwrap();
        assert_eq!(sd.to_content_info_der(), der);
        assert_eq!(
            sd.encap_content_info().data_content().unwrap().unwrap().as_ref(),
            b"hello"
        );
    }

    #[test]
    fn decode_fixtures() {
        let sd = ContentInfo::decode(
            include_bytes!("../test-data/rsa-keyid.p7")
        ).unwrap().signed_data().unwrap();
        assert_eq!(sd.version(), 3);
        assert_eq!(sd.digest_algorithms().len(), 1);
        assert_eq!(
            DigestAlgorithm::from_identifier(&sd.digest_algorithms()[0])
                .unwrap(),
            DigestAlgorithm::Sha256
        );
        assert_eq!(sd.certificates().unwrap(), vec![rsa_cert()]);
        assert!(sd.crls().is_none());
        assert_eq!(sd.signer_infos().len(), 1);

        let sd = SignedData::decode_ber(
            include_bytes!("../test-data/rsa-ber.p7")
        );
        // The fixture is a content info, not signed data.
        assert!(sd.is_err());
    }

    #[test]
    fn verify_fixtures() {
        for der in [
            &include_bytes!("../test-data/rsa-ber.p7")[..],
            &include_bytes!("../test-data/rsa-keyid.p7")[..],
        ] {
            let sd = ContentInfo::decode_ber(der).unwrap()
                .signed_data().unwrap();
            assert_eq!(sd.verify(None).unwrap(), vec![rsa_cert()]);
        }

        let sd = ContentInfo::decode(
            include_bytes!("../test-data/ec.p7")
        ).unwrap().signed_data().unwrap();
        assert_eq!(sd.verify(None).unwrap(), vec![ec_cert()]);

        let sd = ContentInfo::decode(
            include_bytes!("../test-data/rsa-detached.p7")
        ).unwrap().signed_data().unwrap();
        assert!(sd.encap_content_info().is_detached());
        assert!(matches!(sd.verify(None), Err(Error::MissingContent)));
        assert_eq!(sd.verify(Some(&b"hello"[..])).unwrap(), vec![rsa_cert()]);
        assert!(matches!(
            sd.verify(Some(&b"hullo"[..])), Err(Error::Verification(_))
        ));
    }

    #[test]
    fn sign_rsa() {
        let (signer, rsa, _) = signer();
        let mut sd = hello();
        assert_eq!(sd.version(), 1);
        sd.add_signer_info(
            &[rsa_cert(), ca_cert(), rsa_cert()], &signer, &rsa
        ).unwrap();

        assert_eq!(sd.certificate_set().unwrap().len(), 2);
        assert_eq!(sd.digest_algorithms().len(), 1);
        assert!(sd.digest_algorithms()[0].parameters().is_none());

        let der = sd.to_content_info_der();
        let sd = ContentInfo::decode(&der).unwrap().signed_data().unwrap();
        assert_eq!(sd.to_content_info_der(), der);
        assert_eq!(
            DigestAlgorithm::from_identifier(&sd.digest_algorithms()[0])
                .unwrap(),
            DigestAlgorithm::Sha256
        );

        let certs = sd.certificates().unwrap();
        assert_eq!(certs, vec![rsa_cert(), ca_cert()]);
        let info = &sd.signer_infos()[0];
        assert_eq!(info.version(), 1);
        assert_eq!(info.resolve_certificate(&certs).unwrap(), &rsa_cert());
        assert!(info.content_type_attr().unwrap() == oid::DATA);
        assert_eq!(
            info.message_digest_attr().unwrap().as_ref(),
            DigestAlgorithm::Sha256.digest(b"hello").unwrap().as_ref()
        );
        assert!(info.signing_time_attr().is_err());
        assert_eq!(
            info.signature_algorithm().unwrap(),
            SignatureAlgorithm::Sha256WithRsa
        );
        assert_eq!(
            info.signature_algorithm_identifier().parameters()
                .unwrap().as_slice(),
            b"\x05\x00"
        );

        // The signature is over the explicit SET encoding.
        let attrs = info.signed_attrs().unwrap();
        rsa_cert().subject_public_key_info().verify(
            attrs.encode_verify().as_ref(),
            &crate::crypto::Signature::new(
                SignatureAlgorithm::Sha256WithRsa, info.signature().clone()
            )
        ).unwrap();
        assert_eq!(sd.verify(None).unwrap(), vec![rsa_cert()]);
    }

    #[test]
    fn sign_twice() {
        let (signer, rsa, ec) = signer();
        let mut sd = hello();
        sd.add_signer_info(&[rsa_cert(), ca_cert()], &signer, &rsa).unwrap();
        sd.add_signer_info(&[ec_cert(), ca_cert()], &signer, &ec).unwrap();
        sd.add_signer_info(&[rsa_cert()], &signer, &rsa).unwrap();
        assert_eq!(sd.digest_algorithms().len(), 1);
        assert_eq!(sd.signer_infos().len(), 3);
        assert_eq!(sd.certificate_set().unwrap().len(), 3);

        let der = sd.to_content_info_der();
        let sd = ContentInfo::decode(&der).unwrap().signed_data().unwrap();
        assert_eq!(
            sd.verify(None).unwrap(),
            vec![rsa_cert(), ec_cert(), rsa_cert()]
        );
        assert_eq!(
            sd.signer_infos()[1].signature_algorithm().unwrap(),
            SignatureAlgorithm::EcdsaWithSha256
        );
        assert!(sd.signer_infos()[1].signature_algorithm_identifier()
            .parameters().is_none());
    }

    #[test]
    fn sign_with_time() {
        let (signer, _, ec) = signer();
        let time = Time::utc(2026, 10, 18, 15, 0, 0).unwrap();
        let mut sd = hello();
        sd.add_signer_info_at(&[ec_cert()], &signer, &ec, time).unwrap();
        let der = sd.to_content_info_der();
        let sd = ContentInfo::decode(&der).unwrap().signed_data().unwrap();
        let info = &sd.signer_infos()[0];
        assert_eq!(info.signing_time_attr().unwrap(), time);
        assert_eq!(info.signed_attrs().unwrap().len(), 3);
        sd.verify(None).unwrap();
    }

    #[test]
    fn sign_tst_info() {
        let (signer, rsa, _) = signer();
        let mut sd = SignedData::new(
            EncapsulatedContentInfo::new_tst_info(
                Bytes::from_static(b"\x30\x03\x02\x01\x01")
            ).unwrap()
        );
        assert_eq!(sd.version(), 3);
        sd.add_signer_info(&[rsa_cert()], &signer, &rsa).unwrap();
        let info = &sd.signer_infos()[0];
        assert!(info.content_type_attr().unwrap() == oid::TST_INFO);
        sd.verify(None).unwrap();
    }

    #[test]
    fn failures_leave_unchanged() {
        let (signer, rsa, _) = signer();

        let mut sd = SignedData::new(EncapsulatedContentInfo::detached(
            Oid(Bytes::from_static(oid::DATA.0))
        ));
        assert!(matches!(
            sd.add_signer_info(&[rsa_cert(), ca_cert()], &signer, &rsa),
            Err(Error::AlreadyDetached)
        ));
        assert!(sd.certificate_set().is_none());
        assert!(sd.digest_algorithms().is_empty());
        assert!(sd.signer_infos().is_empty());

        let mut sd = hello();
        assert!(matches!(
            sd.add_signer_info(&[ca_cert(), ec_cert()], &signer, &rsa),
            Err(Error::NoMatchingCertificate)
        ));
        assert!(sd.certificate_set().is_none());
        assert!(sd.signer_infos().is_empty());

        assert!(matches!(sd.verify(None), Err(Error::Verification(_))));
    }

    #[test]
    fn foreign_certificates() {
        let mut sd = hello();
        sd.certificates = Some(AnySet::single(
            Tlv::primitive(Tlv::NULL, Bytes::new())
        ));
        assert!(matches!(sd.certificates(), Err(Error::WrongType)));
    }
}
