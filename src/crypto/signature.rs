//! Signature algorithms and operations.

use std::fmt;
use bcder::{ConstOid, Mode, Oid};
use bcder::encode::{PrimitiveContent, Values};
use bytes::Bytes;
use ring::signature::{self as ring_sig, VerificationAlgorithm};
use crate::error::Error;
use crate::oid;
use crate::x509::AlgorithmIdentifier;
use super::digest::DigestAlgorithm;
use super::keys::PublicKeyFormat;


//------------ SignatureFamily -----------------------------------------------

/// The public key algorithm a signature algorithm belongs to.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum SignatureFamily {
    /// RSA PKCS #1 version 1.5 signatures.
    Rsa,

    /// ECDSA signatures.
    Ecdsa,
}

impl SignatureFamily {
    /// Returns the object identifier of the key algorithm.
    ///
    /// This is what CMS traditionally uses as the signature algorithm.
    pub fn key_oid(self) -> ConstOid {
        match self {
            SignatureFamily::Rsa => oid::RSA_ENCRYPTION,
            SignatureFamily::Ecdsa => oid::EC_PUBLIC_KEY,
        }
    }

    /// Returns whether a key of the given format can be used.
    pub fn allows_key(self, format: PublicKeyFormat) -> bool {
        match self {
            SignatureFamily::Rsa => matches!(format, PublicKeyFormat::Rsa),
            SignatureFamily::Ecdsa => !matches!(format, PublicKeyFormat::Rsa),
        }
    }
}


//------------ SignatureAlgorithm --------------------------------------------

/// The signature algorithms we know about.
///
/// Each algorithm is the combination of a key algorithm and a digest
/// algorithm.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum SignatureAlgorithm {
    Md5WithRsa,
    Sha1WithRsa,
    Sha256WithRsa,
    Sha384WithRsa,
    Sha512WithRsa,
    EcdsaWithSha1,
    EcdsaWithSha256,
    EcdsaWithSha384,
    EcdsaWithSha512,
}

/// The properties of all signature algorithms.
///
/// For each algorithm, this lists the family, the digest algorithm, and the
/// combined object identifier used for it in X.509.
static ALGORITHMS: &[(
    SignatureAlgorithm, SignatureFamily, DigestAlgorithm, ConstOid
)] = &[
    (
        SignatureAlgorithm::Md5WithRsa, SignatureFamily::Rsa,
        DigestAlgorithm::Md5, oid::MD5_WITH_RSA_ENCRYPTION
    ),
    (
        SignatureAlgorithm::Sha1WithRsa, SignatureFamily::Rsa,
        DigestAlgorithm::Sha1, oid::SHA1_WITH_RSA_ENCRYPTION
    ),
    (
        SignatureAlgorithm::Sha256WithRsa, SignatureFamily::Rsa,
        DigestAlgorithm::Sha256, oid::SHA256_WITH_RSA_ENCRYPTION
    ),
    (
        SignatureAlgorithm::Sha384WithRsa, SignatureFamily::Rsa,
        DigestAlgorithm::Sha384, oid::SHA384_WITH_RSA_ENCRYPTION
    ),
    (
        SignatureAlgorithm::Sha512WithRsa, SignatureFamily::Rsa,
        DigestAlgorithm::Sha512, oid::SHA512_WITH_RSA_ENCRYPTION
    ),
    (
        SignatureAlgorithm::EcdsaWithSha1, SignatureFamily::Ecdsa,
        DigestAlgorithm::Sha1, oid::ECDSA_WITH_SHA1
    ),
    (
        SignatureAlgorithm::EcdsaWithSha256, SignatureFamily::Ecdsa,
        DigestAlgorithm::Sha256, oid::ECDSA_WITH_SHA256
    ),
    (
        SignatureAlgorithm::EcdsaWithSha384, SignatureFamily::Ecdsa,
        DigestAlgorithm::Sha384, oid::ECDSA_WITH_SHA384
    ),
    (
        SignatureAlgorithm::EcdsaWithSha512, SignatureFamily::Ecdsa,
        DigestAlgorithm::Sha512, oid::ECDSA_WITH_SHA512
    ),
];

impl SignatureAlgorithm {
    fn properties(
        self
    ) -> (SignatureFamily, DigestAlgorithm, ConstOid) {
        // The table is ordered like the variants.
        let item = &ALGORITHMS[self as usize];
        (item.1, item.2, Oid(item.3.0))
    }

    /// Returns the family of the algorithm.
    pub fn family(self) -> SignatureFamily {
        self.properties().0
    }

    /// Returns the digest algorithm used by the algorithm.
    pub fn digest_algorithm(self) -> DigestAlgorithm {
        self.properties().1
    }

    /// Returns the algorithm for a family and digest.
    pub fn from_parts(
        family: SignatureFamily, digest: DigestAlgorithm
    ) -> Option<Self> {
        ALGORITHMS.iter().find(|item| {
            item.1 == family && item.2 == digest
        }).map(|item| item.0)
    }
}


/// # Algorithm Identifiers
///
/// In X.509 certificates, signature algorithms are always identified by an
/// object identifier that combines key and digest algorithm, e.g.,
/// `sha256WithRSAEncryption`. CMS signer infos traditionally only name the
/// key algorithm in their signature algorithm field, e.g., `rsaEncryption`,
/// and leave the digest to the separate digest algorithm field. Some
/// implementations use the combined identifiers there, too.
impl SignatureAlgorithm {
    /// Returns the X.509 object identifier.
    pub fn x509_oid(self) -> ConstOid {
        self.properties().2
    }

    /// Resolves the algorithm from an X.509 signature algorithm identifier.
    pub fn from_x509_oid(
        oid: &Oid<impl AsRef<[u8]>>
    ) -> Result<Self, Error> {
        ALGORITHMS.iter().find(|item| {
            item.3.0 == oid.0.as_ref()
        }).map(|item| item.0).ok_or_else(|| Error::unsupported_algorithm(oid))
    }

    /// Resolves the algorithm from the object identifiers of a signer info.
    ///
    /// The signature object identifier can either be that of a key
    /// algorithm or a combined algorithm. In the latter case, its digest
    /// must agree with `digest`.
    pub fn from_cms_oids(
        signature: &Oid<impl AsRef<[u8]>>,
        digest: &Oid<impl AsRef<[u8]>>,
    ) -> Result<Self, Error> {
        let digest = DigestAlgorithm::from_oid(digest)?;
        let family = if *signature == oid::RSA_ENCRYPTION {
            SignatureFamily::Rsa
        }
        else if *signature == oid::EC_PUBLIC_KEY {
            SignatureFamily::Ecdsa
        }
        else {
            let res = Self::from_x509_oid(signature)?;
            if res.digest_algorithm() != digest {
                return Err(Error::unsupported_algorithm(signature))
            }
            return Ok(res)
        };
        Self::from_parts(family, digest).ok_or_else(|| {
            Error::unsupported_algorithm(signature)
        })
    }

    /// Returns the signature algorithm identifier for use in CMS.
    ///
    /// This uses the key algorithm object identifier. For RSA, the
    /// parameters are NULL, for ECDSA they are absent.
    pub fn cms_identifier(self) -> AlgorithmIdentifier {
        let family = self.family();
        AlgorithmIdentifier::new(
            Oid(Bytes::from_static(family.key_oid().0)),
            match family {
                SignatureFamily::Rsa => {
                    Some(().encode().to_captured(Mode::Der))
                }
                SignatureFamily::Ecdsa => None,
            }
        )
    }
}


/// # Verification
///
impl SignatureAlgorithm {
    /// Returns the ring verification algorithm for a key format.
    ///
    /// Returns `None` if ring cannot verify this combination.
    pub(crate) fn ring_verification(
        self, format: PublicKeyFormat
    ) -> Option<&'static dyn VerificationAlgorithm> {
        use self::SignatureAlgorithm::*;

        match (format, self) {
            (PublicKeyFormat::Rsa, Sha1WithRsa) => {
                Some(&ring_sig::RSA_PKCS1_2048_8192_SHA1_FOR_LEGACY_USE_ONLY)
            }
            (PublicKeyFormat::Rsa, Sha256WithRsa) => {
                Some(&ring_sig::RSA_PKCS1_2048_8192_SHA256)
            }
            (PublicKeyFormat::Rsa, Sha384WithRsa) => {
                Some(&ring_sig::RSA_PKCS1_2048_8192_SHA384)
            }
            (PublicKeyFormat::Rsa, Sha512WithRsa) => {
                Some(&ring_sig::RSA_PKCS1_2048_8192_SHA512)
            }
            (PublicKeyFormat::EcdsaP256, EcdsaWithSha256) => {
                Some(&ring_sig::ECDSA_P256_SHA256_ASN1)
            }
            (PublicKeyFormat::EcdsaP256, EcdsaWithSha384) => {
                Some(&ring_sig::ECDSA_P256_SHA384_ASN1)
            }
            (PublicKeyFormat::EcdsaP384, EcdsaWithSha256) => {
                Some(&ring_sig::ECDSA_P384_SHA256_ASN1)
            }
            (PublicKeyFormat::EcdsaP384, EcdsaWithSha384) => {
                Some(&ring_sig::ECDSA_P384_SHA384_ASN1)
            }
            _ => None
        }
    }
}


//--- Display

impl fmt::Display for SignatureAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use self::SignatureAlgorithm::*;

        f.write_str(match *self {
            Md5WithRsa => "md5WithRSAEncryption",
            Sha1WithRsa => "sha1WithRSAEncryption",
            Sha256WithRsa => "sha256WithRSAEncryption",
            Sha384WithRsa => "sha384WithRSAEncryption",
            Sha512WithRsa => "sha512WithRSAEncryption",
            EcdsaWithSha1 => "ecdsa-with-SHA1",
            EcdsaWithSha256 => "ecdsa-with-SHA256",
            EcdsaWithSha384 => "ecdsa-with-SHA384",
            EcdsaWithSha512 => "ecdsa-with-SHA512",
        })
    }
}


//------------ Signature -----------------------------------------------------

#[derive(Clone, Debug)]
pub struct Signature {
    algorithm: SignatureAlgorithm,
    value: Bytes
}

impl Signature {
    pub fn new(algorithm: SignatureAlgorithm, value: Bytes) -> Self {
        Signature { algorithm, value }
    }

    pub fn algorithm(&self) -> SignatureAlgorithm {
        self.algorithm
    }

    pub fn value(&self) -> &Bytes {
        &self.value
    }

    pub fn unwrap(self) -> (SignatureAlgorithm, Bytes) {
        (self.algorithm, self.value)
    }
}


//============ Tests =========================================================

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn cms_oids() {
        assert_eq!(
            SignatureAlgorithm::from_cms_oids(
                &oid::RSA_ENCRYPTION, &oid::SHA256
            ).unwrap(),
            SignatureAlgorithm::Sha256WithRsa
        );
        assert_eq!(
            SignatureAlgorithm::from_cms_oids(
                &oid::EC_PUBLIC_KEY, &oid::SHA384
            ).unwrap(),
            SignatureAlgorithm::EcdsaWithSha384
        );
        assert_eq!(
            SignatureAlgorithm::from_cms_oids(
                &oid::ECDSA_WITH_SHA256, &oid::SHA256
            ).unwrap(),
            SignatureAlgorithm::EcdsaWithSha256
        );
        assert_eq!(
            SignatureAlgorithm::from_cms_oids(
                &oid::RSA_ENCRYPTION, &oid::MD5
            ).unwrap(),
            SignatureAlgorithm::Md5WithRsa
        );

        // Combined identifier disagreeing with the digest.
        assert!(matches!(
            SignatureAlgorithm::from_cms_oids(
                &oid::SHA256_WITH_RSA_ENCRYPTION, &oid::SHA1
            ),
            Err(Error::UnsupportedAlgorithm(_))
        ));
        // No ECDSA with MD5.
        assert!(matches!(
            SignatureAlgorithm::from_cms_oids(
                &oid::EC_PUBLIC_KEY, &oid::MD5
            ),
            Err(Error::UnsupportedAlgorithm(_))
        ));
        // Unknown digest.
        assert!(matches!(
            SignatureAlgorithm::from_cms_oids(
                &oid::RSA_ENCRYPTION, &oid::DATA
            ),
            Err(Error::UnsupportedAlgorithm(_))
        ));
    }

    #[test]
    fn x509_oids() {
        for item in ALGORITHMS {
            assert_eq!(
                SignatureAlgorithm::from_x509_oid(&item.3).unwrap(), item.0
            );
            assert_eq!(item.0.x509_oid(), item.3);
            assert_eq!(item.0.family(), item.1);
            assert_eq!(item.0.digest_algorithm(), item.2);
        }
        assert!(SignatureAlgorithm::from_x509_oid(&oid::SHA256).is_err());
    }

    #[test]
    fn cms_identifier_parameters() {
        let rsa = SignatureAlgorithm::Sha256WithRsa.cms_identifier();
        assert!(rsa.algorithm() == &oid::RSA_ENCRYPTION);
        assert_eq!(rsa.parameters().unwrap().as_slice(), b"\x05\x00");
        let ec = SignatureAlgorithm::EcdsaWithSha256.cms_identifier();
        assert!(ec.algorithm() == &oid::EC_PUBLIC_KEY);
        assert!(ec.parameters().is_none());
    }
}
