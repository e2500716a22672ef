//! Types and parameters of keys.

use std::{error, fmt};
use bcder::{decode, encode};
use bcder::{BitString, Mode, Oid};
use bcder::decode::DecodeError;
use bcder::encode::{PrimitiveContent, Values};
use bytes::Bytes;
use ring::error::Unspecified;
use ring::signature::UnparsedPublicKey;
use crate::ber;
use crate::error::Error;
use crate::oid;
use crate::x509::AlgorithmIdentifier;
use super::signature::Signature;


//------------ PublicKeyFormat -----------------------------------------------

/// The formats of public keys we can use.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum PublicKeyFormat {
    /// An RSA public key.
    Rsa,

    /// An ECDSA public key for the P-256 elliptic curve.
    EcdsaP256,

    /// An ECDSA public key for the P-384 elliptic curve.
    EcdsaP384,
}

/// # ASN.1 Algorithm Identifiers
///
/// The format of the public key is identified in certificates through a
/// algorithm identifier.
///
/// For RSA keys, the object identifier needs to be that of `rsaEncryption`
/// defined by [RFC 4055] and the parameters must be present and NULL.
/// When parsing, we generously also allow it to be absent altogether.
///
/// For ECDSA keys, the object identifer needs to be `ecPublicKey` defined
/// in [RFC 5480] with the parameter being the object identifier of a named
/// curve, either `secp256r1` or `secp384r1`.
///
/// [RFC 4055]: https://tools.ietf.org/html/rfc4055
/// [RFC 5480]: https://tools.ietf.org/html/rfc5480
impl PublicKeyFormat {
    /// Determines the format from an algorithm identifier.
    pub fn from_identifier(
        identifier: &AlgorithmIdentifier
    ) -> Result<Self, Error> {
        if *identifier.algorithm() == oid::RSA_ENCRYPTION {
            return Ok(PublicKeyFormat::Rsa)
        }
        if *identifier.algorithm() != oid::EC_PUBLIC_KEY {
            return Err(Error::unsupported_algorithm(identifier.algorithm()))
        }
        let curve = match identifier.parameters() {
            Some(params) => {
                Mode::Der.decode(
                    ber::exact_value(params.as_slice())?, Oid::take_from
                )?
            }
            None => {
                return Err(Error::unsupported_algorithm(
                    identifier.algorithm()
                ))
            }
        };
        if curve == oid::SECP256R1 {
            Ok(PublicKeyFormat::EcdsaP256)
        }
        else if curve == oid::SECP384R1 {
            Ok(PublicKeyFormat::EcdsaP384)
        }
        else {
            Err(Error::unsupported_algorithm(&curve))
        }
    }

    /// Returns the algorithm identifier for the format.
    pub fn identifier(self) -> AlgorithmIdentifier {
        match self {
            PublicKeyFormat::Rsa => {
                AlgorithmIdentifier::new(
                    Oid(Bytes::from_static(oid::RSA_ENCRYPTION.0)),
                    Some(().encode().to_captured(Mode::Der))
                )
            }
            PublicKeyFormat::EcdsaP256 => {
                AlgorithmIdentifier::new(
                    Oid(Bytes::from_static(oid::EC_PUBLIC_KEY.0)),
                    Some(oid::SECP256R1.encode().to_captured(Mode::Der))
                )
            }
            PublicKeyFormat::EcdsaP384 => {
                AlgorithmIdentifier::new(
                    Oid(Bytes::from_static(oid::EC_PUBLIC_KEY.0)),
                    Some(oid::SECP384R1.encode().to_captured(Mode::Der))
                )
            }
        }
    }
}


//------------ PublicKey -----------------------------------------------------

/// A public key.
///
/// The key keeps its algorithm identifier as found. Only when the key is
/// actually used is the identifier checked for a format we support. This
/// way, certificates with keys we don’t know about can still be parsed.
#[derive(Clone, Debug)]
pub struct PublicKey {
    algorithm: AlgorithmIdentifier,
    bits: Bytes,
}

impl PublicKey {
    /// Creates a public key from the format and the key bits.
    ///
    /// For RSA, the bits are the DER encoded `RSAPublicKey`. For ECDSA,
    /// they are the uncompressed curve point.
    pub fn new(format: PublicKeyFormat, bits: Bytes) -> Self {
        PublicKey { algorithm: format.identifier(), bits }
    }

    /// Returns the algorithm identifier of this public key.
    pub fn algorithm(&self) -> &AlgorithmIdentifier {
        &self.algorithm
    }

    /// Returns the format of the key if it is supported.
    pub fn format(&self) -> Result<PublicKeyFormat, Error> {
        PublicKeyFormat::from_identifier(&self.algorithm)
    }

    /// Returns the bits of this public key.
    pub fn bits(&self) -> &[u8] {
        self.bits.as_ref()
    }

    /// Verifies a signature using this public key.
    ///
    /// Fails with an unsupported algorithm error if either the key format
    /// or the combination of key and signature algorithm cannot be used.
    pub fn verify(
        &self, message: &[u8], signature: &Signature
    ) -> Result<(), Error> {
        let format = self.format()?;
        let algorithm = signature.algorithm();
        if !algorithm.family().allows_key(format) {
            return Err(VerificationError.into())
        }
        let verification = algorithm.ring_verification(format).ok_or_else(|| {
            Error::unsupported_algorithm(&algorithm.x509_oid())
        })?;
        UnparsedPublicKey::new(verification, self.bits.as_ref()).verify(
            message, signature.value().as_ref()
        ).map_err(|err| VerificationError::from(err).into())
    }
}


/// # As `SubjectPublicKeyInfo`
///
/// Public keys are included in X.509 certificates as `SubjectPublicKeyInfo`
/// structures. As these contain the same information as `PublicKey`,
/// it can be decoded from and encoded to such sequences.
impl PublicKey {
    /// Decodes a DER encoded `SubjectPublicKeyInfo`.
    pub fn decode(der: &[u8]) -> Result<Self, Error> {
        Mode::Der.decode(
            ber::exact_value(der)?, Self::take_from
        ).map_err(Into::into)
    }

    pub fn take_from<S: decode::Source>(
        cons: &mut decode::Constructed<S>
    ) -> Result<Self, DecodeError<S::Error>> {
        cons.take_sequence(|cons| {
            let algorithm = AlgorithmIdentifier::take_from(cons)?;
            let bits = BitString::take_from(cons)?;
            if bits.unused() != 0 {
                return Err(cons.content_err("invalid public key bits"))
            }
            Ok(PublicKey { algorithm, bits: bits.octet_bytes() })
        })
    }

    pub fn encode_ref(&self) -> impl encode::Values + '_ {
        encode::sequence((
            self.algorithm.encode_ref(),
            BitString::new(0, self.bits.clone()).encode(),
        ))
    }

    /// Returns a bytes values of the encoded the *subjectPublicKeyInfo*.
    pub fn to_info_bytes(&self) -> Bytes {
        self.encode_ref().to_captured(Mode::Der).into_bytes()
    }
}


//--- PartialEq and Eq

/// Keys are equal if their encoded `SubjectPublicKeyInfo` is identical.
///
/// This includes the encoding of the algorithm parameters, so an RSA key
/// with NULL parameters differs from the same key without them.
impl PartialEq for PublicKey {
    fn eq(&self, other: &Self) -> bool {
        self.algorithm == other.algorithm && self.bits == other.bits
    }
}

impl Eq for PublicKey { }


//------------ VerificationError ---------------------------------------------

/// An error happened while verifying a signature.
///
/// No further information is provided. This is on purpose.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct VerificationError;

impl From<Unspecified> for VerificationError {
    fn from(_: Unspecified) -> Self {
        VerificationError
    }
}

impl fmt::Display for VerificationError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("signature verification failed")
    }
}

impl error::Error for VerificationError { }


//============ Tests =========================================================
