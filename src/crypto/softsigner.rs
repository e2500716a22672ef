//! A signer atop the ring library.
//!
//! The signer keeps software keys in memory. They are imported from
//! PKCS #8 documents and can be RSA, ECDSA P-256, or ECDSA P-384 keys.

use std::io;
use std::sync::{Arc, RwLock};
use bytes::Bytes;
use ring::rand;
use ring::signature::{
    EcdsaKeyPair, KeyPair, RsaKeyPair, ECDSA_P256_SHA256_ASN1_SIGNING,
    ECDSA_P384_SHA384_ASN1_SIGNING, RSA_PKCS1_SHA256, RSA_PKCS1_SHA384,
    RSA_PKCS1_SHA512,
};
use super::keys::{PublicKey, PublicKeyFormat};
use super::signer::{KeyError, Signer, SigningError};
use super::signature::{Signature, SignatureAlgorithm};


//------------ SoftSigner ----------------------------------------------------

/// A signer using keys held in memory.
pub struct SoftSigner {
    keys: RwLock<Vec<Arc<SoftKey>>>,
    rng: rand::SystemRandom,
}

impl SoftSigner {
    pub fn new() -> SoftSigner {
        SoftSigner {
            keys: Default::default(),
            rng: rand::SystemRandom::new(),
        }
    }

    /// Imports a private key from a DER encoded PKCS #8 document.
    pub fn key_from_pkcs8(&self, pkcs8: &[u8]) -> Result<KeyId, io::Error> {
        let key = SoftKey::from_pkcs8(pkcs8, &self.rng)?;
        self.insert_key(key)
    }

    fn insert_key(&self, key: SoftKey) -> Result<KeyId, io::Error> {
        let mut keys = self.keys.write().map_err(|_| poisoned())?;
        let res = keys.len();
        keys.push(key.into());
        Ok(KeyId(res))
    }

    fn get_key(&self, id: KeyId) -> Result<Arc<SoftKey>, KeyError<io::Error>> {
        let keys = self.keys.read().map_err(|_| poisoned())?;
        keys.get(id.0).cloned().ok_or(KeyError::KeyNotFound)
    }
}

impl Signer for SoftSigner {
    type KeyId = KeyId;
    type Error = io::Error;

    fn get_key_info(
        &self,
        id: &Self::KeyId
    ) -> Result<PublicKey, KeyError<Self::Error>> {
        Ok(self.get_key(*id)?.get_key_info())
    }

    fn sign<D: AsRef<[u8]> + ?Sized>(
        &self,
        key: &Self::KeyId,
        algorithm: SignatureAlgorithm,
        data: &D
    ) -> Result<Signature, SigningError<Self::Error>> {
        self.get_key(*key)?.sign(algorithm, data.as_ref(), &self.rng)
    }
}

impl Default for SoftSigner {
    fn default() -> Self {
        Self::new()
    }
}


//------------ KeyId ---------------------------------------------------------

/// This signer’s key identifier.
//
//  We wrap this in a newtype so that people won’t start mucking about with
//  the integers.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct KeyId(usize);


//------------ SoftKey -------------------------------------------------------

/// A key pair held by the soft signer.
enum SoftKey {
    Rsa(RsaKeyPair),
    Ecdsa(EcdsaKeyPair, PublicKeyFormat),
}

impl SoftKey {
    /// Loads a key pair, trying all key types we know in turn.
    fn from_pkcs8(
        pkcs8: &[u8], rng: &rand::SystemRandom
    ) -> Result<Self, io::Error> {
        if let Ok(key) = RsaKeyPair::from_pkcs8(pkcs8) {
            return Ok(SoftKey::Rsa(key))
        }
        if let Ok(key) = EcdsaKeyPair::from_pkcs8(
            &ECDSA_P256_SHA256_ASN1_SIGNING, pkcs8, rng
        ) {
            return Ok(SoftKey::Ecdsa(key, PublicKeyFormat::EcdsaP256))
        }
        EcdsaKeyPair::from_pkcs8(
            &ECDSA_P384_SHA384_ASN1_SIGNING, pkcs8, rng
        ).map(|key| {
            SoftKey::Ecdsa(key, PublicKeyFormat::EcdsaP384)
        }).map_err(|err| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("unsupported private key: {}", err)
            )
        })
    }

    fn get_key_info(&self) -> PublicKey {
        match *self {
            SoftKey::Rsa(ref key) => {
                PublicKey::new(
                    PublicKeyFormat::Rsa,
                    Bytes::copy_from_slice(key.public_key().as_ref())
                )
            }
            SoftKey::Ecdsa(ref key, format) => {
                PublicKey::new(
                    format,
                    Bytes::copy_from_slice(key.public_key().as_ref())
                )
            }
        }
    }

    fn sign(
        &self,
        algorithm: SignatureAlgorithm,
        data: &[u8],
        rng: &rand::SystemRandom,
    ) -> Result<Signature, SigningError<io::Error>> {
        match *self {
            SoftKey::Rsa(ref key) => {
                let padding = match algorithm {
                    SignatureAlgorithm::Sha256WithRsa => &RSA_PKCS1_SHA256,
                    SignatureAlgorithm::Sha384WithRsa => &RSA_PKCS1_SHA384,
                    SignatureAlgorithm::Sha512WithRsa => &RSA_PKCS1_SHA512,
                    _ => return Err(SigningError::IncompatibleKey)
                };
                let mut signature = vec![0; key.public().modulus_len()];
                key.sign(padding, rng, data, &mut signature).map_err(|_| {
                    signing_failed()
                })?;
                Ok(Signature::new(algorithm, signature.into()))
            }
            SoftKey::Ecdsa(ref key, format) => {
                match (format, algorithm) {
                    (
                        PublicKeyFormat::EcdsaP256,
                        SignatureAlgorithm::EcdsaWithSha256
                    ) |
                    (
                        PublicKeyFormat::EcdsaP384,
                        SignatureAlgorithm::EcdsaWithSha384
                    ) => { }
                    _ => return Err(SigningError::IncompatibleKey)
                }
                let signature = key.sign(rng, data).map_err(|_| {
                    signing_failed()
                })?;
                Ok(Signature::new(
                    algorithm, Bytes::copy_from_slice(signature.as_ref())
                ))
            }
        }
    }
}


//------------ Helpers -------------------------------------------------------

fn poisoned() -> io::Error {
    io::Error::new(io::ErrorKind::Other, "key store lock poisoned")
}

fn signing_failed() -> io::Error {
    io::Error::new(io::ErrorKind::Other, "signing failed")
}


//============ Tests =========================================================

#[cfg(test)]
mod test {
    use super::*;
    use crate::cert::Cert;

    #[test]
    fn rsa_key_matches_certificate() {
        let signer = SoftSigner::new();
        let key = signer.key_from_pkcs8(
            include_bytes!("../../test-data/rsa.key.pk8")
        ).unwrap();
        let cert = Cert::decode(
            include_bytes!("../../test-data/rsa.cer").as_ref()
        ).unwrap();
        let info = signer.get_key_info(&key).unwrap();
        assert_eq!(&info, cert.subject_public_key_info());

        let sig = signer.sign(
            &key, SignatureAlgorithm::Sha256WithRsa, b"hello"
        ).unwrap();
        info.verify(b"hello", &sig).unwrap();
        assert!(info.verify(b"hullo", &sig).is_err());
        assert!(matches!(
            signer.sign(&key, SignatureAlgorithm::EcdsaWithSha256, b"hello"),
            Err(SigningError::IncompatibleKey)
        ));
    }

    #[test]
    fn ecdsa_key_matches_certificate() {
        let signer = SoftSigner::default();
        let key = signer.key_from_pkcs8(
            include_bytes!("../../test-data/ec.key.pk8")
        ).unwrap();
        let cert = Cert::decode(
            include_bytes!("../../test-data/ec.cer").as_ref()
        ).unwrap();
        let info = signer.get_key_info(&key).unwrap();
        assert_eq!(&info, cert.subject_public_key_info());

        let sig = signer.sign(
            &key, SignatureAlgorithm::EcdsaWithSha256, b"hello"
        ).unwrap();
        info.verify(b"hello", &sig).unwrap();
        assert!(matches!(
            signer.sign(&key, SignatureAlgorithm::EcdsaWithSha384, b"hello"),
            Err(SigningError::IncompatibleKey)
        ));
    }

    #[test]
    fn unknown_keys() {
        let signer = SoftSigner::new();
        assert!(signer.key_from_pkcs8(b"\x30\x00").is_err());
        assert!(matches!(
            signer.get_key_info(&KeyId(0)),
            Err(KeyError::KeyNotFound)
        ));
    }
}
