//! Digest algorithm and operations.

use std::{fmt, io};
use bcder::{ConstOid, Oid};
use bytes::Bytes;
use ring::digest;
use crate::error::Error;
use crate::oid;
use crate::x509::AlgorithmIdentifier;

// Re-export the things from ring for actual digest generation.
pub use ring::digest::Digest;


//------------ DigestAlgorithm -----------------------------------------------

/// The digest algorithms that can appear in a signer info.
///
/// MD5 is recognized so that messages using it can be parsed and reported
/// accurately, but it cannot be computed. Any attempt to do so results in
/// an unsupported algorithm error.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum DigestAlgorithm {
    Md5,
    Sha1,
    Sha256,
    Sha384,
    Sha512,
}

/// The object identifiers of all digest algorithms.
static OIDS: &[(DigestAlgorithm, ConstOid)] = &[
    (DigestAlgorithm::Md5, oid::MD5),
    (DigestAlgorithm::Sha1, oid::SHA1),
    (DigestAlgorithm::Sha256, oid::SHA256),
    (DigestAlgorithm::Sha384, oid::SHA384),
    (DigestAlgorithm::Sha512, oid::SHA512),
];


/// # Algorithm Identifiers
///
/// Digest algorithms appear in CMS either alone or in sets with the following
/// syntax:
///
/// ```txt
/// DigestAlgorithmIdentifiers ::= SET OF DigestAlgorithmIdentifier
/// DigestAlgorithmIdentifier  ::= AlgorithmIdentifier
/// ```
///
/// When parsing, only the object identifier is considered. Any parameters
/// are ignored. We never create parameters when encoding.
impl DigestAlgorithm {
    /// Returns the algorithm for an object identifier.
    pub fn from_oid(oid: &Oid<impl AsRef<[u8]>>) -> Result<Self, Error> {
        OIDS.iter().find_map(|(alg, alg_oid)| {
            if alg_oid.0 == oid.0.as_ref() {
                Some(*alg)
            }
            else {
                None
            }
        }).ok_or_else(|| Error::unsupported_algorithm(oid))
    }

    /// Returns the algorithm for an algorithm identifier.
    pub fn from_identifier(
        identifier: &AlgorithmIdentifier
    ) -> Result<Self, Error> {
        Self::from_oid(identifier.algorithm())
    }

    /// Returns the object identifier of the algorithm.
    pub fn oid(self) -> ConstOid {
        match self {
            DigestAlgorithm::Md5 => oid::MD5,
            DigestAlgorithm::Sha1 => oid::SHA1,
            DigestAlgorithm::Sha256 => oid::SHA256,
            DigestAlgorithm::Sha384 => oid::SHA384,
            DigestAlgorithm::Sha512 => oid::SHA512,
        }
    }

    /// Returns the algorithm identifier for use in CMS.
    ///
    /// The identifier does not contain parameters.
    pub fn identifier(self) -> AlgorithmIdentifier {
        AlgorithmIdentifier::new(Oid(Bytes::from_static(self.oid().0)), None)
    }
}


/// # Creating Digest Values
///
impl DigestAlgorithm {
    fn ring_algorithm(
        self
    ) -> Result<&'static digest::Algorithm, Error> {
        match self {
            DigestAlgorithm::Md5 => {
                Err(Error::unsupported_algorithm(&self.oid()))
            }
            DigestAlgorithm::Sha1 => Ok(&digest::SHA1_FOR_LEGACY_USE_ONLY),
            DigestAlgorithm::Sha256 => Ok(&digest::SHA256),
            DigestAlgorithm::Sha384 => Ok(&digest::SHA384),
            DigestAlgorithm::Sha512 => Ok(&digest::SHA512),
        }
    }

    /// Returns the digest of `data` using this algorithm.
    ///
    /// MD5 is recognized but cannot be computed. It always fails with an
    /// unsupported algorithm error, so signatures using it never verify.
    pub fn digest(self, data: &[u8]) -> Result<Digest, Error> {
        self.ring_algorithm().map(|alg| digest::digest(alg, data))
    }

    /// Returns a digest context for multi-step calculation of the digest.
    ///
    /// Fails for MD5 just like [`digest`][Self::digest].
    pub fn start(self) -> Result<Context, Error> {
        self.ring_algorithm().map(|alg| Context(digest::Context::new(alg)))
    }
}


//--- Display

impl fmt::Display for DigestAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match *self {
            DigestAlgorithm::Md5 => "MD5",
            DigestAlgorithm::Sha1 => "SHA-1",
            DigestAlgorithm::Sha256 => "SHA-256",
            DigestAlgorithm::Sha384 => "SHA-384",
            DigestAlgorithm::Sha512 => "SHA-512",
        })
    }
}


//------------ Context -------------------------------------------------------

#[derive(Clone)]
pub struct Context(digest::Context);

impl Context {
    pub fn update(&mut self, data: &[u8]) {
        self.0.update(data)
    }

    pub fn finish(self) -> Digest {
        self.0.finish()
    }
}

impl io::Write for Context {
    fn write(&mut self, buf: &[u8]) -> Result<usize, io::Error> {
        self.update(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> Result<(), io::Error> {
        Ok(())
    }
}


//============ Tests =========================================================
