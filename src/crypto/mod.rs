//! Signing related implementations.

pub use self::digest::{Digest, DigestAlgorithm};
pub use self::keys::{PublicKey, PublicKeyFormat, VerificationError};
pub use self::signer::{KeyError, Signer, SigningError};
pub use self::signature::{Signature, SignatureAlgorithm, SignatureFamily};
pub use self::softsigner::SoftSigner;

pub mod digest;
pub mod keys;
pub mod signer;
pub mod signature;
pub mod softsigner;
