//! CMS signed data.
//!
//! The _Cryptographic Message Syntax_ (CMS) defined in RFC 5652 describes
//! how to wrap arbitrary content together with the signatures of one or
//! more signers and the certificates needed to check them. Its signed-data
//! content type is also known as PKCS#7 and used, for instance, for
//! time-stamp tokens and signed software updates.
//!
//! This crate parses such messages, including those encoded with
//! indefinite lengths or segmented strings, by first normalizing them to
//! DER via the [`ber`] module. It can verify the signatures of parsed
//! messages and create new signed messages using any implementation of
//! the [`Signer`][crypto::Signer] trait.
//!
//! The starting point is usually [`ContentInfo`], the outer layer of every
//! message, which leads to [`SignedData`].
//!
//! Certificates are parsed only as far as necessary to find a signer and
//! check a signature. No path validation of any kind happens.

pub use self::error::Error;
pub use self::content::{ContentInfo, EncapsulatedContentInfo};
pub use self::sigdata::SignedData;
pub use self::signerinfo::{SignerIdentifier, SignerInfo};

pub mod anyset;
pub mod attr;
pub mod ber;
pub mod cert;
pub mod content;
pub mod crypto;
pub mod error;
pub mod oid;
pub mod sigdata;
pub mod signerinfo;
pub mod x509;
