//! The object identifiers used in this crate.
//!
//! This module collects all the object indentifiers used at various places
//! in this crate in one central place. They are public so you can refer to
//! them should that ever become necessary.

use bcder::{ConstOid, Oid};


//------------ Content Types -------------------------------------------------

/// [RFC 5652](https://tools.ietf.org/html/rfc5652) `id-data`
pub const DATA: ConstOid
    = Oid(&[42, 134, 72, 134, 247, 13, 1, 7, 1]);

/// [RFC 5652](https://tools.ietf.org/html/rfc5652) `id-signedData`
pub const SIGNED_DATA: ConstOid
    = Oid(&[42, 134, 72, 134, 247, 13, 1, 7, 2]);

/// [RFC 3161](https://tools.ietf.org/html/rfc3161) `id-ct-TSTInfo`
///
/// The content type of the time-stamp token info carried by a time-stamp
/// token. We only ever treat the content as opaque.
pub const TST_INFO: ConstOid
    = Oid(&[42, 134, 72, 134, 247, 13, 1, 9, 16, 1, 4]);


//------------ Attributes ----------------------------------------------------

/// [RFC 5652](https://tools.ietf.org/html/rfc5652) `id-contentType`
pub const CONTENT_TYPE: ConstOid
    = Oid(&[42, 134, 72, 134, 247, 13, 1, 9, 3]);

/// [RFC 5652](https://tools.ietf.org/html/rfc5652) `id-messageDigest`
pub const MESSAGE_DIGEST: ConstOid
    = Oid(&[42, 134, 72, 134, 247, 13, 1, 9, 4]);

/// [RFC 5652](https://tools.ietf.org/html/rfc5652) `id-signingTime`
pub const SIGNING_TIME: ConstOid
    = Oid(&[42, 134, 72, 134, 247, 13, 1, 9, 5]);


//------------ Digest Algorithms ---------------------------------------------

/// [RFC 3370](https://tools.ietf.org/html/rfc3370) `sha-1`
pub const SHA1: ConstOid
    = Oid(&[43, 14, 3, 2, 26]);

/// [RFC 3370](https://tools.ietf.org/html/rfc3370) `md5`
pub const MD5: ConstOid
    = Oid(&[42, 134, 72, 134, 247, 13, 2, 5]);

/// [RFC 4055](https://tools.ietf.org/html/rfc4055) `id-sha256`
///
/// Identifies the SHA-256 one-way hash function.
pub const SHA256: ConstOid
    = Oid(&[96, 134, 72, 1, 101, 3, 4, 2, 1]);

/// [RFC 4055](https://tools.ietf.org/html/rfc4055) `id-sha384`
pub const SHA384: ConstOid
    = Oid(&[96, 134, 72, 1, 101, 3, 4, 2, 2]);

/// [RFC 4055](https://tools.ietf.org/html/rfc4055) `id-sha512`
pub const SHA512: ConstOid
    = Oid(&[96, 134, 72, 1, 101, 3, 4, 2, 3]);


//------------ Public Key Algorithms -----------------------------------------

/// [RFC 4055](https://tools.ietf.org/html/rfc4055) `rsaEncryption`
///
/// Identifies an RSA public key with no limitation to either RSASSA-PSS or
/// RSAES-OEAP. CMS also uses it as the signature algorithm for PKCS #1
/// version 1.5 signatures with whatever digest the signer info names.
pub const RSA_ENCRYPTION: ConstOid
    = Oid(&[42, 134, 72, 134, 247, 13, 1, 1, 1]);

/// [RFC 5480](https://tools.ietf.org/html/rfc5480) `id-ecPublicKey`
///
/// Identifies public keys for elliptic curve cryptography.
pub const EC_PUBLIC_KEY: ConstOid
    = Oid(&[42, 134, 72, 206, 61, 2, 1]);

/// [RFC 5480](https://tools.ietf.org/html/rfc5480) `secp256r1`
///
/// Identifies the P-256 curve for elliptic curve cryptography.
pub const SECP256R1: ConstOid
    = Oid(&[42, 134, 72, 206, 61, 3, 1, 7]);

/// [RFC 5480](https://tools.ietf.org/html/rfc5480) `secp384r1`
pub const SECP384R1: ConstOid
    = Oid(&[43, 129, 4, 0, 34]);


//------------ Signature Algorithms ------------------------------------------

/// [RFC 3279](https://tools.ietf.org/html/rfc3279) `md5WithRSAEncryption`
pub const MD5_WITH_RSA_ENCRYPTION: ConstOid
    = Oid(&[42, 134, 72, 134, 247, 13, 1, 1, 4]);

/// [RFC 3279](https://tools.ietf.org/html/rfc3279) `sha1WithRSAEncryption`
pub const SHA1_WITH_RSA_ENCRYPTION: ConstOid
    = Oid(&[42, 134, 72, 134, 247, 13, 1, 1, 5]);

/// [RFC 4055](https://tools.ietf.org/html/rfc4055) `sha256WithRSAEncryption`
///
/// Identifies the PKCS #1 version 1.5 signature algorithm with SHA-256.
pub const SHA256_WITH_RSA_ENCRYPTION: ConstOid
    = Oid(&[42, 134, 72, 134, 247, 13, 1, 1, 11]);

/// [RFC 4055](https://tools.ietf.org/html/rfc4055) `sha384WithRSAEncryption`
pub const SHA384_WITH_RSA_ENCRYPTION: ConstOid
    = Oid(&[42, 134, 72, 134, 247, 13, 1, 1, 12]);

/// [RFC 4055](https://tools.ietf.org/html/rfc4055) `sha512WithRSAEncryption`
pub const SHA512_WITH_RSA_ENCRYPTION: ConstOid
    = Oid(&[42, 134, 72, 134, 247, 13, 1, 1, 13]);

/// [RFC 3279](https://tools.ietf.org/html/rfc3279) `ecdsa-with-SHA1`
pub const ECDSA_WITH_SHA1: ConstOid
    = Oid(&[42, 134, 72, 206, 61, 4, 1]);

/// [RFC 5758](https://tools.ietf.org/html/rfc5758) `ecdsa-with-SHA256`
///
/// Identifies the ECDSA signature algorithm with SHA-256.
pub const ECDSA_WITH_SHA256: ConstOid
    = Oid(&[42, 134, 72, 206, 61, 4, 3, 2]);

/// [RFC 5758](https://tools.ietf.org/html/rfc5758) `ecdsa-with-SHA384`
pub const ECDSA_WITH_SHA384: ConstOid
    = Oid(&[42, 134, 72, 206, 61, 4, 3, 3]);

/// [RFC 5758](https://tools.ietf.org/html/rfc5758) `ecdsa-with-SHA512`
pub const ECDSA_WITH_SHA512: ConstOid
    = Oid(&[42, 134, 72, 206, 61, 4, 3, 4]);


//------------ Certificate Extensions ----------------------------------------

/// [RFC 5280](https://tools.ietf.org/html/rfc5280) `id-ce-subjectKeyIdentifier`
pub const CE_SUBJECT_KEY_IDENTIFIER: ConstOid = Oid(&[85, 29, 14]);
