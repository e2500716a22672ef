//! Error handling.
//!
//! All fallible operations of the envelope model and the signing pipeline
//! return the single [`Error`] type defined here. The transcoder has its own
//! smaller error, [`MalformedError`], which converts into it.

use std::{error, fmt};
use std::convert::Infallible;
use bcder::Oid;
use bcder::decode::DecodeError;
use bytes::Bytes;
use crate::ber::{MalformedError, MalformedKind};
use crate::crypto::VerificationError;


//------------ Error ---------------------------------------------------------

/// An error happened while processing a CMS message.
#[derive(Debug)]
pub enum Error {
    /// The encoding of the input is broken.
    Malformed(MalformedError),

    /// A structure did not follow its ASN.1 definition.
    Decode(DecodeError<Infallible>),

    /// A value has a different type than required.
    WrongType,

    /// The content type of a message is not one we know about.
    UnsupportedContentType(Oid<Bytes>),

    /// An algorithm identifier is unknown or cannot be used.
    UnsupportedAlgorithm(Oid<Bytes>),

    /// An attribute did not appear exactly once with exactly one value.
    AttributeCardinality {
        /// The type of the attribute asked for.
        attr_type: Oid<Bytes>,

        /// The number of attributes of that type found.
        attributes: usize,

        /// The number of values of the only attribute found.
        values: usize,
    },

    /// None of the candidate certificates matches a signer identifier.
    NoMatchingCertificate,

    /// A signer info has a version we cannot resolve a signer for.
    UnknownVersion(u8),

    /// There is data left after the end of a value.
    TrailingData,

    /// The content is not included in the message.
    MissingContent,

    /// The content to be signed is not present anymore.
    AlreadyDetached,

    /// Verifying a signature failed.
    Verification(VerificationError),

    /// The signer failed.
    Signer(Box<dyn error::Error + Send + Sync>),
}

impl Error {
    /// Creates an error for an unknown or unusable algorithm identifier.
    pub(crate) fn unsupported_algorithm(oid: &Oid<impl AsRef<[u8]>>) -> Self {
        Error::UnsupportedAlgorithm(
            Oid(Bytes::copy_from_slice(oid.0.as_ref()))
        )
    }

    pub(crate) fn unsupported_content_type(
        oid: &Oid<impl AsRef<[u8]>>
    ) -> Self {
        Error::UnsupportedContentType(
            Oid(Bytes::copy_from_slice(oid.0.as_ref()))
        )
    }

    /// Wraps an error produced by a signer.
    pub(crate) fn signer(
        err: impl error::Error + Send + Sync + 'static
    ) -> Self {
        Error::Signer(Box::new(err))
    }
}


//--- From

impl From<MalformedError> for Error {
    fn from(err: MalformedError) -> Self {
        if err.kind() == MalformedKind::TrailingData {
            Error::TrailingData
        }
        else {
            Error::Malformed(err)
        }
    }
}

impl From<DecodeError<Infallible>> for Error {
    fn from(err: DecodeError<Infallible>) -> Self {
        Error::Decode(err)
    }
}

impl From<VerificationError> for Error {
    fn from(err: VerificationError) -> Self {
        Error::Verification(err)
    }
}


//--- Display and Error

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Error::Malformed(ref err) => {
                write!(f, "malformed encoding: {}", err)
            }
            Error::Decode(ref err) => err.fmt(f),
            Error::WrongType => f.write_str("wrong type"),
            Error::UnsupportedContentType(ref oid) => {
                write!(f, "unsupported content type {}", oid)
            }
            Error::UnsupportedAlgorithm(ref oid) => {
                write!(f, "unsupported algorithm {}", oid)
            }
            Error::AttributeCardinality {
                ref attr_type, attributes, values
            } => {
                if attributes != 1 {
                    write!(f,
                        "expected 1 attribute {} found {}",
                        attr_type, attributes
                    )
                }
                else {
                    write!(f,
                        "expected 1 attribute value for {} found {}",
                        attr_type, values
                    )
                }
            }
            Error::NoMatchingCertificate => {
                f.write_str("no matching certificate")
            }
            Error::UnknownVersion(version) => {
                write!(f, "unknown SignerInfo version {}", version)
            }
            Error::TrailingData => f.write_str("unexpected trailing data"),
            Error::MissingContent => f.write_str("missing content"),
            Error::AlreadyDetached => {
                f.write_str("content has already been detached")
            }
            Error::Verification(ref err) => err.fmt(f),
            Error::Signer(ref err) => write!(f, "signer error: {}", err),
        }
    }
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match *self {
            Error::Malformed(ref err) => Some(err),
            Error::Verification(ref err) => Some(err),
            Error::Signer(ref err) => Some(err.as_ref()),
            _ => None
        }
    }
}


//============ Tests =========================================================

#[cfg(test)]
mod test {
    use super::*;
    use crate::oid;

    #[test]
    fn trailing_data_is_lifted() {
        let err = MalformedError::new(MalformedKind::TrailingData, 12);
        assert!(matches!(Error::from(err), Error::TrailingData));
        let err = MalformedError::new(MalformedKind::Truncated, 12);
        assert!(matches!(Error::from(err), Error::Malformed(_)));
    }

    #[test]
    fn cardinality_messages() {
        let attr_type = Oid(Bytes::from_static(oid::CONTENT_TYPE.0));
        let err = Error::AttributeCardinality {
            attr_type: attr_type.clone(), attributes: 2, values: 0
        };
        assert!(err.to_string().starts_with("expected 1 attribute "));
        assert!(err.to_string().ends_with("found 2"));
        let err = Error::AttributeCardinality {
            attr_type, attributes: 1, values: 3
        };
        assert!(err.to_string().starts_with("expected 1 attribute value"));
        assert!(err.to_string().ends_with("found 3"));
    }
}
