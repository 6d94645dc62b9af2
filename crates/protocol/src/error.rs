//! Error types for the protocol crate.

use std::fmt;
use std::str::Utf8Error;

use thiserror::Error;

/// A field of the wire layout, used to report which part of a frame
/// could not be read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameField {
    /// The single fixed-header byte.
    FixedHeader,
    /// The 2-byte topic length prefix.
    TopicLength,
    /// The topic bytes.
    Topic,
    /// The 2-byte signature length prefix.
    SignatureLength,
    /// The signature bytes.
    Signature,
}

impl fmt::Display for FrameField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FrameField::FixedHeader => "fixed header",
            FrameField::TopicLength => "topic length",
            FrameField::Topic => "topic",
            FrameField::SignatureLength => "signature length",
            FrameField::Signature => "signature",
        };
        f.write_str(name)
    }
}

/// Protocol error type covering all possible failure modes.
///
/// Every variant except [`ProtocolError::VerificationFailed`] is a
/// structural error: the input was malformed or the caller broke a
/// contract. Verification failure is reported separately because it means
/// tampering or a key mismatch, not bad framing.
#[derive(Debug, Error)]
pub enum ProtocolError {
    // Framing errors
    /// The frame ended before the named field could be read.
    #[error("truncated frame: cannot read {field} (need {needed} bytes, have {available})")]
    Truncated {
        /// Field that could not be read.
        field: FrameField,
        /// Bytes required for the field.
        needed: usize,
        /// Bytes remaining in the frame.
        available: usize,
    },

    /// Topic bytes are not valid UTF-8.
    #[error("invalid topic encoding: {0}")]
    InvalidTopic(#[source] Utf8Error),

    /// Fixed header value does not fit in a single byte.
    #[error("fixed header must be a single byte value, got {0}")]
    InvalidFixedHeader(u32),

    /// Topic is too long for its 16-bit length prefix.
    #[error("topic too long: {len} bytes exceeds maximum of {max} bytes")]
    TopicTooLong {
        /// Encoded topic length.
        len: usize,
        /// Maximum allowed length.
        max: usize,
    },

    /// Signature is too long for its 16-bit length prefix.
    #[error("signature too long: {len} bytes exceeds maximum of {max} bytes")]
    SignatureTooLong {
        /// Signature length.
        len: usize,
        /// Maximum allowed length.
        max: usize,
    },

    // Key and algorithm errors
    /// A signature has to be computed but no key was supplied.
    #[error("key is required to compute signature when packet has none")]
    MissingKey,

    /// The authenticator rejected the key.
    #[error("invalid key: {0}")]
    InvalidKey(String),

    /// Hash algorithm name is not recognised.
    #[error("unknown hash algorithm: {0}")]
    UnknownHashAlgorithm(String),

    // Authentication errors
    /// Recomputed signature does not match the one carried by the frame.
    #[error("HMAC verification failed")]
    VerificationFailed,
}

impl ProtocolError {
    /// Returns true for malformed input or contract violations.
    pub fn is_structural(&self) -> bool {
        !self.is_authentication_failure()
    }

    /// Returns true if the frame parsed but its signature did not verify.
    pub fn is_authentication_failure(&self) -> bool {
        matches!(self, ProtocolError::VerificationFailed)
    }
}

/// Result type alias for protocol operations.
pub type Result<T> = std::result::Result<T, ProtocolError>;
