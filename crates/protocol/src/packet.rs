//! In-memory packet model.
//!
//! # Packet Layout
//!
//! ```text
//! [fixed header: 1 byte]
//! [topic length: 2 bytes, big-endian]
//! [topic: UTF-8]
//! [signature length: 2 bytes, big-endian]
//! [signature]
//! [payload: rest of frame]
//! ```
//!
//! The signature covers `topic || payload` only. Neither the fixed header
//! nor the length prefixes are signed, and nothing separates topic from
//! payload in the signed bytes, so `("ab", "c")` and `("a", "bc")` share a
//! signature. Existing peers depend on this, so it is kept as-is.

/// Size of the fixed header in bytes.
pub const FIXED_HEADER_SIZE: usize = 1;

/// Size of each length prefix in bytes.
pub const LENGTH_PREFIX_SIZE: usize = 2;

/// Maximum encoded topic length (fits the 16-bit prefix).
pub const MAX_TOPIC_LEN: usize = u16::MAX as usize;

/// Maximum signature length (fits the 16-bit prefix).
pub const MAX_SIGNATURE_LEN: usize = u16::MAX as usize;

/// The single leading byte of a packet.
///
/// The codec treats it as opaque. The MQTT-style accessors are views for
/// callers that care about packet types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct FixedHeader(u8);

impl FixedHeader {
    /// MQTT PUBLISH, QoS 0, no flags.
    pub const PUBLISH: FixedHeader = FixedHeader(0x30);

    /// Create a header from a raw byte value.
    #[inline]
    pub const fn from_byte(byte: u8) -> Self {
        Self(byte)
    }

    /// Get the raw byte value.
    #[inline]
    pub const fn as_byte(self) -> u8 {
        self.0
    }

    /// Packet type, the high nibble.
    #[inline]
    pub const fn packet_type(self) -> u8 {
        self.0 >> 4
    }

    /// Packet flags, the low nibble.
    #[inline]
    pub const fn flags(self) -> u8 {
        self.0 & 0x0F
    }

    /// Check whether the packet type is PUBLISH.
    #[inline]
    pub const fn is_publish(self) -> bool {
        self.packet_type() == Self::PUBLISH.packet_type()
    }
}

impl From<u8> for FixedHeader {
    fn from(byte: u8) -> Self {
        Self(byte)
    }
}

impl From<FixedHeader> for u8 {
    fn from(header: FixedHeader) -> Self {
        header.0
    }
}

impl TryFrom<u32> for FixedHeader {
    type Error = crate::error::ProtocolError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        u8::try_from(value)
            .map(Self)
            .map_err(|_| crate::error::ProtocolError::InvalidFixedHeader(value))
    }
}

/// A packet with an optional signature.
///
/// `signature` is `None` until the codec computes it, or `Some` when the
/// caller supplies a pre-computed tag that must be sent verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    /// The fixed header byte.
    pub fixed_header: FixedHeader,
    /// Topic name.
    pub topic: String,
    /// Authentication tag, if already known.
    pub signature: Option<Vec<u8>>,
    /// Opaque payload.
    pub payload: Vec<u8>,
}

impl Packet {
    /// Create an unsigned packet. The codec signs it on encode.
    pub fn new(
        fixed_header: impl Into<FixedHeader>,
        topic: impl Into<String>,
        payload: impl Into<Vec<u8>>,
    ) -> Self {
        Self {
            fixed_header: fixed_header.into(),
            topic: topic.into(),
            signature: None,
            payload: payload.into(),
        }
    }

    /// Create a packet carrying a pre-computed signature.
    pub fn signed(
        fixed_header: impl Into<FixedHeader>,
        topic: impl Into<String>,
        signature: impl Into<Vec<u8>>,
        payload: impl Into<Vec<u8>>,
    ) -> Self {
        Self {
            fixed_header: fixed_header.into(),
            topic: topic.into(),
            signature: Some(signature.into()),
            payload: payload.into(),
        }
    }

    /// Bytes covered by the signature: `topic || payload`.
    pub fn signing_input(&self) -> Vec<u8> {
        signing_input(self.topic.as_bytes(), &self.payload)
    }

    /// Drop the signature so the next encode recomputes it.
    pub fn clear_signature(&mut self) {
        self.signature = None;
    }

    /// Check whether a signature is present.
    pub fn is_signed(&self) -> bool {
        self.signature.is_some()
    }

    /// Total frame size for a signature of `signature_len` bytes.
    pub fn encoded_len(&self, signature_len: usize) -> usize {
        frame_overhead(self.topic.len(), signature_len) + self.payload.len()
    }
}

/// Framing bytes added on top of the payload.
pub fn frame_overhead(topic_len: usize, signature_len: usize) -> usize {
    FIXED_HEADER_SIZE + LENGTH_PREFIX_SIZE + topic_len + LENGTH_PREFIX_SIZE + signature_len
}

pub(crate) fn signing_input(topic: &[u8], payload: &[u8]) -> Vec<u8> {
    let mut data = Vec::with_capacity(topic.len() + payload.len());
    data.extend_from_slice(topic);
    data.extend_from_slice(payload);
    data
}
