//! Packet codec with HMAC signatures.
//!
//! # Frame Format
//!
//! Each frame consists of:
//! - 1 byte: fixed header
//! - 2 bytes: topic length (big-endian)
//! - N bytes: topic (UTF-8)
//! - 2 bytes: signature length (big-endian)
//! - M bytes: signature
//! - remaining bytes: payload
//!
//! # Signatures
//!
//! The signature is computed over `topic || payload` by the configured
//! [`Authenticator`]. Decoding with a key verifies it and fails closed;
//! decoding without a key skips verification entirely.

use std::fmt;
use std::sync::Arc;

use crate::crypto::{Authenticator, HashAlgorithm, HmacSha};
use crate::error::{FrameField, ProtocolError, Result};
use crate::packet::{
    frame_overhead, signing_input, FixedHeader, Packet, MAX_SIGNATURE_LEN, MAX_TOPIC_LEN,
};

/// Encode a packet into wire bytes.
///
/// A signature already present on the packet is written verbatim. Otherwise
/// `key` is required and the signature is computed with `authenticator`.
/// Nothing is returned unless the whole frame was built.
pub fn encode_packet(
    packet: &Packet,
    key: Option<&[u8]>,
    authenticator: &dyn Authenticator,
) -> Result<Vec<u8>> {
    let topic = packet.topic.as_bytes();
    if topic.len() > MAX_TOPIC_LEN {
        return Err(ProtocolError::TopicTooLong {
            len: topic.len(),
            max: MAX_TOPIC_LEN,
        });
    }
    let payload = packet.payload.as_slice();

    let computed;
    let signature: &[u8] = match &packet.signature {
        Some(signature) => signature,
        None => {
            let key = key.ok_or(ProtocolError::MissingKey)?;
            computed = authenticator.compute(key, &signing_input(topic, payload))?;
            &computed
        }
    };

    if signature.len() > MAX_SIGNATURE_LEN {
        return Err(ProtocolError::SignatureTooLong {
            len: signature.len(),
            max: MAX_SIGNATURE_LEN,
        });
    }

    let total_size = frame_overhead(topic.len(), signature.len()) + payload.len();
    let mut output = Vec::with_capacity(total_size);

    output.push(packet.fixed_header.as_byte());
    output.extend_from_slice(&(topic.len() as u16).to_be_bytes());
    output.extend_from_slice(topic);
    output.extend_from_slice(&(signature.len() as u16).to_be_bytes());
    output.extend_from_slice(signature);
    output.extend_from_slice(payload);

    tracing::trace!(
        topic = %packet.topic,
        signature_len = signature.len(),
        payload_len = payload.len(),
        frame_len = output.len(),
        "encoded packet"
    );

    Ok(output)
}

/// Decode wire bytes into a packet.
///
/// With a key, the signature is verified before anything is returned and a
/// mismatch yields [`ProtocolError::VerificationFailed`]. Without a key the
/// signature is returned unchecked.
pub fn decode_packet(
    data: &[u8],
    key: Option<&[u8]>,
    authenticator: &dyn Authenticator,
) -> Result<Packet> {
    let mut reader = Reader::new(data);

    let fixed_header = FixedHeader::from_byte(reader.read_u8(FrameField::FixedHeader)?);

    let topic_len = reader.read_u16_be(FrameField::TopicLength)? as usize;
    let topic_bytes = reader.take(topic_len, FrameField::Topic)?;
    let topic = std::str::from_utf8(topic_bytes).map_err(ProtocolError::InvalidTopic)?;

    let signature_len = reader.read_u16_be(FrameField::SignatureLength)? as usize;
    let signature = reader.take(signature_len, FrameField::Signature)?;

    let payload = reader.rest();

    if let Some(key) = key {
        if !authenticator.verify(key, &signing_input(topic_bytes, payload), signature) {
            tracing::debug!(
                topic,
                authenticator = authenticator.name(),
                frame_len = data.len(),
                "signature verification failed"
            );
            return Err(ProtocolError::VerificationFailed);
        }
    }

    tracing::trace!(
        topic,
        verified = key.is_some(),
        payload_len = payload.len(),
        "decoded packet"
    );

    Ok(Packet {
        fixed_header,
        topic: topic.to_string(),
        signature: Some(signature.to_vec()),
        payload: payload.to_vec(),
    })
}

/// Bounds-checked cursor over a frame.
struct Reader<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> Reader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, offset: 0 }
    }

    fn remaining(&self) -> usize {
        self.data.len() - self.offset
    }

    fn take(&mut self, len: usize, field: FrameField) -> Result<&'a [u8]> {
        let available = self.remaining();
        if available < len {
            return Err(ProtocolError::Truncated {
                field,
                needed: len,
                available,
            });
        }
        let bytes = &self.data[self.offset..self.offset + len];
        self.offset += len;
        Ok(bytes)
    }

    fn read_u8(&mut self, field: FrameField) -> Result<u8> {
        Ok(self.take(1, field)?[0])
    }

    fn read_u16_be(&mut self, field: FrameField) -> Result<u16> {
        let bytes = self.take(2, field)?;
        Ok(u16::from_be_bytes([bytes[0], bytes[1]]))
    }

    fn rest(self) -> &'a [u8] {
        &self.data[self.offset..]
    }
}

/// Encoder and decoder bound to one authenticator.
///
/// Cloning is cheap; clones share the authenticator.
#[derive(Clone)]
pub struct PacketCodec {
    authenticator: Arc<dyn Authenticator>,
}

impl PacketCodec {
    /// Create a codec using HMAC-SHA256.
    pub fn new() -> Self {
        Self::with_authenticator(HmacSha::default())
    }

    /// Create a codec using HMAC with the given hash.
    pub fn with_algorithm(algorithm: HashAlgorithm) -> Self {
        Self::with_authenticator(HmacSha::new(algorithm))
    }

    /// Create a codec using a custom authenticator.
    pub fn with_authenticator<A: Authenticator + 'static>(authenticator: A) -> Self {
        Self {
            authenticator: Arc::new(authenticator),
        }
    }

    /// Create a codec from an already shared authenticator.
    pub fn from_shared(authenticator: Arc<dyn Authenticator>) -> Self {
        Self { authenticator }
    }

    /// The authenticator used for signing and verification.
    pub fn authenticator(&self) -> &dyn Authenticator {
        self.authenticator.as_ref()
    }

    /// Framing overhead for `topic` with this codec's nominal signature size.
    pub fn overhead(&self, topic: &str) -> usize {
        frame_overhead(topic.len(), self.authenticator.output_size())
    }

    /// Encode a packet into bytes. See [`encode_packet`].
    pub fn encode(&self, packet: &Packet, key: Option<&[u8]>) -> Result<Vec<u8>> {
        encode_packet(packet, key, self.authenticator())
    }

    /// Decode a packet from bytes. See [`decode_packet`].
    pub fn decode(&self, data: &[u8], key: Option<&[u8]>) -> Result<Packet> {
        decode_packet(data, key, self.authenticator())
    }
}

impl Default for PacketCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for PacketCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PacketCodec")
            .field("authenticator", &self.authenticator.name())
            .finish()
    }
}
