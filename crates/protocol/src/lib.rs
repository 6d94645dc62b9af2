//! # mqtt-hmac Protocol Library
//!
//! Integrity-protected packet framing for lightweight publish/subscribe
//! links whose transport gives no integrity guarantee. Sender and receiver
//! share a pre-distributed secret key.
//!
//! ## Overview
//!
//! - **Packet Model**: fixed header, topic, optional signature, payload
//! - **Authentication**: pluggable [`Authenticator`] trait with an HMAC-SHA2
//!   implementation
//! - **Packet Codec**: length-prefixed framing that signs on encode and
//!   verifies on decode
//!
//! ## Wire Layout
//!
//! ```text
//! offset   size        field
//! 0        1           fixed header
//! 1        2           topic length (big-endian)
//! 3        topic_len   topic (UTF-8)
//! 3+tl     2           signature length (big-endian)
//! 5+tl     sig_len     signature
//! 5+tl+sl  ...         payload (rest of frame)
//! ```
//!
//! ## Example Usage
//!
//! ```rust
//! use mqtt_hmac_protocol::{FixedHeader, Packet, PacketCodec};
//!
//! let codec = PacketCodec::new();
//! let key: &[u8] = b"super-secret-key-2024";
//!
//! let packet = Packet::new(FixedHeader::PUBLISH, "industrial/sensor/pressure", b"1024.50".to_vec());
//! let frame = codec.encode(&packet, Some(key)).unwrap();
//!
//! let received = codec.decode(&frame, Some(key)).unwrap();
//! assert_eq!(received.payload, b"1024.50");
//! ```
//!
//! ## Modules
//!
//! - [`crypto`]: Authenticator trait and HMAC implementation
//! - [`packet`]: Packet model and size helpers
//! - [`framing`]: Packet codec
//! - [`error`]: Error types

pub mod crypto;
pub mod error;
pub mod framing;
pub mod packet;

pub use crypto::{Authenticator, HashAlgorithm, HmacSha};
pub use error::{FrameField, ProtocolError, Result};
pub use framing::{decode_packet, encode_packet, PacketCodec};
pub use packet::{
    frame_overhead, FixedHeader, Packet, FIXED_HEADER_SIZE, LENGTH_PREFIX_SIZE,
    MAX_SIGNATURE_LEN, MAX_TOPIC_LEN,
};
