//! Pluggable packet authentication.
//!
//! The codec never touches a hash function directly. It asks an
//! [`Authenticator`] to compute or check a tag over the signed byte range,
//! so the algorithm can change without touching the framing code. The
//! algorithm is local configuration only; nothing about it goes on the wire.

use std::fmt;
use std::str::FromStr;

use hmac::digest::KeyInit;
use hmac::{Hmac, Mac};
use sha2::{Sha224, Sha256, Sha384, Sha512};

use crate::error::{ProtocolError, Result};

/// Computes and checks authentication tags under a shared secret.
///
/// Implementations must be deterministic and free of side effects so a
/// single instance can be shared between threads.
pub trait Authenticator: Send + Sync {
    /// Human-readable algorithm name, e.g. `hmac-sha256`.
    fn name(&self) -> &str;

    /// Nominal tag size in bytes.
    ///
    /// Receivers never rely on this; they read the tag length from the frame.
    fn output_size(&self) -> usize;

    /// Computes the tag for `data` under `key`.
    fn compute(&self, key: &[u8], data: &[u8]) -> Result<Vec<u8>>;

    /// Returns true iff `tag` equals `compute(key, data)`.
    ///
    /// The comparison runs in constant time over the tag content. A tag of
    /// the wrong length is just a mismatch.
    fn verify(&self, key: &[u8], data: &[u8], tag: &[u8]) -> bool;
}

/// Hash functions available to [`HmacSha`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum HashAlgorithm {
    /// SHA-224, 28-byte tags.
    Sha224,
    /// SHA-256, 32-byte tags.
    #[default]
    Sha256,
    /// SHA-384, 48-byte tags.
    Sha384,
    /// SHA-512, 64-byte tags.
    Sha512,
}

impl HashAlgorithm {
    /// Every supported algorithm.
    pub const ALL: [HashAlgorithm; 4] = [
        HashAlgorithm::Sha224,
        HashAlgorithm::Sha256,
        HashAlgorithm::Sha384,
        HashAlgorithm::Sha512,
    ];

    /// Digest size in bytes.
    pub fn output_size(self) -> usize {
        match self {
            HashAlgorithm::Sha224 => 28,
            HashAlgorithm::Sha256 => 32,
            HashAlgorithm::Sha384 => 48,
            HashAlgorithm::Sha512 => 64,
        }
    }

    /// Short name as accepted by [`FromStr`].
    pub fn as_str(self) -> &'static str {
        match self {
            HashAlgorithm::Sha224 => "sha224",
            HashAlgorithm::Sha256 => "sha256",
            HashAlgorithm::Sha384 => "sha384",
            HashAlgorithm::Sha512 => "sha512",
        }
    }

    fn hmac_name(self) -> &'static str {
        match self {
            HashAlgorithm::Sha224 => "hmac-sha224",
            HashAlgorithm::Sha256 => "hmac-sha256",
            HashAlgorithm::Sha384 => "hmac-sha384",
            HashAlgorithm::Sha512 => "hmac-sha512",
        }
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HashAlgorithm {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "");
        match normalized.as_str() {
            "sha224" => Ok(HashAlgorithm::Sha224),
            "sha256" => Ok(HashAlgorithm::Sha256),
            "sha384" => Ok(HashAlgorithm::Sha384),
            "sha512" => Ok(HashAlgorithm::Sha512),
            _ => Err(ProtocolError::UnknownHashAlgorithm(s.to_string())),
        }
    }
}

/// HMAC over the SHA-2 family.
///
/// Holds no state beyond the algorithm choice. The default is HMAC-SHA256.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HmacSha {
    algorithm: HashAlgorithm,
}

impl HmacSha {
    /// Creates an HMAC authenticator for the given hash.
    pub fn new(algorithm: HashAlgorithm) -> Self {
        Self { algorithm }
    }

    /// Returns the configured hash algorithm.
    pub fn algorithm(&self) -> HashAlgorithm {
        self.algorithm
    }
}

impl Authenticator for HmacSha {
    fn name(&self) -> &str {
        self.algorithm.hmac_name()
    }

    fn output_size(&self) -> usize {
        self.algorithm.output_size()
    }

    fn compute(&self, key: &[u8], data: &[u8]) -> Result<Vec<u8>> {
        match self.algorithm {
            HashAlgorithm::Sha224 => mac_compute::<Hmac<Sha224>>(key, data),
            HashAlgorithm::Sha256 => mac_compute::<Hmac<Sha256>>(key, data),
            HashAlgorithm::Sha384 => mac_compute::<Hmac<Sha384>>(key, data),
            HashAlgorithm::Sha512 => mac_compute::<Hmac<Sha512>>(key, data),
        }
    }

    fn verify(&self, key: &[u8], data: &[u8], tag: &[u8]) -> bool {
        match self.algorithm {
            HashAlgorithm::Sha224 => mac_verify::<Hmac<Sha224>>(key, data, tag),
            HashAlgorithm::Sha256 => mac_verify::<Hmac<Sha256>>(key, data, tag),
            HashAlgorithm::Sha384 => mac_verify::<Hmac<Sha384>>(key, data, tag),
            HashAlgorithm::Sha512 => mac_verify::<Hmac<Sha512>>(key, data, tag),
        }
    }
}

fn mac_compute<M: Mac + KeyInit>(key: &[u8], data: &[u8]) -> Result<Vec<u8>> {
    let mut mac = <M as Mac>::new_from_slice(key)
        .map_err(|e| ProtocolError::InvalidKey(e.to_string()))?;
    mac.update(data);
    Ok(mac.finalize().into_bytes().to_vec())
}

// `verify_slice` compares in constant time and rejects length mismatches.
fn mac_verify<M: Mac + KeyInit>(key: &[u8], data: &[u8], tag: &[u8]) -> bool {
    match <M as Mac>::new_from_slice(key) {
        Ok(mut mac) => {
            mac.update(data);
            mac.verify_slice(tag).is_ok()
        }
        Err(_) => false,
    }
}
