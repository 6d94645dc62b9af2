//! Link simulations built on the packet codec.
//!
//! - **Integrity**: a valid packet is accepted and a tampered copy rejected
//! - **Overhead**: frame size growth for a range of payload sizes
//! - **Latency**: mean time to sign (encode) and verify (decode)

use std::fmt;
use std::time::{Duration, Instant};

use mqtt_hmac_protocol::{FixedHeader, Packet, PacketCodec, ProtocolError, Result};
use serde::Serialize;

use crate::config::{Config, ConfigError};

/// Number of frame bytes shown in the integrity hex dump.
const HEX_PREVIEW_BYTES: usize = 30;

/// Pressure reading sent by the integrity simulation.
pub const SAMPLE_READING: &[u8] = b"1024.50";

/// Payload signed and verified by the latency benchmark.
pub const LATENCY_PAYLOAD: &[u8] = b"sensor-value-12345";

/// One end-to-end link: codec, shared key and packet addressing.
pub struct Simulation {
    codec: PacketCodec,
    key: Vec<u8>,
    fixed_header: FixedHeader,
    topic: String,
}

impl Simulation {
    /// Create a simulation from explicit parts.
    pub fn new(
        codec: PacketCodec,
        key: impl Into<Vec<u8>>,
        fixed_header: FixedHeader,
        topic: impl Into<String>,
    ) -> Self {
        Self {
            codec,
            key: key.into(),
            fixed_header,
            topic: topic.into(),
        }
    }

    /// Create a simulation from the `[link]` section of a configuration.
    pub fn from_config(config: &Config) -> std::result::Result<Self, ConfigError> {
        Ok(Self::new(
            config.codec()?,
            config.key()?,
            config.fixed_header()?,
            config.link.topic.clone(),
        ))
    }

    /// The codec used by both ends of the link.
    pub fn codec(&self) -> &PacketCodec {
        &self.codec
    }

    fn packet(&self, payload: impl Into<Vec<u8>>) -> Packet {
        Packet::new(self.fixed_header, self.topic.clone(), payload)
    }

    /// Send one packet, then send it again with its last byte inverted.
    pub fn integrity(&self, payload: &[u8]) -> Result<IntegrityReport> {
        let frame = self.codec.encode(&self.packet(payload), Some(self.key.as_slice()))?;
        tracing::info!(frame_len = frame.len(), "transmitting packet");

        let valid_accepted = match self.codec.decode(&frame, Some(self.key.as_slice())) {
            Ok(_) => true,
            Err(e) if e.is_authentication_failure() => false,
            Err(e) => return Err(e),
        };

        let mut tampered = frame.clone();
        if let Some(last) = tampered.last_mut() {
            *last ^= 0xFF;
        }

        let (tampered_rejected, rejection) = match self.codec.decode(&tampered, Some(self.key.as_slice())) {
            Ok(_) => (false, None),
            Err(e) if e.is_authentication_failure() => {
                tracing::warn!("tampered packet rejected: {}", e);
                (true, Some(e.to_string()))
            }
            Err(e) => return Err(e),
        };

        let preview = &frame[..frame.len().min(HEX_PREVIEW_BYTES)];

        Ok(IntegrityReport {
            topic: self.topic.clone(),
            frame_len: frame.len(),
            frame_hex_preview: hex::encode(preview),
            valid_accepted,
            tampered_rejected,
            rejection,
        })
    }

    /// Measure framing overhead for each payload size.
    pub fn overhead(&self, payload_sizes: &[usize]) -> Result<OverheadReport> {
        let rows = payload_sizes
            .iter()
            .map(|&size| -> Result<OverheadRow> {
                let frame = self
                    .codec
                    .encode(&self.packet(vec![b'x'; size]), Some(self.key.as_slice()))?;
                let total = frame.len();
                Ok(OverheadRow {
                    payload_len: size,
                    frame_len: total,
                    overhead: total - size,
                    efficiency_percent: size as f64 / total as f64 * 100.0,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(OverheadReport {
            topic: self.topic.clone(),
            authenticator: self.codec.authenticator().name().to_string(),
            signature_len: self.codec.authenticator().output_size(),
            rows,
        })
    }

    /// Time `iterations` sign and verify operations.
    ///
    /// Signing clears the signature before each encode so it is recomputed.
    pub fn latency(&self, payload: &[u8], iterations: usize) -> Result<LatencyReport> {
        let mut packet = self.packet(payload);
        let sample = self.codec.encode(&packet, Some(self.key.as_slice()))?;

        let mut sign_total = Duration::ZERO;
        for _ in 0..iterations {
            packet.clear_signature();
            let start = Instant::now();
            self.codec.encode(&packet, Some(self.key.as_slice()))?;
            sign_total += start.elapsed();
        }

        let mut verify_total = Duration::ZERO;
        for _ in 0..iterations {
            let start = Instant::now();
            self.codec.decode(&sample, Some(self.key.as_slice()))?;
            verify_total += start.elapsed();
        }

        Ok(LatencyReport {
            authenticator: self.codec.authenticator().name().to_string(),
            iterations,
            avg_sign_micros: mean_micros(sign_total, iterations),
            avg_verify_micros: mean_micros(verify_total, iterations),
        })
    }
}

fn mean_micros(total: Duration, iterations: usize) -> f64 {
    if iterations == 0 {
        return 0.0;
    }
    total.as_secs_f64() * 1_000_000.0 / iterations as f64
}

/// Outcome of the integrity simulation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IntegrityReport {
    pub topic: String,
    pub frame_len: usize,
    pub frame_hex_preview: String,
    pub valid_accepted: bool,
    pub tampered_rejected: bool,
    pub rejection: Option<String>,
}

impl IntegrityReport {
    /// True if the valid packet was accepted and the tampered one rejected.
    pub fn passed(&self) -> bool {
        self.valid_accepted && self.tampered_rejected
    }
}

impl fmt::Display for IntegrityReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== INTEGRITY VERIFICATION ===")?;
        writeln!(f, "[Sender]   Topic: {}", self.topic)?;
        writeln!(f, "[Network]  Transmitting {} bytes", self.frame_len)?;
        writeln!(f, "[Network]  Hex dump: {}...", self.frame_hex_preview)?;
        writeln!(
            f,
            "[Receiver] Valid packet: {}",
            if self.valid_accepted { "accepted" } else { "REJECTED" }
        )?;
        match &self.rejection {
            Some(reason) => writeln!(f, "[Receiver] Tampered packet rejected: {reason}")?,
            None => writeln!(f, "[Receiver] Tampered packet: ACCEPTED")?,
        }
        write!(
            f,
            "[Result]   {}",
            if self.passed() { "SUCCESS" } else { "FAILURE" }
        )
    }
}

/// One row of the overhead analysis.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OverheadRow {
    pub payload_len: usize,
    pub frame_len: usize,
    pub overhead: usize,
    pub efficiency_percent: f64,
}

/// Outcome of the overhead analysis.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OverheadReport {
    pub topic: String,
    pub authenticator: String,
    pub signature_len: usize,
    pub rows: Vec<OverheadRow>,
}

impl fmt::Display for OverheadReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== PROTOCOL OVERHEAD ({}) ===", self.authenticator)?;
        writeln!(
            f,
            "{:<15} | {:<20} | {:<18} | {:<15}",
            "Payload (Bytes)", "Total Packet (Bytes)", "Overhead (Bytes)", "Efficiency (%)"
        )?;
        writeln!(f, "{}", "-".repeat(75))?;
        for row in &self.rows {
            writeln!(
                f,
                "{:<15} | {:<20} | {:<18} | {:.2}%",
                row.payload_len, row.frame_len, row.overhead, row.efficiency_percent
            )?;
        }
        writeln!(f)?;
        writeln!(f, "Overhead includes:")?;
        writeln!(f, " - Fixed header (1B)")?;
        writeln!(f, " - Topic length (2B) + topic ({}B)", self.topic.len())?;
        write!(
            f,
            " - Signature length (2B) + signature ({}B)",
            self.signature_len
        )
    }
}

/// Outcome of the latency benchmark.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LatencyReport {
    pub authenticator: String,
    pub iterations: usize,
    pub avg_sign_micros: f64,
    pub avg_verify_micros: f64,
}

impl fmt::Display for LatencyReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== COMPUTATIONAL LATENCY ({}) ===", self.authenticator)?;
        writeln!(f, "Total iterations: {}", self.iterations)?;
        writeln!(f, "Avg time to SIGN (encode):   {:.4} µs", self.avg_sign_micros)?;
        write!(f, "Avg time to VERIFY (decode): {:.4} µs", self.avg_verify_micros)
    }
}

/// Short category for a decode failure: tampered or malformed.
pub fn describe_decode_error(err: &ProtocolError) -> &'static str {
    if err.is_authentication_failure() {
        "authentication failure"
    } else {
        "malformed frame"
    }
}
