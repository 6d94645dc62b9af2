//! mqtt-hmac simulator
//!
//! Command-line driver for the HMAC-authenticated packet framing.

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use mqtt_hmac_protocol::{FixedHeader, Packet, PacketCodec};
use mqtt_hmac_sim::config::{default_config_path, Config};
use mqtt_hmac_sim::scenarios::{describe_decode_error, Simulation, LATENCY_PAYLOAD, SAMPLE_READING};
use serde::Serialize;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, reload, EnvFilter, Registry};

/// Handle for swapping the log filter once the config file is read.
type FilterHandle = reload::Handle<EnvFilter, Registry>;

/// mqtt-hmac simulator - HMAC-signed packet framing over a simulated link.
#[derive(Parser, Debug)]
#[command(name = "mqtt-hmac-sim")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands for the simulator.
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Send a signed packet, then a tampered copy, and check the receiver's verdict
    Integrity {
        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Measure framing overhead for the configured payload sizes
    Overhead {
        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Measure mean sign and verify time
    Latency {
        /// Number of iterations (defaults to the configured value)
        #[arg(long, short)]
        iterations: Option<usize>,

        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Encode and sign a packet, printing the frame as hex
    Encode {
        /// Topic (defaults to the configured topic)
        #[arg(long, short)]
        topic: Option<String>,

        /// Payload, sent as UTF-8 bytes
        #[arg(long, short)]
        payload: String,

        /// Fixed header byte (defaults to the configured header)
        #[arg(long)]
        header: Option<u8>,
    },

    /// Decode a hex frame and verify its signature
    Decode {
        /// Frame as a hex string
        frame: String,

        /// Skip signature verification
        #[arg(long)]
        no_verify: bool,

        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Write a default configuration file
    InitConfig {
        /// Overwrite an existing file
        #[arg(long, short)]
        force: bool,
    },
}

/// Decoded frame as printed by the `decode` command.
#[derive(Debug, Serialize)]
struct DecodedFrame {
    fixed_header: u8,
    topic: String,
    payload_hex: String,
    payload_text: Option<String>,
    signature_hex: Option<String>,
    verified: bool,
}

impl DecodedFrame {
    fn new(packet: Packet, verified: bool) -> Self {
        Self {
            fixed_header: packet.fixed_header.as_byte(),
            payload_text: String::from_utf8(packet.payload.clone()).ok(),
            payload_hex: hex::encode(&packet.payload),
            signature_hex: packet.signature.as_deref().map(hex::encode),
            topic: packet.topic,
            verified,
        }
    }
}

fn level_filter(level: LevelFilter) -> EnvFilter {
    EnvFilter::default().add_directive(level.into())
}

/// Level in effect while the config file is loaded.
fn startup_level(verbose: bool, env_level: Option<&str>) -> LevelFilter {
    if verbose {
        return LevelFilter::DEBUG;
    }
    env_level
        .and_then(|level| level.parse().ok())
        .unwrap_or(LevelFilter::INFO)
}

/// Level from the loaded config, unless `--verbose` or `RUST_LOG` already chose one.
fn configured_level(verbose: bool, rust_log_set: bool, config: &Config) -> Option<LevelFilter> {
    if verbose || rust_log_set {
        return None;
    }
    config.logging.log_level.parse().ok()
}

fn init_tracing(verbose: bool) -> FilterHandle {
    let env_level = std::env::var("MQTT_HMAC_LOG_LEVEL").ok();
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| level_filter(startup_level(verbose, env_level.as_deref())));
    let (filter, handle) = reload::Layer::new(filter);

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    handle
}

fn print_report<T: Serialize + std::fmt::Display>(report: &T, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
    } else {
        println!("{}", report);
    }
    Ok(())
}

fn init_config(path: &Path, force: bool) -> anyhow::Result<()> {
    if path.exists() && !force {
        anyhow::bail!(
            "Config file already exists at {} (use --force to overwrite)",
            path.display()
        );
    }

    Config::default().save(path)?;
    println!("Wrote default configuration to {}", path.display());
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing before the config so its events are not dropped
    let rust_log_set = std::env::var_os("RUST_LOG").is_some();
    let log_filter = init_tracing(cli.verbose);

    if let Commands::InitConfig { force } = cli.command {
        let path = cli.config.unwrap_or_else(default_config_path);
        return init_config(&path, force);
    }

    // Load configuration
    let mut config = if let Some(config_path) = &cli.config {
        Config::load(config_path)?
    } else {
        Config::load_default()?
    };

    // Apply environment variable overrides
    config.apply_env_overrides();

    // Validate configuration
    config.validate()?;

    if let Some(level) = configured_level(cli.verbose, rust_log_set, &config) {
        log_filter
            .reload(level_filter(level))
            .context("Failed to apply configured log level")?;
    }

    tracing::debug!("Loaded configuration: {:?}", config);

    let simulation = Simulation::from_config(&config)?;

    match cli.command {
        Commands::Integrity { json } => {
            let report = simulation.integrity(SAMPLE_READING)?;
            print_report(&report, json)?;
            if !report.passed() {
                std::process::exit(1);
            }
        }
        Commands::Overhead { json } => {
            let report = simulation.overhead(&config.overhead.payload_sizes)?;
            print_report(&report, json)?;
        }
        Commands::Latency { iterations, json } => {
            let iterations = config.latency_iterations(iterations)?;
            tracing::info!("Running {} iterations", iterations);
            let report = simulation.latency(LATENCY_PAYLOAD, iterations)?;
            print_report(&report, json)?;
        }
        Commands::Encode {
            topic,
            payload,
            header,
        } => {
            let fixed_header = match header {
                Some(byte) => FixedHeader::from_byte(byte),
                None => config.fixed_header()?,
            };
            let topic = topic.unwrap_or_else(|| config.link.topic.clone());
            let packet = Packet::new(fixed_header, topic, payload.into_bytes());
            let key = config.key()?;
            let frame = simulation
                .codec()
                .encode(&packet, Some(key.as_slice()))
                .context("Failed to encode packet")?;
            println!("{}", hex::encode(frame));
        }
        Commands::Decode {
            frame,
            no_verify,
            json,
        } => {
            let bytes = hex::decode(frame.trim()).context("Frame is not valid hex")?;
            let key = config.key()?;
            let key = if no_verify { None } else { Some(key.as_slice()) };
            let codec: &PacketCodec = simulation.codec();

            let packet = codec
                .decode(&bytes, key)
                .map_err(|e| anyhow::anyhow!("Rejected frame ({}): {}", describe_decode_error(&e), e))?;
            let decoded = DecodedFrame::new(packet, !no_verify);

            if json {
                println!("{}", serde_json::to_string_pretty(&decoded)?);
            } else {
                println!("Fixed header: 0x{:02x}", decoded.fixed_header);
                println!("Topic:        {}", decoded.topic);
                match &decoded.payload_text {
                    Some(text) => println!("Payload:      {}", text),
                    None => println!("Payload:      0x{}", decoded.payload_hex),
                }
                if let Some(signature) = &decoded.signature_hex {
                    println!("Signature:    {}", signature);
                }
                println!(
                    "Verified:     {}",
                    if decoded.verified { "yes" } else { "no (skipped)" }
                );
            }
        }
        // Handled before the config is loaded.
        Commands::InitConfig { .. } => {}
    }

    Ok(())
}
