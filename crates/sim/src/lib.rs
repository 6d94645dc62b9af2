//! mqtt-hmac simulation harness
//!
//! Drives the packet codec from [`mqtt_hmac_protocol`] over a simulated
//! sensor link:
//!
//! - [`config`]: TOML configuration with environment overrides
//! - [`scenarios`]: integrity, overhead and latency simulations

pub mod config;
pub mod scenarios;

pub use config::{default_config_path, Config, ConfigError};
pub use scenarios::{IntegrityReport, LatencyReport, OverheadReport, OverheadRow, Simulation};
