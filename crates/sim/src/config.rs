//! Simulation settings.
//!
//! Read from `<config_dir>/mqtt-hmac/config.toml` unless `--config` names
//! another file. A missing file means defaults; `MQTT_HMAC_*` variables win
//! over both.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use mqtt_hmac_protocol::{
    Authenticator, FixedHeader, HashAlgorithm, HmacSha, PacketCodec, MAX_TOPIC_LEN,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("key must not be empty")]
    EmptyKey,

    #[error("key_hex is not valid hex: {0}")]
    InvalidKeyHex(String),

    #[error("topic must be at most 65535 bytes, got {0}")]
    TopicTooLong(usize),

    #[error("fixed_header must be between 0 and 255, got {0}")]
    InvalidFixedHeader(u32),

    #[error("hash must be one of: sha224, sha256, sha384, sha512; got {0}")]
    UnknownHash(String),

    #[error("iterations must be between 1 and 1000000, got {0}")]
    InvalidIterations(usize),

    #[error("payload_sizes must not be empty")]
    EmptyPayloadSizes,

    #[error("log_level must be one of: trace, debug, info, warn, error; got {0}")]
    InvalidLogLevel(String),
}

/// Valid log level values for tracing configuration.
const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Upper bound on latency iterations.
pub const MAX_ITERATIONS: usize = 1_000_000;

/// Main configuration structure for the simulations.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    /// Shared link settings: key, topic, header and hash.
    pub link: LinkConfig,

    /// Overhead analysis settings.
    pub overhead: OverheadConfig,

    /// Latency benchmark settings.
    pub latency: LatencyConfig,

    /// Logging settings.
    pub logging: LoggingConfig,
}

/// Settings shared by both ends of the simulated link.
#[derive(Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LinkConfig {
    /// Pre-shared secret key, used as its UTF-8 bytes.
    pub key: String,

    /// Pre-shared secret key as hex. Takes precedence over `key`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_hex: Option<String>,

    /// Topic used for simulated packets.
    pub topic: String,

    /// Fixed header byte (48 = 0x30, PUBLISH).
    pub fixed_header: u32,

    /// Hash algorithm for HMAC (sha224, sha256, sha384, sha512).
    pub hash: String,
}

/// Overhead analysis settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OverheadConfig {
    /// Payload sizes to measure, in bytes.
    pub payload_sizes: Vec<usize>,
}

/// Latency benchmark settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LatencyConfig {
    /// Number of sign and verify iterations.
    pub iterations: usize,
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Logging level (trace, debug, info, warn, error).
    pub log_level: String,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            key: "super-secret-key-2024".to_string(),
            key_hex: None,
            topic: "industrial/sensor/pressure".to_string(),
            fixed_header: FixedHeader::PUBLISH.as_byte().into(),
            hash: HashAlgorithm::default().to_string(),
        }
    }
}

impl std::fmt::Debug for LinkConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LinkConfig")
            .field("key", &"[REDACTED]")
            .field("key_hex", &self.key_hex.as_ref().map(|_| "[REDACTED]"))
            .field("topic", &self.topic)
            .field("fixed_header", &self.fixed_header)
            .field("hash", &self.hash)
            .finish()
    }
}

impl Default for OverheadConfig {
    fn default() -> Self {
        Self {
            payload_sizes: vec![10, 50, 100, 500, 1024],
        }
    }
}

impl Default for LatencyConfig {
    fn default() -> Self {
        Self { iterations: 10_000 }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

/// Returns the default configuration file path.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("mqtt-hmac")
        .join("config.toml")
}

impl Config {
    /// Apply environment variable overrides to the configuration.
    ///
    /// Environment variables take precedence over config file values.
    /// Supported variables:
    /// - MQTT_HMAC_KEY: Override the shared key
    /// - MQTT_HMAC_KEY_HEX: Override the shared key with hex-encoded bytes
    /// - MQTT_HMAC_HASH: Override the hash algorithm
    /// - MQTT_HMAC_LOG_LEVEL: Override log level (trace, debug, info, warn, error)
    pub fn apply_env_overrides(&mut self) {
        if let Ok(key) = std::env::var("MQTT_HMAC_KEY") {
            if !key.is_empty() {
                tracing::info!("Overriding key from environment");
                self.link.key = key;
            }
        }

        if let Ok(key_hex) = std::env::var("MQTT_HMAC_KEY_HEX") {
            if !key_hex.is_empty() {
                tracing::info!("Overriding key_hex from environment");
                self.link.key_hex = Some(key_hex);
            }
        }

        if let Ok(hash) = std::env::var("MQTT_HMAC_HASH") {
            if !hash.is_empty() {
                tracing::info!("Overriding hash from environment: {}", hash);
                self.link.hash = hash;
            }
        }

        if let Ok(level) = std::env::var("MQTT_HMAC_LOG_LEVEL") {
            if !level.is_empty() {
                tracing::info!("Overriding log_level from environment: {}", level);
                self.logging.log_level = level;
            }
        }
    }

    /// Validate the configuration values.
    ///
    /// Returns an error if any configuration value is outside the valid range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.key()?.is_empty() {
            return Err(ConfigError::EmptyKey);
        }

        if self.link.topic.len() > MAX_TOPIC_LEN {
            return Err(ConfigError::TopicTooLong(self.link.topic.len()));
        }

        self.fixed_header()?;
        self.hash_algorithm()?;

        self.latency_iterations(None)?;

        if self.overhead.payload_sizes.is_empty() {
            return Err(ConfigError::EmptyPayloadSizes);
        }

        let level = self.logging.log_level.to_lowercase();
        if !VALID_LOG_LEVELS.contains(&level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(
                self.logging.log_level.clone(),
            ));
        }

        Ok(())
    }

    /// The shared key as bytes, decoded from `key_hex` when set.
    pub fn key(&self) -> Result<Vec<u8>, ConfigError> {
        match &self.link.key_hex {
            Some(key_hex) => hex::decode(key_hex.trim())
                .map_err(|e| ConfigError::InvalidKeyHex(e.to_string())),
            None => Ok(self.link.key.as_bytes().to_vec()),
        }
    }

    /// Latency iteration count, preferring `requested` over the file value.
    pub fn latency_iterations(&self, requested: Option<usize>) -> Result<usize, ConfigError> {
        let iterations = requested.unwrap_or(self.latency.iterations);
        if (1..=MAX_ITERATIONS).contains(&iterations) {
            Ok(iterations)
        } else {
            Err(ConfigError::InvalidIterations(iterations))
        }
    }

    /// The configured fixed header, checked to fit in one byte.
    pub fn fixed_header(&self) -> Result<FixedHeader, ConfigError> {
        FixedHeader::try_from(self.link.fixed_header)
            .map_err(|_| ConfigError::InvalidFixedHeader(self.link.fixed_header))
    }

    /// The configured hash algorithm.
    pub fn hash_algorithm(&self) -> Result<HashAlgorithm, ConfigError> {
        self.link
            .hash
            .parse()
            .map_err(|_| ConfigError::UnknownHash(self.link.hash.clone()))
    }

    /// Authenticator for the configured hash algorithm.
    pub fn authenticator(&self) -> Result<Arc<dyn Authenticator>, ConfigError> {
        Ok(Arc::new(HmacSha::new(self.hash_algorithm()?)))
    }

    /// Packet codec using the configured authenticator.
    pub fn codec(&self) -> Result<PacketCodec, ConfigError> {
        Ok(PacketCodec::from_shared(self.authenticator()?))
    }

    /// Read settings from `path`; a file that does not exist yields defaults.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        match fs::read_to_string(path) {
            Ok(contents) => Self::from_toml(&contents)
                .with_context(|| format!("Bad simulation config {}", path.display())),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                tracing::debug!("No config at {}, using defaults", path.display());
                Ok(Self::default())
            }
            Err(e) => Err(e).with_context(|| format!("Cannot read {}", path.display())),
        }
    }

    /// [`Config::load`] from [`default_config_path`].
    pub fn load_default() -> Result<Self> {
        Self::load(default_config_path())
    }

    pub fn from_toml(toml_str: &str) -> Result<Self> {
        toml::from_str(toml_str).map_err(|e| {
            let at = e
                .span()
                .map(|span| format!(" at byte {}", span.start))
                .unwrap_or_default();
            anyhow::anyhow!("Invalid TOML{}: {}", at, e.message())
        })
    }

    /// Write these settings to `path`, creating missing parent directories.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();

        if let Some(dir) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            fs::create_dir_all(dir)
                .with_context(|| format!("Cannot create {}", dir.display()))?;
        }

        fs::write(path, self.to_toml()?)
            .with_context(|| format!("Cannot write {}", path.display()))?;
        tracing::debug!("Wrote simulation config to {}", path.display());
        Ok(())
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Cannot serialize simulation config")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::io::Write;
    use std::sync::Mutex;
    use tempfile::TempDir;

    #[derive(Clone, Default)]
    struct LogBuffer(Arc<Mutex<Vec<u8>>>);

    impl Write for LogBuffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    /// Run `f` under a debug-level subscriber and return what it logged.
    fn capture_logs(f: impl FnOnce()) -> String {
        let buffer = LogBuffer::default();
        let writer = buffer.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();

        tracing::subscriber::with_default(subscriber, f);

        let bytes = buffer.0.lock().unwrap().clone();
        String::from_utf8(bytes).unwrap()
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert_eq!(config.link.key, "super-secret-key-2024");
        assert_eq!(config.link.topic, "industrial/sensor/pressure");
        assert_eq!(config.link.fixed_header, 0x30);
        assert_eq!(config.link.hash, "sha256");
        assert_eq!(config.overhead.payload_sizes, vec![10, 50, 100, 500, 1024]);
        assert_eq!(config.latency.iterations, 10_000);
        assert_eq!(config.logging.log_level, "info");
    }

    #[test]
    fn test_default_config_is_valid() {
        assert_eq!(Config::default().validate(), Ok(()));
    }

    #[test]
    fn test_from_toml_empty() {
        let config = Config::from_toml("").unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_from_toml_partial() {
        let toml = r#"
[link]
hash = "sha512"

[latency]
iterations = 500
"#;
        let config = Config::from_toml(toml).unwrap();

        assert_eq!(config.link.hash, "sha512");
        assert_eq!(config.latency.iterations, 500);
        // Other values should be defaults
        assert_eq!(config.link.topic, "industrial/sensor/pressure");
        assert_eq!(config.logging.log_level, "info");
    }

    #[test]
    fn test_from_toml_full() {
        let toml = r#"
[link]
key = "k"
topic = "sensors/data"
fixed_header = 49
hash = "sha384"

[overhead]
payload_sizes = [1, 2, 3]

[latency]
iterations = 42

[logging]
log_level = "trace"
"#;
        let config = Config::from_toml(toml).unwrap();

        assert_eq!(config.key().unwrap(), b"k");
        assert_eq!(config.link.topic, "sensors/data");
        assert_eq!(config.fixed_header().unwrap().as_byte(), 0x31);
        assert_eq!(config.hash_algorithm().unwrap(), HashAlgorithm::Sha384);
        assert_eq!(config.overhead.payload_sizes, vec![1, 2, 3]);
        assert_eq!(config.latency.iterations, 42);
        assert_eq!(config.logging.log_level, "trace");
        assert_eq!(config.validate(), Ok(()));
    }

    #[test]
    fn test_from_toml_invalid_syntax() {
        let toml = r#"
[link
key = "k"
"#;
        let err = Config::from_toml(toml).unwrap_err().to_string();
        assert!(err.contains("Invalid TOML"));
    }

    #[test]
    fn test_from_toml_wrong_type() {
        let toml = r#"
[latency]
iterations = "many"
"#;
        assert!(Config::from_toml(toml).is_err());
    }

    #[test]
    fn test_validate_empty_key() {
        let mut config = Config::default();
        config.link.key.clear();
        assert_eq!(config.validate(), Err(ConfigError::EmptyKey));
    }

    #[test]
    fn test_validate_fixed_header_out_of_range() {
        let mut config = Config::default();
        config.link.fixed_header = 256;
        assert_eq!(config.validate(), Err(ConfigError::InvalidFixedHeader(256)));
    }

    #[test]
    fn test_validate_unknown_hash() {
        let mut config = Config::default();
        config.link.hash = "md5".to_string();
        assert_eq!(
            config.validate(),
            Err(ConfigError::UnknownHash("md5".to_string()))
        );
    }

    #[test]
    fn test_validate_topic_too_long() {
        let mut config = Config::default();
        config.link.topic = "t".repeat(MAX_TOPIC_LEN + 1);
        assert_eq!(
            config.validate(),
            Err(ConfigError::TopicTooLong(MAX_TOPIC_LEN + 1))
        );
    }

    #[test]
    fn test_validate_iterations_bounds() {
        let mut config = Config::default();
        config.latency.iterations = 0;
        assert_eq!(config.validate(), Err(ConfigError::InvalidIterations(0)));

        config.latency.iterations = MAX_ITERATIONS + 1;
        assert_eq!(
            config.validate(),
            Err(ConfigError::InvalidIterations(MAX_ITERATIONS + 1))
        );

        config.latency.iterations = MAX_ITERATIONS;
        assert_eq!(config.validate(), Ok(()));
    }

    #[test]
    fn test_validate_empty_payload_sizes() {
        let mut config = Config::default();
        config.overhead.payload_sizes.clear();
        assert_eq!(config.validate(), Err(ConfigError::EmptyPayloadSizes));
    }

    #[test]
    fn test_validate_log_level() {
        let mut config = Config::default();
        config.logging.log_level = "verbose".to_string();
        assert_eq!(
            config.validate(),
            Err(ConfigError::InvalidLogLevel("verbose".to_string()))
        );

        config.logging.log_level = "DEBUG".to_string();
        assert_eq!(config.validate(), Ok(()));
    }

    #[test]
    fn test_codec_uses_configured_hash() {
        let mut config = Config::default();
        config.link.hash = "sha512".to_string();

        let codec = config.codec().unwrap();
        assert_eq!(codec.authenticator().name(), "hmac-sha512");
        assert_eq!(codec.authenticator().output_size(), 64);
    }

    #[test]
    fn test_link_debug_redacts_key() {
        let config = Config::default();
        let debug = format!("{:?}", config.link);
        assert!(debug.contains("REDACTED"));
        assert!(!debug.contains("super-secret-key-2024"));
    }

    #[test]
    fn test_roundtrip() {
        let original = Config::default();
        let toml = original.to_toml().unwrap();
        let loaded = Config::from_toml(&toml).unwrap();

        assert_eq!(original, loaded);
    }

    #[test]
    fn test_to_toml_sections() {
        let toml = Config::default().to_toml().unwrap();

        assert!(toml.contains("[link]"));
        assert!(toml.contains("[overhead]"));
        assert!(toml.contains("[latency]"));
        assert!(toml.contains("[logging]"));
    }

    #[test]
    fn test_load_missing_file() {
        let config = Config::load("/nonexistent/path/config.toml").unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_save_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.toml");

        let mut original = Config::default();
        original.link.topic = "sensors/data".to_string();
        original.latency.iterations = 15;

        original.save(&config_path).unwrap();
        let loaded = Config::load(&config_path).unwrap();

        assert_eq!(original, loaded);
    }

    #[test]
    fn test_save_creates_directories() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir
            .path()
            .join("nested")
            .join("dirs")
            .join("config.toml");

        Config::default().save(&config_path).unwrap();

        assert!(config_path.exists());
    }

    #[test]
    fn test_load_invalid_file() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.toml");

        fs::write(&config_path, "invalid [ toml").unwrap();

        let err = Config::load(&config_path).unwrap_err().to_string();
        assert!(err.contains("Bad simulation config"));
    }

    #[test]
    fn test_default_config_path() {
        let path = default_config_path();
        assert!(path.to_string_lossy().contains("mqtt-hmac"));
        assert!(path.to_string_lossy().contains("config.toml"));
    }

    #[test]
    #[serial]
    fn test_env_override_key_and_hash() {
        std::env::set_var("MQTT_HMAC_KEY", "env-key");
        std::env::set_var("MQTT_HMAC_HASH", "sha224");

        let mut config = Config::default();
        config.apply_env_overrides();

        assert_eq!(config.key().unwrap(), b"env-key");
        assert_eq!(config.hash_algorithm().unwrap(), HashAlgorithm::Sha224);

        std::env::remove_var("MQTT_HMAC_KEY");
        std::env::remove_var("MQTT_HMAC_HASH");
    }

    #[test]
    #[serial]
    fn test_env_override_log_level() {
        std::env::set_var("MQTT_HMAC_LOG_LEVEL", "warn");

        let mut config = Config::default();
        config.apply_env_overrides();
        assert_eq!(config.logging.log_level, "warn");

        std::env::remove_var("MQTT_HMAC_LOG_LEVEL");
    }

    #[test]
    #[serial]
    fn test_env_override_empty_does_not_override() {
        std::env::set_var("MQTT_HMAC_KEY", "");

        let mut config = Config::default();
        config.apply_env_overrides();
        assert_eq!(config.link.key, "super-secret-key-2024");

        std::env::remove_var("MQTT_HMAC_KEY");
    }

    #[test]
    fn test_key_hex_takes_precedence() {
        let toml = r#"
[link]
key = "ignored"
key_hex = "00ff10"
"#;
        let config = Config::from_toml(toml).unwrap();

        assert_eq!(config.key().unwrap(), vec![0x00, 0xff, 0x10]);
        assert_eq!(config.validate(), Ok(()));
    }

    #[test]
    fn test_key_hex_invalid() {
        let mut config = Config::default();
        config.link.key_hex = Some("zz".to_string());

        assert!(matches!(config.key(), Err(ConfigError::InvalidKeyHex(_))));
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidKeyHex(_))
        ));
    }

    #[test]
    fn test_key_hex_empty_is_empty_key() {
        let mut config = Config::default();
        config.link.key_hex = Some(String::new());
        assert_eq!(config.validate(), Err(ConfigError::EmptyKey));
    }

    #[test]
    fn test_key_hex_not_written_when_unset() {
        let toml = Config::default().to_toml().unwrap();
        assert!(!toml.contains("key_hex"));
    }

    #[test]
    fn test_link_debug_redacts_key_hex() {
        let mut config = Config::default();
        config.link.key_hex = Some("deadbeef".to_string());

        let debug = format!("{:?}", config.link);
        assert!(!debug.contains("deadbeef"));
    }

    #[test]
    fn test_latency_iterations() {
        let config = Config::default();

        assert_eq!(config.latency_iterations(None), Ok(10_000));
        assert_eq!(config.latency_iterations(Some(7)), Ok(7));
        assert_eq!(config.latency_iterations(Some(MAX_ITERATIONS)), Ok(MAX_ITERATIONS));
        assert_eq!(
            config.latency_iterations(Some(0)),
            Err(ConfigError::InvalidIterations(0))
        );
        assert_eq!(
            config.latency_iterations(Some(usize::MAX)),
            Err(ConfigError::InvalidIterations(usize::MAX))
        );
    }

    #[test]
    #[serial]
    fn test_env_override_key_hex() {
        std::env::set_var("MQTT_HMAC_KEY_HEX", "0102");

        let mut config = Config::default();
        config.apply_env_overrides();
        assert_eq!(config.key().unwrap(), vec![1, 2]);

        std::env::remove_var("MQTT_HMAC_KEY_HEX");
    }

    #[test]
    #[serial]
    fn test_env_overrides_are_logged() {
        std::env::set_var("MQTT_HMAC_KEY", "env-key");
        std::env::set_var("MQTT_HMAC_HASH", "sha512");

        let mut config = Config::default();
        let logs = capture_logs(|| config.apply_env_overrides());

        std::env::remove_var("MQTT_HMAC_KEY");
        std::env::remove_var("MQTT_HMAC_HASH");

        assert!(logs.contains("Overriding key from environment"));
        assert!(logs.contains("Overriding hash from environment: sha512"));
        assert!(!logs.contains("env-key"));
    }

    #[test]
    fn test_load_missing_file_is_logged() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("absent.toml");

        let logs = capture_logs(|| {
            Config::load(&path).unwrap();
        });
        assert!(logs.contains("using defaults"));
    }
}
