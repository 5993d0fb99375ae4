//! Service configuration.
//!
//! Three layers, later wins:
//! 1. Built-in defaults
//! 2. Optional TOML file (`--config`)
//! 3. Command-line flags and their environment variables
//!
//! Layers are merged as JSON trees, deserialized once into [`AttestConfig`],
//! normalized, then validated. Any failure is fatal at startup.

mod defaults;
mod merge;
mod overrides;

use std::fmt;
use std::num::NonZeroU64;
use std::path::{Path, PathBuf};
use std::time::Duration;

use attest_playlist::is_contained_path;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use url::Url;

pub use defaults::*;
pub use merge::{deep_merge, merge_layers};
pub use overrides::ConfigOverrides;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("TOML parse error in {path}: {source}")]
    Toml {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid configuration: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid {field}: {reason}")]
    Invalid { field: &'static str, reason: String },

    #[error("no manifest sinks configured: set relays or manifest_dir")]
    NoSinks,
}

/// A secret value that never appears in `Debug` output or logs.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SecretString(String);

impl SecretString {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretString([redacted])")
    }
}

/// Effective configuration after merging all layers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AttestConfig {
    /// Directory holding one subdirectory per live stream
    pub root_dir: PathBuf,

    /// Base URL of the HLS origin server
    pub origin_url: String,

    /// Top-level playlist filename inside each stream directory
    pub top_playlist: String,

    /// Epoch length in milliseconds
    pub epoch_ms: u64,

    /// Pause between scan cycles
    pub scan_interval_ms: u64,

    /// Inactivity threshold for stream directories
    pub stale_after_ms: u64,

    /// Per-request playlist fetch timeout
    pub fetch_timeout_ms: u64,

    /// Bound on one publish attempt across all sinks
    pub publish_deadline_ms: u64,

    /// Relay WebSocket URLs
    pub relays: Vec<String>,

    /// Explicit signing secret
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signing_secret: Option<SecretString>,

    /// Legacy key file consulted when no secret is configured
    pub legacy_key_file: PathBuf,

    /// Directory for the file sink, if enabled
    #[serde(skip_serializing_if = "Option::is_none")]
    pub manifest_dir: Option<PathBuf>,

    /// Introspection server port
    pub http_port: u16,
}

impl AttestConfig {
    /// Build the effective configuration from all layers.
    pub fn load(file: Option<&Path>, overrides: &ConfigOverrides) -> Result<Self, ConfigError> {
        let mut layers = vec![serde_json::to_value(Self::default())?];
        if let Some(path) = file {
            layers.push(load_toml_layer(path)?);
        }
        layers.push(serde_json::to_value(overrides)?);

        let mut config: Self = serde_json::from_value(merge_layers(layers))?;
        config.normalize();
        config.validate()?;
        Ok(config)
    }

    /// Trim list and string values; drop blanks and duplicate relays.
    pub fn normalize(&mut self) {
        let mut relays: Vec<String> = Vec::with_capacity(self.relays.len());
        for relay in self.relays.iter().map(|r| r.trim()) {
            if !relay.is_empty() && !relays.iter().any(|r| r == relay) {
                relays.push(relay.to_string());
            }
        }
        self.relays = relays;

        self.top_playlist = self.top_playlist.trim().to_string();

        if let Some(secret) = &self.signing_secret {
            let trimmed = secret.expose().trim();
            self.signing_secret = if trimmed.is_empty() {
                None
            } else {
                Some(SecretString::new(trimmed))
            };
        }
    }

    /// Check every value the service depends on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let durations = [
            ("epoch_ms", self.epoch_ms),
            ("scan_interval_ms", self.scan_interval_ms),
            ("stale_after_ms", self.stale_after_ms),
            ("fetch_timeout_ms", self.fetch_timeout_ms),
            ("publish_deadline_ms", self.publish_deadline_ms),
        ];
        for (field, value) in durations {
            if value == 0 {
                return Err(invalid(field, "must be greater than zero"));
            }
        }

        let origin = Url::parse(&self.origin_url).map_err(|e| invalid("origin_url", e))?;
        if !matches!(origin.scheme(), "http" | "https") {
            return Err(invalid("origin_url", "scheme must be http or https"));
        }

        if !is_contained_path(&self.top_playlist) {
            return Err(invalid("top_playlist", "must be a relative file name"));
        }

        for relay in &self.relays {
            let url = Url::parse(relay).map_err(|e| invalid("relays", format!("{relay}: {e}")))?;
            if !matches!(url.scheme(), "ws" | "wss") {
                return Err(invalid("relays", format!("{relay}: scheme must be ws or wss")));
            }
        }

        if self.relays.is_empty() && self.manifest_dir.is_none() {
            return Err(ConfigError::NoSinks);
        }

        Ok(())
    }

    pub fn epoch_duration(&self) -> NonZeroU64 {
        NonZeroU64::new(self.epoch_ms).unwrap_or(NonZeroU64::MIN)
    }

    pub fn scan_interval(&self) -> Duration {
        Duration::from_millis(self.scan_interval_ms)
    }

    pub fn stale_after(&self) -> Duration {
        Duration::from_millis(self.stale_after_ms)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }

    pub fn publish_deadline(&self) -> Duration {
        Duration::from_millis(self.publish_deadline_ms)
    }
}

fn invalid(field: &'static str, reason: impl fmt::Display) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.to_string(),
    }
}

fn load_toml_layer(path: &Path) -> Result<Value, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let table: toml::Value = toml::from_str(&contents).map_err(|source| ConfigError::Toml {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(serde_json::to_value(table)?)
}
