//! Relay configuration.
//!
//! Read from the TOML file named by `ORB_RELAY_CONFIG`, or `./relay.toml`.
//! A missing file means defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use orb_relay_data_channel::{RelayConfig, SizeField, SizeHeaders};
use orb_relay_ingress::{IngressConfig, Variant};
use serde::Deserialize;

/// Environment variable overriding the configuration path.
pub const CONFIG_ENV: &str = "ORB_RELAY_CONFIG";

const DEFAULT_CONFIG_FILE: &str = "relay.toml";

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Upload endpoint variant (`single` or `dual`).
    #[serde(default)]
    pub variant: Variant,

    /// HTTP listen port.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Storage root for accepted uploads.
    #[serde(default = "default_upload_dir")]
    pub upload_dir: PathBuf,

    /// Downstream processing server `host:port`.
    #[serde(default = "default_downstream")]
    pub downstream: String,

    /// Cap on the whole request body in bytes.
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,

    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,

    #[serde(default = "default_write_timeout_secs")]
    pub write_timeout_secs: u64,

    /// `rounded` (zero-padded chunks) or `exact`.
    #[serde(default)]
    pub size_field: SizeField,

    /// `first_only` or `per_file`.
    #[serde(default)]
    pub size_headers: SizeHeaders,
}

fn default_port() -> u16 {
    8080
}

fn default_upload_dir() -> PathBuf {
    PathBuf::from(orb_relay_ingress::DEFAULT_UPLOAD_DIR)
}

fn default_downstream() -> String {
    orb_relay_data_channel::DEFAULT_DOWNSTREAM_ADDR.into()
}

fn default_max_upload_bytes() -> usize {
    orb_relay_ingress::DEFAULT_MAX_UPLOAD_BYTES
}

fn default_connect_timeout_secs() -> u64 {
    orb_relay_data_channel::DEFAULT_CONNECT_TIMEOUT.as_secs()
}

fn default_write_timeout_secs() -> u64 {
    orb_relay_data_channel::DEFAULT_WRITE_TIMEOUT.as_secs()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            variant: Variant::default(),
            port: default_port(),
            upload_dir: default_upload_dir(),
            downstream: default_downstream(),
            max_upload_bytes: default_max_upload_bytes(),
            connect_timeout_secs: default_connect_timeout_secs(),
            write_timeout_secs: default_write_timeout_secs(),
            size_field: SizeField::default(),
            size_headers: SizeHeaders::default(),
        }
    }
}

impl Config {
    /// Loads configuration from the configured path, or defaults if absent.
    pub fn load() -> anyhow::Result<Self> {
        Self::load_from(&config_path())
    }

    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            tracing::info!(path = %path.display(), "no configuration file, using defaults");
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        tracing::debug!(path = %path.display(), "configuration read");
        Ok(config)
    }

    /// Settings for the ingress router.
    pub fn ingress(&self) -> IngressConfig {
        IngressConfig {
            variant: self.variant,
            upload_dir: self.upload_dir.clone(),
            relay: RelayConfig {
                addr: self.downstream.clone(),
                connect_timeout: Duration::from_secs(self.connect_timeout_secs),
                write_timeout: Duration::from_secs(self.write_timeout_secs),
                size_field: self.size_field,
                size_headers: self.size_headers,
            },
            max_upload_bytes: self.max_upload_bytes,
        }
    }
}

fn config_path() -> PathBuf {
    std::env::var_os(CONFIG_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE))
}
