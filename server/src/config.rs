//! Server configuration.

use clap::Parser;
use paybridge_router::registry::Registry;
use serde::Deserialize;
use std::fs;
use std::net::IpAddr;
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(name = "paybridge-server")]
#[command(about = "Cross-chain payment router HTTP server")]
struct CliArgs {
    /// Path to the JSON configuration file
    #[arg(long, short, env = "CONFIG", default_value = "config.json")]
    config: PathBuf,
}

/// Server configuration.
///
/// Fields use serde defaults that fall back to environment variables,
/// then to hardcoded defaults.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[serde(default = "config_defaults::default_port")]
    port: u16,
    #[serde(default = "config_defaults::default_host")]
    host: IpAddr,
    /// Lifetime of a `PENDING` payment.
    #[serde(default = "config_defaults::default_payment_ttl_secs")]
    payment_ttl_secs: u64,
    #[serde(default = "config_defaults::default_expiry_sweep_secs")]
    expiry_sweep_secs: u64,
    #[serde(default)]
    registry: Registry,
}

pub mod config_defaults {
    use paybridge_router::lifecycle::DEFAULT_PAYMENT_TTL_SECS;
    use std::env;
    use std::net::{IpAddr, Ipv4Addr};

    pub const DEFAULT_PORT: u16 = 8080;
    pub const DEFAULT_EXPIRY_SWEEP_SECS: u64 = 60;

    /// $PORT, then 8080.
    pub fn default_port() -> u16 {
        env::var("PORT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_PORT)
    }

    /// $HOST, then 0.0.0.0.
    pub fn default_host() -> IpAddr {
        env::var("HOST")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED))
    }

    pub fn default_payment_ttl_secs() -> u64 {
        DEFAULT_PAYMENT_TTL_SECS
    }

    pub fn default_expiry_sweep_secs() -> u64 {
        DEFAULT_EXPIRY_SWEEP_SECS
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {0}: {1}")]
    FileRead(PathBuf, std::io::Error),
    #[error("Failed to parse config file: {0}")]
    JsonParse(#[from] serde_json::Error),
    #[error("Invalid config: {0} must be greater than zero")]
    Zero(&'static str),
}

impl Config {
    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn host(&self) -> IpAddr {
        self.host
    }

    pub fn payment_ttl_secs(&self) -> u64 {
        self.payment_ttl_secs
    }

    pub fn expiry_sweep_secs(&self) -> u64 {
        self.expiry_sweep_secs
    }

    pub fn into_registry(self) -> Registry {
        self.registry
    }

    /// Loads the file named by `--config` (or `$CONFIG`, or `./config.json`).
    pub fn load() -> Result<Self, ConfigError> {
        let cli_args = CliArgs::parse();
        let config_path = Path::new(&cli_args.config)
            .canonicalize()
            .map_err(|e| ConfigError::FileRead(cli_args.config, e))?;
        Self::load_from_path(config_path)
    }

    fn load_from_path(path: PathBuf) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(&path).map_err(|e| ConfigError::FileRead(path, e))?;
        Self::from_json(&content)
    }

    fn from_json(content: &str) -> Result<Self, ConfigError> {
        let config: Config = serde_json::from_str(content)?;
        if config.payment_ttl_secs == 0 {
            return Err(ConfigError::Zero("paymentTtlSecs"));
        }
        if config.expiry_sweep_secs == 0 {
            return Err(ConfigError::Zero("expirySweepSecs"));
        }
        Ok(config)
    }
}
