//! Service configuration
//!
//! Everything the coordinator needs at process start: the two shutdown
//! timeouts, opaque SDK connect parameters, optional per-plugin sub-configs and
//! the LNURL-pay presentation text. Supplied by the host as a struct or JSON.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Hard service timeout, measured from the last trigger.
pub const DEFAULT_SERVICE_TIMEOUT_MS: u64 = 180_000;

/// Grace period after the last job finishes.
pub const DEFAULT_EMPTY_DELAY_MS: u64 = 60_000;

// ============================================================================
// ERROR TYPES
// ============================================================================

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid timeout: {0} must be greater than zero")]
    InvalidTimeout(&'static str),

    #[error("Invalid connection config: {0}")]
    InvalidConnection(String),

    #[error("Invalid plugin config: {0}")]
    InvalidPlugin(String),

    #[error("Malformed config: {0}")]
    Malformed(String),
}

// ============================================================================
// TIMEOUTS
// ============================================================================

/// The two independent shutdown timers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShutdownTimeouts {
    /// Forced shutdown deadline, re-armed by every trigger
    pub service_timeout_ms: u64,
    /// Delay before shutdown once the job set becomes empty
    pub empty_delay_ms: u64,
}

impl ShutdownTimeouts {
    pub fn service_timeout(&self) -> Duration {
        Duration::from_millis(self.service_timeout_ms)
    }

    pub fn empty_delay(&self) -> Duration {
        Duration::from_millis(self.empty_delay_ms)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.service_timeout_ms == 0 {
            return Err(ConfigError::InvalidTimeout("service_timeout_ms"));
        }
        if self.empty_delay_ms == 0 {
            return Err(ConfigError::InvalidTimeout("empty_delay_ms"));
        }
        Ok(())
    }
}

impl Default for ShutdownTimeouts {
    fn default() -> Self {
        Self {
            service_timeout_ms: DEFAULT_SERVICE_TIMEOUT_MS,
            empty_delay_ms: DEFAULT_EMPTY_DELAY_MS,
        }
    }
}

// ============================================================================
// CONNECTION
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    #[default]
    Mainnet,
    Testnet,
    Regtest,
}

impl std::fmt::Display for Network {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Mainnet => write!(f, "mainnet"),
            Self::Testnet => write!(f, "testnet"),
            Self::Regtest => write!(f, "regtest"),
        }
    }
}

impl std::str::FromStr for Network {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "mainnet" => Ok(Self::Mainnet),
            "testnet" => Ok(Self::Testnet),
            "regtest" => Ok(Self::Regtest),
            other => Err(ConfigError::InvalidConnection(format!(
                "unknown network '{}'",
                other
            ))),
        }
    }
}

/// Connect parameters handed through to the wallet SDK untouched
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionConfig {
    pub network: Network,
    /// SDK data directory
    pub working_dir: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

impl ConnectionConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.working_dir.trim().is_empty() {
            return Err(ConfigError::InvalidConnection(
                "working_dir cannot be empty".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            network: Network::Mainnet,
            working_dir: "./wallet-data".to_string(),
            api_key: None,
        }
    }
}

// ============================================================================
// PLUGINS
// ============================================================================

/// Nostr Wallet Connect relay plugin settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NwcConfig {
    pub relay_urls: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_key: Option<String>,
}

/// Optional per-kind plugin sub-configs. A kind without one never starts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PluginConfigs {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nwc: Option<NwcConfig>,
}

impl PluginConfigs {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(nwc) = &self.nwc {
            if nwc.relay_urls.is_empty() {
                return Err(ConfigError::InvalidPlugin(
                    "nwc.relay_urls cannot be empty".to_string(),
                ));
            }
        }
        Ok(())
    }
}

// ============================================================================
// LNURL
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LnurlConfig {
    /// `text/plain` metadata entry and invoice description
    pub description: String,
}

impl Default for LnurlConfig {
    fn default() -> Self {
        Self {
            description: "Pay with Lightning".to_string(),
        }
    }
}

// ============================================================================
// SERVICE CONFIG
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceConfig {
    #[serde(default)]
    pub timeouts: ShutdownTimeouts,
    #[serde(default)]
    pub connection: ConnectionConfig,
    #[serde(default)]
    pub plugins: PluginConfigs,
    #[serde(default)]
    pub lnurl: LnurlConfig,
}

impl ServiceConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.timeouts.validate()?;
        self.connection.validate()?;
        self.plugins.validate()?;
        Ok(())
    }

    /// Parse and validate a JSON config
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| ConfigError::Malformed(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String, ConfigError> {
        serde_json::to_string_pretty(self).map_err(|e| ConfigError::Malformed(e.to_string()))
    }
}
