// Configuration management for the walletnotify simulator
//
// Stored as JSON in the platform config dir:
// - macOS: ~/Library/Application Support/walletnotify/config.json
// - Linux: ~/.config/walletnotify/config.json
// - Windows: %APPDATA%\walletnotify\config.json

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use walletnotify_core::{CredentialStore, Credentials, Network, NwcConfig, ServiceConfig};

pub const MNEMONIC_ENV: &str = "WALLETNOTIFY_MNEMONIC";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Passed to the coordinator as is
    pub service: ServiceConfig,

    /// Wallet seed; `WALLETNOTIFY_MNEMONIC` takes precedence
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mnemonic: Option<String>,

    /// Behaviour of the simulated wallet SDK
    pub simulator: SimulatorConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulatorConfig {
    /// Delay between a sync and the settlement of `settle_swaps`
    pub settle_delay_ms: u64,

    /// Swap ids reported as succeeded after each sync
    pub settle_swaps: Vec<String>,

    pub settle_amount_sat: u64,

    pub min_receive_sat: u64,

    pub max_receive_sat: u64,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            settle_delay_ms: 2_000,
            settle_swaps: Vec::new(),
            settle_amount_sat: 25_000,
            min_receive_sat: 1_000,
            max_receive_sat: 4_000_000,
        }
    }
}

impl Config {
    pub fn config_dir() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Failed to determine config directory")?
            .join("walletnotify");

        std::fs::create_dir_all(&config_dir).context("Failed to create config directory")?;

        Ok(config_dir)
    }

    pub fn config_file() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.json"))
    }

    /// Load from the default location, falling back to defaults
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_file()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let config: Config = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        config
            .service
            .validate()
            .context("Invalid service configuration")?;
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_file()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        let contents = serde_json::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(path, contents)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(())
    }

    pub fn credential_store(&self) -> CliCredentials {
        CliCredentials {
            fallback: self.mnemonic.clone(),
        }
    }

    /// Set a config value (does not save)
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        match key {
            "service_timeout_ms" => {
                self.service.timeouts.service_timeout_ms =
                    value.parse().context("Invalid number")?;
            }
            "empty_delay_ms" => {
                self.service.timeouts.empty_delay_ms = value.parse().context("Invalid number")?;
            }
            "network" => {
                self.service.connection.network = value.parse::<Network>()?;
            }
            "working_dir" => {
                self.service.connection.working_dir = value.to_string();
            }
            "api_key" => {
                self.service.connection.api_key = non_empty(value);
            }
            "lnurl_description" => {
                self.service.lnurl.description = value.to_string();
            }
            "nwc_relays" => {
                let relay_urls = split_list(value);
                self.service.plugins.nwc = if relay_urls.is_empty() {
                    None
                } else {
                    let secret_key = self.service.plugins.nwc.take().and_then(|n| n.secret_key);
                    Some(NwcConfig {
                        relay_urls,
                        secret_key,
                    })
                };
            }
            "mnemonic" => {
                self.mnemonic = non_empty(value);
            }
            "settle_delay_ms" => {
                self.simulator.settle_delay_ms = value.parse().context("Invalid number")?;
            }
            "settle_swaps" => {
                self.simulator.settle_swaps = split_list(value);
            }
            "settle_amount_sat" => {
                self.simulator.settle_amount_sat = value.parse().context("Invalid number")?;
            }
            _ => anyhow::bail!("Unknown config key: {}", key),
        }
        self.service
            .validate()
            .context("Value rejected by service configuration")?;
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<String> {
        match key {
            "service_timeout_ms" => Some(self.service.timeouts.service_timeout_ms.to_string()),
            "empty_delay_ms" => Some(self.service.timeouts.empty_delay_ms.to_string()),
            "network" => Some(self.service.connection.network.to_string()),
            "working_dir" => Some(self.service.connection.working_dir.clone()),
            "api_key" => self.service.connection.api_key.clone(),
            "lnurl_description" => Some(self.service.lnurl.description.clone()),
            "nwc_relays" => self
                .service
                .plugins
                .nwc
                .as_ref()
                .map(|n| n.relay_urls.join(",")),
            "mnemonic" => self.mnemonic.as_ref().map(|_| "(set)".to_string()),
            "settle_delay_ms" => Some(self.simulator.settle_delay_ms.to_string()),
            "settle_swaps" => Some(self.simulator.settle_swaps.join(",")),
            "settle_amount_sat" => Some(self.simulator.settle_amount_sat.to_string()),
            _ => None,
        }
    }

    pub fn list(&self) -> Vec<(&'static str, String)> {
        const KEYS: [&str; 11] = [
            "service_timeout_ms",
            "empty_delay_ms",
            "network",
            "working_dir",
            "api_key",
            "lnurl_description",
            "nwc_relays",
            "mnemonic",
            "settle_delay_ms",
            "settle_swaps",
            "settle_amount_sat",
        ];
        KEYS.iter()
            .map(|key| {
                (
                    *key,
                    self.get(key).unwrap_or_else(|| "(unset)".to_string()),
                )
            })
            .collect()
    }
}

/// Resolves the mnemonic when the coordinator connects: env var first, then
/// the config file.
pub struct CliCredentials {
    fallback: Option<String>,
}

impl CredentialStore for CliCredentials {
    fn load(&self) -> Result<Option<Credentials>, String> {
        let mnemonic = std::env::var(MNEMONIC_ENV)
            .ok()
            .filter(|m| !m.trim().is_empty())
            .or_else(|| self.fallback.clone());
        Ok(mnemonic.map(Credentials::new))
    }
}

fn non_empty(value: &str) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
