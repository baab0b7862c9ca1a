use crate::config::{find_network_by_chain_id, Config, DEFAULT_CHAIN_ID, DEFAULT_MAX_POLL_ATTEMPTS, DEFAULT_POLL_INTERVAL_SECS};
use crate::gas::GasPriceMode;
use crate::utils;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

const SETTINGS_FILE: &str = "spray_settings.json";

/// Defaults that persist between runs. Never holds keys or transaction history.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Settings {
    /// Selected network chain ID
    #[serde(default = "default_chain_id")]
    pub selected_chain_id: u64,
    /// Custom RPC overrides per chain ID
    #[serde(default)]
    pub custom_rpcs: HashMap<u64, String>,
    /// Transfer amount in ether (decimal string); None means the built-in default
    #[serde(default)]
    pub transfer_amount: Option<String>,
    #[serde(default)]
    pub gas_price_mode: GasPriceMode,
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    #[serde(default = "default_max_poll_attempts")]
    pub max_poll_attempts: u32,
}

fn default_chain_id() -> u64 {
    DEFAULT_CHAIN_ID
}

fn default_poll_interval_secs() -> u64 {
    DEFAULT_POLL_INTERVAL_SECS
}

fn default_max_poll_attempts() -> u32 {
    DEFAULT_MAX_POLL_ATTEMPTS
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            selected_chain_id: default_chain_id(),
            custom_rpcs: HashMap::new(),
            transfer_amount: None,
            gas_price_mode: GasPriceMode::default(),
            poll_interval_secs: default_poll_interval_secs(),
            max_poll_attempts: default_max_poll_attempts(),
        }
    }
}

impl Settings {
    /// Get the settings file path
    pub fn settings_path() -> PathBuf {
        // Try to use the app data directory, fall back to current directory
        if let Some(config_dir) = dirs::config_dir() {
            config_dir.join("spray").join(SETTINGS_FILE)
        } else {
            PathBuf::from(SETTINGS_FILE)
        }
    }

    /// Load settings from `path`; a missing or unreadable file yields defaults.
    pub fn load_from(path: &Path) -> Self {
        if path.exists() {
            match fs::read_to_string(path) {
                Ok(content) => match serde_json::from_str(&content) {
                    Ok(settings) => {
                        tracing::info!("Loaded settings from {:?}", path);
                        return settings;
                    }
                    Err(e) => {
                        tracing::warn!("Failed to parse settings file: {}", e);
                    }
                },
                Err(e) => {
                    tracing::warn!("Failed to read settings file: {}", e);
                }
            }
        }
        tracing::info!("Using default settings");
        Self::default()
    }

    /// Remember the effective values of `config` for the next run. The RPC is
    /// stored as a custom endpoint only when it differs from the chain's default.
    pub fn update_from(&mut self, config: &Config) {
        self.selected_chain_id = config.chain_id;
        let is_default_rpc = find_network_by_chain_id(config.chain_id)
            .map(|n| n.default_rpc == config.rpc_url)
            .unwrap_or(false);
        if !is_default_rpc {
            self.set_custom_rpc(config.chain_id, config.rpc_url.clone());
        }
        self.transfer_amount = Some(utils::format_ether(config.transfer_value));
        self.gas_price_mode = config.gas_price_mode;
        self.poll_interval_secs = config.poll_interval.as_secs();
        self.max_poll_attempts = config.max_poll_attempts;
    }

    /// Write settings to `path`, creating parent directories as needed
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        tracing::info!("Saved settings to {:?}", path);
        Ok(())
    }

    /// Get custom RPC for a chain, or None if using default
    pub fn get_custom_rpc(&self, chain_id: u64) -> Option<&String> {
        self.custom_rpcs.get(&chain_id).filter(|s| !s.is_empty())
    }

    /// Set custom RPC for a chain (empty string removes the override)
    pub fn set_custom_rpc(&mut self, chain_id: u64, rpc: String) {
        if rpc.trim().is_empty() {
            self.custom_rpcs.remove(&chain_id);
        } else {
            self.custom_rpcs.insert(chain_id, rpc.trim().to_string());
        }
    }
}
