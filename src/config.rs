use crate::gas::GasPriceMode;
use crate::settings::Settings;
use crate::utils;
use anyhow::Result;
use ethers::providers::{Http, Provider};
use ethers::types::U256;
use std::collections::HashMap;
use std::env;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Transfer amount used when nothing else is configured, in ether.
pub const DEFAULT_TRANSFER_AMOUNT: &str = "0.3";

/// Seconds between receipt polls.
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 5;

/// Receipt polls before a transaction is reported as timed out.
pub const DEFAULT_MAX_POLL_ATTEMPTS: u32 = 30;

/// Chain used when neither settings nor environment pick one (Berachain Artio).
pub const DEFAULT_CHAIN_ID: u64 = 80085;

/// A predefined EVM-compatible network with label, chain ID, native token, and default RPC.
#[derive(Clone, Debug)]
pub struct EvmNetwork {
    pub label: &'static str,
    pub chain_id: u64,
    pub native_token: &'static str,
    pub default_rpc: &'static str,
    pub explorer: Option<&'static str>,
}

impl EvmNetwork {
    pub const fn new(
        label: &'static str,
        chain_id: u64,
        native_token: &'static str,
        default_rpc: &'static str,
        explorer: Option<&'static str>,
    ) -> Self {
        Self {
            label,
            chain_id,
            native_token,
            default_rpc,
            explorer,
        }
    }
}

/// Networks known by label and default endpoint.
pub const NETWORKS: &[EvmNetwork] = &[
    EvmNetwork::new("Ethereum", 1, "ETH", "https://ethereum-rpc.publicnode.com", Some("https://etherscan.io")),
    EvmNetwork::new("Sepolia", 11155111, "ETH", "https://ethereum-sepolia-rpc.publicnode.com", Some("https://sepolia.etherscan.io")),
    EvmNetwork::new("Berachain Artio", 80085, "BERA", "https://artio.rpc.berachain.com", Some("https://artio.beratrail.io")),
    EvmNetwork::new("Optimism", 10, "ETH", "https://mainnet.optimism.io", Some("https://optimistic.etherscan.io")),
    EvmNetwork::new("Base", 8453, "ETH", "https://mainnet.base.org", Some("https://basescan.org")),
    EvmNetwork::new("Polygon", 137, "POL", "https://polygon-rpc.com", Some("https://polygonscan.com")),
    EvmNetwork::new("BNB Chain", 56, "BNB", "https://bsc-dataseed.binance.org", Some("https://bscscan.com")),
    EvmNetwork::new("Gnosis Chain", 100, "xDAI", "https://rpc.gnosischain.com", Some("https://gnosisscan.io")),
    EvmNetwork::new("Local Anvil", 31337, "ETH", "http://127.0.0.1:8545", None),
];

/// Find a network by chain ID
pub fn find_network_by_chain_id(chain_id: u64) -> Option<&'static EvmNetwork> {
    NETWORKS.iter().find(|n| n.chain_id == chain_id)
}

/// Get the block explorer base URL for a given chain ID
pub fn get_block_explorer_url(chain_id: u64) -> Option<&'static str> {
    find_network_by_chain_id(chain_id).and_then(|n| n.explorer)
}

/// Get the full URL to view a transaction on the block explorer
pub fn get_tx_explorer_url(chain_id: u64, tx_hash: &str) -> Option<String> {
    get_block_explorer_url(chain_id).map(|base| format!("{}/tx/{}", base, tx_hash))
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("No RPC endpoint known for chain {0}; set SPRAY_RPC_URL or pass --rpc-url")]
    MissingRpc(u64),
    #[error("Invalid value for {key}: {reason}")]
    InvalidValue { key: &'static str, reason: String },
}

/// Everything a run needs to know about the chain and the transfer.
#[derive(Clone, Debug)]
pub struct Config {
    pub rpc_url: String,
    pub chain_id: u64,
    /// Value sent to every recipient, in wei.
    pub transfer_value: U256,
    pub gas_price_mode: GasPriceMode,
    pub poll_interval: Duration,
    pub max_poll_attempts: u32,
    /// Saved endpoints by chain ID, consulted whenever the chain changes.
    pub custom_rpcs: HashMap<u64, String>,
    // Set once an endpoint is given explicitly; a later chain switch keeps it
    rpc_pinned: bool,
}

impl Config {
    pub fn new(rpc_url: String, chain_id: u64) -> Self {
        Self {
            rpc_url,
            chain_id,
            transfer_value: default_transfer_value(),
            gas_price_mode: GasPriceMode::default(),
            poll_interval: Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
            max_poll_attempts: DEFAULT_MAX_POLL_ATTEMPTS,
            custom_rpcs: HashMap::new(),
            rpc_pinned: false,
        }
    }

    pub fn from_network(network: &EvmNetwork) -> Self {
        Self::new(network.default_rpc.to_string(), network.chain_id)
    }

    /// Build from persisted settings: custom RPC for the selected chain first,
    /// then the chain's default endpoint.
    pub fn from_settings(settings: &Settings) -> Result<Self, ConfigError> {
        let chain_id = settings.selected_chain_id;
        let rpc_url = match settings.get_custom_rpc(chain_id) {
            Some(rpc) => rpc.clone(),
            None => find_network_by_chain_id(chain_id)
                .map(|n| n.default_rpc.to_string())
                .ok_or(ConfigError::MissingRpc(chain_id))?,
        };

        let mut config = Self::new(rpc_url, chain_id);
        config.custom_rpcs = settings.custom_rpcs.clone();
        if let Some(amount) = &settings.transfer_amount {
            config.set_transfer_amount(amount)?;
        }
        config.gas_price_mode = settings.gas_price_mode;
        config.poll_interval = Duration::from_secs(settings.poll_interval_secs);
        config.max_poll_attempts = settings.max_poll_attempts;
        Ok(config)
    }

    /// Apply `SPRAY_*` environment variables on top of this config.
    pub fn apply_env(self) -> Result<Self, ConfigError> {
        self.apply_overrides(|key| env::var(key).ok())
    }

    /// Apply overrides from `lookup`, keyed by environment variable name.
    ///
    /// An endpoint set here (or by an earlier layer) stays in place when the
    /// chain changes. Otherwise a chain switch picks the saved custom RPC for
    /// the new chain, then its default endpoint.
    pub fn apply_overrides(
        mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        if let Some(rpc_url) = lookup("SPRAY_RPC_URL") {
            self.set_rpc_url(&rpc_url)?;
        }
        if let Some(chain_id) = lookup("SPRAY_CHAIN_ID") {
            let chain_id = parse_value("SPRAY_CHAIN_ID", &chain_id)?;
            if chain_id != self.chain_id {
                self.chain_id = chain_id;
                if !self.rpc_pinned {
                    self.rpc_url = self.resolve_rpc(chain_id)?;
                }
            }
        }
        if let Some(amount) = lookup("SPRAY_TRANSFER_AMOUNT") {
            self.set_transfer_amount(&amount)?;
        }
        if let Some(mode) = lookup("SPRAY_GAS_PRICE_MODE") {
            self.gas_price_mode = mode
                .parse()
                .map_err(|reason| ConfigError::InvalidValue {
                    key: "SPRAY_GAS_PRICE_MODE",
                    reason,
                })?;
        }
        if let Some(secs) = lookup("SPRAY_POLL_INTERVAL_SECS") {
            self.poll_interval = Duration::from_secs(parse_value("SPRAY_POLL_INTERVAL_SECS", &secs)?);
        }
        if let Some(attempts) = lookup("SPRAY_MAX_POLL_ATTEMPTS") {
            self.max_poll_attempts = parse_value("SPRAY_MAX_POLL_ATTEMPTS", &attempts)?;
        }
        self.validate()?;
        Ok(self)
    }

    pub fn set_rpc_url(&mut self, rpc_url: &str) -> Result<(), ConfigError> {
        Url::parse(rpc_url.trim()).map_err(|e| ConfigError::InvalidValue {
            key: "rpc_url",
            reason: e.to_string(),
        })?;
        self.rpc_url = rpc_url.trim().to_string();
        self.rpc_pinned = true;
        Ok(())
    }

    fn resolve_rpc(&self, chain_id: u64) -> Result<String, ConfigError> {
        if let Some(rpc) = self.custom_rpcs.get(&chain_id).filter(|s| !s.is_empty()) {
            return Ok(rpc.clone());
        }
        find_network_by_chain_id(chain_id)
            .map(|n| n.default_rpc.to_string())
            .ok_or(ConfigError::MissingRpc(chain_id))
    }

    /// Set the transfer value from a decimal ether string.
    pub fn set_transfer_amount(&mut self, amount: &str) -> Result<(), ConfigError> {
        self.transfer_value =
            utils::parse_eth_str_to_wei(amount).map_err(|e| ConfigError::InvalidValue {
                key: "transfer_amount",
                reason: e.to_string(),
            })?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_poll_attempts == 0 {
            return Err(ConfigError::InvalidValue {
                key: "max_poll_attempts",
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    pub fn native_token(&self) -> &str {
        find_network_by_chain_id(self.chain_id)
            .map(|n| n.native_token)
            .unwrap_or("ETH")
    }

    pub fn network_label(&self) -> &str {
        find_network_by_chain_id(self.chain_id)
            .map(|n| n.label)
            .unwrap_or("Unknown")
    }

    pub async fn get_provider(&self) -> Result<Arc<Provider<Http>>> {
        let url = Url::parse(&self.rpc_url)?;
        let provider = Provider::<Http>::try_from(url.as_str())?;
        Ok(Arc::new(provider))
    }
}

impl Default for Config {
    fn default() -> Self {
        if let Some(network) = find_network_by_chain_id(DEFAULT_CHAIN_ID) {
            Self::from_network(network)
        } else {
            Self::new("https://artio.rpc.berachain.com".to_string(), DEFAULT_CHAIN_ID)
        }
    }
}

fn default_transfer_value() -> U256 {
    // 0.3 ether
    U256::from(3u64) * U256::exp10(17)
}

fn parse_value<T: std::str::FromStr>(key: &'static str, raw: &str) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    raw.trim().parse().map_err(|e: T::Err| ConfigError::InvalidValue {
        key,
        reason: e.to_string(),
    })
}
