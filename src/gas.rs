//! Gas price selection for a sender's batch.

use ethers::types::U256;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How the dispatcher turns the sampled network gas price into the price it uses.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GasPriceMode {
    /// Use the freshly sampled network price as-is.
    #[default]
    Network,
    /// Use the larger of the fresh sample and the previous sender's price.
    MaxOfSamples,
}

impl GasPriceMode {
    /// Resolve the price for one sender.
    pub fn resolve(&self, sampled: U256, prior: Option<U256>) -> U256 {
        match self {
            GasPriceMode::Network => sampled,
            GasPriceMode::MaxOfSamples => price(sampled, prior),
        }
    }
}

impl fmt::Display for GasPriceMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GasPriceMode::Network => f.write_str("network"),
            GasPriceMode::MaxOfSamples => f.write_str("max"),
        }
    }
}

impl FromStr for GasPriceMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "network" => Ok(GasPriceMode::Network),
            "max" | "max_of_samples" | "max-of-samples" => Ok(GasPriceMode::MaxOfSamples),
            other => Err(format!(
                "unknown gas price mode '{}', expected 'network' or 'max'",
                other
            )),
        }
    }
}

/// `prior` when it is strictly above `sampled`, otherwise `sampled`.
pub fn price(sampled: U256, prior: Option<U256>) -> U256 {
    match prior {
        Some(prior) if prior > sampled => prior,
        _ => sampled,
    }
}

/// Fee paid for `gas_units` at `gas_price`, or `None` if it does not fit in 256 bits.
pub fn total_cost(gas_units: U256, gas_price: U256) -> Option<U256> {
    gas_units.checked_mul(gas_price)
}
