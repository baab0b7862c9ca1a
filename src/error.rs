//! Error types for dispatch and chain access.

use ethers::types::{Address, U256};
use thiserror::Error;

/// Failure of a single request against the chain node.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct ChainError {
    pub message: String,
}

impl ChainError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Everything that can stop a run or a sender.
///
/// `InvalidInput` aborts the whole run before any network activity. All other
/// variants abort only the sender they are attributed to.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DispatchError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// `address` is `None` when the key itself could not be decoded.
    #[error("Invalid account {}: {reason}", display_opt(.address))]
    InvalidAccount {
        address: Option<Address>,
        reason: String,
    },

    #[error(
        "Insufficient balance on {from:?} to pay gas for transfer to {to:?}: cost {total_cost} wei, balance {balance} wei"
    )]
    InsufficientBalance {
        from: Address,
        to: Address,
        total_cost: U256,
        balance: U256,
    },

    #[error("Chain error for {from:?}{}: {source}", display_to(.to))]
    Chain {
        from: Address,
        to: Option<Address>,
        #[source]
        source: ChainError,
    },
}

impl DispatchError {
    pub fn chain(from: Address, to: Option<Address>, source: ChainError) -> Self {
        DispatchError::Chain { from, to, source }
    }

    /// Sender this error is attributed to, if any.
    pub fn sender(&self) -> Option<Address> {
        match self {
            DispatchError::InvalidInput(_) => None,
            DispatchError::InvalidAccount { address, .. } => *address,
            DispatchError::InsufficientBalance { from, .. } | DispatchError::Chain { from, .. } => {
                Some(*from)
            }
        }
    }

    /// Recipient this error is attributed to, if known.
    pub fn recipient(&self) -> Option<Address> {
        match self {
            DispatchError::InsufficientBalance { to, .. } => Some(*to),
            DispatchError::Chain { to, .. } => *to,
            _ => None,
        }
    }
}

fn display_opt(address: &Option<Address>) -> String {
    match address {
        Some(addr) => format!("{:?}", addr),
        None => "<undecodable key>".to_string(),
    }
}

fn display_to(to: &Option<Address>) -> String {
    match to {
        Some(addr) => format!(" -> {:?}", addr),
        None => String::new(),
    }
}
