//! Spray sends a fixed native-token amount from each of several keys to each
//! of several recipients on an EVM chain, then tracks every transaction until
//! it lands on chain or the poll budget runs out.
//!
//! ## Module Structure
//!
//! - `chain` - `ChainClient` trait, accounts and the ethers-rs client
//! - `gas` - gas price selection
//! - `submitter` - admission control and single-transfer submission
//! - `dispatcher` - per-sender sequential batch dispatch
//! - `tracker` - receipt polling and the owned tracker set
//! - `sink` - output events and sinks
//! - `config` / `settings` - runtime configuration and persisted defaults

pub mod chain;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod gas;
pub mod settings;
pub mod sink;
pub mod submitter;
pub mod tracker;
pub mod types;
pub mod utils;

#[cfg(test)]
pub(crate) mod testing;

pub use chain::{Account, ChainClient, EthersChainClient, PrivateKey};
pub use config::Config;
pub use dispatcher::BatchDispatcher;
pub use error::{ChainError, DispatchError};
pub use sink::{ChannelSink, DispatchEvent, OutputSink, TracingSink};
pub use types::{BatchSummary, ConfirmationStatus, SubmissionOutcome, SubmissionResult};
