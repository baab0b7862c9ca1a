//! Chain client adapter.
//! Defines the capability set the dispatcher needs from a node and the
//! ethers-rs implementation that talks to a single HTTP endpoint.

use crate::config::Config;
use crate::error::{ChainError, DispatchError};
use async_trait::async_trait;
use ethers::prelude::*;
use ethers::providers::{Http, Provider};
use ethers::types::transaction::eip2718::TypedTransaction;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

/// Hex-encoded secp256k1 private key as supplied by the caller.
///
/// Never printed: `Debug` is redacted so keys cannot leak through logs.
#[derive(Clone, PartialEq, Eq)]
pub struct PrivateKey(String);

impl PrivateKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    fn expose(&self) -> &str {
        self.0.trim()
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PrivateKey(<redacted>)")
    }
}

/// A sending account derived from a private key.
#[derive(Debug, Clone)]
pub struct Account {
    pub address: Address,
    wallet: LocalWallet,
}

impl Account {
    /// Derive the account for `key` on `chain_id`.
    pub fn from_private_key(key: &PrivateKey, chain_id: u64) -> Result<Self, DispatchError> {
        let raw = key.expose();
        let raw = raw
            .strip_prefix("0x")
            .or_else(|| raw.strip_prefix("0X"))
            .unwrap_or(raw);
        let bytes = hex::decode(raw).map_err(|e| DispatchError::InvalidAccount {
            address: None,
            reason: format!("private key is not valid hex: {}", e),
        })?;
        if bytes.len() != 32 {
            return Err(DispatchError::InvalidAccount {
                address: None,
                reason: format!("private key must be 32 bytes, got {}", bytes.len()),
            });
        }
        let wallet = LocalWallet::from_bytes(&bytes)
            .map_err(|e| DispatchError::InvalidAccount {
                address: None,
                reason: format!("private key rejected: {}", e),
            })?
            .with_chain_id(chain_id);

        Ok(Self {
            address: wallet.address(),
            wallet,
        })
    }

    /// EIP-55 checksummed form of the address.
    pub fn checksummed(&self) -> String {
        ethers::utils::to_checksum(&self.address, None)
    }

    pub fn wallet(&self) -> &LocalWallet {
        &self.wallet
    }
}

/// Transfer description handed to the node.
///
/// `gas` and `gas_price` are left empty for estimation and filled before
/// signing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferRequest {
    pub from: Address,
    pub to: Address,
    pub value: U256,
    pub gas: Option<U256>,
    pub gas_price: Option<U256>,
}

impl TransferRequest {
    pub fn new(from: Address, to: Address, value: U256) -> Self {
        Self {
            from,
            to,
            value,
            gas: None,
            gas_price: None,
        }
    }

    pub fn with_gas(mut self, gas: U256, gas_price: U256) -> Self {
        self.gas = Some(gas);
        self.gas_price = Some(gas_price);
        self
    }

    fn to_legacy(&self) -> TransactionRequest {
        let mut tx = TransactionRequest::new()
            .from(self.from)
            .to(self.to)
            .value(self.value);
        if let Some(gas) = self.gas {
            tx = tx.gas(gas);
        }
        if let Some(gas_price) = self.gas_price {
            tx = tx.gas_price(gas_price);
        }
        tx
    }
}

/// RLP-encoded signed transaction ready for broadcast.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedPayload(pub Bytes);

/// What the tracker needs from a mined receipt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceiptInfo {
    pub success: bool,
    pub block_number: Option<u64>,
    pub gas_used: Option<U256>,
}

impl From<&TransactionReceipt> for ReceiptInfo {
    fn from(receipt: &TransactionReceipt) -> Self {
        Self {
            // Pre-Byzantium receipts carry no status; treat them as not successful.
            success: receipt.status == Some(U64::one()),
            block_number: receipt.block_number.map(|n| n.as_u64()),
            gas_used: receipt.gas_used,
        }
    }
}

/// Node operations used by the submitter, dispatcher and tracker.
///
/// Each call is an independent request/response, so one client can be shared
/// by the dispatcher and every tracking task.
#[async_trait]
pub trait ChainClient: Send + Sync {
    fn is_valid_address(&self, address: &str) -> bool;

    async fn get_balance(&self, address: Address) -> Result<U256, ChainError>;

    async fn get_gas_price(&self) -> Result<U256, ChainError>;

    async fn estimate_gas(&self, tx: &TransferRequest) -> Result<U256, ChainError>;

    async fn sign(&self, account: &Account, tx: &TransferRequest)
        -> Result<SignedPayload, ChainError>;

    /// Broadcast and return the transaction hash. Does not wait for mining.
    async fn send_signed(&self, payload: SignedPayload) -> Result<TxHash, ChainError>;

    async fn get_receipt(&self, hash: TxHash) -> Result<Option<ReceiptInfo>, ChainError>;
}

/// Check that `address` is a 20-byte hex address and, when it is written in
/// mixed case, that its EIP-55 checksum matches.
pub fn validate_address(address: &str) -> bool {
    let trimmed = address.trim();
    let Some(hex_part) = trimmed.strip_prefix("0x") else {
        return false;
    };
    if hex_part.len() != 40 || !hex_part.chars().all(|c| c.is_ascii_hexdigit()) {
        return false;
    }
    let parsed: Address = match trimmed.parse() {
        Ok(addr) => addr,
        Err(_) => return false,
    };

    let has_lower = hex_part.chars().any(|c| c.is_ascii_lowercase());
    let has_upper = hex_part.chars().any(|c| c.is_ascii_uppercase());
    if has_lower && has_upper {
        ethers::utils::to_checksum(&parsed, None) == trimmed
    } else {
        true
    }
}

/// `ChainClient` backed by an ethers HTTP provider.
#[derive(Clone)]
pub struct EthersChainClient {
    provider: Arc<Provider<Http>>,
    chain_id: u64,
}

impl EthersChainClient {
    pub fn new(provider: Arc<Provider<Http>>, chain_id: u64) -> Self {
        Self { provider, chain_id }
    }

    pub async fn from_config(config: &Config) -> anyhow::Result<Self> {
        let provider = config.get_provider().await?;
        info!("Connected provider for {} ({})", config.network_label(), config.rpc_url);
        Ok(Self::new(provider, config.chain_id))
    }
}

#[async_trait]
impl ChainClient for EthersChainClient {
    fn is_valid_address(&self, address: &str) -> bool {
        validate_address(address)
    }

    async fn get_balance(&self, address: Address) -> Result<U256, ChainError> {
        self.provider
            .get_balance(address, None)
            .await
            .map_err(|e| ChainError::new(format!("Failed to fetch balance: {}", e)))
    }

    async fn get_gas_price(&self) -> Result<U256, ChainError> {
        self.provider
            .get_gas_price()
            .await
            .map_err(|e| ChainError::new(format!("Failed to fetch gas price: {}", e)))
    }

    async fn estimate_gas(&self, tx: &TransferRequest) -> Result<U256, ChainError> {
        let typed: TypedTransaction = TransferRequest::new(tx.from, tx.to, tx.value)
            .to_legacy()
            .into();
        self.provider
            .estimate_gas(&typed, None)
            .await
            .map_err(|e| ChainError::new(format!("Failed to estimate gas: {}", e)))
    }

    async fn sign(
        &self,
        account: &Account,
        tx: &TransferRequest,
    ) -> Result<SignedPayload, ChainError> {
        let nonce = self
            .provider
            .get_transaction_count(account.address, Some(BlockNumber::Pending.into()))
            .await
            .map_err(|e| ChainError::new(format!("Failed to fetch nonce: {}", e)))?;

        let typed: TypedTransaction = tx
            .to_legacy()
            .nonce(nonce)
            .chain_id(self.chain_id)
            .into();
        debug!("Signing transfer from {:?} with nonce {}", account.address, nonce);

        let signature = account
            .wallet()
            .clone()
            .with_chain_id(self.chain_id)
            .sign_transaction(&typed)
            .await
            .map_err(|e| ChainError::new(format!("Failed to sign transaction: {}", e)))?;

        Ok(SignedPayload(typed.rlp_signed(&signature)))
    }

    async fn send_signed(&self, payload: SignedPayload) -> Result<TxHash, ChainError> {
        let pending = self
            .provider
            .send_raw_transaction(payload.0)
            .await
            .map_err(|e| ChainError::new(format!("Failed to send transaction: {}", e)))?;
        Ok(pending.tx_hash())
    }

    async fn get_receipt(&self, hash: TxHash) -> Result<Option<ReceiptInfo>, ChainError> {
        let receipt = self
            .provider
            .get_transaction_receipt(hash)
            .await
            .map_err(|e| ChainError::new(format!("Failed to fetch receipt: {}", e)))?;
        Ok(receipt.as_ref().map(ReceiptInfo::from))
    }
}
