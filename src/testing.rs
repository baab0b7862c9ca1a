//! In-memory chain client and recording sink for unit tests.

use crate::chain::{validate_address, Account, ChainClient, ReceiptInfo, SignedPayload, TransferRequest};
use crate::error::ChainError;
use crate::sink::{ChannelSink, DispatchEvent, OutputSink};
use crate::types::{BatchSummary, ConfirmationStatus, SubmissionFailure, SubmissionResult};
use async_trait::async_trait;
use ethers::types::{Address, Bytes, TxHash, U256};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;

/// Anvil/hardhat development keys #0..#2.
pub const KEY_0: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
pub const KEY_1: &str = "0x59c6995e998f97a5a0044966f0945389dc9e86dae88c7a8412f4603b6b78690d";
pub const KEY_2: &str = "0x5de4111afa1a4b94908f83103eb1f1706367c2e68ca870fc3fb9a804cdab365a";

pub fn recipient(n: u8) -> Address {
    Address::repeat_byte(n)
}

/// A single call observed by the mock, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Balance(Address),
    GasPrice,
    Estimate { from: Address, to: Address },
    Sign { from: Address, to: Address },
    Send { to: Address },
    Receipt(TxHash),
}

/// When a recipient's transaction gets a receipt.
#[derive(Debug, Clone, Copy)]
pub enum ReceiptPlan {
    /// Receipt shows up on this poll (1-based) with the given success flag.
    OnPoll(u32, bool),
    Never,
}

pub struct MockChainClient {
    calls: Mutex<Vec<Call>>,
    balances: Mutex<HashMap<Address, Result<U256, ChainError>>>,
    default_balance: U256,
    gas_prices: Mutex<VecDeque<Result<U256, ChainError>>>,
    default_gas_price: U256,
    gas_units: U256,
    invalid_addresses: HashSet<Address>,
    fail_estimate: HashSet<Address>,
    fail_send: HashSet<Address>,
    receipt_plans: HashMap<Address, ReceiptPlan>,
    default_receipt: ReceiptPlan,
    failing_polls: Mutex<HashMap<Address, u32>>,
    sent: Mutex<HashMap<TxHash, Address>>,
    polls: Mutex<HashMap<TxHash, u32>>,
}

impl Default for MockChainClient {
    fn default() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            balances: Mutex::new(HashMap::new()),
            default_balance: U256::exp10(21),
            gas_prices: Mutex::new(VecDeque::new()),
            default_gas_price: U256::from(10u64),
            gas_units: U256::from(21_000u64),
            invalid_addresses: HashSet::new(),
            fail_estimate: HashSet::new(),
            fail_send: HashSet::new(),
            receipt_plans: HashMap::new(),
            default_receipt: ReceiptPlan::OnPoll(1, true),
            failing_polls: Mutex::new(HashMap::new()),
            sent: Mutex::new(HashMap::new()),
            polls: Mutex::new(HashMap::new()),
        }
    }
}

impl MockChainClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_balance(self, address: Address, balance: U256) -> Self {
        self.balances.lock().unwrap().insert(address, Ok(balance));
        self
    }

    pub fn with_balance_error(self, address: Address, message: &str) -> Self {
        self.balances
            .lock()
            .unwrap()
            .insert(address, Err(ChainError::new(message)));
        self
    }

    /// Gas prices returned by successive `get_gas_price` calls.
    pub fn with_gas_prices(self, prices: &[u64]) -> Self {
        self.gas_prices
            .lock()
            .unwrap()
            .extend(prices.iter().map(|p| Ok(U256::from(*p))));
        self
    }

    pub fn with_gas_price_error(self, message: &str) -> Self {
        self.gas_prices
            .lock()
            .unwrap()
            .push_back(Err(ChainError::new(message)));
        self
    }

    pub fn with_gas_units(mut self, units: u64) -> Self {
        self.gas_units = U256::from(units);
        self
    }

    pub fn with_invalid_address(mut self, address: Address) -> Self {
        self.invalid_addresses.insert(address);
        self
    }

    pub fn failing_estimate_to(mut self, to: Address) -> Self {
        self.fail_estimate.insert(to);
        self
    }

    pub fn failing_send_to(mut self, to: Address) -> Self {
        self.fail_send.insert(to);
        self
    }

    pub fn with_receipt(mut self, to: Address, plan: ReceiptPlan) -> Self {
        self.receipt_plans.insert(to, plan);
        self
    }

    pub fn with_default_receipt(mut self, plan: ReceiptPlan) -> Self {
        self.default_receipt = plan;
        self
    }

    /// The first `count` receipt polls for `to` fail with an RPC error.
    pub fn with_failing_polls(self, to: Address, count: u32) -> Self {
        self.failing_polls.lock().unwrap().insert(to, count);
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn sends(&self) -> Vec<Address> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Send { to } => Some(to),
                _ => None,
            })
            .collect()
    }

    pub fn poll_count(&self, hash: TxHash) -> u32 {
        self.polls.lock().unwrap().get(&hash).copied().unwrap_or(0)
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl ChainClient for MockChainClient {
    fn is_valid_address(&self, address: &str) -> bool {
        match address.parse::<Address>() {
            Ok(addr) if self.invalid_addresses.contains(&addr) => false,
            _ => validate_address(address),
        }
    }

    async fn get_balance(&self, address: Address) -> Result<U256, ChainError> {
        self.record(Call::Balance(address));
        self.balances
            .lock()
            .unwrap()
            .get(&address)
            .cloned()
            .unwrap_or(Ok(self.default_balance))
    }

    async fn get_gas_price(&self) -> Result<U256, ChainError> {
        self.record(Call::GasPrice);
        self.gas_prices
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Ok(self.default_gas_price))
    }

    async fn estimate_gas(&self, tx: &TransferRequest) -> Result<U256, ChainError> {
        self.record(Call::Estimate {
            from: tx.from,
            to: tx.to,
        });
        if self.fail_estimate.contains(&tx.to) {
            return Err(ChainError::new("execution reverted"));
        }
        Ok(self.gas_units)
    }

    async fn sign(
        &self,
        account: &Account,
        tx: &TransferRequest,
    ) -> Result<SignedPayload, ChainError> {
        self.record(Call::Sign {
            from: account.address,
            to: tx.to,
        });
        Ok(SignedPayload(Bytes::from(tx.to.as_bytes().to_vec())))
    }

    async fn send_signed(&self, payload: SignedPayload) -> Result<TxHash, ChainError> {
        let to = Address::from_slice(&payload.0);
        self.record(Call::Send { to });
        if self.fail_send.contains(&to) {
            return Err(ChainError::new("insufficient funds for gas * price + value"));
        }
        let mut sent = self.sent.lock().unwrap();
        let hash = TxHash::from_low_u64_be(sent.len() as u64 + 1);
        sent.insert(hash, to);
        Ok(hash)
    }

    async fn get_receipt(&self, hash: TxHash) -> Result<Option<ReceiptInfo>, ChainError> {
        self.record(Call::Receipt(hash));
        let poll = {
            let mut polls = self.polls.lock().unwrap();
            let count = polls.entry(hash).or_insert(0);
            *count += 1;
            *count
        };
        let to = self.sent.lock().unwrap().get(&hash).copied();
        let Some(to) = to else {
            return Ok(None);
        };

        if let Some(remaining) = self.failing_polls.lock().unwrap().get_mut(&to) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(ChainError::new("connection reset"));
            }
        }

        let plan = self
            .receipt_plans
            .get(&to)
            .copied()
            .unwrap_or(self.default_receipt);
        match plan {
            ReceiptPlan::OnPoll(n, success) if poll >= n => Ok(Some(ReceiptInfo {
                success,
                block_number: Some(100 + poll as u64),
                gas_used: Some(self.gas_units),
            })),
            _ => Ok(None),
        }
    }
}

/// Sink that keeps every event for later inspection.
pub struct RecordingSink {
    inner: ChannelSink,
    events: Mutex<tokio::sync::mpsc::UnboundedReceiver<DispatchEvent>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        let (inner, events) = ChannelSink::new();
        Self {
            inner,
            events: Mutex::new(events),
        }
    }

    /// Drain everything recorded so far.
    pub fn take(&self) -> Vec<DispatchEvent> {
        let mut rx = self.events.lock().unwrap();
        let mut out = Vec::new();
        while let Ok(event) = rx.try_recv() {
            out.push(event);
        }
        out
    }
}

impl OutputSink for RecordingSink {
    fn on_submitted(&self, result: &SubmissionResult) {
        self.inner.on_submitted(result)
    }

    fn on_submission_failed(&self, failure: &SubmissionFailure) {
        self.inner.on_submission_failed(failure)
    }

    fn on_confirmed(&self, result: &SubmissionResult, status: &ConfirmationStatus) {
        self.inner.on_confirmed(result, status)
    }

    fn on_tracking_timed_out(&self, result: &SubmissionResult, attempts: u32) {
        self.inner.on_tracking_timed_out(result, attempts)
    }

    fn on_tracking_cancelled(&self, result: &SubmissionResult, attempts: u32) {
        self.inner.on_tracking_cancelled(result, attempts)
    }

    fn on_batch_complete(&self, summary: &BatchSummary) {
        self.inner.on_batch_complete(summary)
    }
}
