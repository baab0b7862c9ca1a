//! Batch dispatch of fixed-value transfers from many senders to many recipients.
//!
//! Senders run one after another and each sender's recipients are submitted
//! in input order, one acknowledgment before the next send, which keeps
//! nonces of a single account in sequence. Confirmation tracking runs in the
//! background and never feeds back into the batch summary.

use crate::chain::{Account, ChainClient, PrivateKey};
use crate::config::Config;
use crate::error::DispatchError;
use crate::gas::GasPriceMode;
use crate::sink::OutputSink;
use crate::submitter;
use crate::tracker::{ConfirmationTracker, TrackerSet};
use crate::types::{BatchSummary, SubmissionFailure, SubmissionOutcome, SubmissionResult};
use crate::utils;
use ethers::types::{Address, U256};
use std::sync::Arc;
use tracing::{error, info, warn};

/// What one sender produced before finishing or failing.
#[derive(Debug, Default)]
struct SenderOutcome {
    results: Vec<SubmissionResult>,
    error: Option<DispatchError>,
}

pub struct BatchDispatcher {
    client: Arc<dyn ChainClient>,
    sink: Arc<dyn OutputSink>,
    trackers: TrackerSet,
    chain_id: u64,
    transfer_value: U256,
    gas_price_mode: GasPriceMode,
}

impl BatchDispatcher {
    pub fn new(client: Arc<dyn ChainClient>, sink: Arc<dyn OutputSink>, config: &Config) -> Self {
        let tracker = ConfirmationTracker::from_config(client.clone(), sink.clone(), config);
        Self {
            client,
            sink,
            trackers: TrackerSet::new(tracker),
            chain_id: config.chain_id,
            transfer_value: config.transfer_value,
            gas_price_mode: config.gas_price_mode,
        }
    }

    /// Confirmation tasks started by this dispatcher.
    pub fn trackers(&self) -> &TrackerSet {
        &self.trackers
    }

    /// Send the configured value from every sender to every recipient.
    ///
    /// Fails only with `InvalidInput`, before any network call. Per-sender
    /// failures are reported to the sink and counted in the summary.
    pub async fn dispatch(
        &self,
        senders: &[PrivateKey],
        recipients: &[Address],
    ) -> Result<BatchSummary, DispatchError> {
        if senders.is_empty() {
            return Err(DispatchError::InvalidInput(
                "at least one private key is required".to_string(),
            ));
        }
        if recipients.is_empty() {
            return Err(DispatchError::InvalidInput(
                "at least one recipient address is required".to_string(),
            ));
        }

        info!(
            "Dispatching {} per transfer to {} recipients from {} senders",
            utils::format_ether(self.transfer_value),
            recipients.len(),
            senders.len()
        );

        let mut summary = BatchSummary::default();
        let mut prior_gas_price: Option<U256> = None;

        for (index, key) in senders.iter().enumerate() {
            info!("Processing sender {}/{}", index + 1, senders.len());
            let outcome = self
                .dispatch_sender(key, recipients, &mut prior_gas_price)
                .await;

            summary.num_transactions += outcome.results.len();
            summary
                .outcomes
                .extend(outcome.results.into_iter().map(SubmissionOutcome::Sent));

            if let Some(reason) = outcome.error {
                error!("Sender {}/{} stopped: {}", index + 1, senders.len(), reason);
                let failure = SubmissionFailure::new(reason);
                self.sink.on_submission_failed(&failure);
                summary.num_errors += 1;
                summary.outcomes.push(SubmissionOutcome::Failed(failure));
            }
        }

        info!("Dispatch finished. {}", summary.summary());
        self.sink.on_batch_complete(&summary);
        Ok(summary)
    }

    async fn dispatch_sender(
        &self,
        key: &PrivateKey,
        recipients: &[Address],
        prior_gas_price: &mut Option<U256>,
    ) -> SenderOutcome {
        let mut outcome = SenderOutcome::default();

        let account = match self.derive_account(key) {
            Ok(account) => account,
            Err(e) => {
                outcome.error = Some(e);
                return outcome;
            }
        };

        let (gas_price, balance) = match self.prepare_sender(&account, prior_gas_price).await {
            Ok(prepared) => prepared,
            Err(e) => {
                outcome.error = Some(e);
                return outcome;
            }
        };

        for (index, &to) in recipients.iter().enumerate() {
            match submitter::submit(
                self.client.as_ref(),
                &account,
                to,
                self.transfer_value,
                gas_price,
                balance,
            )
            .await
            {
                Ok(transaction_hash) => {
                    let result = SubmissionResult {
                        transaction_hash,
                        from: account.address,
                        to,
                        value: self.transfer_value,
                    };
                    self.sink.on_submitted(&result);
                    self.trackers.spawn(result.clone());
                    outcome.results.push(result);
                }
                Err(e) => {
                    let skipped = recipients.len() - index - 1;
                    if skipped > 0 {
                        warn!(
                            "Skipping {} remaining recipients for {:?}",
                            skipped, account.address
                        );
                    }
                    outcome.error = Some(e);
                    break;
                }
            }
        }

        outcome
    }

    fn derive_account(&self, key: &PrivateKey) -> Result<Account, DispatchError> {
        let account = Account::from_private_key(key, self.chain_id)?;
        let checksummed = account.checksummed();
        if !self.client.is_valid_address(&checksummed) {
            return Err(DispatchError::InvalidAccount {
                address: Some(account.address),
                reason: format!("derived address {} failed validation", checksummed),
            });
        }
        Ok(account)
    }

    /// Price gas and read the balance once for all of a sender's recipients.
    async fn prepare_sender(
        &self,
        account: &Account,
        prior_gas_price: &mut Option<U256>,
    ) -> Result<(U256, U256), DispatchError> {
        let from = account.address;

        let sampled = self
            .client
            .get_gas_price()
            .await
            .map_err(|e| DispatchError::chain(from, None, e))?;
        let gas_price = self.gas_price_mode.resolve(sampled, *prior_gas_price);
        *prior_gas_price = Some(gas_price);

        let balance = self
            .client
            .get_balance(from)
            .await
            .map_err(|e| DispatchError::chain(from, None, e))?;

        info!(
            "Sender {:?}: balance {}, gas price {} wei (sampled {} wei, mode {})",
            from,
            utils::format_ether(balance),
            gas_price,
            sampled,
            self.gas_price_mode
        );
        Ok((gas_price, balance))
    }
}
