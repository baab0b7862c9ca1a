//! Confirmation tracking for submitted transactions.
//!
//! Each accepted transaction gets its own polling task. Tasks are owned by a
//! `TrackerSet` so the caller can wait for all of them or cancel them together.

use crate::chain::ChainClient;
use crate::config::Config;
use crate::sink::OutputSink;
use crate::types::{ConfirmationStatus, SubmissionResult};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

/// Polls one transaction's receipt until it lands, the budget runs out, or
/// tracking is cancelled.
pub struct ConfirmationTracker {
    client: Arc<dyn ChainClient>,
    sink: Arc<dyn OutputSink>,
    poll_interval: Duration,
    max_attempts: u32,
    cancel: CancellationToken,
}

impl ConfirmationTracker {
    pub fn new(
        client: Arc<dyn ChainClient>,
        sink: Arc<dyn OutputSink>,
        poll_interval: Duration,
        max_attempts: u32,
    ) -> Self {
        Self {
            client,
            sink,
            poll_interval,
            max_attempts: max_attempts.max(1),
            cancel: CancellationToken::new(),
        }
    }

    pub fn from_config(
        client: Arc<dyn ChainClient>,
        sink: Arc<dyn OutputSink>,
        config: &Config,
    ) -> Self {
        Self::new(client, sink, config.poll_interval, config.max_poll_attempts)
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Track `result` to a terminal state and report it to the sink exactly once.
    pub async fn track(&self, result: SubmissionResult) -> ConfirmationStatus {
        self.track_until(result, &self.cancel).await
    }

    async fn track_until(
        &self,
        result: SubmissionResult,
        cancel: &CancellationToken,
    ) -> ConfirmationStatus {
        let hash = result.transaction_hash;
        let mut attempts: u32 = 0;

        loop {
            let receipt = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    return self.cancelled(&result, attempts);
                }
                receipt = self.client.get_receipt(hash) => receipt,
            };
            attempts += 1;

            match receipt {
                Ok(Some(receipt)) => {
                    let status = if receipt.success {
                        ConfirmationStatus::Succeeded {
                            block_number: receipt.block_number,
                            gas_used: receipt.gas_used,
                        }
                    } else {
                        ConfirmationStatus::Reverted {
                            block_number: receipt.block_number,
                            gas_used: receipt.gas_used,
                        }
                    };
                    info!("Transaction {:?} {} after {} polls", hash, status.label(), attempts);
                    self.sink.on_confirmed(&result, &status);
                    return status;
                }
                Ok(None) => {
                    debug!("No receipt yet for {:?} (attempt {}/{})", hash, attempts, self.max_attempts);
                }
                Err(e) => {
                    warn!(
                        "Receipt poll for {:?} failed (attempt {}/{}): {}",
                        hash, attempts, self.max_attempts, e
                    );
                }
            }

            if attempts >= self.max_attempts {
                self.sink.on_tracking_timed_out(&result, attempts);
                return ConfirmationStatus::TimedOut { attempts };
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    return self.cancelled(&result, attempts);
                }
                _ = sleep(self.poll_interval) => {}
            }
        }
    }

    fn cancelled(&self, result: &SubmissionResult, attempts: u32) -> ConfirmationStatus {
        self.sink.on_tracking_cancelled(result, attempts);
        ConfirmationStatus::Cancelled { attempts }
    }
}

/// Owns every spawned tracking task.
///
/// `shutdown` cancels the tasks running at that moment. Tasks spawned
/// afterwards get a fresh token, so the set stays usable across batches.
pub struct TrackerSet {
    tracker: Arc<ConfirmationTracker>,
    tasks: TaskTracker,
    cancel: Mutex<CancellationToken>,
}

impl TrackerSet {
    pub fn new(tracker: ConfirmationTracker) -> Self {
        let cancel = tracker.cancel.clone();
        Self {
            tracker: Arc::new(tracker),
            tasks: TaskTracker::new(),
            cancel: Mutex::new(cancel),
        }
    }

    /// Start tracking `result` in the background.
    pub fn spawn(&self, result: SubmissionResult) {
        let tracker = Arc::clone(&self.tracker);
        let cancel = self.current_token();
        self.tasks.spawn(async move {
            tracker.track_until(result, &cancel).await;
        });
    }

    /// Number of tracking tasks still running.
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Wait for every tracking task to reach a terminal state.
    pub async fn wait(&self) {
        self.tasks.close();
        self.tasks.wait().await;
        self.tasks.reopen();
    }

    /// Cancel all tracking tasks and wait for them to finish.
    pub async fn shutdown(&self) {
        if !self.tasks.is_empty() {
            info!("Cancelling {} confirmation trackers", self.tasks.len());
        }
        let cancel = {
            let mut guard = self.cancel.lock().unwrap_or_else(|e| e.into_inner());
            std::mem::replace(&mut *guard, CancellationToken::new())
        };
        cancel.cancel();
        self.wait().await;
    }

    fn current_token(&self) -> CancellationToken {
        self.cancel
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}
