//! Output sinks for dispatch and confirmation events.
//!
//! The dispatcher and every tracking task report through an `OutputSink`
//! instead of writing to a shared output area. Trackers report from their own
//! tasks, so implementations must accept calls from several tasks at once.

use crate::config;
use crate::types::{BatchSummary, ConfirmationStatus, SubmissionFailure, SubmissionResult};
use crate::utils;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

pub trait OutputSink: Send + Sync {
    fn on_submitted(&self, result: &SubmissionResult);

    fn on_submission_failed(&self, failure: &SubmissionFailure);

    /// `status` is `Succeeded` or `Reverted`.
    fn on_confirmed(&self, result: &SubmissionResult, status: &ConfirmationStatus);

    fn on_tracking_timed_out(&self, result: &SubmissionResult, attempts: u32);

    fn on_tracking_cancelled(&self, _result: &SubmissionResult, _attempts: u32) {}

    fn on_batch_complete(&self, summary: &BatchSummary);
}

/// Owned copy of a sink callback, for consumers on the other side of a channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchEvent {
    Submitted(SubmissionResult),
    SubmissionFailed(SubmissionFailure),
    Confirmed {
        result: SubmissionResult,
        status: ConfirmationStatus,
    },
    TrackingTimedOut {
        result: SubmissionResult,
        attempts: u32,
    },
    TrackingCancelled {
        result: SubmissionResult,
        attempts: u32,
    },
    BatchComplete(BatchSummary),
}

/// Forwards every event over an unbounded channel.
#[derive(Clone)]
pub struct ChannelSink {
    sender: mpsc::UnboundedSender<DispatchEvent>,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<DispatchEvent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }

    fn send(&self, event: DispatchEvent) {
        // A dropped receiver means nobody is listening anymore
        if self.sender.send(event).is_err() {
            warn!("Dispatch event receiver dropped; event discarded");
        }
    }
}

impl OutputSink for ChannelSink {
    fn on_submitted(&self, result: &SubmissionResult) {
        self.send(DispatchEvent::Submitted(result.clone()));
    }

    fn on_submission_failed(&self, failure: &SubmissionFailure) {
        self.send(DispatchEvent::SubmissionFailed(failure.clone()));
    }

    fn on_confirmed(&self, result: &SubmissionResult, status: &ConfirmationStatus) {
        self.send(DispatchEvent::Confirmed {
            result: result.clone(),
            status: status.clone(),
        });
    }

    fn on_tracking_timed_out(&self, result: &SubmissionResult, attempts: u32) {
        self.send(DispatchEvent::TrackingTimedOut {
            result: result.clone(),
            attempts,
        });
    }

    fn on_tracking_cancelled(&self, result: &SubmissionResult, attempts: u32) {
        self.send(DispatchEvent::TrackingCancelled {
            result: result.clone(),
            attempts,
        });
    }

    fn on_batch_complete(&self, summary: &BatchSummary) {
        self.send(DispatchEvent::BatchComplete(summary.clone()));
    }
}

/// Renders events as `tracing` log lines, with explorer links when the chain has one.
#[derive(Debug, Clone)]
pub struct TracingSink {
    chain_id: u64,
    native_token: String,
}

impl TracingSink {
    pub fn new(chain_id: u64, native_token: impl Into<String>) -> Self {
        Self {
            chain_id,
            native_token: native_token.into(),
        }
    }

    fn tx_ref(&self, result: &SubmissionResult) -> String {
        let hash = format!("{:?}", result.transaction_hash);
        config::get_tx_explorer_url(self.chain_id, &hash).unwrap_or(hash)
    }
}

impl OutputSink for TracingSink {
    fn on_submitted(&self, result: &SubmissionResult) {
        info!(
            "Transaction sent from {:?} to {:?} ({} {}): {}",
            result.from,
            result.to,
            utils::format_ether(result.value),
            self.native_token,
            self.tx_ref(result)
        );
    }

    fn on_submission_failed(&self, failure: &SubmissionFailure) {
        match failure.to {
            Some(to) => error!("Error sending transaction to {:?}: {}", to, failure.reason),
            None => error!("Sender aborted: {}", failure.reason),
        }
    }

    fn on_confirmed(&self, result: &SubmissionResult, status: &ConfirmationStatus) {
        match status {
            ConfirmationStatus::Succeeded { block_number, .. } => info!(
                "Transaction {:?} from {:?} to {:?} confirmed in block {}",
                result.transaction_hash,
                result.from,
                result.to,
                block_number.map(|n| n.to_string()).unwrap_or_else(|| "?".to_string())
            ),
            _ => warn!(
                "Transaction {:?} from {:?} to {:?} {}",
                result.transaction_hash,
                result.from,
                result.to,
                status.label()
            ),
        }
    }

    fn on_tracking_timed_out(&self, result: &SubmissionResult, attempts: u32) {
        warn!(
            "No receipt for {:?} ({:?} -> {:?}, {} {}) after {} attempts",
            result.transaction_hash,
            result.from,
            result.to,
            utils::format_ether(result.value),
            self.native_token,
            attempts
        );
    }

    fn on_tracking_cancelled(&self, result: &SubmissionResult, attempts: u32) {
        warn!(
            "Stopped tracking {:?} ({:?} -> {:?}) after {} attempts",
            result.transaction_hash, result.from, result.to, attempts
        );
    }

    fn on_batch_complete(&self, summary: &BatchSummary) {
        info!("Batch complete. {}", summary.summary());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ethers::types::{Address, TxHash, U256};

    fn result() -> SubmissionResult {
        SubmissionResult {
            transaction_hash: TxHash::repeat_byte(0xab),
            from: Address::repeat_byte(1),
            to: Address::repeat_byte(2),
            value: U256::from(10u64),
        }
    }

    #[tokio::test]
    async fn test_channel_sink_forwards_in_order() {
        let (sink, mut rx) = ChannelSink::new();
        sink.on_submitted(&result());
        sink.on_tracking_timed_out(&result(), 30);
        sink.on_batch_complete(&BatchSummary::default());

        assert_eq!(rx.recv().await, Some(DispatchEvent::Submitted(result())));
        assert_eq!(
            rx.recv().await,
            Some(DispatchEvent::TrackingTimedOut {
                result: result(),
                attempts: 30
            })
        );
        assert!(matches!(rx.recv().await, Some(DispatchEvent::BatchComplete(_))));
    }

    #[tokio::test]
    async fn test_channel_sink_accepts_events_from_many_tasks() {
        let (sink, mut rx) = ChannelSink::new();
        let mut handles = Vec::new();
        for _ in 0..8 {
            let sink = sink.clone();
            handles.push(tokio::spawn(async move {
                sink.on_confirmed(
                    &result(),
                    &ConfirmationStatus::Succeeded {
                        block_number: Some(1),
                        gas_used: None,
                    },
                );
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
        drop(sink);

        let mut count = 0;
        while let Some(event) = rx.recv().await {
            assert!(matches!(event, DispatchEvent::Confirmed { .. }));
            count += 1;
        }
        assert_eq!(count, 8);
    }

    #[test]
    fn test_channel_sink_survives_dropped_receiver() {
        let (sink, rx) = ChannelSink::new();
        drop(rx);
        sink.on_submitted(&result());
    }

    #[test]
    fn test_tracing_sink_links_known_chain() {
        let sink = TracingSink::new(1, "ETH");
        let link = sink.tx_ref(&result());
        assert!(link.starts_with("https://etherscan.io/tx/0xabab"));
    }

    #[test]
    fn test_tracing_sink_plain_hash_on_unknown_chain() {
        let sink = TracingSink::new(999_999, "ETH");
        assert!(sink.tx_ref(&result()).starts_with("0xabab"));
    }
}
