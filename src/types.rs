//! Common types shared across modules.

use crate::error::DispatchError;
use ethers::prelude::*;

/// A transfer the node accepted. Immutable once produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionResult {
    pub transaction_hash: TxHash,
    pub from: Address,
    pub to: Address,
    pub value: U256,
}

/// The error that ended a sender's batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionFailure {
    /// `None` only when the private key could not be decoded at all.
    pub from: Option<Address>,
    pub to: Option<Address>,
    pub reason: DispatchError,
}

impl SubmissionFailure {
    pub fn new(reason: DispatchError) -> Self {
        Self {
            from: reason.sender(),
            to: reason.recipient(),
            reason,
        }
    }
}

/// One entry of a batch, in the order it happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmissionOutcome {
    Sent(SubmissionResult),
    Failed(SubmissionFailure),
}

impl SubmissionOutcome {
    pub fn is_sent(&self) -> bool {
        matches!(self, SubmissionOutcome::Sent(_))
    }
}

/// Run-level counters plus every outcome in order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub num_transactions: usize,
    /// Senders that ended in failure, not failed recipients.
    pub num_errors: usize,
    pub outcomes: Vec<SubmissionOutcome>,
}

impl BatchSummary {
    pub fn sent(&self) -> impl Iterator<Item = &SubmissionResult> {
        self.outcomes.iter().filter_map(|o| match o {
            SubmissionOutcome::Sent(r) => Some(r),
            SubmissionOutcome::Failed(_) => None,
        })
    }

    pub fn failures(&self) -> impl Iterator<Item = &SubmissionFailure> {
        self.outcomes.iter().filter_map(|o| match o {
            SubmissionOutcome::Failed(f) => Some(f),
            SubmissionOutcome::Sent(_) => None,
        })
    }

    pub fn is_clean(&self) -> bool {
        self.num_errors == 0
    }

    pub fn summary(&self) -> String {
        format!(
            "Sent: {} | Failed senders: {}",
            self.num_transactions, self.num_errors
        )
    }
}

/// Terminal state of a confirmation tracker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfirmationStatus {
    Succeeded {
        block_number: Option<u64>,
        gas_used: Option<U256>,
    },
    Reverted {
        block_number: Option<u64>,
        gas_used: Option<U256>,
    },
    /// No receipt after the attempt budget was spent.
    TimedOut { attempts: u32 },
    /// Stopped by shutdown before reaching an outcome.
    Cancelled { attempts: u32 },
}

impl ConfirmationStatus {
    pub fn label(&self) -> &'static str {
        match self {
            ConfirmationStatus::Succeeded { .. } => "succeeded",
            ConfirmationStatus::Reverted { .. } => "reverted",
            ConfirmationStatus::TimedOut { .. } => "timed out",
            ConfirmationStatus::Cancelled { .. } => "cancelled",
        }
    }

    /// True when a receipt was observed.
    pub fn is_confirmed(&self) -> bool {
        matches!(
            self,
            ConfirmationStatus::Succeeded { .. } | ConfirmationStatus::Reverted { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ChainError;

    fn sent(n: u8) -> SubmissionOutcome {
        SubmissionOutcome::Sent(SubmissionResult {
            transaction_hash: TxHash::repeat_byte(n),
            from: Address::repeat_byte(1),
            to: Address::repeat_byte(n),
            value: U256::from(1u64),
        })
    }

    #[test]
    fn test_failure_takes_attribution_from_reason() {
        let failure = SubmissionFailure::new(DispatchError::chain(
            Address::repeat_byte(7),
            Some(Address::repeat_byte(8)),
            ChainError::new("boom"),
        ));
        assert_eq!(failure.from, Some(Address::repeat_byte(7)));
        assert_eq!(failure.to, Some(Address::repeat_byte(8)));
    }

    #[test]
    fn test_summary_iterators() {
        let summary = BatchSummary {
            num_transactions: 2,
            num_errors: 1,
            outcomes: vec![
                sent(2),
                SubmissionOutcome::Failed(SubmissionFailure::new(DispatchError::InvalidAccount {
                    address: None,
                    reason: "bad".to_string(),
                })),
                sent(3),
            ],
        };
        assert_eq!(summary.sent().count(), 2);
        assert_eq!(summary.failures().count(), 1);
        assert!(!summary.is_clean());
        assert_eq!(summary.summary(), "Sent: 2 | Failed senders: 1");
    }

    #[test]
    fn test_confirmation_status_labels() {
        let ok = ConfirmationStatus::Succeeded {
            block_number: Some(1),
            gas_used: None,
        };
        assert!(ok.is_confirmed());
        assert_eq!(ok.label(), "succeeded");
        let timed_out = ConfirmationStatus::TimedOut { attempts: 30 };
        assert!(!timed_out.is_confirmed());
        assert_eq!(timed_out.label(), "timed out");
    }
}
