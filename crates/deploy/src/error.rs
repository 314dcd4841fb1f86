//! Error taxonomy for the deployment workflow.
//!
//! Operations return [`anyhow::Result`] and attach context as they propagate. The
//! variants below are the failures callers may want to tell apart; they can be
//! recovered from an [`anyhow::Error`] with `downcast_ref::<LotteryError>()`.

use std::path::PathBuf;

use alloy_core::primitives::B256;

/// Failures of the deployment workflow and the operator scripts.
#[derive(Debug, thiserror::Error)]
pub enum LotteryError {
    /// The network is unknown, or its table entry lacks a required field.
    #[error("missing configuration for network `{network}`: {detail}")]
    ConfigurationMissing { network: String, detail: String },

    /// A contract creation was rejected or reverted.
    #[error("failed to deploy {contract}: {reason}")]
    DeploymentFailure { contract: String, reason: String },

    /// A transaction was mined with a failed status.
    #[error("transaction {tx_hash} reverted")]
    TransactionReverted { tx_hash: B256 },

    /// A transaction receipt does not contain the event the caller relies on.
    #[error("event `{event}` not found in logs of transaction {tx_hash}")]
    MissingEvent { event: &'static str, tx_hash: B256 },

    /// A persisted file exists but cannot be interpreted.
    #[error("malformed state in {}: {reason}", path.display())]
    MalformedState { path: PathBuf, reason: String },

    /// The verification service rejected or failed a submission.
    #[error("source verification failed: {0}")]
    VerificationFailure(String),
}

impl LotteryError {
    pub(crate) fn missing_field(network: &str, field: &str) -> Self {
        Self::ConfigurationMissing {
            network: network.to_string(),
            detail: format!("field `{field}` is not set"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_field_message() {
        let err = LotteryError::missing_field("sepolia", "subscription_id");
        assert_eq!(
            err.to_string(),
            "missing configuration for network `sepolia`: field `subscription_id` is not set"
        );
    }

    #[test]
    fn test_downcast_through_anyhow() {
        let err: anyhow::Error = LotteryError::VerificationFailure("boom".to_string()).into();
        let err = err.context("Verifying Lottery");
        assert!(matches!(
            err.downcast_ref::<LotteryError>(),
            Some(LotteryError::VerificationFailure(_))
        ));
    }
}
