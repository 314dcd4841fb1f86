//! Typed view over the events of a mined transaction.

use alloy_core::primitives::{Address, U256};
use alloy_sol_types::SolEvent;

use crate::{
    LotteryError,
    chain::{LogEntry, TxReceipt},
    contracts::{Lottery, VRFCoordinatorV2Mock},
};

/// Decodes the known events of a receipt.
///
/// Lookups are by event signature and emitter, never by log position.
#[derive(Debug, Clone, Copy)]
pub struct TransactionOutcome<'a> {
    receipt: &'a TxReceipt,
}

impl<'a> TransactionOutcome<'a> {
    pub fn new(receipt: &'a TxReceipt) -> Self {
        Self { receipt }
    }

    /// All events of type `E`, optionally restricted to one emitter.
    pub fn events<E: SolEvent>(&self, emitter: Option<Address>) -> impl Iterator<Item = E> {
        self.receipt
            .logs
            .iter()
            .filter(move |log| emitter.is_none_or(|emitter| log.address == emitter))
            .filter_map(decode::<E>)
    }

    /// The first event of type `E`, or [`LotteryError::MissingEvent`].
    pub fn require<E: SolEvent>(&self, emitter: Option<Address>) -> Result<E, LotteryError> {
        self.events::<E>(emitter)
            .next()
            .ok_or_else(|| LotteryError::MissingEvent {
                event: E::SIGNATURE,
                tx_hash: self.receipt.transaction_hash,
            })
    }

    /// Subscription id announced by `createSubscription()`.
    pub fn subscription_id(&self, coordinator: Address) -> Result<u64, LotteryError> {
        self.require::<VRFCoordinatorV2Mock::SubscriptionCreated>(Some(coordinator))
            .map(|event| event.subId)
    }

    /// Randomness request id emitted while performing upkeep.
    ///
    /// The lottery's own `RequestedLotteryWinner` is preferred; the coordinator's
    /// `RandomWordsRequested` for the same consumer is accepted when the lottery does
    /// not emit it.
    pub fn randomness_request_id(&self, lottery: Address) -> Result<U256, LotteryError> {
        if let Some(event) = self.events::<Lottery::RequestedLotteryWinner>(Some(lottery)).next() {
            return Ok(event.requestId);
        }

        self.events::<VRFCoordinatorV2Mock::RandomWordsRequested>(None)
            .find(|event| event.sender == lottery)
            .map(|event| event.requestId)
            .ok_or_else(|| LotteryError::MissingEvent {
                event: Lottery::RequestedLotteryWinner::SIGNATURE,
                tx_hash: self.receipt.transaction_hash,
            })
    }
}

fn decode<E: SolEvent>(log: &LogEntry) -> Option<E> {
    if log.topics.first() != Some(&E::SIGNATURE_HASH) {
        return None;
    }

    match E::decode_raw_log(log.topics.iter().copied(), &log.data) {
        Ok(event) => Some(event),
        Err(err) => {
            tracing::warn!(event = E::SIGNATURE, error = %err, "Failed to decode log with matching signature");
            None
        }
    }
}
