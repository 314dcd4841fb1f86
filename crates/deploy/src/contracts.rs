//! Call surface of the lottery and of the VRF coordinator simulator.

use alloy_core::primitives::{Address, Bytes, U256};
use alloy_sol_types::{SolCall, sol};
use anyhow::{Context, Result};

use crate::{
    LotteryError,
    chain::{Chain, TxReceipt, TxRequest},
};

/// Artifact name of the lottery contract.
pub const LOTTERY_CONTRACT: &str = "Lottery";

/// Artifact name of the VRF coordinator simulator.
pub const VRF_COORDINATOR_MOCK_CONTRACT: &str = "VRFCoordinatorV2Mock";

sol! {
    /// The lottery contract.
    #[derive(Debug, PartialEq, Eq)]
    contract Lottery {
        constructor(
            address vrfCoordinatorV2,
            uint256 minContribution,
            bytes32 gasLane,
            uint64 subscriptionId,
            uint256 interval,
            uint32 callbackGasLimit
        );

        event RequestedLotteryWinner(uint256 indexed requestId);
        event WinnerPicked(address indexed winner);

        function minimumContribution() external view returns (uint256);
        function enterLottery() external payable;
        function checkUpkeep(bytes calldata checkData) external view returns (bool upkeepNeeded, bytes memory performData);
        function performUpkeep(bytes calldata performData) external;
        function getRecentWinner() external view returns (address);
        function getInterval() external view returns (uint256);
        function getLotteryState() external view returns (uint8);
        function getNumberOfPlayers() external view returns (uint256);
        function getLotteryBalance() external view returns (uint256);
    }

    /// The VRF coordinator v2 simulator used on development chains.
    #[derive(Debug, PartialEq, Eq)]
    contract VRFCoordinatorV2Mock {
        constructor(uint96 baseFee, uint96 gasPriceLink);

        event SubscriptionCreated(uint64 indexed subId, address owner);
        event RandomWordsRequested(
            bytes32 indexed keyHash,
            uint256 requestId,
            uint256 preSeed,
            uint64 indexed subId,
            uint16 minimumRequestConfirmations,
            uint32 callbackGasLimit,
            uint32 numWords,
            address indexed sender
        );

        function createSubscription() external returns (uint64 subId);
        function fundSubscription(uint64 subId, uint96 amount) external;
        function addConsumer(uint64 subId, address consumer) external;
        function fulfillRandomWords(uint256 requestId, address consumer) external;
    }
}

/// Lottery state as exposed by `getLotteryState()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum LotteryState {
    /// Entries are accepted.
    Open,
    /// A draw is waiting for randomness.
    Calculating,
    /// A value this tooling does not know about.
    Unknown(u8),
}

impl From<u8> for LotteryState {
    fn from(value: u8) -> Self {
        match value {
            0 => Self::Open,
            1 => Self::Calculating,
            other => Self::Unknown(other),
        }
    }
}

/// A deployed contract reached through a [`Chain`].
#[derive(Debug, Clone, Copy)]
pub struct ContractHandle<'a, C> {
    chain: &'a C,
    address: Address,
}

impl<'a, C: Chain> ContractHandle<'a, C> {
    pub fn new(chain: &'a C, address: Address) -> Self {
        Self { chain, address }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    /// Execute a read-only call and decode its return value.
    pub async fn read<T: SolCall + Send>(&self, call: T) -> Result<T::Return> {
        let output = self
            .chain
            .call(self.address, Bytes::from(call.abi_encode()))
            .await
            .with_context(|| format!("{} failed", T::SIGNATURE))?;

        T::abi_decode_returns(&output)
            .with_context(|| format!("Failed to decode {} return data", T::SIGNATURE))
    }

    /// Send a transaction, wait for `confirmations` and require a successful status.
    pub async fn send<T: SolCall + Send>(
        &self,
        call: T,
        value: U256,
        confirmations: u64,
    ) -> Result<TxReceipt> {
        let tx = TxRequest::call(self.address, call.abi_encode()).with_value(value);

        let tx_hash = self
            .chain
            .send_transaction(tx)
            .await
            .with_context(|| format!("{} transaction was rejected", T::SIGNATURE))?;

        tracing::debug!(%tx_hash, function = T::SIGNATURE, "Transaction sent");

        let receipt = self.chain.wait_for_receipt(tx_hash, confirmations).await?;
        if !receipt.status {
            return Err(LotteryError::TransactionReverted { tx_hash })
                .with_context(|| format!("{} reverted", T::SIGNATURE));
        }

        Ok(receipt)
    }
}
