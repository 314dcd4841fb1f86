//! Stand-in for the off-chain automation and randomness services.
//!
//! On a local network nothing else drives the lottery: the clock is moved past the
//! draw interval, upkeep is performed and the randomness request is fulfilled
//! through the simulator. On public networks only the upkeep part runs and the real
//! oracle answers later.

use alloy_core::primitives::{Address, Bytes, U256};
use anyhow::{Context, Result};

use super::lottery_coordinator;
use crate::{
    chain::Chain,
    context::LotteryContext,
    contracts::{ContractHandle, LOTTERY_CONTRACT, Lottery, LotteryState, VRFCoordinatorV2Mock},
    tx::TransactionOutcome,
};

/// Public state of the lottery at one point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LotterySnapshot {
    pub interval: U256,
    pub state: LotteryState,
    pub players: U256,
    pub balance: U256,
}

impl LotterySnapshot {
    pub async fn read<C: Chain>(lottery: &ContractHandle<'_, C>) -> Result<Self> {
        let snapshot = Self {
            interval: lottery.read(Lottery::getIntervalCall {}).await?,
            state: lottery.read(Lottery::getLotteryStateCall {}).await?.into(),
            players: lottery.read(Lottery::getNumberOfPlayersCall {}).await?,
            balance: lottery.read(Lottery::getLotteryBalanceCall {}).await?,
        };

        tracing::info!(
            interval = %snapshot.interval,
            state = %snapshot.state,
            players = %snapshot.players,
            balance = %snapshot.balance,
            "Lottery state"
        );
        Ok(snapshot)
    }
}

/// Outcome of checking and, when needed, performing upkeep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpkeepCheckResult {
    pub upkeep_needed: bool,
    /// Randomness request issued by `performUpkeep`, when it ran.
    pub request_id: Option<U256>,
}

/// Terminal state of an automation run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AutomationOutcome {
    /// `checkUpkeep` returned false and no transaction was sent.
    NoUpkeepNeeded { snapshot: LotterySnapshot },
    /// A draw was requested.
    UpkeepPerformed {
        before: LotterySnapshot,
        request_id: U256,
        /// The request was answered through the simulator.
        fulfilled: bool,
        recent_winner: Address,
        after: LotterySnapshot,
    },
}

/// Check upkeep and perform it when the lottery asks for it.
pub async fn perform_upkeep_if_needed<C: Chain>(
    lottery: &ContractHandle<'_, C>,
    confirmations: u64,
) -> Result<UpkeepCheckResult> {
    let check = lottery
        .read(Lottery::checkUpkeepCall {
            checkData: Bytes::new(),
        })
        .await?;

    if !check.upkeepNeeded {
        tracing::info!("No upkeep needed!");
        return Ok(UpkeepCheckResult {
            upkeep_needed: false,
            request_id: None,
        });
    }

    let receipt = lottery
        .send(
            Lottery::performUpkeepCall {
                performData: Bytes::new(),
            },
            U256::ZERO,
            confirmations,
        )
        .await?;
    let request_id = TransactionOutcome::new(&receipt).randomness_request_id(lottery.address())?;

    tracing::info!(%request_id, "Performed upkeep");
    Ok(UpkeepCheckResult {
        upkeep_needed: true,
        request_id: Some(request_id),
    })
}

/// Run one automation cycle against the deployed lottery.
pub async fn run_automation<C: Chain>(ctx: &LotteryContext<C>) -> Result<AutomationOutcome> {
    let record = ctx.store().require(LOTTERY_CONTRACT)?;
    let lottery = ContractHandle::new(&ctx.chain, record.address);
    let before = LotterySnapshot::read(&lottery).await?;

    if ctx.profile.has_randomness_simulator {
        let interval = u64::try_from(before.interval).context("Lottery interval does not fit in u64")?;
        let seconds = interval.saturating_add(1);
        ctx.chain.increase_time(seconds).await?;
        ctx.chain.mine().await?;
        tracing::debug!(seconds, "Advanced chain time past the interval");
    }

    let check = perform_upkeep_if_needed(&lottery, ctx.confirmations()).await?;
    let Some(request_id) = check.request_id else {
        return Ok(AutomationOutcome::NoUpkeepNeeded { snapshot: before });
    };

    let fulfilled = if ctx.profile.has_randomness_simulator {
        tracing::info!("Local network, fulfilling the randomness request through the simulator");
        // The simulator the lottery requested from, which may no longer be the stored one.
        let coordinator = lottery_coordinator(&record)?;
        ContractHandle::new(&ctx.chain, coordinator)
            .send(
                VRFCoordinatorV2Mock::fulfillRandomWordsCall {
                    requestId: request_id,
                    consumer: lottery.address(),
                },
                U256::ZERO,
                ctx.confirmations(),
            )
            .await
            .with_context(|| format!("Failed to fulfil randomness request {request_id}"))?;
        tracing::info!("Responded!");
        true
    } else {
        false
    };

    let recent_winner = lottery.read(Lottery::getRecentWinnerCall {}).await?;
    if fulfilled {
        tracing::info!(winner = %recent_winner, "The winner is picked");
    } else {
        tracing::info!(previous_winner = %recent_winner, "Draw requested, the oracle will answer");
    }

    let after = LotterySnapshot::read(&lottery).await?;

    Ok(AutomationOutcome::UpkeepPerformed {
        before,
        request_id,
        fulfilled,
        recent_winner,
        after,
    })
}
