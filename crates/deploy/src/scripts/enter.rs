use alloy_core::primitives::{Address, B256, U256};
use anyhow::{Context, Result};

use super::deployed_lottery;
use crate::{
    chain::Chain,
    context::LotteryContext,
    contracts::{ContractHandle, Lottery},
};

/// Wei added on top of the minimum contribution when no value is given.
///
/// The minimum alone already qualifies.
pub const ENTRY_MARGIN_WEI: u64 = 1;

#[derive(Debug, Clone, Copy, Default)]
pub struct EnterOptions {
    /// Exact value to send instead of the minimum plus margin.
    pub value: Option<U256>,
}

/// A mined entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryReceipt {
    pub lottery: Address,
    pub value: U256,
    pub transaction_hash: B256,
}

/// Enter the deployed lottery once from the context's signer.
pub async fn enter_lottery<C: Chain>(
    ctx: &LotteryContext<C>,
    options: EnterOptions,
) -> Result<EntryReceipt> {
    let lottery = ContractHandle::new(&ctx.chain, deployed_lottery(ctx)?);

    let value = match options.value {
        Some(value) => value,
        None => {
            let minimum = lottery.read(Lottery::minimumContributionCall {}).await?;
            tracing::info!(
                %minimum,
                margin_wei = ENTRY_MARGIN_WEI,
                "Entering with the minimum contribution plus margin"
            );
            minimum + U256::from(ENTRY_MARGIN_WEI)
        }
    };

    let receipt = lottery
        .send(Lottery::enterLotteryCall {}, value, ctx.confirmations())
        .await
        .with_context(|| format!("Failed to enter lottery {} with {value} wei", lottery.address()))?;

    tracing::info!(lottery = %lottery.address(), %value, tx_hash = %receipt.transaction_hash, "Entered!");

    Ok(EntryReceipt {
        lottery: lottery.address(),
        value,
        transaction_hash: receipt.transaction_hash,
    })
}
