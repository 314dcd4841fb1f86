//! Operator scripts run against an existing deployment.

use alloy_core::primitives::{Address, B256, U256};
use alloy_sol_types::SolValue;
use anyhow::{Context, Result};

use crate::{
    chain::Chain, context::LotteryContext, contracts::LOTTERY_CONTRACT,
    deployer::DeploymentRecord,
};

mod automation;
pub use automation::{
    AutomationOutcome, LotterySnapshot, UpkeepCheckResult, perform_upkeep_if_needed,
    run_automation,
};

mod enter;
pub use enter::{ENTRY_MARGIN_WEI, EnterOptions, EntryReceipt, enter_lottery};

/// Address of the lottery recorded in the deployment store of the context's network.
pub(crate) fn deployed_lottery<C: Chain>(ctx: &LotteryContext<C>) -> Result<Address> {
    Ok(ctx.store().require(LOTTERY_CONTRACT)?.address)
}

/// VRF coordinator a lottery was constructed with, read back from its stored
/// constructor arguments.
pub(crate) fn lottery_coordinator(record: &DeploymentRecord) -> Result<Address> {
    let (coordinator, ..) =
        <(Address, U256, B256, u64, U256, u32)>::abi_decode_params(&record.constructor_args)
            .with_context(|| {
                format!(
                    "Failed to decode constructor arguments of {} at {}",
                    record.contract_name, record.address
                )
            })?;
    Ok(coordinator)
}
