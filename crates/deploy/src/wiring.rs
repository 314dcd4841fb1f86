//! Steps that follow a lottery deployment.

use std::time::Duration;

use alloy_core::primitives::U256;
use anyhow::{Context, Result};

use crate::{
    LotteryError,
    chain::Chain,
    context::LotteryContext,
    contracts::{ContractHandle, VRFCoordinatorV2Mock},
    deployer::DeploymentRecord,
    resolver::NetworkParameters,
    verify::{EtherscanClient, VerificationRequest, VerificationStatus},
};

/// Result of the verification step. Failures are reported, never raised.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerificationOutcome {
    /// Local network, or no API key.
    Skipped,
    Verified,
    AlreadyVerified,
    Failed(String),
}

/// Register the lottery as a consumer of the simulator subscription.
///
/// Only local networks have a simulator; elsewhere the subscription owner adds the
/// consumer through the oracle's own interface and this is a no-op.
pub async fn register_consumer<C: Chain>(
    ctx: &LotteryContext<C>,
    params: &NetworkParameters,
    lottery: &DeploymentRecord,
) -> Result<()> {
    if !ctx.profile.has_randomness_simulator {
        return Ok(());
    }

    tracing::info!(
        subscription_id = params.subscription_id,
        consumer = %lottery.address,
        "Adding lottery as VRF consumer"
    );

    ContractHandle::new(&ctx.chain, params.oracle_coordinator)
        .send(
            VRFCoordinatorV2Mock::addConsumerCall {
                subId: params.subscription_id,
                consumer: lottery.address,
            },
            U256::ZERO,
            ctx.confirmations(),
        )
        .await
        .with_context(|| {
            format!(
                "Failed to add {} to subscription {}",
                lottery.address, params.subscription_id
            )
        })?;

    tracing::info!("Consumer added");
    Ok(())
}

/// Submit the deployed contract for source verification when the network supports it
/// and an API key is configured.
pub async fn verify_deployment<C: Chain>(
    ctx: &LotteryContext<C>,
    record: &DeploymentRecord,
) -> VerificationOutcome {
    let Some(api_key) = ctx.etherscan_api_key.clone() else {
        return VerificationOutcome::Skipped;
    };
    if !ctx.profile.supports_verification {
        return VerificationOutcome::Skipped;
    }

    tracing::info!(contract = %record.contract_name, address = %record.address, "Verifying contract source");

    match submit_verification(ctx, record, api_key).await {
        Ok(VerificationStatus::AlreadyVerified) => {
            tracing::info!(address = %record.address, "Contract already verified");
            VerificationOutcome::AlreadyVerified
        }
        Ok(_) => {
            tracing::info!(address = %record.address, "Contract verified");
            VerificationOutcome::Verified
        }
        Err(err) => {
            let reason = match err.downcast_ref::<LotteryError>() {
                Some(failure @ LotteryError::VerificationFailure(_)) => failure.to_string(),
                _ => LotteryError::VerificationFailure(format!("{err:#}")).to_string(),
            };
            tracing::warn!(address = %record.address, %reason, "Source verification did not succeed");
            VerificationOutcome::Failed(reason)
        }
    }
}

async fn submit_verification<C: Chain>(
    ctx: &LotteryContext<C>,
    record: &DeploymentRecord,
    api_key: String,
) -> Result<VerificationStatus> {
    let artifact = ctx.artifact(&record.contract_name)?;
    let request = VerificationRequest::from_artifact(
        &artifact,
        &ctx.project_root,
        record.address,
        record.constructor_args.clone(),
    )?;

    let client = EtherscanClient::new(
        ctx.verification.api_url.clone(),
        api_key,
        ctx.entry.chain_id,
    )?;

    client
        .verify(
            &request,
            Duration::from_secs(ctx.verification.poll_interval_secs),
            ctx.verification.max_status_checks,
        )
        .await
}
