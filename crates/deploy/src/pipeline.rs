//! The deploy command: simulator, lottery, wiring and frontend, selected by tags.

use alloy_core::primitives::Address;
use anyhow::Result;

use crate::{
    chain::Chain,
    context::LotteryContext,
    contracts::LOTTERY_CONTRACT,
    deployer::{DeploymentRecord, deploy_lottery},
    frontend::{AddressUpdate, FrontendPublisher},
    resolver::{NetworkParameters, ensure_simulator, resolve_parameters},
    wiring::{VerificationOutcome, register_consumer, verify_deployment},
};

/// Groups of deployment steps.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::EnumString, strum::EnumIter,
)]
#[strum(serialize_all = "lowercase")]
pub enum DeployTag {
    /// Every step.
    All,
    /// The VRF coordinator simulator (local networks only).
    Mocks,
    /// Parameter resolution, lottery deployment and post-deploy wiring.
    Lottery,
    /// Frontend address map and ABI.
    Frontend,
}

/// What a deploy run did.
#[derive(Debug, Clone, Default)]
pub struct DeploySummary {
    pub simulator: Option<Address>,
    pub parameters: Option<NetworkParameters>,
    pub lottery: Option<DeploymentRecord>,
    pub verification: Option<VerificationOutcome>,
    pub frontend: Option<AddressUpdate>,
}

fn selected(tags: &[DeployTag], tag: DeployTag) -> bool {
    tags.is_empty() || tags.contains(&DeployTag::All) || tags.contains(&tag)
}

/// Run the deployment steps selected by `tags` (all of them when empty).
pub async fn run_deploy<C: Chain>(
    ctx: &LotteryContext<C>,
    tags: &[DeployTag],
) -> Result<DeploySummary> {
    let mut summary = DeploySummary::default();

    if selected(tags, DeployTag::Mocks) {
        if ctx.profile.has_randomness_simulator {
            tracing::info!(network = %ctx.network, "Local network detected, deploying mocks");
            summary.simulator = Some(ensure_simulator(ctx).await?);
        } else {
            tracing::debug!(network = %ctx.network, "Public network, no mocks to deploy");
        }
    }

    if selected(tags, DeployTag::Lottery) {
        let params = resolve_parameters(ctx).await?;
        tracing::info!("Deploying Lottery and waiting for confirmations...");
        let record = deploy_lottery(ctx, &params).await?;
        register_consumer(ctx, &params, &record).await?;
        summary.verification = Some(verify_deployment(ctx, &record).await);
        summary.parameters = Some(params);
        summary.lottery = Some(record);
    }

    if selected(tags, DeployTag::Frontend) {
        if ctx.frontend.enabled {
            let record = match &summary.lottery {
                Some(record) => record.clone(),
                None => ctx.store().require(LOTTERY_CONTRACT)?,
            };
            tracing::info!("Updating frontend...");
            let publisher = FrontendPublisher::from_config(&ctx.frontend);
            summary.frontend = Some(publisher.publish(ctx.entry.chain_id, &record)?);
        } else {
            tracing::info!("Frontend publishing is disabled");
        }
    }

    Ok(summary)
}
