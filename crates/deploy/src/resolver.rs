//! Resolution of the lottery constructor parameters for a network.
//!
//! Public networks read everything from the network table. Local networks take the
//! fee tier, callback gas, interval and minimum entry from the table too, but get
//! their coordinator and subscription from a VRF coordinator simulator deployed on
//! the node.

use alloy_core::primitives::{Address, B256, Bytes, U256, aliases::U96};
use alloy_sol_types::SolConstructor;
use anyhow::{Context, Result};

use crate::{
    LotteryError,
    chain::Chain,
    context::LotteryContext,
    contracts::{ContractHandle, VRF_COORDINATOR_MOCK_CONTRACT, VRFCoordinatorV2Mock},
    deployer::deploy_contract,
    tx::TransactionOutcome,
};

/// Flat fee charged by the simulator per request: 0.25 LINK.
pub const MOCK_BASE_FEE: u128 = 250_000_000_000_000_000;

/// LINK per gas charged by the simulator.
pub const MOCK_GAS_PRICE_LINK: u128 = 1_000_000_000;

/// Amount credited to every new simulator subscription: 30 LINK.
pub const SUBSCRIPTION_FUND_AMOUNT: u128 = 30_000_000_000_000_000_000;

/// Everything the lottery constructor needs, fully resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkParameters {
    /// Chain ID of the network.
    pub network_id: u64,
    /// VRF coordinator (or its simulator on local networks).
    pub oracle_coordinator: Address,
    pub subscription_id: u64,
    /// Key hash selecting the VRF fee tier.
    pub gas_lane: B256,
    pub callback_gas_limit: u32,
    /// Seconds between two draws.
    pub interval: U256,
    /// Minimum entry in wei.
    pub minimum_entry: U256,
}

/// Resolve the constructor parameters of the lottery on the context's network.
///
/// On local networks this sends transactions: every call creates and funds a new
/// subscription on the simulator.
pub async fn resolve_parameters<C: Chain>(ctx: &LotteryContext<C>) -> Result<NetworkParameters> {
    let network = ctx.network.as_str();
    let entry = &ctx.entry;

    let gas_lane = entry
        .gas_lane
        .ok_or_else(|| LotteryError::missing_field(network, "gas_lane"))?;
    let callback_gas_limit = entry
        .callback_gas_limit
        .ok_or_else(|| LotteryError::missing_field(network, "callback_gas_limit"))?;
    let interval = entry
        .interval
        .ok_or_else(|| LotteryError::missing_field(network, "interval"))?;
    let minimum_entry = entry.minimum_entry_wei(network)?;

    let (oracle_coordinator, subscription_id) = if ctx.profile.has_randomness_simulator {
        let coordinator = ensure_simulator(ctx).await?;
        let subscription_id = create_funded_subscription(ctx, coordinator).await?;
        (coordinator, subscription_id)
    } else {
        let coordinator = entry
            .vrf_coordinator
            .ok_or_else(|| LotteryError::missing_field(network, "vrf_coordinator"))?;
        let subscription_id = entry
            .subscription_id
            .ok_or_else(|| LotteryError::missing_field(network, "subscription_id"))?;
        (coordinator, subscription_id)
    };

    let params = NetworkParameters {
        network_id: entry.chain_id,
        oracle_coordinator,
        subscription_id,
        gas_lane,
        callback_gas_limit,
        interval: U256::from(interval),
        minimum_entry,
    };

    tracing::info!(
        network,
        coordinator = %params.oracle_coordinator,
        subscription_id = params.subscription_id,
        "Network parameters resolved"
    );

    Ok(params)
}

/// Make sure a VRF coordinator simulator runs on the local network and return its address.
///
/// A stored deployment is reused when it was built from the current artifact and the
/// node still has code at its address. A restarted node or a recompiled simulator
/// gets a fresh deployment.
pub async fn ensure_simulator<C: Chain>(ctx: &LotteryContext<C>) -> Result<Address> {
    if !ctx.profile.has_randomness_simulator {
        anyhow::bail!(
            "Network `{}` uses the real VRF coordinator, no simulator is deployed there",
            ctx.network
        );
    }

    let artifact = ctx.artifact(VRF_COORDINATOR_MOCK_CONTRACT)?;
    let store = ctx.store();

    if let Some(record) = store.load(VRF_COORDINATOR_MOCK_CONTRACT)? {
        let code = ctx.chain.code_at(record.address).await?;
        if record.bytecode_hash == artifact.bytecode_hash() && !code.is_empty() {
            tracing::info!(address = %record.address, "Reusing deployed VRF coordinator simulator");
            return Ok(record.address);
        }
        tracing::info!(address = %record.address, "Stored VRF coordinator simulator is stale, redeploying");
    }

    let constructor_args = VRFCoordinatorV2Mock::constructorCall {
        baseFee: U96::from(MOCK_BASE_FEE),
        gasPriceLink: U96::from(MOCK_GAS_PRICE_LINK),
    }
    .abi_encode();

    let record = deploy_contract(
        &ctx.chain,
        &artifact,
        Bytes::from(constructor_args),
        ctx.confirmations(),
    )
    .await?;

    store.save(&record)?;
    store.save_chain_id(ctx.entry.chain_id)?;

    Ok(record.address)
}

/// Create a subscription on the simulator and fund it.
pub async fn create_funded_subscription<C: Chain>(
    ctx: &LotteryContext<C>,
    coordinator: Address,
) -> Result<u64> {
    let simulator = ContractHandle::new(&ctx.chain, coordinator);
    let confirmations = ctx.confirmations();

    let receipt = simulator
        .send(
            VRFCoordinatorV2Mock::createSubscriptionCall {},
            U256::ZERO,
            confirmations,
        )
        .await
        .context("Failed to create VRF subscription")?;
    let subscription_id = TransactionOutcome::new(&receipt).subscription_id(coordinator)?;

    simulator
        .send(
            VRFCoordinatorV2Mock::fundSubscriptionCall {
                subId: subscription_id,
                amount: U96::from(SUBSCRIPTION_FUND_AMOUNT),
            },
            U256::ZERO,
            confirmations,
        )
        .await
        .with_context(|| format!("Failed to fund VRF subscription {subscription_id}"))?;

    tracing::info!(%coordinator, subscription_id, "VRF subscription created and funded");
    Ok(subscription_id)
}

#[cfg(test)]
mod tests {
    use alloy_sol_types::SolCall;

    use super::*;
    use crate::{
        artifacts::tests::write_artifact,
        chain::fake::COORDINATOR_BYTECODE,
        network::{DEFAULT_GAS_LANE, LOCAL_CHAIN_ID, SEPOLIA_VRF_COORDINATOR},
        test_utils::{local_env, network_env, sepolia_env},
    };

    #[tokio::test]
    async fn test_every_default_network_resolves() {
        for network in ["hardhat", "localhost", "sepolia"] {
            let env = network_env(network);
            let params = resolve_parameters(&env.ctx).await.unwrap();

            assert_eq!(params.network_id, env.ctx.entry.chain_id);
            assert_eq!(params.gas_lane, DEFAULT_GAS_LANE);
            assert_eq!(params.callback_gas_limit, 500_000);
            assert_eq!(params.interval, U256::from(30));
            assert_eq!(params.minimum_entry, U256::from(10u64.pow(16)));
            assert_ne!(params.oracle_coordinator, Address::ZERO);
        }
    }

    #[tokio::test]
    async fn test_public_network_reads_table_without_transactions() {
        let env = sepolia_env();
        let params = resolve_parameters(&env.ctx).await.unwrap();

        assert_eq!(params.oracle_coordinator, SEPOLIA_VRF_COORDINATOR);
        assert_eq!(params.subscription_id, 1);
        assert!(env.ctx.chain.sent_transactions().is_empty());
    }

    #[tokio::test]
    async fn test_local_resolution_funds_subscription_on_simulator() {
        let env = local_env();
        let params = resolve_parameters(&env.ctx).await.unwrap();

        assert_eq!(params.network_id, LOCAL_CHAIN_ID);
        let coordinator = env.ctx.chain.coordinator(params.oracle_coordinator).unwrap();
        let subscription = &coordinator.subscriptions[&params.subscription_id];
        assert_eq!(subscription.balance, U96::from(SUBSCRIPTION_FUND_AMOUNT));
        assert!(subscription.consumers.is_empty());
    }

    #[tokio::test]
    async fn test_two_local_resolutions_yield_distinct_subscriptions() {
        let env = local_env();
        let first = resolve_parameters(&env.ctx).await.unwrap();
        let second = resolve_parameters(&env.ctx).await.unwrap();

        assert_ne!(first.subscription_id, second.subscription_id);
        assert_eq!(first.oracle_coordinator, second.oracle_coordinator);

        let creations = env
            .ctx
            .chain
            .sent_transactions()
            .iter()
            .filter(|tx| tx.to.is_none())
            .count();
        assert_eq!(creations, 1);
        assert_eq!(
            env.ctx
                .chain
                .calls_to(VRFCoordinatorV2Mock::createSubscriptionCall::SELECTOR),
            2
        );
    }

    #[tokio::test]
    async fn test_missing_field_is_configuration_missing() {
        let mut env = sepolia_env();
        env.ctx.entry.subscription_id = None;

        let err = resolve_parameters(&env.ctx).await.unwrap_err();
        match err.downcast_ref::<LotteryError>() {
            Some(LotteryError::ConfigurationMissing { network, detail }) => {
                assert_eq!(network, "sepolia");
                assert!(detail.contains("subscription_id"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_simulator_redeployed_after_node_restart() {
        let env = local_env();
        let first = ensure_simulator(&env.ctx).await.unwrap();
        assert_eq!(ensure_simulator(&env.ctx).await.unwrap(), first);

        env.ctx.chain.reset_contracts();
        let second = ensure_simulator(&env.ctx).await.unwrap();
        assert_ne!(first, second);
        assert!(env.ctx.chain.coordinator(second).is_some());
    }

    #[tokio::test]
    async fn test_simulator_redeployed_after_recompilation() {
        let env = local_env();
        let first = ensure_simulator(&env.ctx).await.unwrap();

        let mut recompiled = COORDINATOR_BYTECODE.to_vec();
        recompiled.push(0x00);
        write_artifact(&env.ctx.artifacts_dir, VRF_COORDINATOR_MOCK_CONTRACT, &recompiled);

        let second = ensure_simulator(&env.ctx).await.unwrap();
        assert_ne!(first, second);
    }

    #[tokio::test]
    async fn test_no_simulator_on_public_network() {
        let env = sepolia_env();
        assert!(ensure_simulator(&env.ctx).await.is_err());
    }
}
