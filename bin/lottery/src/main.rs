//! lottery is a CLI tool to deploy the VRF lottery and drive it during local testing.

mod cli;
mod config;

use anyhow::Result;
use clap::Parser;
use comfy_table::Table;

use cli::{Cli, Command};
use lottery_deploy::{
    Credentials, LotteryConfig, LotteryContext, NetworkKind, VerificationOutcome, run_deploy,
    scripts::{AutomationOutcome, EnterOptions, enter_lottery, run_automation},
};

#[tokio::main]
async fn main() -> Result<()> {
    // Secrets may live in a `.env` file next to the project.
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    // Initialize the logger.
    tracing_subscriber::fmt()
        .with_max_level(cli.verbosity)
        .init();

    let config = config::load(cli.config.as_deref())?;

    let credentials = Credentials {
        private_key: cli.private_key,
        mnemonic: cli.mnemonic,
        etherscan_api_key: cli.etherscan_api_key,
    };

    match cli.command {
        Command::Networks => print_networks(&config),
        Command::Config => print!("{}", config.to_toml()?),
        Command::Deploy { tags } => {
            let ctx = LotteryContext::connect(&config, &cli.network, credentials).await?;
            let summary = run_deploy(&ctx, &tags).await?;

            if let Some(lottery) = &summary.lottery {
                tracing::info!(
                    network = %ctx.network,
                    address = %lottery.address,
                    tx_hash = %lottery.transaction_hash,
                    "Lottery deployed"
                );
            }
            if let Some(VerificationOutcome::Failed(reason)) = &summary.verification {
                tracing::warn!(%reason, "Deployment succeeded but the sources are not verified");
            }
        }
        Command::Enter { value } => {
            let ctx = LotteryContext::connect(&config, &cli.network, credentials).await?;
            enter_lottery(&ctx, EnterOptions { value }).await?;
        }
        Command::MockOffchain => {
            let ctx = LotteryContext::connect(&config, &cli.network, credentials).await?;
            match run_automation(&ctx).await? {
                AutomationOutcome::NoUpkeepNeeded { .. } => {
                    tracing::info!("Nothing to do until the lottery needs upkeep");
                }
                AutomationOutcome::UpkeepPerformed {
                    request_id,
                    fulfilled: true,
                    recent_winner,
                    ..
                } => {
                    tracing::info!(%request_id, winner = %recent_winner, "Draw completed");
                }
                AutomationOutcome::UpkeepPerformed { request_id, .. } => {
                    tracing::info!(%request_id, "Draw requested, waiting for the VRF coordinator");
                }
            }
        }
    }

    Ok(())
}

fn print_networks(config: &LotteryConfig) {
    let mut table = Table::new();
    table.set_header(vec![
        "Network",
        "Chain ID",
        "Kind",
        "RPC URL",
        "Confirmations",
        "VRF coordinator",
        "Subscription",
    ]);

    for (name, entry) in config.networks.iter() {
        let coordinator = entry
            .vrf_coordinator
            .map(|address| address.to_checksum(None))
            .unwrap_or_else(|| match entry.kind {
                NetworkKind::Local => "simulator".to_string(),
                NetworkKind::Public => "not set".to_string(),
            });
        let subscription = entry
            .subscription_id
            .map(|id| id.to_string())
            .unwrap_or_else(|| match entry.kind {
                NetworkKind::Local => "created on deploy".to_string(),
                NetworkKind::Public => "not set".to_string(),
            });

        table.add_row(vec![
            name.clone(),
            entry.chain_id.to_string(),
            entry.kind.to_string(),
            entry.rpc_url.to_string(),
            entry.profile().required_confirmations.to_string(),
            coordinator,
            subscription,
        ]);
    }

    println!("{table}");
}
