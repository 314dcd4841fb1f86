use std::path::PathBuf;

use alloy_core::primitives::{U256, utils::parse_ether};
use clap::{Parser, Subcommand};
use lottery_deploy::DeployTag;
use tracing::level_filters::LevelFilter;

/// The network used when none is given.
const DEFAULT_NETWORK: &str = "localhost";

#[derive(Parser)]
#[command(name = "lottery")]
#[command(
    author,
    version,
    about = "Deploy the VRF lottery and drive it from the command line"
)]
pub struct Cli {
    /// The verbosity level.
    #[arg(short, long, env = "LOTTERY_VERBOSITY", default_value_t = LevelFilter::INFO, global = true)]
    pub verbosity: LevelFilter,

    /// Name of the network to run against, as declared in the network table.
    #[arg(short, long, env = "LOTTERY_NETWORK", default_value = DEFAULT_NETWORK, global = true)]
    pub network: String,

    /// Path to the configuration file.
    ///
    /// If not provided, `Lottery.toml` is read from the current directory when it exists.
    #[arg(short, long, env = "LOTTERY_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Hex private key of the deployer.
    #[arg(long, env = "PRIVATE_KEY", hide_env_values = true, global = true)]
    pub private_key: Option<String>,

    /// Mnemonic of the deployer. The first derived account is used.
    #[arg(long, env = "MNEMONIC", hide_env_values = true, global = true)]
    pub mnemonic: Option<String>,

    /// API key used to verify contract sources on public networks.
    ///
    /// Verification is skipped when it is not set.
    #[arg(long, env = "ETHERSCAN_API_KEY", hide_env_values = true, global = true)]
    pub etherscan_api_key: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Deploy the lottery, wire it to the VRF coordinator and update the frontend.
    Deploy {
        /// Steps to run: all, mocks, lottery, frontend.
        #[arg(short, long, value_delimiter = ',', default_value = "all")]
        tags: Vec<DeployTag>,
    },

    /// Enter the deployed lottery once.
    Enter {
        /// Amount to send, in ether. Defaults to the minimum contribution plus one wei.
        #[arg(long, value_parser = parse_ether_amount)]
        value: Option<U256>,
    },

    /// Check and perform upkeep, then fulfil the randomness request on local networks.
    #[command(name = "mock-offchain")]
    MockOffchain,

    /// Print the network table.
    Networks,

    /// Print the effective configuration as TOML.
    Config,
}

fn parse_ether_amount(value: &str) -> Result<U256, String> {
    parse_ether(value).map_err(|err| format!("invalid ether amount `{value}`: {err}"))
}
