//! Fixtures shared by the unit tests.

use std::path::PathBuf;

use tempdir::TempDir;

use crate::{
    artifacts::tests::write_artifact,
    chain::fake::{COORDINATOR_BYTECODE, FakeChain, LOTTERY_BYTECODE},
    config::{FrontendConfig, LotteryConfig},
    context::LotteryContext,
    contracts::{LOTTERY_CONTRACT, VRF_COORDINATOR_MOCK_CONTRACT},
};

/// A project directory with compiled artifacts and a context on a simulated chain.
pub(crate) struct TestEnv {
    pub dir: TempDir,
    pub ctx: LotteryContext<FakeChain>,
}

/// Configuration rooted in `dir`, with the frontend files in `dir/frontend`.
pub(crate) fn project_config(dir: &TempDir) -> LotteryConfig {
    write_artifact(&dir.path().join("out"), LOTTERY_CONTRACT, &LOTTERY_BYTECODE);
    write_artifact(
        &dir.path().join("out"),
        VRF_COORDINATOR_MOCK_CONTRACT,
        &COORDINATOR_BYTECODE,
    );
    std::fs::create_dir_all(dir.path().join("frontend")).unwrap();

    LotteryConfig {
        project_root: dir.path().to_path_buf(),
        frontend: FrontendConfig {
            enabled: true,
            addresses_file: PathBuf::from("frontend/contractAddresses.json"),
            abi_file: PathBuf::from("frontend/abi.json"),
        },
        ..Default::default()
    }
}

/// Initialize tracing for tests (idempotent).
pub(crate) fn init_test_tracing() {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init()
        .ok();
}

/// Context for any network of the default table.
pub(crate) fn network_env(network: &str) -> TestEnv {
    init_test_tracing();
    let dir = TempDir::new("lottery-test").unwrap();
    let config = project_config(&dir);
    let chain_id = config.networks.get(network).unwrap().chain_id;
    let ctx = LotteryContext::new(FakeChain::new(chain_id), &config, network).unwrap();
    TestEnv { dir, ctx }
}

/// Local development network.
pub(crate) fn local_env() -> TestEnv {
    network_env("localhost")
}

/// Public network, without a verification API key.
pub(crate) fn sepolia_env() -> TestEnv {
    network_env("sepolia")
}
