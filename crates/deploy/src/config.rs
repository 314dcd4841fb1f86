//! Tool configuration.
//!
//! The binary layers [`LotteryConfig::default`], a `Lottery.toml` file and
//! `LOTTERY_*` environment variables. Secrets (deployer key, verification API key)
//! are not part of this struct.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::NetworkTable;

/// The default name of the configuration file.
pub const CONFIG_FILENAME: &str = "Lottery.toml";

/// Locations of the files the frontend application reads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrontendConfig {
    /// Publish the frontend files after deploying.
    pub enabled: bool,
    /// JSON object mapping chain IDs to the lottery addresses deployed there.
    pub addresses_file: PathBuf,
    /// JSON ABI of the lottery.
    pub abi_file: PathBuf,
}

impl Default for FrontendConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            addresses_file: PathBuf::from("../lottery-frontend/constants/contractAddresses.json"),
            abi_file: PathBuf::from("../lottery-frontend/constants/abi.json"),
        }
    }
}

/// Source verification service settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationConfig {
    /// Etherscan-compatible API endpoint (the chain is passed as `chainid`).
    pub api_url: Url,
    /// Seconds between two verification status checks.
    pub poll_interval_secs: u64,
    /// Maximum number of status checks before giving up.
    pub max_status_checks: usize,
}

impl Default for VerificationConfig {
    fn default() -> Self {
        Self {
            api_url: Url::parse("https://api.etherscan.io/v2/api").expect("static URL is valid"),
            poll_interval_secs: 5,
            max_status_checks: 12,
        }
    }
}

/// Complete configuration of the deployment tooling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LotteryConfig {
    /// Root of the contracts project. Relative paths below are resolved against it.
    pub project_root: PathBuf,
    /// Directory holding the compiled artifacts.
    pub artifacts_dir: PathBuf,
    /// Directory where deployment records are kept, one sub-directory per network.
    pub deployments_dir: PathBuf,
    /// Seconds to wait for a transaction to be mined and confirmed.
    pub receipt_timeout_secs: u64,
    pub frontend: FrontendConfig,
    pub verification: VerificationConfig,
    pub networks: NetworkTable,
}

impl Default for LotteryConfig {
    fn default() -> Self {
        Self {
            project_root: PathBuf::from("."),
            artifacts_dir: PathBuf::from("out"),
            deployments_dir: PathBuf::from("deployments"),
            receipt_timeout_secs: 300,
            frontend: FrontendConfig::default(),
            verification: VerificationConfig::default(),
            networks: NetworkTable::default(),
        }
    }
}

impl LotteryConfig {
    /// Resolve a configured path against the project root.
    pub fn resolve(&self, path: &Path) -> PathBuf {
        self.project_root.join(path)
    }

    /// Anchor a relative project root at `dir`, the directory of the file the
    /// configuration was read from.
    pub fn anchored_at(mut self, dir: &Path) -> Self {
        self.project_root = if self.project_root == Path::new(".") {
            dir.to_path_buf()
        } else {
            dir.join(&self.project_root)
        };
        self
    }

    /// Render the configuration as TOML.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")
    }

    /// Save the configuration to a TOML file.
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.to_toml()?)
            .with_context(|| format!("Failed to write config to {}", path.display()))?;
        tracing::info!(path = %path.display(), "Configuration saved");
        Ok(())
    }
}
