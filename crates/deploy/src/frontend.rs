//! Files read by the lottery frontend: the address map and the ABI.

use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use alloy_core::{json_abi::JsonAbi, primitives::Address};
use anyhow::{Context, Result};

use crate::{LotteryError, config::FrontendConfig, deployer::DeploymentRecord};

/// Chain ID (decimal string) to the checksummed lottery addresses deployed there.
pub type FrontendAddressMap = BTreeMap<String, Vec<String>>;

/// How the address map changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum AddressUpdate {
    /// The chain had no entry yet.
    FirstSeen,
    /// The address was added to the chain's entry.
    Appended,
    /// The address was already listed, the file is left untouched.
    AlreadyPresent,
}

/// Writes the frontend files after a deployment.
#[derive(Debug, Clone)]
pub struct FrontendPublisher {
    addresses_file: PathBuf,
    abi_file: PathBuf,
}

impl FrontendPublisher {
    pub fn new(addresses_file: impl Into<PathBuf>, abi_file: impl Into<PathBuf>) -> Self {
        Self {
            addresses_file: addresses_file.into(),
            abi_file: abi_file.into(),
        }
    }

    pub fn from_config(config: &FrontendConfig) -> Self {
        Self::new(&config.addresses_file, &config.abi_file)
    }

    pub fn addresses_file(&self) -> &Path {
        &self.addresses_file
    }

    pub fn abi_file(&self) -> &Path {
        &self.abi_file
    }

    /// Overwrite the ABI file with `abi`.
    pub fn update_abi(&self, abi: &JsonAbi) -> Result<()> {
        let json = serde_json::to_string(abi).context("Failed to serialize ABI")?;
        std::fs::write(&self.abi_file, json)
            .with_context(|| format!("Failed to write ABI to {}", self.abi_file.display()))?;

        tracing::info!(path = %self.abi_file.display(), "Frontend ABI updated");
        Ok(())
    }

    /// Read the address map. A missing file is an empty map.
    pub fn read_addresses(&self) -> Result<FrontendAddressMap> {
        let path = &self.addresses_file;
        if !path.exists() {
            return Ok(FrontendAddressMap::new());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;

        let map = serde_json::from_str(&content).map_err(|err| LotteryError::MalformedState {
            path: path.clone(),
            reason: err.to_string(),
        })?;

        Ok(map)
    }

    /// Record `address` for `chain_id` in the address map.
    ///
    /// Addresses are compared case-insensitively and written checksummed.
    pub fn update_addresses(&self, chain_id: u64, address: Address) -> Result<AddressUpdate> {
        let mut map = self.read_addresses()?;
        let key = chain_id.to_string();
        let checksummed = address.to_checksum(None);

        let update = match map.get_mut(&key) {
            Some(addresses)
                if addresses
                    .iter()
                    .any(|known| known.eq_ignore_ascii_case(&checksummed)) =>
            {
                AddressUpdate::AlreadyPresent
            }
            Some(addresses) => {
                addresses.push(checksummed);
                AddressUpdate::Appended
            }
            None => {
                map.insert(key, vec![checksummed]);
                AddressUpdate::FirstSeen
            }
        };

        if update != AddressUpdate::AlreadyPresent {
            let json = serde_json::to_string(&map).context("Failed to serialize address map")?;
            std::fs::write(&self.addresses_file, json).with_context(|| {
                format!("Failed to write {}", self.addresses_file.display())
            })?;
        }

        tracing::info!(chain_id, %address, %update, "Frontend address map updated");
        Ok(update)
    }

    /// Publish a lottery deployment: address map first, then the ABI.
    pub fn publish(&self, chain_id: u64, record: &DeploymentRecord) -> Result<AddressUpdate> {
        let update = self.update_addresses(chain_id, record.address)?;
        self.update_abi(&record.abi)?;
        Ok(update)
    }
}
