//! Compiled contract artifacts.
//!
//! Artifacts are read from a Foundry `out/` directory (`<Name>.sol/<Name>.json`).
//! A flat `<Name>.json` file is accepted as well, with the bytecode either as a
//! plain hex string or as a `{ "object": "0x..." }` object.

use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use alloy_core::{json_abi::JsonAbi, primitives::Bytes};
use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::Value;
use sha2::{Digest, Sha256};

/// Compiler settings and sources recorded in the artifact metadata.
#[derive(Debug, Clone, Deserialize)]
pub struct ArtifactMetadata {
    pub compiler: CompilerInfo,
    #[serde(default = "default_language")]
    pub language: String,
    pub settings: Value,
    #[serde(default)]
    pub sources: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CompilerInfo {
    /// Full compiler version, e.g. `0.8.19+commit.7dd6d404`.
    pub version: String,
}

fn default_language() -> String {
    "Solidity".to_string()
}

impl ArtifactMetadata {
    /// The `(source path, contract name)` this artifact was compiled for.
    pub fn compilation_target(&self) -> Option<(String, String)> {
        self.settings
            .get("compilationTarget")?
            .as_object()?
            .iter()
            .next()
            .and_then(|(path, name)| Some((path.clone(), name.as_str()?.to_string())))
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawBytecode {
    Hex(String),
    Object { object: String },
}

#[derive(Debug, Deserialize)]
struct RawArtifact {
    abi: JsonAbi,
    bytecode: RawBytecode,
    #[serde(default)]
    metadata: Option<Value>,
}

/// A compiled contract: interface, init code and compiler metadata.
#[derive(Debug, Clone)]
pub struct ContractArtifact {
    pub name: String,
    pub abi: JsonAbi,
    pub bytecode: Bytes,
    pub metadata: Option<ArtifactMetadata>,
}

impl ContractArtifact {
    /// Candidate locations of an artifact inside `artifacts_dir`.
    fn candidate_paths(artifacts_dir: &Path, name: &str) -> [PathBuf; 2] {
        [
            artifacts_dir.join(format!("{name}.sol")).join(format!("{name}.json")),
            artifacts_dir.join(format!("{name}.json")),
        ]
    }

    /// Load the artifact of contract `name` from `artifacts_dir`.
    pub fn load(artifacts_dir: &Path, name: &str) -> Result<Self> {
        let path = Self::candidate_paths(artifacts_dir, name)
            .into_iter()
            .find(|path| path.is_file())
            .with_context(|| {
                format!(
                    "No artifact for {} in {}. Compile the contracts first.",
                    name,
                    artifacts_dir.display()
                )
            })?;

        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read artifact {}", path.display()))?;

        Self::parse(name, &content).with_context(|| format!("Invalid artifact {}", path.display()))
    }

    /// Parse an artifact from its JSON content.
    pub fn parse(name: &str, content: &str) -> Result<Self> {
        let raw: RawArtifact = serde_json::from_str(content).context("Failed to parse artifact JSON")?;

        let hex_code = match raw.bytecode {
            RawBytecode::Hex(hex_code) | RawBytecode::Object { object: hex_code } => hex_code,
        };
        let bytecode: Bytes = hex_code
            .parse()
            .with_context(|| format!("Bytecode of {name} is not valid hex"))?;
        if bytecode.is_empty() {
            anyhow::bail!("{name} has no deployable bytecode (abstract contract or interface?)");
        }

        // Foundry stores metadata as an object, other toolchains as a JSON string.
        let metadata = match raw.metadata {
            Some(Value::String(encoded)) => serde_json::from_str(&encoded).ok(),
            Some(value) => serde_json::from_value(value).ok(),
            None => None,
        };

        Ok(Self {
            name: name.to_string(),
            abi: raw.abi,
            bytecode,
            metadata,
        })
    }

    /// SHA-256 of the init code, used to tell whether a stored deployment is current.
    pub fn bytecode_hash(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(&self.bytecode);
        hex::encode(hasher.finalize())
    }

    /// Creation input: init code followed by the ABI-encoded constructor arguments.
    pub fn init_code(&self, constructor_args: &[u8]) -> Bytes {
        let mut input = self.bytecode.to_vec();
        input.extend_from_slice(constructor_args);
        input.into()
    }
}
