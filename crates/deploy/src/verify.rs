//! Source verification through an Etherscan-compatible API.
//!
//! A submission carries the standard-JSON compiler input rebuilt from the artifact
//! metadata. The service answers with a GUID whose status is then polled until the
//! verification passes or fails.

use std::{path::Path, time::Duration};

use alloy_core::primitives::{Address, Bytes};
use anyhow::{Context, Result};
use backon::{ConstantBuilder, Retryable};
use serde::Deserialize;
use serde_json::{Map, Value, json};
use url::Url;

use crate::{LotteryError, artifacts::ContractArtifact};

/// Settings keys that are part of the metadata but not of the compiler input.
const METADATA_ONLY_SETTINGS: [&str; 1] = ["compilationTarget"];

/// Everything the verification service needs about one deployed contract.
#[derive(Debug, Clone)]
pub struct VerificationRequest {
    pub address: Address,
    /// Fully qualified name, `<source path>:<contract name>`.
    pub contract_name: String,
    /// Compiler version prefixed with `v`, e.g. `v0.8.19+commit.7dd6d404`.
    pub compiler_version: String,
    pub standard_json_input: Value,
    pub constructor_args: Bytes,
}

impl VerificationRequest {
    /// Build a request from the artifact the contract was deployed from.
    ///
    /// Sources not embedded in the metadata are read from `project_root`.
    pub fn from_artifact(
        artifact: &ContractArtifact,
        project_root: &Path,
        address: Address,
        constructor_args: Bytes,
    ) -> Result<Self> {
        let metadata = artifact.metadata.as_ref().with_context(|| {
            format!("Artifact of {} has no compiler metadata", artifact.name)
        })?;

        let (source_path, name) = metadata.compilation_target().with_context(|| {
            format!("Metadata of {} has no compilation target", artifact.name)
        })?;

        let mut sources = Map::new();
        for (path, source) in &metadata.sources {
            let content = match source.get("content").and_then(Value::as_str) {
                Some(content) => content.to_string(),
                None => std::fs::read_to_string(project_root.join(path))
                    .with_context(|| format!("Failed to read source {path} for verification"))?,
            };
            sources.insert(path.clone(), json!({ "content": content }));
        }

        let mut settings = metadata.settings.as_object().cloned().unwrap_or_default();
        for key in METADATA_ONLY_SETTINGS {
            settings.remove(key);
        }
        settings.insert(
            "outputSelection".to_string(),
            json!({ "*": { "*": ["abi", "evm.bytecode", "evm.deployedBytecode"] } }),
        );

        let version = metadata.compiler.version.trim_start_matches('v');

        Ok(Self {
            address,
            contract_name: format!("{source_path}:{name}"),
            compiler_version: format!("v{version}"),
            standard_json_input: json!({
                "language": metadata.language,
                "sources": sources,
                "settings": settings,
            }),
            constructor_args,
        })
    }
}

/// Answer of the verification API, common to every action.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiResponse {
    pub status: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub result: Value,
}

impl ApiResponse {
    fn result_text(&self) -> String {
        match &self.result {
            Value::String(text) => text.clone(),
            other => other.to_string(),
        }
    }
}

/// What happened to a submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Submission {
    /// Queued for verification under this GUID.
    Queued(String),
    /// The contract was verified before.
    AlreadyVerified,
}

/// State of a queued verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum VerificationStatus {
    Pending,
    Verified,
    AlreadyVerified,
}

fn is_already_verified(text: &str) -> bool {
    text.to_ascii_lowercase().contains("already verified")
}

/// Interpret the answer to a `verifysourcecode` submission.
pub fn interpret_submission(response: &ApiResponse) -> Result<Submission, LotteryError> {
    let result = response.result_text();
    if is_already_verified(&result) {
        return Ok(Submission::AlreadyVerified);
    }
    if response.status == "1" {
        return Ok(Submission::Queued(result));
    }
    Err(LotteryError::VerificationFailure(format!(
        "{}: {result}",
        response.message
    )))
}

/// Interpret the answer to a `checkverifystatus` query.
pub fn interpret_status(response: &ApiResponse) -> Result<VerificationStatus, LotteryError> {
    let result = response.result_text();
    if is_already_verified(&result) {
        return Ok(VerificationStatus::AlreadyVerified);
    }
    if result.to_ascii_lowercase().contains("pending") {
        return Ok(VerificationStatus::Pending);
    }
    if response.status == "1" {
        return Ok(VerificationStatus::Verified);
    }
    Err(LotteryError::VerificationFailure(result))
}

#[derive(Debug, thiserror::Error)]
#[error("verification is still pending")]
struct StillPending;

/// Client of an Etherscan-compatible verification API for one chain.
#[derive(Debug, Clone)]
pub struct EtherscanClient {
    client: reqwest::Client,
    api_url: Url,
    api_key: String,
    chain_id: u64,
}

impl EtherscanClient {
    pub fn new(api_url: Url, api_key: String, chain_id: u64) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            api_url,
            api_key,
            chain_id,
        })
    }

    async fn post_form(&self, form: &[(&str, &str)]) -> Result<ApiResponse> {
        let chain_id = self.chain_id.to_string();
        let response = self
            .client
            .post(self.api_url.clone())
            .query(&[("chainid", chain_id.as_str())])
            .form(form)
            .send()
            .await
            .with_context(|| format!("Failed to reach verification API at {}", self.api_url))?;

        response
            .json()
            .await
            .context("Failed to parse verification API response")
    }

    /// Submit the sources of a deployed contract.
    pub async fn submit(&self, request: &VerificationRequest) -> Result<Submission> {
        let source_code = serde_json::to_string(&request.standard_json_input)
            .context("Failed to serialize compiler input")?;
        let address = request.address.to_checksum(None);
        let constructor_args = hex::encode(&request.constructor_args);

        let form = [
            ("apikey", self.api_key.as_str()),
            ("module", "contract"),
            ("action", "verifysourcecode"),
            ("contractaddress", address.as_str()),
            ("sourceCode", source_code.as_str()),
            ("codeformat", "solidity-standard-json-input"),
            ("contractname", request.contract_name.as_str()),
            ("compilerversion", request.compiler_version.as_str()),
            // Misspelled on the API side.
            ("constructorArguements", constructor_args.as_str()),
        ];

        let response = self.post_form(&form).await?;
        tracing::debug!(status = %response.status, message = %response.message, "Verification submitted");
        Ok(interpret_submission(&response)?)
    }

    /// Query the state of a submission.
    pub async fn check_status(&self, guid: &str) -> Result<VerificationStatus> {
        let form = [
            ("apikey", self.api_key.as_str()),
            ("module", "contract"),
            ("action", "checkverifystatus"),
            ("guid", guid),
        ];

        let response = self.post_form(&form).await?;
        Ok(interpret_status(&response)?)
    }

    /// Submit a contract and wait until the service decides.
    ///
    /// The status is checked every `poll_interval`, at most `max_status_checks` times.
    /// A pending status after the last check is a [`LotteryError::VerificationFailure`].
    pub async fn verify(
        &self,
        request: &VerificationRequest,
        poll_interval: Duration,
        max_status_checks: usize,
    ) -> Result<VerificationStatus> {
        let guid = match self.submit(request).await? {
            Submission::AlreadyVerified => return Ok(VerificationStatus::AlreadyVerified),
            Submission::Queued(guid) => guid,
        };

        tracing::info!(%guid, address = %request.address, "Waiting for verification result");

        let guid = guid.as_str();
        wait_for_decision(|| self.check_status(guid), poll_interval, max_status_checks).await
    }
}

/// Run `check` every `poll_interval` until it reports a decision, at most
/// `max_status_checks` times and at least once.
async fn wait_for_decision<F, Fut>(
    mut check: F,
    poll_interval: Duration,
    max_status_checks: usize,
) -> Result<VerificationStatus>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<VerificationStatus>>,
{
    let probe = || {
        let status = check();
        async move {
            match status.await? {
                VerificationStatus::Pending => Err(anyhow::Error::new(StillPending)),
                decided => Ok(decided),
            }
        }
    };

    // The first check is not a retry.
    probe
        .retry(
            ConstantBuilder::default()
                .with_delay(poll_interval)
                .with_max_times(max_status_checks.saturating_sub(1)),
        )
        .when(|err: &anyhow::Error| err.is::<StillPending>())
        .notify(|_, delay| tracing::debug!(?delay, "Verification pending"))
        .await
        .map_err(|err| {
            if err.is::<StillPending>() {
                anyhow::Error::from(LotteryError::VerificationFailure(format!(
                    "still pending after {} status checks",
                    max_status_checks.max(1)
                )))
            } else {
                err
            }
        })
}
