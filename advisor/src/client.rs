use sociogram_core::config::{AppConfig, CredentialsConfig};
use sociogram_core::error::{ErrorCode, SociogramError};
use sociogram_core::model::AliasHint;
use sociogram_core::proposal::MappingProposal;
use sociogram_core::table::RawTable;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::timeout;
use tracing::{info, warn};

use crate::pool::{Credential, CredentialPool, PoolError};
use crate::prompt::{build_alias_prompt, build_mapping_prompt, parse_alias_reply, parse_mapping_reply};
use crate::transport::{AiTransport, FailureKind, TransportFailure};

pub const DEFAULT_MAX_ATTEMPTS: usize = 3;
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_SAMPLE_ROWS: usize = 20;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AiError {
    #[error("credential pool: {0}")]
    Pool(#[from] PoolError),
    #[error("AI call failed after {attempts} attempts (last: {kind}: {message})")]
    CallFailed {
        attempts: usize,
        kind: FailureKind,
        message: String,
    },
}

impl SociogramError for AiError {
    fn error_code(&self) -> ErrorCode {
        match self {
            AiError::Pool(err) => err.error_code(),
            AiError::CallFailed { .. } => ErrorCode::Unavailable,
        }
    }
}

/// Sends prompts through the credential pool with bounded retries. Each
/// retry goes to a different credential when one is available.
pub struct AiClient {
    pool: Arc<CredentialPool>,
    transport: Arc<dyn AiTransport>,
    max_attempts: usize,
    call_timeout: Duration,
    sample_rows: usize,
}

impl AiClient {
    pub fn new(pool: Arc<CredentialPool>, transport: Arc<dyn AiTransport>) -> Self {
        Self {
            pool,
            transport,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            call_timeout: DEFAULT_CALL_TIMEOUT,
            sample_rows: DEFAULT_SAMPLE_ROWS,
        }
    }

    pub fn from_config(config: &CredentialsConfig, transport: Arc<dyn AiTransport>) -> Self {
        Self::new(Arc::new(CredentialPool::from_config(config)), transport)
            .with_max_attempts(config.max_attempts)
            .with_call_timeout(Duration::from_millis(config.call_timeout_ms))
    }

    pub fn from_app_config(config: &AppConfig, transport: Arc<dyn AiTransport>) -> Self {
        Self::from_config(&config.credentials, transport)
            .with_sample_rows(config.analysis.prompt_sample_rows)
    }

    pub fn with_max_attempts(mut self, max_attempts: usize) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn with_call_timeout(mut self, call_timeout: Duration) -> Self {
        self.call_timeout = call_timeout;
        self
    }

    pub fn with_sample_rows(mut self, sample_rows: usize) -> Self {
        self.sample_rows = sample_rows;
        self
    }

    pub fn pool(&self) -> &Arc<CredentialPool> {
        &self.pool
    }

    pub async fn request(&self, prompt: &str) -> Result<String, AiError> {
        self.request_parsed(prompt, |reply| Some(reply.to_string()))
            .await
    }

    pub async fn propose_mapping(&self, table: &RawTable) -> Result<MappingProposal, AiError> {
        let prompt = build_mapping_prompt(table, self.sample_rows);
        let proposal = self.request_parsed(&prompt, parse_mapping_reply).await?;
        info!(
            "AI proposed {} relation(s) for {} columns",
            proposal.relations.len(),
            table.columns().len()
        );
        Ok(proposal)
    }

    pub async fn suggest_aliases(&self, names: &[String]) -> Result<Vec<AliasHint>, AiError> {
        if names.is_empty() {
            return Ok(Vec::new());
        }
        let prompt = build_alias_prompt(names);
        self.request_parsed(&prompt, parse_alias_reply).await
    }

    /// A reply that `parse` rejects counts as a malformed-response failure
    /// of the credential that produced it and is retried.
    async fn request_parsed<T, F>(&self, prompt: &str, parse: F) -> Result<T, AiError>
    where
        F: Fn(&str) -> Option<T>,
    {
        let mut tried: Vec<Credential> = Vec::new();
        let mut last_failure: Option<TransportFailure> = None;

        for attempt in 1..=self.max_attempts {
            let credential = self.pool.acquire_excluding(&tried)?;

            let outcome = match timeout(self.call_timeout, self.transport.send(&credential, prompt))
                .await
            {
                Ok(Ok(reply)) => parse(&reply).ok_or_else(|| {
                    TransportFailure::new(
                        FailureKind::MalformedResponse,
                        "reply did not contain the expected JSON",
                    )
                }),
                Ok(Err(failure)) => Err(failure),
                Err(_) => Err(TransportFailure::new(
                    FailureKind::Transient,
                    format!("no reply within {:?}", self.call_timeout),
                )),
            };

            match outcome {
                Ok(value) => {
                    self.pool.report_success(&credential)?;
                    return Ok(value);
                }
                Err(failure) => {
                    warn!(
                        "AI call attempt {}/{} with credential {} failed: {}",
                        attempt, self.max_attempts, credential, failure
                    );
                    self.pool.report_failure(&credential, failure.kind)?;
                    tried.push(credential);
                    last_failure = Some(failure);
                }
            }
        }

        let failure = last_failure.unwrap_or_else(|| {
            TransportFailure::new(FailureKind::Transient, "no attempt was made")
        });
        Err(AiError::CallFailed {
            attempts: self.max_attempts,
            kind: failure.kind,
            message: failure.message,
        })
    }
}
