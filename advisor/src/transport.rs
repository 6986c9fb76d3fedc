use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::pool::Credential;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    QuotaExceeded,
    AuthRejected,
    Transient,
    MalformedResponse,
}

impl FailureKind {
    /// Quota and auth failures take the credential out of rotation.
    pub fn triggers_cooldown(self) -> bool {
        matches!(self, FailureKind::QuotaExceeded | FailureKind::AuthRejected)
    }
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            FailureKind::QuotaExceeded => "quota_exceeded",
            FailureKind::AuthRejected => "auth_rejected",
            FailureKind::Transient => "transient",
            FailureKind::MalformedResponse => "malformed_response",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportFailure {
    pub kind: FailureKind,
    pub message: String,
}

impl TransportFailure {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for TransportFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl std::error::Error for TransportFailure {}

/// The wire to the language model. Implementations own the network call;
/// the credential is chosen by the caller.
#[async_trait]
pub trait AiTransport: Send + Sync {
    async fn send(&self, credential: &Credential, prompt: &str)
        -> Result<String, TransportFailure>;
}

#[derive(Debug, Clone)]
pub enum ScriptedReply {
    Reply(String),
    Fail(FailureKind),
    /// Never answers within any sane timeout.
    Stall,
}

/// Replays a fixed script of replies, one per call, and records which
/// credential and prompt each call used.
#[derive(Default)]
pub struct ScriptedTransport {
    script: Mutex<VecDeque<ScriptedReply>>,
    calls: Mutex<Vec<Credential>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedTransport {
    pub fn new(script: impl IntoIterator<Item = ScriptedReply>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into_iter().collect()),
            calls: Mutex::new(Vec::new()),
            prompts: Mutex::new(Vec::new()),
        })
    }

    pub fn replying(reply: impl Into<String>) -> Arc<Self> {
        Self::new([ScriptedReply::Reply(reply.into())])
    }

    pub fn calls(&self) -> Vec<Credential> {
        self.calls
            .lock()
            .map(|calls| calls.clone())
            .unwrap_or_default()
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts
            .lock()
            .map(|prompts| prompts.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl AiTransport for ScriptedTransport {
    async fn send(
        &self,
        credential: &Credential,
        prompt: &str,
    ) -> Result<String, TransportFailure> {
        let next = {
            if let Ok(mut prompts) = self.prompts.lock() {
                prompts.push(prompt.to_string());
            }
            let mut calls = self
                .calls
                .lock()
                .map_err(|_| TransportFailure::new(FailureKind::Transient, "lock poisoned"))?;
            calls.push(credential.clone());
            let mut script = self
                .script
                .lock()
                .map_err(|_| TransportFailure::new(FailureKind::Transient, "lock poisoned"))?;
            script.pop_front()
        };

        match next {
            Some(ScriptedReply::Reply(text)) => Ok(text),
            Some(ScriptedReply::Fail(kind)) => {
                Err(TransportFailure::new(kind, format!("scripted {}", kind)))
            }
            Some(ScriptedReply::Stall) => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Err(TransportFailure::new(FailureKind::Transient, "stalled"))
            }
            None => Err(TransportFailure::new(
                FailureKind::Transient,
                "script exhausted",
            )),
        }
    }
}
