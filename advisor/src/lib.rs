//! AI access for the survey pipeline: the shared credential pool, the
//! transport contract and a retrying client that turns model replies into
//! untrusted mapping proposals.

pub mod client;
pub mod pool;
pub mod prompt;
pub mod transport;

pub use client::{AiClient, AiError};
pub use pool::{Credential, CredentialPool, CredentialSlot, PoolError, PoolSettings};
pub use transport::{AiTransport, FailureKind, ScriptedReply, ScriptedTransport, TransportFailure};
