//! # Telephony Provider Interface
//!
//! The engine never signals calls itself. It asks a [`TelephonyProvider`] to
//! redirect a held call and learns the outcome later through a transfer
//! status event. Implementations wrap a concrete carrier API; tests plug in
//! scripted fakes.
//!
//! A provider error from [`TelephonyProvider::initiate_transfer`] is not
//! surfaced to the requester as a fault. The engine converts it into a
//! `failed` transfer status and runs it through the ordinary retry policy.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::call::CallId;

/// Everything the provider needs to redirect one call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferRequest {
    pub call_id: CallId,
    /// Normalized E.164 destination
    pub destination: String,
    /// Where the provider fetches connect instructions and posts dial status
    pub status_callback: String,
    /// Attempt number this request belongs to (1-based)
    pub attempt: u32,
}

/// Provider-issued handle for one transfer attempt.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AttemptToken(pub String);

impl std::fmt::Display for AttemptToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Provider's view of a call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallInfo {
    pub call_id: CallId,
    pub status: String,
    #[serde(default)]
    pub from: Option<String>,
    #[serde(default)]
    pub to: Option<String>,
    #[serde(default)]
    pub duration_secs: Option<u64>,
}

/// Failures talking to the telephony provider
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    #[error("Provider rejected request ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Unexpected provider response: {0}")]
    Decode(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),
}

/// Narrow interface to the carrier that performs call signaling.
#[async_trait]
pub trait TelephonyProvider: Send + Sync {
    /// Redirect a held call towards `request.destination`.
    async fn initiate_transfer(&self, request: &TransferRequest) -> Result<AttemptToken, ProviderError>;

    /// Look up the provider's record of a call.
    async fn fetch_call_info(&self, call_id: &CallId) -> Result<CallInfo, ProviderError>;

    /// Best-effort cancellation of an in-flight transfer. Never retried.
    async fn cancel_transfer(&self, _call_id: &CallId) -> Result<(), ProviderError> {
        Ok(())
    }
}

/// Provider that accepts every transfer and only logs it.
///
/// Used for local development when no carrier credentials are configured.
#[derive(Debug, Default, Clone)]
pub struct LoggingProvider;

#[async_trait]
impl TelephonyProvider for LoggingProvider {
    async fn initiate_transfer(&self, request: &TransferRequest) -> Result<AttemptToken, ProviderError> {
        info!(
            call_id = %request.call_id,
            destination = %request.destination,
            attempt = request.attempt,
            "📞 [dry-run] transfer requested"
        );
        Ok(AttemptToken(format!("dry-run-{}", uuid::Uuid::new_v4())))
    }

    async fn fetch_call_info(&self, call_id: &CallId) -> Result<CallInfo, ProviderError> {
        Err(ProviderError::NotConfigured(format!(
            "no telephony provider configured to look up {}",
            call_id
        )))
    }
}
