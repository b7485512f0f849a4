use thiserror::Error;

use crate::call::CallId;
use crate::provider::ProviderError;

/// Broad classes of failure an event can end in.
///
/// Transports use the kind to decide how to surface a failure (status code,
/// retry, alert) without matching every variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The event was malformed; nothing was mutated.
    Validation,
    /// The event collides with existing state; nothing was mutated.
    Conflict,
    /// The call is not in the state the event assumed. Expected under races.
    NotFound,
    /// The telephony provider could not serve a read-through request.
    Provider,
    /// Something inside the engine is wrong.
    Internal,
}

/// Error types for queue and transfer operations
///
/// # Examples
///
/// ```
/// use holdline_transfer_engine::{CallId, ErrorKind, QueueError};
///
/// let err = QueueError::CallNotFound(CallId::from("CA1"));
/// assert_eq!(err.kind(), ErrorKind::NotFound);
/// assert!(err.is_expected());
/// ```
#[derive(Error, Debug)]
pub enum QueueError {
    /// A call with this identifier is already tracked.
    #[error("Call {0} already exists")]
    DuplicateCall(CallId),

    /// The identifier is already present in the waiting queue.
    #[error("Call {0} is already queued")]
    AlreadyQueued(CallId),

    /// The call is unknown or not in the state the event requires.
    #[error("Call {0} not found")]
    CallNotFound(CallId),

    /// Destination address was empty or could not be normalized.
    #[error("Invalid destination '{destination}': {reason}")]
    InvalidDestination { destination: String, reason: String },

    /// A required event field was empty.
    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    /// Read-through provider request failed.
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    /// The call record and the queue disagree. The record has been evicted.
    #[error("Invariant violation for call {call_id}: {detail}")]
    InvariantViolation { call_id: CallId, detail: String },

    /// Engine configuration failed validation.
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl QueueError {
    /// Create an InvalidDestination error
    pub fn invalid_destination<D: Into<String>, R: Into<String>>(destination: D, reason: R) -> Self {
        Self::InvalidDestination {
            destination: destination.into(),
            reason: reason.into(),
        }
    }

    /// Create an InvariantViolation error
    pub fn invariant<S: Into<String>>(call_id: &CallId, detail: S) -> Self {
        Self::InvariantViolation {
            call_id: call_id.clone(),
            detail: detail.into(),
        }
    }

    /// Create a Configuration error
    pub fn configuration<S: Into<String>>(msg: S) -> Self {
        Self::Configuration(msg.into())
    }

    /// Classify the error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidDestination { .. } | Self::MissingField(_) => ErrorKind::Validation,
            Self::DuplicateCall(_) | Self::AlreadyQueued(_) => ErrorKind::Conflict,
            Self::CallNotFound(_) => ErrorKind::NotFound,
            Self::Provider(_) => ErrorKind::Provider,
            Self::InvariantViolation { .. } | Self::Configuration(_) => ErrorKind::Internal,
        }
    }

    /// True for outcomes that are a normal part of operation rather than a fault
    pub fn is_expected(&self) -> bool {
        !matches!(self.kind(), ErrorKind::Internal)
    }
}

/// Result type for queue and transfer operations
pub type Result<T> = std::result::Result<T, QueueError>;
