//! Call identifiers, lifecycle states and the per-call record.

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{QueueError, Result};

/// Opaque call identifier assigned by the telephony provider on arrival.
#[derive(Debug, Clone, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CallId(pub String);

impl CallId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CallId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for CallId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for CallId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Lifecycle state of a tracked call
///
/// ```text
/// Queued ──transfer──▶ Transferring ──connected──▶ Connected
///   │  ▲                    │  │
///   │  └──failed (retry)────┘  └──failed (final)──▶ Failed
///   └──────admin clear──────────┴─────────────────▶ Abandoned
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallState {
    Queued,
    Transferring,
    Connected,
    Failed,
    Abandoned,
}

impl CallState {
    /// No transition leaves a terminal state.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Connected | Self::Failed | Self::Abandoned)
    }

    /// Whether `self -> next` is an edge of the lifecycle graph.
    pub fn can_transition_to(self, next: CallState) -> bool {
        use CallState::*;
        matches!(
            (self, next),
            (Queued, Transferring)
                | (Queued, Abandoned)
                | (Transferring, Connected)
                | (Transferring, Failed)
                | (Transferring, Queued)
                | (Transferring, Abandoned)
        )
    }
}

impl fmt::Display for CallState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Queued => "queued",
            Self::Transferring => "transferring",
            Self::Connected => "connected",
            Self::Failed => "failed",
            Self::Abandoned => "abandoned",
        };
        f.write_str(s)
    }
}

/// Outcome of a transfer attempt as reported by the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TransferOutcome {
    Connected,
    Failed,
    NoAnswer,
    Busy,
}

impl TransferOutcome {
    pub fn is_success(self) -> bool {
        matches!(self, Self::Connected)
    }

    /// Map a provider dial status onto an outcome.
    ///
    /// `completed` and `answered` both mean the destination picked up;
    /// `canceled` is folded into `failed`.
    ///
    /// ```
    /// use holdline_transfer_engine::TransferOutcome;
    ///
    /// assert_eq!(TransferOutcome::from_dial_status("answered"), Some(TransferOutcome::Connected));
    /// assert_eq!(TransferOutcome::from_dial_status("no-answer"), Some(TransferOutcome::NoAnswer));
    /// assert_eq!(TransferOutcome::from_dial_status("ringing"), None);
    /// ```
    pub fn from_dial_status(status: &str) -> Option<Self> {
        match status.trim().to_ascii_lowercase().as_str() {
            "completed" | "answered" | "connected" => Some(Self::Connected),
            "failed" | "canceled" | "cancelled" => Some(Self::Failed),
            "no-answer" | "no_answer" => Some(Self::NoAnswer),
            "busy" => Some(Self::Busy),
            _ => None,
        }
    }
}

impl fmt::Display for TransferOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Connected => "connected",
            Self::Failed => "failed",
            Self::NoAnswer => "no-answer",
            Self::Busy => "busy",
        };
        f.write_str(s)
    }
}

/// Authoritative state of one call known to the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallRecord {
    pub call_id: CallId,
    /// Caller number, fixed at creation
    pub from_address: String,
    pub state: CallState,
    /// Transfer attempts initiated so far
    pub attempts: u32,
    pub enqueued_at: DateTime<Utc>,
    pub last_updated_at: DateTime<Utc>,
    /// Normalized target of the current or most recent transfer
    pub destination: Option<String>,
}

impl CallRecord {
    pub(crate) fn new(call_id: CallId, from_address: String, now: DateTime<Utc>) -> Self {
        Self {
            call_id,
            from_address,
            state: CallState::Queued,
            attempts: 0,
            enqueued_at: now,
            last_updated_at: now,
            destination: None,
        }
    }

    /// Time since admission.
    pub fn wait_time(&self, now: DateTime<Utc>) -> Duration {
        now.signed_duration_since(self.enqueued_at)
    }

    /// Move to `next`, refusing edges outside the lifecycle graph.
    ///
    /// Nothing is written when the edge is refused.
    pub(crate) fn transition(&mut self, next: CallState, now: DateTime<Utc>) -> Result<()> {
        if !self.state.can_transition_to(next) {
            return Err(QueueError::invariant(
                &self.call_id,
                format!("illegal transition {} -> {}", self.state, next),
            ));
        }
        self.state = next;
        self.last_updated_at = now;
        Ok(())
    }
}
