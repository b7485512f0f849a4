//! Call lifecycle events
//!
//! Every committed state change publishes one event on the engine's
//! broadcast feed, in commit order. A call reaching a terminal state is
//! reported through [`CallEvent::Terminated`] in the same step that evicts it.

use serde::Serialize;

use crate::call::{CallId, CallRecord, TransferOutcome};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CallEvent {
    /// A call was admitted to the queue.
    Arrived { record: CallRecord },

    /// A call left the queue and a transfer attempt began.
    TransferStarted { record: CallRecord },

    /// A transfer failed and the call went back to the tail of the queue.
    Requeued { record: CallRecord, outcome: TransferOutcome },

    /// The call reached `Connected`, `Failed` or `Abandoned` and was evicted.
    Terminated { record: CallRecord },

    /// A record contradicting the queue was dropped.
    Evicted { call_id: CallId, reason: String },
}

impl CallEvent {
    pub fn call_id(&self) -> &CallId {
        match self {
            Self::Arrived { record }
            | Self::TransferStarted { record }
            | Self::Requeued { record, .. }
            | Self::Terminated { record } => &record.call_id,
            Self::Evicted { call_id, .. } => call_id,
        }
    }
}
