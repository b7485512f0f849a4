//! # Holdline Transfer Engine
//!
//! In-memory call queue and transfer orchestration for inbound telephony.
//!
//! Callers are held in a FIFO waiting queue until someone asks for them to be
//! transferred to a live line. The engine tracks every call from arrival to
//! its terminal disposition (connected, failed or abandoned), redirects calls
//! through a pluggable [`TelephonyProvider`] and retries failed transfers
//! according to [`EngineConfig::max_attempts`].
//!
//! ## Architecture
//!
//! ```text
//!  webhooks / admin API
//!          │
//!          ▼
//!  ┌──────────────────┐  events   ┌───────────────────┐
//!  │   QueueEngine    │──────────▶│  broadcast feed   │
//!  │  (event ingress) │           └───────────────────┘
//!  └────────┬─────────┘
//!           │ single guard
//!  ┌────────▼─────────┐           ┌───────────────────┐
//!  │   Coordinator    │           │ TelephonyProvider │
//!  │ store + queue    │           │ (called unlocked) │
//!  └──────────────────┘           └───────────────────┘
//! ```
//!
//! All state changes go through one guard, in arrival order. Provider calls
//! are made after the guard is released and their failures come back in as
//! ordinary transfer status events.
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use holdline_transfer_engine::prelude::*;
//!
//! # async fn example() -> Result<()> {
//! let engine = QueueEngine::builder()
//!     .with_provider(Arc::new(LoggingProvider))
//!     .build()?;
//!
//! let accepted = engine.call_arrived(CallId::from("CA1"), "+15551230000").await?;
//! assert_eq!(accepted.queue_length, 1);
//!
//! let status = engine.queue_status();
//! assert_eq!(status.queued_calls[0].state, CallState::Queued);
//! # Ok(())
//! # }
//! ```

pub mod address;
pub mod call;
pub mod config;
pub mod coordinator;
pub mod engine;
pub mod error;
pub mod events;
pub mod provider;
pub mod queue;
pub mod store;
pub mod sweeper;

pub use call::{CallId, CallRecord, CallState, TransferOutcome};
pub use config::{AddressPolicy, EngineConfig};
pub use coordinator::{Abandonment, Coordinator, QueueStatus};
pub use engine::{
    CallAccepted, Cleared, ConnectPlan, QueueEngine, QueueEngineBuilder, StatusApplied, TransferAccepted,
    TransferDispatch,
};
pub use error::{ErrorKind, QueueError, Result};
pub use events::CallEvent;
pub use provider::{AttemptToken, CallInfo, LoggingProvider, ProviderError, TelephonyProvider, TransferRequest};
pub use sweeper::AbandonmentSweeper;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{
        CallAccepted, CallEvent, CallId, CallInfo, CallRecord, CallState, EngineConfig, ErrorKind,
        LoggingProvider, ProviderError, QueueEngine, QueueError, QueueStatus, Result, StatusApplied,
        TelephonyProvider, TransferAccepted, TransferDispatch, TransferOutcome, TransferRequest,
    };
}
