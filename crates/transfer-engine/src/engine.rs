//! # Queue Engine
//!
//! Event ingress for the transfer engine. Each entry point validates its
//! event, takes the engine-wide guard, hands the event to the
//! [`Coordinator`], publishes the resulting [`CallEvent`]s and releases the
//! guard before returning a typed result.
//!
//! The guard is a `parking_lot::Mutex` whose guard cannot be held across an
//! `.await`, so no provider I/O can ever happen while the state is locked.
//! A transfer is dispatched to the provider only after the dequeue and the
//! `Transferring` transition have been committed; if the provider refuses,
//! that refusal re-enters the engine as an ordinary `failed` status report.
//!
//! ## Examples
//!
//! ```rust
//! use std::sync::Arc;
//! use holdline_transfer_engine::prelude::*;
//!
//! # async fn example() -> Result<()> {
//! let engine = QueueEngine::builder()
//!     .with_config(EngineConfig::default())
//!     .with_provider(Arc::new(LoggingProvider))
//!     .build()?;
//!
//! engine.call_arrived(CallId::from("CA1"), "+15551230000").await?;
//! let accepted = engine.transfer_requested(&CallId::from("CA1"), "5559999999").await?;
//! assert_eq!(accepted.destination, "+15559999999");
//! assert_eq!(accepted.attempts, 1);
//!
//! let applied = engine
//!     .transfer_status_reported(&CallId::from("CA1"), TransferOutcome::Connected)
//!     .await?;
//! assert_eq!(applied.state, CallState::Connected);
//! assert_eq!(engine.queue_status().queue_length, 0);
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::address::normalize_destination;
use crate::call::{CallId, CallRecord, CallState, TransferOutcome};
use crate::config::EngineConfig;
use crate::coordinator::{Abandonment, Coordinator, QueueStatus};
use crate::error::{ErrorKind, QueueError, Result};
use crate::events::CallEvent;
use crate::provider::{AttemptToken, CallInfo, TelephonyProvider, TransferRequest};
use crate::sweeper::AbandonmentSweeper;

/// A call was admitted to the queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CallAccepted {
    pub call_id: CallId,
    pub position: usize,
    pub queue_length: usize,
}

/// What happened when the transfer was handed to the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TransferDispatch {
    /// The provider accepted the redirect; the outcome arrives later.
    Initiated { token: AttemptToken },
    /// The provider refused. The refusal was applied as a failed status,
    /// leaving the call in `state` (`None` if it was cleared meanwhile).
    ProviderFailed { reason: String, state: Option<CallState> },
}

/// A transfer attempt was started.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransferAccepted {
    pub call_id: CallId,
    pub destination: String,
    pub attempts: u32,
    pub dispatch: TransferDispatch,
}

/// A transfer status was applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusApplied {
    pub call_id: CallId,
    pub state: CallState,
    pub attempts: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Cleared {
    pub cleared: usize,
}

/// Normalized data the caller-ID presentation layer turns into provider
/// connect instructions for a call with a transfer in flight.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectPlan {
    pub call_id: CallId,
    pub destination: String,
    pub caller_id: Option<String>,
    pub dial_timeout_secs: u32,
    pub record_from_answer: bool,
    pub attempt: u32,
}

/// The call queue and transfer orchestration engine.
pub struct QueueEngine {
    config: EngineConfig,
    provider: Arc<dyn TelephonyProvider>,
    coordinator: Mutex<Coordinator>,
    events: broadcast::Sender<CallEvent>,
}

impl QueueEngine {
    /// Create an engine with the given configuration and provider
    pub fn new(config: EngineConfig, provider: Arc<dyn TelephonyProvider>) -> Result<Self> {
        config.validate().map_err(QueueError::configuration)?;

        let (events, _) = broadcast::channel(config.event_capacity);
        info!(
            max_attempts = config.max_attempts,
            sweeping = config.max_queue_wait_secs.is_some(),
            "🚀 Transfer engine initialized"
        );

        Ok(Self {
            coordinator: Mutex::new(Coordinator::new(config.max_attempts)),
            config,
            provider,
            events,
        })
    }

    pub fn builder() -> QueueEngineBuilder {
        QueueEngineBuilder::new()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Subscribe to call lifecycle events.
    pub fn subscribe(&self) -> broadcast::Receiver<CallEvent> {
        self.events.subscribe()
    }

    /// `CallArrived`: admit a new call at the tail of the queue.
    pub async fn call_arrived(&self, call_id: CallId, from_address: &str) -> Result<CallAccepted> {
        let call_id = required_id(&call_id)?;
        let from_address = required(from_address, "from_address")?.to_string();

        let (record, position, queue_length) = self.with_coordinator(|c| {
            c.admit(call_id, from_address)
                .map(|(record, position)| (record, position, c.queue_len()))
        })?;

        info!(
            call_id = %record.call_id,
            from = %record.from_address,
            position,
            queue_length,
            "📞 Call added to queue"
        );
        Ok(CallAccepted {
            call_id: record.call_id,
            position,
            queue_length,
        })
    }

    /// `TransferRequested`: start a transfer of a queued call.
    ///
    /// The destination is normalized before anything is touched. The queue
    /// mutation commits first; the provider is contacted afterwards, outside
    /// the guard.
    pub async fn transfer_requested(&self, call_id: &CallId, destination: &str) -> Result<TransferAccepted> {
        let call_id = &required_id(call_id)?;
        let destination = normalize_destination(destination, &self.config.address)?;

        let record = self
            .with_coordinator(|c| c.begin_transfer(call_id, destination.clone()))
            .inspect_err(|e| debug!(call_id = %call_id, error = %e, "transfer request refused"))?;
        info!(call_id = %call_id, destination = %destination, attempt = record.attempts, "📤 Transfer started");

        let request = TransferRequest {
            call_id: call_id.clone(),
            destination: destination.clone(),
            status_callback: self.config.status_callback_url.clone(),
            attempt: record.attempts,
        };

        let dispatch = match self.provider.initiate_transfer(&request).await {
            Ok(token) => {
                debug!(call_id = %call_id, token = %token, "provider accepted transfer");
                TransferDispatch::Initiated { token }
            }
            Err(provider_error) => {
                warn!(call_id = %call_id, error = %provider_error, "Provider refused transfer, applying as failed");
                let state = match self.transfer_status_reported(call_id, TransferOutcome::Failed).await {
                    Ok(applied) => Some(applied.state),
                    Err(e) if e.kind() == ErrorKind::NotFound => None,
                    Err(e) => {
                        error!(call_id = %call_id, error = %e, "Failed to apply provider refusal");
                        None
                    }
                };
                TransferDispatch::ProviderFailed {
                    reason: provider_error.to_string(),
                    state,
                }
            }
        };

        Ok(TransferAccepted {
            call_id: call_id.clone(),
            destination,
            attempts: record.attempts,
            dispatch,
        })
    }

    /// `TransferStatusReported`: apply the outcome of an in-flight transfer.
    pub async fn transfer_status_reported(&self, call_id: &CallId, outcome: TransferOutcome) -> Result<StatusApplied> {
        let call_id = &required_id(call_id)?;

        let record = self
            .with_coordinator(|c| c.report_outcome(call_id, outcome))
            .inspect_err(|e| debug!(call_id = %call_id, %outcome, error = %e, "transfer status not applied"))?;

        Ok(StatusApplied {
            call_id: record.call_id,
            state: record.state,
            attempts: record.attempts,
        })
    }

    /// `GetQueueStatus`: consistent snapshot taken under the guard.
    pub fn queue_status(&self) -> QueueStatus {
        self.with_coordinator(|c| c.snapshot())
    }

    /// `ClearAll`: abandon every call, queued or in flight.
    ///
    /// In-flight transfers get a best-effort cancellation that is neither
    /// awaited nor retried.
    pub async fn clear_all(&self) -> Cleared {
        let cleared = self.with_coordinator(Coordinator::clear_all);
        let count = cleared.len();
        self.cancel_in_flight(cleared);
        Cleared { cleared: count }
    }

    /// Abandon a single call, queued or in flight.
    pub async fn abandon(&self, call_id: &CallId) -> Result<CallRecord> {
        let call_id = &required_id(call_id)?;

        let abandonment = self.with_coordinator(|c| c.abandon(call_id))?;
        let record = abandonment.record.clone();
        self.cancel_in_flight(vec![abandonment]);
        Ok(record)
    }

    /// Abandon a call that is still waiting. Calls with a transfer in flight
    /// yield `CallNotFound` and are left alone.
    pub async fn abandon_queued(&self, call_id: &CallId) -> Result<CallRecord> {
        let call_id = &required_id(call_id)?;
        let abandonment = self.with_coordinator(|c| c.abandon_queued(call_id))?;
        Ok(abandonment.record)
    }

    pub fn get_call(&self, call_id: &CallId) -> Result<CallRecord> {
        let call_id = &required_id(call_id)?;
        self.with_coordinator(|c| c.get(call_id))
    }

    /// Ask the provider for its view of a call. Engine state is not touched.
    pub async fn fetch_call_info(&self, call_id: &CallId) -> Result<CallInfo> {
        let call_id = &required_id(call_id)?;
        Ok(self.provider.fetch_call_info(call_id).await?)
    }

    /// Connect data for a call whose transfer is in flight.
    pub fn connect_plan(&self, call_id: &CallId) -> Result<ConnectPlan> {
        let call_id = &required_id(call_id)?;
        let record = self.with_coordinator(|c| c.get(call_id))?;
        if record.state != CallState::Transferring {
            return Err(QueueError::CallNotFound(call_id.clone()));
        }
        let destination = record
            .destination
            .ok_or_else(|| QueueError::invariant(call_id, "transferring without a destination"))?;

        Ok(ConnectPlan {
            call_id: record.call_id,
            destination,
            caller_id: self.config.caller_id.clone(),
            dial_timeout_secs: self.config.dial_timeout_secs,
            record_from_answer: self.config.record_from_answer,
            attempt: record.attempts,
        })
    }

    /// Queued calls that have waited longer than `max_wait` at `now`.
    pub fn overdue_calls(&self, now: DateTime<Utc>, max_wait: Duration) -> Vec<CallId> {
        self.with_coordinator(|c| c.overdue(now, max_wait))
    }

    /// Start the abandonment sweeper if a maximum queue wait is configured.
    pub fn spawn_sweeper(self: &Arc<Self>) -> Option<JoinHandle<()>> {
        let max_wait = self.config.max_queue_wait_secs?;
        let sweeper = AbandonmentSweeper::new(
            Arc::downgrade(self),
            std::time::Duration::from_secs(max_wait),
            std::time::Duration::from_secs(self.config.sweep_interval_secs),
        );
        Some(sweeper.spawn())
    }

    /// Run `f` under the engine guard and publish what it produced.
    fn with_coordinator<R>(&self, f: impl FnOnce(&mut Coordinator) -> R) -> R {
        let mut coordinator = self.coordinator.lock();
        let result = f(&mut coordinator);
        for event in coordinator.take_events() {
            debug!(call_id = %event.call_id(), "publishing call event");
            // No subscribers is not an error
            let _ = self.events.send(event);
        }
        result
    }

    fn cancel_in_flight(&self, abandoned: Vec<Abandonment>) {
        for abandonment in abandoned.into_iter().filter(|a| a.was_in_flight) {
            let provider = Arc::clone(&self.provider);
            let call_id = abandonment.record.call_id;
            tokio::spawn(async move {
                if let Err(e) = provider.cancel_transfer(&call_id).await {
                    warn!(call_id = %call_id, error = %e, "Best-effort transfer cancel failed");
                }
            });
        }
    }
}

/// Identifiers arrive from webhooks and may carry stray whitespace.
fn required_id(call_id: &CallId) -> Result<CallId> {
    required(call_id.as_str(), "call_id").map(CallId::new)
}

fn required<'a>(value: &'a str, field: &'static str) -> Result<&'a str> {
    let value = value.trim();
    if value.is_empty() {
        return Err(QueueError::MissingField(field));
    }
    Ok(value)
}

/// Builder for [`QueueEngine`]
pub struct QueueEngineBuilder {
    config: Option<EngineConfig>,
    provider: Option<Arc<dyn TelephonyProvider>>,
}

impl QueueEngineBuilder {
    pub fn new() -> Self {
        Self {
            config: None,
            provider: None,
        }
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn with_provider(mut self, provider: Arc<dyn TelephonyProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Build the engine. A provider is required; the configuration defaults.
    pub fn build(self) -> Result<Arc<QueueEngine>> {
        let provider = self
            .provider
            .ok_or_else(|| QueueError::configuration("Telephony provider not provided"))?;
        let config = self.config.unwrap_or_default();
        Ok(Arc::new(QueueEngine::new(config, provider)?))
    }
}

impl Default for QueueEngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}
