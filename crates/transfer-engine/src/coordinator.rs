//! # Transfer Coordinator
//!
//! Owns the call record store and the waiting queue and moves calls through
//! their lifecycle:
//!
//! | From         | Event              | To                              |
//! |--------------|--------------------|---------------------------------|
//! | Queued       | transfer requested | Transferring                    |
//! | Transferring | connected          | Connected (evicted)             |
//! | Transferring | failed/no-answer/busy | Queued if attempts remain, else Failed (evicted) |
//! | Queued       | admin clear        | Abandoned (evicted)             |
//! | Transferring | admin clear        | Abandoned (evicted)             |
//!
//! The coordinator is synchronous and performs no I/O. Every method either
//! commits its whole change or none of it, and queues the resulting
//! [`CallEvent`]s for the caller to publish. Serialization is the caller's
//! job: the engine keeps the coordinator behind a single mutex.
//!
//! A call is in the queue if and only if its record is `Queued`. Any
//! operation that finds this broken evicts the offending call and reports
//! an invariant violation instead of building on corrupt state.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::call::{CallId, CallRecord, CallState, TransferOutcome};
use crate::error::{QueueError, Result};
use crate::events::CallEvent;
use crate::queue::CallQueue;
use crate::store::CallRecordStore;

/// Consistent snapshot of the engine's calls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueueStatus {
    pub queue_length: usize,
    /// Waiting calls, head of the queue first
    pub queued_calls: Vec<CallRecord>,
    /// Calls with a transfer in flight, oldest state change first
    pub active_calls: Vec<CallRecord>,
}

/// A call removed by an administrative clear.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Abandonment {
    pub record: CallRecord,
    /// The call had a transfer in flight that the provider may still be working on
    pub was_in_flight: bool,
}

#[derive(Debug)]
pub struct Coordinator {
    store: CallRecordStore,
    queue: CallQueue,
    max_attempts: u32,
    pending: Vec<CallEvent>,
}

impl Coordinator {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            store: CallRecordStore::new(),
            queue: CallQueue::new(),
            max_attempts: max_attempts.max(1),
            pending: Vec::new(),
        }
    }

    /// Admit a new call at the tail of the queue.
    ///
    /// Returns the created record and its queue position.
    pub fn admit(&mut self, call_id: CallId, from_address: String) -> Result<(CallRecord, usize)> {
        if self.store.contains(&call_id) {
            return Err(QueueError::DuplicateCall(call_id));
        }
        if self.queue.contains(&call_id) {
            // Stale identifier with no record behind it; drop it and admit fresh
            self.evict(&call_id, "queued without a call record".to_string());
        }

        let record = self.store.create(call_id.clone(), from_address)?;
        let position = match self.queue.enqueue(call_id.clone()) {
            Ok(position) => position,
            Err(e) => {
                let _ = self.store.remove(&call_id);
                return Err(e);
            }
        };

        self.pending.push(CallEvent::Arrived { record: record.clone() });
        Ok((record, position))
    }

    /// Take a queued call out of the queue and start a transfer attempt.
    ///
    /// `destination` must already be normalized. Fails with `CallNotFound`
    /// when the call is not waiting in the queue.
    pub fn begin_transfer(&mut self, call_id: &CallId, destination: String) -> Result<CallRecord> {
        self.ensure_coupled(call_id)?;
        if !self.queue.contains(call_id) {
            return Err(QueueError::CallNotFound(call_id.clone()));
        }

        let now = Utc::now();
        self.queue.dequeue_by_id(call_id)?;
        let started = self.store.update(call_id, |record| -> Result<CallRecord> {
            record.transition(CallState::Transferring, now)?;
            record.attempts += 1;
            record.destination = Some(destination);
            Ok(record.clone())
        });

        match started.and_then(|r| r) {
            Ok(record) => {
                self.pending.push(CallEvent::TransferStarted { record: record.clone() });
                Ok(record)
            }
            Err(e) => Err(self.evict(call_id, e.to_string())),
        }
    }

    /// Apply a transfer status reported by the provider.
    ///
    /// Only calls with a transfer in flight accept a status; anything else
    /// yields `CallNotFound` and mutates nothing. The returned record carries
    /// the new state: `Connected` or `Failed` (already evicted) or `Queued`
    /// (back at the tail for another attempt).
    pub fn report_outcome(&mut self, call_id: &CallId, outcome: TransferOutcome) -> Result<CallRecord> {
        self.ensure_coupled(call_id)?;
        let current = self.store.get(call_id)?;
        if current.state != CallState::Transferring {
            return Err(QueueError::CallNotFound(call_id.clone()));
        }
        let attempts = current.attempts;

        let now = Utc::now();
        if outcome.is_success() {
            return self.finish(call_id, CallState::Connected, now);
        }

        if attempts < self.max_attempts {
            let requeued = self
                .store
                .update(call_id, |record| record.transition(CallState::Queued, now).map(|_| record.clone()))
                .and_then(|r| r);
            let record = match requeued {
                Ok(record) => record,
                Err(e) => return Err(self.evict(call_id, e.to_string())),
            };
            if let Err(e) = self.queue.enqueue(call_id.clone()) {
                return Err(self.evict(call_id, e.to_string()));
            }

            info!(call_id = %call_id, %outcome, attempts, max_attempts = self.max_attempts, "🔁 Transfer failed, call returned to queue");
            self.pending.push(CallEvent::Requeued { record: record.clone(), outcome });
            Ok(record)
        } else {
            self.finish(call_id, CallState::Failed, now)
        }
    }

    /// Administrative removal of one call, queued or in flight.
    pub fn abandon(&mut self, call_id: &CallId) -> Result<Abandonment> {
        self.ensure_coupled(call_id)?;
        let was_in_flight = self.store.get(call_id)?.state == CallState::Transferring;
        let record = self.finish(call_id, CallState::Abandoned, Utc::now())?;
        Ok(Abandonment { record, was_in_flight })
    }

    /// Abandon a call only if it is still waiting in the queue.
    pub fn abandon_queued(&mut self, call_id: &CallId) -> Result<Abandonment> {
        self.ensure_coupled(call_id)?;
        if !self.queue.contains(call_id) {
            return Err(QueueError::CallNotFound(call_id.clone()));
        }
        self.abandon(call_id)
    }

    /// Abandon every tracked call and empty the queue.
    ///
    /// Queued calls come first in queue order, followed by in-flight calls.
    pub fn clear_all(&mut self) -> Vec<Abandonment> {
        let now = Utc::now();
        let order: HashMap<CallId, usize> = self
            .queue
            .iter()
            .enumerate()
            .map(|(index, id)| (id.clone(), index))
            .collect();
        self.queue.clear();

        let mut records = self.store.drain();
        records.sort_by(|a, b| {
            let pa = order.get(&a.call_id).copied().unwrap_or(usize::MAX);
            let pb = order.get(&b.call_id).copied().unwrap_or(usize::MAX);
            pa.cmp(&pb)
                .then_with(|| a.enqueued_at.cmp(&b.enqueued_at))
                .then_with(|| a.call_id.cmp(&b.call_id))
        });

        let mut cleared = Vec::with_capacity(records.len());
        for mut record in records {
            let was_in_flight = record.state == CallState::Transferring;
            if let Err(e) = record.transition(CallState::Abandoned, now) {
                warn!(call_id = %record.call_id, error = %e, "Evicting call in unexpected state during clear");
            }
            self.pending.push(CallEvent::Terminated { record: record.clone() });
            cleared.push(Abandonment { record, was_in_flight });
        }

        if !cleared.is_empty() {
            info!(cleared = cleared.len(), "🧹 Queue cleared");
        }
        cleared
    }

    pub fn get(&self, call_id: &CallId) -> Result<CallRecord> {
        self.store.get(call_id).cloned()
    }

    pub fn position(&self, call_id: &CallId) -> Option<usize> {
        self.queue.position(call_id)
    }

    pub fn queue_len(&self) -> usize {
        self.queue.size()
    }

    /// Total calls tracked, queued or in flight.
    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    /// Identifier of the longest-waiting call.
    pub fn head(&self) -> Option<CallId> {
        self.queue.peek_head().cloned()
    }

    pub fn snapshot(&self) -> QueueStatus {
        let queued_calls: Vec<CallRecord> = self
            .queue
            .iter()
            .filter_map(|id| self.store.get(id).ok().cloned())
            .collect();

        let mut active_calls: Vec<CallRecord> = self
            .store
            .iter()
            .filter(|record| record.state == CallState::Transferring)
            .cloned()
            .collect();
        active_calls.sort_by(|a, b| {
            a.last_updated_at
                .cmp(&b.last_updated_at)
                .then_with(|| a.call_id.cmp(&b.call_id))
        });

        QueueStatus {
            queue_length: self.queue.size(),
            queued_calls,
            active_calls,
        }
    }

    /// Queued calls admitted more than `max_wait` before `now`, head first.
    pub fn overdue(&self, now: DateTime<Utc>, max_wait: Duration) -> Vec<CallId> {
        self.queue
            .iter()
            .filter(|id| {
                self.store
                    .get(id)
                    .map(|record| record.wait_time(now) > max_wait)
                    .unwrap_or(false)
            })
            .cloned()
            .collect()
    }

    /// Drain the events produced since the last call.
    pub fn take_events(&mut self) -> Vec<CallEvent> {
        std::mem::take(&mut self.pending)
    }

    /// Verify queue/state coupling across every call.
    pub fn check_invariants(&self) -> Result<()> {
        for id in self.queue.iter() {
            match self.store.get(id) {
                Ok(record) if record.state == CallState::Queued => {}
                Ok(record) => {
                    return Err(QueueError::invariant(id, format!("queued while {}", record.state)));
                }
                Err(_) => return Err(QueueError::invariant(id, "queued without a call record")),
            }
        }
        for record in self.store.iter() {
            if record.state.is_terminal() {
                return Err(QueueError::invariant(&record.call_id, "terminal record was not evicted"));
            }
            if record.state == CallState::Queued && !self.queue.contains(&record.call_id) {
                return Err(QueueError::invariant(&record.call_id, "marked queued but missing from the queue"));
            }
        }
        Ok(())
    }

    /// Move a live call to a terminal state and evict it.
    fn finish(&mut self, call_id: &CallId, terminal: CallState, now: DateTime<Utc>) -> Result<CallRecord> {
        self.store
            .update(call_id, |record| record.transition(terminal, now))?
            .map_err(|e| self.evict(call_id, e.to_string()))?;

        if self.queue.contains(call_id) {
            self.queue.dequeue_by_id(call_id)?;
        }
        let record = self.store.remove(call_id)?;

        match terminal {
            CallState::Connected => info!(call_id = %call_id, attempts = record.attempts, "✅ Transfer connected"),
            CallState::Failed => warn!(call_id = %call_id, attempts = record.attempts, "❌ Transfer failed, no attempts left"),
            _ => info!(call_id = %call_id, "Call abandoned"),
        }
        self.pending.push(CallEvent::Terminated { record: record.clone() });
        Ok(record)
    }

    /// Check that the call's queue membership agrees with its state.
    fn ensure_coupled(&mut self, call_id: &CallId) -> Result<()> {
        let queued = self.queue.contains(call_id);
        let state = self.store.get(call_id).ok().map(|record| record.state);

        let detail = match (queued, state) {
            (true, None) => Some("queued without a call record".to_string()),
            (true, Some(state)) if state != CallState::Queued => Some(format!("queued while {}", state)),
            (false, Some(CallState::Queued)) => Some("marked queued but missing from the queue".to_string()),
            _ => None,
        };

        match detail {
            Some(detail) => Err(self.evict(call_id, detail)),
            None => Ok(()),
        }
    }

    /// Drop a call whose state contradicts the queue.
    fn evict(&mut self, call_id: &CallId, detail: String) -> QueueError {
        error!(call_id = %call_id, detail = %detail, "🚨 Invariant violation, evicting call");
        if self.queue.contains(call_id) {
            let _ = self.queue.dequeue_by_id(call_id);
        }
        if self.store.remove(call_id).is_ok() {
            debug!(call_id = %call_id, "call record evicted");
        }
        self.pending.push(CallEvent::Evicted {
            call_id: call_id.clone(),
            reason: detail.clone(),
        });
        QueueError::invariant(call_id, detail)
    }
}
