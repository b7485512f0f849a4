//! Background abandonment of calls that have waited too long.
//!
//! The sweeper never touches engine state directly. It reads a snapshot of
//! overdue calls and feeds an ordinary abandon event for each one back
//! through [`QueueEngine`], so it is just another client of the serialized
//! ingress path. Only queued calls are considered; a call that moved on
//! between the snapshot and the abandon is skipped.

use std::sync::{Arc, Weak};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::call::CallRecord;
use crate::engine::QueueEngine;
use crate::error::ErrorKind;

pub struct AbandonmentSweeper {
    engine: Weak<QueueEngine>,
    max_wait: Duration,
    interval: Duration,
}

impl AbandonmentSweeper {
    pub fn new(engine: Weak<QueueEngine>, max_wait: Duration, interval: Duration) -> Self {
        Self {
            engine,
            max_wait,
            interval,
        }
    }

    /// Run the sweep loop until the engine is dropped.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            info!(
                max_wait_secs = self.max_wait.as_secs(),
                interval_secs = self.interval.as_secs(),
                "🔄 Starting abandonment sweeper"
            );

            let mut interval = tokio::time::interval(self.interval);
            // The first tick completes immediately
            interval.tick().await;

            loop {
                interval.tick().await;
                let Some(engine) = self.engine.upgrade() else {
                    debug!("engine dropped, stopping sweeper");
                    break;
                };
                Self::sweep(&engine, self.max_wait, Utc::now()).await;
            }
        })
    }

    /// Abandon every queued call that has waited longer than `max_wait` at `now`.
    pub async fn sweep_once(&self, now: DateTime<Utc>) -> Vec<CallRecord> {
        match self.engine.upgrade() {
            Some(engine) => Self::sweep(&engine, self.max_wait, now).await,
            None => Vec::new(),
        }
    }

    async fn sweep(engine: &Arc<QueueEngine>, max_wait: Duration, now: DateTime<Utc>) -> Vec<CallRecord> {
        let max_wait = chrono::Duration::from_std(max_wait).unwrap_or_else(|_| chrono::Duration::days(36_500));
        let overdue = engine.overdue_calls(now, max_wait);

        let mut abandoned = Vec::with_capacity(overdue.len());
        for call_id in overdue {
            match engine.abandon_queued(&call_id).await {
                Ok(record) => {
                    info!(call_id = %call_id, waited_secs = record.wait_time(now).num_seconds(), "⏰ Abandoned call after maximum queue wait");
                    abandoned.push(record);
                }
                Err(e) if e.kind() == ErrorKind::NotFound => {
                    debug!(call_id = %call_id, "overdue call already gone");
                }
                Err(e) => error!(call_id = %call_id, error = %e, "Failed to abandon overdue call"),
            }
        }
        abandoned
    }
}
