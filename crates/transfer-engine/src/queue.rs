//! # Waiting Queue
//!
//! Ordered list of call identifiers awaiting transfer. Insertion order is
//! arrival order and encodes service priority (first arrived, first served).
//!
//! Transfer requests name a specific call rather than "the next in line",
//! so besides the usual head access the queue supports removal of any member
//! by identifier. A membership set keeps duplicate checks and lookups O(1);
//! removal by identifier is a linear scan of the order.

use std::collections::{HashSet, VecDeque};

use tracing::debug;

use crate::call::CallId;
use crate::error::{QueueError, Result};

#[derive(Debug, Default, Clone)]
pub struct CallQueue {
    order: VecDeque<CallId>,
    members: HashSet<CallId>,
}

impl CallQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append to the tail, returning the 0-based position.
    pub fn enqueue(&mut self, call_id: CallId) -> Result<usize> {
        if self.members.contains(&call_id) {
            return Err(QueueError::AlreadyQueued(call_id));
        }
        self.members.insert(call_id.clone());
        self.order.push_back(call_id);
        debug!(queue_length = self.order.len(), "call enqueued");
        Ok(self.order.len() - 1)
    }

    /// Remove the named call from whatever position it holds.
    pub fn dequeue_by_id(&mut self, call_id: &CallId) -> Result<CallId> {
        if !self.members.remove(call_id) {
            return Err(QueueError::CallNotFound(call_id.clone()));
        }
        match self.order.iter().position(|queued| queued == call_id) {
            Some(index) => self
                .order
                .remove(index)
                .ok_or_else(|| QueueError::CallNotFound(call_id.clone())),
            None => Err(QueueError::invariant(call_id, "member set and queue order disagree")),
        }
    }

    /// The longest-waiting call, without removing it.
    pub fn peek_head(&self) -> Option<&CallId> {
        self.order.front()
    }

    pub fn size(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn contains(&self, call_id: &CallId) -> bool {
        self.members.contains(call_id)
    }

    /// 0-based position of a queued call.
    pub fn position(&self, call_id: &CallId) -> Option<usize> {
        if !self.contains(call_id) {
            return None;
        }
        self.order.iter().position(|queued| queued == call_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &CallId> {
        self.order.iter()
    }

    /// Empty the queue and return how many entries were dropped.
    ///
    /// Records in the store are not touched; callers clearing the engine
    /// must evict those as well.
    pub fn clear(&mut self) -> usize {
        let dropped = self.order.len();
        self.order.clear();
        self.members.clear();
        dropped
    }
}
