//! In-memory store of live call records

use std::collections::HashMap;

use chrono::Utc;
use tracing::debug;

use crate::call::{CallId, CallRecord};
use crate::error::{QueueError, Result};

/// Authoritative state of every call currently known to the engine.
///
/// The store does no locking of its own; it lives behind the engine guard
/// and every method takes `&mut self` or `&self` accordingly.
#[derive(Debug, Default)]
pub struct CallRecordStore {
    records: HashMap<CallId, CallRecord>,
}

impl CallRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a record in state `Queued` with zero attempts.
    pub fn create(&mut self, call_id: CallId, from_address: String) -> Result<CallRecord> {
        if self.records.contains_key(&call_id) {
            return Err(QueueError::DuplicateCall(call_id));
        }
        let record = CallRecord::new(call_id.clone(), from_address, Utc::now());
        self.records.insert(call_id, record.clone());
        debug!(call_id = %record.call_id, "call record created");
        Ok(record)
    }

    pub fn get(&self, call_id: &CallId) -> Result<&CallRecord> {
        self.records
            .get(call_id)
            .ok_or_else(|| QueueError::CallNotFound(call_id.clone()))
    }

    /// Delete and return the record.
    pub fn remove(&mut self, call_id: &CallId) -> Result<CallRecord> {
        self.records
            .remove(call_id)
            .ok_or_else(|| QueueError::CallNotFound(call_id.clone()))
    }

    /// Apply `mutator` to the record in place.
    ///
    /// Mutators must check before they write: a mutator that returns an error
    /// is expected to have left the record unchanged.
    pub fn update<R>(&mut self, call_id: &CallId, mutator: impl FnOnce(&mut CallRecord) -> R) -> Result<R> {
        let record = self
            .records
            .get_mut(call_id)
            .ok_or_else(|| QueueError::CallNotFound(call_id.clone()))?;
        Ok(mutator(record))
    }

    pub fn contains(&self, call_id: &CallId) -> bool {
        self.records.contains_key(call_id)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &CallRecord> {
        self.records.values()
    }

    /// Remove every record.
    pub fn drain(&mut self) -> Vec<CallRecord> {
        self.records.drain().map(|(_, record)| record).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::call::CallState;

    #[test]
    fn test_create_and_get() {
        let mut store = CallRecordStore::new();
        let record = store.create(CallId::from("CA1"), "+15551230000".into()).unwrap();

        assert_eq!(record.state, CallState::Queued);
        assert_eq!(record.attempts, 0);
        assert_eq!(record.enqueued_at, record.last_updated_at);
        assert!(record.destination.is_none());
        assert_eq!(store.get(&CallId::from("CA1")).unwrap(), &record);
    }

    #[test]
    fn test_duplicate_create_leaves_original() {
        let mut store = CallRecordStore::new();
        store.create(CallId::from("CA1"), "+15551230000".into()).unwrap();

        let err = store.create(CallId::from("CA1"), "+15550000000".into()).unwrap_err();
        assert!(matches!(err, QueueError::DuplicateCall(_)));
        assert_eq!(store.len(), 1);
        assert_eq!(store.get(&CallId::from("CA1")).unwrap().from_address, "+15551230000");
    }

    #[test]
    fn test_update_and_remove_missing() {
        let mut store = CallRecordStore::new();
        let missing = CallId::from("nope");

        assert!(matches!(store.get(&missing), Err(QueueError::CallNotFound(_))));
        assert!(matches!(store.remove(&missing), Err(QueueError::CallNotFound(_))));
        assert!(matches!(
            store.update(&missing, |r| r.attempts += 1),
            Err(QueueError::CallNotFound(_))
        ));
    }

    #[test]
    fn test_update_applies_mutation() {
        let mut store = CallRecordStore::new();
        let id = CallId::from("CA1");
        store.create(id.clone(), "+15551230000".into()).unwrap();

        let attempts = store
            .update(&id, |r| {
                r.attempts += 1;
                r.attempts
            })
            .unwrap();
        assert_eq!(attempts, 1);

        let removed = store.remove(&id).unwrap();
        assert_eq!(removed.attempts, 1);
        assert!(store.is_empty());
    }
}
