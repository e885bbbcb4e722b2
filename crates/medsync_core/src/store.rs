//! In-memory record store.

use crate::error::{CoreError, CoreResult};
use medsync_protocol::Record;
use parking_lot::RwLock;
use std::collections::HashMap;

/// Concurrency-safe map from patient id to record.
///
/// Each operation takes the lock once, so reads and writes of a single key
/// are atomic. Nothing spans keys.
#[derive(Debug, Default)]
pub struct RecordStore {
    records: RwLock<HashMap<String, Record>>,
}

impl RecordStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of the record stored for `patient_id`.
    pub fn get(&self, patient_id: &str) -> CoreResult<Record> {
        self.records
            .read()
            .get(patient_id)
            .cloned()
            .ok_or_else(|| CoreError::not_found(patient_id))
    }

    /// Stores `record` under `patient_id`, returning the record it replaced.
    pub fn put(&self, patient_id: impl Into<String>, record: Record) -> Option<Record> {
        self.records.write().insert(patient_id.into(), record)
    }

    /// Stores a record after filling in its identity from the record it
    /// replaces, under a single write lock.
    pub(crate) fn put_assigning_identity(&self, mut record: Record) -> (Record, Option<Record>) {
        let mut records = self.records.write();
        let key = record.patient_id().to_string();
        record.assign_identity(records.get(&key));
        let previous = records.insert(key, record.clone());
        (record, previous)
    }

    /// Point-in-time copy of every entry.
    ///
    /// The copy is taken up front; writers are not blocked while the caller
    /// iterates.
    pub fn snapshot(&self) -> impl Iterator<Item = (String, Record)> {
        let entries: Vec<(String, Record)> = self
            .records
            .read()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        entries.into_iter()
    }

    /// Number of stored records.
    pub fn count(&self) -> usize {
        self.records.read().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sample::sample_record;
    use std::sync::Arc;

    fn record_for(patient_id: &str) -> Record {
        let mut record = sample_record();
        record.patient.patient_id = patient_id.into();
        record
    }

    #[test]
    fn get_missing_is_not_found() {
        let store = RecordStore::new();
        let err = store.get("UNKNOWN").unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn put_replaces_and_returns_previous() {
        let store = RecordStore::new();
        let first = record_for("PAT1");
        assert!(store.put("PAT1", first.clone()).is_none());

        let mut second = first.clone();
        second.patient.first_name = "Johnny".into();
        assert_eq!(store.put("PAT1", second.clone()), Some(first));
        assert_eq!(store.get("PAT1").unwrap(), second);
        assert_eq!(store.count(), 1);
    }

    #[test]
    fn returned_records_are_copies() {
        let store = RecordStore::new();
        store.put("PAT1", record_for("PAT1"));
        let mut copy = store.get("PAT1").unwrap();
        copy.patient.last_name = "Changed".into();
        assert_ne!(store.get("PAT1").unwrap().patient.last_name, "Changed");
    }

    #[test]
    fn identity_is_inherited_under_lock() {
        let store = RecordStore::new();
        let (stored, previous) = store.put_assigning_identity(record_for("PAT1"));
        assert!(previous.is_none());

        let mut update = record_for("PAT1");
        update.record_id = None;
        update.created_at = None;
        let (updated, previous) = store.put_assigning_identity(update);
        assert_eq!(updated.record_id, stored.record_id);
        assert_eq!(previous.map(|p| p.record_id), Some(stored.record_id));
    }

    #[test]
    fn snapshot_is_point_in_time() {
        let store = RecordStore::new();
        store.put("PAT1", record_for("PAT1"));
        store.put("PAT2", record_for("PAT2"));

        let snapshot = store.snapshot();
        store.put("PAT3", record_for("PAT3"));

        let mut ids: Vec<String> = snapshot.map(|(id, _)| id).collect();
        ids.sort();
        assert_eq!(ids, vec!["PAT1", "PAT2"]);
        assert_eq!(store.count(), 3);
    }

    #[test]
    fn concurrent_writers_on_distinct_keys() {
        let store = Arc::new(RecordStore::new());
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    for i in 0..50 {
                        let id = format!("PAT{t}-{i}");
                        store.put(id.clone(), record_for(&id));
                        let _ = store.snapshot().count();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(store.count(), 400);
    }
}
