use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use uuid::Uuid;

use super::traits::{DocumentStore, StoreError};
use crate::models::{Document, ExtractionResult};

/// Process-local store. Also the reference double for outages:
/// [`set_reachable`](Self::set_reachable) takes it offline and
/// [`fail_next_writes`](Self::fail_next_writes) rejects a number of writes.
#[derive(Default)]
pub struct InMemoryDocumentStore {
    documents: Mutex<HashMap<Uuid, Document>>,
    results: Mutex<HashMap<Uuid, Vec<ExtractionResult>>>,
    offline: AtomicBool,
    failing_writes: AtomicU32,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_reachable(&self, reachable: bool) {
        self.offline.store(!reachable, Ordering::SeqCst);
    }

    /// Reject the next `n` `record_extraction` calls.
    pub fn fail_next_writes(&self, n: u32) {
        self.failing_writes.store(n, Ordering::SeqCst);
    }

    pub fn document(&self, id: Uuid) -> Option<Document> {
        self.documents.lock().ok()?.get(&id).cloned()
    }

    pub fn results(&self, id: Uuid) -> Vec<ExtractionResult> {
        self.results
            .lock()
            .ok()
            .and_then(|r| r.get(&id).cloned())
            .unwrap_or_default()
    }

    pub fn document_count(&self) -> usize {
        self.documents.lock().map(|d| d.len()).unwrap_or(0)
    }

    fn ensure_reachable(&self) -> Result<(), StoreError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(StoreError::Unreachable("in-memory store offline".into()));
        }
        Ok(())
    }
}

fn poisoned<T>(_: T) -> StoreError {
    StoreError::Unreachable("store lock poisoned".into())
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn upsert_document(&self, doc: &Document) -> Result<Uuid, StoreError> {
        self.ensure_reachable()?;
        self.documents
            .lock()
            .map_err(poisoned)?
            .insert(doc.id, doc.clone());
        Ok(doc.id)
    }

    async fn record_extraction(
        &self,
        document_id: Uuid,
        results: &[ExtractionResult],
    ) -> Result<(), StoreError> {
        self.ensure_reachable()?;
        let rejected = self
            .failing_writes
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if rejected {
            return Err(StoreError::Rejected("write rejected".into()));
        }
        self.results
            .lock()
            .map_err(poisoned)?
            .insert(document_id, results.to_vec());
        Ok(())
    }

    async fn check_connectivity(&self) -> bool {
        !self.offline.load(Ordering::SeqCst)
    }
}
