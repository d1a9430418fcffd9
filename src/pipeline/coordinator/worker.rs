use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use tracing::Instrument;

use super::queue::WorkQueue;
use super::traits::{DocumentStore, StoreError};
use super::types::{LiveWorker, WorkerEvent};
use crate::models::{Batch, Document, ExtractionResult, FailureReason};
use crate::pipeline::extraction::ExtractionEngine;

/// One pool member. Owns the documents of its current batch exclusively and
/// reports every state change to the coordinator's sink.
pub(crate) struct Worker {
    pub id: usize,
    pub engine: Arc<ExtractionEngine>,
    pub store: Arc<dyn DocumentStore>,
    pub queue: Arc<Mutex<WorkQueue>>,
    pub retry_tx: mpsc::UnboundedSender<Document>,
    pub events: mpsc::UnboundedSender<WorkerEvent>,
    pub batch_size: usize,
    pub max_retries: u32,
    pub _live: LiveWorker,
}

impl Worker {
    pub async fn run(self) {
        tracing::debug!(worker = self.id, "Worker started");
        loop {
            let next = {
                let mut queue = self.queue.lock().await;
                queue.next_batch(self.batch_size).await
            };
            let Some(batch) = next else {
                break;
            };
            let span = tracing::info_span!(
                "batch",
                worker = self.id,
                batch_id = %batch.id,
                size = batch.len()
            );
            self.process_batch(batch).instrument(span).await;
        }
        tracing::debug!(worker = self.id, "Worker finished, queue drained");
    }

    async fn process_batch(&self, batch: Batch) {
        let Batch { id: batch_id, documents } = batch;

        let mut owned = Vec::with_capacity(documents.len());
        for mut doc in documents {
            if let Err(e) = doc.begin_processing() {
                // Submit only admits queued documents; anything else is a bug upstream.
                tracing::error!(document_id = %doc.id, error = %e, "Skipping document in wrong state");
                continue;
            }
            owned.push(doc);
        }
        self.emit(WorkerEvent::Started {
            worker: self.id,
            batch_id,
            documents: owned.clone(),
        });

        // Documents succeed or fail independently
        for doc in owned {
            self.process_document(doc).await;
        }
    }

    async fn process_document(&self, mut doc: Document) {
        let results = match self.engine.extract(doc.id, &doc.text, doc.type_hint()) {
            Ok(results) => results,
            Err(e) => {
                tracing::warn!(document_id = %doc.id, error = %e, "Extraction failed");
                self.fail(doc, FailureReason::Extraction(e.to_string())).await;
                return;
            }
        };

        match self.persist(&doc, &results).await {
            Ok(done) => {
                tracing::debug!(
                    document_id = %done.id,
                    entities = results.len(),
                    "Document extracted"
                );
                self.emit(WorkerEvent::Finished(done));
            }
            Err(e) if doc.retry_count < self.max_retries => {
                if let Err(err) = doc.requeue_for_retry() {
                    tracing::error!(document_id = %doc.id, error = %err, "Requeue rejected");
                    self.fail(doc, FailureReason::Persistence(e.to_string())).await;
                    return;
                }
                tracing::warn!(
                    document_id = %doc.id,
                    retry_count = doc.retry_count,
                    error = %e,
                    "Persistence failed, requeued"
                );
                // Report first so the sink sees the requeue before any later pickup
                self.emit(WorkerEvent::Requeued(doc.clone()));
                if let Err(mpsc::error::SendError(doc)) = self.retry_tx.send(doc) {
                    self.fail(doc, FailureReason::Persistence(e.to_string())).await;
                }
            }
            Err(e) => {
                tracing::warn!(
                    document_id = %doc.id,
                    retry_count = doc.retry_count,
                    error = %e,
                    "Persistence retries exhausted"
                );
                self.fail(doc, FailureReason::Persistence(e.to_string())).await;
            }
        }
    }

    /// Record results, then the extracted document. Returns the stored copy.
    async fn persist(&self, doc: &Document, results: &[ExtractionResult]) -> Result<Document, StoreError> {
        self.store.record_extraction(doc.id, results).await?;
        let mut done = doc.clone();
        if let Err(e) = done.mark_extracted() {
            return Err(StoreError::Rejected(e.to_string()));
        }
        self.store.upsert_document(&done).await?;
        Ok(done)
    }

    async fn fail(&self, mut doc: Document, reason: FailureReason) {
        if let Err(e) = doc.mark_failed(reason) {
            tracing::error!(document_id = %doc.id, error = %e, "Could not mark document failed");
        }
        // Best effort: the failure is reported through the sink either way
        if let Err(e) = self.store.upsert_document(&doc).await {
            tracing::debug!(document_id = %doc.id, error = %e, "Failed document not persisted");
        }
        self.emit(WorkerEvent::Finished(doc));
    }

    fn emit(&self, event: WorkerEvent) {
        if self.events.send(event).is_err() {
            tracing::warn!(worker = self.id, "Event sink closed");
        }
    }
}
