use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use uuid::Uuid;

use super::error::CoordinatorError;
use super::queue::WorkQueue;
use super::traits::DocumentStore;
use super::types::{
    CoordinatorConfig, DrainReport, Ledger, LiveWorker, PipelineCounters, PipelineHandle, WorkerEvent,
};
use super::worker::Worker;
use crate::models::{Document, DocumentStatus, DrainOutcome, FailureReason};
use crate::pipeline::extraction::ExtractionEngine;

/// Owns the work queue and a fixed pool of workers.
///
/// Intake is a bounded queue of `queue_capacity` fresh documents plus an
/// unbounded retry lane for persistence retries. Workers report through a
/// single event sink, which is the only writer of per-document bookkeeping.
pub struct PipelineCoordinator {
    config: CoordinatorConfig,
    intake: Option<mpsc::Sender<Document>>,
    queue: Arc<Mutex<WorkQueue>>,
    counters: Arc<PipelineCounters>,
    workers: Vec<JoinHandle<()>>,
    sink: Option<JoinHandle<Ledger>>,
}

impl PipelineCoordinator {
    /// Spawn the pool on the current tokio runtime.
    pub fn start(
        config: CoordinatorConfig,
        engine: Arc<ExtractionEngine>,
        store: Arc<dyn DocumentStore>,
    ) -> Self {
        let (fresh_tx, fresh_rx) = mpsc::channel(config.queue_capacity.max(1));
        let (retry_tx, retry_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        let queue = Arc::new(Mutex::new(WorkQueue::new(fresh_rx, retry_rx)));
        let counters = Arc::new(PipelineCounters::default());
        counters.accepting.store(true, Ordering::SeqCst);

        let sink = tokio::spawn(run_sink(event_rx, Arc::clone(&counters)));

        let workers = (0..config.worker_count.max(1))
            .map(|id| {
                let worker = Worker {
                    id,
                    engine: Arc::clone(&engine),
                    store: Arc::clone(&store),
                    queue: Arc::clone(&queue),
                    retry_tx: retry_tx.clone(),
                    events: event_tx.clone(),
                    batch_size: config.batch_size.max(1),
                    max_retries: config.max_retries,
                    _live: LiveWorker::enter(Arc::clone(&counters)),
                };
                tokio::spawn(worker.run())
            })
            .collect();

        tracing::info!(
            workers = config.worker_count,
            batch_size = config.batch_size,
            queue_capacity = config.queue_capacity,
            max_retries = config.max_retries,
            "Pipeline started"
        );

        Self {
            config,
            intake: Some(fresh_tx),
            queue,
            counters,
            workers,
            sink: Some(sink),
        }
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    pub fn handle(&self) -> PipelineHandle {
        PipelineHandle {
            counters: Arc::clone(&self.counters),
        }
    }

    /// Enqueue a `queued` document without waiting. A rejected document is
    /// dropped; callers that want to resubmit keep their own copy.
    pub fn submit(&self, doc: Document) -> Result<(), CoordinatorError> {
        if doc.status != DocumentStatus::Queued {
            return Err(CoordinatorError::NotQueued {
                id: doc.id,
                status: doc.status,
            });
        }
        let intake = self.intake.as_ref().ok_or(CoordinatorError::Stopped)?;
        let id = doc.id;
        intake.try_send(doc).map_err(|e| match e {
            TrySendError::Full(_) => CoordinatorError::QueueFull,
            TrySendError::Closed(_) => CoordinatorError::Stopped,
        })?;
        self.counters.submitted.fetch_add(1, Ordering::SeqCst);
        tracing::debug!(document_id = %id, "Document enqueued");
        Ok(())
    }

    /// Submit each document in turn, reporting every outcome.
    pub fn submit_all<I>(&self, documents: I) -> Vec<(Uuid, Result<(), CoordinatorError>)>
    where
        I: IntoIterator<Item = Document>,
    {
        documents
            .into_iter()
            .map(|doc| {
                let id = doc.id;
                (id, self.submit(doc))
            })
            .collect()
    }

    /// Drain with the configured timeout.
    pub async fn shutdown(&mut self) -> Result<DrainReport, CoordinatorError> {
        let timeout = self.config.drain_timeout;
        self.drain_and_stop(timeout).await
    }

    /// Close intake and let workers finish everything already queued.
    ///
    /// If the pool is not idle by `timeout`, workers are aborted and every
    /// queued or in-flight document is failed with `ForcedStop`. Either way
    /// the report holds every document submitted, each in a terminal state.
    pub async fn drain_and_stop(&mut self, timeout: Duration) -> Result<DrainReport, CoordinatorError> {
        let sink = self.sink.take().ok_or(CoordinatorError::Stopped)?;
        self.intake = None;
        self.counters.accepting.store(false, Ordering::SeqCst);
        tracing::info!(timeout_ms = timeout.as_millis() as u64, "Draining pipeline");

        let mut workers = std::mem::take(&mut self.workers);
        let mut outcome = match tokio::time::timeout(timeout, join_all(workers.iter_mut())).await {
            Ok(results) => {
                for result in results {
                    if let Err(e) = result {
                        tracing::error!(error = %e, "Worker terminated abnormally");
                    }
                }
                DrainOutcome::Stopped
            }
            Err(_) => {
                tracing::warn!("Drain deadline passed, aborting workers");
                for worker in &workers {
                    worker.abort();
                }
                for worker in workers {
                    // Cancelled is expected here
                    let _ = worker.await;
                }
                DrainOutcome::Forced
            }
        };

        // Every event sender is gone once the workers are, so the sink ends
        let mut ledger = match sink.await {
            Ok(ledger) => ledger,
            Err(e) => {
                tracing::error!(error = %e, "Event sink terminated abnormally");
                Ledger::default()
            }
        };

        let mut leftovers: Vec<Document> = ledger.in_flight.drain().map(|(_, doc)| doc).collect();
        leftovers.extend(self.queue.lock().await.take_remaining());
        if !leftovers.is_empty() {
            outcome = DrainOutcome::Forced;
        }
        for mut doc in leftovers {
            if let Err(e) = doc.mark_failed(FailureReason::ForcedStop) {
                tracing::error!(document_id = %doc.id, error = %e, "Could not fail leftover document");
            }
            self.counters.record_terminal(doc.status);
            ledger.finished.push(doc.without_text());
        }
        self.counters.in_flight.store(0, Ordering::SeqCst);

        let counters = self.counters.snapshot();
        tracing::info!(
            outcome = %outcome,
            succeeded = counters.succeeded,
            failed = counters.failed,
            retried = counters.retried,
            "Pipeline stopped"
        );
        Ok(DrainReport {
            outcome,
            documents: ledger.finished,
        })
    }
}

/// The single consumer of worker events. Keeps the in-flight ledger and
/// the counters; returns the ledger once every worker is gone.
async fn run_sink(
    mut events: mpsc::UnboundedReceiver<WorkerEvent>,
    counters: Arc<PipelineCounters>,
) -> Ledger {
    let mut ledger = Ledger::default();
    while let Some(event) = events.recv().await {
        match event {
            WorkerEvent::Started {
                worker,
                batch_id,
                documents,
            } => {
                tracing::debug!(worker, batch_id = %batch_id, size = documents.len(), "Batch dispatched");
                counters
                    .in_flight
                    .fetch_add(documents.len() as u64, Ordering::SeqCst);
                for doc in documents {
                    ledger.in_flight.insert(doc.id, doc.without_text());
                }
            }
            WorkerEvent::Finished(doc) => {
                if ledger.in_flight.remove(&doc.id).is_some() {
                    counters.in_flight.fetch_sub(1, Ordering::SeqCst);
                }
                counters.record_terminal(doc.status);
                ledger.finished.push(doc.without_text());
            }
            WorkerEvent::Requeued(doc) => {
                if ledger.in_flight.remove(&doc.id).is_some() {
                    counters.in_flight.fetch_sub(1, Ordering::SeqCst);
                }
                counters.retried.fetch_add(1, Ordering::SeqCst);
            }
        }
    }
    ledger
}

#[cfg(test)]
mod tests {
    use std::collections::{HashMap, HashSet};
    use std::sync::atomic::AtomicBool;

    use async_trait::async_trait;
    use tokio::sync::{Notify, Semaphore};

    use super::*;
    use crate::models::{DocumentFormat, ExtractionResult};
    use crate::pipeline::coordinator::store::InMemoryDocumentStore;
    use crate::pipeline::coordinator::traits::StoreError;

    fn config(workers: usize, batch: usize, capacity: usize) -> CoordinatorConfig {
        CoordinatorConfig {
            worker_count: workers,
            batch_size: batch,
            queue_capacity: capacity,
            max_retries: 3,
            drain_timeout: Duration::from_secs(5),
        }
    }

    fn engine() -> Arc<ExtractionEngine> {
        Arc::new(ExtractionEngine::default())
    }

    fn invoice(n: usize) -> Document {
        Document::new(
            format!("inv-{n}.txt"),
            DocumentFormat::Invoice,
            format!("Invoice {n}\nTotal KES {n}.00"),
        )
    }

    /// Records every write and flags two workers holding the same document.
    #[derive(Default)]
    struct TrackingStore {
        inner: InMemoryDocumentStore,
        owners: std::sync::Mutex<HashSet<Uuid>>,
        records: std::sync::Mutex<HashMap<Uuid, usize>>,
        overlap: AtomicBool,
    }

    #[async_trait]
    impl DocumentStore for TrackingStore {
        async fn upsert_document(&self, doc: &Document) -> Result<Uuid, StoreError> {
            self.inner.upsert_document(doc).await
        }

        async fn record_extraction(
            &self,
            document_id: Uuid,
            results: &[ExtractionResult],
        ) -> Result<(), StoreError> {
            if !self.owners.lock().unwrap().insert(document_id) {
                self.overlap.store(true, Ordering::SeqCst);
            }
            tokio::task::yield_now().await;
            *self.records.lock().unwrap().entry(document_id).or_default() += 1;
            self.owners.lock().unwrap().remove(&document_id);
            self.inner.record_extraction(document_id, results).await
        }

        async fn check_connectivity(&self) -> bool {
            true
        }
    }

    /// Blocks every `record_extraction` until the gate is opened.
    struct GatedStore {
        inner: InMemoryDocumentStore,
        entered: Notify,
        gate: Semaphore,
    }

    impl GatedStore {
        fn closed() -> Self {
            Self {
                inner: InMemoryDocumentStore::new(),
                entered: Notify::new(),
                gate: Semaphore::new(0),
            }
        }

        fn open(&self) {
            self.gate.add_permits(1);
        }
    }

    #[async_trait]
    impl DocumentStore for GatedStore {
        async fn upsert_document(&self, doc: &Document) -> Result<Uuid, StoreError> {
            self.inner.upsert_document(doc).await
        }

        async fn record_extraction(
            &self,
            document_id: Uuid,
            results: &[ExtractionResult],
        ) -> Result<(), StoreError> {
            self.entered.notify_one();
            let _permit = self
                .gate
                .acquire()
                .await
                .map_err(|_| StoreError::Unreachable("gate closed".into()))?;
            self.inner.record_extraction(document_id, results).await
        }

        async fn check_connectivity(&self) -> bool {
            true
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn every_document_processed_exactly_once() {
        let store = Arc::new(TrackingStore::default());
        let mut pipeline = PipelineCoordinator::start(config(4, 3, 64), engine(), store.clone());

        let docs: Vec<Document> = (1..=50)
            .map(|n| {
                if n % 5 == 0 {
                    Document::new(format!("blank-{n}"), DocumentFormat::Unknown, "   ")
                } else {
                    invoice(n)
                }
            })
            .collect();
        let submitted: HashSet<Uuid> = docs.iter().map(|d| d.id).collect();
        for (_, outcome) in pipeline.submit_all(docs) {
            outcome.unwrap();
        }

        let report = pipeline.drain_and_stop(Duration::from_secs(10)).await.unwrap();
        assert_eq!(report.outcome, DrainOutcome::Stopped);

        // Conservation
        assert_eq!(report.documents.len(), 50);
        assert_eq!(report.count(DocumentStatus::Extracted) + report.count(DocumentStatus::Failed), 50);
        assert_eq!(report.count(DocumentStatus::Failed), 10);

        // Exclusivity
        let reported: HashSet<Uuid> = report.documents.iter().map(|d| d.id).collect();
        assert_eq!(reported, submitted);
        assert!(!store.overlap.load(Ordering::SeqCst));
        let records = store.records.lock().unwrap();
        assert_eq!(records.len(), 40);
        assert!(records.values().all(|n| *n == 1));

        let counters = pipeline.handle().counters();
        assert_eq!(counters.submitted, 50);
        assert_eq!(counters.processed, 50);
        assert_eq!(counters.succeeded, 40);
        assert_eq!(counters.failed, 10);
        assert_eq!(counters.in_flight, 0);
    }

    #[tokio::test]
    async fn batch_fails_per_document() {
        let store = Arc::new(InMemoryDocumentStore::new());
        let mut pipeline = PipelineCoordinator::start(config(1, 4, 8), engine(), store.clone());

        let ok = Document::new("a", DocumentFormat::Invoice, "Total KES 10.00");
        let binary = Document::new("b", DocumentFormat::Unknown, "\0\0garbage");
        let blank = Document::new("c", DocumentFormat::Unknown, "  \n ");
        let nothing = Document::new("d", DocumentFormat::Unknown, "nothing to see");
        let ok_id = ok.id;
        let nothing_id = nothing.id;
        for doc in [ok, binary, blank, nothing] {
            pipeline.submit(doc).unwrap();
        }

        let report = pipeline.drain_and_stop(Duration::from_secs(5)).await.unwrap();
        assert_eq!(report.count(DocumentStatus::Extracted), 2);
        assert_eq!(report.count(DocumentStatus::Failed), 2);
        for doc in report.documents.iter().filter(|d| d.status == DocumentStatus::Failed) {
            assert!(matches!(doc.failure, Some(FailureReason::Extraction(_))));
            assert!(doc.error_detail().unwrap().starts_with("extraction failed"));
        }
        assert_eq!(store.results(ok_id).len(), 1);
        assert!(store.results(nothing_id).is_empty());
        assert_eq!(
            store.document(nothing_id).map(|d| d.status),
            Some(DocumentStatus::Extracted)
        );
    }

    #[tokio::test]
    async fn persistence_failure_is_retried_through_the_queue() {
        let store = Arc::new(InMemoryDocumentStore::new());
        store.fail_next_writes(2);
        let mut pipeline = PipelineCoordinator::start(config(1, 1, 8), engine(), store.clone());

        let doc = invoice(7);
        let id = doc.id;
        pipeline.submit(doc).unwrap();
        let report = pipeline.drain_and_stop(Duration::from_secs(5)).await.unwrap();

        assert_eq!(report.documents.len(), 1);
        let done = &report.documents[0];
        assert_eq!(done.status, DocumentStatus::Extracted);
        assert_eq!(done.retry_count, 2);
        assert_eq!(store.results(id).len(), 1);
        // The report carries metadata only; the text lives in the store
        assert!(done.text.is_empty());
        assert!(!store.document(id).unwrap().text.is_empty());
        assert_eq!(pipeline.handle().counters().retried, 2);
    }

    #[tokio::test]
    async fn retries_are_bounded() {
        let store = Arc::new(InMemoryDocumentStore::new());
        store.set_reachable(false);
        let mut cfg = config(2, 1, 8);
        cfg.max_retries = 2;
        let mut pipeline = PipelineCoordinator::start(cfg, engine(), store.clone());

        pipeline.submit(invoice(1)).unwrap();
        let report = pipeline.drain_and_stop(Duration::from_secs(5)).await.unwrap();

        let doc = &report.documents[0];
        assert_eq!(doc.status, DocumentStatus::Failed);
        assert_eq!(doc.retry_count, 2);
        assert!(matches!(doc.failure, Some(FailureReason::Persistence(_))));
        assert_eq!(pipeline.handle().counters().retried, 2);
    }

    #[tokio::test]
    async fn full_queue_rejects_submission() {
        let store = Arc::new(GatedStore::closed());
        let mut pipeline = PipelineCoordinator::start(config(1, 1, 1), engine(), store.clone());

        pipeline.submit(invoice(1)).unwrap();
        // Worker now holds the first document inside the store
        store.entered.notified().await;
        pipeline.submit(invoice(2)).unwrap();
        assert_eq!(pipeline.submit(invoice(3)), Err(CoordinatorError::QueueFull));

        store.open();
        let report = pipeline.drain_and_stop(Duration::from_secs(5)).await.unwrap();
        assert_eq!(report.outcome, DrainOutcome::Stopped);
        assert_eq!(report.count(DocumentStatus::Extracted), 2);
        assert_eq!(pipeline.handle().counters().submitted, 2);
    }

    #[tokio::test]
    async fn drain_deadline_forces_stop() {
        let store = Arc::new(GatedStore::closed());
        let mut pipeline = PipelineCoordinator::start(config(1, 1, 8), engine(), store.clone());
        let handle = pipeline.handle();

        for n in 1..=3 {
            pipeline.submit(invoice(n)).unwrap();
        }
        store.entered.notified().await;

        let report = pipeline.drain_and_stop(Duration::from_millis(50)).await.unwrap();
        assert_eq!(report.outcome, DrainOutcome::Forced);
        assert_eq!(report.documents.len(), 3);
        assert!(report
            .documents
            .iter()
            .all(|d| d.status == DocumentStatus::Failed && d.failure == Some(FailureReason::ForcedStop)));

        let counters = handle.counters();
        assert_eq!(counters.failed, 3);
        assert_eq!(counters.in_flight, 0);
        assert_eq!(handle.live_workers(), 0);
        assert!(!handle.is_accepting());
    }

    #[tokio::test]
    async fn stopped_pipeline_refuses_work() {
        let mut pipeline =
            PipelineCoordinator::start(config(2, 2, 4), engine(), Arc::new(InMemoryDocumentStore::new()));
        assert_eq!(pipeline.handle().live_workers(), 2);

        let report = pipeline.drain_and_stop(Duration::from_secs(1)).await.unwrap();
        assert!(report.documents.is_empty());
        assert_eq!(pipeline.submit(invoice(1)), Err(CoordinatorError::Stopped));
        assert!(matches!(
            pipeline.drain_and_stop(Duration::from_secs(1)).await,
            Err(CoordinatorError::Stopped)
        ));
    }

    #[tokio::test]
    async fn only_queued_documents_are_admitted() {
        let pipeline =
            PipelineCoordinator::start(config(1, 1, 4), engine(), Arc::new(InMemoryDocumentStore::new()));
        let mut doc = invoice(1);
        doc.begin_processing().unwrap();
        assert!(matches!(
            pipeline.submit(doc),
            Err(CoordinatorError::NotQueued { status: DocumentStatus::Processing, .. })
        ));
    }
}
