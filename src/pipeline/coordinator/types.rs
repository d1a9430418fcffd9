use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::Settings;
use crate::models::{Document, DocumentStatus, DrainOutcome};

#[derive(Debug, Clone, PartialEq)]
pub struct CoordinatorConfig {
    pub worker_count: usize,
    pub batch_size: usize,
    pub queue_capacity: usize,
    pub max_retries: u32,
    pub drain_timeout: Duration,
}

impl From<&Settings> for CoordinatorConfig {
    fn from(settings: &Settings) -> Self {
        Self {
            worker_count: settings.worker_count.max(1),
            batch_size: settings.batch_size.max(1),
            queue_capacity: settings.queue_capacity.max(1),
            max_retries: settings.max_retries,
            drain_timeout: settings.drain_timeout(),
        }
    }
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self::from(&Settings::default())
    }
}

/// Live counters. `submitted` is bumped by `submit`; everything else is
/// written by the coordinator's event sink.
#[derive(Debug, Default)]
pub(crate) struct PipelineCounters {
    pub submitted: AtomicU64,
    pub processed: AtomicU64,
    pub succeeded: AtomicU64,
    pub failed: AtomicU64,
    pub retried: AtomicU64,
    pub in_flight: AtomicU64,
    pub live_workers: AtomicUsize,
    pub accepting: AtomicBool,
}

impl PipelineCounters {
    pub fn snapshot(&self) -> CounterSnapshot {
        CounterSnapshot {
            submitted: self.submitted.load(Ordering::SeqCst),
            processed: self.processed.load(Ordering::SeqCst),
            succeeded: self.succeeded.load(Ordering::SeqCst),
            failed: self.failed.load(Ordering::SeqCst),
            retried: self.retried.load(Ordering::SeqCst),
            in_flight: self.in_flight.load(Ordering::SeqCst),
        }
    }

    pub fn record_terminal(&self, status: DocumentStatus) {
        self.processed.fetch_add(1, Ordering::SeqCst);
        match status {
            DocumentStatus::Extracted => self.succeeded.fetch_add(1, Ordering::SeqCst),
            _ => self.failed.fetch_add(1, Ordering::SeqCst),
        };
    }
}

/// Point-in-time copy of the pipeline counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CounterSnapshot {
    pub submitted: u64,
    /// Documents that reached a terminal state.
    pub processed: u64,
    pub succeeded: u64,
    pub failed: u64,
    /// Persistence retries handed back to the queue.
    pub retried: u64,
    pub in_flight: u64,
}

/// Read-only view of a running pipeline. Cheap to clone.
#[derive(Debug, Clone)]
pub struct PipelineHandle {
    pub(crate) counters: Arc<PipelineCounters>,
}

impl PipelineHandle {
    pub fn counters(&self) -> CounterSnapshot {
        self.counters.snapshot()
    }

    pub fn live_workers(&self) -> usize {
        self.counters.live_workers.load(Ordering::SeqCst)
    }

    pub fn is_accepting(&self) -> bool {
        self.counters.accepting.load(Ordering::SeqCst)
    }
}

/// Decrements the live worker gauge however the worker task ends.
pub(crate) struct LiveWorker {
    counters: Arc<PipelineCounters>,
}

impl LiveWorker {
    pub fn enter(counters: Arc<PipelineCounters>) -> Self {
        counters.live_workers.fetch_add(1, Ordering::SeqCst);
        Self { counters }
    }
}

impl Drop for LiveWorker {
    fn drop(&mut self) {
        self.counters.live_workers.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Messages from workers to the coordinator's single sink.
#[derive(Debug)]
pub(crate) enum WorkerEvent {
    /// A batch was dequeued; documents are already `processing`.
    Started {
        worker: usize,
        batch_id: Uuid,
        documents: Vec<Document>,
    },
    Finished(Document),
    /// Handed back to the retry lane after a persistence failure.
    Requeued(Document),
}

/// What the sink has seen, keyed by document id. Holds text-free copies.
#[derive(Debug, Default)]
pub(crate) struct Ledger {
    pub in_flight: HashMap<Uuid, Document>,
    pub finished: Vec<Document>,
}

/// Result of `drain_and_stop`: how it ended and every document that reached
/// a terminal state over the pipeline's lifetime.
///
/// Documents are kept without their `text` (it is persisted through the
/// store), so the ledger grows by metadata only.
#[derive(Debug, Clone)]
pub struct DrainReport {
    pub outcome: DrainOutcome,
    pub documents: Vec<Document>,
}

impl DrainReport {
    pub fn count(&self, status: DocumentStatus) -> usize {
        self.documents.iter().filter(|d| d.status == status).count()
    }
}
