use tokio::sync::mpsc;

use crate::models::{Batch, Document};

/// The two receive sides of the work queue: bounded fresh intake and the
/// retry lane. Shared by workers behind one async mutex, so every dequeue is
/// serialized and a document lands in exactly one batch.
pub(crate) struct WorkQueue {
    fresh: mpsc::Receiver<Document>,
    retry: mpsc::UnboundedReceiver<Document>,
}

impl WorkQueue {
    pub fn new(fresh: mpsc::Receiver<Document>, retry: mpsc::UnboundedReceiver<Document>) -> Self {
        Self { fresh, retry }
    }

    /// Wait for one document, then take up to `max` in total without waiting.
    /// Retries go first.
    ///
    /// `None` once intake is closed and both lanes are empty. A document
    /// requeued after that point belongs to a worker that is still running
    /// and will pick it up on its next call.
    pub async fn next_batch(&mut self, max: usize) -> Option<Batch> {
        let first = match self.retry.try_recv() {
            Ok(doc) => doc,
            Err(_) => {
                let received = tokio::select! {
                    biased;
                    Some(doc) = self.retry.recv() => Some(doc),
                    fresh = self.fresh.recv() => fresh,
                };
                match received {
                    Some(doc) => doc,
                    None => self.retry.try_recv().ok()?,
                }
            }
        };

        let mut documents = vec![first];
        while documents.len() < max {
            let next = self
                .retry
                .try_recv()
                .ok()
                .or_else(|| self.fresh.try_recv().ok());
            match next {
                Some(doc) => documents.push(doc),
                None => break,
            }
        }
        Some(Batch::new(documents))
    }

    /// Everything still waiting in either lane.
    pub fn take_remaining(&mut self) -> Vec<Document> {
        let mut left = Vec::new();
        while let Ok(doc) = self.retry.try_recv() {
            left.push(doc);
        }
        while let Ok(doc) = self.fresh.try_recv() {
            left.push(doc);
        }
        left
    }
}
