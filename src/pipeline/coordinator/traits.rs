//! Persistence boundary. The coordinator depends on these three operations
//! and their success/failure signal, never on a storage engine.

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{Document, ExtractionResult};

/// A persistence failure. Always retryable from the coordinator's view.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    #[error("Store unreachable: {0}")]
    Unreachable(String),

    #[error("Write rejected: {0}")]
    Rejected(String),
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Insert or replace a document, returning its id.
    async fn upsert_document(&self, doc: &Document) -> Result<Uuid, StoreError>;

    /// Replace the results recorded for `document_id`.
    async fn record_extraction(
        &self,
        document_id: Uuid,
        results: &[ExtractionResult],
    ) -> Result<(), StoreError>;

    async fn check_connectivity(&self) -> bool;
}
