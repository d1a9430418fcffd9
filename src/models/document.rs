use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::{DocumentFormat, DocumentStatus};
use super::ModelError;

/// Why a document ended up `failed`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum FailureReason {
    /// Input unsupported or malformed for every grammar.
    Extraction(String),
    /// Persistence kept failing after `max_retries` requeues.
    Persistence(String),
    /// Still queued or in flight when the drain deadline passed.
    ForcedStop,
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Extraction(detail) => write!(f, "extraction failed: {detail}"),
            Self::Persistence(detail) => write!(f, "persistence failed: {detail}"),
            Self::ForcedStop => f.write_str("forced stop before completion"),
        }
    }
}

/// A business document or message awaiting extraction.
///
/// Status only moves forward: `queued → processing → {extracted | failed}`.
/// The one backward edge is `processing → queued` for a persistence retry,
/// which always bumps `retry_count`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: Uuid,
    pub source_ref: String,
    pub format: DocumentFormat,
    pub status: DocumentStatus,
    pub retry_count: u32,
    /// Text produced upstream (OCR or message body).
    pub text: String,
    pub failure: Option<FailureReason>,
    pub ingested_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Document {
    pub fn new(source_ref: impl Into<String>, format: DocumentFormat, text: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            source_ref: source_ref.into(),
            format,
            status: DocumentStatus::Queued,
            retry_count: 0,
            text: text.into(),
            failure: None,
            ingested_at: now,
            updated_at: now,
        }
    }

    /// The format as an extraction hint (`None` when unknown).
    pub fn type_hint(&self) -> Option<DocumentFormat> {
        (self.format != DocumentFormat::Unknown).then_some(self.format)
    }

    pub fn begin_processing(&mut self) -> Result<(), ModelError> {
        self.transition(&[DocumentStatus::Queued], DocumentStatus::Processing)
    }

    pub fn mark_extracted(&mut self) -> Result<(), ModelError> {
        self.transition(&[DocumentStatus::Processing], DocumentStatus::Extracted)
    }

    pub fn mark_failed(&mut self, reason: FailureReason) -> Result<(), ModelError> {
        self.transition(
            &[DocumentStatus::Queued, DocumentStatus::Processing],
            DocumentStatus::Failed,
        )?;
        self.failure = Some(reason);
        Ok(())
    }

    /// Put a processing document back in line after a retryable failure.
    pub fn requeue_for_retry(&mut self) -> Result<(), ModelError> {
        self.transition(&[DocumentStatus::Processing], DocumentStatus::Queued)?;
        self.retry_count += 1;
        Ok(())
    }

    /// Metadata-only copy for bookkeeping that outlives processing.
    pub fn without_text(mut self) -> Self {
        self.text = String::new();
        self
    }

    pub fn error_detail(&self) -> Option<String> {
        self.failure.as_ref().map(|f| f.to_string())
    }

    fn transition(&mut self, allowed: &[DocumentStatus], to: DocumentStatus) -> Result<(), ModelError> {
        if !allowed.contains(&self.status) {
            return Err(ModelError::InvalidTransition {
                from: self.status,
                to,
            });
        }
        self.status = to;
        self.updated_at = Utc::now();
        Ok(())
    }
}

/// Documents dequeued together by one worker. Not atomic as a whole:
/// each document succeeds or fails on its own.
#[derive(Debug)]
pub struct Batch {
    pub id: Uuid,
    pub documents: Vec<Document>,
}

impl Batch {
    pub fn new(documents: Vec<Document>) -> Self {
        Self {
            id: Uuid::new_v4(),
            documents,
        }
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}
