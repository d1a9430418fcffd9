pub mod format;

pub use format::*;

use std::path::Path;

use thiserror::Error;

use crate::models::Document;

#[derive(Error, Debug)]
pub enum ImportError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Unsupported source: {0}")]
    UnsupportedFormat(String),

    #[error("File too large: {size} bytes exceeds {max} byte limit")]
    FileTooLarge { size: u64, max: u64 },

    #[error("Source is empty")]
    Empty,
}

/// Read an upstream text source and wrap it as a `queued` document.
/// `sourceRef` is the path as given.
pub fn load_document(path: &Path, max_bytes: u64) -> Result<Document, ImportError> {
    let source = detect_source(path, max_bytes)?;
    let format = classify_text(&source.text);
    let doc = Document::new(path.display().to_string(), format, source.text);
    tracing::info!(
        document_id = %doc.id,
        format = %doc.format,
        bytes = source.size_bytes,
        "Document loaded"
    );
    Ok(doc)
}
