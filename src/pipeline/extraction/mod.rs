pub mod confidence;
pub mod engine;
pub mod grammars;
pub mod sanitize;
pub mod types;

pub use confidence::*;
pub use engine::*;
pub use sanitize::*;
pub use types::*;

use thiserror::Error;

/// Input the engine refuses outright. A text that simply matches no grammar
/// is not an error: it yields an empty result list.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExtractionError {
    #[error("No text left to extract from after sanitization")]
    EmptyInput,

    #[error("Malformed input: {0}")]
    Malformed(String),

    #[error("Input too large: {size} bytes (max {max})")]
    TooLarge { size: usize, max: usize },
}
