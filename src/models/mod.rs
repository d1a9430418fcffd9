pub mod enums;
pub mod document;
pub mod extraction;
pub mod health;

pub use enums::*;
pub use document::*;
pub use extraction::*;
pub use health::*;

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModelError {
    #[error("Invalid enum value for {field}: {value}")]
    InvalidEnum { field: String, value: String },

    #[error("Invalid document transition: {from} -> {to}")]
    InvalidTransition {
        from: DocumentStatus,
        to: DocumentStatus,
    },
}
