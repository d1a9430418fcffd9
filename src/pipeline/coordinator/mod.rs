//! Pipeline coordinator: a bounded work queue drained by a fixed worker pool.
//!
//! Each worker takes a batch, extracts every document with the shared
//! [`ExtractionEngine`](crate::pipeline::extraction::ExtractionEngine) and
//! writes results through a [`DocumentStore`]. Workers never share documents;
//! state changes flow to one sink task over a channel.

pub mod error;
pub mod pool;
pub(crate) mod queue;
pub mod store;
pub mod traits;
pub mod types;
pub(crate) mod worker;

pub use error::CoordinatorError;
pub use pool::PipelineCoordinator;
pub use store::InMemoryDocumentStore;
pub use traits::{DocumentStore, StoreError};
pub use types::{CoordinatorConfig, CounterSnapshot, DrainReport, PipelineHandle};
