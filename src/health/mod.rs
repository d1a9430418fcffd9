//! Health supervisor: samples resource metrics and collaborator liveness on
//! a fixed interval, raises de-duplicated alerts, records a snapshot every
//! tick and drives bounded auto-restart.

pub mod alerts;
pub mod clock;
pub mod journal;
pub mod metrics;
pub mod probes;
pub mod restart;
pub mod supervisor;
pub mod traits;

pub use alerts::{AlertTracker, Thresholds};
pub use clock::{ManualClock, SystemClock};
pub use journal::{JsonlJournal, MemoryJournal};
pub use metrics::ProcfsMetrics;
pub use probes::{PipelineProbe, StoreProbe};
pub use restart::CommandRestarter;
pub use supervisor::{RestartRequest, Supervisor, SupervisorConfig, TickReport};
pub use traits::{Clock, HealthJournal, LivenessProbe, MetricsSource, ResourceSample, Restarter};

use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum HealthError {
    #[error("Metrics unavailable: {0}")]
    MetricsUnavailable(String),

    #[error("Restart failed: {0}")]
    RestartFailed(String),

    #[error("Restart timed out after {0:?}")]
    RestartTimedOut(Duration),

    #[error("Journal I/O error: {0}")]
    Io(#[from] std::io::Error),
}
