pub mod config;
pub mod models;
pub mod pipeline;
pub mod health;

pub use config::{ConfigError, Settings};
pub use health::{Supervisor, SupervisorConfig};
pub use pipeline::coordinator::{CoordinatorConfig, DocumentStore, PipelineCoordinator};
pub use pipeline::extraction::{EngineConfig, ExtractionEngine, ExtractionError};

use tracing_subscriber::EnvFilter;

/// Install the global fmt subscriber. `RUST_LOG` wins over
/// [`config::default_log_filter`]. Safe to call more than once.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter()));
    if tracing_subscriber::fmt().with_env_filter(filter).try_init().is_ok() {
        tracing::info!("{} v{}", config::APP_NAME, config::APP_VERSION);
    }
}
