use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use futures_util::future::join_all;

use super::traits::LivenessProbe;
use crate::models::{LivenessStatus, ProcessStatus};
use crate::pipeline::coordinator::{DocumentStore, PipelineHandle};

/// Run every probe concurrently, each boxed by `timeout`. A probe that
/// times out is unreachable.
pub async fn check_all(probes: &[Arc<dyn LivenessProbe>], timeout: Duration) -> Vec<ProcessStatus> {
    join_all(probes.iter().map(|probe| async move {
        let started = Instant::now();
        let reachable = match tokio::time::timeout(timeout, probe.check()).await {
            Ok(reachable) => reachable,
            Err(_) => {
                tracing::warn!(component = probe.component(), "Liveness check timed out");
                false
            }
        };
        ProcessStatus {
            component: probe.component().to_string(),
            status: if reachable {
                LivenessStatus::Healthy
            } else {
                LivenessStatus::Unreachable
            },
            latency_ms: started.elapsed().as_millis() as u64,
        }
    }))
    .await
}

/// Wraps a store's `check_connectivity`.
pub struct StoreProbe {
    component: String,
    store: Arc<dyn DocumentStore>,
}

impl StoreProbe {
    pub fn new(component: impl Into<String>, store: Arc<dyn DocumentStore>) -> Self {
        Self {
            component: component.into(),
            store,
        }
    }
}

#[async_trait]
impl LivenessProbe for StoreProbe {
    fn component(&self) -> &str {
        &self.component
    }

    async fn check(&self) -> bool {
        self.store.check_connectivity().await
    }
}

/// The pipeline is live while at least one worker is running. A drained
/// pipeline reports unreachable.
pub struct PipelineProbe {
    handle: PipelineHandle,
}

impl PipelineProbe {
    pub fn new(handle: PipelineHandle) -> Self {
        Self { handle }
    }
}

#[async_trait]
impl LivenessProbe for PipelineProbe {
    fn component(&self) -> &str {
        "pipeline"
    }

    async fn check(&self) -> bool {
        self.handle.live_workers() > 0
    }
}
