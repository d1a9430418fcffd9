//! Seams the supervisor is built from. Every source of time, metrics,
//! liveness and side effects is injected, so a tick is deterministic
//! under test.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::HealthError;
use crate::models::{AlertRecord, HealthSnapshot, RestartAttempt};

/// Resource usage at one instant, in percent.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ResourceSample {
    pub cpu_pct: f64,
    pub mem_pct: f64,
    pub disk_pct: f64,
}

/// The supervisor boxes each call with the check timeout and drops the
/// future when it expires.
#[async_trait]
pub trait MetricsSource: Send {
    /// Takes `&mut self`: CPU usage is a delta against the previous sample.
    async fn sample(&mut self) -> Result<ResourceSample, HealthError>;
}

/// A bounded check that one collaborator is reachable.
#[async_trait]
pub trait LivenessProbe: Send + Sync {
    fn component(&self) -> &str;

    async fn check(&self) -> bool;
}

#[async_trait]
pub trait Restarter: Send + Sync {
    async fn restart(&self, reason: &str) -> Result<(), HealthError>;
}

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Append-only sink for emitted records. Implementations never panic and
/// never fail the caller; write errors are logged and dropped.
pub trait HealthJournal: Send + Sync {
    fn record_alert(&self, alert: &AlertRecord);

    fn record_snapshot(&self, snapshot: &HealthSnapshot);

    fn record_restart(&self, attempt: &RestartAttempt);
}
