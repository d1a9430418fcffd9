use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::enums::{AlertLevel, LivenessStatus, RestartOutcome};

/// Liveness of one monitored collaborator at a sampling instant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessStatus {
    pub component: String,
    pub status: LivenessStatus,
    pub latency_ms: u64,
}

/// Metrics at one sampling tick. Append-only, never mutated.
///
/// Serialized schema is fixed for downstream tooling:
/// `{timestamp, cpuPct, memPct, diskPct, processStatuses[], alertLevel}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthSnapshot {
    pub timestamp: DateTime<Utc>,
    pub cpu_pct: f64,
    pub mem_pct: f64,
    pub disk_pct: f64,
    pub process_statuses: Vec<ProcessStatus>,
    pub alert_level: AlertLevel,
}

/// Alert record: `{timestamp, level, component, message}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertRecord {
    pub timestamp: DateTime<Utc>,
    pub level: AlertLevel,
    pub component: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RestartAttempt {
    pub timestamp: DateTime<Utc>,
    pub reason: String,
    pub attempt_number: u32,
    pub outcome: RestartOutcome,
}
