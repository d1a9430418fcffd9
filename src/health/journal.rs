//! Append-only record sinks.
//!
//! [`JsonlJournal`] writes one JSON object per line:
//! ```text
//! {journal_dir}/
//!   alerts.jsonl      {timestamp, level, component, message}
//!   snapshots.jsonl   {timestamp, cpuPct, memPct, diskPct, processStatuses[], alertLevel}
//!   restarts.jsonl    {timestamp, reason, attemptNumber, outcome}
//! ```

use std::collections::VecDeque;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::Serialize;

use super::traits::HealthJournal;
use super::HealthError;
use crate::models::{AlertRecord, HealthSnapshot, RestartAttempt};

pub const ALERTS_FILE: &str = "alerts.jsonl";
pub const SNAPSHOTS_FILE: &str = "snapshots.jsonl";
pub const RESTARTS_FILE: &str = "restarts.jsonl";

pub struct JsonlJournal {
    dir: PathBuf,
}

impl JsonlJournal {
    /// Create the journal directory if needed.
    pub fn open(dir: &Path) -> Result<Self, HealthError> {
        std::fs::create_dir_all(dir)?;
        Ok(Self {
            dir: dir.to_path_buf(),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Never panics.
    fn append<T: Serialize>(&self, filename: &str, value: &T) {
        let path = self.dir.join(filename);
        let line = match serde_json::to_string(value) {
            Ok(line) => line,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Journal: failed to serialize record");
                return;
            }
        };
        let written = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .and_then(|mut file| writeln!(file, "{line}"));
        if let Err(e) = written {
            tracing::warn!(path = %path.display(), error = %e, "Journal: failed to append record");
        }
    }
}

impl HealthJournal for JsonlJournal {
    fn record_alert(&self, alert: &AlertRecord) {
        self.append(ALERTS_FILE, alert);
    }

    fn record_snapshot(&self, snapshot: &HealthSnapshot) {
        self.append(SNAPSHOTS_FILE, snapshot);
    }

    fn record_restart(&self, attempt: &RestartAttempt) {
        self.append(RESTARTS_FILE, attempt);
    }
}

/// Records kept per kind by [`MemoryJournal::new`].
pub const DEFAULT_MEMORY_CAPACITY: usize = 1024;

/// Keeps the most recent records of each kind in memory; the oldest are
/// dropped once `capacity` is reached.
#[derive(Debug)]
pub struct MemoryJournal {
    capacity: usize,
    alerts: Mutex<VecDeque<AlertRecord>>,
    snapshots: Mutex<VecDeque<HealthSnapshot>>,
    restarts: Mutex<VecDeque<RestartAttempt>>,
}

impl MemoryJournal {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_MEMORY_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            alerts: Mutex::new(VecDeque::new()),
            snapshots: Mutex::new(VecDeque::new()),
            restarts: Mutex::new(VecDeque::new()),
        }
    }

    pub fn alerts(&self) -> Vec<AlertRecord> {
        Self::contents(&self.alerts)
    }

    pub fn snapshots(&self) -> Vec<HealthSnapshot> {
        Self::contents(&self.snapshots)
    }

    pub fn restarts(&self) -> Vec<RestartAttempt> {
        Self::contents(&self.restarts)
    }

    fn contents<T: Clone>(records: &Mutex<VecDeque<T>>) -> Vec<T> {
        records
            .lock()
            .map(|r| r.iter().cloned().collect())
            .unwrap_or_default()
    }

    fn push<T: Clone>(&self, records: &Mutex<VecDeque<T>>, record: &T) {
        if let Ok(mut records) = records.lock() {
            if records.len() == self.capacity {
                records.pop_front();
            }
            records.push_back(record.clone());
        }
    }
}

impl Default for MemoryJournal {
    fn default() -> Self {
        Self::new()
    }
}

impl HealthJournal for MemoryJournal {
    fn record_alert(&self, alert: &AlertRecord) {
        self.push(&self.alerts, alert);
    }

    fn record_snapshot(&self, snapshot: &HealthSnapshot) {
        self.push(&self.snapshots, snapshot);
    }

    fn record_restart(&self, attempt: &RestartAttempt) {
        self.push(&self.restarts, attempt);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AlertLevel, RestartOutcome};
    use chrono::{TimeZone, Timelike, Utc};

    fn alert() -> AlertRecord {
        AlertRecord {
            timestamp: Utc.with_ymd_and_hms(2026, 2, 1, 9, 30, 0).unwrap(),
            level: AlertLevel::Warning,
            component: "cpu".into(),
            message: "cpu at 85.0% (warning 80%)".into(),
        }
    }

    #[test]
    fn jsonl_appends_one_record_per_line() {
        let tmp = tempfile::tempdir().unwrap();
        let journal = JsonlJournal::open(&tmp.path().join("journal")).unwrap();
        journal.record_alert(&alert());
        journal.record_alert(&alert());
        journal.record_restart(&RestartAttempt {
            timestamp: Utc.with_ymd_and_hms(2026, 2, 1, 9, 31, 0).unwrap(),
            reason: "store unreachable".into(),
            attempt_number: 1,
            outcome: RestartOutcome::Failed,
        });

        let alerts = std::fs::read_to_string(journal.dir().join(ALERTS_FILE)).unwrap();
        let lines: Vec<&str> = alerts.lines().collect();
        assert_eq!(lines.len(), 2);
        let parsed: AlertRecord = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(parsed, alert());

        let restarts = std::fs::read_to_string(journal.dir().join(RESTARTS_FILE)).unwrap();
        assert!(restarts.contains("\"attemptNumber\":1"));
        assert!(restarts.contains("\"outcome\":\"failed\""));
    }

    #[test]
    fn jsonl_write_failure_does_not_panic() {
        let tmp = tempfile::tempdir().unwrap();
        let journal = JsonlJournal::open(tmp.path()).unwrap();
        std::fs::remove_dir_all(tmp.path()).unwrap();
        journal.record_alert(&alert());
        // No panic = success
    }

    #[test]
    fn memory_journal_keeps_records() {
        let journal = MemoryJournal::new();
        journal.record_alert(&alert());
        assert_eq!(journal.alerts(), vec![alert()]);
        assert!(journal.snapshots().is_empty());
    }

    #[test]
    fn memory_journal_keeps_only_the_newest() {
        let journal = MemoryJournal::with_capacity(2);
        for minute in 0..3 {
            journal.record_alert(&AlertRecord {
                timestamp: Utc.with_ymd_and_hms(2026, 2, 1, 9, minute, 0).unwrap(),
                ..alert()
            });
        }
        let kept: Vec<u32> = journal.alerts().iter().map(|a| a.timestamp.minute()).collect();
        assert_eq!(kept, vec![1, 2]);
    }
}
