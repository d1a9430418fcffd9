use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::enums::Direction;

/// Application-level constants
pub const APP_NAME: &str = "Fedha";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prefix for environment overrides (`FEDHA_WORKER_COUNT`, ...).
pub const ENV_PREFIX: &str = "FEDHA_";

/// Longest accepted interval or timeout (one year).
pub const MAX_DURATION_SECONDS: f64 = 365.0 * 24.0 * 3600.0;

/// Log filter used when `RUST_LOG` is not set.
pub fn default_log_filter() -> &'static str {
    "fedha_lib=info,warn"
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("I/O error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid configuration JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid value for {key}: {value}")]
    InvalidOverride { key: String, value: String },

    #[error("Invalid configuration: {0}")]
    Validation(String),
}

/// Every option the core recognizes. Keys are camelCase on the wire
/// (`workerCount`, `cpuWarningPct`, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    // ── Pipeline ─────────────────────────────────────────
    pub worker_count: usize,
    pub batch_size: usize,
    pub queue_capacity: usize,
    /// Upper bound on a document's `retry_count`.
    pub max_retries: u32,
    pub drain_timeout_seconds: f64,

    // ── Extraction ───────────────────────────────────────
    /// Amounts at or above this (major units) are treated as OCR corruption.
    pub max_amount_magnitude: f64,
    pub max_text_bytes: usize,
    pub unmatched_direction: Direction,

    // ── Supervisor ───────────────────────────────────────
    pub check_interval_seconds: f64,
    pub check_timeout_seconds: f64,
    pub max_restart_attempts: u32,
    pub restart_timeout_seconds: f64,
    /// 0 disables re-emission of long-lived breaches.
    pub alert_repeat_interval_seconds: f64,
    pub cpu_warning_pct: f64,
    pub cpu_critical_pct: f64,
    pub mem_warning_pct: f64,
    pub mem_critical_pct: f64,
    pub disk_warning_pct: f64,
    pub disk_critical_pct: f64,
    pub disk_path: PathBuf,
    pub journal_dir: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            worker_count: 4,
            batch_size: 8,
            queue_capacity: 256,
            max_retries: 3,
            drain_timeout_seconds: 30.0,
            max_amount_magnitude: 1_000_000_000.0,
            max_text_bytes: 2 * 1024 * 1024,
            unmatched_direction: Direction::Unclassified,
            check_interval_seconds: 30.0,
            check_timeout_seconds: 5.0,
            max_restart_attempts: 3,
            restart_timeout_seconds: 5.0,
            alert_repeat_interval_seconds: 1800.0,
            cpu_warning_pct: 80.0,
            cpu_critical_pct: 95.0,
            mem_warning_pct: 85.0,
            mem_critical_pct: 95.0,
            disk_warning_pct: 85.0,
            disk_critical_pct: 95.0,
            disk_path: PathBuf::from("/"),
            journal_dir: None,
        }
    }
}

impl Settings {
    /// Parse settings from JSON. Missing keys take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let settings: Settings = serde_json::from_str(json)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Load a JSON settings file, then apply `FEDHA_*` environment overrides.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut settings: Settings = serde_json::from_str(&raw)?;
        settings.apply_env_overrides()?;
        settings.validate()?;
        tracing::info!(path = %path.display(), "Settings loaded");
        Ok(settings)
    }

    /// Apply overrides from the process environment.
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides(std::env::vars())
    }

    /// Apply `FEDHA_<UPPER_SNAKE>` overrides from any key/value source.
    /// Unknown keys under the prefix are ignored.
    pub fn apply_overrides<I>(&mut self, vars: I) -> Result<(), ConfigError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (key, value) in vars {
            let Some(name) = key.strip_prefix(ENV_PREFIX) else {
                continue;
            };
            match name {
                "WORKER_COUNT" => self.worker_count = parse_override(&key, &value)?,
                "BATCH_SIZE" => self.batch_size = parse_override(&key, &value)?,
                "QUEUE_CAPACITY" => self.queue_capacity = parse_override(&key, &value)?,
                "MAX_RETRIES" => self.max_retries = parse_override(&key, &value)?,
                "DRAIN_TIMEOUT_SECONDS" => self.drain_timeout_seconds = parse_override(&key, &value)?,
                "MAX_AMOUNT_MAGNITUDE" => self.max_amount_magnitude = parse_override(&key, &value)?,
                "MAX_TEXT_BYTES" => self.max_text_bytes = parse_override(&key, &value)?,
                "UNMATCHED_DIRECTION" => self.unmatched_direction = parse_override(&key, &value)?,
                "CHECK_INTERVAL_SECONDS" => self.check_interval_seconds = parse_override(&key, &value)?,
                "CHECK_TIMEOUT_SECONDS" => self.check_timeout_seconds = parse_override(&key, &value)?,
                "MAX_RESTART_ATTEMPTS" => self.max_restart_attempts = parse_override(&key, &value)?,
                "RESTART_TIMEOUT_SECONDS" => self.restart_timeout_seconds = parse_override(&key, &value)?,
                "ALERT_REPEAT_INTERVAL_SECONDS" => {
                    self.alert_repeat_interval_seconds = parse_override(&key, &value)?
                }
                "CPU_WARNING_PCT" => self.cpu_warning_pct = parse_override(&key, &value)?,
                "CPU_CRITICAL_PCT" => self.cpu_critical_pct = parse_override(&key, &value)?,
                "MEM_WARNING_PCT" => self.mem_warning_pct = parse_override(&key, &value)?,
                "MEM_CRITICAL_PCT" => self.mem_critical_pct = parse_override(&key, &value)?,
                "DISK_WARNING_PCT" => self.disk_warning_pct = parse_override(&key, &value)?,
                "DISK_CRITICAL_PCT" => self.disk_critical_pct = parse_override(&key, &value)?,
                "DISK_PATH" => self.disk_path = PathBuf::from(value),
                "JOURNAL_DIR" => self.journal_dir = Some(PathBuf::from(value)),
                _ => tracing::debug!(key = %key, "Ignoring unknown override"),
            }
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.worker_count == 0 {
            return Err(ConfigError::Validation("workerCount must be at least 1".into()));
        }
        if self.batch_size == 0 {
            return Err(ConfigError::Validation("batchSize must be at least 1".into()));
        }
        if self.queue_capacity == 0 {
            return Err(ConfigError::Validation("queueCapacity must be at least 1".into()));
        }
        if self.max_text_bytes == 0 {
            return Err(ConfigError::Validation("maxTextBytes must be at least 1".into()));
        }
        if !(self.max_amount_magnitude > 0.0) || !self.max_amount_magnitude.is_finite() {
            return Err(ConfigError::Validation(
                "maxAmountMagnitude must be positive and finite".into(),
            ));
        }
        for (name, value) in [
            ("checkIntervalSeconds", self.check_interval_seconds),
            ("checkTimeoutSeconds", self.check_timeout_seconds),
            ("restartTimeoutSeconds", self.restart_timeout_seconds),
            ("drainTimeoutSeconds", self.drain_timeout_seconds),
        ] {
            if !(value > 0.0) || !(value <= MAX_DURATION_SECONDS) {
                return Err(ConfigError::Validation(format!(
                    "{name} must be in (0, {MAX_DURATION_SECONDS}] (got {value})"
                )));
            }
        }
        if !(0.0..=MAX_DURATION_SECONDS).contains(&self.alert_repeat_interval_seconds) {
            return Err(ConfigError::Validation(format!(
                "alertRepeatIntervalSeconds must be in [0, {MAX_DURATION_SECONDS}] (got {})",
                self.alert_repeat_interval_seconds
            )));
        }
        for (resource, warning, critical) in [
            ("cpu", self.cpu_warning_pct, self.cpu_critical_pct),
            ("mem", self.mem_warning_pct, self.mem_critical_pct),
            ("disk", self.disk_warning_pct, self.disk_critical_pct),
        ] {
            if !(0.0..critical).contains(&warning) || critical > 100.0 {
                return Err(ConfigError::Validation(format!(
                    "{resource} thresholds must satisfy 0 <= warning < critical <= 100 (got {warning}/{critical})"
                )));
            }
        }
        Ok(())
    }

    pub fn drain_timeout(&self) -> Duration {
        seconds(self.drain_timeout_seconds)
    }

    pub fn check_interval(&self) -> Duration {
        seconds(self.check_interval_seconds)
    }

    pub fn check_timeout(&self) -> Duration {
        seconds(self.check_timeout_seconds)
    }

    pub fn restart_timeout(&self) -> Duration {
        seconds(self.restart_timeout_seconds)
    }

    /// `None` when repeats are disabled.
    pub fn alert_repeat_interval(&self) -> Option<Duration> {
        (self.alert_repeat_interval_seconds > 0.0).then(|| seconds(self.alert_repeat_interval_seconds))
    }
}

/// Clamp into `[0, MAX_DURATION_SECONDS]`; NaN becomes zero. Never panics,
/// even for settings that skipped `validate`.
fn seconds(value: f64) -> Duration {
    Duration::try_from_secs_f64(value.clamp(0.0, MAX_DURATION_SECONDS)).unwrap_or_default()
}

fn parse_override<T: FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn defaults_are_valid() {
        let settings = Settings::default();
        settings.validate().unwrap();
        assert_eq!(settings.max_restart_attempts, 3);
        assert_eq!(settings.restart_timeout(), Duration::from_secs(5));
        assert_eq!(settings.unmatched_direction, Direction::Unclassified);
    }

    #[test]
    fn parses_camel_case_keys() {
        let settings = Settings::from_json_str(
            r#"{"workerCount": 2, "batchSize": 5, "checkIntervalSeconds": 1.5,
                "maxRestartAttempts": 4, "cpuWarningPct": 70, "cpuCriticalPct": 90,
                "maxAmountMagnitude": 5000000}"#,
        )
        .unwrap();
        assert_eq!(settings.worker_count, 2);
        assert_eq!(settings.batch_size, 5);
        assert_eq!(settings.check_interval(), Duration::from_millis(1500));
        assert_eq!(settings.max_restart_attempts, 4);
        assert_eq!(settings.cpu_warning_pct, 70.0);
        assert_eq!(settings.max_amount_magnitude, 5_000_000.0);
        // Untouched keys keep defaults
        assert_eq!(settings.mem_critical_pct, 95.0);
    }

    #[test]
    fn rejects_zero_workers() {
        let err = Settings::from_json_str(r#"{"workerCount": 0}"#).unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
    }

    #[test]
    fn rejects_inverted_thresholds() {
        let err = Settings::from_json_str(r#"{"diskWarningPct": 96, "diskCriticalPct": 90}"#)
            .unwrap_err();
        assert!(err.to_string().contains("disk"));
    }

    #[test]
    fn rejects_malformed_json() {
        assert!(matches!(
            Settings::from_json_str("{not json"),
            Err(ConfigError::Json(_))
        ));
    }

    #[test]
    fn env_overrides_apply() {
        let mut settings = Settings::default();
        settings
            .apply_overrides(vars(&[
                ("FEDHA_WORKER_COUNT", "12"),
                ("FEDHA_UNMATCHED_DIRECTION", "out"),
                ("FEDHA_JOURNAL_DIR", "/var/log/fedha"),
                ("PATH", "/usr/bin"),
            ]))
            .unwrap();
        assert_eq!(settings.worker_count, 12);
        assert_eq!(settings.unmatched_direction, Direction::Out);
        assert_eq!(settings.journal_dir, Some(PathBuf::from("/var/log/fedha")));
    }

    #[test]
    fn bad_override_is_reported() {
        let mut settings = Settings::default();
        let err = settings
            .apply_overrides(vars(&[("FEDHA_BATCH_SIZE", "lots")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidOverride { .. }));
    }

    #[test]
    fn load_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fedha.json");
        std::fs::write(&path, r#"{"queueCapacity": 10}"#).unwrap();
        let settings = Settings::load(&path).unwrap();
        assert_eq!(settings.queue_capacity, 10);
    }

    #[test]
    fn repeat_interval_zero_disables() {
        let settings = Settings {
            alert_repeat_interval_seconds: 0.0,
            ..Settings::default()
        };
        assert!(settings.alert_repeat_interval().is_none());
    }

    #[test]
    fn rejects_unrepresentable_durations() {
        for (key, value) in [
            ("FEDHA_ALERT_REPEAT_INTERVAL_SECONDS", "inf"),
            ("FEDHA_CHECK_INTERVAL_SECONDS", "1e300"),
            ("FEDHA_RESTART_TIMEOUT_SECONDS", "NaN"),
            ("FEDHA_DRAIN_TIMEOUT_SECONDS", "-inf"),
        ] {
            let mut settings = Settings::default();
            settings.apply_overrides(vars(&[(key, value)])).unwrap();
            assert!(
                matches!(settings.validate(), Err(ConfigError::Validation(_))),
                "{key}={value} should be rejected"
            );
        }
    }

    #[test]
    fn duration_getters_never_panic() {
        let settings = Settings {
            check_interval_seconds: 1e300,
            check_timeout_seconds: f64::NAN,
            alert_repeat_interval_seconds: f64::INFINITY,
            ..Settings::default()
        };
        assert_eq!(settings.check_interval(), Duration::from_secs_f64(MAX_DURATION_SECONDS));
        assert_eq!(settings.check_timeout(), Duration::ZERO);
        assert!(settings.alert_repeat_interval().is_some());
    }
}
