use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::models::{AlertLevel, AlertRecord};

/// Warning and critical bounds for one resource, in percent.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    pub warning: f64,
    pub critical: f64,
}

impl Thresholds {
    pub fn new(warning: f64, critical: f64) -> Self {
        Self { warning, critical }
    }

    pub fn level(&self, value: f64) -> AlertLevel {
        if value >= self.critical {
            AlertLevel::Critical
        } else if value >= self.warning {
            AlertLevel::Warning
        } else {
            AlertLevel::Normal
        }
    }
}

#[derive(Debug, Clone)]
struct ComponentState {
    level: AlertLevel,
    last_emitted: Option<DateTime<Utc>>,
}

/// Turns per-tick levels into alerts on level *transitions*.
///
/// A breach held across many ticks yields one alert, plus one more every
/// `repeat_interval` if set. Returning to normal is logged, not alerted.
#[derive(Debug, Default)]
pub struct AlertTracker {
    repeat_interval: Option<Duration>,
    components: HashMap<String, ComponentState>,
}

impl AlertTracker {
    pub fn new(repeat_interval: Option<Duration>) -> Self {
        Self {
            repeat_interval,
            components: HashMap::new(),
        }
    }

    pub fn level(&self, component: &str) -> AlertLevel {
        self.components
            .get(component)
            .map(|c| c.level)
            .unwrap_or(AlertLevel::Normal)
    }

    pub fn observe(
        &mut self,
        component: &str,
        level: AlertLevel,
        message: impl FnOnce() -> String,
        now: DateTime<Utc>,
    ) -> Option<AlertRecord> {
        let state = self
            .components
            .entry(component.to_string())
            .or_insert(ComponentState {
                level: AlertLevel::Normal,
                last_emitted: None,
            });

        let emit = if level != state.level {
            let previous = state.level;
            state.level = level;
            if level == AlertLevel::Normal {
                tracing::info!(component, from = %previous, "Back to normal");
                state.last_emitted = None;
                false
            } else {
                true
            }
        } else if level != AlertLevel::Normal {
            match (self.repeat_interval, state.last_emitted) {
                (Some(every), Some(last)) => now
                    .signed_duration_since(last)
                    .to_std()
                    .map(|elapsed| elapsed >= every)
                    .unwrap_or(false),
                _ => false,
            }
        } else {
            false
        };

        if !emit {
            return None;
        }
        state.last_emitted = Some(now);
        Some(AlertRecord {
            timestamp: now,
            level,
            component: component.to_string(),
            message: message(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t(secs: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap() + chrono::Duration::seconds(secs)
    }

    fn msg() -> String {
        "cpu high".to_string()
    }

    #[test]
    fn threshold_levels() {
        let th = Thresholds::new(80.0, 95.0);
        assert_eq!(th.level(10.0), AlertLevel::Normal);
        assert_eq!(th.level(80.0), AlertLevel::Warning);
        assert_eq!(th.level(95.0), AlertLevel::Critical);
        assert_eq!(th.level(f64::NAN), AlertLevel::Normal);
    }

    #[test]
    fn sustained_breach_alerts_once() {
        let mut tracker = AlertTracker::new(None);
        let emitted = (0..20)
            .filter_map(|i| tracker.observe("cpu", AlertLevel::Warning, msg, t(i * 30)))
            .count();
        assert_eq!(emitted, 1);
    }

    #[test]
    fn escalation_and_recovery() {
        let mut tracker = AlertTracker::new(None);
        assert!(tracker.observe("cpu", AlertLevel::Normal, msg, t(0)).is_none());
        let warn = tracker.observe("cpu", AlertLevel::Warning, msg, t(1)).unwrap();
        assert_eq!(warn.level, AlertLevel::Warning);
        let crit = tracker.observe("cpu", AlertLevel::Critical, msg, t(2)).unwrap();
        assert_eq!(crit.level, AlertLevel::Critical);
        assert!(tracker.observe("cpu", AlertLevel::Normal, msg, t(3)).is_none());
        assert_eq!(tracker.level("cpu"), AlertLevel::Normal);
        // A fresh breach after recovery alerts again
        assert!(tracker.observe("cpu", AlertLevel::Warning, msg, t(4)).is_some());
    }

    #[test]
    fn repeat_interval_re_emits_long_breaches() {
        let mut tracker = AlertTracker::new(Some(Duration::from_secs(60)));
        let emitted: Vec<i64> = (0..5)
            .filter(|i| tracker.observe("disk", AlertLevel::Critical, msg, t(i * 30)).is_some())
            .map(|i| i * 30)
            .collect();
        assert_eq!(emitted, vec![0, 60, 120]);
    }

    #[test]
    fn components_are_independent() {
        let mut tracker = AlertTracker::new(None);
        assert!(tracker.observe("cpu", AlertLevel::Warning, msg, t(0)).is_some());
        assert!(tracker.observe("memory", AlertLevel::Warning, msg, t(0)).is_some());
        assert!(tracker.observe("cpu", AlertLevel::Warning, msg, t(1)).is_none());
    }
}
