use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinSet;
use tokio::time::MissedTickBehavior;
use tracing::Instrument;

use super::alerts::{AlertTracker, Thresholds};
use super::clock::SystemClock;
use super::journal::{JsonlJournal, MemoryJournal};
use super::metrics::ProcfsMetrics;
use super::probes::check_all;
use super::traits::{Clock, HealthJournal, LivenessProbe, MetricsSource, ResourceSample, Restarter};
use super::HealthError;
use crate::config::Settings;
use crate::models::{
    AlertLevel, AlertRecord, HealthSnapshot, LivenessStatus, ProcessStatus, Resource, RestartAttempt,
    RestartOutcome, SupervisorState,
};

/// `tokio::time::interval` rejects a zero period.
const MIN_CHECK_INTERVAL: Duration = Duration::from_millis(1);

#[derive(Debug, Clone, PartialEq)]
pub struct SupervisorConfig {
    pub check_interval: Duration,
    /// Timebox for each liveness probe.
    pub check_timeout: Duration,
    /// Timebox for each restart call.
    pub restart_timeout: Duration,
    pub max_restart_attempts: u32,
    pub alert_repeat_interval: Option<Duration>,
    pub cpu: Thresholds,
    pub memory: Thresholds,
    pub disk: Thresholds,
}

impl From<&Settings> for SupervisorConfig {
    fn from(settings: &Settings) -> Self {
        Self {
            check_interval: settings.check_interval(),
            check_timeout: settings.check_timeout(),
            restart_timeout: settings.restart_timeout(),
            max_restart_attempts: settings.max_restart_attempts,
            alert_repeat_interval: settings.alert_repeat_interval(),
            cpu: Thresholds::new(settings.cpu_warning_pct, settings.cpu_critical_pct),
            memory: Thresholds::new(settings.mem_warning_pct, settings.mem_critical_pct),
            disk: Thresholds::new(settings.disk_warning_pct, settings.disk_critical_pct),
        }
    }
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self::from(&Settings::default())
    }
}

/// A restart the supervisor has decided on but not yet run.
#[derive(Debug, Clone, PartialEq)]
pub struct RestartRequest {
    pub attempt_number: u32,
    pub reason: String,
}

/// Everything one sampling tick produced.
#[derive(Debug, Clone)]
pub struct TickReport {
    pub snapshot: HealthSnapshot,
    pub alerts: Vec<AlertRecord>,
    pub state: SupervisorState,
    pub restart: Option<RestartRequest>,
}

/// What a restart task needs, detached from the supervisor so it can run
/// while the sampling loop keeps ticking.
#[derive(Clone)]
struct RestartTask {
    restarter: Arc<dyn Restarter>,
    probes: Vec<Arc<dyn LivenessProbe>>,
    restart_timeout: Duration,
    check_timeout: Duration,
}

impl RestartTask {
    /// Success means the restarter returned in time *and* every probe is
    /// healthy again.
    async fn run(&self, request: &RestartRequest) -> RestartOutcome {
        let restarted = tokio::time::timeout(self.restart_timeout, self.restarter.restart(&request.reason)).await;
        match restarted {
            Err(_) => {
                let e = HealthError::RestartTimedOut(self.restart_timeout);
                tracing::warn!(attempt = request.attempt_number, error = %e, "Restart failed");
                return RestartOutcome::Failed;
            }
            Ok(Err(e)) => {
                tracing::warn!(attempt = request.attempt_number, error = %e, "Restart failed");
                return RestartOutcome::Failed;
            }
            Ok(Ok(())) => {}
        }

        let statuses = check_all(&self.probes, self.check_timeout).await;
        if statuses.iter().all(|s| s.status == LivenessStatus::Healthy) {
            RestartOutcome::Success
        } else {
            tracing::warn!(attempt = request.attempt_number, "Collaborators still unreachable after restart");
            RestartOutcome::Failed
        }
    }
}

/// Independent control loop over metrics and liveness.
///
/// States: `healthy → degraded` (warning breach) `→ critical` (critical
/// breach or liveness failure) `→ recovering` (restart running) `→ healthy`
/// on success, or `halted` once restart attempts are exhausted. `halted`
/// only ends through [`reset`](Self::reset); sampling and snapshots go on
/// regardless.
pub struct Supervisor {
    config: SupervisorConfig,
    metrics: Box<dyn MetricsSource>,
    probes: Vec<Arc<dyn LivenessProbe>>,
    restarter: Arc<dyn Restarter>,
    journal: Arc<dyn HealthJournal>,
    clock: Arc<dyn Clock>,
    alerts: AlertTracker,
    state: SupervisorState,
    attempts: u32,
    last_sample: ResourceSample,
}

impl Supervisor {
    pub fn new(
        config: SupervisorConfig,
        metrics: Box<dyn MetricsSource>,
        restarter: Arc<dyn Restarter>,
        journal: Arc<dyn HealthJournal>,
    ) -> Self {
        let alerts = AlertTracker::new(config.alert_repeat_interval);
        Self {
            config,
            metrics,
            probes: Vec::new(),
            restarter,
            journal,
            clock: Arc::new(SystemClock),
            alerts,
            state: SupervisorState::Healthy,
            attempts: 0,
            last_sample: ResourceSample::default(),
        }
    }

    /// Host metrics from procfs for `disk_path`, and a JSON-lines journal
    /// under `journal_dir` (in memory when unset).
    pub fn from_settings(settings: &Settings, restarter: Arc<dyn Restarter>) -> Result<Self, HealthError> {
        let journal: Arc<dyn HealthJournal> = match &settings.journal_dir {
            Some(dir) => Arc::new(JsonlJournal::open(dir)?),
            None => Arc::new(MemoryJournal::new()),
        };
        Ok(Self::new(
            SupervisorConfig::from(settings),
            Box::new(ProcfsMetrics::new(&settings.disk_path)),
            restarter,
            journal,
        ))
    }

    pub fn with_probe(mut self, probe: Arc<dyn LivenessProbe>) -> Self {
        self.probes.push(probe);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn state(&self) -> SupervisorState {
        self.state
    }

    /// Restart attempts since the last success or reset.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Leave `halted` (or any state) and re-arm automatic restarts.
    pub fn reset(&mut self) {
        tracing::info!(from = %self.state, "Supervisor reset");
        self.state = SupervisorState::Healthy;
        self.attempts = 0;
    }

    /// Sample, probe, alert, snapshot, and decide on a restart.
    ///
    /// Never runs the restart itself; see [`run`](Self::run) and
    /// [`tick_and_recover`](Self::tick_and_recover).
    pub async fn tick(&mut self) -> TickReport {
        let now = self.clock.now();

        match tokio::time::timeout(self.config.check_timeout, self.metrics.sample()).await {
            Ok(Ok(sample)) => self.last_sample = sample,
            Ok(Err(e)) => tracing::warn!(error = %e, "Metrics unavailable, reusing last sample"),
            Err(_) => tracing::warn!(
                timeout_ms = self.config.check_timeout.as_millis() as u64,
                "Metrics sample timed out, reusing last sample"
            ),
        }
        let sample = self.last_sample;

        let mut alerts = Vec::new();
        let mut worst = AlertLevel::Normal;
        for (resource, value, thresholds) in [
            (Resource::Cpu, sample.cpu_pct, self.config.cpu),
            (Resource::Memory, sample.mem_pct, self.config.memory),
            (Resource::Disk, sample.disk_pct, self.config.disk),
        ] {
            let level = thresholds.level(value);
            worst = worst.max(level);
            let message = || {
                let bound = if level == AlertLevel::Critical {
                    thresholds.critical
                } else {
                    thresholds.warning
                };
                format!("{resource} at {value:.1}% ({level} threshold {bound}%)")
            };
            if let Some(alert) = self.alerts.observe(resource.as_str(), level, message, now) {
                alerts.push(alert);
            }
        }

        let statuses = check_all(&self.probes, self.config.check_timeout).await;
        let unreachable: Vec<&ProcessStatus> = statuses
            .iter()
            .filter(|s| s.status == LivenessStatus::Unreachable)
            .collect();
        for status in &statuses {
            let level = match status.status {
                LivenessStatus::Healthy => AlertLevel::Normal,
                LivenessStatus::Unreachable => AlertLevel::Critical,
            };
            let message = || format!("{} unreachable", status.component);
            if let Some(alert) = self.alerts.observe(&status.component, level, message, now) {
                alerts.push(alert);
            }
        }
        if !unreachable.is_empty() {
            worst = AlertLevel::Critical;
        }

        let reason = (!unreachable.is_empty()).then(|| {
            let names: Vec<&str> = unreachable.iter().map(|s| s.component.as_str()).collect();
            format!("{} unreachable", names.join(", "))
        });

        let snapshot = HealthSnapshot {
            timestamp: now,
            cpu_pct: sample.cpu_pct,
            mem_pct: sample.mem_pct,
            disk_pct: sample.disk_pct,
            process_statuses: statuses.clone(),
            alert_level: worst,
        };
        self.journal.record_snapshot(&snapshot);
        for alert in &alerts {
            tracing::warn!(component = %alert.component, level = %alert.level, "{}", alert.message);
            self.journal.record_alert(alert);
        }

        let restart = self.advance(worst, reason);
        TickReport {
            snapshot,
            alerts,
            state: self.state,
            restart,
        }
    }

    fn advance(&mut self, worst: AlertLevel, liveness_failure: Option<String>) -> Option<RestartRequest> {
        match self.state {
            SupervisorState::Halted | SupervisorState::Recovering => return None,
            _ => {}
        }

        let Some(reason) = liveness_failure else {
            let next = match worst {
                AlertLevel::Normal => SupervisorState::Healthy,
                AlertLevel::Warning => SupervisorState::Degraded,
                AlertLevel::Critical => SupervisorState::Critical,
            };
            self.transition(next);
            return None;
        };

        self.transition(SupervisorState::Critical);
        self.attempts += 1;
        self.transition(SupervisorState::Recovering);
        tracing::info!(
            attempt = self.attempts,
            max = self.config.max_restart_attempts,
            reason = %reason,
            "Restart scheduled"
        );
        Some(RestartRequest {
            attempt_number: self.attempts,
            reason,
        })
    }

    /// Record the outcome of a restart and move the state machine on.
    pub fn complete_restart(&mut self, request: &RestartRequest, outcome: RestartOutcome) -> RestartAttempt {
        let now = self.clock.now();
        let attempt = RestartAttempt {
            timestamp: now,
            reason: request.reason.clone(),
            attempt_number: request.attempt_number,
            outcome,
        };
        self.journal.record_restart(&attempt);

        match outcome {
            RestartOutcome::Success => {
                tracing::info!(attempt = request.attempt_number, "Restart succeeded");
                self.attempts = 0;
                self.transition(SupervisorState::Healthy);
            }
            RestartOutcome::Failed if self.attempts >= self.config.max_restart_attempts => {
                self.transition(SupervisorState::Halted);
                let alert = AlertRecord {
                    timestamp: now,
                    level: AlertLevel::Critical,
                    component: "supervisor".to_string(),
                    message: format!(
                        "Restart attempts exhausted ({}/{}); automatic recovery halted until reset",
                        self.attempts, self.config.max_restart_attempts
                    ),
                };
                tracing::error!(attempts = self.attempts, "{}", alert.message);
                self.journal.record_alert(&alert);
            }
            RestartOutcome::Failed => {
                self.transition(SupervisorState::Critical);
            }
        }
        attempt
    }

    /// One tick with any restart run inline. For callers without a loop.
    pub async fn tick_and_recover(&mut self) -> (TickReport, Option<RestartAttempt>) {
        let report = self.tick().await;
        let attempt = match &report.restart {
            Some(request) => {
                let outcome = self.restart_task().run(request).await;
                Some(self.complete_restart(request, outcome))
            }
            None => None,
        };
        (report, attempt)
    }

    /// Tick every `check_interval` until `shutdown` flips or its sender drops.
    /// Restarts run as separate tasks so they never delay the next tick.
    ///
    /// A restart still running at shutdown is aborted and recorded as failed,
    /// so the supervisor never stays `recovering` after the loop ends.
    pub async fn run(&mut self, mut shutdown: watch::Receiver<bool>) {
        let period = self.config.check_interval.max(MIN_CHECK_INTERVAL);
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // At most one restart runs at a time: `recovering` blocks new requests.
        let mut restarts: JoinSet<RestartOutcome> = JoinSet::new();
        let mut running: Option<RestartRequest> = None;

        tracing::info!(
            interval_ms = period.as_millis() as u64,
            probes = self.probes.len(),
            "Health supervisor started"
        );
        loop {
            tokio::select! {
                _ = shutdown.changed() => break,
                Some(joined) = restarts.join_next() => {
                    let outcome = joined.unwrap_or_else(|e| {
                        tracing::error!(error = %e, "Restart task terminated abnormally");
                        RestartOutcome::Failed
                    });
                    if let Some(request) = running.take() {
                        self.complete_restart(&request, outcome);
                    }
                }
                _ = interval.tick() => {
                    let span = tracing::info_span!("health_tick", state = %self.state);
                    let report = self.tick().instrument(span).await;
                    if let Some(request) = report.restart {
                        let task = self.restart_task();
                        let job = request.clone();
                        restarts.spawn(async move { task.run(&job).await });
                        running = Some(request);
                    }
                }
            }
        }

        if let Some(request) = running.take() {
            restarts.abort_all();
            let mut outcome = RestartOutcome::Failed;
            while let Some(joined) = restarts.join_next().await {
                // A restart that finished just before the abort keeps its outcome
                if let Ok(finished) = joined {
                    outcome = finished;
                }
            }
            tracing::warn!(
                attempt = request.attempt_number,
                outcome = %outcome,
                "Restart interrupted by shutdown"
            );
            self.complete_restart(&request, outcome);
        }
        tracing::info!(state = %self.state, "Health supervisor stopped");
    }

    fn restart_task(&self) -> RestartTask {
        RestartTask {
            restarter: Arc::clone(&self.restarter),
            probes: self.probes.clone(),
            restart_timeout: self.config.restart_timeout,
            check_timeout: self.config.check_timeout,
        }
    }

    fn transition(&mut self, next: SupervisorState) {
        if next != self.state {
            tracing::info!(from = %self.state, to = %next, "Supervisor state change");
            self.state = next;
        }
    }
}
