//! Host metrics from procfs and `df`.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;

use super::traits::{MetricsSource, ResourceSample};
use super::HealthError;

/// Cumulative jiffies from the aggregate `cpu` line of `/proc/stat`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CpuTimes {
    pub idle: u64,
    pub total: u64,
}

/// Parse the first `cpu` line: `cpu user nice system idle iowait irq softirq steal ...`.
/// Idle time includes iowait.
pub fn parse_cpu_times(stat: &str) -> Option<CpuTimes> {
    let line = stat.lines().find(|l| l.starts_with("cpu "))?;
    let fields: Vec<u64> = line
        .split_whitespace()
        .skip(1)
        .take(8)
        .map(|f| f.parse().ok())
        .collect::<Option<_>>()?;
    if fields.len() < 4 {
        return None;
    }
    let idle = fields[3] + fields.get(4).copied().unwrap_or(0);
    Some(CpuTimes {
        idle,
        total: fields.iter().sum(),
    })
}

/// Busy share between two readings. `None` when no time passed.
pub fn cpu_usage_pct(previous: CpuTimes, current: CpuTimes) -> Option<f64> {
    let total = current.total.checked_sub(previous.total)?;
    let idle = current.idle.checked_sub(previous.idle)?;
    if total == 0 {
        return None;
    }
    Some((total.saturating_sub(idle)) as f64 / total as f64 * 100.0)
}

/// `(MemTotal - MemAvailable) / MemTotal` from `/proc/meminfo`.
pub fn parse_meminfo_pct(meminfo: &str) -> Option<f64> {
    let field = |name: &str| -> Option<u64> {
        meminfo
            .lines()
            .find(|l| l.starts_with(name))?
            .split_whitespace()
            .nth(1)?
            .parse()
            .ok()
    };
    let total = field("MemTotal:")?;
    let available = field("MemAvailable:")?;
    if total == 0 {
        return None;
    }
    Some(total.saturating_sub(available) as f64 / total as f64 * 100.0)
}

/// Capacity column of `df -P` output (second line, fifth field, `NN%`).
pub fn parse_df_pct(output: &str) -> Option<f64> {
    output
        .lines()
        .nth(1)?
        .split_whitespace()
        .nth(4)?
        .trim_end_matches('%')
        .parse()
        .ok()
}

/// Linux host metrics. CPU is measured between consecutive samples; the first
/// sample covers the time since boot.
pub struct ProcfsMetrics {
    disk_path: PathBuf,
    last_cpu: Option<CpuTimes>,
}

impl ProcfsMetrics {
    pub fn new(disk_path: &Path) -> Self {
        Self {
            disk_path: disk_path.to_path_buf(),
            last_cpu: None,
        }
    }

    async fn read(path: &str) -> Result<String, HealthError> {
        tokio::fs::read_to_string(path)
            .await
            .map_err(|e| HealthError::MetricsUnavailable(format!("{path}: {e}")))
    }

    /// `df` is killed if the caller gives up on the sample (hung mounts).
    async fn disk_pct(&self) -> Result<f64, HealthError> {
        let output = Command::new("df")
            .arg("-P")
            .arg(&self.disk_path)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| HealthError::MetricsUnavailable(format!("df: {e}")))?;
        if !output.status.success() {
            return Err(HealthError::MetricsUnavailable(format!(
                "df exited with {}",
                output.status
            )));
        }
        parse_df_pct(&String::from_utf8_lossy(&output.stdout))
            .ok_or_else(|| HealthError::MetricsUnavailable("unparseable df output".into()))
    }
}

#[async_trait]
impl MetricsSource for ProcfsMetrics {
    async fn sample(&mut self) -> Result<ResourceSample, HealthError> {
        let current = parse_cpu_times(&Self::read("/proc/stat").await?)
            .ok_or_else(|| HealthError::MetricsUnavailable("unparseable /proc/stat".into()))?;
        let baseline = self.last_cpu.unwrap_or(CpuTimes { idle: 0, total: 0 });
        self.last_cpu = Some(current);
        let cpu_pct = cpu_usage_pct(baseline, current).unwrap_or(0.0);

        let mem_pct = parse_meminfo_pct(&Self::read("/proc/meminfo").await?)
            .ok_or_else(|| HealthError::MetricsUnavailable("unparseable /proc/meminfo".into()))?;

        Ok(ResourceSample {
            cpu_pct,
            mem_pct,
            disk_pct: self.disk_pct().await?,
        })
    }
}
