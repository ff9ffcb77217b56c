//! Execution metrics: lifetime aggregates plus a rolling window of the last
//! 100 records. Persistence is last-write-wins; the collector never blocks a
//! command on a failed write.

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use vg_core::fsx::{self, FileMode};
use vg_core::{ExecMode, Paths, RiskLevel};

pub const HISTORY_LIMIT: usize = 100;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionRecord {
    pub timestamp: DateTime<Utc>,
    pub command: String,
    pub mode: ExecMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runtime: Option<String>,
    pub duration_ms: u64,
    pub risk_level: RiskLevel,
    pub cached: bool,
    pub exit_code: i32,
    pub reason: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetricsData {
    pub total: u64,
    pub host: u64,
    pub sandbox: u64,
    pub cached: u64,
    #[serde(default)]
    pub by_risk_level: BTreeMap<String, u64>,
    #[serde(default)]
    pub by_runtime: BTreeMap<String, u64>,
    /// Lifetime total; the average is computed against this, not the window.
    #[serde(default)]
    pub total_duration_ms: u64,
    #[serde(default)]
    pub execution_history: Vec<ExecutionRecord>,
}

impl MetricsData {
    pub fn average_duration_ms(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.total_duration_ms as f64 / self.total as f64
    }
}

pub struct MetricsCollector {
    file: PathBuf,
    enabled: bool,
}

impl MetricsCollector {
    pub fn new(paths: &Paths, enabled: bool) -> Self {
        MetricsCollector {
            file: paths.metrics_file(),
            enabled,
        }
    }

    /// Record one execution. No-op when disabled.
    pub fn record(&self, record: ExecutionRecord) -> Result<()> {
        if !self.enabled {
            return Ok(());
        }
        let mut data: MetricsData = fsx::read_json(&self.file)?.unwrap_or_default();
        data.total += 1;
        match record.mode {
            ExecMode::Host => data.host += 1,
            ExecMode::Sandbox => data.sandbox += 1,
        }
        if record.cached {
            data.cached += 1;
        }
        *data
            .by_risk_level
            .entry(record.risk_level.to_string())
            .or_insert(0) += 1;
        if let Some(runtime) = &record.runtime {
            *data.by_runtime.entry(runtime.clone()).or_insert(0) += 1;
        }
        data.total_duration_ms += record.duration_ms;
        data.execution_history.push(record);
        let overflow = data.execution_history.len().saturating_sub(HISTORY_LIMIT);
        if overflow > 0 {
            data.execution_history.drain(..overflow);
        }
        fsx::write_json_atomic(&self.file, &data, FileMode::Public)
    }

    /// Current aggregates; a zero value when disabled or unreadable.
    pub fn get(&self) -> MetricsData {
        if !self.enabled {
            return MetricsData::default();
        }
        fsx::read_json(&self.file)
            .unwrap_or_default()
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn record(mode: ExecMode, duration_ms: u64) -> ExecutionRecord {
        ExecutionRecord {
            timestamp: Utc::now(),
            command: "echo ok".to_string(),
            mode,
            runtime: matches!(mode, ExecMode::Sandbox).then(|| "bubblewrap".to_string()),
            duration_ms,
            risk_level: RiskLevel::Low,
            cached: false,
            exit_code: 0,
            reason: "allowed".to_string(),
        }
    }

    #[test]
    fn test_record_updates_aggregates() {
        let td = tempdir().unwrap();
        let collector = MetricsCollector::new(&Paths::under(td.path()), true);
        collector.record(record(ExecMode::Host, 10)).unwrap();
        collector.record(record(ExecMode::Sandbox, 30)).unwrap();

        let data = collector.get();
        assert_eq!(data.total, 2);
        assert_eq!(data.host, 1);
        assert_eq!(data.sandbox, 1);
        assert_eq!(data.by_risk_level["low"], 2);
        assert_eq!(data.by_runtime["bubblewrap"], 1);
        assert_eq!(data.total_duration_ms, 40);
        assert!((data.average_duration_ms() - 20.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_history_window_is_bounded() {
        let td = tempdir().unwrap();
        let collector = MetricsCollector::new(&Paths::under(td.path()), true);
        for _ in 0..(HISTORY_LIMIT + 20) {
            collector.record(record(ExecMode::Host, 1)).unwrap();
        }
        let data = collector.get();
        assert_eq!(data.execution_history.len(), HISTORY_LIMIT);
        // Lifetime totals keep counting past the window.
        assert_eq!(data.total, (HISTORY_LIMIT + 20) as u64);
        assert_eq!(data.total_duration_ms, (HISTORY_LIMIT + 20) as u64);
    }

    #[test]
    fn test_disabled_collector_is_a_noop() {
        let td = tempdir().unwrap();
        let collector = MetricsCollector::new(&Paths::under(td.path()), false);
        collector.record(record(ExecMode::Host, 10)).unwrap();
        let data = collector.get();
        assert_eq!(data.total, 0);
        assert_eq!(data.average_duration_ms(), 0.0);
        assert!(!Paths::under(td.path()).metrics_file().exists());
    }

    #[test]
    fn test_average_against_lifetime_totals() {
        let td = tempdir().unwrap();
        let collector = MetricsCollector::new(&Paths::under(td.path()), true);
        for i in 0..10 {
            collector.record(record(ExecMode::Host, i * 10)).unwrap();
        }
        let data = collector.get();
        assert!((data.average_duration_ms() - 45.0).abs() < f64::EPSILON);
    }
}
