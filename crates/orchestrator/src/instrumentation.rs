//! Per-phase telemetry: progress, latency percentiles, warnings, errors,
//! resource snapshots and latency anomalies.

use crate::phase::PhaseId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Anomaly detection needs this many samples first.
const ANOMALY_MIN_SAMPLES: usize = 5;
const ANOMALY_SIGMAS: f64 = 3.0;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InstrumentEntry {
    pub category: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, Value>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ResourceSnapshot {
    pub captured_at: DateTime<Utc>,
    pub items_processed: usize,
    /// Resident set size; `None` where the platform does not expose it.
    pub rss_kb: Option<u64>,
}

impl ResourceSnapshot {
    pub fn capture(items_processed: usize) -> Self {
        Self {
            captured_at: Utc::now(),
            items_processed,
            rss_kb: resident_set_kb(),
        }
    }
}

fn resident_set_kb() -> Option<u64> {
    let status = std::fs::read_to_string("/proc/self/status").ok()?;
    status
        .lines()
        .find_map(|line| line.strip_prefix("VmRSS:"))
        .and_then(|rest| rest.split_whitespace().next())
        .and_then(|kb| kb.parse().ok())
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LatencyAnomaly {
    pub latency_ms: f64,
    pub mean_ms: f64,
    pub std_ms: f64,
    pub timestamp: DateTime<Utc>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct LatencySummary {
    pub count: usize,
    pub mean_ms: f64,
    pub p50_ms: f64,
    pub p95_ms: f64,
    pub p99_ms: f64,
    pub max_ms: f64,
}

impl LatencySummary {
    pub fn from_samples(samples: &[f64]) -> Self {
        if samples.is_empty() {
            return Self::default();
        }
        let mut sorted = samples.to_vec();
        sorted.sort_by(f64::total_cmp);
        let count = sorted.len();
        Self {
            count,
            mean_ms: sorted.iter().sum::<f64>() / count as f64,
            p50_ms: percentile(&sorted, 50.0),
            p95_ms: percentile(&sorted, 95.0),
            p99_ms: percentile(&sorted, 99.0),
            max_ms: sorted[count - 1],
        }
    }
}

/// Nearest-rank percentile over sorted samples.
fn percentile(sorted: &[f64], p: f64) -> f64 {
    let rank = ((p / 100.0) * sorted.len() as f64).ceil() as usize;
    sorted[rank.clamp(1, sorted.len()) - 1]
}

/// Finished telemetry attached to a phase result.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InstrumentationReport {
    pub items_total: usize,
    pub items_processed: usize,
    pub progress: Option<f64>,
    pub throughput_per_sec: Option<f64>,
    pub latency: LatencySummary,
    pub warnings: Vec<InstrumentEntry>,
    pub errors: Vec<InstrumentEntry>,
    pub anomalies: Vec<LatencyAnomaly>,
    pub resource_snapshots: Vec<ResourceSnapshot>,
}

/// Collector for one phase execution.
#[derive(Debug)]
pub struct PhaseInstrumentation {
    phase: PhaseId,
    items_total: usize,
    items_processed: usize,
    snapshot_interval: usize,
    started_at: Option<DateTime<Utc>>,
    finished_at: Option<DateTime<Utc>>,
    latencies: Vec<f64>,
    warnings: Vec<InstrumentEntry>,
    errors: Vec<InstrumentEntry>,
    anomalies: Vec<LatencyAnomaly>,
    snapshots: Vec<ResourceSnapshot>,
}

impl PhaseInstrumentation {
    pub fn new(phase: PhaseId, snapshot_interval: usize) -> Self {
        Self {
            phase,
            items_total: 0,
            items_processed: 0,
            snapshot_interval: snapshot_interval.max(1),
            started_at: None,
            finished_at: None,
            latencies: Vec::new(),
            warnings: Vec::new(),
            errors: Vec::new(),
            anomalies: Vec::new(),
            snapshots: Vec::new(),
        }
    }

    pub fn start(&mut self, items_total: usize) {
        self.items_total = items_total;
        self.started_at = Some(Utc::now());
    }

    /// Count one processed item and its latency.
    pub fn record_item(&mut self, latency_ms: f64) {
        self.items_processed += 1;
        self.detect_anomaly(latency_ms);
        self.latencies.push(latency_ms);
        if self.items_total > 0 && self.items_processed % self.snapshot_interval == 0 {
            self.snapshots.push(ResourceSnapshot::capture(self.items_processed));
        }
    }

    pub fn record_warning(&mut self, category: &str, message: impl Into<String>) {
        self.record_warning_with(category, message, BTreeMap::new());
    }

    pub fn record_warning_with(
        &mut self,
        category: &str,
        message: impl Into<String>,
        extra: BTreeMap<String, Value>,
    ) {
        let entry = entry(category, message.into(), extra);
        tracing::warn!(phase = %self.phase, category, message = %entry.message, "Phase warning");
        self.warnings.push(entry);
    }

    pub fn record_error(&mut self, category: &str, message: impl Into<String>) {
        self.record_error_with(category, message, BTreeMap::new());
    }

    pub fn record_error_with(
        &mut self,
        category: &str,
        message: impl Into<String>,
        extra: BTreeMap<String, Value>,
    ) {
        let entry = entry(category, message.into(), extra);
        tracing::error!(phase = %self.phase, category, message = %entry.message, "Phase error");
        self.errors.push(entry);
    }

    pub fn capture_snapshot(&mut self) {
        self.snapshots.push(ResourceSnapshot::capture(self.items_processed));
    }

    fn detect_anomaly(&mut self, latency_ms: f64) {
        if self.latencies.len() < ANOMALY_MIN_SAMPLES {
            return;
        }
        let n = self.latencies.len() as f64;
        let mean = self.latencies.iter().sum::<f64>() / n;
        let var = self.latencies.iter().map(|l| (l - mean).powi(2)).sum::<f64>() / n;
        let std = var.sqrt();
        if std > 0.0 && latency_ms > mean + ANOMALY_SIGMAS * std {
            tracing::debug!(phase = %self.phase, latency_ms, mean, std, "Latency spike");
            self.anomalies.push(LatencyAnomaly {
                latency_ms,
                mean_ms: mean,
                std_ms: std,
                timestamp: Utc::now(),
            });
        }
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    pub fn error_count(&self) -> usize {
        self.errors.len()
    }

    /// Close the collector. Always captures a final resource snapshot.
    pub fn finish(mut self) -> (DateTime<Utc>, DateTime<Utc>, InstrumentationReport) {
        self.capture_snapshot();
        let finished = Utc::now();
        self.finished_at = Some(finished);
        let started = self.started_at.unwrap_or(finished);
        let elapsed_secs = (finished - started).num_milliseconds() as f64 / 1000.0;
        let progress = (self.items_total > 0)
            .then(|| (self.items_processed as f64 / self.items_total as f64).min(1.0));
        let throughput_per_sec =
            (elapsed_secs > 0.0).then(|| self.items_processed as f64 / elapsed_secs);
        let report = InstrumentationReport {
            items_total: self.items_total,
            items_processed: self.items_processed,
            progress,
            throughput_per_sec,
            latency: LatencySummary::from_samples(&self.latencies),
            warnings: self.warnings,
            errors: self.errors,
            anomalies: self.anomalies,
            resource_snapshots: self.snapshots,
        };
        (started, finished, report)
    }
}

fn entry(category: &str, message: String, extra: BTreeMap<String, Value>) -> InstrumentEntry {
    InstrumentEntry {
        category: category.to_string(),
        message,
        extra,
        timestamp: Utc::now(),
    }
}
