//! Metrics collection and statistics.

use hdrhistogram::Histogram;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::dispatcher::OutcomeKind;

/// Outcome of one worker iteration, as handed to the collector.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IterationRecord {
    pub worker_id: u32,
    pub iteration: u64,
    pub test: String,
    pub correlation_id: String,
    pub outcome: OutcomeKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http_status: Option<u16>,
    pub latency_us: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OutcomeCounts {
    pub total: u64,
    pub confirmed: u64,
    pub conflicts: u64,
    pub failed: u64,
}

impl OutcomeCounts {
    fn add(&mut self, outcome: OutcomeKind) {
        self.total += 1;
        match outcome {
            OutcomeKind::Confirmed => self.confirmed += 1,
            OutcomeKind::ConflictAcknowledged => self.conflicts += 1,
            OutcomeKind::Failed => self.failed += 1,
        }
    }

    pub fn successful(&self) -> u64 {
        self.confirmed + self.conflicts
    }
}

/// Collects metrics during a run.
///
/// Records are moved in, so each outcome is counted exactly once.
pub struct MetricsCollector {
    histogram: Histogram<u64>,
    counts: OutcomeCounts,
    per_test: BTreeMap<String, OutcomeCounts>,
}

impl MetricsCollector {
    /// Create a new metrics collector.
    pub fn new() -> Self {
        Self {
            histogram: Histogram::new(3).expect("Failed to create histogram"),
            counts: OutcomeCounts::default(),
            per_test: BTreeMap::new(),
        }
    }

    /// Record one iteration outcome.
    pub fn record(&mut self, record: IterationRecord) {
        self.counts.add(record.outcome);
        self.per_test
            .entry(record.test)
            .or_default()
            .add(record.outcome);

        if record.outcome != OutcomeKind::Failed {
            self.histogram.record(record.latency_us).ok();
        }
    }

    pub fn counts(&self) -> &OutcomeCounts {
        &self.counts
    }

    /// Generate final run results.
    pub fn results(&self, run: RunSummary) -> TestResults {
        let duration_secs = run.elapsed_secs;
        let aps = if duration_secs > 0.0 {
            self.counts.total as f64 / duration_secs
        } else {
            0.0
        };
        let empty = self.histogram.is_empty();
        let ms = |v: u64| if empty { 0.0 } else { v as f64 / 1000.0 };

        TestResults {
            timestamp: chrono::Utc::now().to_rfc3339(),
            run_name: run.name,
            run_id: run.run_id,
            duration_secs,
            workers: run.workers,
            total_actions: self.counts.total,
            confirmed: self.counts.confirmed,
            conflicts: self.counts.conflicts,
            failed: self.counts.failed,
            actions_per_second: aps,
            latency_p50: ms(self.histogram.value_at_percentile(50.0)),
            latency_p90: ms(self.histogram.value_at_percentile(90.0)),
            latency_p95: ms(self.histogram.value_at_percentile(95.0)),
            latency_p99: ms(self.histogram.value_at_percentile(99.0)),
            latency_min: ms(self.histogram.min()),
            latency_max: ms(self.histogram.max()),
            latency_avg: if empty { 0.0 } else { self.histogram.mean() / 1000.0 },
            per_test: self.per_test.clone(),
            tracked: run.tracked,
            confirmations_pending: run.confirmations_pending,
            cancelled: run.cancelled,
            dry_run: run.dry_run,
        }
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

/// Run-level facts the collector does not see itself.
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub name: String,
    pub run_id: String,
    pub elapsed_secs: f64,
    pub workers: u32,
    pub tracked: usize,
    pub confirmations_pending: usize,
    pub cancelled: bool,
    pub dry_run: bool,
}

/// Final run results.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestResults {
    pub timestamp: String,
    pub run_name: String,
    pub run_id: String,
    pub duration_secs: f64,
    pub workers: u32,
    pub total_actions: u64,
    pub confirmed: u64,
    pub conflicts: u64,
    pub failed: u64,
    pub actions_per_second: f64,

    // Latency percentiles (ms), successful actions only
    pub latency_p50: f64,
    pub latency_p90: f64,
    pub latency_p95: f64,
    pub latency_p99: f64,
    pub latency_min: f64,
    pub latency_max: f64,
    pub latency_avg: f64,

    pub per_test: BTreeMap<String, OutcomeCounts>,

    // Confirmation tracking
    pub tracked: usize,
    pub confirmations_pending: usize,

    pub cancelled: bool,
    pub dry_run: bool,
}

impl TestResults {
    /// Share of actions that succeeded (confirmed or conflict), in percent.
    pub fn success_rate(&self) -> f64 {
        if self.total_actions == 0 {
            return 0.0;
        }
        (self.confirmed + self.conflicts) as f64 / self.total_actions as f64 * 100.0
    }
}
