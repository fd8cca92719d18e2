//! Run orchestration: one spawned task per configured worker.

use async_trait::async_trait;
use indicatif::{ProgressBar, ProgressStyle};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::cases::WorkerHandle;
use crate::config::{RunConfig, TestInstance};
use crate::dispatcher::Dispatcher;
use crate::error::{PerfError, PerfResult};
use crate::idempotency::IdempotencyKeys;
use crate::metrics::{IterationRecord, MetricsCollector, RunSummary, TestResults};
use crate::registry::{Blueprint, TestCaseRegistry};
use crate::tracking::ConfirmationTracker;
use crate::worker::{
    FailurePolicy, OutcomeSink, Worker, WorkerBudget, WorkerContext, WorkerSummary,
};

/// Shared destination for iteration outcomes: metrics, optional JSONL log,
/// progress display.
struct SharedSink {
    metrics: Mutex<MetricsCollector>,
    outcome_log: Option<Mutex<BufWriter<File>>>,
    log_failed: AtomicBool,
    progress: ProgressBar,
}

impl SharedSink {
    async fn log_outcome(&self, record: &IterationRecord) {
        let Some(ref log) = self.outcome_log else {
            return;
        };
        let written = match serde_json::to_string(record) {
            Ok(json) => writeln!(log.lock().await, "{}", json).map_err(PerfError::from),
            Err(e) => Err(e.into()),
        };
        if let Err(e) = written {
            // warn once per run
            if !self.log_failed.swap(true, Ordering::Relaxed) {
                warn!(error = %e, "Failed to write outcome log");
            }
        }
    }
}

#[async_trait]
impl OutcomeSink for SharedSink {
    async fn record(&self, record: IterationRecord) {
        self.log_outcome(&record).await;
        let mut m = self.metrics.lock().await;
        m.record(record);
        let counts = m.counts();
        self.progress.set_position(counts.total);
        self.progress
            .set_message(format!("{} ok / {} failed", counts.successful(), counts.failed));
    }
}

/// Everything a finished run produced.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub results: TestResults,
    pub workers: Vec<WorkerSummary>,
}

/// Executes a run with one concurrent worker per configured worker slot.
pub struct PerfRunner {
    config: Arc<RunConfig>,
    prepared: Vec<(TestInstance, Blueprint)>,
    dispatcher: Arc<Dispatcher>,
    keys: Arc<IdempotencyKeys>,
    tag_prefix: String,
    show_progress: bool,
    results_dir: PathBuf,
}

impl PerfRunner {
    /// Validate the configuration and prepare every test case.
    ///
    /// Fails before any worker exists if the configuration is invalid or a
    /// test name is unknown.
    pub fn new(config: RunConfig) -> PerfResult<Self> {
        config.validate()?;

        let tag_prefix = config
            .tag_prefix
            .clone()
            .unwrap_or_else(|| format!("perf_{}", uuid::Uuid::new_v4()));
        let prepared = TestCaseRegistry::new().prepare_all(&config, &tag_prefix)?;

        let keys = match &config.run_id {
            Some(run_id) => IdempotencyKeys::new(run_id.clone()),
            None => IdempotencyKeys::from_start_time(),
        };
        let tracker = Arc::new(ConfirmationTracker::new());
        let dispatcher = Dispatcher::new(
            config.request_timeout(),
            config.total_workers() as usize,
            tracker,
        )?;

        Ok(Self {
            config: Arc::new(config),
            prepared,
            dispatcher: Arc::new(dispatcher),
            keys: Arc::new(keys),
            tag_prefix,
            show_progress: true,
            results_dir: PathBuf::from("results"),
        })
    }

    /// Hide the progress bar (tests, non-interactive runs).
    pub fn without_progress(mut self) -> Self {
        self.show_progress = false;
        self
    }

    /// Directory for the JSONL outcome log.
    pub fn with_results_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.results_dir = dir.into();
        self
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    pub fn tag_prefix(&self) -> &str {
        &self.tag_prefix
    }

    pub fn run_id(&self) -> &str {
        self.keys.run_id()
    }

    pub fn tracker(&self) -> &Arc<ConfirmationTracker> {
        self.dispatcher.tracker()
    }

    /// Run every worker to completion or cancellation.
    pub async fn run(&self, cancel: CancellationToken) -> PerfResult<RunReport> {
        let config = &self.config;
        let total_workers = config.total_workers();
        let loops = config.loop_budget();

        info!(
            name = %config.name,
            run_id = self.run_id(),
            workers = total_workers,
            actions_per_loop = config.actions_per_loop,
            loops = ?loops,
            length_secs = ?config.length_secs,
            dry_run = config.dry_run,
            "Starting run"
        );

        let progress = self.progress_bar(planned_actions(
            loops,
            config.actions_per_loop,
            total_workers,
        ));
        let outcome_log = if config.log_outcomes {
            Some(Mutex::new(self.open_outcome_log()?))
        } else {
            None
        };
        let sink = Arc::new(SharedSink {
            metrics: Mutex::new(MetricsCollector::new()),
            outcome_log,
            log_failed: AtomicBool::new(false),
            progress: progress.clone(),
        });

        let start_time = Instant::now();
        let budget = WorkerBudget {
            loops,
            deadline: config.length().map(|l| start_time + l),
        };
        let policy = if config.stop_on_failure {
            FailurePolicy::StopWorker
        } else {
            FailurePolicy::Continue
        };

        let mut handles = Vec::with_capacity(total_workers as usize);
        let mut worker_id = 0u32;
        for (instance, blueprint) in &self.prepared {
            for _ in 0..instance.workers {
                let handle = WorkerHandle::new(
                    worker_id,
                    config,
                    self.dispatcher.clone(),
                    self.keys.clone(),
                );
                let worker = Worker::new(
                    WorkerContext::new(worker_id, config.actions_per_loop),
                    blueprint.instantiate(handle),
                    sink.clone(),
                    policy,
                    budget,
                );
                handles.push((worker_id, tokio::spawn(worker.run(cancel.clone()))));
                worker_id += 1;
            }
        }

        let mut summaries = Vec::with_capacity(handles.len());
        for (id, handle) in handles {
            match handle.await {
                Ok(summary) => summaries.push(summary),
                // a panicking worker must not take its siblings down
                Err(e) => error!(worker_id = id, error = %e, "Worker task failed"),
            }
        }

        progress.finish_with_message("Complete!");

        if let Some(ref log) = sink.outcome_log {
            if let Err(e) = log.lock().await.flush() {
                warn!(error = %e, "Failed to flush outcome log");
            }
        }

        let tracker = self.tracker();
        let metrics = sink.metrics.lock().await;
        let results = metrics.results(RunSummary {
            name: config.name.clone(),
            run_id: self.run_id().to_string(),
            elapsed_secs: start_time.elapsed().as_secs_f64(),
            workers: total_workers,
            tracked: tracker.registered(),
            confirmations_pending: tracker.pending(),
            cancelled: cancel.is_cancelled(),
            dry_run: config.dry_run,
        });

        info!(
            actions = results.total_actions,
            failed = results.failed,
            conflicts = results.conflicts,
            "Run finished"
        );

        Ok(RunReport {
            results,
            workers: summaries,
        })
    }

    fn progress_bar(&self, total: Option<u64>) -> ProgressBar {
        if !self.show_progress {
            return ProgressBar::hidden();
        }
        match total {
            Some(total) => {
                let pb = ProgressBar::new(total);
                if let Ok(style) = ProgressStyle::default_bar()
                    .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}")
                {
                    pb.set_style(style.progress_chars("##-"));
                }
                pb
            }
            None => ProgressBar::new_spinner(),
        }
    }

    fn open_outcome_log(&self) -> PerfResult<BufWriter<File>> {
        std::fs::create_dir_all(&self.results_dir)?;
        let path = outcome_log_path(&self.results_dir, &self.config.name);
        info!(path = %path.display(), "Logging outcomes");
        Ok(BufWriter::new(File::create(path)?))
    }
}

/// Actions a loop-bounded run will attempt across all workers.
fn planned_actions(loops: Option<u64>, actions_per_loop: u64, workers: u32) -> Option<u64> {
    loops.map(|l| {
        l.saturating_mul(actions_per_loop)
            .saturating_mul(u64::from(workers))
    })
}

/// `<dir>/<run name>_<timestamp>.jsonl`
fn outcome_log_path(dir: &Path, run_name: &str) -> PathBuf {
    let run_name = run_name.replace(' ', "_").to_lowercase();
    dir.join(format!(
        "{}_{}.jsonl",
        run_name,
        chrono::Utc::now().format("%Y%m%d_%H%M%S")
    ))
}
