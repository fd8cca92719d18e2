//! The per-worker action loop.
//!
//! Iterations within a worker are strictly sequential: each `run_once` call
//! completes and its outcome is recorded before the next one starts.
//! Cancellation is only observed between iterations.

use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::cases::TestCase;
use crate::dispatcher::Outcome;
use crate::metrics::IterationRecord;

/// Identity and iteration state of one worker. Never shared.
#[derive(Debug, Clone)]
pub struct WorkerContext {
    pub worker_id: u32,
    pub actions_per_loop: u64,
    iteration_count: u64,
}

impl WorkerContext {
    pub fn new(worker_id: u32, actions_per_loop: u64) -> Self {
        Self {
            worker_id,
            actions_per_loop,
            iteration_count: 0,
        }
    }

    /// Claim the next iteration number.
    fn next_iteration(&mut self) -> u64 {
        let iteration = self.iteration_count;
        self.iteration_count += 1;
        iteration
    }

    pub fn iterations_started(&self) -> u64 {
        self.iteration_count
    }
}

/// What a worker does when an iteration fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    #[default]
    Continue,
    StopWorker,
}

/// How long a worker keeps going.
#[derive(Debug, Clone, Copy, Default)]
pub struct WorkerBudget {
    /// Loops of `actions_per_loop` iterations; `None` runs until the deadline.
    pub loops: Option<u64>,
    pub deadline: Option<Instant>,
}

/// Receives iteration outcomes from every worker.
#[async_trait]
pub trait OutcomeSink: Send + Sync {
    async fn record(&self, record: IterationRecord);
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum StopReason {
    BudgetExhausted,
    Cancelled,
    Aborted { error: String },
}

/// What a worker reports when it unwinds.
#[derive(Debug, Clone, Serialize)]
pub struct WorkerSummary {
    pub worker_id: u32,
    pub test: String,
    pub iterations_completed: u64,
    pub failures: u64,
    pub loops_completed: u64,
    pub stop_reason: StopReason,
}

/// One concurrent actor repeatedly running its test case.
pub struct Worker {
    ctx: WorkerContext,
    test_case: Box<dyn TestCase>,
    sink: Arc<dyn OutcomeSink>,
    policy: FailurePolicy,
    budget: WorkerBudget,
}

impl Worker {
    pub fn new(
        ctx: WorkerContext,
        test_case: Box<dyn TestCase>,
        sink: Arc<dyn OutcomeSink>,
        policy: FailurePolicy,
        budget: WorkerBudget,
    ) -> Self {
        Self {
            ctx,
            test_case,
            sink,
            policy,
            budget,
        }
    }

    /// Run until the budget is spent, cancellation is observed, or the
    /// failure policy stops the worker.
    pub async fn run(mut self, cancel: CancellationToken) -> WorkerSummary {
        let worker_id = self.ctx.worker_id;
        let test = self.test_case.name();
        let mut completed = 0u64;
        let mut failures = 0u64;
        let mut loops_completed = 0u64;

        debug!(worker_id, test, "Worker starting");

        let stop_reason = 'run: loop {
            if self.budget.loops.is_some_and(|max| loops_completed >= max) {
                break 'run StopReason::BudgetExhausted;
            }

            for _ in 0..self.ctx.actions_per_loop {
                if cancel.is_cancelled() {
                    break 'run StopReason::Cancelled;
                }
                if self.budget.deadline.is_some_and(|d| Instant::now() >= d) {
                    break 'run StopReason::BudgetExhausted;
                }

                let iteration = self.ctx.next_iteration();
                let start = Instant::now();
                let result = self.test_case.run_once(iteration).await;
                let latency_us = start.elapsed().as_micros() as u64;

                let kind = result.outcome.kind();
                let error = match &result.outcome {
                    Outcome::Failed(e) => {
                        failures += 1;
                        warn!(worker_id, iteration, test, error = %e, "Iteration failed");
                        Some(e.to_string())
                    }
                    _ => None,
                };

                self.sink
                    .record(IterationRecord {
                        worker_id,
                        iteration,
                        test: test.to_string(),
                        correlation_id: result.correlation_id,
                        outcome: kind,
                        http_status: result.http_status,
                        latency_us,
                        error: error.clone(),
                    })
                    .await;
                completed += 1;

                if let (Some(error), FailurePolicy::StopWorker) = (error, self.policy) {
                    break 'run StopReason::Aborted { error };
                }
            }

            loops_completed += 1;
        };

        info!(
            worker_id,
            test,
            iterations = completed,
            failures,
            reason = ?stop_reason,
            "Worker finished"
        );

        WorkerSummary {
            worker_id,
            test: test.to_string(),
            iterations_completed: completed,
            failures,
            loops_completed,
            stop_reason,
        }
    }
}
