//! Load generator for ledger node HTTP APIs.
//!
//! This crate provides tools to:
//! - Run a fleet of concurrent workers, each repeating one test case
//! - Build operation payloads (contract invoke, token mint, private message, transfer)
//! - Submit them with idempotency keys and treat duplicate submissions as success
//! - Correlate submissions with their asynchronous confirmations
//! - Collect latency and outcome metrics and report them (console, JSON, CSV)

pub mod cases;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod idempotency;
pub mod metrics;
pub mod payload;
pub mod registry;
pub mod report;
pub mod runner;
pub mod tracking;
pub mod worker;

pub use cases::TestCase;
pub use config::{RunConfig, TestInstance};
pub use dispatcher::{Dispatcher, Outcome, OutcomeKind, RequestOutcome};
pub use error::{PerfError, PerfResult};
pub use idempotency::IdempotencyKeys;
pub use metrics::{MetricsCollector, TestResults};
pub use registry::TestCaseRegistry;
pub use report::ResultsReport;
pub use runner::{PerfRunner, RunReport};
pub use tracking::{ConfirmationTracker, TrackingIdType};
pub use worker::{Worker, WorkerContext, WorkerSummary};
