use async_trait::async_trait;
use rand::Rng;

use super::{TestCase, WorkerHandle, TRANSACTION_SIMULATOR};
use crate::config::{RunConfig, TransactionSimulatorOptions};
use crate::dispatcher::RequestOutcome;
use crate::error::{PerfError, PerfResult};
use crate::payload::{Transfer, TransferBuilder, ROUTE_TRANSFER};
use crate::tracking::TrackingIdType;

/// Validated simulator settings shared by every simulator worker.
#[derive(Debug, Clone)]
pub struct SimulatorSettings {
    pub party_name_prefix: String,
    pub parties_count: u32,
    pub min_amount: u64,
    pub max_amount: u64,
    pub dry_run: bool,
    pub builder: TransferBuilder,
}

impl SimulatorSettings {
    pub fn from_config(config: &RunConfig) -> PerfResult<Self> {
        let opts: &TransactionSimulatorOptions =
            config.transaction_simulator.as_ref().ok_or_else(|| {
                PerfError::config("transaction_simulator options are required")
            })?;
        if opts.parties_count < 2 {
            return Err(PerfError::config(
                "transaction_simulator.parties_count must be >= 2",
            ));
        }
        let (min_amount, max_amount) = opts.amount_range();
        if min_amount > max_amount {
            return Err(PerfError::config(format!(
                "transaction_simulator.min_amount ({}) exceeds max_amount ({})",
                min_amount, max_amount
            )));
        }
        Ok(Self {
            party_name_prefix: opts.party_name_prefix.clone(),
            parties_count: opts.parties_count,
            min_amount,
            max_amount,
            dry_run: opts.dry_run,
            builder: TransferBuilder::new(config.invoke_options.clone()),
        })
    }
}

/// Sender and receiver for a worker: consecutive parties, wrapping around.
pub fn parties(prefix: &str, count: u32, worker_id: u32) -> (String, String) {
    let from = worker_id % count;
    let to = (worker_id + 1) % count;
    (format!("{}{}", prefix, from), format!("{}{}", prefix, to))
}

/// Moves a random amount between two parties each iteration.
pub struct TransactionSimulator {
    worker: WorkerHandle,
    from: String,
    to: String,
    settings: SimulatorSettings,
}

impl TransactionSimulator {
    pub fn new(worker: WorkerHandle, settings: SimulatorSettings) -> Self {
        let (from, to) = parties(
            &settings.party_name_prefix,
            settings.parties_count,
            worker.worker_id,
        );
        Self {
            worker,
            from,
            to,
            settings,
        }
    }

    fn sample_amount(&self) -> u64 {
        rand::thread_rng().gen_range(self.settings.min_amount..=self.settings.max_amount)
    }
}

#[async_trait]
impl TestCase for TransactionSimulator {
    fn name(&self) -> &'static str {
        TRANSACTION_SIMULATOR
    }

    fn id_type(&self) -> TrackingIdType {
        TrackingIdType::WorkerNumber
    }

    async fn run_once(&self, iteration: u64) -> RequestOutcome {
        let key = self.worker.idempotency_key(iteration);
        let body = self.settings.builder.build(&Transfer {
            from: &self.from,
            to: &self.to,
            value: self.sample_amount(),
            idempotency_key: &key,
        });
        self.worker
            .submit_with(
                TRANSACTION_SIMULATOR,
                ROUTE_TRANSFER,
                self.id_type(),
                iteration,
                &key,
                &body,
                self.worker.dry_run || self.settings.dry_run,
            )
            .await
    }
}
