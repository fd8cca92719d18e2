//! Test cases: the unit of work a worker repeats.

mod contract;
mod private_msg;
mod token_mint;
mod transaction_simulator;

pub use contract::ContractInvoke;
pub use private_msg::PrivateMessage;
pub use token_mint::TokenMint;
pub use transaction_simulator::{parties, SimulatorSettings, TransactionSimulator};

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

use crate::config::RunConfig;
use crate::dispatcher::{Dispatcher, RequestOutcome, Submission};
use crate::idempotency::IdempotencyKeys;
use crate::tracking::TrackingIdType;

pub const CUSTOM_ETHEREUM_CONTRACT: &str = "custom_ethereum_contract";
pub const CUSTOM_FABRIC_CONTRACT: &str = "custom_fabric_contract";
pub const PRIVATE_MESSAGE: &str = "msg_private";
pub const TOKEN_MINT: &str = "token_mint";
pub const TRANSACTION_SIMULATOR: &str = "transaction_simulator";

/// One kind of ledger operation exercised by the load generator.
#[async_trait]
pub trait TestCase: Send + Sync {
    /// Registered name of the test case.
    fn name(&self) -> &'static str;

    /// How submitted operations are correlated with confirmations.
    fn id_type(&self) -> TrackingIdType;

    /// Build and submit one operation for the given iteration.
    async fn run_once(&self, iteration: u64) -> RequestOutcome;
}

/// Shared pieces every test case needs to submit requests for one worker.
#[derive(Debug, Clone)]
pub struct WorkerHandle {
    pub worker_id: u32,
    pub node_url: String,
    pub dry_run: bool,
    pub dispatcher: Arc<Dispatcher>,
    pub keys: Arc<IdempotencyKeys>,
}

impl WorkerHandle {
    pub fn new(
        worker_id: u32,
        config: &RunConfig,
        dispatcher: Arc<Dispatcher>,
        keys: Arc<IdempotencyKeys>,
    ) -> Self {
        Self {
            worker_id,
            node_url: config.node_url_for(worker_id).to_string(),
            dry_run: config.dry_run,
            dispatcher,
            keys,
        }
    }

    pub fn idempotency_key(&self, iteration: u64) -> String {
        self.keys.key(self.worker_id, iteration)
    }

    /// Submit a built body on behalf of this worker.
    async fn submit(
        &self,
        test_name: &str,
        route: &str,
        id_type: TrackingIdType,
        iteration: u64,
        idempotency_key: &str,
        body: &Value,
    ) -> RequestOutcome {
        self.submit_with(test_name, route, id_type, iteration, idempotency_key, body, self.dry_run)
            .await
    }

    #[allow(clippy::too_many_arguments)]
    async fn submit_with(
        &self,
        test_name: &str,
        route: &str,
        id_type: TrackingIdType,
        iteration: u64,
        idempotency_key: &str,
        body: &Value,
        dry_run: bool,
    ) -> RequestOutcome {
        self.dispatcher
            .send_and_wait(Submission {
                node_url: &self.node_url,
                route,
                body,
                id: iteration,
                test_name,
                worker_id: self.worker_id,
                idempotency_key,
                id_type,
                dry_run,
            })
            .await
    }
}
