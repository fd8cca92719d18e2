use async_trait::async_trait;

use super::{TestCase, WorkerHandle, CUSTOM_ETHEREUM_CONTRACT, CUSTOM_FABRIC_CONTRACT};
use crate::dispatcher::RequestOutcome;
use crate::payload::{ContractInvokeBuilder, ContractLocation, ROUTE_CONTRACT_INVOKE};
use crate::tracking::TrackingIdType;

/// Invokes a custom contract method once per iteration.
pub struct ContractInvoke {
    worker: WorkerHandle,
    builder: ContractInvokeBuilder,
}

impl ContractInvoke {
    pub fn new(worker: WorkerHandle, builder: ContractInvokeBuilder) -> Self {
        Self { worker, builder }
    }
}

#[async_trait]
impl TestCase for ContractInvoke {
    fn name(&self) -> &'static str {
        match self.builder.location() {
            ContractLocation::Ethereum { .. } => CUSTOM_ETHEREUM_CONTRACT,
            ContractLocation::Fabric { .. } => CUSTOM_FABRIC_CONTRACT,
        }
    }

    fn id_type(&self) -> TrackingIdType {
        TrackingIdType::OperationId
    }

    async fn run_once(&self, iteration: u64) -> RequestOutcome {
        let key = self.worker.idempotency_key(iteration);
        let body = self.builder.build(iteration, &key);
        self.worker
            .submit(
                self.name(),
                ROUTE_CONTRACT_INVOKE,
                self.id_type(),
                iteration,
                &key,
                &body,
            )
            .await
    }
}
