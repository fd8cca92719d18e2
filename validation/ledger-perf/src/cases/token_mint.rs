use async_trait::async_trait;

use super::{TestCase, WorkerHandle, TOKEN_MINT};
use crate::dispatcher::RequestOutcome;
use crate::payload::{TokenMintBuilder, ROUTE_TOKEN_MINT};
use crate::tracking::TrackingIdType;

/// Mints tokens into a pool, one mint per iteration.
pub struct TokenMint {
    worker: WorkerHandle,
    builder: TokenMintBuilder,
}

impl TokenMint {
    pub fn new(worker: WorkerHandle, builder: TokenMintBuilder) -> Self {
        Self { worker, builder }
    }
}

#[async_trait]
impl TestCase for TokenMint {
    fn name(&self) -> &'static str {
        TOKEN_MINT
    }

    fn id_type(&self) -> TrackingIdType {
        TrackingIdType::TransferId
    }

    async fn run_once(&self, iteration: u64) -> RequestOutcome {
        let key = self.worker.idempotency_key(iteration);
        let body = self.builder.build(iteration, &key);
        self.worker
            .submit(TOKEN_MINT, ROUTE_TOKEN_MINT, self.id_type(), iteration, &key, &body)
            .await
    }
}
