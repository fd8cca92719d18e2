use async_trait::async_trait;

use super::{TestCase, WorkerHandle, PRIVATE_MESSAGE};
use crate::dispatcher::RequestOutcome;
use crate::payload::{PrivateMessageBuilder, ROUTE_PRIVATE_MESSAGE};
use crate::tracking::TrackingIdType;

/// Sends a private message to the configured recipient.
pub struct PrivateMessage {
    worker: WorkerHandle,
    builder: PrivateMessageBuilder,
}

impl PrivateMessage {
    pub fn new(worker: WorkerHandle, builder: PrivateMessageBuilder) -> Self {
        Self { worker, builder }
    }
}

#[async_trait]
impl TestCase for PrivateMessage {
    fn name(&self) -> &'static str {
        PRIVATE_MESSAGE
    }

    fn id_type(&self) -> TrackingIdType {
        TrackingIdType::MessageId
    }

    async fn run_once(&self, iteration: u64) -> RequestOutcome {
        let key = self.worker.idempotency_key(iteration);
        let body = self.builder.build(iteration, &key);
        self.worker
            .submit(
                PRIVATE_MESSAGE,
                ROUTE_PRIVATE_MESSAGE,
                self.id_type(),
                iteration,
                &key,
                &body,
            )
            .await
    }
}
