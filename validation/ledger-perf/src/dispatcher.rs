//! Submit-and-correlate protocol for a single request.
//!
//! A request moves `Built -> Sent -> {Confirmed | ConflictAcknowledged | Failed}`.
//! There is no retry here: a 409 means the node already holds the operation
//! and is treated as success, anything else non-2xx fails the call.

use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::{PerfError, PerfResult};
use crate::tracking::{ConfirmationTracker, TrackingIdType};

const JSON: &str = "application/json";

/// Terminal state of one submission.
#[derive(Debug)]
pub enum Outcome {
    Confirmed,
    ConflictAcknowledged,
    Failed(PerfError),
}

/// Label for an outcome, used in metrics and logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeKind {
    Confirmed,
    ConflictAcknowledged,
    Failed,
}

impl Outcome {
    pub fn kind(&self) -> OutcomeKind {
        match self {
            Self::Confirmed => OutcomeKind::Confirmed,
            Self::ConflictAcknowledged => OutcomeKind::ConflictAcknowledged,
            Self::Failed(_) => OutcomeKind::Failed,
        }
    }

    pub fn is_success(&self) -> bool {
        !matches!(self, Self::Failed(_))
    }
}

/// Result of one submission, consumed immediately by the worker loop.
#[derive(Debug)]
pub struct RequestOutcome {
    pub outcome: Outcome,
    /// `None` for dry runs and transport failures.
    pub http_status: Option<u16>,
    /// Empty when the call failed.
    pub correlation_id: String,
}

impl RequestOutcome {
    pub fn failed(error: PerfError) -> Self {
        Self {
            http_status: error.http_status(),
            outcome: Outcome::Failed(error),
            correlation_id: String::new(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.outcome.is_success()
    }
}

/// How a response status is handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    Success,
    Conflict,
    Error,
}

/// Classify an HTTP status.
pub fn classify(status: StatusCode) -> Classification {
    if status.is_success() {
        Classification::Success
    } else if status == StatusCode::CONFLICT {
        Classification::Conflict
    } else {
        Classification::Error
    }
}

/// Structured error body returned by the node.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RestError {
    #[serde(default, alias = "error")]
    pub message: String,
    #[serde(flatten)]
    pub details: serde_json::Map<String, Value>,
}

impl RestError {
    /// Parse an error body, keeping raw text as the message if it isn't JSON.
    pub fn parse(body: &[u8]) -> Self {
        serde_json::from_slice(body).unwrap_or_else(|_| Self {
            message: String::from_utf8_lossy(body).trim().to_string(),
            details: Default::default(),
        })
    }
}

/// A built request ready for submission.
#[derive(Debug, Clone)]
pub struct Submission<'a> {
    pub node_url: &'a str,
    pub route: &'a str,
    pub body: &'a Value,
    pub id: u64,
    pub test_name: &'a str,
    pub worker_id: u32,
    pub idempotency_key: &'a str,
    pub id_type: TrackingIdType,
    pub dry_run: bool,
}

/// Sends requests to node endpoints and registers confirmations.
///
/// Shared by every worker; the client pools connections internally.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    client: Client,
    tracker: Arc<ConfirmationTracker>,
}

impl Dispatcher {
    pub fn new(
        timeout: Duration,
        max_idle: usize,
        tracker: Arc<ConfirmationTracker>,
    ) -> PerfResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .pool_max_idle_per_host(max_idle)
            .build()?;
        Ok(Self::with_client(client, tracker))
    }

    pub fn with_client(client: Client, tracker: Arc<ConfirmationTracker>) -> Self {
        Self { client, tracker }
    }

    pub fn tracker(&self) -> &Arc<ConfirmationTracker> {
        &self.tracker
    }

    /// Submit a request and classify the outcome.
    pub async fn send_and_wait(&self, submission: Submission<'_>) -> RequestOutcome {
        let url = join_url(submission.node_url, submission.route);

        if submission.dry_run {
            let target = match &url {
                Ok(u) => u.to_string(),
                Err(PerfError::InvalidUrl { url, .. }) => url.clone(),
                Err(e) => e.to_string(),
            };
            info!(
                test = submission.test_name,
                id = submission.id,
                url = %target,
                payload = %submission.body,
                "DRYRUN: not posting request"
            );
            let correlation_id = submission.id_type.correlation_id(
                submission.worker_id,
                submission.idempotency_key,
                None,
            );
            return RequestOutcome {
                outcome: Outcome::Confirmed,
                http_status: None,
                correlation_id,
            };
        }

        let url = match url {
            Ok(url) => url,
            Err(e) => return RequestOutcome::failed(e),
        };

        let body = match serde_json::to_vec(submission.body) {
            Ok(b) => b,
            Err(e) => return RequestOutcome::failed(e.into()),
        };

        let response = match self
            .client
            .post(url.clone())
            .header(ACCEPT, JSON)
            .header(CONTENT_TYPE, JSON)
            .body(body)
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) => {
                warn!(
                    test = submission.test_name,
                    id = submission.id,
                    url = %url,
                    error = %e,
                    "Request failed to reach node"
                );
                return RequestOutcome::failed(PerfError::Transport(e));
            }
        };

        let status = response.status();
        let bytes = match response.bytes().await {
            Ok(b) => b,
            Err(e) => {
                let mut outcome = RequestOutcome::failed(PerfError::Transport(e));
                outcome.http_status = Some(status.as_u16());
                return outcome;
            }
        };

        match classify(status) {
            Classification::Success => {
                let parsed: Option<Value> = serde_json::from_slice(&bytes).ok();
                let derived = submission.id_type.correlation_id(
                    submission.worker_id,
                    submission.idempotency_key,
                    parsed.as_ref(),
                );
                let correlation_id = self.tracker.register(submission.idempotency_key, derived);
                debug!(
                    test = submission.test_name,
                    id = submission.id,
                    status = status.as_u16(),
                    correlation_id = %correlation_id,
                    "Request accepted"
                );
                RequestOutcome {
                    outcome: Outcome::Confirmed,
                    http_status: Some(status.as_u16()),
                    correlation_id,
                }
            }
            Classification::Conflict => {
                let rest_error = RestError::parse(&bytes);
                warn!(
                    test = submission.test_name,
                    id = submission.id,
                    idempotency_key = submission.idempotency_key,
                    message = %rest_error.message,
                    "Request already received by the endpoint"
                );
                let correlation_id = self
                    .tracker
                    .lookup(submission.idempotency_key)
                    .unwrap_or_else(|| {
                        let derived = submission.id_type.correlation_id(
                            submission.worker_id,
                            submission.idempotency_key,
                            None,
                        );
                        self.tracker.register(submission.idempotency_key, derived)
                    });
                RequestOutcome {
                    outcome: Outcome::ConflictAcknowledged,
                    http_status: Some(status.as_u16()),
                    correlation_id,
                }
            }
            Classification::Error => {
                let rest_error = RestError::parse(&bytes);
                let raw = String::from_utf8_lossy(&bytes).to_string();
                warn!(
                    test = submission.test_name,
                    id = submission.id,
                    url = %url,
                    status = status.as_u16(),
                    body = %raw,
                    "Node rejected request"
                );
                RequestOutcome::failed(PerfError::Remote {
                    test: submission.test_name.to_string(),
                    status: status.as_u16(),
                    message: rest_error.message,
                    body: raw,
                })
            }
        }
    }
}

/// Append a route to a node base URL.
pub fn join_url(base: &str, route: &str) -> PerfResult<reqwest::Url> {
    let full = format!(
        "{}/{}",
        base.trim_end_matches('/'),
        route.trim_start_matches('/')
    );
    reqwest::Url::parse(&full).map_err(|e| PerfError::InvalidUrl {
        url: full,
        message: e.to_string(),
    })
}
