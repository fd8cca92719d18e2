//! In-process mock ledger node for integration tests.

#![allow(dead_code)]

use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode, Uri};
use axum::response::IntoResponse;
use axum::{Json, Router};
use serde_json::{json, Value};
use std::collections::HashSet;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use ledger_perf::cases::WorkerHandle;
use ledger_perf::{ConfirmationTracker, Dispatcher, IdempotencyKeys, RunConfig};

/// A request as seen by the mock node.
#[derive(Debug, Clone)]
pub struct Received {
    pub path: String,
    pub body: Value,
    pub accept: Option<String>,
    pub content_type: Option<String>,
}

#[derive(Default)]
pub struct MockNode {
    pub received: Mutex<Vec<Received>>,
    seen_keys: Mutex<HashSet<String>>,
    /// When set, every request is answered with this status.
    pub force_status: Mutex<Option<StatusCode>>,
}

impl MockNode {
    pub fn received(&self) -> Vec<Received> {
        self.received.lock().unwrap().clone()
    }

    /// Mark a key as already received, as if another process had sent it.
    pub fn seed_key(&self, key: &str) {
        self.seen_keys.lock().unwrap().insert(key.to_string());
    }

    pub fn fail_with(&self, status: StatusCode) {
        *self.force_status.lock().unwrap() = Some(status);
    }
}

async fn handle(
    State(node): State<Arc<MockNode>>,
    uri: Uri,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> impl IntoResponse {
    let header_value = |name: header::HeaderName| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };
    node.received.lock().unwrap().push(Received {
        path: uri.path().to_string(),
        body: body.clone(),
        accept: header_value(header::ACCEPT),
        content_type: header_value(header::CONTENT_TYPE),
    });

    if let Some(status) = *node.force_status.lock().unwrap() {
        return (status, Json(json!({"error": "FF10500: forced failure", "code": "FF10500"})));
    }

    let key = body["idempotencyKey"].as_str().unwrap_or_default().to_string();
    if !node.seen_keys.lock().unwrap().insert(key.clone()) {
        return (
            StatusCode::CONFLICT,
            Json(json!({"error": format!("FF10431: idempotency key '{}' already used", key)})),
        );
    }

    (
        StatusCode::ACCEPTED,
        Json(json!({
            "id": format!("op-{}", key),
            "localId": format!("xfer-{}", key),
            "header": {"id": format!("msg-{}", key)}
        })),
    )
}

/// Start a mock node, returning its base URL.
pub async fn start_node() -> (String, Arc<MockNode>) {
    let node = Arc::new(MockNode::default());
    let app = Router::new().fallback(handle).with_state(node.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr: SocketAddr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{}/api/v1/namespaces/default", addr), node)
}

/// Run config pointing at the given node.
pub fn config(node_url: &str, tests: &str) -> RunConfig {
    RunConfig::from_yaml(&format!(
        r#"
name: integration
node_urls: ["{}"]
tests: {}
actions_per_loop: 3
tag_prefix: perf
run_id: run1
request_timeout_secs: 5
token: {{ pool: P1, recipient_address: "0xABC" }}
contract: {{ address: "0x1234" }}
recipient: "did:firefly:org/org_1"
transaction_simulator: {{ parties_count: 3, min_amount: 5, max_amount: 5 }}
invoke_options: {{ gasLimit: 100000 }}
"#,
        node_url, tests
    ))
    .unwrap()
}

/// Worker handle for `worker_id` with a fresh tracker.
pub fn worker_handle(config: &RunConfig, worker_id: u32) -> WorkerHandle {
    let tracker = Arc::new(ConfirmationTracker::new());
    let dispatcher = Arc::new(Dispatcher::new(config.request_timeout(), 4, tracker).unwrap());
    WorkerHandle::new(
        worker_id,
        config,
        dispatcher,
        Arc::new(IdempotencyKeys::new("run1")),
    )
}
