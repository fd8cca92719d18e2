//! Submit-and-correlate behaviour against a mock node.

mod common;

use axum::http::StatusCode;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

use ledger_perf::cases::{ContractInvoke, PrivateMessage, TestCase, TokenMint, TransactionSimulator};
use ledger_perf::dispatcher::Submission;
use ledger_perf::idempotency::uuid_for_key;
use ledger_perf::payload::{ContractInvokeBuilder, PrivateMessageBuilder, TokenMintBuilder};
use ledger_perf::registry::{Blueprint, TestCaseRegistry};
use ledger_perf::{ConfirmationTracker, Dispatcher, Outcome, OutcomeKind, PerfError, TrackingIdType};

#[tokio::test]
async fn test_token_mint_end_to_end() {
    let (url, node) = common::start_node().await;
    let config = common::config(&url, "[{ name: token_mint }]");
    let builder = TokenMintBuilder::new(&config, "perf").unwrap();
    let mint = TokenMint::new(common::worker_handle(&config, 3), builder);

    let first = mint.run_once(7).await;
    assert_eq!(first.outcome.kind(), OutcomeKind::Confirmed);
    assert_eq!(first.http_status, Some(202));
    assert_eq!(first.correlation_id, "xfer-run1-3-7");

    let received = node.received();
    assert_eq!(received.len(), 1);
    let req = &received[0];
    assert_eq!(req.path, "/api/v1/namespaces/default/tokens/mint");
    assert_eq!(req.accept.as_deref(), Some("application/json"));
    assert_eq!(req.content_type.as_deref(), Some("application/json"));
    assert_eq!(req.body["pool"], "P1");
    assert_eq!(req.body["to"], "0xABC");
    assert_eq!(
        req.body["message"],
        json!({
            "data": [{"value": "MintTokenPerformanceTest-7"}],
            "header": {"tag": "perf_7"}
        })
    );

    // same worker and iteration again: node answers 409
    let second = mint.run_once(7).await;
    assert_eq!(second.outcome.kind(), OutcomeKind::ConflictAcknowledged);
    assert_eq!(second.http_status, Some(409));
    assert!(second.is_success());
    assert_eq!(second.correlation_id, first.correlation_id);
}

#[tokio::test]
async fn test_duplicate_submission_registers_once() {
    let (url, _node) = common::start_node().await;
    let tracker = Arc::new(ConfirmationTracker::new());
    let dispatcher = Dispatcher::new(Duration::from_secs(5), 1, tracker.clone()).unwrap();
    let body = json!({"data": [], "idempotencyKey": "run1-0-0"});

    let mut ids = Vec::new();
    for _ in 0..3 {
        let outcome = dispatcher
            .send_and_wait(Submission {
                node_url: &url,
                route: "messages/private",
                body: &body,
                id: 0,
                test_name: "msg_private",
                worker_id: 0,
                idempotency_key: "run1-0-0",
                id_type: TrackingIdType::MessageId,
                dry_run: false,
            })
            .await;
        assert!(outcome.is_success());
        ids.push(outcome.correlation_id);
    }

    assert_eq!(ids, vec!["msg-run1-0-0"; 3]);
    assert_eq!(tracker.registered(), 1);
    assert_eq!(tracker.pending(), 1);
    assert!(tracker.confirm("msg-run1-0-0"));
    assert_eq!(tracker.pending(), 0);
}

#[tokio::test]
async fn test_conflict_without_local_registration_uses_derived_id() {
    let (url, node) = common::start_node().await;
    node.seed_key("run1-3-7");
    let tracker = Arc::new(ConfirmationTracker::new());
    let dispatcher = Dispatcher::new(Duration::from_secs(5), 1, tracker.clone()).unwrap();
    let body = json!({"pool": "P1", "idempotencyKey": "run1-3-7"});

    let outcome = dispatcher
        .send_and_wait(Submission {
            node_url: &url,
            route: "tokens/mint",
            body: &body,
            id: 7,
            test_name: "token_mint",
            worker_id: 3,
            idempotency_key: "run1-3-7",
            id_type: TrackingIdType::TransferId,
            dry_run: false,
        })
        .await;

    assert_eq!(outcome.outcome.kind(), OutcomeKind::ConflictAcknowledged);
    assert_eq!(outcome.http_status, Some(409));
    assert_eq!(
        outcome.correlation_id,
        uuid_for_key("run1-3-7").to_string()
    );
    assert_eq!(tracker.registered(), 1);
    assert_eq!(
        tracker.lookup("run1-3-7"),
        Some(outcome.correlation_id.clone())
    );
}

#[tokio::test]
async fn test_worker_number_confirmations_settle_one_operation_each() {
    let (url, _node) = common::start_node().await;
    let config = common::config(&url, "[{ name: transaction_simulator }]");
    let settings = match TestCaseRegistry::new()
        .prepare("transaction_simulator", &config, "perf")
        .unwrap()
    {
        Blueprint::TransactionSimulator(s) => s,
        other => panic!("unexpected blueprint {:?}", other),
    };
    let handle = common::worker_handle(&config, 2);
    let tracker = handle.dispatcher.tracker().clone();
    let sim = TransactionSimulator::new(handle, settings);

    for iteration in 0..5 {
        assert_eq!(sim.run_once(iteration).await.correlation_id, "2");
    }
    assert_eq!(tracker.registered(), 5);
    assert_eq!(tracker.pending(), 5);

    assert!(tracker.confirm("2"));
    assert!(tracker.confirm("2"));
    assert_eq!(tracker.confirmed(), 2);
    assert_eq!(tracker.pending(), 3);
    assert_eq!(tracker.registered(), 5);
}

#[tokio::test]
async fn test_remote_error_fails_with_status_and_body() {
    let (url, node) = common::start_node().await;
    node.fail_with(StatusCode::INTERNAL_SERVER_ERROR);
    let config = common::config(&url, "[{ name: msg_private }]");
    let builder = PrivateMessageBuilder::new(&config, "perf").unwrap();
    let msg = PrivateMessage::new(common::worker_handle(&config, 0), builder);

    let outcome = msg.run_once(1).await;
    assert_eq!(outcome.http_status, Some(500));
    assert!(outcome.correlation_id.is_empty());
    match outcome.outcome {
        Outcome::Failed(PerfError::Remote {
            status,
            message,
            body,
            test,
        }) => {
            assert_eq!(status, 500);
            assert_eq!(message, "FF10500: forced failure");
            assert!(body.contains("FF10500"));
            assert_eq!(test, "msg_private");
        }
        other => panic!("expected remote failure, got {:?}", other),
    }
}

#[tokio::test]
async fn test_transport_error_fails() {
    // nothing listens on the port once the listener is dropped
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}", listener.local_addr().unwrap());
    drop(listener);

    let config = common::config(&url, "[{ name: custom_ethereum_contract }]");
    let builder = ContractInvokeBuilder::ethereum(&config).unwrap();
    let invoke = ContractInvoke::new(common::worker_handle(&config, 0), builder);

    let outcome = invoke.run_once(0).await;
    assert_eq!(outcome.http_status, None);
    assert!(matches!(outcome.outcome, Outcome::Failed(PerfError::Transport(_))));
    assert!(!outcome.is_success());
}

#[tokio::test]
async fn test_contract_invoke_uses_operation_id() {
    let (url, node) = common::start_node().await;
    let config = common::config(&url, "[{ name: custom_ethereum_contract }]");
    let builder = ContractInvokeBuilder::ethereum(&config).unwrap();
    let invoke = ContractInvoke::new(common::worker_handle(&config, 2), builder);

    let outcome = invoke.run_once(9).await;
    assert_eq!(outcome.outcome.kind(), OutcomeKind::Confirmed);
    assert_eq!(outcome.correlation_id, "op-run1-2-9");
    let received = node.received();
    assert_eq!(received[0].path, "/api/v1/namespaces/default/contracts/invoke");
    assert_eq!(received[0].body["input"]["newValue"], 9);
}

#[tokio::test]
async fn test_transaction_simulator_payload() {
    let (url, node) = common::start_node().await;
    let config = common::config(&url, "[{ name: transaction_simulator }]");
    let settings = match TestCaseRegistry::new()
        .prepare("transaction_simulator", &config, "perf")
        .unwrap()
    {
        Blueprint::TransactionSimulator(s) => s,
        other => panic!("unexpected blueprint {:?}", other),
    };
    let sim = TransactionSimulator::new(common::worker_handle(&config, 2), settings);

    let outcome = sim.run_once(4).await;
    assert_eq!(outcome.outcome.kind(), OutcomeKind::Confirmed);
    assert_eq!(outcome.correlation_id, "2");

    let received = node.received();
    let body = &received[0].body;
    assert_eq!(received[0].path, "/api/v1/namespaces/default/transfer");
    assert_eq!(body["from"], "party2");
    assert_eq!(body["to"], "party0");
    assert_eq!(body["value"], 5);
    assert_eq!(body["idempotencyKey"], "run1-2-4");
    assert_eq!(body["options"]["gasLimit"], 100000);
}

#[tokio::test]
async fn test_simulator_dry_run_sends_nothing() {
    let (url, node) = common::start_node().await;
    let mut config = common::config(&url, "[{ name: transaction_simulator }]");
    if let Some(opts) = config.transaction_simulator.as_mut() {
        opts.dry_run = true;
    }
    let settings = match TestCaseRegistry::new()
        .prepare("transaction_simulator", &config, "perf")
        .unwrap()
    {
        Blueprint::TransactionSimulator(s) => s,
        other => panic!("unexpected blueprint {:?}", other),
    };
    let sim = TransactionSimulator::new(common::worker_handle(&config, 1), settings);

    for iteration in 0..5 {
        let outcome = sim.run_once(iteration).await;
        assert_eq!(outcome.outcome.kind(), OutcomeKind::Confirmed);
        assert_eq!(outcome.http_status, None);
    }
    assert!(node.received().is_empty());
}
