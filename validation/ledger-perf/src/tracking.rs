//! Correlation of submitted operations with their asynchronous confirmations.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use crate::idempotency::uuid_for_key;

/// How the identity of a submitted operation is derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackingIdType {
    /// The submitting worker's number.
    WorkerNumber,
    /// UUID derived from the idempotency key.
    GeneratedUuid,
    /// Message id assigned by the node (`header.id`).
    MessageId,
    /// Token transfer id assigned by the node (`localId`).
    TransferId,
    /// Operation id assigned by the node (`id`).
    OperationId,
}

impl TrackingIdType {
    /// JSON pointer of the server-assigned id, if this strategy uses one.
    pub fn response_pointer(self) -> Option<&'static str> {
        match self {
            Self::MessageId => Some("/header/id"),
            Self::TransferId => Some("/localId"),
            Self::OperationId => Some("/id"),
            Self::WorkerNumber | Self::GeneratedUuid => None,
        }
    }

    /// Derive the correlation id for one submission.
    ///
    /// Server-assigned ids fall back to the generated UUID when the response
    /// carries none (dry runs, conflicts, empty bodies).
    pub fn correlation_id(
        self,
        worker_id: u32,
        idempotency_key: &str,
        response: Option<&Value>,
    ) -> String {
        match self {
            Self::WorkerNumber => worker_id.to_string(),
            Self::GeneratedUuid => uuid_for_key(idempotency_key).to_string(),
            _ => self
                .response_pointer()
                .and_then(|ptr| response.and_then(|r| r.pointer(ptr)))
                .and_then(|v| v.as_str())
                .map(str::to_string)
                .unwrap_or_else(|| uuid_for_key(idempotency_key).to_string()),
        }
    }
}

#[derive(Debug, Default)]
struct TrackerState {
    /// Idempotency key -> correlation id, pending operations only.
    by_key: HashMap<String, String>,
    /// Correlation id -> pending keys in registration order.
    by_id: HashMap<String, VecDeque<String>>,
    registered: usize,
    confirmed: usize,
}

/// Registry of submitted operations awaiting confirmation.
///
/// Keyed by idempotency key: the first registration fixes the correlation id
/// and later registrations for the same key return it unchanged. Several
/// operations may share a correlation id (one per worker under
/// [`TrackingIdType::WorkerNumber`]); each confirmation of that id settles the
/// oldest pending one. Settled operations are dropped and only counted.
#[derive(Debug, Default)]
pub struct ConfirmationTracker {
    state: Mutex<TrackerState>,
}

impl ConfirmationTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a submission, returning the canonical correlation id.
    pub fn register(&self, idempotency_key: &str, correlation_id: String) -> String {
        let mut state = self.lock();
        if let Some(existing) = state.by_key.get(idempotency_key) {
            return existing.clone();
        }
        state
            .by_key
            .insert(idempotency_key.to_string(), correlation_id.clone());
        state
            .by_id
            .entry(correlation_id.clone())
            .or_default()
            .push_back(idempotency_key.to_string());
        state.registered += 1;
        correlation_id
    }

    /// Correlation id of a pending operation.
    pub fn lookup(&self, idempotency_key: &str) -> Option<String> {
        self.lock().by_key.get(idempotency_key).cloned()
    }

    /// Settle one pending operation carrying this correlation id. Returns
    /// false if none is pending.
    pub fn confirm(&self, correlation_id: &str) -> bool {
        let mut state = self.lock();
        let Some(keys) = state.by_id.get_mut(correlation_id) else {
            return false;
        };
        let key = keys.pop_front();
        if keys.is_empty() {
            state.by_id.remove(correlation_id);
        }
        match key {
            Some(key) => {
                state.by_key.remove(&key);
                state.confirmed += 1;
                true
            }
            None => false,
        }
    }

    /// Operations registered over the tracker's lifetime.
    pub fn registered(&self) -> usize {
        self.lock().registered
    }

    pub fn confirmed(&self) -> usize {
        self.lock().confirmed
    }

    /// Registered operations not yet confirmed.
    pub fn pending(&self) -> usize {
        self.lock().by_key.len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, TrackerState> {
        // every mutation completes under one guard, so a poisoned lock still holds consistent maps
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}
