//! Reporter
//!
//! Builds the structured outcome of a run. Failed runs produce the same
//! shape plus the error message, so the side effects that did happen stay
//! auditable.

use super::executor::ActionLog;
use super::observed::{ObservedState, OldState};
use crate::error::Error;
use serde::Serialize;
use serde_json::{Map, Value};

/// Before/after snapshot of the resource configuration
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiffRecord {
    pub before: Value,
    pub after: Value,
}

/// Outcome of one reconciliation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReconcileReport {
    /// Whether any action was taken (or would be, in check mode)
    pub changed: bool,
    /// State the resource was found in; unset when the fetch never completed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub old_state: Option<OldState>,
    /// Action tags in execution order
    pub actions: Vec<String>,
    pub diff: DiffRecord,
    /// Request/response log, when request logging is enabled
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logs: Option<Vec<Value>>,
}

/// Assembles [`ReconcileReport`]s
pub struct Reporter;

impl Reporter {
    pub fn build(
        observed: Option<&ObservedState>,
        log: &ActionLog,
        after: Value,
        logs: Option<Vec<Value>>,
    ) -> ReconcileReport {
        let before = observed
            .and_then(ObservedState::metadata)
            .cloned()
            .unwrap_or_else(Map::new);

        ReconcileReport {
            changed: !log.is_empty(),
            old_state: observed.map(ObservedState::label),
            actions: log.tags(),
            diff: DiffRecord {
                before: Value::Object(before),
                after,
            },
            logs,
        }
    }
}

/// A failed run: the error plus everything known when it happened
#[derive(Debug, thiserror::Error)]
#[error("{error}")]
pub struct ReconcileFailure {
    pub error: Error,
    pub report: ReconcileReport,
}

impl ReconcileFailure {
    /// Report with `failed` and `msg` added
    pub fn to_json(&self) -> Value {
        let mut value = serde_json::to_value(&self.report).unwrap_or_else(|_| Value::Object(Map::new()));
        if let Value::Object(map) = &mut value {
            map.insert("failed".into(), Value::Bool(true));
            map.insert("msg".into(), Value::String(self.error.to_string()));
        }
        value
    }
}
