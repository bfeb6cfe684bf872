//! The 2PC message types: `PrepareRequest`/`PrepareResponse`,
//! `CommitRequest`, `ReleaseRequest`, and the cancellation-reason
//! bookkeeping a cancelled transaction reports back per input index.
//! Each is a plain value type, carried across the coordinator/shard
//! boundary by ordinary method calls rather than shared mutable state.

use crate::item::Item;
use crate::value::AttributeValue;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The kind of write a transaction item performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WriteOperation {
    Put,
    Update,
    Delete,
    ConditionCheck,
}

/// Placeholder resolution context threaded through condition and
/// update expression evaluation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExpressionContext {
    pub attribute_names: BTreeMap<String, String>,
    pub attribute_values: BTreeMap<String, AttributeValue>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ReturnValuesOnConditionCheckFailure {
    #[default]
    None,
    AllOld,
}

/// Phase 1 of 2PC: lock and validate a single item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrepareRequest {
    pub transaction_id: String,
    pub timestamp: u64,
    pub table: String,
    pub key: Item,
    pub operation: WriteOperation,
    /// The full item body, required for `Put`.
    pub item: Option<Item>,
    pub update_expression: Option<String>,
    pub condition_expression: Option<String>,
    pub expression: ExpressionContext,
    pub return_values_on_condition_check_failure: ReturnValuesOnConditionCheckFailure,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum PrepareOutcome {
    Accepted { lsn: u64 },
    TimestampConflict,
    TransactionConflict,
    ConditionalCheckFailed { item: Option<Item> },
}

impl PrepareOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, PrepareOutcome::Accepted { .. })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrepareResponse {
    /// Position of this item within the original transaction request;
    /// used to build the per-index `CancellationReason` array.
    pub index: usize,
    pub outcome: PrepareOutcome,
}

/// Phase 2 of 2PC: apply the operation and release the lock. Must
/// succeed once the matching prepare was accepted; idempotent per
/// `(transaction_id, key)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitRequest {
    pub transaction_id: String,
    pub timestamp: u64,
    pub table: String,
    pub key: Item,
    pub operation: WriteOperation,
    pub item: Option<Item>,
    pub update_expression: Option<String>,
    pub expression: ExpressionContext,
}

/// Best-effort unlock issued when a transaction aborts after prepare.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReleaseRequest {
    pub transaction_id: String,
    pub table: String,
    pub key: Item,
}

/// One caller-supplied item within a `TransactWriteItems` request,
/// before the coordinator has minted a transaction id or timestamp.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactWriteItem {
    pub table: String,
    pub key: Item,
    pub operation: WriteOperation,
    /// The full item body, required for `Put`.
    pub item: Option<Item>,
    pub update_expression: Option<String>,
    pub condition_expression: Option<String>,
    pub expression: ExpressionContext,
    pub return_values_on_condition_check_failure: ReturnValuesOnConditionCheckFailure,
}

/// One caller-supplied item within a `TransactGetItems` request.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TransactGetItem {
    pub table: String,
    pub key: Item,
    pub projection_expression: Option<String>,
    pub expression: ExpressionContext,
}

/// One request within a `BatchGetItem` call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchGetRequest {
    pub table: String,
    pub key: Item,
}

/// One operation within a `BatchWriteItem` call. Non-transactional —
/// each item is applied independently, in the same style as
/// `put_item`/`delete_item` (§4.3, §4.5).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum BatchWriteOperation {
    Put { table: String, item: Item },
    Delete { table: String, key: Item },
}

/// Per-input-index explanation returned when a transaction is
/// cancelled. `code` is `"None"` for every index except the one that
/// actually failed, matching DynamoDB's `TransactionCanceledException`
/// shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancellationReason {
    pub code: String,
    pub message: Option<String>,
    pub item: Option<Item>,
}

impl CancellationReason {
    pub fn none() -> Self {
        CancellationReason {
            code: "None".to_string(),
            message: None,
            item: None,
        }
    }

    pub fn conditional_check_failed(item: Option<Item>) -> Self {
        CancellationReason {
            code: "ConditionalCheckFailed".to_string(),
            message: Some("the conditional request failed".to_string()),
            item,
        }
    }

    pub fn transaction_conflict(message: impl Into<String>) -> Self {
        CancellationReason {
            code: "TransactionConflict".to_string(),
            message: Some(message.into()),
            item: None,
        }
    }

    pub fn validation_error(message: impl Into<String>) -> Self {
        CancellationReason {
            code: "ValidationError".to_string(),
            message: Some(message.into()),
            item: None,
        }
    }

    pub fn is_none(&self) -> bool {
        self.code == "None"
    }
}
