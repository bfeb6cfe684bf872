//! One partition bucket: a durable item table, the 2PC prepare/
//! commit/release endpoint, range queries, and the non-transactional
//! read/write paths (§4.3). A shard serializes its own writes behind
//! a single `parking_lot::Mutex`, one lock per partition rather than
//! one lock for the whole store.

use std::cmp::Ordering;
use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use dynado_core::protocol::{
    CommitRequest, PrepareOutcome, PrepareRequest, ReleaseRequest, WriteOperation,
};
use dynado_core::schema::ScalarType;
use dynado_core::value::compare_decimal;
use dynado_core::{AttributeValue, Error, Item, Result};
use dynado_durability::DurableFile;
use dynado_expr::{apply_update, eval_condition, EvaluationContext, Parser};

use crate::metadata::MetadataStore;

/// `(table, partition_key encoding, sort_key encoding)`. The empty
/// string stands in for "no sort key", matching the core key helpers.
type RowKey = (String, String, String);

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ItemRecord {
    item: Item,
    ongoing_transaction_id: Option<String>,
    last_update_timestamp: u64,
    lsn: u64,
}

impl ItemRecord {
    /// A row inserted purely to hold a lock for a `Put`/`Update` that
    /// targets a key with no existing item (§3's placeholder rows).
    fn is_placeholder(&self) -> bool {
        self.lsn == 0
    }
}

/// A resolved sort-key predicate: placeholders have already been
/// substituted by the caller. Kept separate from `dynado_expr`'s
/// `SortCondition` AST, which still carries unresolved operands —
/// the shard only ever deals in concrete values.
#[derive(Debug, Clone)]
pub enum SortKeyQuery {
    Eq(AttributeValue),
    Lt(AttributeValue),
    Le(AttributeValue),
    Gt(AttributeValue),
    Ge(AttributeValue),
    Between(AttributeValue, AttributeValue),
    BeginsWith(AttributeValue),
}

fn cmp_values(a: &AttributeValue, b: &AttributeValue) -> Ordering {
    match (a, b) {
        (AttributeValue::N(x), AttributeValue::N(y)) => {
            compare_decimal(x, y).unwrap_or(Ordering::Equal)
        }
        (AttributeValue::S(x), AttributeValue::S(y)) => x.cmp(y),
        (AttributeValue::B(x), AttributeValue::B(y)) => x.cmp(y),
        _ => a.canonical_encode().cmp(&b.canonical_encode()),
    }
}

pub struct ShardTable {
    index: usize,
    metadata: Arc<MetadataStore>,
    file: DurableFile<FxHashMap<RowKey, ItemRecord>>,
    rows: Mutex<FxHashMap<RowKey, ItemRecord>>,
}

impl ShardTable {
    pub fn open(data_dir: impl AsRef<Path>, index: usize, metadata: Arc<MetadataStore>) -> Result<Self> {
        let file = DurableFile::new(data_dir.as_ref().join(format!("shard_{index}")));
        let rows = file
            .load()
            .map_err(|e| Error::Io(std::io::Error::new(std::io::ErrorKind::Other, e)))?
            .unwrap_or_default();
        Ok(ShardTable {
            index,
            metadata,
            file,
            rows: Mutex::new(rows),
        })
    }

    pub fn index(&self) -> usize {
        self.index
    }

    fn persist(&self, rows: &FxHashMap<RowKey, ItemRecord>) -> Result<()> {
        self.file
            .save(rows)
            .map_err(|e| Error::Io(std::io::Error::new(std::io::ErrorKind::Other, e)))
    }

    fn row_key(&self, table: &str, key: &Item) -> Result<RowKey> {
        let k = self.metadata.extract_key_values_from_key(table, key)?;
        Ok((table.to_string(), k.partition_key_value, k.sort_key_value))
    }

    // ---- 2PC ----

    /// Phase 1: lock and validate one item. Returns `Err` for anything
    /// that must cancel the whole transaction for a reason other than
    /// the four protocol-level outcomes below (malformed expressions,
    /// arithmetic on a missing operand); the coordinator turns such an
    /// `Err` into a `CancellationReason::validation_error` for this
    /// item's index, while the four `PrepareOutcome` variants map to
    /// their own specific reasons.
    pub fn prepare(&self, req: &PrepareRequest) -> Result<PrepareOutcome> {
        let key = self.row_key(&req.table, &req.key)?;
        let mut rows = self.rows.lock();
        let existing = rows.get(&key).filter(|r| !r.is_placeholder());
        let existing_any = rows.get(&key);

        if let Some(row) = existing_any {
            if req.timestamp <= row.last_update_timestamp {
                return Ok(PrepareOutcome::TimestampConflict);
            }
            if let Some(holder) = &row.ongoing_transaction_id {
                if holder != &req.transaction_id {
                    return Ok(PrepareOutcome::TransactionConflict);
                }
            }
        }

        let current_item = existing.map(|r| r.item.clone());

        if let Some(condition) = &req.condition_expression {
            let node = Parser::parse_condition(condition)
                .map_err(|e| Error::Validation(format!("malformed condition expression: {e}")))?;
            let ctx = EvaluationContext::new(
                current_item.as_ref(),
                &req.expression.attribute_names,
                &req.expression.attribute_values,
            );
            let passes = eval_condition(&node, &ctx)
                .map_err(|e| Error::Validation(format!("condition evaluation failed: {e}")))?;
            if !passes {
                let returned_item = match req.return_values_on_condition_check_failure {
                    dynado_core::protocol::ReturnValuesOnConditionCheckFailure::AllOld => {
                        current_item.clone()
                    }
                    dynado_core::protocol::ReturnValuesOnConditionCheckFailure::None => None,
                };
                return Ok(PrepareOutcome::ConditionalCheckFailed { item: returned_item });
            }
        }

        if req.operation == WriteOperation::Update {
            let update_src = req.update_expression.as_deref().ok_or_else(|| {
                Error::Validation("update operation requires an update expression".to_string())
            })?;
            let update = Parser::parse_update(update_src)
                .map_err(|e| Error::Validation(format!("malformed update expression: {e}")))?;
            let base = current_item.clone().unwrap_or_else(|| req.key.clone());
            apply_update(
                &update,
                &base,
                &req.expression.attribute_names,
                &req.expression.attribute_values,
            )
            .map_err(|e| Error::Validation(format!("update evaluation failed: {e}")))?;
        }

        let lsn = match req.operation {
            WriteOperation::Put | WriteOperation::Update => {
                let entry = rows.entry(key).or_insert_with(|| ItemRecord {
                    item: req.key.clone(),
                    ongoing_transaction_id: None,
                    last_update_timestamp: 0,
                    lsn: 0,
                });
                entry.ongoing_transaction_id = Some(req.transaction_id.clone());
                entry.lsn
            }
            WriteOperation::Delete | WriteOperation::ConditionCheck => {
                if let Some(entry) = rows.get_mut(&key) {
                    entry.ongoing_transaction_id = Some(req.transaction_id.clone());
                    entry.lsn
                } else {
                    0
                }
            }
        };

        self.persist(&rows)?;
        Ok(PrepareOutcome::Accepted { lsn })
    }

    /// Phase 2: apply the operation. Must succeed once the matching
    /// prepare was accepted. Idempotent per `(transaction_id, key)`: the
    /// in-memory table is only mutated after the durable `persist` of a
    /// staged copy succeeds, so a retry following a failed persist reads
    /// the same pre-commit state the first attempt did rather than
    /// re-applying an update on top of its own prior (unpersisted) effect.
    pub fn commit(&self, req: &CommitRequest) -> Result<()> {
        let key = self.row_key(&req.table, &req.key)?;
        let mut rows = self.rows.lock();

        match req.operation {
            WriteOperation::Put => {
                let item = req
                    .item
                    .clone()
                    .ok_or_else(|| Error::Internal("commit of Put with no item body".to_string()))?;
                let lsn = rows.get(&key).map(|r| r.lsn).unwrap_or(0) + 1;
                let record = ItemRecord {
                    item,
                    ongoing_transaction_id: None,
                    last_update_timestamp: req.timestamp,
                    lsn,
                };
                let mut staged = rows.clone();
                staged.insert(key.clone(), record.clone());
                self.persist(&staged)?;
                rows.insert(key, record);
            }
            WriteOperation::Update => {
                let update_src = req.update_expression.as_deref().ok_or_else(|| {
                    Error::Internal("commit of Update with no update expression".to_string())
                })?;
                let update = Parser::parse_update(update_src)
                    .map_err(|e| Error::Internal(format!("update expression parse failed at commit: {e}")))?;
                let base = rows
                    .get(&key)
                    .map(|r| r.item.clone())
                    .unwrap_or_else(|| req.key.clone());
                let new_item = apply_update(
                    &update,
                    &base,
                    &req.expression.attribute_names,
                    &req.expression.attribute_values,
                )
                .map_err(|e| Error::Internal(format!("update evaluation failed at commit: {e}")))?;
                let lsn = rows.get(&key).map(|r| r.lsn).unwrap_or(0) + 1;
                let record = ItemRecord {
                    item: new_item,
                    ongoing_transaction_id: None,
                    last_update_timestamp: req.timestamp,
                    lsn,
                };
                let mut staged = rows.clone();
                staged.insert(key.clone(), record.clone());
                self.persist(&staged)?;
                rows.insert(key, record);
            }
            WriteOperation::Delete => {
                let holds_lock = rows
                    .get(&key)
                    .map(|row| row.ongoing_transaction_id.as_deref() == Some(req.transaction_id.as_str()))
                    .unwrap_or(false);
                if holds_lock {
                    let mut staged = rows.clone();
                    staged.remove(&key);
                    self.persist(&staged)?;
                    rows.remove(&key);
                }
            }
            WriteOperation::ConditionCheck => {
                let holds_lock = rows
                    .get(&key)
                    .map(|row| row.ongoing_transaction_id.as_deref() == Some(req.transaction_id.as_str()))
                    .unwrap_or(false);
                if holds_lock {
                    let mut staged = rows.clone();
                    if let Some(r) = staged.get_mut(&key) {
                        r.ongoing_transaction_id = None;
                    }
                    self.persist(&staged)?;
                    if let Some(r) = rows.get_mut(&key) {
                        r.ongoing_transaction_id = None;
                    }
                }
            }
        }

        tracing::debug!(shard = self.index, table = %req.table, txn = %req.transaction_id, "committed");
        Ok(())
    }

    /// Best-effort unlock issued when a transaction aborts after
    /// prepare. Deletes placeholder rows rather than merely unlocking
    /// them, per §3.
    pub fn release(&self, req: &ReleaseRequest) -> Result<()> {
        let key = self.row_key(&req.table, &req.key)?;
        let mut rows = self.rows.lock();
        let held_by_this_txn = rows.get(&key).map(|row| {
            (
                row.ongoing_transaction_id.as_deref() == Some(req.transaction_id.as_str()),
                row.is_placeholder(),
            )
        });
        let mut changed = false;
        if let Some((held, is_placeholder)) = held_by_this_txn {
            if held {
                if is_placeholder {
                    rows.remove(&key);
                } else if let Some(row) = rows.get_mut(&key) {
                    row.ongoing_transaction_id = None;
                }
                changed = true;
            }
        }
        if changed {
            self.persist(&rows)?;
        }
        Ok(())
    }

    // ---- non-transactional ----

    pub fn put_item(&self, table: &str, item: Item) -> Result<()> {
        self.metadata.validate_item(table, &item)?;
        let key = self.metadata.extract_key_values(table, &item)?;
        let mut rows = self.rows.lock();
        let row_key = (table.to_string(), key.partition_key_value, key.sort_key_value);
        if let Some(holder) = rows.get(&row_key).and_then(|r| r.ongoing_transaction_id.as_ref()) {
            return Err(Error::TransactionConflict(format!(
                "item is locked by transaction {holder}"
            )));
        }
        let lsn = rows.get(&row_key).map(|r| r.lsn).unwrap_or(0) + 1;
        let record = ItemRecord {
            item,
            ongoing_transaction_id: None,
            last_update_timestamp: 0,
            lsn,
        };
        let mut staged = rows.clone();
        staged.insert(row_key.clone(), record.clone());
        self.persist(&staged)?;
        rows.insert(row_key, record);
        Ok(())
    }

    pub fn get_item(&self, table: &str, key: &Item) -> Result<Option<Item>> {
        let row_key = self.row_key(table, key)?;
        let rows = self.rows.lock();
        Ok(rows
            .get(&row_key)
            .filter(|r| !r.is_placeholder())
            .map(|r| r.item.clone()))
    }

    pub fn delete_item(&self, table: &str, key: &Item) -> Result<()> {
        let row_key = self.row_key(table, key)?;
        let mut rows = self.rows.lock();
        if let Some(holder) = rows.get(&row_key).and_then(|r| r.ongoing_transaction_id.as_ref()) {
            return Err(Error::TransactionConflict(format!(
                "item is locked by transaction {holder}"
            )));
        }
        let mut staged = rows.clone();
        staged.remove(&row_key);
        self.persist(&staged)?;
        rows.remove(&row_key);
        Ok(())
    }

    pub fn scan_table(
        &self,
        table: &str,
        limit: Option<usize>,
        exclusive_start_key: Option<&Item>,
    ) -> Result<(Vec<Item>, Option<Item>)> {
        let rows = self.rows.lock();
        let mut matching: Vec<&ItemRecord> = rows
            .iter()
            .filter(|((t, _, _), record)| t == table && !record.is_placeholder())
            .map(|(_, record)| record)
            .collect();
        matching.sort_by(|a, b| {
            let ka = self.metadata.extract_key_values(table, &a.item).ok();
            let kb = self.metadata.extract_key_values(table, &b.item).ok();
            ka.cmp(&kb)
        });

        let start_index = match exclusive_start_key {
            None => 0,
            Some(start) => {
                let start_key = self.metadata.extract_key_values(table, start)?;
                matching
                    .iter()
                    .position(|r| {
                        self.metadata
                            .extract_key_values(table, &r.item)
                            .map(|k| k == start_key)
                            .unwrap_or(false)
                    })
                    .map(|pos| pos + 1)
                    .unwrap_or(0)
            }
        };

        let window = &matching[start_index.min(matching.len())..];
        let limit = limit.unwrap_or(window.len());
        let take = window.len().min(limit + 1);
        let page = &window[..take];

        let last_evaluated_key = if page.len() > limit {
            Some(self.metadata.extract_key(table, &page[limit - 1].item)?)
        } else {
            None
        };
        let items = page[..limit.min(page.len())]
            .iter()
            .map(|r| r.item.clone())
            .collect();
        Ok((items, last_evaluated_key))
    }

    pub fn item_count(&self, table: &str) -> usize {
        self.rows
            .lock()
            .iter()
            .filter(|((t, _, _), record)| t == table && !record.is_placeholder())
            .count()
    }

    pub fn delete_all_table_items(&self, table: &str) -> Result<()> {
        let mut rows = self.rows.lock();
        rows.retain(|(t, _, _), _| t != table);
        self.persist(&rows)
    }

    /// Range query in sort-key order (§4.3). `exclusive_start_sort_key`
    /// is the canonical encoding of the previous page's last item, as
    /// returned in `last_evaluated_key`.
    pub fn query(
        &self,
        table: &str,
        partition_key_value: &AttributeValue,
        condition: Option<&SortKeyQuery>,
        limit: Option<usize>,
        scan_forward: bool,
        exclusive_start_sort_key: Option<&str>,
    ) -> Result<(Vec<Item>, Option<String>)> {
        let schema = self
            .metadata
            .describe_table(table)
            .ok_or_else(|| Error::ResourceNotFound(format!("table '{table}' not found")))?;

        if matches!(condition, Some(SortKeyQuery::BeginsWith(_))) {
            let sk = schema
                .sort_key
                .as_ref()
                .ok_or_else(|| Error::Validation("table has no sort key".to_string()))?;
            if sk.scalar_type != ScalarType::S {
                return Err(Error::Validation(
                    "begins_with requires a string sort key".to_string(),
                ));
            }
        }

        let Some(sort_name) = schema.sort_key_name().map(String::from) else {
            let row_key = (
                table.to_string(),
                partition_key_value.canonical_encode(),
                String::new(),
            );
            let rows = self.rows.lock();
            let items = rows
                .get(&row_key)
                .filter(|r| !r.is_placeholder())
                .map(|r| vec![r.item.clone()])
                .unwrap_or_default();
            return Ok((items, None));
        };

        let pk_encoding = partition_key_value.canonical_encode();
        let rows = self.rows.lock();
        let mut matching: Vec<(AttributeValue, Item)> = rows
            .iter()
            .filter(|((t, pk, _), record)| t == table && pk == &pk_encoding && !record.is_placeholder())
            .filter_map(|(_, record)| {
                record
                    .item
                    .get(&sort_name)
                    .cloned()
                    .map(|sk| (sk, record.item.clone()))
            })
            .filter(|(sk, _)| sort_matches(sk, condition))
            .collect();

        matching.sort_by(|(a, _), (b, _)| {
            let ord = cmp_values(a, b);
            if scan_forward {
                ord
            } else {
                ord.reverse()
            }
        });

        let start_index = match exclusive_start_sort_key {
            None => 0,
            Some(start) => matching
                .iter()
                .position(|(sk, _)| sk.canonical_encode() == start)
                .map(|pos| pos + 1)
                .unwrap_or(0),
        };

        let window = &matching[start_index.min(matching.len())..];
        let limit = limit.unwrap_or(window.len());
        let take = window.len().min(limit + 1);
        let page = &window[..take];

        let last_evaluated_key = if page.len() > limit {
            Some(page[limit - 1].0.canonical_encode())
        } else {
            None
        };
        let items = page[..limit.min(page.len())]
            .iter()
            .map(|(_, item)| item.clone())
            .collect();
        Ok((items, last_evaluated_key))
    }
}

fn sort_matches(value: &AttributeValue, condition: Option<&SortKeyQuery>) -> bool {
    let Some(condition) = condition else { return true };
    match condition {
        SortKeyQuery::Eq(v) => cmp_values(value, v) == Ordering::Equal,
        SortKeyQuery::Lt(v) => cmp_values(value, v) == Ordering::Less,
        SortKeyQuery::Le(v) => cmp_values(value, v) != Ordering::Greater,
        SortKeyQuery::Gt(v) => cmp_values(value, v) == Ordering::Greater,
        SortKeyQuery::Ge(v) => cmp_values(value, v) != Ordering::Less,
        SortKeyQuery::Between(lo, hi) => {
            cmp_values(value, lo) != Ordering::Less && cmp_values(value, hi) != Ordering::Greater
        }
        SortKeyQuery::BeginsWith(prefix) => match (value, prefix) {
            (AttributeValue::S(s), AttributeValue::S(p)) => s.starts_with(p.as_str()),
            _ => false,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dynado_core::protocol::ExpressionContext;
    use dynado_core::schema::{AttributeDefinition, TableSchema};

    fn shard_with_table(name: &str) -> (tempfile::TempDir, ShardTable) {
        let dir = tempfile::tempdir().unwrap();
        let metadata = Arc::new(MetadataStore::open(dir.path()).unwrap());
        metadata
            .create_table(
                TableSchema::new(
                    name,
                    AttributeDefinition {
                        name: "id".into(),
                        scalar_type: ScalarType::S,
                    },
                    None,
                )
                .unwrap(),
            )
            .unwrap();
        let shard = ShardTable::open(dir.path(), 0, metadata).unwrap();
        (dir, shard)
    }

    fn key_item(id: &str) -> Item {
        let mut item = Item::new();
        item.insert("id".to_string(), AttributeValue::S(id.to_string()));
        item
    }

    #[test]
    fn put_then_get_round_trips() {
        let (_dir, shard) = shard_with_table("t");
        let mut item = key_item("a");
        item.insert("v".to_string(), AttributeValue::N("1".into()));
        shard.put_item("t", item.clone()).unwrap();
        assert_eq!(shard.get_item("t", &key_item("a")).unwrap(), Some(item));
    }

    #[test]
    fn prepare_accepts_a_fresh_put_and_inserts_a_placeholder() {
        let (_dir, shard) = shard_with_table("t");
        let mut item = key_item("a");
        item.insert("v".to_string(), AttributeValue::N("1".into()));
        let req = PrepareRequest {
            transaction_id: "tx1".into(),
            timestamp: 10,
            table: "t".into(),
            key: key_item("a"),
            operation: WriteOperation::Put,
            item: Some(item),
            update_expression: None,
            condition_expression: None,
            expression: ExpressionContext::default(),
            return_values_on_condition_check_failure: Default::default(),
        };
        let outcome = shard.prepare(&req).unwrap();
        assert!(outcome.is_accepted());
        // a placeholder exists but isn't visible to get_item yet.
        assert!(shard.get_item("t", &key_item("a")).unwrap().is_none());
    }

    #[test]
    fn commit_after_prepare_makes_the_item_visible() {
        let (_dir, shard) = shard_with_table("t");
        let mut item = key_item("a");
        item.insert("v".to_string(), AttributeValue::N("1".into()));
        let prep = PrepareRequest {
            transaction_id: "tx1".into(),
            timestamp: 10,
            table: "t".into(),
            key: key_item("a"),
            operation: WriteOperation::Put,
            item: Some(item.clone()),
            update_expression: None,
            condition_expression: None,
            expression: ExpressionContext::default(),
            return_values_on_condition_check_failure: Default::default(),
        };
        shard.prepare(&prep).unwrap();
        let commit = CommitRequest {
            transaction_id: "tx1".into(),
            timestamp: 10,
            table: "t".into(),
            key: key_item("a"),
            operation: WriteOperation::Put,
            item: Some(item.clone()),
            update_expression: None,
            expression: ExpressionContext::default(),
        };
        shard.commit(&commit).unwrap();
        assert_eq!(shard.get_item("t", &key_item("a")).unwrap(), Some(item));
    }

    #[test]
    fn second_prepare_from_a_different_transaction_conflicts() {
        let (_dir, shard) = shard_with_table("t");
        let mut item = key_item("a");
        item.insert("v".to_string(), AttributeValue::N("1".into()));
        let mut prep = PrepareRequest {
            transaction_id: "tx1".into(),
            timestamp: 10,
            table: "t".into(),
            key: key_item("a"),
            operation: WriteOperation::Put,
            item: Some(item.clone()),
            update_expression: None,
            condition_expression: None,
            expression: ExpressionContext::default(),
            return_values_on_condition_check_failure: Default::default(),
        };
        shard.prepare(&prep).unwrap();
        prep.transaction_id = "tx2".into();
        prep.timestamp = 11;
        let outcome = shard.prepare(&prep).unwrap();
        assert!(matches!(outcome, PrepareOutcome::TransactionConflict));
    }

    #[test]
    fn prepare_rejects_a_stale_timestamp() {
        let (_dir, shard) = shard_with_table("t");
        let mut item = key_item("a");
        item.insert("v".to_string(), AttributeValue::N("1".into()));
        let prep = PrepareRequest {
            transaction_id: "tx1".into(),
            timestamp: 10,
            table: "t".into(),
            key: key_item("a"),
            operation: WriteOperation::Put,
            item: Some(item.clone()),
            update_expression: None,
            condition_expression: None,
            expression: ExpressionContext::default(),
            return_values_on_condition_check_failure: Default::default(),
        };
        shard.prepare(&prep).unwrap();
        let commit = CommitRequest {
            transaction_id: "tx1".into(),
            timestamp: 10,
            table: "t".into(),
            key: key_item("a"),
            operation: WriteOperation::Put,
            item: Some(item),
            update_expression: None,
            expression: ExpressionContext::default(),
        };
        shard.commit(&commit).unwrap();

        let mut retry = prep.clone();
        retry.transaction_id = "tx2".into();
        retry.timestamp = 10; // not strictly greater than last_update_timestamp
        let outcome = shard.prepare(&retry).unwrap();
        assert!(matches!(outcome, PrepareOutcome::TimestampConflict));
    }

    #[test]
    fn release_deletes_a_placeholder_row() {
        let (_dir, shard) = shard_with_table("t");
        let prep = PrepareRequest {
            transaction_id: "tx1".into(),
            timestamp: 10,
            table: "t".into(),
            key: key_item("a"),
            operation: WriteOperation::Put,
            item: Some(key_item("a")),
            update_expression: None,
            condition_expression: None,
            expression: ExpressionContext::default(),
            return_values_on_condition_check_failure: Default::default(),
        };
        shard.prepare(&prep).unwrap();
        shard
            .release(&ReleaseRequest {
                transaction_id: "tx1".into(),
                table: "t".into(),
                key: key_item("a"),
            })
            .unwrap();
        assert!(shard.get_item("t", &key_item("a")).unwrap().is_none());
        // a second prepare at a fresh timestamp must now succeed cleanly.
        let mut prep2 = prep.clone();
        prep2.transaction_id = "tx2".into();
        prep2.timestamp = 11;
        assert!(shard.prepare(&prep2).unwrap().is_accepted());
    }

    #[test]
    fn query_returns_items_in_numeric_sort_key_order() {
        let dir = tempfile::tempdir().unwrap();
        let metadata = Arc::new(MetadataStore::open(dir.path()).unwrap());
        metadata
            .create_table(
                TableSchema::new(
                    "events",
                    AttributeDefinition {
                        name: "userId".into(),
                        scalar_type: ScalarType::S,
                    },
                    Some(AttributeDefinition {
                        name: "ts".into(),
                        scalar_type: ScalarType::N,
                    }),
                )
                .unwrap(),
            )
            .unwrap();
        let shard = ShardTable::open(dir.path(), 0, metadata).unwrap();
        for ts in [100, 200, 300, 400, 500] {
            let mut item = Item::new();
            item.insert("userId".to_string(), AttributeValue::S("u1".into()));
            item.insert("ts".to_string(), AttributeValue::N(ts.to_string()));
            shard.put_item("events", item).unwrap();
        }
        let (items, _) = shard
            .query(
                "events",
                &AttributeValue::S("u1".into()),
                Some(&SortKeyQuery::Between(
                    AttributeValue::N("200".into()),
                    AttributeValue::N("400".into()),
                )),
                None,
                true,
                None,
            )
            .unwrap();
        let tss: Vec<String> = items
            .iter()
            .map(|i| match i.get("ts").unwrap() {
                AttributeValue::N(s) => s.clone(),
                _ => unreachable!(),
            })
            .collect();
        assert_eq!(tss, vec!["200", "300", "400"]);
    }

    #[test]
    fn query_descending_reverses_order() {
        let dir = tempfile::tempdir().unwrap();
        let metadata = Arc::new(MetadataStore::open(dir.path()).unwrap());
        metadata
            .create_table(
                TableSchema::new(
                    "events",
                    AttributeDefinition {
                        name: "userId".into(),
                        scalar_type: ScalarType::S,
                    },
                    Some(AttributeDefinition {
                        name: "ts".into(),
                        scalar_type: ScalarType::N,
                    }),
                )
                .unwrap(),
            )
            .unwrap();
        let shard = ShardTable::open(dir.path(), 0, metadata).unwrap();
        for ts in [100, 200, 300] {
            let mut item = Item::new();
            item.insert("userId".to_string(), AttributeValue::S("u1".into()));
            item.insert("ts".to_string(), AttributeValue::N(ts.to_string()));
            shard.put_item("events", item).unwrap();
        }
        let (items, _) = shard
            .query(
                "events",
                &AttributeValue::S("u1".into()),
                None,
                None,
                false,
                None,
            )
            .unwrap();
        let tss: Vec<String> = items
            .iter()
            .map(|i| match i.get("ts").unwrap() {
                AttributeValue::N(s) => s.clone(),
                _ => unreachable!(),
            })
            .collect();
        assert_eq!(tss, vec!["300", "200", "100"]);
    }

}
