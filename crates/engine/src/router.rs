//! Routes every boundary operation to the shard (or shards) that own
//! it (§4.5). Table administration and transactions pass straight
//! through to [`MetadataStore`]/[`Coordinator`]; everything else —
//! single-item reads/writes, scans, queries, batches — is this
//! module's own responsibility, built on the same partition-hash the
//! coordinator uses so both agree on which shard a key lives on.

use std::sync::Arc;

use dynado_concurrency::{shard_index, Coordinator};
use dynado_core::protocol::{BatchWriteOperation, ExpressionContext, TransactGetItem, TransactWriteItem};
use dynado_core::schema::TableSchema;
use dynado_core::item::validate_no_reserved_names;
use dynado_core::{limits, Error, Item, Result};
use dynado_expr::{apply_projection, apply_update, eval_condition, EvaluationContext, Parser};
use dynado_storage::{ShardTable, ShardedStore, SortKeyQuery};

/// A single page of a `scan` or `query` call, plus the key to resume
/// from on the next call.
pub struct Page {
    pub items: Vec<Item>,
    pub last_evaluated_key: Option<Item>,
}

/// One outcome slot in a `batch_write` response: `None` means the
/// write to that table/key succeeded, `Some` carries the error.
pub type BatchWriteResult = Vec<Option<Error>>;

pub struct Router {
    shards: Arc<ShardedStore>,
    coordinator: Arc<Coordinator>,
}

impl Router {
    pub fn new(shards: Arc<ShardedStore>, coordinator: Arc<Coordinator>) -> Self {
        Router { shards, coordinator }
    }

    fn shard_for_key(&self, table: &str, key: &Item) -> Result<Arc<ShardTable>> {
        let pk = self.shards.metadata().partition_key_value(table, key)?;
        let index = shard_index(&pk, self.shards.shard_count());
        self.shards
            .shard(index)
            .ok_or_else(|| Error::Internal(format!("shard {index} missing from the sharded store")))
    }

    // ---- table administration (§4.2) ----

    pub fn create_table(&self, schema: TableSchema) -> Result<()> {
        self.shards.metadata().create_table(schema)
    }

    pub fn describe_table(&self, name: &str) -> Option<TableSchema> {
        self.shards.metadata().describe_table(name)
    }

    pub fn list_tables(&self) -> Vec<String> {
        self.shards.metadata().list_tables()
    }

    /// Deletes the table definition, then sweeps every shard for
    /// orphaned rows — the metadata store only knows about the schema,
    /// not the items scattered across shards that reference it.
    pub fn delete_table(&self, name: &str) -> Result<()> {
        self.shards.metadata().delete_table(name)?;
        for shard in self.shards.all_shards() {
            shard.delete_all_table_items(name)?;
        }
        Ok(())
    }

    pub fn item_count(&self, table: &str) -> usize {
        self.shards
            .all_shards()
            .iter()
            .map(|shard| shard.item_count(table))
            .sum()
    }

    // ---- non-transactional single-item operations (§4.3, §4.5) ----

    pub fn put_item(&self, table: &str, item: Item) -> Result<()> {
        validate_no_reserved_names(&item).map_err(Error::Validation)?;
        self.shard_for_key(table, &item)?.put_item(table, item)
    }

    pub fn get_item(&self, table: &str, key: &Item) -> Result<Option<Item>> {
        self.shard_for_key(table, key)?.get_item(table, key)
    }

    pub fn delete_item(&self, table: &str, key: &Item) -> Result<()> {
        self.shard_for_key(table, key)?.delete_item(table, key)
    }

    /// A non-transactional read-modify-write. Not part of the 2PC
    /// protocol — it goes straight through the shard's non-transactional
    /// path, so its writes land at timestamp 0 like `put_item` (§9).
    pub fn update_item(
        &self,
        table: &str,
        key: &Item,
        update_expression: &str,
        condition_expression: Option<&str>,
        expression: &ExpressionContext,
    ) -> Result<Item> {
        let shard = self.shard_for_key(table, key)?;
        let current = shard.get_item(table, key)?;

        if let Some(condition) = condition_expression {
            let node = Parser::parse_condition(condition)
                .map_err(|e| Error::Validation(format!("malformed condition expression: {e}")))?;
            let ctx = EvaluationContext::new(
                current.as_ref(),
                &expression.attribute_names,
                &expression.attribute_values,
            );
            let passes = eval_condition(&node, &ctx)
                .map_err(|e| Error::Validation(format!("condition evaluation failed: {e}")))?;
            if !passes {
                return Err(Error::ConditionalCheckFailed { item: current });
            }
        }

        let update = Parser::parse_update(update_expression)
            .map_err(|e| Error::Validation(format!("malformed update expression: {e}")))?;
        let base = current.unwrap_or_else(|| key.clone());
        let updated = apply_update(
            &update,
            &base,
            &expression.attribute_names,
            &expression.attribute_values,
        )
        .map_err(|e| Error::Validation(format!("update evaluation failed: {e}")))?;
        shard.put_item(table, updated.clone())?;
        Ok(updated)
    }

    // ---- scan (§4.5) ----

    /// Fans out to every shard, merges the results in key order, then
    /// slices the merged list to the requested page. Cross-shard
    /// pagination is emulated this way: there is no single ordering a
    /// shard alone could produce a continuation token for.
    pub fn scan(
        &self,
        table: &str,
        limit: Option<usize>,
        exclusive_start_key: Option<&Item>,
    ) -> Result<Page> {
        let metadata = self.shards.metadata();
        let mut merged = Vec::new();
        for shard in self.shards.all_shards() {
            let (items, _) = shard.scan_table(table, None, None)?;
            merged.extend(items);
        }
        merged.sort_by(|a, b| {
            let ka = metadata.extract_key_values(table, a).ok();
            let kb = metadata.extract_key_values(table, b).ok();
            ka.cmp(&kb)
        });
        self.paginate(table, merged, limit, exclusive_start_key)
    }

    /// Query (§4.5). Always routes straight to the one shard that owns
    /// the partition key — the same shard a `query` with no sort-key
    /// condition would hit, since the shard itself already handles
    /// `condition: None` as "every item under this partition key."
    pub fn query(
        &self,
        table: &str,
        partition_key_value: &dynado_core::AttributeValue,
        condition: Option<&SortKeyQuery>,
        limit: Option<usize>,
        scan_forward: bool,
        exclusive_start_sort_key: Option<&str>,
    ) -> Result<(Vec<Item>, Option<String>)> {
        let pk_encoding = partition_key_value.canonical_encode();
        let index = shard_index(&pk_encoding, self.shards.shard_count());
        let shard = self
            .shards
            .shard(index)
            .ok_or_else(|| Error::Internal(format!("shard {index} missing from the sharded store")))?;
        shard.query(
            table,
            partition_key_value,
            condition,
            limit,
            scan_forward,
            exclusive_start_sort_key,
        )
    }

    fn paginate(
        &self,
        table: &str,
        merged: Vec<Item>,
        limit: Option<usize>,
        exclusive_start_key: Option<&Item>,
    ) -> Result<Page> {
        let metadata = self.shards.metadata();
        let start_index = match exclusive_start_key {
            None => 0,
            Some(start) => {
                let start_key = metadata.extract_key_values(table, start)?;
                merged
                    .iter()
                    .position(|item| {
                        metadata
                            .extract_key_values(table, item)
                            .map(|k| k == start_key)
                            .unwrap_or(false)
                    })
                    .map(|pos| pos + 1)
                    .unwrap_or(0)
            }
        };
        let window = &merged[start_index.min(merged.len())..];
        let limit = limit.unwrap_or(window.len());
        let take = window.len().min(limit + 1);
        let page = &window[..take];
        let last_evaluated_key = if page.len() > limit {
            Some(metadata.extract_key(table, &page[limit - 1])?)
        } else {
            None
        };
        let items = page[..limit.min(page.len())].to_vec();
        Ok(Page {
            items,
            last_evaluated_key,
        })
    }

    // ---- projection (applies to get_item/query/scan results) ----

    pub fn project(&self, item: &Item, projection_expression: &str, attribute_names: &std::collections::BTreeMap<String, String>) -> Result<Item> {
        let node = Parser::parse_projection(projection_expression)
            .map_err(|e| Error::Validation(format!("malformed projection expression: {e}")))?;
        Ok(apply_projection(&node, item, attribute_names))
    }

    // ---- batch operations (§4.5) ----

    /// Groups requests by the shard that owns each key, fetches every
    /// shard in parallel, and runs the (at most) one lookup per key
    /// sequentially within its shard — there is nothing to parallelize
    /// inside a single shard's own lock.
    pub fn batch_get(&self, requests: &[(String, Item)]) -> Result<Vec<Option<Item>>> {
        if requests.is_empty() || requests.len() > limits::MAX_BATCH_ITEMS {
            return Err(Error::Validation(format!(
                "batch_get accepts between 1 and {} items",
                limits::MAX_BATCH_ITEMS
            )));
        }
        let mut by_shard: Vec<Vec<usize>> = vec![Vec::new(); self.shards.shard_count()];
        for (i, (table, key)) in requests.iter().enumerate() {
            let pk = self.shards.metadata().partition_key_value(table, key)?;
            by_shard[shard_index(&pk, self.shards.shard_count())].push(i);
        }

        let mut results: Vec<Option<Item>> = vec![None; requests.len()];
        std::thread::scope(|scope| -> Result<()> {
            let handles: Vec<_> = by_shard
                .iter()
                .filter(|indices| !indices.is_empty())
                .map(|indices| {
                    scope.spawn(move || -> Result<Vec<(usize, Option<Item>)>> {
                        let mut out = Vec::with_capacity(indices.len());
                        for &i in indices {
                            let (table, key) = &requests[i];
                            let shard = self.shard_for_key(table, key)?;
                            out.push((i, shard.get_item(table, key)?));
                        }
                        Ok(out)
                    })
                })
                .collect();
            for handle in handles {
                for (i, value) in handle.join().unwrap()? {
                    results[i] = value;
                }
            }
            Ok(())
        })?;
        Ok(results)
    }

    /// Same grouping strategy as `batch_get`. Non-transactional: a
    /// failure on one item does not roll back the others, matching
    /// `BatchWriteItem`'s per-item error reporting.
    pub fn batch_write(&self, operations: Vec<BatchWriteOperation>) -> Result<BatchWriteResult> {
        if operations.is_empty() || operations.len() > limits::MAX_BATCH_ITEMS {
            return Err(Error::Validation(format!(
                "batch_write accepts between 1 and {} items",
                limits::MAX_BATCH_ITEMS
            )));
        }
        let keyed: Vec<(String, Item)> = operations
            .iter()
            .map(|op| match op {
                BatchWriteOperation::Put { table, item } => (table.clone(), item.clone()),
                BatchWriteOperation::Delete { table, key } => (table.clone(), key.clone()),
            })
            .collect();

        let mut by_shard: Vec<Vec<usize>> = vec![Vec::new(); self.shards.shard_count()];
        for (i, (table, key)) in keyed.iter().enumerate() {
            let pk = self.shards.metadata().partition_key_value(table, key)?;
            by_shard[shard_index(&pk, self.shards.shard_count())].push(i);
        }

        let mut results: Vec<Option<Error>> = (0..operations.len()).map(|_| None).collect();
        let operations = &operations;
        std::thread::scope(|scope| {
            let handles: Vec<_> = by_shard
                .iter()
                .filter(|indices| !indices.is_empty())
                .map(|indices| {
                    scope.spawn(move || {
                        let mut out = Vec::with_capacity(indices.len());
                        for &i in indices {
                            let outcome = match &operations[i] {
                                BatchWriteOperation::Put { table, item } => validate_no_reserved_names(item)
                                    .map_err(Error::Validation)
                                    .and_then(|()| self.shard_for_key(table, item))
                                    .and_then(|shard| shard.put_item(table, item.clone())),
                                BatchWriteOperation::Delete { table, key } => self
                                    .shard_for_key(table, key)
                                    .and_then(|shard| shard.delete_item(table, key)),
                            };
                            out.push((i, outcome.err()));
                        }
                        out
                    })
                })
                .collect();
            for handle in handles {
                for (i, err) in handle.join().unwrap() {
                    results[i] = err;
                }
            }
        });
        Ok(results)
    }

    // ---- transactions (§4.4) delegate straight to the coordinator ----

    pub fn transact_write(
        &self,
        items: Vec<TransactWriteItem>,
        client_request_token: Option<String>,
    ) -> Result<()> {
        self.coordinator.transact_write(items, client_request_token)
    }

    pub fn transact_get(&self, items: Vec<TransactGetItem>) -> Result<Vec<Option<Item>>> {
        self.coordinator.transact_get(items)
    }
}
