//! The 2PC driver (§4.4): transaction lifecycle, prepare/commit/release
//! fan-out across shards, idempotency, and ledger bookkeeping. Follows
//! a validate → allocate → durable write → apply staging, generalized
//! here from a single storage target to many shards prepared and
//! committed in parallel.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use parking_lot::Mutex;

use dynado_core::limits::MAX_TRANSACTION_ITEMS;
use dynado_core::protocol::{
    CommitRequest, PrepareOutcome, PrepareRequest, ReleaseRequest, TransactGetItem,
    TransactWriteItem,
};
use dynado_core::txn_id::mint_transaction_id;
use dynado_core::{Error, Item, Result, TimestampGenerator};
use dynado_expr::{apply_projection, Parser};
use dynado_storage::ShardedStore;

use crate::hash::shard_index;
use crate::ledger::{now_nanos, IdempotencyEntry, IdempotentOutcome, LedgerEntry, LedgerState, LedgerStore};

/// How many times the coordinator mints a fresh timestamp and retries
/// an entire transaction after a `TimestampConflict` at prepare. Stale
/// timestamps are an internal-only condition (§7); unlike the other
/// prepare failures they never reach the caller as a cancellation.
const MAX_TIMESTAMP_RETRIES: usize = 5;

#[derive(Debug, Clone, Copy)]
struct RetryPolicy {
    initial: Duration,
    max: Duration,
    max_attempts: usize,
}

impl Default for RetryPolicy {
    /// §4.4: 100 ms initial backoff, doubling to a 5 s cap, 10 attempts.
    fn default() -> Self {
        RetryPolicy {
            initial: Duration::from_millis(100),
            max: Duration::from_secs(5),
            max_attempts: 10,
        }
    }
}

/// Owns the transaction ledger and drives 2PC for writes; performs
/// parallel single-shard reads for transactional gets. No other
/// component reads or writes the ledger (§3's ownership rule).
pub struct Coordinator {
    shards: Arc<ShardedStore>,
    ledger: Arc<LedgerStore>,
    timestamps: TimestampGenerator,
    idempotency: Mutex<HashMap<String, IdempotencyEntry>>,
    commit_retry: RetryPolicy,
}

impl Coordinator {
    pub fn new(shards: Arc<ShardedStore>, ledger: Arc<LedgerStore>) -> Self {
        Coordinator {
            shards,
            ledger,
            timestamps: TimestampGenerator::new(),
            idempotency: Mutex::new(HashMap::new()),
            commit_retry: RetryPolicy::default(),
        }
    }

    /// Entries that never reached a clean terminal state (§9's recovery
    /// path). Surfaced for an operator-driven recovery agent; this
    /// implementation does not attempt automated recovery itself.
    pub fn stuck_transactions(&self) -> Vec<LedgerEntry> {
        self.ledger.stuck_entries()
    }

    fn shard_for(&self, table: &str, key: &Item) -> Result<Arc<dynado_storage::ShardTable>> {
        let pk = self.shards.metadata().partition_key_value(table, key)?;
        let index = shard_index(&pk, self.shards.shard_count());
        self.shards
            .shard(index)
            .ok_or_else(|| Error::Internal(format!("shard {index} missing from the sharded store")))
    }

    /// §4.4: validate, mint a transaction, prepare every item's shard in
    /// parallel, then commit in parallel. A `TimestampConflict` at
    /// prepare is retried internally with a fresh timestamp; any other
    /// prepare failure cancels the whole transaction.
    pub fn transact_write(
        &self,
        items: Vec<TransactWriteItem>,
        client_request_token: Option<String>,
    ) -> Result<()> {
        if items.is_empty() {
            return Err(Error::Validation("transact_write requires at least one item".into()));
        }
        if items.len() > MAX_TRANSACTION_ITEMS {
            return Err(Error::Validation(format!(
                "transact_write accepts at most {MAX_TRANSACTION_ITEMS} items"
            )));
        }
        for item in &items {
            if let Some(body) = &item.item {
                dynado_core::item::validate_no_reserved_names(body).map_err(Error::Validation)?;
            }
        }

        if let Some(token) = &client_request_token {
            if let Some(cached) = self.check_idempotency(token) {
                return cached;
            }
        }

        let original_items: Vec<Item> = items
            .iter()
            .map(|i| i.item.clone().unwrap_or_else(|| i.key.clone()))
            .collect();

        for attempt in 1..=MAX_TIMESTAMP_RETRIES {
            let timestamp = self.timestamps.next();
            let transaction_id = mint_transaction_id(timestamp);
            self.ledger.insert(LedgerEntry::new(
                transaction_id.clone(),
                timestamp,
                client_request_token.clone(),
                original_items.clone(),
            ))?;

            let prepared = self.prepare_all(&items, &transaction_id, timestamp)?;

            if prepared.iter().any(|(_, outcome)| {
                matches!(outcome, Ok(PrepareOutcome::TimestampConflict))
            }) {
                self.release_all(&items, &transaction_id);
                self.ledger.complete(&transaction_id, LedgerState::Cancelled, None)?;
                if attempt == MAX_TIMESTAMP_RETRIES {
                    return Err(Error::Internal(
                        "exhausted timestamp-conflict retries during prepare".to_string(),
                    ));
                }
                continue;
            }

            if let Some(reasons) = cancellation_reasons(&prepared, &items) {
                self.release_all(&items, &transaction_id);
                self.ledger
                    .complete(&transaction_id, LedgerState::Cancelled, Some(reasons.clone()))?;
                if let Some(token) = &client_request_token {
                    self.cache_outcome(token, IdempotentOutcome::Cancelled(reasons.clone()));
                }
                return Err(Error::TransactionCancelled(reasons));
            }

            self.ledger.set_committing(&transaction_id)?;
            match self.commit_all(&items, &transaction_id, timestamp) {
                Ok(()) => {
                    self.ledger.complete(&transaction_id, LedgerState::Committed, None)?;
                    if let Some(token) = &client_request_token {
                        self.cache_outcome(token, IdempotentOutcome::Committed);
                    }
                    return Ok(());
                }
                Err(e) => {
                    self.ledger
                        .complete(&transaction_id, LedgerState::CommittingFailed, None)?;
                    return Err(e);
                }
            }
        }
        unreachable!("loop always returns within MAX_TIMESTAMP_RETRIES attempts")
    }

    /// §4.4: parallel single-shard reads, no snapshot isolation across
    /// shards. Missing items come back as `None` in input order.
    pub fn transact_get(&self, items: Vec<TransactGetItem>) -> Result<Vec<Option<Item>>> {
        if items.is_empty() {
            return Err(Error::Validation("transact_get requires at least one item".into()));
        }
        if items.len() > MAX_TRANSACTION_ITEMS {
            return Err(Error::Validation(format!(
                "transact_get accepts at most {MAX_TRANSACTION_ITEMS} items"
            )));
        }

        thread::scope(|scope| {
            let handles: Vec<_> = items
                .iter()
                .map(|item| scope.spawn(move || self.fetch_one(item)))
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        })
    }

    fn fetch_one(&self, item: &TransactGetItem) -> Result<Option<Item>> {
        let shard = self.shard_for(&item.table, &item.key)?;
        let fetched = shard.get_item(&item.table, &item.key)?;
        Ok(match (fetched, &item.projection_expression) {
            (Some(found), Some(projection)) => {
                let node = Parser::parse_projection(projection)
                    .map_err(|e| Error::Validation(format!("malformed projection expression: {e}")))?;
                Some(apply_projection(&node, &found, &item.expression.attribute_names))
            }
            (found, _) => found,
        })
    }

    fn prepare_all(
        &self,
        items: &[TransactWriteItem],
        transaction_id: &str,
        timestamp: u64,
    ) -> Result<Vec<(usize, Result<PrepareOutcome>)>> {
        let requests: Vec<PrepareRequest> = items
            .iter()
            .map(|item| PrepareRequest {
                transaction_id: transaction_id.to_string(),
                timestamp,
                table: item.table.clone(),
                key: item.key.clone(),
                operation: item.operation,
                item: item.item.clone(),
                update_expression: item.update_expression.clone(),
                condition_expression: item.condition_expression.clone(),
                expression: item.expression.clone(),
                return_values_on_condition_check_failure: item.return_values_on_condition_check_failure,
            })
            .collect();

        thread::scope(|scope| {
            let handles: Vec<_> = requests
                .iter()
                .enumerate()
                .map(|(index, req)| {
                    scope.spawn(move || {
                        let outcome = self
                            .shard_for(&req.table, &req.key)
                            .and_then(|shard| shard.prepare(req));
                        (index, outcome)
                    })
                })
                .collect();
            Ok(handles.into_iter().map(|h| h.join().unwrap()).collect())
        })
    }

    fn commit_all(&self, items: &[TransactWriteItem], transaction_id: &str, timestamp: u64) -> Result<()> {
        let requests: Vec<CommitRequest> = items
            .iter()
            .map(|item| CommitRequest {
                transaction_id: transaction_id.to_string(),
                timestamp,
                table: item.table.clone(),
                key: item.key.clone(),
                operation: item.operation,
                item: item.item.clone(),
                update_expression: item.update_expression.clone(),
                expression: item.expression.clone(),
            })
            .collect();

        thread::scope(|scope| {
            let handles: Vec<_> = requests
                .iter()
                .map(|req| {
                    scope.spawn(move || {
                        let shard = self.shard_for(&req.table, &req.key)?;
                        self.commit_with_retry(&shard, req)
                    })
                })
                .collect();
            for handle in handles {
                handle.join().unwrap()?;
            }
            Ok(())
        })
    }

    fn commit_with_retry(&self, shard: &dynado_storage::ShardTable, req: &CommitRequest) -> Result<()> {
        let mut delay = self.commit_retry.initial;
        for attempt in 1..=self.commit_retry.max_attempts {
            match shard.commit(req) {
                Ok(()) => return Ok(()),
                Err(e) if attempt < self.commit_retry.max_attempts => {
                    tracing::warn!(
                        txn = %req.transaction_id,
                        table = %req.table,
                        attempt,
                        error = %e,
                        "commit attempt failed, retrying"
                    );
                    thread::sleep(delay);
                    delay = (delay * 2).min(self.commit_retry.max);
                }
                Err(e) => {
                    tracing::error!(
                        txn = %req.transaction_id,
                        table = %req.table,
                        "commit retries exhausted; transaction moved to COMMITTING_FAILED"
                    );
                    return Err(e);
                }
            }
        }
        unreachable!("loop always returns within max_attempts")
    }

    fn release_all(&self, items: &[TransactWriteItem], transaction_id: &str) {
        thread::scope(|scope| {
            for item in items {
                let transaction_id = transaction_id.to_string();
                scope.spawn(move || {
                    if let Ok(shard) = self.shard_for(&item.table, &item.key) {
                        if let Err(e) = shard.release(&ReleaseRequest {
                            transaction_id,
                            table: item.table.clone(),
                            key: item.key.clone(),
                        }) {
                            tracing::warn!(table = %item.table, error = %e, "best-effort release failed");
                        }
                    }
                });
            }
        });
    }

    fn check_idempotency(&self, token: &str) -> Option<Result<()>> {
        let now = now_nanos();
        let mut cache = self.idempotency.lock();
        match cache.get(token) {
            Some(entry) if !entry.is_expired(now) => Some(match &entry.outcome {
                IdempotentOutcome::Committed => Ok(()),
                IdempotentOutcome::Cancelled(reasons) => Err(Error::TransactionCancelled(reasons.clone())),
            }),
            Some(_) => {
                cache.remove(token);
                None
            }
            None => None,
        }
    }

    fn cache_outcome(&self, token: &str, outcome: IdempotentOutcome) {
        self.idempotency.lock().insert(
            token.to_string(),
            IdempotencyEntry {
                completed_at: now_nanos(),
                outcome,
            },
        );
    }

    /// One pass of the periodic sweep (§4.4): drops expired ledger rows
    /// and idempotency entries. Called by [`CleanupTask`] once a minute;
    /// exposed standalone so callers can drive it synchronously in tests.
    pub fn run_cleanup_once(&self) -> Result<()> {
        self.ledger.sweep_expired()?;
        let now = now_nanos();
        self.idempotency.lock().retain(|_, entry| !entry.is_expired(now));
        Ok(())
    }
}

fn cancellation_reasons(
    prepared: &[(usize, Result<PrepareOutcome>)],
    items: &[TransactWriteItem],
) -> Option<Vec<dynado_core::protocol::CancellationReason>> {
    use dynado_core::protocol::CancellationReason;

    if prepared
        .iter()
        .all(|(_, outcome)| matches!(outcome, Ok(PrepareOutcome::Accepted { .. })))
    {
        return None;
    }

    let mut by_index: HashMap<usize, Result<PrepareOutcome>> = HashMap::new();
    for (index, outcome) in prepared {
        by_index.insert(*index, clone_result(outcome));
    }

    let reasons = (0..items.len())
        .map(|index| match by_index.remove(&index) {
            Some(Ok(PrepareOutcome::Accepted { .. })) | None => CancellationReason::none(),
            Some(Ok(PrepareOutcome::ConditionalCheckFailed { item })) => {
                CancellationReason::conditional_check_failed(item)
            }
            Some(Ok(PrepareOutcome::TransactionConflict)) => {
                CancellationReason::transaction_conflict("item is locked by another transaction")
            }
            Some(Ok(PrepareOutcome::TimestampConflict)) => {
                CancellationReason::validation_error("stale timestamp at prepare")
            }
            Some(Err(e)) => CancellationReason::validation_error(e.to_string()),
        })
        .collect();
    Some(reasons)
}

fn clone_result(outcome: &Result<PrepareOutcome>) -> Result<PrepareOutcome> {
    match outcome {
        Ok(o) => Ok(o.clone()),
        Err(e) => Err(clone_error(e)),
    }
}

fn clone_error(e: &Error) -> Error {
    match e {
        Error::Validation(m) => Error::Validation(m.clone()),
        Error::ResourceNotFound(m) => Error::ResourceNotFound(m.clone()),
        Error::ConditionalCheckFailed { item } => Error::ConditionalCheckFailed { item: item.clone() },
        Error::TransactionCancelled(r) => Error::TransactionCancelled(r.clone()),
        Error::TransactionConflict(m) => Error::TransactionConflict(m.clone()),
        Error::TimestampConflict(m) => Error::TimestampConflict(m.clone()),
        Error::Internal(m) => Error::Internal(m.clone()),
        Error::Io(io) => Error::Internal(format!("io error: {io}")),
        Error::Serialization(m) => Error::Serialization(m.clone()),
    }
}

/// A lightweight, cancellable background task running the coordinator's
/// periodic sweep once a minute. An atomic shutdown flag, polled in short
/// slices so shutdown is prompt rather than waiting out the full
/// interval).
pub struct CleanupTask {
    shutdown: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl CleanupTask {
    pub fn start(coordinator: Arc<Coordinator>, interval: Duration) -> Self {
        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_flag = Arc::clone(&shutdown);
        let handle = thread::spawn(move || {
            let poll = Duration::from_millis(100).min(interval);
            while !shutdown_flag.load(Ordering::Relaxed) {
                let mut elapsed = Duration::ZERO;
                while elapsed < interval {
                    if shutdown_flag.load(Ordering::Relaxed) {
                        return;
                    }
                    thread::sleep(poll);
                    elapsed += poll;
                }
                if let Err(e) = coordinator.run_cleanup_once() {
                    tracing::warn!(error = %e, "ledger/idempotency cleanup sweep failed");
                }
            }
        });
        CleanupTask {
            shutdown,
            handle: Some(handle),
        }
    }

    pub fn shutdown(mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}
