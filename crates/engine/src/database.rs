//! The top-level handle a caller opens once per process: wires up the
//! sharded store, the transaction ledger, the coordinator, the router,
//! and the idempotency/ledger cleanup background thread, following an
//! open-storage-then-replay-then-return shape.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use dynado_concurrency::{CleanupTask, Coordinator, LedgerEntry, LedgerStore};
use dynado_core::protocol::{BatchWriteOperation, ExpressionContext, TransactGetItem, TransactWriteItem};
use dynado_core::schema::TableSchema;
use dynado_core::{AttributeValue, Item, Result};
use dynado_storage::{ShardedStore, SortKeyQuery};

use crate::config::EngineConfig;
use crate::router::{BatchWriteResult, Page, Router};

/// How often the ledger/idempotency cleanup sweep runs in the
/// background. Independent of the ledger's own 10-minute retention
/// window — this just controls how promptly that window is enforced.
const CLEANUP_INTERVAL: Duration = Duration::from_secs(30);

/// A running database: every table, every shard, one coordinator.
/// Dropping it does not stop the cleanup thread — call
/// [`Database::shutdown`] first for a graceful stop.
pub struct Database {
    router: Router,
    coordinator: Arc<Coordinator>,
    cleanup: Option<CleanupTask>,
}

impl Database {
    /// Opens (or creates) a database at `config.data_dir` with
    /// `config.shard_count` shards, replaying durable state from disk
    /// and starting the background cleanup sweep.
    pub fn open(config: &EngineConfig) -> Result<Self> {
        std::fs::create_dir_all(&config.data_dir)?;

        let shards = Arc::new(ShardedStore::open(config.data_dir.as_str(), config.shard_count)?);
        let ledger = Arc::new(LedgerStore::open(&config.data_dir)?);
        let coordinator = Arc::new(Coordinator::new(Arc::clone(&shards), ledger));
        let router = Router::new(shards, Arc::clone(&coordinator));
        let cleanup = CleanupTask::start(Arc::clone(&coordinator), CLEANUP_INTERVAL);

        tracing::info!(
            data_dir = %config.data_dir,
            shard_count = config.shard_count,
            tables = router.list_tables().len(),
            "database opened"
        );

        Ok(Database {
            router,
            coordinator,
            cleanup: Some(cleanup),
        })
    }

    /// Opens a database directly from a data directory and shard
    /// count, without going through environment variables. Convenient
    /// for tests and embedders that already have their own config.
    pub fn open_at(data_dir: impl AsRef<Path>, shard_count: usize) -> Result<Self> {
        Self::open(&EngineConfig {
            data_dir: data_dir.as_ref().to_string_lossy().into_owned(),
            shard_count,
            ..EngineConfig::default()
        })
    }

    /// Stops the background cleanup thread. Subsequent operations
    /// still work; only the periodic sweep is gone.
    pub fn shutdown(&mut self) {
        if let Some(cleanup) = self.cleanup.take() {
            cleanup.shutdown();
        }
    }

    /// Ledger entries stuck outside a clean terminal state — a
    /// crashed coordinator's leftovers, surfaced for an operator
    /// rather than resolved automatically (§9).
    pub fn stuck_transactions(&self) -> Vec<LedgerEntry> {
        self.coordinator.stuck_transactions()
    }

    // ---- table administration ----

    pub fn create_table(&self, schema: TableSchema) -> Result<()> {
        self.router.create_table(schema)
    }

    pub fn describe_table(&self, name: &str) -> Option<TableSchema> {
        self.router.describe_table(name)
    }

    pub fn list_tables(&self) -> Vec<String> {
        self.router.list_tables()
    }

    pub fn delete_table(&self, name: &str) -> Result<()> {
        self.router.delete_table(name)
    }

    pub fn item_count(&self, table: &str) -> usize {
        self.router.item_count(table)
    }

    // ---- single-item operations ----

    pub fn put_item(&self, table: &str, item: Item) -> Result<()> {
        self.router.put_item(table, item)
    }

    pub fn get_item(&self, table: &str, key: &Item) -> Result<Option<Item>> {
        self.router.get_item(table, key)
    }

    pub fn delete_item(&self, table: &str, key: &Item) -> Result<()> {
        self.router.delete_item(table, key)
    }

    pub fn update_item(
        &self,
        table: &str,
        key: &Item,
        update_expression: &str,
        condition_expression: Option<&str>,
        expression: &ExpressionContext,
    ) -> Result<Item> {
        self.router
            .update_item(table, key, update_expression, condition_expression, expression)
    }

    // ---- scan and query ----

    pub fn scan(&self, table: &str, limit: Option<usize>, exclusive_start_key: Option<&Item>) -> Result<Page> {
        self.router.scan(table, limit, exclusive_start_key)
    }

    #[allow(clippy::too_many_arguments)]
    pub fn query(
        &self,
        table: &str,
        partition_key_value: &AttributeValue,
        condition: Option<&SortKeyQuery>,
        limit: Option<usize>,
        scan_forward: bool,
        exclusive_start_sort_key: Option<&str>,
    ) -> Result<(Vec<Item>, Option<String>)> {
        self.router.query(
            table,
            partition_key_value,
            condition,
            limit,
            scan_forward,
            exclusive_start_sort_key,
        )
    }

    // ---- batch operations ----

    pub fn batch_get(&self, requests: &[(String, Item)]) -> Result<Vec<Option<Item>>> {
        self.router.batch_get(requests)
    }

    pub fn batch_write(&self, operations: Vec<BatchWriteOperation>) -> Result<BatchWriteResult> {
        self.router.batch_write(operations)
    }

    // ---- transactions ----

    pub fn transact_write(
        &self,
        items: Vec<TransactWriteItem>,
        client_request_token: Option<String>,
    ) -> Result<()> {
        self.router.transact_write(items, client_request_token)
    }

    pub fn transact_get(&self, items: Vec<TransactGetItem>) -> Result<Vec<Option<Item>>> {
        self.router.transact_get(items)
    }
}

impl Drop for Database {
    fn drop(&mut self) {
        self.shutdown();
    }
}
