//! The single authoritative copy of table definitions (§4.2). The
//! in-memory map is rebuilt from the durable `metadata` file on
//! start, a registry-from-durable-storage pattern.

use std::collections::BTreeMap;
use std::path::Path;

use dynado_core::key;
use dynado_core::schema::TableSchema;
use dynado_core::{Error, Item, ItemKey, Result};
use dynado_durability::DurableFile;
use parking_lot::RwLock;

/// Table schemas, kept in a `RwLock<BTreeMap<..>>` rather than a
/// `DashMap` — table definitions change rarely (create/delete) and are
/// read constantly by every shard operation, so a reader-preferring
/// lock fits better than per-entry sharding.
pub struct MetadataStore {
    file: DurableFile<BTreeMap<String, TableSchema>>,
    tables: RwLock<BTreeMap<String, TableSchema>>,
}

impl MetadataStore {
    pub fn open(data_dir: impl AsRef<Path>) -> Result<Self> {
        let file = DurableFile::new(data_dir.as_ref().join("metadata"));
        let tables = file
            .load()
            .map_err(|e| Error::Io(std::io::Error::new(std::io::ErrorKind::Other, e)))?
            .unwrap_or_default();
        Ok(MetadataStore {
            file,
            tables: RwLock::new(tables),
        })
    }

    pub fn create_table(&self, schema: TableSchema) -> Result<()> {
        let mut tables = self.tables.write();
        if tables.contains_key(&schema.name) {
            return Err(Error::Validation(format!(
                "table '{}' already exists",
                schema.name
            )));
        }
        tracing::debug!(table = %schema.name, "creating table");
        tables.insert(schema.name.clone(), schema);
        self.persist(&tables)
    }

    pub fn describe_table(&self, name: &str) -> Option<TableSchema> {
        self.tables.read().get(name).cloned()
    }

    pub fn list_tables(&self) -> Vec<String> {
        self.tables.read().keys().cloned().collect()
    }

    pub fn delete_table(&self, name: &str) -> Result<()> {
        let mut tables = self.tables.write();
        if tables.remove(name).is_none() {
            return Err(Error::ResourceNotFound(format!("table '{name}' not found")));
        }
        tracing::debug!(table = name, "deleted table");
        self.persist(&tables)
    }

    fn persist(&self, tables: &BTreeMap<String, TableSchema>) -> Result<()> {
        self.file
            .save(tables)
            .map_err(|e| Error::Io(std::io::Error::new(std::io::ErrorKind::Other, e)))
    }

    fn schema_of(&self, table: &str) -> Result<TableSchema> {
        self.describe_table(table)
            .ok_or_else(|| Error::ResourceNotFound(format!("table '{table}' not found")))
    }

    pub fn partition_key_name(&self, table: &str) -> Result<String> {
        Ok(self.schema_of(table)?.partition_key_name().to_string())
    }

    pub fn sort_key_name(&self, table: &str) -> Result<Option<String>> {
        Ok(self.schema_of(table)?.sort_key_name().map(String::from))
    }

    pub fn extract_key(&self, table: &str, item: &Item) -> Result<Item> {
        key::extract_key(&self.schema_of(table)?, item)
    }

    pub fn partition_key_value(&self, table: &str, item: &Item) -> Result<String> {
        key::partition_key_value(&self.schema_of(table)?, item)
    }

    pub fn sort_key_value(&self, table: &str, item: &Item) -> Result<String> {
        key::sort_key_value(&self.schema_of(table)?, item)
    }

    pub fn extract_key_values(&self, table: &str, item: &Item) -> Result<ItemKey> {
        key::extract_key_values(&self.schema_of(table)?, item)
    }

    pub fn extract_key_values_from_key(&self, table: &str, key_item: &Item) -> Result<ItemKey> {
        key::extract_key_values_from_key(&self.schema_of(table)?, key_item)
    }

    pub fn validate_item(&self, table: &str, item: &Item) -> Result<()> {
        self.schema_of(table)?.validate_item(item)
    }
}
