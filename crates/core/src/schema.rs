//! Table schemas: a name, a one- or two-attribute key schema, and the
//! scalar types of those key attributes.

use crate::error::{Error, Result};
use crate::item::Item;
use crate::value::AttributeValue;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScalarType {
    S,
    N,
    B,
}

impl ScalarType {
    /// Whether `value` is a concrete, non-null instance of this scalar.
    pub fn matches(&self, value: &AttributeValue) -> bool {
        matches!(
            (self, value),
            (ScalarType::S, AttributeValue::S(_))
                | (ScalarType::N, AttributeValue::N(_))
                | (ScalarType::B, AttributeValue::B(_))
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttributeDefinition {
    pub name: String,
    pub scalar_type: ScalarType,
}

/// A table's key schema: a mandatory `HASH` (partition) key and an
/// optional `RANGE` (sort) key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableSchema {
    pub name: String,
    pub partition_key: AttributeDefinition,
    pub sort_key: Option<AttributeDefinition>,
}

impl TableSchema {
    pub fn new(
        name: impl Into<String>,
        partition_key: AttributeDefinition,
        sort_key: Option<AttributeDefinition>,
    ) -> Result<Self> {
        let name = name.into();
        if name.is_empty() {
            return Err(Error::Validation("table name must not be empty".into()));
        }
        if let Some(sk) = &sort_key {
            if sk.name == partition_key.name {
                return Err(Error::Validation(
                    "partition key and sort key must be different attributes".into(),
                ));
            }
        }
        Ok(TableSchema {
            name,
            partition_key,
            sort_key,
        })
    }

    pub fn partition_key_name(&self) -> &str {
        &self.partition_key.name
    }

    pub fn sort_key_name(&self) -> Option<&str> {
        self.sort_key.as_ref().map(|k| k.name.as_str())
    }

    pub fn has_sort_key(&self) -> bool {
        self.sort_key.is_some()
    }

    /// Checks the invariant from §3: every item stored in this table
    /// must carry non-null values of the right scalar type for each
    /// key-schema attribute.
    pub fn validate_item(&self, item: &Item) -> Result<()> {
        self.check_key_attribute(item, &self.partition_key)?;
        if let Some(sk) = &self.sort_key {
            self.check_key_attribute(item, sk)?;
        }
        Ok(())
    }

    fn check_key_attribute(&self, item: &Item, def: &AttributeDefinition) -> Result<()> {
        match item.get(&def.name) {
            Some(value) if def.scalar_type.matches(value) => Ok(()),
            Some(_) => Err(Error::Validation(format!(
                "attribute '{}' does not match key schema type {:?}",
                def.name, def.scalar_type
            ))),
            None => Err(Error::Validation(format!(
                "item is missing key attribute '{}'",
                def.name
            ))),
        }
    }
}
