//! Pure key-extraction helpers shared by the metadata store, shards,
//! the router, and the coordinator. Keeping these as free functions over
//! [`TableSchema`] — rather than methods owned by a stateful store —
//! guarantees every caller that needs a key value agrees with every
//! other one bit-for-bit, per the invariant in §4.2.

use crate::error::{Error, Result};
use crate::item::Item;
use crate::schema::TableSchema;

/// The canonical, shard-routable identity of an item: the partition
/// key's canonical encoding and, if the table has one, the sort key's.
/// `sort_key_value` is the empty string when the table has no sort key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct ItemKey {
    pub partition_key_value: String,
    pub sort_key_value: String,
}

pub fn partition_key_value(schema: &TableSchema, item: &Item) -> Result<String> {
    let value = item.get(schema.partition_key_name()).ok_or_else(|| {
        Error::Validation(format!(
            "item is missing partition key '{}'",
            schema.partition_key_name()
        ))
    })?;
    Ok(value.canonical_encode())
}

pub fn sort_key_value(schema: &TableSchema, item: &Item) -> Result<String> {
    match schema.sort_key_name() {
        None => Ok(String::new()),
        Some(name) => {
            let value = item
                .get(name)
                .ok_or_else(|| Error::Validation(format!("item is missing sort key '{name}'")))?;
            Ok(value.canonical_encode())
        }
    }
}

/// Extracts the minimal key-only item (pk, and sk if present) from a
/// full item.
pub fn extract_key(schema: &TableSchema, item: &Item) -> Result<Item> {
    let mut key = Item::new();
    let pk_name = schema.partition_key_name();
    let pk_value = item
        .get(pk_name)
        .ok_or_else(|| Error::Validation(format!("item is missing partition key '{pk_name}'")))?;
    key.insert(pk_name.to_string(), pk_value.clone());
    if let Some(sk_name) = schema.sort_key_name() {
        let sk_value = item
            .get(sk_name)
            .ok_or_else(|| Error::Validation(format!("item is missing sort key '{sk_name}'")))?;
        key.insert(sk_name.to_string(), sk_value.clone());
    }
    Ok(key)
}

pub fn extract_key_values(schema: &TableSchema, item: &Item) -> Result<ItemKey> {
    Ok(ItemKey {
        partition_key_value: partition_key_value(schema, item)?,
        sort_key_value: sort_key_value(schema, item)?,
    })
}

/// Same as [`extract_key_values`] but the input is already a key-only
/// item (e.g. from a `GetItem` request that never carried a full body).
pub fn extract_key_values_from_key(schema: &TableSchema, key: &Item) -> Result<ItemKey> {
    extract_key_values(schema, key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{AttributeDefinition, ScalarType};
    use crate::value::AttributeValue;

    fn schema() -> TableSchema {
        TableSchema::new(
            "orders",
            AttributeDefinition {
                name: "userId".into(),
                scalar_type: ScalarType::S,
            },
            Some(AttributeDefinition {
                name: "ts".into(),
                scalar_type: ScalarType::N,
            }),
        )
        .unwrap()
    }

    fn schema_no_sort_key() -> TableSchema {
        TableSchema::new(
            "users",
            AttributeDefinition {
                name: "id".into(),
                scalar_type: ScalarType::S,
            },
            None,
        )
        .unwrap()
    }

    #[test]
    fn sort_key_value_is_empty_string_without_a_sort_key() {
        let schema = schema_no_sort_key();
        let mut item = Item::new();
        item.insert("id".to_string(), AttributeValue::S("a".into()));
        assert_eq!(sort_key_value(&schema, &item).unwrap(), "");
    }

    #[test]
    fn extract_key_values_is_bit_exact_across_callers() {
        let schema = schema();
        let mut item = Item::new();
        item.insert("userId".to_string(), AttributeValue::S("u1".into()));
        item.insert("ts".to_string(), AttributeValue::N("100".into()));
        item.insert("payload".to_string(), AttributeValue::S("ignored".into()));

        let from_full = extract_key_values(&schema, &item).unwrap();
        let key_only = extract_key(&schema, &item).unwrap();
        let from_key = extract_key_values_from_key(&schema, &key_only).unwrap();
        assert_eq!(from_full, from_key);
    }

    #[test]
    fn missing_partition_key_is_a_validation_error() {
        let schema = schema();
        let item = Item::new();
        assert!(partition_key_value(&schema, &item).unwrap_err().is_validation());
    }
}
