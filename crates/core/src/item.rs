//! The item model: an ordered mapping from attribute name to
//! [`AttributeValue`]. Kept as a `BTreeMap` for the same reason `M`
//! uses one — sorted iteration order is exactly the canonical encoding
//! this store needs for keys, and it's deterministic for free.

use crate::value::AttributeValue;
use std::collections::BTreeMap;

pub type Item = BTreeMap<String, AttributeValue>;

/// Attribute names beginning with `_` are reserved for internal
/// metadata and must never appear in a user-supplied item.
pub fn is_reserved_name(name: &str) -> bool {
    name.starts_with('_')
}

/// Rejects an item that uses a reserved attribute name.
pub fn validate_no_reserved_names(item: &Item) -> Result<(), String> {
    if let Some(name) = item.keys().find(|n| is_reserved_name(n)) {
        return Err(format!("attribute name '{name}' is reserved"));
    }
    Ok(())
}
