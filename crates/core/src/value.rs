//! The attribute value variant — the one dynamically-typed piece of the
//! data model, kept honest by being a real tagged enum instead of a
//! stringly-typed blob. Numbers are carried as decimal strings so the
//! store never rounds a value it didn't create.

use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::str::FromStr;

/// A single DynamoDB-style attribute value.
///
/// `M` uses a `BTreeMap` rather than an insertion-ordered map: canonical
/// encoding requires sorted keys anyway, and a `BTreeMap` gives that for
/// free everywhere a value is hashed, compared, or persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AttributeValue {
    S(String),
    /// Decimal string, e.g. `"3.14"` or `"-2"`.
    N(String),
    B(Vec<u8>),
    Bool(bool),
    Null,
    L(Vec<AttributeValue>),
    M(BTreeMap<String, AttributeValue>),
    SS(BTreeSet<String>),
    NS(BTreeSet<String>),
    BS(BTreeSet<Vec<u8>>),
}

impl AttributeValue {
    /// The single-letter wire tag DynamoDB JSON uses for this variant.
    pub fn type_tag(&self) -> &'static str {
        match self {
            AttributeValue::S(_) => "S",
            AttributeValue::N(_) => "N",
            AttributeValue::B(_) => "B",
            AttributeValue::Bool(_) => "BOOL",
            AttributeValue::Null => "NULL",
            AttributeValue::L(_) => "L",
            AttributeValue::M(_) => "M",
            AttributeValue::SS(_) => "SS",
            AttributeValue::NS(_) => "NS",
            AttributeValue::BS(_) => "BS",
        }
    }

    /// Deterministic JSON encoding used for key equality, shard hashing,
    /// and persisted storage. Because every nested map is a `BTreeMap`,
    /// `serde_json`'s own key ordering already yields sorted output —
    /// there is no separate canonicalization pass to keep in sync.
    pub fn canonical_encode(&self) -> String {
        serde_json::to_string(self).expect("attribute values are always serializable")
    }

    /// Parses this value as an exact decimal number, if it is one.
    /// Numbers are kept as decimal strings specifically so this parse
    /// never loses precision the way a float would.
    pub fn as_decimal(&self) -> Option<BigDecimal> {
        match self {
            AttributeValue::N(s) => BigDecimal::from_str(s).ok(),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttributeValue::S(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[AttributeValue]> {
        match self {
            AttributeValue::L(items) => Some(items.as_slice()),
            _ => None,
        }
    }

    /// `size(path)` semantics: character count, element count, or set
    /// cardinality. `None` for variants `size` does not apply to.
    pub fn size(&self) -> Option<usize> {
        match self {
            AttributeValue::S(s) => Some(s.chars().count()),
            AttributeValue::B(b) => Some(b.len()),
            AttributeValue::L(items) => Some(items.len()),
            AttributeValue::M(map) => Some(map.len()),
            AttributeValue::SS(set) => Some(set.len()),
            AttributeValue::NS(set) => Some(set.len()),
            AttributeValue::BS(set) => Some(set.len()),
            AttributeValue::Bool(_) | AttributeValue::N(_) | AttributeValue::Null => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, AttributeValue::Null)
    }
}

/// Orders two `N` attribute values exactly. `None` if either fails to
/// parse as a decimal.
pub fn compare_decimal(a: &str, b: &str) -> Option<Ordering> {
    let a = BigDecimal::from_str(a).ok()?;
    let b = BigDecimal::from_str(b).ok()?;
    Some(a.cmp(&b))
}

/// Exact decimal addition for `ADD`/`path + v` update semantics.
pub fn add_decimal(a: &str, b: &str) -> Option<String> {
    let a = BigDecimal::from_str(a).ok()?;
    let b = BigDecimal::from_str(b).ok()?;
    Some((a + b).to_string())
}

/// Exact decimal subtraction for `path - v` update semantics.
pub fn sub_decimal(a: &str, b: &str) -> Option<String> {
    let a = BigDecimal::from_str(a).ok()?;
    let b = BigDecimal::from_str(b).ok()?;
    Some((a - b).to_string())
}
