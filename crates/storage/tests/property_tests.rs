//! Property-based round-trip test for a single shard's non-transactional
//! put/get path: whatever item goes in for a given key comes back
//! unchanged, for any partition key and numeric attribute a caller
//! can construct.

use std::collections::BTreeMap;
use std::sync::Arc;

use dynado_core::{AttributeDefinition, AttributeValue, ScalarType, TableSchema};
use dynado_storage::{MetadataStore, ShardTable};
use proptest::prelude::*;

proptest! {
    #[test]
    fn put_then_get_returns_the_same_item(
        pk in "[a-z]{1,12}",
        score in -1_000_000i64..1_000_000,
    ) {
        let dir = tempfile::tempdir().unwrap();
        let metadata = Arc::new(MetadataStore::open(dir.path()).unwrap());
        metadata
            .create_table(
                TableSchema::new(
                    "widgets",
                    AttributeDefinition { name: "pk".into(), scalar_type: ScalarType::S },
                    None,
                )
                .unwrap(),
            )
            .unwrap();
        let shard = ShardTable::open(dir.path(), 0, Arc::clone(&metadata)).unwrap();

        let mut item = BTreeMap::new();
        item.insert("pk".to_string(), AttributeValue::S(pk.clone()));
        item.insert("score".to_string(), AttributeValue::N(score.to_string()));
        shard.put_item("widgets", item.clone()).unwrap();

        let mut key = BTreeMap::new();
        key.insert("pk".to_string(), AttributeValue::S(pk));
        let fetched = shard.get_item("widgets", &key).unwrap();
        prop_assert_eq!(fetched, Some(item));
    }
}
