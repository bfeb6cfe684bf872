//! Transaction-id minting (§4.7). Transaction ids only need to be
//! unique across the coordinator's lifetime — `tx_<timestamp>_<random>`
//! suffices, since the timestamp component alone is already unique per
//! [`crate::timestamp::TimestampGenerator`].

/// Mints a transaction id from an already-allocated monotonic timestamp.
pub fn mint_transaction_id(timestamp: u64) -> String {
    let suffix: u64 = rand::random();
    format!("tx_{timestamp}_{suffix:016x}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn ids_minted_from_the_same_timestamp_are_still_unique() {
        let ids: HashSet<String> = (0..1000).map(|_| mint_transaction_id(42)).collect();
        assert_eq!(ids.len(), 1000);
    }

    #[test]
    fn id_carries_the_timestamp_for_traceability() {
        let id = mint_transaction_id(12345);
        assert!(id.starts_with("tx_12345_"));
    }
}
