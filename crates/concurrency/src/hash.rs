//! The single hash function that decides which shard owns a
//! partition key (§4.6). Router and coordinator must call exactly
//! this function — a future swap to a stronger hash has to change
//! both sites together.

/// `h = (h << 5) - h + byte`, modulo 2^32, over the UTF-8 bytes of the
/// canonical partition-key encoding.
pub fn fold_hash(bytes: &[u8]) -> u32 {
    let mut h: u32 = 0;
    for &byte in bytes {
        h = h
            .wrapping_shl(5)
            .wrapping_sub(h)
            .wrapping_add(byte as u32);
    }
    h
}

/// Maps a partition key's canonical encoding to a shard index in
/// `[0, shard_count)`. `shard_count` must be non-zero.
pub fn shard_index(partition_key_encoding: &str, shard_count: usize) -> usize {
    debug_assert!(shard_count > 0, "shard_count must be non-zero");
    let hash = fold_hash(partition_key_encoding.as_bytes());
    (hash as usize) % shard_count
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_input_always_hashes_to_the_same_shard() {
        let encoding = "{\"S\":\"user-42\"}";
        let first = shard_index(encoding, 8);
        for _ in 0..100 {
            assert_eq!(shard_index(encoding, 8), first);
        }
    }

    #[test]
    fn result_is_always_in_range() {
        for i in 0..1000 {
            let encoding = format!("{{\"S\":\"key-{i}\"}}");
            assert!(shard_index(&encoding, 7) < 7);
        }
    }

    #[test]
    fn distributes_across_shards() {
        use std::collections::HashSet;
        let mut seen = HashSet::new();
        for i in 0..200 {
            let encoding = format!("{{\"S\":\"key-{i}\"}}");
            seen.insert(shard_index(&encoding, 8));
        }
        assert!(seen.len() > 1, "fold hash should not collapse onto one shard");
    }
}
