//! Durable storage: table metadata and the per-shard item tables
//! (§4.2, §4.3). Shards are owned by [`ShardedStore`] in a
//! `dashmap::DashMap`, so each independent partition can be looked up
//! without contending on a single lock.

pub mod metadata;
pub mod shard;

pub use metadata::MetadataStore;
pub use shard::{ShardTable, SortKeyQuery};

use std::path::{Path, PathBuf};
use std::sync::Arc;

use dashmap::DashMap;
use dynado_core::{Error, Result};
use dynado_durability::DurableFile;

/// The full set of shards for one data directory, plus the shared
/// metadata store they all read.
pub struct ShardedStore {
    data_dir: PathBuf,
    metadata: Arc<MetadataStore>,
    shards: DashMap<usize, Arc<ShardTable>>,
    shard_count: usize,
}

impl ShardedStore {
    /// Opens (or initializes) the sharded store at `data_dir`. The
    /// shard count is pinned to whatever a prior run recorded there —
    /// changing it would silently re-route every key to a different
    /// shard than the one its data actually lives on (§6), so a
    /// mismatch is a hard error rather than something to reconcile.
    pub fn open(data_dir: impl Into<PathBuf>, shard_count: usize) -> Result<Self> {
        let data_dir = data_dir.into();
        let marker: DurableFile<usize> = DurableFile::new(data_dir.join("shard_count"));
        match marker
            .load()
            .map_err(|e| Error::Io(std::io::Error::new(std::io::ErrorKind::Other, e)))?
        {
            Some(recorded) if recorded != shard_count => {
                return Err(Error::Internal(format!(
                    "data directory was initialized with {recorded} shards; refusing to open it with {shard_count}"
                )));
            }
            Some(_) => {}
            None => marker
                .save(&shard_count)
                .map_err(|e| Error::Io(std::io::Error::new(std::io::ErrorKind::Other, e)))?,
        }

        let metadata = Arc::new(MetadataStore::open(&data_dir)?);
        let shards = DashMap::with_capacity(shard_count);
        for index in 0..shard_count {
            let shard = ShardTable::open(&data_dir, index, Arc::clone(&metadata))?;
            shards.insert(index, Arc::new(shard));
        }
        Ok(ShardedStore {
            data_dir,
            metadata,
            shards,
            shard_count,
        })
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn metadata(&self) -> &Arc<MetadataStore> {
        &self.metadata
    }

    pub fn shard_count(&self) -> usize {
        self.shard_count
    }

    pub fn shard(&self, index: usize) -> Option<Arc<ShardTable>> {
        self.shards.get(&index).map(|entry| Arc::clone(entry.value()))
    }

    pub fn all_shards(&self) -> Vec<Arc<ShardTable>> {
        (0..self.shard_count)
            .filter_map(|i| self.shard(i))
            .collect()
    }
}
