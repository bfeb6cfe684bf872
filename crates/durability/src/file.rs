//! A single crash-safe durable record: write-temp, fsync, atomic
//! rename, fsync the containing directory. Simplified to one
//! whole-file value per record (no multi-section layout; this system
//! needs one durable blob per shard, one for metadata, one for the
//! coordinator ledger, not an append-only log of sections).

use std::fs::{self, File, OpenOptions};
use std::io::{Read, Write};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{Error, Result};

const MAGIC: &[u8; 4] = b"DYNF";
const FORMAT_VERSION: u8 = 1;

/// A durable file holding exactly one serialized value of type `T`.
/// `load` returns `Ok(None)` when the file does not exist yet (first
/// boot against a fresh data directory); any other read failure,
/// including a checksum mismatch, is a hard error.
pub struct DurableFile<T> {
    path: PathBuf,
    _marker: PhantomData<T>,
}

impl<T> DurableFile<T>
where
    T: Serialize + DeserializeOwned,
{
    pub fn new(path: impl Into<PathBuf>) -> Self {
        DurableFile {
            path: path.into(),
            _marker: PhantomData,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Result<Option<T>> {
        let mut file = match File::open(&self.path) {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(Error::Io(e)),
        };

        let mut bytes = Vec::new();
        file.read_to_end(&mut bytes)?;

        let display = self.path.display().to_string();
        if bytes.len() < MAGIC.len() + 1 + 4 {
            return Err(Error::Corrupt {
                path: display,
                reason: "file shorter than the header+footer".to_string(),
            });
        }
        let (magic, rest) = bytes.split_at(MAGIC.len());
        if magic != MAGIC {
            return Err(Error::Corrupt {
                path: display,
                reason: "bad magic bytes".to_string(),
            });
        }
        let (version, rest) = rest.split_at(1);
        if version[0] != FORMAT_VERSION {
            return Err(Error::Corrupt {
                path: display,
                reason: format!("unsupported format version {}", version[0]),
            });
        }
        let (payload, footer) = rest.split_at(rest.len() - 4);
        let stored_crc = u32::from_le_bytes(footer.try_into().expect("footer is 4 bytes"));
        let actual_crc = crc32fast::hash(payload);
        if stored_crc != actual_crc {
            return Err(Error::Corrupt {
                path: display,
                reason: "CRC32 checksum mismatch".to_string(),
            });
        }

        let value = bincode::deserialize(payload)?;
        Ok(Some(value))
    }

    /// Persists `value`, replacing the prior contents (if any). Crash
    /// safe: a power loss midway either leaves the previous file
    /// intact or leaves an orphaned `.tmp` file, never a half-written
    /// target.
    pub fn save(&self, value: &T) -> Result<()> {
        let payload = bincode::serialize(value)?;
        let crc = crc32fast::hash(&payload);

        let mut buffer = Vec::with_capacity(MAGIC.len() + 1 + payload.len() + 4);
        buffer.extend_from_slice(MAGIC);
        buffer.push(FORMAT_VERSION);
        buffer.extend_from_slice(&payload);
        buffer.extend_from_slice(&crc.to_le_bytes());

        let dir = self.path.parent().unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(dir)?;
        let tmp_path = dir.join(format!(
            ".{}.tmp",
            self.path.file_name().and_then(|n| n.to_str()).unwrap_or("durable")
        ));

        {
            let mut tmp = OpenOptions::new()
                .create(true)
                .write(true)
                .truncate(true)
                .open(&tmp_path)?;
            tmp.write_all(&buffer)?;
            tmp.sync_all()?;
        }

        fs::rename(&tmp_path, &self.path)?;
        sync_dir(dir)?;

        tracing::debug!(path = %self.path.display(), bytes = buffer.len(), "wrote durable file");
        Ok(())
    }
}

#[cfg(unix)]
fn sync_dir(dir: &Path) -> Result<()> {
    let dir_file = File::open(dir)?;
    dir_file.sync_all()?;
    Ok(())
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) -> Result<()> {
    Ok(())
}
