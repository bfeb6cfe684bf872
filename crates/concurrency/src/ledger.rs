//! The coordinator's transaction ledger and idempotency cache (§3,
//! §4.4). Exclusively owned by the coordinator — no other component
//! reads or writes it.

use std::collections::HashMap;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use dynado_core::protocol::CancellationReason;
use dynado_core::{Error, Item, Result};
use dynado_durability::DurableFile;

/// Ten minutes, in nanoseconds, matching the unit `TimestampGenerator`
/// and wall-clock reads use throughout this crate.
pub const IDEMPOTENCY_TTL_NANOS: u64 = 10 * 60 * 1_000_000_000;

/// Same window for ledger-entry retention (§4.4's cleanup sweep).
pub const LEDGER_RETENTION_NANOS: u64 = 10 * 60 * 1_000_000_000;

pub fn now_nanos() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock is before the unix epoch")
        .as_nanos() as u64
}

/// A ledger entry transitions forward only, never backward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LedgerState {
    Preparing,
    Committing,
    Committed,
    Cancelled,
    /// Terminal state after commit retries are exhausted (§4.4, §9).
    CommittingFailed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub transaction_id: String,
    pub state: LedgerState,
    pub timestamp: u64,
    pub client_request_token: Option<String>,
    /// The original item bodies this transaction attempted to write,
    /// kept for diagnostics and for a future recovery agent.
    pub original_items: Vec<Item>,
    pub create_time: u64,
    pub complete_time: Option<u64>,
    pub cancellation_reasons: Option<Vec<CancellationReason>>,
}

impl LedgerEntry {
    pub fn new(
        transaction_id: String,
        timestamp: u64,
        client_request_token: Option<String>,
        original_items: Vec<Item>,
    ) -> Self {
        LedgerEntry {
            transaction_id,
            state: LedgerState::Preparing,
            timestamp,
            client_request_token,
            original_items,
            create_time: now_nanos(),
            complete_time: None,
            cancellation_reasons: None,
        }
    }

    pub fn is_complete(&self) -> bool {
        matches!(
            self.state,
            LedgerState::Committed | LedgerState::Cancelled | LedgerState::CommittingFailed
        )
    }
}

/// The cached outcome of a `transact_write` call keyed by client
/// request token. Held in memory only (§9's "idempotency window after
/// process restart" decision): lost on restart, scoped to one
/// coordinator process lifetime.
#[derive(Debug, Clone)]
pub enum IdempotentOutcome {
    Committed,
    Cancelled(Vec<CancellationReason>),
}

#[derive(Debug, Clone)]
pub struct IdempotencyEntry {
    pub completed_at: u64,
    pub outcome: IdempotentOutcome,
}

impl IdempotencyEntry {
    pub fn is_expired(&self, now: u64) -> bool {
        now.saturating_sub(self.completed_at) >= IDEMPOTENCY_TTL_NANOS
    }
}

/// The ledger durable file's on-disk shape: every entry the
/// coordinator currently knows about, keyed by transaction id. The
/// idempotency cache is deliberately NOT part of this type — it is
/// in-memory only, per the decision above.
pub type LedgerTable = HashMap<String, LedgerEntry>;

/// The durable transaction ledger (§3, §4.4). Rebuilt from disk at
/// startup the same way `MetadataStore` rebuilds table definitions —
/// an in-memory authoritative copy, backed by one `DurableFile`.
pub struct LedgerStore {
    file: DurableFile<LedgerTable>,
    entries: Mutex<LedgerTable>,
}

impl LedgerStore {
    pub fn open(data_dir: impl AsRef<Path>) -> Result<Self> {
        let file = DurableFile::new(data_dir.as_ref().join("ledger"));
        let entries = file
            .load()
            .map_err(|e| Error::Io(std::io::Error::new(std::io::ErrorKind::Other, e)))?
            .unwrap_or_default();
        Ok(LedgerStore {
            file,
            entries: Mutex::new(entries),
        })
    }

    fn persist(&self, entries: &LedgerTable) -> Result<()> {
        self.file
            .save(entries)
            .map_err(|e| Error::Io(std::io::Error::new(std::io::ErrorKind::Other, e)))
    }

    pub fn insert(&self, entry: LedgerEntry) -> Result<()> {
        let mut entries = self.entries.lock();
        entries.insert(entry.transaction_id.clone(), entry);
        self.persist(&entries)
    }

    /// Moves an entry to a terminal state, stamping `complete_time`.
    pub fn complete(
        &self,
        transaction_id: &str,
        state: LedgerState,
        cancellation_reasons: Option<Vec<CancellationReason>>,
    ) -> Result<()> {
        let mut entries = self.entries.lock();
        if let Some(entry) = entries.get_mut(transaction_id) {
            entry.state = state;
            entry.complete_time = Some(now_nanos());
            entry.cancellation_reasons = cancellation_reasons;
        }
        self.persist(&entries)
    }

    pub fn set_committing(&self, transaction_id: &str) -> Result<()> {
        let mut entries = self.entries.lock();
        if let Some(entry) = entries.get_mut(transaction_id) {
            entry.state = LedgerState::Committing;
        }
        self.persist(&entries)
    }

    pub fn get(&self, transaction_id: &str) -> Option<LedgerEntry> {
        self.entries.lock().get(transaction_id).cloned()
    }

    /// Drops every completed entry older than [`LEDGER_RETENTION_NANOS`].
    /// Entries stuck in `Preparing`/`Committing` (a crashed coordinator)
    /// or `CommittingFailed` are never swept automatically — those need
    /// an operator, surfaced via [`crate::coordinator::Coordinator::stuck_transactions`].
    pub fn sweep_expired(&self) -> Result<usize> {
        let now = now_nanos();
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|_, entry| match entry.complete_time {
            Some(completed) if entry.state == LedgerState::Committed || entry.state == LedgerState::Cancelled => {
                now.saturating_sub(completed) < LEDGER_RETENTION_NANOS
            }
            _ => true,
        });
        let removed = before - entries.len();
        if removed > 0 {
            self.persist(&entries)?;
        }
        Ok(removed)
    }

    /// Entries that never reached a clean terminal state: stuck
    /// mid-protocol, or permanently failed during commit (§9).
    pub fn stuck_entries(&self) -> Vec<LedgerEntry> {
        self.entries
            .lock()
            .values()
            .filter(|e| {
                matches!(
                    e.state,
                    LedgerState::Preparing | LedgerState::Committing | LedgerState::CommittingFailed
                )
            })
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idempotency_entry_expires_after_the_ttl() {
        let entry = IdempotencyEntry {
            completed_at: 1_000,
            outcome: IdempotentOutcome::Committed,
        };
        assert!(!entry.is_expired(1_000 + IDEMPOTENCY_TTL_NANOS - 1));
        assert!(entry.is_expired(1_000 + IDEMPOTENCY_TTL_NANOS));
    }

    #[test]
    fn ledger_entry_starts_preparing_and_is_not_complete() {
        let entry = LedgerEntry::new("tx1".to_string(), 10, None, vec![]);
        assert_eq!(entry.state, LedgerState::Preparing);
        assert!(!entry.is_complete());
    }

    #[test]
    fn ledger_store_round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = LedgerStore::open(dir.path()).unwrap();
            store
                .insert(LedgerEntry::new("tx1".to_string(), 10, None, vec![]))
                .unwrap();
            store.complete("tx1", LedgerState::Committed, None).unwrap();
        }
        let reopened = LedgerStore::open(dir.path()).unwrap();
        let entry = reopened.get("tx1").unwrap();
        assert_eq!(entry.state, LedgerState::Committed);
        assert!(entry.complete_time.is_some());
    }

    #[test]
    fn stuck_entries_excludes_clean_terminal_states() {
        let dir = tempfile::tempdir().unwrap();
        let store = LedgerStore::open(dir.path()).unwrap();
        store
            .insert(LedgerEntry::new("tx1".to_string(), 10, None, vec![]))
            .unwrap();
        store
            .insert(LedgerEntry::new("tx2".to_string(), 11, None, vec![]))
            .unwrap();
        store.complete("tx1", LedgerState::Committed, None).unwrap();
        store
            .complete("tx2", LedgerState::CommittingFailed, None)
            .unwrap();
        let stuck = store.stuck_entries();
        assert_eq!(stuck.len(), 1);
        assert_eq!(stuck[0].transaction_id, "tx2");
    }
}
