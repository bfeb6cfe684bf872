//! The 2PC coordinator, transaction ledger, idempotency cache, and the
//! shard-routing hash shared with the router (§4.4, §4.6).

pub mod coordinator;
pub mod hash;
pub mod ledger;

pub use coordinator::{CleanupTask, Coordinator};
pub use hash::shard_index;
pub use ledger::{LedgerEntry, LedgerState, LedgerStore};
