//! The boundary layer (§4.5, §6): a `Database` handle wires together
//! the sharded store, the 2PC coordinator, and the router that decides
//! which shard owns each operation. Everything a caller needs lives
//! behind `Database` — `Router` and `EngineConfig` are exposed for
//! embedders that want finer control.

pub mod config;
pub mod database;
pub mod router;

pub use config::EngineConfig;
pub use database::Database;
pub use router::{BatchWriteResult, Page, Router};
