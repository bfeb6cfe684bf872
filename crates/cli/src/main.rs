//! The ambient boot sequence this workspace owns: install logging,
//! read `SHARD_COUNT`/`DATA_DIR`/`PORT`, open the database. The HTTP
//! listener that would actually speak the wire protocol on `PORT`
//! lives outside this repository's scope (§6) — this binary exists so
//! the typed `EngineConfig`/`Database` boot path has a real entry
//! point: install a subscriber, open storage, then hand off.

use std::process;

use dynado_engine::{Database, EngineConfig};

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = match EngineConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("invalid configuration: {e}");
            process::exit(1);
        }
    };

    let db = match Database::open(&config) {
        Ok(db) => db,
        Err(e) => {
            eprintln!("failed to open database at '{}': {e}", config.data_dir);
            process::exit(1);
        }
    };

    tracing::info!(
        data_dir = %config.data_dir,
        shard_count = config.shard_count,
        port = config.port,
        tables = db.list_tables().len(),
        "dynado ready"
    );

    let stuck = db.stuck_transactions();
    if !stuck.is_empty() {
        tracing::warn!(
            count = stuck.len(),
            "found transactions left mid-protocol by a previous run"
        );
    }

    // No wire listener in this binary (§6) — park so the process stays
    // up and the cleanup background thread keeps sweeping the ledger.
    loop {
        std::thread::park();
    }
}
