//! `EngineConfig`, loaded from environment variables rather than a
//! config file — there is no long-lived data directory layout to
//! migrate between versions, so there is nothing a file buys over
//! three env vars (§10.3). Unknown variables are ignored; known ones
//! are validated eagerly so a bad value fails at boot, not on first
//! use.

use std::env;

use dynado_core::{Error, Result};

const SHARD_COUNT_VAR: &str = "SHARD_COUNT";
const DATA_DIR_VAR: &str = "DATA_DIR";
const PORT_VAR: &str = "PORT";

const DEFAULT_SHARD_COUNT: usize = 8;
const DEFAULT_DATA_DIR: &str = "./data";
const DEFAULT_PORT: u16 = 8080;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    pub shard_count: usize,
    pub data_dir: String,
    pub port: u16,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            shard_count: DEFAULT_SHARD_COUNT,
            data_dir: DEFAULT_DATA_DIR.to_string(),
            port: DEFAULT_PORT,
        }
    }
}

impl EngineConfig {
    /// Reads `SHARD_COUNT`, `DATA_DIR`, `PORT` from the process
    /// environment. Never panics — a malformed value becomes a
    /// `Validation` error rather than a crash.
    pub fn from_env() -> Result<Self> {
        let mut config = EngineConfig::default();

        if let Ok(raw) = env::var(SHARD_COUNT_VAR) {
            config.shard_count = parse_shard_count(&raw)?;
        }
        if let Ok(raw) = env::var(DATA_DIR_VAR) {
            config.data_dir = parse_data_dir(&raw)?;
        }
        if let Ok(raw) = env::var(PORT_VAR) {
            config.port = parse_port(&raw)?;
        }

        Ok(config)
    }
}

fn parse_shard_count(raw: &str) -> Result<usize> {
    let parsed: usize = raw.parse().map_err(|_| {
        Error::Validation(format!("{SHARD_COUNT_VAR} must be a positive integer, got '{raw}'"))
    })?;
    if parsed == 0 {
        return Err(Error::Validation(format!("{SHARD_COUNT_VAR} must be at least 1")));
    }
    Ok(parsed)
}

fn parse_data_dir(raw: &str) -> Result<String> {
    if raw.is_empty() {
        return Err(Error::Validation(format!("{DATA_DIR_VAR} must not be empty")));
    }
    Ok(raw.to_string())
}

fn parse_port(raw: &str) -> Result<u16> {
    raw.parse()
        .map_err(|_| Error::Validation(format!("{PORT_VAR} must be a 16-bit port number, got '{raw}'")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_documented_values() {
        let config = EngineConfig::default();
        assert_eq!(config.shard_count, 8);
        assert_eq!(config.data_dir, "./data");
        assert_eq!(config.port, 8080);
    }

    #[test]
    fn zero_shard_count_is_rejected() {
        assert!(parse_shard_count("0").unwrap_err().is_validation());
        assert!(parse_shard_count("4").is_ok());
        assert!(parse_shard_count("not-a-number").unwrap_err().is_validation());
    }

    #[test]
    fn empty_data_dir_is_rejected() {
        assert!(parse_data_dir("").unwrap_err().is_validation());
        assert_eq!(parse_data_dir("/var/dynado").unwrap(), "/var/dynado");
    }

    #[test]
    fn non_numeric_port_is_rejected() {
        assert!(parse_port("not-a-port").unwrap_err().is_validation());
        assert_eq!(parse_port("9000").unwrap(), 9000);
    }
}
