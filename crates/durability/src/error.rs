//! Errors raised while reading or writing a durable file.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    #[error("durable file {path} is corrupt: {reason}")]
    Corrupt { path: String, reason: String },
}
