//! Crash-safe single-file persistence: write-temp, fsync, atomic
//! rename, fsync the containing directory (§4.2, §4.3, §4.4 all
//! persist through this one abstraction).

pub mod error;
pub mod file;

pub use error::{Error, Result};
pub use file::DurableFile;
