//! Subcommand implementations.
//!
//! Store edits happen directly on the database; the daemon learns about
//! them from a bus message published right after.

pub mod alarm;
pub mod bus;
pub mod config;
pub mod daemon;
pub mod history;
pub mod settings;

use circadia_store::Store;

use crate::config::ClientConfig;
use crate::error::ClientResult;

/// Opens the database named by the configuration, creating it if needed.
pub fn open_store(config: &ClientConfig) -> ClientResult<Store> {
    Ok(Store::open(config.database_path())?)
}
