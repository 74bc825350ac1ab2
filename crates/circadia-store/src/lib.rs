//! SQLite persistence for circadia.
//!
//! Three tables back the daemon:
//! - `settings`: string key/value pairs (see [`circadia_core::keys`])
//! - `alarms`: wake-up times with an enabled flag
//! - `sleep_history`: finished sleep sessions, kept for a rolling 30 days
//!
//! The store has no concurrency of its own. A single connection sits
//! behind a mutex and every call is a short, synchronous statement.

mod alarms;
mod error;
mod history;
mod settings;

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use rusqlite::{Connection, params};
use tracing::debug;

use circadia_core::{DEFAULT_BEDTIME, keys};

pub use error::{StoreError, StoreResult};
pub use history::RETENTION_DAYS;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS settings (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS alarms (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    hour INTEGER NOT NULL,
    minute INTEGER NOT NULL,
    enabled INTEGER NOT NULL DEFAULT 1
);
CREATE TABLE IF NOT EXISTS sleep_history (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    start_time INTEGER NOT NULL,
    end_time INTEGER NOT NULL,
    snooze_count INTEGER NOT NULL DEFAULT 0
);
CREATE INDEX IF NOT EXISTS idx_sleep_history_start ON sleep_history(start_time);
";

/// Handle to the circadia database.
pub struct Store {
    conn: Mutex<Connection>,
}

impl Store {
    /// Opens (creating if needed) the database at `path`.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }

        debug!(path = %path.display(), "Opening database");
        Self::init(Connection::open(path)?)
    }

    /// Opens a private in-memory database.
    pub fn open_in_memory() -> StoreResult<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> StoreResult<Self> {
        conn.execute_batch(SCHEMA)?;
        conn.execute(
            "INSERT OR IGNORE INTO settings (key, value) VALUES (?1, ?2), (?3, ?4)",
            params![keys::BEDTIME, DEFAULT_BEDTIME, keys::NOTIFY_BEDTIME, "true"],
        )?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn open_creates_parent_directories() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested/circadia/user.db");

        let store = Store::open(&path).unwrap();
        assert!(path.exists());
        assert_eq!(store.bedtime().unwrap(), "23:00");
    }

    #[test]
    fn reopen_keeps_data() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("user.db");

        {
            let store = Store::open(&path).unwrap();
            store.set_setting(keys::BEDTIME, "22:15").unwrap();
        }

        let store = Store::open(&path).unwrap();
        assert_eq!(store.bedtime().unwrap(), "22:15");
    }
}
