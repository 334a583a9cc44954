//! SQLite-backed credential table.
//!
//! Uniqueness is the engine's job: `username` carries a UNIQUE constraint
//! and only that violation is reported as [`StoreError::AlreadyExists`]. There is no
//! application-level pre-check.

use parking_lot::Mutex;
use rusqlite::{ffi, params, Connection, OptionalExtension};
use std::path::Path;
use std::time::Duration;

use super::{prepare_record, CredentialRecord, CredentialStore, StoreError};
use crate::modules::utils::logging::log_data_operation;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) the credential database at the given path.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;

        // WAL mode for concurrent readers and crash safety
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;",
        )?;
        Self::from_connection(conn)
    }

    /// Open an in-memory database.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.busy_timeout(BUSY_TIMEOUT)?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                username TEXT NOT NULL UNIQUE,
                password_hash TEXT NOT NULL,
                role TEXT NOT NULL DEFAULT 'user'
            );",
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn count(&self) -> Result<usize, StoreError> {
        let conn = self.conn.lock();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))?;
        Ok(usize::try_from(count).unwrap_or(0))
    }
}

impl CredentialStore for SqliteStore {
    fn insert(
        &self,
        username: &str,
        password_hash: &str,
        role: Option<&str>,
    ) -> Result<(), StoreError> {
        let record = prepare_record(username, password_hash, role)?;

        let conn = self.conn.lock();
        let result = conn.execute(
            "INSERT INTO users (username, password_hash, role) VALUES (?1, ?2, ?3)",
            params![record.username, record.password_hash, record.role],
        );

        match result {
            Ok(_) => {
                log_data_operation("insert", username, "sqlite", true, None);
                Ok(())
            }
            Err(rusqlite::Error::SqliteFailure(err, _))
                if err.extended_code == ffi::SQLITE_CONSTRAINT_UNIQUE =>
            {
                log_data_operation("insert", username, "sqlite", false, Some("already exists"));
                Err(StoreError::AlreadyExists)
            }
            Err(e) => {
                log_data_operation("insert", username, "sqlite", false, Some("database error"));
                Err(e.into())
            }
        }
    }

    fn lookup(&self, username: &str) -> Result<Option<CredentialRecord>, StoreError> {
        let conn = self.conn.lock();
        let record = conn
            .query_row(
                "SELECT username, password_hash, role FROM users WHERE username = ?1",
                params![username],
                |row| {
                    Ok(CredentialRecord {
                        username: row.get(0)?,
                        password_hash: row.get(1)?,
                        role: row.get(2)?,
                    })
                },
            )
            .optional()?;
        Ok(record)
    }
}
