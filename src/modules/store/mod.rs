pub mod file;
pub mod migrate;
pub mod sqlite;

use std::fmt;
use std::io;
use thiserror::Error;

use crate::modules::auth::password::{validate_role, validate_username, ValidationError};

pub use file::FileStore;
pub use migrate::{migrate_flat_file, MigrationReport};
pub use sqlite::SqliteStore;

/// Role given to records inserted without one.
pub const DEFAULT_ROLE: &str = "user";

/// Errors surfaced by a credential backing store
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("invalid username: {0}")]
    InvalidUsername(ValidationError),
    #[error("username already exists")]
    AlreadyExists,
    #[error("record cannot be stored: {0}")]
    InvalidRecord(String),
    #[error("storage I/O failure: {0}")]
    Io(#[from] io::Error),
    #[error("storage database failure: {0}")]
    Database(#[from] rusqlite::Error),
}

/// A stored credential. Records are never updated once written.
#[derive(Clone, PartialEq, Eq)]
pub struct CredentialRecord {
    pub username: String,
    pub password_hash: String,
    pub role: String,
}

// The hash never appears in logs or debug output
impl fmt::Debug for CredentialRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialRecord")
            .field("username", &self.username)
            .field("password_hash", &"<redacted>")
            .field("role", &self.role)
            .finish()
    }
}

/// Mapping from username to credential record.
///
/// `insert` performs the existence check and the write as one atomic step:
/// of several concurrent inserts for the same username exactly one succeeds
/// and the rest get [`StoreError::AlreadyExists`].
pub trait CredentialStore: Send + Sync {
    fn insert(
        &self,
        username: &str,
        password_hash: &str,
        role: Option<&str>,
    ) -> Result<(), StoreError>;

    fn lookup(&self, username: &str) -> Result<Option<CredentialRecord>, StoreError>;
}

/// Shape checks shared by every backing, run before storage is touched.
/// Returns the record that would be written.
pub fn prepare_record(
    username: &str,
    password_hash: &str,
    role: Option<&str>,
) -> Result<CredentialRecord, StoreError> {
    validate_username(username).map_err(StoreError::InvalidUsername)?;

    if password_hash.is_empty() {
        return Err(StoreError::InvalidRecord("password hash is empty".to_string()));
    }
    if password_hash.chars().any(|c| c.is_control()) {
        return Err(StoreError::InvalidRecord(
            "password hash contains control characters".to_string(),
        ));
    }

    let role = role.unwrap_or(DEFAULT_ROLE);
    validate_role(role).map_err(|e| StoreError::InvalidRecord(e.to_string()))?;

    let record = CredentialRecord {
        username: username.to_string(),
        password_hash: password_hash.to_string(),
        role: role.to_string(),
    };

    // Every backing accepts only what the line format reads back unchanged,
    // so a record can always be moved between them
    let line = file::encode_line(&record);
    if file::parse_line(line.trim()).as_ref() != Some(&record) {
        return Err(StoreError::InvalidRecord(
            "password hash cannot be stored as a single line field".to_string(),
        ));
    }
    Ok(record)
}
