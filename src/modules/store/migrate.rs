use log::{info, warn};
use std::path::Path;

use super::file::read_records;
use super::{CredentialStore, StoreError};

/// Outcome of copying a flat credential file into another store
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MigrationReport {
    pub migrated: usize,
    pub already_present: usize,
}

/// Copy every committed record of a flat credential file into `target`,
/// typically a [`SqliteStore`](super::SqliteStore).
///
/// Usernames already present in the target are left untouched, so running the
/// migration twice is harmless. A missing source file migrates nothing.
pub fn migrate_flat_file(
    source: &Path,
    target: &dyn CredentialStore,
) -> Result<MigrationReport, StoreError> {
    if !source.exists() {
        warn!("Migration source {} not found, nothing to migrate", source.display());
        return Ok(MigrationReport::default());
    }

    let mut report = MigrationReport::default();
    for record in read_records(source)? {
        match target.insert(&record.username, &record.password_hash, Some(&record.role)) {
            Ok(()) => report.migrated += 1,
            Err(StoreError::AlreadyExists) => report.already_present += 1,
            Err(e) => return Err(e),
        }
    }

    info!(
        "Migrated {} users from {} ({} already present)",
        report.migrated,
        source.display(),
        report.already_present
    );
    Ok(report)
}
