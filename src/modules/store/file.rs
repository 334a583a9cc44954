//! Append-only flat file backing.
//!
//! One record per line: `username,password_hash` or
//! `username,password_hash,role`. A record is committed once its terminating
//! newline is on disk; lines are never rewritten.

use log::{error, warn};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use super::{prepare_record, CredentialRecord, CredentialStore, StoreError, DEFAULT_ROLE};
use crate::modules::auth::password::{validate_role, validate_username};
use crate::modules::utils::logging::log_data_operation;

const DELIMITER: char = ',';

struct FileState {
    file: File,
    committed_len: u64,
    records: HashMap<String, CredentialRecord>,
}

pub struct FileStore {
    path: PathBuf,
    state: Mutex<FileState>,
}

impl FileStore {
    /// Open (or create) the credential file and index its committed records.
    ///
    /// An unterminated final line is the remains of an interrupted append and
    /// is cut off so the next record starts on a clean line.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&path)?;

        let mut bytes = Vec::new();
        file.read_to_end(&mut bytes)?;

        let committed = committed_prefix(&bytes);
        if committed < bytes.len() {
            warn!(
                "Discarding {} bytes of unterminated record at end of {}",
                bytes.len() - committed,
                path.display()
            );
            file.set_len(committed as u64)?;
        }

        let mut records = HashMap::new();
        for record in parse_records(&bytes[..committed], &path) {
            records.insert(record.username.clone(), record);
        }

        Ok(Self {
            path,
            state: Mutex::new(FileState {
                file,
                committed_len: committed as u64,
                records,
            }),
        })
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.state.lock().records.len()
    }
}

impl CredentialStore for FileStore {
    fn insert(
        &self,
        username: &str,
        password_hash: &str,
        role: Option<&str>,
    ) -> Result<(), StoreError> {
        let record = prepare_record(username, password_hash, role)?;
        let line = encode_line(&record);

        // Existence check and append happen under the same lock
        let mut guard = self.state.lock();
        let state = &mut *guard;
        if state.records.contains_key(&record.username) {
            log_data_operation("insert", username, "file", false, Some("already exists"));
            return Err(StoreError::AlreadyExists);
        }

        let written = state
            .file
            .write_all(line.as_bytes())
            .and_then(|_| state.file.sync_data());
        if let Err(e) = written {
            if let Err(rollback) = state.file.set_len(state.committed_len) {
                error!(
                    "Failed to roll back partial append to {}: {}",
                    self.path.display(),
                    rollback
                );
            }
            log_data_operation("insert", username, "file", false, Some("write failed"));
            return Err(e.into());
        }

        state.committed_len += line.len() as u64;
        state.records.insert(record.username.clone(), record);
        log_data_operation("insert", username, "file", true, None);
        Ok(())
    }

    fn lookup(&self, username: &str) -> Result<Option<CredentialRecord>, StoreError> {
        Ok(self.state.lock().records.get(username).cloned())
    }
}

/// Read every committed record of a credential file without modifying it,
/// in file order. A missing file has no records.
pub fn read_records(path: &Path) -> Result<Vec<CredentialRecord>, StoreError> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };
    let committed = committed_prefix(&bytes);
    Ok(parse_records(&bytes[..committed], path))
}

fn committed_prefix(bytes: &[u8]) -> usize {
    bytes
        .iter()
        .rposition(|&b| b == b'\n')
        .map(|i| i + 1)
        .unwrap_or(0)
}

// Text decoding happens here and nowhere else
fn parse_records(bytes: &[u8], path: &Path) -> Vec<CredentialRecord> {
    let mut seen = HashMap::new();
    let mut records = Vec::new();

    for (index, raw) in bytes.split(|&b| b == b'\n').enumerate() {
        let line_no = index + 1;
        let line = match std::str::from_utf8(raw) {
            Ok(line) => line.trim(),
            Err(_) => {
                warn!("Skipping non UTF-8 line {} in {}", line_no, path.display());
                continue;
            }
        };
        if line.is_empty() {
            continue;
        }

        let Some(record) = parse_line(line) else {
            warn!("Skipping malformed line {} in {}", line_no, path.display());
            continue;
        };
        if seen.insert(record.username.clone(), line_no).is_some() {
            warn!(
                "Ignoring duplicate record on line {} in {}",
                line_no,
                path.display()
            );
            continue;
        }
        records.push(record);
    }

    records
}

/// Parse one committed line.
///
/// The hash's parameter segment may itself contain commas
/// (`$pbkdf2-sha256$i=600000,l=32$...`), so a role is only split off after
/// the hash's final `$` segment.
pub fn parse_line(line: &str) -> Option<CredentialRecord> {
    let (username, rest) = line.split_once(DELIMITER)?;
    validate_username(username).ok()?;

    let tail_start = rest.rfind('$').map(|i| i + 1).unwrap_or(0);
    let (password_hash, role) = match rest[tail_start..].find(DELIMITER) {
        Some(offset) => {
            let split = tail_start + offset;
            (&rest[..split], Some(&rest[split + 1..]))
        }
        None => (rest, None),
    };
    if password_hash.is_empty() {
        return None;
    }

    let role = role.unwrap_or(DEFAULT_ROLE);
    validate_role(role).ok()?;

    Some(CredentialRecord {
        username: username.to_string(),
        password_hash: password_hash.to_string(),
        role: role.to_string(),
    })
}

/// Encode a record as one newline-terminated line. The role field is left
/// out when it is the default.
pub fn encode_line(record: &CredentialRecord) -> String {
    if record.role == DEFAULT_ROLE {
        format!("{}{}{}\n", record.username, DELIMITER, record.password_hash)
    } else {
        format!(
            "{}{}{}{}{}\n",
            record.username, DELIMITER, record.password_hash, DELIMITER, record.role
        )
    }
}
