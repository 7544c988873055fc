//! Account Store
//!
//! Credential verification and win-count persistence. The server consumes
//! only the [`AccountStore`] trait; credential storage itself is an external
//! concern. [`FileAccountStore`] is the bundled file-backed implementation,
//! keyed by username the same way the leaderboard surface reads it.
//!
//! Passwords never travel in plaintext: clients send SHA-256 hex digests
//! and the store compares digests only.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Outcome of a credential check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthOutcome {
    /// Known username, digest matched.
    Allowed,
    /// Unknown username; an account was created with the supplied digest.
    Created,
    /// Known username, digest did not match.
    Denied,
}

/// Account store errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backing store could not be read or written.
    #[error("account store unavailable: {0}")]
    Unavailable(String),
}

/// Credential and win-count operations consumed by the connection handler.
///
/// Both operations are synchronous and may transiently fail with
/// [`StoreError::Unavailable`]; callers treat that as a denial for
/// `authenticate` and skip silently for `record_win`.
pub trait AccountStore: Send + Sync {
    /// Check a username/digest pair, creating the account on first sight.
    fn authenticate(&self, username: &str, password_hash: &str) -> Result<AuthOutcome, StoreError>;

    /// Credit one win to an existing account.
    fn record_win(&self, username: &str) -> Result<(), StoreError>;

    /// All accounts as `(username, wins)`, sorted by wins descending.
    /// This is the read surface the leaderboard consumes.
    fn standings(&self) -> Result<Vec<(String, u32)>, StoreError>;
}

/// SHA-256 hex digest of a plaintext password, as clients compute it.
pub fn hash_password(plain: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(plain.as_bytes());
    hex::encode(hasher.finalize())
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct AccountRecord {
    password_hash: String,
    wins: u32,
}

/// File-backed account store: a JSON object keyed by username.
pub struct FileAccountStore {
    path: PathBuf,
    accounts: Mutex<HashMap<String, AccountRecord>>,
}

impl FileAccountStore {
    /// Open a store, loading existing accounts if the file is present.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let accounts = if path.exists() {
            let raw = std::fs::read_to_string(&path)
                .map_err(|e| StoreError::Unavailable(e.to_string()))?;
            serde_json::from_str(&raw).map_err(|e| StoreError::Unavailable(e.to_string()))?
        } else {
            HashMap::new()
        };

        Ok(Self {
            path,
            accounts: Mutex::new(accounts),
        })
    }

    fn persist(&self, accounts: &HashMap<String, AccountRecord>) -> Result<(), StoreError> {
        let raw = serde_json::to_string_pretty(accounts)
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        std::fs::write(&self.path, raw).map_err(|e| StoreError::Unavailable(e.to_string()))
    }
}

impl AccountStore for FileAccountStore {
    fn authenticate(&self, username: &str, password_hash: &str) -> Result<AuthOutcome, StoreError> {
        let mut accounts = self.accounts.lock().expect("account lock poisoned");

        match accounts.get(username) {
            Some(record) if record.password_hash == password_hash => Ok(AuthOutcome::Allowed),
            Some(_) => Ok(AuthOutcome::Denied),
            None => {
                accounts.insert(
                    username.to_string(),
                    AccountRecord {
                        password_hash: password_hash.to_string(),
                        wins: 0,
                    },
                );
                self.persist(&accounts)?;
                Ok(AuthOutcome::Created)
            }
        }
    }

    fn record_win(&self, username: &str) -> Result<(), StoreError> {
        let mut accounts = self.accounts.lock().expect("account lock poisoned");

        if let Some(record) = accounts.get_mut(username) {
            record.wins += 1;
            self.persist(&accounts)?;
        }
        Ok(())
    }

    fn standings(&self) -> Result<Vec<(String, u32)>, StoreError> {
        let accounts = self.accounts.lock().expect("account lock poisoned");

        let mut rows: Vec<(String, u32)> = accounts
            .iter()
            .map(|(name, record)| (name.clone(), record.wins))
            .collect();
        rows.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        Ok(rows)
    }
}
