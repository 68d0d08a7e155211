//! Port claim records
//!
//! A claim is a small JSON file named after the port. It is created with
//! exclusive-create semantics, so when several invocations race for the same
//! port exactly one of them wins.

use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{GuestError, Result};

const CLAIM_EXTENSION: &str = "claim";

/// Owner shown for a claim whose file exists but is not readable yet
const PENDING_OWNER: &str = "<pending>";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimRecord {
    pub port: u16,
    pub username: String,
    pub claimed_at: DateTime<Utc>,
}

/// Result of trying to claim a port
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClaimAttempt {
    /// This call created the claim
    Created,
    /// The claim file already existed
    Held(ClaimRecord),
}

/// Directory of claim files
#[derive(Debug, Clone)]
pub struct ClaimStore {
    dir: PathBuf,
}

impl ClaimStore {
    /// Use `dir` as is. A missing directory reads as no claims.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Like [`ClaimStore::new`], creating `dir` first
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let store = Self::new(dir);
        fs::create_dir_all(&store.dir)?;
        Ok(store)
    }

    fn path(&self, port: u16) -> PathBuf {
        self.dir.join(format!("{}.{}", port, CLAIM_EXTENSION))
    }

    /// Atomically create the claim for `port`, or report who holds it
    pub fn try_claim(&self, port: u16, username: &str) -> Result<ClaimAttempt> {
        let path = self.path(port);
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(mut file) => {
                let record = ClaimRecord {
                    port,
                    username: username.to_string(),
                    claimed_at: Utc::now(),
                };
                let bytes = serde_json::to_vec_pretty(&record)?;
                file.write_all(&bytes)?;
                file.sync_all()?;
                log::debug!("claimed port {} for {}", port, username);
                Ok(ClaimAttempt::Created)
            }
            Err(err) if err.kind() == ErrorKind::AlreadyExists => {
                let record = self.read(port)?.unwrap_or_else(|| ClaimRecord {
                    port,
                    username: PENDING_OWNER.to_string(),
                    claimed_at: Utc::now(),
                });
                Ok(ClaimAttempt::Held(record))
            }
            Err(err) => Err(GuestError::Io(err)),
        }
    }

    /// Read the claim for `port`. A missing file is `None`; so is a file that
    /// another invocation has created but not finished writing.
    pub fn read(&self, port: u16) -> Result<Option<ClaimRecord>> {
        let content = match fs::read(self.path(port)) {
            Ok(content) => content,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(GuestError::Io(err)),
        };
        match serde_json::from_slice(&content) {
            Ok(record) => Ok(Some(record)),
            Err(err) => {
                log::debug!("unreadable claim for port {}: {}", port, err);
                Ok(None)
            }
        }
    }

    /// Remove the claim for `port`; returns whether a claim was removed
    pub fn release(&self, port: u16) -> Result<bool> {
        match fs::remove_file(self.path(port)) {
            Ok(()) => {
                log::debug!("released claim on port {}", port);
                Ok(true)
            }
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(false),
            Err(err) => Err(GuestError::Io(err)),
        }
    }

    /// All readable claim records, ordered by port
    pub fn list(&self) -> Result<Vec<ClaimRecord>> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(GuestError::Io(err)),
        };
        let mut records = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if path.extension().is_none_or(|e| e != CLAIM_EXTENSION) {
                continue;
            }
            let Some(port) = path
                .file_stem()
                .and_then(|s| s.to_str())
                .and_then(|s| s.parse::<u16>().ok())
            else {
                continue;
            };
            match self.read(port)? {
                Some(record) if record.port == port => records.push(record),
                Some(record) => log::warn!(
                    "claim file {} names port {}, ignoring",
                    path.display(),
                    record.port
                ),
                None => {}
            }
        }
        records.sort_by_key(|r| r.port);
        Ok(records)
    }
}

/// Holds a claim while a session is being prepared.
///
/// A claim this guard created is released on drop unless [`commit`] was
/// called. Adopted claims (already present before this run) are never
/// released by the guard.
///
/// [`commit`]: ClaimGuard::commit
#[derive(Debug)]
pub struct ClaimGuard {
    store: ClaimStore,
    port: u16,
    created: bool,
    committed: bool,
}

impl ClaimGuard {
    pub(crate) fn new(store: ClaimStore, port: u16, created: bool) -> Self {
        Self {
            store,
            port,
            created,
            committed: false,
        }
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Whether this run created the claim
    pub fn is_new(&self) -> bool {
        self.created
    }

    /// Keep the claim past the end of this guard
    pub fn commit(mut self) {
        self.committed = true;
    }
}

impl Drop for ClaimGuard {
    fn drop(&mut self) {
        if self.created && !self.committed {
            if let Err(e) = self.store.release(self.port) {
                log::warn!("failed to release claim on port {}: {}", self.port, e);
            }
        }
    }
}
