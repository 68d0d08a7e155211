//! Registry of allocated ports
//!
//! Session directories are the source of truth: a directory named
//! `{owner}_{port}` allocates `port` to `owner`. Claim records add ports
//! that are reserved by an invocation still preparing its directory.

use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::claims::{ClaimAttempt, ClaimGuard, ClaimRecord, ClaimStore};
use super::ports::{self, PortMap, PortStatus};
use crate::error::{GuestError, Result};
use crate::session::{SessionKey, OWNER_PATTERN};

/// Name of the claim directory inside the sessions directory
pub const CLAIMS_DIR: &str = ".claims";

/// One row of the registry, as shown by `list`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryEntry {
    pub port: u16,
    pub owner: String,
    /// A session directory exists for this port
    pub has_session: bool,
    pub claim: Option<ClaimRecord>,
}

/// Parse a session directory name of the form `<identifier>_<port>`.
///
/// Only canonical names are accepted, i.e. exactly what [`SessionKey::new`]
/// would produce for the parsed owner and port.
pub fn parse_session_name(name: &str) -> Option<(String, u16)> {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    let pattern = PATTERN.get_or_init(|| {
        Regex::new(&format!(r"^({})_(\d+)$", OWNER_PATTERN)).expect("session name pattern is valid")
    });
    let caps = pattern.captures(name)?;
    let port = caps[2].parse::<u16>().ok()?;
    let owner = caps[1].to_string();
    if SessionKey::new(&owner, port).as_str() != name {
        return None;
    }
    Some((owner, port))
}

#[derive(Debug)]
pub struct PortRegistry {
    sessions_dir: PathBuf,
    claims: ClaimStore,
    base_port: u16,
}

impl PortRegistry {
    /// Registry over `sessions_dir` without touching the filesystem
    pub fn new(sessions_dir: impl Into<PathBuf>, base_port: u16) -> Self {
        let sessions_dir = sessions_dir.into();
        Self {
            claims: ClaimStore::new(sessions_dir.join(CLAIMS_DIR)),
            sessions_dir,
            base_port,
        }
    }

    /// Open the registry over `sessions_dir`, creating the claim directory
    pub fn open(sessions_dir: impl Into<PathBuf>, base_port: u16) -> Result<Self> {
        let sessions_dir = sessions_dir.into();
        let claims = ClaimStore::open(sessions_dir.join(CLAIMS_DIR))?;
        Ok(Self {
            sessions_dir,
            claims,
            base_port,
        })
    }

    pub fn sessions_dir(&self) -> &Path {
        &self.sessions_dir
    }

    /// Session directories by port. Duplicate ports keep the first name in
    /// lexicographic order.
    fn scan_sessions(&self) -> Result<PortMap> {
        let entries = match fs::read_dir(&self.sessions_dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(PortMap::new()),
            Err(err) => return Err(GuestError::Io(err)),
        };

        let mut names = Vec::new();
        for entry in entries {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                names.push(name.to_string());
            }
        }
        names.sort();

        let mut sessions = PortMap::new();
        for name in names {
            let Some((owner, port)) = parse_session_name(&name) else {
                continue;
            };
            if let Some(first) = sessions.get(&port) {
                log::warn!(
                    "port {} is used by both '{}_{}' and '{}', keeping '{}'",
                    port,
                    first,
                    port,
                    name,
                    first
                );
                continue;
            }
            sessions.insert(port, owner);
        }
        Ok(sessions)
    }

    /// Live allocations: session directories plus claims without a directory
    pub fn scan(&self) -> Result<PortMap> {
        Ok(self
            .entries()?
            .into_iter()
            .map(|entry| (entry.port, entry.owner))
            .collect())
    }

    /// Registry rows with their backing session and claim state
    pub fn entries(&self) -> Result<Vec<RegistryEntry>> {
        let sessions = self.scan_sessions()?;
        let mut entries: BTreeMap<u16, RegistryEntry> = sessions
            .into_iter()
            .map(|(port, owner)| {
                (
                    port,
                    RegistryEntry {
                        port,
                        owner,
                        has_session: true,
                        claim: None,
                    },
                )
            })
            .collect();

        for claim in self.claims.list()? {
            match entries.get_mut(&claim.port) {
                Some(entry) => {
                    if entry.owner != claim.username {
                        log::warn!(
                            "claim on port {} names '{}' but the session belongs to '{}'",
                            claim.port,
                            claim.username,
                            entry.owner
                        );
                    }
                    entry.claim = Some(claim);
                }
                None => {
                    entries.insert(
                        claim.port,
                        RegistryEntry {
                            port: claim.port,
                            owner: claim.username.clone(),
                            has_session: false,
                            claim: Some(claim),
                        },
                    );
                }
            }
        }
        Ok(entries.into_values().collect())
    }

    pub fn resolve(&self, requested: Option<u16>, username: &str, existing: &PortMap) -> PortStatus {
        ports::resolve(requested, username, existing)
    }

    pub fn next_port(&self, existing: &PortMap) -> Result<u16> {
        ports::next_port(existing, self.base_port)
    }

    /// Claim `port` for `username`.
    ///
    /// An existing claim held by the same user is adopted. A claim held by
    /// anyone else is a conflict.
    pub fn claim(&self, port: u16, username: &str) -> Result<ClaimGuard> {
        match self.claims.try_claim(port, username)? {
            ClaimAttempt::Created => Ok(ClaimGuard::new(self.claims.clone(), port, true)),
            ClaimAttempt::Held(record) if record.username == username => {
                log::debug!("reusing existing claim on port {}", port);
                Ok(ClaimGuard::new(self.claims.clone(), port, false))
            }
            ClaimAttempt::Held(record) => Err(GuestError::PortConflict {
                port,
                owner: record.username,
            }),
        }
    }

    pub fn release(&self, port: u16) -> Result<bool> {
        self.claims.release(port)
    }
}
