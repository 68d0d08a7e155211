//! Provisioning states and reports

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::session::SessionKey;

/// Where a provisioning run is, or where it stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProvisionState {
    Requested,
    PortResolved,
    DirectoryPrepared,
    ScriptsWritten,
    ImageBuilt,
    Running,
    /// The operator kept the existing session
    Aborted,
    Failed,
}

impl ProvisionState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Running | Self::Aborted | Self::Failed)
    }
}

impl fmt::Display for ProvisionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Requested => "requested",
            Self::PortResolved => "port resolved",
            Self::DirectoryPrepared => "directory prepared",
            Self::ScriptsWritten => "scripts written",
            Self::ImageBuilt => "image built",
            Self::Running => "running",
            Self::Aborted => "aborted",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Final result of a successful or aborted provisioning run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvisionReport {
    pub username: String,
    pub port: u16,
    pub key: SessionKey,
    pub session_dir: PathBuf,
    /// `Running`, `ImageBuilt` for a dry run, or `Aborted`
    pub state: ProvisionState,
}

/// Result of an explicit teardown
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemovalReport {
    pub username: String,
    pub port: u16,
    pub key: SessionKey,
    /// The stop script ran successfully
    pub stopped: bool,
    pub removed_session: bool,
    pub released_claim: bool,
}
