//! Session identity and attributes

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::config::SessionConfig;

/// Directory key of a session: `{username}_{port}`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionKey(String);

/// Characters an owner name may use. Owner names end up in image tags,
/// container names and unquoted shell words.
pub const OWNER_PATTERN: &str = "[a-z0-9][a-z0-9_.-]*";

/// Owner name as it appears in session keys and the port registry
pub fn owner_name(username: &str) -> String {
    username.replace(' ', "_")
}

/// Whether `owner` (an already mapped [`owner_name`]) is a usable identifier
pub fn is_valid_owner(owner: &str) -> bool {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN
        .get_or_init(|| {
            Regex::new(&format!("^{}$", OWNER_PATTERN)).expect("owner pattern is valid")
        })
        .is_match(owner)
}

impl SessionKey {
    /// Build the key for a user and port. Spaces in the username become `_`.
    pub fn new(username: &str, port: u16) -> Self {
        Self(format!("{}_{}", owner_name(username), port))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A fully resolved session: a user bound to an allocated port
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub username: String,
    pub port: u16,
    pub public_key: String,
    /// Base image the session image is built from
    pub image: String,
    /// Value passed to `--gpus`, empty for none
    pub gpus: String,
    pub reverse_proxy_host: Option<String>,
    pub extra_run_args: String,
    pub dry_run: bool,
}

impl Session {
    /// Bind a validated config to the port the registry handed out
    pub fn from_config(config: &SessionConfig, port: u16) -> Self {
        Self {
            username: config.username.clone(),
            port,
            public_key: config.public_key.clone(),
            image: config.image.clone(),
            gpus: config.gpus.clone(),
            reverse_proxy_host: config.reverse_proxy_host.clone(),
            extra_run_args: config.extra_run_args.clone(),
            dry_run: config.dry_run,
        }
    }

    pub fn key(&self) -> SessionKey {
        SessionKey::new(&self.username, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_key_format() {
        assert_eq!(SessionKey::new("alice", 32041).as_str(), "alice_32041");
    }

    #[test]
    fn test_session_key_replaces_spaces() {
        assert_eq!(SessionKey::new("mary ann", 33000).to_string(), "mary_ann_33000");
    }
}
