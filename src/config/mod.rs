//! Session configuration
//!
//! Command line values are collected into a [`RawSessionConfig`], optionally
//! overridden key by key from a JSON file, then validated into a
//! [`SessionConfig`]. Validation happens before anything touches storage.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Deserializer};

use crate::error::{GuestError, Result};
use crate::session::{is_valid_owner, owner_name};

/// Image used when neither the command line nor the config file names one
pub const DEFAULT_IMAGE: &str = "nvcr.io/nvidia/pytorch:23.10-py3";

/// Unvalidated session settings, as typed on the command line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawSessionConfig {
    pub username: String,
    /// Negative means "pick the next free port"
    pub port: i64,
    pub public_key: String,
    pub container_name: String,
    pub gpus: String,
    pub dry_run: bool,
    pub reverse_proxy_host: String,
    pub extra_docker_run_args: String,
}

impl Default for RawSessionConfig {
    fn default() -> Self {
        Self {
            username: String::new(),
            port: -1,
            public_key: String::new(),
            container_name: DEFAULT_IMAGE.to_string(),
            gpus: String::new(),
            dry_run: false,
            reverse_proxy_host: String::new(),
            extra_docker_run_args: String::new(),
        }
    }
}

/// Keys recognized in a JSON config file. Both `snake_case` and `kebab-case`
/// spellings are accepted; unknown keys are ignored.
#[derive(Debug, Default, Deserialize)]
pub struct ConfigFile {
    pub username: Option<String>,
    #[serde(default, deserialize_with = "deserialize_port")]
    pub port: Option<i64>,
    #[serde(alias = "public-key")]
    pub public_key: Option<String>,
    #[serde(alias = "container-name")]
    pub container_name: Option<String>,
    pub gpus: Option<String>,
    #[serde(alias = "dry-run")]
    pub dry_run: Option<bool>,
    #[serde(alias = "reverse-proxy-host")]
    pub reverse_proxy_host: Option<String>,
    #[serde(alias = "extra-docker-run-args")]
    pub extra_docker_run_args: Option<String>,
}

impl ConfigFile {
    pub fn parse(content: &str) -> Result<Self> {
        Ok(serde_json::from_str(content)?)
    }

    pub fn load(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(GuestError::Config(format!(
                "config file not found: {}",
                path.display()
            )));
        }
        let content = fs::read_to_string(path)?;
        Self::parse(&content)
    }
}

/// Accept the port either as a JSON integer or as a numeric string
fn deserialize_port<'de, D>(deserializer: D) -> std::result::Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::{self, Visitor};
    use std::fmt;

    struct PortValue;

    impl<'de> Visitor<'de> for PortValue {
        type Value = Option<i64>;

        fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
            formatter.write_str("an integer or a numeric string")
        }

        fn visit_i64<E>(self, value: i64) -> std::result::Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(Some(value))
        }

        fn visit_u64<E>(self, value: u64) -> std::result::Result<Self::Value, E>
        where
            E: de::Error,
        {
            i64::try_from(value)
                .map(Some)
                .map_err(|_| E::custom(format!("port out of range: {}", value)))
        }

        fn visit_str<E>(self, value: &str) -> std::result::Result<Self::Value, E>
        where
            E: de::Error,
        {
            value
                .trim()
                .parse::<i64>()
                .map(Some)
                .map_err(|_| E::custom(format!("invalid port: {:?}", value)))
        }

        fn visit_unit<E>(self) -> std::result::Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(None)
        }
    }

    deserializer.deserialize_any(PortValue)
}

impl RawSessionConfig {
    /// Override every field the config file sets
    pub fn merge(&mut self, file: ConfigFile) {
        if let Some(username) = file.username {
            self.username = username;
        }
        if let Some(port) = file.port {
            self.port = port;
        }
        if let Some(public_key) = file.public_key {
            self.public_key = public_key;
        }
        if let Some(container_name) = file.container_name {
            self.container_name = container_name;
        }
        if let Some(gpus) = file.gpus {
            self.gpus = gpus;
        }
        if let Some(dry_run) = file.dry_run {
            self.dry_run = dry_run;
        }
        if let Some(host) = file.reverse_proxy_host {
            self.reverse_proxy_host = host;
        }
        if let Some(extra) = file.extra_docker_run_args {
            self.extra_docker_run_args = extra;
        }
    }

    /// Load `path` and merge it over the current values
    pub fn merge_file(&mut self, path: &Path) -> Result<()> {
        let file = ConfigFile::load(path)?;
        log::debug!("applying config overrides from {}", path.display());
        self.merge(file);
        Ok(())
    }

    pub fn validate(self) -> Result<SessionConfig> {
        let username = self.username.trim().to_string();
        if username.is_empty() {
            return Err(GuestError::Validation("Username must be specified".to_string()));
        }
        validate_username(&username)?;

        if self.public_key.trim().is_empty() {
            return Err(GuestError::Validation("Public key must be specified".to_string()));
        }

        let port = match self.port {
            p if p < 0 => None,
            p => match u16::try_from(p) {
                Ok(0) | Err(_) => {
                    return Err(GuestError::Validation(format!(
                        "port must be between 1 and 65535, got {}",
                        p
                    )))
                }
                Ok(p) => Some(p),
            },
        };

        if self.container_name.trim().is_empty() {
            return Err(GuestError::Validation("Container image must not be empty".to_string()));
        }

        let reverse_proxy_host = match self.reverse_proxy_host.trim() {
            "" => None,
            host => Some(host.to_string()),
        };

        Ok(SessionConfig {
            username,
            port,
            public_key: self.public_key,
            image: self.container_name.trim().to_string(),
            gpus: self.gpus.trim().to_string(),
            dry_run: self.dry_run,
            reverse_proxy_host,
            extra_run_args: self.extra_docker_run_args.trim().to_string(),
        })
    }
}

/// Usernames must map (spaces to `_`) onto a lowercase identifier that is
/// safe as a directory name, an image tag and a shell word.
fn validate_username(username: &str) -> Result<()> {
    if !is_valid_owner(&owner_name(username)) {
        return Err(GuestError::Validation(format!(
            "username must be lowercase letters, digits, '_', '.' or '-' and start with a letter or digit: {:?}",
            username
        )));
    }
    Ok(())
}

/// Validated settings for one provisioning run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    pub username: String,
    /// `None` requests automatic allocation
    pub port: Option<u16>,
    pub public_key: String,
    pub image: String,
    pub gpus: String,
    pub dry_run: bool,
    pub reverse_proxy_host: Option<String>,
    pub extra_run_args: String,
}
