//! On-disk session storage
//!
//! Every session owns one directory under the store root, named after its
//! [`SessionKey`]. The store creates, reseeds and removes those directories;
//! nothing else writes into them.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use super::decision::OverwriteDecision;
use super::types::SessionKey;
use crate::error::{GuestError, Result};
use crate::runtime::ContainerRuntime;
use crate::script::{GeneratedScript, STOP_SCRIPT};

pub const DOCKERFILE: &str = "Dockerfile";
pub const AUTHORIZED_KEYS: &str = "authorized_keys";

/// A freshly created, empty session directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionHandle {
    path: PathBuf,
}

impl SessionHandle {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Result of handling a session that already exists
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConflictResolution {
    Recreated(SessionHandle),
    Aborted,
}

#[derive(Debug, Clone)]
pub struct SessionStore {
    root: PathBuf,
}

impl SessionStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Like [`SessionStore::new`], creating the root directory first
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let store = Self::new(root);
        fs::create_dir_all(&store.root)?;
        Ok(store)
    }

    pub fn path(&self, key: &SessionKey) -> PathBuf {
        self.root.join(key.as_str())
    }

    pub fn exists(&self, key: &SessionKey) -> bool {
        self.path(key).exists()
    }

    /// Create the session directory. Fails with `SessionExists` if it is
    /// already there.
    pub fn create(&self, key: &SessionKey) -> Result<SessionHandle> {
        let path = self.path(key);
        match fs::create_dir(&path) {
            Ok(()) => {
                log::debug!("created session directory {}", path.display());
                Ok(SessionHandle { path })
            }
            Err(err) if err.kind() == ErrorKind::AlreadyExists => {
                Err(GuestError::SessionExists(key.to_string()))
            }
            Err(err) => Err(GuestError::Io(err)),
        }
    }

    /// Handle an existing session: on a confirmed overwrite stop its
    /// workload (best-effort), wipe the directory and recreate it empty.
    pub fn resolve_conflict(
        &self,
        key: &SessionKey,
        decision: &mut dyn OverwriteDecision,
        runtime: &dyn ContainerRuntime,
    ) -> Result<ConflictResolution> {
        if !decision.confirm_overwrite(key)? {
            log::info!("keeping existing session {}", key);
            return Ok(ConflictResolution::Aborted);
        }

        self.stop_workload(key, runtime);
        self.remove(key)?;
        log::info!("recreating session {}", key);
        Ok(ConflictResolution::Recreated(self.create(key)?))
    }

    /// Run the session's stop script if it has one. Failures are logged and
    /// otherwise ignored; returns whether the script succeeded.
    pub fn stop_workload(&self, key: &SessionKey, runtime: &dyn ContainerRuntime) -> bool {
        let path = self.path(key);
        if !path.join(STOP_SCRIPT).is_file() {
            log::debug!("no stop script in {}, nothing to stop", path.display());
            return false;
        }
        match runtime.run_script(&path, STOP_SCRIPT) {
            Ok(()) => true,
            Err(e) => {
                log::warn!("could not stop session {}: {}", key, e);
                false
            }
        }
    }

    /// Copy the build template and write the public key
    pub fn write_seed(&self, handle: &SessionHandle, template: &Path, public_key: &str) -> Result<()> {
        if !template.is_file() {
            return Err(GuestError::TemplateNotFound(template.display().to_string()));
        }
        fs::copy(template, handle.path.join(DOCKERFILE))?;
        fs::write(handle.path.join(AUTHORIZED_KEYS), public_key)?;
        Ok(())
    }

    /// Write the lifecycle scripts and mark them executable
    pub fn write_scripts(&self, handle: &SessionHandle, scripts: &[GeneratedScript]) -> Result<()> {
        for script in scripts {
            let path = handle.path.join(script.name);
            fs::write(&path, &script.contents)?;
            make_executable(&path)?;
        }
        Ok(())
    }

    /// Recursively remove the session directory
    pub fn remove(&self, key: &SessionKey) -> Result<()> {
        let path = self.path(key);
        match fs::remove_dir_all(&path) {
            Ok(()) => {
                log::debug!("removed session directory {}", path.display());
                Ok(())
            }
            Err(err) if err.kind() == ErrorKind::NotFound => {
                Err(GuestError::SessionNotFound(key.to_string()))
            }
            Err(err) => Err(GuestError::Io(err)),
        }
    }
}

#[cfg(unix)]
fn make_executable(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o755))?;
    Ok(())
}

#[cfg(not(unix))]
fn make_executable(_path: &Path) -> Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::FixedDecision;
    use crate::session::Session;
    use std::cell::RefCell;
    use tempfile::TempDir;

    #[derive(Default)]
    struct StopRecorder {
        scripts: RefCell<Vec<String>>,
        fail: bool,
    }

    impl ContainerRuntime for StopRecorder {
        fn build(&self, _session_dir: &Path, _session: &Session) -> Result<()> {
            Ok(())
        }

        fn run_script(&self, _session_dir: &Path, script: &str) -> Result<()> {
            self.scripts.borrow_mut().push(script.to_string());
            if self.fail {
                return Err(GuestError::Runtime {
                    step: script.to_string(),
                    message: "container not running".to_string(),
                });
            }
            Ok(())
        }
    }

    fn store(temp_dir: &TempDir) -> SessionStore {
        SessionStore::open(temp_dir.path().join("connections")).unwrap()
    }

    fn file_names(path: &Path) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(path)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn test_create_twice_fails() {
        let temp_dir = TempDir::new().unwrap();
        let store = store(&temp_dir);
        let key = SessionKey::new("alice", 32041);

        let handle = store.create(&key).unwrap();
        assert!(handle.path().is_dir());
        assert!(matches!(store.create(&key), Err(GuestError::SessionExists(_))));
    }

    #[test]
    fn test_overwrite_leaves_empty_directory() {
        let temp_dir = TempDir::new().unwrap();
        let store = store(&temp_dir);
        let key = SessionKey::new("alice", 33000);
        let handle = store.create(&key).unwrap();
        fs::write(handle.path().join(STOP_SCRIPT), "#!/bin/sh\n").unwrap();
        fs::write(handle.path().join("leftover.txt"), "old").unwrap();

        let runtime = StopRecorder::default();
        let resolution = store
            .resolve_conflict(&key, &mut FixedDecision(true), &runtime)
            .unwrap();

        let ConflictResolution::Recreated(handle) = resolution else {
            panic!("expected the session to be recreated");
        };
        assert!(file_names(handle.path()).is_empty());
        assert_eq!(*runtime.scripts.borrow(), vec![STOP_SCRIPT.to_string()]);
    }

    #[test]
    fn test_declined_overwrite_touches_nothing() {
        let temp_dir = TempDir::new().unwrap();
        let store = store(&temp_dir);
        let key = SessionKey::new("alice", 32041);
        let handle = store.create(&key).unwrap();
        fs::write(handle.path().join("authorized_keys"), "ssh-rsa AAAA").unwrap();

        let runtime = StopRecorder::default();
        let resolution = store
            .resolve_conflict(&key, &mut FixedDecision(false), &runtime)
            .unwrap();

        assert_eq!(resolution, ConflictResolution::Aborted);
        assert_eq!(file_names(handle.path()), vec!["authorized_keys"]);
        assert!(runtime.scripts.borrow().is_empty());
    }

    #[test]
    fn test_failed_stop_does_not_block_overwrite() {
        let temp_dir = TempDir::new().unwrap();
        let store = store(&temp_dir);
        let key = SessionKey::new("alice", 32041);
        let handle = store.create(&key).unwrap();
        fs::write(handle.path().join(STOP_SCRIPT), "#!/bin/sh\nexit 1\n").unwrap();

        let runtime = StopRecorder {
            fail: true,
            ..Default::default()
        };
        let resolution = store
            .resolve_conflict(&key, &mut FixedDecision(true), &runtime)
            .unwrap();
        assert!(matches!(resolution, ConflictResolution::Recreated(_)));
    }

    #[test]
    fn test_write_seed_and_scripts() {
        let temp_dir = TempDir::new().unwrap();
        let store = store(&temp_dir);
        let template = temp_dir.path().join("Dockerfile.template");
        fs::write(&template, "ARG CONTAINER_VERSION\nFROM ${CONTAINER_VERSION}\n").unwrap();

        let handle = store.create(&SessionKey::new("alice", 32041)).unwrap();
        store.write_seed(&handle, &template, "ssh-ed25519 AAAA").unwrap();
        store
            .write_scripts(
                &handle,
                &[GeneratedScript {
                    name: STOP_SCRIPT,
                    contents: "#!/usr/bin/env bash\n".to_string(),
                }],
            )
            .unwrap();

        assert_eq!(
            fs::read_to_string(handle.path().join(AUTHORIZED_KEYS)).unwrap(),
            "ssh-ed25519 AAAA"
        );
        assert!(fs::read_to_string(handle.path().join(DOCKERFILE))
            .unwrap()
            .starts_with("ARG CONTAINER_VERSION"));

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = fs::metadata(handle.path().join(STOP_SCRIPT))
                .unwrap()
                .permissions()
                .mode();
            assert_eq!(mode & 0o777, 0o755);
        }
    }

    #[test]
    fn test_write_seed_missing_template() {
        let temp_dir = TempDir::new().unwrap();
        let store = store(&temp_dir);
        let handle = store.create(&SessionKey::new("alice", 32041)).unwrap();
        let result = store.write_seed(&handle, &temp_dir.path().join("missing"), "key");
        assert!(matches!(result, Err(GuestError::TemplateNotFound(_))));
    }

    #[test]
    fn test_remove_missing_session() {
        let temp_dir = TempDir::new().unwrap();
        let store = store(&temp_dir);
        let result = store.remove(&SessionKey::new("nobody", 1));
        assert!(matches!(result, Err(GuestError::SessionNotFound(_))));
    }
}
