//! Session provisioning
//!
//! The orchestrator drives one session through
//! `Requested → PortResolved → DirectoryPrepared → ScriptsWritten → ImageBuilt → Running`.
//! A port owned by someone else stops the run before anything is written.
//! A declined overwrite ends in `Aborted`, which is not an error. Every
//! later step is one-shot: the first failure ends the run.
//!
//! Storage is only reached through [`PortRegistry`] and [`SessionStore`], and
//! the outside world only through [`ContainerRuntime`].

mod report;

use std::path::{Path, PathBuf};

pub use report::{ProvisionReport, ProvisionState, RemovalReport};

use crate::config::SessionConfig;
use crate::error::{GuestError, Result};
use crate::registry::{PortRegistry, PortStatus, RegistryEntry};
use crate::runtime::ContainerRuntime;
use crate::script::{ScriptGenerator, START_SCRIPT};
use crate::session::{
    owner_name, ConflictResolution, OverwriteDecision, Session, SessionKey, SessionStore,
};

/// Tracks and logs state transitions of one run
#[derive(Debug)]
struct Progress {
    state: ProvisionState,
}

impl Progress {
    fn new() -> Self {
        Self {
            state: ProvisionState::Requested,
        }
    }

    fn advance(&mut self, next: ProvisionState) {
        log::debug!("{} -> {}", self.state, next);
        self.state = next;
    }
}

pub struct Orchestrator<R> {
    registry: PortRegistry,
    store: SessionStore,
    generator: ScriptGenerator,
    runtime: R,
    template: PathBuf,
}

impl<R: ContainerRuntime> Orchestrator<R> {
    /// Attach to `sessions_dir` without creating anything. Suits read-only
    /// use (`list`) and teardown; provisioning wants [`Orchestrator::open`].
    pub fn new(
        sessions_dir: &Path,
        template: impl Into<PathBuf>,
        base_port: u16,
        generator: ScriptGenerator,
        runtime: R,
    ) -> Self {
        Self {
            registry: PortRegistry::new(sessions_dir, base_port),
            store: SessionStore::new(sessions_dir),
            generator,
            runtime,
            template: template.into(),
        }
    }

    /// Open the registry and store over `sessions_dir`, creating both
    pub fn open(
        sessions_dir: &Path,
        template: impl Into<PathBuf>,
        base_port: u16,
        generator: ScriptGenerator,
        runtime: R,
    ) -> Result<Self> {
        let store = SessionStore::open(sessions_dir)?;
        let registry = PortRegistry::open(sessions_dir, base_port)?;
        Ok(Self {
            registry,
            store,
            generator,
            runtime,
            template: template.into(),
        })
    }

    pub fn registry(&self) -> &PortRegistry {
        &self.registry
    }

    pub fn runtime(&self) -> &R {
        &self.runtime
    }

    /// Provision one session
    pub fn provision(
        &self,
        config: &SessionConfig,
        decision: &mut dyn OverwriteDecision,
    ) -> Result<ProvisionReport> {
        let mut progress = Progress::new();
        let result = self.run_provision(config, decision, &mut progress);
        if let Err(e) = &result {
            log::error!("provisioning for {} failed after {}: {}", config.username, progress.state, e);
            progress.advance(ProvisionState::Failed);
        }
        result
    }

    fn run_provision(
        &self,
        config: &SessionConfig,
        decision: &mut dyn OverwriteDecision,
        progress: &mut Progress,
    ) -> Result<ProvisionReport> {
        let owner = owner_name(&config.username);
        let existing = self.registry.scan()?;

        if let PortStatus::InUseByOther(holder) = self.registry.resolve(config.port, &owner, &existing) {
            // `InUseByOther` is only reported for explicit requests
            return Err(GuestError::PortConflict {
                port: config.port.unwrap_or_default(),
                owner: holder,
            });
        }
        let port = match config.port {
            Some(port) => port,
            None => self.registry.next_port(&existing)?,
        };
        let claim = self.registry.claim(port, &owner)?;

        let session = Session::from_config(config, port);
        let key = session.key();
        progress.advance(ProvisionState::PortResolved);

        let handle = match self.store.create(&key) {
            Ok(handle) => handle,
            Err(GuestError::SessionExists(_)) => {
                match self.store.resolve_conflict(&key, decision, &self.runtime)? {
                    ConflictResolution::Recreated(handle) => handle,
                    ConflictResolution::Aborted => {
                        progress.advance(ProvisionState::Aborted);
                        return Ok(self.report(&session, ProvisionState::Aborted));
                    }
                }
            }
            Err(e) => return Err(e),
        };
        claim.commit();
        progress.advance(ProvisionState::DirectoryPrepared);

        self.store.write_seed(&handle, &self.template, &session.public_key)?;
        self.store.write_scripts(&handle, &self.generator.generate(&session))?;
        progress.advance(ProvisionState::ScriptsWritten);

        log::info!("building image {}", key);
        self.runtime.build(handle.path(), &session)?;
        progress.advance(ProvisionState::ImageBuilt);

        if session.dry_run {
            log::info!("dry run, not starting {}", key);
            return Ok(self.report(&session, ProvisionState::ImageBuilt));
        }

        self.runtime.run_script(handle.path(), START_SCRIPT)?;
        progress.advance(ProvisionState::Running);
        Ok(self.report(&session, ProvisionState::Running))
    }

    fn report(&self, session: &Session, state: ProvisionState) -> ProvisionReport {
        let key = session.key();
        ProvisionReport {
            username: session.username.clone(),
            port: session.port,
            session_dir: self.store.path(&key),
            key,
            state,
        }
    }

    /// Registry rows, including claims not backed by a session
    pub fn list(&self) -> Result<Vec<RegistryEntry>> {
        self.registry.entries()
    }

    /// Tear down a session: stop it (unless `stop` is false), remove its
    /// directory and release its claim
    pub fn remove(&self, username: &str, port: u16, stop: bool) -> Result<RemovalReport> {
        let owner = owner_name(username);
        let key = SessionKey::new(username, port);

        match self.registry.resolve(Some(port), &owner, &self.registry.scan()?) {
            PortStatus::Available => return Err(GuestError::SessionNotFound(key.to_string())),
            PortStatus::InUseByOther(holder) => {
                return Err(GuestError::PortConflict { port, owner: holder })
            }
            PortStatus::InUseBySelf => {}
        }

        let has_session = self.store.exists(&key);
        let stopped = stop && has_session && self.store.stop_workload(&key, &self.runtime);
        if has_session {
            self.store.remove(&key)?;
        }
        let released_claim = self.registry.release(port)?;
        log::info!("removed session {}", key);

        Ok(RemovalReport {
            username: owner,
            port,
            key,
            stopped,
            removed_session: has_session,
            released_claim,
        })
    }
}
