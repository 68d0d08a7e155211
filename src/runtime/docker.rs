//! Docker-compatible CLI runtime

use std::path::Path;
use std::process::Command;

use super::ContainerRuntime;
use crate::error::{GuestError, Result};
use crate::script::DEFAULT_RUNTIME;
use crate::session::Session;

/// Runs `docker` (or a CLI-compatible binary such as `podman`)
#[derive(Debug, Clone)]
pub struct DockerRuntime {
    binary: String,
}

impl Default for DockerRuntime {
    fn default() -> Self {
        Self::new(DEFAULT_RUNTIME)
    }
}

impl DockerRuntime {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    /// Arguments of the image build for `session`
    pub fn build_args(session: &Session) -> Vec<String> {
        vec![
            "build".to_string(),
            "--build-arg".to_string(),
            format!("USERNAME={}", session.username),
            "--build-arg".to_string(),
            format!("CONTAINER_VERSION={}", session.image),
            "-t".to_string(),
            session.key().to_string(),
            ".".to_string(),
        ]
    }
}

fn run(mut cmd: Command, step: String) -> Result<()> {
    log::debug!("running {:?}", cmd);
    let status = cmd.status().map_err(|e| GuestError::Runtime {
        step: step.clone(),
        message: e.to_string(),
    })?;
    if status.success() {
        Ok(())
    } else {
        Err(GuestError::Runtime {
            step,
            message: format!("exited with {}", status),
        })
    }
}

impl ContainerRuntime for DockerRuntime {
    fn build(&self, session_dir: &Path, session: &Session) -> Result<()> {
        let mut cmd = Command::new(&self.binary);
        cmd.args(Self::build_args(session)).current_dir(session_dir);
        run(cmd, format!("{} build", self.binary))
    }

    fn run_script(&self, session_dir: &Path, script: &str) -> Result<()> {
        let mut cmd = Command::new(session_dir.join(script));
        cmd.current_dir(session_dir);
        run(cmd, script.to_string())
    }
}
