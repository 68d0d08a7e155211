//! External container runtime
//!
//! Building the session image and running its lifecycle scripts are handed
//! to an external CLI. The [`ContainerRuntime`] trait is the seam; failures
//! are reported as-is and never retried.

mod docker;

use std::path::Path;

pub use docker::DockerRuntime;

use crate::error::Result;
use crate::session::Session;

pub trait ContainerRuntime {
    /// Build the session image from the seeded session directory
    fn build(&self, session_dir: &Path, session: &Session) -> Result<()>;

    /// Run one of the generated scripts from inside the session directory
    fn run_script(&self, session_dir: &Path, script: &str) -> Result<()>;
}
