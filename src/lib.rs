//! guestctl - provision per-user guest container sessions
//!
//! Each session binds one user to one host port. guestctl allocates the port,
//! creates the session directory with its build inputs and lifecycle scripts,
//! then hands off to an external container runtime to build and start it.
//!
//! # Example
//!
//! ```no_run
//! use guestctl::config::RawSessionConfig;
//! use guestctl::registry::{base_port, host_identity};
//! use guestctl::session::FixedDecision;
//! use guestctl::{DockerRuntime, Orchestrator, ScriptGenerator};
//! use std::path::Path;
//!
//! let config = RawSessionConfig {
//!     username: "alice".to_string(),
//!     public_key: "ssh-ed25519 AAAA alice@laptop".to_string(),
//!     ..Default::default()
//! }
//! .validate()
//! .unwrap();
//!
//! let orchestrator = Orchestrator::open(
//!     Path::new("connections"),
//!     "Dockerfile.template",
//!     base_port(&host_identity()),
//!     ScriptGenerator::default(),
//!     DockerRuntime::default(),
//! )
//! .unwrap();
//! let report = orchestrator.provision(&config, &mut FixedDecision(false)).unwrap();
//! println!("{} on port {}", report.username, report.port);
//! ```

pub mod cli;
pub mod config;
pub mod error;
pub mod orchestrator;
pub mod output;
pub mod registry;
pub mod runtime;
pub mod script;
pub mod session;

pub use config::SessionConfig;
pub use error::{GuestError, Result};
pub use orchestrator::{Orchestrator, ProvisionReport, ProvisionState};
pub use output::{format_output, OutputFormat, Report};
pub use registry::PortRegistry;
pub use runtime::{ContainerRuntime, DockerRuntime};
pub use script::ScriptGenerator;
pub use session::{Session, SessionKey, SessionStore};
