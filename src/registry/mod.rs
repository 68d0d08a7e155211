//! Port registry
//!
//! Tracks which ports are allocated to which users and hands out new ones:
//! - pure allocation rules (base port, next port, conflict resolution)
//! - atomic claim records that close the scan-then-create race
//! - the registry view over session directories and claims

mod claims;
mod port_registry;
mod ports;

pub use claims::{ClaimAttempt, ClaimGuard, ClaimRecord, ClaimStore};
pub use port_registry::{parse_session_name, PortRegistry, RegistryEntry, CLAIMS_DIR};
pub use ports::{base_port, host_identity, next_port, resolve, PortMap, PortStatus};
