//! Pure port allocation rules

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use sysinfo::System;

use crate::error::{GuestError, Result};

/// Lowest base port any host can derive
const BASE_PORT_FLOOR: u16 = 32000;

/// Number of distinct base ports; consecutive bases are 10 ports apart
const BASE_PORT_BUCKETS: u64 = 1000;
const BASE_PORT_STRIDE: u64 = 10;

/// Live allocations, port to owning username
pub type PortMap = BTreeMap<u16, String>;

/// Outcome of checking a requested port against the registry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PortStatus {
    Available,
    InUseBySelf,
    InUseByOther(String),
}

/// Per-host starting port: the first 8 bytes of SHA-256(host identity) as a
/// little-endian integer, reduced into `[32000, 42000)` in steps of 10.
pub fn base_port(host_identity: &str) -> u16 {
    let digest = Sha256::digest(host_identity.as_bytes());
    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&digest[..8]);
    let bucket = u64::from_le_bytes(prefix) % BASE_PORT_BUCKETS;
    // At most 999 * 10 + 32000 = 41990, always a valid u16
    (bucket * BASE_PORT_STRIDE + u64::from(BASE_PORT_FLOOR)) as u16
}

/// Identity of the local host used for [`base_port`]
pub fn host_identity() -> String {
    System::host_name()
        .filter(|name| !name.trim().is_empty())
        .unwrap_or_else(|| "localhost".to_string())
}

/// Next port for automatic allocation.
///
/// Returns `base` on an empty registry, otherwise one past the highest of the
/// allocated ports and `base`. Lower gaps are never reused.
pub fn next_port(existing: &PortMap, base: u16) -> Result<u16> {
    let Some(&highest) = existing.keys().next_back() else {
        return Ok(base);
    };
    let highest = highest.max(base);
    highest
        .checked_add(1)
        .ok_or(GuestError::PortsExhausted(highest))
}

/// Check `requested` against the registry. `None` is an auto-assign request
/// and is always available; the caller picks the port with [`next_port`].
pub fn resolve(requested: Option<u16>, username: &str, existing: &PortMap) -> PortStatus {
    let Some(port) = requested else {
        return PortStatus::Available;
    };
    match existing.get(&port) {
        None => PortStatus::Available,
        Some(owner) if owner == username => PortStatus::InUseBySelf,
        Some(owner) => PortStatus::InUseByOther(owner.clone()),
    }
}
