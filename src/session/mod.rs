//! Guest container sessions
//!
//! A session is one user bound to one port, materialized as a directory
//! holding its build inputs and lifecycle scripts.

mod decision;
mod store;
mod types;

pub use decision::{FixedDecision, OverwriteDecision, PromptDecision};
pub use store::{ConflictResolution, SessionHandle, SessionStore, AUTHORIZED_KEYS, DOCKERFILE};
pub use types::{is_valid_owner, owner_name, Session, SessionKey, OWNER_PATTERN};
