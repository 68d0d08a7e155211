//! Error types for guestctl

use thiserror::Error;

#[derive(Error, Debug)]
pub enum GuestError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Port {port} is already in use by '{owner}'")]
    PortConflict { port: u16, owner: String },

    #[error("No free port above {0}")]
    PortsExhausted(u16),

    #[error("Session '{0}' already exists")]
    SessionExists(String),

    #[error("Session '{0}' does not exist")]
    SessionNotFound(String),

    #[error("Template not found: {0}")]
    TemplateNotFound(String),

    #[error("{step} failed: {message}")]
    Runtime { step: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, GuestError>;
