//! Output formatting

use serde::Serialize;

use crate::orchestrator::{ProvisionReport, RemovalReport};
use crate::output::human::format_human;
use crate::output::json::format_json;
use crate::registry::RegistryEntry;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Human,
    Json,
}

/// Anything a command prints on success
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Report {
    Provisioned(ProvisionReport),
    Sessions { sessions: Vec<RegistryEntry> },
    Removed(RemovalReport),
}

pub fn format_output(report: &Report, format: &OutputFormat) -> String {
    match format {
        OutputFormat::Human => format_human(report),
        OutputFormat::Json => format_json(report),
    }
}
