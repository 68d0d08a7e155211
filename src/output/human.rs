//! Human-readable output formatting

use crate::orchestrator::ProvisionState;
use crate::output::formatter::Report;

pub fn format_human(report: &Report) -> String {
    match report {
        Report::Provisioned(info) => match info.state {
            ProvisionState::Aborted => "Doing nothing, exiting.".to_string(),
            ProvisionState::ImageBuilt => format!(
                "\nCreated a container for user {} on port {}\n\
                 Dry run: image {} built, container not started\n",
                info.username, info.port, info.key
            ),
            _ => format!(
                "\nCreated a container for user {} on port {}\n",
                info.username, info.port
            ),
        },
        Report::Sessions { sessions } => {
            if sessions.is_empty() {
                return "No sessions found".to_string();
            }
            let mut output = String::from("Sessions\n--------\n");
            output.push_str(&format!(
                "{:<7} {:<20} {:<8} {:<25}\n",
                "PORT", "OWNER", "SESSION", "CLAIMED"
            ));
            output.push_str(&"-".repeat(62));
            output.push('\n');
            for entry in sessions {
                output.push_str(&format!(
                    "{:<7} {:<20} {:<8} {:<25}\n",
                    entry.port,
                    truncate(&entry.owner, 20),
                    if entry.has_session { "yes" } else { "no" },
                    entry
                        .claim
                        .as_ref()
                        .map(|c| c.claimed_at.format("%Y-%m-%d %H:%M:%S UTC").to_string())
                        .unwrap_or_else(|| "-".to_string())
                ));
            }
            output
        }
        Report::Removed(info) => {
            let mut output = format!("Removed session {}", info.key);
            if info.stopped {
                output.push_str("\n  container stopped");
            }
            if !info.removed_session {
                output.push_str("\n  no session directory, released the claim only");
            }
            output
        }
    }
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestrator::{ProvisionReport, RemovalReport};
    use crate::registry::RegistryEntry;
    use crate::session::SessionKey;
    use std::path::PathBuf;

    fn provisioned(state: ProvisionState) -> Report {
        Report::Provisioned(ProvisionReport {
            username: "alice".to_string(),
            port: 32041,
            key: SessionKey::new("alice", 32041),
            session_dir: PathBuf::from("connections/alice_32041"),
            state,
        })
    }

    #[test]
    fn test_provisioned_message() {
        let text = format_human(&provisioned(ProvisionState::Running));
        assert!(text.contains("Created a container for user alice on port 32041"));
        assert!(!text.contains("Dry run"));
    }

    #[test]
    fn test_dry_run_message() {
        let text = format_human(&provisioned(ProvisionState::ImageBuilt));
        assert!(text.contains("on port 32041"));
        assert!(text.contains("container not started"));
    }

    #[test]
    fn test_aborted_message() {
        assert_eq!(
            format_human(&provisioned(ProvisionState::Aborted)),
            "Doing nothing, exiting."
        );
    }

    #[test]
    fn test_sessions_table() {
        let report = Report::Sessions {
            sessions: vec![RegistryEntry {
                port: 32041,
                owner: "alice".to_string(),
                has_session: true,
                claim: None,
            }],
        };
        let text = format_human(&report);
        assert!(text.contains("32041"));
        assert!(text.contains("alice"));
        assert!(text.contains("yes"));
    }

    #[test]
    fn test_removed_claim_only() {
        let report = Report::Removed(RemovalReport {
            username: "dave".to_string(),
            port: 32050,
            key: SessionKey::new("dave", 32050),
            stopped: false,
            removed_session: false,
            released_claim: true,
        });
        assert!(format_human(&report).contains("released the claim only"));
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("alice", 20), "alice");
        assert_eq!(truncate("a-very-long-user-name-indeed", 10), "a-very-...");
    }
}
