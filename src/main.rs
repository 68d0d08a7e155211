//! guestctl CLI - provision per-user guest container sessions

use std::io::IsTerminal;
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::Parser;
use guestctl::cli::{Args, CreateArgs, SubCommand};
use guestctl::config::RawSessionConfig;
use guestctl::registry::{base_port, host_identity};
use guestctl::script::DEFAULT_RUNTIME;
use guestctl::session::{FixedDecision, OverwriteDecision, PromptDecision};
use guestctl::{format_output, DockerRuntime, Orchestrator, OutputFormat, Report, ScriptGenerator};

/// Sessions live under `<root>/connections`
const SESSIONS_DIR: &str = "connections";
const DEFAULT_TEMPLATE: &str = "Dockerfile.template";

fn main() {
    let args = Args::parse();

    let log_level = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();

    if let Err(e) = run(args) {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run(args: Args) -> anyhow::Result<()> {
    let output_format = if args.json { OutputFormat::Json } else { OutputFormat::Human };
    let sessions_dir = args.root.join(SESSIONS_DIR);

    let report = match args.command {
        SubCommand::Create(create) => {
            let config = session_config(&create)?;
            let template = create
                .template
                .clone()
                .unwrap_or_else(|| args.root.join(DEFAULT_TEMPLATE));
            let orchestrator = open(&sessions_dir, template, &create.runtime)?;
            let mut decision = overwrite_decision(&create);
            let report = orchestrator.provision(&config, decision.as_mut())?;
            Report::Provisioned(report)
        }

        SubCommand::List => {
            let orchestrator = attach(&sessions_dir, args.root.join(DEFAULT_TEMPLATE));
            Report::Sessions {
                sessions: orchestrator.list()?,
            }
        }

        SubCommand::Remove { username, port, keep_running } => {
            let orchestrator = attach(&sessions_dir, args.root.join(DEFAULT_TEMPLATE));
            Report::Removed(orchestrator.remove(&username, port, !keep_running)?)
        }
    };

    println!("{}", format_output(&report, &output_format));
    Ok(())
}

fn host_base_port() -> u16 {
    let host = host_identity();
    let base = base_port(&host);
    log::debug!("host {} has base port {}", host, base);
    base
}

/// Orchestrator for provisioning; creates the session storage
fn open(sessions_dir: &Path, template: PathBuf, runtime: &str) -> anyhow::Result<Orchestrator<DockerRuntime>> {
    Orchestrator::open(
        sessions_dir,
        template,
        host_base_port(),
        ScriptGenerator::new(runtime),
        DockerRuntime::new(runtime),
    )
    .with_context(|| format!("opening session storage at {}", sessions_dir.display()))
}

/// Orchestrator for `list` and `remove`, which never create storage
fn attach(sessions_dir: &Path, template: PathBuf) -> Orchestrator<DockerRuntime> {
    Orchestrator::new(
        sessions_dir,
        template,
        host_base_port(),
        ScriptGenerator::new(DEFAULT_RUNTIME),
        DockerRuntime::new(DEFAULT_RUNTIME),
    )
}

fn session_config(create: &CreateArgs) -> anyhow::Result<guestctl::SessionConfig> {
    let mut raw = RawSessionConfig::from(create);
    if let Some(path) = &create.config {
        raw.merge_file(path)
            .with_context(|| format!("loading config {}", path.display()))?;
    }
    Ok(raw.validate()?)
}

fn overwrite_decision(create: &CreateArgs) -> Box<dyn OverwriteDecision> {
    if create.yes {
        Box::new(FixedDecision(true))
    } else if create.no_overwrite || !std::io::stdin().is_terminal() {
        Box::new(FixedDecision(false))
    } else {
        Box::new(PromptDecision::stdio())
    }
}
