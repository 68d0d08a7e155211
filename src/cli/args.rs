//! CLI argument parsing

use clap::{Args as ClapArgs, Parser, Subcommand};
use std::path::PathBuf;

use crate::config::{RawSessionConfig, DEFAULT_IMAGE};
use crate::script::DEFAULT_RUNTIME;

#[derive(Parser)]
#[command(name = "guestctl")]
#[command(author, version, about = "Provision per-user guest container sessions", long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: SubCommand,

    /// Directory holding `connections/` and the default Dockerfile template
    #[arg(long, global = true, env = "GUESTCTL_ROOT", default_value = ".")]
    pub root: PathBuf,

    /// Output format as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum SubCommand {
    /// Allocate a port and create a session for a user
    Create(CreateArgs),

    /// List allocated ports and their sessions
    List,

    /// Stop and delete a session, releasing its port
    Remove {
        #[arg(short, long)]
        username: String,

        #[arg(short, long)]
        port: u16,

        /// Do not run the session's stop script first
        #[arg(long)]
        keep_running: bool,
    },
}

#[derive(ClapArgs, Debug, Clone)]
pub struct CreateArgs {
    #[arg(short, long, default_value = "")]
    pub username: String,

    /// Port to allocate; negative picks the next free one
    #[arg(short, long, default_value_t = -1, allow_negative_numbers = true)]
    pub port: i64,

    /// Public SSH key as a string
    #[arg(short = 'k', long, default_value = "")]
    pub public_key: String,

    /// Base image of the session container
    #[arg(short, long, default_value = DEFAULT_IMAGE)]
    pub container_name: String,

    /// Value for `docker run --gpus`, empty for none
    #[arg(short, long, default_value = "")]
    pub gpus: String,

    /// Build the image but do not start the container
    #[arg(short = 'n', long)]
    pub dry_run: bool,

    /// Host to use for the reverse tunnel. Use ~/.ssh/config for anything
    /// more complicated than a host name.
    #[arg(short = 'H', long, default_value = "")]
    pub reverse_proxy_host: String,

    /// JSON file overriding any of the options above
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Extra arguments for `docker run` when creating the container
    #[arg(long, default_value = "", allow_hyphen_values = true)]
    pub extra_docker_run_args: String,

    /// Dockerfile template [default: <root>/Dockerfile.template]
    #[arg(long)]
    pub template: Option<PathBuf>,

    /// Container runtime CLI
    #[arg(long, default_value = DEFAULT_RUNTIME)]
    pub runtime: String,

    /// Overwrite an existing session without asking
    #[arg(short, long, conflicts_with = "no_overwrite")]
    pub yes: bool,

    /// Keep an existing session without asking
    #[arg(long)]
    pub no_overwrite: bool,
}

impl From<&CreateArgs> for RawSessionConfig {
    fn from(args: &CreateArgs) -> Self {
        Self {
            username: args.username.clone(),
            port: args.port,
            public_key: args.public_key.clone(),
            container_name: args.container_name.clone(),
            gpus: args.gpus.clone(),
            dry_run: args.dry_run,
            reverse_proxy_host: args.reverse_proxy_host.clone(),
            extra_docker_run_args: args.extra_docker_run_args.clone(),
        }
    }
}
