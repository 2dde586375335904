//! Command-line interface definitions.
//!
//! Every subcommand is a named task: an ordered chain of build steps (see
//! `tasks::chain_for`). Running without a task prints help.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// docsmith build & deploy CLI
#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None, arg_required_else_help = true)]
pub struct Cli {
    /// Project root directory (default: current directory)
    #[arg(short, long, global = true)]
    pub root: Option<PathBuf>,

    /// Config file name, relative to the root
    #[arg(short = 'C', long, global = true, default_value = "docsmith.toml")]
    pub config: PathBuf,

    /// Output directory path (relative to project root)
    #[arg(short, long, global = true)]
    pub output: Option<PathBuf>,

    /// Minify CSS, HTML and JSON outputs
    #[arg(short, long, global = true, action = clap::ArgAction::Set, num_args = 0..=1, default_missing_value = "true", require_equals = false)]
    pub minify: Option<bool>,

    /// task to run
    #[command(subcommand)]
    pub command: Commands,
}

/// Available tasks
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Build the project into the output directory
    Build,

    /// Deploy a stable version (requires a clean checkout of the stable branch)
    Deploy,

    /// Deploy a test version that crawlers are told to ignore
    Remote,

    /// Build and serve the project locally
    #[command(visible_alias = "local")]
    Run {
        /// Interface to bind on
        #[arg(short, long)]
        interface: Option<String>,

        /// Port to listen on
        #[arg(short, long)]
        port: Option<u16>,

        /// Rebuild when sources change
        #[arg(short, long, action = clap::ArgAction::Set, num_args = 0..=1, default_missing_value = "true", require_equals = false)]
        watch: Option<bool>,
    },

    /// Build, then rebuild whenever sources change
    Watch,

    /// Print the version label a deployment would use
    Version,
}

impl Commands {
    /// Tasks that hand the output to the hosting platform.
    pub const fn is_deploying(&self) -> bool {
        matches!(self, Self::Deploy | Self::Remote)
    }
}
