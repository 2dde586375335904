//! docsmith - build and deploy tool for sitemap-driven documentation sites.

mod build;
mod cli;
mod config;
mod deploy;
mod generator;
mod serve;
mod tasks;
mod utils;
mod watch;

use anyhow::{Result, bail};
use clap::Parser;
use cli::Cli;
use config::SiteConfig;
use deploy::Gcloud;
use std::path::Path;
use tasks::{Runner, chain_for};
use utils::git::GitRepo;

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli)?;

    let vcs = GitRepo::new(config.get_root()).ignoring(&config.build.output);
    let platform = Gcloud::new(&config);

    Runner::new(&config, &vcs, &platform).run(&chain_for(&cli.command))
}

/// Load and validate configuration from CLI arguments
fn load_config(cli: &Cli) -> Result<SiteConfig> {
    let root = cli.root.as_deref().unwrap_or(Path::new("./"));
    let config_path = root.join(&cli.config);

    if !config_path.exists() {
        bail!("Config file `{}` not found.", config_path.display());
    }

    let mut config = SiteConfig::from_path(&config_path)?;
    config.update_with_cli(cli);
    config.validate(&cli.command)?;

    Ok(config)
}
