//! `robots.txt` generation.
//!
//! Stable and local builds let crawlers in (minus `[robots] disallow`);
//! test deployments keep them out entirely so they never compete with the
//! stable site in search results.

use crate::{config::SiteConfig, log};
use anyhow::{Context, Result};
use std::fs;

pub const ROBOTS_FILE: &str = "robots.txt";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RobotsPolicy {
    Allow,
    Deny,
}

impl RobotsPolicy {
    pub const fn name(self) -> &'static str {
        match self {
            Self::Allow => "allow",
            Self::Deny => "deny",
        }
    }
}

pub fn render_robots(policy: RobotsPolicy, config: &SiteConfig) -> String {
    let mut out = String::from("User-agent: *\n");
    match policy {
        RobotsPolicy::Allow => {
            for path in &config.robots.disallow {
                out.push_str("Disallow: ");
                out.push_str(path);
                out.push('\n');
            }
        }
        RobotsPolicy::Deny => out.push_str("Disallow: /\n"),
    }
    out
}

pub fn write_robots(policy: RobotsPolicy, config: &SiteConfig) -> Result<()> {
    let output = &config.build.output;
    fs::create_dir_all(output)?;

    let path = output.join(ROBOTS_FILE);
    fs::write(&path, render_robots(policy, config))
        .with_context(|| format!("Failed to write {}", path.display()))?;

    log!("robots"; "{}", policy.name());
    Ok(())
}
