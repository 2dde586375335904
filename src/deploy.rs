//! Site deployment.
//!
//! Publishing goes through the [`Platform`] trait. [`Gcloud`] shells out to
//! the configured deploy command from inside the output directory.

use crate::{
    config::SiteConfig,
    log,
    utils::exec::{exec, internal::to_cmd_vec},
};
use anyhow::Result;
use std::{
    ffi::OsString,
    path::{Path, PathBuf},
};
use thiserror::Error;

/// Reasons a deployment is refused before anything is published.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DeployError {
    #[error("stable deployments must come from branch `{expected}`, not `{actual}`")]
    WrongBranch { expected: String, actual: String },

    #[error("working tree has uncommitted changes; commit or stash them before deploying")]
    DirtyTree,

    #[error("missing secrets: {}", .0.join(", "))]
    MissingSecrets(Vec<String>),
}

/// What to publish.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployTarget {
    /// Version label; empty lets the platform pick one.
    pub version: String,
    /// Route live traffic to this version (stable only).
    pub promote: bool,
}

impl DeployTarget {
    pub fn stable(version: String) -> Self {
        Self { version, promote: true }
    }

    pub fn test(version: String) -> Self {
        Self { version, promote: false }
    }

    const fn channel(&self) -> &'static str {
        if self.promote { "stable" } else { "test" }
    }
}

pub trait Platform {
    /// Publish the contents of `output`.
    fn deploy(&self, output: &Path, target: &DeployTarget) -> Result<()>;
}

/// Google Cloud deploy CLI (`gcloud app deploy` by default).
#[derive(Debug, Clone)]
pub struct Gcloud {
    command: Vec<String>,
    app_file: PathBuf,
    project: Option<String>,
    quiet: bool,
}

impl Gcloud {
    pub fn new(config: &SiteConfig) -> Self {
        Self {
            command: config.deploy.command.clone(),
            app_file: config.app.file.clone(),
            project: config.deploy.project.clone(),
            quiet: config.deploy.quiet,
        }
    }

    /// Arguments after the command itself. Unset options are left out.
    fn args(&self, target: &DeployTarget) -> Vec<OsString> {
        let mut args = vec![self.app_file.clone().into_os_string()];

        if let Some(project) = self.project.as_deref().filter(|p| !p.is_empty()) {
            args.push("--project".into());
            args.push(project.into());
        }
        if !target.version.is_empty() {
            args.push("--version".into());
            args.push(target.version.as_str().into());
        }
        args.push(if target.promote { "--promote" } else { "--no-promote" }.into());
        if self.quiet {
            args.push("--quiet".into());
        }

        args
    }
}

impl Platform for Gcloud {
    fn deploy(&self, output: &Path, target: &DeployTarget) -> Result<()> {
        log!("deploy"; "{} version `{}`", target.channel(), target.version);
        exec(Some(output), &to_cmd_vec(&self.command), &self.args(target))?;
        log!("deploy"; "done");
        Ok(())
    }
}
