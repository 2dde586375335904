//! Version-control queries.
//!
//! The build only ever *reads* the source checkout: current branch, nearest
//! tag, short revision and whether there are uncommitted changes. Deploy
//! steps and the version label depend on these answers, so they sit behind
//! the [`Vcs`] trait.

use crate::{capture, utils::version::VersionInfo};
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Read-only view of the source checkout.
pub trait Vcs {
    /// Short name of the checked-out branch; empty on a detached HEAD.
    fn branch(&self) -> Result<String>;

    /// Nearest tag reachable from HEAD; empty when there is none.
    fn nearest_tag(&self) -> Result<String>;

    /// Abbreviated HEAD revision.
    fn short_revision(&self) -> Result<String>;

    /// Whether the working tree has uncommitted changes.
    fn is_dirty(&self) -> Result<bool>;

    /// Gather everything needed for a version label.
    fn version_info(&self) -> Result<VersionInfo> {
        Ok(VersionInfo {
            branch: self.branch()?,
            tag: self.nearest_tag()?,
            revision: self.short_revision()?,
            dirty: self.is_dirty()?,
        })
    }
}

/// Git checkout containing the site sources.
///
/// HEAD is inspected with `gix`; tags and working tree status go through
/// the `git` CLI.
pub struct GitRepo {
    root: PathBuf,
    /// Generated directory, relative to `root`, that never counts as a change.
    ignored: Option<String>,
}

impl GitRepo {
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
            ignored: None,
        }
    }

    /// Leave `dir` (the build output) out of the dirty check, whether or
    /// not it is gitignored. Paths outside the root are not excluded.
    pub fn ignoring(mut self, dir: &Path) -> Self {
        self.ignored = dir
            .strip_prefix(&self.root)
            .ok()
            .filter(|rel| !rel.as_os_str().is_empty())
            .map(|rel| rel.to_string_lossy().replace('\\', "/"));
        self
    }

    fn open(&self) -> Result<gix::Repository> {
        gix::discover(&self.root)
            .with_context(|| format!("`{}` is not inside a git repository", self.root.display()))
    }
}

impl Vcs for GitRepo {
    fn branch(&self) -> Result<String> {
        let repo = self.open()?;
        let head = repo.head_name().context("Failed to read HEAD")?;
        Ok(head
            .map(|name| name.shorten().to_string())
            .unwrap_or_default())
    }

    fn nearest_tag(&self) -> Result<String> {
        let merged = capture!(self.root.as_path(); ["git"]; "tag", "--merged", "HEAD")?;
        if merged.is_empty() {
            return Ok(String::new());
        }
        capture!(self.root.as_path(); ["git"]; "describe", "--tags", "--abbrev=0")
    }

    fn short_revision(&self) -> Result<String> {
        let repo = self.open()?;
        let id = repo.head_id().context("HEAD does not point to a commit")?;
        Ok(id.shorten_or_id().to_string())
    }

    fn is_dirty(&self) -> Result<bool> {
        let exclude = self
            .ignored
            .as_ref()
            .map(|dir| format!(":(exclude){dir}"))
            .unwrap_or_default();
        let status = capture!(self.root.as_path(); ["git"]; "status", "--porcelain", "--", ":/", exclude)?;
        Ok(!status.is_empty())
    }
}
