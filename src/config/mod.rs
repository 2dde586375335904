//! Site configuration management for `docsmith.toml`.
//!
//! # Sections
//!
//! | Section     | Purpose                                           |
//! |-------------|---------------------------------------------------|
//! | `[build]`   | Output path, templates, copy/minify globs         |
//! | `[sitemap]` | Navigation tree that drives page rendering        |
//! | `[app]`     | Platform config (runtime, URL handlers)           |
//! | `[robots]`  | Crawler rules for stable/local builds             |
//! | `[deploy]`  | Deploy command, project, stable branch            |
//! | `[secrets]` | Placeholder substitution for deploy-time keys     |
//! | `[serve]`   | Local server (interface, port, watch)             |
//!
//! # Example
//!
//! ```toml
//! [build]
//! copy = ["favicon.ico", "api/**/*.json"]
//!
//! [sitemap]
//! title = "Docs"
//!
//! [sitemap.children.install]
//! title = "Install"
//!
//! [deploy]
//! project = "my-docs"
//! ```

mod app;
mod build;
pub mod defaults;
mod deploy;
mod error;
mod serve;
mod sitemap;

pub use app::{AppConfig, Handler, RobotsConfig};
pub use build::BuildConfig;
pub use deploy::{DeployConfig, SecretsConfig};
pub use error::ConfigError;
pub use serve::ServeConfig;
pub use sitemap::SiteNode;

use crate::cli::{Cli, Commands};
use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Component, Path, PathBuf},
};

// ============================================================================
// Root Configuration
// ============================================================================

/// Root configuration structure representing docsmith.toml
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SiteConfig {
    /// Absolute path to the config file (set after loading)
    #[serde(skip)]
    pub config_path: PathBuf,

    #[serde(default)]
    pub build: BuildConfig,

    #[serde(default)]
    pub sitemap: SiteNode,

    #[serde(default)]
    pub app: AppConfig,

    #[serde(default)]
    pub robots: RobotsConfig,

    #[serde(default)]
    pub deploy: DeployConfig,

    #[serde(default)]
    pub secrets: SecretsConfig,

    #[serde(default)]
    pub serve: ServeConfig,
}

impl SiteConfig {
    /// Parse configuration from TOML string
    pub fn from_str(content: &str) -> Result<Self> {
        let config: SiteConfig = toml::from_str(content).map_err(ConfigError::Toml)?;
        Ok(config)
    }

    /// Load configuration from file path
    pub fn from_path(path: &Path) -> Result<Self> {
        let content =
            fs::read_to_string(path).map_err(|err| ConfigError::Io(path.to_path_buf(), err))?;
        let mut config = Self::from_str(&content)
            .with_context(|| format!("Failed to parse `{}`", path.display()))?;
        config.config_path = path.to_path_buf();
        Ok(config)
    }

    /// Get the root directory path
    pub fn get_root(&self) -> &Path {
        self.build.root.as_deref().unwrap_or(Path::new("./"))
    }

    /// Set the root directory path
    pub fn set_root(&mut self, path: &Path) {
        self.build.root = Some(path.to_path_buf())
    }

    /// Absolute path of the generated platform config file.
    pub fn app_file(&self) -> PathBuf {
        self.build.output.join(&self.app.file)
    }

    /// Update configuration with CLI arguments
    pub fn update_with_cli(&mut self, cli: &Cli) {
        let root = cli
            .root
            .clone()
            .unwrap_or_else(|| self.get_root().to_owned());

        Self::update_option(&mut self.build.output, cli.output.as_ref());
        Self::update_option(&mut self.build.minify, cli.minify.as_ref());

        if let Commands::Run {
            interface,
            port,
            watch,
        } = &cli.command
        {
            Self::update_option(&mut self.serve.interface, interface.as_ref());
            Self::update_option(&mut self.serve.port, port.as_ref());
            Self::update_option(&mut self.serve.watch, watch.as_ref());
        }

        self.update_path_with_root(&root);
        self.config_path = Self::normalize_path(&self.get_root().join(&cli.config));
    }

    /// Update config option if CLI value is provided
    fn update_option<T: Clone>(config_option: &mut T, cli_option: Option<&T>) {
        if let Some(option) = cli_option {
            *config_option = option.clone();
        }
    }

    /// Make every configured path absolute, relative to `root`.
    pub fn update_path_with_root(&mut self, root: &Path) {
        let root = Self::normalize_path(root);
        self.set_root(&root);

        self.build.output = Self::normalize_path(&root.join(&self.build.output));
        self.build.templates = Self::normalize_path(&root.join(&self.build.templates));

        // Secrets file may live outside the project (e.g. `~/.config/...`)
        if let Some(path) = &self.secrets.path {
            let expanded = shellexpand::tilde(&path.to_string_lossy()).into_owned();
            let path = PathBuf::from(expanded);
            self.secrets.path = Some(if path.is_relative() {
                Self::normalize_path(&root.join(path))
            } else {
                path
            });
        }
    }

    /// Normalize a path to absolute, using canonicalize if the path exists
    fn normalize_path(path: &Path) -> PathBuf {
        path.canonicalize().unwrap_or_else(|_| {
            if path.is_absolute() {
                path.to_path_buf()
            } else {
                std::env::current_dir()
                    .map(|cwd| cwd.join(path))
                    .unwrap_or_else(|_| path.to_path_buf())
            }
        })
    }

    /// Validate configuration for the given task
    pub fn validate(&self, command: &Commands) -> Result<()> {
        self.sitemap.validate()?;
        self.app.validate()?;
        self.check_output_dir()?;

        if self.app.file.is_absolute() {
            bail!(ConfigError::invalid(
                "app.file",
                "must be relative to the output directory"
            ));
        }

        for key in &self.secrets.keys {
            if key.is_empty() || !key.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_') {
                bail!(ConfigError::invalid(
                    "secrets.keys",
                    format!("`{key}` must use only letters, digits or `_`")
                ));
            }
        }

        if command.is_deploying() {
            Self::check_command_installed("deploy.command", &self.deploy.command)?;
        }

        Ok(())
    }

    /// The `clean` step deletes the output directory, so it has to be a
    /// strict subdirectory of the root that holds no sources.
    fn check_output_dir(&self) -> Result<()> {
        let root = Self::normalize_path(self.get_root());
        let output = &self.build.output;

        // A missing path is not canonicalized, so `..` may survive
        let escapes = output.components().any(|c| c == Component::ParentDir);
        if escapes || !output.starts_with(&root) || output == &root {
            bail!(ConfigError::invalid(
                "build.output",
                format!(
                    "`{}` must be a directory inside the project root `{}`",
                    output.display(),
                    root.display()
                )
            ));
        }

        if self.build.templates.starts_with(output) {
            bail!(ConfigError::invalid(
                "build.output",
                format!(
                    "`{}` contains the templates directory `{}`",
                    output.display(),
                    self.build.templates.display()
                )
            ));
        }

        Ok(())
    }

    /// Check if a command is installed and available
    fn check_command_installed(field: &str, command: &[String]) -> Result<()> {
        let Some(cmd) = command.first() else {
            bail!(ConfigError::invalid(field, "must have at least one element"));
        };

        which::which(cmd)
            .with_context(|| format!("`{cmd}` not found. Please install it first."))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_from_str() {
        let config = SiteConfig::from_str(
            r#"
            [sitemap]
            title = "Docs"
            "#,
        )
        .unwrap();
        assert_eq!(config.sitemap.title, "Docs");
    }

    #[test]
    fn test_from_str_invalid_toml() {
        assert!(SiteConfig::from_str("[sitemap\ntitle = 1").is_err());
    }

    #[test]
    fn test_unknown_section_rejected() {
        assert!(SiteConfig::from_str("[extra]\nfoo = 1").is_err());
    }

    #[test]
    fn test_from_path_missing_file() {
        let err = SiteConfig::from_path(Path::new("/definitely/not/here.toml")).unwrap_err();
        assert!(err.to_string().contains("IO error"));
    }

    #[test]
    fn test_get_root_default() {
        let config = SiteConfig::default();
        assert_eq!(config.get_root(), Path::new("./"));
    }

    #[test]
    fn test_update_with_cli_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().to_string_lossy().into_owned();
        let cli = Cli::try_parse_from([
            "docsmith", "--root", &root, "--output", "dist", "--minify", "false", "run", "--port",
            "9001",
        ])
        .unwrap();

        let mut config = SiteConfig::default();
        config.update_with_cli(&cli);

        let root = dir.path().canonicalize().unwrap();
        assert_eq!(config.get_root(), root.as_path());
        assert_eq!(config.build.output, root.join("dist"));
        assert_eq!(config.build.templates, root.join("pages"));
        assert_eq!(config.config_path, root.join("docsmith.toml"));
        assert!(!config.build.minify);
        assert_eq!(config.serve.port, 9001);
        assert_eq!(config.app_file(), root.join("dist").join("app.yaml"));
    }

    #[test]
    fn test_secrets_path_relative_to_root() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = SiteConfig::from_str("[secrets]\npath = \"secrets.toml\"").unwrap();
        config.update_path_with_root(dir.path());

        let root = dir.path().canonicalize().unwrap();
        assert_eq!(config.secrets.path, Some(root.join("secrets.toml")));
    }

    #[test]
    fn test_validate_rejects_output_at_root() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = SiteConfig::from_str("[build]\noutput = \".\"").unwrap();
        config.update_path_with_root(dir.path());

        assert!(config.validate(&Commands::Build).is_err());
    }

    #[test]
    fn test_validate_rejects_output_outside_root() {
        let parent = tempfile::tempdir().unwrap();
        let root = parent.path().join("site");
        let victim = parent.path().join("victim");
        fs::create_dir_all(&root).unwrap();
        fs::create_dir_all(&victim).unwrap();
        fs::write(victim.join("precious.txt"), "keep me").unwrap();

        for output in ["../victim", "../elsewhere"] {
            let mut config =
                SiteConfig::from_str(&format!("[build]\noutput = \"{output}\"")).unwrap();
            config.update_path_with_root(&root);

            let err = config.validate(&Commands::Build).unwrap_err();
            assert!(err.to_string().contains("[build.output]"), "{output}: {err}");
        }

        let absolute = victim.to_string_lossy().replace('\\', "/");
        let mut config =
            SiteConfig::from_str(&format!("[build]\noutput = \"{absolute}\"")).unwrap();
        config.update_path_with_root(&root);
        assert!(config.validate(&Commands::Build).is_err());

        assert!(victim.join("precious.txt").is_file());
    }

    #[test]
    fn test_validate_rejects_output_containing_templates() {
        let dir = tempfile::tempdir().unwrap();
        let mut config =
            SiteConfig::from_str("[build]\noutput = \"site\"\ntemplates = \"site/pages\"").unwrap();
        config.update_path_with_root(dir.path());

        let err = config.validate(&Commands::Build).unwrap_err();
        assert!(err.to_string().contains("templates"));
    }

    #[test]
    fn test_validate_accepts_nested_output() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = SiteConfig::from_str("[build]\noutput = \"out/site\"").unwrap();
        config.update_path_with_root(dir.path());

        assert!(config.validate(&Commands::Build).is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_secret_key() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = SiteConfig::from_str("[secrets]\nkeys = [\"voice-text\"]").unwrap();
        config.update_path_with_root(dir.path());

        let err = config.validate(&Commands::Build).unwrap_err();
        assert!(err.to_string().contains("voice-text"));
    }

    #[test]
    fn test_validate_requires_deploy_command() {
        let dir = tempfile::tempdir().unwrap();
        let mut config =
            SiteConfig::from_str("[deploy]\ncommand = [\"no-such-deploy-tool-xyz\"]").unwrap();
        config.update_path_with_root(dir.path());

        assert!(config.validate(&Commands::Build).is_ok());
        assert!(config.validate(&Commands::Deploy).is_err());
    }
}
