//! Task chains.
//!
//! Every CLI task is an ordered list of [`Step`]s. The [`Runner`] executes
//! them one after another and stops at the first failure, so nothing after
//! a failed prerequisite (wrong branch, dirty tree, missing secret) ever
//! runs.
//!
//! | task     | chain                                                      |
//! |----------|------------------------------------------------------------|
//! | `build`  | clean copy css html json pages secrets app                 |
//! | `deploy` | branch dirty (build, strict secrets) robots:allow publish:stable |
//! | `remote` | (build, strict secrets) robots:deny publish:test           |
//! | `run`    | (build) robots:allow serve                                 |
//! | `watch`  | (build) robots:allow watch                                 |
//! | `version`| version                                                    |

use crate::{
    build,
    cli::Commands,
    config::SiteConfig,
    deploy::{DeployError, DeployTarget, Platform},
    generator::{
        app::write_app_config,
        robots::{RobotsPolicy, write_robots},
    },
    log, serve,
    utils::{git::Vcs, version::derive_version},
    watch,
};
use anyhow::{Context, Result};
use std::cell::OnceCell;

/// Which deployment a publish step creates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    /// Promoted to live traffic.
    Stable,
    /// Reachable only by its version URL.
    Test,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Fail unless the stable branch is checked out.
    Branch,
    /// Fail on uncommitted changes.
    Dirty,
    Clean,
    Copy,
    Css,
    Html,
    Json,
    Pages,
    Secrets { strict: bool },
    App,
    Robots(RobotsPolicy),
    Publish(Channel),
    Serve,
    Watch,
    Version,
}

impl Step {
    pub const fn name(self) -> &'static str {
        match self {
            Self::Branch => "branch",
            Self::Dirty => "dirty",
            Self::Clean => "clean",
            Self::Copy => "copy",
            Self::Css => "css",
            Self::Html => "html",
            Self::Json => "json",
            Self::Pages => "pages",
            Self::Secrets { .. } => "secrets",
            Self::App => "app",
            Self::Robots(RobotsPolicy::Allow) => "robots:allow",
            Self::Robots(RobotsPolicy::Deny) => "robots:deny",
            Self::Publish(Channel::Stable) => "publish:stable",
            Self::Publish(Channel::Test) => "publish:test",
            Self::Serve => "serve",
            Self::Watch => "watch",
            Self::Version => "version",
        }
    }
}

/// The `build` chain.
pub fn build_chain(strict_secrets: bool) -> Vec<Step> {
    vec![
        Step::Clean,
        Step::Copy,
        Step::Css,
        Step::Html,
        Step::Json,
        Step::Pages,
        Step::Secrets {
            strict: strict_secrets,
        },
        Step::App,
    ]
}

/// The chain a CLI task runs.
pub fn chain_for(command: &Commands) -> Vec<Step> {
    let mut steps = Vec::new();
    match command {
        Commands::Build => steps.extend(build_chain(false)),
        Commands::Deploy => {
            steps.extend([Step::Branch, Step::Dirty]);
            steps.extend(build_chain(true));
            steps.extend([Step::Robots(RobotsPolicy::Allow), Step::Publish(Channel::Stable)]);
        }
        Commands::Remote => {
            steps.extend(build_chain(true));
            steps.extend([Step::Robots(RobotsPolicy::Deny), Step::Publish(Channel::Test)]);
        }
        Commands::Run { .. } => {
            steps.extend(build_chain(false));
            steps.extend([Step::Robots(RobotsPolicy::Allow), Step::Serve]);
        }
        Commands::Watch => {
            steps.extend(build_chain(false));
            steps.extend([Step::Robots(RobotsPolicy::Allow), Step::Watch]);
        }
        Commands::Version => steps.push(Step::Version),
    }
    steps
}

/// Rebuild used by the watcher: the local build chain without the
/// long-running tail.
pub fn rebuild(config: &SiteConfig) -> Result<()> {
    build::build_site(config)?;
    write_robots(RobotsPolicy::Allow, config)
}

/// Executes task chains against a checkout and a hosting platform.
pub struct Runner<'a> {
    config: &'a SiteConfig,
    vcs: &'a dyn Vcs,
    platform: &'a dyn Platform,
    /// Label taken before the build touches the working tree.
    pinned_version: OnceCell<String>,
}

impl<'a> Runner<'a> {
    pub fn new(config: &'a SiteConfig, vcs: &'a dyn Vcs, platform: &'a dyn Platform) -> Self {
        Self {
            config,
            vcs,
            platform,
            pinned_version: OnceCell::new(),
        }
    }

    /// Run `steps` in order; the first failure aborts the rest.
    ///
    /// A chain that publishes fixes its version label up front, so build
    /// output written into the checkout cannot turn it `-dirty`.
    pub fn run(&self, steps: &[Step]) -> Result<()> {
        if steps.iter().any(|s| matches!(s, Step::Publish(_))) && self.pinned_version.get().is_none() {
            let version = self.version().context("Failed to derive the version label")?;
            let _ = self.pinned_version.set(version);
        }

        for &step in steps {
            if !matches!(step, Step::Version) {
                log!("task"; "{}", step.name());
            }
            self.run_step(step)
                .with_context(|| format!("Task `{}` failed", step.name()))?;
        }
        Ok(())
    }

    /// Version label for deployments, derived from the checkout.
    pub fn version(&self) -> Result<String> {
        Ok(derive_version(&self.vcs.version_info()?))
    }

    fn run_step(&self, step: Step) -> Result<()> {
        let config = self.config;
        match step {
            Step::Branch => self.check_branch(),
            Step::Dirty => self.check_clean(),
            Step::Clean => build::clean(config),
            Step::Copy => build::copy_files(config),
            Step::Css => build::minify_css(config),
            Step::Html => build::minify_static_html(config),
            Step::Json => build::minify_json(config),
            Step::Pages => build::render_pages(config),
            Step::Secrets { strict } => build::substitute_secrets(config, strict),
            Step::App => write_app_config(config),
            Step::Robots(policy) => write_robots(policy, config),
            Step::Publish(channel) => self.publish(channel),
            Step::Serve => serve::serve_site(config, || rebuild(config)),
            Step::Watch => watch::watch_site(config, || rebuild(config)),
            Step::Version => {
                println!("{}", self.version()?);
                Ok(())
            }
        }
    }

    fn check_branch(&self) -> Result<()> {
        let expected = &self.config.deploy.stable_branch;
        let actual = self.vcs.branch()?;
        if &actual != expected {
            return Err(DeployError::WrongBranch {
                expected: expected.clone(),
                actual,
            }
            .into());
        }
        Ok(())
    }

    fn check_clean(&self) -> Result<()> {
        if self.vcs.is_dirty()? {
            return Err(DeployError::DirtyTree.into());
        }
        Ok(())
    }

    fn publish(&self, channel: Channel) -> Result<()> {
        let version = match self.pinned_version.get() {
            Some(version) => version.clone(),
            None => self.version()?,
        };
        let target = match channel {
            Channel::Stable => DeployTarget::stable(version),
            Channel::Test => DeployTarget::test(version),
        };
        self.platform.deploy(&self.config.build.output, &target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{deploy::fake::RecordingPlatform, utils::git::fake::FakeVcs};
    use std::fs;

    /// Minimal buildable project: just the index page.
    fn project() -> (tempfile::TempDir, SiteConfig) {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("pages")).unwrap();
        fs::write(
            dir.path().join("pages/index.html"),
            "<h1>{{ page.title }}</h1>",
        )
        .unwrap();

        let mut config = SiteConfig::from_str("[sitemap]\ntitle = \"Docs\"").unwrap();
        config.update_path_with_root(dir.path());
        (dir, config)
    }

    fn deploy_error(err: &anyhow::Error) -> Option<&DeployError> {
        err.downcast_ref::<DeployError>()
    }

    #[test]
    fn test_chains() {
        let names = |cmd: Commands| -> Vec<&'static str> { chain_for(&cmd).iter().map(|s| s.name()).collect() };

        assert_eq!(
            names(Commands::Build),
            vec!["clean", "copy", "css", "html", "json", "pages", "secrets", "app"]
        );
        assert_eq!(
            names(Commands::Deploy),
            vec![
                "branch", "dirty", "clean", "copy", "css", "html", "json", "pages", "secrets",
                "app", "robots:allow", "publish:stable",
            ]
        );
        assert_eq!(names(Commands::Remote).last(), Some(&"publish:test"));
        assert!(names(Commands::Remote).contains(&"robots:deny"));
        assert_eq!(names(Commands::Watch).last(), Some(&"watch"));
        assert_eq!(names(Commands::Version), vec!["version"]);
    }

    #[test]
    fn test_deploy_chains_require_secrets() {
        for cmd in [Commands::Deploy, Commands::Remote] {
            assert!(chain_for(&cmd).contains(&Step::Secrets { strict: true }));
        }
        assert!(chain_for(&Commands::Build).contains(&Step::Secrets { strict: false }));
    }

    #[test]
    fn test_dirty_tree_aborts_before_deploy() {
        let (_dir, config) = project();
        let vcs = FakeVcs::new("stable", "v1.2.0", "abcdef1", true);
        let platform = RecordingPlatform::default();

        let err = Runner::new(&config, &vcs, &platform)
            .run(&chain_for(&Commands::Deploy))
            .unwrap_err();

        assert_eq!(deploy_error(&err), Some(&DeployError::DirtyTree));
        assert!(err.to_string().contains("`dirty`"));
        assert!(platform.deployed.borrow().is_empty());
        assert!(!config.build.output.exists());
    }

    #[test]
    fn test_wrong_branch_aborts_before_build() {
        let (_dir, config) = project();
        let vcs = FakeVcs::new("master", "v1.2.0", "abcdef1", false);
        let platform = RecordingPlatform::default();

        let err = Runner::new(&config, &vcs, &platform)
            .run(&chain_for(&Commands::Deploy))
            .unwrap_err();

        assert_eq!(
            deploy_error(&err),
            Some(&DeployError::WrongBranch {
                expected: "stable".into(),
                actual: "master".into(),
            })
        );
        assert!(platform.deployed.borrow().is_empty());
        assert!(!config.build.output.exists());
    }

    #[test]
    fn test_stable_deploy_promotes() {
        let (_dir, config) = project();
        let vcs = FakeVcs::new("stable", "v1.2.0", "abcdef1", false);
        let platform = RecordingPlatform::default();

        Runner::new(&config, &vcs, &platform)
            .run(&chain_for(&Commands::Deploy))
            .unwrap();

        let deployed = platform.deployed.borrow();
        assert_eq!(deployed.len(), 1);
        assert_eq!(deployed[0].0, config.build.output);
        assert_eq!(deployed[0].1, DeployTarget::stable("stable-v1-2-0-abcdef1".into()));

        let robots = fs::read_to_string(config.build.output.join("robots.txt")).unwrap();
        assert_eq!(robots, "User-agent: *\nDisallow: /api\n");
        assert!(config.build.output.join("index.html").is_file());
        assert!(config.app_file().is_file());
    }

    #[test]
    fn test_remote_deploy_is_hidden_and_not_promoted() {
        let (_dir, config) = project();
        // test deployments accept any branch and a dirty tree
        let vcs = FakeVcs::new("feature/x", "", "1234abc", true);
        let platform = RecordingPlatform::default();

        Runner::new(&config, &vcs, &platform)
            .run(&chain_for(&Commands::Remote))
            .unwrap();

        let deployed = platform.deployed.borrow();
        assert_eq!(
            deployed[0].1,
            DeployTarget::test("feature-x-1234abc-dirty".into())
        );

        let robots = fs::read_to_string(config.build.output.join("robots.txt")).unwrap();
        assert_eq!(robots, "User-agent: *\nDisallow: /\n");
    }

    #[test]
    fn test_missing_secret_aborts_remote_deploy() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("pages")).unwrap();
        fs::write(dir.path().join("pages/index.html"), "index").unwrap();
        fs::write(dir.path().join("relay.py"), "KEY = '{{{voicetext}}}'").unwrap();

        let mut config = SiteConfig::from_str(
            r#"
            [build]
            copy = ["relay.py"]

            [secrets]
            keys = ["voicetext"]
            files = ["relay.py"]
            "#,
        )
        .unwrap();
        config.update_path_with_root(dir.path());

        let vcs = FakeVcs::new("dev", "", "1234abc", false);
        let platform = RecordingPlatform::default();
        let err = Runner::new(&config, &vcs, &platform)
            .run(&chain_for(&Commands::Remote))
            .unwrap_err();

        assert!(matches!(deploy_error(&err), Some(DeployError::MissingSecrets(_))));
        assert!(platform.deployed.borrow().is_empty());
    }

    #[test]
    fn test_build_failure_stops_chain() {
        let (dir, config) = project();
        fs::remove_file(dir.path().join("pages/index.html")).unwrap();

        let vcs = FakeVcs::new("stable", "", "abcdef1", false);
        let platform = RecordingPlatform::default();
        let err = Runner::new(&config, &vcs, &platform)
            .run(&chain_for(&Commands::Deploy))
            .unwrap_err();

        assert!(err.to_string().contains("`pages`"));
        assert!(platform.deployed.borrow().is_empty());
        assert!(!config.app_file().exists());
    }

    #[test]
    fn test_build_output_does_not_dirty_published_version() {
        use crate::utils::git::{GitRepo, fixture};

        let (_dir, config) = project();
        let root = config.get_root();
        fixture::init(root, "stable");
        fixture::git(root, &["tag", "v1.2.0"]);

        // no .gitignore: the build leaves `build/` untracked
        let vcs = GitRepo::new(root);
        let expected = format!("stable-v1-2-0-{}", vcs.short_revision().unwrap());
        let platform = RecordingPlatform::default();

        Runner::new(&config, &vcs, &platform)
            .run(&chain_for(&Commands::Deploy))
            .unwrap();

        assert!(vcs.is_dirty().unwrap());
        assert_eq!(
            platform.deployed.borrow()[0].1,
            DeployTarget::stable(expected)
        );
    }

    #[test]
    fn test_redeploy_with_previous_output_in_checkout() {
        use crate::utils::git::{GitRepo, fixture};

        let (_dir, config) = project();
        let root = config.get_root();
        fixture::init(root, "stable");

        let vcs = GitRepo::new(root).ignoring(&config.build.output);
        let platform = RecordingPlatform::default();
        for _ in 0..2 {
            Runner::new(&config, &vcs, &platform)
                .run(&chain_for(&Commands::Deploy))
                .unwrap();
        }

        let deployed = platform.deployed.borrow();
        assert_eq!(deployed.len(), 2);
        assert_eq!(deployed[0].1, deployed[1].1);
        assert!(!deployed[1].1.version.ends_with("-dirty"));
    }

    #[test]
    fn test_version_from_checkout() {
        let (_dir, config) = project();
        let vcs = FakeVcs::new("stable", "v1.2.0", "abcdef1", true);
        let platform = RecordingPlatform::default();

        let runner = Runner::new(&config, &vcs, &platform);
        assert_eq!(runner.version().unwrap(), "stable-v1-2-0-abcdef1-dirty");
    }
}
