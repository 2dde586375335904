//! `[deploy]` and `[secrets]` section configuration.

use super::defaults;
use educe::Educe;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// `[deploy]` section in docsmith.toml - deployment configuration.
///
/// # Example
/// ```toml
/// [deploy]
/// command = ["gcloud", "app", "deploy"]
/// project = "my-docs"
/// stable_branch = "stable"
/// ```
#[derive(Debug, Clone, Educe, Serialize, Deserialize)]
#[educe(Default)]
#[serde(default, deny_unknown_fields)]
pub struct DeployConfig {
    /// Platform deploy command; run inside the output directory.
    #[serde(default = "defaults::deploy::command")]
    #[educe(Default = defaults::deploy::command())]
    pub command: Vec<String>,

    /// Cloud project id; omitted from the command when unset.
    #[serde(default)]
    pub project: Option<String>,

    /// Only this branch may be deployed as the stable site.
    #[serde(default = "defaults::deploy::stable_branch")]
    #[educe(Default = defaults::deploy::stable_branch())]
    pub stable_branch: String,

    /// Pass `--quiet` to skip interactive prompts.
    #[serde(default = "defaults::r#true")]
    #[educe(Default = true)]
    pub quiet: bool,
}

/// `[secrets]` section in docsmith.toml.
///
/// Each `key` is substituted for `{{{key}}}` placeholders in the listed
/// output `files`. Values come from `DOCSMITH_SECRET_<KEY>` environment
/// variables, then from the TOML file at `path`.
///
/// # Example
/// ```toml
/// [secrets]
/// keys = ["voicetext"]
/// files = ["relays/__init__.py"]
/// path = "~/.config/docsmith/secrets.toml"
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SecretsConfig {
    pub keys: Vec<String>,
    pub files: Vec<String>,
    pub path: Option<PathBuf>,
}
