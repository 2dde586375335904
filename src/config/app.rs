//! `[app]` and `[robots]` section configuration.
//!
//! `[app]` describes the platform configuration file written into the build
//! output: runtime settings plus URL handlers. Handlers from the config are
//! placed around the ones generated from the sitemap (see
//! `generator::app`).

use super::{defaults, error::ConfigError};
use educe::Educe;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// One URL routing rule of the platform config.
///
/// `url` is a regular expression matched against the whole request path.
/// Exactly one of `static_files`, `static_dir` or `script` is the target.
///
/// ```toml
/// [[app.handlers]]
/// url = "/api/(.*)"
/// static_files = "api/\\1"
/// upload = "api/.*"
/// mime_type = "application/json"
/// expiration = "1h"
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Handler {
    pub url: String,

    /// File served for a match; `\1`..`\9` refer to `url` captures.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub static_files: Option<String>,

    /// Regex of files that must be uploaded for `static_files`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upload: Option<String>,

    /// Directory whose files are served under the `url` prefix.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub static_dir: Option<String>,

    /// Handler script (e.g. `relays.voicetext`); never run locally.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub script: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,

    /// Cache lifetime hint, e.g. `"7d 12h"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiration: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secure: Option<String>,
}

impl Handler {
    /// Static file handler.
    pub fn static_file(url: &str, file: &str, upload: &str) -> Self {
        Self {
            url: url.to_owned(),
            static_files: Some(file.to_owned()),
            upload: Some(upload.to_owned()),
            ..Self::default()
        }
    }

    pub fn with_mime_type(mut self, mime_type: &str) -> Self {
        self.mime_type = Some(mime_type.to_owned());
        self
    }

    pub fn with_expiration(mut self, expiration: Option<&str>) -> Self {
        self.expiration = expiration.map(str::to_owned);
        self
    }

    fn validate(&self, section: &str) -> Result<(), ConfigError> {
        let targets = [
            self.static_files.is_some(),
            self.static_dir.is_some(),
            self.script.is_some(),
        ]
        .into_iter()
        .filter(|t| *t)
        .count();

        if targets != 1 {
            return Err(ConfigError::invalid(
                section,
                format!(
                    "handler `{}` needs exactly one of static_files, static_dir or script",
                    self.url
                ),
            ));
        }
        if let Err(e) = regex::Regex::new(&self.url) {
            return Err(ConfigError::invalid(
                section,
                format!("handler url `{}` is not a valid regex: {e}", self.url),
            ));
        }
        Ok(())
    }
}

/// `[app]` section in docsmith.toml - platform configuration.
#[derive(Debug, Clone, Educe, Serialize, Deserialize)]
#[educe(Default)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    /// File name of the generated config, relative to the output.
    #[serde(default = "defaults::app::file")]
    #[educe(Default = defaults::app::file())]
    pub file: PathBuf,

    #[serde(default = "defaults::app::runtime")]
    #[educe(Default = defaults::app::runtime())]
    pub runtime: String,

    #[serde(default = "defaults::app::api_version")]
    #[educe(Default = defaults::app::api_version())]
    pub api_version: Option<String>,

    #[serde(default = "defaults::app::threadsafe")]
    #[educe(Default = defaults::app::threadsafe())]
    pub threadsafe: Option<bool>,

    /// Default cache lifetime for static handlers.
    #[serde(default)]
    pub default_expiration: Option<String>,

    /// Cache lifetime for rendered sitemap pages.
    #[serde(default)]
    pub page_expiration: Option<String>,

    /// Handlers placed before the generated ones.
    #[serde(default)]
    pub handlers: Vec<Handler>,

    /// Handlers placed after the generated ones (catch-alls).
    #[serde(default)]
    pub fallback: Vec<Handler>,
}

impl AppConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        for handler in &self.handlers {
            handler.validate("app.handlers")?;
        }
        for handler in &self.fallback {
            handler.validate("app.fallback")?;
        }
        Ok(())
    }
}

/// `[robots]` section in docsmith.toml.
///
/// Paths listed here are disallowed for crawlers on stable and local
/// builds. Test deployments always disallow everything.
#[derive(Debug, Clone, Educe, Serialize, Deserialize)]
#[educe(Default)]
#[serde(default, deny_unknown_fields)]
pub struct RobotsConfig {
    #[serde(default = "defaults::robots::disallow")]
    #[educe(Default = defaults::robots::disallow())]
    pub disallow: Vec<String>,
}
