//! `[build]` section configuration.
//!
//! Where sources come from and where the build lands. Glob lists are
//! relative to the project root (`copy`, `css`, `html`) or to the output
//! directory (`json`, which minifies files after they have been copied).

use super::defaults;
use educe::Educe;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// `[build]` section in docsmith.toml - build pipeline configuration.
///
/// # Example
/// ```toml
/// [build]
/// output = "build"
/// templates = "pages"
/// copy = ["favicon.ico", "unresolved/*.py", "api/**/*.json"]
/// css = ["style.css"]
/// html = ["unresolved/*.html"]
/// json = ["api/**/*.json"]
/// minify = true
/// ```
#[derive(Debug, Clone, Educe, Serialize, Deserialize)]
#[educe(Default)]
#[serde(default, deny_unknown_fields)]
pub struct BuildConfig {
    /// Project root directory (usually set via CLI `--root`).
    #[serde(default = "defaults::build::root")]
    #[educe(Default = defaults::build::root())]
    pub root: Option<PathBuf>,

    /// Build output directory. Removed and recreated by every build.
    #[serde(default = "defaults::build::output")]
    #[educe(Default = defaults::build::output())]
    pub output: PathBuf,

    /// Page template directory; one template per sitemap node.
    #[serde(default = "defaults::build::templates")]
    #[educe(Default = defaults::build::templates())]
    pub templates: PathBuf,

    /// Files copied verbatim into the output.
    #[serde(default = "defaults::build::copy")]
    #[educe(Default = defaults::build::copy())]
    pub copy: Vec<String>,

    /// Stylesheets minified into the output.
    #[serde(default = "defaults::build::css")]
    #[educe(Default = defaults::build::css())]
    pub css: Vec<String>,

    /// Static HTML files (not sitemap pages) minified into the output.
    #[serde(default = "defaults::build::html")]
    #[educe(Default = defaults::build::html())]
    pub html: Vec<String>,

    /// JSON files, matched inside the output, minified in place.
    #[serde(default = "defaults::build::json")]
    #[educe(Default = defaults::build::json())]
    pub json: Vec<String>,

    /// Minify CSS, HTML and JSON outputs.
    #[serde(default = "defaults::r#true")]
    #[educe(Default = true)]
    pub minify: bool,
}
