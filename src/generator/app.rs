//! Platform configuration (`app.yaml`) generation.
//!
//! Handler order matters: the platform (and the local server) picks the
//! first handler whose `url` matches the whole request path.
//!
//! 1. `/robots.txt`
//! 2. `[[app.handlers]]`
//! 3. `/` → `index.html`
//! 4. one handler per sitemap route rule
//! 5. `[[app.fallback]]`

use super::sitemap::{RouteRule, route_rules};
use crate::{
    config::{Handler, SiteConfig},
    log,
};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{fs, path::Path};

/// Serialized form of the platform config file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppYaml {
    pub runtime: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_version: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threadsafe: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_expiration: Option<String>,

    pub handlers: Vec<Handler>,
}

impl AppYaml {
    /// Assemble the handler table from config and sitemap.
    pub fn from_config(config: &SiteConfig) -> Self {
        let app = &config.app;
        let page_expiration = app.page_expiration.as_deref();

        let mut handlers = Vec::with_capacity(app.handlers.len() + app.fallback.len() + 2);

        handlers.push(
            Handler::static_file("/robots\\.txt", "robots.txt", "robots\\.txt")
                .with_mime_type("text/plain"),
        );
        handlers.extend(app.handlers.iter().cloned());
        handlers.push(
            Handler::static_file("/", "index.html", "index\\.html")
                .with_mime_type("text/html")
                .with_expiration(page_expiration),
        );
        handlers.extend(
            route_rules(&config.sitemap)
                .iter()
                .map(|rule| route_handler(rule, page_expiration)),
        );
        handlers.extend(app.fallback.iter().cloned());

        Self {
            runtime: app.runtime.clone(),
            api_version: app.api_version.clone(),
            threadsafe: app.threadsafe,
            default_expiration: app.default_expiration.clone(),
            handlers,
        }
    }

    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).context("Failed to serialize platform config")
    }

    /// Read back a previously written config file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))
    }
}

fn route_handler(rule: &RouteRule, expiration: Option<&str>) -> Handler {
    Handler::static_file(&rule.url, &rule.static_files, &rule.upload)
        .with_mime_type("text/html")
        .with_expiration(expiration)
}

/// Write `app.yaml` into the output directory.
pub fn write_app_config(config: &SiteConfig) -> Result<()> {
    let path = config.app_file();
    let yaml = AppYaml::from_config(config).to_yaml()?;

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(&path, yaml).with_context(|| format!("Failed to write {}", path.display()))?;

    log!("app"; "{}", config.app.file.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(toml: &str) -> SiteConfig {
        SiteConfig::from_str(toml).unwrap()
    }

    const SITE: &str = r#"
        [app]
        default_expiration = "1d"
        page_expiration = "1h"

        [[app.handlers]]
        url = "/style\\.css"
        static_files = "style.css"
        upload = "style\\.css"

        [[app.fallback]]
        url = "/relay/.*"
        script = "relays.app"

        [sitemap]
        title = "Docs"

        [sitemap.children.install]
        title = "Install"

        [sitemap.children.usage]
        title = "Usage"

        [sitemap.children.usage.children.editor]
        title = "Editor"
    "#;

    #[test]
    fn test_handler_order() {
        let app = AppYaml::from_config(&config(SITE));
        let urls: Vec<_> = app.handlers.iter().map(|h| h.url.as_str()).collect();

        assert_eq!(
            urls,
            vec![
                "/robots\\.txt",
                "/style\\.css",
                "/",
                "/(install|usage)",
                "/usage/(editor)",
                "/relay/.*",
            ]
        );
    }

    #[test]
    fn test_route_handlers_are_html_pages() {
        let app = AppYaml::from_config(&config(SITE));
        let usage = &app.handlers[4];

        assert_eq!(usage.static_files.as_deref(), Some("usage/\\1.html"));
        assert_eq!(usage.upload.as_deref(), Some("usage/(editor)\\.html"));
        assert_eq!(usage.mime_type.as_deref(), Some("text/html"));
        assert_eq!(usage.expiration.as_deref(), Some("1h"));
        // user handlers are passed through untouched
        assert_eq!(app.handlers[1].expiration, None);
    }

    #[test]
    fn test_yaml_output() {
        let yaml = AppYaml::from_config(&config(SITE)).to_yaml().unwrap();

        assert!(yaml.starts_with("runtime: python27\n"));
        assert!(yaml.contains("api_version: '1'"));
        assert!(yaml.contains("threadsafe: true"));
        assert!(yaml.contains("default_expiration: 1d"));
        assert!(yaml.contains("script: relays.app"));
        assert!(!yaml.contains("static_dir"));
    }

    #[test]
    fn test_write_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config(SITE);
        config.update_path_with_root(dir.path());

        write_app_config(&config).unwrap();
        let loaded = AppYaml::load(&config.app_file()).unwrap();

        assert_eq!(loaded, AppYaml::from_config(&config));
    }

    #[test]
    fn test_empty_sitemap_has_no_route_handlers() {
        let app = AppYaml::from_config(&SiteConfig::default());
        assert_eq!(app.handlers.len(), 2);
    }
}
