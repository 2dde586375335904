//! `[sitemap]` section configuration.
//!
//! The site's navigation tree. Each node has a title and an ordered table of
//! children keyed by URL slug; the table order is the navigation order.
//!
//! ```toml
//! [sitemap]
//! title = "Docs"
//!
//! [sitemap.children.install]
//! title = "Install"
//!
//! [sitemap.children.usage]
//! title = "Usage"
//!
//! [sitemap.children.usage.children.editor]
//! title = "Editor"
//! ```

use super::error::ConfigError;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// One page of the site and its sub-pages.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SiteNode {
    /// Page title shown in navigation links.
    #[serde(default)]
    pub title: String,

    /// Sub-pages keyed by slug, in navigation order.
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub children: IndexMap<String, SiteNode>,
}

impl SiteNode {
    /// Number of nodes in this subtree, excluding `self`.
    pub fn descendants(&self) -> usize {
        self.children.values().map(|c| 1 + c.descendants()).sum()
    }

    /// Check slugs and titles across the whole tree.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.validate_at("")
    }

    fn validate_at(&self, path: &str) -> Result<(), ConfigError> {
        for (slug, child) in &self.children {
            let child_path = if path.is_empty() { slug.clone() } else { format!("{path}/{slug}") };

            if !is_valid_slug(slug) {
                return Err(ConfigError::invalid(
                    "sitemap",
                    format!("slug `{child_path}` must be non-empty and use only a-z, 0-9, `-` or `_`"),
                ));
            }
            // `index.html` belongs to the root page
            if path.is_empty() && slug == "index" {
                return Err(ConfigError::invalid(
                    "sitemap",
                    "top-level slug `index` clashes with the home page",
                ));
            }
            if child.title.trim().is_empty() {
                return Err(ConfigError::invalid(
                    "sitemap",
                    format!("page `{child_path}` has no title"),
                ));
            }
            child.validate_at(&child_path)?;
        }
        Ok(())
    }
}

#[cfg(test)]
impl SiteNode {
    pub fn new(title: &str) -> Self {
        Self {
            title: title.to_owned(),
            children: IndexMap::new(),
        }
    }

    /// Builder-style helper: append a child.
    pub fn child(mut self, slug: &str, node: SiteNode) -> Self {
        self.children.insert(slug.to_owned(), node);
        self
    }
}

fn is_valid_slug(slug: &str) -> bool {
    !slug.is_empty()
        && slug
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-' || b == b'_')
}
