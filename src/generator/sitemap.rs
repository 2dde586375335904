//! Sitemap expansion.
//!
//! Turns the nested `[sitemap]` tree into:
//! - a flat list of [`PageJob`]s, one per page, each carrying the
//!   navigation links its template needs;
//! - a list of [`RouteRule`]s mapping pretty URLs (`/usage/editor`) to the
//!   rendered files (`usage/editor.html`).
//!
//! # Navigation
//!
//! ```text
//! (root) "/"            home for everyone, up for top-level pages
//!   ├── install         prev: -        next: usage
//!   ├── usage           prev: install  next: services
//!   │     ├── browser   prev: -        next: editor   up: usage
//!   │     └── editor    prev: browser  next: -        up: usage
//!   └── services        prev: usage    next: -
//! ```

use crate::config::SiteNode;
use serde::Serialize;
use std::path::PathBuf;

/// A navigation link exposed to templates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Link {
    pub href: String,
    pub title: String,
}

/// Template data for one page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageData {
    /// Link to the page itself.
    pub page: Link,
    /// Parent page; `None` only for the index.
    pub up: Option<Link>,
    pub home: Link,
    /// Previous sibling in navigation order.
    pub prev: Option<Link>,
    /// Next sibling in navigation order.
    pub next: Option<Link>,
    pub children: Vec<Link>,
}

/// One template render.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageJob {
    /// Template path relative to the templates directory.
    pub template: PathBuf,
    /// Output path relative to the output directory.
    pub output: PathBuf,
    pub data: PageData,
}

/// A URL routing rule for every page that has children.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteRule {
    /// Request path regex; capture 1 is the child slug.
    pub url: String,
    /// Served file, with `\1` standing for the captured slug.
    pub static_files: String,
    /// Regex of the files this rule may serve.
    pub upload: String,
}

pub const INDEX_TEMPLATE: &str = "index.html";

// ============================================================================
// Page Jobs
// ============================================================================

/// Expand the sitemap into page jobs, index first, then pre-order.
pub fn expand_pages(root: &SiteNode) -> Vec<PageJob> {
    let home = Link {
        href: "/".to_owned(),
        title: root.title.clone(),
    };

    let mut jobs = Vec::with_capacity(root.descendants() + 1);
    jobs.push(PageJob {
        template: PathBuf::from(INDEX_TEMPLATE),
        output: PathBuf::from(INDEX_TEMPLATE),
        data: PageData {
            page: home.clone(),
            up: None,
            home: home.clone(),
            prev: None,
            next: None,
            children: child_links(root, &[]),
        },
    });

    expand_children(root, &[], &home, &home, &mut jobs);
    jobs
}

fn expand_children(
    parent: &SiteNode,
    parent_path: &[&str],
    parent_link: &Link,
    home: &Link,
    jobs: &mut Vec<PageJob>,
) {
    let links = child_links(parent, parent_path);

    for (i, (slug, node)) in parent.children.iter().enumerate() {
        let mut path = parent_path.to_vec();
        path.push(slug);

        let page = links[i].clone();
        let file = format!("{}.html", path.join("/"));

        jobs.push(PageJob {
            template: PathBuf::from(&file),
            output: PathBuf::from(&file),
            data: PageData {
                page: page.clone(),
                up: Some(parent_link.clone()),
                home: home.clone(),
                prev: i.checked_sub(1).map(|p| links[p].clone()),
                next: links.get(i + 1).cloned(),
                children: child_links(node, &path),
            },
        });

        expand_children(node, &path, &page, home, jobs);
    }
}

fn child_links(node: &SiteNode, path: &[&str]) -> Vec<Link> {
    node.children
        .iter()
        .map(|(slug, child)| Link {
            href: href_for(path, slug),
            title: child.title.clone(),
        })
        .collect()
}

fn href_for(parent_path: &[&str], slug: &str) -> String {
    let mut href = String::from("/");
    for segment in parent_path {
        href.push_str(segment);
        href.push('/');
    }
    href.push_str(slug);
    href
}

// ============================================================================
// Route Rules
// ============================================================================

/// One rule per node with children, pre-order.
pub fn route_rules(root: &SiteNode) -> Vec<RouteRule> {
    let mut rules = Vec::new();
    collect_rules(root, &[], &mut rules);
    rules
}

fn collect_rules(node: &SiteNode, path: &[&str], rules: &mut Vec<RouteRule>) {
    if node.children.is_empty() {
        return;
    }

    let alternation = node
        .children
        .keys()
        .map(|slug| regex::escape(slug))
        .collect::<Vec<_>>()
        .join("|");

    let url_prefix: String = path.iter().map(|s| format!("/{}", regex::escape(s))).collect();
    let file_prefix: String = path.iter().map(|s| format!("{s}/")).collect();
    let upload_prefix: String = path.iter().map(|s| format!("{}/", regex::escape(s))).collect();

    rules.push(RouteRule {
        url: format!("{url_prefix}/({alternation})"),
        static_files: format!("{file_prefix}\\1.html"),
        upload: format!("{upload_prefix}({alternation})\\.html"),
    });

    for (slug, child) in &node.children {
        let mut child_path = path.to_vec();
        child_path.push(slug);
        collect_rules(child, &child_path, rules);
    }
}
