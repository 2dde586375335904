//! Minification for HTML, CSS and JSON outputs.
//!
//! All three go through one `minify` entry point which honors
//! `[build] minify`. Output is a pure function of the input, so repeated
//! builds are byte-identical.

use crate::config::SiteConfig;
use anyhow::{Context, Result};
use std::borrow::Cow;

// ============================================================================
// Types
// ============================================================================

/// Content type for minification.
pub enum MinifyType<'a> {
    /// HTML document or fragment
    Html(&'a [u8]),
    /// Standalone stylesheet
    Css(&'a [u8]),
    /// JSON document
    Json(&'a [u8]),
}

// ============================================================================
// Unified Minify Function
// ============================================================================

/// Minify content based on type and config.
///
/// Returns `Cow::Borrowed` if minify disabled, `Cow::Owned` if minified.
///
/// # Errors
/// Only JSON can fail: malformed input is reported instead of copied.
pub fn minify<'a>(content: MinifyType<'a>, config: &SiteConfig) -> Result<Cow<'a, [u8]>> {
    if !config.build.minify {
        return Ok(match content {
            MinifyType::Html(bytes) | MinifyType::Css(bytes) | MinifyType::Json(bytes) => {
                Cow::Borrowed(bytes)
            }
        });
    }

    Ok(Cow::Owned(match content {
        MinifyType::Html(html) => minify_html_inner(html),
        MinifyType::Css(css) => minify_css_inner(css),
        MinifyType::Json(json) => minify_json_inner(json)?,
    }))
}

// ============================================================================
// Internal Implementation
// ============================================================================

const STYLE_OPEN: &[u8] = b"<style>";
const STYLE_CLOSE: &[u8] = b"</style>";

fn minify_html_inner(html: &[u8]) -> Vec<u8> {
    let mut cfg = minify_html::Cfg::new();
    cfg.keep_comments = false;
    cfg.minify_css = true;
    cfg.minify_js = true;
    cfg.remove_bangs = true;
    cfg.remove_processing_instructions = true;
    minify_html::minify(html, &cfg)
}

/// Minify a stylesheet by running it through the HTML minifier as the body
/// of a `<style>` element, then unwrapping the element again.
fn minify_css_inner(css: &[u8]) -> Vec<u8> {
    let mut wrapped = Vec::with_capacity(css.len() + STYLE_OPEN.len() + STYLE_CLOSE.len());
    wrapped.extend_from_slice(STYLE_OPEN);
    wrapped.extend_from_slice(css);
    wrapped.extend_from_slice(STYLE_CLOSE);

    let mut cfg = minify_html::Cfg::new();
    cfg.keep_closing_tags = true;
    cfg.minify_css = true;
    let out = minify_html::minify(&wrapped, &cfg);

    let body = out.strip_prefix(STYLE_OPEN).unwrap_or(out.as_slice());
    let body = body.strip_suffix(STYLE_CLOSE).unwrap_or(body);
    body.to_vec()
}

/// Re-serialize JSON compactly. Key order is preserved.
fn minify_json_inner(json: &[u8]) -> Result<Vec<u8>> {
    let value: serde_json::Value = serde_json::from_slice(json).context("Invalid JSON")?;
    Ok(serde_json::to_vec(&value)?)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with_minify(enabled: bool) -> SiteConfig {
        let mut config = SiteConfig::default();
        config.build.minify = enabled;
        config
    }

    #[test]
    fn test_minify_html_basic() {
        let html = b"<html>\n  <head>\n  </head>\n  <body>\n    <p>Hello</p>\n  </body>\n</html>";
        let result = minify(MinifyType::Html(html), &config_with_minify(true)).unwrap();
        let result_str = String::from_utf8_lossy(&result);

        assert!(!result_str.contains("\n  "));
        assert!(result_str.contains("Hello"));
    }

    #[test]
    fn test_minify_html_removes_comments() {
        let html = b"<p>Visible</p><!-- internal note -->";
        let result = minify(MinifyType::Html(html), &config_with_minify(true)).unwrap();
        let result_str = String::from_utf8_lossy(&result);

        assert!(result_str.contains("Visible"));
        assert!(!result_str.contains("internal note"));
    }

    #[test]
    fn test_minify_disabled_borrows() {
        let html = b"<html>\n  <body>\n  </body>\n</html>";
        let result = minify(MinifyType::Html(html), &config_with_minify(false)).unwrap();

        assert!(matches!(result, Cow::Borrowed(_)));
        assert_eq!(&*result, html);
    }

    #[test]
    fn test_minify_css() {
        let css = b"body {\n    color: red;\n}\n\n/* comment */\n.nav  a {\n    margin: 0px;\n}\n";
        let result = minify(MinifyType::Css(css), &config_with_minify(true)).unwrap();
        let result_str = String::from_utf8_lossy(&result);

        assert!(result.len() < css.len());
        assert!(!result_str.contains('\n'));
        assert!(!result_str.contains("comment"));
        assert!(!result_str.contains("<style>"));
        assert!(result_str.contains("body{"));
    }

    #[test]
    fn test_minify_json_preserves_key_order() {
        let json = br#"{
            "zeta": 1,
            "alpha": [1, 2, 3],
            "mid": {"b": true, "a": null}
        }"#;
        let result = minify(MinifyType::Json(json), &config_with_minify(true)).unwrap();

        assert_eq!(
            &*result,
            br#"{"zeta":1,"alpha":[1,2,3],"mid":{"b":true,"a":null}}"#.as_slice()
        );
    }

    #[test]
    fn test_minify_json_invalid() {
        let result = minify(MinifyType::Json(b"{not json"), &config_with_minify(true));
        assert!(result.is_err());
    }

    #[test]
    fn test_minify_is_idempotent_across_runs() {
        let config = config_with_minify(true);
        let html = b"<ul>\n  <li>One</li>\n  <li>Two</li>\n</ul>\n<style> p { color : blue } </style>";
        let first = minify(MinifyType::Html(html), &config).unwrap().into_owned();
        let second = minify(MinifyType::Html(html), &config).unwrap().into_owned();
        assert_eq!(first, second);
    }
}
