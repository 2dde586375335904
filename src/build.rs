//! Build pipeline.
//!
//! ```text
//! clean ─► copy ─► css ─► html ─► json ─► pages ─► secrets ─► app
//! ```
//!
//! Each step is a plain function over the loaded config, so task chains
//! (see `tasks`) can run them one at a time and stop at the first failure.
//! Every step is deterministic: two builds of unchanged sources produce
//! byte-identical output.

use crate::{
    config::SiteConfig,
    deploy::DeployError,
    generator::{app::write_app_config, sitemap::expand_pages},
    log,
    utils::minify::{MinifyType, minify},
};
use anyhow::{Context, Result};
use minijinja::Environment;
use rustc_hash::{FxHashMap, FxHashSet};
use std::{
    env, fs,
    path::{Path, PathBuf},
};

/// Environment variables named `DOCSMITH_SECRET_<KEY>` take precedence over
/// the `[secrets] path` file.
pub const SECRET_ENV_PREFIX: &str = "DOCSMITH_SECRET_";

/// Run every build step in order, tolerating missing secrets.
pub fn build_site(config: &SiteConfig) -> Result<()> {
    clean(config)?;
    copy_files(config)?;
    minify_css(config)?;
    minify_static_html(config)?;
    minify_json(config)?;
    render_pages(config)?;
    substitute_secrets(config, false)?;
    write_app_config(config)
}

// ============================================================================
// Steps
// ============================================================================

/// Remove the output directory.
pub fn clean(config: &SiteConfig) -> Result<()> {
    let output = &config.build.output;
    if output.exists() {
        fs::remove_dir_all(output)
            .with_context(|| format!("Failed to remove {}", output.display()))?;
        log!("clean"; "{}", output.display());
    }
    Ok(())
}

/// Copy `[build] copy` matches into the output, keeping relative paths.
pub fn copy_files(config: &SiteConfig) -> Result<()> {
    let files = glob_files(config.get_root(), &config.build.copy)?;

    for (source, rel) in &files {
        let dest = config.build.output.join(rel);
        ensure_parent(&dest)?;
        fs::copy(source, &dest)
            .with_context(|| format!("Failed to copy {} to {}", source.display(), dest.display()))?;
    }

    log!("copy"; "{} files", files.len());
    Ok(())
}

/// Minify `[build] css` matches into the output.
pub fn minify_css(config: &SiteConfig) -> Result<()> {
    minify_into_output(config, &config.build.css, |bytes| MinifyType::Css(bytes))
}

/// Minify `[build] html` matches (static pages outside the sitemap).
pub fn minify_static_html(config: &SiteConfig) -> Result<()> {
    minify_into_output(config, &config.build.html, |bytes| MinifyType::Html(bytes))
}

/// Minify `[build] json` matches in place, inside the output directory.
pub fn minify_json(config: &SiteConfig) -> Result<()> {
    let files = glob_files(&config.build.output, &config.build.json)?;

    for (path, _) in &files {
        let content = fs::read(path)?;
        let minified = minify(MinifyType::Json(&content), config)
            .with_context(|| format!("Failed to minify {}", path.display()))?;
        fs::write(path, minified)?;
    }

    log!("minify"; "{} json files", files.len());
    Ok(())
}

/// Render one page per sitemap node from the templates directory.
pub fn render_pages(config: &SiteConfig) -> Result<()> {
    let mut env = Environment::new();
    env.set_loader(minijinja::path_loader(&config.build.templates));

    let jobs = expand_pages(&config.sitemap);
    for job in &jobs {
        let name = template_name(&job.template);
        let html = env
            .get_template(&name)
            .and_then(|template| template.render(&job.data))
            .with_context(|| format!("Failed to render page template `{name}`"))?;

        let html = minify(MinifyType::Html(html.as_bytes()), config)?;
        let dest = config.build.output.join(&job.output);
        ensure_parent(&dest)?;
        fs::write(&dest, html).with_context(|| format!("Failed to write {}", dest.display()))?;
    }

    log!("pages"; "{} pages", jobs.len());
    Ok(())
}

/// Fill `{{{key}}}` placeholders in `[secrets] files`.
///
/// With `strict`, any key without a value aborts with
/// [`DeployError::MissingSecrets`]; otherwise it is reported and the
/// placeholder stays in place.
pub fn substitute_secrets(config: &SiteConfig, strict: bool) -> Result<()> {
    let secrets = &config.secrets;
    if secrets.keys.is_empty() {
        return Ok(());
    }

    let table = load_secrets_file(secrets.path.as_deref())?;
    let values = resolve_secrets(&secrets.keys, |key| env::var(env_name(key)).ok(), &table);

    let missing: Vec<String> = secrets
        .keys
        .iter()
        .filter(|key| !values.contains_key(key.as_str()))
        .cloned()
        .collect();
    if !missing.is_empty() {
        if strict {
            return Err(DeployError::MissingSecrets(missing).into());
        }
        log!("warn"; "missing secrets: {}", missing.join(", "));
    }

    for file in &secrets.files {
        let path = config.build.output.join(file);
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read secrets target {}", path.display()))?;

        let filled = fill_placeholders(&content, &secrets.keys, &values);
        if filled != content {
            fs::write(&path, filled)?;
        }
        log!("secrets"; "{file}");
    }

    Ok(())
}

// ============================================================================
// Helpers
// ============================================================================

/// Expand glob patterns relative to `base` into `(absolute, relative)` file
/// pairs. Directories are skipped and overlapping patterns yield each file
/// once, in pattern order.
fn glob_files(base: &Path, patterns: &[String]) -> Result<Vec<(PathBuf, PathBuf)>> {
    let prefix = glob::Pattern::escape(&base.to_string_lossy());
    let mut seen = FxHashSet::default();
    let mut files = Vec::new();

    for pattern in patterns {
        let full = format!("{prefix}/{pattern}");
        let entries =
            glob::glob(&full).with_context(|| format!("Invalid glob pattern `{pattern}`"))?;

        for entry in entries {
            let path = entry?;
            if !path.is_file() {
                continue;
            }
            let rel = path.strip_prefix(base)?.to_path_buf();
            if seen.insert(rel.clone()) {
                files.push((path, rel));
            }
        }
    }

    Ok(files)
}

fn minify_into_output<F>(config: &SiteConfig, patterns: &[String], kind: F) -> Result<()>
where
    F: for<'a> Fn(&'a [u8]) -> MinifyType<'a>,
{
    let files = glob_files(config.get_root(), patterns)?;

    for (source, rel) in &files {
        let content = fs::read(source)?;
        let minified = minify(kind(&content), config)
            .with_context(|| format!("Failed to minify {}", source.display()))?;

        let dest = config.build.output.join(rel);
        ensure_parent(&dest)?;
        fs::write(&dest, minified)?;
    }

    log!("minify"; "{} files", files.len());
    Ok(())
}

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    Ok(())
}

/// Template loader names always use `/`.
fn template_name(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

fn env_name(key: &str) -> String {
    format!("{SECRET_ENV_PREFIX}{}", key.to_ascii_uppercase())
}

fn load_secrets_file(path: Option<&Path>) -> Result<toml::Table> {
    let Some(path) = path else {
        return Ok(toml::Table::new());
    };
    if !path.exists() {
        log!("warn"; "secrets file {} not found", path.display());
        return Ok(toml::Table::new());
    }

    let content = fs::read_to_string(path)?;
    toml::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))
}

fn resolve_secrets<F>(keys: &[String], from_env: F, table: &toml::Table) -> FxHashMap<String, String>
where
    F: Fn(&str) -> Option<String>,
{
    keys.iter()
        .filter_map(|key| {
            from_env(key)
                .or_else(|| table.get(key).and_then(|v| v.as_str()).map(str::to_owned))
                .map(|value| (key.clone(), value))
        })
        .collect()
}

fn fill_placeholders(content: &str, keys: &[String], values: &FxHashMap<String, String>) -> String {
    let mut out = content.to_owned();
    for key in keys {
        if let Some(value) = values.get(key) {
            out = out.replace(&["{{{", key.as_str(), "}}}"].concat(), value);
        }
    }
    out
}
