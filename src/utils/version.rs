//! Deployment version strings.
//!
//! Hosting platforms only accept short, lowercase version labels. The label
//! is derived from the checkout:
//!
//! ```text
//! branch "stable" + tag "v1.2.0" + rev "abcdef1" + clean  → stable-v1-2-0-abcdef1
//! branch "Feature/X" + rev "0c1d2e3" + dirty              → feature-x-0c1d2e3-dirty
//! ```

/// Maximum length of a derived version label, suffix included.
pub const MAX_VERSION_LEN: usize = 50;

/// Appended when the working tree has uncommitted changes.
pub const DIRTY_SUFFIX: &str = "-dirty";

/// Separator between components.
const SEPARATOR: char = '-';

/// Version-control facts that feed the version label.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VersionInfo {
    pub branch: String,
    pub tag: String,
    pub revision: String,
    pub dirty: bool,
}

/// Derive the deployment version label.
///
/// Returns an empty string when branch, tag and revision are all empty,
/// regardless of the dirty flag.
pub fn derive_version(info: &VersionInfo) -> String {
    let base = [&info.branch, &info.tag, &info.revision]
        .into_iter()
        .map(|c| sanitize(c))
        .filter(|c| !c.is_empty())
        .collect::<Vec<_>>()
        .join("-");

    if base.is_empty() {
        return base;
    }

    if info.dirty {
        let mut version = truncate(&base, MAX_VERSION_LEN - DIRTY_SUFFIX.len()).to_owned();
        version.push_str(DIRTY_SUFFIX);
        version
    } else {
        truncate(&base, MAX_VERSION_LEN).to_owned()
    }
}

/// Lowercase, map everything outside `[a-z0-9]` to `-`, collapse runs of
/// `-` and trim them from both ends.
fn sanitize(component: &str) -> String {
    let mut out = String::with_capacity(component.len());
    for c in component.chars().flat_map(char::to_lowercase) {
        let c = if c.is_ascii_lowercase() || c.is_ascii_digit() { c } else { SEPARATOR };
        if c == SEPARATOR && (out.is_empty() || out.ends_with(SEPARATOR)) {
            continue;
        }
        out.push(c);
    }
    out.trim_end_matches(SEPARATOR).to_owned()
}

/// Cut to `max` bytes, then drop any dangling separator.
///
/// Input is already sanitized to ASCII, so byte slicing is safe.
fn truncate(s: &str, max: usize) -> &str {
    let cut = if s.len() > max { &s[..max] } else { s };
    cut.trim_end_matches(SEPARATOR)
}
