//! Default values for configuration fields.
//!
//! These functions are used by serde for default deserialization.

// ============================================================================
// Common Defaults
// ============================================================================

pub fn r#true() -> bool {
    true
}

pub fn r#false() -> bool {
    false
}

// ============================================================================
// [build] Section Defaults
// ============================================================================

pub mod build {
    use std::path::PathBuf;

    pub fn root() -> Option<PathBuf> {
        None
    }

    pub fn output() -> PathBuf {
        "build".into()
    }

    pub fn templates() -> PathBuf {
        "pages".into()
    }

    pub fn copy() -> Vec<String> {
        vec!["favicon.ico".into(), "api/**/*.json".into()]
    }

    pub fn css() -> Vec<String> {
        vec!["style.css".into()]
    }

    pub fn html() -> Vec<String> {
        Vec::new()
    }

    pub fn json() -> Vec<String> {
        vec!["api/**/*.json".into()]
    }
}

// ============================================================================
// [app] Section Defaults
// ============================================================================

pub mod app {
    use std::path::PathBuf;

    pub fn file() -> PathBuf {
        "app.yaml".into()
    }

    pub fn runtime() -> String {
        "python27".into()
    }

    pub fn api_version() -> Option<String> {
        Some("1".into())
    }

    pub fn threadsafe() -> Option<bool> {
        Some(true)
    }
}

// ============================================================================
// [robots] Section Defaults
// ============================================================================

pub mod robots {
    pub fn disallow() -> Vec<String> {
        vec!["/api".into()]
    }
}

// ============================================================================
// [deploy] Section Defaults
// ============================================================================

pub mod deploy {
    pub fn command() -> Vec<String> {
        vec!["gcloud".into(), "app".into(), "deploy".into()]
    }

    pub fn stable_branch() -> String {
        "stable".into()
    }
}

// ============================================================================
// [serve] Section Defaults
// ============================================================================

pub mod serve {
    pub fn interface() -> String {
        "127.0.0.1".into()
    }

    pub fn port() -> u16 {
        8080
    }
}
