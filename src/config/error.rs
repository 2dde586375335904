//! Errors raised while loading or checking `docsmith.toml`.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error when reading `{0}`")]
    Io(PathBuf, #[source] std::io::Error),

    #[error("Config file parsing error")]
    Toml(#[from] toml::de::Error),

    /// A value parsed fine but is unusable; `section` is the dotted table
    /// path, e.g. `build.output` or `app.handlers`.
    #[error("[{section}] {message}")]
    Invalid { section: String, message: String },
}

impl ConfigError {
    pub fn invalid(section: &str, message: impl Into<String>) -> Self {
        Self::Invalid {
            section: section.to_owned(),
            message: message.into(),
        }
    }
}
