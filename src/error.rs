//! Errors raised at the crate boundary.
//!
//! Recoverable problems inside a file are not errors: they are reported as
//! `Diagnostic`s on the `SourceUnit`.

use thiserror::Error;

/// Failure to analyze a single unit.
#[derive(Debug, Error)]
pub enum AnalyzeError {
    /// No analyzer is registered for the language tag.
    #[error("unsupported language: {0}")]
    UnsupportedLanguage(String),

    /// The parser backend could not be set up or produced no tree.
    #[error("{language} backend failed: {message}")]
    Backend { language: String, message: String },
}

impl AnalyzeError {
    pub(crate) fn backend(language: &str, err: anyhow::Error) -> Self {
        AnalyzeError::Backend {
            language: language.to_string(),
            message: format!("{:#}", err),
        }
    }
}

/// Failure to load an `ExtractorConfig`.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Parse(#[from] serde_yaml::Error),

    /// A `languages` entry names a language no analyzer handles.
    #[error("unknown language in config: {0}")]
    UnknownLanguage(String),

    #[error("unsupported config version: {0}")]
    UnsupportedVersion(String),
}

/// Failure to project or read back a model document.
#[derive(Debug, Error)]
pub enum ReportError {
    #[error("invalid model document: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unsupported document version: {0}")]
    UnsupportedVersion(String),
}
