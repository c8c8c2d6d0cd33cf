//! Error types for spider-check

use thiserror::Error;

/// Fatal errors of a check run.
///
/// Per-test failures never surface here; they are recorded into the
/// [`ResultAggregator`](crate::check::ResultAggregator) as outcomes.
#[derive(Error, Debug)]
pub enum CheckError {
    #[error("Unknown contract '{identifier}': no contract registered under this identifier")]
    Configuration { identifier: String },

    #[error("Spider not found: {0}")]
    SpiderNotFound(String),

    #[error("Settings error: {0}")]
    Settings(String),

    #[error("Crawl engine error: {0}")]
    Engine(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CheckError {
    /// Errors raised while resolving configuration or loading spiders.
    ///
    /// These abort a run before any listing output or job submission.
    pub fn is_discovery_error(&self) -> bool {
        matches!(
            self,
            CheckError::Configuration { .. } | CheckError::SpiderNotFound(_) | CheckError::Settings(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, CheckError>;
