//! Error types for repo-utils.

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for organization and hub-statistics operations.
#[derive(Error, Debug)]
pub enum RepoUtilsError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow_schema::ArrowError),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("GitHub API error: {message}")]
    GitHub { message: String },

    #[error("Request to {url} failed ({status}): {body}")]
    Status {
        status: reqwest::StatusCode,
        url: String,
        body: String,
    },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("GITHUB_TOKEN environment variable is required")]
    MissingToken,

    #[error("Invalid repository '{0}': expected owner/name")]
    InvalidRepoSpec(String),

    #[error("Invalid parquet footer in {url}: {message}")]
    ParquetFooter { url: String, message: String },

    #[error("Invalid report file {path}: {message}")]
    InvalidReport { path: PathBuf, message: String },

    #[error("File not found: {0}")]
    FileNotFound(PathBuf),
}

impl RepoUtilsError {
    /// HTTP status carried by this error, if it came from a non-success response.
    pub fn status(&self) -> Option<reqwest::StatusCode> {
        match self {
            RepoUtilsError::Status { status, .. } => Some(*status),
            RepoUtilsError::Http(e) => e.status(),
            _ => None,
        }
    }
}

/// A specialized Result type for repo-utils operations.
pub type Result<T> = std::result::Result<T, RepoUtilsError>;
