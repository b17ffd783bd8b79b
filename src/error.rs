//! Typed errors for the fetch, parse, render and export layers.

use thiserror::Error;

/// Failure to retrieve a page over HTTP.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request to {url} timed out")]
    Timeout { url: String },

    #[error("connection to {url} failed: {reason}")]
    ConnectionFailed { url: String, reason: String },

    #[error("HTTP {code} from {url}")]
    HttpStatus { url: String, code: u16 },

    /// Every attempt failed; `last` is the error of the final attempt.
    #[error("gave up on {url} after {attempts} attempts: {last}")]
    Exhausted {
        url: String,
        attempts: u32,
        last: Box<FetchError>,
    },

    /// The pool worker for this URL died before reporting a result.
    #[error("worker for {url} stopped without a result")]
    WorkerLost { url: String },
}

/// The input could not be turned into a document at all.
#[derive(Debug, Error)]
#[error("document could not be parsed: {reason}")]
pub struct ParseError {
    pub reason: String,
}

/// Failure of the external script-executing renderer.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("no headless browser available: {0}")]
    Unavailable(String),

    #[error("rendering {url} failed: {reason}")]
    Failed { url: String, reason: String },

    #[error("rendering {url} timed out")]
    Timeout { url: String },
}

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("failed to write {category}: {source}")]
    WriteFailed {
        category: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("unsupported output format: {0}")]
    UnsupportedFormat(String),
}

impl ExportError {
    pub fn write_failed(
        category: impl Into<String>,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self::WriteFailed {
            category: category.into(),
            source: source.into(),
        }
    }
}

/// Rejected by a category-specific schema check.
#[derive(Debug, Error)]
#[error("{category}: {reason}")]
pub struct ValidationError {
    pub category: String,
    pub reason: String,
}
