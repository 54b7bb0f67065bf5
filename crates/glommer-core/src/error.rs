use thiserror::Error;

/// Failures from a single HTTP fetch. Local to one request; never propagated
/// past the worker that issued it — see `processors`.
#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("timed out fetching {url}")]
    Timeout { url: String },

    #[error("dns resolution failed for {url}: {source}")]
    Dns { url: String, source: anyhow::Error },

    #[error("{url} returned HTTP {status}")]
    Http { url: String, status: u16 },

    #[error("transport error fetching {url}: {source}")]
    Transport { url: String, source: anyhow::Error },
}

/// Malformed document, invalid XPath, or an extractor applied to the wrong
/// input type.
#[derive(Debug, Error)]
#[error("parse error: {0}")]
pub struct ParseError(pub String);

impl ParseError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }
}

/// A channel-page row failed field validation during channel parsing.
#[derive(Debug, Error)]
#[error("validation error: {0}")]
pub struct ValidationError(pub String);

/// A result-cell was set twice, or read before being set. Indicates a bug in
/// the scheduler's wiring, not a remote failure.
#[derive(Debug, Error)]
#[error("invalid state: {0}")]
pub struct InvalidStateError(pub String);
