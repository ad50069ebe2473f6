//! Error types shared by fetchers, parsers and the aggregator.
//!
//! Fetch and parse failures on auxiliary sources are swallowed at the task
//! boundary; only the mandatory source can surface an [`ScrapeError::Aggregate`]
//! to the caller. [`ScrapeError::MissingIdentifier`] and
//! [`ScrapeError::UnsupportedRequest`] are precondition failures raised before
//! any network activity.

use std::fmt;
use std::time::Duration;

/// A failure attributed to one named source, kept for diagnostics.
#[derive(Debug)]
pub struct SourceFailure {
    /// Identifier of the source task that failed (e.g. `"imdb:plot"`).
    pub source_id: String,
    /// What went wrong.
    pub error: ScrapeError,
}

impl fmt::Display for SourceFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.source_id, self.error)
    }
}

/// Error type for metadata scraping.
#[derive(Debug, thiserror::Error)]
pub enum ScrapeError {
    /// Network or transport failure, including non-success HTTP statuses.
    #[error("Fetch failed for {url}: {message}")]
    Fetch {
        url: String,
        status: Option<u16>,
        message: String,
    },

    /// The document had an unexpected or malformed shape.
    #[error("Parse error in {source_id}: {message}")]
    Parse { source_id: String, message: String },

    /// No usable external ID could be resolved for the request.
    #[error("Missing identifier: no {wanted} id available for {provider}")]
    MissingIdentifier { wanted: String, provider: String },

    /// The provider does not handle this kind of request.
    #[error("Unsupported request: {0}")]
    UnsupportedRequest(String),

    /// A source task did not finish within its time budget.
    #[error("{source_id} timed out after {after:?}")]
    Timeout { source_id: String, after: Duration },

    /// The caller abandoned the request.
    #[error("Request cancelled")]
    Cancelled,

    /// The mandatory source failed; auxiliary failures are attached for diagnostics.
    #[error("Resolution failed: {mandatory}")]
    Aggregate {
        mandatory: Box<SourceFailure>,
        auxiliary: Vec<SourceFailure>,
    },
}

impl ScrapeError {
    /// Create a new Fetch error without an HTTP status.
    pub fn fetch<U: Into<String>, M: Into<String>>(url: U, message: M) -> Self {
        Self::Fetch {
            url: url.into(),
            status: None,
            message: message.into(),
        }
    }

    /// Create a new Parse error.
    pub fn parse<S: Into<String>, M: Into<String>>(source_id: S, message: M) -> Self {
        Self::Parse {
            source_id: source_id.into(),
            message: message.into(),
        }
    }

    /// Create a new MissingIdentifier error.
    pub fn missing_id<W: Into<String>, P: Into<String>>(wanted: W, provider: P) -> Self {
        Self::MissingIdentifier {
            wanted: wanted.into(),
            provider: provider.into(),
        }
    }

    /// Create a new UnsupportedRequest error.
    pub fn unsupported<S: Into<String>>(what: S) -> Self {
        Self::UnsupportedRequest(what.into())
    }

    /// Whether retrying the same call could plausibly succeed.
    ///
    /// Transport failures and 5xx/429 statuses are transient; everything else
    /// (4xx, parse failures, precondition failures) is not.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Fetch { status: None, .. } => true,
            Self::Fetch {
                status: Some(code), ..
            } => *code == 429 || *code >= 500,
            Self::Timeout { .. } => true,
            _ => false,
        }
    }
}

/// Result type alias using [`ScrapeError`].
pub type Result<T> = std::result::Result<T, ScrapeError>;
