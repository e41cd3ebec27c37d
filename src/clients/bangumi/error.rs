use crate::domain::SubjectId;
use thiserror::Error;

/// Failure of a single logical catalog API operation.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("API error: {status} - {message}")]
    Status { status: u16, message: String },

    #[error("Failed to parse response from {endpoint}: {message}")]
    Parse { endpoint: String, message: String },

    #[error("Subject {requested} was redirected more than {max} times")]
    TooManyRedirects { requested: SubjectId, max: u32 },

    #[error("Redirect from {endpoint} points to an unusable location: {location}")]
    InvalidRedirect { endpoint: String, location: String },

    #[error("Invalid request: {0}")]
    Invalid(String),

    #[error("Gave up after {attempts} attempts: {source}")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        source: Box<FetchError>,
    },
}

impl FetchError {
    /// Transport failures, non-2xx statuses and unparseable bodies may be
    /// transient; everything else is final for the call.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Transport(_) | Self::Status { .. } | Self::Parse { .. }
        )
    }

    /// The underlying failure with any retry wrapper removed.
    #[must_use]
    pub fn root(&self) -> &Self {
        match self {
            Self::RetriesExhausted { source, .. } => source.root(),
            other => other,
        }
    }

    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self.root() {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}
