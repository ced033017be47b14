//! Error kinds surfaced by the token cache and the fetch coordinator.

use thiserror::Error;

/// Every failure a caller of the search core can observe.
///
/// `Clone` is required: one refresh outcome is handed to every task waiting on it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SearchError {
    /// Missing credentials or unusable settings. Never retried.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The identity endpoint rejected the grant, was unreachable, or answered garbage.
    #[error("authentication failed (status: {status:?}): {message}")]
    Authentication {
        status: Option<u16>,
        message: String,
    },

    /// The search endpoint answered 401 for the presented bearer token.
    #[error("search endpoint rejected the access token: {body}")]
    Authorization { body: String },

    /// Timeout or connection failure on the search call.
    #[error("connectivity error: {0}")]
    Connectivity(String),

    /// Any other non-2xx answer from the search endpoint.
    #[error("search endpoint returned {status}: {body}")]
    Upstream { status: u16, body: String },

    /// 2xx answer whose body is not JSON.
    #[error("malformed search response: {0}")]
    Decode(String),

    #[error("retries exceeded after {attempts} attempts")]
    RetriesExceeded {
        attempts: u32,
        #[source]
        last: Box<SearchError>,
    },
}

impl SearchError {
    pub fn authentication(status: Option<u16>, message: impl Into<String>) -> Self {
        SearchError::Authentication {
            status,
            message: message.into(),
        }
    }

    /// Map a transport failure of the search call.
    pub fn from_transport(err: reqwest::Error) -> Self {
        if err.is_builder() {
            return SearchError::Configuration(format!("invalid search request: {err}"));
        }
        SearchError::Connectivity(err.to_string())
    }

    /// Short label used for metrics and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            SearchError::Configuration(_) => "configuration",
            SearchError::Authentication { .. } => "authentication",
            SearchError::Authorization { .. } => "authorization",
            SearchError::Connectivity(_) => "connectivity",
            SearchError::Upstream { .. } => "upstream",
            SearchError::Decode(_) => "decode",
            SearchError::RetriesExceeded { .. } => "retries_exceeded",
        }
    }

    /// Innermost error, looking through `RetriesExceeded`.
    pub fn root_cause(&self) -> &SearchError {
        match self {
            SearchError::RetriesExceeded { last, .. } => last.root_cause(),
            other => other,
        }
    }
}
