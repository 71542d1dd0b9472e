use std::error::Error;
use std::sync::Arc;

use serde::{Serialize, Serializer};
use thiserror::Error;

use crate::ApiError;

/// Type-erased cause of a transport failure
pub type BoxError = Box<dyn Error + Send + Sync>;

/// Possible errors when resolving requests with `apiary_lib`
///
/// Every variant is cheap to clone: a cached [`crate::Outcome`] hands the same
/// error to every caller that shares it, so non-`Clone` causes are kept
/// behind an [`Arc`].
#[derive(Error, Debug, Clone)]
#[non_exhaustive]
pub enum ErrorKind {
    /// The request broke a precondition and was never sent
    #[error("Invalid request `{key}`: {reason}")]
    InvalidRequest {
        /// Key of the rejected request
        key: String,
        /// What is wrong with it
        reason: String,
    },

    /// The remote API answered with a structured error payload
    #[error("API responded with status {status} for `{key}`: {error}")]
    Api {
        /// Key of the failed request
        key: String,
        /// HTTP status code of the response
        status: u16,
        /// The decoded error payload
        error: ApiError,
    },

    /// The remote API answered with a non-success status and a body that is
    /// not a structured error
    #[error("Unexpected status {status} for `{key}`")]
    UnexpectedResponse {
        /// Key of the failed request
        key: String,
        /// HTTP status code of the response
        status: u16,
        /// Raw response body, kept for diagnosis
        body: String,
    },

    /// Connection, timeout or other transport-level failure
    #[error("Network error while resolving `{key}`: {source}")]
    Transport {
        /// Key of the failed request
        key: String,
        /// The original failure
        #[source]
        source: Arc<dyn Error + Send + Sync>,
    },

    /// A success response that does not decode into the expected payload
    #[error("Cannot decode response for `{key}`: {source}")]
    Decode {
        /// Key of the failed request
        key: String,
        /// The original decoding failure
        #[source]
        source: Arc<serde_json::Error>,
    },

    /// The caller's deadline passed before an outcome was available
    #[error("Deadline exceeded while resolving `{key}`")]
    DeadlineExceeded {
        /// Key of the abandoned request
        key: String,
    },

    /// No base URL was given to the [`crate::ClientBuilder`]
    #[error("A base URL is required to build a client")]
    MissingBaseUrl,

    /// The given base URL cannot be used to resolve request keys
    #[error("Invalid base URL `{0}`: must be an absolute http(s) URL")]
    InvalidBaseUrl(String),

    /// A header value could not be parsed
    #[error("Header could not be parsed: {0}")]
    InvalidHeader(String),

    /// The underlying HTTP client could not be created
    #[error("Failed to create HTTP client: {0}")]
    BuildRequestClient(Arc<reqwest::Error>),
}

impl ErrorKind {
    /// The request key this error belongs to, if any
    #[must_use]
    pub fn key(&self) -> Option<&str> {
        match self {
            Self::InvalidRequest { key, .. }
            | Self::Api { key, .. }
            | Self::UnexpectedResponse { key, .. }
            | Self::Transport { key, .. }
            | Self::Decode { key, .. }
            | Self::DeadlineExceeded { key } => Some(key),
            Self::MissingBaseUrl
            | Self::InvalidBaseUrl(_)
            | Self::InvalidHeader(_)
            | Self::BuildRequestClient(_) => None,
        }
    }

    /// The structured remote error, if the API sent one
    #[must_use]
    pub const fn api_error(&self) -> Option<&ApiError> {
        match self {
            Self::Api { error, .. } => Some(error),
            _ => None,
        }
    }
}

impl Serialize for ErrorKind {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

/// Failure reported by a fetch closure.
///
/// This is the boundary between the transport and the coordinator: the
/// variant decides which [`crate::Source`] the resulting outcome gets.
#[derive(Error, Debug)]
pub enum FetchError {
    /// A precondition failed before any network activity
    #[error("Invalid request: {0}")]
    Validation(String),

    /// The server answered with a non-success status
    #[error("Server responded with status {status}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Response body, possibly a structured API error
        body: String,
    },

    /// The request did not complete
    #[error("Transport failure: {0}")]
    Transport(#[source] BoxError),

    /// The response body did not decode
    #[error("Cannot decode response: {0}")]
    Decode(#[from] serde_json::Error),

    /// The caller's deadline passed while waiting or fetching
    #[error("Deadline exceeded")]
    Deadline,
}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        Self::Transport(Box::new(e))
    }
}
