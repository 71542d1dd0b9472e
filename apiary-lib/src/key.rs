use std::fmt;

use crate::Endpoint;

/// Cache and single-flight key of a logical API call.
///
/// The key string deterministically encodes the endpoint path, the path
/// vectors and the normalized, sorted query parameters. Two logically
/// identical requests always produce the same key, no matter in which order
/// their parameters were supplied. Build one with [`crate::ApiRequest::key`].
///
/// # Examples
///
/// ```
/// use apiary_lib::{ApiRequest, endpoint::catalog};
///
/// let a = ApiRequest::new(catalog::QUESTIONS_BY_IDS)
///     .vector([3, 1])
///     .param("sort", "votes")
///     .param("Order", "desc");
/// let b = ApiRequest::new(catalog::QUESTIONS_BY_IDS)
///     .vector([3, 1])
///     .param("order", "desc")
///     .param("sort", "votes");
///
/// assert_eq!(a.key(), b.key());
/// assert_eq!(a.key().as_str(), "/questions/3;1?order=desc&sort=votes");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestKey {
    key: String,
    endpoint: Endpoint,
}

impl RequestKey {
    pub(crate) const fn new(key: String, endpoint: Endpoint) -> Self {
        Self { key, endpoint }
    }

    /// Get the key as a string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.key
    }

    /// The endpoint this key belongs to
    #[must_use]
    pub const fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Get the key as an owned String
    #[must_use]
    pub fn into_string(self) -> String {
        self.key
    }
}

impl fmt::Display for RequestKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.key)
    }
}

impl AsRef<str> for RequestKey {
    fn as_ref(&self) -> &str {
        &self.key
    }
}
