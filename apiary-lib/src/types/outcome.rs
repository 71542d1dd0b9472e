use serde::Serialize;
use strum::Display;

use crate::{ErrorKind, Page, Result};

/// Where an [`Outcome`] came from.
///
/// Besides helping with diagnosis, the source decides whether an outcome may
/// be written into the response cache: a [`Source::Cache`] outcome never is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Display)]
pub enum Source {
    /// Not produced by any resolution path
    #[default]
    None,
    /// Rejected locally before any network activity
    LocalError,
    /// The remote side or the transport failed
    RemoteError,
    /// Fetched from the network
    Network,
    /// Served from the response cache
    Cache,
}

/// Uniform result envelope returned for every resolved request.
///
/// Callers never have to tell cache, network and error paths apart
/// structurally: a successful outcome carries `items`, a failed one carries
/// `error`, and `source` records how it was produced.
#[derive(Debug, Clone, Serialize)]
pub struct Outcome<T> {
    /// The typed payload
    pub items: Option<T>,
    /// Pagination flag reported by the API
    pub has_more: Option<bool>,
    /// Why the request failed, if it did
    pub error: Option<ErrorKind>,
    /// How this outcome was produced
    pub source: Source,
}

impl<T> Outcome<T> {
    /// A successful outcome fetched from the network
    #[must_use]
    pub fn from_page(page: Page<T>) -> Self {
        Self {
            items: Some(page.items),
            has_more: page.has_more,
            error: None,
            source: Source::Network,
        }
    }

    /// A failed outcome
    #[must_use]
    pub const fn failure(source: Source, error: ErrorKind) -> Self {
        Self {
            items: None,
            has_more: None,
            error: Some(error),
            source,
        }
    }

    /// Returns `true` if no error is attached
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.error.is_none()
    }

    /// Returns `true` if an error is attached
    #[must_use]
    pub const fn is_error(&self) -> bool {
        self.error.is_some()
    }

    /// Returns `true` if this outcome was served from the cache
    #[must_use]
    pub fn is_cached(&self) -> bool {
        self.source == Source::Cache
    }

    /// Safe access: the payload, or `T::default()` if the request failed
    #[must_use]
    pub fn items_or_default(self) -> T
    where
        T: Default,
    {
        self.items.unwrap_or_default()
    }

    /// Direct access: the payload, or the error that prevented it
    ///
    /// # Errors
    ///
    /// Returns the attached [`ErrorKind`] if the request failed.
    pub fn into_result(self) -> Result<T>
    where
        T: Default,
    {
        match self.error {
            Some(error) => Err(error),
            None => Ok(self.items.unwrap_or_default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn invalid() -> ErrorKind {
        ErrorKind::InvalidRequest {
            key: "/questions".to_string(),
            reason: "pagesize must be at most 100".to_string(),
        }
    }

    #[test]
    fn test_from_page() {
        let outcome = Outcome::from_page(Page::new(vec![1, 2]).with_has_more(true));
        assert_eq!(outcome.items, Some(vec![1, 2]));
        assert_eq!(outcome.has_more, Some(true));
        assert_eq!(outcome.source, Source::Network);
        assert!(outcome.is_success());
        assert!(!outcome.is_cached());
    }

    #[test]
    fn test_safe_access_on_error() {
        let outcome: Outcome<Vec<u32>> = Outcome::failure(Source::LocalError, invalid());
        assert!(outcome.is_error());
        assert_eq!(outcome.items_or_default(), Vec::<u32>::new());
    }

    #[test]
    fn test_direct_access_on_error() {
        let outcome: Outcome<Vec<u32>> = Outcome::failure(Source::LocalError, invalid());
        let error = outcome.into_result().unwrap_err();
        assert!(matches!(error, ErrorKind::InvalidRequest { .. }));
        assert_eq!(error.key(), Some("/questions"));
    }

    #[test]
    fn test_serialize_outcome() {
        let outcome: Outcome<Vec<u32>> = Outcome::failure(Source::LocalError, invalid());
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["source"], "LocalError");
        assert_eq!(
            json["error"],
            "Invalid request `/questions`: pagesize must be at most 100"
        );
        assert!(json["items"].is_null());
    }
}
