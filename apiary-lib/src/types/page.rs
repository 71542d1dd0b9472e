use serde::{Deserialize, Serialize};

/// The common wrapper around every successful API response.
///
/// Only `items` is required; the remaining fields are informational and
/// default to `None` when the server leaves them out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page<T> {
    /// The typed payload
    pub items: T,
    /// Whether more pages are available
    #[serde(default)]
    pub has_more: Option<bool>,
    /// Total request quota of the caller
    #[serde(default)]
    pub quota_max: Option<u32>,
    /// Requests left in the current quota
    #[serde(default)]
    pub quota_remaining: Option<u32>,
    /// Seconds the server asks clients to wait before hitting the same
    /// method again
    #[serde(default)]
    pub backoff: Option<u64>,
}

impl<T> Page<T> {
    /// Wrap `items` without any pagination or quota information
    #[must_use]
    pub const fn new(items: T) -> Self {
        Self {
            items,
            has_more: None,
            quota_max: None,
            quota_remaining: None,
            backoff: None,
        }
    }

    /// Set the pagination flag
    #[must_use]
    pub fn with_has_more(mut self, has_more: bool) -> Self {
        self.has_more = Some(has_more);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_minimal_page() {
        let page: Page<Vec<u32>> = serde_json::from_str(r#"{"items":[1,2,3]}"#).unwrap();
        assert_eq!(page, Page::new(vec![1, 2, 3]));
    }

    #[test]
    fn test_deserialize_full_page() {
        let page: Page<Vec<u32>> = serde_json::from_str(
            r#"{"items":[],"has_more":true,"quota_max":300,"quota_remaining":299,"backoff":10}"#,
        )
        .unwrap();
        assert_eq!(page.has_more, Some(true));
        assert_eq!(page.quota_max, Some(300));
        assert_eq!(page.quota_remaining, Some(299));
        assert_eq!(page.backoff, Some(10));
    }

    #[test]
    fn test_missing_items_is_an_error() {
        assert!(serde_json::from_str::<Page<Vec<u32>>>(r#"{"has_more":false}"#).is_err());
    }
}
