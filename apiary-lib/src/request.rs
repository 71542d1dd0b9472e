use std::collections::BTreeMap;

use percent_encoding::{AsciiSet, CONTROLS, utf8_percent_encode};
use url::form_urlencoded;

use crate::{Endpoint, RequestKey};

/// Maximum number of ids accepted in a single path vector
pub const MAX_VECTOR_IDS: usize = 100;
/// Maximum accepted value of the `pagesize` parameter
pub const MAX_PAGE_SIZE: u64 = 100;

/// Separator between the ids of one path vector
const VECTOR_SEPARATOR: &str = ";";

/// Characters escaped inside a path vector id.
/// `;` is escaped as well, since it separates ids.
const ID_ENCODE_SET: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b';')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// A logical API call: endpoint, path vectors and query parameters.
///
/// Parameter names are trimmed and lower-cased when added, and a later value
/// for the same name replaces an earlier one. Parameters with an empty value
/// are treated as unset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiRequest {
    endpoint: Endpoint,
    vectors: Vec<Vec<String>>,
    params: BTreeMap<String, String>,
}

impl ApiRequest {
    /// Create a request for `endpoint` without vectors or parameters
    #[must_use]
    pub const fn new(endpoint: Endpoint) -> Self {
        Self {
            endpoint,
            vectors: Vec::new(),
            params: BTreeMap::new(),
        }
    }

    /// Append a path vector, substituted into the next `{placeholder}` of
    /// the endpoint's path template
    #[must_use]
    pub fn vector<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: ToString,
    {
        self.vectors
            .push(ids.into_iter().map(|id| id.to_string()).collect());
        self
    }

    /// Set a query parameter
    #[must_use]
    pub fn param(mut self, name: impl AsRef<str>, value: impl ToString) -> Self {
        self.insert_param(name.as_ref(), &value.to_string());
        self
    }

    /// Set all given query parameters
    #[must_use]
    pub fn params<I, K, V>(mut self, params: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: ToString,
    {
        for (name, value) in params {
            self.insert_param(name.as_ref(), &value.to_string());
        }
        self
    }

    /// Fill in `defaults` for every parameter this request does not set
    /// itself
    #[must_use]
    pub fn with_defaults(mut self, defaults: &BTreeMap<String, String>) -> Self {
        for (name, value) in defaults {
            let name = normalize_name(name);
            if !self.params.contains_key(&name) {
                self.insert_param(&name, value);
            }
        }
        self
    }

    /// The endpoint of this request
    #[must_use]
    pub const fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// The normalized value of a query parameter
    #[must_use]
    pub fn get_param(&self, name: &str) -> Option<&str> {
        self.params.get(&normalize_name(name)).map(String::as_str)
    }

    /// Build the cache key of this request.
    ///
    /// The key is also the path and query the request is sent to, relative
    /// to the client's base URL.
    #[must_use]
    pub fn key(&self) -> RequestKey {
        let vectors: Vec<String> = self
            .vectors
            .iter()
            .map(|ids| {
                ids.iter()
                    .map(|id| utf8_percent_encode(id.trim(), ID_ENCODE_SET).to_string())
                    .collect::<Vec<_>>()
                    .join(VECTOR_SEPARATOR)
            })
            .collect();
        let mut key = self.endpoint.render(&vectors);

        if !self.params.is_empty() {
            // `BTreeMap` iterates in sorted order
            let query = form_urlencoded::Serializer::new(String::new())
                .extend_pairs(self.params.iter())
                .finish();
            key.push('?');
            key.push_str(&query);
        }

        RequestKey::new(key, self.endpoint.clone())
    }

    /// Check the preconditions of this request.
    ///
    /// # Errors
    ///
    /// Returns a description of the first violated precondition.
    pub fn validate(&self) -> Result<(), String> {
        let expected = self.endpoint.placeholders();
        if self.vectors.len() != expected {
            return Err(format!(
                "endpoint `{}` expects {expected} path vector(s), got {}",
                self.endpoint,
                self.vectors.len()
            ));
        }

        for (index, ids) in self.vectors.iter().enumerate() {
            if ids.is_empty() {
                return Err(format!("path vector {index} is empty"));
            }
            if ids.len() > MAX_VECTOR_IDS {
                return Err(format!(
                    "path vector {index} has {} ids, at most {MAX_VECTOR_IDS} are allowed",
                    ids.len()
                ));
            }
            if ids.iter().any(|id| id.trim().is_empty()) {
                return Err(format!("path vector {index} contains an empty id"));
            }
        }

        if let Some(page) = self.numeric_param("page")?
            && page < 1
        {
            return Err("page must be at least 1".to_string());
        }

        if let Some(page_size) = self.numeric_param("pagesize")?
            && page_size > MAX_PAGE_SIZE
        {
            return Err(format!("pagesize must be at most {MAX_PAGE_SIZE}"));
        }

        if let (Some(from), Some(to)) = (
            self.numeric_param("fromdate")?,
            self.numeric_param("todate")?,
        ) && from > to
        {
            return Err(format!("fromdate ({from}) is after todate ({to})"));
        }

        Ok(())
    }

    fn numeric_param(&self, name: &str) -> Result<Option<u64>, String> {
        self.params
            .get(name)
            .map(|value| {
                value
                    .parse::<u64>()
                    .map_err(|_| format!("{name} must be a non-negative integer, got `{value}`"))
            })
            .transpose()
    }

    fn insert_param(&mut self, name: &str, value: &str) {
        let name = normalize_name(name);
        if name.is_empty() {
            return;
        }
        let value = value.trim();
        if value.is_empty() {
            self.params.remove(&name);
        } else {
            self.params.insert(name, value.to_string());
        }
    }
}

fn normalize_name(name: &str) -> String {
    name.trim().to_lowercase()
}
