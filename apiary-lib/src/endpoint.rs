//! Logical API endpoints.
//!
//! An [`Endpoint`] names a remote method and carries its path template. Path
//! templates contain `{placeholder}` segments which are substituted, in
//! order, by the path vectors of an [`crate::ApiRequest`].
//!
//! Endpoints may declare a static cache lifespan. Slowly changing resources
//! (error catalogs, site metadata) cache far longer than the global default.
//! See [`catalog`] for the built-in table.

use std::borrow::Cow;
use std::fmt;
use std::time::Duration;

/// A logical API endpoint
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Endpoint {
    name: Cow<'static, str>,
    path: Cow<'static, str>,
    lifespan: Option<Duration>,
}

impl Endpoint {
    /// An endpoint without a static lifespan
    #[must_use]
    pub const fn new(name: &'static str, path: &'static str) -> Self {
        Self {
            name: Cow::Borrowed(name),
            path: Cow::Borrowed(path),
            lifespan: None,
        }
    }

    /// An endpoint whose responses stay fresh for `lifespan` unless the
    /// client overrides it
    #[must_use]
    pub const fn with_default_lifespan(
        name: &'static str,
        path: &'static str,
        lifespan: Duration,
    ) -> Self {
        Self {
            name: Cow::Borrowed(name),
            path: Cow::Borrowed(path),
            lifespan: Some(lifespan),
        }
    }

    /// An endpoint defined at runtime, e.g. from user input.
    ///
    /// A missing leading `/` is added to `path`.
    #[must_use]
    pub fn custom(name: impl Into<String>, path: impl Into<String>) -> Self {
        let path = path.into();
        let path = if path.starts_with('/') {
            path
        } else {
            format!("/{path}")
        };
        Self {
            name: Cow::Owned(name.into()),
            path: Cow::Owned(path),
            lifespan: None,
        }
    }

    /// Identifier used for lifespan overrides
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Path template, e.g. `/questions/{ids}/answers`
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Static cache lifespan of this endpoint, if it has one
    #[must_use]
    pub const fn default_lifespan(&self) -> Option<Duration> {
        self.lifespan
    }

    /// Number of `{placeholder}` segments in the path template
    #[must_use]
    pub fn placeholders(&self) -> usize {
        self.path.split('/').filter(|s| is_placeholder(s)).count()
    }

    /// Substitute the given, already encoded, path vectors into the template.
    ///
    /// Placeholders without a matching vector are left untouched.
    pub(crate) fn render(&self, vectors: &[String]) -> String {
        let mut vectors = vectors.iter();
        self.path
            .split('/')
            .map(|segment| {
                if is_placeholder(segment) {
                    vectors.next().map_or(segment, String::as_str)
                } else {
                    segment
                }
            })
            .collect::<Vec<_>>()
            .join("/")
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

fn is_placeholder(segment: &str) -> bool {
    segment.len() > 2 && segment.starts_with('{') && segment.ends_with('}')
}

/// Built-in endpoints with their static cache lifespans
pub mod catalog {
    use std::time::Duration;

    use super::Endpoint;

    const MINUTE: u64 = 60;
    const DAY: u64 = 24 * 60 * MINUTE;

    /// All answers
    pub const ANSWERS: Endpoint = Endpoint::new("answers", "/answers");
    /// Answers by id
    pub const ANSWERS_BY_IDS: Endpoint = Endpoint::new("answers_by_ids", "/answers/{ids}");
    /// The catalog of API error codes; practically never changes
    pub const ERRORS: Endpoint =
        Endpoint::with_default_lifespan("errors", "/errors", Duration::from_secs(DAY));
    /// Statistics about a site
    pub const INFO: Endpoint =
        Endpoint::with_default_lifespan("info", "/info", Duration::from_secs(5 * MINUTE));
    /// All questions
    pub const QUESTIONS: Endpoint = Endpoint::new("questions", "/questions");
    /// Questions by id
    pub const QUESTIONS_BY_IDS: Endpoint =
        Endpoint::new("questions_by_ids", "/questions/{ids}");
    /// Answers to the given questions
    pub const QUESTION_ANSWERS: Endpoint =
        Endpoint::new("question_answers", "/questions/{ids}/answers");
    /// Full text search
    pub const SEARCH: Endpoint = Endpoint::new("search", "/search");
    /// Site metadata; changes a few times a year
    pub const SITES: Endpoint =
        Endpoint::with_default_lifespan("sites", "/sites", Duration::from_secs(DAY));
    /// All tags
    pub const TAGS: Endpoint =
        Endpoint::with_default_lifespan("tags", "/tags", Duration::from_secs(10 * MINUTE));
    /// Users by id
    pub const USERS_BY_IDS: Endpoint = Endpoint::new("users_by_ids", "/users/{ids}");

    /// Look up a built-in endpoint by name
    #[must_use]
    pub fn lookup(name: &str) -> Option<Endpoint> {
        [
            ANSWERS,
            ANSWERS_BY_IDS,
            ERRORS,
            INFO,
            QUESTIONS,
            QUESTIONS_BY_IDS,
            QUESTION_ANSWERS,
            SEARCH,
            SITES,
            TAGS,
            USERS_BY_IDS,
        ]
        .into_iter()
        .find(|endpoint| endpoint.name() == name)
    }
}
