//! Handler of API requests.
//!
//! Use [`ClientBuilder`] to configure a [`Client`]. Each client owns its own
//! cache and throttler, so two clients never share state.
//!
//! A [`Client`] turns an [`ApiRequest`] into a [`RequestKey`], and resolves
//! that key through its [`RequestCoordinator`] with an HTTP fetch against the
//! configured base URL.
#![allow(clippy::module_name_repetitions)]
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use http::header::{self, HeaderMap, HeaderValue};
use log::{debug, trace, warn};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::time::Instant;
use typed_builder::TypedBuilder;
use url::Url;

use crate::cache::{CacheConfig, CacheStats, LifespanOverrides, ResponseCache};
use crate::ratelimit::{ThrottleConfig, ThrottleStats, Throttler};
use crate::{
    ApiRequest, ErrorKind, FetchError, Outcome, Page, RequestCoordinator, RequestKey, Result,
};

/// Default timeout of a single HTTP request.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);
/// Default user agent, `apiary/<PKG_VERSION>`.
pub const DEFAULT_USER_AGENT: &str = concat!("apiary/", env!("CARGO_PKG_VERSION"));

/// Builder for [`Client`].
///
/// See crate-level documentation for usage example.
#[derive(TypedBuilder, Debug, Clone)]
#[builder(field_defaults(default, setter(into)))]
#[builder(builder_method(doc = "
Create a builder for building `ClientBuilder`.

On the builder call, call methods with same name as its fields to set their values.

Finally, call `.build()` to create the instance of `ClientBuilder`.
"))]
pub struct ClientBuilder {
    /// Root all request keys are resolved against, e.g.
    /// `https://api.example.com/2.3/`.
    ///
    /// This is the only required field.
    #[builder(setter(strip_option))]
    base_url: Option<Url>,

    /// User-agent used for requests.
    ///
    /// Some APIs reject requests without a descriptive user agent.
    #[builder(default_code = "String::from(DEFAULT_USER_AGENT)")]
    user_agent: String,

    /// Custom request headers sent with every request.
    custom_headers: HeaderMap,

    /// Response timeout per request.
    #[builder(default = DEFAULT_TIMEOUT)]
    timeout: Duration,

    /// Concurrency and rate limits shared by all requests of the client.
    throttle: ThrottleConfig,

    /// Cache lifespans and waiting behavior.
    cache: CacheConfig,

    /// Cache lifespan per endpoint name, overriding the endpoint's own
    /// default.
    lifespans: LifespanOverrides,

    /// Query parameters added to every request that does not set them
    /// itself, e.g. `site` or `key`.
    default_params: BTreeMap<String, String>,
}

impl Default for ClientBuilder {
    #[inline]
    fn default() -> Self {
        Self::builder().build()
    }
}

impl ClientBuilder {
    /// Instantiates a [`Client`].
    ///
    /// # Errors
    ///
    /// Returns an `Err` if:
    /// - The base URL is missing, not absolute or not http(s)
    /// - The user-agent contains characters other than ASCII 32-127
    /// - The reqwest client cannot be instantiated. This occurs if a TLS
    ///   backend cannot be initialized or the resolver fails to load the system
    ///   configuration. See [here].
    ///
    /// [here]: https://docs.rs/reqwest/latest/reqwest/struct.ClientBuilder.html#errors
    pub fn client(self) -> Result<Client> {
        let Self {
            base_url,
            user_agent,
            custom_headers: mut headers,
            timeout,
            throttle,
            cache,
            lifespans,
            default_params,
        } = self;

        let base_url = normalize_base_url(base_url.ok_or(ErrorKind::MissingBaseUrl)?)?;

        headers.insert(
            header::USER_AGENT,
            HeaderValue::from_str(&user_agent)
                .map_err(|e| ErrorKind::InvalidHeader(e.to_string()))?,
        );
        headers
            .entry(header::ACCEPT)
            .or_insert(HeaderValue::from_static("application/json"));

        let reqwest_client = reqwest::ClientBuilder::new()
            .gzip(true)
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|e| ErrorKind::BuildRequestClient(Arc::new(e)))?;

        let coordinator = RequestCoordinator::new(
            Arc::new(ResponseCache::new(cache, lifespans)),
            Arc::new(Throttler::new(throttle)),
        );

        debug!("Created client for {base_url}");
        Ok(Client {
            reqwest_client,
            base_url,
            default_params,
            coordinator,
        })
    }
}

/// The base URL must be able to serve as the root of relative joins
fn normalize_base_url(mut url: Url) -> Result<Url> {
    if url.cannot_be_a_base() || !matches!(url.scheme(), "http" | "https") {
        return Err(ErrorKind::InvalidBaseUrl(url.to_string()));
    }
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url.set_query(None);
    url.set_fragment(None);
    Ok(url)
}

/// Counters of a [`Client`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct ClientStats {
    /// Throttling counters
    pub throttle: ThrottleStats,
    /// Cache counters
    pub cache: CacheStats,
}

/// Handles incoming requests and returns their outcomes.
///
/// See [`ClientBuilder`] which contains sane defaults for all configuration
/// options.
#[derive(Debug, Clone)]
pub struct Client {
    /// Underlying `reqwest` client instance that handles the HTTP requests.
    reqwest_client: reqwest::Client,

    base_url: Url,

    default_params: BTreeMap<String, String>,

    coordinator: RequestCoordinator,
}

impl Client {
    /// Resolve `request` and decode its items as `T`.
    ///
    /// Never fails: errors are reported in the returned [`Outcome`].
    pub async fn get<T>(&self, request: ApiRequest) -> Outcome<T>
    where
        T: DeserializeOwned + Clone + Send + Sync + 'static,
    {
        self.get_with_deadline(request, None).await
    }

    /// Like [`Client::get`], but gives up once `deadline` passes
    pub async fn get_with_deadline<T>(
        &self,
        request: ApiRequest,
        deadline: Option<Instant>,
    ) -> Outcome<T>
    where
        T: DeserializeOwned + Clone + Send + Sync + 'static,
    {
        let request = request.with_defaults(&self.default_params);
        let key = request.key();
        self.coordinator
            .resolve_checked(
                &key,
                || request.validate().map_err(FetchError::Validation),
                || self.fetch(&key),
                deadline,
            )
            .await
    }

    /// Send a single GET request for `key` and decode the page
    async fn fetch<T>(&self, key: &RequestKey) -> std::result::Result<Page<T>, FetchError>
    where
        T: DeserializeOwned,
    {
        let url = self.url_for(key)?;

        trace!("GET {url}");
        let response = self.reqwest_client.get(url).send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let page: Page<T> = serde_json::from_str(&body)?;
        if let Some(backoff) = page.backoff {
            warn!("API asked to back off for {backoff}s after `{key}`");
        }
        if let (Some(remaining), Some(max)) = (page.quota_remaining, page.quota_max) {
            trace!("Quota for `{key}`: {remaining}/{max} remaining");
        }
        Ok(page)
    }

    fn url_for(&self, key: &RequestKey) -> std::result::Result<Url, FetchError> {
        self.base_url
            .join(key.as_str().trim_start_matches('/'))
            .map_err(|e| FetchError::Validation(format!("cannot build URL for `{key}`: {e}")))
    }

    /// The root request keys are resolved against
    #[must_use]
    pub const fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// The coordinator requests are resolved through.
    ///
    /// Useful to resolve keys with a custom fetch while sharing this
    /// client's cache and throttler.
    #[must_use]
    pub const fn coordinator(&self) -> &RequestCoordinator {
        &self.coordinator
    }

    /// Snapshot of the client's cache and throttling counters
    #[must_use]
    pub fn stats(&self) -> ClientStats {
        ClientStats {
            throttle: self.coordinator.throttler().stats(),
            cache: self.coordinator.cache().stats(),
        }
    }
}
