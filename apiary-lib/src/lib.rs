//! `apiary` is a library for resolving requests against a paginated JSON
//! HTTP API.
//!
//! Every request is resolved through a shared cache with single-flight
//! semantics and a throttler enforcing a concurrency ceiling and a sliding
//! rate window. Resolution never fails: the returned [`Outcome`] carries
//! either the decoded items or the error, tagged with where it came from.
//!
//! ```no_run
//! use apiary_lib::{ApiRequest, ClientBuilder, Outcome, Result, endpoint::catalog};
//! use url::Url;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!   let client = ClientBuilder::builder()
//!       .base_url(Url::parse("https://api.stackexchange.com/2.3/").unwrap())
//!       .build()
//!       .client()?;
//!
//!   let request = ApiRequest::new(catalog::QUESTIONS)
//!       .param("site", "stackoverflow")
//!       .param("tagged", "rust");
//!   let outcome: Outcome<Vec<serde_json::Value>> = client.get(request).await;
//!   let source = outcome.source;
//!   println!("{} items ({source})", outcome.items_or_default().len());
//!   Ok(())
//! }
//! ```
//!
//! For custom transports, resolve keys yourself with a
//! [`RequestCoordinator`] and any async fetch function returning a
//! [`Page`].

mod client;
mod coordinator;
mod key;
mod request;
mod types;

pub mod cache;
pub mod endpoint;
pub mod ratelimit;

pub use client::{Client, ClientBuilder, ClientStats, DEFAULT_TIMEOUT, DEFAULT_USER_AGENT};
pub use coordinator::RequestCoordinator;
pub use endpoint::Endpoint;
pub use key::RequestKey;
pub use request::{ApiRequest, MAX_PAGE_SIZE, MAX_VECTOR_IDS};
pub use types::*;
