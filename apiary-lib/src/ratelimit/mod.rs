//! Client-wide concurrency and rate limiting.
//!
//! All requests of a client share one [`Throttler`], which keeps the number
//! of fetches in flight under a hard ceiling and the number of fetches
//! started within any window of time under a second limit.
//!
//! # Architecture
//!
//! - [`ThrottleConfig`]: Limits for both gates
//! - [`Throttler`]: Admits fetches and keeps statistics
//! - [`ThrottleStats`]: Snapshot of those statistics

mod config;
mod stats;
mod throttler;
mod window;

pub use config::ThrottleConfig;
pub use stats::ThrottleStats;
pub use throttler::Throttler;
