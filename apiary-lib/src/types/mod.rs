#![allow(unreachable_pub)]

mod api_error;
mod error;
mod outcome;
mod page;

pub use api_error::ApiError;
pub use error::{BoxError, ErrorKind, FetchError};
pub use outcome::{Outcome, Source};
pub use page::Page;

/// The apiary `Result` type
pub type Result<T> = std::result::Result<T, crate::ErrorKind>;
