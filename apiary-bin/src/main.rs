//! `apiary` queries a paginated JSON HTTP API through a cached, throttled
//! client and prints every outcome as a line of JSON.
//!
//! The binary is a wrapper around apiary-lib, which provides request
//! resolution with single-flight caching and rate limiting.
//!
//! Fetch two questions by id:
//! ```sh
//! apiary --base-url https://api.stackexchange.com/2.3/ questions_by_ids -i 11227809,1 site=stackoverflow
//! ```
//!
//! Resolve the same request five times at once; only one is sent:
//! ```sh
//! apiary -n 5 --parallel --stats tags site=stackoverflow
//! ```
//!
//! Query an endpoint without a built-in definition:
//! ```sh
//! apiary /me/inbox access_token=...
//! ```
#![warn(clippy::all, clippy::pedantic)]
#![warn(
    absolute_paths_not_starting_with_crate,
    missing_copy_implementations,
    missing_debug_implementations,
    semicolon_in_expressions_from_macros,
    unreachable_pub,
    unused_extern_crates,
    clippy::missing_const_for_fn
)]
#![deny(anonymous_parameters, macro_use_extern_crate)]

use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::{Error, Result, bail};
use apiary_lib::{ApiRequest, Client, Outcome};
use clap::Parser;
use futures::future::join_all;
use log::info;

use crate::logging::init_logging;
use crate::options::{APIARY_CONFIG_FILE, ApiaryOptions, Config};

mod client;
mod logging;
mod options;
mod parse;
mod verbosity;

/// A C-like enum that can be cast to `i32` and used as process exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ExitCode {
    Success = 0,
    // NOTE: exit code 1 is used for any `Result::Err` bubbled up to `main()`
    // using the `?` operator, e.g. an invalid endpoint or base URL.
    #[allow(unused)]
    UnexpectedFailure = 1,
    ApiFailure = 2,
    ConfigFile = 3,
}

fn main() -> Result<()> {
    // std::process::exit doesn't guarantee that all destructors will be run,
    // therefore we wrap the main code in another function to ensure that.
    let exit_code = run_main()?;
    std::process::exit(exit_code);
}

/// Merge all provided config options into one.
/// This includes a potential config file, command-line- and environment variables
fn load_config() -> Result<ApiaryOptions> {
    let mut opts = ApiaryOptions::parse();

    // An explicit config file must exist; the default one is optional
    let config_file = match &opts.config_file {
        Some(path) => Some(path.clone()),
        None => Some(PathBuf::from(APIARY_CONFIG_FILE)).filter(|path| path.is_file()),
    };

    if let Some(config_file) = config_file {
        match Config::load_from_file(&config_file) {
            Ok(c) => opts.config.merge(c),
            Err(e) => {
                bail!(
                    "Cannot load configuration file `{}`: {e:?}",
                    config_file.display()
                );
            }
        }
    }

    init_logging(opts.config.verbose);
    Ok(opts)
}

/// Set up runtime and call apiary entrypoint
fn run_main() -> Result<i32> {
    use std::process::exit;

    let opts = match load_config() {
        Ok(opts) => opts,
        Err(e) => {
            // logging is not initialized yet
            eprintln!("Error while loading config: {e}");
            exit(ExitCode::ConfigFile as i32);
        }
    };

    let runtime = tokio::runtime::Runtime::new()?;

    match runtime.block_on(run(&opts)) {
        Err(e) if Some(io::ErrorKind::BrokenPipe) == underlying_io_error_kind(&e) => {
            exit(ExitCode::Success as i32);
        }
        res => res,
    }
}

/// Check if the given error can be traced back to an `io::ErrorKind`
/// This is helpful for troubleshooting the root cause of an error.
/// Code is taken from the anyhow documentation.
fn underlying_io_error_kind(error: &Error) -> Option<io::ErrorKind> {
    for cause in error.chain() {
        if let Some(io_error) = cause.downcast_ref::<io::Error>() {
            return Some(io_error.kind());
        }
    }
    None
}

/// Resolve the requested endpoint and print the outcomes
async fn run(opts: &ApiaryOptions) -> Result<i32> {
    let request = opts.request()?;
    let client = client::create(&opts.config)?;
    let repeat = opts.config.repeat.max(1);

    info!("Resolving `{}` {repeat} time(s)", request.key());
    let outcomes = if opts.config.parallel {
        join_all((0..repeat).map(|_| resolve(&client, request.clone()))).await
    } else {
        let mut outcomes = Vec::with_capacity(repeat);
        for _ in 0..repeat {
            outcomes.push(resolve(&client, request.clone()).await);
        }
        outcomes
    };

    let mut stdout = io::stdout().lock();
    for outcome in &outcomes {
        writeln!(stdout, "{}", serde_json::to_string(outcome)?)?;
    }
    if opts.config.stats {
        writeln!(stdout, "{}", serde_json::to_string(&client.stats())?)?;
    }

    let exit_code = if outcomes.iter().any(Outcome::is_error) {
        ExitCode::ApiFailure
    } else {
        ExitCode::Success
    };
    Ok(exit_code as i32)
}

async fn resolve(client: &Client, request: ApiRequest) -> Outcome<serde_json::Value> {
    client.get(request).await
}
