use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use apiary_lib::cache::CacheConfig;
use apiary_lib::endpoint::catalog;
use apiary_lib::ratelimit::ThrottleConfig;
use apiary_lib::{ApiRequest, DEFAULT_TIMEOUT, DEFAULT_USER_AGENT, Endpoint};
use clap::Parser;
use serde::Deserialize;

use crate::parse::{parse_ids, parse_pairs};
use crate::verbosity::Verbosity;

pub(crate) const APIARY_CONFIG_FILE: &str = "apiary.toml";

const DEFAULT_REPEAT: usize = 1;

// Macro for generating default functions to be used by serde
macro_rules! default_function {
    ( $( $name:ident : $T:ty = $e:expr; )* ) => {
        $(
            #[allow(clippy::missing_const_for_fn)]
            fn $name() -> $T {
                $e
            }
        )*
    };
}

// Generate the functions for serde defaults
default_function! {
    user_agent: String = DEFAULT_USER_AGENT.to_string();
    timeout: Duration = DEFAULT_TIMEOUT;
    max_concurrent: usize = ThrottleConfig::default().max_concurrent;
    max_per_window: usize = ThrottleConfig::default().max_per_window;
    window: Duration = ThrottleConfig::default().window;
    default_lifespan: Duration = CacheConfig::default().default_lifespan;
    poll_interval: Duration = CacheConfig::default().poll_interval;
    repeat: usize = DEFAULT_REPEAT;
}

// Copy every value the command line left at its default from the config
// file. The exhaustive struct literal makes adding a field without merging
// it a compile error.
macro_rules! fold_in {
    ($cli:ident , $toml:ident ; $ty:ident { $(..$ignore:ident,)* $( $key:ident : $default:expr, )* } ) => {
        if (false) {
            #[allow(dead_code, unused, clippy::diverging_sub_expression)]
            let _check_fold_in_exhaustivity = $ty {
                $($key: unreachable!(), )*
                $($ignore: unreachable!(), )*
            };
        };
        $(
            if $cli.$key == $default && $toml.$key != $default {
                $cli.$key = $toml.$key;
            }
        )*
    };
}

/// Query a JSON HTTP API through a cached, throttled client.
///
/// Outcomes are printed to stdout as one JSON object per line.
#[derive(Parser, Debug)]
#[command(version, about)]
pub(crate) struct ApiaryOptions {
    /// Endpoint to query: a built-in name such as `questions_by_ids`, or a
    /// path starting with `/`
    pub(crate) endpoint: String,

    /// Query parameters of the request, as `key=value`
    pub(crate) params: Vec<String>,

    /// Ids of one path vector, separated by `,` or `;`.
    /// Repeat for endpoints with several placeholders.
    #[arg(short, long)]
    pub(crate) ids: Vec<String>,

    /// Configuration file to use
    #[arg(short, long = "config", help = "Configuration file to use\n\n[default: apiary.toml]")]
    pub(crate) config_file: Option<PathBuf>,

    #[clap(flatten)]
    pub(crate) config: Config,
}

impl ApiaryOptions {
    /// The request described by the positional arguments and `--ids`
    pub(crate) fn request(&self) -> Result<ApiRequest> {
        let endpoint = resolve_endpoint(&self.endpoint)?;
        let request = self
            .ids
            .iter()
            .fold(ApiRequest::new(endpoint), |request, ids| {
                request.vector(parse_ids(ids))
            });
        Ok(request.params(parse_pairs(&self.params)?))
    }
}

/// Look up a built-in endpoint, or define one from a raw path
fn resolve_endpoint(name: &str) -> Result<Endpoint> {
    if name.starts_with('/') {
        let path = name.trim_end_matches('/');
        return Ok(Endpoint::custom(path.trim_start_matches('/'), path));
    }
    catalog::lookup(name).ok_or_else(|| {
        anyhow!("Unknown endpoint `{name}`. Use a built-in name or a path starting with `/`")
    })
}

/// The main configuration for apiary
#[derive(Parser, Debug, Deserialize, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub(crate) struct Config {
    /// Verbose program output
    #[clap(flatten)]
    #[serde(default)]
    pub(crate) verbose: Verbosity,

    /// Root URL of the API, e.g. `https://api.stackexchange.com/2.3/`
    #[arg(short, long, env = "APIARY_BASE_URL")]
    #[serde(default)]
    pub(crate) base_url: Option<String>,

    /// User agent
    #[arg(short, long, default_value = DEFAULT_USER_AGENT)]
    #[serde(default = "user_agent")]
    pub(crate) user_agent: String,

    /// Custom request header, as `name=value`
    #[arg(short = 'H', long)]
    #[serde(default)]
    pub(crate) header: Vec<String>,

    /// Timeout of a single HTTP request, e.g. `30s`
    #[arg(short, long, default_value = "300s", value_parser = humantime::parse_duration)]
    #[serde(default = "timeout", with = "humantime_serde")]
    pub(crate) timeout: Duration,

    /// Query parameter added to every request that does not set it, as
    /// `key=value`. Typically `site=stackoverflow`.
    #[arg(short = 'P', long = "default-param")]
    #[serde(default)]
    pub(crate) default_params: Vec<String>,

    /// Maximum number of requests in flight at the same time
    #[arg(long, default_value_t = max_concurrent())]
    #[serde(default = "max_concurrent")]
    pub(crate) max_concurrent: usize,

    /// Maximum number of requests started within one window
    #[arg(long, default_value_t = max_per_window())]
    #[serde(default = "max_per_window")]
    pub(crate) max_per_window: usize,

    /// Length of the rate limiting window
    #[arg(long, default_value = "3s", value_parser = humantime::parse_duration)]
    #[serde(default = "window", with = "humantime_serde")]
    pub(crate) window: Duration,

    /// How long outcomes stay cached, unless the endpoint has its own
    /// lifespan
    #[arg(long, default_value = "60s", value_parser = humantime::parse_duration)]
    #[serde(default = "default_lifespan", with = "humantime_serde")]
    pub(crate) default_lifespan: Duration,

    /// How long failed outcomes stay cached.
    /// Defaults to the lifespan of successful outcomes.
    #[arg(long, value_parser = humantime::parse_duration)]
    #[serde(default, with = "humantime_serde")]
    pub(crate) error_lifespan: Option<Duration>,

    /// Interval between checks while waiting for an identical request in
    /// flight
    #[arg(long, default_value = "50ms", value_parser = humantime::parse_duration)]
    #[serde(default = "poll_interval", with = "humantime_serde")]
    pub(crate) poll_interval: Duration,

    /// Cache lifespan of one endpoint, as `endpoint=duration`, e.g. `tags=10m`
    #[arg(short, long)]
    #[serde(default)]
    pub(crate) lifespan: Vec<String>,

    /// Number of times the request is resolved, to show caching
    #[arg(short = 'n', long, default_value_t = repeat())]
    #[serde(default = "repeat")]
    pub(crate) repeat: usize,

    /// Resolve repeated requests concurrently instead of one after another
    #[arg(long)]
    #[serde(default)]
    pub(crate) parallel: bool,

    /// Print client statistics as a final JSON line
    #[arg(short, long)]
    #[serde(default)]
    pub(crate) stats: bool,
}

impl Config {
    /// Load configuration from a file
    pub(crate) fn load_from_file(path: &Path) -> Result<Config> {
        let contents = fs::read_to_string(path)?;
        toml::from_str(&contents).with_context(|| "Failed to parse configuration file")
    }

    /// Merge the configuration from TOML into the CLI configuration
    pub(crate) fn merge(&mut self, toml: Config) {
        // Headers, default params and lifespans from both sources are kept;
        // on conflict the command line wins since it is applied last.
        self.header = [toml.header, std::mem::take(&mut self.header)].concat();
        self.default_params =
            [toml.default_params, std::mem::take(&mut self.default_params)].concat();
        self.lifespan = [toml.lifespan, std::mem::take(&mut self.lifespan)].concat();

        fold_in! {
            // Destination and source configs
            self, toml;

            Config {
                // Keys which are handled outside of fold_in
                ..header,
                ..default_params,
                ..lifespan,

                // Keys with defaults to assign
                verbose: Verbosity::default(),
                base_url: None,
                user_agent: DEFAULT_USER_AGENT,
                timeout: timeout(),
                max_concurrent: max_concurrent(),
                max_per_window: max_per_window(),
                window: window(),
                default_lifespan: default_lifespan(),
                error_lifespan: None,
                poll_interval: poll_interval(),
                repeat: repeat(),
                parallel: false,
                stats: false,
            }
        }
    }

    /// Limits for the client's throttler
    pub(crate) const fn throttle(&self) -> ThrottleConfig {
        ThrottleConfig {
            max_concurrent: self.max_concurrent,
            max_per_window: self.max_per_window,
            window: self.window,
        }
    }

    /// Settings for the client's cache
    pub(crate) fn cache(&self) -> CacheConfig {
        CacheConfig {
            default_lifespan: self.default_lifespan,
            error_lifespan: self.error_lifespan,
            poll_interval: self.poll_interval,
            ..CacheConfig::default()
        }
    }
}
