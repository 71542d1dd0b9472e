use std::collections::BTreeMap;

use anyhow::{Context, Result, anyhow};
use apiary_lib::{Client, ClientBuilder};
use url::Url;

use crate::options::Config;
use crate::parse::{parse_headers, parse_lifespans, parse_pairs};

/// Creates a client according to the command-line config
pub(crate) fn create(cfg: &Config) -> Result<Client> {
    let base_url = cfg.base_url.as_deref().ok_or_else(|| {
        anyhow!("No base URL given. Use `--base-url`, `APIARY_BASE_URL` or `base_url` in the config file")
    })?;
    let base_url = Url::parse(base_url).with_context(|| format!("Invalid base URL `{base_url}`"))?;

    let headers = parse_headers(&cfg.header)?;
    let lifespans = parse_lifespans(&cfg.lifespan)?;
    let default_params: BTreeMap<String, String> =
        parse_pairs(&cfg.default_params)?.into_iter().collect();

    ClientBuilder::builder()
        .base_url(base_url)
        .user_agent(cfg.user_agent.clone())
        .custom_headers(headers)
        .timeout(cfg.timeout)
        .throttle(cfg.throttle())
        .cache(cfg.cache())
        .lifespans(lifespans)
        .default_params(default_params)
        .build()
        .client()
        .context("Failed to create request client")
}
