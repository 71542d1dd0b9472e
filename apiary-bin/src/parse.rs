use std::collections::HashMap;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use http::{HeaderMap, HeaderName, HeaderValue};

/// Split `input` at the first `=` into a trimmed (key, value) tuple.
///
/// The value may itself contain `=`.
pub(crate) fn parse_key_value(input: &str) -> Result<(String, String)> {
    let (key, value) = input
        .split_once('=')
        .ok_or_else(|| anyhow!("Value must be of the form key=value, got `{input}`"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(anyhow!("Key must not be empty in `{input}`"));
    }
    Ok((key.to_string(), value.trim().to_string()))
}

/// Parse `key=value` pairs
pub(crate) fn parse_pairs<T: AsRef<str>>(pairs: &[T]) -> Result<Vec<(String, String)>> {
    pairs.iter().map(|pair| parse_key_value(pair.as_ref())).collect()
}

/// Parse HTTP headers given as `name=value` into a `HeaderMap`
pub(crate) fn parse_headers<T: AsRef<str>>(headers: &[T]) -> Result<HeaderMap> {
    let mut out = HeaderMap::new();
    for (name, value) in parse_pairs(headers)? {
        out.insert(
            HeaderName::from_bytes(name.as_bytes())
                .with_context(|| format!("Invalid header name `{name}`"))?,
            HeaderValue::from_str(&value)
                .with_context(|| format!("Invalid value for header `{name}`"))?,
        );
    }
    Ok(out)
}

/// Parse cache lifespans given as `endpoint=duration`, e.g. `tags=10m`
pub(crate) fn parse_lifespans<T: AsRef<str>>(lifespans: &[T]) -> Result<HashMap<String, Duration>> {
    parse_pairs(lifespans)?
        .into_iter()
        .map(|(endpoint, duration)| {
            let duration = humantime::parse_duration(&duration)
                .with_context(|| format!("Invalid lifespan `{duration}` for `{endpoint}`"))?;
            Ok((endpoint, duration))
        })
        .collect()
}

/// Parse one path vector: ids separated by `,` or `;`
pub(crate) fn parse_ids(input: &str) -> Vec<String> {
    input
        .split([',', ';'])
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(String::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    use http::header;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_key_value() {
        assert_eq!(
            parse_key_value("sort=votes").unwrap(),
            ("sort".to_string(), "votes".to_string())
        );
        assert_eq!(
            parse_key_value(" filter = a=b ").unwrap(),
            ("filter".to_string(), "a=b".to_string())
        );
        assert!(parse_key_value("sort").is_err());
        assert!(parse_key_value("=votes").is_err());
    }

    #[test]
    fn test_parse_headers() {
        let headers = parse_headers(&["accept=application/json", "x-api-key=secret"]).unwrap();
        assert_eq!(headers.len(), 2);
        assert_eq!(headers[header::ACCEPT], "application/json");
        assert!(parse_headers(&["bad header=1"]).is_err());
    }

    #[test]
    fn test_parse_lifespans() {
        let lifespans = parse_lifespans(&["tags=10m", "sites=1day"]).unwrap();
        assert_eq!(lifespans["tags"], Duration::from_secs(600));
        assert_eq!(lifespans["sites"], Duration::from_secs(86_400));
        assert!(parse_lifespans(&["tags=soon"]).is_err());
    }

    #[test]
    fn test_parse_ids() {
        assert_eq!(parse_ids("1, 2;3,,"), vec!["1", "2", "3"]);
        assert!(parse_ids(" ").is_empty());
    }
}
