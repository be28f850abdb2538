//! Extraction and validation of upstream URLs from the request query.

use crate::errors::{AggregatorError, Result};
use url::Url;
use url::form_urlencoded;

/// Repeatable query parameter carrying one upstream URL per value.
pub const URL_PARAMETER: &str = "u";

/// Parses the upstream URLs out of a raw query string.
///
/// Values are returned in request order. Every value must be an absolute
/// `http` or `https` URL; the first one that is not is reported. Nothing is
/// fetched when validation fails.
pub fn parse_query(query: Option<&str>, max_urls: usize) -> Result<Vec<Url>> {
    let raw_urls: Vec<String> = form_urlencoded::parse(query.unwrap_or_default().as_bytes())
        .filter(|(key, _)| key == URL_PARAMETER)
        .map(|(_, value)| value.into_owned())
        .collect();

    if raw_urls.is_empty() {
        tracing::debug!("request carries no upstream URLs");
        return Err(AggregatorError::MissingParameter(URL_PARAMETER));
    }

    if raw_urls.len() > max_urls {
        return Err(AggregatorError::TooManyUrls {
            count: raw_urls.len(),
            max: max_urls,
        });
    }

    raw_urls.iter().map(|raw| parse_upstream_url(raw)).collect()
}

fn parse_upstream_url(raw: &str) -> Result<Url> {
    let invalid = |reason: String| AggregatorError::InvalidUrl {
        url: raw.to_string(),
        reason,
    };

    let url = Url::parse(raw).map_err(|e| invalid(e.to_string()))?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid(format!("unsupported scheme `{}`", url.scheme())));
    }
    if url.host_str().is_none_or(str::is_empty) {
        return Err(invalid("missing host".to_string()));
    }

    Ok(url)
}
