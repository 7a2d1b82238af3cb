//! Request URL resolution

use reqwest::Url;

use super::error::ApiError;

/// Prefix of every server route; `base_url` already ends with it.
pub const API_PREFIX: &str = "/api/v1";

/// Resolve a call path against the configured base URL.
///
/// A leading `/api/v1` is dropped because `base_url` already carries the API
/// root. Paths starting with `http` are used as they are. A relative base URL
/// (e.g. `/api/v1`) is resolved against `origin`.
pub fn resolve_url(base_url: &str, origin: &str, path: &str) -> Result<Url, ApiError> {
    let path = path.strip_prefix(API_PREFIX).unwrap_or(path);
    let full = if path.starts_with("http") {
        path.to_string()
    } else {
        format!("{}{}", base_url.trim_end_matches('/'), path)
    };

    let parsed = if full.starts_with("http") {
        Url::parse(&full)
    } else {
        Url::parse(origin).and_then(|origin| origin.join(&full))
    };
    parsed.map_err(|e| ApiError::network(format!("Invalid request URL {}: {}", full, e)))
}

/// `name=value&...` with both sides percent-encoded.
pub fn encode_query<'a, I>(pairs: I) -> String
where
    I: IntoIterator<Item = (&'a str, String)>,
{
    pairs
        .into_iter()
        .map(|(name, value)| {
            format!(
                "{}={}",
                urlencoding::encode(name),
                urlencoding::encode(&value)
            )
        })
        .collect::<Vec<_>>()
        .join("&")
}
