use url::Url;

/// Extracts the lowercase host from a URL
///
/// Returns None when the URL has no host (which shouldn't happen for valid
/// HTTP(S) URLs).
///
/// # Examples
///
/// ```
/// use url::Url;
/// use image_harvest::url::extract_host;
///
/// let url = Url::parse("https://CDN.Example.com/a.jpg").unwrap();
/// assert_eq!(extract_host(&url), Some("cdn.example.com".to_string()));
/// ```
pub fn extract_host(url: &Url) -> Option<String> {
    url.host_str().map(|h| h.to_lowercase())
}

/// Parses a raw link and extracts its host in one step
///
/// Links come straight from the sheet and are not guaranteed to be URLs, so
/// anything that fails to parse or has no host yields None.
pub fn host_of(link: &str) -> Option<String> {
    Url::parse(link.trim()).ok().as_ref().and_then(extract_host)
}
