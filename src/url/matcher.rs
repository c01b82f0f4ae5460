/// Checks if a host ends with the given suffix
///
/// Matching is a plain case-insensitive `ends_with`, so `example.com` also
/// matches `cdn.example.com`. Use a leading dot (`.example.com`) to require a
/// label boundary.
///
/// # Examples
///
/// ```
/// use image_harvest::url::matches_suffix;
///
/// assert!(matches_suffix("example.com", "cdn.example.com"));
/// assert!(matches_suffix(".example.com", "cdn.example.com"));
/// assert!(!matches_suffix(".example.com", "example.com"));
/// assert!(!matches_suffix("example.com", "example.org"));
/// ```
pub fn matches_suffix(suffix: &str, host: &str) -> bool {
    if suffix.is_empty() {
        return false;
    }
    host.to_ascii_lowercase()
        .ends_with(&suffix.to_ascii_lowercase())
}

/// Checks if a host matches any suffix in the list
pub fn matches_any(suffixes: &[String], host: &str) -> bool {
    suffixes.iter().any(|s| matches_suffix(s, host))
}
