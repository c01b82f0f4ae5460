//! Link extraction from product sheets
//!
//! This module normalizes raw sheet rows into [`ProductRecord`]s:
//! - Detecting which columns hold the product code and the image links
//! - Sanitizing codes so they are safe to use in file names
//! - Splitting and deduplicating link cells

mod columns;
mod extractor;

pub use columns::{detect_columns, looks_like_header, ColumnLayout};
pub use extractor::{extract_records, read_csv, ExtractedSheet};

/// One product with its image links
///
/// `code` is non-empty and filesystem-safe; `links` are non-empty, trimmed and
/// deduplicated in first-seen order. Links are not guaranteed to be valid URLs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductRecord {
    pub code: String,
    pub links: Vec<String>,
}

impl ProductRecord {
    /// Builds a record from raw cell values
    ///
    /// Returns None if the sanitized code is empty or no links remain.
    pub fn from_cells(raw_code: &str, raw_links: &str) -> Option<Self> {
        let code = sanitize_code(raw_code);
        let links = split_links(raw_links);
        if code.is_empty() || links.is_empty() {
            return None;
        }
        Some(Self { code, links })
    }
}

/// Makes a product code safe to use as a file or directory name
///
/// Trims, replaces `\ / : * ? " < > |` with `-` and collapses whitespace runs
/// into `_`.
pub fn sanitize_code(raw: &str) -> String {
    let replaced: String = raw
        .trim()
        .chars()
        .map(|c| match c {
            '\\' | '/' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '-',
            other => other,
        })
        .collect();

    replaced.split_whitespace().collect::<Vec<_>>().join("_")
}

/// Splits a links cell on newlines, commas, semicolons, pipes and the Arabic
/// comma, dropping empties and duplicates
pub fn split_links(raw: &str) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    raw.split(['\n', '\r', ',', ';', '|', '\u{060C}'])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .filter(|s| seen.insert(s.to_string()))
        .map(str::to_string)
        .collect()
}
