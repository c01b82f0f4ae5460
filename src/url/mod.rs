//! URL handling module for Image-Harvest
//!
//! This module provides host extraction, host suffix matching for the
//! allow/deny lists, and file extension inference.

mod domain;
mod extension;
mod matcher;

use crate::config::HostFilterConfig;

// Re-export main functions
pub use domain::{extract_host, host_of};
pub use extension::{extension_or_fallback, infer_extension, FALLBACK_EXTENSION, IMAGE_EXTENSIONS};
pub use matcher::{matches_any, matches_suffix};

/// Host classification against the allow/deny lists
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HostClassification {
    /// Host passes both lists
    Allowed,
    /// Allow-list is non-empty and the host matches none of it
    NotAllowed,
    /// Host matches the deny-list
    Denied,
    /// Link has no parsable host and a host list is configured
    Invalid,
}

impl HostClassification {
    /// Returns true if links on this host should become jobs
    pub fn should_fetch(&self) -> bool {
        matches!(self, Self::Allowed)
    }
}

/// Classifies a link according to the host filter configuration
///
/// A host passes when `(allow empty OR host matches an allow suffix) AND
/// (deny empty OR host matches no deny suffix)`. Deny is checked first.
///
/// A link without a parsable host passes only when both lists are empty; it
/// then becomes a job that fails at fetch time and shows up in the report.
pub fn classify_host(link: &str, filters: &HostFilterConfig) -> HostClassification {
    let Some(host) = host_of(link) else {
        if filters.allow.is_empty() && filters.deny.is_empty() {
            return HostClassification::Allowed;
        }
        return HostClassification::Invalid;
    };

    if matches_any(&filters.deny, &host) {
        return HostClassification::Denied;
    }

    if !filters.allow.is_empty() && !matches_any(&filters.allow, &host) {
        return HostClassification::NotAllowed;
    }

    HostClassification::Allowed
}
