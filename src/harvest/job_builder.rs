//! Job builder
//!
//! Expands product records into the flat, ordered list of fetch jobs a run
//! works through.

use crate::archive::pad_sequence;
use crate::config::HostFilterConfig;
use crate::input::ProductRecord;
use crate::url::{classify_host, host_of, HostClassification};
use std::collections::HashMap;

/// One scheduled fetch
///
/// Immutable after creation; consumed by exactly one worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    /// Product code the image belongs to
    pub code: String,

    /// Link as it appeared in the sheet
    pub url: String,

    /// 1-based sequence number within the code, zero-padded
    pub seq: String,

    /// Destination host, if the link parses
    pub host: Option<String>,
}

impl Job {
    /// Key used for per-host limiting
    ///
    /// Links without a parsable host share one bucket.
    pub fn host_key(&self) -> &str {
        self.host.as_deref().unwrap_or("")
    }
}

/// Builds the job sequence for a run
///
/// Order is product order, then link order. Links whose host fails the
/// allow/deny lists are dropped without a trace. `max_per_product` (0 means
/// unlimited) caps the accepted jobs per code; sequence numbers continue when
/// a code appears on more than one record.
///
/// The output depends only on the inputs, so rebuilding yields the same
/// sequence.
///
/// # Arguments
///
/// * `records` - Products in sheet order
/// * `max_per_product` - Cap per code, 0 for unlimited
/// * `filters` - Host allow/deny lists
pub fn build_jobs(
    records: &[ProductRecord],
    max_per_product: usize,
    filters: &HostFilterConfig,
) -> Vec<Job> {
    let mut per_code: HashMap<&str, usize> = HashMap::new();
    let mut jobs = Vec::new();
    let mut filtered = 0usize;

    for record in records {
        for link in &record.links {
            let taken = per_code.entry(record.code.as_str()).or_insert(0);
            if max_per_product > 0 && *taken >= max_per_product {
                break;
            }

            match classify_host(link, filters) {
                HostClassification::Allowed => {}
                other => {
                    tracing::trace!("Skipping {} ({:?})", link, other);
                    filtered += 1;
                    continue;
                }
            }

            *taken += 1;
            jobs.push(Job {
                code: record.code.clone(),
                url: link.clone(),
                seq: pad_sequence(*taken),
                host: host_of(link),
            });
        }
    }

    tracing::debug!(
        "Built {} jobs from {} products ({} links filtered by host)",
        jobs.len(),
        records.len(),
        filtered
    );
    jobs
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(code: &str, links: &[&str]) -> ProductRecord {
        ProductRecord {
            code: code.to_string(),
            links: links.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn no_filters() -> HostFilterConfig {
        HostFilterConfig::default()
    }

    #[test]
    fn test_jobs_follow_product_then_link_order() {
        let records = vec![
            record("A1", &["http://x/1.jpg", "http://x/2.png"]),
            record("B2", &["http://y/3.jpg"]),
        ];

        let jobs = build_jobs(&records, 0, &no_filters());
        let summary: Vec<_> = jobs
            .iter()
            .map(|j| (j.code.as_str(), j.url.as_str(), j.seq.as_str()))
            .collect();

        assert_eq!(
            summary,
            vec![
                ("A1", "http://x/1.jpg", "01"),
                ("A1", "http://x/2.png", "02"),
                ("B2", "http://y/3.jpg", "01"),
            ]
        );
        assert_eq!(jobs[0].host.as_deref(), Some("x"));
    }

    #[test]
    fn test_per_product_cap() {
        let records = vec![record("A1", &["http://x/1", "http://x/2", "http://x/3"])];
        let jobs = build_jobs(&records, 2, &no_filters());
        assert_eq!(jobs.len(), 2);
        assert_eq!(jobs[1].seq, "02");
    }

    #[test]
    fn test_cap_counts_after_host_filter() {
        let filters = HostFilterConfig {
            allow: vec!["cdn.example.com".to_string()],
            deny: vec![],
        };
        let records = vec![record(
            "A1",
            &[
                "https://other.com/1.jpg",
                "https://cdn.example.com/2.jpg",
                "https://cdn.example.com/3.jpg",
            ],
        )];

        let jobs = build_jobs(&records, 1, &filters);
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].url, "https://cdn.example.com/2.jpg");
        assert_eq!(jobs[0].seq, "01");
    }

    #[test]
    fn test_allow_list_excludes_other_hosts() {
        let filters = HostFilterConfig {
            allow: vec!["cdn.example.com".to_string()],
            deny: vec![],
        };
        let records = vec![record(
            "A1",
            &["https://img.cdn.example.com/1.jpg", "https://other.com/2.jpg"],
        )];

        let jobs = build_jobs(&records, 0, &filters);
        assert_eq!(jobs.len(), 1);
        assert!(jobs.iter().all(|j| !j.url.contains("other.com")));
    }

    #[test]
    fn test_deny_list() {
        let filters = HostFilterConfig {
            allow: vec![],
            deny: vec!["ads.net".to_string()],
        };
        let records = vec![record("A1", &["https://x.ads.net/1.jpg", "https://ok.com/2.jpg"])];
        let jobs = build_jobs(&records, 0, &filters);
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].host.as_deref(), Some("ok.com"));
    }

    #[test]
    fn test_repeated_code_continues_sequence() {
        let records = vec![
            record("A1", &["http://x/1.jpg"]),
            record("A1", &["http://x/2.jpg"]),
        ];
        let jobs = build_jobs(&records, 0, &no_filters());
        assert_eq!(jobs[0].seq, "01");
        assert_eq!(jobs[1].seq, "02");
    }

    #[test]
    fn test_no_matching_links() {
        let filters = HostFilterConfig {
            allow: vec!["nowhere.org".to_string()],
            deny: vec![],
        };
        let records = vec![record("A1", &["http://x.com/1.jpg"])];
        assert!(build_jobs(&records, 0, &filters).is_empty());
    }

    #[test]
    fn test_build_is_deterministic() {
        let records = vec![
            record("A1", &["http://x/1.jpg", "http://y/2.jpg"]),
            record("B1", &["http://z/3.jpg"]),
        ];
        let first = build_jobs(&records, 0, &no_filters());
        let second = build_jobs(&records, 0, &no_filters());
        assert_eq!(first, second);
    }

    #[test]
    fn test_host_key_for_unparsable_link() {
        let jobs = build_jobs(&[record("A1", &["not a url"])], 0, &no_filters());
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].host_key(), "");
    }
}
