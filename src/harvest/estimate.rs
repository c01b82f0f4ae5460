//! Size estimation and dry-run statistics
//!
//! This module handles:
//! - HEAD requests to learn `Content-Length` before downloading
//! - Projecting total payload, zip size and number of archive parts
//! - The extension distribution of the links in a sheet

use crate::archive::BatchLimits;
use crate::input::ProductRecord;
use crate::url::infer_extension;
use reqwest::header::CONTENT_LENGTH;
use reqwest::Client;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// Zip container overhead applied to the payload estimate
pub const ZIP_FACTOR: f64 = 1.02;

/// Projected sizes for a set of links
#[derive(Debug, Clone, PartialEq)]
pub struct SizeEstimate {
    pub total_links: usize,
    /// Links whose HEAD response carried a Content-Length
    pub known_count: usize,
    pub known_bytes: u64,
    pub average: u64,
    pub min: Option<u64>,
    pub max: Option<u64>,
    /// Known bytes plus unknown links at the average size
    pub estimated_total: u64,
    pub estimated_zip: u64,
    pub parts_by_count: usize,
    pub parts_by_size: usize,
}

impl SizeEstimate {
    /// Builds an estimate from per-link sizes (None = unknown)
    pub fn from_sizes(sizes: &[Option<u64>], limits: BatchLimits) -> Self {
        let known: Vec<u64> = sizes.iter().flatten().copied().collect();
        let total_links = sizes.len();
        let known_count = known.len();
        let known_bytes = known.iter().fold(0u64, |acc, size| acc.saturating_add(*size));
        let unknown = (total_links - known_count) as u64;

        let average = if known_count > 0 {
            (known_bytes as f64 / known_count as f64).round() as u64
        } else {
            0
        };
        let estimated_total = known_bytes.saturating_add(unknown.saturating_mul(average));
        let estimated_zip = (estimated_total as f64 * ZIP_FACTOR).round() as u64;

        let parts_by_count = total_links.div_ceil(limits.max_files.max(1));
        let parts_by_size = if estimated_total > 0 {
            estimated_total.div_ceil(limits.max_bytes.max(1)) as usize
        } else {
            0
        };

        Self {
            total_links,
            known_count,
            known_bytes,
            average,
            min: known.iter().min().copied(),
            max: known.iter().max().copied(),
            estimated_total,
            estimated_zip,
            parts_by_count,
            parts_by_size,
        }
    }

    /// Share of links with a known size
    pub fn known_ratio(&self) -> f64 {
        if self.total_links == 0 {
            0.0
        } else {
            self.known_count as f64 / self.total_links as f64
        }
    }

    /// The larger of the count- and size-based part projections
    pub fn estimated_parts(&self) -> usize {
        self.parts_by_count.max(self.parts_by_size.max(1))
    }
}

/// Asks the server for a resource's size without downloading it
///
/// Any failure (network, non-2xx, missing header) yields None.
pub async fn head_size(client: &Client, url: &str, timeout: Duration) -> Option<u64> {
    let response = client.head(url).timeout(timeout).send().await.ok()?;
    if !response.status().is_success() {
        return None;
    }
    response
        .headers()
        .get(CONTENT_LENGTH)?
        .to_str()
        .ok()?
        .trim()
        .parse()
        .ok()
}

/// Issues HEAD requests for every link and projects the archive layout
///
/// # Arguments
///
/// * `client` - The HTTP client to use
/// * `urls` - Links to size up
/// * `concurrency` - Parallel requests, clamped to [2, 10]
/// * `limits` - Archive limits used for the part projections
/// * `timeout` - Per-request timeout
pub async fn estimate_sizes(
    client: &Client,
    urls: Vec<String>,
    concurrency: usize,
    limits: BatchLimits,
    timeout: Duration,
) -> SizeEstimate {
    let semaphore = Arc::new(Semaphore::new(concurrency.clamp(2, 10)));
    let mut tasks = JoinSet::new();

    for url in urls {
        let client = client.clone();
        let semaphore = semaphore.clone();
        tasks.spawn(async move {
            let _permit = semaphore.acquire_owned().await.ok()?;
            head_size(&client, &url, timeout).await
        });
    }

    let mut sizes = Vec::with_capacity(tasks.len());
    while let Some(result) = tasks.join_next().await {
        sizes.push(result.ok().flatten());
    }

    let estimate = SizeEstimate::from_sizes(&sizes, limits);
    if estimate.known_count == 0 {
        tracing::warn!("No server reported a Content-Length; sizes are unknown");
    } else {
        tracing::info!(
            "Sized {}/{} links, {} bytes known",
            estimate.known_count,
            estimate.total_links,
            estimate.known_bytes
        );
    }
    estimate
}

/// Counts links per inferred extension, most common first
///
/// Links without a recognizable image extension count as `(unknown)`.
/// Ties are ordered by extension so the output is stable.
pub fn extension_distribution(records: &[ProductRecord]) -> Vec<(String, usize)> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    for link in records.iter().flat_map(|r| r.links.iter()) {
        let ext = infer_extension(link, None).unwrap_or_else(|| "(unknown)".to_string());
        *counts.entry(ext).or_insert(0) += 1;
    }

    let mut pairs: Vec<(String, usize)> = counts.into_iter().collect();
    pairs.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    pairs
}

/// Prints an estimate to stdout
pub fn print_estimate(estimate: &SizeEstimate) {
    let mb = |bytes: u64| bytes as f64 / (1024.0 * 1024.0);

    println!("=== Size Estimate ===\n");
    println!(
        "  Known sizes: {} / {} ({:.0}%)",
        estimate.known_count,
        estimate.total_links,
        estimate.known_ratio() * 100.0
    );
    println!("  Known total: {:.2} MB", mb(estimate.known_bytes));
    println!("  Average: {:.1} KB", estimate.average as f64 / 1024.0);
    if let (Some(min), Some(max)) = (estimate.min, estimate.max) {
        println!(
            "  Min / Max: {:.1} KB / {:.1} KB",
            min as f64 / 1024.0,
            max as f64 / 1024.0
        );
    }
    println!("  Estimated total: {:.2} MB", mb(estimate.estimated_total));
    println!("  Estimated zip size: {:.2} MB", mb(estimate.estimated_zip));
    println!(
        "  Estimated parts: {} (by count {}, by size {})",
        estimate.estimated_parts(),
        estimate.parts_by_count,
        estimate.parts_by_size
    );
}
