//! Batch accumulator
//!
//! Packs fetched payloads into size- and count-bounded zip archives. Exactly
//! one batch is open at a time; when the next payload would push it past a
//! limit, the open batch is closed (packaged into an immutable blob) and a
//! fresh one is opened before the payload is added.

use crate::archive::naming::{archive_name, numbered_variant};
use crate::ArchiveResult;
use chrono::Local;
use std::collections::HashSet;
use std::io::{Cursor, Write};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Deflate level used for every entry
const COMPRESSION_LEVEL: i64 = 6;

/// Rotation thresholds for a single archive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchLimits {
    pub max_files: usize,
    pub max_bytes: u64,
}

/// The open (mutable) archive
struct ArchiveBatch {
    index: u32,
    file_count: usize,
    byte_size: u64,
    names: HashSet<String>,
    writer: ZipWriter<Cursor<Vec<u8>>>,
}

impl ArchiveBatch {
    fn new(index: u32) -> Self {
        Self {
            index,
            file_count: 0,
            byte_size: 0,
            names: HashSet::new(),
            writer: ZipWriter::new(Cursor::new(Vec::new())),
        }
    }

    fn is_empty(&self) -> bool {
        self.file_count == 0
    }

    /// Whether adding `size` more bytes would break a limit
    fn would_overflow(&self, limits: &BatchLimits, size: u64) -> bool {
        self.file_count >= limits.max_files || self.byte_size + size > limits.max_bytes
    }

    fn unique_name(&self, name: &str) -> String {
        if !self.names.contains(name) {
            return name.to_string();
        }
        (2..)
            .map(|n| numbered_variant(name, n))
            .find(|candidate| !self.names.contains(candidate))
            .unwrap_or_else(|| name.to_string())
    }

    fn add(&mut self, name: &str, payload: &[u8]) -> ArchiveResult<String> {
        let name = self.unique_name(name);
        let options = SimpleFileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .compression_level(Some(COMPRESSION_LEVEL));

        self.writer.start_file(name.as_str(), options)?;
        self.writer.write_all(payload)?;

        self.file_count += 1;
        self.byte_size += payload.len() as u64;
        self.names.insert(name.clone());
        Ok(name)
    }
}

/// A finished, immutable archive
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClosedArchive {
    /// 1-based part index
    pub index: u32,
    pub name: String,
    pub file_count: usize,
    /// Sum of the uncompressed payload sizes
    pub byte_size: u64,
    /// Packaged zip bytes
    pub data: Vec<u8>,
}

/// Where a payload ended up
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placement {
    pub archive_index: u32,
    pub entry_name: String,
}

/// Result of adding one payload
#[derive(Debug)]
pub struct AddOutcome {
    pub placement: Placement,
    /// The previous batch, if adding this payload rotated it
    pub closed: Option<ClosedArchive>,
}

/// Accumulates payloads into bounded archives
///
/// Not synchronized by itself; the coordinator wraps it in a mutex so that
/// "check limits, maybe rotate, add" runs as one unit.
pub struct BatchAccumulator {
    limits: BatchLimits,
    prefix: String,
    extension: String,
    next_index: u32,
    open: Option<ArchiveBatch>,
}

impl BatchAccumulator {
    pub fn new(limits: BatchLimits, prefix: impl Into<String>, extension: impl Into<String>) -> Self {
        Self {
            limits,
            prefix: prefix.into(),
            extension: extension.into(),
            next_index: 1,
            open: None,
        }
    }

    /// Number of files in the open batch
    pub fn open_file_count(&self) -> usize {
        self.open.as_ref().map(|b| b.file_count).unwrap_or(0)
    }

    /// Payload bytes in the open batch
    pub fn open_byte_size(&self) -> u64 {
        self.open.as_ref().map(|b| b.byte_size).unwrap_or(0)
    }

    /// Adds a payload under `entry_name`
    ///
    /// Limits are checked before adding: if the open batch is non-empty and
    /// would exceed `max_files` or `max_bytes`, it is closed first. A payload
    /// larger than `max_bytes` on its own therefore lands alone in a batch.
    pub fn add(&mut self, entry_name: &str, payload: &[u8]) -> ArchiveResult<AddOutcome> {
        let size = payload.len() as u64;

        let must_rotate = self
            .open
            .as_ref()
            .map(|b| !b.is_empty() && b.would_overflow(&self.limits, size))
            .unwrap_or(false);

        let closed = if must_rotate { self.close_open()? } else { None };

        let batch = match self.open.as_mut() {
            Some(batch) => batch,
            None => {
                let index = self.next_index;
                self.next_index += 1;
                tracing::debug!("Opening archive part {}", index);
                self.open.insert(ArchiveBatch::new(index))
            }
        };

        let entry_name = batch.add(entry_name, payload)?;
        Ok(AddOutcome {
            placement: Placement {
                archive_index: batch.index,
                entry_name,
            },
            closed,
        })
    }

    /// Closes any non-empty open batch
    pub fn finalize(&mut self) -> ArchiveResult<Option<ClosedArchive>> {
        self.close_open()
    }

    fn close_open(&mut self) -> ArchiveResult<Option<ClosedArchive>> {
        let Some(batch) = self.open.take() else {
            return Ok(None);
        };
        if batch.is_empty() {
            return Ok(None);
        }

        let data = batch.writer.finish()?.into_inner();
        let name = archive_name(&self.prefix, batch.index, Local::now(), &self.extension);
        tracing::info!(
            "Packaged {} ({} files, {} bytes of payload, {} bytes compressed)",
            name,
            batch.file_count,
            batch.byte_size,
            data.len()
        );

        Ok(Some(ClosedArchive {
            index: batch.index,
            name,
            file_count: batch.file_count,
            byte_size: batch.byte_size,
            data,
        }))
    }
}
