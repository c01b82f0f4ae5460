//! Archive packaging
//!
//! This module handles:
//! - Accumulating payloads into size/count-bounded zip batches
//! - Naming archive entries and archive files
//! - Saving finished archives

mod batch;
mod naming;
mod sink;

pub use batch::{AddOutcome, BatchAccumulator, BatchLimits, ClosedArchive, Placement};
pub use naming::{archive_name, entry_name, numbered_variant, pad_sequence};
pub use sink::{ArchiveSink, LocalDirSink, SavedArchive};
