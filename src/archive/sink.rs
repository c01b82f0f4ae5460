use crate::archive::batch::ClosedArchive;
use crate::ArchiveResult;
use std::fs;
use std::path::{Path, PathBuf};

/// Destination for finished archives
///
/// Implementations must be thread-safe; workers store archives as soon as
/// they rotate.
pub trait ArchiveSink: Send + Sync {
    /// Persists the archive and returns where it was written
    fn store(&self, archive: &ClosedArchive) -> ArchiveResult<PathBuf>;
}

/// Writes archives into a local directory
#[derive(Debug, Clone)]
pub struct LocalDirSink {
    dir: PathBuf,
}

impl LocalDirSink {
    /// Creates the sink, creating `dir` if needed
    pub fn new(dir: impl AsRef<Path>) -> ArchiveResult<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl ArchiveSink for LocalDirSink {
    fn store(&self, archive: &ClosedArchive) -> ArchiveResult<PathBuf> {
        let path = self.dir.join(&archive.name);

        // Write to a temp name first so a partial file never carries the final name
        let partial = self.dir.join(format!("{}.partial", archive.name));
        fs::write(&partial, &archive.data)?;
        fs::rename(&partial, &path)?;

        tracing::info!(
            "Saved {} ({} files)",
            path.display(),
            archive.file_count
        );
        Ok(path)
    }
}

/// Record of an archive that was saved
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedArchive {
    pub index: u32,
    pub name: String,
    pub path: PathBuf,
    pub file_count: usize,
    pub byte_size: u64,
}

impl SavedArchive {
    pub fn new(archive: &ClosedArchive, path: PathBuf) -> Self {
        Self {
            index: archive.index,
            name: archive.name.clone(),
            path,
            file_count: archive.file_count,
            byte_size: archive.byte_size,
        }
    }
}
