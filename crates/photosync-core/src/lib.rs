pub mod conflict;
pub mod date;
pub mod error;
pub mod extract;
pub mod record;
pub mod walker;

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

pub use conflict::{ConflictDecision, DEFAULT_MAX_RENAME_ATTEMPTS};
pub use date::TargetSubpath;
pub use error::SyncError;
pub use extract::{EmbeddedDates, ExifDecoder, MetadataDecoder};
pub use record::{FileAttributes, FileRecord};
pub use walker::RunStatistics;

fn default_follow_symlinks() -> bool {
    true
}

fn default_max_rename_attempts() -> u32 {
    DEFAULT_MAX_RENAME_ATTEMPTS
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncOptions {
    /// Unstructured photo library to read from
    pub source: PathBuf,
    /// Root of the date tree; must already exist
    pub destination: PathBuf,
    #[serde(default = "default_follow_symlinks")]
    pub follow_symlinks: bool,
    #[serde(default = "default_max_rename_attempts")]
    pub max_rename_attempts: u32,
}

impl SyncOptions {
    pub fn new(source: impl Into<PathBuf>, destination: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
            destination: destination.into(),
            follow_symlinks: default_follow_symlinks(),
            max_rename_attempts: default_max_rename_attempts(),
        }
    }

    /// Check both directories exist before anything is touched, and
    /// canonicalize the source so its own name is known.
    fn validated(&self) -> Result<Self, SyncError> {
        if !self.source.is_dir() {
            return Err(SyncError::InvalidArguments(format!(
                "the source parameter is not a directory: {}",
                self.source.display()
            )));
        }
        if !self.destination.is_dir() {
            return Err(SyncError::InvalidArguments(format!(
                "the destination parameter is not a directory: {}",
                self.destination.display()
            )));
        }
        let source = self.source.canonicalize().map_err(|e| {
            SyncError::InvalidArguments(format!("{}: {}", self.source.display(), e))
        })?;

        Ok(Self {
            source,
            ..self.clone()
        })
    }
}

/// Copy the library into the destination date tree using EXIF metadata.
pub fn sync(options: &SyncOptions) -> anyhow::Result<RunStatistics> {
    sync_with_decoder(options, &ExifDecoder)
}

/// Same as [`sync`] with a custom metadata decoder.
pub fn sync_with_decoder(
    options: &SyncOptions,
    decoder: &dyn MetadataDecoder,
) -> anyhow::Result<RunStatistics> {
    let options = options.validated()?;
    log::info!(
        "Syncing photos from library: {} to: {}",
        options.source.display(),
        options.destination.display()
    );

    let stats = walker::sync_tree(&options, decoder);
    log::info!(
        "Finished: {} visited, {} copied, {} duplicates, {} errors",
        stats.files_visited,
        stats.files_copied,
        stats.duplicates_skipped,
        stats.errors
    );
    Ok(stats)
}
