use std::fs::{self, Metadata};
use std::io;
use std::path::Path;

use filetime::FileTime;
use serde::{Deserialize, Serialize};
use walkdir::{DirEntry, WalkDir};

use crate::conflict::resolve_conflict;
use crate::date::resolve_target;
use crate::error::SyncError;
use crate::extract::{extract, MetadataDecoder};
use crate::record::{is_hidden, FileAttributes};
use crate::SyncOptions;

/// Counters for one run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunStatistics {
    pub files_visited: u64,
    pub files_copied: u64,
    #[serde(default)]
    pub zero_size_skipped: u64,
    #[serde(default)]
    pub hidden_skipped: u64,
    #[serde(default)]
    pub duplicates_skipped: u64,
    /// Per-path failures, all of them logged
    #[serde(default)]
    pub errors: u64,
}

/// One step of the depth-first walk.
#[derive(Debug)]
pub enum TraversalEvent {
    EnterDirectory(DirEntry),
    File(DirEntry),
    /// Anything else: sockets, fifos, symlinks that are not followed
    Other(DirEntry),
    Error(walkdir::Error),
}

/// Depth-first walk over a source tree, sorted by file name.
pub struct Traversal {
    inner: walkdir::IntoIter,
}

impl Traversal {
    pub fn new(root: &Path, follow_symlinks: bool) -> Self {
        let inner = WalkDir::new(root)
            .follow_links(follow_symlinks)
            .sort_by_file_name()
            .into_iter();
        Self { inner }
    }

    /// Do not descend into the directory most recently entered.
    pub fn skip_current_dir(&mut self) {
        self.inner.skip_current_dir();
    }
}

impl Iterator for Traversal {
    type Item = TraversalEvent;

    fn next(&mut self) -> Option<TraversalEvent> {
        let event = match self.inner.next()? {
            Ok(entry) if entry.file_type().is_dir() => TraversalEvent::EnterDirectory(entry),
            Ok(entry) if entry.file_type().is_file() => TraversalEvent::File(entry),
            Ok(entry) => TraversalEvent::Other(entry),
            Err(err) => TraversalEvent::Error(err),
        };
        Some(event)
    }
}

enum FileOutcome {
    Copied,
    ZeroSize,
    Hidden,
    Duplicate,
}

/// Walk `options.source` and copy every new file into the date tree under
/// `options.destination`. Per-path failures are logged and counted; the walk
/// always runs to the end.
///
/// `options.source` should be canonical so that files directly under it can
/// fall back to the source directory's own name.
pub fn sync_tree(options: &SyncOptions, decoder: &dyn MetadataDecoder) -> RunStatistics {
    let mut stats = RunStatistics::default();
    let base = options.source.parent().unwrap_or(&options.source);
    let mut walk = Traversal::new(&options.source, options.follow_symlinks);

    while let Some(event) = walk.next() {
        match event {
            // The source root is always walked, even if it is a dot-directory
            TraversalEvent::EnterDirectory(entry) if entry.depth() > 0 => {
                match is_hidden_dir(&entry) {
                    Ok(false) => {}
                    Ok(true) => {
                        log::info!("Skipping hidden directory: {}", entry.path().display());
                        walk.skip_current_dir();
                    }
                    Err(e) => {
                        log::error!("{e}");
                        stats.errors += 1;
                        walk.skip_current_dir();
                    }
                }
            }
            TraversalEvent::EnterDirectory(_) => {}
            TraversalEvent::File(entry) => {
                stats.files_visited += 1;
                match process_file(&entry, base, options, decoder) {
                    Ok(FileOutcome::Copied) => stats.files_copied += 1,
                    Ok(FileOutcome::ZeroSize) => stats.zero_size_skipped += 1,
                    Ok(FileOutcome::Hidden) => stats.hidden_skipped += 1,
                    Ok(FileOutcome::Duplicate) => stats.duplicates_skipped += 1,
                    Err(e) => {
                        log::error!("{e}");
                        stats.errors += 1;
                    }
                }
            }
            TraversalEvent::Other(entry) => {
                log::debug!("Not a regular file, skipping: {}", entry.path().display());
            }
            TraversalEvent::Error(err) => {
                log::error!("{}", traversal_error(err));
                stats.errors += 1;
            }
        }
    }

    stats
}

fn is_hidden_dir(entry: &DirEntry) -> Result<bool, SyncError> {
    let meta = entry.metadata().map_err(|e| SyncError::FilesystemRead {
        path: entry.path().to_path_buf(),
        source: e.into(),
    })?;
    Ok(is_hidden(entry.path(), &meta))
}

fn traversal_error(err: walkdir::Error) -> SyncError {
    let path = err.path().map(Path::to_path_buf).unwrap_or_default();
    match err.loop_ancestor() {
        Some(ancestor) => SyncError::TraversalCycle {
            path,
            ancestor: ancestor.to_path_buf(),
        },
        None => SyncError::Traversal {
            path,
            reason: err.to_string(),
        },
    }
}

fn process_file(
    entry: &DirEntry,
    base: &Path,
    options: &SyncOptions,
    decoder: &dyn MetadataDecoder,
) -> Result<FileOutcome, SyncError> {
    let path = entry.path();
    let read_error = |source: io::Error| SyncError::FilesystemRead {
        path: path.to_path_buf(),
        source,
    };
    let meta = entry.metadata().map_err(|e| read_error(e.into()))?;
    let attrs = FileAttributes::from_metadata(path, &meta).map_err(read_error)?;

    if attrs.size == 0 {
        log::info!("Zero size file: {}", path.display());
        return Ok(FileOutcome::ZeroSize);
    }
    if attrs.hidden {
        log::debug!("Hidden file: {}", path.display());
        return Ok(FileOutcome::Hidden);
    }

    let record = extract(decoder, path, &attrs);
    let relative = path.strip_prefix(base).unwrap_or(path);
    let subpath = resolve_target(&record, relative);
    let target_dir = options.destination.join(subpath.to_path());

    fs::create_dir_all(&target_dir).map_err(|source| SyncError::Copy {
        path: target_dir.clone(),
        source,
    })?;

    let decision = resolve_conflict(decoder, &record, &target_dir, options.max_rename_attempts)?;
    if decision.duplicate {
        log::debug!(
            "Already present: {} -> {}",
            path.display(),
            decision.target.display()
        );
        return Ok(FileOutcome::Duplicate);
    }

    copy_file(path, &decision.target, &meta)?;
    log::debug!("Copied {} -> {}", path.display(), decision.target.display());
    Ok(FileOutcome::Copied)
}

/// Copy `from` to `to` (which must not exist) and carry over its timestamps.
fn copy_file(from: &Path, to: &Path, meta: &Metadata) -> Result<(), SyncError> {
    if let Err(source) = fs::copy(from, to) {
        // Leave nothing half-written behind so a re-run starts clean
        if let Err(e) = fs::remove_file(to) {
            if e.kind() != io::ErrorKind::NotFound {
                log::debug!("Unable to remove partial copy {}: {}", to.display(), e);
            }
        }
        return Err(SyncError::Copy {
            path: from.to_path_buf(),
            source,
        });
    }

    let atime = FileTime::from_last_access_time(meta);
    let mtime = FileTime::from_last_modification_time(meta);
    if let Err(e) = filetime::set_file_times(to, atime, mtime) {
        log::warn!("Unable to preserve timestamps on {}: {}", to.display(), e);
    }
    Ok(())
}
