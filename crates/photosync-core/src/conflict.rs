use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::error::SyncError;
use crate::extract::{extract, MetadataDecoder};
use crate::record::{FileAttributes, FileRecord};

/// Default bound on `_<N>` renames tried per file.
pub const DEFAULT_MAX_RENAME_ATTEMPTS: u32 = 1000;

/// Where a source file should go, and whether it is already there.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConflictDecision {
    pub target: PathBuf,
    /// An identical file already exists at `target`; nothing to copy
    pub duplicate: bool,
}

/// Pick a destination name for `source` inside `target_dir`.
///
/// Tries `name.ext`, `name_1.ext`, `name_2.ext`... until a free name or an
/// existing file with the same content is found, giving up after
/// `max_attempts` renames.
pub fn resolve_conflict(
    decoder: &dyn MetadataDecoder,
    source: &FileRecord,
    target_dir: &Path,
    max_attempts: u32,
) -> Result<ConflictDecision, SyncError> {
    let file_name = source
        .path
        .file_name()
        .map(Path::new)
        .ok_or_else(|| SyncError::Traversal {
            path: source.path.clone(),
            reason: "path has no file name".to_string(),
        })?;

    let mut candidate = target_dir.join(file_name);
    let mut attempt = 0u32;
    loop {
        let meta = match fs::symlink_metadata(&candidate) {
            Ok(meta) => meta,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Ok(ConflictDecision {
                    target: candidate,
                    duplicate: false,
                });
            }
            Err(source) => {
                return Err(SyncError::FilesystemRead {
                    path: candidate,
                    source,
                })
            }
        };

        if meta.is_file() {
            let attrs = FileAttributes::from_metadata(&candidate, &meta).map_err(|source| {
                SyncError::FilesystemRead {
                    path: candidate.clone(),
                    source,
                }
            })?;
            let existing = extract(decoder, &candidate, &attrs);
            if is_same_content(&existing, source) {
                return Ok(ConflictDecision {
                    target: candidate,
                    duplicate: true,
                });
            }
        }

        attempt += 1;
        if attempt > max_attempts {
            return Err(SyncError::ConflictExhausted {
                path: source.path.clone(),
                attempts: max_attempts,
            });
        }
        candidate = target_dir.join(suffixed_name(file_name, attempt));
    }
}

/// Same size and, when the existing file has one, same capture time.
///
/// Without a capture time on the existing file only the size is compared, so
/// distinct files of equal size are reported as the same.
pub fn is_same_content(existing: &FileRecord, source: &FileRecord) -> bool {
    if existing.size != source.size {
        return false;
    }
    match existing.capture {
        Some(capture) => source.capture == Some(capture),
        None => true,
    }
}

/// `IMG_0001.jpg` -> `IMG_0001_<n>.jpg`, `README` -> `README_<n>`.
pub fn suffixed_name(name: &Path, n: u32) -> OsString {
    let mut out = name
        .file_stem()
        .unwrap_or(name.as_os_str())
        .to_os_string();
    out.push(format!("_{n}"));
    if let Some(ext) = name.extension() {
        out.push(".");
        out.push(ext);
    }
    out
}
