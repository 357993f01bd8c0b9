use std::fs::Metadata;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use chrono::{DateTime, Local, NaiveDateTime};

/// Basic filesystem attributes of a visited file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileAttributes {
    /// File size in bytes
    pub size: u64,
    /// Dot-file, or carries the hidden attribute on Windows
    pub hidden: bool,
    /// Creation time in local time (modification time where birth time is unsupported)
    pub created: NaiveDateTime,
}

impl FileAttributes {
    pub fn from_metadata(path: &Path, meta: &Metadata) -> io::Result<Self> {
        let created = meta.created().or_else(|_| meta.modified())?;
        Ok(Self {
            size: meta.len(),
            hidden: is_hidden(path, meta),
            created: to_local_naive(created),
        })
    }
}

/// Everything the date and conflict logic needs to know about one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRecord {
    pub path: PathBuf,
    pub size: u64,
    pub hidden: bool,
    /// EXIF DateTimeOriginal
    pub capture: Option<NaiveDateTime>,
    /// Embedded last-modified time, only looked up when `capture` is absent
    pub modified: Option<NaiveDateTime>,
    pub created: NaiveDateTime,
}

impl FileRecord {
    /// A record carrying only filesystem information.
    pub fn bare(path: &Path, attrs: &FileAttributes) -> Self {
        Self {
            path: path.to_path_buf(),
            size: attrs.size,
            hidden: attrs.hidden,
            capture: None,
            modified: None,
            created: attrs.created,
        }
    }
}

pub fn is_hidden(path: &Path, meta: &Metadata) -> bool {
    let dot_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .map_or(false, |n| n.starts_with('.') && n != "." && n != "..");
    dot_name || has_hidden_attribute(meta)
}

#[cfg(windows)]
fn has_hidden_attribute(meta: &Metadata) -> bool {
    use std::os::windows::fs::MetadataExt;
    const FILE_ATTRIBUTE_HIDDEN: u32 = 0x2;
    meta.file_attributes() & FILE_ATTRIBUTE_HIDDEN != 0
}

#[cfg(not(windows))]
fn has_hidden_attribute(_meta: &Metadata) -> bool {
    false
}

pub fn to_local_naive(time: SystemTime) -> NaiveDateTime {
    DateTime::<Local>::from(time).naive_local()
}
