use std::path::{Path, PathBuf};

use chrono::{NaiveDate, NaiveDateTime};

use crate::record::FileRecord;

/// Folder used when neither a trustworthy date nor a parent directory name exists.
pub const UNDATED_DIR: &str = "undated";

/// Dates before this are treated as unreliable. Many filesystems, especially
/// network shares, report bogus creation times.
pub fn sanity_cutoff() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2000, 1, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .unwrap_or(NaiveDateTime::MIN)
}

/// Destination subdirectory for a file, relative to the destination root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetSubpath {
    /// `YYYY/MM-MonthName/DD-WeekdayName`
    Dated(NaiveDate),
    /// Flat folder named after the file's parent directory in the source tree
    Fallback(String),
}

impl TargetSubpath {
    pub fn to_path(&self) -> PathBuf {
        match self {
            Self::Dated(date) => {
                let mut p = PathBuf::from(date.format("%Y").to_string());
                p.push(date.format("%m-%B").to_string());
                p.push(date.format("%d-%A").to_string());
                p
            }
            Self::Fallback(name) => PathBuf::from(name),
        }
    }
}

/// Date used for the destination path: capture time, then embedded
/// modified time, then filesystem creation time.
pub fn candidate_date(record: &FileRecord) -> NaiveDateTime {
    record
        .capture
        .or(record.modified)
        .unwrap_or(record.created)
}

/// Compute the destination subdirectory for `record`.
///
/// `relative` is the file's path relative to the *parent* of the source root,
/// so its first component is the source root's own name and every file has a
/// parent directory name to fall back on.
pub fn resolve_target(record: &FileRecord, relative: &Path) -> TargetSubpath {
    let date = candidate_date(record);
    if date < sanity_cutoff() {
        return TargetSubpath::Fallback(fallback_name(relative));
    }
    TargetSubpath::Dated(date.date())
}

fn fallback_name(relative: &Path) -> String {
    relative
        .parent()
        .and_then(|p| p.file_name())
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| UNDATED_DIR.to_string())
}
