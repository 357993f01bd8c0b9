use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SyncError {
    // Per-file, recovered by the walker
    #[error("error parsing file {path}: {reason}")]
    MetadataDecode { path: PathBuf, reason: String },

    #[error("error reading file attributes {path}: {source}")]
    FilesystemRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cycle detected at {path} (loops back to {ancestor})")]
    TraversalCycle { path: PathBuf, ancestor: PathBuf },

    #[error("unable to visit {path}: {reason}")]
    Traversal { path: PathBuf, reason: String },

    #[error("unable to copy {path}: {source}")]
    Copy {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("no free name for {path} after {attempts} attempts")]
    ConflictExhausted { path: PathBuf, attempts: u32 },

    // Fatal
    #[error("invalid arguments: {0}")]
    InvalidArguments(String),
}
