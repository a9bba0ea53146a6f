//! # integrity-core
//!
//! Self-verifying file generation and verification for storage stress runs.
//!
//! Every file carries its own provenance in its name, there is no side index:
//!
//! ```text
//! <content_digest>-<seed>-<size>:<name_digest>:integrity[.<n>]
//! ```
//!
//! - `content_digest` is the BLAKE3 hex digest of the file bytes
//! - `seed` and `size` regenerate the bytes deterministically
//! - `name_digest` protects the triple itself
//! - `.<n>` only disambiguates collisions and is covered by no digest
//!
//! The [`FillLoop`] fills a volume until the capacity floor is hit, verifies
//! every file it created, deletes every other one and starts over.

mod content;
mod cycle;
mod materialize;
mod name;
pub mod testing;
mod verify;
mod volume;
mod working_set;

pub use content::{digest, generate, ALPHABET};
pub use cycle::{CancellationToken, FillLoop, LoopOptions, RunOutcome, RunSummary, StopReason};
pub use materialize::{clock_seed, Materialized, Materializer, SizePolicy};
pub use name::{EncodedName, FileName, INTEGRITY_TAG};
pub use verify::{verify_file, Corruption, Verification};
pub use volume::{CappedVolume, Statvfs, VolumeStats, VolumeUsage};
pub use working_set::{reclaim_indices, FileRecord, ReclaimStats, WorkingSet};

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Fatal errors. A storage stress run never retries past one of these.
#[derive(Error, Debug)]
pub enum IntegrityError {
    #[error("I/O error: unable to {op} {}", .path.display())]
    Io {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Malformed integrity file name {name:?}: {reason}")]
    MalformedName { name: String, reason: String },

    #[error("{} is not a directory!", .0.display())]
    NotADirectory(PathBuf),
}

pub type Result<T> = std::result::Result<T, IntegrityError>;

/// Wrap an `io::Error` with the operation and path it failed on.
pub(crate) fn io_error(op: &'static str, path: &Path) -> impl FnOnce(io::Error) -> IntegrityError {
    let path = path.to_path_buf();
    move |source| IntegrityError::Io { op, path, source }
}

/// True when `path` exists and is a directory.
pub fn is_directory(path: &Path) -> bool {
    std::fs::metadata(path).map(|m| m.is_dir()).unwrap_or(false)
}
