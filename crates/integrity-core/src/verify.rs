//! Checking a file against the provenance recorded in its name.
//!
//! Checks run cheapest first and stop at the first mismatch:
//! tag, name digest, size, then a full content read.

use std::fs;
use std::path::{Path, PathBuf};

use integrity_config::{log_verify_debug, log_verify_error};
use thiserror::Error;
use tracing::instrument;

use crate::content::digest;
use crate::name::EncodedName;
use crate::{io_error, IntegrityError, Result};

/// A clean, specific mismatch. Never fatal on its own.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Corruption {
    #[error("File extension {} does not end in \"integrity*\"!", .path.display())]
    NotIntegrityFile { path: PathBuf },

    #[error(
        "File {} meta data not valid! (stored = {stored}, calculated = {calculated})",
        .path.display()
    )]
    MetadataMismatch {
        path: PathBuf,
        stored: String,
        calculated: String,
    },

    #[error(
        "File {} incorrect size! (expected = {expected}, current = {actual})",
        .path.display()
    )]
    SizeMismatch {
        path: PathBuf,
        expected: u64,
        actual: u64,
    },

    #[error(
        "File {} content digest mismatch! (expected = {expected}, current = {actual})",
        .path.display()
    )]
    ContentMismatch {
        path: PathBuf,
        expected: String,
        actual: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verification {
    Valid,
    Corrupt(Corruption),
}

impl Verification {
    pub fn is_valid(&self) -> bool {
        matches!(self, Verification::Valid)
    }
}

/// Verify `path` against its own name.
///
/// Mismatches come back as [`Verification::Corrupt`]; unreadable files and
/// names whose numeric fields do not parse are fatal errors.
#[instrument(level = "debug")]
pub fn verify_file(path: &Path) -> Result<Verification> {
    let verdict = check(path)?;
    match &verdict {
        Verification::Valid => log_verify_debug!("File validates"),
        Verification::Corrupt(corruption) => {
            log_verify_error!("File corrupt", reason = corruption.to_string().as_str())
        }
    }
    Ok(verdict)
}

fn check(path: &Path) -> Result<Verification> {
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| IntegrityError::MalformedName {
            name: path.display().to_string(),
            reason: "file name is missing or not UTF-8".to_string(),
        })?;

    let corrupt = |c: Corruption| Ok(Verification::Corrupt(c));

    let encoded = match EncodedName::split(file_name) {
        Some(encoded) if encoded.has_integrity_tag() => encoded,
        _ => {
            return corrupt(Corruption::NotIntegrityFile {
                path: path.to_path_buf(),
            })
        }
    };

    let calculated = encoded.calculated_digest();
    if encoded.name_digest != calculated {
        return corrupt(Corruption::MetadataMismatch {
            path: path.to_path_buf(),
            stored: encoded.name_digest.to_string(),
            calculated,
        });
    }

    let fields = encoded.parse_fields()?;
    let actual_size = fs::metadata(path).map_err(io_error("stat", path))?.len();
    if fields.size != actual_size {
        return corrupt(Corruption::SizeMismatch {
            path: path.to_path_buf(),
            expected: fields.size,
            actual: actual_size,
        });
    }

    let data = fs::read(path).map_err(io_error("read", path))?;
    let actual = digest(&data);
    if fields.content_digest != actual {
        return corrupt(Corruption::ContentMismatch {
            path: path.to_path_buf(),
            expected: fields.content_digest,
            actual,
        });
    }

    Ok(Verification::Valid)
}
