//! Self-describing file names.
//!
//! The name is the only record of a file's provenance, so both directions of
//! the codec live here and nowhere else.

use crate::content::digest;
use crate::{IntegrityError, Result};

/// Literal that every integrity file's third `:` field starts with.
pub const INTEGRITY_TAG: &str = "integrity";

/// The logical identity of a generated file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileName {
    pub content_digest: String,
    pub seed: i64,
    pub size: u64,
}

impl FileName {
    pub fn new(content_digest: impl Into<String>, seed: i64, size: u64) -> Self {
        Self {
            content_digest: content_digest.into(),
            seed,
            size,
        }
    }

    /// `<content_digest>-<seed>-<size>`
    pub fn triple(&self) -> String {
        format!("{}-{}-{}", self.content_digest, self.seed, self.size)
    }

    /// Digest protecting the triple.
    pub fn name_digest(&self) -> String {
        digest(self.triple().as_bytes())
    }

    /// `<triple>:<name_digest>:integrity`
    pub fn encode(&self) -> String {
        let triple = self.triple();
        let name_digest = digest(triple.as_bytes());
        format!("{}:{}:{}", triple, name_digest, INTEGRITY_TAG)
    }
}

/// A file name split into its three `:` fields, not yet trusted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodedName<'a> {
    pub triple: &'a str,
    pub name_digest: &'a str,
    pub extension: &'a str,
}

impl<'a> EncodedName<'a> {
    /// Split on `:`. Anything other than exactly three fields is `None`.
    pub fn split(file_name: &'a str) -> Option<Self> {
        let mut parts = file_name.split(':');
        let triple = parts.next()?;
        let name_digest = parts.next()?;
        let extension = parts.next()?;
        if parts.next().is_some() {
            return None;
        }
        Some(Self {
            triple,
            name_digest,
            extension,
        })
    }

    /// Third field starts with `integrity`; a `.<n>` collision suffix is allowed.
    pub fn has_integrity_tag(&self) -> bool {
        self.extension.starts_with(INTEGRITY_TAG)
    }

    /// Digest recomputed over the stored triple text.
    pub fn calculated_digest(&self) -> String {
        digest(self.triple.as_bytes())
    }

    /// Parse the triple into its typed fields.
    ///
    /// The seed may be negative, so the digest ends at the first `-` and the
    /// size starts after the last one.
    pub fn parse_fields(&self) -> Result<FileName> {
        let malformed = |reason: &str| IntegrityError::MalformedName {
            name: self.triple.to_string(),
            reason: reason.to_string(),
        };

        let (content_digest, rest) = self
            .triple
            .split_once('-')
            .ok_or_else(|| malformed("missing seed and size fields"))?;
        let (seed, size) = rest
            .rsplit_once('-')
            .ok_or_else(|| malformed("missing size field"))?;

        let seed = seed
            .parse::<i64>()
            .map_err(|e| malformed(&format!("seed {seed:?}: {e}")))?;
        let size = size
            .parse::<u64>()
            .map_err(|e| malformed(&format!("size {size:?}: {e}")))?;

        Ok(FileName::new(content_digest, seed, size))
    }
}
