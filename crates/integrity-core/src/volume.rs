//! Capacity queries for the volume under test.
//!
//! Upper-layer code uses [`VolumeStats`] without knowing where the numbers
//! come from: `statvfs` for a real volume, or a capped directory.

use std::path::Path;

use walkdir::WalkDir;

use crate::{io_error, IntegrityError, Result};

/// Total and free bytes of a volume.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VolumeUsage {
    pub total: u64,
    pub free: u64,
}

impl VolumeUsage {
    /// Bytes that must stay free: `reserve_percent`% of total.
    pub fn floor(&self, reserve_percent: u8) -> u64 {
        (self.total as u128 * reserve_percent.min(100) as u128 / 100) as u64
    }

    /// Bytes available above the floor, `None` once free is at or below it.
    pub fn headroom(&self, reserve_percent: u8) -> Option<u64> {
        let floor = self.floor(reserve_percent);
        if self.free <= floor {
            None
        } else {
            Some(self.free - floor)
        }
    }
}

pub trait VolumeStats: Send + Sync {
    /// Usage of the volume that holds `path`.
    fn usage(&self, path: &Path) -> Result<VolumeUsage>;

    /// Name for logging/debugging
    fn name(&self) -> &'static str;
}

/// `statvfs(2)` backed capacity: blocks and free blocks available to
/// unprivileged writers, both times the fragment size.
#[derive(Debug, Clone, Copy, Default)]
pub struct Statvfs;

impl VolumeStats for Statvfs {
    fn usage(&self, path: &Path) -> Result<VolumeUsage> {
        let stat = nix::sys::statvfs::statvfs(path)
            .map_err(|errno| io_error("statvfs", path)(std::io::Error::from(errno)))?;
        let fragment = stat.fragment_size() as u64;
        Ok(VolumeUsage {
            total: stat.blocks() as u64 * fragment,
            free: stat.blocks_available() as u64 * fragment,
        })
    }

    fn name(&self) -> &'static str {
        "statvfs"
    }
}

/// A volume of `capacity` bytes whose free space is whatever the files under
/// the queried directory leave over.
#[derive(Debug, Clone, Copy)]
pub struct CappedVolume {
    capacity: u64,
}

impl CappedVolume {
    pub fn new(capacity: u64) -> Self {
        Self { capacity }
    }

    /// Bytes currently stored under `path`.
    pub fn used(path: &Path) -> Result<u64> {
        let mut used = 0u64;
        for entry in WalkDir::new(path) {
            let entry = entry.map_err(|e| {
                let path = e.path().unwrap_or(path).to_path_buf();
                IntegrityError::Io {
                    op: "walk",
                    path,
                    source: e.into(),
                }
            })?;
            if entry.file_type().is_file() {
                let meta = entry.metadata().map_err(|e| IntegrityError::Io {
                    op: "stat",
                    path: entry.path().to_path_buf(),
                    source: e.into(),
                })?;
                used += meta.len();
            }
        }
        Ok(used)
    }
}

impl VolumeStats for CappedVolume {
    fn usage(&self, path: &Path) -> Result<VolumeUsage> {
        let used = Self::used(path)?;
        Ok(VolumeUsage {
            total: self.capacity,
            free: self.capacity.saturating_sub(used),
        })
    }

    fn name(&self) -> &'static str {
        "capped"
    }
}
