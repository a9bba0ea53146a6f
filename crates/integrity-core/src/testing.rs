//! Test doubles for capacity queries.

use std::path::Path;

use crate::volume::{VolumeStats, VolumeUsage};
use crate::Result;

/// A volume that always reports the same numbers.
#[derive(Debug, Clone, Copy)]
pub struct FixedVolume {
    usage: VolumeUsage,
}

impl FixedVolume {
    pub fn new(total: u64, free: u64) -> Self {
        Self {
            usage: VolumeUsage { total, free },
        }
    }
}

impl VolumeStats for FixedVolume {
    fn usage(&self, _path: &Path) -> Result<VolumeUsage> {
        Ok(self.usage)
    }

    fn name(&self) -> &'static str {
        "fixed"
    }
}
