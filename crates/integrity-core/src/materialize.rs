//! Creating and durably persisting new integrity files.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use integrity_config::{log_fill_debug, FillConfig};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::instrument;

use crate::content::{digest, generate};
use crate::name::FileName;
use crate::volume::VolumeStats;
use crate::{io_error, Result};

/// Block size that duplicate-mode sizes are rounded up to.
const DEDUP_BLOCK: u64 = 512;

/// How auto-sized files are sized and named.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SizePolicy {
    pub reserve_percent: u8,
    pub min_file_size: u64,
    pub max_file_size: u64,
    pub collision_probes: u32,
    pub duplicate: bool,
}

impl Default for SizePolicy {
    fn default() -> Self {
        Self::from(&FillConfig::default())
    }
}

impl From<&FillConfig> for SizePolicy {
    fn from(fill: &FillConfig) -> Self {
        Self {
            reserve_percent: fill.reserve_percent,
            min_file_size: fill.min_file_size,
            max_file_size: fill.max_file_size,
            collision_probes: fill.collision_probes,
            duplicate: fill.duplicate,
        }
    }
}

/// A file that was written and flushed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Materialized {
    pub path: PathBuf,
    pub size: u64,
}

/// Wall clock seconds, the seed used when none is given.
pub fn clock_seed() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

pub struct Materializer<V: VolumeStats> {
    volume: V,
    policy: SizePolicy,
    rng: StdRng,
    /// Content seed shared by every auto-seeded file in duplicate mode
    shared_seed: i64,
}

impl<V: VolumeStats> Materializer<V> {
    /// Sizes are drawn from entropy.
    pub fn new(volume: V, policy: SizePolicy) -> Self {
        Self {
            volume,
            policy,
            rng: StdRng::from_os_rng(),
            shared_seed: clock_seed(),
        }
    }

    /// Sizes (and the duplicate-mode content seed) follow `seed`.
    pub fn with_seed(volume: V, policy: SizePolicy, seed: u64) -> Self {
        Self {
            volume,
            policy,
            rng: StdRng::seed_from_u64(seed),
            shared_seed: seed as i64,
        }
    }

    pub fn policy(&self) -> &SizePolicy {
        &self.policy
    }

    /// Create one file in `directory`.
    ///
    /// `size: None` auto-sizes from free capacity, `seed: None` uses the
    /// clock (or the shared seed in duplicate mode). Returns `Ok(None)` when
    /// there is no room above the floor or every candidate name is taken.
    #[instrument(skip(self), level = "debug")]
    pub fn materialize(
        &mut self,
        directory: &Path,
        seed: Option<i64>,
        size: Option<u64>,
    ) -> Result<Option<Materialized>> {
        let size = match size {
            Some(size) => size,
            None => match self.auto_size(directory)? {
                Some(size) => size,
                None => return Ok(None),
            },
        };

        let seed = seed.unwrap_or_else(|| {
            if self.policy.duplicate {
                self.shared_seed
            } else {
                clock_seed()
            }
        });

        let data = generate(seed, size);
        let name = FileName::new(digest(&data), seed, size).encode();

        let Some(path) = self.unique_path(directory, &name)? else {
            log_fill_debug!("No free name left", name = name.as_str());
            return Ok(None);
        };

        write_durably(directory, &path, &data)?;
        log_fill_debug!("File created", size = size, seed = seed);

        Ok(Some(Materialized { path, size }))
    }

    /// Random size in `[min, min + max)` clamped to the headroom above the
    /// floor, or `None` once the floor is reached.
    fn auto_size(&mut self, directory: &Path) -> Result<Option<u64>> {
        let usage = self.volume.usage(directory)?;
        let Some(headroom) = usage.headroom(self.policy.reserve_percent) else {
            log_fill_debug!(
                "Capacity floor reached",
                free = usage.free,
                floor = usage.floor(self.policy.reserve_percent),
            );
            return Ok(None);
        };

        let min = self.policy.min_file_size;
        let span = self.policy.max_file_size.max(1);
        let mut size = self.rng.random_range(min..=min.saturating_add(span - 1));
        if self.policy.duplicate {
            size = size.div_ceil(DEDUP_BLOCK).saturating_mul(DEDUP_BLOCK);
        }
        Ok(Some(size.min(headroom)))
    }

    /// First of `name`, `name.0` .. `name.<probes - 1>` that does not exist.
    fn unique_path(&self, directory: &Path, name: &str) -> Result<Option<PathBuf>> {
        let base = directory.join(name);
        if !exists(&base)? {
            return Ok(Some(base));
        }
        for n in 0..self.policy.collision_probes {
            let candidate = directory.join(format!("{name}.{n}"));
            if !exists(&candidate)? {
                return Ok(Some(candidate));
            }
        }
        Ok(None)
    }
}

fn exists(path: &Path) -> Result<bool> {
    path.try_exists().map_err(io_error("stat", path))
}

/// Write `data` to a new file, flush it, then flush the directory entry.
fn write_durably(directory: &Path, path: &Path, data: &[u8]) -> Result<()> {
    let mut file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .map_err(io_error("create", path))?;
    file.write_all(data).map_err(io_error("write", path))?;
    file.sync_all().map_err(io_error("flush", path))?;
    drop(file);

    sync_directory(directory)
}

#[cfg(unix)]
fn sync_directory(directory: &Path) -> Result<()> {
    let dir = File::open(directory).map_err(io_error("open", directory))?;
    dir.sync_all().map_err(io_error("flush", directory))
}

#[cfg(not(unix))]
fn sync_directory(_directory: &Path) -> Result<()> {
    Ok(())
}
