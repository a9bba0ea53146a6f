//! The fill, verify and reclaim loop.
//!
//! ```text
//! Filling ──no room──▶ Draining ──all valid, half deleted──▶ Filling
//!    │                    │
//!    │ cancelled          └─first corrupt file──▶ Corrupt (fatal)
//!    ▼
//! Stopped
//! ```
//!
//! Cancellation is only observed at the top of each Filling iteration. A
//! drain that deletes nothing stops the run instead of counting a cycle.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use integrity_config::{log_fill_info, log_reclaim_info, log_reclaim_warn, log_verify_info};
use tracing::instrument;

use crate::materialize::Materializer;
use crate::verify::{verify_file, Corruption, Verification};
use crate::volume::VolumeStats;
use crate::working_set::{FileRecord, ReclaimStats, WorkingSet};
use crate::{io_error, is_directory, IntegrityError, Result};

/// One-shot stop request shared between the signal adapter and the loop.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request a stop. Idempotent.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub files_created: u64,
    pub bytes_created: u64,
    /// Completed drain cycles
    pub cycles: u64,
    pub files_reclaimed: u64,
    pub bytes_reclaimed: u64,
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "We created {} files with a total of {} bytes!",
            self.files_created, self.bytes_created
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    Cancelled,
    /// `max_cycles` drain cycles completed
    CycleLimit,
    /// Capacity floor reached with `quit_on_full` set
    Full,
    /// Capacity floor reached but a drain pass had nothing to delete
    Stalled,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    Stopped {
        reason: StopReason,
        summary: RunSummary,
    },
    Corrupt {
        path: PathBuf,
        corruption: Corruption,
        summary: RunSummary,
    },
}

impl RunOutcome {
    pub fn summary(&self) -> &RunSummary {
        match self {
            RunOutcome::Stopped { summary, .. } | RunOutcome::Corrupt { summary, .. } => summary,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoopOptions {
    pub max_cycles: Option<u64>,
    pub quit_on_full: bool,
}

pub struct FillLoop<V: VolumeStats> {
    directory: PathBuf,
    materializer: Materializer<V>,
    options: LoopOptions,
    working_set: WorkingSet,
    summary: RunSummary,
}

impl<V: VolumeStats> FillLoop<V> {
    pub fn new(directory: &Path, materializer: Materializer<V>, options: LoopOptions) -> Result<Self> {
        if !is_directory(directory) {
            return Err(IntegrityError::NotADirectory(directory.to_path_buf()));
        }
        Ok(Self {
            directory: directory.to_path_buf(),
            materializer,
            options,
            working_set: WorkingSet::new(),
            summary: RunSummary::default(),
        })
    }

    pub fn working_set(&self) -> &WorkingSet {
        &self.working_set
    }

    /// Run until cancelled, a stop condition in [`LoopOptions`] is met, a
    /// drain pass frees nothing, or a file fails verification. I/O failures are returned as errors.
    #[instrument(skip(self, token), fields(directory = %self.directory.display()))]
    pub fn run(&mut self, token: &CancellationToken) -> Result<RunOutcome> {
        loop {
            if let Some(reason) = self.stop_reason(token) {
                log_fill_info!(
                    "Run stopped",
                    files = self.summary.files_created,
                    bytes = self.summary.bytes_created,
                    cycles = self.summary.cycles,
                );
                return Ok(self.stopped(reason));
            }

            match self.materializer.materialize(&self.directory, None, None)? {
                Some(created) => {
                    self.summary.files_created += 1;
                    self.summary.bytes_created += created.size;
                    self.working_set.push(FileRecord {
                        path: created.path,
                        size: created.size,
                    });
                }
                None => {
                    if self.options.quit_on_full {
                        log_fill_info!("Full, quitting on request");
                        return Ok(self.stopped(StopReason::Full));
                    }
                    log_fill_info!(
                        "Full, verify and delete sequence starting...",
                        files = self.working_set.len(),
                        bytes = self.working_set.total_bytes(),
                    );
                    if let Some((path, corruption)) = self.verify_all()? {
                        return Ok(RunOutcome::Corrupt {
                            path,
                            corruption,
                            summary: self.summary,
                        });
                    }
                    if self.reclaim()?.files == 0 {
                        log_reclaim_warn!(
                            "Nothing to reclaim, capacity floor cannot be relieved",
                            remaining = self.working_set.len(),
                        );
                        return Ok(self.stopped(StopReason::Stalled));
                    }
                    self.summary.cycles += 1;
                }
            }
        }
    }

    fn stop_reason(&self, token: &CancellationToken) -> Option<StopReason> {
        if token.is_cancelled() {
            return Some(StopReason::Cancelled);
        }
        match self.options.max_cycles {
            Some(max) if self.summary.cycles >= max => Some(StopReason::CycleLimit),
            _ => None,
        }
    }

    fn stopped(&self, reason: StopReason) -> RunOutcome {
        RunOutcome::Stopped {
            reason,
            summary: self.summary,
        }
    }

    /// Verify the whole working set in creation order, stopping at the
    /// first corrupt file.
    fn verify_all(&self) -> Result<Option<(PathBuf, Corruption)>> {
        for record in self.working_set.records() {
            if let Verification::Corrupt(corruption) = verify_file(&record.path)? {
                return Ok(Some((record.path.clone(), corruption)));
            }
        }
        log_verify_info!("Working set verified", files = self.working_set.len());
        Ok(None)
    }

    fn reclaim(&mut self) -> Result<ReclaimStats> {
        let stats = self.working_set.reclaim(|record| {
            fs::remove_file(&record.path).map_err(io_error("remove", &record.path))
        })?;

        if stats.files > 0 {
            log_reclaim_info!(
                "Reclaimed files",
                files = stats.files,
                bytes = stats.bytes,
                remaining = self.working_set.len(),
            );
        }
        self.summary.files_reclaimed += stats.files;
        self.summary.bytes_reclaimed += stats.bytes;
        Ok(stats)
    }
}
