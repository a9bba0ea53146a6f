//! Files believed to exist on disk, in creation order.

use std::path::PathBuf;

use crate::Result;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRecord {
    pub path: PathBuf,
    pub size: u64,
}

/// Counters for one reclaim pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReclaimStats {
    pub files: u64,
    pub bytes: u64,
}

/// Indices a reclaim pass removes from a set of `len` records, in removal
/// order: `len - 1`, `len - 3`, ... down to but never including index 0.
pub fn reclaim_indices(len: usize) -> impl Iterator<Item = usize> {
    (1..len).rev().step_by(2)
}

#[derive(Debug, Default)]
pub struct WorkingSet {
    records: Vec<FileRecord>,
}

impl WorkingSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, record: FileRecord) {
        self.records.push(record);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[FileRecord] {
        &self.records
    }

    pub fn total_bytes(&self) -> u64 {
        self.records.iter().map(|r| r.size).sum()
    }

    /// Delete every other record, walking back from the end.
    ///
    /// `remove` deletes the file; a record leaves the set only after its
    /// removal succeeded, and the first failure aborts the pass.
    pub fn reclaim<F>(&mut self, mut remove: F) -> Result<ReclaimStats>
    where
        F: FnMut(&FileRecord) -> Result<()>,
    {
        let mut stats = ReclaimStats::default();
        for index in reclaim_indices(self.records.len()) {
            remove(&self.records[index])?;
            let record = self.records.remove(index);
            stats.files += 1;
            stats.bytes += record.size;
        }
        Ok(stats)
    }
}
