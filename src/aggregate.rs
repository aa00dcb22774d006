//! Byte-weighted progress aggregation for one batch.
//!
//! Transports report cumulative bytes per file; the overall percentage is
//! weighted by size so a single large file dominates a handful of tiny ones.

use std::sync::atomic::{AtomicU64, Ordering};

use tracing::debug;

#[derive(Debug)]
pub struct BatchProgress {
    sizes: Vec<u64>,
    uploaded: Vec<AtomicU64>,
    total_bytes: u64,
}

impl BatchProgress {
    pub fn new(sizes: Vec<u64>) -> Self {
        let total_bytes = sizes.iter().sum();
        let uploaded = sizes.iter().map(|_| AtomicU64::new(0)).collect();
        Self {
            sizes,
            uploaded,
            total_bytes,
        }
    }

    pub fn total_bytes(&self) -> u64 {
        self.total_bytes
    }

    pub fn uploaded_bytes(&self) -> u64 {
        self.uploaded
            .iter()
            .map(|bytes| bytes.load(Ordering::Relaxed))
            .sum()
    }

    /// Record cumulative bytes for one entry and return the overall percent.
    ///
    /// Values are clamped to the entry size and never move backwards.
    pub fn report(&self, index: usize, bytes: u64) -> u8 {
        match (self.uploaded.get(index), self.sizes.get(index)) {
            (Some(uploaded), Some(size)) => {
                uploaded.fetch_max(bytes.min(*size), Ordering::Relaxed);
            }
            _ => debug!(index, "progress for unknown entry"),
        }
        self.percent()
    }

    /// Mark an entry as fully uploaded.
    pub fn complete(&self, index: usize) -> u8 {
        let size = self.sizes.get(index).copied().unwrap_or_default();
        self.report(index, size)
    }

    pub fn percent(&self) -> u8 {
        if self.total_bytes == 0 {
            return 100;
        }
        let percent = 100 * u128::from(self.uploaded_bytes()) / u128::from(self.total_bytes);
        percent.min(100) as u8
    }
}
