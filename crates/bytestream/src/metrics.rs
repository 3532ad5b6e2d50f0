use std::fmt::Debug;
use std::sync::atomic::{AtomicU64, Ordering};

/// Receives byte counts published by streams when they're closed.
///
/// Typically owned by whatever operator is driving the reads (e.g. a scan),
/// and shared across all streams that operator opens.
pub trait MetricsSink: Debug + Sync + Send {
    /// Add to the bytes read total. Called once per successfully closed
    /// stream.
    fn add_bytes_read(&self, bytes: u64);
}

/// Atomic counters for a scan.
#[derive(Debug, Default)]
pub struct ScanCounters {
    bytes_read: AtomicU64,
    updates: AtomicU64,
}

impl ScanCounters {
    pub const fn new() -> Self {
        ScanCounters {
            bytes_read: AtomicU64::new(0),
            updates: AtomicU64::new(0),
        }
    }

    /// Total bytes reported by all closed streams.
    pub fn bytes_read(&self) -> u64 {
        self.bytes_read.load(Ordering::Relaxed)
    }

    /// Number of times a stream reported to these counters.
    pub fn updates(&self) -> u64 {
        self.updates.load(Ordering::Relaxed)
    }
}

impl MetricsSink for ScanCounters {
    fn add_bytes_read(&self, bytes: u64) {
        self.bytes_read.fetch_add(bytes, Ordering::Relaxed);
        self.updates.fetch_add(1, Ordering::Relaxed);
    }
}
