//! Atomic counters for bridge observability.
//!
//! All counters use relaxed ordering. They are diagnostic, not synchronization.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

pub struct BridgeMetrics {
    pub allocations: AtomicU64,
    pub allocation_failures: AtomicU64,
    pub releases: AtomicU64,
    pub null_releases: AtomicU64,
    pub double_frees: AtomicU64,
    pub foreign_frees: AtomicU64,
    pub canary_failures: AtomicU64,
    pub assert_passes: AtomicU64,
    pub string_lengths: AtomicU64,
    pub copies: AtomicU64,
    pub fills: AtomicU64,
    pub null_arguments: AtomicU64,
}

impl BridgeMetrics {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            allocations: AtomicU64::new(0),
            allocation_failures: AtomicU64::new(0),
            releases: AtomicU64::new(0),
            null_releases: AtomicU64::new(0),
            double_frees: AtomicU64::new(0),
            foreign_frees: AtomicU64::new(0),
            canary_failures: AtomicU64::new(0),
            assert_passes: AtomicU64::new(0),
            string_lengths: AtomicU64::new(0),
            copies: AtomicU64::new(0),
            fills: AtomicU64::new(0),
            null_arguments: AtomicU64::new(0),
        }
    }

    pub fn inc(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get(counter: &AtomicU64) -> u64 {
        counter.load(Ordering::Relaxed)
    }

    /// Snapshot the counters. Occupancy and heal totals are filled in by the caller.
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            allocations: Self::get(&self.allocations),
            allocation_failures: Self::get(&self.allocation_failures),
            releases: Self::get(&self.releases),
            null_releases: Self::get(&self.null_releases),
            double_frees: Self::get(&self.double_frees),
            foreign_frees: Self::get(&self.foreign_frees),
            canary_failures: Self::get(&self.canary_failures),
            assert_passes: Self::get(&self.assert_passes),
            string_lengths: Self::get(&self.string_lengths),
            copies: Self::get(&self.copies),
            fills: Self::get(&self.fills),
            null_arguments: Self::get(&self.null_arguments),
            heals: 0,
            live_allocations: 0,
            live_bytes: 0,
        }
    }
}

impl Default for BridgeMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time copy of all bridge counters.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub allocations: u64,
    pub allocation_failures: u64,
    pub releases: u64,
    pub null_releases: u64,
    pub double_frees: u64,
    pub foreign_frees: u64,
    pub canary_failures: u64,
    pub assert_passes: u64,
    pub string_lengths: u64,
    pub copies: u64,
    pub fills: u64,
    pub null_arguments: u64,
    pub heals: u64,
    pub live_allocations: u64,
    pub live_bytes: u64,
}

static GLOBAL_METRICS: BridgeMetrics = BridgeMetrics::new();

#[must_use]
pub fn global_metrics() -> &'static BridgeMetrics {
    &GLOBAL_METRICS
}
