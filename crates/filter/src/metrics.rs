//! Counters for filter passes, read by the CLI report.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::Serialize;

static PASSES_TOTAL: AtomicU64 = AtomicU64::new(0);
static PASS_LAT_NS: AtomicU64 = AtomicU64::new(0);
static ITEMS_PRICED: AtomicU64 = AtomicU64::new(0);
static ITEMS_SKIPPED_PARSE: AtomicU64 = AtomicU64::new(0);
static ITEMS_SKIPPED_MISSING: AtomicU64 = AtomicU64::new(0);
static VISIBILITY_WRITES: AtomicU64 = AtomicU64::new(0);

#[derive(Debug, Clone, Copy, Serialize)]
pub struct FilterMetrics {
    pub passes: u64,
    pub avg_pass_ms: f64,
    pub items_priced: u64,
    pub skipped_parse: u64,
    pub skipped_missing: u64,
    pub visibility_writes: u64,
}

pub fn record_pass(duration: Duration, priced: usize, parse_failures: usize, missing: usize) {
    PASSES_TOTAL.fetch_add(1, Ordering::Relaxed);
    PASS_LAT_NS.fetch_add(duration.as_nanos() as u64, Ordering::Relaxed);
    ITEMS_PRICED.fetch_add(priced as u64, Ordering::Relaxed);
    ITEMS_SKIPPED_PARSE.fetch_add(parse_failures as u64, Ordering::Relaxed);
    ITEMS_SKIPPED_MISSING.fetch_add(missing as u64, Ordering::Relaxed);
}

pub fn record_writes(changed: usize) {
    VISIBILITY_WRITES.fetch_add(changed as u64, Ordering::Relaxed);
}

pub fn snapshot() -> FilterMetrics {
    let passes = PASSES_TOTAL.load(Ordering::Relaxed);
    let avg_pass_ms = if passes == 0 {
        0.0
    } else {
        PASS_LAT_NS.load(Ordering::Relaxed) as f64 / passes as f64 / 1_000_000.0
    };
    FilterMetrics {
        passes,
        avg_pass_ms,
        items_priced: ITEMS_PRICED.load(Ordering::Relaxed),
        skipped_parse: ITEMS_SKIPPED_PARSE.load(Ordering::Relaxed),
        skipped_missing: ITEMS_SKIPPED_MISSING.load(Ordering::Relaxed),
        visibility_writes: VISIBILITY_WRITES.load(Ordering::Relaxed),
    }
}
