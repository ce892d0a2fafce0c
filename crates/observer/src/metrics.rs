//! Process-wide counters for the watchers.
//!
//! Plain atomics so the CLI can print a summary without a metrics backend.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::Serialize;

use pagewatch_core_types::EventKind;

static BATCHES_TOTAL: AtomicU64 = AtomicU64::new(0);
static BATCH_LAT_NS: AtomicU64 = AtomicU64::new(0);
static LAGGED_BATCHES: AtomicU64 = AtomicU64::new(0);

static INIT_EVENTS: AtomicU64 = AtomicU64::new(0);
static ADDED_EVENTS: AtomicU64 = AtomicU64::new(0);
static REMOVED_EVENTS: AtomicU64 = AtomicU64::new(0);
static MODIFIED_EVENTS: AtomicU64 = AtomicU64::new(0);
static CALLBACK_PANICS: AtomicU64 = AtomicU64::new(0);

static NAVIGATION_CHANGES: AtomicU64 = AtomicU64::new(0);

#[derive(Debug, Clone, Copy, Serialize)]
pub struct EventCounters {
    pub init: u64,
    pub added: u64,
    pub removed: u64,
    pub modified: u64,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct ObserverMetrics {
    pub batches: u64,
    pub avg_batch_ms: f64,
    pub lagged_batches: u64,
    pub events: EventCounters,
    pub callback_panics: u64,
    pub navigation_changes: u64,
}

pub fn record_batch(duration: Duration) {
    BATCHES_TOTAL.fetch_add(1, Ordering::Relaxed);
    BATCH_LAT_NS.fetch_add(duration.as_nanos() as u64, Ordering::Relaxed);
}

pub fn record_lagged(skipped: u64) {
    LAGGED_BATCHES.fetch_add(skipped, Ordering::Relaxed);
}

pub fn record_event(kind: EventKind) {
    let counter = match kind {
        EventKind::Init => &INIT_EVENTS,
        EventKind::Added => &ADDED_EVENTS,
        EventKind::Removed => &REMOVED_EVENTS,
        EventKind::Modified => &MODIFIED_EVENTS,
    };
    counter.fetch_add(1, Ordering::Relaxed);
}

pub fn record_callback_panic() {
    CALLBACK_PANICS.fetch_add(1, Ordering::Relaxed);
}

pub fn record_navigation() {
    NAVIGATION_CHANGES.fetch_add(1, Ordering::Relaxed);
}

pub fn snapshot() -> ObserverMetrics {
    let batches = BATCHES_TOTAL.load(Ordering::Relaxed);
    let avg_batch_ms = if batches == 0 {
        0.0
    } else {
        BATCH_LAT_NS.load(Ordering::Relaxed) as f64 / batches as f64 / 1_000_000.0
    };
    ObserverMetrics {
        batches,
        avg_batch_ms,
        lagged_batches: LAGGED_BATCHES.load(Ordering::Relaxed),
        events: EventCounters {
            init: INIT_EVENTS.load(Ordering::Relaxed),
            added: ADDED_EVENTS.load(Ordering::Relaxed),
            removed: REMOVED_EVENTS.load(Ordering::Relaxed),
            modified: MODIFIED_EVENTS.load(Ordering::Relaxed),
        },
        callback_panics: CALLBACK_PANICS.load(Ordering::Relaxed),
        navigation_changes: NAVIGATION_CHANGES.load(Ordering::Relaxed),
    }
}
