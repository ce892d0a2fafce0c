//! Controller counters plus a combined snapshot of every PageWatch crate.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

use pagewatch_filter::FilterMetrics;
use pagewatch_observer::ObserverMetrics;

static REFRESHES: AtomicU64 = AtomicU64::new(0);
static TOGGLE_CHANGES: AtomicU64 = AtomicU64::new(0);
static TOGGLE_REMOUNTS: AtomicU64 = AtomicU64::new(0);

#[derive(Debug, Clone, Copy, Serialize)]
pub struct ControllerMetrics {
    pub refreshes: u64,
    pub toggle_changes: u64,
    pub toggle_remounts: u64,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct PageWatchMetrics {
    pub controller: ControllerMetrics,
    pub observer: ObserverMetrics,
    pub filter: FilterMetrics,
}

pub fn record_refresh() {
    REFRESHES.fetch_add(1, Ordering::Relaxed);
}

pub fn record_toggle_change() {
    TOGGLE_CHANGES.fetch_add(1, Ordering::Relaxed);
}

pub fn record_toggle_remount() {
    TOGGLE_REMOUNTS.fetch_add(1, Ordering::Relaxed);
}

pub fn snapshot() -> PageWatchMetrics {
    PageWatchMetrics {
        controller: ControllerMetrics {
            refreshes: REFRESHES.load(Ordering::Relaxed),
            toggle_changes: TOGGLE_CHANGES.load(Ordering::Relaxed),
            toggle_remounts: TOGGLE_REMOUNTS.load(Ordering::Relaxed),
        },
        observer: pagewatch_observer::metrics::snapshot(),
        filter: pagewatch_filter::metrics::snapshot(),
    }
}
