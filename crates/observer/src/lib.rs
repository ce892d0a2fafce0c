//! Element lifecycle and navigation watchers.
//!
//! A [`ChangeObserver`] turns the document's mutation batches into `init`,
//! `added`, `removed` and `modified` callbacks for a selector, and location
//! changes into `(new, previous)` navigation callbacks.

pub mod element;
pub mod errors;
pub mod handle;
pub mod metrics;
pub mod navigation;
pub mod observer;
pub mod registry;

pub use element::{ElementCallback, ElementWatcher, WatchSpec};
pub use errors::ObserverError;
pub use handle::WatchHandle;
pub use metrics::ObserverMetrics;
pub use navigation::{NavigationCallback, NavigationWatcher};
pub use observer::ChangeObserver;
pub use registry::NodeRegistry;

pub use pagewatch_core_types::{EventKind, EventSet, NodeId};
