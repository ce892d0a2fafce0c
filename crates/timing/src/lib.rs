//! Timing primitives: trailing and leading debounce wrappers, and a polling
//! wait that resolves once a predicate produces a value.

pub mod debounce;
pub mod errors;
pub mod wait;

pub use debounce::{debounce, debounce_leading, LeadingDebouncer, TrailingDebouncer};
pub use errors::TimingError;
pub use wait::{wait_for, wait_for_element, wait_for_with, WaitOptions, DEFAULT_POLL_INTERVAL};
