//! Live document model for PageWatch.
//!
//! The document is an arena of nodes shared between an external mutator and
//! the watchers. Every structural or attribute change is applied immediately
//! and queued as a [`MutationRecord`]; [`Document::flush`] hands the queued
//! records to subscribers as one [`MutationBatch`].

pub mod document;
pub mod errors;
pub mod mutation;
pub mod node;
pub mod selector;

pub use document::{Document, DomTree, CHECKED_ATTR, HIDDEN_ATTR};
pub use errors::{DomError, SelectorError};
pub use mutation::{MutationBatch, MutationRecord};
pub use node::{Element, Node, NodeKind};
pub use selector::Selector;

pub use pagewatch_core_types::{NodeId, Visibility};
