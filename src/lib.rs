//! PageWatch: reactive budget filtering over a live, externally mutated
//! document.
//!
//! The workspace crates supply the document model, timing primitives,
//! change observers and the filter engine; this crate wires them into an
//! [`OrchestrationController`] and exposes the registration entry points.

pub mod bootstrap;
pub mod collaborators;
pub mod config;
pub mod controller;
pub mod errors;
pub mod metrics;
pub mod scenario;
pub mod toggle;

pub use bootstrap::{bootstrap, debug_handle, register, DebugHandle, Utils};
pub use collaborators::{
    BudgetLookup, CartBudgetLookup, CartEntry, CartSource, Collaborators, CurrencyFormatter,
    PageRoute, PageRouter, QueryParamRouter, StaticCart, UsdFormatter,
};
pub use config::{load_config, LoadedConfig, PageWatchConfig, SelectorConfig};
pub use controller::{FilterState, OrchestrationController, RefreshReason};
pub use errors::{CollaboratorError, ControllerError};
pub use toggle::ToggleControl;

pub use pagewatch_dom::Document;
