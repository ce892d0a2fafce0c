//! Error types for the controller, its collaborators and configuration.

use pagewatch_core_types::PageError;
use pagewatch_dom::{DomError, SelectorError};
use pagewatch_filter::FilterError;
use pagewatch_observer::ObserverError;
use pagewatch_timing::TimingError;
use thiserror::Error;

/// Failures of a page-specific collaborator.
#[derive(Debug, Error)]
pub enum CollaboratorError {
    #[error("invalid page url {url:?}: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
    #[error("route is missing the {0:?} parameter")]
    MissingParam(&'static str),
    #[error(transparent)]
    Filter(#[from] FilterError),
}

#[derive(Debug, Error)]
pub enum ControllerError {
    #[error(transparent)]
    Selector(#[from] SelectorError),
    #[error(transparent)]
    Dom(#[from] DomError),
    #[error(transparent)]
    Observer(#[from] ObserverError),
    #[error(transparent)]
    Filter(#[from] FilterError),
    #[error("no element matches toggle host selector {selector}")]
    MissingHost { selector: String },
    #[error("toggle host did not appear: {0}")]
    HostUnavailable(#[from] TimingError),
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("controller has been shut down")]
    ShutDown,
}

impl From<CollaboratorError> for PageError {
    fn from(value: CollaboratorError) -> Self {
        PageError::new(value.to_string())
    }
}

impl From<ControllerError> for PageError {
    fn from(value: ControllerError) -> Self {
        PageError::new(value.to_string())
    }
}
