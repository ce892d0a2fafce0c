use pagewatch_core_types::PageError;
use pagewatch_dom::SelectorError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ObserverError {
    #[error("invalid watch selector: {0}")]
    Selector(#[from] SelectorError),
    #[error("watch for {0} subscribes to no events")]
    NoEvents(String),
}

impl From<ObserverError> for PageError {
    fn from(value: ObserverError) -> Self {
        PageError::new(value.to_string())
    }
}
