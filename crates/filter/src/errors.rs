use pagewatch_core_types::{NodeId, PageError};
use pagewatch_dom::SelectorError;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum FilterError {
    #[error("cannot parse {field} from {input:?}")]
    Parse { field: &'static str, input: String },
    #[error("{item} has no element matching {selector}")]
    MissingElement { item: NodeId, selector: String },
    #[error("invalid filter selector: {0}")]
    Selector(#[from] SelectorError),
}

impl FilterError {
    pub(crate) fn parse(field: &'static str, input: impl Into<String>) -> Self {
        FilterError::Parse {
            field,
            input: input.into(),
        }
    }
}

impl From<FilterError> for PageError {
    fn from(value: FilterError) -> Self {
        PageError::new(value.to_string())
    }
}
