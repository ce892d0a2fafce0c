use pagewatch_core_types::{NodeId, PageError};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SelectorError {
    #[error("empty selector")]
    Empty,
    #[error("unsupported selector: {0}")]
    Unsupported(String),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomError {
    #[error("unknown node: {0}")]
    UnknownNode(NodeId),
    #[error("{0} cannot have children")]
    NotAContainer(NodeId),
    #[error("inserting {child} under {parent} would create a cycle")]
    Cycle { parent: NodeId, child: NodeId },
    #[error("{reference} is not a child of {parent}")]
    NotAChild { parent: NodeId, reference: NodeId },
    #[error("the document root cannot be moved or removed")]
    RootImmutable,
    #[error(transparent)]
    Selector(#[from] SelectorError),
}

impl From<DomError> for PageError {
    fn from(value: DomError) -> Self {
        PageError::new(format!("dom error: {value}"))
    }
}

impl From<SelectorError> for PageError {
    fn from(value: SelectorError) -> Self {
        PageError::new(format!("selector error: {value}"))
    }
}
