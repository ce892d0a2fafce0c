use pagewatch_core_types::PageError;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TimingError {
    #[error("condition not met within {waited_ms}ms")]
    Timeout { waited_ms: u64 },
}

impl From<TimingError> for PageError {
    fn from(value: TimingError) -> Self {
        PageError::new(value.to_string())
    }
}
