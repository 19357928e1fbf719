//! `SearchIndex` error surface.

use gazette_types::PipelineError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SearchError {
    #[error("index or document not found: {0}")]
    NotFound(String),

    #[error("transient search engine failure: {0}")]
    Transient(String),

    #[error("fatal search engine error: {0}")]
    Fatal(String),
}

impl From<SearchError> for PipelineError {
    fn from(err: SearchError) -> Self {
        match err {
            SearchError::NotFound(msg) => PipelineError::NotFound(msg),
            SearchError::Transient(msg) => PipelineError::Transient(msg),
            SearchError::Fatal(msg) => PipelineError::InvalidInput(msg),
        }
    }
}
