//! `BinaryStore` error surface: `NotFound`, `Transient`, or `Fatal`.

use gazette_types::PipelineError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("object not found: {0}")]
    NotFound(String),

    #[error("transient storage failure: {0}")]
    Transient(String),

    #[error("fatal storage error: {0}")]
    Fatal(String),
}

impl StorageError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, StorageError::Transient(_))
    }
}

impl From<StorageError> for PipelineError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(msg) => PipelineError::NotFound(msg),
            StorageError::Transient(msg) => PipelineError::Transient(msg),
            StorageError::Fatal(msg) => PipelineError::PerDocumentFatal {
                file_path: String::new(),
                reason: msg,
            },
        }
    }
}
