//! Error taxonomy driving retry/skip/abort decisions.
//!
//! One `thiserror` enum per failure category, matched explicitly at the
//! orchestrator boundary rather than caught with a broad exception handler.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, PipelineError>;

/// Every failure mode a pipeline stage can produce, tagged by category.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Category 1: the extractor could not recognize, or explicitly
    /// rejects (zip), the sniffed MIME type.
    #[error("unsupported file type: {0}")]
    UnsupportedFileType(String),

    /// Category 1: malformed input that is not a MIME problem (e.g. an
    /// unparsable territory slug table entry).
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Category 2: the object store or relational store reports the
    /// resource does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Category 3: network timeout, refused connection, premature close,
    /// or an HTTP 5xx / 408 / 429 response. Retryable with backoff.
    #[error("transient failure: {0}")]
    Transient(String),

    /// Category 4: missing env var, unparsable theme file, unresolved
    /// territory slug. Aborts the run immediately, before the per-gazette
    /// loop starts.
    #[error("fatal configuration error: {0}")]
    FatalConfig(String),

    /// Category 5: a per-document failure that is fatal only for that
    /// document (exceeded size, extraction still failing after retries).
    /// The document is skipped and NOT marked processed.
    #[error("fatal for document {file_path}: {reason}")]
    PerDocumentFatal { file_path: String, reason: String },
}

impl PipelineError {
    /// `true` for categories the retry policy should re-attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self, PipelineError::Transient(_))
    }

    /// `true` for categories that should abort the whole run rather than
    /// being caught at the per-gazette boundary.
    pub fn is_fatal_to_run(&self) -> bool {
        matches!(self, PipelineError::FatalConfig(_))
    }
}

/// The reason one gazette was skipped, carried alongside its identifiers
/// for structured logging. A `SkipReason` is never retried itself — by the
/// time one exists, retries (if applicable) have already been exhausted.
#[derive(Debug, Clone)]
pub struct SkipReason {
    pub file_path: String,
    pub category: SkipCategory,
    pub detail: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipCategory {
    UnsupportedFileType,
    InvalidInput,
    NotFound,
    OversizedFile,
    ExtractionFailedAfterRetries,
    Other,
}

impl SkipReason {
    pub fn from_error(file_path: impl Into<String>, err: &PipelineError) -> Self {
        let file_path = file_path.into();
        match err {
            PipelineError::UnsupportedFileType(detail) => Self {
                file_path,
                category: SkipCategory::UnsupportedFileType,
                detail: detail.clone(),
            },
            PipelineError::InvalidInput(detail) => Self {
                file_path,
                category: SkipCategory::InvalidInput,
                detail: detail.clone(),
            },
            PipelineError::NotFound(detail) => Self {
                file_path,
                category: SkipCategory::NotFound,
                detail: detail.clone(),
            },
            PipelineError::Transient(detail) => Self {
                file_path,
                category: SkipCategory::ExtractionFailedAfterRetries,
                detail: detail.clone(),
            },
            PipelineError::PerDocumentFatal { reason, .. } => Self {
                file_path,
                category: SkipCategory::ExtractionFailedAfterRetries,
                detail: reason.clone(),
            },
            PipelineError::FatalConfig(detail) => Self {
                file_path,
                category: SkipCategory::Other,
                detail: detail.clone(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_is_retryable() {
        assert!(PipelineError::Transient("boom".into()).is_retryable());
        assert!(!PipelineError::NotFound("boom".into()).is_retryable());
    }

    #[test]
    fn only_fatal_config_aborts_run() {
        assert!(PipelineError::FatalConfig("missing env".into()).is_fatal_to_run());
        assert!(!PipelineError::UnsupportedFileType("zip".into()).is_fatal_to_run());
    }

    #[test]
    fn skip_reason_carries_file_path() {
        let err = PipelineError::UnsupportedFileType("application/zip".into());
        let skip = SkipReason::from_error("sc/2020-10-18/abc.pdf", &err);
        assert_eq!(skip.file_path, "sc/2020-10-18/abc.pdf");
        assert_eq!(skip.category, SkipCategory::UnsupportedFileType);
    }
}
