//! Translate `sqlx` failures into the pipeline's error taxonomy.

use gazette_types::PipelineError;

pub fn transient(err: sqlx::Error) -> PipelineError {
    PipelineError::Transient(err.to_string())
}

pub fn fatal_config(context: &str, err: sqlx::Error) -> PipelineError {
    PipelineError::FatalConfig(format!("{context}: {err}"))
}
