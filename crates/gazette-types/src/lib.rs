//! Domain types shared across the gazette text pipeline.
//!
//! - `domain`: `Gazette`, `Territory`, `Segment`, `Theme`, `Excerpt` and the
//!   `IndexableDocument` capability shared by gazettes and segments.
//! - `error`: the error taxonomy (`PipelineError`) that drives retry/skip/
//!   abort decisions at the orchestrator boundary.
//! - `metrics`: `RunMetrics`, the explicit (non-global) replacement for the
//!   source system's connection-metrics singleton.

pub mod domain;
pub mod error;
pub mod metrics;

pub use domain::{
    md5_hex, storage_txt_path, Excerpt, Gazette, IndexableDocument, Power, Segment, SelectionMode,
    Territory, Theme, ThemeEntities, ThemeEntityCase, ThemeQuery,
};
pub use error::{PipelineError, Result, SkipReason};
pub use metrics::{CollaboratorStats, RunMetrics};
