//! The `Segmenter` capability: one implementation per aggregated-publisher
//! territory code.

use gazette_types::{Gazette, PipelineError, Segment};

use crate::territory_table::TerritoryTable;

/// Object-safe so the factory can hand out `Box<dyn Segmenter>` /
/// `Arc<dyn Segmenter>` without knowing the concrete implementation.
pub trait Segmenter: Send + Sync + std::fmt::Debug {
    fn segment(
        &self,
        gazette: &Gazette,
        territories: &TerritoryTable,
    ) -> Result<Vec<Segment>, PipelineError>;
}
