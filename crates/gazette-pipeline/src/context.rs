//! `Run`: the explicit context value threaded through every pipeline
//! function — territory lookup, segmenter registry and metrics sink,
//! constructed once at startup. No global or static mutable state
//! anywhere in this workspace.

use std::sync::Mutex;

use gazette_segmentation::{SegmenterFactory, TerritoryTable};
use gazette_types::RunMetrics;

/// Bundles the territory lookup table, the segmenter registry, and the
/// metrics sink for one pipeline run. Passed by `&Run` (or `Arc<Run>` when a
/// stage spawns its own tasks); never a global/static.
pub struct Run {
    pub territories: TerritoryTable,
    pub segmenters: SegmenterFactory,
    pub metrics: Mutex<RunMetrics>,
}

impl Run {
    pub fn new(territories: TerritoryTable) -> Self {
        Self {
            territories,
            segmenters: SegmenterFactory::new(),
            metrics: Mutex::new(RunMetrics::new()),
        }
    }
}
