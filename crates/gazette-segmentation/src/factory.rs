//! Per-run segmenter cache: each territory code is built into a segmenter
//! at most once and reused for every gazette that territory produces,
//! scoped to one `SegmenterFactory` per run instead of a module-level
//! global.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use gazette_types::PipelineError;

use crate::alagoas::AlagoasSegmenter;
use crate::segmenter::Segmenter;

/// New states add a match arm here plus an implementation module.
pub struct SegmenterFactory {
    cache: Mutex<HashMap<String, Arc<dyn Segmenter>>>,
}

impl SegmenterFactory {
    pub fn new() -> Self {
        Self {
            cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn get(&self, territory_id: &str) -> Result<Arc<dyn Segmenter>, PipelineError> {
        let mut cache = self.cache.lock().expect("segmenter cache lock poisoned");
        if let Some(segmenter) = cache.get(territory_id) {
            return Ok(segmenter.clone());
        }

        let segmenter: Arc<dyn Segmenter> = match territory_id {
            "2700000" => Arc::new(AlagoasSegmenter::new()),
            other => {
                return Err(PipelineError::InvalidInput(format!(
                    "no segmenter registered for territory {other}"
                )))
            }
        };

        cache.insert(territory_id.to_string(), segmenter.clone());
        Ok(segmenter)
    }
}

impl Default for SegmenterFactory {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alagoas_code_resolves() {
        let factory = SegmenterFactory::new();
        assert!(factory.get("2700000").is_ok());
    }

    #[test]
    fn unknown_code_errors() {
        let factory = SegmenterFactory::new();
        let err = factory.get("9999999").unwrap_err();
        assert!(matches!(err, PipelineError::InvalidInput(_)));
    }

    #[test]
    fn repeated_lookups_return_the_same_instance() {
        let factory = SegmenterFactory::new();
        let first = factory.get("2700000").unwrap();
        let second = factory.get("2700000").unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }
}
