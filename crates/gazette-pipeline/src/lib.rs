//! Orchestration layer: `Run` (the explicit context, §9 Design Note 2),
//! `TextPipeline` (C6), `ExcerptExtractor` (C7) and `ExcerptEnricher`'s two
//! sub-operations (C8a embedding rerank, C8b entity tagging).

pub mod context;
pub mod embedding;
pub mod entity_tagger;
pub mod excerpt_extractor;
pub mod text_pipeline;

pub use context::Run;
pub use embedding::{
    query_titles, rerank_excerpts, CandleSentenceEmbedder, DeterministicStubEmbedder,
    EmbeddingModel,
};
pub use entity_tagger::{tag_cnpj, tag_theme_cases};
pub use excerpt_extractor::{extract_excerpts, write_excerpts, IndexedGazetteMeta};
pub use text_pipeline::{TextPipeline, TextPipelineConfig};
