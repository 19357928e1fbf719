//! `EmbeddingModel` (C8a): the embedding-rerank sub-operation of
//! `ExcerptEnricher`. `encode`/`cosineMaxTopK` is the interface;
//! `CandleSentenceEmbedder` is one concrete, local-inference adapter
//! behind it, built on the `candle-core`/`candle-nn`/`candle-transformers`
//! stack for local BERT inference.

use std::path::Path;

use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::bert::{BertModel, Config as BertConfig};
use gazette_search::SearchIndexClient;
use gazette_types::ThemeQuery;
use tokenizers::Tokenizer;
use tracing::instrument;

/// A value this small is out of float-equality range of zero but still
/// effectively zero for ranking purposes — `rank_feature` fields must be
/// strictly positive.
const MIN_POSITIVE_SCORE: f32 = 1e-6;

/// Kept as a trait (rather than a concrete struct) so the pipeline and
/// its tests don't require model weights or network access to exercise
/// every other stage of excerpt enrichment.
pub trait EmbeddingModel: Send + Sync {
    fn encode(&self, text: &str) -> anyhow::Result<Vec<f32>>;

    /// Highest cosine similarity of `v` against any row of `matrix`.
    fn cosine_max_top_k(&self, v: &[f32], matrix: &[Vec<f32>]) -> f32 {
        matrix
            .iter()
            .map(|row| cosine_similarity(v, row))
            .fold(f32::MIN, f32::max)
            .max(0.0)
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

/// A Portuguese sentence-BERT model loaded via `candle-core`/`candle-nn`/
/// `candle-transformers`, with `tokenizers` for the wordpiece vocabulary.
/// Weights and tokenizer are expected to already be on disk (pulled once
/// via `hf-hub` by `gazette-cli`'s startup step at `EMBEDDING_MODEL_PATH`).
pub struct CandleSentenceEmbedder {
    model: BertModel,
    tokenizer: Tokenizer,
    device: Device,
}

impl CandleSentenceEmbedder {
    pub fn load(model_dir: &Path) -> anyhow::Result<Self> {
        let device = Device::Cpu;
        let config_path = model_dir.join("config.json");
        let config: BertConfig = serde_json::from_str(&std::fs::read_to_string(config_path)?)?;

        let weights_path = model_dir.join("model.safetensors");
        let vb = unsafe {
            VarBuilder::from_mmaped_safetensors(&[weights_path], DType::F32, &device)?
        };
        let model = BertModel::load(vb, &config)?;

        let tokenizer_path = model_dir.join("tokenizer.json");
        let tokenizer = Tokenizer::from_file(tokenizer_path)
            .map_err(|e| anyhow::anyhow!("loading tokenizer: {e}"))?;

        Ok(Self { model, tokenizer, device })
    }

    fn mean_pool(&self, hidden_states: &Tensor, attention_mask: &Tensor) -> candle_core::Result<Tensor> {
        let mask = attention_mask.unsqueeze(2)?.to_dtype(DType::F32)?;
        let masked = hidden_states.broadcast_mul(&mask)?;
        let summed = masked.sum(1)?;
        let counts = mask.sum(1)?.clamp(1e-9, f32::MAX)?;
        summed.broadcast_div(&counts)
    }
}

impl EmbeddingModel for CandleSentenceEmbedder {
    fn encode(&self, text: &str) -> anyhow::Result<Vec<f32>> {
        let encoding = self
            .tokenizer
            .encode(text, true)
            .map_err(|e| anyhow::anyhow!("tokenizing excerpt: {e}"))?;

        let ids = Tensor::new(encoding.get_ids(), &self.device)?.unsqueeze(0)?;
        let mask = Tensor::new(encoding.get_attention_mask(), &self.device)?.unsqueeze(0)?;
        let token_type_ids = ids.zeros_like()?;

        let hidden_states = self.model.forward(&ids, &token_type_ids, Some(&mask))?;
        let pooled = self.mean_pool(&hidden_states, &mask)?;
        let vector: Vec<f32> = pooled.squeeze(0)?.to_vec1()?;
        Ok(vector)
    }
}

/// Encodes `theme.query titles` into `Q`, then for every excerpt id stored
/// under `theme_index`, encodes the excerpt text and stores the max
/// cosine similarity against `Q` as `excerpt_embedding_score` (clamped to
/// `MIN_POSITIVE_SCORE` when the true value would be zero or negative,
/// since `rank_feature` requires strictly positive values). Written as a
/// partial update so the rest of the excerpt document is untouched.
#[instrument(skip(model, client, query_titles, excerpt_ids))]
pub async fn rerank_excerpts(
    model: &dyn EmbeddingModel,
    client: &SearchIndexClient,
    theme_index: &str,
    query_titles: &[String],
    excerpt_ids: &[(String, String)],
) -> anyhow::Result<()> {
    let query_matrix: Vec<Vec<f32>> = query_titles
        .iter()
        .map(|title| model.encode(title))
        .collect::<anyhow::Result<_>>()?;

    for (excerpt_id, excerpt_text) in excerpt_ids {
        let vector = model.encode(excerpt_text)?;
        let score = model.cosine_max_top_k(&vector, &query_matrix);
        let score = if score > 0.0 { score } else { MIN_POSITIVE_SCORE };

        client
            .update_document(
                theme_index,
                excerpt_id,
                serde_json::json!({ "excerpt_embedding_score": score }),
                true,
            )
            .await
            .map_err(anyhow::Error::from)?;
    }

    Ok(())
}

/// Extracts every theme query's title, in order — the rows of `Q`.
pub fn query_titles(queries: &[ThemeQuery]) -> Vec<String> {
    queries.iter().map(|q| q.title.clone()).collect()
}

/// Stub embedder used where tests exercise the enrichment flow without
/// pulling real model weights: returns a fixed-dimension hash-based
/// vector, deterministic per input text.
pub struct DeterministicStubEmbedder {
    dims: usize,
}

impl DeterministicStubEmbedder {
    pub fn new(dims: usize) -> Self {
        Self { dims }
    }
}

impl EmbeddingModel for DeterministicStubEmbedder {
    fn encode(&self, text: &str) -> anyhow::Result<Vec<f32>> {
        let mut vector = vec![0.0f32; self.dims];
        for (i, byte) in text.bytes().enumerate() {
            vector[i % self.dims] += byte as f32;
        }
        Ok(vector)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_text_has_cosine_similarity_one() {
        let embedder = DeterministicStubEmbedder::new(8);
        let a = embedder.encode("vacinação em massa").unwrap();
        let b = embedder.encode("vacinação em massa").unwrap();
        let similarity = cosine_similarity(&a, &b);
        assert!((similarity - 1.0).abs() < 1e-6);
    }

    #[test]
    fn cosine_max_top_k_picks_the_best_row() {
        let embedder = DeterministicStubEmbedder::new(8);
        let target = embedder.encode("saúde pública").unwrap();
        let matrix = vec![
            embedder.encode("economia").unwrap(),
            embedder.encode("saúde pública").unwrap(),
        ];
        let score = embedder.cosine_max_top_k(&target, &matrix);
        assert!(score > 0.99);
    }

    #[test]
    fn query_titles_preserves_order() {
        let queries = vec![
            ThemeQuery { title: "saúde".into(), term_sets: vec![] },
            ThemeQuery { title: "educação".into(), term_sets: vec![] },
        ];
        assert_eq!(query_titles(&queries), vec!["saúde", "educação"]);
    }
}
