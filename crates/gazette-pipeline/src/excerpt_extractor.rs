//! `ExcerptExtractor` (C7): for one theme query, build the span-proximity
//! search against a batch of indexed gazettes and emit excerpts from the
//! highlighted spans.

use gazette_search::{theme_proximity_query, SearchError, SearchIndexClient};
use gazette_types::{Excerpt, Power, Theme, ThemeQuery};
use tracing::instrument;

/// Gazette ids are batched at this size per search request.
const GAZETTE_ID_BATCH_SIZE: usize = 500;

/// Fragments shorter than this are discarded — empirically accounts for
/// <1% of hits with spuriously high scores. Always applied, never
/// configurable per theme.
const MIN_EXCERPT_LENGTH: usize = 200;

/// Minimal gazette-metadata shape `ExcerptExtractor` needs to stamp onto
/// each derived excerpt. Callers (C6's `TextPipeline`) assemble this for
/// every gazette they index.
#[derive(Debug, Clone)]
pub struct IndexedGazetteMeta {
    pub file_checksum: String,
    pub territory_id: String,
    pub file_path: String,
    pub date: chrono::NaiveDate,
    pub power: Power,
}

/// Extracts excerpts for every query in `theme`, against every batch of
/// `gazette_ids`. The search engine's `ids` filter narrows which documents
/// are searched but returns no metadata for the (possibly many) gazettes
/// that did not highlight, so `lookup` resolves a hit's document id back
/// to the metadata needed to stamp `source_*` fields.
#[instrument(skip(client, theme, gazette_ids, lookup), fields(index = %theme.index))]
pub async fn extract_excerpts(
    client: &SearchIndexClient,
    gazette_index: &str,
    theme: &Theme,
    gazette_ids: &[IndexedGazetteMeta],
    lookup: impl Fn(&str) -> Option<IndexedGazetteMeta>,
) -> Result<Vec<Excerpt>, SearchError> {
    let mut excerpts = Vec::new();

    for query in &theme.queries {
        for batch in gazette_ids.chunks(GAZETTE_ID_BATCH_SIZE) {
            let checksums: Vec<String> = batch.iter().map(|g| g.file_checksum.clone()).collect();
            let batch_excerpts =
                extract_for_query_batch(client, gazette_index, query, &checksums, &lookup).await?;
            excerpts.extend(batch_excerpts);
        }
    }

    Ok(excerpts)
}

async fn extract_for_query_batch(
    client: &SearchIndexClient,
    gazette_index: &str,
    query: &ThemeQuery,
    checksums: &[String],
    lookup: &impl Fn(&str) -> Option<IndexedGazetteMeta>,
) -> Result<Vec<Excerpt>, SearchError> {
    // `theme_proximity_query` builds its `ids` filter from `&[i64]`, the
    // shape used elsewhere in the search crate; this pipeline always
    // indexes documents by their (string) checksum, so the numeric filter
    // is replaced with a string one after the query body is built, rather
    // than widening the shared builder for this one caller's id shape.
    let mut query_body =
        theme_proximity_query(client, gazette_index, "source_text.with_stopwords", &query.term_sets, &[])
            .await?;
    query_body["query"]["bool"]["filter"][0] =
        serde_json::json!({ "ids": { "values": checksums } });

    let response = client.search(gazette_index, query_body).await?;
    let hits = response["hits"]["hits"].as_array().cloned().unwrap_or_default();

    let mut excerpts = Vec::new();
    for hit in hits {
        let Some(gazette_checksum) = hit["_id"].as_str() else {
            continue;
        };
        let Some(meta) = lookup(gazette_checksum) else {
            continue;
        };
        let fragments = hit["highlight"]["source_text.with_stopwords"]
            .as_array()
            .cloned()
            .unwrap_or_default();

        for fragment in fragments {
            let Some(text) = fragment.as_str() else { continue };
            let collapsed = collapse_whitespace(text);
            if collapsed.len() < MIN_EXCERPT_LENGTH {
                continue;
            }
            excerpts.push(Excerpt {
                excerpt_id: Excerpt::derive_id(&meta.file_checksum, &collapsed),
                excerpt: collapsed,
                excerpt_subthemes: vec![query.title.clone()],
                excerpt_entities: Vec::new(),
                excerpt_embedding_score: None,
                excerpt_tfidf_score: None,
                source_territory_id: meta.territory_id.clone(),
                source_file_checksum: meta.file_checksum.clone(),
                source_file_path: meta.file_path.clone(),
                source_date: meta.date,
                source_power: meta.power,
            });
        }
    }

    Ok(excerpts)
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Writes every excerpt to the theme's index with `refresh=true` at write
/// time, for every excerpt write, not only at the end of a batch, so the
/// enrichment stage can immediately read what was just written.
#[instrument(skip(client, excerpts), fields(index = %index))]
pub async fn write_excerpts(
    client: &SearchIndexClient,
    index: &str,
    excerpts: &[Excerpt],
) -> Result<(), SearchError> {
    for excerpt in excerpts {
        let body = serde_json::to_value(excerpt)
            .map_err(|e| SearchError::Fatal(format!("excerpt serialization failed: {e}")))?;
        client
            .index_document(index, &excerpt.excerpt_id, body, true)
            .await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_fragments_are_discarded() {
        let short = "campanha de vacinação";
        assert!(collapse_whitespace(short).len() < MIN_EXCERPT_LENGTH);
    }

    #[test]
    fn collapse_whitespace_joins_on_single_space() {
        assert_eq!(collapse_whitespace("a   b\n\nc"), "a b c");
    }
}
