//! Index mapping bodies for the two index families.
//!
//! Every full-text field is indexed three times — `default` (stemmed,
//! stopwords stripped), `with_stopwords` (stemmed, stopwords kept, used for
//! phrase-proximity queries), and `exact` (lowercased only, used for
//! case-insensitive literal matches). All three store term vectors with
//! offsets and positions, required by the fast-vector highlighter.

use serde_json::{json, Value};

fn text_field_with_subfields() -> Value {
    json!({
        "type": "text",
        "analyzer": "default_analyzer",
        "term_vector": "with_positions_offsets",
        "fields": {
            "with_stopwords": {
                "type": "text",
                "analyzer": "with_stopwords_analyzer",
                "term_vector": "with_positions_offsets"
            },
            "exact": {
                "type": "text",
                "analyzer": "exact_analyzer",
                "term_vector": "with_positions_offsets"
            }
        }
    })
}

fn analysis_settings() -> Value {
    json!({
        "analysis": {
            "filter": {
                "brazilian_stop": { "type": "stop", "stopwords": "_brazilian_" },
                "brazilian_stemmer": { "type": "stemmer", "language": "brazilian" }
            },
            "analyzer": {
                "default_analyzer": {
                    "type": "custom",
                    "tokenizer": "standard",
                    "filter": ["lowercase", "brazilian_stop", "brazilian_stemmer"]
                },
                "with_stopwords_analyzer": {
                    "type": "custom",
                    "tokenizer": "standard",
                    "filter": ["lowercase", "brazilian_stemmer"]
                },
                "exact_analyzer": {
                    "type": "custom",
                    "tokenizer": "standard",
                    "filter": ["lowercase"]
                }
            }
        }
    })
}

/// Mapping body for the gazette full-text index. Sort key
/// `(territory_id asc, date desc)`.
pub fn gazette_index_mapping() -> Value {
    json!({
        "settings": {
            "analysis": analysis_settings()["analysis"].clone(),
            "index": {
                "sort.field": ["territory_id", "date"],
                "sort.order": ["asc", "desc"]
            }
        },
        "mappings": {
            "properties": {
                "territory_id": { "type": "keyword" },
                "file_checksum": { "type": "keyword" },
                "date": { "type": "date" },
                "source_text": text_field_with_subfields()
            }
        }
    })
}

/// Mapping body for the themed-excerpt index. Same analyzer triple on
/// `excerpt`, plus `rank_feature` score fields and denormalized gazette
/// metadata.
pub fn excerpt_index_mapping() -> Value {
    json!({
        "settings": {
            "analysis": analysis_settings()["analysis"].clone()
        },
        "mappings": {
            "properties": {
                "excerpt": text_field_with_subfields(),
                "excerpt_subthemes": { "type": "keyword" },
                "excerpt_entities": { "type": "keyword" },
                "excerpt_embedding_score": { "type": "rank_feature" },
                "excerpt_tfidf_score": { "type": "rank_feature" },
                "source_territory_id": { "type": "keyword" },
                "source_file_checksum": { "type": "keyword" },
                "source_file_path": { "type": "keyword" },
                "source_date": { "type": "date" },
                "source_power": { "type": "keyword" }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gazette_mapping_declares_three_analyzers_on_source_text() {
        let mapping = gazette_index_mapping();
        let source_text = &mapping["mappings"]["properties"]["source_text"];
        assert_eq!(source_text["analyzer"], "default_analyzer");
        assert_eq!(
            source_text["fields"]["with_stopwords"]["analyzer"],
            "with_stopwords_analyzer"
        );
        assert_eq!(source_text["fields"]["exact"]["analyzer"], "exact_analyzer");
    }

    #[test]
    fn excerpt_mapping_uses_rank_feature_for_scores() {
        let mapping = excerpt_index_mapping();
        let properties = &mapping["mappings"]["properties"];
        assert_eq!(properties["excerpt_embedding_score"]["type"], "rank_feature");
        assert_eq!(properties["excerpt_tfidf_score"]["type"], "rank_feature");
    }
}
