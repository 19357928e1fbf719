//! Query body builders for C7 (proximity excerpt extraction) and C8
//! (entity-tagging).

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{json, Map, Value};

use crate::client::SearchIndexClient;
use crate::errors::SearchError;

fn single_key_object(key: &str, value: Value) -> Value {
    let mut map = Map::with_capacity(1);
    map.insert(key.to_string(), value);
    Value::Object(map)
}

/// `term_sets[macro][group][term]`: macro level OR, group level
/// span-near(slop=20, any order), term level OR (synonyms). A multi-word
/// term is itself tokenized and turned into an in-order span-near(slop=0).
pub async fn theme_proximity_query(
    client: &SearchIndexClient,
    index: &str,
    field: &str,
    term_sets: &[Vec<Vec<String>>],
    gazette_ids: &[i64],
) -> Result<Value, SearchError> {
    let mut macro_clauses = Vec::with_capacity(term_sets.len());

    for macro_entry in term_sets {
        let mut group_clauses = Vec::with_capacity(macro_entry.len());
        for group_entry in macro_entry {
            let mut synonym_clauses = Vec::with_capacity(group_entry.len());
            for term in group_entry {
                synonym_clauses.push(term_clause(client, index, field, term).await?);
            }
            group_clauses.push(json!({ "span_or": { "clauses": synonym_clauses } }));
        }
        macro_clauses.push(json!({
            "span_near": { "clauses": group_clauses, "slop": 20, "in_order": false }
        }));
    }

    let highlight_field = single_key_object(
        field,
        json!({
            "type": "unified",
            "fragment_size": 2000,
            "number_of_fragments": 10,
            "pre_tags": [""],
            "post_tags": [""]
        }),
    );

    Ok(json!({
        "query": {
            "bool": {
                "must": [ { "span_or": { "clauses": macro_clauses } } ],
                "filter": [ { "ids": { "values": gazette_ids } } ]
            }
        },
        "size": 10,
        "highlight": { "fields": highlight_field }
    }))
}

/// A term is a `span_term` directly, or — if it tokenizes to more than one
/// token — an in-order `span_near(slop=0)` over its token sequence.
async fn term_clause(
    client: &SearchIndexClient,
    index: &str,
    field: &str,
    term: &str,
) -> Result<Value, SearchError> {
    let tokens = client.analyze(index, term, field).await?;
    let span_terms: Vec<Value> = tokens
        .iter()
        .map(|token| json!({ "span_term": single_key_object(field, json!(token)) }))
        .collect();

    Ok(match span_terms.len() {
        0 => json!({ "span_term": single_key_object(field, json!(term)) }),
        1 => span_terms.into_iter().next().unwrap(),
        _ => json!({ "span_near": { "clauses": span_terms, "slop": 0, "in_order": true } }),
    })
}

/// Theme-case entity tagging query: OR of `match_phrase` clauses
/// restricted to a batch of excerpt ids, with an FVH highlighter tagging
/// matched spans with `<category>`/`</category>`.
pub fn entity_case_query(
    field: &str,
    category: &str,
    values: &[String],
    excerpt_ids: &[String],
) -> Value {
    let should: Vec<Value> = values
        .iter()
        .map(|value| json!({ "match_phrase": single_key_object(field, json!(value)) }))
        .collect();

    let highlight_field = single_key_object(
        field,
        json!({
            "type": "fvh",
            "matched_fields": ["excerpt", field],
            "fragment_size": 10000,
            "number_of_fragments": 1,
            "pre_tags": [format!("<{category}>")],
            "post_tags": [format!("</{category}>")]
        }),
    );

    json!({
        "query": {
            "bool": {
                "should": should,
                "minimum_should_match": 1,
                "filter": [ { "ids": { "values": excerpt_ids } } ]
            }
        },
        "highlight": { "fields": highlight_field }
    })
}

/// CNPJ identifier pattern, tolerant of the optional punctuation CNPJ is
/// conventionally rendered with.
pub static CNPJ_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(^|[^\d])(\d\.?\d\.?\d\.?\d\.?\d\.?\d\.?\d\.?\d/?\d{4}-?\d{2})($|[^\d])")
        .expect("CNPJ pattern is valid")
});

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cnpj_pattern_matches_formatted_number() {
        let text = "inscrita no CNPJ 12.345.678/0001-99 conforme edital";
        let found = CNPJ_PATTERN.captures(text).unwrap();
        assert_eq!(&found[2], "12.345.678/0001-99");
    }

    #[test]
    fn cnpj_pattern_matches_unformatted_number() {
        let text = "CNPJ 12345678000199 registrado";
        let found = CNPJ_PATTERN.captures(text).unwrap();
        assert_eq!(&found[2], "12345678000199");
    }

    #[test]
    fn entity_case_query_tags_category() {
        let query = entity_case_query(
            "excerpt.with_stopwords",
            "pessoa",
            &["João da Silva".to_string()],
            &["abc_1".to_string()],
        );
        let highlight = &query["highlight"]["fields"]["excerpt.with_stopwords"];
        assert_eq!(highlight["pre_tags"][0], "<pessoa>");
        assert_eq!(highlight["post_tags"][0], "</pessoa>");
    }
}
