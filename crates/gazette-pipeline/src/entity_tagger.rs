//! `ExcerptEnricher`'s entity-tagging sub-operation (C8b): theme entity
//! cases first, then the CNPJ regex — applied in that order to the
//! excerpt set produced for one theme.

use gazette_search::{entity_case_query, SearchError, SearchIndexClient, CNPJ_PATTERN};
use gazette_types::ThemeEntityCase;
use tracing::instrument;

const SCROLL_KEEP_ALIVE: &str = "5m";

/// Phase 1: for each entity case, run a paginated `match_phrase`/FVH
/// highlight search scoped to `excerpt_ids`; every hit that produced a
/// highlight has its `excerpt` text replaced with the tagged highlight and
/// `case.title` added to `excerpt_entities` (deduplicated), then written
/// back as a partial update with `refresh=true` so the embedding score and
/// source metadata already on the document survive.
#[instrument(skip(client, cases, excerpt_ids))]
pub async fn tag_theme_cases(
    client: &SearchIndexClient,
    theme_index: &str,
    cases: &[ThemeEntityCase],
    excerpt_ids: &[String],
) -> Result<(), SearchError> {
    use futures::StreamExt;

    for case in cases {
        let query = entity_case_query(
            "excerpt.with_stopwords",
            &case.category,
            &case.values,
            excerpt_ids,
        );

        let mut pages = std::pin::pin!(client.paginated_search(theme_index, query, SCROLL_KEEP_ALIVE));
        while let Some(page) = pages.next().await {
            let page = page?;
            let hits = page["hits"]["hits"].as_array().cloned().unwrap_or_default();
            for hit in hits {
                let Some(excerpt_id) = hit["_id"].as_str() else { continue };
                let Some(highlighted) = hit["highlight"]["excerpt.with_stopwords"][0].as_str()
                else {
                    continue;
                };

                let mut entities: Vec<String> = hit["_source"]["excerpt_entities"]
                    .as_array()
                    .map(|values| {
                        values.iter().filter_map(|v| v.as_str().map(str::to_string)).collect()
                    })
                    .unwrap_or_default();
                if !entities.iter().any(|e| e == &case.title) {
                    entities.push(case.title.clone());
                }

                client
                    .update_document(
                        theme_index,
                        excerpt_id,
                        serde_json::json!({
                            "excerpt": highlighted,
                            "excerpt_entities": entities,
                        }),
                        true,
                    )
                    .await?;
            }
        }
    }

    Ok(())
}

/// Phase 2: for every excerpt, regex-search its text for CNPJ identifiers.
/// Each distinct match is wrapped with `<entidadecnpj>…</entidadecnpj>` in
/// place, `"CNPJ"` is added to `excerpt_entities`, and the excerpt is
/// written back as a partial update with `refresh=true`. The current
/// `excerpt_entities` is re-read from the index rather than trusted from
/// the caller's in-memory excerpt, since phase 1 may already have added
/// theme-case titles to it.
#[instrument(skip(client, excerpts))]
pub async fn tag_cnpj(
    client: &SearchIndexClient,
    theme_index: &str,
    excerpts: &[(String, String)],
) -> Result<(), SearchError> {
    for (excerpt_id, text) in excerpts {
        let Some(tagged) = tag_cnpj_in_text(text) else {
            continue;
        };

        let current = client.get_document(theme_index, excerpt_id).await?;
        let mut entities: Vec<String> = current
            .as_ref()
            .and_then(|source| source["excerpt_entities"].as_array())
            .map(|values| values.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
            .unwrap_or_default();
        if !entities.iter().any(|e| e == "CNPJ") {
            entities.push("CNPJ".to_string());
        }

        client
            .update_document(
                theme_index,
                excerpt_id,
                serde_json::json!({ "excerpt": tagged, "excerpt_entities": entities }),
                true,
            )
            .await?;
    }

    Ok(())
}

/// Wraps every distinct CNPJ match in `text` with the entity tag. Returns
/// `None` when no match is found, so the caller can skip the write.
fn tag_cnpj_in_text(text: &str) -> Option<String> {
    if !CNPJ_PATTERN.is_match(text) {
        return None;
    }

    let mut result = String::with_capacity(text.len());
    let mut last_end = 0;
    for captures in CNPJ_PATTERN.captures_iter(text) {
        let full = captures.get(0).unwrap();
        let cnpj = captures.get(2).unwrap();

        result.push_str(&text[last_end..cnpj.start()]);
        result.push_str(&format!("<entidadecnpj>{}</entidadecnpj>", cnpj.as_str()));
        result.push_str(&text[cnpj.end()..full.end()]);
        last_end = full.end();
    }
    result.push_str(&text[last_end..]);
    Some(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tags_a_formatted_cnpj() {
        let text = "contrato com 12.345.678/0001-90 firmado";
        let tagged = tag_cnpj_in_text(text).unwrap();
        assert_eq!(
            tagged,
            "contrato com <entidadecnpj>12.345.678/0001-90</entidadecnpj> firmado"
        );
    }

    #[test]
    fn no_match_returns_none() {
        assert!(tag_cnpj_in_text("sem identificadores aqui").is_none());
    }

    #[test]
    fn tags_multiple_distinct_matches() {
        let text = "A 12.345.678/0001-90 e B 98.765.432/0001-10 firmados";
        let tagged = tag_cnpj_in_text(text).unwrap();
        assert!(tagged.contains("<entidadecnpj>12.345.678/0001-90</entidadecnpj>"));
        assert!(tagged.contains("<entidadecnpj>98.765.432/0001-10</entidadecnpj>"));
    }
}
