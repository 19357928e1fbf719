//! `SearchIndexClient`: a thin wrapper around a shared HTTP transport
//! that builds JSON request bodies and parses JSON responses, composed
//! with `gazette-reliability`'s retry/circuit-breaker-gated request path.

use async_stream::try_stream;
use futures::stream::Stream;
use gazette_reliability::{search_http_config, FetchOptions, HttpClientService};
use serde_json::{json, Value};
use tracing::{debug, instrument, warn};

use crate::errors::SearchError;

pub struct SearchIndexClient {
    http: HttpClientService,
    base_url: String,
}

impl SearchIndexClient {
    pub fn new(base_url: impl Into<String>) -> anyhow::Result<Self> {
        Ok(Self {
            http: HttpClientService::new(search_http_config())?,
            base_url: base_url.into(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), path.trim_start_matches('/'))
    }

    /// Idempotent: a no-op if the index already exists.
    #[instrument(skip(self, mappings), fields(index = %index))]
    pub async fn create_index(&self, index: &str, mappings: Value) -> Result<(), SearchError> {
        let head = self
            .http
            .get(&self.url(index), FetchOptions::default().with_max_retries(1))
            .await;

        if let Ok(response) = &head {
            if response.status().is_success() {
                debug!("index already exists, skipping create");
                return Ok(());
            }
        }

        let body = serde_json::to_vec(&mappings)
            .map_err(|e| SearchError::Fatal(format!("invalid mappings: {e}")))?;

        let response = self
            .http
            .put(
                &self.url(index),
                body,
                FetchOptions::default().add_header("Content-Type", "application/json"),
            )
            .await
            .map_err(|e| classify(&e))?;

        if !response.status().is_success() {
            return Err(SearchError::Fatal(format!(
                "create index failed: {}",
                response.status()
            )));
        }
        Ok(())
    }

    #[instrument(skip(self), fields(index = %index))]
    pub async fn refresh_index(&self, index: &str) -> Result<(), SearchError> {
        self.http
            .post(&self.url(&format!("{index}/_refresh")), Vec::new(), FetchOptions::default())
            .await
            .map_err(|e| classify(&e))?;
        Ok(())
    }

    /// Upsert by id, wrapped in the transport's default retry (3 attempts,
    /// exponential backoff starting at 1s).
    #[instrument(skip(self, body), fields(index = %index, doc_id = %doc_id))]
    pub async fn index_document(
        &self,
        index: &str,
        doc_id: &str,
        body: Value,
        refresh: bool,
    ) -> Result<(), SearchError> {
        let path = if refresh {
            format!("{index}/_doc/{doc_id}?refresh=true")
        } else {
            format!("{index}/_doc/{doc_id}")
        };
        let payload = serde_json::to_vec(&body)
            .map_err(|e| SearchError::Fatal(format!("invalid document body: {e}")))?;

        let response = self
            .http
            .put(
                &self.url(&path),
                payload,
                FetchOptions::default().add_header("Content-Type", "application/json"),
            )
            .await
            .map_err(|e| classify(&e))?;

        if !response.status().is_success() {
            return Err(SearchError::Transient(format!(
                "index_document failed: {}",
                response.status()
            )));
        }
        Ok(())
    }

    /// Partial update via `_update/{id}`: merges `doc`'s top-level fields
    /// into the existing document rather than replacing it wholesale, so
    /// sibling fields written by another stage (embedding score, entity
    /// tags, source metadata) survive.
    #[instrument(skip(self, doc), fields(index = %index, doc_id = %doc_id))]
    pub async fn update_document(
        &self,
        index: &str,
        doc_id: &str,
        doc: Value,
        refresh: bool,
    ) -> Result<(), SearchError> {
        let path = if refresh {
            format!("{index}/_update/{doc_id}?refresh=true")
        } else {
            format!("{index}/_update/{doc_id}")
        };
        let body = json!({ "doc": doc });
        let payload = serde_json::to_vec(&body)
            .map_err(|e| SearchError::Fatal(format!("invalid document body: {e}")))?;

        let response = self
            .http
            .post(
                &self.url(&path),
                payload,
                FetchOptions::default().add_header("Content-Type", "application/json"),
            )
            .await
            .map_err(|e| classify(&e))?;

        if !response.status().is_success() {
            return Err(SearchError::Transient(format!(
                "update_document failed: {}",
                response.status()
            )));
        }
        Ok(())
    }

    /// Fetches a document's current `_source`, or `None` if it does not
    /// exist yet.
    #[instrument(skip(self), fields(index = %index, doc_id = %doc_id))]
    pub async fn get_document(&self, index: &str, doc_id: &str) -> Result<Option<Value>, SearchError> {
        let response = self
            .http
            .get(&self.url(&format!("{index}/_doc/{doc_id}")), FetchOptions::default())
            .await
            .map_err(|e| classify(&e))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let body = parse_json_body(response).await?;
        Ok(body.get("_source").cloned())
    }

    /// Single-shot request, 60s request timeout (configured on the
    /// underlying transport).
    #[instrument(skip(self, query), fields(index = %index))]
    pub async fn search(&self, index: &str, query: Value) -> Result<Value, SearchError> {
        let payload = serde_json::to_vec(&query)
            .map_err(|e| SearchError::Fatal(format!("invalid query: {e}")))?;

        let response = self
            .http
            .post(
                &self.url(&format!("{index}/_search")),
                payload,
                FetchOptions::default().add_header("Content-Type", "application/json"),
            )
            .await
            .map_err(|e| classify(&e))?;

        parse_json_body(response).await
    }

    /// Pre-tokenize `text` under `field`'s analyzer, used to build span
    /// queries from query phrases before they are sent to `search`.
    #[instrument(skip(self, text), fields(index = %index, field = %field))]
    pub async fn analyze(&self, index: &str, text: &str, field: &str) -> Result<Vec<String>, SearchError> {
        let body = json!({ "field": field, "text": text });
        let payload = serde_json::to_vec(&body)
            .map_err(|e| SearchError::Fatal(format!("invalid analyze request: {e}")))?;

        let response = self
            .http
            .post(
                &self.url(&format!("{index}/_analyze")),
                payload,
                FetchOptions::default().add_header("Content-Type", "application/json"),
            )
            .await
            .map_err(|e| classify(&e))?;

        let parsed = parse_json_body(response).await?;
        let tokens = parsed["tokens"]
            .as_array()
            .ok_or_else(|| SearchError::Fatal("analyze response missing tokens array".to_string()))?
            .iter()
            .filter_map(|t| t["token"].as_str().map(str::to_string))
            .collect();
        Ok(tokens)
    }

    /// Lazy stream of result pages, backed by a server-side scroll cursor.
    /// Yields pages while each returns hits; the cursor is cleared on
    /// exhaustion or when the stream is dropped early (best-effort).
    pub fn paginated_search<'a>(
        &'a self,
        index: &'a str,
        query: Value,
        keep_alive: &'a str,
    ) -> impl Stream<Item = Result<Value, SearchError>> + 'a {
        try_stream! {
            let mut body = query.clone();
            let first = self
                .http
                .post(
                    &self.url(&format!("{index}/_search?scroll={keep_alive}")),
                    serde_json::to_vec(&body).map_err(|e| SearchError::Fatal(e.to_string()))?,
                    FetchOptions::default().add_header("Content-Type", "application/json"),
                )
                .await
                .map_err(|e| classify(&e))?;

            let mut page = parse_json_body(first).await?;
            let mut scroll_id = page["_scroll_id"].as_str().map(str::to_string);

            loop {
                let hits = page["hits"]["hits"].as_array().cloned().unwrap_or_default();
                if hits.is_empty() {
                    break;
                }
                yield page.clone();

                let Some(id) = scroll_id.clone() else { break };
                body = json!({ "scroll": keep_alive, "scroll_id": id });
                let response = self
                    .http
                    .post(
                        &self.url("_search/scroll"),
                        serde_json::to_vec(&body).map_err(|e| SearchError::Fatal(e.to_string()))?,
                        FetchOptions::default().add_header("Content-Type", "application/json"),
                    )
                    .await
                    .map_err(|e| classify(&e))?;
                page = parse_json_body(response).await?;
                scroll_id = page["_scroll_id"].as_str().map(str::to_string);
            }

            if let Some(id) = scroll_id {
                let _ = self
                    .http
                    .delete(&self.url(&format!("_search/scroll/{id}")), FetchOptions::default())
                    .await;
            }
        }
    }
}

async fn parse_json_body(response: reqwest::Response) -> Result<Value, SearchError> {
    if !response.status().is_success() {
        let status = response.status();
        return Err(SearchError::Transient(format!("search engine returned {status}")));
    }
    response
        .json::<Value>()
        .await
        .map_err(|e| SearchError::Fatal(format!("invalid JSON response: {e}")))
}

fn classify(err: &anyhow::Error) -> SearchError {
    let message = err.to_string();
    if message.contains("client error:") {
        warn!(error = %message, "non-retryable search engine client error");
        SearchError::Fatal(message)
    } else {
        SearchError::Transient(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_joins_base_and_path_without_double_slash() {
        let client = SearchIndexClient::new("http://search.local/").unwrap();
        assert_eq!(client.url("/gazettes/_search"), "http://search.local/gazettes/_search");
    }
}
