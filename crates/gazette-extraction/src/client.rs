//! `ExtractorClient`: `extractText(localPath) -> String`, wrapping a
//! Tika-compatible extraction service.

use std::path::Path;

use gazette_reliability::{extractor_http_config, FetchOptions, HttpClientService};
use gazette_types::PipelineError;
use gazette_utils::retry::RetryPolicy;
use tracing::{instrument, warn};

use crate::mime::{sniff, DetectedMime};

/// Wraps a Tika-compatible extraction service with MIME sniffing and a
/// `2^attempt`-second retry policy scoped to this client only — the
/// underlying `HttpClientService` retry is disabled per-call (via
/// `max_retries(1)`) so that non-retryable 4xx responses surface
/// immediately instead of being retried by the shared transport.
pub struct ExtractorClient {
    http: HttpClientService,
    extractor_url: String,
    retry: RetryPolicy,
}

impl ExtractorClient {
    pub fn new(extractor_url: impl Into<String>) -> anyhow::Result<Self> {
        let http = HttpClientService::new(extractor_http_config())?;
        Ok(Self {
            http,
            extractor_url: extractor_url.into(),
            retry: RetryPolicy::new(3, 1_000, 4_000, 2.0),
        })
    }

    /// Extract text from a local file. `text/plain` is read directly;
    /// `application/zip` and anything else unrecognized are rejected
    /// without a network call.
    #[instrument(skip(self), fields(path = %local_path.display()))]
    pub async fn extract_text(&self, local_path: &Path) -> Result<String, PipelineError> {
        let bytes = tokio::fs::read(local_path)
            .await
            .map_err(|e| PipelineError::NotFound(e.to_string()))?;

        let mime = sniff(&bytes);
        match &mime {
            DetectedMime::PlainText => {
                return String::from_utf8(bytes)
                    .map_err(|e| PipelineError::InvalidInput(format!("not valid utf-8: {e}")));
            }
            DetectedMime::Zip => {
                return Err(PipelineError::UnsupportedFileType("application/zip".to_string()));
            }
            DetectedMime::Other(other) => {
                return Err(PipelineError::UnsupportedFileType(other.clone()));
            }
            DetectedMime::Pdf | DetectedMime::Msword | DetectedMime::Odt | DetectedMime::Docx => {}
        }

        self.put_to_extractor(local_path, &mime, bytes).await
    }

    async fn put_to_extractor(
        &self,
        local_path: &Path,
        mime: &DetectedMime,
        bytes: Vec<u8>,
    ) -> Result<String, PipelineError> {
        let url = format!("{}/tika", self.extractor_url.trim_end_matches('/'));
        let content_type = mime.as_content_type().to_string();

        let mut attempt = 0usize;
        loop {
            let options = FetchOptions::default()
                .with_max_retries(1)
                .add_header("Content-Type", content_type.clone())
                .add_header("Accept", "text/plain");

            match self.http.put(&url, bytes.clone(), options).await {
                Ok(response) => {
                    let body = response
                        .bytes()
                        .await
                        .map_err(|e| PipelineError::Transient(e.to_string()))?;
                    return String::from_utf8(body.to_vec()).map_err(|e| {
                        PipelineError::Transient(format!(
                            "extractor returned non-utf8 body: {e}"
                        ))
                    });
                }
                Err(err) => {
                    let message = err.to_string();
                    // `HttpClientService::request` tags non-retryable client
                    // errors (4xx other than 408/429) with this prefix.
                    let retryable = !message.contains("client error:");
                    attempt += 1;

                    if !retryable {
                        return Err(PipelineError::PerDocumentFatal {
                            file_path: local_path.display().to_string(),
                            reason: message,
                        });
                    }
                    if attempt >= self.retry.max_attempts {
                        warn!(attempts = attempt, "extraction exhausted retries");
                        return Err(PipelineError::Transient(message));
                    }

                    tokio::time::sleep(self.retry.backoff_duration(attempt - 1)).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_builds_with_extractor_timeouts() {
        let client = ExtractorClient::new("http://extractor.local").unwrap();
        assert_eq!(client.http.config().connect_timeout_ms, 30_000);
        assert_eq!(client.http.config().timeout_ms, 300_000);
    }

    #[tokio::test]
    async fn plain_text_short_circuits_without_network() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notice.txt");
        tokio::fs::write(&path, b"diario oficial").await.unwrap();

        let client = ExtractorClient::new("http://unreachable.invalid:1").unwrap();
        let text = client.extract_text(&path).await.unwrap();
        assert_eq!(text, "diario oficial");
    }

    #[tokio::test]
    async fn zip_is_rejected_without_network() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bundle.zip");
        let mut bytes = b"PK\x03\x04".to_vec();
        bytes.extend(vec![0u8; 16]);
        tokio::fs::write(&path, &bytes).await.unwrap();

        let client = ExtractorClient::new("http://unreachable.invalid:1").unwrap();
        let err = client.extract_text(&path).await.unwrap_err();
        assert!(matches!(err, PipelineError::UnsupportedFileType(_)));
    }

    #[tokio::test]
    async fn missing_file_is_not_found() {
        let client = ExtractorClient::new("http://unreachable.invalid:1").unwrap();
        let err = client
            .extract_text(Path::new("/nonexistent/path.pdf"))
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::NotFound(_)));
    }
}
