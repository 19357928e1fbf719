//! `TextPipeline` (C6): the per-gazette orchestrator. No global singleton,
//! no generator chaining — `GazetteSource::iterate`'s `Stream` is drained
//! and fanned out over a semaphore-capped pool of per-gazette tasks that
//! each share one `&Run` context.

use std::path::PathBuf;
use std::sync::Arc;

use futures::stream::FuturesUnordered;
use futures::StreamExt;
use gazette_db::GazetteSource;
use gazette_extraction::ExtractorClient;
use gazette_search::SearchIndexClient;
use gazette_storage::{BinaryStore, UploadOptions};
use gazette_types::{
    storage_txt_path, Gazette, IndexableDocument, PipelineError, Segment, SelectionMode,
    SkipReason,
};
use tokio::sync::Semaphore;
use tracing::{error, instrument, warn};

use crate::context::Run;

/// After this many gazettes, a completed batch is let go out of scope.
/// Rust has no runtime GC to request explicitly; the discipline is simply
/// never holding more than one batch of finished gazettes in memory.
const MEMORY_DISCIPLINE_BATCH: usize = 10;

/// Default cap on in-flight per-gazette tasks.
const MAX_CONCURRENT_GAZETTES: usize = 16;

pub struct TextPipelineConfig {
    pub files_endpoint: String,
    pub max_gazette_file_bytes: u64,
    pub gazette_index: String,
}

pub struct TextPipeline {
    source: Arc<GazetteSource>,
    storage: Arc<BinaryStore>,
    extractor: Arc<ExtractorClient>,
    search: Arc<SearchIndexClient>,
    config: Arc<TextPipelineConfig>,
}

impl TextPipeline {
    pub fn new(
        source: GazetteSource,
        storage: BinaryStore,
        extractor: ExtractorClient,
        search: SearchIndexClient,
        config: TextPipelineConfig,
    ) -> Self {
        Self {
            source: Arc::new(source),
            storage: Arc::new(storage),
            extractor: Arc::new(extractor),
            search: Arc::new(search),
            config: Arc::new(config),
        }
    }

    /// The underlying gazette source, for callers that need to resolve
    /// metadata after a run (e.g. the theme-processing stage's checksum
    /// lookup).
    pub fn source(&self) -> &GazetteSource {
        self.source.as_ref()
    }

    /// The underlying search client, shared with the theme-processing
    /// stage so it reuses this run's connection rather than opening a
    /// second one.
    pub fn search(&self) -> &SearchIndexClient {
        self.search.as_ref()
    }

    /// Drives C1's stream: the pipeline never holds the source cursor
    /// across a long suspension — each row is handed to a
    /// worker task as soon as it arrives, and the next row is requested
    /// independently of that task's completion. Returns the full list of
    /// indexed document ids (checksums) across every gazette processed.
    pub async fn run(&self, run: &Run, mode: SelectionMode) -> Vec<String> {
        let semaphore = Arc::new(Semaphore::new(MAX_CONCURRENT_GAZETTES));
        let mut in_flight = FuturesUnordered::new();
        let mut indexed_ids = Vec::new();
        let mut batch_completed = 0usize;

        let mut stream = std::pin::pin!(self.source.iterate(mode));

        loop {
            tokio::select! {
                biased;

                Some(ids) = in_flight.next(), if !in_flight.is_empty() => {
                    indexed_ids.extend(ids);
                    batch_completed += 1;
                    if batch_completed >= MEMORY_DISCIPLINE_BATCH {
                        let mut metrics = run.metrics.lock().expect("metrics lock poisoned");
                        metrics.gazettes_processed += batch_completed as u64;
                        batch_completed = 0;
                    }
                }

                next = stream.next() => {
                    match next {
                        Some(Ok(gazette)) => {
                            let permit = semaphore.clone().acquire_owned().await
                                .expect("semaphore is never closed");
                            let storage = self.storage.clone();
                            let extractor = self.extractor.clone();
                            let search = self.search.clone();
                            let source = self.source.clone();
                            let config = self.config.clone();
                            in_flight.push(async move {
                                let _permit = permit;
                                process_one(gazette, run, &source, &storage, &extractor, &search, &config).await
                            });
                        }
                        Some(Err(err)) => {
                            error!(error = %err, "failed to read next gazette from source");
                        }
                        None if in_flight.is_empty() => break,
                        None => {}
                    }
                }

                else => break,
            }
        }

        if batch_completed > 0 {
            let mut metrics = run.metrics.lock().expect("metrics lock poisoned");
            metrics.gazettes_processed += batch_completed as u64;
        }

        indexed_ids
    }
}

/// Steps 1-10 for one gazette, with the result logged and swallowed on
/// failure so the run continues to the next gazette.
#[instrument(skip_all, fields(file_path = %gazette.file_path))]
async fn process_one(
    gazette: Gazette,
    run: &Run,
    source: &GazetteSource,
    storage: &BinaryStore,
    extractor: &ExtractorClient,
    search: &SearchIndexClient,
    config: &TextPipelineConfig,
) -> Vec<String> {
    let file_path = gazette.file_path.clone();
    match run_steps(gazette, run, source, storage, extractor, search, config).await {
        Ok(ids) => ids,
        Err(err) => {
            let skip = SkipReason::from_error(file_path, &err);
            warn!(category = ?skip.category, detail = %skip.detail, "skipping gazette");
            let mut metrics = run.metrics.lock().expect("metrics lock poisoned");
            metrics.gazettes_skipped += 1;
            Vec::new()
        }
    }
}

async fn run_steps(
    mut gazette: Gazette,
    run: &Run,
    source: &GazetteSource,
    storage: &BinaryStore,
    extractor: &ExtractorClient,
    search: &SearchIndexClient,
    config: &TextPipelineConfig,
) -> Result<Vec<String>, PipelineError> {
    // Steps 1-2: download into a scoped temp file. The `NamedTempFile`'s
    // `Drop` deletes it on every exit path, including the early returns
    // below.
    let temp = tempfile::NamedTempFile::new()
        .map_err(|e| PipelineError::Transient(format!("creating temp file: {e}")))?;
    let path: PathBuf = temp.path().to_path_buf();

    {
        let file = tokio::fs::File::create(&path)
            .await
            .map_err(|e| PipelineError::Transient(e.to_string()))?;
        storage.download(&gazette.file_path, file).await?;
    }

    // Step 4: size ceiling.
    let metadata = tokio::fs::metadata(&path)
        .await
        .map_err(|e| PipelineError::Transient(e.to_string()))?;
    if metadata.len() > config.max_gazette_file_bytes {
        return Err(PipelineError::PerDocumentFatal {
            file_path: gazette.file_path.clone(),
            reason: format!(
                "file size {} exceeds limit {}",
                metadata.len(),
                config.max_gazette_file_bytes
            ),
        });
    }

    // Step 5: extract, then drop the binary from disk immediately.
    let started = std::time::Instant::now();
    let extraction = extractor.extract_text(&path).await;
    drop(temp);
    record_extractor_call(run, started, &extraction);
    let source_text = extraction?;

    gazette.file_checksum = Some(gazette_types::md5_hex(source_text.as_bytes()));
    gazette.source_text = Some(source_text);

    // Steps 6-7: compute the storage path/url, upload the raw text.
    let storage_path = storage_txt_path(&gazette.file_path);
    let public_url = format!("{}/{storage_path}", config.files_endpoint);
    storage
        .upload(
            &storage_path,
            gazette.source_text.as_ref().unwrap().clone().into_bytes(),
            UploadOptions::default(),
        )
        .await?;
    gazette.file_raw_txt = Some(public_url);

    // Step 8: branch on association vs simple gazette.
    let indexed_ids = if gazette.is_association() {
        index_segments(&gazette, run, storage, search, &config.gazette_index).await?
    } else {
        let checksum = gazette.file_checksum().to_string();
        search
            .index_document(&config.gazette_index, &checksum, gazette_document_body(&gazette), false)
            .await?;
        vec![checksum]
    };

    // Step 9: mark the source row processed.
    source
        .mark_processed(gazette.id, gazette.file_checksum())
        .await?;

    Ok(indexed_ids)
}

fn record_extractor_call(
    run: &Run,
    started: std::time::Instant,
    result: &Result<String, PipelineError>,
) {
    let elapsed = started.elapsed();
    let mut metrics = run.metrics.lock().expect("metrics lock poisoned");
    match result {
        Ok(_) => metrics.extractor.record_success(elapsed),
        Err(err) => metrics.extractor.record_failure(elapsed, error_tag(err)),
    }
}

fn error_tag(err: &PipelineError) -> &'static str {
    match err {
        PipelineError::UnsupportedFileType(_) => "unsupported_file_type",
        PipelineError::InvalidInput(_) => "invalid_input",
        PipelineError::NotFound(_) => "not_found",
        PipelineError::Transient(_) => "transient",
        PipelineError::FatalConfig(_) => "fatal_config",
        PipelineError::PerDocumentFatal { .. } => "per_document_fatal",
    }
}

/// Segments an association gazette and indexes one document per child
/// territory (step 8, association branch). The parent gazette's own
/// checksum is never indexed.
async fn index_segments(
    gazette: &Gazette,
    run: &Run,
    storage: &BinaryStore,
    search: &SearchIndexClient,
    gazette_index: &str,
) -> Result<Vec<String>, PipelineError> {
    let segmenter = run.segmenters.get(&gazette.territory_id)?;
    let segments = segmenter.segment(gazette, &run.territories)?;
    let mut indexed_ids = Vec::with_capacity(segments.len());

    for segment in &segments {
        storage
            .upload(
                &segment.storage_path(),
                segment.text.clone().into_bytes(),
                UploadOptions::default(),
            )
            .await?;
        let checksum = segment.file_checksum().to_string();
        search
            .index_document(gazette_index, &checksum, segment_document_body(segment), false)
            .await?;
        indexed_ids.push(checksum);
    }

    Ok(indexed_ids)
}

fn gazette_document_body(gazette: &Gazette) -> serde_json::Value {
    serde_json::json!({
        "territory_id": gazette.territory_id(),
        "date": gazette.date().to_string(),
        "file_checksum": gazette.file_checksum(),
        "source_text": gazette.source_text(),
        "file_raw_txt": gazette.file_raw_txt,
        "edition_number": gazette.edition_number,
        "is_extra_edition": gazette.is_extra_edition,
        "power": gazette.power,
    })
}

fn segment_document_body(segment: &Segment) -> serde_json::Value {
    serde_json::json!({
        "territory_id": segment.territory_id(),
        "date": segment.date().to_string(),
        "file_checksum": segment.file_checksum(),
        "source_text": segment.source_text(),
        "file_raw_txt": segment.storage_path(),
        "edition_number": segment.edition_number,
        "is_extra_edition": segment.is_extra_edition,
        "power": segment.power,
        "parent_id": segment.parent_id,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_gazette() -> Gazette {
        Gazette {
            id: 1,
            file_path: "sc/2020-10-18/abc.pdf".into(),
            file_url: "https://example.org/abc.pdf".into(),
            date: chrono::NaiveDate::from_ymd_opt(2020, 10, 18).unwrap(),
            edition_number: "1".into(),
            is_extra_edition: false,
            power: gazette_types::Power::Executive,
            territory_id: "3550308".into(),
            scraped_at: chrono::Utc::now(),
            created_at: chrono::Utc::now(),
            processed: false,
            source_text: Some("Texto oficial.".into()),
            file_raw_txt: Some("https://files/sc/2020-10-18/abc.txt".into()),
            file_checksum: Some("c0".into()),
        }
    }

    #[test]
    fn gazette_document_body_carries_checksum() {
        let body = gazette_document_body(&sample_gazette());
        assert_eq!(body["file_checksum"], "c0");
        assert_eq!(body["source_text"], "Texto oficial.");
    }

    #[test]
    fn association_flag_drives_the_indexing_branch() {
        let mut gazette = sample_gazette();
        assert!(!gazette.is_association());
        gazette.territory_id = "2700000".into();
        assert!(gazette.is_association());
    }

    #[test]
    fn error_tag_is_stable_per_category() {
        assert_eq!(error_tag(&PipelineError::NotFound("x".into())), "not_found");
        assert_eq!(error_tag(&PipelineError::Transient("x".into())), "transient");
    }
}
