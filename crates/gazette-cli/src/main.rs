//! Entry point: wires the five collaborators (relational source, object
//! store, extractor, search index, pipeline orchestration) together and
//! drives one run.

mod config;

use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;

use anyhow::{bail, Context as _};
use clap::Parser;
use gazette_db::GazetteSource;
use gazette_extraction::ExtractorClient;
use gazette_pipeline::{
    extract_excerpts, query_titles, rerank_excerpts, tag_cnpj, tag_theme_cases, write_excerpts,
    CandleSentenceEmbedder, IndexedGazetteMeta, Run, TextPipeline, TextPipelineConfig,
};
use gazette_search::{excerpt_index_mapping, gazette_index_mapping, SearchIndexClient};
use gazette_segmentation::TerritoryTable;
use gazette_storage::BinaryStore;
use gazette_types::{IndexableDocument, SelectionMode, Theme};
use tracing_subscriber::EnvFilter;

use crate::config::{apply_debug_flag, ConfigError, GazetteConfig, Pipeline};

#[derive(Parser)]
#[command(name = "gazette-cli")]
#[command(about = "Gazette text-extraction, indexing and themed-excerpt pipeline")]
struct Args {
    #[arg(long, default_value = "gazette_texts")]
    pipeline: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    apply_debug_flag();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .init();

    let args = Args::parse();
    let pipeline = Pipeline::from_str(&args.pipeline).map_err(config_error_to_anyhow)?;
    if pipeline == Pipeline::Aggregates {
        bail!("the aggregates pipeline is not implemented by this binary — it is packaged by a separate, out-of-scope service");
    }

    let config = GazetteConfig::from_env().map_err(config_error_to_anyhow)?;
    let mode = SelectionMode::from_str(&config.execution_mode)
        .map_err(|e| anyhow::anyhow!("invalid EXECUTION_MODE: {e}"))?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        execution_mode = %config.execution_mode,
        gazette_index = %config.gazette_index,
        "starting gazette text pipeline"
    );

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(10)
        .connect(&config.database_url)
        .await
        .context("connecting to the gazette database")?;

    let source = GazetteSource::new(pool, config.page_size)?;
    let storage =
        BinaryStore::from_env(config.storage_bucket.clone(), &config.storage_endpoint_url).await;
    let extractor = ExtractorClient::new(config.extractor_url.clone())?;
    let search = SearchIndexClient::new(config.opensearch_url.clone())?;

    search.create_index(&config.gazette_index, gazette_index_mapping()).await?;

    let territories = source.load_territories().await?;
    let run = Run::new(TerritoryTable::new(territories));

    let text_pipeline_config = TextPipelineConfig {
        files_endpoint: config.files_endpoint.clone(),
        max_gazette_file_bytes: config.max_gazette_file_bytes,
        gazette_index: config.gazette_index.clone(),
    };
    let text_pipeline = TextPipeline::new(source, storage, extractor, search, text_pipeline_config);

    let shutdown = async {
        tokio::signal::ctrl_c().await.expect("failed to listen for ctrl-c");
        tracing::info!("received shutdown signal, finishing in-flight gazettes");
    };

    let indexed_ids = tokio::select! {
        ids = text_pipeline.run(&run, mode) => ids,
        _ = shutdown => Vec::new(),
    };

    tracing::info!(indexed_count = indexed_ids.len(), "text-extraction run complete");

    run_theme_stage(&text_pipeline, &config, &indexed_ids).await?;

    let summary = run.metrics.lock().expect("metrics lock poisoned").summary();
    tracing::info!(summary = ?summary, "run_summary");

    Ok(())
}

/// Runs `ExcerptExtractor` (C7) then `ExcerptEnricher`'s two sub-operations
/// (C8) for every configured theme, against the gazettes this run indexed.
async fn run_theme_stage(
    text_pipeline: &TextPipeline,
    config: &GazetteConfig,
    indexed_ids: &[String],
) -> anyhow::Result<()> {
    if indexed_ids.is_empty() {
        return Ok(());
    }

    let themes: Vec<Theme> = {
        let raw = tokio::fs::read_to_string(&config.theme_config_path)
            .await
            .with_context(|| format!("reading theme config at {}", config.theme_config_path))?;
        serde_json::from_str(&raw).context("parsing theme config")?
    };
    if themes.is_empty() {
        return Ok(());
    }

    let metas = text_pipeline
        .source()
        .load_by_checksums(indexed_ids)
        .await?
        .into_iter()
        .map(|gazette| {
            (
                gazette.file_checksum().to_string(),
                IndexedGazetteMeta {
                    file_checksum: gazette.file_checksum().to_string(),
                    territory_id: gazette.territory_id().to_string(),
                    file_path: gazette.file_path.clone(),
                    date: gazette.date(),
                    power: gazette.power,
                },
            )
        })
        .collect::<HashMap<_, _>>();
    let gazette_metas: Vec<IndexedGazetteMeta> = metas.values().cloned().collect();

    let embedder = CandleSentenceEmbedder::load(Path::new(&config.embedding_model_path))
        .context("loading the embedding model")?;

    for theme in &themes {
        text_pipeline
            .search()
            .create_index(&theme.index, excerpt_index_mapping())
            .await?;

        let excerpts = extract_excerpts(text_pipeline.search(), &config.gazette_index, theme, &gazette_metas, |checksum| {
            metas.get(checksum).cloned()
        })
        .await?;
        if excerpts.is_empty() {
            continue;
        }
        write_excerpts(text_pipeline.search(), &theme.index, &excerpts).await?;

        let query_title_rows: Vec<String> = query_titles(&theme.queries);
        let excerpt_ids: Vec<(String, String)> = excerpts
            .iter()
            .map(|e| (e.excerpt_id.clone(), e.excerpt.clone()))
            .collect();
        rerank_excerpts(&embedder, text_pipeline.search(), &theme.index, &query_title_rows, &excerpt_ids)
            .await?;

        let excerpt_id_strings: Vec<String> = excerpts.iter().map(|e| e.excerpt_id.clone()).collect();
        tag_theme_cases(text_pipeline.search(), &theme.index, &theme.entities.cases, &excerpt_id_strings).await?;

        let cnpj_input: Vec<(String, String)> =
            excerpts.iter().map(|e| (e.excerpt_id.clone(), e.excerpt.clone())).collect();
        tag_cnpj(text_pipeline.search(), &theme.index, &cnpj_input).await?;
    }

    Ok(())
}

fn config_error_to_anyhow(err: ConfigError) -> anyhow::Error {
    anyhow::anyhow!(err.to_string())
}
