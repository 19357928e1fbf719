//! `GazetteConfig`: environment-variable loading, one `thiserror`-typed
//! error per missing or unparsable required value (category 4, fatal
//! config).

use std::env;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    Missing(String),
    #[error("invalid value for {name}: {detail}")]
    Invalid { name: String, detail: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pipeline {
    GazetteTexts,
    Aggregates,
}

impl std::str::FromStr for Pipeline {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "gazette_texts" => Ok(Self::GazetteTexts),
            "aggregates" => Ok(Self::Aggregates),
            other => Err(ConfigError::Invalid {
                name: "--pipeline".to_string(),
                detail: format!("unrecognized pipeline '{other}'"),
            }),
        }
    }
}

pub struct GazetteConfig {
    pub database_url: String,
    pub opensearch_url: String,
    pub files_endpoint: String,
    pub storage_bucket: String,
    pub storage_endpoint_url: String,
    pub extractor_url: String,
    pub gazette_index: String,
    pub theme_config_path: String,
    pub embedding_model_path: String,
    pub max_gazette_file_bytes: u64,
    pub page_size: i64,
    pub execution_mode: String,
}

impl GazetteConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let opensearch_url = match env::var("OPENSEARCH_URL") {
            Ok(url) => url,
            Err(_) => {
                let host = require("OPENSEARCH_HOST")?;
                let port = require("OPENSEARCH_PORT")?;
                format!("http://{host}:{port}")
            }
        };

        let extractor_url = match env::var("TEXT_EXTRACTOR_URL") {
            Ok(url) => url,
            Err(_) => {
                let host = require("TEXT_EXTRACTOR_HOST")?;
                let port = require("TEXT_EXTRACTOR_PORT")?;
                format!("http://{host}:{port}")
            }
        };

        let max_gazette_file_mb: u64 = parse_env("MAX_GAZETTE_FILE_SIZE_MB", "50")?;

        Ok(Self {
            database_url: require("DATABASE_URL")?,
            opensearch_url,
            files_endpoint: require("QUERIDO_DIARIO_FILES_ENDPOINT")?,
            storage_bucket: require("STORAGE_BUCKET")?,
            storage_endpoint_url: require("STORAGE_ENDPOINT_URL")?,
            extractor_url,
            gazette_index: env::var("GAZETTE_INDEX").unwrap_or_else(|_| "gazettes".to_string()),
            theme_config_path: require("THEME_CONFIG_PATH")?,
            embedding_model_path: require("EMBEDDING_MODEL_PATH")?,
            max_gazette_file_bytes: max_gazette_file_mb * 1024 * 1024,
            page_size: parse_env("GAZETTE_QUERY_PAGE_SIZE", "1000")?,
            execution_mode: env::var("EXECUTION_MODE").unwrap_or_else(|_| "DAILY".to_string()),
        })
    }
}

fn require(name: &str) -> Result<String, ConfigError> {
    env::var(name).map_err(|_| ConfigError::Missing(name.to_string()))
}

fn parse_env<T: std::str::FromStr>(name: &str, default: &str) -> Result<T, ConfigError> {
    let raw = env::var(name).unwrap_or_else(|_| default.to_string());
    raw.parse().map_err(|_| ConfigError::Invalid {
        name: name.to_string(),
        detail: format!("expected a number, got '{raw}'"),
    })
}

/// `DEBUG=1` maps to `RUST_LOG=debug` when `RUST_LOG` is otherwise unset.
pub fn apply_debug_flag() {
    if env::var("RUST_LOG").is_err() && env::var("DEBUG").as_deref() == Ok("1") {
        env::set_var("RUST_LOG", "debug");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pipeline_parses_known_values() {
        assert_eq!("gazette_texts".parse::<Pipeline>().unwrap(), Pipeline::GazetteTexts);
        assert_eq!("aggregates".parse::<Pipeline>().unwrap(), Pipeline::Aggregates);
        assert!("unknown".parse::<Pipeline>().is_err());
    }
}
