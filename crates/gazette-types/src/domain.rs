//! Core domain model: gazettes, territories, segments, themes and excerpts.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Publisher power that issued a gazette edition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Power {
    Executive,
    Legislative,
    ExecutiveLegislative,
}

/// Static, read-only lookup of a municipality (or municipality association).
///
/// Codes ending in `00000` denote an association of municipalities rather
/// than a single municipality; see `Gazette::is_association`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Territory {
    pub id: String,
    pub name: String,
    pub state_code: String,
    pub state: String,
}

/// Which rows `GazetteSource::iterate` should select.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionMode {
    /// Rows scraped within the last 24 hours.
    Daily,
    /// Every row, joined with its territory.
    All,
    /// Rows whose `processed` flag is false.
    Unprocessed,
}

impl std::str::FromStr for SelectionMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "DAILY" => Ok(Self::Daily),
            "ALL" => Ok(Self::All),
            "UNPROCESSED" => Ok(Self::Unprocessed),
            other => Err(format!("unrecognized execution mode: {other}")),
        }
    }
}

/// A gazette row as read from the relational store, before and after
/// extraction. Identified by `(id, file_checksum)` once extracted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Gazette {
    pub id: i64,
    pub file_path: String,
    pub file_url: String,
    pub date: NaiveDate,
    pub edition_number: String,
    pub is_extra_edition: bool,
    pub power: Power,
    pub territory_id: String,
    pub scraped_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub processed: bool,

    /// Populated once extraction has run.
    pub source_text: Option<String>,
    /// Public URL of the uploaded text artifact.
    pub file_raw_txt: Option<String>,
    /// md5 of `source_text`, once computed.
    pub file_checksum: Option<String>,
}

impl Gazette {
    /// `true` when this gazette's territory code denotes an association of
    /// municipalities (the five-zero convention).
    pub fn is_association(&self) -> bool {
        self.territory_id.ends_with("00000")
    }
}

/// A per-municipality slice of an aggregated (association) gazette.
/// Shares the parent gazette's metadata except `territory_id`,
/// `file_raw_txt` and `file_checksum`, which are recomputed for the slice.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Segment {
    pub parent_id: i64,
    pub date: NaiveDate,
    pub edition_number: String,
    pub is_extra_edition: bool,
    pub power: Power,
    pub territory_id: String,
    pub scraped_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,

    pub text: String,
    pub file_raw_txt: String,
    pub file_checksum: String,
}

/// Capability shared by `Gazette` and `Segment`: the shape indexing and
/// upload code actually needs, so that those code paths are generic over
/// the trait rather than over a loosely-typed record.
pub trait IndexableDocument {
    fn territory_id(&self) -> &str;
    fn file_checksum(&self) -> &str;
    fn date(&self) -> NaiveDate;
    fn source_text(&self) -> &str;
    fn storage_path(&self) -> String;
}

impl IndexableDocument for Gazette {
    fn territory_id(&self) -> &str {
        &self.territory_id
    }

    fn file_checksum(&self) -> &str {
        self.file_checksum
            .as_deref()
            .expect("file_checksum must be set before a gazette is indexed")
    }

    fn date(&self) -> NaiveDate {
        self.date
    }

    fn source_text(&self) -> &str {
        self.source_text
            .as_deref()
            .expect("source_text must be set before a gazette is indexed")
    }

    fn storage_path(&self) -> String {
        storage_txt_path(&self.file_path)
    }
}

impl IndexableDocument for Segment {
    fn territory_id(&self) -> &str {
        &self.territory_id
    }

    fn file_checksum(&self) -> &str {
        &self.file_checksum
    }

    fn date(&self) -> NaiveDate {
        self.date
    }

    fn source_text(&self) -> &str {
        &self.text
    }

    fn storage_path(&self) -> String {
        format!(
            "{}/{}/{}.txt",
            self.territory_id,
            self.date.format("%Y-%m-%d"),
            self.file_checksum
        )
    }
}

/// `dirname(file_path)/basename(file_path).txt`.
pub fn storage_txt_path(file_path: &str) -> String {
    let path = std::path::Path::new(file_path);
    let dir = path.parent().map(|p| p.to_string_lossy().to_string());
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| file_path.to_string());
    match dir.filter(|d| !d.is_empty()) {
        Some(dir) => format!("{dir}/{stem}.txt"),
        None => format!("{stem}.txt"),
    }
}

/// A named bundle of proximity queries and entity cases. Deserialized from
/// the theme-configuration file the out-of-scope config loader supplies.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Theme {
    pub index: String,
    pub queries: Vec<ThemeQuery>,
    pub entities: ThemeEntities,
    #[serde(default)]
    pub stopwords: Vec<String>,
}

/// A single proximity query. `term_sets[macro][group][term]` combines as
/// macro: OR, group: span-near slop 20, term: OR of synonyms, each term
/// possibly multi-word.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThemeQuery {
    pub title: String,
    pub term_sets: Vec<Vec<Vec<String>>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThemeEntities {
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default)]
    pub cases: Vec<ThemeEntityCase>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThemeEntityCase {
    pub title: String,
    pub category: String,
    pub values: Vec<String>,
}

/// A derived, themed document produced by `ExcerptExtractor` and mutated in
/// place by `ExcerptEnricher`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Excerpt {
    pub excerpt_id: String,
    pub excerpt: String,
    pub excerpt_subthemes: Vec<String>,
    #[serde(default)]
    pub excerpt_entities: Vec<String>,
    pub excerpt_embedding_score: Option<f32>,
    pub excerpt_tfidf_score: Option<f32>,

    pub source_territory_id: String,
    pub source_file_checksum: String,
    pub source_file_path: String,
    pub source_date: NaiveDate,
    pub source_power: Power,
}

impl Excerpt {
    /// `excerpt_id = "{gazette_file_checksum}_{md5(fragment)}"`.
    pub fn derive_id(gazette_file_checksum: &str, fragment: &str) -> String {
        format!("{gazette_file_checksum}_{}", md5_hex(fragment.as_bytes()))
    }
}

/// md5 hex digest, used for `file_checksum` and `excerpt_id` derivation
/// (the original system hashes with md5; this pipeline's checksum format
/// must match so that ids stay stable across reprocessing).
pub fn md5_hex(bytes: &[u8]) -> String {
    use md5::{Digest, Md5};
    let mut hasher = Md5::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}
