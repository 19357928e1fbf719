//! Bespoke REST client for the search engine backing the gazette and
//! themed-excerpt indices (C5), plus the query/mapping builders C7 and C8
//! compose it with.
//!
//! No off-the-shelf OpenSearch/Elasticsearch Rust client covers this
//! shape, so `SearchIndexClient` is built directly on
//! `gazette-reliability::HttpClientService`: a thin wrapper that builds
//! JSON bodies and parses JSON responses over a shared transport.

pub mod client;
pub mod errors;
pub mod mappings;
pub mod queries;

pub use client::SearchIndexClient;
pub use errors::SearchError;
pub use mappings::{excerpt_index_mapping, gazette_index_mapping};
pub use queries::{entity_case_query, theme_proximity_query, CNPJ_PATTERN};
