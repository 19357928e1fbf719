//! Per-aggregate-publisher gazette segmentation.
//!
//! `Segmenter` is the capability one implementation per aggregated-publisher
//! territory satisfies; `SegmenterFactory` memoizes one instance per
//! territory per run; `AlagoasSegmenter` implements the boundary grammar and
//! name normalizer for the Alagoas municipalities association.

pub mod alagoas;
pub mod factory;
pub mod segmenter;
pub mod slug;
pub mod territory_table;

pub use alagoas::AlagoasSegmenter;
pub use factory::SegmenterFactory;
pub use segmenter::Segmenter;
pub use slug::territory_slug;
pub use territory_table::TerritoryTable;
