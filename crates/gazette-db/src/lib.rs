//! Relational storage layer: `GazetteSource` (C1) provides paginated,
//! mode-scoped access to the `gazettes` table plus the static territory
//! lookup. Pagination is a literal-interpolated `LIMIT`/`OFFSET` clause
//! rather than a bound parameter — see `pagination`.

pub mod errors;
pub mod gazette_source;
pub mod pagination;

pub use gazette_source::GazetteSource;
