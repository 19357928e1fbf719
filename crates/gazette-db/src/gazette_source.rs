//! `GazetteSource`: paginated read access to the `gazettes` table plus the
//! static `territories` lookup. Pagination is a literal `LIMIT`/`OFFSET`
//! interpolation rather than bound parameters, since the values only ever
//! come from a validated page size and a loop counter this module owns.

use async_stream::try_stream;
use chrono::{DateTime, NaiveDate, Utc};
use futures::Stream;
use gazette_types::{Gazette, PipelineError, Power, SelectionMode, Territory};
use sqlx::{postgres::PgRow, PgPool, Row};

use crate::errors::{fatal_config, transient};
use crate::pagination::build_pagination_clause;

/// Paginated, mode-scoped access to the `gazettes` table.
#[derive(Debug)]
pub struct GazetteSource {
    pool: PgPool,
    page_size: i64,
}

impl GazetteSource {
    pub fn new(pool: PgPool, page_size: i64) -> Result<Self, PipelineError> {
        if page_size <= 0 {
            return Err(PipelineError::FatalConfig(format!(
                "page size must be positive, got {page_size}"
            )));
        }
        Ok(Self { pool, page_size })
    }

    fn where_clause(mode: SelectionMode) -> &'static str {
        match mode {
            SelectionMode::Daily => "WHERE g.scraped_at >= now() - interval '1 day'",
            SelectionMode::All => "",
            SelectionMode::Unprocessed => "WHERE g.processed = false",
        }
    }

    /// Drains `mode`'s selection one page at a time, yielding gazettes one
    /// by one. Stops as soon as a page comes back shorter than
    /// `page_size`, so the final partial page ends iteration without an
    /// extra round trip.
    pub fn iterate(
        &self,
        mode: SelectionMode,
    ) -> impl Stream<Item = Result<Gazette, PipelineError>> + '_ {
        try_stream! {
            let mut offset: i64 = 0;
            loop {
                let clause = build_pagination_clause(self.page_size, offset);
                let sql = format!(
                    "SELECT g.id, g.file_path, g.file_url, g.date, g.edition_number, \
                     g.is_extra_edition, g.power, g.territory_id, g.scraped_at, \
                     g.created_at, g.processed, g.source_text, g.file_raw_txt, \
                     g.file_checksum \
                     FROM gazettes g {clause2} ORDER BY g.id ASC {clause}",
                    clause2 = Self::where_clause(mode),
                );

                let rows = sqlx::query(&sql)
                    .fetch_all(&self.pool)
                    .await
                    .map_err(transient)?;

                let page_len = rows.len();
                for row in rows {
                    yield row_to_gazette(&row).map_err(transient)?;
                }

                if (page_len as i64) < self.page_size {
                    break;
                }
                offset += self.page_size;
            }
        }
    }

    /// Marks a gazette as processed once its segments/excerpts have been
    /// durably written. Bound parameters here, unlike pagination — this
    /// identifies a single row by its business key, not an arbitrary
    /// page window.
    pub async fn mark_processed(&self, id: i64, file_checksum: &str) -> Result<(), PipelineError> {
        sqlx::query("UPDATE gazettes SET processed = true WHERE id = $1 AND file_checksum = $2")
            .bind(id)
            .bind(file_checksum)
            .execute(&self.pool)
            .await
            .map_err(transient)?;
        Ok(())
    }

    /// Loads the gazettes named by `checksums`, for resolving a search
    /// hit's document id back to the metadata `ExcerptExtractor` stamps
    /// onto each excerpt. Bound parameters, unlike `iterate` — an
    /// arbitrary-sized id set from a caller, not a page window this
    /// module owns.
    pub async fn load_by_checksums(&self, checksums: &[String]) -> Result<Vec<Gazette>, PipelineError> {
        if checksums.is_empty() {
            return Ok(Vec::new());
        }

        let rows = sqlx::query(
            "SELECT g.id, g.file_path, g.file_url, g.date, g.edition_number, \
             g.is_extra_edition, g.power, g.territory_id, g.scraped_at, \
             g.created_at, g.processed, g.source_text, g.file_raw_txt, \
             g.file_checksum \
             FROM gazettes g WHERE g.file_checksum = ANY($1)",
        )
        .bind(checksums)
        .fetch_all(&self.pool)
        .await
        .map_err(transient)?;

        rows.iter().map(|row| row_to_gazette(row).map_err(transient)).collect()
    }

    /// Loads the full territory table once per run.
    pub async fn load_territories(&self) -> Result<Vec<Territory>, PipelineError> {
        let rows = sqlx::query("SELECT id, name, state_code, state FROM territories")
            .fetch_all(&self.pool)
            .await
            .map_err(|err| fatal_config("loading territories", err))?;

        rows.iter()
            .map(|row| {
                Ok(Territory {
                    id: row.try_get("id").map_err(transient)?,
                    name: row.try_get("name").map_err(transient)?,
                    state_code: row.try_get("state_code").map_err(transient)?,
                    state: row.try_get("state").map_err(transient)?,
                })
            })
            .collect()
    }
}

fn row_to_gazette(row: &PgRow) -> Result<Gazette, sqlx::Error> {
    let power_text: String = row.try_get("power")?;
    Ok(Gazette {
        id: row.try_get("id")?,
        file_path: row.try_get("file_path")?,
        file_url: row.try_get("file_url")?,
        date: row.try_get::<NaiveDate, _>("date")?,
        edition_number: row.try_get("edition_number")?,
        is_extra_edition: row.try_get("is_extra_edition")?,
        power: parse_power(&power_text),
        territory_id: row.try_get("territory_id")?,
        scraped_at: row.try_get::<DateTime<Utc>, _>("scraped_at")?,
        created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
        processed: row.try_get("processed")?,
        source_text: row.try_get("source_text")?,
        file_raw_txt: row.try_get("file_raw_txt")?,
        file_checksum: row.try_get("file_checksum")?,
    })
}

/// The `power` column stores the same snake_case text `Power`'s `serde`
/// impl produces, so this is a direct literal match rather than a generic
/// deserialize round trip.
fn parse_power(text: &str) -> Power {
    match text {
        "executive" => Power::Executive,
        "legislative" => Power::Legislative,
        _ => Power::ExecutiveLegislative,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn rejects_non_positive_page_size() {
        // `PgPool` has no synchronous constructor we can call without a
        // live connection; `connect_lazy` defers the actual connection
        // until first use, so this only exercises the validation path.
        let pool = PgPool::connect_lazy("postgres://localhost/gazette").unwrap();
        let err = GazetteSource::new(pool, 0).unwrap_err();
        assert!(matches!(err, PipelineError::FatalConfig(_)));
    }

    #[test]
    fn where_clause_varies_by_mode() {
        assert!(GazetteSource::where_clause(SelectionMode::Daily).contains("scraped_at"));
        assert_eq!(GazetteSource::where_clause(SelectionMode::All), "");
        assert!(GazetteSource::where_clause(SelectionMode::Unprocessed).contains("processed"));
    }

    #[tokio::test]
    async fn empty_checksum_list_short_circuits() {
        let pool = PgPool::connect_lazy("postgres://localhost/gazette").unwrap();
        let source = GazetteSource::new(pool, 100).unwrap();
        let result = source.load_by_checksums(&[]).await.unwrap();
        assert!(result.is_empty());
    }

    #[test]
    fn parses_known_power_values() {
        assert_eq!(parse_power("executive"), Power::Executive);
        assert_eq!(parse_power("legislative"), Power::Legislative);
        assert_eq!(parse_power("executive_legislative"), Power::ExecutiveLegislative);
    }
}
