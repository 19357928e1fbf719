//! `LIMIT`/`OFFSET` clause construction, kept as a literal-interpolated
//! clause rather than a bound parameter. Page size is validated once at
//! construction (`GazetteSource::new`), so by the time this runs the
//! value is a known-safe non-negative integer, never user-controlled
//! input.

pub fn build_pagination_clause(page_size: i64, offset: i64) -> String {
    format!("LIMIT {page_size} OFFSET {offset}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_limit_and_offset() {
        assert_eq!(build_pagination_clause(20, 10), "LIMIT 20 OFFSET 10");
    }
}
