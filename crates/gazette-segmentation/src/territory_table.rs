//! Read-only territory lookup keyed by slug, built once per run and shared
//! across every segmenter the factory hands out.

use std::collections::HashMap;

use gazette_types::Territory;

use crate::slug::territory_slug;

pub struct TerritoryTable {
    by_slug: HashMap<String, Territory>,
}

impl TerritoryTable {
    pub fn new(territories: Vec<Territory>) -> Self {
        let by_slug = territories
            .into_iter()
            .map(|t| (territory_slug(&t.name, &t.state_code), t))
            .collect();
        Self { by_slug }
    }

    /// Resolve a normalized municipality name against the table. Returns
    /// `None` when the slug is unrecognized, so the caller can fail the
    /// segment with a clear error rather than silently dropping it.
    pub fn resolve(&self, name: &str, state_code: &str) -> Option<&Territory> {
        self.by_slug.get(&territory_slug(name, state_code))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn territory(id: &str, name: &str) -> Territory {
        Territory {
            id: id.to_string(),
            name: name.to_string(),
            state_code: "AL".to_string(),
            state: "Alagoas".to_string(),
        }
    }

    #[test]
    fn resolves_known_slug() {
        let table = TerritoryTable::new(vec![territory("2704302", "Maceió")]);
        let found = table.resolve("Maceió", "AL").unwrap();
        assert_eq!(found.id, "2704302");
    }

    #[test]
    fn unknown_slug_is_none() {
        let table = TerritoryTable::new(vec![territory("2704302", "Maceió")]);
        assert!(table.resolve("Cidade Inexistente", "AL").is_none());
    }
}
