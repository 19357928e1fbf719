//! The Alagoas municipalities-association segmenter: splits one aggregated
//! publication into per-municipality segments by locating each
//! municipality's header and trimming the boilerplate around it.

use fancy_regex::Regex as FancyRegex;
use gazette_types::{Gazette, PipelineError, Segment};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;

use crate::segmenter::Segmenter;
use crate::territory_table::TerritoryTable;

/// Marks the start of each municipality's section within the aggregated
/// association text. Needs lookahead (`(?!EDUCAÇÃO)`, `(?!VAMOS)`) to skip
/// two documented false-positive headers, hence `fancy-regex` rather than
/// the linear-time `regex` crate.
static MUNICIPALITY_BOUNDARY: Lazy<FancyRegex> = Lazy::new(|| {
    FancyRegex::new(
        r"(?m)(ESTADO DE ALAGOAS\s*\n{1,2}PREFEITURA MUNICIPAL DE )((?:(?!EDUCAÇÃO).)*?\n{0,2}(?:(?!VAMOS).)*?$)(\n\s(?:\s|SECRETARIA|Secretaria))",
    )
    .expect("municipality boundary regex is valid")
});

static TRAILING_NOISE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?s)\s*(/AL.*|GABINETE DO PREFEITO.*|PODER.*|http.*|PORTARIA.*|Extrato.*|ATA DE.*|SECRETARIA.*|Fundo.*|SETOR.*|ERRATA.*|- AL.*|GABINETE.*|EXTRATO.*|SÚMULA.*|RATIFICAÇÃO.*)$",
    )
    .expect("trailing noise regex is valid")
});

const CODIGO_IDENTIFICADOR_MARKER: &str = "Código Identificador";

#[derive(Debug)]
pub struct AlagoasSegmenter;

impl AlagoasSegmenter {
    pub fn new() -> Self {
        Self
    }

    fn association_header(text: &str) -> String {
        text.trim_start()
            .split('\n')
            .next()
            .unwrap_or_default()
            .trim_end()
            .to_string()
    }

    /// Drop every occurrence of `header` after the first.
    fn strip_repeated_header(text: &str, header: &str) -> String {
        if header.is_empty() {
            return text.to_string();
        }
        let mut seen_once = false;
        let mut out = Vec::new();
        for line in text.lines() {
            if line.trim_end() == header {
                if !seen_once {
                    out.push(line);
                    seen_once = true;
                }
            } else {
                out.push(line);
            }
        }
        out.join("\n")
    }

    /// Truncate at the final occurrence of the `Código Identificador`
    /// marker, dropping everything after the end of that line.
    fn truncate_at_final_marker(text: &str) -> String {
        match text.rfind(CODIGO_IDENTIFICADOR_MARKER) {
            Some(start) => {
                let end = text[start..]
                    .find('\n')
                    .map(|offset| start + offset)
                    .unwrap_or(text.len());
                text[..end].to_string()
            }
            None => text.to_string(),
        }
    }

    fn normalize_territory_name(raw: &str) -> String {
        let collapsed = raw.replace('\n', "").trim().to_string();
        let stripped = TRAILING_NOISE.replace(&collapsed, "").trim().to_string();
        match stripped.as_str() {
            "MAJOR IZIDORO" => "MAJOR ISIDORO".to_string(),
            _ => stripped,
        }
    }

    fn split_by_territory(text: &str) -> Result<HashMap<String, (String, String)>, PipelineError> {
        let header = Self::association_header(text);
        let cleaned = Self::strip_repeated_header(text, &header);
        let cleaned = Self::truncate_at_final_marker(&cleaned);

        let matches: Vec<_> = MUNICIPALITY_BOUNDARY
            .captures_iter(&cleaned)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| PipelineError::InvalidInput(format!("boundary regex failed: {e}")))?;

        if matches.is_empty() {
            return Err(PipelineError::InvalidInput(
                "no municipality boundaries detected in association gazette".to_string(),
            ));
        }

        let mut territory_to_text: HashMap<String, (String, String)> = HashMap::new();
        for (idx, capture) in matches.iter().enumerate() {
            let whole = capture.get(0).expect("group 0 always present");
            let raw_name = capture.get(2).map(|m| m.as_str()).unwrap_or_default();
            let normalized_name = Self::normalize_territory_name(raw_name);

            let chunk_end = matches
                .get(idx + 1)
                .map(|next| next.get(0).unwrap().start())
                .unwrap_or(cleaned.len());
            let chunk = &cleaned[whole.start()..chunk_end];

            let entry = territory_to_text
                .entry(normalized_name.clone())
                .or_insert_with(|| (normalized_name.clone(), format!("{header}\n")));
            entry.1.push('\n');
            entry.1.push_str(chunk);
        }

        Ok(territory_to_text)
    }
}

impl Default for AlagoasSegmenter {
    fn default() -> Self {
        Self::new()
    }
}

impl Segmenter for AlagoasSegmenter {
    fn segment(
        &self,
        gazette: &Gazette,
        territories: &TerritoryTable,
    ) -> Result<Vec<Segment>, PipelineError> {
        let source_text = gazette.source_text.as_deref().ok_or_else(|| {
            PipelineError::InvalidInput(
                "gazette has no source_text to segment".to_string(),
            )
        })?;

        let territory_to_text = Self::split_by_territory(source_text)?;

        let mut segments = Vec::with_capacity(territory_to_text.len());
        for (normalized_name, (_, raw_text)) in territory_to_text {
            let territory = territories.resolve(&normalized_name, "AL").ok_or_else(|| {
                PipelineError::InvalidInput(format!(
                    "unresolved municipality slug for name \"{normalized_name}\""
                ))
            })?;

            let text = raw_text.trim().to_string();
            let file_checksum = gazette_types::md5_hex(text.as_bytes());

            segments.push(Segment {
                parent_id: gazette.id,
                date: gazette.date,
                edition_number: gazette.edition_number.clone(),
                is_extra_edition: gazette.is_extra_edition,
                power: gazette.power,
                territory_id: territory.id.clone(),
                scraped_at: gazette.scraped_at,
                created_at: gazette.created_at,
                file_raw_txt: String::new(),
                file_checksum,
                text,
            });
        }

        Ok(segments)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Utc};
    use gazette_types::{Power, Territory};

    fn territory(id: &str, name: &str) -> Territory {
        Territory {
            id: id.to_string(),
            name: name.to_string(),
            state_code: "AL".to_string(),
            state: "Alagoas".to_string(),
        }
    }

    fn gazette_with_text(text: &str) -> Gazette {
        Gazette {
            id: 1,
            file_path: "2700000/2023-01-01/doc.pdf".to_string(),
            file_url: "https://example.org/doc.pdf".to_string(),
            date: NaiveDate::from_ymd_opt(2023, 1, 1).unwrap(),
            edition_number: "1".to_string(),
            is_extra_edition: false,
            power: Power::Executive,
            territory_id: "2700000".to_string(),
            scraped_at: Utc::now(),
            created_at: Utc::now(),
            processed: false,
            source_text: Some(text.to_string()),
            file_raw_txt: None,
            file_checksum: None,
        }
    }

    #[test]
    fn fixes_major_izidoro_typo() {
        assert_eq!(
            AlagoasSegmenter::normalize_territory_name("MAJOR IZIDORO"),
            "MAJOR ISIDORO"
        );
    }

    #[test]
    fn strips_trailing_gabinete_noise() {
        assert_eq!(
            AlagoasSegmenter::normalize_territory_name("MACEIO\nGABINETE DO PREFEITO"),
            "MACEIO"
        );
    }

    #[test]
    fn segments_two_municipality_sections() {
        let text = "ASSOCIACAO DOS MUNICIPIOS ALAGOANOS\n\
ESTADO DE ALAGOAS\nPREFEITURA MUNICIPAL DE MACEIO\n  SECRETARIA\nPortaria 1\nCódigo Identificador: AAA111\n\
ESTADO DE ALAGOAS\nPREFEITURA MUNICIPAL DE ARAPIRACA\n  SECRETARIA\nPortaria 2\nCódigo Identificador: BBB222\n";

        let segmenter = AlagoasSegmenter::new();
        let territories =
            TerritoryTable::new(vec![territory("2704302", "Maceió"), territory("2700805", "Arapiraca")]);

        let gazette = gazette_with_text(text);
        let segments = segmenter.segment(&gazette, &territories).unwrap();

        assert_eq!(segments.len(), 2);
        let ids: Vec<_> = segments.iter().map(|s| s.territory_id.clone()).collect();
        assert!(ids.contains(&"2704302".to_string()));
        assert!(ids.contains(&"2700805".to_string()));
    }

    #[test]
    fn unresolved_slug_is_an_error() {
        let text = "HEADER\n\
ESTADO DE ALAGOAS\nPREFEITURA MUNICIPAL DE CIDADE INEXISTENTE\n  SECRETARIA\nPortaria 1\nCódigo Identificador: AAA111\n";
        let segmenter = AlagoasSegmenter::new();
        let territories = TerritoryTable::new(vec![territory("2704302", "Maceió")]);
        let gazette = gazette_with_text(text);
        let err = segmenter.segment(&gazette, &territories).unwrap_err();
        assert!(matches!(err, PipelineError::InvalidInput(_)));
    }
}
