//! Territory-name slugification, grounded on the original's
//! `tasks.utils.get_territory_slug` (accent-stripped, hyphenated,
//! `(name, state_code)` pair).

use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// `slugify("São Miguel dos Campos", "AL") == "sao-miguel-dos-campos-al"`.
pub fn territory_slug(name: &str, state_code: &str) -> String {
    let decomposed: String = name.nfd().filter(|c| !is_combining_mark(*c)).collect();

    let mut slug = String::with_capacity(decomposed.len());
    let mut pending_dash = false;
    for ch in decomposed.chars() {
        if ch.is_ascii_alphanumeric() {
            slug.push(ch.to_ascii_lowercase());
            pending_dash = false;
        } else if !slug.is_empty() && !pending_dash {
            slug.push('-');
            pending_dash = true;
        }
    }
    while slug.ends_with('-') {
        slug.pop();
    }

    format!("{slug}-{}", state_code.to_ascii_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_accents_and_lowercases() {
        assert_eq!(territory_slug("São Miguel dos Campos", "AL"), "sao-miguel-dos-campos-al");
    }

    #[test]
    fn collapses_punctuation_to_single_dash() {
        assert_eq!(territory_slug("Major Isidoro", "AL"), "major-isidoro-al");
    }

    #[test]
    fn trims_trailing_dashes() {
        assert_eq!(territory_slug("Coité do Nóia - ", "AL"), "coite-do-noia-al");
    }
}
