//! Case- and accent-insensitive text comparison.
//!
//! Every match against rendered option text goes through [`normalize`], so
//! "JOSÉ García " and "jose garcia" compare equal.

use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Labels that mark a row or option as non-data wherever they appear
/// (search in progress, empty result). Compared against normalized text.
const PLACEHOLDER_PHRASES: &[&str] = &[
    "buscando",
    "searching",
    "sin resultados",
    "no results",
    "no se encontraron",
    "cargando",
];

/// Prompt words that only count as a placeholder when they lead the label,
/// so an option such as "Seguros Buscar SA" stays selectable.
const PLACEHOLDER_PROMPTS: &[&str] = &["seleccione", "select...", "loading", "buscar"];

/// Fold diacritics, trim and lowercase.
#[must_use]
pub fn normalize(s: &str) -> String {
    s.nfkd()
        .filter(|c| !is_combining_mark(*c))
        .collect::<String>()
        .trim()
        .to_lowercase()
}

/// Whether `text` is a placeholder/loading label rather than data.
///
/// Empty text counts as a placeholder.
#[must_use]
pub fn is_placeholder(text: &str) -> bool {
    let norm = normalize(text);
    if norm.is_empty() || PLACEHOLDER_PHRASES.iter().any(|m| norm.contains(m)) {
        return true;
    }
    let label = norm.trim_start_matches(|c: char| !c.is_alphanumeric());
    PLACEHOLDER_PROMPTS.iter().any(|m| leads_with_word(label, m))
}

/// `label` starts with `word` and the word is not the head of a longer one
fn leads_with_word(label: &str, word: &str) -> bool {
    label
        .strip_prefix(word)
        .is_some_and(|rest| !rest.starts_with(char::is_alphanumeric))
}

/// Portion of a compound "label, qualifier" value used as a search query.
///
/// Falls back to the whole value when the head is empty.
#[must_use]
pub fn truncate_query(value: &str) -> &str {
    match value.split_once(',') {
        Some((head, _)) if !head.trim().is_empty() => head.trim(),
        _ => value,
    }
}

/// Normalized equality.
#[must_use]
pub fn same_text(a: &str, b: &str) -> bool {
    normalize(a) == normalize(b)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    mod normalize_tests {
        use super::*;

        #[test]
        fn test_removes_accents() {
            assert_eq!(normalize("café"), "cafe");
            assert_eq!(normalize("niño"), "nino");
            assert_eq!(normalize("Ángel"), "angel");
        }

        #[test]
        fn test_lowercases_and_trims() {
            assert_eq!(normalize("HELLO"), "hello");
            assert_eq!(normalize("\thello\n"), "hello");
        }

        #[test]
        fn test_combined() {
            assert_eq!(normalize("JOSÉ García "), "jose garcia");
            assert_eq!(normalize("  JOSÉ García  "), "jose garcia");
        }

        #[test]
        fn test_empty() {
            assert_eq!(normalize(""), "");
        }
    }

    mod placeholder_tests {
        use super::*;

        #[test]
        fn test_loading_labels() {
            assert!(is_placeholder("Buscando…"));
            assert!(is_placeholder("Sin resultados"));
            assert!(is_placeholder("-- Seleccione --"));
            assert!(is_placeholder("Cargando..."));
            assert!(is_placeholder("   "));
        }

        #[test]
        fn test_data_rows() {
            assert!(!is_placeholder("ACME S.A."));
            assert!(!is_placeholder("Consumidor Final"));
        }

        #[test]
        fn test_prompts_only_lead() {
            assert!(is_placeholder("Buscar..."));
            assert!(is_placeholder("-- Loading --"));
            assert!(is_placeholder("Select..."));
            assert!(!is_placeholder("Seguros Buscar SA"));
            assert!(!is_placeholder("Truck Loading Services"));
            assert!(!is_placeholder("Loadingbay Logistics"));
        }
    }

    mod query_tests {
        use super::*;

        #[test]
        fn test_truncates_at_first_comma() {
            assert_eq!(truncate_query("PEREZ JUAN, 20-1234-5"), "PEREZ JUAN");
        }

        #[test]
        fn test_keeps_value_without_comma() {
            assert_eq!(truncate_query("ACME"), "ACME");
        }

        #[test]
        fn test_keeps_value_with_empty_head() {
            assert_eq!(truncate_query(", tail"), ", tail");
        }
    }

    #[test]
    fn test_same_text() {
        assert!(same_text("Responsable Inscripto", "responsable inscripto "));
        assert!(!same_text("A", "B"));
    }

    proptest! {
        #[test]
        fn prop_normalize_is_idempotent(s in "[A-Za-z0-9ÁÉÍÓÚÜÑáéíóúüñ .,/-]{0,40}") {
            let once = normalize(&s);
            prop_assert_eq!(normalize(&once), once);
        }

        #[test]
        fn prop_placeholder_ignores_case_and_accents(
            marker in prop::sample::select(vec![
                "Buscando", "Sin resultados", "Seleccione", "Cargando", "Buscar", "Loading",
            ]),
            tail in "[a-z ]{0,12}",
        ) {
            let label = format!("{marker} {tail}");
            prop_assert!(is_placeholder(&label));
            prop_assert!(is_placeholder(&label.to_uppercase()));
            let accented = label.replace('a', "á").replace('e', "é");
            prop_assert!(is_placeholder(&accented));
        }

        #[test]
        fn prop_same_text_matches_normalized(s in "[A-Za-zÁÉÍÓÚáéíóúñÑ ]{0,20}") {
            prop_assert!(same_text(&s, &normalize(&s)));
            prop_assert!(same_text(&s.to_uppercase(), &s));
        }
    }
}
