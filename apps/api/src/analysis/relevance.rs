//! Relevance Filter: narrows the dataset to rows that mention the question.
//!
//! Returns `None` whenever the caller should fall back to the full-dataset
//! digest: empty dataset, a broad question, no row matching any token, or
//! more matching rows than fit in a prompt.

use std::collections::BTreeSet;

use tracing::debug;

use crate::models::{Dataset, Record};

pub const DEFAULT_MAX_SUBSET_RECORDS: usize = 200;
pub const DEFAULT_MAX_DATA_BYTES: usize = 32 * 1024;

/// Tunables for the keyword heuristic. None of these is a correctness contract.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterSettings {
    /// Tokens that mark a question as asking about the whole dataset.
    pub general_terms: Vec<String>,
    pub min_token_len: usize,
    /// Free-text fields searched for query tokens.
    pub scan_fields: Vec<String>,
    /// Larger subsets are replaced by the digest.
    pub max_subset_records: usize,
    /// Upper bound on the serialized subset, checked after CSV rendering.
    pub max_data_bytes: usize,
}

impl Default for FilterSettings {
    fn default() -> Self {
        Self {
            general_terms: to_strings(&[
                "quantos",
                "quantas",
                "quantidade",
                "qual",
                "quais",
                "resumo",
                "resuma",
                "geral",
                "total",
                "totais",
                "lista",
                "listar",
                "todos",
                "todas",
                "how",
                "many",
                "which",
                "summary",
                "overall",
                "list",
            ]),
            min_token_len: 3,
            scan_fields: to_strings(&[
                "descricao",
                "observacoes",
                "endereco",
                "bairro",
                "cidade",
                "categoria",
                "tipo",
            ]),
            max_subset_records: DEFAULT_MAX_SUBSET_RECORDS,
            max_data_bytes: DEFAULT_MAX_DATA_BYTES,
        }
    }
}

fn to_strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// Lowercase alphanumeric tokens of at least `min_len` characters, deduplicated.
pub fn tokenize(query: &str, min_len: usize) -> BTreeSet<String> {
    query
        .to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.chars().count() >= min_len)
        .map(str::to_string)
        .collect()
}

/// Returns the matching rows in dataset order, or `None` to request a digest.
pub fn filter(dataset: &Dataset, query: &str, settings: &FilterSettings) -> Option<Vec<Record>> {
    if dataset.is_empty() {
        return None;
    }

    let tokens = tokenize(query, settings.min_token_len);
    if tokens.is_empty() {
        return None;
    }

    let is_general = settings
        .general_terms
        .iter()
        .any(|term| tokens.contains(&term.to_lowercase()));
    if is_general {
        return None;
    }

    let matches: Vec<Record> = dataset
        .records
        .iter()
        .filter(|record| record_matches(record, &tokens, &settings.scan_fields))
        .cloned()
        .collect();

    if matches.is_empty() {
        return None;
    }
    if matches.len() > settings.max_subset_records {
        debug!(
            "{} rows match, over the limit of {}; using digest",
            matches.len(),
            settings.max_subset_records
        );
        return None;
    }
    Some(matches)
}

fn record_matches(record: &Record, tokens: &BTreeSet<String>, scan_fields: &[String]) -> bool {
    scan_fields.iter().any(|field| {
        record
            .get(field)
            .filter(|value| !value.is_null())
            .map(|value| {
                let haystack = value.to_string().to_lowercase();
                tokens.iter().any(|token| haystack.contains(token.as_str()))
            })
            .unwrap_or(false)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FieldValue;
    use chrono::Utc;

    fn dataset(records: Vec<Record>) -> Dataset {
        Dataset::new(records, Utc::now())
    }

    fn complaint(id: i64, descricao: &str, bairro: &str) -> Record {
        Record::new()
            .with("id", id)
            .with("descricao", descricao)
            .with("bairro", bairro)
            .with("status", "aberta")
    }

    fn sample() -> Dataset {
        dataset(vec![
            complaint(1, "Buraco enorme na Avenida Norte", "Boa Vista"),
            complaint(2, "Colaborações sobre iluminação pública", "Centro"),
            complaint(3, "Lixo acumulado na praça", "Casa Amarela"),
        ])
    }

    #[test]
    fn test_tokenize_lowercases_and_drops_short_tokens() {
        let tokens = tokenize("Buraco na RUA X, perto do nº 12!", 3);
        let expected: BTreeSet<String> = ["buraco", "rua", "perto"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(tokens, expected);
    }

    #[test]
    fn test_tokenize_keeps_accented_words_whole() {
        let tokens = tokenize("Colaborações de iluminação", 3);
        assert!(tokens.contains("colaborações"));
        assert!(tokens.contains("iluminação"));
    }

    #[test]
    fn test_general_question_always_gets_summary() {
        // "colaborações" matches row 2, but "qual"/"total" make it a broad question.
        let result = filter(
            &sample(),
            "Qual o total de colaborações?",
            &FilterSettings::default(),
        );
        assert!(result.is_none());
    }

    #[test]
    fn test_no_match_falls_back_to_summary() {
        let result = filter(&sample(), "incêndio na rua X", &FilterSettings::default());
        assert!(result.is_none());
    }

    #[test]
    fn test_matches_preserve_dataset_order() {
        let data = dataset(vec![
            complaint(1, "lixo na calçada", "Boa Vista"),
            complaint(2, "buraco", "Centro"),
            complaint(3, "Lixo acumulado", "Centro"),
        ]);
        let subset = filter(&data, "lixo", &FilterSettings::default()).unwrap();
        let ids: Vec<_> = subset.iter().map(|r| r.get("id").cloned()).collect();
        assert_eq!(
            ids,
            vec![Some(FieldValue::Integer(1)), Some(FieldValue::Integer(3))]
        );
    }

    #[test]
    fn test_matches_on_location_fields_case_insensitively() {
        let subset = filter(&sample(), "problemas em CASA amarela", &FilterSettings::default())
            .unwrap();
        assert_eq!(subset.len(), 1);
        assert_eq!(subset[0].get("id"), Some(&FieldValue::Integer(3)));
    }

    #[test]
    fn test_unscanned_fields_are_ignored() {
        // "aberta" only appears in `status`, which is not a free-text field.
        assert!(filter(&sample(), "aberta", &FilterSettings::default()).is_none());
    }

    #[test]
    fn test_empty_dataset_returns_none() {
        assert!(filter(&dataset(vec![]), "buraco", &FilterSettings::default()).is_none());
    }

    #[test]
    fn test_vocabulary_is_configurable() {
        let settings = FilterSettings {
            general_terms: vec![],
            ..FilterSettings::default()
        };
        let subset = filter(&sample(), "Qual o total de colaborações?", &settings).unwrap();
        assert_eq!(subset.len(), 1);
    }

    #[test]
    fn test_subset_size_limit_is_inclusive() {
        let rows: Vec<Record> = (0..3)
            .map(|i| complaint(i, "buraco na calçada", "Centro"))
            .collect();
        let data = dataset(rows);

        let at_limit = FilterSettings {
            max_subset_records: 3,
            ..FilterSettings::default()
        };
        assert_eq!(filter(&data, "buraco", &at_limit).map(|s| s.len()), Some(3));

        let below = FilterSettings {
            max_subset_records: 2,
            ..FilterSettings::default()
        };
        assert!(filter(&data, "buraco", &below).is_none());
    }
}
