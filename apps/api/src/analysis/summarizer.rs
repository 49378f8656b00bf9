//! Summarizer: bounded textual digest of a whole dataset.
//!
//! Output size depends on the number of distinct categorical values, never on
//! the number of records.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::models::{Dataset, FieldValue};

#[derive(Debug, Clone, PartialEq)]
pub struct SummarySettings {
    pub timestamp_field: String,
    /// Fields broken down by value, in output order.
    pub categorical_fields: Vec<String>,
    /// Per-field cap; remaining values fold into one "outros" line.
    pub max_values_per_field: usize,
}

impl Default for SummarySettings {
    fn default() -> Self {
        Self {
            timestamp_field: "data_criacao".to_string(),
            categorical_fields: [
                "tipo",
                "categoria",
                "status",
                "cidade",
                "bairro",
                "anonimo",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            max_values_per_field: 20,
        }
    }
}

pub fn summarize(dataset: &Dataset, settings: &SummarySettings) -> String {
    let mut sections = vec![format!("Total de registros: {}", dataset.len())];

    if let Some((first, last)) = timestamp_range(dataset, &settings.timestamp_field) {
        sections.push(format!(
            "Período: de {} até {}",
            first.format("%Y-%m-%d %H:%M"),
            last.format("%Y-%m-%d %H:%M")
        ));
    }

    for field in &settings.categorical_fields {
        if let Some(section) = breakdown_section(dataset, field, settings.max_values_per_field) {
            sections.push(section);
        }
    }

    sections.join("\n\n")
}

/// Min/max over the timestamp field. `None` when the field is missing or no
/// value in it can be read as a timestamp.
fn timestamp_range(dataset: &Dataset, field: &str) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
    dataset
        .records
        .iter()
        .filter_map(|r| r.get(field))
        .filter_map(FieldValue::as_timestamp)
        .fold(None, |range, ts| match range {
            None => Some((ts, ts)),
            Some((lo, hi)) => Some((lo.min(ts), hi.max(ts))),
        })
}

/// Value counts for one field, descending by count, ties in first-seen order.
pub fn frequencies(dataset: &Dataset, field: &str) -> Vec<(String, usize)> {
    let mut order: Vec<(String, usize)> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for value in dataset.records.iter().filter_map(|r| r.get(field)) {
        if value.is_null() {
            continue;
        }
        let key = value.to_string();
        match index.get(&key) {
            Some(&i) => order[i].1 += 1,
            None => {
                index.insert(key.clone(), order.len());
                order.push((key, 1));
            }
        }
    }

    // Stable sort keeps first-seen order among equal counts.
    order.sort_by(|a, b| b.1.cmp(&a.1));
    order
}

fn breakdown_section(dataset: &Dataset, field: &str, cap: usize) -> Option<String> {
    let counts = frequencies(dataset, field);
    if counts.is_empty() {
        return None;
    }

    let mut lines = vec![format!("{field}:")];
    for (value, count) in counts.iter().take(cap) {
        lines.push(format!("- {value}: {count}"));
    }
    if counts.len() > cap {
        let rest: usize = counts[cap..].iter().map(|(_, c)| c).sum();
        lines.push(format!(
            "- outros ({} valores): {rest}",
            counts.len() - cap
        ));
    }
    Some(lines.join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Record;
    use chrono::TimeZone;

    fn section<'a>(digest: &'a str, header: &str) -> Option<Vec<&'a str>> {
        digest
            .split("\n\n")
            .find(|s| s.starts_with(header))
            .map(|s| s.lines().skip(1).collect())
    }

    #[test]
    fn test_breakdown_lines_bounded_by_distinct_values() {
        let statuses = ["aberta", "em_analise", "respondida", "encerrada", "arquivada"];
        let records = (0..10_000)
            .map(|i| Record::new().with("status", statuses[i % statuses.len()]))
            .collect();
        let dataset = Dataset::new(records, Utc::now());

        let digest = summarize(&dataset, &SummarySettings::default());

        let lines = section(&digest, "status:").unwrap();
        assert_eq!(lines.len(), 5);
        assert!(digest.starts_with("Total de registros: 10000"));
    }

    #[test]
    fn test_breakdown_orders_by_count_then_first_seen() {
        let records = ["b", "a", "c", "a", "c", "d"]
            .iter()
            .map(|t| Record::new().with("tipo", *t))
            .collect();
        let dataset = Dataset::new(records, Utc::now());

        let counts = frequencies(&dataset, "tipo");
        let order: Vec<&str> = counts.iter().map(|(v, _)| v.as_str()).collect();
        assert_eq!(order, vec!["a", "c", "b", "d"]);
    }

    #[test]
    fn test_timestamp_range_section() {
        let records = vec![
            Record::new().with("data_criacao", Utc.with_ymd_and_hms(2024, 5, 2, 9, 0, 0).unwrap()),
            Record::new().with("data_criacao", "2024-01-15"),
            Record::new().with("data_criacao", Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 0).unwrap()),
        ];
        let digest = summarize(&Dataset::new(records, Utc::now()), &SummarySettings::default());
        assert!(
            digest.contains("Período: de 2024-01-15 00:00 até 2024-05-02 09:00"),
            "{digest}"
        );
    }

    #[test]
    fn test_unreadable_timestamps_omit_section_only() {
        let records = vec![
            Record::new().with("data_criacao", "ontem").with("tipo", "buraco"),
            Record::new().with("data_criacao", 42_i64).with("tipo", "buraco"),
        ];
        let digest = summarize(&Dataset::new(records, Utc::now()), &SummarySettings::default());
        assert!(!digest.contains("Período"));
        assert_eq!(section(&digest, "tipo:").unwrap(), vec!["- buraco: 2"]);
    }

    #[test]
    fn test_empty_dataset_has_only_count() {
        let digest = summarize(&Dataset::new(vec![], Utc::now()), &SummarySettings::default());
        assert_eq!(digest, "Total de registros: 0");
    }

    #[test]
    fn test_cap_folds_remaining_values() {
        let records = (0..30)
            .map(|i| Record::new().with("bairro", format!("bairro-{i}")))
            .collect();
        let settings = SummarySettings {
            max_values_per_field: 3,
            ..SummarySettings::default()
        };
        let digest = summarize(&Dataset::new(records, Utc::now()), &settings);
        let lines = section(&digest, "bairro:").unwrap();
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[3], "- outros (27 valores): 27");
    }

    #[test]
    fn test_null_values_not_counted() {
        let records = vec![
            Record::new().with("cidade", "Recife"),
            Record::new().with("cidade", None::<String>),
        ];
        let counts = frequencies(&Dataset::new(records, Utc::now()), "cidade");
        assert_eq!(counts, vec![("Recife".to_string(), 1)]);
    }
}
