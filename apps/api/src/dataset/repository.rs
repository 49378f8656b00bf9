use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::types::Decimal;
use sqlx::{Column, PgPool, Row, TypeInfo};
use tracing::{debug, info};

use crate::models::{Dataset, FieldValue, Record};

/// Parameters that select which rows make up the dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DatasetQuery {
    /// Only rows created within the last N days. `None` reads the whole table.
    pub recency_days: Option<u32>,
}

#[derive(Debug, Clone)]
pub struct DatasetSettings {
    pub table: String,
    pub timestamp_column: String,
    pub default_recency_days: Option<u32>,
    pub cache_ttl: std::time::Duration,
}

impl Default for DatasetSettings {
    fn default() -> Self {
        Self {
            table: "manifestacoes".to_string(),
            timestamp_column: "data_criacao".to_string(),
            default_recency_days: None,
            cache_ttl: std::time::Duration::from_secs(600),
        }
    }
}

/// Accepts `name` or `schema.name` made of ASCII letters, digits and `_`,
/// not starting with a digit. Table and column names are interpolated into
/// SQL, so anything else is refused at startup.
pub fn is_valid_identifier(ident: &str) -> bool {
    ident.split('.').count() <= 2
        && ident.split('.').all(|part| {
            let mut chars = part.chars();
            matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
                && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        })
}

pub fn build_select(settings: &DatasetSettings, query: &DatasetQuery) -> String {
    let mut sql = format!("SELECT * FROM {}", settings.table);
    if query.recency_days.is_some() {
        sql.push_str(&format!(
            " WHERE {} >= NOW() - make_interval(days => $1)",
            settings.timestamp_column
        ));
    }
    sql.push_str(&format!(" ORDER BY {}", settings.timestamp_column));
    sql
}

/// Reads every row of the configured collection. Read-only.
pub async fn fetch_dataset(
    pool: &PgPool,
    settings: &DatasetSettings,
    query: &DatasetQuery,
) -> Result<Dataset, sqlx::Error> {
    let sql = build_select(settings, query);
    debug!("Fetching dataset: {sql}");

    let mut statement = sqlx::query(&sql);
    if let Some(days) = query.recency_days {
        statement = statement.bind(i32::try_from(days).unwrap_or(i32::MAX));
    }
    let rows = statement.fetch_all(pool).await?;

    let records: Vec<Record> = rows.iter().map(decode_row).collect();
    info!(
        "Fetched {} records from {} (recency_days={:?})",
        records.len(),
        settings.table,
        query.recency_days
    );
    Ok(Dataset::new(records, Utc::now()))
}

fn decode_row(row: &PgRow) -> Record {
    let mut record = Record::new();
    for column in row.columns() {
        let value = decode_cell(row, column.ordinal(), column.type_info().name());
        record.insert(column.name(), value);
    }
    record
}

/// How a Postgres column is decoded, by its type name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CellKind {
    Bool,
    SmallInt,
    Int,
    BigInt,
    Real,
    Double,
    Numeric,
    TimestampTz,
    Timestamp,
    Date,
    Uuid,
    Json,
    Text,
    /// Enums, domains and other types sent as their text label.
    Other,
}

fn cell_kind(type_name: &str) -> CellKind {
    match type_name {
        "BOOL" => CellKind::Bool,
        "INT2" => CellKind::SmallInt,
        "INT4" => CellKind::Int,
        "INT8" => CellKind::BigInt,
        "FLOAT4" => CellKind::Real,
        "FLOAT8" => CellKind::Double,
        "NUMERIC" => CellKind::Numeric,
        "TIMESTAMPTZ" => CellKind::TimestampTz,
        "TIMESTAMP" => CellKind::Timestamp,
        "DATE" => CellKind::Date,
        "UUID" => CellKind::Uuid,
        "JSON" | "JSONB" => CellKind::Json,
        "TEXT" | "VARCHAR" | "BPCHAR" | "CHAR" | "NAME" | "CITEXT" => CellKind::Text,
        _ => CellKind::Other,
    }
}

/// Decimals that fit an `f64` become floats; the rest keep their exact text.
fn numeric_value(value: Option<Decimal>) -> FieldValue {
    match value {
        Some(decimal) => {
            let text = decimal.to_string();
            match text.parse::<f64>() {
                Ok(number) if number.is_finite() => FieldValue::Float(number),
                _ => FieldValue::Text(text),
            }
        }
        None => FieldValue::Null,
    }
}

/// Maps one Postgres cell onto a `FieldValue`. Unreadable cells become `Null`
/// rather than failing the whole fetch.
fn decode_cell(row: &PgRow, index: usize, type_name: &str) -> FieldValue {
    let decoded: Result<FieldValue, sqlx::Error> = match cell_kind(type_name) {
        CellKind::Bool => row.try_get::<Option<bool>, _>(index).map(FieldValue::from),
        CellKind::SmallInt => row
            .try_get::<Option<i16>, _>(index)
            .map(|v| v.map(i64::from).into()),
        CellKind::Int => row
            .try_get::<Option<i32>, _>(index)
            .map(|v| v.map(i64::from).into()),
        CellKind::BigInt => row.try_get::<Option<i64>, _>(index).map(FieldValue::from),
        CellKind::Real => row
            .try_get::<Option<f32>, _>(index)
            .map(|v| v.map(f64::from).into()),
        CellKind::Double => row.try_get::<Option<f64>, _>(index).map(FieldValue::from),
        CellKind::Numeric => row.try_get::<Option<Decimal>, _>(index).map(numeric_value),
        CellKind::TimestampTz => row
            .try_get::<Option<DateTime<Utc>>, _>(index)
            .map(FieldValue::from),
        CellKind::Timestamp => row
            .try_get::<Option<NaiveDateTime>, _>(index)
            .map(|v| v.map(|ts| ts.and_utc()).into()),
        CellKind::Date => row.try_get::<Option<NaiveDate>, _>(index).map(|v| {
            v.and_then(|d| d.and_hms_opt(0, 0, 0))
                .map(|ts| ts.and_utc())
                .into()
        }),
        CellKind::Uuid => row
            .try_get::<Option<uuid::Uuid>, _>(index)
            .map(|v| v.map(|u| u.to_string()).into()),
        CellKind::Json => row
            .try_get::<Option<serde_json::Value>, _>(index)
            .map(|v| v.map(|j| j.to_string()).into()),
        CellKind::Text => row.try_get::<Option<String>, _>(index).map(FieldValue::from),
        CellKind::Other => row
            .try_get_unchecked::<Option<String>, _>(index)
            .map(FieldValue::from),
    };

    decoded.unwrap_or_else(|e| {
        debug!("Column {index} ({type_name}) not decodable: {e}");
        FieldValue::Null
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identifier_validation() {
        assert!(is_valid_identifier("manifestacoes"));
        assert!(is_valid_identifier("ouvidoria.manifestacoes"));
        assert!(is_valid_identifier("_tmp2"));
        assert!(!is_valid_identifier("2024_dados"));
        assert!(!is_valid_identifier("a.b.c"));
        assert!(!is_valid_identifier("manifestacoes; DROP TABLE x"));
        assert!(!is_valid_identifier(""));
        assert!(!is_valid_identifier("schema."));
    }

    #[test]
    fn test_select_without_window_reads_everything() {
        let sql = build_select(&DatasetSettings::default(), &DatasetQuery { recency_days: None });
        assert_eq!(sql, "SELECT * FROM manifestacoes ORDER BY data_criacao");
    }

    #[test]
    fn test_select_with_recency_window_binds_days() {
        let sql = build_select(
            &DatasetSettings::default(),
            &DatasetQuery {
                recency_days: Some(30),
            },
        );
        assert_eq!(
            sql,
            "SELECT * FROM manifestacoes WHERE data_criacao >= NOW() - make_interval(days => $1) ORDER BY data_criacao"
        );
    }

    #[test]
    fn test_cell_kind_by_type_name() {
        assert_eq!(cell_kind("NUMERIC"), CellKind::Numeric);
        assert_eq!(cell_kind("INT4"), CellKind::Int);
        assert_eq!(cell_kind("TIMESTAMPTZ"), CellKind::TimestampTz);
        assert_eq!(cell_kind("JSONB"), CellKind::Json);
        assert_eq!(cell_kind("VARCHAR"), CellKind::Text);
        assert_eq!(cell_kind("status_manifestacao"), CellKind::Other);
        assert_eq!(cell_kind("INTERVAL"), CellKind::Other);
    }

    #[test]
    fn test_numeric_cells_become_floats() {
        use std::str::FromStr;

        let value = numeric_value(Some(Decimal::from_str("1234.50").unwrap()));
        assert_eq!(value, FieldValue::Float(1234.5));
        assert_eq!(numeric_value(None), FieldValue::Null);
    }
}
