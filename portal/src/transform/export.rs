//! Flat result rows to delimited text.
//!
//! The serializer quotes exactly the cells a CSV reader could misread, so
//! reading the output back yields the original cell strings.

use chrono::DateTime;
use serde_json::Value;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::ExportError;
use crate::models::{columns_of, Record, ScoringResponse};

/// Date-times are shown the way an en-US browser locale prints them.
const LOCALE_DATETIME_FORMAT: &str = "%-m/%-d/%Y, %-I:%M:%S %p";

// =============================================================================
// Flattening
// =============================================================================

/// Text of one cell.
///
/// Null becomes empty, RFC 3339 / RFC 2822 date-times use the locale
/// format, nested values become compact JSON.
pub fn render_cell(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => render_text(s),
        Value::Array(_) | Value::Object(_) => value.to_string(),
    }
}

fn render_text(s: &str) -> String {
    let parsed = DateTime::parse_from_rfc3339(s).or_else(|_| DateTime::parse_from_rfc2822(s));
    match parsed {
        Ok(datetime) => datetime.format(LOCALE_DATETIME_FORMAT).to_string(),
        Err(_) => s.to_string(),
    }
}

/// Header row followed by one text row per record.
///
/// Cells follow `columns`; a column missing from a record is empty.
pub fn flatten_for_export(columns: &[String], rows: &[Record]) -> Vec<Vec<String>> {
    let mut table = Vec::with_capacity(rows.len() + 1);
    table.push(columns.to_vec());
    for row in rows {
        table.push(
            columns
                .iter()
                .map(|column| row.get(column).map(render_cell).unwrap_or_default())
                .collect(),
        );
    }
    table
}

/// Export columns: the keys of the first row, then any key a later row
/// adds, in first-seen order.
pub fn result_columns(rows: &[Record]) -> Vec<String> {
    let mut columns = columns_of(rows);
    for row in rows.iter().skip(1) {
        for key in row.keys() {
            if !columns.contains(key) {
                columns.push(key.clone());
            }
        }
    }
    columns
}

// =============================================================================
// Serialization
// =============================================================================

/// Comma-separated text, one newline-terminated line per row.
///
/// Every row keeps its own line. A row with no cells, or with one empty
/// cell, is written as `""` and reads back as one empty cell.
pub fn serialize_delimited(table: &[Vec<String>]) -> String {
    let mut out = String::new();
    for row in table {
        if row.is_empty() || matches!(row.as_slice(), [only] if only.is_empty()) {
            // a bare empty line is skipped by readers
            out.push_str("\"\"\n");
            continue;
        }
        for (i, cell) in row.iter().enumerate() {
            if i > 0 {
                out.push(',');
            }
            push_cell(&mut out, cell);
        }
        out.push('\n');
    }
    out
}

fn push_cell(out: &mut String, cell: &str) {
    if cell.contains(|c: char| matches!(c, ',' | '"' | '\n' | '\r')) {
        out.push('"');
        out.push_str(&cell.replace('"', "\"\""));
        out.push('"');
    } else {
        out.push_str(cell);
    }
}

// =============================================================================
// Named exports
// =============================================================================

/// The downloads offered after scoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportKind {
    /// Per-company scores (`companies`).
    TemperatureScores,
    /// Full score dump (`scores`), empty when the backend sent none.
    DataDump,
}

impl ExportKind {
    pub fn file_name(&self) -> &'static str {
        match self {
            Self::TemperatureScores => "temperature_scores.csv",
            Self::DataDump => "data_dump.csv",
        }
    }

    pub fn rows<'a>(&self, response: &'a ScoringResponse) -> &'a [Record] {
        match self {
            Self::TemperatureScores => &response.companies,
            Self::DataDump => response.scores.as_deref().unwrap_or(&[]),
        }
    }
}

impl fmt::Display for ExportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.file_name())
    }
}

impl FromStr for ExportKind {
    type Err = ExportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().trim_end_matches(".csv").replace('-', "_").as_str() {
            "temperature_scores" => Ok(Self::TemperatureScores),
            "data_dump" => Ok(Self::DataDump),
            _ => Err(ExportError::UnknownKind(s.to_string())),
        }
    }
}

/// Header plus rows over [`result_columns`]. No rows, or rows without a
/// single key, give an empty table.
pub fn rows_table(rows: &[Record]) -> Vec<Vec<String>> {
    let columns = result_columns(rows);
    if columns.is_empty() {
        return Vec::new();
    }
    flatten_for_export(&columns, rows)
}

/// Table for one export.
pub fn export_table(response: &ScoringResponse, kind: ExportKind) -> Vec<Vec<String>> {
    rows_table(kind.rows(response))
}

/// CSV text for one export.
pub fn export_csv(response: &ScoringResponse, kind: ExportKind) -> String {
    serialize_delimited(&export_table(response, kind))
}

/// Write one export into `dir` under its file name.
pub fn write_export(dir: &Path, kind: ExportKind, response: &ScoringResponse) -> Result<PathBuf, ExportError> {
    let path = dir.join(kind.file_name());
    std::fs::write(&path, export_csv(response, kind))?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    fn record(value: Value) -> Record {
        value.as_object().unwrap().clone()
    }

    fn read_back(text: &str) -> Vec<Vec<String>> {
        csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(text.as_bytes())
            .records()
            .map(|r| r.unwrap().iter().map(String::from).collect())
            .collect()
    }

    fn table(rows: &[&[&str]]) -> Vec<Vec<String>> {
        rows.iter()
            .map(|r| r.iter().map(|c| c.to_string()).collect())
            .collect()
    }

    #[test]
    fn test_null_renders_empty() {
        let columns = vec!["a".to_string(), "b".to_string()];
        let flat = flatten_for_export(&columns, &[record(json!({"a": null, "b": "x"}))]);
        assert_eq!(flat, table(&[&["a", "b"], &["", "x"]]));
    }

    #[test]
    fn test_missing_column_renders_empty() {
        let columns = vec!["a".to_string(), "z".to_string()];
        let flat = flatten_for_export(&columns, &[record(json!({"a": 1}))]);
        assert_eq!(flat[1], vec!["1", ""]);
    }

    #[test]
    fn test_natural_text_of_values() {
        assert_eq!(render_cell(&json!(2.5)), "2.5");
        assert_eq!(render_cell(&json!(42)), "42");
        assert_eq!(render_cell(&json!(true)), "true");
        assert_eq!(render_cell(&json!("plain")), "plain");
        assert_eq!(render_cell(&json!("2021-03-04")), "2021-03-04");
        assert_eq!(render_cell(&json!([1, 2])), "[1,2]");
    }

    #[test]
    fn test_datetimes_use_locale_format() {
        assert_eq!(render_cell(&json!("2021-03-04T15:06:07Z")), "3/4/2021, 3:06:07 PM");
        assert_eq!(
            render_cell(&json!("Tue, 01 Jan 2019 00:00:00 GMT")),
            "1/1/2019, 12:00:00 AM"
        );
    }

    #[test]
    fn test_serialize_quotes_only_when_needed() {
        let text = serialize_delimited(&table(&[
            &["name", "note"],
            &["Acme, Inc.", "said \"hi\""],
            &["plain", "two\nlines"],
        ]));
        assert_eq!(
            text,
            "name,note\n\"Acme, Inc.\",\"said \"\"hi\"\"\"\nplain,\"two\nlines\"\n"
        );
    }

    #[test]
    fn test_serialize_empty_table() {
        assert_eq!(serialize_delimited(&[]), "");
    }

    #[test]
    fn test_lone_empty_cell_survives() {
        let original = table(&[&["h"], &[""], &["x"]]);
        assert_eq!(read_back(&serialize_delimited(&original)), original);
    }

    #[test]
    fn test_row_without_cells_keeps_its_line() {
        let original = vec![vec!["h".to_string()], Vec::new(), vec!["x".to_string()]];
        let text = serialize_delimited(&original);
        assert_eq!(text, "h\n\"\"\nx\n");
        assert_eq!(read_back(&text), table(&[&["h"], &[""], &["x"]]));
    }

    #[test]
    fn test_empty_first_record_keeps_later_columns() {
        let rows = vec![
            record(json!({})),
            record(json!({"company_id": "A", "score": 2.5})),
            record(json!({"company_id": "B", "note": "late"})),
        ];
        assert_eq!(result_columns(&rows), vec!["company_id", "score", "note"]);
        assert_eq!(
            serialize_delimited(&rows_table(&rows)),
            "company_id,score,note\n,,\nA,2.5,\nB,,late\n"
        );
        assert!(rows_table(&[record(json!({})), record(json!({}))]).is_empty());
    }

    #[test]
    fn test_exports_by_kind() {
        let response = ScoringResponse {
            companies: vec![
                record(json!({"company_id": "A", "temperature_score": 2.1})),
                record(json!({"company_id": "B", "temperature_score": null})),
            ],
            ..ScoringResponse::empty()
        };

        assert_eq!(
            export_csv(&response, ExportKind::TemperatureScores),
            "company_id,temperature_score\nA,2.1\nB,\n"
        );
        assert_eq!(export_csv(&response, ExportKind::DataDump), "");
    }

    #[test]
    fn test_write_export() {
        let dir = tempfile::tempdir().unwrap();
        let response = ScoringResponse {
            scores: Some(vec![record(json!({"time_frame": "short", "score": 3.2}))]),
            ..ScoringResponse::empty()
        };

        let path = write_export(dir.path(), ExportKind::DataDump, &response).unwrap();
        assert!(path.ends_with("data_dump.csv"));
        let written = std::fs::read_to_string(path).unwrap();
        assert_eq!(written, "time_frame,score\nshort,3.2\n");
    }

    #[test]
    fn test_export_kind_names() {
        assert_eq!("temperature-scores".parse::<ExportKind>().unwrap(), ExportKind::TemperatureScores);
        assert_eq!("data_dump.csv".parse::<ExportKind>().unwrap(), ExportKind::DataDump);
        assert!("scores".parse::<ExportKind>().is_err());
    }

    proptest! {
        #[test]
        fn prop_serialized_table_reads_back(
            rows in prop::collection::vec(
                prop::collection::vec("[ab ,\"\r\n]{0,6}", 0..5),
                1..6,
            )
        ) {
            let text = serialize_delimited(&rows);
            prop_assert!(text.ends_with('\n'));
            // a row without cells comes back as one empty cell
            let expected: Vec<Vec<String>> = rows
                .iter()
                .map(|row| if row.is_empty() { vec![String::new()] } else { row.clone() })
                .collect();
            prop_assert_eq!(read_back(&text), expected);
        }
    }
}
