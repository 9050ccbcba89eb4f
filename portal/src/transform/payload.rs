//! Outbound payload: rename mapped columns and attach the scoring settings.
//!
//! Purely structural. Values are copied as they are; the backend is the
//! only validator of types, ranges and required fields.

use crate::mapping::Mapping;
use crate::models::{Record, ScoringRequest, ScoringSettings};

/// Rename the columns of one row according to `mapping`.
///
/// Mapped columns appear under their target name, everything else under
/// its original name. When a target name collides with an unmapped column
/// of the same name, the mapped value wins.
pub fn map_record(row: &Record, mapping: &Mapping) -> Record {
    let mut out = Record::new();

    for (column, value) in row {
        if mapping.target_for(column).is_none() {
            out.insert(column.clone(), value.clone());
        }
    }
    for (column, value) in row {
        if let Some(target) = mapping.target_for(column) {
            out.insert(target.to_string(), value.clone());
        }
    }

    out
}

/// Build the scoring request for `rows`.
pub fn build_request(rows: &[Record], mapping: &Mapping, settings: &ScoringSettings) -> ScoringRequest {
    ScoringRequest {
        settings: settings.clone(),
        companies: rows.iter().map(|row| map_record(row, mapping)).collect(),
    }
}

/// Grouping column choices: `available` extended by the unmapped columns.
pub fn grouping_options(available: &[String], mapping: &Mapping) -> Vec<String> {
    let mut options = available.to_vec();
    for column in mapping.unmapped_columns() {
        if !options.iter().any(|o| o == column) {
            options.push(column.to_string());
        }
    }
    options
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AggregationMethod;
    use serde_json::json;

    fn record(value: serde_json::Value) -> Record {
        value.as_object().unwrap().clone()
    }

    #[test]
    fn test_unmapped_columns_pass_through() {
        let mut mapping = Mapping::unmapped(["colA", "colB"]);
        mapping.assign("colA", "target1").unwrap();

        let out = map_record(&record(json!({"colA": 5, "colB": "keep"})), &mapping);
        assert_eq!(serde_json::Value::Object(out), json!({"target1": 5, "colB": "keep"}));
    }

    #[test]
    fn test_columns_missing_from_mapping_pass_through() {
        let mapping = Mapping::unmapped(["a"]);
        let out = map_record(&record(json!({"a": 1, "late": null})), &mapping);
        assert_eq!(out.get("late"), Some(&serde_json::Value::Null));
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn test_mapped_value_wins_name_collision() {
        let mut mapping = Mapping::unmapped(["Name", "company_name"]);
        mapping.assign("Name", "company_name").unwrap();

        let out = map_record(&record(json!({"Name": "Acme", "company_name": "stale"})), &mapping);
        assert_eq!(out.get("company_name"), Some(&json!("Acme")));
        assert!(out.get("Name").is_none());
    }

    #[test]
    fn test_values_are_not_validated() {
        let mut mapping = Mapping::unmapped(["w"]);
        mapping.assign("w", "portfolio_weight").unwrap();

        let out = map_record(&record(json!({"w": "not a number"})), &mapping);
        assert_eq!(out.get("portfolio_weight"), Some(&json!("not a number")));
    }

    #[test]
    fn test_build_request_carries_settings() {
        let mut mapping = Mapping::unmapped(["id"]);
        mapping.assign("id", "company_id").unwrap();
        let settings = ScoringSettings {
            aggregation_method: AggregationMethod::Mots,
            default_score: 2.9,
            ..ScoringSettings::default()
        };

        let rows = vec![record(json!({"id": "A"})), record(json!({"id": "B"}))];
        let request = build_request(&rows, &mapping, &settings);

        assert_eq!(request.settings, settings);
        assert_eq!(request.companies.len(), 2);
        assert_eq!(request.companies[1].get("company_id"), Some(&json!("B")));
    }

    #[test]
    fn test_grouping_options_without_duplicates() {
        let mapping = Mapping::unmapped(["industry", "region"]);
        let available = vec!["industry".to_string(), "scope".to_string()];
        assert_eq!(
            grouping_options(&available, &mapping),
            vec!["industry", "scope", "region"]
        );
    }
}
