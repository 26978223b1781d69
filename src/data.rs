use anyhow::{anyhow, Result};
use serde::Serialize;
use serde_json::Value;
use std::collections::{HashMap, HashSet};

/// Label used for rows whose grouping value is missing or empty
pub const UNKNOWN_LABEL: &str = "Unknown";

/// A single survey record. Values are kept exactly as parsed; numeric
/// coercion happens through the typed accessors below.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    values: HashMap<String, String>,
}

impl Row {
    pub fn new(values: HashMap<String, String>) -> Self {
        Self { values }
    }

    /// Build a row from `(column, value)` pairs
    pub fn from_pairs<K, V, I>(pairs: I) -> Self
    where
        K: Into<String>,
        V: Into<String>,
        I: IntoIterator<Item = (K, V)>,
    {
        Self {
            values: pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }

    /// Raw value, `None` when the column is absent
    pub fn text(&self, column: &str) -> Option<&str> {
        self.values.get(column).map(String::as_str)
    }

    /// Grouping key for categorical charts and filters
    pub fn category(&self, column: &str) -> String {
        match self.text(column).map(str::trim) {
            Some(v) if !v.is_empty() => v.to_string(),
            _ => UNKNOWN_LABEL.to_string(),
        }
    }

    /// Finite numeric value, `None` for empty or unparseable cells
    pub fn number(&self, column: &str) -> Option<f64> {
        self.text(column).and_then(coerce_number)
    }

    /// Numeric value or `NaN`; used for raw samples that are never aggregated
    pub fn number_or_nan(&self, column: &str) -> f64 {
        self.number(column).unwrap_or(f64::NAN)
    }
}

/// Permissive numeric cast shared by every accessor
pub fn coerce_number(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    let unsigned = trimmed.strip_prefix('+').unwrap_or(trimmed);
    unsigned.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// The loaded dataset. Read-only after construction.
#[derive(Debug, Clone, Default)]
pub struct RowStore {
    pub headers: Vec<String>,
    pub rows: Vec<Row>,
}

impl RowStore {
    pub fn new(headers: Vec<String>, rows: Vec<Row>) -> Self {
        Self { headers, rows }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    /// Build from positional records, as produced by the CSV reader
    pub fn from_records(headers: Vec<String>, records: Vec<Vec<String>>) -> Self {
        let rows = records
            .into_iter()
            .map(|record| {
                Row::from_pairs(
                    headers
                        .iter()
                        .cloned()
                        .zip(record.into_iter().chain(std::iter::repeat(String::new()))),
                )
            })
            .collect();
        Self { headers, rows }
    }

    /// Create a RowStore from a JSON array of objects
    pub fn from_json_rows(value: &Value) -> Result<Self> {
        let array = value
            .as_array()
            .ok_or_else(|| anyhow!("Row data must be a JSON array of objects"))?;

        let mut headers: Vec<String> = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();
        let mut rows = Vec::with_capacity(array.len());

        for item in array {
            let obj = item
                .as_object()
                .ok_or_else(|| anyhow!("Items in row array must be objects"))?;

            let mut values = HashMap::with_capacity(obj.len());
            for (key, val) in obj {
                // Columns are collected in order of first appearance
                if seen.insert(key.clone()) {
                    headers.push(key.clone());
                }
                let val_str = match val {
                    Value::String(s) => s.clone(),
                    Value::Number(n) => n.to_string(),
                    Value::Bool(b) => b.to_string(),
                    Value::Null => String::new(),
                    _ => return Err(anyhow!("Unsupported value type for field '{}'", key)),
                };
                values.insert(key.clone(), val_str);
            }
            rows.push(Row::new(values));
        }

        Ok(Self { headers, rows })
    }

    /// Parse the row source payload `{ "rows": [...] }`
    pub fn from_payload(value: &Value) -> Result<Self> {
        let rows = value
            .get("rows")
            .ok_or_else(|| anyhow!("Row payload is missing the 'rows' field"))?;
        Self::from_json_rows(rows)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.headers.iter().any(|h| h == column)
    }
}

// =============================================================================
// Column summaries
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnKind {
    Numeric,
    Categorical,
    Empty,
}

/// One-pass profile of a column
#[derive(Debug, Clone, Serialize)]
pub struct ColumnSummary {
    pub name: String,
    pub kind: ColumnKind,
    pub non_empty: usize,
    pub distinct: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mean: Option<f64>,
    /// Up to five example values, most frequent first
    pub samples: Vec<String>,
}

/// Sniff the type of every column. A column is numeric when every
/// non-empty value coerces to a number.
pub fn summarize_columns(store: &RowStore) -> Vec<ColumnSummary> {
    store
        .headers
        .iter()
        .map(|name| summarize_column(store, name))
        .collect()
}

fn summarize_column(store: &RowStore, name: &str) -> ColumnSummary {
    let mut non_empty = 0usize;
    let mut all_numeric = true;
    let mut sum = 0.0;
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    let mut counts: HashMap<&str, usize> = HashMap::new();

    for row in &store.rows {
        let raw = match row.text(name).map(str::trim) {
            Some(v) if !v.is_empty() => v,
            _ => continue,
        };
        non_empty += 1;
        *counts.entry(raw).or_default() += 1;

        match coerce_number(raw) {
            Some(v) => {
                sum += v;
                min = min.min(v);
                max = max.max(v);
            }
            None => all_numeric = false,
        }
    }

    let kind = if non_empty == 0 {
        ColumnKind::Empty
    } else if all_numeric {
        ColumnKind::Numeric
    } else {
        ColumnKind::Categorical
    };

    let mut ranked: Vec<(&str, usize)> = counts.iter().map(|(k, v)| (*k, *v)).collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));

    let numeric = kind == ColumnKind::Numeric;
    ColumnSummary {
        name: name.to_string(),
        kind,
        non_empty,
        distinct: counts.len(),
        min: numeric.then_some(min),
        max: numeric.then_some(max),
        mean: numeric.then(|| sum / non_empty as f64),
        samples: ranked.into_iter().take(5).map(|(k, _)| k.to_string()).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_row_accessors() {
        let row = Row::from_pairs([("industry", " Tech "), ("salary", "+1200.5"), ("age", "n/a")]);
        assert_eq!(row.text("industry"), Some(" Tech "));
        assert_eq!(row.category("industry"), "Tech");
        assert_eq!(row.number("salary"), Some(1200.5));
        assert_eq!(row.number("age"), None);
        assert!(row.number_or_nan("age").is_nan());
        assert!(row.number_or_nan("missing").is_nan());
    }

    #[test]
    fn test_category_unknown_for_missing_or_empty() {
        let row = Row::from_pairs([("industry", "  ")]);
        assert_eq!(row.category("industry"), UNKNOWN_LABEL);
        assert_eq!(row.category("country"), UNKNOWN_LABEL);
    }

    #[test]
    fn test_coerce_rejects_non_finite() {
        assert_eq!(coerce_number("inf"), None);
        assert_eq!(coerce_number("NaN"), None);
        assert_eq!(coerce_number(""), None);
        assert_eq!(coerce_number(" 42 "), Some(42.0));
        assert_eq!(coerce_number("-3.5e2"), Some(-350.0));
    }

    #[test]
    fn test_from_json_rows() {
        let value = json!([
            {"industry": "Tech", "salary": 100, "remote": true},
            {"industry": null, "salary": "90", "team": "A"}
        ]);
        let store = RowStore::from_json_rows(&value).unwrap();
        assert_eq!(store.len(), 2);
        assert_eq!(store.headers, vec!["industry", "remote", "salary", "team"]);
        assert_eq!(store.rows[0].text("salary"), Some("100"));
        assert_eq!(store.rows[0].text("remote"), Some("true"));
        assert_eq!(store.rows[1].text("industry"), Some(""));
        assert_eq!(store.rows[1].category("industry"), UNKNOWN_LABEL);
    }

    #[test]
    fn test_from_json_rows_rejects_nested() {
        let value = json!([{"tags": ["a", "b"]}]);
        let result = RowStore::from_json_rows(&value);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("Unsupported value type"));
    }

    #[test]
    fn test_from_payload_requires_rows() {
        let result = RowStore::from_payload(&json!({"data": []}));
        assert!(result.is_err());
        let store = RowStore::from_payload(&json!({"rows": []})).unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn test_from_records_pads_short_rows() {
        let store = RowStore::from_records(
            vec!["a".to_string(), "b".to_string()],
            vec![vec!["1".to_string()]],
        );
        assert_eq!(store.rows[0].text("b"), Some(""));
    }

    #[test]
    fn test_summarize_columns() {
        let store = RowStore::from_records(
            vec!["industry".into(), "salary".into(), "blank".into()],
            vec![
                vec!["Tech".into(), "100".into(), "".into()],
                vec!["Tech".into(), "300".into(), "".into()],
                vec!["Finance".into(), "".into(), "".into()],
            ],
        );
        let summary = summarize_columns(&store);
        assert_eq!(summary[0].kind, ColumnKind::Categorical);
        assert_eq!(summary[0].distinct, 2);
        assert_eq!(summary[0].samples, vec!["Tech", "Finance"]);
        assert_eq!(summary[1].kind, ColumnKind::Numeric);
        assert_eq!(summary[1].non_empty, 2);
        assert_eq!(summary[1].mean, Some(200.0));
        assert_eq!(summary[1].min, Some(100.0));
        assert_eq!(summary[2].kind, ColumnKind::Empty);
        assert_eq!(summary[2].min, None);
    }
}
