// Cross-filter state: one required value per column

use crate::data::Row;
use indexmap::IndexMap;
use serde::Serialize;

/// Result of toggling a filter
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterChange {
    Set { column: String, value: String },
    Replaced { column: String, previous: String, value: String },
    Cleared { column: String },
}

/// A visible summary entry for an active filter
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FilterChip {
    pub column: String,
    pub value: String,
}

impl FilterChip {
    pub fn label(&self) -> String {
        format!("{}: {}", self.column, self.value)
    }
}

/// Conjunction of active column filters, in the order they were applied
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterState {
    active: IndexMap<String, String>,
}

impl FilterState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Click-to-toggle: clears the filter when `column` is already filtered
    /// to `value`, otherwise sets it (replacing any previous value).
    pub fn toggle(&mut self, column: &str, value: &str) -> FilterChange {
        if self.active.get(column).map(String::as_str) == Some(value) {
            self.active.shift_remove(column);
            return FilterChange::Cleared { column: column.to_string() };
        }
        self.set(column, value)
    }

    pub fn set(&mut self, column: &str, value: &str) -> FilterChange {
        match self.active.insert(column.to_string(), value.to_string()) {
            Some(previous) => FilterChange::Replaced {
                column: column.to_string(),
                previous,
                value: value.to_string(),
            },
            None => FilterChange::Set {
                column: column.to_string(),
                value: value.to_string(),
            },
        }
    }

    /// Remove a single filter. Returns whether anything was removed.
    pub fn remove(&mut self, column: &str) -> bool {
        self.active.shift_remove(column).is_some()
    }

    /// Remove every filter. Returns whether anything was removed.
    pub fn clear(&mut self) -> bool {
        let had_any = !self.active.is_empty();
        self.active.clear();
        had_any
    }

    pub fn get(&self, column: &str) -> Option<&str> {
        self.active.get(column).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }

    pub fn len(&self) -> usize {
        self.active.len()
    }

    /// Whether a row satisfies every active filter
    pub fn matches(&self, row: &Row) -> bool {
        self.active
            .iter()
            .all(|(column, value)| row.category(column) == *value)
    }

    /// Rows passing all filters, in source order
    pub fn apply<'a>(&self, rows: &'a [Row]) -> Vec<&'a Row> {
        if self.active.is_empty() {
            return rows.iter().collect();
        }
        rows.iter().filter(|row| self.matches(row)).collect()
    }

    /// Rows passing every filter except the one on `column`
    pub fn apply_except<'a>(&self, rows: &'a [Row], column: &str) -> Vec<&'a Row> {
        rows.iter()
            .filter(|row| {
                self.active
                    .iter()
                    .filter(|(name, _)| name.as_str() != column)
                    .all(|(name, value)| row.category(name) == *value)
            })
            .collect()
    }

    pub fn chips(&self) -> Vec<FilterChip> {
        self.active
            .iter()
            .map(|(column, value)| FilterChip {
                column: column.clone(),
                value: value.clone(),
            })
            .collect()
    }
}
