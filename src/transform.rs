use crate::data::Row;
use crate::ir::Series;
use crate::recipe::{ChartPlan, Measure};
use std::collections::{HashMap, HashSet};

/// Label of the synthetic bucket holding collapsed categories
pub const OTHER_LABEL: &str = "Other";

/// Main entry point: turn a plan and an already-filtered row subset into
/// plot-ready series. `selection` limits which categories are shown; `None`
/// shows every category.
pub fn compute_series(plan: &ChartPlan, rows: &[&Row], selection: Option<&[String]>) -> Series {
    match plan {
        ChartPlan::Scatter { x, y } => Series::Scatter {
            x: rows.iter().map(|r| r.number_or_nan(x)).collect(),
            y: rows.iter().map(|r| r.number_or_nan(y)).collect(),
        },
        ChartPlan::Histogram { x } => Series::Histogram {
            values: rows.iter().map(|r| r.number_or_nan(x)).collect(),
        },
        ChartPlan::Categorical { x, measure, .. } => {
            let (labels, values, has_other) = aggregate_categories(rows, x, measure, selection);
            Series::Categorical { labels, values, has_other }
        }
    }
}

#[derive(Debug, Default)]
struct GroupAccumulator {
    size: usize,
    numeric_sum: f64,
    numeric_count: usize,
}

impl GroupAccumulator {
    fn value(&self, measure: &Measure) -> f64 {
        match measure {
            Measure::Count => self.size as f64,
            Measure::Sum(_) => self.numeric_sum,
            Measure::Average(_) => {
                if self.numeric_count == 0 {
                    0.0
                } else {
                    round2(self.numeric_sum / self.numeric_count as f64)
                }
            }
        }
    }
}

fn aggregate_categories(
    rows: &[&Row],
    x_col: &str,
    measure: &Measure,
    selection: Option<&[String]>,
) -> (Vec<String>, Vec<f64>, bool) {
    // 1. Group rows
    let y_col = match measure {
        Measure::Count => None,
        Measure::Sum(y) | Measure::Average(y) => Some(y.as_str()),
    };

    let mut groups: HashMap<String, GroupAccumulator> = HashMap::new();
    for row in rows {
        let acc = groups.entry(row.category(x_col)).or_default();
        acc.size += 1;
        if let Some(v) = y_col.and_then(|y| row.number(y)) {
            acc.numeric_sum += v;
            acc.numeric_count += 1;
        }
    }

    // 2. Order by descending group size
    let mut keys: Vec<(&String, &GroupAccumulator)> = groups.iter().collect();
    keys.sort_by(|a, b| b.1.size.cmp(&a.1.size).then_with(|| a.0.cmp(b.0)));

    // 3. Partition into shown and collapsed
    let shown: Option<HashSet<&str>> = selection.map(|s| s.iter().map(String::as_str).collect());

    let mut labels = Vec::new();
    let mut values = Vec::new();
    let mut other = 0.0;

    for (key, acc) in keys {
        let value = acc.value(measure);
        let is_shown = shown.as_ref().map_or(true, |s| s.contains(key.as_str()));
        if is_shown {
            labels.push(key.clone());
            values.push(value);
        } else if measure.merges_into_other() {
            other += value;
        }
    }

    // Averages never merge: collapsed groups are simply dropped
    let has_other = measure.merges_into_other() && other != 0.0;
    if has_other {
        labels.push(OTHER_LABEL.to_string());
        values.push(other);
    }

    (labels, values, has_other)
}

/// Every category of `column` with its row count, most frequent first.
/// Equal counts are ordered lexicographically.
pub fn category_order(rows: &[&Row], column: &str) -> Vec<(String, usize)> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    for row in rows {
        *counts.entry(row.category(column)).or_default() += 1;
    }
    let mut ordered: Vec<(String, usize)> = counts.into_iter().collect();
    ordered.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    ordered
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}
