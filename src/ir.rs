use serde::Serialize;

// =============================================================================
// Phase 1: Aggregation
// =============================================================================

/// Plot-ready numbers derived from a recipe and a row subset
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Series {
    /// Bar and pie charts: one scalar per shown label. When `has_other` is
    /// set, the last entry is the synthetic bucket of collapsed categories,
    /// distinct from any real answer that happens to read "Other".
    Categorical {
        labels: Vec<String>,
        values: Vec<f64>,
        has_other: bool,
    },
    /// Parallel samples; non-numeric cells are `NaN`
    Scatter { x: Vec<f64>, y: Vec<f64> },
    /// Raw samples; binning happens when the figure is compiled
    Histogram { values: Vec<f64> },
}

impl Series {
    pub fn is_empty(&self) -> bool {
        match self {
            Series::Categorical { labels, .. } => labels.is_empty(),
            Series::Scatter { x, .. } => x.is_empty(),
            Series::Histogram { values } => values.is_empty(),
        }
    }
}

// =============================================================================
// Phase 2: Figure (backend-independent drawing description)
// =============================================================================

/// How a categorical mark relates to the active cross-filter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Highlight {
    /// Column not filtered
    Normal,
    /// The filtered value itself
    Active,
    /// Another value of the filtered column
    Dimmed,
}

/// One bar or pie slice
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Mark {
    pub label: String,
    pub value: f64,
    pub color: String,
    pub highlight: Highlight,
    pub clickable: bool,
    /// Synthetic bucket of collapsed categories
    pub is_other: bool,
}

/// One histogram bin, `[start, end)`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Bin {
    pub start: f64,
    pub end: f64,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Geometry {
    Bars { marks: Vec<Mark> },
    Pie { marks: Vec<Mark> },
    Scatter { points: Vec<(f64, f64)>, color: String },
    Histogram { bins: Vec<Bin>, color: String },
    /// Nothing plottable; drawn as a placeholder
    Empty,
}

/// A fully resolved chart card, ready for any drawing backend
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Figure {
    pub card: usize,
    pub title: String,
    pub width: u32,
    pub height: u32,
    pub x_title: String,
    pub y_title: String,
    pub rotate_ticks: bool,
    pub show_legend: bool,
    pub geometry: Geometry,
}

impl Figure {
    /// Labels that accept a cross-filter click
    pub fn click_targets(&self) -> Vec<&str> {
        match &self.geometry {
            Geometry::Bars { marks } | Geometry::Pie { marks } => marks
                .iter()
                .filter(|m| m.clickable)
                .map(|m| m.label.as_str())
                .collect(),
            _ => Vec::new(),
        }
    }

    pub fn marks(&self) -> &[Mark] {
        match &self.geometry {
            Geometry::Bars { marks } | Geometry::Pie { marks } => marks,
            _ => &[],
        }
    }
}
