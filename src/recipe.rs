// Chart recipe wire format and its validated form

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

/// Chart type as it appears on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartType {
    Bar,
    Pie,
    Scatter,
    Histogram,
}

/// Aggregation mode as it appears on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Aggregation {
    #[default]
    Count,
    Average,
    Sum,
    None,
}

/// One chart description, exactly as produced by the recipe source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recipe {
    #[serde(rename = "type")]
    pub chart_type: ChartType,
    pub x_column: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y_column: Option<String>,
    #[serde(default)]
    pub aggregation: Aggregation,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Recipe source poll response
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RecipeStatus {
    #[serde(default)]
    pub ready: bool,
    #[serde(default)]
    pub recipes: Option<Vec<Recipe>>,
}

impl RecipeStatus {
    /// Recipes carried by a ready response; absent means nothing to show
    pub fn into_recipes(self) -> Vec<Recipe> {
        self.recipes.unwrap_or_default()
    }
}

// =============================================================================
// Validated plans
// =============================================================================

/// Kind of categorical chart
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CategoricalKind {
    Bar,
    Pie,
}

/// Scalar computed per category
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Measure {
    Count,
    Sum(String),
    Average(String),
}

impl Measure {
    /// Whether collapsed categories may be merged into "Other"
    pub fn merges_into_other(&self) -> bool {
        !matches!(self, Measure::Average(_))
    }
}

/// A recipe whose type/aggregation combination has been checked
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum ChartPlan {
    Categorical {
        kind: CategoricalKind,
        x: String,
        measure: Measure,
    },
    Scatter {
        x: String,
        y: String,
    },
    Histogram {
        x: String,
    },
}

impl ChartPlan {
    /// Column plotted along the x-axis (or sliced, for pies)
    pub fn x_column(&self) -> &str {
        match self {
            ChartPlan::Categorical { x, .. } | ChartPlan::Scatter { x, .. } | ChartPlan::Histogram { x } => x,
        }
    }

    /// Only bar and pie marks feed the cross-filter
    pub fn is_clickable(&self) -> bool {
        matches!(self, ChartPlan::Categorical { .. })
    }
}

impl Recipe {
    /// Check the type/aggregation combination and produce a plan
    pub fn plan(&self) -> Result<ChartPlan> {
        let x = self.x_column.trim();
        if x.is_empty() {
            anyhow::bail!("Recipe is missing 'xColumn'");
        }
        let x = x.to_string();
        let y = self
            .y_column
            .as_deref()
            .map(str::trim)
            .filter(|y| !y.is_empty())
            .map(str::to_string);

        match self.chart_type {
            ChartType::Bar | ChartType::Pie => {
                let kind = if self.chart_type == ChartType::Bar {
                    CategoricalKind::Bar
                } else {
                    CategoricalKind::Pie
                };
                let measure = match self.aggregation {
                    Aggregation::Count | Aggregation::None => Measure::Count,
                    Aggregation::Sum => Measure::Sum(y.ok_or_else(|| {
                        anyhow!("Aggregation 'sum' requires 'yColumn' (xColumn '{}')", x)
                    })?),
                    Aggregation::Average => Measure::Average(y.ok_or_else(|| {
                        anyhow!("Aggregation 'average' requires 'yColumn' (xColumn '{}')", x)
                    })?),
                };
                Ok(ChartPlan::Categorical { kind, x, measure })
            }
            ChartType::Scatter => {
                let y = y.ok_or_else(|| anyhow!("Scatter chart requires 'yColumn' (xColumn '{}')", x))?;
                Ok(ChartPlan::Scatter { x, y })
            }
            ChartType::Histogram => Ok(ChartPlan::Histogram { x }),
        }
    }

    /// Display title, falling back to a generated one
    pub fn display_title(&self) -> String {
        if let Some(title) = self.title.as_ref().filter(|t| !t.trim().is_empty()) {
            return title.clone();
        }
        match (self.chart_type, self.aggregation, self.y_column.as_deref()) {
            (ChartType::Scatter, _, Some(y)) => format!("{} vs {}", y, self.x_column),
            (ChartType::Histogram, _, _) => format!("Distribution of {}", self.x_column),
            (_, Aggregation::Average, Some(y)) => format!("Average {} by {}", y, self.x_column),
            (_, Aggregation::Sum, Some(y)) => format!("Total {} by {}", y, self.x_column),
            _ => format!("Count by {}", self.x_column),
        }
    }
}

/// Parse a recipe document: either a bare array of recipes or a poll
/// response `{ready, recipes}`
pub fn parse_recipe_document(text: &str) -> Result<Vec<Recipe>> {
    let value: Value = serde_json::from_str(text).context("Recipe document is not valid JSON")?;
    if value.is_array() {
        return serde_json::from_value(value).context("Failed to parse recipe array");
    }
    let status: RecipeStatus =
        serde_json::from_value(value).context("Failed to parse recipe status object")?;
    Ok(status.into_recipes())
}

/// Parse an optional chart attached to a chat reply. Failures are logged
/// and the chart is omitted.
pub fn parse_chat_chart(value: Option<&Value>) -> Option<Recipe> {
    let value = value.filter(|v| !v.is_null())?;
    match serde_json::from_value::<Recipe>(value.clone()) {
        Ok(recipe) => Some(recipe),
        Err(e) => {
            warn!(error = %e, "Ignoring chat chart that is not a valid recipe");
            None
        }
    }
}
