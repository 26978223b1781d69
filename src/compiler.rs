use crate::filter::FilterState;
use crate::ir::{Bin, Figure, Geometry, Highlight, Mark, Series};
use crate::palette::{ColorPalette, DIMMED_COLOR, OTHER_COLOR, SAMPLE_COLOR};
use crate::recipe::{CategoricalKind, ChartPlan, Measure, Recipe};
use crate::RenderOptions;

/// Tick labels longer than this are rotated
pub const MAX_FLAT_LABEL_CHARS: usize = 10;

const MAX_HISTOGRAM_BINS: usize = 50;

/// Compile a computed series into a backend-independent figure
pub fn compile_figure(
    card: usize,
    recipe: &Recipe,
    plan: &ChartPlan,
    series: &Series,
    filters: &FilterState,
    options: &RenderOptions,
) -> Figure {
    let (x_title, y_title) = axis_titles(plan);

    let geometry = match (plan, series) {
        (ChartPlan::Categorical { kind, x, .. }, Series::Categorical { labels, values, has_other }) => {
            let marks = build_marks(labels, values, *has_other, filters.get(x));
            match (marks.is_empty(), kind) {
                (true, _) => Geometry::Empty,
                (false, CategoricalKind::Bar) => Geometry::Bars { marks },
                (false, CategoricalKind::Pie) => Geometry::Pie { marks },
            }
        }
        (_, Series::Scatter { x, y }) => {
            // Non-finite samples are unplottable and silently skipped
            let points: Vec<(f64, f64)> = x
                .iter()
                .zip(y.iter())
                .filter(|(a, b)| a.is_finite() && b.is_finite())
                .map(|(&a, &b)| (a, b))
                .collect();
            if points.is_empty() {
                Geometry::Empty
            } else {
                Geometry::Scatter { points, color: SAMPLE_COLOR.to_string() }
            }
        }
        (_, Series::Histogram { values }) => {
            let bins = bin_samples(values);
            if bins.is_empty() {
                Geometry::Empty
            } else {
                Geometry::Histogram { bins, color: SAMPLE_COLOR.to_string() }
            }
        }
        // A plan/series mismatch has nothing meaningful to draw
        _ => Geometry::Empty,
    };

    let rotate_ticks = match &geometry {
        Geometry::Bars { marks } => marks
            .iter()
            .any(|m| m.label.chars().count() > MAX_FLAT_LABEL_CHARS),
        _ => false,
    };

    Figure {
        card,
        title: recipe.display_title(),
        width: options.width,
        height: options.height,
        x_title,
        y_title,
        rotate_ticks,
        show_legend: false,
        geometry,
    }
}

/// Axis titles derived from column names and aggregation kind
pub fn axis_titles(plan: &ChartPlan) -> (String, String) {
    match plan {
        ChartPlan::Categorical { x, measure, .. } => {
            let y_title = match measure {
                Measure::Count => "Count".to_string(),
                Measure::Average(y) => format!("Avg {}", y),
                Measure::Sum(y) => y.clone(),
            };
            (x.clone(), y_title)
        }
        ChartPlan::Scatter { x, y } => (x.clone(), y.clone()),
        ChartPlan::Histogram { x } => (x.clone(), "Count".to_string()),
    }
}

fn build_marks(labels: &[String], values: &[f64], has_other: bool, active: Option<&str>) -> Vec<Mark> {
    let palette = ColorPalette::category10();
    let other_idx = has_other.then(|| labels.len().saturating_sub(1));

    labels
        .iter()
        .zip(values.iter())
        .enumerate()
        .map(|(idx, (label, &value))| {
            let is_other = other_idx == Some(idx);
            let highlight = match active {
                None => Highlight::Normal,
                Some(_) if is_other => Highlight::Normal,
                Some(active) if active == label => Highlight::Active,
                Some(_) => Highlight::Dimmed,
            };
            let color = if is_other {
                OTHER_COLOR
            } else if highlight == Highlight::Dimmed {
                DIMMED_COLOR
            } else {
                palette.color_at(idx)
            };
            Mark {
                label: label.clone(),
                value,
                color: color.to_string(),
                highlight,
                clickable: !is_other,
                is_other,
            }
        })
        .collect()
}

/// Bin raw samples using Sturges' rule. Non-finite samples are ignored.
pub fn bin_samples(values: &[f64]) -> Vec<Bin> {
    let finite: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if finite.is_empty() {
        return Vec::new();
    }

    let min = finite.iter().fold(f64::INFINITY, |a, &b| a.min(b));
    let max = finite.iter().fold(f64::NEG_INFINITY, |a, &b| a.max(b));

    if min == max {
        return vec![Bin {
            start: min - 0.5,
            end: max + 0.5,
            count: finite.len(),
        }];
    }

    let n = finite.len() as f64;
    let bin_count = ((n.log2().ceil() as usize) + 1).clamp(1, MAX_HISTOGRAM_BINS);
    let width = (max - min) / bin_count as f64;

    let mut counts = vec![0usize; bin_count];
    for v in &finite {
        // The maximum lands in the last bin
        let idx = (((v - min) / width).floor() as usize).min(bin_count - 1);
        counts[idx] += 1;
    }

    counts
        .into_iter()
        .enumerate()
        .map(|(i, count)| Bin {
            start: min + i as f64 * width,
            end: min + (i + 1) as f64 * width,
            count,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recipe::{Aggregation, ChartType};

    fn recipe(chart_type: ChartType, x: &str, y: Option<&str>, aggregation: Aggregation) -> Recipe {
        Recipe {
            chart_type,
            x_column: x.to_string(),
            y_column: y.map(str::to_string),
            aggregation,
            title: None,
            description: None,
        }
    }

    fn categorical(labels: &[&str], values: &[f64]) -> Series {
        Series::Categorical {
            labels: labels.iter().map(|s| s.to_string()).collect(),
            values: values.to_vec(),
            has_other: false,
        }
    }

    fn with_other(labels: &[&str], values: &[f64]) -> Series {
        Series::Categorical {
            labels: labels.iter().map(|s| s.to_string()).collect(),
            values: values.to_vec(),
            has_other: true,
        }
    }

    #[test]
    fn test_colors_cycle_and_other_is_neutral() {
        let r = recipe(ChartType::Bar, "industry", None, Aggregation::Count);
        let plan = r.plan().unwrap();
        let series = with_other(&["Tech", "Finance", "Other"], &[2.0, 1.0, 1.0]);
        let fig = compile_figure(0, &r, &plan, &series, &FilterState::new(), &RenderOptions::default());

        let marks = fig.marks();
        let palette = ColorPalette::category10();
        assert_eq!(marks[0].color, palette.color_at(0));
        assert_eq!(marks[1].color, palette.color_at(1));
        assert_eq!(marks[2].color, OTHER_COLOR);
        assert!(!marks[2].clickable);
        assert!(marks[2].is_other);
        assert_eq!(fig.click_targets(), vec!["Tech", "Finance"]);
        assert!(!fig.show_legend);
    }

    #[test]
    fn test_filtered_column_dims_other_values() {
        let r = recipe(ChartType::Pie, "industry", None, Aggregation::Count);
        let plan = r.plan().unwrap();
        let mut filters = FilterState::new();
        filters.set("industry", "Finance");
        let series = categorical(&["Tech", "Finance"], &[2.0, 1.0]);
        let fig = compile_figure(1, &r, &plan, &series, &filters, &RenderOptions::default());

        let marks = fig.marks();
        assert_eq!(marks[0].highlight, Highlight::Dimmed);
        assert_eq!(marks[0].color, DIMMED_COLOR);
        assert_eq!(marks[1].highlight, Highlight::Active);
        assert_eq!(marks[1].color, ColorPalette::category10().color_at(1));
        assert!(matches!(fig.geometry, Geometry::Pie { .. }));
    }

    #[test]
    fn test_real_other_answer_is_an_ordinary_mark() {
        let r = recipe(ChartType::Bar, "industry", None, Aggregation::Count);
        let plan = r.plan().unwrap();
        let series = with_other(&["Other", "Tech", "Other"], &[3.0, 2.0, 3.0]);
        let fig = compile_figure(0, &r, &plan, &series, &FilterState::new(), &RenderOptions::default());

        let marks = fig.marks();
        assert!(!marks[0].is_other);
        assert!(marks[0].clickable);
        assert_eq!(marks[0].color, ColorPalette::category10().color_at(0));
        assert!(marks[2].is_other);
        assert_eq!(marks[2].color, OTHER_COLOR);
        assert_eq!(fig.click_targets(), vec!["Other", "Tech"]);
    }

    #[test]
    fn test_other_column_filter_does_not_dim() {
        let r = recipe(ChartType::Bar, "industry", None, Aggregation::Count);
        let plan = r.plan().unwrap();
        let mut filters = FilterState::new();
        filters.set("country", "US");
        let series = categorical(&["Tech"], &[2.0]);
        let fig = compile_figure(0, &r, &plan, &series, &filters, &RenderOptions::default());
        assert_eq!(fig.marks()[0].highlight, Highlight::Normal);
    }

    #[test]
    fn test_axis_titles() {
        let count = recipe(ChartType::Bar, "industry", None, Aggregation::Count).plan().unwrap();
        assert_eq!(axis_titles(&count), ("industry".to_string(), "Count".to_string()));
        let avg = recipe(ChartType::Bar, "industry", Some("salary"), Aggregation::Average).plan().unwrap();
        assert_eq!(axis_titles(&avg).1, "Avg salary");
        let sum = recipe(ChartType::Bar, "industry", Some("salary"), Aggregation::Sum).plan().unwrap();
        assert_eq!(axis_titles(&sum).1, "salary");
        let scatter = recipe(ChartType::Scatter, "age", Some("salary"), Aggregation::None).plan().unwrap();
        assert_eq!(axis_titles(&scatter), ("age".to_string(), "salary".to_string()));
    }

    #[test]
    fn test_long_labels_rotate_ticks() {
        let r = recipe(ChartType::Bar, "industry", None, Aggregation::Count);
        let plan = r.plan().unwrap();
        let short = categorical(&["Tech"], &[1.0]);
        let long = categorical(&["Information Technology"], &[1.0]);
        let opts = RenderOptions::default();
        assert!(!compile_figure(0, &r, &plan, &short, &FilterState::new(), &opts).rotate_ticks);
        assert!(compile_figure(0, &r, &plan, &long, &FilterState::new(), &opts).rotate_ticks);
    }

    #[test]
    fn test_fixed_height() {
        let r = recipe(ChartType::Bar, "industry", None, Aggregation::Count);
        let plan = r.plan().unwrap();
        let fig = compile_figure(0, &r, &plan, &categorical(&["a"], &[1.0]), &FilterState::new(), &RenderOptions::default());
        assert_eq!(fig.height, RenderOptions::default().height);
    }

    #[test]
    fn test_scatter_skips_non_finite_points() {
        let r = recipe(ChartType::Scatter, "age", Some("salary"), Aggregation::None);
        let plan = r.plan().unwrap();
        let series = Series::Scatter {
            x: vec![1.0, f64::NAN, 3.0],
            y: vec![10.0, 20.0, f64::INFINITY],
        };
        let fig = compile_figure(0, &r, &plan, &series, &FilterState::new(), &RenderOptions::default());
        match &fig.geometry {
            Geometry::Scatter { points, .. } => assert_eq!(points, &vec![(1.0, 10.0)]),
            other => panic!("unexpected {:?}", other),
        }
        assert!(fig.click_targets().is_empty());
    }

    #[test]
    fn test_empty_series_compiles_to_placeholder() {
        let r = recipe(ChartType::Bar, "industry", None, Aggregation::Count);
        let plan = r.plan().unwrap();
        let fig = compile_figure(0, &r, &plan, &categorical(&[], &[]), &FilterState::new(), &RenderOptions::default());
        assert_eq!(fig.geometry, Geometry::Empty);
    }

    #[test]
    fn test_bin_samples() {
        let values = vec![1.0, 2.0, 3.0, 4.0, f64::NAN, 5.0, 6.0, 7.0, 8.0];
        let bins = bin_samples(&values);
        // 8 finite samples: ceil(log2 8) + 1 = 4 bins
        assert_eq!(bins.len(), 4);
        assert_eq!(bins.iter().map(|b| b.count).sum::<usize>(), 8);
        assert_eq!(bins[0].start, 1.0);
        assert_eq!(bins[3].end, 8.0);
        assert_eq!(bins[3].count, 2);
    }

    #[test]
    fn test_bin_samples_constant_and_empty() {
        let bins = bin_samples(&[3.0, 3.0]);
        assert_eq!(bins.len(), 1);
        assert_eq!(bins[0].count, 2);
        assert!(bin_samples(&[f64::NAN]).is_empty());
    }
}
