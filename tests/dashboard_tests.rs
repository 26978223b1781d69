use std::path::Path;
use surveydash::csv_reader::read_csv_from_path;
use surveydash::dashboard::{Dashboard, DashboardEvent, EventOutcome};
use surveydash::data::{Row, RowStore};
use surveydash::ir::Series;
use surveydash::recipe::{parse_recipe_document, Aggregation, ChartType, Recipe};
use surveydash::transform::{compute_series, OTHER_LABEL};
use surveydash::RenderOptions;

fn fixture_dashboard() -> Dashboard {
    let store = read_csv_from_path(Path::new("test/survey.csv")).unwrap();
    let text = std::fs::read_to_string("test/recipes.json").unwrap();
    let recipes = parse_recipe_document(&text).unwrap();
    Dashboard::new(store, recipes, RenderOptions::default())
}

fn categorical(series: &Series) -> (Vec<String>, Vec<f64>) {
    match series {
        Series::Categorical { labels, values, .. } => (labels.clone(), values.clone()),
        other => panic!("expected categorical series, got {:?}", other),
    }
}

fn count_recipe(x: &str) -> Recipe {
    Recipe {
        chart_type: ChartType::Bar,
        x_column: x.to_string(),
        y_column: None,
        aggregation: Aggregation::Count,
        title: None,
        description: None,
    }
}

#[test]
fn test_count_totals_match_filtered_rows() {
    let mut dash = fixture_dashboard();
    let (_, values) = categorical(&dash.view(0).unwrap().series);
    assert_eq!(values.iter().sum::<f64>(), dash.store().len() as f64);

    dash.dispatch(DashboardEvent::ChartClick { card: 1, label: "DE".to_string() });
    let (_, values) = categorical(&dash.view(0).unwrap().series);
    assert_eq!(values.iter().sum::<f64>(), dash.filtered_rows().len() as f64);
    assert_eq!(dash.filtered_rows().len(), 3);
}

#[test]
fn test_average_card_never_has_other() {
    let dash = fixture_dashboard();
    let view = dash.view(2).unwrap();
    assert!(view.pills.is_some());
    let (labels, _) = categorical(&view.series);
    assert_eq!(labels.len(), 4);
    assert!(!labels.iter().any(|l| l == OTHER_LABEL));
}

#[test]
fn test_click_twice_is_identity() {
    let mut dash = fixture_dashboard();
    let before = dash.views().to_vec();
    let click = DashboardEvent::ChartClick { card: 0, label: "Tech".to_string() };

    assert_eq!(dash.dispatch(click.clone()), EventOutcome::Changed);
    assert_eq!(dash.filtered_rows().len(), 4);
    assert_eq!(dash.dispatch(click), EventOutcome::Changed);
    assert_eq!(dash.filtered_rows().len(), dash.store().len());

    // Scatter series carry NaN for missing cells, so compare what is drawn
    let after = dash.views();
    for (a, b) in before.iter().zip(after.iter()) {
        assert_eq!(a.figure, b.figure);
        assert_eq!(a.pills, b.pills);
    }
}

#[test]
fn test_clicking_another_value_replaces_filter() {
    let mut dash = fixture_dashboard();
    dash.dispatch(DashboardEvent::ChartClick { card: 1, label: "US".to_string() });
    dash.dispatch(DashboardEvent::ChartClick { card: 1, label: "FR".to_string() });
    assert_eq!(dash.chips().len(), 1);
    assert_eq!(dash.filters().get("country"), Some("FR"));
    assert_eq!(dash.filtered_rows().len(), 2);
}

#[test]
fn test_unknown_bucket_is_filterable() {
    let mut dash = fixture_dashboard();
    let label = "Unknown".to_string();
    dash.dispatch(DashboardEvent::TogglePill { card: 0, label: label.clone() });
    assert_eq!(
        dash.dispatch(DashboardEvent::ChartClick { card: 0, label }),
        EventOutcome::Changed
    );
    let rows = dash.filtered_rows();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].text("respondent"), Some("4"));
}

#[test]
fn test_selection_floor_holds() {
    let mut dash = fixture_dashboard();
    for _ in 0..10 {
        let pills = dash.view(0).unwrap().pills.as_ref().unwrap();
        let first = pills.pills.iter().find(|p| p.shown).unwrap().label.clone();
        dash.dispatch(DashboardEvent::TogglePill { card: 0, label: first });
    }
    let pills = dash.view(0).unwrap().pills.clone().unwrap();
    assert_eq!(pills.pills.iter().filter(|p| p.shown).count(), 1);
}

#[test]
fn test_basic_grouping_scenario() {
    let rows: Vec<Row> = ["Tech", "Tech", "Finance", ""]
        .iter()
        .map(|i| Row::from_pairs([("industry", *i)]))
        .collect();
    let refs: Vec<&Row> = rows.iter().collect();
    let plan = count_recipe("industry").plan().unwrap();

    let (labels, values) = categorical(&compute_series(&plan, &refs, None));
    assert_eq!(labels, vec!["Tech", "Finance", "Unknown"]);
    assert_eq!(values, vec![2.0, 1.0, 1.0]);

    let selection = vec!["Tech".to_string()];
    let (labels, values) = categorical(&compute_series(&plan, &refs, Some(selection.as_slice())));
    assert_eq!(labels, vec!["Tech", "Other"]);
    assert_eq!(values, vec![2.0, 2.0]);

    let store = RowStore::new(vec!["industry".to_string()], rows);
    let mut dash = Dashboard::new(store, vec![count_recipe("industry")], RenderOptions::default());
    dash.dispatch(DashboardEvent::ChartClick { card: 0, label: "Tech".to_string() });
    assert_eq!(dash.filtered_rows().len(), 2);
    dash.dispatch(DashboardEvent::ChartClick { card: 0, label: "Tech".to_string() });
    assert_eq!(dash.filtered_rows().len(), 4);
}
