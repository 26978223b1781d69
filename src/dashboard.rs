//! Dashboard session state and the cross-filter controller.
//!
//! A [`Dashboard`] owns everything that lives for one session: the row store,
//! the chart cards built from recipes, the active filters and every card's
//! category selection. All mutation goes through [`Dashboard::dispatch`];
//! whenever an event changes state, every card view is recomputed from the
//! filtered rows and each registered [`DashboardObserver`] is notified.
//!
//! A card whose own column is filtered ignores that one filter, so the other
//! values stay on screen (dimmed) and a click on one of them replaces it.

use crate::bucketing::{CategoryBuckets, PillBar, ToggleOutcome, DEFAULT_TOP_K};
use crate::compiler::compile_figure;
use crate::data::{Row, RowStore};
use crate::filter::{FilterChange, FilterChip, FilterState};
use crate::graph::render_figure;
use crate::ir::{Figure, Series};
use crate::recipe::{ChartPlan, Recipe};
use crate::transform::{category_order, compute_series, OTHER_LABEL};
use crate::{OutputFormat, RenderOptions};
use anyhow::{Context, Result};
use serde::Serialize;
use std::fs;
use std::path::PathBuf;
use tracing::{debug, error, info, warn};

/// One dashboard slot: a validated recipe
#[derive(Debug, Clone)]
pub struct ChartCard {
    pub id: usize,
    pub recipe: Recipe,
    pub plan: ChartPlan,
}

/// Everything needed to show one card after the latest state change
#[derive(Debug, Clone, Serialize)]
pub struct CardView {
    pub card: usize,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub column: String,
    pub series: Series,
    pub figure: Figure,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pills: Option<PillBar>,
}

/// A user interaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DashboardEvent {
    /// Click on a bar or pie slice
    ChartClick { card: usize, label: String },
    /// Click on a category pill
    TogglePill { card: usize, label: String },
    /// Click on a card's "All" pill
    ToggleAll { card: usize },
    /// Remove control on a filter chip
    RemoveFilter { column: String },
    /// Global clear-all control
    ClearFilters,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventOutcome {
    Changed,
    /// Nothing to do (e.g. a click on "Other" or on a scatter chart)
    Ignored(String),
    /// The event was invalid for the current state
    Rejected(String),
}

impl EventOutcome {
    pub fn is_changed(&self) -> bool {
        matches!(self, EventOutcome::Changed)
    }
}

/// Receives the recomputed views after every state change
pub trait DashboardObserver {
    fn dashboard_changed(&mut self, views: &[CardView], chips: &[FilterChip]);
}

pub struct Dashboard {
    store: RowStore,
    cards: Vec<ChartCard>,
    filters: FilterState,
    buckets: CategoryBuckets,
    options: RenderOptions,
    views: Vec<CardView>,
    observers: Vec<Box<dyn DashboardObserver>>,
}

impl Dashboard {
    /// Build a session. Recipes that fail validation are logged and skipped.
    pub fn new(store: RowStore, recipes: Vec<Recipe>, options: RenderOptions) -> Self {
        let mut cards = Vec::with_capacity(recipes.len());
        for recipe in recipes {
            match recipe.plan() {
                Ok(plan) => {
                    for column in referenced_columns(&plan) {
                        if !store.is_empty() && !store.has_column(column) {
                            warn!(column, "Recipe references a column that is not in the dataset");
                        }
                    }
                    cards.push(ChartCard {
                        id: cards.len(),
                        recipe,
                        plan,
                    });
                }
                Err(e) => warn!(error = %e, "Skipping invalid chart recipe"),
            }
        }
        info!(cards = cards.len(), rows = store.len(), "Dashboard initialised");

        let mut dashboard = Self {
            store,
            cards,
            filters: FilterState::new(),
            buckets: CategoryBuckets::new(),
            options,
            views: Vec::new(),
            observers: Vec::new(),
        };
        dashboard.recompute();
        dashboard
    }

    /// Register an observer; it immediately receives the current views
    pub fn subscribe(&mut self, mut observer: Box<dyn DashboardObserver>) {
        observer.dashboard_changed(&self.views, &self.filters.chips());
        self.observers.push(observer);
    }

    pub fn store(&self) -> &RowStore {
        &self.store
    }

    pub fn cards(&self) -> &[ChartCard] {
        &self.cards
    }

    pub fn views(&self) -> &[CardView] {
        &self.views
    }

    pub fn view(&self, card: usize) -> Option<&CardView> {
        self.views.get(card)
    }

    pub fn filters(&self) -> &FilterState {
        &self.filters
    }

    pub fn chips(&self) -> Vec<FilterChip> {
        self.filters.chips()
    }

    pub fn options(&self) -> &RenderOptions {
        &self.options
    }

    /// Rows passing every active filter
    pub fn filtered_rows(&self) -> Vec<&Row> {
        self.filters.apply(&self.store.rows)
    }

    /// Apply an event. Any change recomputes every card and notifies observers.
    pub fn dispatch(&mut self, event: DashboardEvent) -> EventOutcome {
        let outcome = self.apply(&event);
        match &outcome {
            EventOutcome::Changed => {
                debug!(?event, "Dashboard state changed");
                self.recompute();
                self.notify();
            }
            EventOutcome::Ignored(reason) => debug!(?event, reason = reason.as_str(), "Event ignored"),
            EventOutcome::Rejected(reason) => debug!(?event, reason = reason.as_str(), "Event rejected"),
        }
        outcome
    }

    /// Set a filter directly (e.g. from the command line), replacing any
    /// existing value for the column
    pub fn set_filter(&mut self, column: &str, value: &str) {
        self.filters.set(column, value);
        self.recompute();
        self.notify();
    }

    fn apply(&mut self, event: &DashboardEvent) -> EventOutcome {
        match event {
            DashboardEvent::ChartClick { card, label } => self.click(*card, label),
            DashboardEvent::TogglePill { card, label } => self.toggle_pill(*card, label),
            DashboardEvent::ToggleAll { card } => self.toggle_all(*card),
            DashboardEvent::RemoveFilter { column } => {
                if self.filters.remove(column) {
                    EventOutcome::Changed
                } else {
                    EventOutcome::Ignored(format!("no filter on '{}'", column))
                }
            }
            DashboardEvent::ClearFilters => {
                if self.filters.clear() {
                    EventOutcome::Changed
                } else {
                    EventOutcome::Ignored("no active filters".to_string())
                }
            }
        }
    }

    fn click(&mut self, card: usize, label: &str) -> EventOutcome {
        let Some(chart) = self.cards.get(card) else {
            return EventOutcome::Rejected(format!("no card {}", card));
        };
        if !chart.plan.is_clickable() {
            return EventOutcome::Ignored(format!("card {} is not click-filterable", card));
        }
        let plotted = self
            .views
            .get(card)
            .map_or(false, |v| v.figure.click_targets().contains(&label));
        if !plotted {
            // A real "Other" answer is a click target; the merged bucket is not
            if label == OTHER_LABEL {
                return EventOutcome::Ignored("the Other bucket cannot be filtered".to_string());
            }
            return EventOutcome::Rejected(format!("card {} has no '{}' element", card, label));
        }

        let column = chart.plan.x_column().to_string();
        match self.filters.toggle(&column, label) {
            FilterChange::Cleared { column } => info!(column = column.as_str(), "Filter cleared"),
            FilterChange::Set { column, value } | FilterChange::Replaced { column, value, .. } => {
                info!(column = column.as_str(), value = value.as_str(), "Filter set")
            }
        }
        EventOutcome::Changed
    }

    fn toggle_pill(&mut self, card: usize, label: &str) -> EventOutcome {
        let Some(full_order) = self.category_order_for(card) else {
            return EventOutcome::Rejected(format!("card {} has no category pills", card));
        };
        if !full_order.iter().any(|(l, _)| l == label) {
            return EventOutcome::Rejected(format!("card {} has no '{}' category", card, label));
        }
        if full_order.len() <= DEFAULT_TOP_K {
            return EventOutcome::Ignored("card shows every category".to_string());
        }
        toggle_outcome(self.buckets.toggle(card, label))
    }

    fn toggle_all(&mut self, card: usize) -> EventOutcome {
        let Some(full_order) = self.category_order_for(card) else {
            return EventOutcome::Rejected(format!("card {} has no category pills", card));
        };
        if full_order.len() <= DEFAULT_TOP_K {
            return EventOutcome::Ignored("card shows every category".to_string());
        }
        toggle_outcome(self.buckets.toggle_all(card, &full_order))
    }

    fn category_order_for(&self, card: usize) -> Option<Vec<(String, usize)>> {
        let chart = self.cards.get(card)?;
        if !chart.plan.is_clickable() {
            return None;
        }
        let rows = card_rows(chart, &self.store, &self.filters);
        Some(category_order(&rows, chart.plan.x_column()))
    }

    /// Recompute every card view from the current filters and selections
    fn recompute(&mut self) {
        let Self {
            store,
            cards,
            filters,
            buckets,
            options,
            views,
            ..
        } = self;

        *views = cards
            .iter()
            .map(|chart| {
                let rows = card_rows(chart, store, filters);
                build_card_view(chart, &rows, filters, buckets, options)
            })
            .collect();
    }

    fn notify(&mut self) {
        let chips = self.filters.chips();
        for observer in self.observers.iter_mut() {
            observer.dashboard_changed(&self.views, &chips);
        }
    }
}

/// Rows a card is computed over. A clickable card skips the filter on its
/// own column; every other card sees the fully filtered rows.
fn card_rows<'a>(chart: &ChartCard, store: &'a RowStore, filters: &FilterState) -> Vec<&'a Row> {
    let column = chart.plan.x_column();
    if chart.plan.is_clickable() && filters.get(column).is_some() {
        filters.apply_except(&store.rows, column)
    } else {
        filters.apply(&store.rows)
    }
}

fn build_card_view(
    chart: &ChartCard,
    rows: &[&Row],
    filters: &FilterState,
    buckets: &mut CategoryBuckets,
    options: &RenderOptions,
) -> CardView {
    let column = chart.plan.x_column().to_string();

    let (series, pills) = if chart.plan.is_clickable() {
        let full_order = category_order(rows, &column);
        let selection = buckets.ensure_selection(chart.id, &full_order);
        let series = compute_series(&chart.plan, rows, selection.as_deref());
        (series, buckets.pills(chart.id, &full_order))
    } else {
        (compute_series(&chart.plan, rows, None), None)
    };

    let figure = compile_figure(chart.id, &chart.recipe, &chart.plan, &series, filters, options);

    CardView {
        card: chart.id,
        title: figure.title.clone(),
        description: chart.recipe.description.clone(),
        column,
        series,
        figure,
        pills,
    }
}

fn toggle_outcome(outcome: ToggleOutcome) -> EventOutcome {
    match outcome {
        ToggleOutcome::RejectedLastLabel => {
            EventOutcome::Rejected("at least one category must stay selected".to_string())
        }
        ToggleOutcome::NoSelection => EventOutcome::Ignored("card shows every category".to_string()),
        _ => EventOutcome::Changed,
    }
}

fn referenced_columns(plan: &ChartPlan) -> Vec<&str> {
    use crate::recipe::Measure;
    match plan {
        ChartPlan::Categorical { x, measure, .. } => match measure {
            Measure::Count => vec![x.as_str()],
            Measure::Sum(y) | Measure::Average(y) => vec![x.as_str(), y.as_str()],
        },
        ChartPlan::Scatter { x, y } => vec![x.as_str(), y.as_str()],
        ChartPlan::Histogram { x } => vec![x.as_str()],
    }
}

/// Figure for a one-off recipe (e.g. a chart attached to a chat reply),
/// computed over every row with no category limit
pub fn preview_figure(recipe: &Recipe, store: &RowStore, options: &RenderOptions) -> Result<Figure> {
    let plan = recipe.plan()?;
    let rows: Vec<&Row> = store.rows.iter().collect();
    let series = compute_series(&plan, &rows, None);
    Ok(compile_figure(0, recipe, &plan, &series, &FilterState::new(), options))
}

// =============================================================================
// Observers
// =============================================================================

/// Writes every card to `<dir>/card-<id>.<ext>` on each change
pub struct ImageWriter {
    dir: PathBuf,
    format: OutputFormat,
}

impl ImageWriter {
    pub fn new(dir: impl Into<PathBuf>, format: OutputFormat) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create output directory '{}'", dir.display()))?;
        Ok(Self { dir, format })
    }

    pub fn path_for(&self, card: usize) -> PathBuf {
        self.dir.join(format!("card-{}.{}", card, self.format.extension()))
    }

    fn write_card(&self, view: &CardView) -> Result<PathBuf> {
        let bytes = render_figure(&view.figure, &self.format)
            .with_context(|| format!("Failed to render card {}", view.card))?;
        let path = self.path_for(view.card);
        fs::write(&path, bytes).with_context(|| format!("Failed to write '{}'", path.display()))?;
        Ok(path)
    }
}

impl DashboardObserver for ImageWriter {
    fn dashboard_changed(&mut self, views: &[CardView], _chips: &[FilterChip]) {
        for view in views {
            // One broken card must not take down the others
            match self.write_card(view) {
                Ok(path) => debug!(card = view.card, path = %path.display(), "Card written"),
                Err(e) => error!(card = view.card, error = %format!("{:#}", e), "Failed to write card"),
            }
        }
    }
}
