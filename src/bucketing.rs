// Per-card Top-K category selection

use crate::data::Row;
use crate::transform::category_order;
use serde::Serialize;
use std::collections::HashMap;

/// Number of categories shown by default, and the cardinality at or below
/// which no selection is needed at all
pub const DEFAULT_TOP_K: usize = 4;

/// Outcome of a selection toggle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToggleOutcome {
    Added,
    Removed,
    /// Removing the label would leave the selection empty
    RejectedLastLabel,
    SelectedAll,
    ResetToDefault,
    /// The card has no selection (few categories, or not built yet)
    NoSelection,
}

impl ToggleOutcome {
    pub fn changed(&self) -> bool {
        matches!(
            self,
            ToggleOutcome::Added
                | ToggleOutcome::Removed
                | ToggleOutcome::SelectedAll
                | ToggleOutcome::ResetToDefault
        )
    }
}

/// One selectable label in a card's pill bar
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Pill {
    pub label: String,
    pub count: usize,
    pub shown: bool,
}

/// Pill bar for a high-cardinality card
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PillBar {
    pub pills: Vec<Pill>,
    pub all_active: bool,
}

/// Category selections keyed by card id. Selections survive filter changes;
/// only a card with no selection yet gets the default Top-K.
#[derive(Debug, Clone, Default)]
pub struct CategoryBuckets {
    selections: HashMap<usize, Vec<String>>,
}

impl CategoryBuckets {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the labels to show for `card`, given the full category order
    /// of its column over the currently filtered rows. `None` means the
    /// column has few enough categories to always show all of them.
    pub fn ensure_selection(&mut self, card: usize, full_order: &[(String, usize)]) -> Option<Vec<String>> {
        if full_order.len() <= DEFAULT_TOP_K {
            return None;
        }
        let selection = self
            .selections
            .entry(card)
            .or_insert_with(|| default_selection(full_order));
        Some(selection.clone())
    }

    /// Same as [`ensure_selection`](Self::ensure_selection), computing the
    /// category order of `column` over `rows`
    pub fn ensure_selection_for(&mut self, card: usize, column: &str, rows: &[&Row]) -> Option<Vec<String>> {
        let full_order = category_order(rows, column);
        self.ensure_selection(card, &full_order)
    }

    pub fn selection(&self, card: usize) -> Option<&[String]> {
        self.selections.get(&card).map(Vec::as_slice)
    }

    /// Add `label` when absent, remove it when present. The last label
    /// cannot be removed.
    pub fn toggle(&mut self, card: usize, label: &str) -> ToggleOutcome {
        let Some(selection) = self.selections.get_mut(&card) else {
            return ToggleOutcome::NoSelection;
        };
        match selection.iter().position(|l| l == label) {
            Some(_) if selection.len() <= 1 => ToggleOutcome::RejectedLastLabel,
            Some(idx) => {
                selection.remove(idx);
                ToggleOutcome::Removed
            }
            None => {
                selection.push(label.to_string());
                ToggleOutcome::Added
            }
        }
    }

    /// Flip between "every category" and the default Top-K
    pub fn toggle_all(&mut self, card: usize, full_order: &[(String, usize)]) -> ToggleOutcome {
        let Some(selection) = self.selections.get_mut(&card) else {
            return ToggleOutcome::NoSelection;
        };
        if selection.len() == full_order.len() {
            *selection = default_selection(full_order);
            ToggleOutcome::ResetToDefault
        } else {
            *selection = full_order.iter().map(|(label, _)| label.clone()).collect();
            ToggleOutcome::SelectedAll
        }
    }

    /// Pill bar for `card`, or `None` when the card needs no selection UI
    pub fn pills(&self, card: usize, full_order: &[(String, usize)]) -> Option<PillBar> {
        if full_order.len() <= DEFAULT_TOP_K {
            return None;
        }
        let selection = self.selections.get(&card)?;
        let pills = full_order
            .iter()
            .map(|(label, count)| Pill {
                label: label.clone(),
                count: *count,
                shown: selection.contains(label),
            })
            .collect();
        Some(PillBar {
            pills,
            all_active: selection.len() == full_order.len(),
        })
    }
}

fn default_selection(full_order: &[(String, usize)]) -> Vec<String> {
    full_order
        .iter()
        .take(DEFAULT_TOP_K)
        .map(|(label, _)| label.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn order(labels: &[&str]) -> Vec<(String, usize)> {
        labels
            .iter()
            .enumerate()
            .map(|(i, l)| (l.to_string(), labels.len() - i))
            .collect()
    }

    #[test]
    fn test_small_columns_need_no_selection() {
        let mut buckets = CategoryBuckets::new();
        assert_eq!(buckets.ensure_selection(0, &order(&["a", "b", "c", "d"])), None);
        assert_eq!(buckets.toggle(0, "a"), ToggleOutcome::NoSelection);
        assert!(buckets.pills(0, &order(&["a", "b"])).is_none());
    }

    #[test]
    fn test_default_top_four() {
        let mut buckets = CategoryBuckets::new();
        let full = order(&["a", "b", "c", "d", "e", "f"]);
        assert_eq!(buckets.ensure_selection(0, &full).unwrap(), vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn test_selection_persists_when_order_changes() {
        let mut buckets = CategoryBuckets::new();
        buckets.ensure_selection(0, &order(&["a", "b", "c", "d", "e"]));
        buckets.toggle(0, "e");
        let reordered = order(&["e", "d", "c", "b", "a", "f"]);
        assert_eq!(
            buckets.ensure_selection(0, &reordered).unwrap(),
            vec!["a", "b", "c", "d", "e"]
        );
    }

    #[test]
    fn test_toggle_add_and_remove() {
        let mut buckets = CategoryBuckets::new();
        let full = order(&["a", "b", "c", "d", "e"]);
        buckets.ensure_selection(0, &full);
        assert_eq!(buckets.toggle(0, "e"), ToggleOutcome::Added);
        assert_eq!(buckets.selection(0).unwrap().last().unwrap(), "e");
        assert_eq!(buckets.toggle(0, "a"), ToggleOutcome::Removed);
        assert!(!buckets.selection(0).unwrap().contains(&"a".to_string()));
    }

    #[test]
    fn test_selection_floor() {
        let mut buckets = CategoryBuckets::new();
        let full = order(&["a", "b", "c", "d", "e"]);
        buckets.ensure_selection(0, &full);
        for _ in 0..10 {
            let first = buckets.selection(0).unwrap()[0].clone();
            buckets.toggle(0, &first);
            assert!(!buckets.selection(0).unwrap().is_empty());
        }
        assert_eq!(buckets.selection(0).unwrap().len(), 1);
        let last = buckets.selection(0).unwrap()[0].clone();
        assert_eq!(buckets.toggle(0, &last), ToggleOutcome::RejectedLastLabel);
        assert_eq!(buckets.selection(0).unwrap().len(), 1);
    }

    #[test]
    fn test_toggle_all_flips() {
        let mut buckets = CategoryBuckets::new();
        let full = order(&["a", "b", "c", "d", "e", "f"]);
        buckets.ensure_selection(0, &full);
        assert_eq!(buckets.toggle_all(0, &full), ToggleOutcome::SelectedAll);
        assert_eq!(buckets.selection(0).unwrap().len(), 6);
        assert!(buckets.pills(0, &full).unwrap().all_active);

        assert_eq!(buckets.toggle_all(0, &full), ToggleOutcome::ResetToDefault);
        assert_eq!(buckets.selection(0).unwrap(), &["a", "b", "c", "d"]);
        assert!(!buckets.pills(0, &full).unwrap().all_active);
    }

    #[test]
    fn test_cards_are_independent() {
        let mut buckets = CategoryBuckets::new();
        let full = order(&["a", "b", "c", "d", "e"]);
        buckets.ensure_selection(0, &full);
        buckets.ensure_selection(1, &full);
        buckets.toggle(0, "a");
        assert_eq!(buckets.selection(0).unwrap().len(), 3);
        assert_eq!(buckets.selection(1).unwrap().len(), 4);
    }

    #[test]
    fn test_ensure_selection_for_rows() {
        let rows: Vec<Row> = ["a", "a", "b", "c", "d", "e", ""]
            .iter()
            .map(|v| Row::from_pairs([("col", *v)]))
            .collect();
        let refs: Vec<&Row> = rows.iter().collect();
        let mut buckets = CategoryBuckets::new();
        let selection = buckets.ensure_selection_for(3, "col", &refs).unwrap();
        assert_eq!(selection, vec!["a", "Unknown", "b", "c"]);
    }

    #[test]
    fn test_pills_report_shown_state() {
        let mut buckets = CategoryBuckets::new();
        let full = order(&["a", "b", "c", "d", "e"]);
        buckets.ensure_selection(0, &full);
        let bar = buckets.pills(0, &full).unwrap();
        let shown: Vec<bool> = bar.pills.iter().map(|p| p.shown).collect();
        assert_eq!(shown, vec![true, true, true, true, false]);
        assert_eq!(bar.pills[0].count, 5);
    }
}
