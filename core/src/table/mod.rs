//! Alert table: sorting, visibility and selection over the current groups.

mod sort;
mod visibility;

pub use sort::SortColumn;
pub use sort::compare_alerts;
pub use sort::sort_groups;
pub use visibility::should_display_alert;
pub use visibility::should_display_expand_group_button;
pub use visibility::should_display_expand_triaged_button;

use crate::alert::AlertRecord;
use crate::group::AlertGroup;
use serde::Serialize;
use std::collections::HashSet;

/// Every selected alert, in display order.
pub fn selected_alerts(groups: &[AlertGroup]) -> Vec<&AlertRecord> {
    groups
        .iter()
        .flat_map(|group| group.alerts.iter())
        .filter(|alert| alert.is_selected)
        .collect()
}

/// True when there is nothing left to triage.
pub fn all_triaged(groups: &[AlertGroup], showing_triaged: bool) -> bool {
    if showing_triaged {
        return groups.is_empty();
    }
    groups.iter().all(AlertGroup::is_fully_triaged)
}

fn plural(count: usize) -> &'static str {
    if count == 1 { "" } else { "s" }
}

/// One-line description of what the table displays.
pub fn summary(
    showing_triaged: bool,
    groups: Option<&[AlertGroup]>,
    total_count: usize,
) -> String {
    let Some(groups) = groups else {
        return "0 alerts".to_string();
    };
    let mut group_count = 0;
    let mut displayed_count = 0;
    for group in groups {
        let displayed = group.displayed_count(showing_triaged);
        if showing_triaged || displayed > 0 {
            group_count += 1;
            displayed_count += displayed;
        }
    }
    let total_count = total_count.max(displayed_count);
    format!(
        "{displayed_count} displayed in {group_count} group{} of {total_count} alert{}",
        plural(group_count),
        plural(total_count),
    )
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TableState {
    pub alert_groups: Vec<AlertGroup>,
    /// The table is waiting for its first batch.
    pub are_placeholders: bool,
    /// Anchor for shift-click range selection.
    pub previous_selected_alert_key: Option<String>,
    pub selected_alerts_count: usize,
    pub show_bug_column: bool,
    pub show_master_column: bool,
    pub show_test_case_column: bool,
    pub show_triaged_column: bool,
    pub showing_triaged: bool,
    pub sort_column: SortColumn,
    pub sort_descending: bool,
}

impl Default for TableState {
    fn default() -> Self {
        Self {
            alert_groups: Vec::new(),
            are_placeholders: false,
            previous_selected_alert_key: None,
            selected_alerts_count: 0,
            show_bug_column: true,
            show_master_column: true,
            show_test_case_column: true,
            show_triaged_column: true,
            showing_triaged: false,
            sort_column: SortColumn::default(),
            sort_descending: false,
        }
    }
}

impl TableState {
    pub fn new(showing_triaged: bool, sort_column: SortColumn, sort_descending: bool) -> Self {
        Self {
            showing_triaged,
            sort_column,
            sort_descending,
            ..Default::default()
        }
    }

    /// Clear the table while a load starts.
    pub fn show_placeholders(&mut self) {
        self.alert_groups.clear();
        self.are_placeholders = true;
        self.previous_selected_alert_key = None;
        self.selected_alerts_count = 0;
    }

    /// Groups as the presentation layer should see them.
    pub fn groups(&self) -> Option<&[AlertGroup]> {
        (!self.are_placeholders).then_some(self.alert_groups.as_slice())
    }

    pub fn alert(&self, group_index: usize, alert_index: usize) -> Option<&AlertRecord> {
        self.alert_groups.get(group_index)?.alerts.get(alert_index)
    }

    pub fn selected_alerts(&self) -> Vec<&AlertRecord> {
        selected_alerts(&self.alert_groups)
    }

    pub fn summary(&self, total_count: usize) -> String {
        summary(self.showing_triaged, self.groups(), total_count)
    }

    /// Sort by `column`. Sorting by the current column again flips the
    /// direction; a new column starts ascending. Returns false on
    /// placeholders.
    pub fn sort(&mut self, column: SortColumn) -> bool {
        if self.are_placeholders {
            return false;
        }
        self.sort_descending = if self.sort_column == column {
            !self.sort_descending
        } else {
            false
        };
        self.sort_column = column;
        self.resort();
        true
    }

    /// Re-apply the current sort.
    pub fn resort(&mut self) {
        let groups = std::mem::take(&mut self.alert_groups);
        self.alert_groups = sort_groups(
            groups,
            self.sort_column,
            self.sort_descending,
            self.showing_triaged,
        );
    }

    /// Toggle the alert at `(group_index, alert_index)`.
    ///
    /// A plain click on a collapsed group's header row toggles every eligible
    /// member; any other plain click toggles one row. A shift-click sets every
    /// alert between the anchor and the clicked one, inclusive, to the
    /// clicked alert's new value. Returns false when nothing changed.
    pub fn select_alert(&mut self, group_index: usize, alert_index: usize, shift_key: bool) -> bool {
        if self.are_placeholders {
            return false;
        }
        let Some(alert) = self.alert(group_index, alert_index) else {
            return false;
        };
        let key = alert.key.clone();
        // Shift-clicking the anchor itself keeps it as it is.
        let is_anchor = shift_key && self.previous_selected_alert_key.as_ref() == Some(&key);
        let is_selected = if is_anchor {
            alert.is_selected
        } else {
            !alert.is_selected
        };

        if shift_key {
            self.select_range(&key, is_selected);
        } else {
            let showing_triaged = self.showing_triaged;
            let group = &mut self.alert_groups[group_index];
            let toggle_all =
                !group.is_expanded && group.header_index(showing_triaged) == Some(alert_index);
            if toggle_all {
                for alert in &mut group.alerts {
                    if showing_triaged || !alert.is_triaged() {
                        alert.is_selected = is_selected;
                    }
                }
            } else {
                group.alerts[alert_index].is_selected = is_selected;
            }
        }

        self.previous_selected_alert_key = Some(key);
        self.update_selected_count();
        true
    }

    fn select_range(&mut self, key: &str, is_selected: bool) {
        let previous = self.previous_selected_alert_key.as_deref();
        let mut bounds: Option<(usize, usize)> = previous.is_none().then_some((0, 0));
        let flat = self
            .alert_groups
            .iter_mut()
            .flat_map(|group| group.alerts.iter_mut());
        let mut alerts: Vec<&mut AlertRecord> = Vec::new();
        for (index, alert) in flat.enumerate() {
            if alert.key == key || Some(alert.key.as_str()) == previous {
                bounds = Some(match bounds {
                    Some((min, max)) => (min.min(index), max.max(index)),
                    None => (index, index),
                });
            }
            alerts.push(alert);
        }
        if let Some((min, max)) = bounds {
            for alert in &mut alerts[min..=max] {
                alert.is_selected = is_selected;
            }
        }
    }

    /// Select everything when nothing is selected, otherwise deselect
    /// everything.
    pub fn select_all_alerts(&mut self) {
        let select = self.selected_alerts_count == 0;
        for alert in self.alert_groups.iter_mut().flat_map(|g| g.alerts.iter_mut()) {
            alert.is_selected = select;
        }
        self.update_selected_count();
    }

    /// Select exactly the alerts whose key is in `keys`.
    pub fn select_keys(&mut self, keys: &HashSet<String>) {
        for alert in self.alert_groups.iter_mut().flat_map(|g| g.alerts.iter_mut()) {
            alert.is_selected = keys.contains(&alert.key);
        }
        self.update_selected_count();
    }

    pub fn toggle_group_expanded(&mut self, group_index: usize) -> bool {
        match self.alert_groups.get_mut(group_index) {
            Some(group) if !self.are_placeholders => {
                group.is_expanded = !group.is_expanded;
                true
            }
            _ => false,
        }
    }

    pub fn toggle_triaged_expanded(&mut self, group_index: usize) -> bool {
        match self.alert_groups.get_mut(group_index) {
            Some(group) if !self.are_placeholders => {
                group.triaged.is_expanded = !group.triaged.is_expanded;
                true
            }
            _ => false,
        }
    }

    pub fn update_selected_count(&mut self) {
        self.selected_alerts_count = selected_alerts(&self.alert_groups).len();
    }

    /// Hide the bug, master, test case and triaged columns when they carry
    /// no information.
    pub fn update_columns(&mut self) {
        let mut show_bug_column = false;
        let mut show_triaged_column = false;
        let mut masters = HashSet::new();
        let mut cases = HashSet::new();
        for group in &self.alert_groups {
            if group.triaged.count < group.alerts.len() {
                show_triaged_column = true;
            }
            for alert in &group.alerts {
                show_bug_column |= alert.is_triaged();
                masters.insert(alert.master.as_str());
                cases.insert(alert.test_case.as_str());
            }
        }
        self.show_bug_column = show_bug_column;
        self.show_master_column = masters.len() > 1;
        self.show_test_case_column = cases.len() > 1;
        self.show_triaged_column = show_triaged_column && !self.showing_triaged;
    }

    /// `(group, alert)` positions of every displayed row, in display order.
    pub fn displayed_positions(&self) -> Vec<(usize, usize)> {
        let mut positions = Vec::new();
        for (group_index, group) in self.alert_groups.iter().enumerate() {
            for alert_index in 0..group.alerts.len() {
                if should_display_alert(
                    false,
                    self.showing_triaged,
                    group,
                    alert_index,
                    group.triaged.is_expanded,
                ) {
                    positions.push((group_index, alert_index));
                }
            }
        }
        positions
    }
}
