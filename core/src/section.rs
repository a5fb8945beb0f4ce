//! Owned section state and the closed set of commands that change it.
//!
//! Every mutation of a section goes through [`SectionState::apply`] (or its
//! in-place form [`SectionState::dispatch`]). [`SectionHandle`] shares one
//! section between tasks and broadcasts the [`TableEvent`]s that commands
//! produce.

use crate::alert::AlertRecord;
use crate::alert::BugId;
use crate::alert::RawAlert;
use crate::group::SharedGrouper;
use crate::group::group_alerts;
use crate::recent_bugs::RecentBug;
use crate::recent_bugs::record_existing;
use crate::recent_bugs::record_new;
use crate::request::AlertsQuery;
use crate::table::SortColumn;
use crate::table::TableState;
use crate::table::sort_groups;
use serde::Serialize;
use std::collections::BTreeMap;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::sync::broadcast;
use tracing::debug;

const EVENT_CAPACITY: usize = 64;

/// Transient notification left by a successful triage action. The payload is
/// the token the expiry timer compares against.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum TriageIntent {
    #[default]
    None,
    TriagedNew {
        bug_id: u64,
    },
    TriagedExisting {
        bug_id: u64,
    },
    Ignored {
        count: usize,
    },
}

impl TriageIntent {
    pub fn has_triaged_new(&self) -> bool {
        matches!(self, TriageIntent::TriagedNew { .. })
    }

    pub fn has_triaged_existing(&self) -> bool {
        matches!(self, TriageIntent::TriagedExisting { .. })
    }

    pub fn has_ignored(&self) -> bool {
        matches!(self, TriageIntent::Ignored { .. })
    }

    pub fn triaged_bug_id(&self) -> Option<u64> {
        match self {
            TriageIntent::TriagedNew { bug_id } | TriageIntent::TriagedExisting { bug_id } => {
                Some(*bug_id)
            }
            _ => None,
        }
    }

    pub fn ignored_count(&self) -> usize {
        match self {
            TriageIntent::Ignored { count } => *count,
            _ => 0,
        }
    }
}

/// Progress of a nudge on one alert.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NudgeState {
    pub is_loading: bool,
    pub errors: Vec<String>,
}

/// Change notifications for a presentation layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableEvent {
    SelectionChanged,
    SortChanged {
        column: SortColumn,
        descending: bool,
    },
    AlertChosen {
        group_index: usize,
        alert_index: usize,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum SectionCommand {
    /// Replace the filters. Groups are discarded and any load in flight is
    /// abandoned.
    SetQuery(AlertsQuery),
    /// Begin a new load: placeholders, cleared errors, next generation.
    StartLoading,
    ReceiveAlerts {
        alerts: Vec<RawAlert>,
        errors: Vec<String>,
        total_count: usize,
    },
    FinalizeAlerts,
    Sort(SortColumn),
    SelectAlert {
        group_index: usize,
        alert_index: usize,
        shift_key: bool,
    },
    SelectAllAlerts,
    /// Select exactly these keys.
    SelectKeys(Vec<String>),
    /// Toggle the header row of the first group.
    SelectFirstGroup,
    ToggleGroupExpanded(usize),
    ToggleTriagedExpanded(usize),
    /// Open or close the detail view of one alert.
    ChooseAlert {
        group_index: usize,
        alert_index: usize,
    },
    CursorDown,
    CursorUp,
    SelectCursor,
    ExpandCursor,
    ExpandTriagedCursor,
    Hotkey(char),
    RemoveOrUpdateAlerts {
        keys: Vec<String>,
        bug_id: BugId,
    },
    SetLoading(bool),
    ReportError(String),
    ShowTriagedNew {
        bug_id: u64,
        summary: String,
    },
    ShowTriagedExisting {
        bug_id: u64,
    },
    ShowIgnored {
        count: usize,
    },
    /// Clear the notice only if it still equals the captured one.
    ExpireNotice(TriageIntent),
    NudgeStarted {
        key: String,
    },
    NudgeSucceeded {
        key: String,
        start_revision: i64,
        end_revision: i64,
    },
    NudgeFailed {
        key: String,
        error: String,
    },
}

#[derive(Debug, Clone)]
pub struct SectionState {
    pub query: AlertsQuery,
    pub table: TableState,
    /// Fetch and mutation failures, deduplicated, oldest first.
    pub errors: Vec<String>,
    pub is_loading: bool,
    /// Generation of the current load.
    pub started: u64,
    pub total_count: usize,
    /// Keyboard cursor as `(group, alert)`.
    pub cursor: Option<(usize, usize)>,
    pub is_hotkey_sorting: bool,
    pub is_helping: bool,
    /// Key of the alert open in the detail view.
    pub selected_alert_key: Option<String>,
    pub notice: TriageIntent,
    pub recent_bugs: Vec<RecentBug>,
    pub nudges: BTreeMap<String, NudgeState>,
    grouper: SharedGrouper,
    pending_events: Vec<TableEvent>,
}

impl Default for SectionState {
    fn default() -> Self {
        Self::new(AlertsQuery::default())
    }
}

impl SectionState {
    pub fn new(query: AlertsQuery) -> Self {
        Self {
            table: TableState::new(query.showing_triaged, SortColumn::default(), false),
            query,
            errors: Vec::new(),
            is_loading: false,
            started: 0,
            total_count: 0,
            cursor: None,
            is_hotkey_sorting: false,
            is_helping: false,
            selected_alert_key: None,
            notice: TriageIntent::None,
            recent_bugs: Vec::new(),
            nudges: BTreeMap::new(),
            grouper: SharedGrouper::default(),
            pending_events: Vec::new(),
        }
    }

    pub fn with_grouper(mut self, grouper: SharedGrouper) -> Self {
        self.grouper = grouper;
        self
    }

    pub fn with_sort(mut self, column: SortColumn, descending: bool) -> Self {
        self.table.sort_column = column;
        self.table.sort_descending = descending;
        self
    }

    pub fn with_recent_bugs(mut self, recent_bugs: Vec<RecentBug>) -> Self {
        self.recent_bugs = recent_bugs;
        self
    }

    /// Apply one command and return the new state.
    pub fn apply(mut self, command: SectionCommand) -> Self {
        self.dispatch(command);
        self
    }

    /// Events produced since the last call.
    pub fn take_events(&mut self) -> Vec<TableEvent> {
        std::mem::take(&mut self.pending_events)
    }

    pub fn summary(&self) -> String {
        self.table.summary(self.total_count)
    }

    pub fn selected_keys(&self) -> Vec<String> {
        self.table
            .selected_alerts()
            .into_iter()
            .map(|alert| alert.key.clone())
            .collect()
    }

    pub fn find_alert(&self, key: &str) -> Option<&AlertRecord> {
        self.table
            .alert_groups
            .iter()
            .flat_map(|group| group.alerts.iter())
            .find(|alert| alert.key == key)
    }

    pub fn dispatch(&mut self, command: SectionCommand) {
        match command {
            SectionCommand::SetQuery(query) => {
                self.table = TableState::new(
                    query.showing_triaged,
                    self.table.sort_column,
                    self.table.sort_descending,
                );
                self.query = query;
                self.errors.clear();
                self.total_count = 0;
                self.cursor = None;
                self.selected_alert_key = None;
                self.is_loading = false;
                self.started += 1;
            }
            SectionCommand::StartLoading => {
                self.errors.clear();
                self.table.show_placeholders();
                self.is_loading = true;
                self.started += 1;
                self.total_count = 0;
                self.cursor = None;
                self.selected_alert_key = None;
            }
            SectionCommand::ReceiveAlerts {
                alerts,
                errors,
                total_count,
            } => self.receive_alerts(alerts, errors, total_count),
            SectionCommand::FinalizeAlerts => {
                self.is_loading = false;
                if self.table.are_placeholders && self.query.has_sources() {
                    self.table.alert_groups.clear();
                    self.table.are_placeholders = false;
                }
            }
            SectionCommand::Sort(column) => self.sort(column),
            SectionCommand::SelectAlert {
                group_index,
                alert_index,
                shift_key,
            } => {
                if self.table.select_alert(group_index, alert_index, shift_key) {
                    self.emit(TableEvent::SelectionChanged);
                }
            }
            SectionCommand::SelectAllAlerts => {
                if !self.table.are_placeholders {
                    self.table.select_all_alerts();
                    self.emit(TableEvent::SelectionChanged);
                }
            }
            SectionCommand::SelectKeys(keys) => {
                let keys: HashSet<String> = keys.into_iter().collect();
                self.table.select_keys(&keys);
                self.emit(TableEvent::SelectionChanged);
            }
            SectionCommand::SelectFirstGroup => {
                let header = self
                    .table
                    .alert_groups
                    .first()
                    .map(|group| group.first_untriaged_index().unwrap_or(0));
                if let Some(alert_index) = header
                    && self.table.select_alert(0, alert_index, false)
                {
                    self.emit(TableEvent::SelectionChanged);
                }
            }
            SectionCommand::ToggleGroupExpanded(group_index) => {
                self.table.toggle_group_expanded(group_index);
            }
            SectionCommand::ToggleTriagedExpanded(group_index) => {
                self.table.toggle_triaged_expanded(group_index);
            }
            SectionCommand::ChooseAlert {
                group_index,
                alert_index,
            } => self.choose_alert(group_index, alert_index),
            SectionCommand::CursorDown => self.move_cursor(true),
            SectionCommand::CursorUp => self.move_cursor(false),
            SectionCommand::SelectCursor => {
                if let Some((group_index, alert_index)) = self.cursor
                    && self.table.select_alert(group_index, alert_index, false)
                {
                    self.emit(TableEvent::SelectionChanged);
                }
            }
            SectionCommand::ExpandCursor => {
                if let Some((group_index, _)) = self.cursor {
                    self.table.toggle_group_expanded(group_index);
                }
            }
            SectionCommand::ExpandTriagedCursor => {
                if let Some((group_index, _)) = self.cursor {
                    self.table.toggle_triaged_expanded(group_index);
                }
            }
            SectionCommand::Hotkey(key) => self.hotkey(key),
            SectionCommand::RemoveOrUpdateAlerts { keys, bug_id } => {
                self.remove_or_update_alerts(keys, bug_id);
            }
            SectionCommand::SetLoading(is_loading) => self.is_loading = is_loading,
            SectionCommand::ReportError(error) => self.append_errors([error]),
            SectionCommand::ShowTriagedNew { bug_id, summary } => {
                self.notice = TriageIntent::TriagedNew { bug_id };
                record_new(&mut self.recent_bugs, bug_id, summary);
            }
            SectionCommand::ShowTriagedExisting { bug_id } => {
                self.notice = TriageIntent::TriagedExisting { bug_id };
                record_existing(&mut self.recent_bugs, bug_id);
            }
            SectionCommand::ShowIgnored { count } => {
                self.notice = TriageIntent::Ignored { count };
            }
            SectionCommand::ExpireNotice(captured) => {
                if self.notice == captured {
                    self.notice = TriageIntent::None;
                } else {
                    debug!(?captured, live = ?self.notice, "notice superseded; not expiring");
                }
            }
            SectionCommand::NudgeStarted { key } => {
                let nudge = self.nudges.entry(key).or_default();
                nudge.is_loading = true;
                nudge.errors.clear();
            }
            SectionCommand::NudgeSucceeded {
                key,
                start_revision,
                end_revision,
            } => {
                for alert in self
                    .table
                    .alert_groups
                    .iter_mut()
                    .flat_map(|group| group.alerts.iter_mut())
                    .filter(|alert| alert.key == key)
                {
                    alert.start_revision = start_revision;
                    alert.end_revision = end_revision;
                }
                self.nudges.entry(key).or_default().is_loading = false;
            }
            SectionCommand::NudgeFailed { key, error } => {
                let nudge = self.nudges.entry(key).or_default();
                nudge.is_loading = false;
                nudge.errors.push(error);
            }
        }
    }

    fn emit(&mut self, event: TableEvent) {
        self.pending_events.push(event);
    }

    fn append_errors(&mut self, errors: impl IntoIterator<Item = String>) {
        for error in errors {
            if !self.errors.contains(&error) {
                self.errors.push(error);
            }
        }
    }

    fn receive_alerts(&mut self, alerts: Vec<RawAlert>, errors: Vec<String>, total_count: usize) {
        self.append_errors(errors);

        // Regroup from every alert received so far.
        let mut alerts: Vec<AlertRecord> = alerts.into_iter().map(AlertRecord::transform).collect();
        for group in &self.table.alert_groups {
            alerts.extend(group.alerts.iter().cloned());
        }

        let previously_selected = self.table.selected_alerts_count;
        if self.query.is_bug_only() {
            for alert in &mut alerts {
                alert.is_selected = true;
            }
        }

        if alerts.is_empty() {
            return;
        }

        let mut expanded_groups = HashSet::new();
        let mut expanded_triaged = HashSet::new();
        for group in &self.table.alert_groups {
            let Some(first) = group.alerts.first() else {
                continue;
            };
            if group.is_expanded {
                expanded_groups.insert(first.key.clone());
            }
            if group.triaged.is_expanded {
                expanded_triaged.insert(first.key.clone());
            }
        }

        let showing_triaged = self.query.showing_triaged;
        let group_bugs = showing_triaged && self.query.bugs.len() == 1;
        let mut groups = group_alerts(&self.grouper, alerts, group_bugs, showing_triaged);
        for group in &mut groups {
            group.is_expanded = group
                .alerts
                .iter()
                .any(|alert| expanded_groups.contains(&alert.key));
            group.triaged.is_expanded = group
                .alerts
                .iter()
                .any(|alert| expanded_triaged.contains(&alert.key));
        }

        if !showing_triaged && !self.query.sheriffs.is_empty() {
            groups.retain(|group| !group.is_fully_triaged());
            if groups.is_empty() {
                return;
            }
        }

        self.table.alert_groups = sort_groups(
            groups,
            self.table.sort_column,
            self.table.sort_descending,
            showing_triaged,
        );
        self.table.are_placeholders = false;
        if total_count > 0 {
            self.total_count = total_count;
        }
        self.table.update_columns();
        self.table.update_selected_count();
        self.clamp_cursor();
        if self.table.selected_alerts_count != previously_selected {
            self.emit(TableEvent::SelectionChanged);
        }
    }

    fn sort(&mut self, column: SortColumn) {
        if self.table.sort(column) {
            self.cursor = None;
            self.emit(TableEvent::SortChanged {
                column: self.table.sort_column,
                descending: self.table.sort_descending,
            });
        }
    }

    fn choose_alert(&mut self, group_index: usize, alert_index: usize) {
        if self.table.are_placeholders {
            return;
        }
        let Some(alert) = self
            .table
            .alert_groups
            .get_mut(group_index)
            .and_then(|group| group.alerts.get_mut(alert_index))
        else {
            return;
        };
        let newly_selected = !alert.is_selected;
        alert.is_selected = true;
        let key = alert.key.clone();

        if self.selected_alert_key.as_ref() == Some(&key) {
            self.selected_alert_key = None;
        } else {
            self.selected_alert_key = Some(key);
        }
        if newly_selected {
            self.table.update_selected_count();
            self.emit(TableEvent::SelectionChanged);
        }
        self.emit(TableEvent::AlertChosen {
            group_index,
            alert_index,
        });
    }

    fn move_cursor(&mut self, down: bool) {
        if self.table.are_placeholders {
            return;
        }
        let positions = self.table.displayed_positions();
        let (Some(first), Some(last)) = (positions.first(), positions.last()) else {
            return;
        };
        let next = match (self.cursor, down) {
            (None, true) => *first,
            (None, false) => *last,
            (Some(cursor), true) => positions
                .iter()
                .find(|position| **position > cursor)
                .copied()
                .unwrap_or(*first),
            (Some(cursor), false) => positions
                .iter()
                .rev()
                .find(|position| **position < cursor)
                .copied()
                .unwrap_or(*last),
        };
        self.cursor = Some(next);
    }

    fn clamp_cursor(&mut self) {
        if let Some((group_index, alert_index)) = self.cursor
            && self.table.alert(group_index, alert_index).is_none()
        {
            self.cursor = None;
        }
    }

    fn hotkey(&mut self, key: char) {
        if self.is_hotkey_sorting {
            self.is_hotkey_sorting = false;
            if let Some(column) = SortColumn::from_hotkey(key) {
                self.sort(column);
            }
            return;
        }
        match key {
            '?' => self.is_helping = !self.is_helping,
            'j' => self.dispatch(SectionCommand::CursorDown),
            'k' => self.dispatch(SectionCommand::CursorUp),
            'x' => self.dispatch(SectionCommand::SelectCursor),
            'g' => self.dispatch(SectionCommand::ExpandCursor),
            't' => self.dispatch(SectionCommand::ExpandTriagedCursor),
            's' => self.is_hotkey_sorting = !self.table.are_placeholders,
            _ => {}
        }
    }

    fn remove_or_update_alerts(&mut self, keys: Vec<String>, bug_id: BugId) {
        let keys: HashSet<String> = keys.into_iter().collect();
        if self.table.showing_triaged || bug_id == BugId::Untriaged {
            for group in &mut self.table.alert_groups {
                for alert in &mut group.alerts {
                    if keys.contains(&alert.key) {
                        alert.bug_id = bug_id;
                    }
                }
                group.recount();
            }
        } else {
            for group in &mut self.table.alert_groups {
                group.alerts.retain(|alert| !keys.contains(&alert.key));
                group.recount();
            }
            self.table
                .alert_groups
                .retain(|group| group.untriaged_count() > 0);
        }
        let detail_removed = self
            .selected_alert_key
            .as_deref()
            .is_some_and(|key| self.find_alert(key).is_none());
        if detail_removed {
            self.selected_alert_key = None;
        }
        self.table.update_selected_count();
        self.table.update_columns();
        self.clamp_cursor();
        self.emit(TableEvent::SelectionChanged);
    }
}

/// Shared, lockable handle to one section.
#[derive(Debug, Clone)]
pub struct SectionHandle {
    state: Arc<Mutex<SectionState>>,
    events: broadcast::Sender<TableEvent>,
}

impl SectionHandle {
    pub fn new(state: SectionState) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            state: Arc::new(Mutex::new(state)),
            events,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TableEvent> {
        self.events.subscribe()
    }

    /// Apply `command` atomically and broadcast the events it produced.
    pub async fn dispatch(&self, command: SectionCommand) {
        let events = {
            let mut state = self.state.lock().await;
            state.dispatch(command);
            state.take_events()
        };
        for event in events {
            // No subscribers is fine.
            let _ = self.events.send(event);
        }
    }

    /// Apply `command` only while `generation` is still the current load.
    /// Returns false when a newer load has started.
    pub async fn dispatch_for_load(&self, generation: u64, command: SectionCommand) -> bool {
        let events = {
            let mut state = self.state.lock().await;
            if state.started != generation {
                return false;
            }
            state.dispatch(command);
            state.take_events()
        };
        for event in events {
            let _ = self.events.send(event);
        }
        true
    }

    /// Start a new load and return its generation.
    pub async fn begin_load(&self) -> u64 {
        let mut state = self.state.lock().await;
        state.dispatch(SectionCommand::StartLoading);
        state.started
    }

    pub async fn read<R>(&self, f: impl FnOnce(&SectionState) -> R) -> R {
        let state = self.state.lock().await;
        f(&state)
    }

    pub async fn snapshot(&self) -> SectionState {
        self.state.lock().await.clone()
    }
}
