use super::support::RecordingTracker;
use super::support::raw_alert;
use super::support::sheriff_query;
use perfsheriff_core::AlertsQuery;
use perfsheriff_core::BugId;
use perfsheriff_core::NewBugFields;
use perfsheriff_core::RawAlert;
use perfsheriff_core::SectionCommand;
use perfsheriff_core::SectionHandle;
use perfsheriff_core::SectionState;
use perfsheriff_core::SheriffConfig;
use perfsheriff_core::TableEvent;
use perfsheriff_core::TriageCoordinator;
use perfsheriff_core::TriageIntent;
use perfsheriff_core::TriageOutcome;
use pretty_assertions::assert_eq;
use std::sync::Arc;
use std::time::Duration;

/// Two groups: {a, b} in speedometer and {c, d} in jetstream.
fn alerts() -> Vec<RawAlert> {
    vec![
        raw_alert("a", "speedometer", 100, 105),
        raw_alert("b", "speedometer", 101, 104),
        raw_alert("c", "jetstream", 200, 205),
        raw_alert("d", "jetstream", 201, 203),
    ]
}

async fn loaded_section(query: AlertsQuery) -> SectionHandle {
    let section = SectionHandle::new(SectionState::new(query));
    let generation = section.begin_load().await;
    let command = SectionCommand::ReceiveAlerts {
        alerts: alerts(),
        errors: Vec::new(),
        total_count: 4,
    };
    assert!(section.dispatch_for_load(generation, command).await);
    section
        .dispatch_for_load(generation, SectionCommand::FinalizeAlerts)
        .await;
    section
}

async fn select(section: &SectionHandle, keys: &[&str]) {
    section
        .dispatch(SectionCommand::SelectKeys(
            keys.iter().map(|k| k.to_string()).collect(),
        ))
        .await;
}

fn bug_ids(state: &SectionState) -> Vec<(String, BugId)> {
    state
        .table
        .alert_groups
        .iter()
        .flat_map(|group| group.alerts.iter())
        .map(|alert| (alert.key.clone(), alert.bug_id))
        .collect()
}

#[tokio::test]
async fn assigning_hides_triaged_alerts_and_drops_finished_groups() {
    let section = loaded_section(sheriff_query(&["Chromium Perf"])).await;
    let tracker = Arc::new(RecordingTracker::default());
    let coordinator = TriageCoordinator::new(section.clone(), tracker.clone(), SheriffConfig::default());
    select(&section, &["a", "b", "c"]).await;

    assert_eq!(coordinator.submit_existing_bug(7).await, TriageOutcome::Settled);

    assert_eq!(
        *tracker.assignments.lock().unwrap(),
        vec![(
            vec!["a".to_string(), "b".to_string(), "c".to_string()],
            BugId::Bug(7)
        )]
    );
    let state = section.snapshot().await;
    assert_eq!(bug_ids(&state), vec![("d".to_string(), BugId::Untriaged)]);
    assert_eq!(state.table.selected_alerts_count, 0);
    assert_eq!(state.notice, TriageIntent::TriagedExisting { bug_id: 7 });
    assert_eq!(state.recent_bugs[0].id, 7);
    assert!(!state.is_loading);
}

#[tokio::test]
async fn triaging_a_group_selects_the_next_one_when_configured() {
    let section = loaded_section(sheriff_query(&["Chromium Perf"])).await;
    let tracker = Arc::new(RecordingTracker::default());
    let config = SheriffConfig {
        select_next_group_after_triage: true,
        ..Default::default()
    };
    let coordinator = TriageCoordinator::new(section.clone(), tracker.clone(), config);
    select(&section, &["a", "b"]).await;

    assert_eq!(coordinator.submit_existing_bug(7).await, TriageOutcome::Settled);

    assert_eq!(
        *tracker.assignments.lock().unwrap(),
        vec![(vec!["a".to_string(), "b".to_string()], BugId::Bug(7))]
    );
    let state = section.snapshot().await;
    assert_eq!(state.table.alert_groups.len(), 1);
    let mut selected = state.selected_keys();
    selected.sort();
    assert_eq!(selected, vec!["c".to_string(), "d".to_string()]);
    assert_eq!(state.table.selected_alerts_count, 2);
}

#[tokio::test]
async fn assigning_while_showing_triaged_updates_in_place() {
    let query = AlertsQuery {
        showing_triaged: true,
        ..sheriff_query(&["Chromium Perf"])
    };
    let section = loaded_section(query).await;
    let coordinator = TriageCoordinator::new(
        section.clone(),
        Arc::new(RecordingTracker::default()),
        SheriffConfig::default(),
    );
    select(&section, &["a", "c"]).await;

    assert_eq!(coordinator.submit_existing_bug(7).await, TriageOutcome::Settled);

    let state = section.snapshot().await;
    let mut ids = bug_ids(&state);
    ids.sort_by(|x, y| x.0.cmp(&y.0));
    assert_eq!(
        ids,
        vec![
            ("a".to_string(), BugId::Bug(7)),
            ("b".to_string(), BugId::Untriaged),
            ("c".to_string(), BugId::Bug(7)),
            ("d".to_string(), BugId::Untriaged),
        ]
    );
}

#[tokio::test]
async fn unassigning_keeps_alerts_visible() {
    let section = loaded_section(sheriff_query(&["Chromium Perf"])).await;
    let tracker = Arc::new(RecordingTracker::default());
    let coordinator = TriageCoordinator::new(section.clone(), tracker.clone(), SheriffConfig::default());
    select(&section, &["d"]).await;

    assert_eq!(coordinator.unassign().await, TriageOutcome::Settled);

    assert_eq!(
        *tracker.assignments.lock().unwrap(),
        vec![(vec!["d".to_string()], BugId::Untriaged)]
    );
    let state = section.snapshot().await;
    assert_eq!(bug_ids(&state).len(), 4);
    assert_eq!(state.notice, TriageIntent::None);
}

#[tokio::test]
async fn new_bug_replaces_the_creating_placeholder() {
    let query = AlertsQuery {
        showing_triaged: true,
        ..sheriff_query(&["Chromium Perf"])
    };
    let section = loaded_section(query).await;
    let tracker = Arc::new(RecordingTracker {
        new_bug_id: 1234,
        ..Default::default()
    });
    let coordinator = TriageCoordinator::new(section.clone(), tracker, SheriffConfig::default());
    select(&section, &["b"]).await;

    let fields = NewBugFields {
        summary: "10% regression in speedometer".to_string(),
        ..Default::default()
    };
    assert_eq!(coordinator.submit_new_bug(fields).await, TriageOutcome::Settled);

    let state = section.snapshot().await;
    assert_eq!(state.find_alert("b").map(|a| a.bug_id), Some(BugId::Bug(1234)));
    assert_eq!(state.notice, TriageIntent::TriagedNew { bug_id: 1234 });
    assert_eq!(state.recent_bugs[0].summary, "10% regression in speedometer");
}

#[tokio::test(start_paused = true)]
async fn newer_notice_survives_the_older_expiry() {
    let section = loaded_section(sheriff_query(&["Chromium Perf"])).await;
    let coordinator = TriageCoordinator::new(
        section.clone(),
        Arc::new(RecordingTracker::default()),
        SheriffConfig::default(),
    );

    select(&section, &["a"]).await;
    assert_eq!(coordinator.ignore().await, TriageOutcome::Settled);
    assert_eq!(section.read(|s| s.notice).await, TriageIntent::Ignored { count: 1 });

    tokio::time::sleep(Duration::from_secs(2)).await;
    select(&section, &["c", "d"]).await;
    assert_eq!(coordinator.ignore().await, TriageOutcome::Settled);

    // The first expiry fires at 5s and must not clear the second notice.
    tokio::time::sleep(Duration::from_secs(4)).await;
    assert_eq!(section.read(|s| s.notice).await, TriageIntent::Ignored { count: 2 });

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(section.read(|s| s.notice).await, TriageIntent::None);
}

#[tokio::test]
async fn triage_broadcasts_selection_changes() {
    let section = loaded_section(sheriff_query(&["Chromium Perf"])).await;
    let mut events = section.subscribe();
    let coordinator = TriageCoordinator::new(
        section.clone(),
        Arc::new(RecordingTracker::default()),
        SheriffConfig::default(),
    );
    select(&section, &["a", "b"]).await;
    assert_eq!(events.recv().await.expect("event"), TableEvent::SelectionChanged);

    assert_eq!(coordinator.ignore().await, TriageOutcome::Settled);
    assert_eq!(events.recv().await.expect("event"), TableEvent::SelectionChanged);
    assert_eq!(section.read(|s| s.table.selected_alerts_count).await, 0);
}
