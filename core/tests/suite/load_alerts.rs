use super::support::ScriptedBackend;
use super::support::page;
use super::support::raw_alert;
use super::support::sheriff_query;
use super::support::with_bug;
use perfsheriff_core::AlertsLoader;
use perfsheriff_core::BackendError;
use perfsheriff_core::BugFilter;
use perfsheriff_core::LoadOutcome;
use perfsheriff_core::SectionHandle;
use perfsheriff_core::SectionState;
use perfsheriff_core::SheriffConfig;
use pretty_assertions::assert_eq;
use std::sync::Arc;
use std::time::Duration;

fn keys_by_group(state: &SectionState) -> Vec<Vec<String>> {
    state
        .table
        .alert_groups
        .iter()
        .map(|group| group.alerts.iter().map(|alert| alert.key.clone()).collect())
        .collect()
}

#[tokio::test]
async fn follow_ups_chase_cursors_and_triaged_alerts() {
    let backend = Arc::new(ScriptedBackend::new(|request| {
        let cursor = request.cursor.as_deref();
        match (&request.bug_id, cursor) {
            (Some(BugFilter::Untriaged), None) => Ok(page(
                vec![raw_alert("a", "speedometer", 100, 105)],
                Some("c1"),
                Some(2),
            )),
            (Some(BugFilter::Untriaged), Some("c1")) => {
                Ok(page(vec![raw_alert("b", "jetstream", 90, 91)], None, None))
            }
            (Some(BugFilter::Triaged), None) if request.max_start_revision.is_none() => Ok(page(
                vec![with_bug(raw_alert("t", "speedometer", 101, 103), 5)],
                None,
                None,
            )),
            (Some(BugFilter::Triaged), None) => Ok(page(
                vec![with_bug(raw_alert("u", "motionmark", 92, 93), 6)],
                None,
                None,
            )),
            other => Err(BackendError::new(format!("unexpected request {other:?}"))),
        }
    }));
    let section = SectionHandle::new(SectionState::new(sheriff_query(&["Chromium Perf"])));
    let loader = AlertsLoader::new(backend.clone(), section.clone(), SheriffConfig::default());

    let outcome = loader.load_query(&[]).await;
    assert_eq!(outcome, LoadOutcome::Completed { waves: 3 });

    let requests = backend.requests();
    assert_eq!(requests.len(), 4);
    assert_eq!(requests[0].cursor, None);
    assert_eq!(requests[0].count_limit, Some(5000));
    let chased = requests
        .iter()
        .filter(|r| r.cursor.as_deref() == Some("c1"))
        .count();
    assert_eq!(chased, 1);

    // The last triaged follow-up covers only the range the cursor page added.
    let last = &requests[3];
    assert_eq!(last.bug_id, Some(BugFilter::Triaged));
    assert_eq!(last.min_start_revision, Some(90));
    assert_eq!(last.max_start_revision, Some(100));

    let state = section.snapshot().await;
    assert!(state.errors.is_empty());
    assert!(!state.is_loading);
    assert_eq!(state.total_count, 2);
    // The fully triaged motionmark group is dropped.
    assert_eq!(
        keys_by_group(&state),
        vec![
            vec!["b".to_string()],
            vec!["a".to_string(), "t".to_string()],
        ]
    );
    assert_eq!(state.summary(), "2 displayed in 2 groups of 2 alerts");
}

#[tokio::test]
async fn failed_source_does_not_stop_its_siblings() {
    let backend = Arc::new(ScriptedBackend::new(|request| {
        match (request.sheriff.as_deref(), &request.bug_id) {
            (Some("broken"), _) => Err(BackendError::new("sheriff not found")),
            (_, Some(BugFilter::Untriaged)) => {
                Ok(page(vec![raw_alert("a", "octane", 10, 12)], None, Some(1)))
            }
            _ => Ok(page(Vec::new(), None, None)),
        }
    }));
    let section = SectionHandle::new(SectionState::new(sheriff_query(&["broken", "V8 Perf"])));
    let loader = AlertsLoader::new(backend, section.clone(), SheriffConfig::default());

    let outcome = loader.load_query(&[]).await;
    assert!(matches!(outcome, LoadOutcome::Completed { .. }));

    let state = section.snapshot().await;
    assert_eq!(state.errors, vec!["sheriff not found".to_string()]);
    assert_eq!(keys_by_group(&state), vec![vec!["a".to_string()]]);
}

#[tokio::test]
async fn enough_groups_stops_untriaged_cursors_but_not_triaged_ones() {
    let backend = Arc::new(ScriptedBackend::new(|request| {
        match (&request.bug_id, request.cursor.as_deref()) {
            (Some(BugFilter::Untriaged), cursor) => {
                let key = format!("a{}", cursor.unwrap_or("0"));
                Ok(page(vec![raw_alert(&key, "octane", 10, 12)], Some("next"), Some(10)))
            }
            (Some(BugFilter::Triaged), None) => Ok(page(Vec::new(), Some("t1"), None)),
            (Some(BugFilter::Triaged), Some(_)) => Ok(page(Vec::new(), None, None)),
            _ => Ok(page(Vec::new(), None, None)),
        }
    }));
    let config = SheriffConfig {
        enough_groups: 1,
        ..SheriffConfig::default()
    };
    let section = SectionHandle::new(SectionState::new(sheriff_query(&["V8 Perf"])));
    let loader = AlertsLoader::new(backend.clone(), section.clone(), config);

    let outcome = loader.load_query(&[]).await;
    assert_eq!(outcome, LoadOutcome::Completed { waves: 3 });

    let requests = backend.requests();
    assert!(
        !requests
            .iter()
            .any(|r| r.asks_for_untriaged() && r.cursor.is_some())
    );
    assert!(
        requests
            .iter()
            .any(|r| r.asks_for_triaged() && r.cursor.as_deref() == Some("t1"))
    );
    let state = section.snapshot().await;
    assert_eq!(state.total_count, 10);
    assert_eq!(state.summary(), "1 displayed in 1 group of 10 alerts");
}

#[tokio::test(start_paused = true)]
async fn newer_load_abandons_the_older_one() {
    let backend = Arc::new(
        ScriptedBackend::new(|request| match &request.bug_id {
            Some(BugFilter::Untriaged) => {
                Ok(page(vec![raw_alert("a", "octane", 10, 12)], None, Some(1)))
            }
            _ => Ok(page(Vec::new(), None, None)),
        })
        .with_delay(Duration::from_millis(100)),
    );
    let section = SectionHandle::new(SectionState::new(sheriff_query(&["V8 Perf"])));

    let first = AlertsLoader::new(backend.clone(), section.clone(), SheriffConfig::default());
    let first = tokio::spawn(async move { first.load_query(&[]).await });
    tokio::time::sleep(Duration::from_millis(10)).await;

    let second = AlertsLoader::new(backend, section.clone(), SheriffConfig::default());
    let second = second.load_query(&[]).await;

    assert_eq!(first.await.expect("first load panicked"), LoadOutcome::Abandoned);
    assert!(matches!(second, LoadOutcome::Completed { .. }));

    let state = section.snapshot().await;
    assert_eq!(state.started, 2);
    // Only the second load's alert made it in.
    assert_eq!(keys_by_group(&state), vec![vec!["a".to_string()]]);
    assert!(!state.is_loading);
}

#[tokio::test]
async fn load_without_sources_leaves_empty_table() {
    let backend = Arc::new(ScriptedBackend::new(|_| Ok(page(Vec::new(), None, None))));
    let section = SectionHandle::new(SectionState::new(sheriff_query(&[])));
    let loader = AlertsLoader::new(backend.clone(), section.clone(), SheriffConfig::default());

    assert_eq!(
        loader.load_query(&[]).await,
        LoadOutcome::Completed { waves: 0 }
    );
    assert!(backend.requests().is_empty());
    let state = section.snapshot().await;
    assert!(!state.is_loading);
    assert_eq!(state.summary(), "0 alerts");
}
