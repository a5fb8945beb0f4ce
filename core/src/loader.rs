//! Loads alerts into a section wave by wave, chasing cursors.
//!
//! Every untriaged source that returns also queues a request for the triaged
//! alerts in the revision range loaded so far, so triaged members of loaded
//! groups show up without fetching the same triaged alerts twice.

use crate::alert::RawAlert;
use crate::backend::AlertsBackend;
use crate::backend::AlertsPage;
use crate::backend::BackendError;
use crate::batch::BatchIterator;
use crate::config::SheriffConfig;
use crate::group::AlertGroup;
use crate::request::ReportTemplate;
use crate::request::RequestDescriptor;
use crate::request::compile_sources;
use crate::section::SectionCommand;
use crate::section::SectionHandle;
use futures::StreamExt;
use std::future::Future;
use std::sync::Arc;
use tokio::time::Instant;
use tracing::debug;
use tracing::info;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    Completed { waves: usize },
    /// A newer load started on the same section.
    Abandoned,
}

#[derive(Debug)]
struct PageResult {
    request: RequestDescriptor,
    page: AlertsPage,
}

#[derive(Debug, Default)]
struct HandledBatch {
    alerts: Vec<RawAlert>,
    next_requests: Vec<RequestDescriptor>,
    triaged_requests: Vec<RequestDescriptor>,
    total_count: usize,
}

fn wrap_request(
    backend: Arc<dyn AlertsBackend>,
    request: RequestDescriptor,
) -> impl Future<Output = Result<PageResult, BackendError>> + Send + 'static {
    async move {
        let page = backend.fetch_page(&request).await?;
        Ok(PageResult { request, page })
    }
}

/// Collect alerts from one wave and derive the follow-up requests.
fn handle_batch(results: Vec<PageResult>, showing_triaged: bool) -> HandledBatch {
    let mut handled = HandledBatch::default();
    for PageResult { request, page } in results {
        if request.count_limit.is_some() {
            let count = page.count.unwrap_or_default();
            handled.total_count += usize::try_from(count).unwrap_or(usize::MAX);
        }

        if let Some(cursor) = page.cursor() {
            handled.next_requests.push(request.with_cursor(cursor.to_string()));
        }

        if !showing_triaged && request.asks_for_untriaged() {
            handled.triaged_requests.push(request.triaged_follow_up());
        }

        handled.alerts.extend(page.anomalies);
    }
    handled
}

fn min_start_revision(groups: &[AlertGroup]) -> Option<i64> {
    groups
        .iter()
        .flat_map(|group| group.alerts.iter())
        .map(|alert| alert.start_revision)
        .min()
}

/// Restrict triaged follow-ups to the revisions loaded since the previous
/// wave. Nothing is queued unless the loaded range reaches below
/// `previous`. Returns the queued requests and the new upper bound.
fn bound_triaged_requests(
    requests: Vec<RequestDescriptor>,
    previous: Option<i64>,
    min_start: Option<i64>,
) -> (Vec<RequestDescriptor>, Option<i64>) {
    let lowers_range = match (previous, min_start) {
        (None, _) => true,
        (Some(previous), Some(min)) => min < previous,
        (Some(_), None) => false,
    };
    if !lowers_range {
        return (Vec::new(), previous);
    }
    let requests = requests
        .into_iter()
        .map(|mut request| {
            if let Some(min) = min_start {
                request.min_start_revision = Some(min);
            }
            if let Some(previous) = previous {
                request.max_start_revision = Some(previous);
            }
            request
        })
        .collect();
    (requests, min_start.or(previous))
}

pub struct AlertsLoader {
    backend: Arc<dyn AlertsBackend>,
    section: SectionHandle,
    config: SheriffConfig,
}

impl AlertsLoader {
    pub fn new(backend: Arc<dyn AlertsBackend>, section: SectionHandle, config: SheriffConfig) -> Self {
        Self {
            backend,
            section,
            config,
        }
    }

    /// Compile the section's current query and load it.
    pub async fn load_query(&self, templates: &[ReportTemplate]) -> LoadOutcome {
        let query = self.section.read(|s| s.query.clone()).await;
        let sources = compile_sources(&query, templates, self.config.count_limit);
        self.load(sources).await
    }

    /// Load `sources` into the section.
    ///
    /// Starts a new generation on the section; if another load starts before
    /// this one finishes, this one stops dispatching and returns
    /// [`LoadOutcome::Abandoned`].
    pub async fn load(&self, sources: Vec<RequestDescriptor>) -> LoadOutcome {
        let generation = self.section.begin_load().await;
        let started = Instant::now();
        info!(sources = sources.len(), generation, "loading alerts");

        let mut batches = BatchIterator::new(
            sources
                .into_iter()
                .map(|request| wrap_request(self.backend.clone(), request)),
        );
        let mut triaged_max_start_revision = None;

        while let Some(batch) = batches.next().await {
            let Some(showing_triaged) = self
                .section
                .read(|s| (s.started == generation).then_some(s.query.showing_triaged))
                .await
            else {
                return self.abandon(generation);
            };

            let errors: Vec<String> = batch.errors.into_iter().map(|err| err.message).collect();
            let handled = handle_batch(batch.results, showing_triaged);
            debug!(
                wave = batches.waves(),
                alerts = handled.alerts.len(),
                errors = errors.len(),
                next = handled.next_requests.len(),
                "received wave"
            );

            if !handled.alerts.is_empty() || !errors.is_empty() {
                let command = SectionCommand::ReceiveAlerts {
                    alerts: handled.alerts,
                    errors,
                    total_count: handled.total_count,
                };
                if !self.section.dispatch_for_load(generation, command).await {
                    return self.abandon(generation);
                }
            }

            let Some((min_start, group_count)) = self
                .section
                .read(|s| {
                    (s.started == generation).then(|| {
                        (
                            min_start_revision(&s.table.alert_groups),
                            s.table.alert_groups.len(),
                        )
                    })
                })
                .await
            else {
                return self.abandon(generation);
            };

            triaged_max_start_revision = self.load_more(
                &mut batches,
                LoadProgress {
                    min_start,
                    group_count,
                    started,
                },
                handled.next_requests,
                handled.triaged_requests,
                triaged_max_start_revision,
            );
            tokio::task::yield_now().await;
        }

        let waves = batches.waves();
        if !self
            .section
            .dispatch_for_load(generation, SectionCommand::FinalizeAlerts)
            .await
        {
            return self.abandon(generation);
        }
        info!(generation, waves, "finished loading alerts");
        LoadOutcome::Completed { waves }
    }

    fn abandon(&self, generation: u64) -> LoadOutcome {
        warn!(generation, "abandoning superseded load");
        LoadOutcome::Abandoned
    }

    /// Queue triaged and cursor follow-ups. Returns the new
    /// `triaged_max_start_revision`.
    fn load_more(
        &self,
        batches: &mut BatchIterator<PageResult, BackendError>,
        progress: LoadProgress,
        next_requests: Vec<RequestDescriptor>,
        triaged_requests: Vec<RequestDescriptor>,
        triaged_max_start_revision: Option<i64>,
    ) -> Option<i64> {
        let (triaged_requests, triaged_max_start_revision) =
            bound_triaged_requests(triaged_requests, triaged_max_start_revision, progress.min_start);
        for request in triaged_requests {
            batches.add(wrap_request(self.backend.clone(), request));
        }

        let keep_chasing = progress.group_count < self.config.enough_groups
            && progress.started.elapsed() < self.config.loading_budget();
        for next in next_requests {
            // Triaged cursors are always chased; untriaged ones stop once
            // enough has been loaded.
            if next.asks_for_triaged() || keep_chasing {
                batches.add(wrap_request(self.backend.clone(), next));
            } else {
                debug!(request = %next, "not chasing cursor");
            }
        }

        triaged_max_start_revision
    }
}

#[derive(Debug, Clone, Copy)]
struct LoadProgress {
    min_start: Option<i64>,
    group_count: usize,
    started: Instant,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::BugFilter;
    use pretty_assertions::assert_eq;

    fn untriaged_source() -> RequestDescriptor {
        RequestDescriptor {
            sheriff: Some("s".to_string()),
            bug_id: Some(BugFilter::Untriaged),
            recovered: Some(false),
            is_improvement: Some(false),
            count_limit: Some(5000),
            ..Default::default()
        }
    }

    fn page(keys: &[&str], next_cursor: Option<&str>, count: Option<u64>) -> AlertsPage {
        AlertsPage {
            anomalies: keys
                .iter()
                .map(|key| RawAlert {
                    key: key.to_string(),
                    ..Default::default()
                })
                .collect(),
            next_cursor: next_cursor.map(str::to_string),
            count,
        }
    }

    #[test]
    fn test_handle_batch_derives_follow_ups() {
        let handled = handle_batch(
            vec![
                PageResult {
                    request: untriaged_source(),
                    page: page(&["a", "b"], Some("c1"), Some(12)),
                },
                PageResult {
                    request: untriaged_source().with_cursor("c0".to_string()),
                    page: page(&["c"], Some(""), Some(99)),
                },
            ],
            false,
        );
        assert_eq!(handled.alerts.len(), 3);
        assert_eq!(handled.total_count, 12);
        assert_eq!(
            handled.next_requests,
            vec![untriaged_source().with_cursor("c1".to_string())]
        );
        assert_eq!(handled.triaged_requests.len(), 2);
        assert!(handled.triaged_requests.iter().all(|r| r.asks_for_triaged() && r.cursor.is_none()));
    }

    #[test]
    fn test_handle_batch_showing_triaged_skips_triaged_follow_up() {
        let handled = handle_batch(
            vec![PageResult {
                request: untriaged_source(),
                page: page(&["a"], None, None),
            }],
            true,
        );
        assert!(handled.triaged_requests.is_empty());
        assert!(handled.next_requests.is_empty());
        assert_eq!(handled.total_count, 0);
    }

    #[test]
    fn test_triaged_bound_follows_loaded_range() {
        let triaged = untriaged_source().triaged_follow_up();

        let (requests, bound) = bound_triaged_requests(vec![triaged.clone()], None, Some(500));
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].min_start_revision, Some(500));
        assert_eq!(requests[0].max_start_revision, None);
        assert_eq!(bound, Some(500));

        let (requests, bound) = bound_triaged_requests(vec![triaged.clone()], bound, Some(300));
        assert_eq!(requests[0].min_start_revision, Some(300));
        assert_eq!(requests[0].max_start_revision, Some(500));
        assert_eq!(bound, Some(300));

        // A wave with no loaded alerts keeps the previous bound.
        let (requests, bound) = bound_triaged_requests(vec![triaged.clone()], bound, None);
        assert!(requests.is_empty());
        assert_eq!(bound, Some(300));

        let (requests, bound) = bound_triaged_requests(vec![triaged], bound, Some(400));
        assert!(requests.is_empty());
        assert_eq!(bound, Some(300));
    }
}
