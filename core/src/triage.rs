//! Bulk mutations on the selected alerts.
//!
//! Every bug-id mutation updates the section before the remote call is made.
//! A failed call leaves that update in place and reports the error on the
//! section; the next load reconciles with the dashboard.

use crate::alert::BugId;
use crate::backend::BugTracker;
use crate::backend::NewBugFields;
use crate::config::SheriffConfig;
use crate::recent_bugs::RecentBugsStore;
use crate::section::SectionCommand;
use crate::section::SectionHandle;
use crate::section::TriageIntent;
use std::sync::Arc;
use tracing::info;
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TriageOutcome {
    /// Nothing was selected; no remote call was made.
    NothingSelected,
    Settled,
    Failed(String),
}

#[derive(Clone)]
pub struct TriageCoordinator {
    section: SectionHandle,
    tracker: Arc<dyn BugTracker>,
    recent_bugs: Option<RecentBugsStore>,
    config: SheriffConfig,
}

impl TriageCoordinator {
    pub fn new(section: SectionHandle, tracker: Arc<dyn BugTracker>, config: SheriffConfig) -> Self {
        Self {
            section,
            tracker,
            recent_bugs: None,
            config,
        }
    }

    /// Persist recent bugs to `store` after every triage notification.
    pub fn with_recent_bugs_store(mut self, store: RecentBugsStore) -> Self {
        self.recent_bugs = Some(store);
        self
    }

    pub fn section(&self) -> &SectionHandle {
        &self.section
    }

    /// Mark the selected alerts as belonging to an existing bug.
    pub async fn submit_existing_bug(&self, bug_id: u64) -> TriageOutcome {
        let outcome = self.change_bug_id(BugId::Bug(bug_id)).await;
        if outcome == TriageOutcome::Settled {
            self.notify(
                SectionCommand::ShowTriagedExisting { bug_id },
                TriageIntent::TriagedExisting { bug_id },
            )
            .await;
        }
        outcome
    }

    pub async fn ignore(&self) -> TriageOutcome {
        let (outcome, count) = self.assign(BugId::Ignored).await;
        if outcome == TriageOutcome::Settled {
            self.notify(SectionCommand::ShowIgnored { count }, TriageIntent::Ignored { count })
                .await;
        }
        outcome
    }

    pub async fn unassign(&self) -> TriageOutcome {
        self.change_bug_id(BugId::Untriaged).await
    }

    /// Set the bug id of every selected alert. `Creating` is only set
    /// while filing a new bug and is refused here.
    pub async fn change_bug_id(&self, bug_id: BugId) -> TriageOutcome {
        self.assign(bug_id).await.0
    }

    /// Returns the outcome and the number of alerts sent to the tracker.
    async fn assign(&self, bug_id: BugId) -> (TriageOutcome, usize) {
        if bug_id == BugId::Creating {
            warn!("refusing to assign a placeholder bug id");
            return (
                TriageOutcome::Failed(format!("bug id {bug_id} cannot be assigned")),
                0,
            );
        }
        let Some(keys) = self.begin_mutation(bug_id).await else {
            return (TriageOutcome::NothingSelected, 0);
        };

        let outcome = match self.tracker.assign_bug(&keys, bug_id).await {
            Ok(()) => {
                info!(count = keys.len(), %bug_id, "assigned alerts");
                TriageOutcome::Settled
            }
            Err(err) => self.fail(err.message).await,
        };
        self.section.dispatch(SectionCommand::SetLoading(false)).await;
        (outcome, keys.len())
    }

    /// File a new bug for the selected alerts.
    pub async fn submit_new_bug(&self, fields: NewBugFields) -> TriageOutcome {
        let Some(keys) = self.begin_mutation(BugId::Creating).await else {
            return TriageOutcome::NothingSelected;
        };

        let outcome = match self.tracker.file_new_bug(&keys, &fields).await {
            Ok(bug_id) => {
                info!(count = keys.len(), bug_id, "filed new bug");
                self.section
                    .dispatch(SectionCommand::RemoveOrUpdateAlerts {
                        keys,
                        bug_id: BugId::Bug(bug_id),
                    })
                    .await;
                self.notify(
                    SectionCommand::ShowTriagedNew {
                        bug_id,
                        summary: fields.summary,
                    },
                    TriageIntent::TriagedNew { bug_id },
                )
                .await;
                TriageOutcome::Settled
            }
            Err(err) => self.fail(err.message).await,
        };
        self.section.dispatch(SectionCommand::SetLoading(false)).await;
        outcome
    }

    /// Move one alert's revision range. Nothing changes locally until the
    /// dashboard accepts it.
    pub async fn nudge(&self, key: &str, start_revision: i64, end_revision: i64) -> TriageOutcome {
        let key = key.to_string();
        self.section
            .dispatch(SectionCommand::NudgeStarted { key: key.clone() })
            .await;
        match self
            .tracker
            .nudge_alert(&key, start_revision, end_revision)
            .await
        {
            Ok(()) => {
                info!(%key, start_revision, end_revision, "nudged alert");
                self.section
                    .dispatch(SectionCommand::NudgeSucceeded {
                        key,
                        start_revision,
                        end_revision,
                    })
                    .await;
                TriageOutcome::Settled
            }
            Err(err) => {
                warn!(%key, error = %err, "nudge failed");
                self.section
                    .dispatch(SectionCommand::NudgeFailed {
                        key,
                        error: err.message.clone(),
                    })
                    .await;
                TriageOutcome::Failed(err.message)
            }
        }
    }

    /// Mark the section loading and apply `bug_id` to the selection.
    /// Returns the affected keys, or `None` when nothing is selected.
    async fn begin_mutation(&self, bug_id: BugId) -> Option<Vec<String>> {
        let keys = self.section.read(|s| s.selected_keys()).await;
        if keys.is_empty() {
            return None;
        }
        self.section.dispatch(SectionCommand::SetLoading(true)).await;
        self.section
            .dispatch(SectionCommand::RemoveOrUpdateAlerts {
                keys: keys.clone(),
                bug_id,
            })
            .await;
        if self.config.select_next_group_after_triage {
            self.section.dispatch(SectionCommand::SelectFirstGroup).await;
        }
        Some(keys)
    }

    async fn fail(&self, message: String) -> TriageOutcome {
        warn!(error = %message, "triage failed");
        self.section
            .dispatch(SectionCommand::ReportError(message.clone()))
            .await;
        TriageOutcome::Failed(message)
    }

    /// Show a notice, persist recent bugs and schedule the notice's expiry.
    async fn notify(&self, command: SectionCommand, intent: TriageIntent) {
        self.section.dispatch(command).await;
        self.store_recent_bugs().await;
        self.expire_later(intent);
    }

    async fn store_recent_bugs(&self) {
        let Some(store) = &self.recent_bugs else {
            return;
        };
        let bugs = self.section.read(|s| s.recent_bugs.clone()).await;
        if let Err(err) = store.save(&bugs) {
            warn!(path = %store.path().display(), error = %err, "failed to store recent bugs");
        }
    }

    fn expire_later(&self, intent: TriageIntent) {
        let section = self.section.clone();
        let delay = self.config.notification_delay();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            section.dispatch(SectionCommand::ExpireNotice(intent)).await;
        });
    }
}
