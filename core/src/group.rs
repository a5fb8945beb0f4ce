use crate::alert::AlertRecord;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;

/// Decides which alerts are similar enough to share a group.
///
/// Implementations must return every input alert exactly once.
pub trait SimilarityGrouper: Send + Sync {
    fn partition(&self, alerts: Vec<AlertRecord>, group_bugs: bool) -> Vec<Vec<AlertRecord>>;
}

impl<F> SimilarityGrouper for F
where
    F: Fn(Vec<AlertRecord>, bool) -> Vec<Vec<AlertRecord>> + Send + Sync,
{
    fn partition(&self, alerts: Vec<AlertRecord>, group_bugs: bool) -> Vec<Vec<AlertRecord>> {
        self(alerts, group_bugs)
    }
}

/// Groups alerts from the same test suite whose revision ranges overlap.
/// With `group_bugs`, alerts must also share a bug id.
#[derive(Debug, Clone, Copy, Default)]
pub struct RevisionOverlapGrouper;

impl SimilarityGrouper for RevisionOverlapGrouper {
    fn partition(&self, alerts: Vec<AlertRecord>, group_bugs: bool) -> Vec<Vec<AlertRecord>> {
        let mut groups: Vec<Vec<AlertRecord>> = Vec::new();
        for alert in alerts {
            let similar = groups.iter_mut().find(|group| {
                group.iter().any(|member| {
                    member.test_suite == alert.test_suite
                        && (!group_bugs || member.bug_id == alert.bug_id)
                        && member.start_revision <= alert.end_revision
                        && alert.start_revision <= member.end_revision
                })
            });
            match similar {
                Some(group) => group.push(alert),
                None => groups.push(vec![alert]),
            }
        }
        groups
    }
}

/// Cloneable handle to the grouping function in use.
#[derive(Clone)]
pub struct SharedGrouper(Arc<dyn SimilarityGrouper>);

impl SharedGrouper {
    pub fn new(grouper: impl SimilarityGrouper + 'static) -> Self {
        Self(Arc::new(grouper))
    }

    pub(crate) fn partition(
        &self,
        alerts: Vec<AlertRecord>,
        group_bugs: bool,
    ) -> Vec<Vec<AlertRecord>> {
        self.0.partition(alerts, group_bugs)
    }
}

impl Default for SharedGrouper {
    fn default() -> Self {
        Self::new(RevisionOverlapGrouper)
    }
}

impl fmt::Debug for SharedGrouper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("SharedGrouper").finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TriagedState {
    /// Members that already carry a bug id.
    pub count: usize,
    pub is_expanded: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertGroup {
    pub alerts: Vec<AlertRecord>,
    pub is_expanded: bool,
    pub triaged: TriagedState,
}

impl AlertGroup {
    /// Build a collapsed group. Untriaged members come first unless
    /// `showing_triaged`; relative order is otherwise preserved.
    pub fn new(mut alerts: Vec<AlertRecord>, showing_triaged: bool) -> Self {
        if !showing_triaged {
            alerts.sort_by_key(AlertRecord::is_triaged);
        }
        let mut group = Self {
            alerts,
            is_expanded: false,
            triaged: TriagedState::default(),
        };
        group.recount();
        group
    }

    pub fn recount(&mut self) {
        self.triaged.count = self.alerts.iter().filter(|a| a.is_triaged()).count();
    }

    pub fn first_untriaged_index(&self) -> Option<usize> {
        self.alerts.iter().position(|a| !a.is_triaged())
    }

    /// Index of the row that represents the collapsed group.
    pub fn header_index(&self, showing_triaged: bool) -> Option<usize> {
        if showing_triaged {
            (!self.alerts.is_empty()).then_some(0)
        } else {
            self.first_untriaged_index()
        }
    }

    /// Members shown to the operator: all of them when showing triaged,
    /// otherwise the untriaged ones.
    pub fn displayed_count(&self, showing_triaged: bool) -> usize {
        if showing_triaged {
            self.alerts.len()
        } else {
            self.untriaged_count()
        }
    }

    pub fn untriaged_count(&self) -> usize {
        self.alerts.len().saturating_sub(self.triaged.count)
    }

    pub fn is_fully_triaged(&self) -> bool {
        self.triaged.count == self.alerts.len()
    }
}

/// Partition `alerts` with `grouper` and wrap each partition in a group.
pub fn group_alerts(
    grouper: &SharedGrouper,
    alerts: Vec<AlertRecord>,
    group_bugs: bool,
    showing_triaged: bool,
) -> Vec<AlertGroup> {
    grouper
        .partition(alerts, group_bugs)
        .into_iter()
        .filter(|members| !members.is_empty())
        .map(|members| AlertGroup::new(members, showing_triaged))
        .collect()
}
