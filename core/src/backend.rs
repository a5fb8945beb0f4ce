//! Boundaries the core consumes: page fetches and bug mutations.

use crate::alert::BugId;
use crate::alert::RawAlert;
use crate::request::RequestDescriptor;
use async_trait::async_trait;
use serde::Deserialize;
use serde::Serialize;

/// A failed remote call. Only the message is surfaced to the operator.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct BackendError {
    pub message: String,
}

impl BackendError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// One page of an alerts query.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertsPage {
    pub anomalies: Vec<RawAlert>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<String>,
    /// Total matching alerts, reported on requests that carried `count_limit`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<u64>,
}

impl AlertsPage {
    /// The continuation token, if the source has more pages.
    pub fn cursor(&self) -> Option<&str> {
        self.next_cursor.as_deref().filter(|c| !c.is_empty())
    }
}

/// Fields for filing a new bug.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NewBugFields {
    pub summary: String,
    pub description: String,
    pub owner: String,
    pub cc: Vec<String>,
    pub labels: Vec<String>,
    pub components: Vec<String>,
}

#[async_trait]
pub trait AlertsBackend: Send + Sync {
    async fn fetch_page(&self, request: &RequestDescriptor) -> Result<AlertsPage, BackendError>;
}

#[async_trait]
pub trait BugTracker: Send + Sync {
    /// Associate `keys` with `bug_id`. `Untriaged` unassigns; `Ignored` ignores.
    async fn assign_bug(&self, keys: &[String], bug_id: BugId) -> Result<(), BackendError>;

    /// File a new bug for `keys` and return its id.
    async fn file_new_bug(&self, keys: &[String], fields: &NewBugFields)
    -> Result<u64, BackendError>;

    async fn nudge_alert(
        &self,
        key: &str,
        new_start_revision: i64,
        new_end_revision: i64,
    ) -> Result<(), BackendError>;
}
