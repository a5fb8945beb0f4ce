use serde::Deserialize;
use serde::Serialize;
use std::fmt;

/// The `bug_id` filter of an alerts query.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum BugFilter {
    /// `""`: untriaged alerts only.
    Untriaged,
    /// `"*"`: alerts with any bug.
    Triaged,
    Bug(String),
}

impl From<String> for BugFilter {
    fn from(value: String) -> Self {
        match value.as_str() {
            "" => BugFilter::Untriaged,
            "*" => BugFilter::Triaged,
            _ => BugFilter::Bug(value),
        }
    }
}

impl From<BugFilter> for String {
    fn from(value: BugFilter) -> Self {
        match value {
            BugFilter::Untriaged => String::new(),
            BugFilter::Triaged => "*".to_string(),
            BugFilter::Bug(id) => id,
        }
    }
}

/// One source query. Immutable once compiled; the loader derives follow-up
/// descriptors from it rather than editing it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestDescriptor {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sheriff: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bug_id: Option<BugFilter>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub report: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recovered: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_improvement: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count_limit: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_end_revision: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_start_revision: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_start_revision: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cursor: Option<String>,
}

impl RequestDescriptor {
    /// The same query continued at `cursor`. Only the first page of a source
    /// reports a total count.
    pub fn with_cursor(&self, cursor: String) -> Self {
        Self {
            cursor: Some(cursor),
            count_limit: None,
            ..self.clone()
        }
    }

    pub fn asks_for_untriaged(&self) -> bool {
        self.bug_id == Some(BugFilter::Untriaged)
    }

    pub fn asks_for_triaged(&self) -> bool {
        self.bug_id == Some(BugFilter::Triaged)
    }

    /// Query for triaged alerts overlapping the untriaged ones this
    /// descriptor returned.
    pub fn triaged_follow_up(&self) -> Self {
        Self {
            bug_id: Some(BugFilter::Triaged),
            recovered: None,
            count_limit: None,
            cursor: None,
            is_improvement: None,
            ..self.clone()
        }
    }
}

impl fmt::Display for RequestDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match serde_json::to_string(self) {
            Ok(json) => f.write_str(&json),
            Err(_) => f.write_str("{}"),
        }
    }
}

/// A named report the dashboard knows about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportTemplate {
    pub id: u64,
    pub name: String,
}

/// The operator's filter selection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertsQuery {
    pub sheriffs: Vec<String>,
    pub bugs: Vec<String>,
    pub reports: Vec<String>,
    pub min_revision: Option<String>,
    pub max_revision: Option<String>,
    pub showing_improvements: bool,
    pub showing_triaged: bool,
}

impl AlertsQuery {
    /// True when nothing would be fetched.
    pub fn is_empty(&self) -> bool {
        self.sheriffs.is_empty()
            && self.bugs.is_empty()
            && self.reports.is_empty()
            && self.min_revision().is_none()
            && self.max_revision().is_none()
    }

    pub fn has_sources(&self) -> bool {
        !self.sheriffs.is_empty() || !self.bugs.is_empty() || !self.reports.is_empty()
    }

    /// Bugs selected and nothing else.
    pub fn is_bug_only(&self) -> bool {
        !self.bugs.is_empty() && self.sheriffs.is_empty() && self.reports.is_empty()
    }

    pub fn min_revision(&self) -> Option<i64> {
        parse_revision(self.min_revision.as_deref())
    }

    pub fn max_revision(&self) -> Option<i64> {
        parse_revision(self.max_revision.as_deref())
    }
}

fn parse_revision(value: Option<&str>) -> Option<i64> {
    let value = value?.trim();
    if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    value.parse().ok()
}

/// Compile the operator's filters into one descriptor per source.
///
/// Order: sheriffs, then bugs, then reports whose name matches a template.
/// A revision-only descriptor is produced when nothing else was and a bound
/// is present.
pub fn compile_sources(
    query: &AlertsQuery,
    templates: &[ReportTemplate],
    count_limit: u32,
) -> Vec<RequestDescriptor> {
    let revisions = RequestDescriptor {
        min_end_revision: query.min_revision(),
        max_start_revision: query.max_revision(),
        ..Default::default()
    };

    let mut sources = Vec::new();
    for sheriff in &query.sheriffs {
        sources.push(RequestDescriptor {
            sheriff: Some(sheriff.clone()),
            recovered: Some(false),
            count_limit: Some(count_limit),
            is_improvement: Some(query.showing_improvements),
            bug_id: (!query.showing_triaged).then_some(BugFilter::Untriaged),
            ..revisions.clone()
        });
    }

    for bug in &query.bugs {
        sources.push(RequestDescriptor {
            bug_id: Some(BugFilter::from(bug.clone())),
            ..revisions.clone()
        });
    }

    for name in &query.reports {
        if let Some(template) = templates.iter().find(|t| &t.name == name) {
            sources.push(RequestDescriptor {
                report: Some(template.id),
                ..revisions.clone()
            });
        }
    }

    let has_bounds = revisions.min_end_revision.is_some() || revisions.max_start_revision.is_some();
    if sources.is_empty() && has_bounds {
        sources.push(revisions);
    }

    sources
}
