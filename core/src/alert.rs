use crate::unit::ImprovementDirection;
use crate::unit::Unit;
use serde::Deserialize;
use serde::Serialize;
use serde::Serializer;
use std::fmt;

/// Bug id the dashboard uses to mark an alert as ignored.
pub const IGNORED_BUG_ID: i64 = -2;

/// Triage status of an alert.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum BugId {
    #[default]
    Untriaged,
    Ignored,
    /// A new bug is being filed for this alert.
    Creating,
    Bug(u64),
}

impl BugId {
    pub fn from_wire(value: i64) -> Self {
        match value {
            0 => BugId::Untriaged,
            v if v < 0 => BugId::Ignored,
            v => BugId::Bug(v.unsigned_abs()),
        }
    }

    /// The value sent to the dashboard. `Creating` never leaves the client.
    pub fn to_wire(self) -> Option<i64> {
        match self {
            BugId::Untriaged => Some(0),
            BugId::Ignored => Some(IGNORED_BUG_ID),
            BugId::Creating => None,
            BugId::Bug(id) => i64::try_from(id).ok(),
        }
    }

    pub fn is_triaged(self) -> bool {
        !matches!(self, BugId::Untriaged)
    }

    pub(crate) fn sort_key(self) -> i64 {
        match self {
            BugId::Untriaged => 0,
            BugId::Ignored => IGNORED_BUG_ID,
            BugId::Creating => i64::MAX,
            BugId::Bug(id) => i64::try_from(id).unwrap_or(i64::MAX),
        }
    }
}

impl fmt::Display for BugId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BugId::Untriaged => Ok(()),
            BugId::Ignored => f.write_str("ignored"),
            BugId::Creating => f.write_str("[creating]"),
            BugId::Bug(id) => write!(f, "{id}"),
        }
    }
}

impl Serialize for BugId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.to_wire() {
            Some(value) => serializer.serialize_i64(value),
            None => serializer.collect_str(self),
        }
    }
}

/// Timeseries descriptor attached to a raw alert.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RawDescriptor {
    /// `master:bot`
    pub bot: String,
    pub measurement: String,
    pub statistic: String,
    pub test_suite: String,
    pub test_case: String,
}

/// An alert as returned by the alerts API. Missing fields deserialize to
/// empty defaults so one malformed record cannot fail a whole page.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawAlert {
    pub key: String,
    pub bug_id: Option<i64>,
    pub start_revision: i64,
    pub end_revision: i64,
    pub median_before_anomaly: f64,
    pub median_after_anomaly: f64,
    pub improvement: bool,
    pub units: String,
    pub descriptor: RawDescriptor,
    pub bug_components: Vec<String>,
    pub bug_labels: Vec<String>,
    pub dashboard_link: Option<String>,
    pub pinpoint_bisects: Vec<String>,
}

/// A display-ready alert.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertRecord {
    pub key: String,
    pub bug_id: BugId,
    pub start_revision: i64,
    pub end_revision: i64,
    pub test_suite: String,
    pub measurement: String,
    pub master: String,
    pub bot: String,
    pub test_case: String,
    pub statistic: String,
    pub base_unit: Unit,
    pub delta_value: f64,
    pub delta_unit: Unit,
    pub percent_delta_value: f64,
    pub percent_delta_unit: Unit,
    pub improvement: bool,
    pub is_selected: bool,
    pub bug_components: Vec<String>,
    pub bug_labels: Vec<String>,
    pub v1_report_link: Option<String>,
    pub pinpoint_jobs: Vec<String>,
}

impl AlertRecord {
    /// Derive deltas, units and improvement direction from a raw alert.
    pub fn transform(raw: RawAlert) -> Self {
        let mut delta_value = raw.median_after_anomaly - raw.median_before_anomaly;
        let percent_delta_value = delta_value / raw.median_before_anomaly;

        let improvement_direction = if raw.improvement == (delta_value < 0.0) {
            ImprovementDirection::SmallerIsBetter
        } else {
            ImprovementDirection::BiggerIsBetter
        };

        let (base_unit, factor) = Unit::resolve(&raw.units, improvement_direction);
        delta_value *= factor;

        let (master, bot) = match raw.descriptor.bot.split_once(':') {
            Some((master, bot)) => (master.to_string(), bot.to_string()),
            None => (raw.descriptor.bot.clone(), String::new()),
        };

        Self {
            key: raw.key,
            bug_id: raw.bug_id.map(BugId::from_wire).unwrap_or_default(),
            start_revision: raw.start_revision,
            end_revision: raw.end_revision,
            test_suite: raw.descriptor.test_suite,
            measurement: raw.descriptor.measurement,
            master,
            bot,
            test_case: raw.descriptor.test_case,
            statistic: raw.descriptor.statistic,
            base_unit,
            delta_value,
            delta_unit: base_unit.corresponding_delta_unit(),
            percent_delta_value,
            percent_delta_unit: Unit::normalized_percentage_delta(improvement_direction),
            improvement: raw.improvement,
            is_selected: false,
            bug_components: raw.bug_components,
            bug_labels: raw.bug_labels,
            v1_report_link: raw.dashboard_link,
            pinpoint_jobs: raw.pinpoint_bisects,
        }
    }

    pub fn is_triaged(&self) -> bool {
        self.bug_id.is_triaged()
    }

    /// `start-end`, or a single revision when both ends agree.
    pub fn revision_range(&self) -> String {
        if self.start_revision == self.end_revision {
            self.start_revision.to_string()
        } else {
            format!("{}-{}", self.start_revision, self.end_revision)
        }
    }
}
