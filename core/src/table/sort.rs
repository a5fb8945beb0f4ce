use crate::alert::AlertRecord;
use crate::group::AlertGroup;
use serde::Deserialize;
use serde::Serialize;
use std::cmp::Ordering;
use strum_macros::AsRefStr;
use strum_macros::Display;
use strum_macros::EnumString;

/// Table column an operator can sort by.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "camelCase")]
pub enum SortColumn {
    /// Number of displayed members of the group.
    Count,
    /// Number of triaged members of the group.
    Triaged,
    BugId,
    #[default]
    StartRevision,
    #[serde(rename = "suite")]
    #[strum(serialize = "suite")]
    TestSuite,
    Measurement,
    Master,
    Bot,
    #[serde(rename = "case")]
    #[strum(serialize = "case")]
    TestCase,
    DeltaValue,
    PercentDeltaValue,
}

impl SortColumn {
    /// Column bound to a sort hotkey.
    pub fn from_hotkey(key: char) -> Option<Self> {
        let column = match key {
            'c' => SortColumn::Count,
            't' => SortColumn::Triaged,
            'u' => SortColumn::BugId,
            'r' => SortColumn::StartRevision,
            's' => SortColumn::TestSuite,
            'm' => SortColumn::Measurement,
            'a' => SortColumn::Master,
            'b' => SortColumn::Bot,
            'e' => SortColumn::TestCase,
            'd' => SortColumn::DeltaValue,
            'p' => SortColumn::PercentDeltaValue,
            _ => return None,
        };
        Some(column)
    }

    fn is_group_level(self) -> bool {
        matches!(self, SortColumn::Count | SortColumn::Triaged)
    }
}

fn compare_text(a: &str, b: &str) -> Ordering {
    a.to_lowercase()
        .cmp(&b.to_lowercase())
        .then_with(|| a.cmp(b))
}

/// Compare two alerts by a member-level column. `percentDeltaValue` compares
/// magnitudes. Group-level columns compare equal.
pub fn compare_alerts(a: &AlertRecord, b: &AlertRecord, column: SortColumn) -> Ordering {
    match column {
        SortColumn::Count | SortColumn::Triaged => Ordering::Equal,
        SortColumn::BugId => a.bug_id.sort_key().cmp(&b.bug_id.sort_key()),
        SortColumn::StartRevision => a.start_revision.cmp(&b.start_revision),
        SortColumn::TestSuite => compare_text(&a.test_suite, &b.test_suite),
        SortColumn::Measurement => compare_text(&a.measurement, &b.measurement),
        SortColumn::Master => compare_text(&a.master, &b.master),
        SortColumn::Bot => compare_text(&a.bot, &b.bot),
        SortColumn::TestCase => compare_text(&a.test_case, &b.test_case),
        SortColumn::DeltaValue => a.delta_value.total_cmp(&b.delta_value),
        SortColumn::PercentDeltaValue => a
            .percent_delta_value
            .abs()
            .total_cmp(&b.percent_delta_value.abs()),
    }
}

/// Sort groups and, for member-level columns, the members of each group.
///
/// Members keep untriaged alerts first unless `showing_triaged`, so index 0
/// stays the most relevant untriaged alert. Groups are then ordered by their
/// first member. All sorts are stable.
pub fn sort_groups(
    mut groups: Vec<AlertGroup>,
    column: SortColumn,
    descending: bool,
    showing_triaged: bool,
) -> Vec<AlertGroup> {
    let directed = |ordering: Ordering| {
        if descending {
            ordering.reverse()
        } else {
            ordering
        }
    };

    match column {
        SortColumn::Count => groups.sort_by(|a, b| {
            directed(
                a.displayed_count(showing_triaged)
                    .cmp(&b.displayed_count(showing_triaged)),
            )
        }),
        SortColumn::Triaged => groups.sort_by(|a, b| directed(a.triaged.count.cmp(&b.triaged.count))),
        _ => {
            debug_assert!(!column.is_group_level());
            for group in &mut groups {
                group.alerts.sort_by(|a, b| {
                    let triaged_last = if showing_triaged {
                        Ordering::Equal
                    } else {
                        a.is_triaged().cmp(&b.is_triaged())
                    };
                    triaged_last.then_with(|| directed(compare_alerts(a, b, column)))
                });
            }
            groups.sort_by(|a, b| match (a.alerts.first(), b.alerts.first()) {
                (Some(a), Some(b)) => directed(compare_alerts(a, b, column)),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            });
        }
    }
    groups
}
