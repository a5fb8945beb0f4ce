/*!
# Perf Sheriff Core

Retrieval and triage engine for performance-regression alerts.

## Architecture

```text
AlertsQuery
  └─> compile_sources()            one RequestDescriptor per source
        └─> BatchIterator          waves of concurrent page fetches
              │   ▲
              │   └── loader adds cursor / triaged follow-ups between waves
              └─> SectionCommand::ReceiveAlerts
                    └─> transform + group_alerts + sort_groups
                          └─> SectionState (table, selection, notices)
                                └─> TriageCoordinator
                                      └─> BugTracker (remote mutation)
```

Every change to a section goes through [`SectionState::apply`] with one
[`SectionCommand`]. [`SectionHandle`] shares a section between the loader,
the coordinator and a presentation layer, and broadcasts [`TableEvent`]s.

Fetch and mutation failures are data: they are appended to
`SectionState::errors` rather than returned to the caller.
*/

mod alert;
mod backend;
mod batch;
mod config;
mod error;
mod group;
mod loader;
mod recent_bugs;
mod request;
mod section;
mod table;
mod triage;
mod unit;

pub use alert::AlertRecord;
pub use alert::BugId;
pub use alert::IGNORED_BUG_ID;
pub use alert::RawAlert;
pub use alert::RawDescriptor;
pub use backend::AlertsBackend;
pub use backend::AlertsPage;
pub use backend::BackendError;
pub use backend::BugTracker;
pub use backend::NewBugFields;
pub use batch::Batch;
pub use batch::BatchIterator;
pub use config::SheriffConfig;
pub use error::CoreError;
pub use error::Result;
pub use group::AlertGroup;
pub use group::RevisionOverlapGrouper;
pub use group::SharedGrouper;
pub use group::SimilarityGrouper;
pub use group::TriagedState;
pub use group::group_alerts;
pub use loader::AlertsLoader;
pub use loader::LoadOutcome;
pub use recent_bugs::RECENT_BUGS_FILENAME;
pub use recent_bugs::RecentBug;
pub use recent_bugs::RecentBugsStore;
pub use request::AlertsQuery;
pub use request::BugFilter;
pub use request::ReportTemplate;
pub use request::RequestDescriptor;
pub use request::compile_sources;
pub use section::NudgeState;
pub use section::SectionCommand;
pub use section::SectionHandle;
pub use section::SectionState;
pub use section::TableEvent;
pub use section::TriageIntent;
pub use table::SortColumn;
pub use table::TableState;
pub use table::all_triaged;
pub use table::compare_alerts;
pub use table::selected_alerts;
pub use table::should_display_alert;
pub use table::should_display_expand_group_button;
pub use table::should_display_expand_triaged_button;
pub use table::sort_groups;
pub use table::summary;
pub use triage::TriageCoordinator;
pub use triage::TriageOutcome;
pub use unit::ImprovementDirection;
pub use unit::Unit;
