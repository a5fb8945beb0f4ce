use crate::Session;
use crate::render;
use anyhow::Context;
use anyhow::Result;
use anyhow::bail;
use owo_colors::OwoColorize;
use perfsheriff_backend_client::HttpBackend;
use perfsheriff_core::AlertsLoader;
use perfsheriff_core::AlertsQuery;
use perfsheriff_core::LoadOutcome;
use perfsheriff_core::SectionCommand;
use perfsheriff_core::SectionHandle;
use perfsheriff_core::SectionState;
use perfsheriff_core::SortColumn;
use std::io::IsTerminal;
use std::sync::Arc;
use tracing::debug;
use tracing::warn;

/// Which alerts to load.
#[derive(Debug, Default, clap::Args)]
pub struct QueryArgs {
    /// Sheriff rotation whose alerts to load. Repeatable.
    #[arg(long = "sheriff", value_name = "NAME")]
    pub sheriffs: Vec<String>,

    /// Load the alerts associated with this bug. Repeatable.
    #[arg(long = "bug", value_name = "BUG_ID")]
    pub bugs: Vec<String>,

    /// Load the alerts of this report template. Repeatable.
    #[arg(long = "report", value_name = "NAME")]
    pub reports: Vec<String>,

    #[arg(long, value_name = "REVISION")]
    pub min_revision: Option<String>,

    #[arg(long, value_name = "REVISION")]
    pub max_revision: Option<String>,

    /// Include improvements.
    #[arg(long)]
    pub improvements: bool,

    /// Include alerts that already have a bug.
    #[arg(long)]
    pub triaged: bool,
}

impl QueryArgs {
    pub fn to_query(&self) -> AlertsQuery {
        AlertsQuery {
            sheriffs: self.sheriffs.clone(),
            bugs: self.bugs.clone(),
            reports: self.reports.clone(),
            min_revision: self.min_revision.clone(),
            max_revision: self.max_revision.clone(),
            showing_improvements: self.improvements,
            showing_triaged: self.triaged,
        }
    }
}

#[derive(Debug, clap::Parser)]
pub struct ListArgs {
    #[command(flatten)]
    pub query: QueryArgs,

    /// Column to sort by, e.g. `startRevision`, `suite`, `percentDeltaValue`.
    #[arg(long, value_parser = parse_sort_column, default_value = "startRevision")]
    pub sort: SortColumn,

    #[arg(long)]
    pub descending: bool,

    /// Show every member of every group.
    #[arg(long)]
    pub expand: bool,

    /// Print the groups as JSON.
    #[arg(long)]
    pub json: bool,
}

fn parse_sort_column(value: &str) -> Result<SortColumn, String> {
    value
        .parse()
        .map_err(|_| format!("unknown sort column `{value}`"))
}

pub(crate) async fn run_list(session: &Session, args: ListArgs) -> Result<()> {
    let ListArgs {
        query,
        sort,
        descending,
        expand,
        json,
    } = args;
    let (section, _) = load_section(session, query.to_query(), sort, descending).await?;

    if expand {
        let groups = section.read(|s| s.table.alert_groups.len()).await;
        for index in 0..groups {
            section.dispatch(SectionCommand::ToggleGroupExpanded(index)).await;
            section
                .dispatch(SectionCommand::ToggleTriagedExpanded(index))
                .await;
        }
    }

    let state = section.snapshot().await;
    print_errors(&state.errors);
    if json {
        println!("{}", serde_json::to_string_pretty(&state.table.alert_groups)?);
    } else {
        print!("{}", render::render_table(&state, std::io::stdout().is_terminal()));
    }
    Ok(())
}

/// Load `query` into a fresh section.
pub(crate) async fn load_section(
    session: &Session,
    query: AlertsQuery,
    sort: SortColumn,
    descending: bool,
) -> Result<(SectionHandle, Arc<HttpBackend>)> {
    if query.is_empty() {
        bail!("select at least one --sheriff, --bug, --report or revision bound");
    }
    let backend = Arc::new(session.backend()?);
    let templates = if query.reports.is_empty() {
        Vec::new()
    } else {
        backend
            .report_templates()
            .await
            .context("failed to list report templates")?
    };

    let store = session.config.recent_bugs_store(&session.home);
    let recent_bugs = store.load().unwrap_or_else(|err| {
        warn!(path = %store.path().display(), error = %err, "ignoring unreadable recent bugs");
        Vec::new()
    });
    let state = SectionState::new(query)
        .with_sort(sort, descending)
        .with_recent_bugs(recent_bugs);
    let section = SectionHandle::new(state);

    let loader = AlertsLoader::new(backend.clone(), section.clone(), session.config.sheriff.clone());
    match loader.load_query(&templates).await {
        LoadOutcome::Completed { waves } => debug!(waves, "load complete"),
        LoadOutcome::Abandoned => bail!("load was superseded"),
    }
    Ok((section, backend))
}

pub(crate) fn print_errors(errors: &[String]) {
    let color = std::io::stderr().is_terminal();
    for error in errors {
        if color {
            eprintln!("{} {error}", "error:".red().bold());
        } else {
            eprintln!("error: {error}");
        }
    }
}
