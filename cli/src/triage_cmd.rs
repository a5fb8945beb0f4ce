use crate::Session;
use crate::alerts_cmd::QueryArgs;
use crate::alerts_cmd::load_section;
use crate::alerts_cmd::print_errors;
use anyhow::Result;
use anyhow::bail;
use perfsheriff_core::NewBugFields;
use perfsheriff_core::SectionCommand;
use perfsheriff_core::SortColumn;
use perfsheriff_core::TriageCoordinator;
use perfsheriff_core::TriageIntent;
use perfsheriff_core::TriageOutcome;

/// Alerts to triage, identified by key within a loaded query.
#[derive(Debug, clap::Parser)]
pub struct TriageArgs {
    #[command(flatten)]
    pub query: QueryArgs,

    /// Keys of the alerts to triage.
    #[arg(required = true, value_name = "KEY")]
    pub keys: Vec<String>,
}

#[derive(Debug, clap::Parser)]
pub struct AssignArgs {
    /// Existing bug to assign the alerts to.
    #[arg(long = "bug-id", value_name = "BUG_ID")]
    pub bug_id: u64,

    #[command(flatten)]
    pub alerts: TriageArgs,
}

#[derive(Debug, clap::Parser)]
pub struct NewBugArgs {
    #[arg(long)]
    pub summary: String,

    #[arg(long, default_value = "")]
    pub description: String,

    #[arg(long, default_value = "")]
    pub owner: String,

    #[arg(long, value_delimiter = ',')]
    pub cc: Vec<String>,

    #[arg(long = "label", value_name = "LABEL")]
    pub labels: Vec<String>,

    #[arg(long = "component", value_name = "COMPONENT")]
    pub components: Vec<String>,

    #[command(flatten)]
    pub alerts: TriageArgs,
}

#[derive(Debug, clap::Parser)]
pub struct NudgeArgs {
    #[command(flatten)]
    pub query: QueryArgs,

    pub key: String,

    pub start_revision: i64,

    pub end_revision: i64,
}

pub(crate) async fn run_assign(session: &Session, args: AssignArgs) -> Result<()> {
    let coordinator = select(session, args.alerts).await?;
    let outcome = coordinator.submit_existing_bug(args.bug_id).await;
    report(&coordinator, outcome).await
}

pub(crate) async fn run_ignore(session: &Session, args: TriageArgs) -> Result<()> {
    let coordinator = select(session, args).await?;
    let outcome = coordinator.ignore().await;
    report(&coordinator, outcome).await
}

pub(crate) async fn run_unassign(session: &Session, args: TriageArgs) -> Result<()> {
    let coordinator = select(session, args).await?;
    let outcome = coordinator.unassign().await;
    report(&coordinator, outcome).await
}

pub(crate) async fn run_new_bug(session: &Session, args: NewBugArgs) -> Result<()> {
    let NewBugArgs {
        summary,
        description,
        owner,
        cc,
        labels,
        components,
        alerts,
    } = args;
    let coordinator = select(session, alerts).await?;
    let fields = NewBugFields {
        summary,
        description,
        owner,
        cc,
        labels,
        components,
    };
    let outcome = coordinator.submit_new_bug(fields).await;
    report(&coordinator, outcome).await
}

pub(crate) async fn run_nudge(session: &Session, args: NudgeArgs) -> Result<()> {
    let NudgeArgs {
        query,
        key,
        start_revision,
        end_revision,
    } = args;
    let coordinator = coordinator(session, query).await?;
    if coordinator.section().read(|s| s.find_alert(&key).is_none()).await {
        bail!("alert {key} was not loaded by the given query");
    }
    match coordinator.nudge(&key, start_revision, end_revision).await {
        TriageOutcome::Failed(error) => bail!("nudge failed: {error}"),
        _ => {
            println!("Nudged {key} to {start_revision}-{end_revision}");
            Ok(())
        }
    }
}

async fn coordinator(session: &Session, query: QueryArgs) -> Result<TriageCoordinator> {
    // Triaged alerts must be visible so keys that already carry a bug can
    // still be selected.
    let mut query = query.to_query();
    query.showing_triaged = true;
    let (section, backend) = load_section(session, query, SortColumn::default(), false).await?;
    Ok(
        TriageCoordinator::new(section, backend, session.config.sheriff.clone())
            .with_recent_bugs_store(session.config.recent_bugs_store(&session.home)),
    )
}

/// Load the query and select exactly `keys`.
async fn select(session: &Session, args: TriageArgs) -> Result<TriageCoordinator> {
    let TriageArgs { query, keys } = args;
    let coordinator = coordinator(session, query).await?;
    let section = coordinator.section();
    section.dispatch(SectionCommand::SelectKeys(keys.clone())).await;

    let selected = section.read(|s| s.selected_keys()).await;
    let missing: Vec<&str> = keys
        .iter()
        .filter(|key| !selected.contains(key))
        .map(String::as_str)
        .collect();
    if !missing.is_empty() {
        bail!("alerts not loaded by the given query: {}", missing.join(", "));
    }
    Ok(coordinator)
}

async fn report(coordinator: &TriageCoordinator, outcome: TriageOutcome) -> Result<()> {
    let state = coordinator.section().snapshot().await;
    match outcome {
        TriageOutcome::NothingSelected => bail!("no alerts selected"),
        TriageOutcome::Failed(error) => {
            print_errors(&state.errors);
            bail!("triage failed: {error}");
        }
        TriageOutcome::Settled => {}
    }
    match state.notice {
        TriageIntent::TriagedNew { bug_id } => println!("Filed bug {bug_id}"),
        TriageIntent::TriagedExisting { bug_id } => println!("Assigned to bug {bug_id}"),
        TriageIntent::Ignored { count } => {
            println!("Ignored {count} alert{}", if count == 1 { "" } else { "s" });
        }
        TriageIntent::None => println!("Unassigned"),
    }
    Ok(())
}
