use crate::Session;
use anyhow::Context;
use anyhow::Result;

#[derive(Debug, clap::Parser)]
pub struct RecentArgs {
    /// Print the bugs as JSON.
    #[arg(long)]
    pub json: bool,
}

pub(crate) fn run_recent(session: &Session, args: RecentArgs) -> Result<()> {
    let store = session.config.recent_bugs_store(&session.home);
    let bugs = store
        .load()
        .with_context(|| format!("failed to read {}", store.path().display()))?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&bugs)?);
        return Ok(());
    }
    if bugs.is_empty() {
        println!("No recently modified bugs.");
        return Ok(());
    }
    for bug in bugs {
        if bug.summary.is_empty() {
            println!("{}", bug.id);
        } else {
            println!("{}  {}", bug.id, bug.summary);
        }
    }
    Ok(())
}
