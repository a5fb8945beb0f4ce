//! `perfsheriff`: browse and triage performance-regression alerts from a
//! terminal.

mod alerts_cmd;
pub mod config;
mod recent_cmd;
mod render;
mod triage_cmd;

use anyhow::Context;
use anyhow::Result;
use clap::Parser;
use config::CliConfig;
use perfsheriff_backend_client::HttpBackend;
use std::path::PathBuf;

pub use alerts_cmd::ListArgs;
pub use alerts_cmd::QueryArgs;
pub use recent_cmd::RecentArgs;
pub use triage_cmd::AssignArgs;
pub use triage_cmd::NewBugArgs;
pub use triage_cmd::NudgeArgs;
pub use triage_cmd::TriageArgs;

#[derive(Debug, Parser)]
#[command(name = "perfsheriff", version, about = "Browse and triage performance-regression alerts.")]
pub struct Cli {
    /// Dashboard base URL. Overrides `[dashboard].base_url` in config.toml.
    #[arg(long, global = true, env = "PERFSHERIFF_BASE_URL", value_name = "URL")]
    pub base_url: Option<String>,

    #[command(subcommand)]
    pub subcommand: Subcommand,
}

#[derive(Debug, clap::Subcommand)]
pub enum Subcommand {
    /// Load alerts and print them grouped.
    List(ListArgs),

    /// Assign the given alerts to an existing bug.
    Assign(AssignArgs),

    /// Mark the given alerts as ignored.
    Ignore(TriageArgs),

    /// Clear the bug of the given alerts.
    Unassign(TriageArgs),

    /// File a new bug for the given alerts.
    NewBug(NewBugArgs),

    /// Move one alert's revision range.
    Nudge(NudgeArgs),

    /// Show recently modified bugs.
    Recent(RecentArgs),
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        let session = Session::load(self.base_url)?;
        match self.subcommand {
            Subcommand::List(args) => alerts_cmd::run_list(&session, args).await,
            Subcommand::Assign(args) => triage_cmd::run_assign(&session, args).await,
            Subcommand::Ignore(args) => triage_cmd::run_ignore(&session, args).await,
            Subcommand::Unassign(args) => triage_cmd::run_unassign(&session, args).await,
            Subcommand::NewBug(args) => triage_cmd::run_new_bug(&session, args).await,
            Subcommand::Nudge(args) => triage_cmd::run_nudge(&session, args).await,
            Subcommand::Recent(args) => recent_cmd::run_recent(&session, args),
        }
    }
}

/// Resolved configuration shared by every subcommand.
pub(crate) struct Session {
    pub home: PathBuf,
    pub config: CliConfig,
    base_url: Option<String>,
}

impl Session {
    fn load(base_url: Option<String>) -> Result<Self> {
        let home = config::find_home()?;
        let config = CliConfig::load(&home)?;
        let base_url = base_url.or_else(|| config.dashboard.base_url.clone());
        Ok(Self {
            home,
            config,
            base_url,
        })
    }

    pub fn backend(&self) -> Result<HttpBackend> {
        let base_url = self
            .base_url
            .as_deref()
            .context("no dashboard URL configured; pass --base-url or set [dashboard].base_url")?;
        let backend = HttpBackend::new(base_url)
            .with_context(|| format!("invalid dashboard URL {base_url}"))?;
        Ok(match &self.config.dashboard.token {
            Some(token) => backend.with_token(token.clone()),
            None => backend,
        })
    }
}
