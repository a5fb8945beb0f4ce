use anyhow::Context;
use anyhow::Result;
use anyhow::anyhow;
use perfsheriff_core::RECENT_BUGS_FILENAME;
use perfsheriff_core::RecentBugsStore;
use perfsheriff_core::SheriffConfig;
use serde::Deserialize;
use std::path::Path;
use std::path::PathBuf;

pub const CONFIG_FILENAME: &str = "config.toml";

/// Overrides the directory holding `config.toml` and `recent_bugs.json`.
pub const HOME_ENV_VAR: &str = "PERFSHERIFF_HOME";

/// Where the dashboard lives.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    pub base_url: Option<String>,
    pub token: Option<String>,
}

/// `config.toml`: retrieval tuning at the top level plus a `[dashboard]`
/// table.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct CliConfig {
    #[serde(flatten)]
    pub sheriff: SheriffConfig,

    #[serde(default)]
    pub dashboard: DashboardConfig,
}

impl CliConfig {
    /// Load `config.toml` from `home`. A missing file yields defaults.
    pub fn load(home: &Path) -> Result<Self> {
        let path = home.join(CONFIG_FILENAME);
        let config = match std::fs::read_to_string(&path) {
            Ok(content) => Self::from_toml(&content)
                .with_context(|| format!("failed to parse {}", path.display()))?,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Self::default(),
            Err(err) => {
                return Err(err).with_context(|| format!("failed to read {}", path.display()));
            }
        };
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: CliConfig = toml::from_str(content)?;
        config.sheriff.validate().map_err(|err| anyhow!(err))?;
        Ok(config)
    }

    pub fn recent_bugs_store(&self, home: &Path) -> RecentBugsStore {
        let path = self
            .sheriff
            .recent_bugs_path
            .clone()
            .unwrap_or_else(|| home.join(RECENT_BUGS_FILENAME));
        RecentBugsStore::new(path, self.sheriff.recent_bugs_limit)
    }
}

/// `$PERFSHERIFF_HOME`, else `<config dir>/perfsheriff`.
pub fn find_home() -> Result<PathBuf> {
    if let Some(home) = std::env::var_os(HOME_ENV_VAR)
        && !home.is_empty()
    {
        return Ok(PathBuf::from(home));
    }
    dirs::config_dir()
        .map(|dir| dir.join("perfsheriff"))
        .context("could not determine the user config directory")
}
