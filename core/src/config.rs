use crate::error::CoreError;
use crate::error::Result;
use serde::Deserialize;
use serde::Serialize;
use std::path::Path;
use std::path::PathBuf;
use std::time::Duration;

/// Tuning for alert retrieval and triage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SheriffConfig {
    /// How long a triage notification stays visible, in milliseconds
    #[serde(default = "default_notification_ms")]
    pub notification_ms: u64,

    /// `count_limit` attached to every per-sheriff source
    #[serde(default = "default_count_limit")]
    pub count_limit: u32,

    /// Stop chasing untriaged cursors once this many groups are loaded
    #[serde(default = "default_enough_groups")]
    pub enough_groups: usize,

    /// Stop chasing untriaged cursors after this many milliseconds
    #[serde(default = "default_enough_loading_ms")]
    pub enough_loading_ms: u64,

    /// Maximum number of recently modified bugs kept on disk
    #[serde(default = "default_recent_bugs_limit")]
    pub recent_bugs_limit: usize,

    /// Where recently modified bugs are persisted
    #[serde(default)]
    pub recent_bugs_path: Option<PathBuf>,

    /// Toggle the first group's header after every bug-id mutation
    #[serde(default)]
    pub select_next_group_after_triage: bool,
}

fn default_notification_ms() -> u64 {
    5000
}

fn default_count_limit() -> u32 {
    5000
}

fn default_enough_groups() -> usize {
    100
}

fn default_enough_loading_ms() -> u64 {
    60_000
}

fn default_recent_bugs_limit() -> usize {
    50
}

impl Default for SheriffConfig {
    fn default() -> Self {
        Self {
            notification_ms: default_notification_ms(),
            count_limit: default_count_limit(),
            enough_groups: default_enough_groups(),
            enough_loading_ms: default_enough_loading_ms(),
            recent_bugs_limit: default_recent_bugs_limit(),
            recent_bugs_path: None,
            select_next_group_after_triage: false,
        }
    }
}

impl SheriffConfig {
    /// Load configuration from a TOML file. A missing file yields defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Ok(Self::default());
            }
            Err(err) => return Err(err.into()),
        };
        Self::from_toml(&content)
    }

    /// Parse and validate configuration from TOML text
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: SheriffConfig = toml::from_str(content)?;
        config.validate().map_err(CoreError::InvalidConfig)?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.notification_ms == 0 {
            return Err("notification_ms must be > 0".to_string());
        }

        if self.count_limit == 0 {
            return Err("count_limit must be > 0".to_string());
        }

        if self.enough_groups == 0 {
            return Err("enough_groups must be > 0".to_string());
        }

        if self.recent_bugs_limit == 0 {
            return Err("recent_bugs_limit must be > 0".to_string());
        }

        Ok(())
    }

    pub fn notification_delay(&self) -> Duration {
        Duration::from_millis(self.notification_ms)
    }

    pub fn loading_budget(&self) -> Duration {
        Duration::from_millis(self.enough_loading_ms)
    }

    /// Create config that chases every cursor regardless of group count or
    /// elapsed time
    pub fn exhaustive() -> Self {
        Self {
            enough_groups: usize::MAX,
            enough_loading_ms: u64::MAX,
            ..Default::default()
        }
    }
}
