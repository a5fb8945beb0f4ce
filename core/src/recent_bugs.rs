use crate::error::Result;
use serde::Deserialize;
use serde::Serialize;
use std::fs;
use std::path::Path;
use std::path::PathBuf;

pub const RECENT_BUGS_FILENAME: &str = "recent_bugs.json";

/// A bug the operator recently filed or triaged into.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecentBug {
    pub id: u64,
    #[serde(default)]
    pub summary: String,
}

/// Put a newly filed bug at the front.
pub(crate) fn record_new(bugs: &mut Vec<RecentBug>, id: u64, summary: String) {
    bugs.insert(0, RecentBug { id, summary });
}

/// Move `id` to the front, keeping its known summary.
pub(crate) fn record_existing(bugs: &mut Vec<RecentBug>, id: u64) {
    let summary = bugs
        .iter()
        .find(|bug| bug.id == id)
        .map(|bug| bug.summary.clone())
        .unwrap_or_default();
    bugs.retain(|bug| bug.id != id);
    bugs.insert(0, RecentBug { id, summary });
}

/// JSON file holding recent bugs, newest first.
#[derive(Debug, Clone)]
pub struct RecentBugsStore {
    path: PathBuf,
    limit: usize,
}

impl RecentBugsStore {
    pub fn new(path: PathBuf, limit: usize) -> Self {
        Self { path, limit }
    }

    /// Store under `dir` with the default file name.
    pub fn in_dir(dir: &Path, limit: usize) -> Self {
        Self::new(dir.join(RECENT_BUGS_FILENAME), limit)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// A missing file reads as an empty list.
    pub fn load(&self) -> Result<Vec<RecentBug>> {
        match fs::read(&self.path) {
            Ok(data) => {
                let mut bugs: Vec<RecentBug> = serde_json::from_slice(&data)?;
                bugs.truncate(self.limit);
                Ok(bugs)
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(err) => Err(err.into()),
        }
    }

    pub fn save(&self, bugs: &[RecentBug]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let bugs = &bugs[..bugs.len().min(self.limit)];
        let data = serde_json::to_vec_pretty(bugs)?;
        fs::write(&self.path, data)?;
        Ok(())
    }
}
