use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

pub const RECENT_PROJECTS_PATH: &str = "config/recent_projects.json";
const RECENT_LIMIT: usize = 8;

/// Most-recently-opened project files, newest first.
#[derive(Debug, Clone)]
pub struct RecentProjects {
    path: PathBuf,
    entries: Vec<PathBuf>,
}

impl RecentProjects {
    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        let entries = Self::load_list(&path);
        Self { path, entries }
    }

    pub fn entries(&self) -> &[PathBuf] {
        &self.entries
    }

    pub fn most_recent(&self) -> Option<&Path> {
        self.entries.first().map(PathBuf::as_path)
    }

    /// Moves `project` to the front, deduping and truncating, then persists.
    pub fn record(&mut self, project: &Path) {
        let canonical = project.canonicalize().unwrap_or_else(|_| project.to_path_buf());
        self.entries.retain(|p| p != &canonical);
        self.entries.insert(0, canonical);
        self.entries.truncate(RECENT_LIMIT);
        if let Err(err) = self.store() {
            warn!(target: "project", "failed to persist recent projects: {err:?}");
        }
    }

    /// Drops entries whose file no longer exists.
    pub fn prune_missing(&mut self) -> usize {
        let before = self.entries.len();
        self.entries.retain(|p| p.exists());
        let removed = before - self.entries.len();
        if removed > 0 {
            if let Err(err) = self.store() {
                warn!(target: "project", "failed to persist recent projects: {err:?}");
            }
        }
        removed
    }

    fn load_list(path: &Path) -> Vec<PathBuf> {
        if !path.exists() {
            return Vec::new();
        }
        let data = match fs::read_to_string(path) {
            Ok(data) => data,
            Err(err) => {
                warn!(target: "project", "failed to read recent list: {err}");
                return Vec::new();
            }
        };
        match serde_json::from_str::<Vec<String>>(&data) {
            Ok(list) => list.into_iter().map(PathBuf::from).collect(),
            Err(err) => {
                warn!(target: "project", "failed to parse recent list: {err}");
                Vec::new()
            }
        }
    }

    fn store(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create recent projects dir {}", parent.display()))?;
            }
        }
        let data = serde_json::to_string_pretty(
            &self.entries.iter().map(|p| p.display().to_string()).collect::<Vec<_>>(),
        )?;
        fs::write(&self.path, data)
            .with_context(|| format!("Failed to write recent projects list {}", self.path.display()))?;
        Ok(())
    }
}
