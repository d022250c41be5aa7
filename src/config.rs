use crate::gizmo::GizmoMode;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

pub const DEFAULT_CONFIG_PATH: &str = "config/editor.json";

#[derive(Debug, Clone, Deserialize)]
pub struct HistoryConfig {
    #[serde(default = "HistoryConfig::default_max_entries")]
    pub max_entries: usize,
}

impl HistoryConfig {
    const fn default_max_entries() -> usize {
        100
    }
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self { max_entries: Self::default_max_entries() }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct BonesConfig {
    /// Bones whose lowercase name contains any of these get no control.
    #[serde(default = "BonesConfig::default_excluded_keywords")]
    pub excluded_keywords: Vec<String>,
    #[serde(default = "BonesConfig::default_control_radius")]
    pub control_radius: f32,
    /// Non-root bones closer than this to their parent get no control. Zero disables the check.
    #[serde(default)]
    pub min_bone_length: f32,
    #[serde(default = "BonesConfig::default_show_on_select")]
    pub show_on_select: bool,
}

impl BonesConfig {
    fn default_excluded_keywords() -> Vec<String> {
        ["finger", "thumb", "index", "middle", "ring", "pinky", "toe", "eye", "jaw", "tongue"]
            .into_iter()
            .map(str::to_string)
            .collect()
    }

    const fn default_control_radius() -> f32 {
        0.05
    }

    const fn default_show_on_select() -> bool {
        true
    }

    pub fn is_excluded(&self, bone_name: &str) -> bool {
        let name = bone_name.to_ascii_lowercase();
        self.excluded_keywords
            .iter()
            .any(|keyword| !keyword.is_empty() && name.contains(&keyword.to_ascii_lowercase()))
    }
}

impl Default for BonesConfig {
    fn default() -> Self {
        Self {
            excluded_keywords: Self::default_excluded_keywords(),
            control_radius: Self::default_control_radius(),
            min_bone_length: 0.0,
            show_on_select: Self::default_show_on_select(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProjectConfig {
    #[serde(default = "ProjectConfig::default_extension")]
    pub extension: String,
    #[serde(default = "ProjectConfig::default_version")]
    pub version: String,
    /// Base directory for relative model paths. Defaults to the project file's folder.
    #[serde(default)]
    pub model_dir: Option<PathBuf>,
}

impl ProjectConfig {
    fn default_extension() -> String {
        "mud".to_string()
    }

    fn default_version() -> String {
        crate::scene::PROJECT_VERSION.to_string()
    }
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self { extension: Self::default_extension(), version: Self::default_version(), model_dir: None }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GizmoConfig {
    #[serde(default)]
    pub default_mode: GizmoMode,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EditorConfig {
    #[serde(default)]
    pub history: HistoryConfig,
    #[serde(default)]
    pub bones: BonesConfig,
    #[serde(default)]
    pub project: ProjectConfig,
    #[serde(default)]
    pub gizmo: GizmoConfig,
}

#[derive(Debug, Clone, Default)]
pub struct EditorConfigOverrides {
    pub history_limit: Option<usize>,
    pub gizmo_mode: Option<GizmoMode>,
    pub show_bones: Option<bool>,
    pub model_dir: Option<PathBuf>,
}

impl EditorConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes =
            fs::read(path).with_context(|| format!("Failed to read config file {}", path.display()))?;
        let cfg = serde_json::from_slice(&bytes)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        Ok(cfg)
    }

    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        match Self::load(path) {
            Ok(cfg) => cfg,
            Err(err) => {
                warn!(target: "config", "config load error: {err:?}; falling back to defaults");
                Self::default()
            }
        }
    }

    pub fn apply_overrides(&mut self, overrides: &EditorConfigOverrides) {
        if let Some(limit) = overrides.history_limit {
            self.history.max_entries = limit;
        }
        if let Some(mode) = overrides.gizmo_mode {
            self.gizmo.default_mode = mode;
        }
        if let Some(show) = overrides.show_bones {
            self.bones.show_on_select = show;
        }
        if let Some(dir) = &overrides.model_dir {
            self.project.model_dir = Some(dir.clone());
        }
    }

    /// File name for a new project, e.g. `untitled.mud`.
    pub fn project_file_name(&self, stem: &str) -> String {
        let extension = self.project.extension.trim_start_matches('.');
        format!("{stem}.{extension}")
    }
}

impl EditorConfigOverrides {
    pub fn is_empty(&self) -> bool {
        self.history_limit.is_none()
            && self.gizmo_mode.is_none()
            && self.show_bones.is_none()
            && self.model_dir.is_none()
    }

    pub fn applied_fields(&self) -> Vec<&'static str> {
        let mut fields = Vec::new();
        if self.history_limit.is_some() {
            fields.push("history_limit");
        }
        if self.gizmo_mode.is_some() {
            fields.push("gizmo_mode");
        }
        if self.show_bones.is_some() {
            fields.push("show_bones");
        }
        if self.model_dir.is_some() {
            fields.push("model_dir");
        }
        fields
    }
}
