use crate::project::{RecentProjects, RECENT_PROJECTS_PATH};
use anyhow::Result;
use mud_engine::assets::GltfModelSource;
use mud_engine::config::EditorConfig;
use mud_engine::entity::{EntityKind, LoadState};
use mud_engine::{EditorContext, LoadReport, ProjectManager};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

/// Headless studio session: one editor context plus the open project.
pub struct Studio {
    editor: EditorContext,
    project: ProjectManager,
    recent: RecentProjects,
}

impl Studio {
    pub fn new(config: EditorConfig) -> Self {
        Self::with_recent_list(config, RECENT_PROJECTS_PATH)
    }

    pub fn with_recent_list(config: EditorConfig, recent_path: impl AsRef<Path>) -> Self {
        let models = model_source(&config, None);
        Self {
            editor: EditorContext::new(config, models),
            project: ProjectManager::new(),
            recent: RecentProjects::load(recent_path),
        }
    }

    pub fn editor(&self) -> &EditorContext {
        &self.editor
    }

    pub fn editor_mut(&mut self) -> &mut EditorContext {
        &mut self.editor
    }

    pub fn recent(&self) -> &RecentProjects {
        &self.recent
    }

    pub fn is_dirty(&self) -> bool {
        self.project.is_dirty(&self.editor)
    }

    /// Loads a project; relative model URLs resolve against the project's folder
    /// unless the config names a model directory.
    pub async fn open_project(&mut self, path: impl AsRef<Path>) -> Result<LoadReport> {
        let path = path.as_ref();
        let models = model_source(self.editor.config(), path.parent());
        self.editor.set_model_source(models);
        let report = self.project.load_from_path(&mut self.editor, path).await?;
        self.recent.record(path);
        Ok(report)
    }

    pub fn save_project_as(&mut self, path: impl AsRef<Path>) -> Result<()> {
        self.project.save_to_path(&self.editor, path.as_ref())?;
        self.recent.record(path.as_ref());
        Ok(())
    }

    pub fn save_project(&mut self) -> Result<()> {
        self.project.save(&self.editor)
    }

    pub fn default_project_path(&self) -> PathBuf {
        PathBuf::from(ProjectManager::default_file_name(self.editor.config()))
    }

    pub fn summary(&self) -> String {
        let mut out = String::new();
        let path = self.project.path().map(|p| p.display().to_string()).unwrap_or_else(|| "<unsaved>".into());
        let _ = writeln!(out, "Project {path}: {} entities", self.editor.entities().len());
        for entity in self.editor.entities() {
            let detail = match entity.kind() {
                EntityKind::Character(character) => match character.load_state() {
                    LoadState::Ready { has_skeleton: true } => format!(
                        "{} bones, {} controls",
                        character.get_bones().len(),
                        character.bone_entries().count()
                    ),
                    LoadState::Ready { has_skeleton: false } => "no skeleton".to_string(),
                    other => format!("{other:?}").to_lowercase(),
                },
                EntityKind::Generative(generative) => format!("{} generations", generative.logs().len()),
                EntityKind::Shape(shape) => shape.shape_type().label().to_string(),
                EntityKind::Light(light) => format!("intensity {:.2}", light.props().intensity),
            };
            let _ = writeln!(out, "  {:<11} {:<24} {detail}", entity.entity_type().label(), entity.name);
        }
        let render = self.editor.render_settings();
        let _ = write!(out, "Renders logged: {}  API: {}", render.render_log.len(), render.selected_api.label());
        out
    }
}

fn model_source(config: &EditorConfig, project_dir: Option<&Path>) -> GltfModelSource {
    match (&config.project.model_dir, project_dir) {
        (Some(dir), _) => GltfModelSource::with_base_dir(dir),
        (None, Some(dir)) if !dir.as_os_str().is_empty() => GltfModelSource::with_base_dir(dir),
        _ => GltfModelSource::new(),
    }
}
