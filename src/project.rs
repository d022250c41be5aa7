use crate::config::EditorConfig;
use crate::editor::{EditorContext, LoadReport};
use crate::scene::ProjectDocument;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::info;

/// Tracks the open project file and whether the scene changed since it was
/// last saved or loaded.
#[derive(Debug, Default)]
pub struct ProjectManager {
    path: Option<PathBuf>,
    saved_hash: Option<blake3::Hash>,
}

impl ProjectManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn default_file_name(config: &EditorConfig) -> String {
        config.project_file_name("untitled")
    }

    pub fn save_to_path(&mut self, editor: &EditorContext, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let document = editor.serialize_scene().context("Serializing scene")?;
        document.save_to_path(path)?;
        self.saved_hash = Some(document.content_hash()?);
        self.path = Some(path.to_path_buf());
        info!(target: "project", path = %path.display(), entities = document.entities.len(), "project saved");
        Ok(())
    }

    /// Saves back to the file the project was opened from or last saved to.
    pub fn save(&mut self, editor: &EditorContext) -> Result<()> {
        let path = self.path.clone().context("Project has not been saved yet; choose a path")?;
        self.save_to_path(editor, path)
    }

    pub async fn load_from_path(&mut self, editor: &mut EditorContext, path: impl AsRef<Path>) -> Result<LoadReport> {
        let path = path.as_ref();
        let document = ProjectDocument::load_from_path(path)?;
        let report = editor.deserialize_scene(document).await;
        self.saved_hash = Some(editor.serialize_scene()?.content_hash()?);
        self.path = Some(path.to_path_buf());
        info!(target: "project", path = %path.display(), restored = report.restored, "project loaded");
        Ok(report)
    }

    /// True when the scene differs from what was last saved or loaded. A scene
    /// that was never saved is dirty once it holds anything.
    pub fn is_dirty(&self, editor: &EditorContext) -> bool {
        let Some(saved) = self.saved_hash else {
            return !editor.entities().is_empty();
        };
        match editor.serialize_scene().and_then(|document| document.content_hash()) {
            Ok(current) => current != saved,
            Err(_) => true,
        }
    }
}
