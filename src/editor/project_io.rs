use super::EditorContext;
use crate::entity::{EntityId, LoadState};
use crate::events::EditorEvent;
use crate::factory::EntityFactory;
use crate::scene::{ProjectDocument, PROJECT_VERSION};
use crate::transform::Transform;
use chrono::Utc;
use std::collections::HashSet;
use tracing::{info, warn};

/// What happened while restoring a project.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    pub restored: usize,
    /// Entities whose props could not be decoded and were rebuilt with defaults.
    pub fallbacks: Vec<EntityId>,
    pub bones_applied: usize,
    pub bones_skipped: usize,
    pub characters_without_skeleton: Vec<EntityId>,
    /// `(saved id, fresh id)` for ids that appeared more than once.
    pub reassigned_ids: Vec<(EntityId, EntityId)>,
}

impl EditorContext {
    /// Snapshot of every live entity plus the scene-wide settings.
    pub fn serialize_scene(&self) -> Result<ProjectDocument, serde_json::Error> {
        let entities = self
            .entities
            .iter()
            .filter(|entity| !entity.is_disposed())
            .map(|entity| entity.serialize(&self.graph))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ProjectDocument {
            version: PROJECT_VERSION.to_string(),
            timestamp: Utc::now(),
            entities,
            environment: self.environment.clone(),
            render_settings: self.render_settings.clone(),
        })
    }

    /// Disposes every entity and resets selection and history.
    pub fn clear_scene(&mut self) {
        let _ = self.select(None);
        self.gizmo.detach();
        self.pending.clear();
        for mut entity in self.entities.drain(..) {
            entity.dispose(&mut self.graph);
        }
        self.history.clear();
        self.emit_history_changed();
    }

    /// Replaces the scene with `document`. Entities are restored one at a time:
    /// build, await the model, place, then apply saved bone rotations, so pose
    /// data only ever lands on a finished skeleton.
    pub async fn deserialize_scene(&mut self, document: ProjectDocument) -> LoadReport {
        self.clear_scene();
        if document.version != PROJECT_VERSION {
            warn!(target: "project", version = %document.version, "project was written by another version");
        }
        let mut report = LoadReport::default();
        let mut seen = HashSet::with_capacity(document.entities.len());
        for mut data in document.entities {
            if !seen.insert(data.id) {
                let fresh = EntityId::new();
                warn!(target: "project", saved = %data.id, %fresh, "duplicate entity id; assigning a fresh one");
                report.reassigned_ids.push((data.id, fresh));
                data.id = fresh;
                seen.insert(fresh);
            }
            let entity = match EntityFactory::from_serialized(&data, &mut self.graph) {
                Ok(entity) => entity,
                Err(err) => {
                    warn!(target: "project", id = %data.id, name = %data.name, "restoring with defaults: {err}");
                    report.fallbacks.push(data.id);
                    EntityFactory::fallback(&data, &mut self.graph)
                }
            };
            let id = self.insert_entity(entity);
            let _ = self.wait_until_ready(id).await;

            let transform = Transform::new(data.position.into(), data.rotation.into(), data.scaling.into());
            if transform.is_finite() {
                let _ = self.apply_transform(id, transform);
            } else {
                warn!(target: "project", %id, "ignoring non-finite transform");
                let _ = self.apply_transform(id, Transform::default());
            }

            let Ok(index) = self.entity_index(id) else {
                continue;
            };
            if let Some(character) = self.entities[index].as_character_mut() {
                if character.has_skeleton() {
                    let saved = character.saved_bone_rotations().clone();
                    let applied = character.apply_bone_rotations(&saved, &mut self.graph);
                    report.bones_applied += applied.applied;
                    report.bones_skipped += applied.skipped.len();
                } else if character.load_state() == (LoadState::Ready { has_skeleton: false }) {
                    report.characters_without_skeleton.push(id);
                }
            }
            report.restored += 1;
        }

        self.environment = document.environment.sanitized();
        self.render_settings = document.render_settings.sanitized();
        self.emit(EditorEvent::EnvironmentChanged);
        self.emit(EditorEvent::RenderSettingsChanged);
        self.emit(EditorEvent::ProjectLoaded { entities: report.restored });
        info!(
            target: "project",
            restored = report.restored,
            fallbacks = report.fallbacks.len(),
            bones = report.bones_applied,
            "project restored"
        );
        report
    }
}
