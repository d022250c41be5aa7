//! The editor context: one explicitly constructed owner for the scene graph,
//! entities, selection, gizmo, history, and scene-wide settings.

mod gizmo_interaction;
mod history_tooling;
mod project_io;
mod rig_tooling;
mod selection_tooling;

pub use project_io::LoadReport;

use crate::assets::{cancellable, LoadFuture, ModelSource};
use crate::config::EditorConfig;
use crate::entity::{Entity, EntityError, EntityId, GenerationLog, LoadState};
use crate::events::{EditorEvent, EventBus, SubscriptionId};
use crate::factory::{EntityFactory, EntityOptions};
use crate::gizmo::{GizmoManager, GizmoMode};
use crate::graph::SceneGraph;
use crate::history::{Command, HistoryManager};
use crate::scene::{EnvironmentSettings, RenderLogEntry, RenderSettings};
use crate::selection::{SelectionManager, SelectionTarget};
use crate::transform::Transform;
use std::collections::HashMap;
use tracing::{debug, info};

/// Direction for stepping through a generative entity's logs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerationStep {
    Previous,
    Next,
    Goto(String),
}

pub struct EditorContext {
    config: EditorConfig,
    graph: SceneGraph,
    entities: Vec<Entity>,
    selection: SelectionManager,
    gizmo: GizmoManager,
    history: HistoryManager,
    environment: EnvironmentSettings,
    render_settings: RenderSettings,
    models: Box<dyn ModelSource>,
    pending: HashMap<EntityId, LoadFuture>,
    events: EventBus,
}

impl EditorContext {
    pub fn new(config: EditorConfig, models: impl ModelSource + 'static) -> Self {
        let gizmo = GizmoManager::new(config.gizmo.default_mode);
        let history = HistoryManager::new(config.history.max_entries);
        Self {
            config,
            graph: SceneGraph::new(),
            entities: Vec::new(),
            selection: SelectionManager::new(),
            gizmo,
            history,
            environment: EnvironmentSettings::default(),
            render_settings: RenderSettings::default(),
            models: Box::new(models),
            pending: HashMap::new(),
            events: EventBus::default(),
        }
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    pub fn graph(&self) -> &SceneGraph {
        &self.graph
    }

    pub fn set_model_source(&mut self, models: impl ModelSource + 'static) {
        self.models = Box::new(models);
    }

    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    pub fn entity(&self, id: EntityId) -> Option<&Entity> {
        self.entities.iter().find(|entity| entity.id == id)
    }

    pub fn entity_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.entities.iter_mut().find(|entity| entity.id == id)
    }

    fn entity_index(&self, id: EntityId) -> Result<usize, EntityError> {
        self.entities.iter().position(|entity| entity.id == id).ok_or(EntityError::UnknownEntity(id))
    }

    pub fn history(&self) -> &HistoryManager {
        &self.history
    }

    pub fn gizmo(&self) -> &GizmoManager {
        &self.gizmo
    }

    pub fn environment(&self) -> &EnvironmentSettings {
        &self.environment
    }

    pub fn render_settings(&self) -> &RenderSettings {
        &self.render_settings
    }

    pub fn subscribe(&mut self, callback: impl FnMut(&EditorEvent) + 'static) -> SubscriptionId {
        self.events.subscribe(callback)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.events.unsubscribe(id)
    }

    pub fn drain_events(&mut self) -> Vec<EditorEvent> {
        self.events.drain()
    }

    fn emit(&mut self, event: EditorEvent) {
        debug!(target: "editor", "{event}");
        self.events.push(event);
    }

    fn emit_history_changed(&mut self) {
        let (can_undo, can_redo) = (self.history.can_undo(), self.history.can_redo());
        self.emit(EditorEvent::HistoryChanged { can_undo, can_redo });
    }

    /// Builds an entity and registers it. Any model load starts right away and can
    /// be awaited with `wait_until_ready`.
    pub fn create_entity(&mut self, options: EntityOptions) -> EntityId {
        let entity = EntityFactory::create(options, &mut self.graph);
        self.insert_entity(entity)
    }

    fn insert_entity(&mut self, entity: Entity) -> EntityId {
        let id = entity.id;
        let entity_type = entity.entity_type();
        self.entities.push(entity);
        self.start_pending_load(id);
        self.emit(EditorEvent::EntityAdded { id, entity_type });
        id
    }

    fn start_pending_load(&mut self, id: EntityId) {
        let Some(entity) = self.entities.iter_mut().find(|entity| entity.id == id) else {
            return;
        };
        let Some(url) = entity.pending_model_url().map(str::to_string) else {
            return;
        };
        let Some(token) = entity.begin_loading() else {
            return;
        };
        debug!(target: "editor", %id, %url, "starting model load");
        let load = cancellable(token, self.models.fetch(&url));
        self.pending.insert(id, load);
    }

    /// Disposes the entity, cancelling its load and dropping its history.
    pub fn remove_entity(&mut self, id: EntityId) -> Result<(), EntityError> {
        let index = self.entity_index(id)?;
        if self.selection.current().is_some_and(|target| target.entity() == id) {
            self.select(None)?;
        }
        self.pending.remove(&id);
        let mut entity = self.entities.remove(index);
        entity.dispose(&mut self.graph);
        self.history.forget_entity(id);
        self.emit(EditorEvent::EntityRemoved { id });
        self.emit_history_changed();
        Ok(())
    }

    pub fn is_loading(&self, id: EntityId) -> bool {
        self.entity(id).is_some_and(Entity::is_loading)
    }

    /// Awaits the entity's in-flight load, if any, and applies the result.
    pub async fn wait_until_ready(&mut self, id: EntityId) -> Result<Option<LoadState>, EntityError> {
        self.entity_index(id)?;
        if let Some(load) = self.pending.remove(&id) {
            let result = load.await;
            self.finish_load(id, result)?;
        }
        Ok(self.entity(id).and_then(Entity::load_state))
    }

    /// Drives every pending load in entity order.
    pub async fn wait_all_ready(&mut self) {
        let ids: Vec<EntityId> = self.entities.iter().map(|entity| entity.id).collect();
        for id in ids {
            let _ = self.wait_until_ready(id).await;
        }
    }

    fn finish_load(
        &mut self,
        id: EntityId,
        result: Result<crate::assets::ModelAsset, crate::assets::AssetError>,
    ) -> Result<(), EntityError> {
        let index = self.entity_index(id)?;
        self.entities[index].complete_load(result, &mut self.graph, &self.config.bones);
        let ready = match self.entities[index].load_state() {
            Some(LoadState::Ready { has_skeleton }) => Some(has_skeleton),
            _ => None,
        };
        let remapped = ready.is_some() && self.drop_stale_bone_handles(id)?;
        if !remapped && self.selection.current().is_some_and(|target| target.entity() == id) {
            self.entities[index].on_select(&mut self.graph, &self.config.bones);
        }
        if let Some(has_skeleton) = ready {
            self.emit(EditorEvent::EntityLoaded { id, has_skeleton });
        }
        Ok(())
    }

    /// Bone indices do not survive a rebuilt rig. Moves a bone selection up to the
    /// character and drops its bone edits. Returns true when the selection moved.
    fn drop_stale_bone_handles(&mut self, id: EntityId) -> Result<bool, EntityError> {
        let remap = matches!(
            self.selection.current(),
            Some(SelectionTarget::Bone { character, .. }) if character == id
        );
        if remap {
            self.select(Some(SelectionTarget::Entity(id)))?;
        }
        let before = self.history.len();
        self.history.forget_bone_commands(id);
        if self.history.len() != before {
            let dropped = before - self.history.len();
            debug!(target: "editor", %id, dropped, "dropped bone edits for a rebuilt rig");
            self.emit_history_changed();
        }
        Ok(remap)
    }

    /// Moves an entity and records the change for undo.
    pub fn set_entity_transform(&mut self, id: EntityId, transform: Transform) -> Result<(), EntityError> {
        let before = *self.entity(id).ok_or(EntityError::UnknownEntity(id))?.transform();
        self.apply_transform(id, transform)?;
        let command = Command::Transform { entity: id, before, after: transform };
        if !command.is_noop() {
            self.history.push(command);
            self.emit_history_changed();
        }
        Ok(())
    }

    fn apply_transform(&mut self, id: EntityId, transform: Transform) -> Result<(), EntityError> {
        let index = self.entity_index(id)?;
        self.entities[index].set_transform(transform, &mut self.graph);
        Ok(())
    }

    pub fn set_gizmo_mode(&mut self, mode: GizmoMode) -> bool {
        if self.gizmo.mode() == mode {
            return true;
        }
        if !self.gizmo.set_mode(mode) {
            return false;
        }
        self.emit(EditorEvent::GizmoModeChanged { mode });
        true
    }

    pub fn set_render_settings(&mut self, settings: RenderSettings) {
        self.render_settings = settings.sanitized();
        self.emit(EditorEvent::RenderSettingsChanged);
    }

    pub fn set_environment(&mut self, environment: EnvironmentSettings) {
        self.environment = environment.sanitized();
        self.emit(EditorEvent::EnvironmentChanged);
    }

    /// Seed for the next render; rolls a new one when random seeding is on.
    pub fn reroll_seed(&mut self) -> u64 {
        let seed = self.render_settings.next_seed(&mut rand::thread_rng());
        self.emit(EditorEvent::RenderSettingsChanged);
        seed
    }

    pub fn log_render(&mut self, image_url: impl Into<String>) -> RenderLogEntry {
        let entry = self.render_settings.log_render(image_url).clone();
        info!(target: "editor", seed = entry.seed, api = entry.api.label(), "render logged");
        self.emit(EditorEvent::RenderSettingsChanged);
        entry
    }

    /// Points a character at a new model and starts loading it.
    pub fn set_character_model(&mut self, id: EntityId, model_url: impl Into<String>) -> Result<(), EntityError> {
        let index = self.entity_index(id)?;
        let character = self.entities[index].as_character_mut().ok_or(EntityError::NotACharacter(id))?;
        character.set_model_url(model_url);
        self.start_pending_load(id);
        Ok(())
    }

    pub fn apply_generated_image(
        &mut self,
        id: EntityId,
        image_url: impl Into<String>,
        prompt: impl Into<String>,
    ) -> Result<GenerationLog, EntityError> {
        let index = self.entity_index(id)?;
        let generative = self.entities[index].as_generative_mut().ok_or(EntityError::NotGenerative(id))?;
        Ok(generative.apply_generated_image(image_url, prompt).clone())
    }

    /// Records a generated model and starts fetching it.
    pub fn apply_generated_model(
        &mut self,
        id: EntityId,
        model_url: impl Into<String>,
        prompt: impl Into<String>,
    ) -> Result<GenerationLog, EntityError> {
        let index = self.entity_index(id)?;
        let generative = self.entities[index].as_generative_mut().ok_or(EntityError::NotGenerative(id))?;
        let log = generative.apply_generated_model(model_url, prompt).clone();
        self.start_pending_load(id);
        Ok(log)
    }

    /// Moves a generative entity's cursor and records the move for undo.
    pub fn navigate_generation(
        &mut self,
        id: EntityId,
        step: GenerationStep,
    ) -> Result<Option<GenerationLog>, EntityError> {
        let index = self.entity_index(id)?;
        let generative = self.entities[index].as_generative_mut().ok_or(EntityError::NotGenerative(id))?;
        let before = generative.current_index();
        let log = match step {
            GenerationStep::Previous => generative.previous_generation(),
            GenerationStep::Next => generative.next_generation(),
            GenerationStep::Goto(log_id) => generative.go_to_generation(&log_id),
        }
        .cloned();
        let after = generative.current_index();
        let command = Command::GenerationCursor { entity: id, before, after };
        if !command.is_noop() {
            self.history.push(command);
            self.emit_history_changed();
        }
        self.start_pending_load(id);
        Ok(log)
    }
}
