use super::EditorContext;
use crate::entity::EntityError;
use crate::events::EditorEvent;
use crate::gizmo::GizmoCapabilities;
use crate::graph::picking::pick;
use crate::graph::{NodeId, NodeOwner};
use crate::selection::{cursor_for, CursorIcon, SelectionTarget};
use glam::Vec3;

impl EditorContext {
    pub fn selection(&self) -> Option<SelectionTarget> {
        self.selection.current()
    }

    /// Node the gizmo should grab for `target`, with the modes it supports.
    fn target_anchor(&self, target: SelectionTarget) -> Result<(NodeId, GizmoCapabilities), EntityError> {
        match target {
            SelectionTarget::Entity(id) => {
                let entity = self.entity(id).ok_or(EntityError::UnknownEntity(id))?;
                Ok((entity.root(), entity.capabilities()))
            }
            SelectionTarget::Bone { character, bone } => {
                let entity = self.entity(character).ok_or(EntityError::UnknownEntity(character))?;
                let character_entity = entity.as_character().ok_or(EntityError::NotACharacter(character))?;
                let control = character_entity
                    .control_for(bone)
                    .ok_or_else(|| EntityError::UnknownBone { character, bone: bone.to_string() })?;
                Ok((control.node, control.capabilities()))
            }
        }
    }

    /// Replaces the selection. Runs the previous target's deselect hook, moves the
    /// gizmo, then runs the new target's select hook. Reselecting is a no-op.
    pub fn select(&mut self, target: Option<SelectionTarget>) -> Result<(), EntityError> {
        let previous = self.selection.current();
        if previous == target {
            return Ok(());
        }
        let anchor = target.map(|target| self.target_anchor(target)).transpose()?;

        if let Some(previous) = previous {
            self.release_target(previous, target);
        }
        for node in self.graph.selected_nodes() {
            self.graph.set_selected(node, false);
        }

        match anchor {
            Some((node, capabilities)) => {
                self.graph.set_selected(node, true);
                if let Some(mode) = self.gizmo.attach(node, capabilities) {
                    self.emit(EditorEvent::GizmoModeChanged { mode });
                }
            }
            None => self.gizmo.detach(),
        }

        if let Some(target) = target {
            self.engage_target(target);
        }
        self.selection.replace(target);
        self.emit(EditorEvent::SelectionChanged { previous, current: target });
        Ok(())
    }

    fn release_target(&mut self, previous: SelectionTarget, next: Option<SelectionTarget>) {
        let owner = previous.entity();
        // Moving between a character and its own bones keeps the rig visible.
        if next.is_some_and(|next| next.entity() == owner) {
            return;
        }
        if let Ok(index) = self.entity_index(owner) {
            self.entities[index].on_deselect(&mut self.graph);
        }
    }

    fn engage_target(&mut self, target: SelectionTarget) {
        let Ok(index) = self.entity_index(target.entity()) else {
            return;
        };
        match target {
            SelectionTarget::Entity(_) => self.entities[index].on_select(&mut self.graph, &self.config.bones),
            SelectionTarget::Bone { .. } => {
                if let Some(character) = self.entities[index].as_character_mut() {
                    character.show_bone_visualization(true, &mut self.graph);
                }
            }
        }
    }

    /// Whatever selectable thing the ray hits first.
    pub fn pick(&self, origin: Vec3, dir: Vec3) -> Option<SelectionTarget> {
        let hit = pick(&self.graph, origin, dir)?;
        Some(match hit.owner {
            NodeOwner::Entity(id) => SelectionTarget::Entity(id),
            NodeOwner::BoneControl { character, bone } => SelectionTarget::Bone { character, bone },
        })
    }

    /// Click handling: selects the hit target, or clears the selection on a miss.
    pub fn select_at(&mut self, origin: Vec3, dir: Vec3) -> Result<Option<SelectionTarget>, EntityError> {
        let target = self.pick(origin, dir);
        self.select(target)?;
        Ok(target)
    }

    /// Cursor for hovering along the ray, read from the hit node's capabilities or
    /// those of the node that owns it.
    pub fn hover_cursor(&self, origin: Vec3, dir: Vec3) -> CursorIcon {
        let Some(hit) = pick(&self.graph, origin, dir) else {
            return CursorIcon::Default;
        };
        let own = self.graph.get(hit.node).and_then(|node| node.capabilities);
        let capabilities = own.or_else(|| {
            let (owner_node, _) = self.graph.resolve_owner(hit.node)?;
            self.graph.get(owner_node).and_then(|node| node.capabilities)
        });
        cursor_for(capabilities)
    }
}
