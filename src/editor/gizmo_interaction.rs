use super::EditorContext;
use crate::entity::EntityError;
use crate::gizmo::DragSession;
use crate::history::Command;
use crate::selection::SelectionTarget;
use crate::transform::Transform;
use glam::Quat;
use tracing::debug;

impl EditorContext {
    /// Snapshots the selected bone's rotation. Returns false unless a bone is selected.
    pub fn begin_rotation_drag(&mut self) -> bool {
        let Some(SelectionTarget::Bone { character, bone }) = self.selection.current() else {
            return false;
        };
        let Some(start) = self
            .entity(character)
            .and_then(|entity| entity.as_character())
            .and_then(|rig| rig.bone_rotation(bone, &self.graph))
        else {
            return false;
        };
        self.gizmo.begin_drag(DragSession::BoneRotation { character, bone, start });
        true
    }

    /// Live update while dragging; nothing is recorded until the drag ends.
    pub fn drag_rotation(&mut self, rotation: Quat) -> Result<bool, EntityError> {
        let Some(DragSession::BoneRotation { character, bone, .. }) = self.gizmo.drag().copied() else {
            return Ok(false);
        };
        let index = self.entity_index(character)?;
        let rig = self.entities[index].as_character_mut().ok_or(EntityError::NotACharacter(character))?;
        rig.set_bone_rotation(bone, rotation, &mut self.graph)?;
        rig.update_bone_visualization(&mut self.graph);
        Ok(true)
    }

    /// Ends the drag and records one history entry, unless nothing changed.
    pub fn end_rotation_drag(&mut self) -> Option<Command> {
        let Some(DragSession::BoneRotation { character, bone, start }) = self.gizmo.drag().copied() else {
            return None;
        };
        self.gizmo.take_drag();
        let after = self.entity(character)?.as_character()?.bone_rotation(bone, &self.graph)?;
        self.record(Command::BoneRotation { character, bone, before: start, after })
    }

    /// Snapshots the selected entity's transform. Returns false unless an entity is selected.
    pub fn begin_transform_drag(&mut self) -> bool {
        let Some(SelectionTarget::Entity(entity)) = self.selection.current() else {
            return false;
        };
        let Some(start) = self.entity(entity).map(|entity| *entity.transform()) else {
            return false;
        };
        self.gizmo.begin_drag(DragSession::Transform { entity, start });
        true
    }

    pub fn drag_transform(&mut self, transform: Transform) -> Result<bool, EntityError> {
        let Some(DragSession::Transform { entity, .. }) = self.gizmo.drag().copied() else {
            return Ok(false);
        };
        self.apply_transform(entity, transform)?;
        Ok(true)
    }

    pub fn end_transform_drag(&mut self) -> Option<Command> {
        let Some(DragSession::Transform { entity, start }) = self.gizmo.drag().copied() else {
            return None;
        };
        self.gizmo.take_drag();
        let after = *self.entity(entity)?.transform();
        self.record(Command::Transform { entity, before: start, after })
    }

    /// Abandons the drag and restores the state captured when it began.
    pub fn cancel_drag(&mut self) -> Result<bool, EntityError> {
        let Some(session) = self.gizmo.take_drag() else {
            return Ok(false);
        };
        match session {
            DragSession::BoneRotation { character, bone, start } => {
                let index = self.entity_index(character)?;
                if let Some(rig) = self.entities[index].as_character_mut() {
                    rig.set_bone_rotation(bone, start, &mut self.graph)?;
                    rig.update_bone_visualization(&mut self.graph);
                }
            }
            DragSession::Transform { entity, start } => self.apply_transform(entity, start)?,
        }
        Ok(true)
    }

    fn record(&mut self, command: Command) -> Option<Command> {
        if command.is_noop() {
            debug!(target: "editor", "{} left state unchanged; not recorded", command.description());
            return None;
        }
        self.history.push(command.clone());
        self.emit_history_changed();
        Some(command)
    }
}
