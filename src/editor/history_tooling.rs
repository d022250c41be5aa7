use super::EditorContext;
use crate::entity::EntityError;
use crate::history::Command;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Before,
    After,
}

impl Side {
    fn pick<T>(self, before: T, after: T) -> T {
        match self {
            Side::Before => before,
            Side::After => after,
        }
    }
}

impl EditorContext {
    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    /// Restores the `before` state of the latest command.
    pub fn undo(&mut self) -> Option<Command> {
        let command = self.history.undo().cloned()?;
        self.restore(&command, Side::Before);
        info!(target: "history", "undo {}", command.description());
        self.emit_history_changed();
        Some(command)
    }

    /// Re-applies the `after` state of the next undone command.
    pub fn redo(&mut self) -> Option<Command> {
        let command = self.history.redo().cloned()?;
        self.restore(&command, Side::After);
        info!(target: "history", "redo {}", command.description());
        self.emit_history_changed();
        Some(command)
    }

    pub fn clear_history(&mut self) {
        self.history.clear();
        self.emit_history_changed();
    }

    fn restore(&mut self, command: &Command, side: Side) {
        if let Err(err) = self.apply_side(command, side) {
            warn!(target: "history", "could not restore {}: {err}", command.description());
        }
    }

    fn apply_side(&mut self, command: &Command, side: Side) -> Result<(), EntityError> {
        match *command {
            Command::BoneRotation { character, bone, before, after } => {
                let index = self.entity_index(character)?;
                let rig = self.entities[index].as_character_mut().ok_or(EntityError::NotACharacter(character))?;
                rig.set_bone_rotation(bone, side.pick(before, after), &mut self.graph)?;
                rig.update_bone_visualization(&mut self.graph);
            }
            Command::Transform { entity, before, after } => {
                self.apply_transform(entity, side.pick(before, after))?;
            }
            Command::GenerationCursor { entity, before, after } => {
                let index = self.entity_index(entity)?;
                let generative =
                    self.entities[index].as_generative_mut().ok_or(EntityError::NotGenerative(entity))?;
                generative.set_cursor(side.pick(before, after));
                self.start_pending_load(entity);
            }
        }
        Ok(())
    }
}
