//! Undo/redo history of reversible editor commands.

use crate::entity::EntityId;
use crate::skeleton::BoneIndex;
use crate::transform::{quat_approx_eq, transform_approx_eq, Transform};
use glam::Quat;

/// Before/after snapshot of one reversible edit.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    BoneRotation { character: EntityId, bone: BoneIndex, before: Quat, after: Quat },
    Transform { entity: EntityId, before: Transform, after: Transform },
    GenerationCursor { entity: EntityId, before: Option<usize>, after: Option<usize> },
}

impl Command {
    pub fn description(&self) -> &'static str {
        match self {
            Command::BoneRotation { .. } => "Rotate Bone",
            Command::Transform { .. } => "Transform Entity",
            Command::GenerationCursor { .. } => "Switch Generation",
        }
    }

    pub fn entity(&self) -> EntityId {
        match self {
            Command::BoneRotation { character, .. } => *character,
            Command::Transform { entity, .. } | Command::GenerationCursor { entity, .. } => *entity,
        }
    }

    /// True when applying the command would not change anything.
    pub fn is_noop(&self) -> bool {
        match self {
            Command::BoneRotation { before, after, .. } => quat_approx_eq(*before, *after),
            Command::Transform { before, after, .. } => transform_approx_eq(before, after),
            Command::GenerationCursor { before, after, .. } => before == after,
        }
    }
}

#[derive(Debug)]
pub struct HistoryManager {
    commands: Vec<Command>,
    cursor: usize,
    max_entries: usize,
}

impl Default for HistoryManager {
    fn default() -> Self {
        Self::new(100)
    }
}

impl HistoryManager {
    pub fn new(max_entries: usize) -> Self {
        Self { commands: Vec::new(), cursor: 0, max_entries: max_entries.max(1) }
    }

    /// Records an applied command. Anything that could have been redone is dropped,
    /// and the oldest entry goes once the limit is reached.
    pub fn push(&mut self, command: Command) {
        self.commands.truncate(self.cursor);
        self.commands.push(command);
        if self.commands.len() > self.max_entries {
            let overflow = self.commands.len() - self.max_entries;
            self.commands.drain(..overflow);
        }
        self.cursor = self.commands.len();
    }

    /// Steps back and returns the command whose `before` state should be restored.
    pub fn undo(&mut self) -> Option<&Command> {
        if self.cursor == 0 {
            return None;
        }
        self.cursor -= 1;
        self.commands.get(self.cursor)
    }

    /// Steps forward and returns the command whose `after` state should be restored.
    pub fn redo(&mut self) -> Option<&Command> {
        let command = self.commands.get(self.cursor)?;
        self.cursor += 1;
        Some(command)
    }

    pub fn can_undo(&self) -> bool {
        self.cursor > 0
    }

    pub fn can_redo(&self) -> bool {
        self.cursor < self.commands.len()
    }

    pub fn clear(&mut self) {
        self.commands.clear();
        self.cursor = 0;
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn max_entries(&self) -> usize {
        self.max_entries
    }

    /// Commands that can currently be undone, oldest first.
    pub fn undo_stack(&self) -> &[Command] {
        &self.commands[..self.cursor]
    }

    /// Forgets every command touching `entity`, used when it leaves the scene.
    pub fn forget_entity(&mut self, entity: EntityId) {
        self.retain(|command| command.entity() != entity);
    }

    /// Drops bone edits for `character`; its bone indices are invalid after a model swap.
    pub fn forget_bone_commands(&mut self, character: EntityId) {
        self.retain(|command| match command {
            Command::BoneRotation { character: owner, .. } => *owner != character,
            _ => true,
        });
    }

    fn retain(&mut self, mut keep: impl FnMut(&Command) -> bool) {
        let undoable_before = self.cursor;
        let mut kept_before_cursor = 0;
        let mut index = 0;
        self.commands.retain(|command| {
            let kept = keep(command);
            if kept && index < undoable_before {
                kept_before_cursor += 1;
            }
            index += 1;
            kept
        });
        self.cursor = kept_before_cursor;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    fn moved(entity: EntityId, x: f32) -> Command {
        Command::Transform {
            entity,
            before: Transform::default(),
            after: Transform::from_position(Vec3::new(x, 0.0, 0.0)),
        }
    }

    #[test]
    fn push_after_undo_discards_redo() {
        let id = EntityId::new();
        let mut history = HistoryManager::new(10);
        history.push(moved(id, 1.0));
        history.push(moved(id, 2.0));
        assert!(history.undo().is_some());
        assert!(history.can_redo());
        history.push(moved(id, 3.0));
        assert!(!history.can_redo());
        assert_eq!(history.len(), 2);
        assert_eq!(history.undo(), Some(&moved(id, 3.0)));
    }

    #[test]
    fn oldest_entries_are_dropped_at_capacity() {
        let id = EntityId::new();
        let mut history = HistoryManager::new(2);
        for x in 1..=3 {
            history.push(moved(id, x as f32));
        }
        assert_eq!(history.len(), 2);
        assert_eq!(history.undo(), Some(&moved(id, 3.0)));
        assert_eq!(history.undo(), Some(&moved(id, 2.0)));
        assert_eq!(history.undo(), None);
        assert_eq!(history.redo(), Some(&moved(id, 2.0)));
    }

    #[test]
    fn forgetting_an_entity_keeps_cursor_consistent() {
        let kept = EntityId::new();
        let removed = EntityId::new();
        let mut history = HistoryManager::new(10);
        history.push(moved(kept, 1.0));
        history.push(moved(removed, 1.0));
        history.push(moved(kept, 2.0));
        history.undo();
        history.forget_entity(removed);
        assert_eq!(history.len(), 2);
        assert!(history.can_undo());
        assert!(history.can_redo());
        assert_eq!(history.redo(), Some(&moved(kept, 2.0)));
    }

    #[test]
    fn forgetting_bone_commands_keeps_other_edits() {
        let hero = EntityId::new();
        let other = EntityId::new();
        let bend = |character: EntityId| Command::BoneRotation {
            character,
            bone: 2,
            before: Quat::IDENTITY,
            after: Quat::from_rotation_x(0.5),
        };
        let mut history = HistoryManager::new(10);
        history.push(moved(hero, 1.0));
        history.push(bend(hero));
        history.push(bend(other));
        history.push(bend(hero));
        history.undo();
        history.forget_bone_commands(hero);
        assert_eq!(history.len(), 2);
        assert_eq!(history.undo_stack(), &[moved(hero, 1.0), bend(other)]);
        assert!(!history.can_redo());
    }

    #[test]
    fn equal_rotations_are_noops() {
        let q = Quat::from_rotation_y(0.4);
        let command = Command::BoneRotation { character: EntityId::new(), bone: 0, before: q, after: -q };
        assert!(command.is_noop());
    }
}
