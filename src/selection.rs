use crate::entity::EntityId;
use crate::gizmo::GizmoCapabilities;
use crate::skeleton::BoneIndex;
use std::fmt;

/// Non-owning handle to whatever is selected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SelectionTarget {
    Entity(EntityId),
    Bone { character: EntityId, bone: BoneIndex },
}

impl SelectionTarget {
    /// The entity that owns the target; a bone answers with its character.
    pub fn entity(self) -> EntityId {
        match self {
            SelectionTarget::Entity(id) => id,
            SelectionTarget::Bone { character, .. } => character,
        }
    }
}

impl fmt::Display for SelectionTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SelectionTarget::Entity(id) => write!(f, "entity {id}"),
            SelectionTarget::Bone { character, bone } => write!(f, "bone {bone} of {character}"),
        }
    }
}

/// Holds the single current selection. Hooks and gizmo wiring live on the editor context.
#[derive(Debug, Default)]
pub struct SelectionManager {
    current: Option<SelectionTarget>,
}

impl SelectionManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Option<SelectionTarget> {
        self.current
    }

    pub fn is_selected(&self, target: SelectionTarget) -> bool {
        self.current == Some(target)
    }

    /// Replaces the selection and returns the previous one.
    pub fn replace(&mut self, target: Option<SelectionTarget>) -> Option<SelectionTarget> {
        std::mem::replace(&mut self.current, target)
    }

    pub fn clear(&mut self) -> Option<SelectionTarget> {
        self.current.take()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CursorIcon {
    #[default]
    Default,
    Pointer,
    Move,
    Grab,
}

/// Cursor glyph for hovering something with the given capabilities.
pub fn cursor_for(capabilities: Option<GizmoCapabilities>) -> CursorIcon {
    match capabilities {
        None => CursorIcon::Default,
        Some(caps) if caps.contains(GizmoCapabilities::POSITION) => CursorIcon::Move,
        Some(caps) if caps == GizmoCapabilities::ROTATION => CursorIcon::Grab,
        Some(_) => CursorIcon::Pointer,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replace_returns_previous_target() {
        let mut selection = SelectionManager::new();
        let first = SelectionTarget::Entity(EntityId::new());
        let second = SelectionTarget::Bone { character: EntityId::new(), bone: 3 };
        assert_eq!(selection.replace(Some(first)), None);
        assert_eq!(selection.replace(Some(second)), Some(first));
        assert!(selection.is_selected(second));
        assert_eq!(selection.clear(), Some(second));
    }

    #[test]
    fn cursor_reflects_capabilities() {
        assert_eq!(cursor_for(None), CursorIcon::Default);
        assert_eq!(cursor_for(Some(GizmoCapabilities::all())), CursorIcon::Move);
        assert_eq!(cursor_for(Some(GizmoCapabilities::ROTATION)), CursorIcon::Grab);
        assert_eq!(cursor_for(Some(GizmoCapabilities::SCALE)), CursorIcon::Pointer);
    }
}
