use crate::entity::EntityId;
use crate::graph::NodeId;
use crate::skeleton::BoneIndex;
use crate::transform::Transform;
use bitflags::bitflags;
use glam::Quat;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

bitflags! {
    /// Manipulations a selectable accepts from the gizmo.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct GizmoCapabilities: u8 {
        const POSITION = 0b001;
        const ROTATION = 0b010;
        const SCALE = 0b100;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GizmoMode {
    #[default]
    Position,
    Rotation,
    Scale,
}

impl GizmoMode {
    pub const ALL: [GizmoMode; 3] = [GizmoMode::Position, GizmoMode::Rotation, GizmoMode::Scale];

    pub fn capability(self) -> GizmoCapabilities {
        match self {
            GizmoMode::Position => GizmoCapabilities::POSITION,
            GizmoMode::Rotation => GizmoCapabilities::ROTATION,
            GizmoMode::Scale => GizmoCapabilities::SCALE,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            GizmoMode::Position => "position",
            GizmoMode::Rotation => "rotation",
            GizmoMode::Scale => "scale",
        }
    }
}

impl fmt::Display for GizmoMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for GizmoMode {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "position" | "translate" | "move" => Ok(GizmoMode::Position),
            "rotation" | "rotate" => Ok(GizmoMode::Rotation),
            "scale" => Ok(GizmoMode::Scale),
            other => Err(format!("unknown gizmo mode '{other}'")),
        }
    }
}

/// State captured at drag start; the matching command is built from it at drag end.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DragSession {
    BoneRotation { character: EntityId, bone: BoneIndex, start: Quat },
    Transform { entity: EntityId, start: Transform },
}

#[derive(Debug, Default)]
pub struct GizmoManager {
    mode: GizmoMode,
    capabilities: GizmoCapabilities,
    attached: Option<NodeId>,
    drag: Option<DragSession>,
}

impl Default for GizmoCapabilities {
    fn default() -> Self {
        GizmoCapabilities::all()
    }
}

impl GizmoManager {
    pub fn new(mode: GizmoMode) -> Self {
        Self { mode, ..Self::default() }
    }

    pub fn mode(&self) -> GizmoMode {
        self.mode
    }

    pub fn capabilities(&self) -> GizmoCapabilities {
        self.capabilities
    }

    pub fn attached(&self) -> Option<NodeId> {
        self.attached
    }

    /// Attaches to `node`, restricting modes to `capabilities`. Returns the new mode
    /// when the current one had to change.
    pub fn attach(&mut self, node: NodeId, capabilities: GizmoCapabilities) -> Option<GizmoMode> {
        self.attached = Some(node);
        self.capabilities = capabilities;
        self.drag = None;
        if capabilities.contains(self.mode.capability()) {
            return None;
        }
        let next = GizmoMode::ALL.into_iter().find(|mode| capabilities.contains(mode.capability()))?;
        self.mode = next;
        Some(next)
    }

    pub fn detach(&mut self) {
        self.attached = None;
        self.capabilities = GizmoCapabilities::all();
        self.drag = None;
    }

    /// Refuses modes the attached target does not support.
    pub fn set_mode(&mut self, mode: GizmoMode) -> bool {
        if !self.capabilities.contains(mode.capability()) {
            return false;
        }
        self.mode = mode;
        true
    }

    pub fn begin_drag(&mut self, session: DragSession) {
        self.drag = Some(session);
    }

    pub fn drag(&self) -> Option<&DragSession> {
        self.drag.as_ref()
    }

    pub fn take_drag(&mut self) -> Option<DragSession> {
        self.drag.take()
    }

    pub fn cancel_drag(&mut self) -> bool {
        self.drag.take().is_some()
    }
}
