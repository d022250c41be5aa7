use super::EntityId;
use crate::gizmo::GizmoCapabilities;
use crate::graph::{NodeId, SceneGraph};
use crate::skeleton::{BoneIndex, Skeleton};
use glam::{EulerRot, Quat, Vec3};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransformKind {
    Position,
    Rotation,
    Scale,
}

/// Pickable proxy for one bone. Holds handles only: the owning character by
/// id, the bone by index, and its own scene node.
#[derive(Debug, Clone, PartialEq)]
pub struct BoneControl {
    pub character: EntityId,
    pub bone: BoneIndex,
    pub bone_name: String,
    pub node: NodeId,
}

impl BoneControl {
    pub fn capabilities(&self) -> GizmoCapabilities {
        GizmoCapabilities::ROTATION
    }

    /// Only rotations reach the rig; position and scale are ignored and return false.
    /// `value` is XYZ Euler radians.
    pub fn apply_transformation(
        &self,
        kind: TransformKind,
        value: Vec3,
        skeleton: &mut Skeleton,
        graph: &mut SceneGraph,
    ) -> bool {
        match kind {
            TransformKind::Rotation => {
                if !value.is_finite() {
                    return false;
                }
                self.apply_rotation(Quat::from_euler(EulerRot::XYZ, value.x, value.y, value.z), skeleton, graph)
            }
            TransformKind::Position | TransformKind::Scale => false,
        }
    }

    pub fn apply_rotation(&self, rotation: Quat, skeleton: &mut Skeleton, graph: &mut SceneGraph) -> bool {
        if !skeleton.set_local_rotation(self.bone, rotation, graph) {
            return false;
        }
        self.mirror_rotation(rotation.normalize(), graph);
        true
    }

    pub fn mirror_rotation(&self, rotation: Quat, graph: &mut SceneGraph) {
        graph.set_local_rotation(self.node, rotation);
    }

    pub fn rotation(&self, skeleton: &Skeleton, graph: &SceneGraph) -> Option<Quat> {
        skeleton.local_rotation(self.bone, graph)
    }
}
