//! Bone hierarchy of a loaded character model.
//!
//! Bones can be linked to scene-graph nodes once the character is placed in
//! the scene. From then on the node is the source of truth for the bone's local
//! pose and `settle` pulls it back into the skeleton's cached world matrices.

use crate::graph::{NodeId, SceneGraph};
use crate::transform::NodeTransform;
use glam::{Mat4, Quat, Vec3};
use smallvec::SmallVec;

pub type BoneIndex = usize;

#[derive(Debug, Clone)]
pub struct Bone {
    pub name: String,
    pub parent: Option<BoneIndex>,
    pub children: SmallVec<[BoneIndex; 4]>,
    pub rest_translation: Vec3,
    pub rest_rotation: Quat,
    pub rest_scale: Vec3,
    translation: Vec3,
    rotation: Quat,
    scale: Vec3,
    linked_node: Option<NodeId>,
}

impl Bone {
    pub fn local(&self) -> NodeTransform {
        NodeTransform { translation: self.translation, rotation: self.rotation, scale: self.scale }
    }

    pub fn linked_node(&self) -> Option<NodeId> {
        self.linked_node
    }
}

#[derive(Debug, Clone, Default)]
pub struct Skeleton {
    pub name: String,
    bones: Vec<Bone>,
    roots: SmallVec<[BoneIndex; 2]>,
    world: Vec<Mat4>,
}

impl Skeleton {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), ..Self::default() }
    }

    /// Appends a bone. A parent index that does not exist yet makes the bone a root.
    pub fn add_bone(&mut self, name: impl Into<String>, parent: Option<BoneIndex>, rest: NodeTransform) -> BoneIndex {
        let index = self.bones.len();
        let parent = parent.filter(|p| *p < index);
        self.bones.push(Bone {
            name: name.into(),
            parent,
            children: SmallVec::new(),
            rest_translation: rest.translation,
            rest_rotation: rest.rotation,
            rest_scale: rest.scale,
            translation: rest.translation,
            rotation: rest.rotation,
            scale: rest.scale,
            linked_node: None,
        });
        match parent {
            Some(p) => self.bones[p].children.push(index),
            None => self.roots.push(index),
        }
        self.world.push(Mat4::IDENTITY);
        index
    }

    /// Builds a skeleton from joints listed in arbitrary order, where parents
    /// may appear after their children.
    pub fn from_joints(name: impl Into<String>, joints: Vec<(String, Option<usize>, NodeTransform)>) -> Self {
        let mut skeleton = Self::new(name);
        let count = joints.len();
        for (joint_name, _, rest) in &joints {
            skeleton.bones.push(Bone {
                name: joint_name.clone(),
                parent: None,
                children: SmallVec::new(),
                rest_translation: rest.translation,
                rest_rotation: rest.rotation,
                rest_scale: rest.scale,
                translation: rest.translation,
                rotation: rest.rotation,
                scale: rest.scale,
                linked_node: None,
            });
            skeleton.world.push(Mat4::IDENTITY);
        }
        for (index, (_, parent, _)) in joints.into_iter().enumerate() {
            match parent.filter(|p| *p < count && *p != index) {
                Some(p) => {
                    skeleton.bones[index].parent = Some(p);
                    skeleton.bones[p].children.push(index);
                }
                None => skeleton.roots.push(index),
            }
        }
        skeleton.recompute_world(None);
        skeleton
    }

    pub fn bones(&self) -> &[Bone] {
        &self.bones
    }

    pub fn bone(&self, index: BoneIndex) -> Option<&Bone> {
        self.bones.get(index)
    }

    pub fn roots(&self) -> &[BoneIndex] {
        &self.roots
    }

    pub fn len(&self) -> usize {
        self.bones.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bones.is_empty()
    }

    pub fn bone_index(&self, name: &str) -> Option<BoneIndex> {
        self.bones.iter().position(|bone| bone.name == name)
    }

    pub fn link_node(&mut self, index: BoneIndex, node: NodeId) -> bool {
        match self.bones.get_mut(index) {
            Some(bone) => {
                bone.linked_node = Some(node);
                true
            }
            None => false,
        }
    }

    pub fn local_rotation(&self, index: BoneIndex, graph: &SceneGraph) -> Option<Quat> {
        let bone = self.bones.get(index)?;
        let linked = bone.linked_node.and_then(|node| graph.get(node));
        Some(linked.map(|node| node.local.rotation).unwrap_or(bone.rotation))
    }

    /// Writes the rotation to the linked node when there is one, and always to the
    /// bone itself. World matrices stay stale until the next `settle`.
    pub fn set_local_rotation(&mut self, index: BoneIndex, rotation: Quat, graph: &mut SceneGraph) -> bool {
        let Some(bone) = self.bones.get_mut(index) else {
            return false;
        };
        let rotation = rotation.normalize();
        bone.rotation = rotation;
        if let Some(node) = bone.linked_node {
            graph.set_local_rotation(node, rotation);
        }
        true
    }

    /// Pulls local poses from linked nodes and recomputes every bone's world matrix.
    pub fn settle(&mut self, graph: &SceneGraph) {
        for bone in &mut self.bones {
            if let Some(node) = bone.linked_node.and_then(|node| graph.get(node)) {
                bone.translation = node.local.translation;
                bone.rotation = node.local.rotation;
                bone.scale = node.local.scale;
            }
        }
        self.recompute_world(Some(graph));
    }

    fn recompute_world(&mut self, graph: Option<&SceneGraph>) {
        let mut stack: Vec<(BoneIndex, Mat4)> = self.roots.iter().map(|root| (*root, Mat4::IDENTITY)).collect();
        while let Some((index, parent_world)) = stack.pop() {
            let bone = &self.bones[index];
            let linked_world = match (graph, bone.linked_node) {
                (Some(graph), Some(node)) => graph.world_matrix(node),
                _ => None,
            };
            let world = linked_world.unwrap_or_else(|| parent_world * bone.local().matrix());
            self.world[index] = world;
            stack.extend(bone.children.iter().map(|child| (*child, world)));
        }
    }

    pub fn world_matrix(&self, index: BoneIndex) -> Option<Mat4> {
        self.world.get(index).copied()
    }

    pub fn world_position(&self, index: BoneIndex) -> Option<Vec3> {
        self.world_matrix(index).map(|m| m.w_axis.truncate())
    }

    /// Distance from a bone to its parent, or zero for roots.
    pub fn bone_length(&self, index: BoneIndex) -> f32 {
        let Some(parent) = self.bones.get(index).and_then(|bone| bone.parent) else {
            return 0.0;
        };
        match (self.world_position(index), self.world_position(parent)) {
            (Some(a), Some(b)) => a.distance(b),
            _ => 0.0,
        }
    }
}
