//! Owned stand-in for the rendering engine's scene graph.
//!
//! Nodes live in a generational arena so entities, bone controls, and the
//! gizmo can hold plain `NodeId` handles without owning each other.

pub mod picking;

use crate::entity::EntityId;
use crate::gizmo::GizmoCapabilities;
use crate::skeleton::BoneIndex;
use crate::transform::NodeTransform;
use glam::{Mat4, Quat, Vec3};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId {
    index: u32,
    generation: u32,
}

impl NodeId {
    pub fn index(self) -> u32 {
        self.index
    }
}

/// Pick volume of a mesh node, in node-local space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MeshShape {
    Box { half_extents: Vec3 },
    Sphere { radius: f32 },
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Transform,
    Mesh(MeshShape),
    Line { from: Vec3, to: Vec3 },
    Light,
}

/// Who a node belongs to, used by picking and hover feedback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeOwner {
    Entity(EntityId),
    BoneControl { character: EntityId, bone: BoneIndex },
}

impl NodeOwner {
    pub fn entity(self) -> EntityId {
        match self {
            NodeOwner::Entity(id) => id,
            NodeOwner::BoneControl { character, .. } => character,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SceneNode {
    pub name: String,
    pub kind: NodeKind,
    pub local: NodeTransform,
    pub visible: bool,
    pub pickable: bool,
    pub selected: bool,
    pub owner: Option<NodeOwner>,
    pub capabilities: Option<GizmoCapabilities>,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

impl SceneNode {
    pub fn new(name: impl Into<String>, kind: NodeKind) -> Self {
        Self {
            name: name.into(),
            kind,
            local: NodeTransform::default(),
            visible: true,
            pickable: false,
            selected: false,
            owner: None,
            capabilities: None,
            parent: None,
            children: Vec::new(),
        }
    }

    pub fn with_local(mut self, local: NodeTransform) -> Self {
        self.local = local;
        self
    }

    pub fn with_owner(mut self, owner: NodeOwner) -> Self {
        self.owner = Some(owner);
        self
    }

    pub fn with_capabilities(mut self, capabilities: GizmoCapabilities) -> Self {
        self.capabilities = Some(capabilities);
        self
    }

    pub fn pickable(mut self, pickable: bool) -> Self {
        self.pickable = pickable;
        self
    }

    pub fn visible(mut self, visible: bool) -> Self {
        self.visible = visible;
        self
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }
}

struct Slot {
    generation: u32,
    node: Option<SceneNode>,
}

#[derive(Default)]
pub struct SceneGraph {
    slots: Vec<Slot>,
    free: Vec<u32>,
    live: usize,
}

impl SceneGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, node: SceneNode, parent: Option<NodeId>) -> NodeId {
        let parent = parent.filter(|p| self.contains(*p));
        let id = match self.free.pop() {
            Some(index) => {
                let slot = &mut self.slots[index as usize];
                slot.generation = slot.generation.wrapping_add(1);
                slot.node = Some(node);
                NodeId { index, generation: slot.generation }
            }
            None => {
                let index = self.slots.len() as u32;
                self.slots.push(Slot { generation: 0, node: Some(node) });
                NodeId { index, generation: 0 }
            }
        };
        self.live += 1;
        if let Some(parent_id) = parent {
            self.attach(id, parent_id);
        }
        id
    }

    fn attach(&mut self, child: NodeId, parent: NodeId) {
        if let Some(node) = self.get_mut(child) {
            node.parent = Some(parent);
        }
        if let Some(node) = self.get_mut(parent) {
            node.children.push(child);
        }
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.get(id).is_some()
    }

    pub fn get(&self, id: NodeId) -> Option<&SceneNode> {
        self.slots
            .get(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.node.as_ref())
    }

    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut SceneNode> {
        self.slots
            .get_mut(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.node.as_mut())
    }

    /// Removes `id` and every descendant. Returns how many nodes were released.
    pub fn remove_subtree(&mut self, id: NodeId) -> usize {
        let Some(node) = self.get(id) else {
            return 0;
        };
        if let Some(parent) = node.parent {
            if let Some(parent_node) = self.get_mut(parent) {
                parent_node.children.retain(|child| *child != id);
            }
        }
        let mut removed = 0;
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            let slot = &mut self.slots[current.index as usize];
            if slot.generation != current.generation {
                continue;
            }
            if let Some(node) = slot.node.take() {
                stack.extend(node.children);
                self.free.push(current.index);
                self.live -= 1;
                removed += 1;
            }
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    pub fn clear(&mut self) {
        self.slots.clear();
        self.free.clear();
        self.live = 0;
    }

    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &SceneNode)> {
        self.slots.iter().enumerate().filter_map(|(index, slot)| {
            slot.node.as_ref().map(|node| (NodeId { index: index as u32, generation: slot.generation }, node))
        })
    }

    pub fn set_visible(&mut self, id: NodeId, visible: bool) -> bool {
        match self.get_mut(id) {
            Some(node) => {
                node.visible = visible;
                true
            }
            None => false,
        }
    }

    pub fn set_selected(&mut self, id: NodeId, selected: bool) -> bool {
        match self.get_mut(id) {
            Some(node) => {
                node.selected = selected;
                true
            }
            None => false,
        }
    }

    pub fn selected_nodes(&self) -> Vec<NodeId> {
        self.iter().filter(|(_, node)| node.selected).map(|(id, _)| id).collect()
    }

    pub fn set_local(&mut self, id: NodeId, local: NodeTransform) -> bool {
        match self.get_mut(id) {
            Some(node) => {
                node.local = local;
                true
            }
            None => false,
        }
    }

    pub fn set_local_rotation(&mut self, id: NodeId, rotation: Quat) -> bool {
        match self.get_mut(id) {
            Some(node) => {
                node.local.rotation = rotation;
                true
            }
            None => false,
        }
    }

    pub fn set_line(&mut self, id: NodeId, from: Vec3, to: Vec3) -> bool {
        match self.get_mut(id) {
            Some(SceneNode { kind: NodeKind::Line { from: a, to: b }, .. }) => {
                *a = from;
                *b = to;
                true
            }
            _ => false,
        }
    }

    /// Node visibility including every ancestor.
    pub fn is_effectively_visible(&self, id: NodeId) -> bool {
        let mut current = Some(id);
        while let Some(node_id) = current {
            match self.get(node_id) {
                Some(node) if node.visible => current = node.parent,
                _ => return false,
            }
        }
        true
    }

    pub fn world_matrix(&self, id: NodeId) -> Option<Mat4> {
        let mut node = self.get(id)?;
        let mut world = node.local.matrix();
        while let Some(parent) = node.parent {
            node = self.get(parent)?;
            world = node.local.matrix() * world;
        }
        Some(world)
    }

    /// Nearest owner up the parent chain; controls answer for themselves.
    pub fn resolve_owner(&self, id: NodeId) -> Option<(NodeId, NodeOwner)> {
        let mut current = Some(id);
        while let Some(node_id) = current {
            let node = self.get(node_id)?;
            if let Some(owner) = node.owner {
                return Some((node_id, owner));
            }
            current = node.parent;
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remove_subtree_releases_descendants_and_invalidates_handles() {
        let mut graph = SceneGraph::new();
        let root = graph.add(SceneNode::new("root", NodeKind::Transform), None);
        let child = graph.add(SceneNode::new("child", NodeKind::Transform), Some(root));
        let leaf = SceneNode::new("leaf", NodeKind::Mesh(MeshShape::Sphere { radius: 1.0 }));
        let grandchild = graph.add(leaf, Some(child));
        assert_eq!(graph.len(), 3);

        assert_eq!(graph.remove_subtree(child), 2);
        assert_eq!(graph.len(), 1);
        assert!(!graph.contains(grandchild));
        assert!(graph.get(root).is_some_and(|node| node.children().is_empty()));

        let reused = graph.add(SceneNode::new("reused", NodeKind::Transform), None);
        assert!(!graph.contains(child), "stale handle must not resolve to the reused slot");
        assert!(graph.contains(reused));
        assert_eq!(graph.remove_subtree(child), 0);
    }

    #[test]
    fn world_matrix_composes_parents() {
        let mut graph = SceneGraph::new();
        let root = graph.add(
            SceneNode::new("root", NodeKind::Transform).with_local(NodeTransform::from_translation(Vec3::X)),
            None,
        );
        let child = graph.add(
            SceneNode::new("child", NodeKind::Transform).with_local(NodeTransform::from_translation(Vec3::Y)),
            Some(root),
        );
        let world = graph.world_matrix(child).expect("world");
        assert!(world.transform_point3(Vec3::ZERO).abs_diff_eq(Vec3::new(1.0, 1.0, 0.0), 1e-6));
    }

    #[test]
    fn hidden_parent_hides_children() {
        let mut graph = SceneGraph::new();
        let root = graph.add(SceneNode::new("root", NodeKind::Transform), None);
        let child = graph.add(SceneNode::new("child", NodeKind::Transform), Some(root));
        assert!(graph.is_effectively_visible(child));
        graph.set_visible(root, false);
        assert!(!graph.is_effectively_visible(child));
    }
}
