//! Skeletal characters and their bone visualization.
//!
//! Bone nodes live under a `model` node beneath the character root; controls and
//! connecting lines live under a separate `bone_visualization` group so hiding the
//! group never touches the rig itself.

use super::{BoneControl, EntityError, EntityId, LoadState, TransformKind};
use crate::assets::{AssetError, CancelToken, ModelAsset};
use crate::config::BonesConfig;
use crate::gizmo::GizmoCapabilities;
use crate::graph::{MeshShape, NodeId, NodeKind, NodeOwner, SceneGraph, SceneNode};
use crate::scene::QuatData;
use crate::skeleton::{Bone, BoneIndex, Skeleton};
use crate::transform::NodeTransform;
use glam::{Mat4, Quat, Vec3};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CharacterProps {
    #[serde(default)]
    pub model_url: String,
    #[serde(default)]
    pub bone_rotations: BTreeMap<String, QuatData>,
}

impl CharacterProps {
    pub fn new(model_url: impl Into<String>) -> Self {
        Self { model_url: model_url.into(), bone_rotations: BTreeMap::new() }
    }
}

/// Visualization state for one controlled bone.
#[derive(Debug, Clone)]
pub struct BoneEntry {
    pub bone: BoneIndex,
    pub control: BoneControl,
    /// Segments from this bone to each child that also has a control.
    pub lines: SmallVec<[(BoneIndex, NodeId); 4]>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BoneApplyReport {
    pub applied: usize,
    pub skipped: Vec<String>,
}

#[derive(Debug)]
pub struct CharacterEntity {
    id: EntityId,
    root: NodeId,
    body: NodeId,
    props: CharacterProps,
    state: LoadState,
    token: Option<CancelToken>,
    skeleton: Option<Skeleton>,
    model_node: Option<NodeId>,
    visualization: Option<NodeId>,
    visualization_visible: bool,
    initial_bone_rotations: BTreeMap<String, Quat>,
    bone_map: BTreeMap<String, BoneEntry>,
}

impl CharacterEntity {
    pub(crate) fn new(id: EntityId, props: CharacterProps, root: NodeId, graph: &mut SceneGraph) -> Self {
        let body = graph.add(
            SceneNode::new(
                "character_body",
                NodeKind::Mesh(MeshShape::Box { half_extents: Vec3::new(0.3, 0.9, 0.2) }),
            )
            .with_local(NodeTransform::from_translation(Vec3::new(0.0, 0.9, 0.0)))
            .pickable(true),
            Some(root),
        );
        Self {
            id,
            root,
            body,
            props,
            state: LoadState::Unloaded,
            token: None,
            skeleton: None,
            model_node: None,
            visualization: None,
            visualization_visible: false,
            initial_bone_rotations: BTreeMap::new(),
            bone_map: BTreeMap::new(),
        }
    }

    pub fn id(&self) -> EntityId {
        self.id
    }

    pub fn body(&self) -> NodeId {
        self.body
    }

    pub fn model_url(&self) -> &str {
        &self.props.model_url
    }

    /// Points the character at a new model; the next load pass fetches it.
    pub fn set_model_url(&mut self, url: impl Into<String>) {
        self.props.model_url = url.into();
        if self.state != LoadState::Disposed {
            self.state = LoadState::Unloaded;
        }
    }

    pub fn load_state(&self) -> LoadState {
        self.state
    }

    pub fn skeleton(&self) -> Option<&Skeleton> {
        self.skeleton.as_ref()
    }

    pub fn has_skeleton(&self) -> bool {
        self.skeleton.is_some()
    }

    /// Bones of the loaded skeleton, empty when there is none.
    pub fn get_bones(&self) -> &[Bone] {
        self.skeleton.as_ref().map(Skeleton::bones).unwrap_or(&[])
    }

    pub fn bone_index(&self, name: &str) -> Option<BoneIndex> {
        self.skeleton.as_ref()?.bone_index(name)
    }

    pub fn bone_entries(&self) -> impl Iterator<Item = &BoneEntry> {
        self.bone_map.values()
    }

    pub fn bone_entry(&self, name: &str) -> Option<&BoneEntry> {
        self.bone_map.get(name)
    }

    pub fn control_for(&self, bone: BoneIndex) -> Option<&BoneControl> {
        let name = &self.skeleton.as_ref()?.bone(bone)?.name;
        self.bone_map.get(name).map(|entry| &entry.control)
    }

    pub fn line_count(&self) -> usize {
        self.bone_map.values().map(|entry| entry.lines.len()).sum()
    }

    pub fn initial_bone_rotations(&self) -> &BTreeMap<String, Quat> {
        &self.initial_bone_rotations
    }

    pub fn is_visualization_visible(&self) -> bool {
        self.visualization_visible
    }

    pub(crate) fn pending_model_url(&self) -> Option<&str> {
        if self.state != LoadState::Unloaded || self.props.model_url.is_empty() {
            return None;
        }
        Some(&self.props.model_url)
    }

    pub(crate) fn begin_loading(&mut self) -> CancelToken {
        if let Some(previous) = self.token.take() {
            previous.cancel();
        }
        let token = CancelToken::new();
        self.token = Some(token.clone());
        self.state = LoadState::Loading;
        token
    }

    pub(crate) fn complete_load(
        &mut self,
        result: Result<ModelAsset, AssetError>,
        graph: &mut SceneGraph,
        bones: &BonesConfig,
    ) {
        if self.state == LoadState::Disposed || self.token.as_ref().is_some_and(CancelToken::is_cancelled) {
            debug!(target: "character", id = %self.id, "discarding load result for a cancelled character");
            return;
        }
        self.token = None;
        match result {
            Ok(ModelAsset { url, skeleton: Some(skeleton) }) if !skeleton.is_empty() => {
                info!(target: "character", id = %self.id, %url, bones = skeleton.len(), "skeleton loaded");
                self.install_skeleton(skeleton, graph, bones);
                self.state = LoadState::Ready { has_skeleton: true };
            }
            Ok(ModelAsset { url, .. }) => {
                warn!(target: "character", id = %self.id, %url, "model has no skeleton; bone controls unavailable");
                self.teardown_model(graph);
                self.state = LoadState::Ready { has_skeleton: false };
            }
            Err(AssetError::Cancelled) => {
                self.state = LoadState::Unloaded;
            }
            Err(err) => {
                warn!(target: "character", id = %self.id, url = %self.props.model_url, "model load failed: {err}");
                self.teardown_model(graph);
                self.state = LoadState::Ready { has_skeleton: false };
            }
        }
    }

    fn install_skeleton(&mut self, mut skeleton: Skeleton, graph: &mut SceneGraph, bones: &BonesConfig) {
        self.teardown_model(graph);
        let model = graph.add(SceneNode::new("model", NodeKind::Transform), Some(self.root));
        let mut stack: Vec<(BoneIndex, NodeId)> = skeleton.roots().iter().map(|root| (*root, model)).collect();
        while let Some((index, parent_node)) = stack.pop() {
            let Some(bone) = skeleton.bone(index) else {
                continue;
            };
            let node = graph.add(
                SceneNode::new(bone.name.clone(), NodeKind::Transform).with_local(bone.local()),
                Some(parent_node),
            );
            stack.extend(bone.children.iter().map(|child| (*child, node)));
            skeleton.link_node(index, node);
        }
        skeleton.settle(graph);
        self.initial_bone_rotations = skeleton
            .bones()
            .iter()
            .enumerate()
            .map(|(index, bone)| {
                let rotation = skeleton.local_rotation(index, graph).unwrap_or(bone.rest_rotation);
                (bone.name.clone(), rotation)
            })
            .collect();
        self.model_node = Some(model);
        self.skeleton = Some(skeleton);
        self.build_visualization(graph, bones);
    }

    fn build_visualization(&mut self, graph: &mut SceneGraph, settings: &BonesConfig) {
        let Some(skeleton) = self.skeleton.as_ref() else {
            return;
        };
        let group = graph.add(
            SceneNode::new("bone_visualization", NodeKind::Transform).visible(self.visualization_visible),
            Some(self.root),
        );
        let mut bone_map = BTreeMap::new();
        for (index, bone) in skeleton.bones().iter().enumerate() {
            if settings.is_excluded(&bone.name) {
                continue;
            }
            if bone.parent.is_some()
                && settings.min_bone_length > 0.0
                && skeleton.bone_length(index) < settings.min_bone_length
            {
                continue;
            }
            let shape = MeshShape::Sphere { radius: settings.control_radius };
            let node = graph.add(
                SceneNode::new(format!("bone_control:{}", bone.name), NodeKind::Mesh(shape))
                    .with_owner(NodeOwner::BoneControl { character: self.id, bone: index })
                    .with_capabilities(GizmoCapabilities::ROTATION)
                    .pickable(true),
                Some(group),
            );
            let control = BoneControl { character: self.id, bone: index, bone_name: bone.name.clone(), node };
            bone_map.insert(bone.name.clone(), BoneEntry { bone: index, control, lines: SmallVec::new() });
        }
        let controlled: Vec<(String, BoneIndex)> =
            bone_map.values().map(|entry: &BoneEntry| (entry.control.bone_name.clone(), entry.bone)).collect();
        for (name, index) in controlled {
            let Some(bone) = skeleton.bone(index) else {
                continue;
            };
            let mut lines = SmallVec::new();
            for child in &bone.children {
                let Some(child_bone) = skeleton.bone(*child) else {
                    continue;
                };
                if !bone_map.contains_key(&child_bone.name) {
                    continue;
                }
                let line = graph.add(
                    SceneNode::new(
                        format!("bone_line:{}->{}", bone.name, child_bone.name),
                        NodeKind::Line { from: Vec3::ZERO, to: Vec3::ZERO },
                    ),
                    Some(group),
                );
                lines.push((*child, line));
            }
            if let Some(entry) = bone_map.get_mut(&name) {
                entry.lines = lines;
            }
        }
        debug!(target: "character", id = %self.id, controls = bone_map.len(), "bone visualization built");
        self.visualization = Some(group);
        self.bone_map = bone_map;
        self.update_bone_visualization(graph);
    }

    fn teardown_model(&mut self, graph: &mut SceneGraph) {
        if let Some(group) = self.visualization.take() {
            graph.remove_subtree(group);
        }
        if let Some(model) = self.model_node.take() {
            graph.remove_subtree(model);
        }
        self.bone_map.clear();
        self.skeleton = None;
    }

    /// Hides or shows controls and lines. Bones are untouched.
    pub fn show_bone_visualization(&mut self, visible: bool, graph: &mut SceneGraph) {
        self.visualization_visible = visible;
        if let Some(group) = self.visualization {
            graph.set_visible(group, visible);
        }
        if visible {
            self.update_bone_visualization(graph);
        }
    }

    /// Settles the skeleton, then copies each bone's pose onto its control and lines.
    pub fn update_bone_visualization(&mut self, graph: &mut SceneGraph) {
        let Some(skeleton) = self.skeleton.as_mut() else {
            return;
        };
        skeleton.settle(graph);
        let root_inverse = graph.world_matrix(self.root).map(|world| world.inverse()).unwrap_or(Mat4::IDENTITY);
        let position_of = |bone: BoneIndex| {
            skeleton.world_position(bone).map(|world| root_inverse.transform_point3(world)).unwrap_or(Vec3::ZERO)
        };
        for entry in self.bone_map.values() {
            let position = position_of(entry.bone);
            let rotation = skeleton.local_rotation(entry.bone, graph).unwrap_or(Quat::IDENTITY);
            if let Some(node) = graph.get_mut(entry.control.node) {
                node.local.translation = position;
                node.local.rotation = rotation;
            }
            for (child, line) in &entry.lines {
                graph.set_line(*line, position, position_of(*child));
            }
        }
    }

    pub fn bone_rotation(&self, bone: BoneIndex, graph: &SceneGraph) -> Option<Quat> {
        self.skeleton.as_ref()?.local_rotation(bone, graph)
    }

    /// Writes one bone's local rotation and mirrors it onto its control.
    /// Lines and control positions refresh on the next `update_bone_visualization`.
    pub fn set_bone_rotation(
        &mut self,
        bone: BoneIndex,
        rotation: Quat,
        graph: &mut SceneGraph,
    ) -> Result<(), EntityError> {
        let Some(skeleton) = self.skeleton.as_mut() else {
            return Err(EntityError::UnknownBone { character: self.id, bone: bone.to_string() });
        };
        write_rotation(self.id, skeleton, &self.bone_map, bone, rotation, graph)
    }

    fn set_named_rotation(
        &mut self,
        name: &str,
        rotation: QuatData,
        graph: &mut SceneGraph,
    ) -> Result<(), EntityError> {
        if !rotation.is_finite() {
            return Err(EntityError::NonFiniteRotation(name.to_string()));
        }
        let skeleton = self
            .skeleton
            .as_mut()
            .ok_or_else(|| EntityError::UnknownBone { character: self.id, bone: name.to_string() })?;
        let bone = skeleton
            .bone_index(name)
            .ok_or_else(|| EntityError::UnknownBone { character: self.id, bone: name.to_string() })?;
        write_rotation(self.id, skeleton, &self.bone_map, bone, rotation.into(), graph)
    }

    /// Applies saved rotations bone by bone. A bad entry is logged and skipped
    /// without affecting the others. Without a skeleton the rotations are kept so
    /// they survive the next save.
    pub fn apply_bone_rotations(
        &mut self,
        rotations: &BTreeMap<String, QuatData>,
        graph: &mut SceneGraph,
    ) -> BoneApplyReport {
        let mut report = BoneApplyReport::default();
        if self.skeleton.is_none() {
            if !rotations.is_empty() {
                debug!(
                    target: "character",
                    id = %self.id,
                    count = rotations.len(),
                    "no skeleton; keeping saved bone rotations"
                );
            }
            self.props.bone_rotations.extend(rotations.iter().map(|(name, rotation)| (name.clone(), *rotation)));
            report.skipped.extend(rotations.keys().cloned());
            return report;
        }
        for (name, rotation) in rotations {
            match self.set_named_rotation(name, *rotation, graph) {
                Ok(()) => report.applied += 1,
                Err(err) => {
                    warn!(target: "character", id = %self.id, "skipping bone rotation: {err}");
                    report.skipped.push(name.clone());
                }
            }
        }
        self.update_bone_visualization(graph);
        report
    }

    /// Restores every bone that has a bind-pose snapshot. No-op without a skeleton.
    pub fn reset_all_bones(&mut self, graph: &mut SceneGraph) {
        let Some(skeleton) = self.skeleton.as_mut() else {
            return;
        };
        for (name, rotation) in &self.initial_bone_rotations {
            let Some(bone) = skeleton.bone_index(name) else {
                continue;
            };
            if let Err(err) = write_rotation(self.id, skeleton, &self.bone_map, bone, *rotation, graph) {
                warn!(target: "character", id = %self.id, bone = %name, "bind pose restore skipped: {err}");
            }
        }
        self.update_bone_visualization(graph);
    }

    /// Routes a gizmo edit through the named bone's control.
    pub fn apply_bone_transformation(
        &mut self,
        bone_name: &str,
        kind: TransformKind,
        value: Vec3,
        graph: &mut SceneGraph,
    ) -> bool {
        let (Some(entry), Some(skeleton)) = (self.bone_map.get(bone_name), self.skeleton.as_mut()) else {
            return false;
        };
        let applied = entry.control.apply_transformation(kind, value, skeleton, graph);
        if applied {
            self.update_bone_visualization(graph);
        }
        applied
    }

    /// Props as they should be saved: live rotations when a skeleton is loaded.
    pub fn props_snapshot(&self, graph: &SceneGraph) -> CharacterProps {
        let Some(skeleton) = self.skeleton.as_ref() else {
            return self.props.clone();
        };
        let bone_rotations = skeleton
            .bones()
            .iter()
            .enumerate()
            .filter_map(|(index, bone)| {
                skeleton.local_rotation(index, graph).map(|rotation| (bone.name.clone(), QuatData::from(rotation)))
            })
            .collect();
        CharacterProps { model_url: self.props.model_url.clone(), bone_rotations }
    }

    /// Saved rotations that have not been applied to a skeleton yet.
    pub fn saved_bone_rotations(&self) -> &BTreeMap<String, QuatData> {
        &self.props.bone_rotations
    }

    pub(crate) fn dispose(&mut self, graph: &mut SceneGraph) {
        if let Some(token) = self.token.take() {
            token.cancel();
        }
        self.teardown_model(graph);
        self.state = LoadState::Disposed;
    }
}

fn write_rotation(
    character: EntityId,
    skeleton: &mut Skeleton,
    bone_map: &BTreeMap<String, BoneEntry>,
    bone: BoneIndex,
    rotation: Quat,
    graph: &mut SceneGraph,
) -> Result<(), EntityError> {
    let Some(name) = skeleton.bone(bone).map(|bone| bone.name.clone()) else {
        return Err(EntityError::UnknownBone { character, bone: bone.to_string() });
    };
    if !rotation.is_finite() || rotation.length_squared() <= f32::EPSILON {
        return Err(EntityError::NonFiniteRotation(name));
    }
    match bone_map.get(&name) {
        Some(entry) => {
            entry.control.apply_rotation(rotation, skeleton, graph);
        }
        None => {
            skeleton.set_local_rotation(bone, rotation, graph);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::quat_approx_eq;

    fn rig() -> Skeleton {
        let up = |y: f32| NodeTransform::from_translation(Vec3::new(0.0, y, 0.0));
        let mut skeleton = Skeleton::new("rig");
        let hips = skeleton.add_bone("Hips", None, up(1.0));
        let spine = skeleton.add_bone("Spine", Some(hips), up(0.3));
        skeleton.add_bone("Head", Some(spine), up(0.4));
        skeleton.add_bone("LeftHandThumb1", Some(spine), up(0.1));
        skeleton.add_bone("LeftUpLeg", Some(hips), up(-0.1));
        skeleton
    }

    fn loaded_character(graph: &mut SceneGraph) -> CharacterEntity {
        let id = EntityId::new();
        let root =
            graph.add(SceneNode::new("character", NodeKind::Transform).with_owner(NodeOwner::Entity(id)), None);
        let mut character = CharacterEntity::new(id, CharacterProps::new("models/rig.glb"), root, graph);
        character.begin_loading();
        character.complete_load(Ok(ModelAsset::new("models/rig.glb", Some(rig()))), graph, &BonesConfig::default());
        character
    }

    #[test]
    fn visualization_skips_excluded_bones() {
        let mut graph = SceneGraph::new();
        let character = loaded_character(&mut graph);
        assert_eq!(character.load_state(), LoadState::Ready { has_skeleton: true });
        assert_eq!(character.get_bones().len(), 5);
        assert_eq!(character.bone_entries().count(), 4);
        assert!(character.bone_entry("LeftHandThumb1").is_none());
        assert_eq!(character.line_count(), 3);

        let head = character.bone_entry("Head").expect("head control");
        let node = graph.get(head.control.node).expect("control node");
        assert!(node.local.translation.abs_diff_eq(Vec3::new(0.0, 1.7, 0.0), 1e-5));
        assert!(!graph.is_effectively_visible(head.control.node));
    }

    #[test]
    fn rotation_mirrors_onto_control_and_moves_children() {
        let mut graph = SceneGraph::new();
        let mut character = loaded_character(&mut graph);
        let spine = character.bone_index("Spine").expect("spine");
        let quarter = Quat::from_rotation_z(std::f32::consts::FRAC_PI_2);
        character.set_bone_rotation(spine, quarter, &mut graph).expect("rotate spine");
        character.update_bone_visualization(&mut graph);

        let spine_control = character.control_for(spine).expect("control").node;
        assert!(quat_approx_eq(graph.get(spine_control).expect("node").local.rotation, quarter));
        let head = character.bone_entry("Head").expect("head").control.node;
        let head_position = graph.get(head).expect("head node").local.translation;
        assert!(head_position.abs_diff_eq(Vec3::new(-0.4, 1.3, 0.0), 1e-5), "got {head_position:?}");
    }

    #[test]
    fn unknown_bones_are_skipped_individually() {
        let mut graph = SceneGraph::new();
        let mut character = loaded_character(&mut graph);
        let mut rotations = BTreeMap::new();
        rotations.insert("Head".to_string(), QuatData::from(Quat::from_rotation_y(0.5)));
        rotations.insert("Tail".to_string(), QuatData::from(Quat::from_rotation_y(0.5)));
        let report = character.apply_bone_rotations(&rotations, &mut graph);
        assert_eq!(report.applied, 1);
        assert_eq!(report.skipped, vec!["Tail".to_string()]);
    }

    #[test]
    fn reset_restores_the_current_model_bind_pose() {
        let mut graph = SceneGraph::new();
        let mut character = loaded_character(&mut graph);
        let head = character.bone_index("Head").expect("head");
        character.set_bone_rotation(head, Quat::from_rotation_x(1.0), &mut graph).expect("rotate");

        let up = |y: f32| NodeTransform::from_translation(Vec3::new(0.0, y, 0.0));
        let mut second = Skeleton::new("rig2");
        let hips = second.add_bone("Hips", None, up(1.0));
        let neck = second.add_bone("Neck", Some(hips), up(0.5));
        let head = second.add_bone("Head", Some(neck), up(0.2));
        second.set_local_rotation(head, Quat::from_rotation_x(0.25), &mut graph);
        character.set_model_url("models/rig2.glb");
        character.begin_loading();
        let result = Ok(ModelAsset::new("models/rig2.glb", Some(second)));
        character.complete_load(result, &mut graph, &BonesConfig::default());

        let names: Vec<&str> = character.initial_bone_rotations().keys().map(String::as_str).collect();
        assert_eq!(names, ["Head", "Hips", "Neck"]);
        let head = character.bone_index("Head").expect("head");
        character.set_bone_rotation(head, Quat::from_rotation_y(0.7), &mut graph).expect("rotate");
        character.reset_all_bones(&mut graph);
        let restored = character.bone_rotation(head, &graph).expect("rotation");
        assert!(quat_approx_eq(restored, Quat::from_rotation_x(0.25)));
    }

    #[test]
    fn dispose_releases_every_node() {
        let mut graph = SceneGraph::new();
        let mut character = loaded_character(&mut graph);
        let root_only = 2;
        assert!(graph.len() > root_only);
        character.dispose(&mut graph);
        assert_eq!(graph.len(), root_only);
        assert!(character.get_bones().is_empty());
        assert_eq!(character.load_state(), LoadState::Disposed);
    }
}
