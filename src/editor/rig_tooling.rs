use super::EditorContext;
use crate::entity::{
    BoneApplyReport, CharacterEntity, EntityError, EntityId, EntityKind, ShapeType, TransformKind,
};
use crate::graph::SceneGraph;
use crate::scene::QuatData;
use crate::skeleton::BoneIndex;
use glam::{Quat, Vec3};
use std::collections::BTreeMap;

impl EditorContext {
    fn with_character<R>(
        &mut self,
        id: EntityId,
        edit: impl FnOnce(&mut CharacterEntity, &mut SceneGraph) -> R,
    ) -> Result<R, EntityError> {
        let index = self.entity_index(id)?;
        let character = self.entities[index].as_character_mut().ok_or(EntityError::NotACharacter(id))?;
        Ok(edit(character, &mut self.graph))
    }

    pub fn bone_rotation(&self, id: EntityId, bone: BoneIndex) -> Option<Quat> {
        self.entity(id)?.as_character()?.bone_rotation(bone, &self.graph)
    }

    /// Direct pose write; not recorded in history.
    pub fn set_bone_rotation(&mut self, id: EntityId, bone: BoneIndex, rotation: Quat) -> Result<(), EntityError> {
        self.with_character(id, |character, graph| {
            character.set_bone_rotation(bone, rotation, graph)?;
            character.update_bone_visualization(graph);
            Ok(())
        })?
    }

    /// Gizmo-style edit on a named bone. Only rotations have an effect.
    pub fn apply_bone_transformation(
        &mut self,
        id: EntityId,
        bone_name: &str,
        kind: TransformKind,
        value: Vec3,
    ) -> Result<bool, EntityError> {
        self.with_character(id, |character, graph| {
            character.apply_bone_transformation(bone_name, kind, value, graph)
        })
    }

    pub fn apply_bone_rotations(
        &mut self,
        id: EntityId,
        rotations: &BTreeMap<String, QuatData>,
    ) -> Result<BoneApplyReport, EntityError> {
        self.with_character(id, |character, graph| character.apply_bone_rotations(rotations, graph))
    }

    pub fn reset_all_bones(&mut self, id: EntityId) -> Result<(), EntityError> {
        self.with_character(id, |character, graph| character.reset_all_bones(graph))
    }

    pub fn show_bone_visualization(&mut self, id: EntityId, visible: bool) -> Result<(), EntityError> {
        self.with_character(id, |character, graph| character.show_bone_visualization(visible, graph))
    }

    pub fn set_shape_type(&mut self, id: EntityId, shape_type: ShapeType) -> Result<(), EntityError> {
        let index = self.entity_index(id)?;
        let EntityKind::Shape(shape) = self.entities[index].kind_mut() else {
            return Err(EntityError::NotAShape(id));
        };
        shape.set_shape_type(shape_type, &mut self.graph);
        Ok(())
    }
}
