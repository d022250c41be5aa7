//! Builds entities from typed options or from serialized project data.

use crate::entity::{
    CharacterEntity, CharacterProps, Entity, EntityError, EntityId, EntityKind, EntityType, GenerativeEntity,
    GenerativeProps, LightEntity, LightProps, ShapeEntity, ShapeProps,
};
use crate::gizmo::GizmoCapabilities;
use crate::graph::{NodeKind, NodeOwner, SceneGraph, SceneNode};
use crate::scene::SerializedEntity;
use crate::transform::Transform;
use chrono::{DateTime, Utc};
use serde_json::Value;

/// Identity and placement shared by every entity kind.
#[derive(Debug, Clone)]
pub struct EntitySeed {
    pub id: EntityId,
    pub name: String,
    pub created: DateTime<Utc>,
    pub transform: Transform,
}

impl EntitySeed {
    pub fn named(name: impl Into<String>) -> Self {
        Self { id: EntityId::new(), name: name.into(), created: Utc::now(), transform: Transform::default() }
    }

    fn from_serialized(data: &SerializedEntity) -> Self {
        Self {
            id: data.id,
            name: data.name.clone(),
            created: data.created.unwrap_or_else(Utc::now),
            transform: Transform::new(data.position.into(), data.rotation.into(), data.scaling.into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum EntityProps {
    Shape(ShapeProps),
    Light(LightProps),
    Generative(GenerativeProps),
    Character(CharacterProps),
}

impl EntityProps {
    pub fn entity_type(&self) -> EntityType {
        match self {
            EntityProps::Shape(_) => EntityType::Shape,
            EntityProps::Light(_) => EntityType::Light,
            EntityProps::Generative(_) => EntityType::Generative,
            EntityProps::Character(_) => EntityType::Character,
        }
    }

    pub fn default_for(entity_type: EntityType) -> Self {
        match entity_type {
            EntityType::Shape => EntityProps::Shape(ShapeProps::default()),
            EntityType::Light => EntityProps::Light(LightProps::default()),
            EntityType::Generative => EntityProps::Generative(GenerativeProps::default()),
            EntityType::Character => EntityProps::Character(CharacterProps::default()),
        }
    }

    /// Decodes a props payload. `null` means "all defaults".
    pub fn from_value(entity_type: EntityType, value: &Value) -> Result<Self, EntityError> {
        if value.is_null() {
            return Ok(Self::default_for(entity_type));
        }
        let invalid = |source| EntityError::InvalidProps { entity_type, source };
        let props = match entity_type {
            EntityType::Shape => EntityProps::Shape(serde_json::from_value(value.clone()).map_err(invalid)?),
            EntityType::Light => EntityProps::Light(serde_json::from_value(value.clone()).map_err(invalid)?),
            EntityType::Generative => {
                EntityProps::Generative(serde_json::from_value(value.clone()).map_err(invalid)?)
            }
            EntityType::Character => {
                EntityProps::Character(serde_json::from_value(value.clone()).map_err(invalid)?)
            }
        };
        Ok(props)
    }

    pub fn to_value(&self) -> Result<Value, serde_json::Error> {
        match self {
            EntityProps::Shape(props) => serde_json::to_value(props),
            EntityProps::Light(props) => serde_json::to_value(props),
            EntityProps::Generative(props) => serde_json::to_value(props),
            EntityProps::Character(props) => serde_json::to_value(props),
        }
    }
}

#[derive(Debug, Clone)]
pub struct EntityOptions {
    pub seed: EntitySeed,
    pub props: EntityProps,
}

impl EntityOptions {
    pub fn new(name: impl Into<String>, props: EntityProps) -> Self {
        Self { seed: EntitySeed::named(name), props }
    }

    pub fn shape(name: impl Into<String>, props: ShapeProps) -> Self {
        Self::new(name, EntityProps::Shape(props))
    }

    pub fn light(name: impl Into<String>, props: LightProps) -> Self {
        Self::new(name, EntityProps::Light(props))
    }

    pub fn generative(name: impl Into<String>, props: GenerativeProps) -> Self {
        Self::new(name, EntityProps::Generative(props))
    }

    pub fn character(name: impl Into<String>, model_url: impl Into<String>) -> Self {
        Self::new(name, EntityProps::Character(CharacterProps::new(model_url)))
    }

    pub fn with_id(mut self, id: EntityId) -> Self {
        self.seed.id = id;
        self
    }

    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.seed.transform = transform;
        self
    }
}

pub struct EntityFactory;

impl EntityFactory {
    /// Registers the root node and builds the matching kind. Model loads are not
    /// started here; the editor context drives them.
    pub fn create(options: EntityOptions, graph: &mut SceneGraph) -> Entity {
        let EntityOptions { seed, props } = options;
        let root = graph.add(
            SceneNode::new(seed.name.clone(), NodeKind::Transform)
                .with_owner(NodeOwner::Entity(seed.id))
                .with_capabilities(GizmoCapabilities::all())
                .with_local(seed.transform.into()),
            None,
        );
        let kind = match props {
            EntityProps::Shape(props) => EntityKind::Shape(ShapeEntity::new(props, root, graph)),
            EntityProps::Light(props) => EntityKind::Light(LightEntity::new(props, root, graph)),
            EntityProps::Generative(props) => EntityKind::Generative(GenerativeEntity::new(props, root, graph)),
            EntityProps::Character(props) => {
                EntityKind::Character(CharacterEntity::new(seed.id, props, root, graph))
            }
        };
        Entity::from_parts(seed.id, seed.name, seed.created, seed.transform, root, kind)
    }

    pub fn from_serialized(data: &SerializedEntity, graph: &mut SceneGraph) -> Result<Entity, EntityError> {
        let props = EntityProps::from_value(data.entity_type, &data.props)?;
        Ok(Self::create(EntityOptions { seed: EntitySeed::from_serialized(data), props }, graph))
    }

    /// Bare instance of the serialized entity's kind, keeping its id, name, and transform.
    pub fn fallback(data: &SerializedEntity, graph: &mut SceneGraph) -> Entity {
        let options = EntityOptions {
            seed: EntitySeed::from_serialized(data),
            props: EntityProps::default_for(data.entity_type),
        };
        Self::create(options, graph)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::ShapeType;
    use crate::scene::Vec3Data;
    use serde_json::json;

    fn serialized(entity_type: EntityType, props: Value) -> SerializedEntity {
        SerializedEntity {
            id: EntityId::new(),
            name: "thing".to_string(),
            entity_type,
            created: None,
            position: Vec3Data::new(1.0, 2.0, 3.0),
            rotation: Vec3Data::default(),
            scaling: Vec3Data::new(1.0, 1.0, 1.0),
            props,
        }
    }

    #[test]
    fn serialized_shape_builds_shape_kind() {
        let mut graph = SceneGraph::new();
        let data = serialized(EntityType::Shape, json!({ "shapeType": "sphere" }));
        let entity = EntityFactory::from_serialized(&data, &mut graph).expect("shape");
        assert_eq!(entity.id, data.id);
        match entity.kind() {
            EntityKind::Shape(shape) => assert_eq!(shape.shape_type(), ShapeType::Sphere),
            other => panic!("unexpected kind {other:?}"),
        }
        assert_eq!(entity.transform().position, glam::Vec3::new(1.0, 2.0, 3.0));
    }

    #[test]
    fn malformed_props_are_rejected_and_fallback_keeps_identity() {
        let mut graph = SceneGraph::new();
        let data = serialized(EntityType::Light, json!({ "intensity": "bright" }));
        let err = EntityFactory::from_serialized(&data, &mut graph).expect_err("bad props");
        assert!(matches!(err, EntityError::InvalidProps { entity_type: EntityType::Light, .. }));

        let fallback = EntityFactory::fallback(&data, &mut graph);
        assert_eq!(fallback.id, data.id);
        assert_eq!(fallback.name, "thing");
        assert_eq!(fallback.entity_type(), EntityType::Light);
    }
}
