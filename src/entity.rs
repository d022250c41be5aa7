//! Scene entities: identity, transform, and a closed set of kind payloads.

pub mod bone_control;
pub mod character;
pub mod generative;
pub mod light;
pub mod shape;

use crate::assets::{AssetError, CancelToken, ModelAsset};
use crate::config::BonesConfig;
use crate::gizmo::GizmoCapabilities;
use crate::graph::{NodeId, SceneGraph};
use crate::scene::SerializedEntity;
use crate::transform::Transform;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

pub use bone_control::{BoneControl, TransformKind};
pub use character::{BoneApplyReport, CharacterEntity, CharacterProps};
pub use generative::{AssetKind, GenerationLog, GenerativeEntity, GenerativeProps};
pub use light::{LightEntity, LightProps};
pub use shape::{ShapeEntity, ShapeProps, ShapeType};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(Uuid);

impl EntityId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn parse(value: &str) -> Result<Self, uuid::Error> {
        Uuid::parse_str(value).map(Self)
    }
}

impl Default for EntityId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for EntityId {
    type Err = uuid::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::parse(value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityType {
    Shape,
    Light,
    Generative,
    Character,
}

impl EntityType {
    pub fn label(self) -> &'static str {
        match self {
            EntityType::Shape => "shape",
            EntityType::Light => "light",
            EntityType::Generative => "generative",
            EntityType::Character => "character",
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Error)]
pub enum EntityError {
    #[error("no entity with id {0}")]
    UnknownEntity(EntityId),
    #[error("character {character} has no bone '{bone}'")]
    UnknownBone { character: EntityId, bone: String },
    #[error("entity {0} is not a character")]
    NotACharacter(EntityId),
    #[error("entity {0} is not a shape")]
    NotAShape(EntityId),
    #[error("entity {0} is not a generative asset")]
    NotGenerative(EntityId),
    #[error("entity {0} is still loading")]
    StillLoading(EntityId),
    #[error("invalid {entity_type} props: {source}")]
    InvalidProps {
        entity_type: EntityType,
        #[source]
        source: serde_json::Error,
    },
    #[error("non-finite rotation for bone '{0}'")]
    NonFiniteRotation(String),
}

/// Model-load lifecycle shared by characters and generative model assets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoadState {
    #[default]
    Unloaded,
    Loading,
    Ready { has_skeleton: bool },
    Disposed,
}

#[derive(Debug)]
pub enum EntityKind {
    Shape(ShapeEntity),
    Light(LightEntity),
    Generative(GenerativeEntity),
    Character(CharacterEntity),
}

impl EntityKind {
    pub fn entity_type(&self) -> EntityType {
        match self {
            EntityKind::Shape(_) => EntityType::Shape,
            EntityKind::Light(_) => EntityType::Light,
            EntityKind::Generative(_) => EntityType::Generative,
            EntityKind::Character(_) => EntityType::Character,
        }
    }
}

#[derive(Debug)]
pub struct Entity {
    pub id: EntityId,
    pub name: String,
    pub created: DateTime<Utc>,
    transform: Transform,
    root: NodeId,
    kind: EntityKind,
    disposed: bool,
}

impl Entity {
    /// Wraps an already registered root node. Use `EntityFactory` to build one.
    pub(crate) fn from_parts(
        id: EntityId,
        name: String,
        created: DateTime<Utc>,
        transform: Transform,
        root: NodeId,
        kind: EntityKind,
    ) -> Self {
        Self { id, name, created, transform, root, kind, disposed: false }
    }

    pub fn entity_type(&self) -> EntityType {
        self.kind.entity_type()
    }

    pub fn kind(&self) -> &EntityKind {
        &self.kind
    }

    pub fn kind_mut(&mut self) -> &mut EntityKind {
        &mut self.kind
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn transform(&self) -> &Transform {
        &self.transform
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    pub fn capabilities(&self) -> GizmoCapabilities {
        GizmoCapabilities::all()
    }

    pub fn set_transform(&mut self, transform: Transform, graph: &mut SceneGraph) {
        self.transform = transform;
        graph.set_local(self.root, transform.into());
        if let EntityKind::Character(character) = &mut self.kind {
            character.update_bone_visualization(graph);
        }
    }

    pub fn as_character(&self) -> Option<&CharacterEntity> {
        match &self.kind {
            EntityKind::Character(character) => Some(character),
            _ => None,
        }
    }

    pub fn as_character_mut(&mut self) -> Option<&mut CharacterEntity> {
        match &mut self.kind {
            EntityKind::Character(character) => Some(character),
            _ => None,
        }
    }

    pub fn as_generative(&self) -> Option<&GenerativeEntity> {
        match &self.kind {
            EntityKind::Generative(generative) => Some(generative),
            _ => None,
        }
    }

    pub fn as_generative_mut(&mut self) -> Option<&mut GenerativeEntity> {
        match &mut self.kind {
            EntityKind::Generative(generative) => Some(generative),
            _ => None,
        }
    }

    pub fn load_state(&self) -> Option<LoadState> {
        match &self.kind {
            EntityKind::Character(character) => Some(character.load_state()),
            EntityKind::Generative(generative) => Some(generative.load_state()),
            EntityKind::Shape(_) | EntityKind::Light(_) => None,
        }
    }

    pub fn is_loading(&self) -> bool {
        self.load_state() == Some(LoadState::Loading)
    }

    /// Model URL that still has to be fetched, if any.
    pub fn pending_model_url(&self) -> Option<&str> {
        if self.disposed {
            return None;
        }
        match &self.kind {
            EntityKind::Character(character) => character.pending_model_url(),
            EntityKind::Generative(generative) => generative.pending_model_url(),
            EntityKind::Shape(_) | EntityKind::Light(_) => None,
        }
    }

    /// Marks the entity as loading and returns the token its load must observe.
    pub fn begin_loading(&mut self) -> Option<CancelToken> {
        if self.disposed {
            return None;
        }
        match &mut self.kind {
            EntityKind::Character(character) => Some(character.begin_loading()),
            EntityKind::Generative(generative) => Some(generative.begin_loading()),
            EntityKind::Shape(_) | EntityKind::Light(_) => None,
        }
    }

    /// Applies a finished load. Results arriving after `dispose` are discarded.
    pub fn complete_load(
        &mut self,
        result: Result<ModelAsset, AssetError>,
        graph: &mut SceneGraph,
        bones: &BonesConfig,
    ) {
        if self.disposed {
            return;
        }
        match &mut self.kind {
            EntityKind::Character(character) => character.complete_load(result, graph, bones),
            EntityKind::Generative(generative) => generative.complete_load(result),
            EntityKind::Shape(_) | EntityKind::Light(_) => {}
        }
    }

    pub fn on_select(&mut self, graph: &mut SceneGraph, bones: &BonesConfig) {
        if let EntityKind::Character(character) = &mut self.kind {
            if bones.show_on_select {
                character.show_bone_visualization(true, graph);
            }
        }
    }

    pub fn on_deselect(&mut self, graph: &mut SceneGraph) {
        if let EntityKind::Character(character) = &mut self.kind {
            character.show_bone_visualization(false, graph);
        }
    }

    pub fn props_value(&self, graph: &SceneGraph) -> Result<serde_json::Value, serde_json::Error> {
        match &self.kind {
            EntityKind::Shape(shape) => serde_json::to_value(shape.props()),
            EntityKind::Light(light) => serde_json::to_value(light.props()),
            EntityKind::Generative(generative) => serde_json::to_value(generative.props()),
            EntityKind::Character(character) => serde_json::to_value(character.props_snapshot(graph)),
        }
    }

    pub fn serialize(&self, graph: &SceneGraph) -> Result<SerializedEntity, serde_json::Error> {
        Ok(SerializedEntity {
            id: self.id,
            name: self.name.clone(),
            entity_type: self.entity_type(),
            created: Some(self.created),
            position: self.transform.position.into(),
            rotation: self.transform.rotation.into(),
            scaling: self.transform.scale.into(),
            props: self.props_value(graph)?,
        })
    }

    /// Releases every node the entity owns. Safe to call more than once.
    pub fn dispose(&mut self, graph: &mut SceneGraph) -> bool {
        if self.disposed {
            return false;
        }
        match &mut self.kind {
            EntityKind::Character(character) => character.dispose(graph),
            EntityKind::Generative(generative) => generative.dispose(),
            EntityKind::Shape(_) | EntityKind::Light(_) => {}
        }
        graph.remove_subtree(self.root);
        self.disposed = true;
        true
    }
}
