use crate::graph::{MeshShape, NodeId, NodeKind, SceneGraph, SceneNode};
use crate::scene::ColorData;
use glam::Vec3;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShapeType {
    #[default]
    Cube,
    Sphere,
    Cylinder,
    Cone,
    Plane,
    Torus,
    Pyramid,
}

impl ShapeType {
    pub fn label(self) -> &'static str {
        match self {
            ShapeType::Cube => "cube",
            ShapeType::Sphere => "sphere",
            ShapeType::Cylinder => "cylinder",
            ShapeType::Cone => "cone",
            ShapeType::Plane => "plane",
            ShapeType::Torus => "torus",
            ShapeType::Pyramid => "pyramid",
        }
    }

    /// Unit-sized pick volume for the primitive.
    pub fn pick_shape(self) -> MeshShape {
        match self {
            ShapeType::Sphere => MeshShape::Sphere { radius: 0.5 },
            ShapeType::Plane => MeshShape::Box { half_extents: Vec3::new(0.5, 0.005, 0.5) },
            ShapeType::Torus => MeshShape::Box { half_extents: Vec3::new(0.5, 0.15, 0.5) },
            ShapeType::Cube | ShapeType::Cylinder | ShapeType::Cone | ShapeType::Pyramid => {
                MeshShape::Box { half_extents: Vec3::splat(0.5) }
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShapeProps {
    #[serde(default)]
    pub shape_type: ShapeType,
    #[serde(default = "ShapeProps::default_color")]
    pub color: ColorData,
}

impl ShapeProps {
    fn default_color() -> ColorData {
        ColorData::new(0.8, 0.8, 0.8)
    }

    pub fn new(shape_type: ShapeType) -> Self {
        Self { shape_type, color: Self::default_color() }
    }
}

impl Default for ShapeProps {
    fn default() -> Self {
        Self::new(ShapeType::default())
    }
}

#[derive(Debug)]
pub struct ShapeEntity {
    props: ShapeProps,
    mesh: NodeId,
}

impl ShapeEntity {
    pub(crate) fn new(props: ShapeProps, root: NodeId, graph: &mut SceneGraph) -> Self {
        let mesh = graph.add(
            SceneNode::new(props.shape_type.label(), NodeKind::Mesh(props.shape_type.pick_shape())).pickable(true),
            Some(root),
        );
        Self { props, mesh }
    }

    pub fn props(&self) -> &ShapeProps {
        &self.props
    }

    pub fn shape_type(&self) -> ShapeType {
        self.props.shape_type
    }

    pub fn mesh(&self) -> NodeId {
        self.mesh
    }

    pub fn set_shape_type(&mut self, shape_type: ShapeType, graph: &mut SceneGraph) {
        self.props.shape_type = shape_type;
        if let Some(node) = graph.get_mut(self.mesh) {
            node.name = shape_type.label().to_string();
            node.kind = NodeKind::Mesh(shape_type.pick_shape());
        }
    }

    pub fn set_color(&mut self, color: ColorData) {
        self.props.color = color;
    }
}
