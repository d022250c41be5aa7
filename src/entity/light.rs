use crate::graph::{MeshShape, NodeId, NodeKind, SceneGraph, SceneNode};
use crate::scene::ColorData;
use serde::{Deserialize, Serialize};

/// Point light payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LightProps {
    #[serde(default)]
    pub color: ColorData,
    #[serde(default = "LightProps::default_intensity")]
    pub intensity: f32,
    #[serde(default = "LightProps::default_range")]
    pub range: f32,
    #[serde(default)]
    pub shadow_enabled: bool,
}

impl LightProps {
    const fn default_intensity() -> f32 {
        1.0
    }

    const fn default_range() -> f32 {
        10.0
    }

    pub fn with_intensity(intensity: f32) -> Self {
        Self { intensity, ..Self::default() }
    }
}

impl Default for LightProps {
    fn default() -> Self {
        Self {
            color: ColorData::WHITE,
            intensity: Self::default_intensity(),
            range: Self::default_range(),
            shadow_enabled: false,
        }
    }
}

#[derive(Debug)]
pub struct LightEntity {
    props: LightProps,
    light: NodeId,
    handle: NodeId,
}

impl LightEntity {
    pub(crate) fn new(props: LightProps, root: NodeId, graph: &mut SceneGraph) -> Self {
        let light = graph.add(SceneNode::new("point_light", NodeKind::Light), Some(root));
        let handle = graph.add(
            SceneNode::new("light_handle", NodeKind::Mesh(MeshShape::Sphere { radius: 0.15 })).pickable(true),
            Some(root),
        );
        Self { props, light, handle }
    }

    pub fn props(&self) -> &LightProps {
        &self.props
    }

    pub fn light_node(&self) -> NodeId {
        self.light
    }

    pub fn handle(&self) -> NodeId {
        self.handle
    }

    pub fn set_intensity(&mut self, intensity: f32) {
        self.props.intensity = if intensity.is_finite() { intensity.max(0.0) } else { 0.0 };
    }

    pub fn set_color(&mut self, color: ColorData) {
        self.props.color = color;
    }

    pub fn set_range(&mut self, range: f32) {
        self.props.range = if range.is_finite() { range.max(0.0) } else { Self::fallback_range() };
    }

    pub fn set_shadow_enabled(&mut self, enabled: bool) {
        self.props.shadow_enabled = enabled;
    }

    fn fallback_range() -> f32 {
        LightProps::default_range()
    }
}
