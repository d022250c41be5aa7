use glam::{EulerRot, Mat4, Quat, Vec3};

const QUAT_EPSILON: f32 = 1e-5;

/// Entity transform as edited in the inspector. Rotation is stored as XYZ Euler
/// radians so values survive the project file untouched.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub position: Vec3,
    pub rotation: Vec3,
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self { position: Vec3::ZERO, rotation: Vec3::ZERO, scale: Vec3::ONE }
    }
}

impl Transform {
    pub fn new(position: Vec3, rotation: Vec3, scale: Vec3) -> Self {
        Self { position, rotation, scale }
    }

    pub fn from_position(position: Vec3) -> Self {
        Self { position, ..Self::default() }
    }

    pub fn rotation_quat(&self) -> Quat {
        Quat::from_euler(EulerRot::XYZ, self.rotation.x, self.rotation.y, self.rotation.z)
    }

    pub fn set_rotation_quat(&mut self, rotation: Quat) {
        let (x, y, z) = rotation.normalize().to_euler(EulerRot::XYZ);
        self.rotation = Vec3::new(x, y, z);
    }

    pub fn matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation_quat(), self.position)
    }

    pub fn is_finite(&self) -> bool {
        self.position.is_finite() && self.rotation.is_finite() && self.scale.is_finite()
    }
}

/// Local TRS of a scene-graph node.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NodeTransform {
    pub translation: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Default for NodeTransform {
    fn default() -> Self {
        Self { translation: Vec3::ZERO, rotation: Quat::IDENTITY, scale: Vec3::ONE }
    }
}

impl NodeTransform {
    pub fn from_translation(translation: Vec3) -> Self {
        Self { translation, ..Self::default() }
    }

    pub fn matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.translation)
    }
}

impl From<Transform> for NodeTransform {
    fn from(value: Transform) -> Self {
        Self { translation: value.position, rotation: value.rotation_quat(), scale: value.scale }
    }
}

/// Quaternions `q` and `-q` encode the same rotation, so compare through the dot product.
pub fn quat_approx_eq(a: Quat, b: Quat) -> bool {
    a.normalize().dot(b.normalize()).abs() > 1.0 - QUAT_EPSILON
}

pub fn transform_approx_eq(a: &Transform, b: &Transform) -> bool {
    a.position.abs_diff_eq(b.position, 1e-5)
        && a.rotation.abs_diff_eq(b.rotation, 1e-5)
        && a.scale.abs_diff_eq(b.scale, 1e-5)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn euler_rotation_roundtrips_through_quat() {
        let mut transform = Transform::new(Vec3::ZERO, Vec3::new(0.3, -0.2, 1.1), Vec3::ONE);
        let quat = transform.rotation_quat();
        transform.set_rotation_quat(quat);
        assert!(transform.rotation.abs_diff_eq(Vec3::new(0.3, -0.2, 1.1), 1e-5));
    }

    #[test]
    fn negated_quaternion_is_equal() {
        let q = Quat::from_rotation_y(0.75);
        assert!(quat_approx_eq(q, -q));
        assert!(!quat_approx_eq(q, Quat::IDENTITY));
    }
}
