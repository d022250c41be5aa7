use super::{MeshShape, NodeId, NodeKind, NodeOwner, SceneGraph};
use glam::{Mat4, Vec3};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PickHit {
    pub node: NodeId,
    pub owner: NodeOwner,
    pub distance: f32,
}

/// Closest pickable, visible mesh hit along the ray. Hits on nodes without an
/// owner anywhere up the chain are ignored.
pub fn pick(graph: &SceneGraph, origin: Vec3, dir: Vec3) -> Option<PickHit> {
    if dir.length_squared() <= f32::EPSILON {
        return None;
    }
    let dir = dir.normalize();
    let mut best: Option<PickHit> = None;
    for (id, node) in graph.iter() {
        if !node.pickable {
            continue;
        }
        let NodeKind::Mesh(shape) = node.kind else {
            continue;
        };
        if !graph.is_effectively_visible(id) {
            continue;
        }
        let Some(world) = graph.world_matrix(id) else {
            continue;
        };
        let distance = match shape {
            MeshShape::Sphere { radius } => {
                let (scale, _, center) = world.to_scale_rotation_translation();
                let radius = radius * scale.abs().max_element();
                ray_sphere_intersection(origin, dir, center, radius)
            }
            MeshShape::Box { half_extents } => ray_hit_obb(origin, dir, &world, -half_extents, half_extents),
        };
        let Some(distance) = distance else {
            continue;
        };
        let Some((_, owner)) = graph.resolve_owner(id) else {
            continue;
        };
        if best.map_or(true, |hit| distance < hit.distance) {
            best = Some(PickHit { node: id, owner, distance });
        }
    }
    best
}

pub fn ray_sphere_intersection(origin: Vec3, dir: Vec3, center: Vec3, radius: f32) -> Option<f32> {
    let oc = origin - center;
    let b = oc.dot(dir);
    let c = oc.length_squared() - radius * radius;
    let discriminant = b * b - c;
    if discriminant < 0.0 {
        return None;
    }
    let sqrt_d = discriminant.sqrt();
    let mut t = -b - sqrt_d;
    if t < 0.0 {
        t = -b + sqrt_d;
    }
    if t < 0.0 {
        return None;
    }
    Some(t)
}

pub fn ray_hit_obb(origin: Vec3, dir: Vec3, world: &Mat4, min: Vec3, max: Vec3) -> Option<f32> {
    if !matrix_is_finite(world) || world.determinant().abs() <= f32::EPSILON {
        return None;
    }
    let inv = world.inverse();
    if !matrix_is_finite(&inv) {
        return None;
    }
    let origin_local = inv.transform_point3(origin);
    let dir_local = inv.transform_vector3(dir);
    if dir_local.length_squared() <= f32::EPSILON {
        return None;
    }
    let (_, hit_local) = ray_aabb_intersection(origin_local, dir_local.normalize(), min, max)?;
    let hit_world = world.transform_point3(hit_local);
    Some((hit_world - origin).length())
}

pub fn matrix_is_finite(mat: &Mat4) -> bool {
    mat.to_cols_array().iter().all(|v| v.is_finite())
}

pub fn ray_aabb_intersection(origin: Vec3, dir: Vec3, min: Vec3, max: Vec3) -> Option<(f32, Vec3)> {
    let mut t_min: f32 = 0.0;
    let mut t_max: f32 = f32::INFINITY;
    for axis in 0..3 {
        let (o, d) = (origin[axis], dir[axis]);
        if d.abs() < 1e-6 {
            if o < min[axis] || o > max[axis] {
                return None;
            }
            continue;
        }
        let inv_d = 1.0 / d;
        let mut t1 = (min[axis] - o) * inv_d;
        let mut t2 = (max[axis] - o) * inv_d;
        if t1 > t2 {
            std::mem::swap(&mut t1, &mut t2);
        }
        t_min = t_min.max(t1);
        t_max = t_max.min(t2);
        if t_min > t_max {
            return None;
        }
    }
    if t_max < 0.0 {
        return None;
    }
    let t_hit = if t_min >= 0.0 { t_min } else { t_max };
    Some((t_hit, origin + dir * t_hit))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::EntityId;
    use crate::graph::SceneNode;
    use crate::transform::NodeTransform;

    #[test]
    fn picks_nearest_owned_mesh() {
        let mut graph = SceneGraph::new();
        let near = EntityId::new();
        let far = EntityId::new();
        let near_root = graph.add(
            SceneNode::new("near", NodeKind::Transform)
                .with_owner(NodeOwner::Entity(near))
                .with_local(NodeTransform::from_translation(Vec3::new(0.0, 0.0, -3.0))),
            None,
        );
        graph.add(
            SceneNode::new("near-mesh", NodeKind::Mesh(MeshShape::Box { half_extents: Vec3::splat(0.5) }))
                .pickable(true),
            Some(near_root),
        );
        graph.add(
            SceneNode::new("far", NodeKind::Mesh(MeshShape::Sphere { radius: 1.0 }))
                .with_owner(NodeOwner::Entity(far))
                .with_local(NodeTransform::from_translation(Vec3::new(0.0, 0.0, -10.0)))
                .pickable(true),
            None,
        );

        let hit = pick(&graph, Vec3::ZERO, Vec3::NEG_Z).expect("hit");
        assert_eq!(hit.owner, NodeOwner::Entity(near));
        assert!((hit.distance - 2.5).abs() < 1e-4);

        graph.set_visible(near_root, false);
        let hit = pick(&graph, Vec3::ZERO, Vec3::NEG_Z).expect("hit");
        assert_eq!(hit.owner, NodeOwner::Entity(far));
        assert!((hit.distance - 9.0).abs() < 1e-4);
    }

    #[test]
    fn ray_behind_origin_misses() {
        assert!(ray_sphere_intersection(Vec3::ZERO, Vec3::Z, Vec3::new(0.0, 0.0, -5.0), 1.0).is_none());
        assert!(ray_aabb_intersection(Vec3::ZERO, Vec3::Z, Vec3::splat(-6.0) - Vec3::Z * 4.0, Vec3::splat(-4.0))
            .is_none());
    }
}
