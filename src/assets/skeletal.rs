use super::AssetError;
use crate::skeleton::Skeleton;
use crate::transform::NodeTransform;
use glam::{Quat, Vec3};
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, warn};

/// Imports the first skin of a glTF/GLB file. `Ok(None)` means the model parsed
/// but carries no skin, so the character stays a static mesh.
pub fn load_skeleton_from_gltf(path: impl AsRef<Path>) -> Result<Option<Skeleton>, AssetError> {
    let path_ref = path.as_ref();
    if !path_ref.exists() {
        return Err(AssetError::NotFound(path_ref.display().to_string()));
    }
    let label = path_ref.display().to_string();
    let document = match gltf::import(path_ref) {
        Ok((document, _, _)) => document,
        Err(gltf::Error::Io(source)) => return Err(AssetError::Io { path: path_ref.to_path_buf(), source }),
        Err(err) => return Err(AssetError::Parse { url: label, message: err.to_string() }),
    };
    let fallback_name = path_ref
        .file_stem()
        .and_then(|stem| stem.to_str())
        .map(|stem| format!("{stem}_skeleton"))
        .unwrap_or_else(|| "skeleton".to_string());
    Ok(skeleton_from_document(&document, &fallback_name))
}

pub fn skeleton_from_document(document: &gltf::Document, fallback_name: &str) -> Option<Skeleton> {
    let mut skins = document.skins();
    let skin = skins.next()?;
    if skins.next().is_some() {
        warn!(target: "assets", model = fallback_name, "model contains multiple skins; only the first is imported");
    }
    let skeleton_name = skin.name().map(str::to_string).unwrap_or_else(|| fallback_name.to_string());

    let joint_nodes: Vec<_> = skin.joints().collect();
    if joint_nodes.is_empty() {
        warn!(target: "assets", skeleton = %skeleton_name, "skin has no joints");
        return None;
    }
    let node_to_joint: HashMap<usize, usize> =
        joint_nodes.iter().enumerate().map(|(idx, node)| (node.index(), idx)).collect();

    let mut parent_by_joint: Vec<Option<usize>> = vec![None; joint_nodes.len()];
    for (parent_idx, node) in joint_nodes.iter().enumerate() {
        for child in node.children() {
            if let Some(&child_joint) = node_to_joint.get(&child.index()) {
                parent_by_joint[child_joint] = Some(parent_idx);
            }
        }
    }

    let joints = joint_nodes
        .iter()
        .enumerate()
        .map(|(index, node)| {
            let (t, r, s) = node.transform().decomposed();
            let rotation = Quat::from_xyzw(r[0], r[1], r[2], r[3]);
            let rest = NodeTransform {
                translation: Vec3::from_array(t),
                rotation: if rotation.length_squared() > 0.0 { rotation.normalize() } else { Quat::IDENTITY },
                scale: Vec3::from_array(s),
            };
            let name = node.name().map(str::to_string).unwrap_or_else(|| format!("joint_{index}"));
            (name, parent_by_joint[index], rest)
        })
        .collect();

    let skeleton = Skeleton::from_joints(skeleton_name, joints);
    debug!(target: "assets", skeleton = %skeleton.name, bones = skeleton.len(), "imported skeleton");
    Some(skeleton)
}
