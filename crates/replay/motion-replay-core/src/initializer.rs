//! Static scene setup: one `StaticMesh` per link that has geometry.

use crate::error::ReplayError;
use crate::events::SceneEvent;
use crate::geometry::MeshProvider;
use crate::kinematics::{forward_kinematics, link_local_transform};
use crate::tree::KinematicTree;

/// Place every link with geometry relative to its parent joint, using the
/// neutral configuration (root at identity, all joint values zero).
///
/// Links the provider has nothing for are skipped. A tree without links is an
/// error because there is nothing to draw.
pub fn static_meshes<P: MeshProvider + ?Sized>(
    tree: &KinematicTree,
    meshes: &P,
) -> Result<Vec<SceneEvent>, ReplayError> {
    if tree.links().is_empty() {
        return Err(ReplayError::EmptyScene);
    }
    let neutral = forward_kinematics(tree, &tree.neutral_configuration())?;

    let mut events = Vec::new();
    for (link_id, joint_id) in tree.link_attachments() {
        let Some(geometry) = meshes.resolve(link_id) else {
            log::debug!("no geometry for {link_id}, skipping");
            continue;
        };
        let (Some(link), Some(joint), Some(local)) = (
            tree.link(link_id),
            tree.joint(joint_id),
            link_local_transform(&neutral, tree, link_id),
        ) else {
            continue;
        };
        events.push(SceneEvent::StaticMesh {
            link: link_id,
            link_name: link.name.clone(),
            parent_joint: joint_id,
            parent_joint_name: joint.name.clone(),
            local_transform: local.into(),
            geometry,
        });
    }
    Ok(events)
}
