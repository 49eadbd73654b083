//! Forward kinematics over a [`KinematicTree`].
//!
//! [`forward_kinematics`] is a pure function of `(tree, configuration)`: every call
//! returns a fresh [`TransformMap`] and nothing is carried between calls. Hot loops
//! may use [`compute_into`] to reuse the map's allocation.

use crate::error::ReplayError;
use crate::ids::{JointId, LinkId};
use crate::transform::{compose, pose_from_parts, Pose};
use crate::tree::{FrameRef, JointType, KinematicTree, ROOT_CONFIG_LEN};

/// World transforms for every joint and link of one configuration.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TransformMap {
    joints: Vec<Pose>,
    links: Vec<Pose>,
}

impl TransformMap {
    pub fn joint(&self, id: JointId) -> Option<&Pose> {
        self.joints.get(id.index())
    }

    pub fn link(&self, id: LinkId) -> Option<&Pose> {
        self.links.get(id.index())
    }

    pub fn frame(&self, frame: FrameRef) -> Option<&Pose> {
        match frame {
            FrameRef::Link(id) => self.link(id),
            FrameRef::Joint(id) => self.joint(id),
        }
    }

    /// Joint transforms indexed by `JointId`.
    pub fn joints(&self) -> &[Pose] {
        &self.joints
    }

    /// Link transforms indexed by `LinkId`.
    pub fn links(&self) -> &[Pose] {
        &self.links
    }
}

/// Compute world transforms for every joint and link.
pub fn forward_kinematics(tree: &KinematicTree, q: &[f64]) -> Result<TransformMap, ReplayError> {
    let mut out = TransformMap::default();
    compute_into(tree, q, &mut out)?;
    Ok(out)
}

/// Same as [`forward_kinematics`] but writes into `out`, reusing its storage.
/// On error `out` is left cleared.
pub fn compute_into(
    tree: &KinematicTree,
    q: &[f64],
    out: &mut TransformMap,
) -> Result<(), ReplayError> {
    out.joints.clear();
    out.links.clear();

    let expected = tree.config_len();
    if q.len() != expected {
        return Err(ReplayError::ConfigurationLength {
            expected,
            actual: q.len(),
            dof: tree.dof(),
        });
    }

    let root = pose_from_parts([q[0], q[1], q[2]], [q[3], q[4], q[5], q[6]])?;

    // Joint ids are topological (root first), so parents are always filled in.
    for joint in tree.joints() {
        let world = match (&joint.kind, joint.parent) {
            (JointType::Free, _) | (_, None) => root,
            (_, Some(parent)) => {
                let value = joint_value(joint, q)?;
                let local = tree.joint_local_transform(joint, value);
                compose(&out.joints[parent.index()], &local)
            }
        };
        out.joints.push(world);
    }

    for link in tree.links() {
        let parent = &out.joints[link.parent_joint.index()];
        out.links.push(compose(parent, &link.offset));
    }
    Ok(())
}

/// Relative transform of a link with respect to its parent joint.
pub fn link_local_transform(map: &TransformMap, tree: &KinematicTree, link: LinkId) -> Option<Pose> {
    let l = tree.link(link)?;
    let joint_world = map.joint(l.parent_joint)?;
    let link_world = map.link(link)?;
    Some(joint_world.inverse() * link_world)
}

fn joint_value(joint: &crate::tree::Joint, q: &[f64]) -> Result<f64, ReplayError> {
    let range = &joint.q_range;
    if range.is_empty() {
        return Ok(0.0);
    }
    if range.start < ROOT_CONFIG_LEN || range.end > q.len() {
        return Err(ReplayError::UnknownJoint {
            name: joint.name.clone(),
            start: range.start,
            end: range.end,
            len: q.len(),
        });
    }
    Ok(q[range.start])
}
