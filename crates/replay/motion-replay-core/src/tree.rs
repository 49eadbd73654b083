//! Kinematic tree: joints, links and the configuration-vector layout.
//!
//! A tree is described by a [`TreeSpec`] (names and parent references, serde
//! friendly) and validated once into an immutable [`KinematicTree`]. Joint ids are
//! assigned in depth-first order from the root, so iterating joints by id is a
//! valid topological order for forward kinematics.
//!
//! Configuration layout: indices `0..3` are the root position, `3..7` the root
//! orientation quaternion `(x, y, z, w)`, and `7..7 + dof` the values of the movable
//! joints in DoF-index order.

use std::collections::BTreeMap;
use std::ops::Range;

use hashbrown::HashMap;
use nalgebra::{Translation3, Unit, UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};

use crate::error::TreeError;
use crate::ids::{JointId, LinkId};
use crate::transform::{unit_axis, Pose, RigidTransform};

/// Number of configuration entries consumed by the free root joint.
pub const ROOT_CONFIG_LEN: usize = 7;

/// Joint type as written in a tree description.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum JointKind {
    /// 6-DoF floating base; only valid on the root.
    Free,
    Fixed,
    Revolute { axis: [f64; 3] },
    Prismatic { axis: [f64; 3] },
}

/// One joint of a [`TreeSpec`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct JointSpec {
    pub name: String,
    #[serde(flatten)]
    pub kind: JointKind,
    /// Parent joint name; `None` marks the root.
    #[serde(default)]
    pub parent: Option<String>,
    /// Placement of this joint frame in the parent joint frame.
    #[serde(default)]
    pub origin: RigidTransform,
    /// Explicit position among the movable joints' values. Either every movable
    /// joint sets it or none does, in which case depth-first order is used.
    #[serde(default)]
    pub dof_index: Option<usize>,
}

/// One link (body frame) of a [`TreeSpec`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LinkSpec {
    pub name: String,
    pub parent_joint: String,
    #[serde(default)]
    pub offset: RigidTransform,
}

/// Unvalidated tree description, typically produced by a robot-description parser.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TreeSpec {
    #[serde(default)]
    pub name: String,
    pub joints: Vec<JointSpec>,
    #[serde(default)]
    pub links: Vec<LinkSpec>,
}

/// Validated joint model.
#[derive(Clone, Debug, PartialEq)]
pub enum JointType {
    Free,
    Fixed,
    Revolute { axis: Unit<Vector3<f64>> },
    Prismatic { axis: Unit<Vector3<f64>> },
}

impl JointType {
    /// Number of configuration entries this joint consumes.
    #[inline]
    pub fn nq(&self) -> usize {
        match self {
            JointType::Free => ROOT_CONFIG_LEN,
            JointType::Fixed => 0,
            JointType::Revolute { .. } | JointType::Prismatic { .. } => 1,
        }
    }

    #[inline]
    pub fn is_movable(&self) -> bool {
        matches!(self, JointType::Revolute { .. } | JointType::Prismatic { .. })
    }
}

#[derive(Clone, Debug)]
pub struct Joint {
    pub id: JointId,
    pub name: String,
    pub kind: JointType,
    pub parent: Option<JointId>,
    pub origin: Pose,
    /// Indices into the full configuration vector; empty for fixed joints.
    pub q_range: Range<usize>,
}

#[derive(Clone, Debug)]
pub struct Link {
    pub id: LinkId,
    pub name: String,
    pub parent_joint: JointId,
    pub offset: Pose,
}

/// A named frame that end-effector lookups may resolve to.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FrameRef {
    Link(LinkId),
    Joint(JointId),
}

/// Immutable, validated kinematic tree.
#[derive(Clone, Debug)]
pub struct KinematicTree {
    name: String,
    joints: Vec<Joint>,
    links: Vec<Link>,
    joint_by_name: HashMap<String, JointId>,
    link_by_name: HashMap<String, LinkId>,
    dof: usize,
}

impl KinematicTree {
    /// Validate a description and build the tree.
    pub fn from_spec(spec: TreeSpec) -> Result<Self, TreeError> {
        let TreeSpec {
            name,
            joints: joint_specs,
            links: link_specs,
        } = spec;

        if joint_specs.is_empty() {
            return Err(TreeError::Empty);
        }

        let mut index_by_name: HashMap<&str, usize> = HashMap::with_capacity(joint_specs.len());
        for (idx, joint) in joint_specs.iter().enumerate() {
            if index_by_name.insert(joint.name.as_str(), idx).is_some() {
                return Err(TreeError::DuplicateName {
                    kind: "joint",
                    name: joint.name.clone(),
                });
            }
        }

        let mut parents: Vec<Option<usize>> = Vec::with_capacity(joint_specs.len());
        for joint in &joint_specs {
            let parent = match &joint.parent {
                Some(p) => Some(*index_by_name.get(p.as_str()).ok_or_else(|| {
                    TreeError::UnknownParent {
                        kind: "joint",
                        name: joint.name.clone(),
                        parent: p.clone(),
                    }
                })?),
                None => None,
            };
            parents.push(parent);
        }

        let mut root: Option<usize> = None;
        for (idx, parent) in parents.iter().enumerate() {
            if parent.is_none() {
                if let Some(first) = root {
                    return Err(TreeError::MultipleRoots {
                        first: joint_specs[first].name.clone(),
                        second: joint_specs[idx].name.clone(),
                    });
                }
                root = Some(idx);
            }
        }
        let root = root.ok_or(TreeError::NoRoot)?;

        detect_cycles(&joint_specs, &parents)?;

        let mut kinds: Vec<JointType> = Vec::with_capacity(joint_specs.len());
        for (idx, joint) in joint_specs.iter().enumerate() {
            let kind = match &joint.kind {
                JointKind::Free if idx == root => JointType::Free,
                JointKind::Free => {
                    return Err(TreeError::FreeJointNotRoot {
                        name: joint.name.clone(),
                    })
                }
                _ if idx == root => {
                    return Err(TreeError::RootNotFree {
                        name: joint.name.clone(),
                    })
                }
                JointKind::Fixed => JointType::Fixed,
                JointKind::Revolute { axis } => JointType::Revolute {
                    axis: unit_axis(*axis).ok_or_else(|| TreeError::InvalidAxis {
                        name: joint.name.clone(),
                    })?,
                },
                JointKind::Prismatic { axis } => JointType::Prismatic {
                    axis: unit_axis(*axis).ok_or_else(|| TreeError::InvalidAxis {
                        name: joint.name.clone(),
                    })?,
                },
            };
            kinds.push(kind);
        }

        let order = depth_first_order(root, &parents);
        let dof_slots = assign_dof_indices(&joint_specs, &kinds, &order)?;
        let dof = kinds.iter().filter(|k| k.is_movable()).count();

        // declaration index -> JointId
        let mut id_of = vec![JointId(0); joint_specs.len()];
        for (pos, &spec_idx) in order.iter().enumerate() {
            id_of[spec_idx] = JointId(pos as u32);
        }

        let mut joints: Vec<Joint> = Vec::with_capacity(order.len());
        let mut joint_by_name = HashMap::with_capacity(order.len());
        for &spec_idx in &order {
            let spec = &joint_specs[spec_idx];
            let id = id_of[spec_idx];
            let kind = kinds[spec_idx].clone();
            let q_range = match (&kind, dof_slots[spec_idx]) {
                (JointType::Free, _) => 0..ROOT_CONFIG_LEN,
                (_, Some(slot)) => {
                    let start = ROOT_CONFIG_LEN + slot;
                    start..start + 1
                }
                (_, None) => ROOT_CONFIG_LEN..ROOT_CONFIG_LEN,
            };
            let origin = if matches!(kind, JointType::Free) {
                Pose::identity()
            } else {
                origin_pose(&spec.origin, &spec.name)?
            };
            joint_by_name.insert(spec.name.clone(), id);
            joints.push(Joint {
                id,
                name: spec.name.clone(),
                kind,
                parent: parents[spec_idx].map(|p| id_of[p]),
                origin,
                q_range,
            });
        }

        let mut links: Vec<Link> = Vec::with_capacity(link_specs.len());
        let mut link_by_name = HashMap::with_capacity(link_specs.len());
        for spec in link_specs {
            let parent_joint = *joint_by_name.get(spec.parent_joint.as_str()).ok_or_else(|| {
                TreeError::UnknownParent {
                    kind: "link",
                    name: spec.name.clone(),
                    parent: spec.parent_joint.clone(),
                }
            })?;
            let id = LinkId(links.len() as u32);
            if link_by_name.insert(spec.name.clone(), id).is_some() {
                return Err(TreeError::DuplicateName {
                    kind: "link",
                    name: spec.name,
                });
            }
            let offset = origin_pose(&spec.offset, &spec.name)?;
            links.push(Link {
                id,
                name: spec.name,
                parent_joint,
                offset,
            });
        }

        Ok(KinematicTree {
            name,
            joints,
            links,
            joint_by_name,
            link_by_name,
            dof,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Joints in topological order (root first); `joints()[i].id == JointId(i)`.
    pub fn joints(&self) -> &[Joint] {
        &self.joints
    }

    pub fn links(&self) -> &[Link] {
        &self.links
    }

    pub fn joint(&self, id: JointId) -> Option<&Joint> {
        self.joints.get(id.index())
    }

    pub fn link(&self, id: LinkId) -> Option<&Link> {
        self.links.get(id.index())
    }

    #[inline]
    pub fn root(&self) -> JointId {
        JointId(0)
    }

    pub fn joint_id(&self, name: &str) -> Option<JointId> {
        self.joint_by_name.get(name).copied()
    }

    pub fn link_id(&self, name: &str) -> Option<LinkId> {
        self.link_by_name.get(name).copied()
    }

    /// Resolve a frame name, preferring links over joints of the same name.
    pub fn resolve_frame(&self, name: &str) -> Option<FrameRef> {
        self.link_id(name)
            .map(FrameRef::Link)
            .or_else(|| self.joint_id(name).map(FrameRef::Joint))
    }

    /// Number of non-root degrees of freedom (`N`).
    #[inline]
    pub fn dof(&self) -> usize {
        self.dof
    }

    /// Expected configuration vector length, `7 + N`.
    #[inline]
    pub fn config_len(&self) -> usize {
        ROOT_CONFIG_LEN + self.dof
    }

    /// `(joint, range)` pairs for every joint that consumes configuration values,
    /// ordered by position in the configuration vector.
    pub fn dof_layout(&self) -> Vec<(JointId, Range<usize>)> {
        let mut layout: Vec<(JointId, Range<usize>)> = self
            .joints
            .iter()
            .filter(|j| !j.q_range.is_empty())
            .map(|j| (j.id, j.q_range.clone()))
            .collect();
        layout.sort_by_key(|(_, r)| r.start);
        layout
    }

    /// `(link, parent joint)` pairs in link order, for mesh attachment.
    pub fn link_attachments(&self) -> impl Iterator<Item = (LinkId, JointId)> + '_ {
        self.links.iter().map(|l| (l.id, l.parent_joint))
    }

    /// Joint ids from `joint` up to and including the root.
    pub fn parent_chain(&self, joint: JointId) -> Vec<JointId> {
        let mut chain = Vec::new();
        let mut cursor = self.joint(joint);
        while let Some(j) = cursor {
            chain.push(j.id);
            cursor = j.parent.and_then(|p| self.joint(p));
        }
        chain
    }

    /// Local transform of a non-root joint at configuration value `q`.
    pub fn joint_local_transform(&self, joint: &Joint, q: f64) -> Pose {
        match &joint.kind {
            JointType::Free | JointType::Fixed => joint.origin,
            JointType::Revolute { axis } => {
                joint.origin * Pose::from_parts(
                    Translation3::identity(),
                    UnitQuaternion::from_axis_angle(axis, q),
                )
            }
            JointType::Prismatic { axis } => {
                joint.origin * Pose::from_parts(
                    Translation3::from(axis.into_inner() * q),
                    UnitQuaternion::identity(),
                )
            }
        }
    }

    /// Root at the origin with identity orientation, every joint value zero.
    pub fn neutral_configuration(&self) -> Vec<f64> {
        let mut q = vec![0.0; self.config_len()];
        q[6] = 1.0;
        q
    }
}

impl TryFrom<TreeSpec> for KinematicTree {
    type Error = TreeError;

    fn try_from(spec: TreeSpec) -> Result<Self, Self::Error> {
        KinematicTree::from_spec(spec)
    }
}

fn origin_pose(rt: &RigidTransform, name: &str) -> Result<Pose, TreeError> {
    rt.to_pose().map_err(|_| TreeError::InvalidOrigin {
        name: name.to_string(),
    })
}

/// Follow parent pointers from every joint; revisiting a joint before the root
/// means the chain is cyclic (a self-parented joint included).
fn detect_cycles(specs: &[JointSpec], parents: &[Option<usize>]) -> Result<(), TreeError> {
    let mut seen = vec![usize::MAX; specs.len()];
    for start in 0..specs.len() {
        let mut cursor = Some(start);
        while let Some(idx) = cursor {
            if seen[idx] == start {
                return Err(TreeError::Cycle {
                    name: specs[start].name.clone(),
                });
            }
            seen[idx] = start;
            cursor = parents[idx];
        }
    }
    Ok(())
}

/// Preorder walk from the root, children visited in declaration order.
fn depth_first_order(root: usize, parents: &[Option<usize>]) -> Vec<usize> {
    let mut children: Vec<Vec<usize>> = vec![Vec::new(); parents.len()];
    for (idx, parent) in parents.iter().enumerate() {
        if let Some(p) = parent {
            children[*p].push(idx);
        }
    }
    let mut order = Vec::with_capacity(parents.len());
    let mut stack = vec![root];
    while let Some(idx) = stack.pop() {
        order.push(idx);
        stack.extend(children[idx].iter().rev().copied());
    }
    order
}

/// Slot among the movable joints' values for each joint spec (`None` when the
/// joint consumes nothing).
fn assign_dof_indices(
    specs: &[JointSpec],
    kinds: &[JointType],
    order: &[usize],
) -> Result<Vec<Option<usize>>, TreeError> {
    let movable: Vec<usize> = order
        .iter()
        .copied()
        .filter(|&idx| kinds[idx].is_movable())
        .collect();
    let mut slots = vec![None; specs.len()];

    let explicit = movable.iter().filter(|&&idx| specs[idx].dof_index.is_some()).count();
    if explicit == 0 {
        for (slot, &idx) in movable.iter().enumerate() {
            slots[idx] = Some(slot);
        }
        return Ok(slots);
    }
    if explicit != movable.len() {
        let odd = movable
            .iter()
            .find(|&&idx| specs[idx].dof_index.is_none())
            .map(|&idx| specs[idx].name.clone())
            .unwrap_or_default();
        return Err(TreeError::MixedDofIndices { name: odd });
    }

    let mut owners: BTreeMap<usize, usize> = BTreeMap::new();
    for &idx in &movable {
        let slot = specs[idx].dof_index.unwrap_or_default();
        if let Some(prev) = owners.insert(slot, idx) {
            return Err(TreeError::DofOverlap {
                index: slot,
                first: specs[prev].name.clone(),
                second: specs[idx].name.clone(),
            });
        }
        slots[idx] = Some(slot);
    }
    let dof = movable.len();
    if let Some(missing) = (0..dof).find(|i| !owners.contains_key(i)) {
        return Err(TreeError::DofGap {
            index: missing,
            dof,
        });
    }
    Ok(slots)
}
