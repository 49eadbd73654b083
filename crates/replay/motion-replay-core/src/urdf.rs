//! URDF adapter: robot description → [`KinematicTree`] and [`MeshTable`].
//!
//! A free root joint named [`ROOT_JOINT_NAME`] is added above the URDF base link.
//! Movable joints take configuration slots in depth-first order from the base
//! link, children in declaration order.

use std::path::{Path, PathBuf};

use hashbrown::{HashMap, HashSet};

use crate::error::{LoadError, ReplayError, TreeError};
use crate::geometry::{GeometryRef, MeshTable};
use crate::transform::{pose_from_xyz_rpy, RigidTransform};
use crate::tree::{JointKind, JointSpec, KinematicTree, LinkSpec, TreeSpec};

pub const ROOT_JOINT_NAME: &str = "root_joint";

fn joint_kind(joint: &urdf_rs::Joint) -> Result<JointKind, TreeError> {
    let axis = joint.axis.xyz.0;
    match joint.joint_type {
        urdf_rs::JointType::Fixed => Ok(JointKind::Fixed),
        urdf_rs::JointType::Revolute | urdf_rs::JointType::Continuous => {
            Ok(JointKind::Revolute { axis })
        }
        urdf_rs::JointType::Prismatic => Ok(JointKind::Prismatic { axis }),
        ref other => Err(TreeError::UnsupportedJoint {
            name: joint.name.clone(),
            kind: format!("{other:?}").to_lowercase(),
        }),
    }
}

fn origin(pose: &urdf_rs::Pose) -> RigidTransform {
    pose_from_xyz_rpy(pose.xyz.0, pose.rpy.0).into()
}

/// The link that is never a joint child.
fn base_link(robot: &urdf_rs::Robot) -> Result<&str, TreeError> {
    let children: HashSet<&str> = robot.joints.iter().map(|j| j.child.link.as_str()).collect();
    let mut roots = robot
        .links
        .iter()
        .map(|l| l.name.as_str())
        .filter(|name| !children.contains(name));
    let first = roots.next().ok_or(TreeError::NoRoot)?;
    if let Some(second) = roots.next() {
        return Err(TreeError::MultipleRoots {
            first: first.to_string(),
            second: second.to_string(),
        });
    }
    Ok(first)
}

/// Convert a parsed URDF into a tree description.
pub fn tree_spec_from_urdf(robot: &urdf_rs::Robot) -> Result<TreeSpec, TreeError> {
    if robot.links.is_empty() {
        return Err(TreeError::Empty);
    }
    let base = base_link(robot)?;

    let mut children_of: HashMap<&str, Vec<&urdf_rs::Joint>> = HashMap::new();
    for joint in &robot.joints {
        children_of
            .entry(joint.parent.link.as_str())
            .or_default()
            .push(joint);
    }

    let mut joints = vec![JointSpec {
        name: ROOT_JOINT_NAME.to_string(),
        kind: JointKind::Free,
        parent: None,
        origin: RigidTransform::IDENTITY,
        dof_index: None,
    }];
    let mut links = vec![LinkSpec {
        name: base.to_string(),
        parent_joint: ROOT_JOINT_NAME.to_string(),
        offset: RigidTransform::IDENTITY,
    }];

    // (link, joint that carries it); reversed pushes keep declaration order.
    let mut stack: Vec<(&str, &str)> = vec![(base, ROOT_JOINT_NAME)];
    let mut visited: HashSet<&str> = HashSet::new();
    while let Some((link, carrier)) = stack.pop() {
        if !visited.insert(link) {
            return Err(TreeError::Cycle {
                name: link.to_string(),
            });
        }
        let Some(children) = children_of.get(link) else {
            continue;
        };
        for joint in children {
            joints.push(JointSpec {
                name: joint.name.clone(),
                kind: joint_kind(joint)?,
                parent: Some(carrier.to_string()),
                origin: origin(&joint.origin),
                dof_index: None,
            });
            links.push(LinkSpec {
                name: joint.child.link.clone(),
                parent_joint: joint.name.clone(),
                offset: RigidTransform::IDENTITY,
            });
        }
        for joint in children.iter().rev() {
            stack.push((joint.child.link.as_str(), joint.name.as_str()));
        }
    }

    // Joints the walk never reached hang off an undeclared link or a detached loop.
    let declared: HashSet<&str> = robot.links.iter().map(|l| l.name.as_str()).collect();
    let emitted: HashSet<&str> = joints.iter().map(|j| j.name.as_str()).collect();
    if let Some(orphan) = robot
        .joints
        .iter()
        .find(|j| !emitted.contains(j.name.as_str()))
    {
        return Err(if declared.contains(orphan.parent.link.as_str()) {
            TreeError::Cycle {
                name: orphan.name.clone(),
            }
        } else {
            TreeError::UnknownParent {
                kind: "joint",
                name: orphan.name.clone(),
                parent: orphan.parent.link.clone(),
            }
        });
    }
    drop(emitted);

    Ok(TreeSpec {
        name: robot.name.clone(),
        joints,
        links,
    })
}

fn rgba_to_u8(rgba: [f64; 4]) -> [u8; 4] {
    rgba.map(|c| (c.clamp(0.0, 1.0) * 255.0).round() as u8)
}

fn resolve_uri(filename: &str, mesh_dir: Option<&Path>) -> String {
    let Some(dir) = mesh_dir else {
        return filename.to_string();
    };
    let relative: PathBuf = match filename.strip_prefix("package://") {
        // Drop the package name, keep the path inside it.
        Some(rest) => rest.split_once('/').map(|(_, p)| p).unwrap_or(rest).into(),
        None if Path::new(filename).is_relative() && !filename.contains("://") => filename.into(),
        None => return filename.to_string(),
    };
    dir.join(relative).display().to_string()
}

/// Each link's first mesh visual, as `(link name, geometry)` pairs. Primitive
/// shapes are not meshes and are skipped.
pub fn geometry_from_urdf(
    robot: &urdf_rs::Robot,
    mesh_dir: Option<&Path>,
) -> Vec<(String, GeometryRef)> {
    let named_colors: HashMap<&str, [f64; 4]> = robot
        .materials
        .iter()
        .filter_map(|m| m.color.as_ref().map(|c| (m.name.as_str(), c.rgba.0)))
        .collect();

    let mut out = Vec::new();
    for link in &robot.links {
        let mesh = link.visual.iter().find_map(|visual| match &visual.geometry {
            urdf_rs::Geometry::Mesh { filename, scale } => Some((visual, filename, scale)),
            _ => None,
        });
        let Some((visual, filename, scale)) = mesh else {
            continue;
        };
        let color = visual.material.as_ref().and_then(|m| {
            m.color
                .as_ref()
                .map(|c| c.rgba.0)
                .or_else(|| named_colors.get(m.name.as_str()).copied())
        });
        out.push((
            link.name.clone(),
            GeometryRef {
                uri: resolve_uri(filename, mesh_dir),
                color: color.map(rgba_to_u8),
                scale: scale.as_ref().map(|s| s.0),
                origin: origin(&visual.origin),
            },
        ));
    }
    out
}

/// Tree and mesh table for an already parsed robot.
pub fn model_from_urdf(
    robot: &urdf_rs::Robot,
    mesh_dir: Option<&Path>,
) -> Result<(KinematicTree, MeshTable), ReplayError> {
    let tree = KinematicTree::from_spec(tree_spec_from_urdf(robot)?)?;
    let meshes = MeshTable::new(&tree, geometry_from_urdf(robot, mesh_dir))?;
    Ok((tree, meshes))
}

/// Read a URDF file. Mesh paths are resolved against `mesh_dir` when given.
pub fn load_urdf(
    path: impl AsRef<Path>,
    mesh_dir: Option<&Path>,
) -> Result<(KinematicTree, MeshTable), LoadError> {
    let path = path.as_ref();
    let robot = urdf_rs::read_file(path).map_err(|err| LoadError::Robot {
        path: path.display().to_string(),
        reason: format!("failed to parse URDF: {err}"),
    })?;
    model_from_urdf(&robot, mesh_dir).map_err(|err| LoadError::Robot {
        path: path.display().to_string(),
        reason: err.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::LinkId;

    const ARM: &str = r#"
        <robot name="arm">
          <material name="grey"><color rgba="0.5 0.5 0.5 1"/></material>
          <link name="base">
            <visual><geometry><mesh filename="package://arm/meshes/base.stl"/></geometry>
              <material name="grey"/></visual>
          </link>
          <link name="upper"/>
          <link name="lower">
            <visual><geometry><box size="0.1 0.1 0.1"/></geometry></visual>
          </link>
          <link name="tool"/>
          <joint name="shoulder" type="revolute">
            <parent link="base"/><child link="upper"/>
            <origin xyz="0 0 0.5" rpy="0 0 0"/><axis xyz="0 1 0"/>
            <limit lower="-1" upper="1" effort="1" velocity="1"/>
          </joint>
          <joint name="elbow" type="continuous">
            <parent link="upper"/><child link="lower"/>
            <origin xyz="0 0 0.3" rpy="0 0 0"/><axis xyz="0 1 0"/>
          </joint>
          <joint name="flange" type="fixed">
            <parent link="lower"/><child link="tool"/>
            <origin xyz="0 0 0.2" rpy="0 0 0"/>
          </joint>
        </robot>"#;

    fn robot() -> urdf_rs::Robot {
        urdf_rs::read_from_string(ARM).unwrap()
    }

    #[test]
    fn urdf_becomes_free_rooted_tree() {
        let (tree, _) = model_from_urdf(&robot(), None).unwrap();
        assert_eq!(tree.joints()[0].name, ROOT_JOINT_NAME);
        assert_eq!(tree.dof(), 2);
        assert_eq!(tree.config_len(), 9);
        let names: Vec<&str> = tree.joints().iter().map(|j| j.name.as_str()).collect();
        assert_eq!(names, ["root_joint", "shoulder", "elbow", "flange"]);
        assert_eq!(tree.link_id("base"), Some(LinkId(0)));
    }

    #[test]
    fn only_mesh_visuals_become_geometry() {
        let geometry = geometry_from_urdf(&robot(), Some(Path::new("/assets")));
        assert_eq!(geometry.len(), 1);
        let (link, geom) = &geometry[0];
        assert_eq!(link, "base");
        assert_eq!(geom.uri, Path::new("/assets").join("meshes/base.stl").display().to_string());
        assert_eq!(geom.color, Some([128, 128, 128, 255]));
    }

    #[test]
    fn uris_are_untouched_without_mesh_dir() {
        assert_eq!(resolve_uri("package://g1/a.stl", None), "package://g1/a.stl");
        assert_eq!(
            resolve_uri("meshes/a.stl", Some(Path::new("/m"))),
            Path::new("/m").join("meshes/a.stl").display().to_string()
        );
    }

    const DETACHED: &str = r#"
        <robot name="detached">
          <link name="base"/><link name="a"/><link name="b"/><link name="c"/>
          <joint name="ok" type="revolute">
            <parent link="base"/><child link="a"/><axis xyz="0 0 1"/>
            <limit lower="-1" upper="1" effort="1" velocity="1"/>
          </joint>
          JOINTS
        </robot>"#;

    fn detached(joints: &str) -> urdf_rs::Robot {
        urdf_rs::read_from_string(&DETACHED.replace("JOINTS", joints)).unwrap()
    }

    #[test]
    fn joint_on_undeclared_link_is_an_unknown_parent() {
        let robot = detached(
            r#"<joint name="ghost_parent" type="fixed">
                 <parent link="ghost"/><child link="b"/>
               </joint>
               <joint name="tail" type="fixed">
                 <parent link="b"/><child link="c"/>
               </joint>"#,
        );
        let err = tree_spec_from_urdf(&robot).unwrap_err();
        assert_eq!(
            err,
            TreeError::UnknownParent {
                kind: "joint",
                name: "ghost_parent".into(),
                parent: "ghost".into(),
            }
        );
    }

    #[test]
    fn loop_detached_from_base_is_a_cycle() {
        let robot = detached(
            r#"<joint name="loop1" type="fixed">
                 <parent link="b"/><child link="c"/>
               </joint>
               <joint name="loop2" type="fixed">
                 <parent link="c"/><child link="b"/>
               </joint>"#,
        );
        assert!(matches!(
            tree_spec_from_urdf(&robot),
            Err(TreeError::Cycle { ref name }) if name == "loop1"
        ));
    }

    #[test]
    fn floating_joints_are_unsupported() {
        let xml = ARM.replace(r#"type="fixed""#, r#"type="floating""#);
        let robot = urdf_rs::read_from_string(&xml).unwrap();
        assert!(matches!(
            tree_spec_from_urdf(&robot),
            Err(TreeError::UnsupportedJoint { .. })
        ));
    }
}
