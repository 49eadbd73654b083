//! Scene update events emitted by the pipeline.
//!
//! Persistent events (`MotionInfo`, `GroundGrid`, `StaticMesh`) describe the scene
//! once; per-frame events carry a timestamp and replace the previous value at the
//! same entity path.

use serde::{Deserialize, Serialize};

use crate::geometry::GeometryRef;
use crate::ids::{JointId, LinkId};
use crate::transform::RigidTransform;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
#[non_exhaustive]
pub enum SceneEvent {
    /// Summary of the motion being replayed.
    MotionInfo {
        label: String,
        frame_count: usize,
        duration: f64,
        frame_rate: f64,
        dof: usize,
    },
    /// Ground reference lines in the `z = 0` plane.
    GroundGrid {
        lines: Vec<[[f64; 3]; 2]>,
        color: [u8; 4],
        radius: f64,
    },
    /// Link geometry placed in its parent joint's frame.
    StaticMesh {
        link: LinkId,
        link_name: String,
        parent_joint: JointId,
        parent_joint_name: String,
        local_transform: RigidTransform,
        geometry: GeometryRef,
    },
    JointTransform {
        joint: JointId,
        joint_name: String,
        world_transform: RigidTransform,
        timestamp: f64,
    },
    Marker {
        label: String,
        world_position: [f64; 3],
        color: [u8; 4],
        radius: f64,
        timestamp: f64,
    },
    TrajectoryPoint {
        world_position: [f64; 3],
        color: [u8; 4],
        radius: f64,
        timestamp: f64,
    },
    /// Completion notice after the last frame (or after a stop request).
    PlaybackEnded {
        frames_emitted: usize,
        stopped_early: bool,
        timestamp: f64,
    },
}

impl SceneEvent {
    /// Timestamp of per-frame events; `None` for persistent ones.
    pub fn timestamp(&self) -> Option<f64> {
        match self {
            SceneEvent::JointTransform { timestamp, .. }
            | SceneEvent::Marker { timestamp, .. }
            | SceneEvent::TrajectoryPoint { timestamp, .. }
            | SceneEvent::PlaybackEnded { timestamp, .. } => Some(*timestamp),
            _ => None,
        }
    }

    /// Whether the sink should keep this event visible for the whole replay.
    pub fn is_persistent(&self) -> bool {
        matches!(
            self,
            SceneEvent::MotionInfo { .. }
                | SceneEvent::GroundGrid { .. }
                | SceneEvent::StaticMesh { .. }
        )
    }

    /// Hierarchical entity path, e.g. `robot/left_knee_joint/left_knee_link`.
    pub fn entity_path(&self) -> String {
        match self {
            SceneEvent::MotionInfo { .. } => "info/motion".to_string(),
            SceneEvent::GroundGrid { .. } => "ground/grid".to_string(),
            SceneEvent::StaticMesh {
                link_name,
                parent_joint_name,
                ..
            } => format!("robot/{parent_joint_name}/{link_name}"),
            SceneEvent::JointTransform { joint_name, .. } => format!("robot/{joint_name}"),
            SceneEvent::Marker { label, .. } => format!("markers/end_effectors/{label}"),
            SceneEvent::TrajectoryPoint { .. } => "trajectory/root".to_string(),
            SceneEvent::PlaybackEnded { .. } => "info/status".to_string(),
        }
    }
}

/// Result of a completed run.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PlaybackSummary {
    pub frames_emitted: usize,
    pub static_meshes: usize,
    pub events_emitted: usize,
    pub stopped_early: bool,
    /// Timestamp of the last emitted frame, in seconds.
    pub last_timestamp: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serialized_events_are_tagged() {
        let ev = SceneEvent::TrajectoryPoint {
            world_position: [0.0, 1.0, 2.0],
            color: [200, 200, 200, 128],
            radius: 0.01,
            timestamp: 0.5,
        };
        let json = serde_json::to_value(&ev).unwrap();
        assert_eq!(json["kind"], "trajectory_point");
        assert_eq!(json["timestamp"], 0.5);
    }

    #[test]
    fn entity_paths_follow_scene_layout() {
        let ev = SceneEvent::JointTransform {
            joint: JointId(1),
            joint_name: "left_knee_joint".into(),
            world_transform: RigidTransform::IDENTITY,
            timestamp: 0.0,
        };
        assert_eq!(ev.entity_path(), "robot/left_knee_joint");
        assert!(!ev.is_persistent());
        assert_eq!(ev.timestamp(), Some(0.0));
    }
}
