//! Motion Replay Core (sink-agnostic)
//!
//! Replays recorded whole-body robot motion through forward kinematics and turns
//! it into a time-ordered stream of scene updates. The crate owns the kinematic
//! tree model, the pure FK engine, motion buffers, the static scene initializer
//! and the streaming pipeline; rendering is left to a [`SceneSink`].

pub mod config;
pub mod error;
pub mod events;
pub mod geometry;
pub mod ids;
pub mod initializer;
pub mod kinematics;
pub mod loader;
pub mod motion;
pub mod pipeline;
pub mod sink;
pub mod transform;
pub mod tree;
#[cfg(feature = "urdf")]
pub mod urdf;

// Re-exports for consumers (hosts and adapters)
pub use config::{GroundGrid, PlaybackConfig, DEFAULT_MARKER_PALETTE, G1_END_EFFECTORS};
pub use error::{LoadError, ReplayError, SinkError, TreeError};
pub use events::{PlaybackSummary, SceneEvent};
pub use geometry::{GeometryRef, MeshProvider, MeshTable, NoGeometry};
pub use ids::{JointId, LinkId};
pub use initializer::static_meshes;
pub use kinematics::{compute_into, forward_kinematics, link_local_transform, TransformMap};
pub use loader::{
    find_motion_files, first_motion_in_dir, load_motion_file, load_motions_from_dir,
    load_tree_spec, motion_files, MotionFiles,
};
pub use motion::{MotionBuffer, MotionRecord};
pub use pipeline::{PipelineState, ScenePipeline, StopSignal};
pub use sink::{JsonLinesSink, RecordingSink, SceneSink};
pub use transform::{Pose, RigidTransform};
pub use tree::{FrameRef, Joint, JointKind, JointSpec, JointType, KinematicTree, Link, LinkSpec, TreeSpec};
