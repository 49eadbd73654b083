//! Motion buffer: an immutable time series of robot configurations.
//!
//! Construction checks only the internal shape of the arrays. Whether the joint
//! count matches a particular [`KinematicTree`](crate::tree::KinematicTree) is
//! checked when a frame is first fed to forward kinematics, so one buffer can be
//! validated against several trees.

use serde::{Deserialize, Serialize};

use crate::error::ReplayError;
use crate::tree::ROOT_CONFIG_LEN;

fn default_fps() -> f64 {
    30.0
}

/// On-disk motion document. Field names follow the recorded-motion convention
/// (`root_rot` is a quaternion in `(x, y, z, w)` order).
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MotionRecord {
    pub root_pos: Vec<[f64; 3]>,
    pub root_rot: Vec<[f64; 4]>,
    pub dof_pos: Vec<Vec<f64>>,
    #[serde(default)]
    pub local_body_pos: Option<Vec<Vec<[f64; 3]>>>,
    #[serde(default)]
    pub link_body_list: Vec<String>,
    #[serde(default = "default_fps")]
    pub fps: f64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct MotionBuffer {
    label: String,
    frame_rate: f64,
    root_position: Vec<[f64; 3]>,
    root_orientation: Vec<[f64; 4]>,
    joint_angles: Vec<Vec<f64>>,
    dof: usize,
    local_body_position: Option<Vec<Vec<[f64; 3]>>>,
    link_names: Vec<String>,
}

impl MotionBuffer {
    /// Build a buffer, validating that all arrays agree on frame count and width.
    pub fn new(
        label: impl Into<String>,
        frame_rate: f64,
        root_position: Vec<[f64; 3]>,
        root_orientation: Vec<[f64; 4]>,
        joint_angles: Vec<Vec<f64>>,
    ) -> Result<Self, ReplayError> {
        let frames = root_position.len();
        if root_orientation.len() != frames {
            return Err(ReplayError::MotionShape {
                reason: format!(
                    "root_orientation has {} frames, root_position has {frames}",
                    root_orientation.len()
                ),
            });
        }
        if joint_angles.len() != frames {
            return Err(ReplayError::MotionShape {
                reason: format!(
                    "joint_angles has {} frames, root_position has {frames}",
                    joint_angles.len()
                ),
            });
        }
        let dof = joint_angles.first().map(Vec::len).unwrap_or(0);
        if let Some((i, row)) = joint_angles.iter().enumerate().find(|(_, r)| r.len() != dof) {
            return Err(ReplayError::MotionShape {
                reason: format!("joint_angles row {i} has {} values, expected {dof}", row.len()),
            });
        }
        Ok(MotionBuffer {
            label: label.into(),
            frame_rate,
            root_position,
            root_orientation,
            joint_angles,
            dof,
            local_body_position: None,
            link_names: Vec::new(),
        })
    }

    /// Attach per-body local positions (`[T][B]`), carried through untouched.
    pub fn with_local_body_positions(
        mut self,
        positions: Vec<Vec<[f64; 3]>>,
    ) -> Result<Self, ReplayError> {
        if positions.len() != self.frame_count() {
            return Err(ReplayError::MotionShape {
                reason: format!(
                    "local_body_position has {} frames, expected {}",
                    positions.len(),
                    self.frame_count()
                ),
            });
        }
        let bodies = positions.first().map(Vec::len).unwrap_or(0);
        if let Some((i, row)) = positions.iter().enumerate().find(|(_, r)| r.len() != bodies) {
            return Err(ReplayError::MotionShape {
                reason: format!(
                    "local_body_position row {i} has {} bodies, expected {bodies}",
                    row.len()
                ),
            });
        }
        self.local_body_position = Some(positions);
        Ok(self)
    }

    pub fn with_link_names(mut self, names: Vec<String>) -> Self {
        self.link_names = names;
        self
    }

    /// Build from a deserialized [`MotionRecord`].
    pub fn from_record(label: impl Into<String>, record: MotionRecord) -> Result<Self, ReplayError> {
        let MotionRecord {
            root_pos,
            root_rot,
            dof_pos,
            local_body_pos,
            link_body_list,
            fps,
        } = record;
        let buffer = MotionBuffer::new(label, fps, root_pos, root_rot, dof_pos)?
            .with_link_names(link_body_list);
        match local_body_pos {
            Some(positions) => buffer.with_local_body_positions(positions),
            None => Ok(buffer),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn frame_rate(&self) -> f64 {
        self.frame_rate
    }

    #[inline]
    pub fn frame_count(&self) -> usize {
        self.root_position.len()
    }

    /// Number of joint values per frame (`N`); zero for an empty buffer.
    #[inline]
    pub fn dof(&self) -> usize {
        self.dof
    }

    /// Duration in seconds, `frame_count / frame_rate`.
    pub fn duration(&self) -> f64 {
        self.frame_count() as f64 / self.frame_rate
    }

    pub fn link_names(&self) -> &[String] {
        &self.link_names
    }

    pub fn local_body_positions(&self) -> Option<&[Vec<[f64; 3]>]> {
        self.local_body_position.as_deref()
    }

    /// Configuration vector `[pos(3), quat xyzw(4), joints(N)]` for frame `index`.
    pub fn frame(&self, index: usize) -> Result<Vec<f64>, ReplayError> {
        let mut q = Vec::with_capacity(ROOT_CONFIG_LEN + self.dof);
        self.frame_into(index, &mut q)?;
        Ok(q)
    }

    /// Write frame `index` into `out`, replacing its contents.
    pub fn frame_into(&self, index: usize, out: &mut Vec<f64>) -> Result<(), ReplayError> {
        self.check_index(index)?;
        out.clear();
        out.extend_from_slice(&self.root_position[index]);
        out.extend_from_slice(&self.root_orientation[index]);
        out.extend_from_slice(&self.joint_angles[index]);
        Ok(())
    }

    /// Raw root position of frame `index`, without a kinematics pass.
    pub fn root_position_at(&self, index: usize) -> Result<[f64; 3], ReplayError> {
        self.check_index(index)?;
        Ok(self.root_position[index])
    }

    fn check_index(&self, index: usize) -> Result<(), ReplayError> {
        if index >= self.frame_count() {
            return Err(ReplayError::FrameIndexOutOfRange {
                index,
                frame_count: self.frame_count(),
            });
        }
        Ok(())
    }
}
