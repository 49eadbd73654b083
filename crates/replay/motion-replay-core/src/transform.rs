//! Rigid-transform helpers on top of nalgebra.
//!
//! Quaternions cross the public boundary as `[x, y, z, w]` arrays, matching the
//! motion file layout; nalgebra stores them as `(w, i, j, k)`.

use nalgebra::{Isometry3, Quaternion, Translation3, Unit, UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};

use crate::error::ReplayError;

/// World or local rigid transform.
pub type Pose = Isometry3<f64>;

/// Quaternion norms below this are treated as degenerate.
const MIN_QUAT_NORM: f64 = 1e-9;

/// Build a unit rotation from an `[x, y, z, w]` quaternion, normalizing it.
pub fn rotation_from_xyzw(q: [f64; 4]) -> Result<UnitQuaternion<f64>, ReplayError> {
    let raw = Quaternion::new(q[3], q[0], q[1], q[2]);
    let norm = raw.norm();
    if !norm.is_finite() || norm < MIN_QUAT_NORM {
        return Err(ReplayError::DegenerateOrientation { norm });
    }
    Ok(UnitQuaternion::new_unchecked(raw / norm))
}

/// Build a pose from a translation and an `[x, y, z, w]` quaternion.
pub fn pose_from_parts(translation: [f64; 3], rotation: [f64; 4]) -> Result<Pose, ReplayError> {
    let rot = rotation_from_xyzw(rotation)?;
    Ok(Isometry3::from_parts(
        Translation3::new(translation[0], translation[1], translation[2]),
        rot,
    ))
}

/// Pose from translation and roll/pitch/yaw (URDF `origin` convention).
pub fn pose_from_xyz_rpy(xyz: [f64; 3], rpy: [f64; 3]) -> Pose {
    Isometry3::from_parts(
        Translation3::new(xyz[0], xyz[1], xyz[2]),
        UnitQuaternion::from_euler_angles(rpy[0], rpy[1], rpy[2]),
    )
}

/// `a ∘ b` with the resulting rotation renormalized to absorb drift.
#[inline]
pub fn compose(a: &Pose, b: &Pose) -> Pose {
    let mut out = a * b;
    out.rotation = UnitQuaternion::new_normalize(out.rotation.into_inner());
    out
}

/// Normalize a joint axis, rejecting zero-length or non-finite input.
pub fn unit_axis(axis: [f64; 3]) -> Option<Unit<Vector3<f64>>> {
    let v = Vector3::new(axis[0], axis[1], axis[2]);
    let norm = v.norm();
    if !norm.is_finite() || norm < MIN_QUAT_NORM {
        return None;
    }
    Some(Unit::new_normalize(v))
}

/// Serializable form of a [`Pose`] used in scene events.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct RigidTransform {
    pub translation: [f64; 3],
    /// Quaternion (x, y, z, w)
    pub rotation: [f64; 4],
}

impl RigidTransform {
    pub const IDENTITY: RigidTransform = RigidTransform {
        translation: [0.0, 0.0, 0.0],
        rotation: [0.0, 0.0, 0.0, 1.0],
    };

    pub fn to_pose(&self) -> Result<Pose, ReplayError> {
        pose_from_parts(self.translation, self.rotation)
    }
}

impl Default for RigidTransform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl From<&Pose> for RigidTransform {
    fn from(pose: &Pose) -> Self {
        let t = pose.translation.vector;
        let r = pose.rotation;
        RigidTransform {
            translation: [t.x, t.y, t.z],
            rotation: [r.i, r.j, r.k, r.w],
        }
    }
}

impl From<Pose> for RigidTransform {
    fn from(pose: Pose) -> Self {
        RigidTransform::from(&pose)
    }
}
