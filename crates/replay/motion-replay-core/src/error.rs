//! Error types for kinematics and replay.

/// Reasons a kinematic tree description is rejected at construction time.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum TreeError {
    #[error("tree has no joints")]
    Empty,

    #[error("no root joint (every joint has a parent)")]
    NoRoot,

    #[error("multiple root joints: '{first}' and '{second}'")]
    MultipleRoots { first: String, second: String },

    #[error("root joint '{name}' must be a free joint")]
    RootNotFree { name: String },

    #[error("only the root joint may be free, '{name}' is not the root")]
    FreeJointNotRoot { name: String },

    #[error("duplicate {kind} name '{name}'")]
    DuplicateName { kind: &'static str, name: String },

    #[error("{kind} '{name}' references unknown parent joint '{parent}'")]
    UnknownParent {
        kind: &'static str,
        name: String,
        parent: String,
    },

    #[error("cycle detected in parent chain of joint '{name}'")]
    Cycle { name: String },

    #[error("joint '{name}' has a zero-length or non-finite axis")]
    InvalidAxis { name: String },

    #[error("'{name}' has a degenerate origin rotation")]
    InvalidOrigin { name: String },

    #[error("DoF indices must be given for every movable joint or for none ('{name}' differs)")]
    MixedDofIndices { name: String },

    #[error("DoF index {index} is claimed by both '{first}' and '{second}'")]
    DofOverlap {
        index: usize,
        first: String,
        second: String,
    },

    #[error("DoF index {index} is not claimed by any joint (layout has {dof} DoF)")]
    DofGap { index: usize, dof: usize },

    #[error("unsupported joint type '{kind}' on joint '{name}'")]
    UnsupportedJoint { name: String, kind: String },
}

/// Comprehensive error type for kinematics, motion access and playback.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum ReplayError {
    #[error("malformed kinematic tree: {0}")]
    MalformedTree(#[from] TreeError),

    /// The configuration vector does not match `7 + N`.
    #[error("configuration vector has length {actual}, expected {expected} (7 root values + {dof} joint DoF)")]
    ConfigurationLength {
        expected: usize,
        actual: usize,
        dof: usize,
    },

    #[error("joint '{name}' consumes configuration indices {start}..{end} outside the layout of length {len}")]
    UnknownJoint {
        name: String,
        start: usize,
        end: usize,
        len: usize,
    },

    #[error("frame index {index} is out of range [0, {frame_count})")]
    FrameIndexOutOfRange { index: usize, frame_count: usize },

    /// Raised for both the motion frame rate and the playback speed multiplier.
    #[error("{quantity} must be finite and > 0, got {value}")]
    InvalidFrameRate { quantity: &'static str, value: f64 },

    #[error("motion buffer shape mismatch: {reason}")]
    MotionShape { reason: String },

    #[error("root orientation quaternion has degenerate norm {norm}")]
    DegenerateOrientation { norm: f64 },

    #[error("invalid playback configuration: {reason}")]
    InvalidConfig { reason: String },

    #[error("geometry table references unknown link '{link}'")]
    UnknownGeometryLink { link: String },

    #[error("kinematic tree has no links to place in the scene")]
    EmptyScene,

    #[error("scene sink failed: {0}")]
    Sink(#[from] SinkError),
}

/// Failure reported by a [`SceneSink`](crate::sink::SceneSink).
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
#[error("{reason}")]
pub struct SinkError {
    pub reason: String,
}

impl SinkError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl From<std::io::Error> for SinkError {
    fn from(err: std::io::Error) -> Self {
        SinkError::new(format!("io error: {err}"))
    }
}

impl From<serde_json::Error> for SinkError {
    fn from(err: serde_json::Error) -> Self {
        SinkError::new(format!("serialize event: {err}"))
    }
}

/// Errors raised while reading motion files or tree descriptions from disk.
#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum LoadError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid motion in {path}: {source}")]
    Motion {
        path: String,
        #[source]
        source: ReplayError,
    },

    #[error("invalid robot description in {path}: {reason}")]
    Robot { path: String, reason: String },
}
