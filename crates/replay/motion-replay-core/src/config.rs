//! Playback configuration.

use serde::{Deserialize, Serialize};

use crate::error::ReplayError;

/// End-effectors tracked on the Unitree G1: feet, then hands.
pub const G1_END_EFFECTORS: [&str; 4] = [
    "left_ankle_roll_link",
    "right_ankle_roll_link",
    "left_rubber_hand",
    "right_rubber_hand",
];

/// Red, green, blue, yellow.
pub const DEFAULT_MARKER_PALETTE: [[u8; 4]; 4] = [
    [255, 100, 100, 255],
    [100, 255, 100, 255],
    [100, 100, 255, 255],
    [255, 255, 100, 255],
];

/// Square ground grid drawn once at startup.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GroundGrid {
    /// Edge length in meters.
    pub size: f64,
    /// Cells per edge.
    pub divisions: u32,
    pub color: [u8; 4],
    pub radius: f64,
}

impl Default for GroundGrid {
    fn default() -> Self {
        Self {
            size: 5.0,
            divisions: 10,
            color: [100, 100, 100, 80],
            radius: 0.002,
        }
    }
}

impl GroundGrid {
    /// Line segments in the `z = 0` plane, two per grid line index.
    pub fn lines(&self) -> Vec<[[f64; 3]; 2]> {
        let half = self.size / 2.0;
        let divisions = self.divisions.max(1);
        let step = self.size / divisions as f64;
        let mut lines = Vec::with_capacity(2 * (divisions as usize + 1));
        for i in 0..=divisions {
            let offset = -half + i as f64 * step;
            lines.push([[offset, -half, 0.0], [offset, half, 0.0]]);
            lines.push([[-half, offset, 0.0], [half, offset, 0.0]]);
        }
        lines
    }
}

/// Settings for one replay run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    /// Multiplier on real time; 2.0 plays twice as fast.
    pub playback_speed: f64,
    pub show_markers: bool,
    /// Frame names (links, falling back to joints) that receive markers.
    pub end_effectors: Vec<String>,
    pub marker_palette: Vec<[u8; 4]>,
    pub marker_radius: f64,
    pub trajectory_color: [u8; 4],
    pub trajectory_radius: f64,
    pub ground_grid: Option<GroundGrid>,
    pub emit_motion_info: bool,
    /// Log progress every N frames; 0 disables.
    pub progress_interval: usize,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            playback_speed: 1.0,
            show_markers: true,
            end_effectors: G1_END_EFFECTORS.iter().map(|s| s.to_string()).collect(),
            marker_palette: DEFAULT_MARKER_PALETTE.to_vec(),
            marker_radius: 0.03,
            trajectory_color: [200, 200, 200, 128],
            trajectory_radius: 0.01,
            ground_grid: Some(GroundGrid::default()),
            emit_motion_info: true,
            progress_interval: 50,
        }
    }
}

impl PlaybackConfig {
    pub fn with_speed(mut self, speed: f64) -> Self {
        self.playback_speed = speed;
        self
    }

    pub fn with_end_effectors<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.end_effectors = names.into_iter().map(Into::into).collect();
        self
    }

    /// Check values that would make the timestamp sequence or marker colors undefined.
    pub fn validate(&self) -> Result<(), ReplayError> {
        let speed = self.playback_speed;
        if !speed.is_finite() || speed <= 0.0 || !speed.recip().is_finite() {
            return Err(ReplayError::InvalidFrameRate {
                quantity: "playback speed",
                value: speed,
            });
        }
        if self.show_markers && !self.end_effectors.is_empty() && self.marker_palette.is_empty() {
            return Err(ReplayError::InvalidConfig {
                reason: "marker_palette is empty but markers are enabled".into(),
            });
        }
        if !(self.marker_radius.is_finite() && self.marker_radius >= 0.0)
            || !(self.trajectory_radius.is_finite() && self.trajectory_radius >= 0.0)
        {
            return Err(ReplayError::InvalidConfig {
                reason: "marker and trajectory radii must be finite and >= 0".into(),
            });
        }
        Ok(())
    }

    /// Palette color for the end-effector at `position` in `end_effectors`.
    pub fn marker_color(&self, position: usize) -> [u8; 4] {
        if self.marker_palette.is_empty() {
            return [255, 255, 255, 255];
        }
        self.marker_palette[position % self.marker_palette.len()]
    }
}
