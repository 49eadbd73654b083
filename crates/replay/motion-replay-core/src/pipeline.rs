//! Scene streaming pipeline.
//!
//! Drives one replay: static scene setup, then every frame in order (joint
//! transforms, end-effector markers, root trajectory), then a completion notice.
//! A frame's events are always emitted as a whole; the stop signal is only
//! consulted between frames.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::config::PlaybackConfig;
use crate::error::ReplayError;
use crate::events::{PlaybackSummary, SceneEvent};
use crate::geometry::MeshProvider;
use crate::initializer::static_meshes;
use crate::kinematics::{compute_into, TransformMap};
use crate::motion::MotionBuffer;
use crate::sink::SceneSink;
use crate::tree::{FrameRef, KinematicTree};

/// Lifecycle of a [`ScenePipeline`] run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PipelineState {
    Idle,
    Initializing,
    Playing,
    Draining,
    Done,
    /// A setup or per-frame error aborted the run.
    Failed,
}

impl PipelineState {
    #[inline]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Initializing => "initializing",
            Self::Playing => "playing",
            Self::Draining => "draining",
            Self::Done => "done",
            Self::Failed => "failed",
        }
    }

    /// `Done` and `Failed` end a run; a new run starts again from `Idle`.
    #[inline]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }
}

/// Cooperative stop request shared between the pipeline and its host.
#[derive(Debug, Clone, Default)]
pub struct StopSignal(Arc<AtomicBool>);

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request_stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_requested(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

struct ResolvedEffector {
    label: String,
    frame: FrameRef,
    color: [u8; 4],
}

/// Counts events on their way to the sink.
struct Emitter<'s, S: SceneSink + ?Sized> {
    sink: &'s mut S,
    count: usize,
}

impl<S: SceneSink + ?Sized> Emitter<'_, S> {
    fn emit(&mut self, event: SceneEvent) -> Result<(), ReplayError> {
        self.sink.emit(event)?;
        self.count += 1;
        Ok(())
    }
}

/// Replays motion buffers against one kinematic tree.
///
/// The tree is borrowed read-only for the pipeline's lifetime, so the same tree
/// can back several pipelines and several runs.
pub struct ScenePipeline<'t> {
    tree: &'t KinematicTree,
    config: PlaybackConfig,
    state: PipelineState,
    // Scratch storage reused across frames; contents never outlive one frame.
    q: Vec<f64>,
    transforms: TransformMap,
}

impl<'t> ScenePipeline<'t> {
    pub fn new(tree: &'t KinematicTree, config: PlaybackConfig) -> Self {
        Self {
            tree,
            config,
            state: PipelineState::Idle,
            q: Vec::with_capacity(tree.config_len()),
            transforms: TransformMap::default(),
        }
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    pub fn config(&self) -> &PlaybackConfig {
        &self.config
    }

    pub fn tree(&self) -> &KinematicTree {
        self.tree
    }

    /// Replay `motion` to completion.
    pub fn run<P, S>(
        &mut self,
        motion: &MotionBuffer,
        meshes: &P,
        sink: &mut S,
    ) -> Result<PlaybackSummary, ReplayError>
    where
        P: MeshProvider + ?Sized,
        S: SceneSink + ?Sized,
    {
        self.run_until(motion, meshes, sink, &StopSignal::new())
    }

    /// Replay `motion`, checking `stop` before each frame. A stop request ends
    /// playback early but still drains (completion notice) and ends in `Done`.
    pub fn run_until<P, S>(
        &mut self,
        motion: &MotionBuffer,
        meshes: &P,
        sink: &mut S,
        stop: &StopSignal,
    ) -> Result<PlaybackSummary, ReplayError>
    where
        P: MeshProvider + ?Sized,
        S: SceneSink + ?Sized,
    {
        self.state = PipelineState::Idle;
        let mut out = Emitter { sink, count: 0 };
        match self.drive(motion, meshes, &mut out, stop) {
            Ok(mut summary) => {
                summary.events_emitted = out.count;
                Ok(summary)
            }
            Err(err) => {
                log::error!(
                    "replay of '{}' failed while {}: {err}",
                    motion.label(),
                    self.state.name()
                );
                self.state = PipelineState::Failed;
                Err(err)
            }
        }
    }

    fn drive<P, S>(
        &mut self,
        motion: &MotionBuffer,
        meshes: &P,
        out: &mut Emitter<'_, S>,
        stop: &StopSignal,
    ) -> Result<PlaybackSummary, ReplayError>
    where
        P: MeshProvider + ?Sized,
        S: SceneSink + ?Sized,
    {
        self.config.validate()?;
        let frame_rate = motion.frame_rate();
        if !frame_rate.is_finite() || frame_rate <= 0.0 {
            return Err(ReplayError::InvalidFrameRate {
                quantity: "frame rate",
                value: frame_rate,
            });
        }

        let speed = self.config.playback_speed;
        let total = motion.frame_count();
        let last_timestamp_bound = total.saturating_sub(1) as f64 / frame_rate / speed;
        if !last_timestamp_bound.is_finite() {
            return Err(ReplayError::InvalidFrameRate {
                quantity: "playback speed",
                value: speed,
            });
        }

        self.state = PipelineState::Initializing;
        let mesh_count = self.initialize(motion, meshes, out)?;

        self.state = PipelineState::Playing;
        let effectors = self.resolve_effectors();
        log::info!(
            "replaying '{}': {total} frames at {frame_rate} fps, speed {speed}x",
            motion.label()
        );

        let mut frames_emitted = 0;
        let mut last_timestamp = 0.0;
        let mut stopped_early = false;
        for index in 0..total {
            if stop.is_requested() {
                stopped_early = true;
                log::info!("stop requested after {frames_emitted} of {total} frames");
                break;
            }
            let timestamp = index as f64 / frame_rate / speed;
            self.emit_frame(motion, index, timestamp, &effectors, out)?;
            frames_emitted += 1;
            last_timestamp = timestamp;

            let interval = self.config.progress_interval;
            if interval > 0 && frames_emitted % interval == 0 {
                log::info!("frame {frames_emitted}/{total} (t = {timestamp:.3}s)");
            }
        }

        self.state = PipelineState::Draining;
        out.emit(SceneEvent::PlaybackEnded {
            frames_emitted,
            stopped_early,
            timestamp: last_timestamp,
        })?;
        out.sink.flush()?;
        self.state = PipelineState::Done;
        log::info!("playback of '{}' complete", motion.label());

        Ok(PlaybackSummary {
            frames_emitted,
            static_meshes: mesh_count,
            events_emitted: 0,
            stopped_early,
            last_timestamp,
        })
    }

    fn initialize<P, S>(
        &self,
        motion: &MotionBuffer,
        meshes: &P,
        out: &mut Emitter<'_, S>,
    ) -> Result<usize, ReplayError>
    where
        P: MeshProvider + ?Sized,
        S: SceneSink + ?Sized,
    {
        let unknown: Vec<&str> = motion
            .link_names()
            .iter()
            .map(String::as_str)
            .filter(|name| self.tree.link_id(name).is_none())
            .collect();
        if !unknown.is_empty() {
            log::warn!(
                "motion '{}' names {} link(s) unknown to tree '{}': {}",
                motion.label(),
                unknown.len(),
                self.tree.name(),
                unknown.join(", ")
            );
        }

        let meshes = static_meshes(self.tree, meshes)?;

        if self.config.emit_motion_info {
            out.emit(SceneEvent::MotionInfo {
                label: motion.label().to_string(),
                frame_count: motion.frame_count(),
                duration: motion.duration(),
                frame_rate: motion.frame_rate(),
                dof: motion.dof(),
            })?;
        }
        if let Some(grid) = &self.config.ground_grid {
            out.emit(SceneEvent::GroundGrid {
                lines: grid.lines(),
                color: grid.color,
                radius: grid.radius,
            })?;
        }
        let count = meshes.len();
        for event in meshes {
            out.emit(event)?;
        }
        Ok(count)
    }

    fn resolve_effectors(&self) -> Vec<ResolvedEffector> {
        if !self.config.show_markers {
            return Vec::new();
        }
        self.config
            .end_effectors
            .iter()
            .enumerate()
            .filter_map(|(position, name)| match self.tree.resolve_frame(name) {
                Some(frame) => Some(ResolvedEffector {
                    label: name.clone(),
                    frame,
                    color: self.config.marker_color(position),
                }),
                None => {
                    log::debug!("end effector '{name}' not in tree, no marker");
                    None
                }
            })
            .collect()
    }

    fn emit_frame<S>(
        &mut self,
        motion: &MotionBuffer,
        index: usize,
        timestamp: f64,
        effectors: &[ResolvedEffector],
        out: &mut Emitter<'_, S>,
    ) -> Result<(), ReplayError>
    where
        S: SceneSink + ?Sized,
    {
        motion.frame_into(index, &mut self.q)?;
        compute_into(self.tree, &self.q, &mut self.transforms)?;

        for (joint, world) in self.tree.joints().iter().zip(self.transforms.joints()) {
            out.emit(SceneEvent::JointTransform {
                joint: joint.id,
                joint_name: joint.name.clone(),
                world_transform: world.into(),
                timestamp,
            })?;
        }

        for effector in effectors {
            let Some(pose) = self.transforms.frame(effector.frame) else {
                continue;
            };
            let p = pose.translation.vector;
            out.emit(SceneEvent::Marker {
                label: effector.label.clone(),
                world_position: [p.x, p.y, p.z],
                color: effector.color,
                radius: self.config.marker_radius,
                timestamp,
            })?;
        }

        out.emit(SceneEvent::TrajectoryPoint {
            world_position: motion.root_position_at(index)?,
            color: self.config.trajectory_color,
            radius: self.config.trajectory_radius,
            timestamp,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_states() {
        assert!(PipelineState::Done.is_terminal());
        assert!(PipelineState::Failed.is_terminal());
        assert!(!PipelineState::Draining.is_terminal());
        assert_eq!(PipelineState::Initializing.name(), "initializing");
    }

    #[test]
    fn stop_signal_is_shared_between_clones() {
        let stop = StopSignal::new();
        let host = stop.clone();
        assert!(!stop.is_requested());
        host.request_stop();
        assert!(stop.is_requested());
        stop.reset();
        assert!(!host.is_requested());
    }
}
