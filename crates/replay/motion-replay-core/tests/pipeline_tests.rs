use approx::assert_relative_eq;
use motion_replay_core::{
    load_motion_file, GeometryRef, JointKind, JointSpec, KinematicTree, MeshTable,
    MotionBuffer, NoGeometry, PipelineState, PlaybackConfig, ReplayError, RecordingSink,
    SceneEvent, SceneSink, ScenePipeline, SinkError, StopSignal, TreeSpec,
};
use replay_test_fixtures::{motions, robots};

const RED: [u8; 4] = [255, 100, 100, 255];
const GREEN: [u8; 4] = [100, 255, 100, 255];
const YELLOW: [u8; 4] = [255, 255, 100, 255];

fn arm() -> KinematicTree {
    let spec: TreeSpec = robots::load("planar-arm").unwrap();
    KinematicTree::from_spec(spec).unwrap()
}

fn swing() -> MotionBuffer {
    load_motion_file(motions::path("swing").unwrap()).unwrap()
}

fn arm_config() -> PlaybackConfig {
    PlaybackConfig::default().with_end_effectors(["hand"])
}

fn trajectory_timestamps(sink: &RecordingSink) -> Vec<f64> {
    sink.events
        .iter()
        .filter_map(|e| match e {
            SceneEvent::TrajectoryPoint { timestamp, .. } => Some(*timestamp),
            _ => None,
        })
        .collect()
}

fn joint_transform_at<'a>(
    sink: &'a RecordingSink,
    name: &str,
    t: f64,
) -> &'a motion_replay_core::RigidTransform {
    sink.events
        .iter()
        .find_map(|e| match e {
            SceneEvent::JointTransform {
                joint_name,
                world_transform,
                timestamp,
                ..
            } if joint_name == name && *timestamp == t => Some(world_transform),
            _ => None,
        })
        .unwrap_or_else(|| panic!("no transform for {name} at {t}"))
}

#[test]
fn two_revolute_arm_replays_three_frames() {
    let tree = arm();
    let motion = swing();
    let mut sink = RecordingSink::new();
    let mut pipeline = ScenePipeline::new(&tree, arm_config());

    let summary = pipeline.run(&motion, &NoGeometry, &mut sink).unwrap();
    assert_eq!(pipeline.state(), PipelineState::Done);
    assert_eq!(summary.frames_emitted, 3);
    assert!(!summary.stopped_early);
    assert_eq!(summary.events_emitted, sink.len());

    let times = trajectory_timestamps(&sink);
    assert_eq!(times.len(), 3);
    for (t, expected) in times.iter().zip([0.0, 0.1, 0.2]) {
        assert_relative_eq!(*t, expected, epsilon = 1e-12);
    }

    // Frame 1: joint1 at 90 degrees, joint2 at zero.
    let t1 = times[1];
    let joint1 = joint_transform_at(&sink, "joint1", t1).to_pose().unwrap();
    let joint2 = joint_transform_at(&sink, "joint2", t1).to_pose().unwrap();
    let origin = tree
        .joint(tree.joint_id("joint2").unwrap())
        .unwrap()
        .origin;
    assert_relative_eq!(joint2, joint1 * origin, epsilon = 1e-12);
    assert_relative_eq!(joint2.translation.vector.y, 1.0, epsilon = 1e-12);
    assert_relative_eq!(joint2.translation.vector.x, 0.0, epsilon = 1e-12);
}

#[test]
fn doubling_speed_halves_every_timestamp() {
    let tree = arm();
    let motion = swing();

    let mut normal = RecordingSink::new();
    ScenePipeline::new(&tree, arm_config())
        .run(&motion, &NoGeometry, &mut normal)
        .unwrap();
    let mut fast = RecordingSink::new();
    ScenePipeline::new(&tree, arm_config().with_speed(2.0))
        .run(&motion, &NoGeometry, &mut fast)
        .unwrap();

    let slow_times = trajectory_timestamps(&normal);
    let fast_times = trajectory_timestamps(&fast);
    assert_eq!(slow_times.len(), fast_times.len());
    for (s, f) in slow_times.iter().zip(&fast_times) {
        assert_eq!(*f, *s / 2.0);
    }
}

#[test]
fn timestamps_never_decrease_and_frames_stay_contiguous() {
    let tree = arm();
    let motion = swing();
    let mut sink = RecordingSink::new();
    ScenePipeline::new(&tree, arm_config())
        .run(&motion, &NoGeometry, &mut sink)
        .unwrap();

    let stamps: Vec<f64> = sink.timed().filter_map(SceneEvent::timestamp).collect();
    // 3 joints + 1 marker + 1 trajectory point per frame.
    assert_eq!(stamps.len(), 3 * 5);
    assert!(stamps.windows(2).all(|w| w[0] <= w[1]));
    for frame in stamps.chunks(5) {
        assert!(frame.iter().all(|t| *t == frame[0]));
    }
}

#[test]
fn empty_motion_emits_no_frames() {
    let tree = arm();
    let motion = load_motion_file(motions::path("empty").unwrap()).unwrap();
    assert_eq!(motion.frame_count(), 0);

    let mut sink = RecordingSink::new();
    let mut pipeline = ScenePipeline::new(&tree, arm_config());
    let summary = pipeline.run(&motion, &NoGeometry, &mut sink).unwrap();

    assert_eq!(pipeline.state(), PipelineState::Done);
    assert_eq!(summary.frames_emitted, 0);
    assert_eq!(sink.timed().count(), 0);
    assert!(matches!(
        sink.events.last(),
        Some(SceneEvent::PlaybackEnded {
            frames_emitted: 0,
            stopped_early: false,
            ..
        })
    ));
}

#[test]
fn markers_cycle_through_the_palette_by_list_position() {
    let tree = arm();
    let motion = swing();
    let config = PlaybackConfig::default().with_end_effectors([
        "hand",
        "upper_link",
        "left_rubber_hand",
        "joint2",
        "base_link",
        "hand",
    ]);
    let mut sink = RecordingSink::new();
    ScenePipeline::new(&tree, config)
        .run(&motion, &NoGeometry, &mut sink)
        .unwrap();

    let first_frame: Vec<(String, [u8; 4])> = sink
        .events
        .iter()
        .filter_map(|e| match e {
            SceneEvent::Marker {
                label,
                color,
                timestamp,
                ..
            } if *timestamp == 0.0 => Some((label.clone(), *color)),
            _ => None,
        })
        .collect();
    assert_eq!(
        first_frame,
        vec![
            ("hand".to_string(), RED),
            ("upper_link".to_string(), GREEN),
            ("joint2".to_string(), YELLOW),
            ("base_link".to_string(), RED),
            ("hand".to_string(), GREEN),
        ]
    );
}

#[test]
fn markers_track_end_effector_world_position() {
    let tree = arm();
    let motion = swing();
    let mut sink = RecordingSink::new();
    ScenePipeline::new(&tree, arm_config())
        .run(&motion, &NoGeometry, &mut sink)
        .unwrap();

    let positions: Vec<[f64; 3]> = sink
        .events
        .iter()
        .filter_map(|e| match e {
            SceneEvent::Marker { world_position, .. } => Some(*world_position),
            _ => None,
        })
        .collect();
    assert_eq!(positions.len(), 3);
    // Straight, shoulder at 90 degrees, elbow at 90 degrees.
    let expected = [[2.0, 0.0, 0.0], [0.0, 2.0, 0.0], [1.0, 1.0, 0.0]];
    for (got, want) in positions.iter().zip(expected) {
        for axis in 0..3 {
            assert_relative_eq!(got[axis], want[axis], epsilon = 1e-12);
        }
    }
}

#[test]
fn hidden_markers_emit_no_marker_events() {
    let tree = arm();
    let config = PlaybackConfig {
        show_markers: false,
        ..arm_config()
    };
    let mut sink = RecordingSink::new();
    ScenePipeline::new(&tree, config)
        .run(&swing(), &NoGeometry, &mut sink)
        .unwrap();
    assert!(!sink
        .events
        .iter()
        .any(|e| matches!(e, SceneEvent::Marker { .. })));
}

#[test]
fn static_scene_precedes_frames() {
    let tree = arm();
    let meshes = MeshTable::new(
        &tree,
        [
            ("hand", GeometryRef::new("meshes/hand.stl")),
            ("base_link", GeometryRef::new("meshes/base.stl")),
        ],
    )
    .unwrap();
    let mut sink = RecordingSink::new();
    let summary = ScenePipeline::new(&tree, arm_config())
        .run(&swing(), &meshes, &mut sink)
        .unwrap();
    assert_eq!(summary.static_meshes, 2);

    assert!(matches!(sink.events[0], SceneEvent::MotionInfo { frame_count: 3, dof: 2, .. }));
    assert!(matches!(sink.events[1], SceneEvent::GroundGrid { .. }));
    let first_timed = sink
        .events
        .iter()
        .position(|e| !e.is_persistent())
        .unwrap();
    let meshes: Vec<&SceneEvent> = sink.events[..first_timed]
        .iter()
        .filter(|e| matches!(e, SceneEvent::StaticMesh { .. }))
        .collect();
    assert_eq!(meshes.len(), 2);
    match meshes[1] {
        SceneEvent::StaticMesh {
            link_name,
            local_transform,
            ..
        } => {
            assert_eq!(link_name, "hand");
            assert_relative_eq!(local_transform.translation[0], 1.0, epsilon = 1e-12);
        }
        _ => unreachable!(),
    }
}

#[test]
fn stop_before_start_drains_without_frames() {
    let tree = arm();
    let stop = StopSignal::new();
    stop.request_stop();
    let mut sink = RecordingSink::new();
    let mut pipeline = ScenePipeline::new(&tree, arm_config());
    let summary = pipeline
        .run_until(&swing(), &NoGeometry, &mut sink, &stop)
        .unwrap();
    assert!(summary.stopped_early);
    assert_eq!(summary.frames_emitted, 0);
    assert_eq!(pipeline.state(), PipelineState::Done);
}

struct StopAfterFirstFrame {
    inner: RecordingSink,
    stop: StopSignal,
}

impl SceneSink for StopAfterFirstFrame {
    fn emit(&mut self, event: SceneEvent) -> Result<(), SinkError> {
        if matches!(event, SceneEvent::JointTransform { .. }) {
            // Requested mid-frame; the current frame must still finish.
            self.stop.request_stop();
        }
        self.inner.emit(event)
    }
}

#[test]
fn stop_is_honored_only_between_frames() {
    let tree = arm();
    let stop = StopSignal::new();
    let mut sink = StopAfterFirstFrame {
        inner: RecordingSink::new(),
        stop: stop.clone(),
    };
    let summary = ScenePipeline::new(&tree, arm_config())
        .run_until(&swing(), &NoGeometry, &mut sink, &stop)
        .unwrap();
    assert_eq!(summary.frames_emitted, 1);
    assert!(summary.stopped_early);
    // Whole first frame: 3 joints, 1 marker, 1 trajectory point.
    assert_eq!(sink.inner.timed().count(), 5);
    assert!(matches!(
        sink.inner.events.last(),
        Some(SceneEvent::PlaybackEnded {
            frames_emitted: 1,
            stopped_early: true,
            ..
        })
    ));
}

#[test]
fn non_positive_frame_rate_fails_before_playing() {
    let tree = arm();
    for fps in [0.0, -10.0] {
        let motion = MotionBuffer::new(
            "bad",
            fps,
            vec![[0.0; 3]],
            vec![[0.0, 0.0, 0.0, 1.0]],
            vec![vec![0.0, 0.0]],
        )
        .unwrap();
        let mut sink = RecordingSink::new();
        let mut pipeline = ScenePipeline::new(&tree, arm_config());
        let err = pipeline.run(&motion, &NoGeometry, &mut sink).unwrap_err();
        assert!(matches!(
            err,
            ReplayError::InvalidFrameRate {
                quantity: "frame rate",
                ..
            }
        ));
        assert_eq!(pipeline.state(), PipelineState::Failed);
        assert!(sink.is_empty());
    }
}

#[test]
fn non_positive_speed_is_rejected_with_the_same_error_kind() {
    let tree = arm();
    let mut sink = RecordingSink::new();
    let mut pipeline = ScenePipeline::new(&tree, arm_config().with_speed(0.0));
    let err = pipeline.run(&swing(), &NoGeometry, &mut sink).unwrap_err();
    assert!(matches!(
        err,
        ReplayError::InvalidFrameRate {
            quantity: "playback speed",
            ..
        }
    ));
    assert_eq!(pipeline.state(), PipelineState::Failed);
}

#[test]
fn speed_that_overflows_timestamps_is_rejected() {
    let tree = arm();
    let motion = MotionBuffer::new(
        "slow",
        1e-300,
        vec![[0.0; 3]; 3],
        vec![[0.0, 0.0, 0.0, 1.0]; 3],
        vec![vec![0.0, 0.0]; 3],
    )
    .unwrap();
    let mut sink = RecordingSink::new();
    let mut pipeline = ScenePipeline::new(&tree, arm_config().with_speed(1e-10));
    let err = pipeline.run(&motion, &NoGeometry, &mut sink).unwrap_err();
    assert!(matches!(
        err,
        ReplayError::InvalidFrameRate {
            quantity: "playback speed",
            ..
        }
    ));
    assert_eq!(pipeline.state(), PipelineState::Failed);
    assert!(sink.is_empty());
}

#[test]
fn dof_mismatch_surfaces_as_configuration_length_error() {
    let tree = arm();
    let motion = load_motion_file(motions::path("humanoid-step").unwrap()).unwrap();
    let mut sink = RecordingSink::new();
    let mut pipeline = ScenePipeline::new(&tree, arm_config());
    let err = pipeline.run(&motion, &NoGeometry, &mut sink).unwrap_err();
    assert_eq!(
        err,
        ReplayError::ConfigurationLength {
            expected: 9,
            actual: 14,
            dof: 2
        }
    );
    assert_eq!(pipeline.state(), PipelineState::Failed);
    assert_eq!(sink.timed().count(), 0);
}

struct FailingSink;

impl SceneSink for FailingSink {
    fn emit(&mut self, _event: SceneEvent) -> Result<(), SinkError> {
        Err(SinkError::new("disconnected"))
    }
}

#[test]
fn sink_failures_abort_the_run() {
    let tree = arm();
    let mut pipeline = ScenePipeline::new(&tree, arm_config());
    let err = pipeline
        .run(&swing(), &NoGeometry, &mut FailingSink)
        .unwrap_err();
    assert_eq!(err, ReplayError::Sink(SinkError::new("disconnected")));
    assert_eq!(pipeline.state(), PipelineState::Failed);
}

#[test]
fn tree_without_links_fails_initialization() {
    let tree = KinematicTree::from_spec(TreeSpec {
        name: "bare".into(),
        joints: vec![JointSpec {
            name: "root".into(),
            kind: JointKind::Free,
            parent: None,
            origin: Default::default(),
            dof_index: None,
        }],
        links: vec![],
    })
    .unwrap();
    let motion = MotionBuffer::new("still", 30.0, vec![], vec![], vec![]).unwrap();
    let mut pipeline = ScenePipeline::new(&tree, PlaybackConfig::default());
    let err = pipeline
        .run(&motion, &NoGeometry, &mut RecordingSink::new())
        .unwrap_err();
    assert_eq!(err, ReplayError::EmptyScene);
    assert_eq!(pipeline.state(), PipelineState::Failed);
}

#[test]
fn same_buffer_replays_identically() {
    let tree = arm();
    let motion = swing();
    let mut pipeline = ScenePipeline::new(&tree, arm_config());

    let mut first = RecordingSink::new();
    pipeline.run(&motion, &NoGeometry, &mut first).unwrap();
    let mut second = RecordingSink::new();
    pipeline.run(&motion, &NoGeometry, &mut second).unwrap();

    assert_eq!(pipeline.state(), PipelineState::Done);
    assert_eq!(first.events, second.events);
}
