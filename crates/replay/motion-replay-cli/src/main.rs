use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{ArgGroup, Parser};
use motion_replay_core::{
    first_motion_in_dir, load_motion_file, load_tree_spec, JsonLinesSink, KinematicTree,
    MeshTable, MotionBuffer, PlaybackConfig, ScenePipeline, StopSignal,
};

#[derive(Parser, Debug)]
#[command(
    name = "motion-replay",
    version,
    about = "Replay recorded robot motion as a time-ordered scene stream"
)]
#[command(group(ArgGroup::new("source").required(true).args(["file", "dir"])))]
struct Cli {
    /// Robot description: a URDF file or a JSON tree description
    #[arg(long)]
    robot: PathBuf,
    /// Directory that URDF mesh paths are resolved against
    #[arg(long)]
    mesh_dir: Option<PathBuf>,
    /// Motion file to replay
    #[arg(long)]
    file: Option<PathBuf>,
    /// Directory to scan for motion files; the first one found is replayed
    #[arg(long)]
    dir: Option<PathBuf>,
    /// Number of candidate files tried in directory mode (default 1)
    #[arg(long)]
    max_files: Option<usize>,
    /// Playback speed multiplier (must be > 0)
    #[arg(long)]
    speed: Option<f64>,
    /// Do not emit end-effector markers
    #[arg(long)]
    no_markers: bool,
    /// JSON playback configuration; flags override its values
    #[arg(long)]
    config: Option<PathBuf>,
    /// Write the event stream here instead of stdout
    #[arg(long)]
    output: Option<PathBuf>,
}

fn playback_config(cli: &Cli) -> Result<PlaybackConfig> {
    let mut config = match &cli.config {
        Some(path) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("failed to read config {}", path.display()))?;
            serde_json::from_str(&text)
                .with_context(|| format!("failed to parse config {}", path.display()))?
        }
        None => PlaybackConfig::default(),
    };
    if let Some(speed) = cli.speed {
        config.playback_speed = speed;
    }
    if cli.no_markers {
        config.show_markers = false;
    }
    config.validate()?;
    Ok(config)
}

fn load_robot(path: &Path, mesh_dir: Option<&Path>) -> Result<(KinematicTree, MeshTable)> {
    let is_urdf = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("urdf"));
    if is_urdf {
        return Ok(motion_replay_core::urdf::load_urdf(path, mesh_dir)?);
    }
    let tree = load_tree_spec(path)?;
    Ok((tree, MeshTable::default()))
}

fn load_motion(cli: &Cli) -> Result<MotionBuffer> {
    if let Some(file) = &cli.file {
        return Ok(load_motion_file(file)?);
    }
    let Some(dir) = &cli.dir else {
        bail!("either --file or --dir is required");
    };
    let max_files = cli.max_files.unwrap_or(1);
    match first_motion_in_dir(dir, max_files)? {
        Some(motion) => Ok(motion),
        None => bail!(
            "no loadable motion file among the first {max_files} under {}",
            dir.display()
        ),
    }
}

fn open_output(path: Option<&Path>) -> Result<Box<dyn Write>> {
    Ok(match path {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("failed to create {}", path.display()))?;
            Box::new(BufWriter::new(file))
        }
        None => Box::new(BufWriter::new(io::stdout().lock())),
    })
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("motion_replay=info".parse()?)
                .add_directive("motion_replay_core=info".parse()?),
        )
        .init();

    let cli = Cli::parse();
    let config = playback_config(&cli)?;
    let (tree, meshes) = load_robot(&cli.robot, cli.mesh_dir.as_deref())?;
    tracing::info!(
        "robot '{}': {} joints, {} links, {} DoF, {} meshes",
        tree.name(),
        tree.joints().len(),
        tree.links().len(),
        tree.dof(),
        meshes.len()
    );
    let motion = load_motion(&cli)?;

    let stop = StopSignal::new();
    let handler_stop = stop.clone();
    ctrlc::set_handler(move || handler_stop.request_stop())?;

    let mut sink = JsonLinesSink::new(open_output(cli.output.as_deref())?);
    let summary = ScenePipeline::new(&tree, config).run_until(&motion, &meshes, &mut sink, &stop)?;
    tracing::info!(
        "emitted {} events ({} frames, {} static meshes){}",
        summary.events_emitted,
        summary.frames_emitted,
        summary.static_meshes,
        if summary.stopped_early { ", stopped early" } else { "" }
    );
    Ok(())
}
