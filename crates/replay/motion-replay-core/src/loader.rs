//! Reading motion files and tree descriptions from disk.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::LoadError;
use crate::motion::{MotionBuffer, MotionRecord};
use crate::tree::{KinematicTree, TreeSpec};

fn read(path: &Path) -> Result<String, LoadError> {
    fs::read_to_string(path).map_err(|source| LoadError::Io {
        path: path.display().to_string(),
        source,
    })
}

/// Parse a motion document; a JSON string works the same as a file.
pub fn parse_motion(label: &str, json: &str, path: &Path) -> Result<MotionBuffer, LoadError> {
    let record: MotionRecord = serde_json::from_str(json).map_err(|source| LoadError::Parse {
        path: path.display().to_string(),
        source,
    })?;
    MotionBuffer::from_record(label, record).map_err(|source| LoadError::Motion {
        path: path.display().to_string(),
        source,
    })
}

/// Load one motion file. The label is the file stem.
pub fn load_motion_file(path: impl AsRef<Path>) -> Result<MotionBuffer, LoadError> {
    let path = path.as_ref();
    let label = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    parse_motion(&label, &read(path)?, path)
}

/// Load a JSON tree description and validate it.
pub fn load_tree_spec(path: impl AsRef<Path>) -> Result<KinematicTree, LoadError> {
    let path = path.as_ref();
    let spec: TreeSpec = serde_json::from_str(&read(path)?).map_err(|source| LoadError::Parse {
        path: path.display().to_string(),
        source,
    })?;
    KinematicTree::from_spec(spec).map_err(|err| LoadError::Robot {
        path: path.display().to_string(),
        reason: err.to_string(),
    })
}

/// All `.json` files under `dir`, recursively, sorted by path.
pub fn find_motion_files(dir: impl AsRef<Path>) -> Result<Vec<PathBuf>, LoadError> {
    let mut files = Vec::new();
    collect_json(dir.as_ref(), &mut files)?;
    files.sort();
    Ok(files)
}

fn collect_json(dir: &Path, out: &mut Vec<PathBuf>) -> Result<(), LoadError> {
    let io_err = |source| LoadError::Io {
        path: dir.display().to_string(),
        source,
    };
    for entry in fs::read_dir(dir).map_err(io_err)? {
        let path = entry.map_err(io_err)?.path();
        if path.is_dir() {
            collect_json(&path, out)?;
        } else if path.extension().is_some_and(|ext| ext == "json") {
            out.push(path);
        }
    }
    Ok(())
}

/// Motion files under a directory, parsed one at a time as the iterator advances.
#[derive(Debug)]
pub struct MotionFiles {
    files: std::vec::IntoIter<PathBuf>,
}

impl Iterator for MotionFiles {
    type Item = (PathBuf, Result<MotionBuffer, LoadError>);

    fn next(&mut self) -> Option<Self::Item> {
        let file = self.files.next()?;
        let loaded = load_motion_file(&file);
        Some((file, loaded))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.files.size_hint()
    }
}

impl ExactSizeIterator for MotionFiles {}

/// Candidates from [`find_motion_files`], capped at `max_files`. Nothing is
/// parsed until the iterator is advanced.
pub fn motion_files(
    dir: impl AsRef<Path>,
    max_files: Option<usize>,
) -> Result<MotionFiles, LoadError> {
    let mut files = find_motion_files(dir)?;
    if let Some(max) = max_files {
        files.truncate(max);
    }
    Ok(MotionFiles {
        files: files.into_iter(),
    })
}

fn log_loaded(motion: &MotionBuffer) {
    log::info!(
        "loaded {} ({} frames, {:.2}s, {} DoF)",
        motion.label(),
        motion.frame_count(),
        motion.duration(),
        motion.dof()
    );
}

/// The first loadable motion among the first `max_files` candidates under `dir`.
/// Later candidates are not read.
pub fn first_motion_in_dir(
    dir: impl AsRef<Path>,
    max_files: usize,
) -> Result<Option<MotionBuffer>, LoadError> {
    for (file, loaded) in motion_files(dir, Some(max_files))? {
        match loaded {
            Ok(motion) => {
                log_loaded(&motion);
                return Ok(Some(motion));
            }
            Err(err) => log::warn!("skipping {}: {err}", file.display()),
        }
    }
    Ok(None)
}

/// Load every motion among the first `max_files` candidates under `dir`.
/// Files that fail to load are logged and skipped.
pub fn load_motions_from_dir(
    dir: impl AsRef<Path>,
    max_files: Option<usize>,
) -> Result<Vec<MotionBuffer>, LoadError> {
    let files = motion_files(dir, max_files)?;
    let mut motions = Vec::with_capacity(files.len());
    for (file, loaded) in files {
        match loaded {
            Ok(motion) => {
                log_loaded(&motion);
                motions.push(motion);
            }
            Err(err) => log::warn!("skipping {}: {err}", file.display()),
        }
    }
    Ok(motions)
}
