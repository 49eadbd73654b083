//! Named robot and motion fixtures shared by the replay crates' tests and benches.
//!
//! Names map to files under the workspace `fixtures/` directory through
//! `fixtures/manifest.json`.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use once_cell::sync::Lazy;
use serde::de::DeserializeOwned;
use serde::Deserialize;

static MANIFEST: Lazy<Manifest> = Lazy::new(|| {
    serde_json::from_str(include_str!("../../../../fixtures/manifest.json"))
        .expect("fixtures manifest should parse")
});

#[derive(Debug, Deserialize)]
struct Manifest {
    robots: HashMap<String, String>,
    urdf: HashMap<String, String>,
    motions: HashMap<String, String>,
    #[serde(rename = "motion-dirs")]
    motion_dirs: HashMap<String, String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Robot,
    Urdf,
    Motion,
    MotionDir,
}

impl Kind {
    const ALL: [Kind; 4] = [Kind::Robot, Kind::Urdf, Kind::Motion, Kind::MotionDir];

    fn label(self) -> &'static str {
        match self {
            Kind::Robot => "robot",
            Kind::Urdf => "urdf",
            Kind::Motion => "motion",
            Kind::MotionDir => "motion dir",
        }
    }
}

impl Manifest {
    fn section(&self, kind: Kind) -> &HashMap<String, String> {
        match kind {
            Kind::Robot => &self.robots,
            Kind::Urdf => &self.urdf,
            Kind::Motion => &self.motions,
            Kind::MotionDir => &self.motion_dirs,
        }
    }
}

fn fixture_path(kind: Kind, name: &str) -> Result<PathBuf> {
    let rel = MANIFEST
        .section(kind)
        .get(name)
        .ok_or_else(|| anyhow!("unknown {} fixture '{name}'", kind.label()))?;
    Ok(Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("../../../fixtures")
        .join(rel))
}

fn parse_fixture<T: DeserializeOwned>(kind: Kind, name: &str) -> Result<T> {
    let path = fixture_path(kind, name)?;
    let text = fs::read_to_string(&path)
        .with_context(|| format!("failed to read fixture at {}", path.display()))?;
    serde_json::from_str(&text)
        .with_context(|| format!("failed to parse {} fixture '{name}'", kind.label()))
}

/// JSON tree descriptions.
pub mod robots {
    use super::*;

    pub fn load<T: DeserializeOwned>(name: &str) -> Result<T> {
        parse_fixture(Kind::Robot, name)
    }

    pub fn path(name: &str) -> Result<PathBuf> {
        fixture_path(Kind::Robot, name)
    }
}

/// URDF robot descriptions.
pub mod urdf {
    use super::*;

    pub fn path(name: &str) -> Result<PathBuf> {
        fixture_path(Kind::Urdf, name)
    }
}

/// Motion documents and directories of them.
pub mod motions {
    use super::*;

    pub fn path(name: &str) -> Result<PathBuf> {
        fixture_path(Kind::Motion, name)
    }

    pub fn dir(name: &str) -> Result<PathBuf> {
        fixture_path(Kind::MotionDir, name)
    }
}
