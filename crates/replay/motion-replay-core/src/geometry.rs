//! Geometry association: which visual geometry belongs to which link.
//!
//! The core never loads mesh files. A [`MeshProvider`] answers "what should be
//! drawn for this link?" and a missing answer simply means the link is not drawn.

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};

use crate::error::ReplayError;
use crate::ids::LinkId;
use crate::transform::RigidTransform;
use crate::tree::KinematicTree;

/// Reference to externally loaded geometry.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GeometryRef {
    /// Mesh location understood by the scene sink (path or URI).
    pub uri: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<[u8; 4]>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale: Option<[f64; 3]>,
    /// Placement of the mesh in the link frame.
    #[serde(default)]
    pub origin: RigidTransform,
}

impl GeometryRef {
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            color: None,
            scale: None,
            origin: RigidTransform::IDENTITY,
        }
    }

    pub fn with_color(mut self, color: [u8; 4]) -> Self {
        self.color = Some(color);
        self
    }
}

/// Resolves links to geometry. Adapters implement this and pass it to the
/// pipeline.
pub trait MeshProvider {
    fn resolve(&self, link: LinkId) -> Option<GeometryRef>;
}

/// Provider with no geometry at all; every link is skipped.
#[derive(Copy, Clone, Debug, Default)]
pub struct NoGeometry;

impl MeshProvider for NoGeometry {
    fn resolve(&self, _link: LinkId) -> Option<GeometryRef> {
        None
    }
}

/// Immutable link → geometry table validated against a tree.
#[derive(Clone, Debug, Default)]
pub struct MeshTable {
    entries: HashMap<LinkId, GeometryRef>,
}

impl MeshTable {
    /// Build from `(link name, geometry)` pairs. Names unknown to `tree` are an
    /// error; a later entry for the same link replaces an earlier one.
    pub fn new<I, S>(tree: &KinematicTree, entries: I) -> Result<Self, ReplayError>
    where
        I: IntoIterator<Item = (S, GeometryRef)>,
        S: AsRef<str>,
    {
        let mut table = HashMap::new();
        for (name, geometry) in entries {
            let name = name.as_ref();
            let id = tree
                .link_id(name)
                .ok_or_else(|| ReplayError::UnknownGeometryLink {
                    link: name.to_string(),
                })?;
            table.insert(id, geometry);
        }
        Ok(Self { entries: table })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, link: LinkId) -> Option<&GeometryRef> {
        self.entries.get(&link)
    }
}

impl MeshProvider for MeshTable {
    fn resolve(&self, link: LinkId) -> Option<GeometryRef> {
        self.entries.get(&link).cloned()
    }
}

impl<P: MeshProvider + ?Sized> MeshProvider for &P {
    fn resolve(&self, link: LinkId) -> Option<GeometryRef> {
        (**self).resolve(link)
    }
}
