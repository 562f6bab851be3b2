//! JSON link bundles: everything one import needs, in one document.

use std::path::Path;

use meshlink_engine::{
    Discretization, FileLinks, FileMesh1d, FileMesh2d, LinkImport, Network, UnstructuredGrid,
};
use serde::{Deserialize, Serialize};

/// File-domain arrays plus the runtime model they are read into.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkBundle {
    /// The file's link records.
    pub links: FileLinks,
    /// The file's 1D mesh arrays.
    #[serde(default)]
    pub mesh1d: Option<FileMesh1d>,
    /// The file's 2D mesh arrays.
    #[serde(default)]
    pub mesh2d: Option<FileMesh2d>,
    /// Runtime calculation points.
    pub discretization: Discretization,
    /// Runtime 2D grid.
    pub grid: UnstructuredGrid,
    /// Runtime network.
    #[serde(default)]
    pub network: Option<Network>,
}

impl LinkBundle {
    /// Load a bundle from a JSON file.
    pub fn load(path: &Path) -> Result<Self, String> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| format!("Error reading {}: {e}", path.display()))?;
        serde_json::from_str(&text).map_err(|e| format!("Error parsing {}: {e}", path.display()))
    }

    /// Borrow the bundle as an engine import.
    pub fn import(&self) -> LinkImport<'_> {
        LinkImport {
            links: &self.links,
            mesh1d: self.mesh1d.as_ref(),
            mesh2d: self.mesh2d.as_ref(),
            discretization: Some(&self.discretization),
            grid: Some(&self.grid),
            network: self.network.as_ref(),
        }
    }
}
