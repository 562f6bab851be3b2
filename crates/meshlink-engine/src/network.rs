//! Runtime 1D model: branches and the calculation points discretizing them.

use std::collections::HashMap;

use geo::{Coord, LineString};
use serde::{Deserialize, Serialize};

use crate::reconstruct;

/// A named 1D path through the network.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Branch {
    /// Unique branch name, as referenced by the mesh file.
    pub name: String,
    /// Geometry in world coordinates.
    pub geometry: LineString<f64>,
    /// Hydraulic length. Equal to the geometric length unless
    /// `is_length_custom` is set.
    pub length: f64,
    /// Whether `length` was overridden independently of the geometry.
    pub is_length_custom: bool,
}

impl Branch {
    /// Create a branch whose hydraulic length follows its geometry.
    #[must_use]
    pub fn new(name: impl Into<String>, geometry: LineString<f64>) -> Self {
        let length = reconstruct::line_string_length(&geometry);
        Self {
            name: name.into(),
            geometry,
            length,
            is_length_custom: false,
        }
    }

    /// Override the hydraulic length.
    #[must_use]
    pub fn with_custom_length(mut self, length: f64) -> Self {
        self.length = length;
        self.is_length_custom = true;
        self
    }

    /// Euclidean arc length of the geometry.
    #[must_use]
    pub fn geometric_length(&self) -> f64 {
        reconstruct::line_string_length(&self.geometry)
    }
}

/// The branch collection of a network.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Network {
    /// All branches, in model order.
    pub branches: Vec<Branch>,
}

impl Network {
    /// Create a network from its branches.
    #[must_use]
    pub const fn new(branches: Vec<Branch>) -> Self {
        Self { branches }
    }

    /// First branch with the given name.
    #[must_use]
    pub fn branch_by_name(&self, name: &str) -> Option<&Branch> {
        self.branches.iter().find(|b| b.name == name)
    }

    /// Name to branch lookup table.
    ///
    /// If two branches share a name the first one wins.
    #[must_use]
    pub fn branch_lookup(&self) -> HashMap<&str, &Branch> {
        let mut lookup = HashMap::with_capacity(self.branches.len());
        for branch in &self.branches {
            lookup.entry(branch.name.as_str()).or_insert(branch);
        }
        lookup
    }
}

/// A location along a branch where hydraulic unknowns are computed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalculationPoint {
    /// Node name, used in diagnostics.
    pub name: String,
    /// Index of the owning branch in [`Network::branches`].
    pub branch: usize,
    /// Distance along the branch, in hydraulic length units.
    pub chainage: f64,
    /// World coordinate.
    pub coordinate: Coord<f64>,
    /// Index of the node in the file this point was read from, if any.
    #[serde(default)]
    pub file_index: Option<usize>,
}

impl CalculationPoint {
    /// Place a point on `branch` at `chainage`, deriving its coordinate
    /// from the branch geometry.
    ///
    /// Returns `None` when the branch has no usable geometry.
    #[must_use]
    pub fn on_branch(
        name: impl Into<String>,
        branch_index: usize,
        branch: &Branch,
        chainage: f64,
    ) -> Option<Self> {
        let coordinate = reconstruct::branch_coordinate(branch, chainage)?;
        Some(Self {
            name: name.into(),
            branch: branch_index,
            chainage,
            coordinate,
            file_index: None,
        })
    }
}

/// Ordered calculation points of a 1D network.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Discretization {
    /// All points, in runtime numbering.
    pub points: Vec<CalculationPoint>,
}

impl Discretization {
    /// Create a discretization from its points.
    #[must_use]
    pub const fn new(points: Vec<CalculationPoint>) -> Self {
        Self { points }
    }

    /// Number of calculation points.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.points.len()
    }

    /// Returns `true` if there are no calculation points.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Coordinate of the point at a runtime index.
    #[must_use]
    pub fn coordinate(&self, index: usize) -> Option<Coord<f64>> {
        self.points.get(index).map(|p| p.coordinate)
    }
}
