//! Runtime 2D model: an unstructured grid of polygonal cells.

use geo::{Coord, Rect};
use serde::{Deserialize, Serialize};

use crate::reconstruct;

/// A polygonal grid cell.
#[derive(Debug, Clone, PartialEq)]
pub struct Cell {
    /// Indices into [`UnstructuredGrid::vertices`], in boundary order.
    pub vertex_indices: Vec<usize>,
    /// Vertex mean, cached at construction. `None` for a cell with no
    /// resolvable vertex.
    pub centroid: Option<Coord<f64>>,
}

impl Cell {
    /// Build a cell and cache its centroid from the grid vertices.
    ///
    /// Vertex indices outside `vertices` are kept but ignored for the
    /// centroid.
    #[must_use]
    pub fn from_vertices(vertex_indices: Vec<usize>, vertices: &[Coord<f64>]) -> Self {
        let centroid = reconstruct::mean_coordinate(
            vertex_indices
                .iter()
                .filter_map(|&i| vertices.get(i).copied()),
        );
        Self {
            vertex_indices,
            centroid,
        }
    }
}

/// Unstructured grid of polygonal cells.
///
/// Serialized as its raw vertex and face lists; centroids are rebuilt
/// on load.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "GridData", into = "GridData")]
pub struct UnstructuredGrid {
    /// Vertex coordinates.
    pub vertices: Vec<Coord<f64>>,
    /// Cells, in runtime numbering.
    pub cells: Vec<Cell>,
}

impl UnstructuredGrid {
    /// Build a grid from vertices and per-face vertex index lists.
    #[must_use]
    pub fn new(vertices: Vec<Coord<f64>>, faces: Vec<Vec<usize>>) -> Self {
        let cells = faces
            .into_iter()
            .map(|face| Cell::from_vertices(face, &vertices))
            .collect();
        Self { vertices, cells }
    }

    /// Number of cells.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.cells.len()
    }

    /// Returns `true` if the grid has no cells.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Cached centroid of the cell at a runtime index.
    #[must_use]
    pub fn centroid(&self, index: usize) -> Option<Coord<f64>> {
        self.cells.get(index).and_then(|c| c.centroid)
    }

    /// Axis-aligned footprint of a cell.
    #[must_use]
    pub fn cell_bounding_rect(&self, index: usize) -> Option<Rect<f64>> {
        let cell = self.cells.get(index)?;
        reconstruct::bounding_rect(
            cell.vertex_indices
                .iter()
                .filter_map(|&i| self.vertices.get(i).copied()),
        )
    }
}

/// Serde-compatible proxy for [`UnstructuredGrid`].
#[derive(Serialize, Deserialize)]
struct GridData {
    vertices: Vec<Coord<f64>>,
    faces: Vec<Vec<usize>>,
}

impl From<GridData> for UnstructuredGrid {
    fn from(data: GridData) -> Self {
        Self::new(data.vertices, data.faces)
    }
}

impl From<UnstructuredGrid> for GridData {
    fn from(grid: UnstructuredGrid) -> Self {
        Self {
            vertices: grid.vertices,
            faces: grid.cells.into_iter().map(|c| c.vertex_indices).collect(),
        }
    }
}
