//! Search contexts: one spatial index per mesh kind, plus everything the
//! resolver needs to derive a coordinate for a file-local index.
//!
//! A context is built once per import and never mutated afterwards, so
//! every resolution task can share it by reference. Footprints are
//! computed in parallel; the index itself is fully built before
//! [`Mesh1dSearchContext::build`] or [`Mesh2dSearchContext::build`]
//! returns, so no query can observe a partially built index.

use std::collections::HashMap;

use geo::{Coord, Rect};
use rayon::prelude::*;

use crate::file::{FileMesh1d, FileMesh2d};
use crate::grid::UnstructuredGrid;
use crate::network::{Branch, Discretization, Network};
use crate::reconstruct;
use crate::spatial::SpatialIndex;
use crate::types::ResolveConfig;

/// Grow a rectangle by `margin` on every side.
#[must_use]
pub fn expand_rect(rect: Rect<f64>, margin: f64) -> Rect<f64> {
    Rect::new(
        Coord {
            x: rect.min().x - margin,
            y: rect.min().y - margin,
        },
        Coord {
            x: rect.max().x + margin,
            y: rect.max().y + margin,
        },
    )
}

/// Square query rectangle centred on `center`.
#[must_use]
pub fn query_rect(center: Coord<f64>, half_width: f64) -> Rect<f64> {
    expand_rect(Rect::new(center, center), half_width)
}

/// Build an index over `items`, or `None` when there is nothing to index.
fn build_index(
    items: Vec<(usize, Rect<f64>)>,
    margin: f64,
    config: &ResolveConfig,
) -> Option<Box<dyn SpatialIndex>> {
    let envelope = reconstruct::bounding_rect(
        items
            .iter()
            .flat_map(|(_, bbox)| [bbox.min(), bbox.max()]),
    )?;
    let envelope = expand_rect(envelope, margin);
    let depth = config.subdivision_depth(items.len());
    Some(config.spatial_index.build(envelope, depth, items))
}

fn is_finite(c: Coord<f64>) -> bool {
    c.x.is_finite() && c.y.is_finite()
}

/// Everything needed to resolve file-local 1D node indices.
pub struct Mesh1dSearchContext<'a> {
    index: Option<Box<dyn SpatialIndex>>,
    trustworthy: bool,
    mesh: Option<&'a FileMesh1d>,
    discretization: &'a Discretization,
    branches: HashMap<&'a str, &'a Branch>,
}

impl<'a> Mesh1dSearchContext<'a> {
    /// Index the calculation points of `discretization`.
    ///
    /// `mesh` supplies the file's node arrays; without it every node is
    /// unresolvable and keeps its file index. `network` supplies the
    /// branch lookup for the chainage fallback.
    #[must_use]
    pub fn build(
        mesh: Option<&'a FileMesh1d>,
        discretization: &'a Discretization,
        network: Option<&'a Network>,
        config: &ResolveConfig,
    ) -> Self {
        let items: Vec<(usize, Rect<f64>)> = discretization
            .points
            .par_iter()
            .enumerate()
            .filter(|(_, p)| is_finite(p.coordinate))
            .map(|(i, p)| (i, Rect::new(p.coordinate, p.coordinate)))
            .collect();
        let index = build_index(items, config.envelope_margin_1d, config);
        let trustworthy = mesh.is_some_and(FileMesh1d::has_trustworthy_coordinates);
        let branches = network.map(Network::branch_lookup).unwrap_or_default();

        tracing::debug!(
            points = discretization.len(),
            indexed = index.as_ref().map_or(0, |i| i.len()),
            trustworthy,
            branches = branches.len(),
            "built 1D search context",
        );

        Self {
            index,
            trustworthy,
            mesh,
            discretization,
            branches,
        }
    }

    /// Whether the file's node coordinates are used directly.
    #[must_use]
    pub const fn is_trustworthy(&self) -> bool {
        self.trustworthy
    }

    /// Number of indexed calculation points.
    #[must_use]
    pub fn indexed_count(&self) -> usize {
        self.index.as_ref().map_or(0, |i| i.len())
    }

    /// The spatial index, if any point could be indexed.
    #[must_use]
    pub fn index(&self) -> Option<&dyn SpatialIndex> {
        self.index.as_deref()
    }

    /// The file's 1D mesh arrays.
    #[must_use]
    pub const fn mesh(&self) -> Option<&'a FileMesh1d> {
        self.mesh
    }

    /// The runtime discretization being matched against.
    #[must_use]
    pub const fn discretization(&self) -> &'a Discretization {
        self.discretization
    }

    /// Runtime branches by name.
    #[must_use]
    pub const fn branches(&self) -> &HashMap<&'a str, &'a Branch> {
        &self.branches
    }
}

/// Everything needed to resolve file-local 2D face indices.
pub struct Mesh2dSearchContext<'a> {
    index: Option<Box<dyn SpatialIndex>>,
    trustworthy: bool,
    mesh: Option<&'a FileMesh2d>,
    grid: &'a UnstructuredGrid,
    fill_values: Vec<i32>,
}

impl<'a> Mesh2dSearchContext<'a> {
    /// Index the cell footprints of `grid`.
    ///
    /// `mesh` supplies the file's face arrays; without it every face is
    /// unresolvable and keeps its file index.
    #[must_use]
    pub fn build(
        mesh: Option<&'a FileMesh2d>,
        grid: &'a UnstructuredGrid,
        config: &ResolveConfig,
    ) -> Self {
        let items: Vec<(usize, Rect<f64>)> = (0..grid.len())
            .into_par_iter()
            .filter_map(|i| {
                let bbox = grid.cell_bounding_rect(i)?;
                (is_finite(bbox.min()) && is_finite(bbox.max())).then_some((i, bbox))
            })
            .collect();
        let index = build_index(items, 0.0, config);
        let trustworthy = mesh.is_some_and(FileMesh2d::has_trustworthy_coordinates);

        let mut fill_values = vec![config.library_fill_value, config.partner_fill_value];
        if let Some(declared) = mesh.and_then(|m| m.fill_value)
            && !fill_values.contains(&declared)
        {
            fill_values.push(declared);
        }

        tracing::debug!(
            cells = grid.len(),
            indexed = index.as_ref().map_or(0, |i| i.len()),
            trustworthy,
            "built 2D search context",
        );

        Self {
            index,
            trustworthy,
            mesh,
            grid,
            fill_values,
        }
    }

    /// Whether the file's face coordinates are used directly.
    #[must_use]
    pub const fn is_trustworthy(&self) -> bool {
        self.trustworthy
    }

    /// Number of indexed cells.
    #[must_use]
    pub fn indexed_count(&self) -> usize {
        self.index.as_ref().map_or(0, |i| i.len())
    }

    /// The spatial index, if any cell could be indexed.
    #[must_use]
    pub fn index(&self) -> Option<&dyn SpatialIndex> {
        self.index.as_deref()
    }

    /// The file's 2D mesh arrays.
    #[must_use]
    pub const fn mesh(&self) -> Option<&'a FileMesh2d> {
        self.mesh
    }

    /// The runtime grid being matched against.
    #[must_use]
    pub const fn grid(&self) -> &'a UnstructuredGrid {
        self.grid
    }

    /// Face-node values treated as empty slots.
    #[must_use]
    pub fn fill_values(&self) -> &[i32] {
        &self.fill_values
    }
}
