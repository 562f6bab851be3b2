//! Endpoint resolution: map a file-local index to a runtime index.
//!
//! Both endpoint kinds follow the same steps:
//!
//! 1. Pick a world coordinate for the file-local index, decided once as
//!    an [`EndpointLocation`]: the file's own coordinates when they are
//!    trustworthy, else the kind-specific fallback (branch and chainage
//!    for 1D, face centroid for 2D).
//! 2. If no coordinate can be derived, keep the file-local index.
//! 3. Query the spatial index around the coordinate and pick the
//!    candidate whose own coordinate is nearest. Without candidates the
//!    file-local index is kept.
//!
//! Resolvers only read their search context and may run concurrently.

use geo::Coord;

use crate::reconstruct;
use crate::search::{self, Mesh1dSearchContext, Mesh2dSearchContext};
use crate::spatial::SpatialIndex;
use crate::types::{CoordinateSource, Endpoint, ResolveError};

/// Where an endpoint's world coordinate came from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EndpointLocation {
    /// Read from trustworthy file coordinate arrays.
    Trusted(Coord<f64>),
    /// Projected along a runtime branch by chainage.
    BranchChainage(Coord<f64>),
    /// Vertex mean of the file's face-node block.
    Centroid(Coord<f64>),
    /// Nothing usable.
    Unresolved,
}

impl EndpointLocation {
    /// The located coordinate, if any.
    #[must_use]
    pub const fn coordinate(self) -> Option<Coord<f64>> {
        match self {
            Self::Trusted(c) | Self::BranchChainage(c) | Self::Centroid(c) => Some(c),
            Self::Unresolved => None,
        }
    }

    /// Reporting tag for the location.
    #[must_use]
    pub const fn source(self) -> CoordinateSource {
        match self {
            Self::Trusted(_) => CoordinateSource::FileCoordinates,
            Self::BranchChainage(_) => CoordinateSource::BranchChainage,
            Self::Centroid(_) => CoordinateSource::FaceCentroid,
            Self::Unresolved => CoordinateSource::Unresolved,
        }
    }
}

/// Outcome of resolving one endpoint.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Resolved {
    /// Runtime index, or the file-local index when nothing matched.
    pub index: usize,
    /// The coordinate the search ran around, if one was derived.
    pub coordinate: Option<Coord<f64>>,
    /// How `index` was determined. [`CoordinateSource::Unresolved`]
    /// whenever the file-local index was kept, even if a coordinate was
    /// derived.
    pub source: CoordinateSource,
}

impl Resolved {
    /// The file-local index, kept because nothing better was found.
    #[must_use]
    pub const fn kept(file_index: usize, coordinate: Option<Coord<f64>>) -> Self {
        Self {
            index: file_index,
            coordinate,
            source: CoordinateSource::Unresolved,
        }
    }

    /// Whether the file-local index was kept unchanged.
    #[must_use]
    pub fn is_unresolved(&self) -> bool {
        self.source == CoordinateSource::Unresolved
    }
}

/// Locate a file-local 1D node.
#[must_use]
pub fn locate_mesh1d(ctx: &Mesh1dSearchContext<'_>, node: usize) -> EndpointLocation {
    let Some(mesh) = ctx.mesh() else {
        return EndpointLocation::Unresolved;
    };
    if ctx.is_trustworthy()
        && let Some(c) = mesh.node_coordinate(node)
    {
        return EndpointLocation::Trusted(c);
    }
    reconstruct::calculation_point_coordinate(mesh, node, ctx.branches())
        .map_or(EndpointLocation::Unresolved, EndpointLocation::BranchChainage)
}

/// Locate a file-local 2D face.
#[must_use]
pub fn locate_mesh2d(ctx: &Mesh2dSearchContext<'_>, face: usize) -> EndpointLocation {
    let Some(mesh) = ctx.mesh() else {
        return EndpointLocation::Unresolved;
    };
    if ctx.is_trustworthy()
        && let Some(c) = mesh.face_coordinate(face)
    {
        return EndpointLocation::Trusted(c);
    }
    reconstruct::face_centroid(mesh, face, ctx.fill_values())
        .map_or(EndpointLocation::Unresolved, EndpointLocation::Centroid)
}

/// Resolve a file-local 1D node index to a runtime calculation point.
///
/// # Errors
///
/// Returns [`ResolveError::NonFiniteCoordinate`] when the derived
/// coordinate is NaN or infinite.
pub fn resolve_mesh1d(
    ctx: &Mesh1dSearchContext<'_>,
    node: usize,
    half_width: f64,
) -> Result<Resolved, ResolveError> {
    let location = locate_mesh1d(ctx, node);
    let discretization = ctx.discretization();
    resolve_location(
        Endpoint::Mesh1d,
        node,
        location,
        ctx.index(),
        half_width,
        |i| discretization.coordinate(i),
    )
}

/// Resolve a file-local 2D face index to a runtime cell.
///
/// # Errors
///
/// Returns [`ResolveError::NonFiniteCoordinate`] when the derived
/// coordinate is NaN or infinite.
pub fn resolve_mesh2d(
    ctx: &Mesh2dSearchContext<'_>,
    face: usize,
    half_width: f64,
) -> Result<Resolved, ResolveError> {
    let location = locate_mesh2d(ctx, face);
    let grid = ctx.grid();
    resolve_location(
        Endpoint::Mesh2d,
        face,
        location,
        ctx.index(),
        half_width,
        |i| grid.centroid(i),
    )
}

fn resolve_location(
    endpoint: Endpoint,
    file_index: usize,
    location: EndpointLocation,
    index: Option<&dyn SpatialIndex>,
    half_width: f64,
    candidate_coordinate: impl Fn(usize) -> Option<Coord<f64>>,
) -> Result<Resolved, ResolveError> {
    let Some(target) = location.coordinate() else {
        return Ok(Resolved::kept(file_index, None));
    };
    if !(target.x.is_finite() && target.y.is_finite()) {
        return Err(ResolveError::non_finite(endpoint, file_index, target));
    }
    let Some(index) = index else {
        return Ok(Resolved::kept(file_index, Some(target)));
    };

    let candidates = index.query(&search::query_rect(target, half_width));
    match nearest(candidates, target, candidate_coordinate) {
        Some(runtime) => Ok(Resolved {
            index: runtime,
            coordinate: Some(target),
            source: location.source(),
        }),
        None => Ok(Resolved::kept(file_index, Some(target))),
    }
}

/// Candidate whose coordinate is nearest to `target`.
///
/// Candidates are scanned in ascending index order so equal distances
/// resolve to the lowest index whatever backend produced them. An exact
/// coordinate match ends the scan.
fn nearest(
    mut candidates: Vec<usize>,
    target: Coord<f64>,
    coordinate: impl Fn(usize) -> Option<Coord<f64>>,
) -> Option<usize> {
    candidates.sort_unstable();
    candidates.dedup();

    let mut best: Option<(usize, f64)> = None;
    for id in candidates {
        let Some(c) = coordinate(id) else {
            continue;
        };
        if c == target {
            return Some(id);
        }
        let (dx, dy) = (c.x - target.x, c.y - target.y);
        let distance = dx.mul_add(dx, dy * dy);
        if best.is_none_or(|(_, d)| distance < d) {
            best = Some((id, distance));
        }
    }
    best.map(|(id, _)| id)
}
