//! Shared types for the meshlink link resolution engine.

use std::fmt;

use geo::{Coord, Line};
use serde::{Deserialize, Serialize};

use crate::spatial::SpatialIndexKind;

/// Which side of a link an index or coordinate belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Endpoint {
    /// The 1D calculation point the link starts from.
    Mesh1d,
    /// The 2D cell the link ends in.
    Mesh2d,
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Mesh1d => f.write_str("1D"),
            Self::Mesh2d => f.write_str("2D"),
        }
    }
}

/// Where the coordinate used to resolve an endpoint came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CoordinateSource {
    /// The file's own node/face coordinate arrays.
    FileCoordinates,
    /// Arc-length projection of the file's branch id and chainage.
    BranchChainage,
    /// Vertex mean of the file's face-node block.
    FaceCentroid,
    /// No coordinate could be derived; the file-local index was kept.
    Unresolved,
}

impl CoordinateSource {
    /// All variants, in reporting order.
    pub const ALL: [Self; 4] = [
        Self::FileCoordinates,
        Self::BranchChainage,
        Self::FaceCentroid,
        Self::Unresolved,
    ];
}

impl fmt::Display for CoordinateSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::FileCoordinates => "file coordinates",
            Self::BranchChainage => "branch/chainage",
            Self::FaceCentroid => "face centroid",
            Self::Unresolved => "unresolved",
        };
        f.write_str(name)
    }
}

/// Kind of 1D-2D connection, with the codes used by the mesh file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum LinkType {
    /// 1D channel embedded in the 2D domain.
    #[default]
    Embedded,
    /// Lateral overflow from a channel to the floodplain.
    Lateral,
    /// Longitudinal connection along a channel.
    Longitudinal,
    /// Street inlet into a sewer manhole.
    StreetInlet,
    /// Roof drainage into a sewer.
    RoofSewer,
    /// Gully into a sewer.
    GullySewer,
}

impl LinkType {
    /// Map a persisted type code to a link type.
    #[must_use]
    pub const fn from_code(code: i32) -> Option<Self> {
        match code {
            3 => Some(Self::Embedded),
            4 => Some(Self::Lateral),
            5 => Some(Self::Longitudinal),
            6 => Some(Self::StreetInlet),
            7 => Some(Self::RoofSewer),
            8 => Some(Self::GullySewer),
            _ => None,
        }
    }

    /// The persisted type code.
    #[must_use]
    pub const fn code(self) -> i32 {
        match self {
            Self::Embedded => 3,
            Self::Lateral => 4,
            Self::Longitudinal => 5,
            Self::StreetInlet => 6,
            Self::RoofSewer => 7,
            Self::GullySewer => 8,
        }
    }
}

/// A resolved 1D-2D link in runtime numbering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Link {
    /// Stable, caller-visible link identifier.
    pub id: String,
    /// Human-readable name.
    pub long_name: String,
    /// Connection kind.
    pub link_type: LinkType,
    /// Runtime index of the 1D calculation point.
    pub calculation_point_index: usize,
    /// Runtime index of the 2D cell.
    pub cell_index: usize,
    /// Straight line from the 1D point to the 2D cell centre, when both
    /// ends have a known location.
    pub geometry: Option<Line<f64>>,
    /// Position of the originating record in the file.
    pub file_position: usize,
    /// How the 1D endpoint was located.
    pub source_1d: CoordinateSource,
    /// How the 2D endpoint was located.
    pub source_2d: CoordinateSource,
}

/// The output collection a link import writes into.
///
/// The collection is cleared once before any link is pushed. A
/// collection that refuses to be cleared aborts the import untouched.
pub trait LinkCollection {
    /// Remove every link.
    ///
    /// # Errors
    ///
    /// Returns [`ClearNotSupported`] when the collection is read-only or
    /// otherwise cannot drop its contents.
    fn clear_links(&mut self) -> Result<(), ClearNotSupported>;

    /// Append one link.
    fn push_link(&mut self, link: Link);
}

impl LinkCollection for Vec<Link> {
    fn clear_links(&mut self) -> Result<(), ClearNotSupported> {
        self.clear();
        Ok(())
    }

    fn push_link(&mut self, link: Link) {
        self.push(link);
    }
}

/// Configuration for link resolution.
///
/// All parameters have defaults tuned for river and sewer models in
/// metre-based projected coordinate systems.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolveConfig {
    /// Which spatial index backend to build.
    pub spatial_index: SpatialIndexKind,

    /// Amount the 1D envelope is grown on every side, so points lying
    /// exactly on the boundary still fall inside the index.
    pub envelope_margin_1d: f64,

    /// Half width of the query rectangle around a 1D coordinate.
    pub query_half_width_1d: f64,

    /// Half width of the query rectangle around a 2D coordinate.
    pub query_half_width_2d: f64,

    /// Scale applied to `log2(object count)` to pick the quadtree depth.
    pub depth_scale: f64,

    /// Number of worker threads for resolution. Zero uses one per core.
    pub max_parallelism: usize,

    /// Face-node sentinel written by the platform library.
    pub library_fill_value: i32,

    /// Face-node sentinel written by partner tools (netCDF's default
    /// integer fill).
    pub partner_fill_value: i32,
}

impl ResolveConfig {
    /// Default spatial index backend.
    pub const DEFAULT_SPATIAL_INDEX: SpatialIndexKind = SpatialIndexKind::QuadTree;
    /// Default 1D envelope margin.
    pub const DEFAULT_ENVELOPE_MARGIN_1D: f64 = 10.0;
    /// Default 1D query half width.
    pub const DEFAULT_QUERY_HALF_WIDTH_1D: f64 = 25.0;
    /// Default 2D query half width.
    pub const DEFAULT_QUERY_HALF_WIDTH_2D: f64 = 50.0;
    /// Default quadtree depth scale.
    pub const DEFAULT_DEPTH_SCALE: f64 = 0.4;
    /// Default worker count (all cores).
    pub const DEFAULT_MAX_PARALLELISM: usize = 0;
    /// Default platform fill value.
    pub const DEFAULT_LIBRARY_FILL_VALUE: i32 = -999;
    /// Default partner-tool fill value.
    pub const DEFAULT_PARTNER_FILL_VALUE: i32 = -2_147_483_647;
    /// Deepest quadtree allowed, whatever the depth scale.
    pub const MAX_SUBDIVISION_DEPTH: usize = 16;

    /// Quadtree depth for an index holding `count` objects.
    ///
    /// `max(1, floor(log2(count) * depth_scale))`, capped at
    /// [`Self::MAX_SUBDIVISION_DEPTH`].
    #[must_use]
    pub fn subdivision_depth(&self, count: usize) -> usize {
        if count < 2 {
            return 1;
        }
        #[allow(clippy::cast_precision_loss)]
        let scaled = (count as f64).log2() * self.depth_scale;
        if scaled.is_nan() || scaled < 1.0 {
            return 1;
        }
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let depth = scaled.floor() as usize;
        depth.clamp(1, Self::MAX_SUBDIVISION_DEPTH)
    }
}

impl Default for ResolveConfig {
    fn default() -> Self {
        Self {
            spatial_index: Self::DEFAULT_SPATIAL_INDEX,
            envelope_margin_1d: Self::DEFAULT_ENVELOPE_MARGIN_1D,
            query_half_width_1d: Self::DEFAULT_QUERY_HALF_WIDTH_1D,
            query_half_width_2d: Self::DEFAULT_QUERY_HALF_WIDTH_2D,
            depth_scale: Self::DEFAULT_DEPTH_SCALE,
            max_parallelism: Self::DEFAULT_MAX_PARALLELISM,
            library_fill_value: Self::DEFAULT_LIBRARY_FILL_VALUE,
            partner_fill_value: Self::DEFAULT_PARTNER_FILL_VALUE,
        }
    }
}

/// The output collection rejected being cleared.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("output link collection cannot be cleared: {reason}")]
pub struct ClearNotSupported {
    /// Why the collection refused.
    pub reason: String,
}

/// Errors that abort a link import.
///
/// These are contract violations by the caller rather than problems
/// with individual links.
#[derive(Debug, thiserror::Error)]
pub enum LinkError {
    /// A collaborator the import cannot run without was not supplied.
    #[error("required collaborator is missing: {0}")]
    MissingCollaborator(&'static str),

    /// The file-domain arrays are inconsistent with each other.
    #[error("malformed link input: {0}")]
    MalformedInput(String),

    /// The output collection could not be cleared.
    #[error(transparent)]
    ClearNotSupported(#[from] ClearNotSupported),

    /// The bounded worker pool could not be created.
    #[error("failed to build resolution worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

/// Per-link faults raised while resolving an endpoint.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ResolveError {
    /// A reconstructed coordinate overflowed or became NaN.
    #[error("non-finite {endpoint} coordinate ({x}, {y}) derived for file index {file_index}")]
    NonFiniteCoordinate {
        /// The endpoint being resolved.
        endpoint: Endpoint,
        /// File-local index of the node or face.
        file_index: usize,
        /// Derived x value.
        x: f64,
        /// Derived y value.
        y: f64,
    },
}

impl ResolveError {
    /// Build a fault for a non-finite coordinate.
    #[must_use]
    pub const fn non_finite(endpoint: Endpoint, file_index: usize, coord: Coord<f64>) -> Self {
        Self::NonFiniteCoordinate {
            endpoint,
            file_index,
            x: coord.x,
            y: coord.y,
        }
    }

    /// The endpoint that faulted.
    #[must_use]
    pub const fn endpoint(&self) -> Endpoint {
        match self {
            Self::NonFiniteCoordinate { endpoint, .. } => *endpoint,
        }
    }
}
