//! meshlink-engine: 1D-2D link resolution for hydraulic models (sans-IO).
//!
//! A mesh file stores each 1D-2D link as a pair of file-local indices: a
//! node of the 1D mesh and a face of the 2D mesh. The runtime model may
//! number its calculation points and cells differently, so each index is
//! re-resolved spatially:
//!
//! 1. derive a world coordinate for the file-local node or face, from the
//!    file's own coordinates when they are trustworthy, else from branch
//!    and chainage (1D) or the face centroid (2D);
//! 2. query a spatial index of the runtime objects around it;
//! 3. take the nearest runtime object, or keep the file index when
//!    nothing is found.
//!
//! Links are resolved in parallel and appended in file order. After
//! assembly every link whose 1D node shares its location with other
//! nodes is reported.
//!
//! This crate has **no I/O dependencies**. Reading the mesh container,
//! and anything the caller does with the links afterwards, lives
//! outside it.

pub mod assemble;
pub mod diagnostics;
pub mod file;
pub mod grid;
pub mod network;
pub mod parallel;
pub mod reconstruct;
pub mod resolve;
pub mod search;
pub mod sink;
pub mod spatial;
pub mod types;
pub mod validate;

pub use assemble::LinkImport;
pub use diagnostics::{Clock, NullClock, ReadDiagnostics, ReadSummary};
pub use file::{FileLinks, FileMesh1d, FileMesh2d};
pub use grid::{Cell, UnstructuredGrid};
pub use network::{Branch, CalculationPoint, Discretization, Network};
pub use sink::{Diagnostic, DiagnosticKind, DiagnosticSink, Severity, TracingSink};
pub use spatial::{QuadTree, RTreeIndex, SpatialIndex, SpatialIndexKind};
pub use types::{
    ClearNotSupported, CoordinateSource, Endpoint, Link, LinkCollection, LinkError, LinkType,
    ResolveConfig, ResolveError,
};

/// Read the 1D-2D links of `import` into `output`.
///
/// `output` is cleared, then receives one [`Link`] per file record, in
/// file order. Links whose endpoints cannot be located keep their
/// file-local indices. Everything worth telling the operator goes to
/// `sink`: unknown link types, unresolved endpoints, per-link faults,
/// and 1D nodes used at a shared location.
///
/// # Errors
///
/// Returns [`LinkError::MissingCollaborator`] if the discretization or
/// grid is missing, [`LinkError::MalformedInput`] if the link arrays
/// differ in length, [`LinkError::ThreadPool`] if the workers cannot be
/// started, and [`LinkError::ClearNotSupported`] if `output` cannot be
/// cleared. The error is reported to `sink` as well, and `output` is
/// left as it was.
pub fn read_links(
    import: &LinkImport<'_>,
    config: &ResolveConfig,
    output: &mut dyn LinkCollection,
    sink: &mut dyn DiagnosticSink,
) -> Result<ReadSummary, LinkError> {
    read_links_with_diagnostics(import, config, output, sink, &NullClock).map(|d| d.summary)
}

/// Like [`read_links`], also timing each stage with `clock`.
///
/// # Errors
///
/// See [`read_links`].
pub fn read_links_with_diagnostics<C: Clock>(
    import: &LinkImport<'_>,
    config: &ResolveConfig,
    output: &mut dyn LinkCollection,
    sink: &mut dyn DiagnosticSink,
    clock: &C,
) -> Result<ReadDiagnostics, LinkError> {
    assemble::run(import, config, output, sink, clock)
}
