//! Link assembly: drive resolution for every file record and fill the
//! output collection in file order.

use geo::{Coord, Line};

use crate::diagnostics::{
    Clock, ReadDiagnostics, ReadSummary, StageDiagnostics, StageMetrics,
};
use crate::file::{FileLinks, FileMesh1d, FileMesh2d, LinkRecord};
use crate::grid::UnstructuredGrid;
use crate::network::{Discretization, Network};
use crate::parallel;
use crate::resolve::{self, Resolved};
use crate::search::{Mesh1dSearchContext, Mesh2dSearchContext};
use crate::sink::{Diagnostic, DiagnosticKind, DiagnosticSink};
use crate::types::{
    CoordinateSource, Endpoint, Link, LinkCollection, LinkError, LinkType, ResolveConfig,
    ResolveError,
};
use crate::validate;

/// Everything a link import reads.
///
/// The runtime discretization and grid are required; an import without
/// them aborts with [`LinkError::MissingCollaborator`]. The file meshes
/// and the network only feed coordinate derivation, so links still
/// import without them, keeping their file-local indices.
#[derive(Debug, Clone, Copy)]
pub struct LinkImport<'a> {
    /// The file's link records.
    pub links: &'a FileLinks,
    /// The file's 1D mesh arrays.
    pub mesh1d: Option<&'a FileMesh1d>,
    /// The file's 2D mesh arrays.
    pub mesh2d: Option<&'a FileMesh2d>,
    /// Runtime calculation points.
    pub discretization: Option<&'a Discretization>,
    /// Runtime 2D grid.
    pub grid: Option<&'a UnstructuredGrid>,
    /// Runtime network, for the branch and chainage fallback.
    pub network: Option<&'a Network>,
}

impl<'a> LinkImport<'a> {
    /// Import `links` into the given runtime model, with no file mesh
    /// arrays and no network yet.
    #[must_use]
    pub const fn new(
        links: &'a FileLinks,
        discretization: &'a Discretization,
        grid: &'a UnstructuredGrid,
    ) -> Self {
        Self {
            links,
            mesh1d: None,
            mesh2d: None,
            discretization: Some(discretization),
            grid: Some(grid),
            network: None,
        }
    }

    /// Attach the file's 1D mesh arrays.
    #[must_use]
    pub const fn with_mesh1d(mut self, mesh1d: &'a FileMesh1d) -> Self {
        self.mesh1d = Some(mesh1d);
        self
    }

    /// Attach the file's 2D mesh arrays.
    #[must_use]
    pub const fn with_mesh2d(mut self, mesh2d: &'a FileMesh2d) -> Self {
        self.mesh2d = Some(mesh2d);
        self
    }

    /// Attach the runtime network.
    #[must_use]
    pub const fn with_network(mut self, network: &'a Network) -> Self {
        self.network = Some(network);
        self
    }
}

/// Result of resolving one record, before it reaches the output.
struct Outcome {
    link: Link,
    unknown_type: Option<i32>,
    faults: Vec<ResolveError>,
}

/// Report `err` to the sink and hand it back for propagation.
fn abort(sink: &mut dyn DiagnosticSink, err: LinkError) -> LinkError {
    sink.report(Diagnostic::new(DiagnosticKind::from(&err)));
    err
}

fn timed<C: Clock>(clock: &C, start: &C::Instant, metrics: StageMetrics) -> StageDiagnostics {
    StageDiagnostics {
        duration: clock.elapsed(start),
        metrics,
    }
}

/// Run a full import, collecting stage diagnostics.
///
/// # Errors
///
/// Returns a [`LinkError`] when a required collaborator is missing, the
/// link arrays disagree in length, the worker pool cannot start, or the
/// output refuses to be cleared. Each error is reported to `sink` first
/// and the output is left untouched.
pub fn run<C: Clock>(
    import: &LinkImport<'_>,
    config: &ResolveConfig,
    output: &mut dyn LinkCollection,
    sink: &mut dyn DiagnosticSink,
    clock: &C,
) -> Result<ReadDiagnostics, LinkError> {
    run_with_task_hook(import, config, output, sink, clock, &no_task_hook)
}

const fn no_task_hook(_record: &LinkRecord<'_>) {}

/// [`run`], calling `on_task` on the worker thread before each record
/// is resolved.
fn run_with_task_hook<C: Clock>(
    import: &LinkImport<'_>,
    config: &ResolveConfig,
    output: &mut dyn LinkCollection,
    sink: &mut dyn DiagnosticSink,
    clock: &C,
    on_task: &(dyn Fn(&LinkRecord<'_>) + Sync),
) -> Result<ReadDiagnostics, LinkError> {
    let total_start = clock.now();

    // Contract checks.
    let start = clock.now();
    let discretization = import
        .discretization
        .ok_or_else(|| abort(sink, LinkError::MissingCollaborator("discretization")))?;
    let grid = import
        .grid
        .ok_or_else(|| abort(sink, LinkError::MissingCollaborator("grid")))?;
    import.links.validate().map_err(|e| abort(sink, e))?;
    let needs_network = import
        .mesh1d
        .is_some_and(|m| !m.has_trustworthy_coordinates());
    if import.network.is_none() && needs_network {
        sink.report(Diagnostic::new(DiagnosticKind::NetworkUnavailable));
    }
    let validate_stage = timed(
        clock,
        &start,
        StageMetrics::Validate {
            link_count: import.links.len(),
            network_available: import.network.is_some(),
        },
    );

    let start = clock.now();
    let ctx1d = Mesh1dSearchContext::build(import.mesh1d, discretization, import.network, config);
    let build_mesh1d = timed(
        clock,
        &start,
        StageMetrics::BuildIndex {
            backend: format!("{:?}", config.spatial_index),
            object_count: discretization.len(),
            indexed_count: ctx1d.indexed_count(),
            depth: config.subdivision_depth(ctx1d.indexed_count()),
            trustworthy: ctx1d.is_trustworthy(),
        },
    );

    let start = clock.now();
    let ctx2d = Mesh2dSearchContext::build(import.mesh2d, grid, config);
    let build_mesh2d = timed(
        clock,
        &start,
        StageMetrics::BuildIndex {
            backend: format!("{:?}", config.spatial_index),
            object_count: grid.len(),
            indexed_count: ctx2d.indexed_count(),
            depth: config.subdivision_depth(ctx2d.indexed_count()),
            trustworthy: ctx2d.is_trustworthy(),
        },
    );

    let start = clock.now();
    let records: Vec<LinkRecord<'_>> = import.links.records().collect();
    let outcomes = parallel::map_ordered(&records, config.max_parallelism, |record| {
        on_task(record);
        resolve_record(record, &ctx1d, &ctx2d, config)
    })
    .map_err(|e| abort(sink, LinkError::from(e)))?;
    let fault_count = outcomes.iter().filter(|o| !o.faults.is_empty()).count();
    let resolve_stage = timed(
        clock,
        &start,
        StageMetrics::Resolve {
            link_count: outcomes.len(),
            threads: parallel::effective_parallelism(config.max_parallelism),
            fault_count,
        },
    );
    tracing::debug!(links = outcomes.len(), fault_count, "resolved link endpoints");

    let start = clock.now();
    output.clear_links().map_err(|e| abort(sink, LinkError::from(e)))?;
    let mut summary = ReadSummary::default();
    let mut links = Vec::with_capacity(outcomes.len());
    for outcome in outcomes {
        report_outcome(&outcome, sink);
        summary.mesh1d.record(outcome.link.source_1d);
        summary.mesh2d.record(outcome.link.source_2d);
        summary.fault_count += usize::from(!outcome.faults.is_empty());
        summary.unknown_type_count += usize::from(outcome.unknown_type.is_some());
        output.push_link(outcome.link.clone());
        links.push(outcome.link);
    }
    summary.link_count = links.len();
    let assemble_stage = timed(
        clock,
        &start,
        StageMetrics::Assemble {
            links_appended: links.len(),
            unknown_type_count: summary.unknown_type_count,
        },
    );

    let start = clock.now();
    let duplicates = validate::find_duplicate_source_locations(&links, discretization);
    summary.duplicate_source_count = duplicates.len();
    for diagnostic in duplicates {
        sink.report(diagnostic);
    }
    let validate_sources = timed(
        clock,
        &start,
        StageMetrics::ValidateSources {
            duplicate_count: summary.duplicate_source_count,
        },
    );

    tracing::info!(
        links = summary.link_count,
        unresolved_1d = summary.mesh1d.unresolved,
        unresolved_2d = summary.mesh2d.unresolved,
        faults = summary.fault_count,
        duplicate_sources = summary.duplicate_source_count,
        "imported 1D2D links",
    );

    Ok(ReadDiagnostics {
        validate: validate_stage,
        build_mesh1d,
        build_mesh2d,
        resolve: resolve_stage,
        assemble: assemble_stage,
        validate_sources,
        total_duration: clock.elapsed(&total_start),
        summary,
    })
}

/// Resolve both ends of one record.
///
/// Each end is resolved on its own. An end that faults keeps its raw
/// file index, and the fault is carried for reporting; the other end is
/// unaffected.
fn resolve_record(
    record: &LinkRecord<'_>,
    ctx1d: &Mesh1dSearchContext<'_>,
    ctx2d: &Mesh2dSearchContext<'_>,
    config: &ResolveConfig,
) -> Outcome {
    let link_type = LinkType::from_code(record.link_type);
    let unknown_type = link_type.is_none().then_some(record.link_type);
    let mut faults = Vec::new();

    let from = settle(
        resolve::resolve_mesh1d(ctx1d, record.from, config.query_half_width_1d),
        record.from,
        &mut faults,
    );
    let to = settle(
        resolve::resolve_mesh2d(ctx2d, record.to, config.query_half_width_2d),
        record.to,
        &mut faults,
    );
    let start = endpoint_coordinate(&from, |i| ctx1d.discretization().coordinate(i));
    let end = endpoint_coordinate(&to, |i| ctx2d.grid().centroid(i));

    Outcome {
        link: Link {
            id: record.id.to_string(),
            long_name: record.long_name.to_string(),
            link_type: link_type.unwrap_or_default(),
            calculation_point_index: from.index,
            cell_index: to.index,
            geometry: start.zip(end).map(|(s, e)| Line::new(s, e)),
            file_position: record.position,
            source_1d: from.source,
            source_2d: to.source,
        },
        unknown_type,
        faults,
    }
}

/// Unwrap one end's resolution, keeping `file_index` on a fault.
fn settle(
    result: Result<Resolved, ResolveError>,
    file_index: usize,
    faults: &mut Vec<ResolveError>,
) -> Resolved {
    result.unwrap_or_else(|fault| {
        faults.push(fault);
        Resolved::kept(file_index, None)
    })
}

/// World coordinate of a resolved endpoint: the runtime object's own
/// coordinate, else the coordinate the search ran around.
fn endpoint_coordinate(
    resolved: &Resolved,
    runtime: impl Fn(usize) -> Option<Coord<f64>>,
) -> Option<Coord<f64>> {
    runtime(resolved.index).or(resolved.coordinate)
}

fn report_outcome(outcome: &Outcome, sink: &mut dyn DiagnosticSink) {
    let link = &outcome.link;
    if let Some(code) = outcome.unknown_type {
        sink.report(Diagnostic::new(DiagnosticKind::UnknownLinkType {
            link_id: link.id.clone(),
            code,
        }));
    }
    for fault in &outcome.faults {
        sink.report(Diagnostic::new(DiagnosticKind::ResolveFault {
            link_id: link.id.clone(),
            detail: fault.to_string(),
        }));
    }
    for (endpoint, source, file_index) in [
        (Endpoint::Mesh1d, link.source_1d, link.calculation_point_index),
        (Endpoint::Mesh2d, link.source_2d, link.cell_index),
    ] {
        let faulted = outcome.faults.iter().any(|f| f.endpoint() == endpoint);
        if source == CoordinateSource::Unresolved && !faulted {
            sink.report(Diagnostic::new(DiagnosticKind::UnresolvedEndpoint {
                link_id: link.id.clone(),
                endpoint,
                file_index,
            }));
        }
    }
}
