//! Integration tests: full link imports through `read_links`.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::time::Duration;

use geo::{Coord, LineString};
use meshlink_engine::{
    Branch, CalculationPoint, ClearNotSupported, CoordinateSource, Diagnostic, DiagnosticKind,
    Discretization, FileLinks, FileMesh1d, FileMesh2d, Link, LinkCollection, LinkError,
    LinkImport, Network, ResolveConfig, Severity, SpatialIndexKind, UnstructuredGrid,
};
use rand::Rng;

fn point(name: &str, x: f64, y: f64) -> CalculationPoint {
    CalculationPoint {
        name: name.to_string(),
        branch: 0,
        chainage: 0.0,
        coordinate: Coord { x, y },
        file_index: None,
    }
}

fn file_links(pairs: &[(usize, usize)]) -> FileLinks {
    FileLinks {
        ids: (0..pairs.len()).map(|i| format!("L{i}")).collect(),
        long_names: (0..pairs.len()).map(|i| format!("link {i}")).collect(),
        link_types: vec![3; pairs.len()],
        mesh1d_from: pairs.iter().map(|&(from, _)| from).collect(),
        mesh2d_to: pairs.iter().map(|&(_, to)| to).collect(),
    }
}

/// Unit squares along the x axis, cell `i` covering `[i, i + 1] x [0, 1]`.
fn strip_grid(cells: usize) -> UnstructuredGrid {
    let mut vertices = Vec::with_capacity(2 * (cells + 1));
    for i in 0..=cells {
        #[allow(clippy::cast_precision_loss)]
        let x = i as f64;
        vertices.push(Coord { x, y: 0.0 });
        vertices.push(Coord { x, y: 1.0 });
    }
    let faces = (0..cells)
        .map(|i| vec![2 * i, 2 * i + 2, 2 * i + 3, 2 * i + 1])
        .collect();
    UnstructuredGrid::new(vertices, faces)
}

fn read(
    import: &LinkImport<'_>,
    config: &ResolveConfig,
) -> (Vec<Link>, Vec<Diagnostic>, meshlink_engine::ReadSummary) {
    let mut output: Vec<Link> = Vec::new();
    let mut sink: Vec<Diagnostic> = Vec::new();
    let summary = meshlink_engine::read_links(import, config, &mut output, &mut sink)
        .expect("import should succeed");
    (output, sink, summary)
}

#[test]
fn output_follows_file_order_for_any_parallelism() {
    // Runtime points at x = 0.5, 1.5, ...; file links reference them in
    // reverse so resolved indices differ from positions.
    let count = 400;
    let grid = strip_grid(count);
    #[allow(clippy::cast_precision_loss)]
    let discretization = Discretization::new(
        (0..count)
            .map(|i| point(&format!("N{i}"), i as f64 + 0.5, 0.5))
            .collect(),
    );
    let pairs: Vec<(usize, usize)> = (0..count).rev().map(|i| (i, i)).collect();
    let links = file_links(&pairs);

    for threads in [1, 2, 8] {
        for kind in [SpatialIndexKind::QuadTree, SpatialIndexKind::RTree] {
            let config = ResolveConfig {
                spatial_index: kind,
                max_parallelism: threads,
                ..ResolveConfig::default()
            };
            let import = LinkImport::new(&links, &discretization, &grid);
            let (output, _, summary) = read(&import, &config);
            assert_eq!(summary.link_count, count);
            for (position, link) in output.iter().enumerate() {
                assert_eq!(link.file_position, position);
                assert_eq!(link.id, format!("L{position}"));
                assert_eq!(link.calculation_point_index, count - 1 - position);
            }
        }
    }
}

#[test]
fn ordered_map_survives_random_task_delays() {
    let items: Vec<u32> = (0..200).collect();
    let out = meshlink_engine::parallel::map_ordered(&items, 6, |&i| {
        let micros = rand::rng().random_range(0..300);
        std::thread::sleep(Duration::from_micros(micros));
        i
    })
    .unwrap();
    assert_eq!(out, items);
}

#[test]
fn trusted_coordinates_pick_matching_calculation_point() {
    // The point at (10, 20) is runtime index 4 but file node 3.
    let discretization = Discretization::new(vec![
        point("a", 1.0, 1.0),
        point("b", 5.0, 15.0),
        point("d", 40.0, 80.0),
        point("e", 90.0, 90.0),
        point("c", 10.0, 20.0),
    ]);
    let mesh1d = FileMesh1d {
        node_ids: ["a", "b", "d", "c", "e"].map(String::from).to_vec(),
        node_x: Some(vec![1.0, 5.0, 40.0, 10.0, 90.0]),
        node_y: Some(vec![1.0, 15.0, 80.0, 20.0, 90.0]),
        ..FileMesh1d::default()
    };
    let grid = strip_grid(2);
    let links = file_links(&[(3, 0)]);
    let import = LinkImport::new(&links, &discretization, &grid).with_mesh1d(&mesh1d);
    let (output, _, summary) = read(&import, &ResolveConfig::default());

    assert_eq!(output[0].calculation_point_index, 4);
    assert_eq!(output[0].source_1d, CoordinateSource::FileCoordinates);
    assert_eq!(summary.mesh1d.file_coordinates, 1);
    let geometry = output[0].geometry.unwrap();
    assert_eq!(geometry.start, Coord { x: 10.0, y: 20.0 });
}

#[test]
fn zeroed_node_coordinates_fall_back_to_branch_chainage() {
    let branch = Branch::new("B1", LineString::from(vec![(100.0, 100.0), (200.0, 100.0)]));
    // Runtime order is shuffled against chainage.
    let discretization = Discretization::new(
        [75.0, 0.0, 50.0, 100.0, 25.0]
            .iter()
            .enumerate()
            .map(|(i, &chainage)| {
                CalculationPoint::on_branch(format!("R{i}"), 0, &branch, chainage).unwrap()
            })
            .collect(),
    );
    let network = Network::new(vec![branch]);
    let mesh1d = FileMesh1d {
        node_ids: vec!["n0".into(), "n1".into()],
        node_x: Some(vec![0.0, 0.0]),
        node_y: Some(vec![0.0, 0.0]),
        node_branch: vec![0, 0],
        node_offset: vec![10.0, 50.0],
        branch_names: vec!["B1".into()],
    };
    let grid = UnstructuredGrid::new(
        vec![
            Coord { x: 140.0, y: 90.0 },
            Coord { x: 160.0, y: 90.0 },
            Coord { x: 160.0, y: 110.0 },
            Coord { x: 140.0, y: 110.0 },
        ],
        vec![vec![0, 1, 2, 3]],
    );
    let links = file_links(&[(1, 0)]);
    let import = LinkImport::new(&links, &discretization, &grid)
        .with_mesh1d(&mesh1d)
        .with_network(&network);
    let (output, sink, summary) = read(&import, &ResolveConfig::default());

    let link = &output[0];
    assert_eq!(link.source_1d, CoordinateSource::BranchChainage);
    assert_eq!(link.calculation_point_index, 2);
    let start = link.geometry.unwrap().start;
    assert!((start.x - 150.0).abs() < 1e-9);
    assert!((start.y - 100.0).abs() < 1e-9);
    assert_eq!(summary.mesh1d.branch_chainage, 1);
    assert!(!sink.iter().any(|d| d.kind == DiagnosticKind::NetworkUnavailable));
}

#[test]
fn face_centroid_fallback_selects_nearest_cell() {
    // Runtime cell 2 is the file's triangle; cells 0 and 1 are nearby
    // squares inside the 2D query window.
    let grid = UnstructuredGrid::new(
        vec![
            Coord { x: 3.0, y: 0.0 },
            Coord { x: 5.0, y: 0.0 },
            Coord { x: 5.0, y: 2.0 },
            Coord { x: 3.0, y: 2.0 },
            Coord { x: -4.0, y: 0.0 },
            Coord { x: -2.0, y: 0.0 },
            Coord { x: -2.0, y: 2.0 },
            Coord { x: -4.0, y: 2.0 },
            Coord { x: 0.0, y: 0.0 },
            Coord { x: 2.0, y: 0.0 },
            Coord { x: 1.0, y: 2.0 },
        ],
        vec![vec![0, 1, 2, 3], vec![4, 5, 6, 7], vec![8, 9, 10]],
    );
    let mesh2d = FileMesh2d {
        face_nodes: vec![0, 1, 2, -999],
        max_face_nodes: 4,
        face_x: None,
        face_y: None,
        node_x: vec![0.0, 2.0, 1.0],
        node_y: vec![0.0, 0.0, 2.0],
        fill_value: Some(-999),
    };
    let discretization = Discretization::new(vec![point("N0", 1.0, 0.5)]);
    let links = file_links(&[(0, 0)]);

    for kind in [SpatialIndexKind::QuadTree, SpatialIndexKind::RTree] {
        let config = ResolveConfig {
            spatial_index: kind,
            ..ResolveConfig::default()
        };
        let import = LinkImport::new(&links, &discretization, &grid).with_mesh2d(&mesh2d);
        let (output, _, summary) = read(&import, &config);
        let link = &output[0];
        assert_eq!(link.cell_index, 2);
        assert_eq!(link.source_2d, CoordinateSource::FaceCentroid);
        let end = link.geometry.unwrap().end;
        assert!((end.x - 1.0).abs() < 1e-9);
        assert!((end.y - 2.0 / 3.0).abs() < 1e-3);
        assert_eq!(summary.mesh2d.face_centroid, 1);
    }
}

#[test]
fn coincident_sources_are_reported_per_link() {
    let discretization = Discretization::new(vec![
        point("N1", 5.0, 5.0),
        point("N2", 5.0, 5.0),
        point("N3", 0.5, 0.5),
    ]);
    let grid = strip_grid(3);
    // No file meshes: indices are kept as written.
    let links = file_links(&[(0, 0), (1, 1), (2, 2)]);
    let import = LinkImport::new(&links, &discretization, &grid);
    let (_, sink, summary) = read(&import, &ResolveConfig::default());

    let duplicates: Vec<&Diagnostic> = sink
        .iter()
        .filter(|d| matches!(d.kind, DiagnosticKind::DuplicateSourceLocation { .. }))
        .collect();
    assert_eq!(duplicates.len(), 2);
    assert_eq!(summary.duplicate_source_count, 2);
    assert!(duplicates.iter().all(|d| d.severity == Severity::Warning));
    let first = duplicates[0].to_string();
    assert!(first.contains("'L0'"), "{first}");
    assert!(first.contains("also used by N2"), "{first}");
    let second = duplicates[1].to_string();
    assert!(second.contains("'L1'"), "{second}");
    assert!(second.contains("also used by N1"), "{second}");
    assert!(!sink.iter().any(|d| d.to_string().contains("'L2' (")));
}

#[test]
fn links_sharing_a_source_point_are_reported() {
    let discretization = Discretization::new(vec![point("N1", 0.5, 0.5), point("N2", 1.5, 0.5)]);
    let grid = strip_grid(3);
    let links = file_links(&[(0, 0), (0, 1), (1, 2)]);
    let import = LinkImport::new(&links, &discretization, &grid);
    let (output, sink, summary) = read(&import, &ResolveConfig::default());

    assert_eq!(output[0].calculation_point_index, 0);
    assert_eq!(output[1].calculation_point_index, 0);
    assert_eq!(summary.duplicate_source_count, 2);
    let duplicates: Vec<&DiagnosticKind> = sink
        .iter()
        .map(|d| &d.kind)
        .filter(|k| matches!(k, DiagnosticKind::DuplicateSourceLocation { .. }))
        .collect();
    assert_eq!(
        duplicates[0],
        &DiagnosticKind::DuplicateSourceLocation {
            link_id: "L0".into(),
            link_name: "link 0".into(),
            node: "N1".into(),
            calculation_point_index: 0,
            cell_index: 0,
            coincident: Vec::new(),
            other_links: vec![("L1".into(), "N1".into())],
        }
    );
    let second = sink
        .iter()
        .filter(|d| matches!(d.kind, DiagnosticKind::DuplicateSourceLocation { .. }))
        .nth(1)
        .unwrap()
        .to_string();
    assert!(second.contains("'L1'"), "{second}");
    assert!(second.contains("also used by link 'L0' (N1)"), "{second}");
}

#[test]
fn unlocatable_face_keeps_file_index_without_aborting() {
    let grid = strip_grid(4);
    let discretization = Discretization::new(vec![point("N0", 0.5, 0.5), point("N1", 1.5, 0.5)]);
    let mesh2d = FileMesh2d {
        face_nodes: vec![0, 1, 2, 3],
        max_face_nodes: 4,
        face_x: Some(vec![1.5]),
        face_y: Some(vec![0.5]),
        node_x: vec![1.0, 2.0, 2.0, 1.0],
        node_y: vec![0.1, 0.1, 1.0, 1.0],
        fill_value: None,
    };
    // Face 9 exists in neither the face arrays nor the face-node table.
    let links = file_links(&[(0, 9), (1, 0)]);
    let import = LinkImport::new(&links, &discretization, &grid).with_mesh2d(&mesh2d);
    let (output, sink, summary) = read(&import, &ResolveConfig::default());

    assert_eq!(output.len(), 2);
    assert_eq!(output[0].cell_index, 9);
    assert_eq!(output[0].source_2d, CoordinateSource::Unresolved);
    assert_eq!(output[1].cell_index, 1);
    assert_eq!(output[1].source_2d, CoordinateSource::FileCoordinates);
    assert_eq!(summary.mesh2d.unresolved, 1);
    assert!(sink.iter().any(|d| matches!(
        d.kind,
        DiagnosticKind::UnresolvedEndpoint { file_index: 9, .. }
    )));
    assert!(sink.iter().all(|d| d.severity < Severity::Error));
}

#[test]
fn arithmetic_fault_is_reported_and_link_still_emitted() {
    let broken = Branch::new("B0", LineString::from(vec![(0.0, 0.0), (10.0, 0.0)]))
        .with_custom_length(0.0);
    let network = Network::new(vec![broken]);
    let discretization = Discretization::new(vec![point("N0", 0.5, 0.5), point("N1", 1.5, 0.5)]);
    let mesh1d = FileMesh1d {
        node_ids: vec!["a".into(), "b".into()],
        node_branch: vec![0, 0],
        node_offset: vec![0.0, 5.0],
        branch_names: vec!["B0".into()],
        ..FileMesh1d::default()
    };
    // File face 0 sits on runtime cell 2, file face 1 on runtime cell 0.
    let mesh2d = FileMesh2d {
        face_x: Some(vec![2.5, 0.5]),
        face_y: Some(vec![0.5, 0.5]),
        ..FileMesh2d::default()
    };
    let grid = strip_grid(3);
    let links = file_links(&[(0, 0), (1, 1)]);
    let import = LinkImport::new(&links, &discretization, &grid)
        .with_mesh1d(&mesh1d)
        .with_mesh2d(&mesh2d)
        .with_network(&network);
    let (output, sink, summary) = read(&import, &ResolveConfig::default());

    // Chainage 0 on a zero-length branch is 0 / 0; chainage 5 snaps to
    // the branch end instead.
    assert_eq!(output.len(), 2);
    assert_eq!(summary.fault_count, 1);
    assert_eq!(output[0].calculation_point_index, 0);
    assert_eq!(output[0].source_1d, CoordinateSource::Unresolved);
    // The 2D end of the faulted link still resolves on its own.
    assert_eq!(output[0].cell_index, 2);
    assert_eq!(output[0].source_2d, CoordinateSource::FileCoordinates);
    let geometry = output[0].geometry.unwrap();
    assert_eq!(geometry.start, Coord { x: 0.5, y: 0.5 });
    assert_eq!(geometry.end, Coord { x: 2.5, y: 0.5 });

    assert_eq!(output[1].source_1d, CoordinateSource::BranchChainage);
    assert_eq!(output[1].calculation_point_index, 1);
    assert_eq!(output[1].cell_index, 0);

    let faults: Vec<&Diagnostic> = sink
        .iter()
        .filter(|d| matches!(d.kind, DiagnosticKind::ResolveFault { .. }))
        .collect();
    assert_eq!(faults.len(), 1);
    assert_eq!(faults[0].severity, Severity::Error);
    assert!(faults[0].to_string().contains("'L0'"));
    // The faulted end is reported once, as a fault.
    assert!(!sink.iter().any(|d| matches!(
        d.kind,
        DiagnosticKind::UnresolvedEndpoint { .. }
    )));
}

#[test]
fn malformed_links_abort_before_touching_output() {
    let grid = strip_grid(1);
    let discretization = Discretization::new(vec![point("N0", 0.5, 0.5)]);
    let mut links = file_links(&[(0, 0)]);
    links.link_types.push(4);
    let import = LinkImport::new(&links, &discretization, &grid);

    let previous = {
        let valid = file_links(&[(0, 0)]);
        let import = LinkImport::new(&valid, &discretization, &grid);
        let mut existing: Vec<Link> = Vec::new();
        let mut ignored: Vec<Diagnostic> = Vec::new();
        meshlink_engine::read_links(&import, &ResolveConfig::default(), &mut existing, &mut ignored)
            .unwrap();
        existing
    };
    let mut output = previous.clone();
    let mut sink: Vec<Diagnostic> = Vec::new();
    let config = ResolveConfig::default();
    let err = meshlink_engine::read_links(&import, &config, &mut output, &mut sink).unwrap_err();
    assert!(matches!(err, LinkError::MalformedInput(_)));
    assert_eq!(output, previous);
    assert!(matches!(sink[0].kind, DiagnosticKind::MalformedInput { .. }));
}

#[test]
fn missing_discretization_aborts() {
    let grid = strip_grid(1);
    let links = file_links(&[(0, 0)]);
    let import = LinkImport {
        links: &links,
        mesh1d: None,
        mesh2d: None,
        discretization: None,
        grid: Some(&grid),
        network: None,
    };
    let mut output: Vec<Link> = Vec::new();
    let mut sink: Vec<Diagnostic> = Vec::new();
    let config = ResolveConfig::default();
    let err = meshlink_engine::read_links(&import, &config, &mut output, &mut sink).unwrap_err();
    assert!(matches!(err, LinkError::MissingCollaborator("discretization")));
    assert_eq!(
        sink[0].kind,
        DiagnosticKind::MissingCollaborator {
            name: "discretization".into()
        }
    );
}

/// A collection that only accepts new links.
#[derive(Default)]
struct AppendOnly {
    links: Vec<Link>,
}

impl LinkCollection for AppendOnly {
    fn clear_links(&mut self) -> Result<(), ClearNotSupported> {
        Err(ClearNotSupported {
            reason: "append-only collection".into(),
        })
    }

    fn push_link(&mut self, link: Link) {
        self.links.push(link);
    }
}

#[test]
fn clear_not_supported_aborts_without_partial_output() {
    let grid = strip_grid(1);
    let discretization = Discretization::new(vec![point("N0", 0.5, 0.5)]);
    let links = file_links(&[(0, 0)]);
    let import = LinkImport::new(&links, &discretization, &grid);
    let mut output = AppendOnly::default();
    let mut sink: Vec<Diagnostic> = Vec::new();
    let config = ResolveConfig::default();
    let err = meshlink_engine::read_links(&import, &config, &mut output, &mut sink).unwrap_err();
    assert!(matches!(err, LinkError::ClearNotSupported(_)));
    assert!(output.links.is_empty());
    let last = sink.last().unwrap();
    assert_eq!(last.severity, Severity::Error);
    assert!(last.to_string().contains("append-only collection"));
}
