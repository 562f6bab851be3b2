//! Synthetic bundles for benchmarking without a model file.
//!
//! One straight branch with evenly spaced calculation points, a strip of
//! square cells along it, and one link per calculation point. The
//! runtime model numbers points and cells in a shuffled order, so every
//! link has to be resolved spatially to land on the right objects.

use geo::{Coord, LineString};
use meshlink_engine::{
    Branch, CalculationPoint, Discretization, FileLinks, FileMesh1d, FileMesh2d, Link, LinkType,
    Network, UnstructuredGrid,
};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;

use crate::bundle::LinkBundle;

/// Distance between neighbouring calculation points, and cell size.
const SPACING: f64 = 10.0;

/// Offset of the model from the origin. Keeps every coordinate non-zero.
const ORIGIN: Coord<f64> = Coord {
    x: 1000.0,
    y: 2000.0,
};

/// Face-node stride; one slot more than a square needs.
const MAX_FACE_NODES: usize = 5;

/// Fill value written into unused face-node slots.
const FILL_VALUE: i32 = -999;

/// Generation options.
#[derive(Debug, Clone, Copy)]
pub struct SyntheticOptions {
    /// Number of calculation points, cells, and links.
    pub size: usize,
    /// Zero the file's node coordinates and drop its face coordinates,
    /// forcing the branch/chainage and centroid fallbacks.
    pub zero_coordinates: bool,
    /// Seed for the runtime numbering shuffle.
    pub seed: u64,
}

#[allow(clippy::cast_precision_loss)]
fn along(i: usize) -> f64 {
    (i as f64).mul_add(SPACING, SPACING / 2.0)
}

/// Build a bundle.
pub fn generate(options: SyntheticOptions) -> LinkBundle {
    let SyntheticOptions {
        size,
        zero_coordinates,
        seed,
    } = options;
    let mut rng = StdRng::seed_from_u64(seed);

    #[allow(clippy::cast_precision_loss)]
    let length = size as f64 * SPACING;
    let geometry = LineString::from(vec![(ORIGIN.x, ORIGIN.y), (ORIGIN.x + length, ORIGIN.y)]);
    let branch = Branch::new("B0", geometry);

    // Runtime numbering: `point_order[k]` is the file node of runtime point k.
    let mut point_order: Vec<usize> = (0..size).collect();
    point_order.shuffle(&mut rng);
    let points = point_order
        .iter()
        .filter_map(|&node| {
            let mut point =
                CalculationPoint::on_branch(format!("N{node}"), 0, &branch, along(node))?;
            point.file_index = Some(node);
            Some(point)
        })
        .collect();

    // Shared vertex rows below and above the branch.
    let half = SPACING / 2.0;
    let mut vertices = Vec::with_capacity(2 * (size + 1));
    for i in 0..=size {
        #[allow(clippy::cast_precision_loss)]
        let x = (i as f64).mul_add(SPACING, ORIGIN.x);
        vertices.push(Coord {
            x,
            y: ORIGIN.y - half,
        });
        vertices.push(Coord {
            x,
            y: ORIGIN.y + half,
        });
    }
    let face = |i: usize| vec![2 * i, 2 * i + 2, 2 * i + 3, 2 * i + 1];
    let mut cell_order: Vec<usize> = (0..size).collect();
    cell_order.shuffle(&mut rng);
    let grid = UnstructuredGrid::new(
        vertices.clone(),
        cell_order.iter().map(|&i| face(i)).collect(),
    );

    let mesh1d = FileMesh1d {
        node_ids: (0..size).map(|i| format!("N{i}")).collect(),
        node_x: Some(if zero_coordinates {
            vec![0.0; size]
        } else {
            (0..size).map(|i| ORIGIN.x + along(i)).collect()
        }),
        node_y: Some(if zero_coordinates {
            vec![0.0; size]
        } else {
            vec![ORIGIN.y; size]
        }),
        node_branch: vec![0; size],
        node_offset: (0..size).map(along).collect(),
        branch_names: vec!["B0".to_string()],
    };

    let mut face_nodes = Vec::with_capacity(size * MAX_FACE_NODES);
    for i in 0..size {
        for vertex in face(i) {
            face_nodes.push(i32::try_from(vertex).unwrap_or(FILL_VALUE));
        }
        face_nodes.push(FILL_VALUE);
    }
    let (face_x, face_y) = if zero_coordinates {
        (None, None)
    } else {
        (
            Some((0..size).map(|i| ORIGIN.x + along(i)).collect()),
            Some(vec![ORIGIN.y; size]),
        )
    };
    let mesh2d = FileMesh2d {
        face_nodes,
        max_face_nodes: MAX_FACE_NODES,
        face_x,
        face_y,
        node_x: vertices.iter().map(|v| v.x).collect(),
        node_y: vertices.iter().map(|v| v.y).collect(),
        fill_value: Some(FILL_VALUE),
    };

    let link_types = [LinkType::Embedded, LinkType::Lateral];
    let links = FileLinks {
        ids: (0..size).map(|i| format!("L{i}")).collect(),
        long_names: (0..size).map(|i| format!("N{i} to cell {i}")).collect(),
        link_types: (0..size).map(|i| link_types[i % 2].code()).collect(),
        mesh1d_from: (0..size).collect(),
        mesh2d_to: (0..size).collect(),
    };

    LinkBundle {
        links,
        mesh1d: Some(mesh1d),
        mesh2d: Some(mesh2d),
        discretization: Discretization::new(points),
        grid,
        network: Some(Network::new(vec![branch])),
    }
}

/// Links whose 1D end did not land on the calculation point read from
/// the same file node.
pub fn count_mismatches(bundle: &LinkBundle, links: &[Link]) -> usize {
    links
        .iter()
        .filter(|link| {
            let expected = bundle.links.mesh1d_from.get(link.file_position).copied();
            let actual = bundle
                .discretization
                .points
                .get(link.calculation_point_index)
                .and_then(|p| p.file_index);
            expected.is_none() || expected != actual
        })
        .count()
}
