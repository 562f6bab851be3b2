//! Fallback world coordinates for file-local nodes and faces.
//!
//! Used when the file's own coordinate arrays cannot be trusted:
//!
//! - a 1D node is placed by projecting its chainage along the runtime
//!   branch of the same name;
//! - a 2D face is placed at the mean of its boundary vertices.
//!
//! Every function here is pure. A NaN input produces a NaN coordinate
//! rather than being snapped away, so callers can detect arithmetic
//! faults with [`f64::is_finite`].

use std::collections::HashMap;

use geo::{Coord, LineString, Rect};

use crate::file::{FileMesh1d, FileMesh2d};
use crate::network::Branch;

/// Euclidean arc length of a line string.
#[must_use]
pub fn line_string_length(line_string: &LineString<f64>) -> f64 {
    line_string
        .lines()
        .map(|segment| segment.dx().hypot(segment.dy()))
        .sum()
}

/// Point at `distance` along a line string.
///
/// The distance is snapped into `[0, length]` first. Returns `None` for
/// an empty line string.
#[must_use]
pub fn line_string_coordinate(line_string: &LineString<f64>, distance: f64) -> Option<Coord<f64>> {
    let first = *line_string.0.first()?;
    if distance.is_nan() {
        return Some(Coord {
            x: f64::NAN,
            y: f64::NAN,
        });
    }

    let target = distance.clamp(0.0, line_string_length(line_string));
    let mut walked = 0.0;
    for segment in line_string.lines() {
        let segment_length = segment.dx().hypot(segment.dy());
        if segment_length > 0.0 && walked + segment_length >= target {
            let frac = ((target - walked) / segment_length).clamp(0.0, 1.0);
            return Some(Coord {
                x: frac.mul_add(segment.dx(), segment.start.x),
                y: frac.mul_add(segment.dy(), segment.start.y),
            });
        }
        walked += segment_length;
    }

    Some(line_string.0.last().copied().unwrap_or(first))
}

/// Point at `chainage` along a branch.
///
/// When the branch length is custom the chainage is expressed in
/// hydraulic units and is rescaled to the geometric length before
/// projecting.
#[must_use]
pub fn branch_coordinate(branch: &Branch, chainage: f64) -> Option<Coord<f64>> {
    let distance = if branch.is_length_custom {
        chainage * branch.geometric_length() / branch.length
    } else {
        chainage
    };
    line_string_coordinate(&branch.geometry, distance)
}

/// Fallback coordinate of a file-local 1D node.
///
/// Looks the node's branch up by name in `branches` and projects the
/// node's chainage along it. Returns `None` when the node is out of
/// range, its branch index does not name a file branch, or no runtime
/// branch has that name.
#[must_use]
pub fn calculation_point_coordinate(
    mesh: &FileMesh1d,
    node: usize,
    branches: &HashMap<&str, &Branch>,
) -> Option<Coord<f64>> {
    let (branch_name, chainage) = mesh.node_branch_offset(node)?;
    let branch = branches.get(branch_name)?;
    branch_coordinate(branch, chainage)
}

/// Fallback coordinate of a file-local 2D face: the mean of its vertices.
///
/// Slots equal to any of `fill_values` are skipped, as are negative
/// slots. Returns `None` when the face block is out of range, a vertex
/// index has no node coordinate, or no vertex remains.
#[must_use]
pub fn face_centroid(mesh: &FileMesh2d, face: usize, fill_values: &[i32]) -> Option<Coord<f64>> {
    let block = mesh.face_vertex_block(face)?;
    let mut vertices = Vec::with_capacity(block.len());
    for &slot in block {
        if fill_values.contains(&slot) {
            continue;
        }
        let Ok(node) = usize::try_from(slot) else {
            continue;
        };
        vertices.push(mesh.node_coordinate(node)?);
    }
    mean_coordinate(vertices)
}

/// Arithmetic mean of a set of coordinates.
#[must_use]
pub fn mean_coordinate(coords: impl IntoIterator<Item = Coord<f64>>) -> Option<Coord<f64>> {
    let mut sum = Coord { x: 0.0, y: 0.0 };
    let mut count = 0_usize;
    for c in coords {
        sum.x += c.x;
        sum.y += c.y;
        count += 1;
    }
    if count == 0 {
        return None;
    }
    #[allow(clippy::cast_precision_loss)]
    let n = count as f64;
    Some(Coord {
        x: sum.x / n,
        y: sum.y / n,
    })
}

/// Axis-aligned bounding rectangle of a set of coordinates.
#[must_use]
pub fn bounding_rect(coords: impl IntoIterator<Item = Coord<f64>>) -> Option<Rect<f64>> {
    let mut iter = coords.into_iter();
    let first = iter.next()?;
    let (min, max) = iter.fold((first, first), |(min, max), c| {
        (
            Coord {
                x: min.x.min(c.x),
                y: min.y.min(c.y),
            },
            Coord {
                x: max.x.max(c.x),
                y: max.y.max(c.y),
            },
        )
    });
    Some(Rect::new(min, max))
}
