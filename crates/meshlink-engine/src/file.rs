//! File-domain arrays, in the numbering of the persisted mesh file.
//!
//! These mirror the variables of a UGRID-style mesh container after it
//! has been read into memory. Indices are zero based. Nothing here is
//! guaranteed to agree with the runtime model.

use geo::Coord;
use serde::{Deserialize, Serialize};

use crate::types::LinkError;

/// Per-link arrays of the 1D-2D contact variables.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FileLinks {
    /// Link identifiers.
    pub ids: Vec<String>,
    /// Link long names.
    pub long_names: Vec<String>,
    /// Persisted link type codes.
    pub link_types: Vec<i32>,
    /// File-local 1D node index of each link.
    pub mesh1d_from: Vec<usize>,
    /// File-local 2D face index of each link.
    pub mesh2d_to: Vec<usize>,
}

/// One link, borrowed out of [`FileLinks`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinkRecord<'a> {
    /// Position of the link in the file.
    pub position: usize,
    /// Link identifier.
    pub id: &'a str,
    /// Link long name.
    pub long_name: &'a str,
    /// Persisted type code.
    pub link_type: i32,
    /// File-local 1D node index.
    pub from: usize,
    /// File-local 2D face index.
    pub to: usize,
}

impl FileLinks {
    /// Number of links, taken from the index arrays.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.mesh1d_from.len()
    }

    /// Returns `true` if there are no links.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.mesh1d_from.is_empty()
    }

    /// Check that every per-link array has the same length.
    ///
    /// # Errors
    ///
    /// Returns [`LinkError::MalformedInput`] naming the first array whose
    /// length differs from `mesh1d_from`.
    pub fn validate(&self) -> Result<(), LinkError> {
        let expected = self.mesh1d_from.len();
        let lengths = [
            ("mesh2d_to", self.mesh2d_to.len()),
            ("ids", self.ids.len()),
            ("long_names", self.long_names.len()),
            ("link_types", self.link_types.len()),
        ];
        for (name, len) in lengths {
            if len != expected {
                return Err(LinkError::MalformedInput(format!(
                    "{name} has {len} entries but mesh1d_from has {expected}",
                )));
            }
        }
        Ok(())
    }

    /// Iterate over all records in file order.
    ///
    /// Assumes [`validate`](Self::validate) succeeded; extra entries in
    /// longer arrays are ignored.
    pub fn records(&self) -> impl Iterator<Item = LinkRecord<'_>> {
        self.mesh1d_from
            .iter()
            .zip(&self.mesh2d_to)
            .zip(self.ids.iter().zip(&self.long_names))
            .zip(&self.link_types)
            .enumerate()
            .map(|(position, (((&from, &to), (id, long_name)), &link_type))| LinkRecord {
                position,
                id: id.as_str(),
                long_name: long_name.as_str(),
                link_type,
                from,
                to,
            })
    }
}

/// Node arrays of the file's 1D mesh.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FileMesh1d {
    /// Node identifiers.
    pub node_ids: Vec<String>,
    /// Node x coordinates, when the producer wrote them.
    pub node_x: Option<Vec<f64>>,
    /// Node y coordinates, when the producer wrote them.
    pub node_y: Option<Vec<f64>>,
    /// Index into `branch_names` of the branch each node lies on.
    pub node_branch: Vec<usize>,
    /// Chainage of each node along its branch.
    pub node_offset: Vec<f64>,
    /// Branch names of the file's network geometry.
    pub branch_names: Vec<String>,
}

impl FileMesh1d {
    /// Whether `node_x`/`node_y` can be used as world coordinates.
    #[must_use]
    pub fn has_trustworthy_coordinates(&self) -> bool {
        coordinates_trustworthy(self.node_x.as_deref(), self.node_y.as_deref())
    }

    /// Persisted coordinate of a node.
    #[must_use]
    pub fn node_coordinate(&self, node: usize) -> Option<Coord<f64>> {
        coordinate_at(self.node_x.as_deref(), self.node_y.as_deref(), node)
    }

    /// Branch name and chainage of a node.
    #[must_use]
    pub fn node_branch_offset(&self, node: usize) -> Option<(&str, f64)> {
        let branch = *self.node_branch.get(node)?;
        let offset = *self.node_offset.get(node)?;
        let name = self.branch_names.get(branch)?;
        Some((name.as_str(), offset))
    }
}

/// Face and node arrays of the file's 2D mesh.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FileMesh2d {
    /// Face-node connectivity, `max_face_nodes` entries per face.
    pub face_nodes: Vec<i32>,
    /// Stride of `face_nodes`.
    pub max_face_nodes: usize,
    /// Face centre x coordinates, when the producer wrote them.
    pub face_x: Option<Vec<f64>>,
    /// Face centre y coordinates, when the producer wrote them.
    pub face_y: Option<Vec<f64>>,
    /// Node x coordinates.
    pub node_x: Vec<f64>,
    /// Node y coordinates.
    pub node_y: Vec<f64>,
    /// Fill value the file declares for unused `face_nodes` slots.
    pub fill_value: Option<i32>,
}

impl FileMesh2d {
    /// Whether `face_x`/`face_y` can be used as world coordinates.
    #[must_use]
    pub fn has_trustworthy_coordinates(&self) -> bool {
        coordinates_trustworthy(self.face_x.as_deref(), self.face_y.as_deref())
    }

    /// Persisted centre coordinate of a face.
    #[must_use]
    pub fn face_coordinate(&self, face: usize) -> Option<Coord<f64>> {
        coordinate_at(self.face_x.as_deref(), self.face_y.as_deref(), face)
    }

    /// The fixed-width vertex block of a face, including fill slots.
    ///
    /// `None` when the stride is zero or the block would run past the
    /// end of `face_nodes`.
    #[must_use]
    pub fn face_vertex_block(&self, face: usize) -> Option<&[i32]> {
        if self.max_face_nodes == 0 {
            return None;
        }
        let start = face.checked_mul(self.max_face_nodes)?;
        let end = start.checked_add(self.max_face_nodes)?;
        self.face_nodes.get(start..end)
    }

    /// Coordinate of a mesh node.
    #[must_use]
    pub fn node_coordinate(&self, node: usize) -> Option<Coord<f64>> {
        Some(Coord {
            x: *self.node_x.get(node)?,
            y: *self.node_y.get(node)?,
        })
    }
}

/// Decide whether a pair of persisted coordinate arrays holds real data.
///
/// Both arrays must be present, of equal length, and free of exact
/// zeros. A zero is read as "never written", so a genuine coordinate at
/// the origin makes the whole array untrusted.
#[must_use]
pub fn coordinates_trustworthy(x: Option<&[f64]>, y: Option<&[f64]>) -> bool {
    let (Some(x), Some(y)) = (x, y) else {
        return false;
    };
    x.len() == y.len() && x.iter().chain(y).all(|&v| v != 0.0)
}

fn coordinate_at(x: Option<&[f64]>, y: Option<&[f64]>, index: usize) -> Option<Coord<f64>> {
    Some(Coord {
        x: *x?.get(index)?,
        y: *y?.get(index)?,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn three_links() -> FileLinks {
        FileLinks {
            ids: vec!["L0".into(), "L1".into(), "L2".into()],
            long_names: vec!["zero".into(), "one".into(), "two".into()],
            link_types: vec![3, 4, 3],
            mesh1d_from: vec![0, 1, 2],
            mesh2d_to: vec![5, 6, 7],
        }
    }

    #[test]
    fn records_follow_file_order() {
        let links = three_links();
        links.validate().unwrap();
        let records: Vec<_> = links.records().collect();
        assert_eq!(records.len(), 3);
        assert_eq!(records[1].position, 1);
        assert_eq!(records[1].id, "L1");
        assert_eq!(records[1].long_name, "one");
        assert_eq!(records[1].link_type, 4);
        assert_eq!(records[1].from, 1);
        assert_eq!(records[1].to, 6);
    }

    #[test]
    fn validate_rejects_length_mismatch() {
        let mut links = three_links();
        links.long_names.pop();
        let err = links.validate().unwrap_err();
        assert!(matches!(err, LinkError::MalformedInput(ref m) if m.contains("long_names")));
    }

    #[test]
    fn trustworthy_requires_both_arrays() {
        assert!(!coordinates_trustworthy(None, Some(&[1.0])));
        assert!(!coordinates_trustworthy(Some(&[1.0]), None));
        assert!(coordinates_trustworthy(Some(&[1.0]), Some(&[2.0])));
    }

    #[test]
    fn trustworthy_rejects_unequal_lengths() {
        assert!(!coordinates_trustworthy(Some(&[1.0, 2.0]), Some(&[2.0])));
    }

    #[test]
    fn trustworthy_rejects_exact_zero() {
        assert!(!coordinates_trustworthy(Some(&[1.0, 0.0]), Some(&[2.0, 3.0])));
        assert!(!coordinates_trustworthy(Some(&[1.0, 4.0]), Some(&[2.0, -0.0])));
        assert!(coordinates_trustworthy(Some(&[1e-9]), Some(&[-1e-9])));
    }

    #[test]
    fn node_branch_offset_lookup() {
        let mesh = FileMesh1d {
            node_ids: vec!["a".into(), "b".into()],
            node_x: None,
            node_y: None,
            node_branch: vec![0, 3],
            node_offset: vec![12.5, 1.0],
            branch_names: vec!["B1".into()],
        };
        assert_eq!(mesh.node_branch_offset(0), Some(("B1", 12.5)));
        // Branch index 3 does not exist.
        assert_eq!(mesh.node_branch_offset(1), None);
        assert_eq!(mesh.node_branch_offset(2), None);
    }

    #[test]
    fn face_vertex_block_respects_stride() {
        let mesh = FileMesh2d {
            face_nodes: vec![0, 1, 2, -999, 2, 3, 4, 5],
            max_face_nodes: 4,
            ..FileMesh2d::default()
        };
        assert_eq!(mesh.face_vertex_block(0), Some(&[0, 1, 2, -999][..]));
        assert_eq!(mesh.face_vertex_block(1), Some(&[2, 3, 4, 5][..]));
        assert_eq!(mesh.face_vertex_block(2), None);
        assert_eq!(mesh.face_vertex_block(usize::MAX), None);
    }

    #[test]
    fn face_vertex_block_zero_stride() {
        let mesh = FileMesh2d {
            face_nodes: vec![0, 1, 2],
            max_face_nodes: 0,
            ..FileMesh2d::default()
        };
        assert_eq!(mesh.face_vertex_block(0), None);
    }
}
