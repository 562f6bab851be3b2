//! Post-assembly consistency checks.
//!
//! These only report. They never block an import or modify a link.

use std::collections::HashMap;

use geo::Coord;

use crate::network::Discretization;
use crate::sink::{Diagnostic, DiagnosticKind};
use crate::types::Link;

/// Bit pattern key for exact coordinate equality. `-0.0` and `0.0` map
/// to the same key.
fn coordinate_key(c: Coord<f64>) -> (u64, u64) {
    let normalize = |v: f64| if v == 0.0 { 0.0_f64.to_bits() } else { v.to_bits() };
    (normalize(c.x), normalize(c.y))
}

/// Report every link whose 1D source location is shared.
///
/// A location is shared when other calculation points sit at the same
/// coordinate, or when another link's 1D end resolves there (through
/// the same point or a coincident one). Coincidence is decided by exact
/// coordinate equality, not by index. One warning is
/// produced per affected link, in link order, naming the other nodes and
/// the other links at that location. Links whose 1D index is out of
/// range or whose node has a non-finite coordinate are skipped.
#[must_use]
pub fn find_duplicate_source_locations(
    links: &[Link],
    discretization: &Discretization,
) -> Vec<Diagnostic> {
    let finite_key = |index: usize| {
        let c = discretization.points.get(index)?.coordinate;
        (c.x.is_finite() && c.y.is_finite()).then(|| coordinate_key(c))
    };

    let mut points_at: HashMap<(u64, u64), Vec<usize>> = HashMap::new();
    for index in 0..discretization.len() {
        if let Some(key) = finite_key(index) {
            points_at.entry(key).or_default().push(index);
        }
    }
    let mut links_at: HashMap<(u64, u64), Vec<usize>> = HashMap::new();
    for (position, link) in links.iter().enumerate() {
        if let Some(key) = finite_key(link.calculation_point_index) {
            links_at.entry(key).or_default().push(position);
        }
    }

    let node_name = |index: usize| {
        discretization
            .points
            .get(index)
            .map(|p| p.name.clone())
            .unwrap_or_default()
    };

    links
        .iter()
        .enumerate()
        .filter_map(|(position, link)| {
            let key = finite_key(link.calculation_point_index)?;
            let coincident: Vec<String> = points_at
                .get(&key)
                .into_iter()
                .flatten()
                .filter(|&&other| other != link.calculation_point_index)
                .map(|&other| node_name(other))
                .collect();
            let other_links: Vec<(String, String)> = links_at
                .get(&key)
                .into_iter()
                .flatten()
                .filter(|&&other| other != position)
                .filter_map(|&other| links.get(other))
                .map(|other| (other.id.clone(), node_name(other.calculation_point_index)))
                .collect();
            if coincident.is_empty() && other_links.is_empty() {
                return None;
            }
            Some(Diagnostic::new(DiagnosticKind::DuplicateSourceLocation {
                link_id: link.id.clone(),
                link_name: link.long_name.clone(),
                node: node_name(link.calculation_point_index),
                calculation_point_index: link.calculation_point_index,
                cell_index: link.cell_index,
                coincident,
                other_links,
            }))
        })
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::network::CalculationPoint;
    use crate::sink::Severity;
    use crate::types::{CoordinateSource, LinkType};

    fn point(name: &str, x: f64, y: f64) -> CalculationPoint {
        CalculationPoint {
            name: name.to_string(),
            branch: 0,
            chainage: 0.0,
            coordinate: Coord { x, y },
            file_index: None,
        }
    }

    fn link(id: &str, from: usize, to: usize) -> Link {
        Link {
            id: id.to_string(),
            long_name: format!("{id} name"),
            link_type: LinkType::Embedded,
            calculation_point_index: from,
            cell_index: to,
            geometry: None,
            file_position: 0,
            source_1d: CoordinateSource::FileCoordinates,
            source_2d: CoordinateSource::FileCoordinates,
        }
    }

    #[test]
    fn coincident_nodes_reported_once_per_link() {
        let discretization = Discretization::new(vec![
            point("N1", 5.0, 5.0),
            point("N2", 5.0, 5.0),
            point("N3", 9.0, 9.0),
        ]);
        let links = vec![link("L1", 0, 10), link("L2", 1, 11), link("L3", 2, 12)];
        let diagnostics = find_duplicate_source_locations(&links, &discretization);
        assert_eq!(diagnostics.len(), 2);
        assert!(diagnostics.iter().all(|d| d.severity == Severity::Warning));

        assert_eq!(
            diagnostics[0].kind,
            DiagnosticKind::DuplicateSourceLocation {
                link_id: "L1".into(),
                link_name: "L1 name".into(),
                node: "N1".into(),
                calculation_point_index: 0,
                cell_index: 10,
                coincident: vec!["N2".into()],
                other_links: vec![("L2".into(), "N2".into())],
            }
        );
        assert!(diagnostics[1].to_string().contains("also used by N1"));
    }

    #[test]
    fn links_sharing_one_point_are_reported() {
        let discretization =
            Discretization::new(vec![point("N1", 0.5, 0.5), point("N2", 3.0, 3.0)]);
        let links = vec![link("L1", 0, 0), link("L2", 0, 1), link("L3", 1, 2)];
        let diagnostics = find_duplicate_source_locations(&links, &discretization);
        assert_eq!(diagnostics.len(), 2);
        assert_eq!(
            diagnostics[1].kind,
            DiagnosticKind::DuplicateSourceLocation {
                link_id: "L2".into(),
                link_name: "L2 name".into(),
                node: "N1".into(),
                calculation_point_index: 0,
                cell_index: 1,
                coincident: Vec::new(),
                other_links: vec![("L1".into(), "N1".into())],
            }
        );
        assert!(diagnostics[0].to_string().contains("link 'L2' (N1)"));
    }

    #[test]
    fn unique_sources_are_silent() {
        let discretization =
            Discretization::new(vec![point("N1", 1.0, 1.0), point("N2", 2.0, 2.0)]);
        let links = vec![link("L1", 0, 0), link("L2", 1, 1)];
        assert!(find_duplicate_source_locations(&links, &discretization).is_empty());
    }

    #[test]
    fn negative_zero_matches_zero() {
        let discretization =
            Discretization::new(vec![point("N1", 0.0, 3.0), point("N2", -0.0, 3.0)]);
        let links = vec![link("L1", 0, 0)];
        assert_eq!(find_duplicate_source_locations(&links, &discretization).len(), 1);
    }

    #[test]
    fn out_of_range_and_nan_points_are_skipped() {
        let discretization = Discretization::new(vec![
            point("N1", f64::NAN, 1.0),
            point("N2", f64::NAN, 1.0),
        ]);
        let links = vec![link("L1", 0, 0), link("L2", 7, 0)];
        assert!(find_duplicate_source_locations(&links, &discretization).is_empty());
    }
}
