//! Spatial indexes over axis-aligned bounding boxes.
//!
//! Link resolution only needs two operations from an index: insert an
//! object's footprint under its runtime index, and list the indices
//! whose footprint overlaps a query rectangle. This module defines the
//! [`SpatialIndex`] trait for that contract and the
//! [`SpatialIndexKind`] enum for runtime selection of a backend.

use geo::{Coord, Rect};
use rstar::primitives::{GeomWithData, Rectangle};
use rstar::{AABB, RTree};
use serde::{Deserialize, Serialize};

/// Selects which spatial index backend to build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SpatialIndexKind {
    /// Region quadtree over a fixed envelope with a bounded depth.
    ///
    /// The depth is derived from the object count, which keeps the
    /// candidate set per query small without allocating many empty
    /// nodes for small models.
    #[default]
    QuadTree,

    /// R\*-tree from the `rstar` crate, bulk-loaded.
    ///
    /// Ignores the envelope and depth hints.
    RTree,
}

impl SpatialIndexKind {
    /// Build an index of this kind holding `items`.
    ///
    /// `envelope` and `max_depth` shape a [`QuadTree`]; items outside the
    /// envelope are still indexed.
    #[must_use]
    pub fn build(
        self,
        envelope: Rect<f64>,
        max_depth: usize,
        items: Vec<(usize, Rect<f64>)>,
    ) -> Box<dyn SpatialIndex> {
        match self {
            Self::QuadTree => {
                let mut tree = QuadTree::new(envelope, max_depth);
                for (id, bbox) in items {
                    tree.insert(id, bbox);
                }
                Box::new(tree)
            }
            Self::RTree => Box::new(RTreeIndex::bulk_load(items)),
        }
    }
}

/// A bounding-box index keyed by runtime object index.
///
/// Queries take `&self` so a built index can be shared by every worker
/// thread of a resolution pass.
pub trait SpatialIndex: Send + Sync {
    /// Add an object footprint.
    fn insert(&mut self, id: usize, bbox: Rect<f64>);

    /// Ids of all objects whose footprint overlaps `rect`, in no
    /// particular order.
    fn query(&self, rect: &Rect<f64>) -> Vec<usize>;

    /// Number of indexed objects.
    fn len(&self) -> usize;

    /// Returns `true` if nothing has been inserted.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Closed-interval overlap test.
fn rects_overlap(a: &Rect<f64>, b: &Rect<f64>) -> bool {
    a.min().x <= b.max().x
        && b.min().x <= a.max().x
        && a.min().y <= b.max().y
        && b.min().y <= a.max().y
}

/// Whether `outer` fully contains `inner`, boundary included.
fn rect_contains(outer: &Rect<f64>, inner: &Rect<f64>) -> bool {
    outer.min().x <= inner.min().x
        && outer.min().y <= inner.min().y
        && inner.max().x <= outer.max().x
        && inner.max().y <= outer.max().y
}

/// Region quadtree with a maximum depth.
///
/// Each item lives in the deepest node whose bounds fully contain it, so
/// an item is stored exactly once and queries never return duplicates.
/// Items that straddle a split line stay in the parent; items outside
/// the root envelope stay in the root.
#[derive(Debug, Clone)]
pub struct QuadTree {
    root: QuadNode,
    max_depth: usize,
    len: usize,
}

#[derive(Debug, Clone)]
struct QuadNode {
    bounds: Rect<f64>,
    items: Vec<(usize, Rect<f64>)>,
    children: Option<Box<[Self; 4]>>,
}

impl QuadNode {
    const fn new(bounds: Rect<f64>) -> Self {
        Self {
            bounds,
            items: Vec::new(),
            children: None,
        }
    }

    fn quadrants(bounds: Rect<f64>) -> [Self; 4] {
        let min = bounds.min();
        let max = bounds.max();
        let center = bounds.center();
        [
            Self::new(Rect::new(min, center)),
            Self::new(Rect::new(
                Coord {
                    x: center.x,
                    y: min.y,
                },
                Coord {
                    x: max.x,
                    y: center.y,
                },
            )),
            Self::new(Rect::new(
                Coord {
                    x: min.x,
                    y: center.y,
                },
                Coord {
                    x: center.x,
                    y: max.y,
                },
            )),
            Self::new(Rect::new(center, max)),
        ]
    }

    fn insert(&mut self, id: usize, bbox: Rect<f64>, depth: usize, max_depth: usize) {
        if depth < max_depth {
            let bounds = self.bounds;
            let children = self
                .children
                .get_or_insert_with(|| Box::new(Self::quadrants(bounds)));
            if let Some(child) = children
                .iter_mut()
                .find(|child| rect_contains(&child.bounds, &bbox))
            {
                child.insert(id, bbox, depth + 1, max_depth);
                return;
            }
        }
        self.items.push((id, bbox));
    }

    fn query(&self, rect: &Rect<f64>, out: &mut Vec<usize>) {
        out.extend(
            self.items
                .iter()
                .filter(|(_, bbox)| rects_overlap(bbox, rect))
                .map(|&(id, _)| id),
        );
        if let Some(children) = &self.children {
            for child in children.iter() {
                if rects_overlap(&child.bounds, rect) {
                    child.query(rect, out);
                }
            }
        }
    }
}

impl QuadTree {
    /// Create an empty tree covering `envelope`, subdividing at most
    /// `max_depth` times.
    #[must_use]
    pub const fn new(envelope: Rect<f64>, max_depth: usize) -> Self {
        Self {
            root: QuadNode::new(envelope),
            max_depth,
            len: 0,
        }
    }

    /// The envelope the tree was created over.
    #[must_use]
    pub const fn envelope(&self) -> Rect<f64> {
        self.root.bounds
    }

    /// Maximum subdivision depth.
    #[must_use]
    pub const fn max_depth(&self) -> usize {
        self.max_depth
    }
}

impl SpatialIndex for QuadTree {
    fn insert(&mut self, id: usize, bbox: Rect<f64>) {
        if rect_contains(&self.root.bounds, &bbox) {
            self.root.insert(id, bbox, 0, self.max_depth);
        } else {
            self.root.items.push((id, bbox));
        }
        self.len += 1;
    }

    fn query(&self, rect: &Rect<f64>) -> Vec<usize> {
        let mut out = Vec::new();
        // Root items may lie outside the root bounds, so the root is
        // always scanned.
        self.root.query(rect, &mut out);
        out
    }

    fn len(&self) -> usize {
        self.len
    }
}

/// A footprint rectangle tagged with its runtime index.
type IndexedRect = GeomWithData<Rectangle<[f64; 2]>, usize>;

fn to_rectangle(rect: &Rect<f64>) -> Rectangle<[f64; 2]> {
    Rectangle::from_corners([rect.min().x, rect.min().y], [rect.max().x, rect.max().y])
}

/// Spatial index backed by an `rstar` R\*-tree.
#[derive(Debug, Clone, Default)]
pub struct RTreeIndex {
    tree: RTree<IndexedRect>,
}

impl RTreeIndex {
    /// Build a tree from all items at once.
    #[must_use]
    pub fn bulk_load(items: Vec<(usize, Rect<f64>)>) -> Self {
        let entries = items
            .into_iter()
            .map(|(id, bbox)| GeomWithData::new(to_rectangle(&bbox), id))
            .collect();
        Self {
            tree: RTree::bulk_load(entries),
        }
    }
}

impl SpatialIndex for RTreeIndex {
    fn insert(&mut self, id: usize, bbox: Rect<f64>) {
        self.tree.insert(GeomWithData::new(to_rectangle(&bbox), id));
    }

    fn query(&self, rect: &Rect<f64>) -> Vec<usize> {
        let envelope =
            AABB::from_corners([rect.min().x, rect.min().y], [rect.max().x, rect.max().y]);
        self.tree
            .locate_in_envelope_intersecting(&envelope)
            .map(|entry| entry.data)
            .collect()
    }

    fn len(&self) -> usize {
        self.tree.size()
    }
}
