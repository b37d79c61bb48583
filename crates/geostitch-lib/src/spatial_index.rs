//! Quadtree spatial index for bulk intersection queries
//!
//! The tree partitions longitude/latitude space into NW/NE/SW/SE quadrants. Each entry
//! is stored at the deepest node whose quadrant fully contains its bounding box, so a
//! query only descends into quadrants that overlap the query rectangle. Exact geometric
//! tests are done afterwards, in parallel, on the few candidates left.

use crate::HasChain;
use geo::{BoundingRect, Coord, Intersects, MultiPolygon, Rect};
use rayon::prelude::*;

/// Maximum depth of the quadtree. At depth 16 a quadrant is about 0.005° wide.
const MAX_DEPTH: u32 = 16;

/// One indexed item: its position in the caller's slice and its bounding box
#[derive(Clone, Copy, Debug)]
struct Entry {
    slot: usize,
    bbox: Rect<f64>,
}

/// Quadtree over item bounding boxes
#[derive(Debug, Clone)]
pub struct SpatialIndex {
    /// Root node covering the whole longitude/latitude range
    root: QuadtreeNode,
    len: usize,
}

/// A single node of the quadtree
#[derive(Debug, Clone)]
struct QuadtreeNode {
    /// Bounding box in degrees
    bounding_box: Rect<f64>,
    /// Depth level in the tree (0 = root)
    level: u32,
    /// Entries that no child quadrant fully contains
    entries: Vec<Entry>,
    /// Child nodes (NW, NE, SW, SE) if subdivided
    children: Option<Box<[QuadtreeNode; 4]>>,
}

impl Default for SpatialIndex {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg_attr(feature = "profiling", profiling::all_functions)]
impl SpatialIndex {
    /// Create an empty index covering the whole globe
    pub fn new() -> Self {
        Self {
            root: QuadtreeNode::new_root(),
            len: 0,
        }
    }

    /// Index every item of a slice by its chain's bounding box; slots are slice positions
    pub fn from_items<T: HasChain>(items: &[T]) -> Self {
        let mut index = Self::new();
        for (slot, item) in items.iter().enumerate() {
            index.insert(slot, item.chain().bounding_rect());
        }
        index
    }

    pub fn insert(&mut self, slot: usize, bbox: Rect<f64>) {
        self.root.insert(Entry { slot, bbox });
        self.len += 1;
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Slots whose bounding box overlaps `rect`, in ascending order
    pub fn query_rect(&self, rect: Rect<f64>) -> Vec<usize> {
        let mut results = Vec::new();
        self.root.query(rect, &mut results);
        results.sort_unstable();
        results
    }

    /// Slots of the items whose chain intersects `clip`, in ascending order
    ///
    /// `items` must be the slice the index was built from.
    pub fn intersecting<T: HasChain + Sync>(
        &self,
        items: &[T],
        clip: &MultiPolygon<f64>,
    ) -> Vec<usize> {
        #[cfg(feature = "profiling")]
        profiling::scope!("spatial_index::intersecting");

        let Some(clip_rect) = clip.bounding_rect() else {
            return Vec::new();
        };
        let candidates = self.query_rect(clip_rect);
        tracing::debug!(
            "Boundary query: {} candidates out of {} items",
            candidates.len(),
            self.len
        );

        candidates
            .into_par_iter()
            .filter(|&slot| {
                items.get(slot).is_some_and(|item| {
                    let line = item.chain().line_string();
                    clip.0.iter().any(|polygon| line.intersects(polygon))
                })
            })
            .collect()
    }
}

impl QuadtreeNode {
    /// Create a root node covering the entire longitude/latitude range
    fn new_root() -> Self {
        Self::new_child(
            Rect::new(Coord { x: -180.0, y: -90.0 }, Coord { x: 180.0, y: 90.0 }),
            0,
        )
    }

    fn new_child(bounding_box: Rect<f64>, level: u32) -> Self {
        Self {
            bounding_box,
            level,
            entries: Vec::new(),
            children: None,
        }
    }

    /// Bounding boxes of the four quadrants: NW, NE, SW, SE
    fn quadrants(&self) -> [Rect<f64>; 4] {
        let min = self.bounding_box.min();
        let max = self.bounding_box.max();
        let mid_x = (min.x + max.x) / 2.0;
        let mid_y = (min.y + max.y) / 2.0;

        [
            Rect::new(Coord { x: min.x, y: mid_y }, Coord { x: mid_x, y: max.y }),
            Rect::new(Coord { x: mid_x, y: mid_y }, Coord { x: max.x, y: max.y }),
            Rect::new(Coord { x: min.x, y: min.y }, Coord { x: mid_x, y: mid_y }),
            Rect::new(Coord { x: mid_x, y: min.y }, Coord { x: max.x, y: mid_y }),
        ]
    }

    /// Subdivide this node into 4 children
    fn subdivide(&mut self) {
        if self.children.is_some() {
            return; // Already subdivided
        }

        let child_level = self.level + 1;
        let [nw, ne, sw, se] = self.quadrants();
        self.children = Some(Box::new([
            QuadtreeNode::new_child(nw, child_level),
            QuadtreeNode::new_child(ne, child_level),
            QuadtreeNode::new_child(sw, child_level),
            QuadtreeNode::new_child(se, child_level),
        ]));
    }

    /// Insert an entry at the deepest node that fully contains it
    fn insert(&mut self, entry: Entry) {
        if self.level < MAX_DEPTH {
            let target = self
                .quadrants()
                .iter()
                .position(|quadrant| rect_contains(*quadrant, entry.bbox));
            if let Some(target) = target {
                self.subdivide();
                if let Some(children) = &mut self.children {
                    children[target].insert(entry);
                    return;
                }
            }
        }
        self.entries.push(entry);
    }

    /// Collect entries overlapping `rect` from this node and its children
    fn query(&self, rect: Rect<f64>, results: &mut Vec<usize>) {
        // Entries outside the globe's range end up at the root, so they are checked
        // even when the node itself does not overlap
        results.extend(
            self.entries
                .iter()
                .filter(|entry| rects_overlap(entry.bbox, rect))
                .map(|entry| entry.slot),
        );

        if let Some(children) = &self.children {
            for child in children.iter() {
                if rects_overlap(child.bounding_box, rect) {
                    child.query(rect, results);
                }
            }
        }
    }
}

/// Whether `outer` fully contains `inner` (borders included)
fn rect_contains(outer: Rect<f64>, inner: Rect<f64>) -> bool {
    let (omin, omax) = (outer.min(), outer.max());
    let (imin, imax) = (inner.min(), inner.max());
    imin.x >= omin.x && imax.x <= omax.x && imin.y >= omin.y && imax.y <= omax.y
}

/// Whether two rectangles overlap (touching counts)
fn rects_overlap(a: Rect<f64>, b: Rect<f64>) -> bool {
    let (amin, amax) = (a.min(), a.max());
    let (bmin, bmax) = (b.min(), b.max());
    !(amax.x < bmin.x || amin.x > bmax.x || amax.y < bmin.y || amin.y > bmax.y)
}

/// Keep only the items whose chain intersects the boundary, preserving order
pub fn clip_to_boundary<T: HasChain + Sync>(items: Vec<T>, boundary: &MultiPolygon<f64>) -> Vec<T> {
    #[cfg(feature = "profiling")]
    profiling::scope!("spatial_index::clip_to_boundary");

    let index = SpatialIndex::from_items(&items);
    let mut keep = vec![false; items.len()];
    for slot in index.intersecting(&items, boundary) {
        keep[slot] = true;
    }

    let before = items.len();
    let kept: Vec<T> = items
        .into_iter()
        .zip(keep)
        .filter_map(|(item, keep)| keep.then_some(item))
        .collect();
    tracing::info!(
        "Boundary clip kept {} of {} items",
        kept.len(),
        before
    );
    kept
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Chain, FeatureCategory, Fragment};
    use geo::{LineString, Polygon};

    fn fragment(id: u64, points: &[(f64, f64)]) -> Fragment {
        Fragment::new(
            id,
            None,
            FeatureCategory::Highway,
            0,
            Chain::from_lon_lat(points).unwrap(),
        )
    }

    fn square_boundary(min: f64, max: f64) -> MultiPolygon<f64> {
        MultiPolygon::new(vec![Polygon::new(
            LineString::from(vec![(min, min), (max, min), (max, max), (min, max), (min, min)]),
            vec![],
        )])
    }

    fn rect(min: (f64, f64), max: (f64, f64)) -> Rect<f64> {
        Rect::new(Coord { x: min.0, y: min.1 }, Coord { x: max.0, y: max.1 })
    }

    #[test]
    fn test_spatial_index_creation() {
        let index = SpatialIndex::new();
        assert!(index.is_empty());
        assert!(index.query_rect(rect((-180.0, -90.0), (180.0, 90.0))).is_empty());
    }

    #[test]
    fn test_query_rect() {
        let mut index = SpatialIndex::new();
        index.insert(0, rect((121.0, 25.0), (121.1, 25.1)));
        index.insert(1, rect((-70.0, -30.0), (-69.0, -29.0)));
        // Straddles the prime meridian and the equator, stays at the root
        index.insert(2, rect((-1.0, -1.0), (1.0, 1.0)));
        assert_eq!(index.len(), 3);

        assert_eq!(index.query_rect(rect((120.0, 24.0), (122.0, 26.0))), vec![0]);
        assert_eq!(index.query_rect(rect((0.5, 0.5), (0.6, 0.6))), vec![2]);
        assert_eq!(
            index.query_rect(rect((-180.0, -90.0), (180.0, 90.0))),
            vec![0, 1, 2]
        );
        assert!(index.query_rect(rect((10.0, 10.0), (11.0, 11.0))).is_empty());
    }

    #[test]
    fn test_entries_outside_range_are_found() {
        let mut index = SpatialIndex::new();
        index.insert(0, rect((185.0, 0.0), (186.0, 1.0)));
        assert_eq!(index.query_rect(rect((184.0, -1.0), (190.0, 2.0))), vec![0]);
    }

    #[test]
    fn test_deep_insert_respects_max_depth() {
        let mut index = SpatialIndex::new();
        // Degenerate point box: fits every quadrant down to the depth cap
        index.insert(0, rect((10.123456, 20.654321), (10.123456, 20.654321)));
        assert_eq!(
            index.query_rect(rect((10.0, 20.0), (11.0, 21.0))),
            vec![0]
        );
    }

    #[test]
    fn test_intersecting() {
        let items = vec![
            fragment(1, &[(0.5, 0.5), (0.6, 0.6)]),
            fragment(2, &[(5.0, 5.0), (6.0, 6.0)]),
            // Crosses the boundary edge
            fragment(3, &[(0.9, 0.5), (1.5, 0.5)]),
            // Inside the bounding box of the boundary but outside the polygon
            fragment(4, &[(2.5, 2.5), (2.6, 2.6)]),
        ];
        let boundary = MultiPolygon::new(vec![
            Polygon::new(
                LineString::from(vec![(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0), (0.0, 0.0)]),
                vec![],
            ),
            Polygon::new(
                LineString::from(vec![(3.0, 3.0), (4.0, 3.0), (4.0, 4.0), (3.0, 4.0), (3.0, 3.0)]),
                vec![],
            ),
        ]);

        let index = SpatialIndex::from_items(&items);
        assert_eq!(index.intersecting(&items, &boundary), vec![0, 2]);
    }

    #[test]
    fn test_clip_to_boundary() {
        let items = vec![
            fragment(1, &[(0.5, 0.5), (0.6, 0.6)]),
            fragment(2, &[(5.0, 5.0), (6.0, 6.0)]),
            fragment(3, &[(0.1, 0.9), (0.2, 0.8)]),
        ];
        let kept = clip_to_boundary(items, &square_boundary(0.0, 1.0));
        assert_eq!(kept.iter().map(|f| f.id).collect::<Vec<_>>(), vec![1, 3]);
    }

    #[test]
    fn test_clip_with_empty_boundary() {
        let items = vec![fragment(1, &[(0.5, 0.5), (0.6, 0.6)])];
        let kept = clip_to_boundary(items, &MultiPolygon::new(vec![]));
        assert!(kept.is_empty());
    }
}
