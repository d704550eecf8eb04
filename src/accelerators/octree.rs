//! Octree over point data.

use crate::core::common::*;
use crate::core::geometry::{Bounds3f, Point3f};
use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// Point data stored in an octree.
pub trait PointData: Clone {
    /// Returns the point's position.
    fn position(&self) -> Point3f;
}

/// A search hit: the stored datum and its squared distance to the query
/// point.
#[derive(Clone, Debug)]
pub struct SearchResult<T> {
    /// The stored datum.
    pub data: T,

    /// Squared distance to the query point.
    pub distance2: Float,
}

/// A bounded octree over point data. Nodes are axis-aligned cubes holding up
/// to `max_node_data` points before subdividing into eight octants. Built by
/// insertion, then consumed by `LinearOctree` for query time.
pub struct Octree<T: PointData> {
    pub(super) bounds: Bounds3f,
    pub(super) max_node_data: usize,
    pub(super) data: Vec<T>,
    /// Empty for leaves, exactly eight entries otherwise.
    pub(super) octants: Vec<Octree<T>>,
}

/// Nodes smaller than this stop subdividing; a denser cluster of coincident
/// points would otherwise recurse without bound.
const MIN_NODE_EXTENT: Float = 1e-9;

impl<T: PointData> Octree<T> {
    /// Create a new octree covering a bounding box.
    ///
    /// * `bounds`        - The bounding box; the root node is the smallest
    ///                     enclosing cube.
    /// * `max_node_data` - Leaf capacity before subdivision.
    pub fn new(bounds: Bounds3f, max_node_data: usize) -> Self {
        Self::with_cube(bounds.enclosing_cube(), max_node_data)
    }

    fn with_cube(bounds: Bounds3f, max_node_data: usize) -> Self {
        Self {
            bounds,
            max_node_data,
            data: Vec::new(),
            octants: Vec::new(),
        }
    }

    fn is_leaf(&self) -> bool {
        self.octants.is_empty()
    }

    /// Returns the number of stored points.
    pub fn len(&self) -> usize {
        self.data.len() + self.octants.iter().map(Octree::len).sum::<usize>()
    }

    /// Returns true if no points are stored.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty() && self.octants.iter().all(Octree::is_empty)
    }

    /// Insert a datum. Descends to the octant containing its position,
    /// subdividing full leaves along the way.
    ///
    /// * `datum` - The datum to insert.
    pub fn insert(&mut self, datum: T) {
        let position = datum.position();
        debug_assert!(self.bounds.contains(&position));

        let mut node = self;
        loop {
            if node.is_leaf() {
                let full = node.data.len() >= node.max_node_data;
                let can_split = node.bounds.diagonal().max_component() > MIN_NODE_EXTENT;
                if full && can_split {
                    node.subdivide();
                } else {
                    node.data.push(datum);
                    return;
                }
            }
            let octant = node.bounds.octant_of(&position);
            node = &mut node.octants[octant];
        }
    }

    fn subdivide(&mut self) {
        self.octants = (0..8)
            .map(|i| Octree::with_cube(self.bounds.octant(i), self.max_node_data))
            .collect();
        for datum in self.data.drain(..) {
            let octant = self.bounds.octant_of(&datum.position());
            self.octants[octant].data.push(datum);
        }
    }

    /// Returns up to `k` stored points closest to a query position within a
    /// maximum radius, sorted by ascending squared distance.
    ///
    /// * `position`   - The query position.
    /// * `k`          - Maximum number of results.
    /// * `max_radius` - Maximum search radius.
    pub fn knn_search(&self, position: &Point3f, k: usize, max_radius: Float) -> Vec<SearchResult<T>> {
        let mut heap = KnnHeap::new(k, max_radius);
        if k > 0 {
            self.knn_node(position, &mut heap);
        }
        heap.into_sorted_results()
    }

    fn knn_node(&self, position: &Point3f, heap: &mut KnnHeap<T>) {
        if self.is_leaf() {
            for datum in &self.data {
                heap.consider(datum, position);
            }
            return;
        }

        // Visit children in ascending distance order; closer octants shrink
        // the search radius before farther ones are tested.
        let mut order: [(Float, usize); 8] = [(0.0, 0); 8];
        for (i, (d2, octant)) in order.iter_mut().enumerate() {
            *d2 = self.octants[i].bounds.distance_squared(position);
            *octant = i;
        }
        order.sort_by(|a, b| a.0.total_cmp(&b.0));

        for (d2, octant) in order {
            if d2 > heap.radius2() {
                break;
            }
            self.octants[octant].knn_node(position, heap);
        }
    }

    /// Returns true iff no stored point lies within `radius` of the query
    /// position.
    ///
    /// * `position` - The query position.
    /// * `radius`   - The query radius.
    pub fn radius_empty(&self, position: &Point3f, radius: Float) -> bool {
        !self.any_within(position, radius * radius)
    }

    fn any_within(&self, position: &Point3f, radius2: Float) -> bool {
        if self.bounds.distance_squared(position) > radius2 {
            return false;
        }
        if self.is_leaf() {
            return self
                .data
                .iter()
                .any(|d| d.position().distance_squared(position) <= radius2);
        }
        self.octants.iter().any(|o| o.any_within(position, radius2))
    }
}

/// Bounded max-heap used by the k-NN search. The search radius shrinks to
/// the current worst candidate once the heap is full.
pub(super) struct KnnHeap<T> {
    heap: BinaryHeap<HeapEntry<T>>,
    k: usize,
    radius2: Float,
}

impl<T: PointData> KnnHeap<T> {
    pub(super) fn new(k: usize, max_radius: Float) -> Self {
        Self {
            heap: BinaryHeap::with_capacity(k + 1),
            k,
            radius2: max_radius * max_radius,
        }
    }

    pub(super) fn radius2(&self) -> Float {
        self.radius2
    }

    pub(super) fn consider(&mut self, datum: &T, position: &Point3f) {
        let distance2 = datum.position().distance_squared(position);
        if distance2 > self.radius2 {
            return;
        }
        self.heap.push(HeapEntry {
            distance2,
            data: datum.clone(),
        });
        if self.heap.len() > self.k {
            self.heap.pop();
        }
        if self.heap.len() == self.k {
            self.radius2 = self.heap.peek().map_or(self.radius2, |e| e.distance2);
        }
    }

    pub(super) fn into_sorted_results(self) -> Vec<SearchResult<T>> {
        self.heap
            .into_sorted_vec()
            .into_iter()
            .map(|e| SearchResult {
                data: e.data,
                distance2: e.distance2,
            })
            .collect()
    }
}

struct HeapEntry<T> {
    distance2: Float,
    data: T,
}

impl<T> PartialEq for HeapEntry<T> {
    fn eq(&self, other: &Self) -> bool {
        self.distance2 == other.distance2
    }
}

impl<T> Eq for HeapEntry<T> {}

impl<T> PartialOrd for HeapEntry<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for HeapEntry<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.distance2.total_cmp(&other.distance2)
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
pub(super) mod tests {
    use super::*;
    use proptest::prelude::*;

    impl PointData for Point3f {
        fn position(&self) -> Point3f {
            *self
        }
    }

    pub(in crate::accelerators) fn brute_force_knn(
        points: &[Point3f],
        position: &Point3f,
        k: usize,
        max_radius: Float,
    ) -> Vec<Float> {
        let mut d2: Vec<Float> = points
            .iter()
            .map(|p| p.distance_squared(position))
            .filter(|d2| *d2 <= max_radius * max_radius)
            .collect();
        d2.sort_by(|a, b| a.total_cmp(b));
        d2.truncate(k);
        d2
    }

    pub(in crate::accelerators) fn arb_points() -> impl Strategy<Value = Vec<Point3f>> {
        prop::collection::vec(
            (0.0..10.0f64, 0.0..10.0f64, 0.0..10.0f64)
                .prop_map(|(x, y, z)| Point3f::new(x, y, z)),
            0..200,
        )
    }

    pub(in crate::accelerators) fn test_bounds() -> Bounds3f {
        Bounds3f::new(Point3f::ZERO, Point3f::splat(10.0))
    }

    fn build(points: &[Point3f], max_node_data: usize) -> Octree<Point3f> {
        let mut tree = Octree::new(test_bounds(), max_node_data);
        for p in points {
            tree.insert(*p);
        }
        tree
    }

    #[test]
    fn knn_on_empty_tree_is_empty() {
        let tree: Octree<Point3f> = Octree::new(test_bounds(), 4);
        assert!(tree.knn_search(&Point3f::splat(5.0), 10, 100.0).is_empty());
        assert!(tree.radius_empty(&Point3f::splat(5.0), 100.0));
    }

    #[test]
    fn single_point_with_large_k() {
        let tree = build(&[Point3f::splat(2.0)], 4);
        let results = tree.knn_search(&Point3f::splat(1.0), 50, 10.0);
        assert_eq!(results.len(), 1);
        assert!((results[0].distance2 - 3.0).abs() < 1e-12);
    }

    #[test]
    fn boundary_points_are_retrievable() {
        // A dense set of points on subdivision planes must all be assigned
        // to a consistent octant and found again.
        let mut points = Vec::new();
        for i in 0..20 {
            let t = i as Float * 0.5;
            points.push(Point3f::new(5.0, t, t));
            points.push(Point3f::new(t, 5.0, t));
            points.push(Point3f::new(t, t, 5.0));
        }
        let tree = build(&points, 2);
        assert_eq!(tree.len(), points.len());
        let results = tree.knn_search(&Point3f::splat(5.0), points.len(), 100.0);
        assert_eq!(results.len(), points.len());
    }

    #[test]
    fn coincident_points_do_not_recurse_forever() {
        let points = vec![Point3f::splat(1.0); 64];
        let tree = build(&points, 4);
        assert_eq!(tree.len(), 64);
        assert_eq!(tree.knn_search(&Point3f::splat(1.0), 64, 1.0).len(), 64);
    }

    proptest! {
        #[test]
        fn knn_agrees_with_brute_force(
            points in arb_points(),
            qx in 0.0..10.0f64,
            qy in 0.0..10.0f64,
            qz in 0.0..10.0f64,
            k in 1usize..20,
            radius in 0.1..15.0f64,
        ) {
            let tree = build(&points, 4);
            let q = Point3f::new(qx, qy, qz);
            let expected = brute_force_knn(&points, &q, k, radius);
            let actual: Vec<Float> =
                tree.knn_search(&q, k, radius).iter().map(|r| r.distance2).collect();
            prop_assert_eq!(actual, expected);
        }

        #[test]
        fn radius_empty_matches_knn(
            points in arb_points(),
            qx in 0.0..10.0f64,
            qy in 0.0..10.0f64,
            qz in 0.0..10.0f64,
            radius in 0.1..15.0f64,
        ) {
            let tree = build(&points, 4);
            let q = Point3f::new(qx, qy, qz);
            prop_assert_eq!(
                tree.radius_empty(&q, radius),
                tree.knn_search(&q, 1, radius).is_empty()
            );
        }

        #[test]
        fn results_are_sorted_and_within_radius(
            points in arb_points(),
            k in 1usize..10,
            radius in 0.1..5.0f64,
        ) {
            let tree = build(&points, 4);
            let q = Point3f::splat(5.0);
            let results = tree.knn_search(&q, k, radius);
            prop_assert!(results.len() <= k);
            for pair in results.windows(2) {
                prop_assert!(pair[0].distance2 <= pair[1].distance2);
            }
            for r in &results {
                prop_assert!(r.distance2 <= radius * radius);
            }
        }
    }
}
