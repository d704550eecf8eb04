//! Packed array form of the octree.

use super::octree::{KnnHeap, Octree, PointData, SearchResult};
use crate::core::common::*;
use crate::core::geometry::{Bounds3f, Point3f};

const NO_CHILD: u32 = u32::MAX;

/// Node metadata in the packed array. Sibling entries are contiguous, so
/// traversal walks index ranges instead of chasing pointers.
#[derive(Copy, Clone, Debug, PartialEq)]
struct LinearNode {
    bounds: Bounds3f,
    data_start: u32,
    data_end: u32,
    first_child: u32,
    num_children: u8,
}

/// Read-only packed form of an `Octree`. Built once by consuming the octree
/// — the Pass 1 to Pass 2 transition — and laid out depth-first with the
/// children of each node contiguous and payloads in one shared array.
pub struct LinearOctree<T: PointData> {
    nodes: Vec<LinearNode>,
    data: Vec<T>,
}

impl<T: PointData> From<Octree<T>> for LinearOctree<T> {
    /// Flatten an octree, consuming it. Empty subtrees are dropped.
    ///
    /// * `octree` - The octree.
    fn from(octree: Octree<T>) -> Self {
        let mut linear = Self {
            nodes: vec![LinearNode {
                bounds: octree.bounds,
                data_start: 0,
                data_end: 0,
                first_child: NO_CHILD,
                num_children: 0,
            }],
            data: Vec::new(),
        };
        linear.flatten(0, octree);
        linear
    }
}

impl<T: PointData> LinearOctree<T> {
    fn flatten(&mut self, index: usize, node: Octree<T>) {
        if node.octants.is_empty() {
            let start = self.data.len() as u32;
            self.data.extend(node.data);
            self.nodes[index].data_start = start;
            self.nodes[index].data_end = self.data.len() as u32;
            return;
        }

        let children: Vec<Octree<T>> = node
            .octants
            .into_iter()
            .filter(|o| !o.is_empty())
            .collect();

        let first_child = self.nodes.len() as u32;
        self.nodes[index].first_child = first_child;
        self.nodes[index].num_children = children.len() as u8;

        for child in &children {
            self.nodes.push(LinearNode {
                bounds: child.bounds,
                data_start: 0,
                data_end: 0,
                first_child: NO_CHILD,
                num_children: 0,
            });
        }
        for (i, child) in children.into_iter().enumerate() {
            self.flatten(first_child as usize + i, child);
        }
    }

    /// Returns the number of stored points.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns true if no points are stored.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Returns the stored points in layout order.
    pub fn data(&self) -> &[T] {
        &self.data
    }

    /// Returns up to `k` stored points closest to a query position within a
    /// maximum radius, sorted by ascending squared distance. Semantics are
    /// identical to `Octree::knn_search`.
    ///
    /// * `position`   - The query position.
    /// * `k`          - Maximum number of results.
    /// * `max_radius` - Maximum search radius.
    pub fn knn_search(&self, position: &Point3f, k: usize, max_radius: Float) -> Vec<SearchResult<T>> {
        let mut heap = KnnHeap::new(k, max_radius);
        if k > 0 {
            self.knn_node(0, position, &mut heap);
        }
        heap.into_sorted_results()
    }

    fn knn_node(&self, index: usize, position: &Point3f, heap: &mut KnnHeap<T>) {
        let node = &self.nodes[index];
        if node.first_child == NO_CHILD {
            for datum in &self.data[node.data_start as usize..node.data_end as usize] {
                heap.consider(datum, position);
            }
            return;
        }

        let first = node.first_child as usize;
        let mut order: Vec<(Float, usize)> = (first..first + node.num_children as usize)
            .map(|child| (self.nodes[child].bounds.distance_squared(position), child))
            .collect();
        order.sort_by(|a, b| a.0.total_cmp(&b.0));

        for (d2, child) in order {
            if d2 > heap.radius2() {
                break;
            }
            self.knn_node(child, position, heap);
        }
    }

    /// Returns true iff no stored point lies within `radius` of the query
    /// position.
    ///
    /// * `position` - The query position.
    /// * `radius`   - The query radius.
    pub fn radius_empty(&self, position: &Point3f, radius: Float) -> bool {
        let radius2 = radius * radius;
        let mut stack = vec![0usize];
        while let Some(index) = stack.pop() {
            let node = &self.nodes[index];
            if node.bounds.distance_squared(position) > radius2 {
                continue;
            }
            if node.first_child == NO_CHILD {
                let data = &self.data[node.data_start as usize..node.data_end as usize];
                if data
                    .iter()
                    .any(|d| d.position().distance_squared(position) <= radius2)
                {
                    return false;
                }
            } else {
                let first = node.first_child as usize;
                stack.extend(first..first + node.num_children as usize);
            }
        }
        true
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::super::octree::tests::{arb_points, brute_force_knn, test_bounds};
    use super::*;
    use proptest::prelude::*;

    fn build_both(points: &[Point3f], max_node_data: usize) -> (Octree<Point3f>, LinearOctree<Point3f>) {
        let mut tree = Octree::new(test_bounds(), max_node_data);
        let mut twin = Octree::new(test_bounds(), max_node_data);
        for p in points {
            tree.insert(*p);
            twin.insert(*p);
        }
        (tree, LinearOctree::from(twin))
    }

    #[test]
    fn empty_tree_flattens_to_single_node() {
        let tree: Octree<Point3f> = Octree::new(test_bounds(), 4);
        let linear = LinearOctree::from(tree);
        assert!(linear.is_empty());
        assert!(linear.knn_search(&Point3f::splat(5.0), 10, 100.0).is_empty());
        assert!(linear.radius_empty(&Point3f::splat(5.0), 100.0));
    }

    #[test]
    fn insertion_order_determines_layout() {
        // Identical insertion sequences produce identical packed layouts.
        let points: Vec<Point3f> = (0..100)
            .map(|i| {
                let t = i as Float * 0.1;
                Point3f::new(t, (t * 7.3) % 10.0, (t * 3.7) % 10.0)
            })
            .collect();
        let (_, a) = build_both(&points, 4);
        let (_, b) = build_both(&points, 4);
        assert_eq!(a.nodes, b.nodes);
        let pa: Vec<Point3f> = a.data().to_vec();
        let pb: Vec<Point3f> = b.data().to_vec();
        assert_eq!(pa, pb);
    }

    proptest! {
        #[test]
        fn octree_and_linear_octree_agree(
            points in arb_points(),
            qx in 0.0..10.0f64,
            qy in 0.0..10.0f64,
            qz in 0.0..10.0f64,
            k in 1usize..20,
            radius in 0.1..15.0f64,
        ) {
            let (tree, linear) = build_both(&points, 4);
            let q = Point3f::new(qx, qy, qz);

            let from_tree: Vec<Float> =
                tree.knn_search(&q, k, radius).iter().map(|r| r.distance2).collect();
            let from_linear: Vec<Float> =
                linear.knn_search(&q, k, radius).iter().map(|r| r.distance2).collect();
            prop_assert_eq!(&from_tree, &from_linear);

            let expected = brute_force_knn(&points, &q, k, radius);
            prop_assert_eq!(from_linear, expected);

            prop_assert_eq!(
                tree.radius_empty(&q, radius),
                linear.radius_empty(&q, radius)
            );
        }

        #[test]
        fn repeated_queries_are_idempotent(
            points in arb_points(),
            radius in 0.1..5.0f64,
        ) {
            let (_, linear) = build_both(&points, 4);
            let q = Point3f::splat(5.0);
            let first: Vec<Float> =
                linear.knn_search(&q, 8, radius).iter().map(|r| r.distance2).collect();
            let second: Vec<Float> =
                linear.knn_search(&q, 8, radius).iter().map(|r| r.distance2).collect();
            prop_assert_eq!(first, second);
        }
    }
}
