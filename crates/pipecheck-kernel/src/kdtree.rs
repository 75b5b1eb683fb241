//! 2-D k-d tree over pixel centroids.
//!
//! Median-split construction, single-nearest-neighbour queries with an
//! inclusive radius cutoff. Points with non-finite coordinates are left out
//! of the tree and can never be returned.
//!
//! Ties between equidistant points resolve to the lowest input index.

use std::cmp::Ordering;

/// Result of a nearest-neighbour query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    /// Position of the point in the slice the tree was built from.
    pub index: usize,
    pub distance: f64,
}

#[derive(Debug, Clone)]
struct Node {
    point: [f64; 2],
    index: usize,
    axis: usize,
    left: Option<usize>,
    right: Option<usize>,
}

#[derive(Debug, Clone, Default)]
pub struct KdTree2 {
    nodes: Vec<Node>,
    root: Option<usize>,
}

impl KdTree2 {
    pub fn build(points: &[[f64; 2]]) -> Self {
        let mut items: Vec<([f64; 2], usize)> = points
            .iter()
            .enumerate()
            .filter(|(_, p)| p[0].is_finite() && p[1].is_finite())
            .map(|(index, p)| (*p, index))
            .collect();
        let mut tree = Self {
            nodes: Vec::with_capacity(items.len()),
            root: None,
        };
        tree.root = tree.build_recursive(&mut items, 0);
        tree
    }

    fn build_recursive(&mut self, items: &mut [([f64; 2], usize)], depth: usize) -> Option<usize> {
        if items.is_empty() {
            return None;
        }
        let axis = depth % 2;
        items.sort_by(|a, b| {
            a.0[axis]
                .total_cmp(&b.0[axis])
                .then_with(|| a.1.cmp(&b.1))
        });
        let mid = items.len() / 2;
        let (point, index) = items[mid];

        let slot = self.nodes.len();
        self.nodes.push(Node {
            point,
            index,
            axis,
            left: None,
            right: None,
        });

        let (left, rest) = items.split_at_mut(mid);
        let left = self.build_recursive(left, depth + 1);
        let right = self.build_recursive(&mut rest[1..], depth + 1);
        self.nodes[slot].left = left;
        self.nodes[slot].right = right;
        Some(slot)
    }

    /// Number of indexed (finite) points.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Nearest indexed point within `max_radius` of `query`, if any.
    pub fn nearest_within(&self, query: [f64; 2], max_radius: f64) -> Option<Neighbor> {
        if !query[0].is_finite() || !query[1].is_finite() || max_radius.is_nan() {
            return None;
        }
        let mut best: Option<Neighbor> = None;
        if let Some(root) = self.root {
            self.search(root, query, max_radius, &mut best);
        }
        best
    }

    fn search(&self, slot: usize, query: [f64; 2], max_radius: f64, best: &mut Option<Neighbor>) {
        let node = &self.nodes[slot];
        let distance = (query[0] - node.point[0]).hypot(query[1] - node.point[1]);
        if distance <= max_radius && is_better(distance, node.index, best.as_ref()) {
            *best = Some(Neighbor {
                index: node.index,
                distance,
            });
        }

        let diff = query[node.axis] - node.point[node.axis];
        let (near, far) = if diff < 0.0 {
            (node.left, node.right)
        } else {
            (node.right, node.left)
        };
        if let Some(child) = near {
            self.search(child, query, max_radius, best);
        }
        // The far side can only hold points at least |diff| away; equality
        // still matters for the inclusive cutoff and for index tie-breaks.
        let bound = best.map_or(max_radius, |b| b.distance);
        if diff.abs() <= bound
            && let Some(child) = far
        {
            self.search(child, query, max_radius, best);
        }
    }
}

fn is_better(distance: f64, index: usize, best: Option<&Neighbor>) -> bool {
    match best {
        None => true,
        Some(current) => match distance.total_cmp(&current.distance) {
            Ordering::Less => true,
            Ordering::Equal => index < current.index,
            Ordering::Greater => false,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_tree_finds_nothing() {
        let tree = KdTree2::build(&[]);
        assert!(tree.is_empty());
        assert_eq!(tree.nearest_within([0.0, 0.0], 10.0), None);
    }

    #[test]
    fn finds_nearest_point() {
        let tree = KdTree2::build(&[[0.0, 0.0], [10.0, 10.0], [5.0, 5.0], [9.0, 1.0]]);
        let hit = tree.nearest_within([8.0, 2.0], 5.0).expect("should match");
        assert_eq!(hit.index, 3);
        assert!((hit.distance - 2f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn radius_is_inclusive() {
        let tree = KdTree2::build(&[[0.0, 0.0]]);
        let hit = tree.nearest_within([2.0, 0.0], 2.0).expect("boundary should match");
        assert_eq!(hit.distance, 2.0);
        assert_eq!(tree.nearest_within([2.0 + 1e-9, 0.0], 2.0), None);
    }

    #[test]
    fn ties_resolve_to_lowest_index() {
        let tree = KdTree2::build(&[[2.0, 0.0], [-2.0, 0.0], [0.0, 2.0], [0.0, -2.0]]);
        let hit = tree.nearest_within([0.0, 0.0], 5.0).expect("should match");
        assert_eq!(hit.index, 0);

        let dupes = KdTree2::build(&[[1.0, 1.0], [1.0, 1.0], [1.0, 1.0]]);
        assert_eq!(dupes.nearest_within([1.0, 1.0], 1.0).map(|n| n.index), Some(0));
    }

    #[test]
    fn non_finite_points_are_skipped() {
        let tree = KdTree2::build(&[[f64::NAN, 0.0], [3.0, 0.0]]);
        assert_eq!(tree.len(), 1);
        assert_eq!(tree.nearest_within([0.0, 0.0], 5.0).map(|n| n.index), Some(1));
        assert_eq!(tree.nearest_within([f64::NAN, 0.0], 5.0), None);
    }
}
