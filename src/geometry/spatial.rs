// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Nearest-neighbour index over mesh vertices
//!
//! Used to compare vertex sets that come from different stages of the board
//! pipeline. Two vertices are the same point when they lie closer than
//! [`COINCIDENT_TOLERANCE`].

use kiddo::{KdTree, SquaredEuclidean};
use nalgebra::{Point3, Rotation3};
use std::fmt;

/// Distance under which two vertices are considered the same point
pub const COINCIDENT_TOLERANCE: f64 = 1e-4;

/// Number of decimals kept when vertices are sampled for comparison
pub const KEY_PRECISION: i32 = 4;

/// Vertex position as used for set comparisons
pub type Vertex3 = Point3<f64>;

/// Round every coordinate to `precision` decimal places
pub fn round_point(point: &Point3<f64>, precision: i32) -> Vertex3 {
    let scale = 10f64.powi(precision);
    point.map(|c| (c * scale).round() / scale)
}

/// Result of a nearest-neighbour query
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Nearest {
    pub point: Vertex3,
    /// Position of the point in the sequence the index was built from
    pub index: usize,
    pub distance: f64,
}

/// Board vertex sets are planar and often axis aligned. The tree stores them
/// in a rotated frame so no split axis sees a bucket of equal coordinates.
fn index_frame() -> Rotation3<f64> {
    Rotation3::from_euler_angles(0.31, 0.57, 0.73)
}

/// k-d tree built once from a vertex sequence
pub struct SpatialVertexIndex {
    tree: KdTree<f64, 3>,
    points: Vec<Vertex3>,
    frame: Rotation3<f64>,
}

impl SpatialVertexIndex {
    /// Build the index; item ids are positions in `points`
    pub fn build(points: &[Vertex3]) -> Self {
        let frame = index_frame();
        let mut tree: KdTree<f64, 3> = KdTree::new();
        for (i, point) in points.iter().enumerate() {
            let coords = Self::coords(&frame, point);
            #[allow(clippy::cast_possible_truncation)]
            let item = i as u64;
            tree.add(&coords, item);
        }
        Self {
            tree,
            points: points.to_vec(),
            frame,
        }
    }

    fn coords(frame: &Rotation3<f64>, point: &Vertex3) -> [f64; 3] {
        let p = frame * point;
        [p.x, p.y, p.z]
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Closest indexed vertex, `None` for an empty index.
    ///
    /// When several vertices are equally close the one the tree reaches first
    /// wins.
    pub fn nearest(&self, query: &Vertex3) -> Option<Nearest> {
        if self.points.is_empty() {
            return None;
        }
        let hit = self
            .tree
            .nearest_one::<SquaredEuclidean>(&Self::coords(&self.frame, query));
        #[allow(clippy::cast_possible_truncation)]
        let index = hit.item as usize;
        let point = *self.points.get(index)?;
        Some(Nearest {
            point,
            index,
            distance: (point - query).norm(),
        })
    }

    /// Indices of all vertices within `radius` of `query` (inclusive), ascending
    #[allow(clippy::cast_possible_truncation)]
    pub fn within_radius(&self, query: &Vertex3, radius: f64) -> Vec<usize> {
        if self.points.is_empty() || radius < 0.0 {
            return Vec::new();
        }
        let radius2 = radius * radius;
        // padded so rounding in the rotated frame cannot drop a boundary point
        let search = radius2 * (1.0 + 1e-9) + f64::EPSILON;
        let mut found: Vec<usize> = self
            .tree
            .within_unsorted::<SquaredEuclidean>(&Self::coords(&self.frame, query), search)
            .into_iter()
            .map(|neighbour| neighbour.item as usize)
            .filter(|&i| {
                self.points
                    .get(i)
                    .is_some_and(|p| (p - query).norm_squared() <= radius2)
            })
            .collect();
        found.sort_unstable();
        found
    }

    /// True if any candidate lies within [`COINCIDENT_TOLERANCE`] of an indexed vertex
    pub fn any_coincident(&self, candidates: &[Vertex3]) -> bool {
        candidates.iter().any(|candidate| {
            self.nearest(candidate)
                .is_some_and(|hit| hit.distance < COINCIDENT_TOLERANCE)
        })
    }
}

impl fmt::Debug for SpatialVertexIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpatialVertexIndex")
            .field("len", &self.points.len())
            .finish()
    }
}

/// Vertices of `main_set` that have no coincident partner in `remove_set`.
///
/// Every vertex of `remove_set` removes at most one vertex of `main_set`, so
/// duplicated points in `main_set` only disappear as often as they are
/// matched. Survivors keep their original order.
pub fn difference(main_set: &[Vertex3], remove_set: &[Vertex3]) -> Vec<Vertex3> {
    let index = SpatialVertexIndex::build(main_set);
    let mut marked = vec![false; main_set.len()];

    for vertex in remove_set {
        if let Some(hit) = index.nearest(vertex) {
            if hit.distance < COINCIDENT_TOLERANCE && !marked[hit.index] {
                marked[hit.index] = true;
            }
        }
    }

    main_set
        .iter()
        .enumerate()
        .filter(|(i, _)| !marked[*i])
        .map(|(_, vertex)| *vertex)
        .collect()
}

/// True if any vertex of `candidates` coincides with a vertex of `indexed_set`
pub fn any_coincident(indexed_set: &[Vertex3], candidates: &[Vertex3]) -> bool {
    SpatialVertexIndex::build(indexed_set).any_coincident(candidates)
}
