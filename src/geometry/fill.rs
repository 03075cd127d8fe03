// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Filling planar boundary loops with faces
//!
//! Boundary loops are triangulated with a constrained Delaunay triangulation.
//! Triangles are kept by even-odd parity: crossing a constraint edge toggles
//! between outside and inside. No Steiner points are inserted, so every
//! vertex of the filled face set lies on one of the input loops.

use super::mesh::{edge_key, Mesh};
use crate::error::{BoardError, Result};
use ahash::{AHashMap, AHashSet};
use spade::handles::{FixedFaceHandle, FixedVertexHandle, InnerTag};
use spade::{ConstrainedDelaunayTriangulation, InsertionError, Point2, Triangulation};
use std::collections::VecDeque;
use tracing::{debug, warn};

pub(crate) type Cdt = ConstrainedDelaunayTriangulation<Point2<f64>>;

/// Outcome of a fill operation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FillReport {
    pub faces_added: usize,
    /// Boundary vertices that do not close into a loop
    pub open_ends: usize,
    /// Boundary edges that crossed an earlier one and were left out
    pub skipped_edges: usize,
}

impl FillReport {
    pub fn is_closed(&self) -> bool {
        self.open_ends == 0 && self.skipped_edges == 0
    }
}

/// Insert a vertex, mapping spade errors into the crate error type
pub(crate) fn insert_point(cdt: &mut Cdt, x: f64, y: f64) -> Result<FixedVertexHandle> {
    cdt.insert(Point2::new(x, y))
        .map_err(|e: InsertionError| BoardError::Triangulation(format!("CDT insert ({x}, {y}): {e}")))
}

/// Add a constraint unless it is degenerate or crosses an existing one.
/// Returns false when the edge had to be skipped.
pub(crate) fn try_add_constraint(cdt: &mut Cdt, from: FixedVertexHandle, to: FixedVertexHandle) -> bool {
    if from == to {
        return true;
    }
    if !cdt.can_add_constraint(from, to) {
        return false;
    }
    cdt.add_constraint(from, to);
    true
}

/// Inner faces of the triangulation that lie inside an odd number of
/// constraint loops.
///
/// Flood fill starting at the faces adjacent to the convex hull. Each time a
/// constraint edge is crossed the depth increments.
pub(crate) fn interior_faces(cdt: &Cdt) -> AHashSet<usize> {
    let mut interior = AHashSet::new();
    let mut depth_map: AHashMap<usize, u32> = AHashMap::new();
    let mut queue: VecDeque<(FixedFaceHandle<InnerTag>, u32)> = VecDeque::new();

    let outer = cdt.outer_face().fix();
    for edge in cdt.directed_edges() {
        if edge.face().fix() != outer {
            continue;
        }
        if let Some(inner) = edge.rev().face().as_inner() {
            let idx = inner.fix().index();
            if depth_map.contains_key(&idx) {
                continue;
            }
            let depth = u32::from(cdt.is_constraint_edge(edge.as_undirected().fix()));
            depth_map.insert(idx, depth);
            if depth % 2 == 1 {
                interior.insert(idx);
            }
            queue.push_back((inner.fix(), depth));
        }
    }

    while let Some((face_fix, depth)) = queue.pop_front() {
        let face = cdt.face(face_fix);
        for edge in face.adjacent_edges() {
            let Some(neighbor) = edge.rev().face().as_inner() else {
                continue;
            };
            let idx = neighbor.fix().index();
            if depth_map.contains_key(&idx) {
                continue;
            }
            let depth = if cdt.is_constraint_edge(edge.as_undirected().fix()) {
                depth + 1
            } else {
                depth
            };
            depth_map.insert(idx, depth);
            if depth % 2 == 1 {
                interior.insert(idx);
            }
            queue.push_back((neighbor.fix(), depth));
        }
    }

    interior
}

/// Number of vertices with odd degree in an undirected edge set
pub(crate) fn count_open_ends(edges: &[[usize; 2]]) -> usize {
    let mut degree: AHashMap<usize, usize> = AHashMap::new();
    let mut seen = AHashSet::new();
    for [a, b] in edges {
        if a == b || !seen.insert(edge_key(*a, *b)) {
            continue;
        }
        *degree.entry(*a).or_default() += 1;
        *degree.entry(*b).or_default() += 1;
    }
    degree.values().filter(|&&d| d % 2 == 1).count()
}

/// Close every boundary loop of a mesh lying in an XY plane with faces.
///
/// The constraint set is the union of the boundary edges of existing faces
/// and of the loose edges not yet bounded by a face. New triangles that fall
/// inside an existing face are discarded. Loose edges consumed by the fill
/// are removed. A boundary that does not close is reported with a warning and
/// the remaining loops are still filled.
pub fn fill_boundary(mesh: &mut Mesh) -> Result<FillReport> {
    let mut constraints = mesh.boundary_edges();
    constraints.extend(mesh.free_edges());

    let mut report = FillReport {
        open_ends: count_open_ends(&constraints),
        ..FillReport::default()
    };
    if constraints.is_empty() {
        return Ok(report);
    }

    let mut cdt = Cdt::new();
    let mut handles: AHashMap<usize, FixedVertexHandle> = AHashMap::new();
    let mut owners: AHashMap<usize, usize> = AHashMap::new();

    for [a, b] in &constraints {
        for &vertex in [a, b] {
            if handles.contains_key(&vertex) {
                continue;
            }
            let position = mesh.vertices[vertex].position;
            let handle = insert_point(&mut cdt, position.x, position.y)?;
            handles.insert(vertex, handle);
            owners.entry(handle.index()).or_insert(vertex);
        }
    }

    for [a, b] in &constraints {
        if !try_add_constraint(&mut cdt, handles[a], handles[b]) {
            report.skipped_edges += 1;
        }
    }

    let existing: Vec<Vec<[f64; 2]>> = mesh
        .faces
        .iter()
        .map(|face| {
            face.indices
                .iter()
                .map(|&i| [mesh.vertices[i].position.x, mesh.vertices[i].position.y])
                .collect()
        })
        .collect();

    let interior = interior_faces(&cdt);
    let mut triangles = Vec::new();
    for face in cdt.inner_faces() {
        if !interior.contains(&face.fix().index()) {
            continue;
        }
        let corners = face.vertices();
        let mut indices = Vec::with_capacity(3);
        for corner in corners.iter() {
            let Some(&vertex) = owners.get(&corner.fix().index()) else {
                break;
            };
            indices.push(vertex);
        }
        if indices.len() != 3 {
            continue;
        }
        let centroid = face.center();
        if existing
            .iter()
            .any(|polygon| point_in_polygon([centroid.x, centroid.y], polygon))
        {
            continue;
        }
        triangles.push(indices);
    }

    report.faces_added = triangles.len();
    for triangle in triangles {
        mesh.add_face(triangle);
    }
    mesh.prune_covered_edges();

    if !report.is_closed() {
        warn!(
            "Fill could not close the boundary: {} open end(s), {} crossing edge(s) skipped",
            report.open_ends, report.skipped_edges
        );
    }
    debug!("Fill added {} face(s)", report.faces_added);

    Ok(report)
}

/// Even-odd point in polygon test in the XY plane
pub fn point_in_polygon(point: [f64; 2], polygon: &[[f64; 2]]) -> bool {
    let n = polygon.len();
    let mut inside = false;
    for i in 0..n {
        let a = polygon[i];
        let b = polygon[(i + 1) % n];
        if crosses_ray(point, a, b) {
            inside = !inside;
        }
    }
    inside
}

/// True if the horizontal ray from `point` towards +x crosses segment `a`-`b`
pub(crate) fn crosses_ray(point: [f64; 2], a: [f64; 2], b: [f64; 2]) -> bool {
    if (a[1] > point[1]) == (b[1] > point[1]) {
        return false;
    }
    let t = (point[1] - a[1]) / (b[1] - a[1]);
    point[0] < a[0] + t * (b[0] - a[0])
}
