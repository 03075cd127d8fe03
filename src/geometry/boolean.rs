// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Boolean difference of a flat face set against a tool solid
//!
//! The tool is sectioned at the plane of the board. The section outline and
//! the board boundary are overlaid, split at every crossing and
//! re-triangulated together. Triangles inside the board and outside the tool
//! section survive.

use super::bvh::Bvh;
use super::fill::{crosses_ray, insert_point, point_in_polygon, try_add_constraint, Cdt};
use super::mesh::Mesh;
use super::BoundingBox;
use crate::error::{BoardError, Result};
use ahash::{AHashMap, AHashSet};
use nalgebra::Point3;
use spade::handles::FixedVertexHandle;
use spade::Triangulation;
use tracing::debug;

/// Off-plane distance above which a vertex counts as a boolean artifact
pub const ARTIFACT_EPS: f64 = 1e-6;

/// Distance under which a tool vertex lies on the section plane
const PLANE_EPS: f64 = 1e-9;

/// Decimals used to snap overlay points that come from different segments
const SNAP_DECIMALS: i32 = 7;

/// Parametric slack when intersecting segments
const PARAM_EPS: f64 = 1e-9;

/// Offset of the side samples used to tell union boundary pieces apart
const SIDE_EPS: f64 = 1e-6;

type Point = [f64; 2];
type Segment = [Point; 2];

/// Outcome of a boolean difference
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DifferenceReport {
    /// Segments of the tool outline at the board plane
    pub section_segments: usize,
    pub faces_before: usize,
    pub faces_after: usize,
    /// Overlay edges dropped because they crossed an earlier constraint
    pub skipped_edges: usize,
}

fn snap_key(p: Point) -> (i64, i64) {
    let scale = 10f64.powi(SNAP_DECIMALS);
    ((p[0] * scale).round() as i64, (p[1] * scale).round() as i64)
}

fn segment_key(segment: &Segment) -> ((i64, i64), (i64, i64)) {
    let a = snap_key(segment[0]);
    let b = snap_key(segment[1]);
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

fn segment_bbox(segment: &Segment) -> BoundingBox {
    BoundingBox::from_points(&[
        Point3::new(segment[0][0], segment[0][1], 0.0),
        Point3::new(segment[1][0], segment[1][1], 0.0),
    ])
}

fn lerp(a: Point, b: Point, t: f64) -> Point {
    [a[0] + (b[0] - a[0]) * t, a[1] + (b[1] - a[1]) * t]
}

fn cross(a: Point, b: Point) -> f64 {
    a[0] * b[1] - a[1] * b[0]
}

fn sub(a: Point, b: Point) -> Point {
    [a[0] - b[0], a[1] - b[1]]
}

fn dot(a: Point, b: Point) -> f64 {
    a[0] * b[0] + a[1] * b[1]
}

/// Outline of `tool` where it crosses the plane `z = plane_z`.
///
/// Faces lying in the plane contribute nothing. Loose edges lying in the plane
/// are taken as they are. Duplicate segments are removed.
pub fn section_at_plane(tool: &Mesh, plane_z: f64) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut seen = AHashSet::new();
    let mut push = |segment: Segment, segments: &mut Vec<Segment>| {
        if snap_key(segment[0]) != snap_key(segment[1]) && seen.insert(segment_key(&segment)) {
            segments.push(segment);
        }
    };

    for face in &tool.faces {
        let positions: Vec<Point3<f64>> = face
            .indices
            .iter()
            .map(|&i| tool.vertices[i].position)
            .collect();
        let distances: Vec<f64> = positions.iter().map(|p| p.z - plane_z).collect();
        if distances.iter().all(|d| d.abs() <= PLANE_EPS) {
            continue;
        }

        let n = positions.len();
        let mut points: Vec<Point> = Vec::new();
        for i in 0..n {
            let j = (i + 1) % n;
            let (di, dj) = (distances[i], distances[j]);
            if di.abs() <= PLANE_EPS {
                points.push([positions[i].x, positions[i].y]);
            } else if dj.abs() > PLANE_EPS && (di < 0.0) != (dj < 0.0) {
                let t = di / (di - dj);
                points.push(lerp(
                    [positions[i].x, positions[i].y],
                    [positions[j].x, positions[j].y],
                    t,
                ));
            }
        }
        points.dedup_by(|a, b| snap_key(*a) == snap_key(*b));
        if points.len() < 2 {
            continue;
        }

        // non-convex faces may cross the plane more than once
        let origin = points[0];
        let reach = |p: &Point| dot(sub(*p, origin), sub(*p, origin));
        let far = points
            .iter()
            .copied()
            .max_by(|a, b| reach(a).total_cmp(&reach(b)))
            .unwrap_or(origin);
        let direction = sub(far, origin);
        let along = |p: &Point| dot(sub(*p, origin), direction);
        points.sort_by(|a, b| along(a).total_cmp(&along(b)));
        for pair in points.chunks_exact(2) {
            push([pair[0], pair[1]], &mut segments);
        }
    }

    for [a, b] in &tool.edges {
        let pa = tool.vertices[*a].position;
        let pb = tool.vertices[*b].position;
        if (pa.z - plane_z).abs() <= PLANE_EPS && (pb.z - plane_z).abs() <= PLANE_EPS {
            push([[pa.x, pa.y], [pb.x, pb.y]], &mut segments);
        }
    }

    segments
}

/// Record the parameters at which two segments touch or cross
fn intersect_segments(p: &Segment, q: &Segment, p_params: &mut Vec<f64>, q_params: &mut Vec<f64>) {
    let r = sub(p[1], p[0]);
    let s = sub(q[1], q[0]);
    let r_len2 = dot(r, r);
    let s_len2 = dot(s, s);
    if r_len2 == 0.0 || s_len2 == 0.0 {
        return;
    }

    let denom = cross(r, s);
    let offset = sub(q[0], p[0]);

    if denom.abs() > PARAM_EPS * (r_len2 * s_len2).sqrt() {
        let t = cross(offset, s) / denom;
        let u = cross(offset, r) / denom;
        let range = -PARAM_EPS..=1.0 + PARAM_EPS;
        if range.contains(&t) && range.contains(&u) {
            p_params.push(t.clamp(0.0, 1.0));
            q_params.push(u.clamp(0.0, 1.0));
        }
        return;
    }

    // parallel; only collinear overlaps matter
    if cross(offset, r).abs() > PARAM_EPS * r_len2.sqrt().max(1.0) {
        return;
    }
    for point in q {
        let t = dot(sub(*point, p[0]), r) / r_len2;
        if t > 0.0 && t < 1.0 {
            p_params.push(t);
        }
    }
    for point in p {
        let u = dot(sub(*point, q[0]), s) / s_len2;
        if u > 0.0 && u < 1.0 {
            q_params.push(u);
        }
    }
}

/// Split every segment wherever another segment touches or crosses it
pub fn split_at_intersections(segments: &[Segment]) -> Vec<Segment> {
    let bvh = Bvh::build(
        segments
            .iter()
            .enumerate()
            .map(|(i, s)| (i, segment_bbox(s).inflated(PARAM_EPS)))
            .collect(),
    );

    let mut params: Vec<Vec<f64>> = vec![vec![0.0, 1.0]; segments.len()];
    for (i, segment) in segments.iter().enumerate() {
        let mut own = Vec::new();
        for j in bvh.query(&segment_bbox(segment).inflated(PARAM_EPS)) {
            if j <= i {
                continue;
            }
            let mut other = Vec::new();
            intersect_segments(segment, &segments[j], &mut own, &mut other);
            params[j].extend(other);
        }
        params[i].extend(own);
    }

    let mut pieces = Vec::new();
    for (segment, mut ts) in segments.iter().zip(params) {
        ts.sort_by(f64::total_cmp);
        let points: Vec<Point> = ts
            .iter()
            .map(|&t| match t {
                t if t <= 0.0 => segment[0],
                t if t >= 1.0 => segment[1],
                t => lerp(segment[0], segment[1], t),
            })
            .collect();
        for pair in points.windows(2) {
            if snap_key(pair[0]) != snap_key(pair[1]) {
                pieces.push([pair[0], pair[1]]);
            }
        }
    }
    pieces
}

/// Boundary of the union of closed loops, as an edges-only mesh at `z`.
///
/// Loop edges are split wherever loops touch or cross. A piece is kept when
/// exactly one of its sides is covered by some loop, so edges buried inside
/// another loop and edges shared by two loops disappear.
pub fn union_outline(loops: &[Vec<Point>], z: f64) -> Mesh {
    let loops: Vec<&Vec<Point>> = loops.iter().filter(|l| l.len() >= 3).collect();
    let mut edges = Vec::new();
    for points in &loops {
        for (i, &a) in points.iter().enumerate() {
            edges.push([a, points[(i + 1) % points.len()]]);
        }
    }

    let covered = |p: Point| loops.iter().any(|l| point_in_polygon(p, l));

    let mut mesh = Mesh::new();
    let mut lookup: AHashMap<(i64, i64), usize> = AHashMap::new();
    let mut seen = AHashSet::new();
    for piece in split_at_intersections(&edges) {
        let direction = sub(piece[1], piece[0]);
        let length = dot(direction, direction).sqrt();
        if length == 0.0 || !seen.insert(segment_key(&piece)) {
            continue;
        }
        let normal = [-direction[1] / length * SIDE_EPS, direction[0] / length * SIDE_EPS];
        let mid = lerp(piece[0], piece[1], 0.5);
        let left = [mid[0] + normal[0], mid[1] + normal[1]];
        let right = [mid[0] - normal[0], mid[1] - normal[1]];
        if covered(left) == covered(right) {
            continue;
        }

        let mut vertex = |p: Point| {
            *lookup
                .entry(snap_key(p))
                .or_insert_with(|| mesh.add_vertex(Point3::new(p[0], p[1], z)))
        };
        let a = vertex(piece[0]);
        let b = vertex(piece[1]);
        mesh.add_edge(a, b);
    }
    mesh
}

fn inside(point: Point, outline: &[Segment]) -> bool {
    outline
        .iter()
        .filter(|segment| crosses_ray(point, segment[0], segment[1]))
        .count()
        % 2
        == 1
}

/// Boundary of a flat mesh as 2D segments
fn boundary_segments(mesh: &Mesh) -> Vec<Segment> {
    let mut edges = mesh.boundary_edges();
    edges.extend(mesh.free_edges());
    edges
        .iter()
        .map(|[a, b]| {
            let pa = mesh.vertices[*a].position;
            let pb = mesh.vertices[*b].position;
            [[pa.x, pa.y], [pb.x, pb.y]]
        })
        .collect()
}

/// Subtract `tool` from the flat face set `board`.
///
/// `board` must lie in one XY plane; the tool is consumed. The board is
/// re-triangulated with the tool outline at that plane cut away. A tool that
/// does not cross the plane leaves the board untouched.
pub fn boolean_difference(board: &mut Mesh, tool: Mesh) -> Result<DifferenceReport> {
    let bbox = board.bounding_box();
    if bbox.is_empty() {
        return Err(BoardError::Outline("cannot cut holes into an empty board".to_string()));
    }
    if bbox.size().z > ARTIFACT_EPS {
        return Err(BoardError::Outline(format!(
            "boolean difference expects a flat board, got a Z extent of {}",
            bbox.size().z
        )));
    }
    let plane_z = bbox.min.z;

    let section = section_at_plane(&tool, plane_z);
    let mut report = DifferenceReport {
        section_segments: section.len(),
        faces_before: board.face_count(),
        faces_after: board.face_count(),
        skipped_edges: 0,
    };
    if section.is_empty() {
        debug!("Tool does not cross the board plane, nothing to cut");
        return Ok(report);
    }

    let outline = boundary_segments(board);
    let mut overlay = outline.clone();
    overlay.extend(section.iter().copied());
    let pieces = split_at_intersections(&overlay);

    let mut cdt = Cdt::new();
    let mut points: Vec<Point> = Vec::new();
    let mut lookup: AHashMap<(i64, i64), usize> = AHashMap::new();
    let mut handles: Vec<FixedVertexHandle> = Vec::new();
    let mut owners: AHashMap<usize, usize> = AHashMap::new();

    let mut intern = |p: Point, cdt: &mut Cdt| -> Result<usize> {
        let key = snap_key(p);
        if let Some(&index) = lookup.get(&key) {
            return Ok(index);
        }
        let handle = insert_point(cdt, p[0], p[1])?;
        let index = points.len();
        points.push(p);
        handles.push(handle);
        owners.entry(handle.index()).or_insert(index);
        lookup.insert(key, index);
        Ok(index)
    };

    let mut constraints = Vec::with_capacity(pieces.len());
    for piece in &pieces {
        let a = intern(piece[0], &mut cdt)?;
        let b = intern(piece[1], &mut cdt)?;
        if a != b {
            constraints.push((a, b));
        }
    }
    for (a, b) in constraints {
        if !try_add_constraint(&mut cdt, handles[a], handles[b]) {
            report.skipped_edges += 1;
        }
    }

    let mut result = Mesh::new();
    let mut vertex_of: AHashMap<usize, usize> = AHashMap::new();
    for face in cdt.inner_faces() {
        let centroid = face.center();
        let c = [centroid.x, centroid.y];
        if !inside(c, &outline) || inside(c, &section) {
            continue;
        }

        let mut indices = Vec::with_capacity(3);
        for corner in face.vertices().iter() {
            let Some(&point) = owners.get(&corner.fix().index()) else {
                break;
            };
            let vertex = *vertex_of.entry(point).or_insert_with(|| {
                result.add_vertex(Point3::new(points[point][0], points[point][1], plane_z))
            });
            indices.push(vertex);
        }
        if indices.len() == 3 {
            result.add_face(indices);
        }
    }

    report.faces_after = result.face_count();
    if report.skipped_edges > 0 {
        debug!("Boolean overlay skipped {} crossing edge(s)", report.skipped_edges);
    }
    debug!(
        "Boolean difference: {} section segment(s), {} -> {} face(s)",
        report.section_segments, report.faces_before, report.faces_after
    );

    *board = result;
    Ok(report)
}

/// Delete vertices that left the plane `z = plane_z` during a boolean.
/// Returns the number of vertices removed.
pub fn clean_boolean_artifacts(mesh: &mut Mesh, plane_z: f64) -> usize {
    let removed = mesh.delete_vertices(|v| (v.position.z - plane_z).abs() > ARTIFACT_EPS);
    if removed > 0 {
        debug!("Removed {} off-plane boolean artifact vertex(es)", removed);
    }
    removed
}
