// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Mesh representation and utilities

use super::spatial::{round_point, SpatialVertexIndex, Vertex3};
use super::BoundingBox;
use ahash::{AHashMap, AHashSet};
use nalgebra::{Point3, Vector3};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Relative tolerance used to decide whether a face set lies in one plane
const PLANAR_EPS: f64 = 1e-9;

/// Vertex with position and normal
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Vertex {
    pub position: Point3<f64>,
    pub normal: Vector3<f64>,
}

impl Vertex {
    pub fn new(position: Point3<f64>, normal: Vector3<f64>) -> Self {
        Self { position, normal }
    }

    pub fn at(position: Point3<f64>) -> Self {
        Self::new(position, Vector3::z())
    }
}

/// Material region a face belongs to once the board surface is classified
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SurfaceRegion {
    Top,
    Bottom,
    PlatedEdge,
    BareEdge,
}

/// Polygonal face: a vertex loop plus its unit normal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Face {
    pub indices: Vec<usize>,
    pub normal: Vector3<f64>,
    #[serde(default)]
    pub region: Option<SurfaceRegion>,
}

impl Face {
    pub fn new(indices: Vec<usize>) -> Self {
        Self {
            indices,
            normal: Vector3::zeros(),
            region: None,
        }
    }

    /// Directed edges of the loop, closing edge included
    pub fn edges(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        let n = self.indices.len();
        (0..n).map(move |i| (self.indices[i], self.indices[(i + 1) % n]))
    }

    pub fn has_directed_edge(&self, a: usize, b: usize) -> bool {
        self.edges().any(|(u, v)| u == a && v == b)
    }

    pub fn flip(&mut self) {
        self.indices.reverse();
        self.normal = -self.normal;
    }
}

/// Undirected edge key with the smaller index first
pub fn edge_key(a: usize, b: usize) -> (usize, usize) {
    if a < b {
        (a, b)
    } else {
        (b, a)
    }
}

/// Polygon mesh with optional loose edges.
///
/// Loose edges carry outlines that are not (yet) bounded by faces, such as
/// an imported board contour before it is filled.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Mesh {
    pub vertices: Vec<Vertex>,
    pub edges: Vec<[usize; 2]>,
    pub faces: Vec<Face>,
    /// Edges marked for hard shading, stored as sorted index pairs
    #[serde(default)]
    pub sharp_edges: Vec<[usize; 2]>,
}

impl Mesh {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn empty() -> Self {
        Self::new()
    }

    pub fn with_capacity(vertex_count: usize, face_count: usize) -> Self {
        Self {
            vertices: Vec::with_capacity(vertex_count),
            edges: Vec::new(),
            faces: Vec::with_capacity(face_count),
            sharp_edges: Vec::new(),
        }
    }

    /// Add a vertex and return its index
    pub fn add_vertex(&mut self, position: Point3<f64>) -> usize {
        let index = self.vertices.len();
        self.vertices.push(Vertex::at(position));
        index
    }

    /// Add a loose edge
    pub fn add_edge(&mut self, a: usize, b: usize) {
        self.edges.push([a, b]);
    }

    /// Add a face and compute its normal from the winding
    pub fn add_face(&mut self, indices: Vec<usize>) -> usize {
        let mut face = Face::new(indices);
        face.normal = self.loop_normal(&face.indices);
        self.faces.push(face);
        self.faces.len() - 1
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn face_count(&self) -> usize {
        self.faces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    pub fn positions(&self) -> Vec<Point3<f64>> {
        self.vertices.iter().map(|v| v.position).collect()
    }

    /// Vertex positions rounded to `precision` decimals, in vertex order
    pub fn vertex_keys(&self, precision: i32) -> Vec<Vertex3> {
        self.vertices
            .iter()
            .map(|v| round_point(&v.position, precision))
            .collect()
    }

    pub fn bounding_box(&self) -> BoundingBox {
        BoundingBox::from_points(self.vertices.iter().map(|v| &v.position))
    }

    pub fn translate(&mut self, offset: &Vector3<f64>) {
        for vertex in &mut self.vertices {
            vertex.position += offset;
        }
    }

    /// Independent copy, tags and sharp marks included
    pub fn duplicate(&self) -> Mesh {
        self.clone()
    }

    /// Append another mesh without any boolean processing
    pub fn merge(&mut self, other: &Mesh) {
        let offset = self.vertices.len();
        self.vertices.extend_from_slice(&other.vertices);
        self.edges
            .extend(other.edges.iter().map(|[a, b]| [a + offset, b + offset]));
        for face in &other.faces {
            let mut face = face.clone();
            face.indices.iter_mut().for_each(|i| *i += offset);
            self.faces.push(face);
        }
        self.sharp_edges
            .extend(other.sharp_edges.iter().map(|[a, b]| [a + offset, b + offset]));
    }

    /// Newell normal of a vertex loop; length is twice the polygon area
    pub fn loop_area_vector(&self, indices: &[usize]) -> Vector3<f64> {
        let n = indices.len();
        let mut normal = Vector3::zeros();
        for i in 0..n {
            let a = &self.vertices[indices[i]].position;
            let b = &self.vertices[indices[(i + 1) % n]].position;
            normal.x += (a.y - b.y) * (a.z + b.z);
            normal.y += (a.z - b.z) * (a.x + b.x);
            normal.z += (a.x - b.x) * (a.y + b.y);
        }
        normal
    }

    fn loop_normal(&self, indices: &[usize]) -> Vector3<f64> {
        let normal = self.loop_area_vector(indices);
        let length = normal.norm();
        if length > 1e-12 {
            normal / length
        } else {
            Vector3::zeros()
        }
    }

    pub fn face_centroid(&self, face: &Face) -> Point3<f64> {
        let sum = face
            .indices
            .iter()
            .fold(Vector3::zeros(), |acc, &i| acc + self.vertices[i].position.coords);
        Point3::from(sum / face.indices.len().max(1) as f64)
    }

    /// Faces adjacent to every undirected face edge
    pub fn edge_faces(&self) -> AHashMap<(usize, usize), Vec<usize>> {
        let mut map: AHashMap<(usize, usize), Vec<usize>> = AHashMap::new();
        for (face_index, face) in self.faces.iter().enumerate() {
            for (a, b) in face.edges() {
                map.entry(edge_key(a, b)).or_default().push(face_index);
            }
        }
        map
    }

    /// Face edges used by exactly one face, in the direction of that face's loop
    pub fn boundary_edges(&self) -> Vec<[usize; 2]> {
        let edge_faces = self.edge_faces();
        let mut boundary = Vec::new();
        for face in &self.faces {
            for (a, b) in face.edges() {
                if edge_faces
                    .get(&edge_key(a, b))
                    .is_some_and(|faces| faces.len() == 1)
                {
                    boundary.push([a, b]);
                }
            }
        }
        boundary
    }

    /// Loose edges that do not coincide with a face edge
    pub fn free_edges(&self) -> Vec<[usize; 2]> {
        let face_edges: AHashSet<(usize, usize)> = self
            .faces
            .iter()
            .flat_map(|face| face.edges().map(|(a, b)| edge_key(a, b)))
            .collect();
        self.edges
            .iter()
            .filter(|[a, b]| !face_edges.contains(&edge_key(*a, *b)))
            .copied()
            .collect()
    }

    /// Drop loose edges already bounded by faces
    pub fn prune_covered_edges(&mut self) {
        self.edges = self.free_edges();
    }

    /// Merge vertices closer than `tolerance`.
    ///
    /// Each vertex collapses onto the lowest-indexed vertex within range that
    /// has not itself been merged. Faces and edges that degenerate are
    /// dropped. Returns the number of vertices removed.
    pub fn merge_nearby_vertices(&mut self, tolerance: f64) -> usize {
        if self.vertices.is_empty() {
            return 0;
        }

        let original_count = self.vertices.len();
        let index = SpatialVertexIndex::build(&self.positions());
        let mut target: Vec<Option<usize>> = vec![None; original_count];
        let mut new_vertices: Vec<Vertex> = Vec::new();

        for i in 0..original_count {
            if target[i].is_some() {
                continue;
            }
            let new_index = new_vertices.len();
            new_vertices.push(self.vertices[i]);
            for j in index.within_radius(&self.vertices[i].position, tolerance) {
                if target[j].is_none() {
                    target[j] = Some(new_index);
                }
            }
        }

        let remap: Vec<usize> = target
            .into_iter()
            .enumerate()
            .map(|(i, t)| t.unwrap_or(i))
            .collect();

        self.vertices = new_vertices;
        self.remap_topology(&remap);

        original_count - self.vertices.len()
    }

    /// Rewrite every index through `remap`, dropping what degenerates
    fn remap_topology(&mut self, remap: &[usize]) {
        let mut seen_edges = AHashSet::new();
        self.edges = self
            .edges
            .iter()
            .map(|[a, b]| [remap[*a], remap[*b]])
            .filter(|[a, b]| a != b && seen_edges.insert(edge_key(*a, *b)))
            .collect();

        let mut seen_sharp = AHashSet::new();
        self.sharp_edges = self
            .sharp_edges
            .iter()
            .map(|[a, b]| {
                let (a, b) = edge_key(remap[*a], remap[*b]);
                [a, b]
            })
            .filter(|[a, b]| a != b && seen_sharp.insert((*a, *b)))
            .collect();

        for face in &mut self.faces {
            let mut indices: Vec<usize> = Vec::with_capacity(face.indices.len());
            for &i in &face.indices {
                let mapped = remap[i];
                if indices.last() != Some(&mapped) {
                    indices.push(mapped);
                }
            }
            while indices.len() > 1 && indices.first() == indices.last() {
                indices.pop();
            }
            face.indices = indices;
        }
        self.faces.retain(|face| {
            let unique: AHashSet<usize> = face.indices.iter().copied().collect();
            unique.len() >= 3
        });
    }

    /// Remove vertices matching `predicate` together with every face and edge
    /// that uses them. Returns the number of vertices removed.
    pub fn delete_vertices<F>(&mut self, predicate: F) -> usize
    where
        F: Fn(&Vertex) -> bool,
    {
        let doomed: Vec<bool> = self.vertices.iter().map(&predicate).collect();
        let removed = doomed.iter().filter(|&&d| d).count();
        if removed == 0 {
            return 0;
        }

        self.faces
            .retain(|face| face.indices.iter().all(|&i| !doomed[i]));
        self.edges.retain(|[a, b]| !doomed[*a] && !doomed[*b]);
        self.sharp_edges.retain(|[a, b]| !doomed[*a] && !doomed[*b]);

        let mut remap = vec![usize::MAX; self.vertices.len()];
        let mut kept = Vec::with_capacity(self.vertices.len() - removed);
        for (old, vertex) in self.vertices.iter().enumerate() {
            if !doomed[old] {
                remap[old] = kept.len();
                kept.push(*vertex);
            }
        }
        self.vertices = kept;
        self.remap_topology(&remap);
        removed
    }

    /// Remove vertices not referenced by any face or edge.
    /// Returns the number of vertices removed.
    pub fn remove_orphaned_vertices(&mut self) -> usize {
        let mut used = vec![false; self.vertices.len()];
        for face in &self.faces {
            for &i in &face.indices {
                used[i] = true;
            }
        }
        for [a, b] in &self.edges {
            used[*a] = true;
            used[*b] = true;
        }
        self.delete_unused(&used)
    }

    fn delete_unused(&mut self, used: &[bool]) -> usize {
        let mut remap = vec![usize::MAX; self.vertices.len()];
        let mut kept = Vec::with_capacity(self.vertices.len());
        for (old, vertex) in self.vertices.iter().enumerate() {
            if used[old] {
                remap[old] = kept.len();
                kept.push(*vertex);
            }
        }
        let removed = self.vertices.len() - kept.len();
        if removed > 0 {
            self.vertices = kept;
            self.sharp_edges.retain(|[a, b]| used[*a] && used[*b]);
            self.remap_topology(&remap);
        }
        removed
    }

    /// Make face windings consistent and outward facing, then recompute face
    /// and vertex normals.
    ///
    /// Windings are propagated across manifold edges. Each connected piece is
    /// then flipped as a whole if it encloses negative volume, or, when it is
    /// flat, if its normal points against the dominant positive axis.
    pub fn recompute_normals(&mut self) {
        self.make_winding_consistent();

        for i in 0..self.faces.len() {
            let normal = self.loop_normal(&self.faces[i].indices);
            self.faces[i].normal = normal;
        }

        let mut normal_sums: Vec<Vector3<f64>> = vec![Vector3::zeros(); self.vertices.len()];
        for face in &self.faces {
            let weighted = self.loop_area_vector(&face.indices);
            for &idx in &face.indices {
                normal_sums[idx] += weighted;
            }
        }
        for (vertex, sum) in self.vertices.iter_mut().zip(normal_sums) {
            vertex.normal = if sum.norm() > 1e-12 {
                sum.normalize()
            } else {
                Vector3::z()
            };
        }
    }

    fn make_winding_consistent(&mut self) {
        let edge_faces = self.edge_faces();
        let mut visited = vec![false; self.faces.len()];

        for seed in 0..self.faces.len() {
            if visited[seed] {
                continue;
            }
            visited[seed] = true;
            let mut component = vec![seed];
            let mut queue = VecDeque::from([seed]);

            while let Some(current) = queue.pop_front() {
                let directed: Vec<(usize, usize)> = self.faces[current].edges().collect();
                for (a, b) in directed {
                    let Some(adjacent) = edge_faces.get(&edge_key(a, b)) else {
                        continue;
                    };
                    if adjacent.len() != 2 {
                        continue;
                    }
                    let other = if adjacent[0] == current {
                        adjacent[1]
                    } else {
                        adjacent[0]
                    };
                    if visited[other] {
                        continue;
                    }
                    // a neighbour must run the shared edge the opposite way
                    if self.faces[other].has_directed_edge(a, b) {
                        self.faces[other].flip();
                    }
                    visited[other] = true;
                    component.push(other);
                    queue.push_back(other);
                }
            }

            if self.component_points_inward(&component) {
                for &face in &component {
                    self.faces[face].flip();
                }
            }
        }
    }

    fn component_points_inward(&self, component: &[usize]) -> bool {
        let area_sum = component.iter().fold(Vector3::zeros(), |acc, &f| {
            acc + self.loop_area_vector(&self.faces[f].indices)
        });

        if self.component_is_planar(component, &area_sum) {
            let dominant = area_sum.iamax();
            return area_sum[dominant] < 0.0;
        }

        let volume: f64 = component
            .iter()
            .map(|&f| {
                let indices = &self.faces[f].indices;
                let origin = self.vertices[indices[0]].position.coords;
                (1..indices.len().saturating_sub(1))
                    .map(|k| {
                        let b = self.vertices[indices[k]].position.coords;
                        let c = self.vertices[indices[k + 1]].position.coords;
                        origin.dot(&b.cross(&c))
                    })
                    .sum::<f64>()
            })
            .sum();
        volume < 0.0
    }

    fn component_is_planar(&self, component: &[usize], area_sum: &Vector3<f64>) -> bool {
        let length = area_sum.norm();
        if length < 1e-12 {
            // closed shells cancel out; never treat them as flat
            return false;
        }
        let axis = area_sum / length;
        let origin = self.vertices[self.faces[component[0]].indices[0]].position;

        let bbox = BoundingBox::from_points(
            component
                .iter()
                .flat_map(|&f| self.faces[f].indices.iter())
                .map(|&i| &self.vertices[i].position),
        );
        let scale = bbox.size().norm().max(1.0);

        component.iter().all(|&f| {
            self.faces[f]
                .indices
                .iter()
                .all(|&i| (self.vertices[i].position - origin).dot(&axis).abs() <= PLANAR_EPS * scale)
        })
    }

    /// Mark edges shared by exactly two faces whose dihedral angle, in
    /// degrees between the face normals, satisfies `predicate`.
    /// Returns the number of edges marked.
    pub fn mark_sharp_edges<F>(&mut self, predicate: F) -> usize
    where
        F: Fn(f64) -> bool,
    {
        let mut marked: AHashSet<(usize, usize)> = self
            .sharp_edges
            .iter()
            .map(|[a, b]| edge_key(*a, *b))
            .collect();
        let before = marked.len();

        let mut keys: Vec<((usize, usize), Vec<usize>)> = self.edge_faces().into_iter().collect();
        keys.sort_unstable_by_key(|(key, _)| *key);

        for (key, faces) in keys {
            if faces.len() != 2 {
                continue;
            }
            let n1 = self.faces[faces[0]].normal;
            let n2 = self.faces[faces[1]].normal;
            let angle = n1.dot(&n2).clamp(-1.0, 1.0).acos().to_degrees();
            if predicate(angle) && marked.insert(key) {
                self.sharp_edges.push([key.0, key.1]);
            }
        }

        marked.len() - before
    }

    /// True if every edge of every face is shared by exactly two faces
    pub fn is_closed(&self) -> bool {
        !self.faces.is_empty() && self.edge_faces().values().all(|faces| faces.len() == 2)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Unit square at z = 0 split into two triangles with mixed winding
    fn mixed_square() -> Mesh {
        let mut mesh = Mesh::new();
        let a = mesh.add_vertex(Point3::new(0.0, 0.0, 0.0));
        let b = mesh.add_vertex(Point3::new(1.0, 0.0, 0.0));
        let c = mesh.add_vertex(Point3::new(1.0, 1.0, 0.0));
        let d = mesh.add_vertex(Point3::new(0.0, 1.0, 0.0));
        mesh.add_face(vec![a, b, c]);
        mesh.add_face(vec![a, d, c]);
        mesh
    }

    #[test]
    fn test_add_face_normal() {
        let mesh = mixed_square();
        assert_eq!(mesh.faces[0].normal, Vector3::new(0.0, 0.0, 1.0));
        assert_eq!(mesh.faces[1].normal, Vector3::new(0.0, 0.0, -1.0));
    }

    #[test]
    fn test_recompute_normals_flat_faces_point_up() {
        let mut mesh = mixed_square();
        mesh.recompute_normals();
        assert!(mesh.faces.iter().all(|f| f.normal.z > 0.99));
        assert!(mesh.vertices.iter().all(|v| (v.normal.norm() - 1.0).abs() < 1e-9));
    }

    #[test]
    fn test_recompute_normals_closed_box_points_outward() {
        let mut mesh = Mesh::new();
        let p = [
            (0.0, 0.0, 0.0),
            (1.0, 0.0, 0.0),
            (1.0, 1.0, 0.0),
            (0.0, 1.0, 0.0),
            (0.0, 0.0, 1.0),
            (1.0, 0.0, 1.0),
            (1.0, 1.0, 1.0),
            (0.0, 1.0, 1.0),
        ];
        for (x, y, z) in p {
            mesh.add_vertex(Point3::new(x, y, z));
        }
        // every quad wound inward
        mesh.add_face(vec![0, 1, 2, 3]);
        mesh.add_face(vec![4, 7, 6, 5]);
        mesh.add_face(vec![0, 4, 5, 1]);
        mesh.add_face(vec![1, 5, 6, 2]);
        mesh.add_face(vec![2, 6, 7, 3]);
        mesh.add_face(vec![3, 7, 4, 0]);
        assert!(mesh.is_closed());

        mesh.recompute_normals();
        let center = Point3::new(0.5, 0.5, 0.5);
        for face in &mesh.faces {
            let outward = mesh.face_centroid(face) - center;
            assert!(face.normal.dot(&outward) > 0.0);
        }
    }

    #[test]
    fn test_merge_nearby_vertices() {
        let mut mesh = Mesh::new();
        let a = mesh.add_vertex(Point3::new(0.0, 0.0, 0.0));
        let b = mesh.add_vertex(Point3::new(1.0, 0.0, 0.0));
        let b2 = mesh.add_vertex(Point3::new(1.001, 0.0, 0.0));
        let c = mesh.add_vertex(Point3::new(1.0, 1.0, 0.0));
        mesh.add_edge(a, b);
        mesh.add_edge(b2, c);
        mesh.add_edge(b, b2);

        let removed = mesh.merge_nearby_vertices(5e-3);
        assert_eq!(removed, 1);
        assert_eq!(mesh.vertex_count(), 3);
        assert_eq!(mesh.edges, vec![[0, 1], [1, 2]]);
    }

    #[test]
    fn test_delete_vertices_drops_faces() {
        let mut mesh = mixed_square();
        let removed = mesh.delete_vertices(|v| v.position.x > 0.5 && v.position.y < 0.5);
        assert_eq!(removed, 1);
        assert_eq!(mesh.vertex_count(), 3);
        assert_eq!(mesh.face_count(), 1);
        assert!(mesh.faces[0].indices.iter().all(|&i| i < 3));
    }

    #[test]
    fn test_remove_orphaned_vertices() {
        let mut mesh = mixed_square();
        mesh.add_vertex(Point3::new(5.0, 5.0, 0.0));
        assert_eq!(mesh.remove_orphaned_vertices(), 1);
        assert_eq!(mesh.vertex_count(), 4);
    }

    #[test]
    fn test_boundary_and_free_edges() {
        let mut mesh = mixed_square();
        mesh.recompute_normals();
        assert_eq!(mesh.boundary_edges().len(), 4);

        mesh.add_edge(0, 1);
        mesh.add_edge(1, 3);
        assert_eq!(mesh.free_edges(), vec![[1, 3]]);
        mesh.prune_covered_edges();
        assert_eq!(mesh.edges, vec![[1, 3]]);
    }

    #[test]
    fn test_merge_offsets_indices() {
        let mut mesh = mixed_square();
        let other = mixed_square();
        mesh.merge(&other);
        assert_eq!(mesh.vertex_count(), 8);
        assert_eq!(mesh.faces[3].indices, vec![4, 7, 6]);
    }
}
