// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Region extrusion of flat face sets

use super::mesh::Mesh;
use nalgebra::Vector3;
use tracing::debug;

/// Extrude every face and loose edge of `mesh` along +Z by `height`.
///
/// The original faces become the bottom cap, a translated copy becomes the
/// top cap, and side walls are built along boundary and loose edges. Windings
/// are left as built; call [`Mesh::recompute_normals`] afterwards. A height of
/// zero or less leaves the mesh untouched. Returns the number of faces added.
pub fn extrude(mesh: &mut Mesh, height: f64) -> usize {
    if height <= 0.0 || mesh.is_empty() {
        return 0;
    }

    let base_count = mesh.vertex_count();
    let face_count = mesh.face_count();
    let offset = Vector3::new(0.0, 0.0, height);

    let mut walls = mesh.boundary_edges();
    walls.extend(mesh.free_edges());

    for i in 0..base_count {
        let mut top = mesh.vertices[i];
        top.position += offset;
        mesh.vertices.push(top);
    }

    for i in 0..face_count {
        let mut top = mesh.faces[i].clone();
        top.indices.iter_mut().for_each(|idx| *idx += base_count);
        mesh.faces[i].flip();
        mesh.faces.push(top);
    }

    for [a, b] in walls {
        mesh.add_face(vec![a, b, b + base_count, a + base_count]);
    }

    mesh.edges.clear();
    mesh.remove_orphaned_vertices();

    let added = mesh.face_count() - face_count;
    debug!("Extruded {} face(s) by {height}, {added} face(s) added", face_count);
    added
}

/// Mark edges whose dihedral angle lies within `window` degrees of `target`.
/// Returns the number of edges marked.
pub fn mark_sharp_edges(mesh: &mut Mesh, target: f64, window: f64) -> usize {
    mesh.mark_sharp_edges(|angle| (target - angle).abs() < window)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::analytics::analyze;
    use crate::geometry::fill::fill_boundary;
    use approx::assert_relative_eq;
    use nalgebra::Point3;

    fn rectangle(w: f64, h: f64) -> Mesh {
        let mut mesh = Mesh::new();
        for (x, y) in [(0.0, 0.0), (w, 0.0), (w, h), (0.0, h)] {
            mesh.add_vertex(Point3::new(x, y, 0.0));
        }
        for i in 0..4 {
            mesh.add_edge(i, (i + 1) % 4);
        }
        fill_boundary(&mut mesh).unwrap();
        mesh
    }

    #[test]
    fn test_extrude_rectangle_is_closed_box() {
        let mut mesh = rectangle(4.0, 2.0);
        let added = extrude(&mut mesh, 1.5);
        mesh.recompute_normals();

        assert_eq!(added, 2 + 4);
        assert_eq!(mesh.vertex_count(), 8);
        assert!(mesh.is_closed());

        let stats = analyze(&mesh);
        assert_relative_eq!(stats.volume, 12.0, epsilon = 1e-9);
        assert_relative_eq!(stats.bbox[5], 1.5, epsilon = 1e-12);
    }

    #[test]
    fn test_extrude_non_positive_height_is_noop() {
        let mut mesh = rectangle(4.0, 2.0);
        let before = mesh.clone();
        assert_eq!(extrude(&mut mesh, 0.0), 0);
        assert_eq!(extrude(&mut mesh, -1.0), 0);
        assert_eq!(mesh, before);
    }

    #[test]
    fn test_extrude_loose_edges_makes_walls() {
        let mut mesh = Mesh::new();
        let a = mesh.add_vertex(Point3::new(0.0, 0.0, 0.0));
        let b = mesh.add_vertex(Point3::new(1.0, 0.0, 0.0));
        mesh.add_edge(a, b);
        assert_eq!(extrude(&mut mesh, 1.0), 1);
        assert_eq!(mesh.vertex_count(), 4);
        assert!(mesh.edges.is_empty());
    }

    #[test]
    fn test_mark_sharp_edges_on_box() {
        let mut mesh = rectangle(4.0, 2.0);
        extrude(&mut mesh, 1.0);
        mesh.recompute_normals();

        // 12 box edges; the diagonals splitting the caps stay smooth
        assert_eq!(mark_sharp_edges(&mut mesh, 90.0, 5.0), 12);
        assert_eq!(mark_sharp_edges(&mut mesh, 90.0, 5.0), 0);
    }
}
