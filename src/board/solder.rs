// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Solder bodies on the pads of both board sides
//!
//! Every pad outline becomes a stepped dome: the pad region is raised in a
//! few steps and shrunk towards its centre after each one. The front side
//! sits on top of the board, the back side is mirrored below Z = 0.

use super::outline::{OutlineLoops, REMOVE_DOUBLES_DISTANCE};
use crate::error::Result;
use crate::geometry::{fill_boundary, Mesh};
use nalgebra::{Point3, Vector3};
use tracing::{debug, info};

/// Name of the joined solder body
pub const SOLDER_NAME: &str = "Solder";

/// `(height, scale)` steps for a pad whose smaller side is `min_dim`
pub fn solder_profile(min_dim: f64) -> Vec<(f64, f64)> {
    if min_dim < 0.4 {
        vec![(0.07, 0.5)]
    } else if min_dim < 0.8 {
        vec![(0.1, 0.5)]
    } else if min_dim < 1.2 {
        vec![(0.1, 0.8), (0.1, 0.5)]
    } else {
        vec![
            (0.1, 1.0 - 0.3 / min_dim),
            (0.1, 1.0 - 0.4 / min_dim),
            (0.19, 0.4),
        ]
    }
}

/// Solder dome over one pad loop, base at Z = 0.
///
/// Returns `None` for loops that do not enclose any area.
pub fn solder_pad(points: &[[f64; 2]]) -> Result<Option<Mesh>> {
    if points.len() < 3 {
        return Ok(None);
    }

    let mut base = Mesh::new();
    for [x, y] in points {
        base.add_vertex(Point3::new(*x, *y, 0.0));
    }
    for i in 0..points.len() {
        base.add_edge(i, (i + 1) % points.len());
    }
    base.merge_nearby_vertices(REMOVE_DOUBLES_DISTANCE);
    fill_boundary(&mut base)?;
    if base.faces.is_empty() {
        return Ok(None);
    }

    let bbox = base.bounding_box();
    let size = bbox.size();
    let steps = solder_profile(size.x.min(size.y));

    let n = base.vertex_count();
    let centre = base
        .vertices
        .iter()
        .fold(Vector3::<f64>::zeros(), |sum, v| sum + v.position.coords)
        / n as f64;

    let mut pad = Mesh::with_capacity(n * (steps.len() + 1), base.face_count() * 2);
    let mut height = 0.0;
    let mut scale = 1.0;
    for ring in 0..=steps.len() {
        if ring > 0 {
            let (step_height, step_scale) = steps[ring - 1];
            height += step_height;
            scale *= step_scale;
        }
        for vertex in &base.vertices {
            let offset = (vertex.position.coords - centre) * scale;
            pad.add_vertex(Point3::new(centre.x + offset.x, centre.y + offset.y, height));
        }
    }

    let top = steps.len() * n;
    for face in &base.faces {
        pad.add_face(face.indices.iter().rev().copied().collect());
        pad.add_face(face.indices.iter().map(|i| i + top).collect());
    }
    for [a, b] in base.boundary_edges() {
        for ring in 0..steps.len() {
            let (lo, hi) = (ring * n, (ring + 1) * n);
            pad.add_face(vec![a + lo, b + lo, b + hi, a + hi]);
        }
    }
    pad.recompute_normals();

    Ok(Some(pad))
}

/// All pads of one board side joined into one mesh, base at Z = 0
pub fn solder_side(loops: &OutlineLoops) -> Result<Option<Mesh>> {
    let mut side = Mesh::new();
    for points in loops.scaled_loops() {
        if let Some(pad) = solder_pad(&points)? {
            side.merge(&pad);
        }
    }
    if side.is_empty() {
        return Ok(None);
    }
    debug!(
        "Solder side: {} pad(s), {} faces",
        loops.loops.len(),
        side.face_count()
    );
    Ok(Some(side))
}

/// Mirror a mesh through the plane Z = 0
pub fn mirror_z(mesh: &mut Mesh) {
    for vertex in &mut mesh.vertices {
        vertex.position.z = -vertex.position.z;
    }
    for face in &mut mesh.faces {
        face.flip();
    }
    mesh.recompute_normals();
}

/// Place the front solder on top of a board of `board_thickness` and the
/// back solder mirrored below it, joined into one body.
///
/// Returns `None` when neither side has pads.
pub fn place_solder(top: Option<Mesh>, bottom: Option<Mesh>, board_thickness: f64) -> Option<Mesh> {
    let mut solder = Mesh::new();

    if let Some(mut top) = top {
        top.translate(&Vector3::new(0.0, 0.0, board_thickness));
        solder.merge(&top);
    }
    if let Some(mut bottom) = bottom {
        mirror_z(&mut bottom);
        solder.merge(&bottom);
    }

    if solder.is_empty() {
        return None;
    }
    info!("{} body created ({} faces)", SOLDER_NAME, solder.face_count());
    Some(solder)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::analyze;
    use approx::assert_relative_eq;

    fn square(cx: f64, cy: f64, half: f64) -> Vec<[f64; 2]> {
        vec![
            [cx - half, cy - half],
            [cx + half, cy - half],
            [cx + half, cy + half],
            [cx - half, cy + half],
        ]
    }

    #[test]
    fn test_solder_profile_by_pad_size() {
        assert_eq!(solder_profile(0.3), vec![(0.07, 0.5)]);
        assert_eq!(solder_profile(0.5), vec![(0.1, 0.5)]);
        assert_eq!(solder_profile(1.0).len(), 2);

        let large = solder_profile(2.0);
        assert_eq!(large.len(), 3);
        assert_relative_eq!(large[0].1, 0.85);
        assert_relative_eq!(large[1].1, 0.8);
    }

    #[test]
    fn test_solder_pad_dome() {
        let pad = solder_pad(&square(1.0, 1.0, 1.0)).unwrap().unwrap();
        let stats = analyze(&pad);

        assert!(stats.is_watertight);
        assert!(stats.volume > 0.0);
        assert_relative_eq!(stats.bbox[2], 0.0);
        assert_relative_eq!(stats.bbox[5], 0.39, epsilon = 1e-12);

        // top ring shrunk by every step around the pad centre
        let top: Vec<_> = pad
            .vertices
            .iter()
            .filter(|v| (v.position.z - 0.39).abs() < 1e-12)
            .collect();
        assert_eq!(top.len(), 4);
        let width = 2.0 * 0.85 * 0.8 * 0.4;
        for v in top {
            assert_relative_eq!((v.position.x - 1.0).abs(), width / 2.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_degenerate_pad_is_skipped() {
        assert!(solder_pad(&[[0.0, 0.0], [1.0, 0.0]]).unwrap().is_none());
        let empty = OutlineLoops::new(vec![vec![[0.0, 0.0]]]);
        assert!(solder_side(&empty).unwrap().is_none());
    }

    #[test]
    fn test_place_solder_on_both_sides() {
        let top = solder_side(&OutlineLoops::new(vec![square(0.0, 0.0, 0.15)])).unwrap();
        let bottom = solder_side(&OutlineLoops::new(vec![square(3.0, 0.0, 0.15)])).unwrap();

        let solder = place_solder(top, bottom, 1.6).unwrap();
        let stats = analyze(&solder);
        assert!(stats.is_watertight);
        assert!(stats.volume > 0.0);
        assert_relative_eq!(stats.bbox[2], -0.07, epsilon = 1e-12);
        assert_relative_eq!(stats.bbox[5], 1.6 + 0.07, epsilon = 1e-12);

        // back pads hang below the board
        let below = solder.vertices.iter().filter(|v| v.position.z < 0.0).count();
        assert_eq!(below, 4);
    }

    #[test]
    fn test_place_solder_without_pads() {
        assert!(place_solder(None, None, 1.6).is_none());
    }
}
