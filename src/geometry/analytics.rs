// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Geometry analytics and statistics

use super::Mesh;
use serde::{Deserialize, Serialize};

/// Geometry statistics and analytics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeometryStats {
    /// Total volume in cubic units
    pub volume: f64,
    /// Total surface area in square units
    pub surface_area: f64,
    /// Bounding box [min_x, min_y, min_z, max_x, max_y, max_z]
    pub bbox: [f64; 6],
    /// Vertex average [x, y, z]
    pub centroid: [f64; 3],
    pub vertex_count: usize,
    pub face_count: usize,
    /// Is every face edge shared by exactly two faces?
    pub is_watertight: bool,
}

impl GeometryStats {
    pub fn empty() -> Self {
        Self {
            volume: 0.0,
            surface_area: 0.0,
            bbox: [0.0; 6],
            centroid: [0.0; 3],
            vertex_count: 0,
            face_count: 0,
            is_watertight: false,
        }
    }

    /// Pretty print statistics
    pub fn print(&self) {
        println!("╔══════════════════════════════════════════════════════════╗");
        println!("║              BOARD GEOMETRY                              ║");
        println!("╠══════════════════════════════════════════════════════════╣");
        println!(
            "║ Volume:          {:>10.4} mm³                      ║",
            self.volume
        );
        println!(
            "║ Surface Area:    {:>10.4} mm²                      ║",
            self.surface_area
        );
        println!("║                                                          ║");
        println!(
            "║   Min: ({:>7.2}, {:>7.2}, {:>7.2})                      ║",
            self.bbox[0], self.bbox[1], self.bbox[2]
        );
        println!(
            "║   Max: ({:>7.2}, {:>7.2}, {:>7.2})                      ║",
            self.bbox[3], self.bbox[4], self.bbox[5]
        );
        println!(
            "║   Size: {:>7.2} × {:>7.2} × {:>7.3} mm               ║",
            self.bbox[3] - self.bbox[0],
            self.bbox[4] - self.bbox[1],
            self.bbox[5] - self.bbox[2]
        );
        println!("║                                                          ║");
        println!(
            "║ Vertices:        {:>10}                              ║",
            self.vertex_count
        );
        println!(
            "║ Faces:           {:>10}                              ║",
            self.face_count
        );
        println!(
            "║ Watertight:      {:>10}                              ║",
            if self.is_watertight { "Yes" } else { "No" }
        );
        println!("╚══════════════════════════════════════════════════════════╝");
    }
}

/// Analyze mesh geometry and compute statistics
pub fn analyze(mesh: &Mesh) -> GeometryStats {
    let vertex_count = mesh.vertex_count();
    let face_count = mesh.face_count();

    if vertex_count == 0 || face_count == 0 {
        return GeometryStats::empty();
    }

    let bbox = mesh.bounding_box();

    GeometryStats {
        volume: calculate_volume(mesh),
        surface_area: calculate_surface_area(mesh),
        bbox: [
            bbox.min.x, bbox.min.y, bbox.min.z, bbox.max.x, bbox.max.y, bbox.max.z,
        ],
        centroid: calculate_centroid(mesh),
        vertex_count,
        face_count,
        is_watertight: mesh.is_closed(),
    }
}

/// Signed tetrahedron volumes of a fan triangulation of every face
fn calculate_volume(mesh: &Mesh) -> f64 {
    let mut volume = 0.0;

    for face in &mesh.faces {
        let v0 = mesh.vertices[face.indices[0]].position.coords;
        for k in 1..face.indices.len().saturating_sub(1) {
            let v1 = mesh.vertices[face.indices[k]].position.coords;
            let v2 = mesh.vertices[face.indices[k + 1]].position.coords;
            volume += v0.dot(&v1.cross(&v2)) / 6.0;
        }
    }

    volume.abs()
}

fn calculate_surface_area(mesh: &Mesh) -> f64 {
    mesh.faces
        .iter()
        .map(|face| mesh.loop_area_vector(&face.indices).norm() / 2.0)
        .sum()
}

fn calculate_centroid(mesh: &Mesh) -> [f64; 3] {
    let sum = mesh
        .vertices
        .iter()
        .fold(nalgebra::Vector3::zeros(), |acc, v| acc + v.position.coords);
    let count = mesh.vertex_count() as f64;
    [sum.x / count, sum.y / count, sum.z / count]
}
