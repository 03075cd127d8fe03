// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Vector outline import and preparation of the cutting tools

use crate::error::{BoardError, Result};
use crate::geometry::{extrude, fill_boundary, union_outline, Mesh};
use nalgebra::{Point3, Vector3};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info, warn};

/// Distance under which imported outline vertices are merged
pub const REMOVE_DOUBLES_DISTANCE: f64 = 5e-3;

/// Height of the hole tools, centred on the board plane
pub const HOLE_TOOL_HEIGHT: f64 = 0.2;

fn default_scale() -> f64 {
    1.0
}

/// Closed polylines exported by the vector conversion step.
///
/// Every loop is implicitly closed from its last point back to the first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutlineLoops {
    pub loops: Vec<Vec<[f64; 2]>>,
    #[serde(default = "default_scale")]
    pub scale: f64,
}

impl OutlineLoops {
    pub fn new(loops: Vec<Vec<[f64; 2]>>) -> Self {
        Self { loops, scale: 1.0 }
    }

    /// Parse a loops file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| BoardError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let loops: OutlineLoops = serde_json::from_str(&content)
            .map_err(|e| BoardError::Outline(format!("{}: {e}", path.display())))?;
        if !loops.scale.is_finite() || loops.scale <= 0.0 {
            return Err(BoardError::Outline(format!(
                "{}: scale must be positive, got {}",
                path.display(),
                loops.scale
            )));
        }
        Ok(loops)
    }

    /// Load an optional outline; a missing file is not an error
    pub fn load_optional(path: &Path, name: &str) -> Result<Option<Self>> {
        if !path.is_file() {
            warn!("No mesh created for {name}: {} not found", path.display());
            return Ok(None);
        }
        let loops = Self::from_file(path)?;
        if loops.is_empty() {
            warn!("No mesh created for {name}: no curves in {}", path.display());
            return Ok(None);
        }
        info!("Importing outline from {} (curve count: {})", path.display(), loops.loops.len());
        Ok(Some(loops))
    }

    /// True if no loop has at least two points
    pub fn is_empty(&self) -> bool {
        self.loops.iter().all(|l| l.len() < 2)
    }

    /// Loops with the scale applied
    pub fn scaled_loops(&self) -> Vec<Vec<[f64; 2]>> {
        self.loops
            .iter()
            .map(|points| {
                points
                    .iter()
                    .map(|[x, y]| [x * self.scale, y * self.scale])
                    .collect()
            })
            .collect()
    }

    /// Edges-only mesh at Z = 0, scaled
    pub fn to_mesh(&self) -> Mesh {
        let mut mesh = Mesh::new();
        for points in self.scaled_loops().iter().filter(|l| l.len() >= 2) {
            let first = mesh.vertex_count();
            for [x, y] in points {
                mesh.add_vertex(Point3::new(*x, *y, 0.0));
            }
            let count = points.len();
            for i in 0..count {
                mesh.add_edge(first + i, first + (i + 1) % count);
            }
        }
        mesh
    }
}

/// Turn hole loops into solid tools straddling the board plane.
///
/// Overlapping drill loops are merged into their union first.
pub fn prepare_hole_tool(loops: &OutlineLoops) -> Result<Mesh> {
    let mut tool = union_outline(&loops.scaled_loops(), 0.0);
    tool.merge_nearby_vertices(REMOVE_DOUBLES_DISTANCE);
    fill_boundary(&mut tool)?;
    extrude(&mut tool, HOLE_TOOL_HEIGHT);
    tool.recompute_normals();
    tool.translate(&Vector3::new(0.0, 0.0, -HOLE_TOOL_HEIGHT / 2.0));
    debug!(
        "Hole tool ready: {} vertices, {} faces",
        tool.vertex_count(),
        tool.face_count()
    );
    Ok(tool)
}

/// Move the outline and the tools so the outline's XY centre is the origin.
/// Returns the applied offset.
pub fn center_on_origin(outline: &mut Mesh, tools: &mut [&mut Mesh]) -> Vector3<f64> {
    let bbox = outline.bounding_box();
    if bbox.is_empty() {
        return Vector3::zeros();
    }
    let center = bbox.center();
    let offset = Vector3::new(-center.x, -center.y, 0.0);
    outline.translate(&offset);
    for tool in tools.iter_mut() {
        tool.translate(&offset);
    }
    offset
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::analyze;

    fn square(cx: f64, cy: f64, half: f64) -> Vec<[f64; 2]> {
        vec![
            [cx - half, cy - half],
            [cx + half, cy - half],
            [cx + half, cy + half],
            [cx - half, cy + half],
        ]
    }

    #[test]
    fn test_to_mesh_closes_loops() {
        let mut loops = OutlineLoops::new(vec![square(0.0, 0.0, 1.0), vec![[5.0, 5.0]]]);
        loops.scale = 2.0;
        let mesh = loops.to_mesh();
        assert_eq!(mesh.vertex_count(), 4);
        assert_eq!(mesh.edges.len(), 4);
        assert_eq!(mesh.edges[3], [3, 0]);
        assert_eq!(mesh.vertices[2].position, Point3::new(2.0, 2.0, 0.0));
    }

    #[test]
    fn test_parse_defaults_scale() {
        let loops: OutlineLoops = serde_json::from_str(r#"{"loops": [[[0, 0], [1, 0], [1, 1]]]}"#).unwrap();
        assert_eq!(loops.scale, 1.0);
        assert!(!loops.is_empty());
    }

    #[test]
    fn test_prepare_hole_tool_straddles_plane() {
        let tool = prepare_hole_tool(&OutlineLoops::new(vec![square(3.0, 3.0, 0.5)])).unwrap();
        let stats = analyze(&tool);
        assert!(stats.is_watertight);
        assert!((stats.bbox[2] + 0.1).abs() < 1e-12);
        assert!((stats.bbox[5] - 0.1).abs() < 1e-12);
        assert!((stats.volume - 0.2).abs() < 1e-9);
    }

    #[test]
    fn test_overlapping_hole_loops_form_one_tool() {
        let loops = OutlineLoops::new(vec![square(0.0, 0.0, 2.0), square(1.0, 1.0, 2.0)]);
        let tool = prepare_hole_tool(&loops).unwrap();
        let stats = analyze(&tool);
        assert!(stats.is_watertight);
        assert!((stats.volume - 23.0 * HOLE_TOOL_HEIGHT).abs() < 1e-9);
    }

    #[test]
    fn test_center_on_origin() {
        let mut outline = OutlineLoops::new(vec![square(10.0, 20.0, 5.0)]).to_mesh();
        let mut tool = OutlineLoops::new(vec![square(10.0, 20.0, 1.0)]).to_mesh();
        let offset = center_on_origin(&mut outline, &mut [&mut tool]);
        assert_eq!(offset, Vector3::new(-10.0, -20.0, 0.0));
        assert_eq!(outline.bounding_box().center(), Point3::new(0.0, 0.0, 0.0));
        assert_eq!(tool.bounding_box().center(), Point3::new(0.0, 0.0, 0.0));
    }

    #[test]
    fn test_load_optional_missing() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = OutlineLoops::load_optional(&dir.path().join("PTH-drl.json"), "pth").unwrap();
        assert!(loaded.is_none());
    }
}
