// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Surface classification of board faces by normal direction

use crate::geometry::spatial::{round_point, KEY_PRECISION};
use crate::geometry::{Mesh, SpatialVertexIndex, SurfaceRegion, Vertex3};
use serde::Serialize;
use tracing::debug;

/// Normal Z component separating caps from side walls
pub const FACING_THRESHOLD: f64 = 0.5;

/// Face indices per surface
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FaceSets {
    pub top: Vec<usize>,
    pub bottom: Vec<usize>,
    pub edge: Vec<usize>,
}

impl FaceSets {
    pub fn len(&self) -> usize {
        self.top.len() + self.bottom.len() + self.edge.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Number of faces tagged per region
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RegionCounts {
    pub top: usize,
    pub bottom: usize,
    pub plated_edge: usize,
    pub bare_edge: usize,
    pub untagged: usize,
}

/// Split faces into top, bottom and edge sets.
///
/// Edge faces are restricted to faces with at least one vertex within the
/// coincidence tolerance of `edge_reference` when one is given. Only reads
/// the mesh.
pub fn classify(mesh: &Mesh, edge_reference: Option<&[Vertex3]>) -> FaceSets {
    let index = edge_reference.map(SpatialVertexIndex::build);
    let mut sets = FaceSets::default();

    for (i, face) in mesh.faces.iter().enumerate() {
        let nz = face.normal.z;
        if nz > FACING_THRESHOLD {
            sets.top.push(i);
        } else if nz < -FACING_THRESHOLD {
            sets.bottom.push(i);
        } else {
            let touches = match &index {
                None => true,
                Some(index) => {
                    let corners: Vec<Vertex3> = face
                        .indices
                        .iter()
                        .map(|&v| round_point(&mesh.vertices[v].position, KEY_PRECISION))
                        .collect();
                    index.any_coincident(&corners)
                }
            };
            if touches {
                sets.edge.push(i);
            }
        }
    }

    sets
}

/// Tag every face with its surface region.
///
/// Edge faces touching the bare set win over those touching the plated set.
/// Edge faces touching neither stay untagged.
pub fn tag_regions(mesh: &mut Mesh, plated: &[Vertex3], bare: &[Vertex3]) -> RegionCounts {
    let caps = classify(mesh, Some(&[]));
    let plated_sets = classify(mesh, Some(plated));
    let bare_sets = classify(mesh, Some(bare));

    for face in &mut mesh.faces {
        face.region = None;
    }
    for &i in &caps.top {
        mesh.faces[i].region = Some(SurfaceRegion::Top);
    }
    for &i in &caps.bottom {
        mesh.faces[i].region = Some(SurfaceRegion::Bottom);
    }
    for &i in &plated_sets.edge {
        mesh.faces[i].region = Some(SurfaceRegion::PlatedEdge);
    }
    for &i in &bare_sets.edge {
        mesh.faces[i].region = Some(SurfaceRegion::BareEdge);
    }

    let counts = region_counts(mesh);
    debug!("Tagged board faces: {:?}", counts);
    counts
}

pub fn region_counts(mesh: &Mesh) -> RegionCounts {
    let mut counts = RegionCounts::default();
    for face in &mesh.faces {
        match face.region {
            Some(SurfaceRegion::Top) => counts.top += 1,
            Some(SurfaceRegion::Bottom) => counts.bottom += 1,
            Some(SurfaceRegion::PlatedEdge) => counts.plated_edge += 1,
            Some(SurfaceRegion::BareEdge) => counts.bare_edge += 1,
            None => counts.untagged += 1,
        }
    }
    counts
}

/// Faces carrying `region`
pub fn faces_in_region(mesh: &Mesh, region: SurfaceRegion) -> Vec<usize> {
    mesh.faces
        .iter()
        .enumerate()
        .filter(|(_, face)| face.region == Some(region))
        .map(|(i, _)| i)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::outline::{prepare_hole_tool, OutlineLoops};
    use crate::board::solidify::solidify;
    use crate::geometry::spatial::difference;

    fn square(cx: f64, cy: f64, half: f64) -> Vec<[f64; 2]> {
        vec![
            [cx - half, cy - half],
            [cx + half, cy - half],
            [cx + half, cy + half],
            [cx - half, cy + half],
        ]
    }

    fn holed_board() -> crate::board::SolidBoard {
        let outline = OutlineLoops::new(vec![square(0.0, 0.0, 10.0)]).to_mesh();
        let pth = prepare_hole_tool(&OutlineLoops::new(vec![square(4.0, 4.0, 1.0)])).unwrap();
        let npth = prepare_hole_tool(&OutlineLoops::new(vec![square(-4.0, -4.0, 1.0)])).unwrap();
        solidify(outline, Some(pth), Some(npth), 1.6).unwrap()
    }

    #[test]
    fn test_unrestricted_classification_is_complete() {
        let solid = holed_board();
        let sets = classify(&solid.mesh, None);
        assert_eq!(sets.len(), solid.mesh.face_count());
        // 12 side walls: outline, plated hole, non-plated hole
        assert_eq!(sets.edge.len(), 12);
        assert_eq!(sets.top.len(), sets.bottom.len());
    }

    #[test]
    fn test_reference_set_scopes_edges() {
        let solid = holed_board();
        let plated = classify(&solid.mesh, Some(&solid.plated_edge_vertices));
        let bare = classify(&solid.mesh, Some(&solid.bare_edge_vertices));
        assert_eq!(plated.edge.len(), 4);
        assert_eq!(bare.edge.len(), 8);
        assert!(plated.edge.iter().all(|i| !bare.edge.contains(i)));

        let nothing = classify(&solid.mesh, Some(&[]));
        assert!(nothing.edge.is_empty());
        assert_eq!(nothing.top, plated.top);
    }

    #[test]
    fn test_classification_is_idempotent() {
        let solid = holed_board();
        let first = classify(&solid.mesh, Some(&solid.plated_edge_vertices));
        let second = classify(&solid.mesh, Some(&solid.plated_edge_vertices));
        assert_eq!(first, second);
    }

    #[test]
    fn test_tag_regions() {
        let mut solid = holed_board();
        let faces_before = solid.mesh.faces.len();
        let counts = tag_regions(
            &mut solid.mesh,
            &solid.plated_edge_vertices,
            &solid.bare_edge_vertices,
        );
        assert_eq!(solid.mesh.faces.len(), faces_before);
        assert_eq!(counts.plated_edge, 4);
        assert_eq!(counts.bare_edge, 8);
        assert_eq!(counts.untagged, 0);
        assert_eq!(faces_in_region(&solid.mesh, SurfaceRegion::PlatedEdge).len(), 4);

        let plated_union = difference(&solid.all_edge_vertices, &solid.bare_edge_vertices);
        assert_eq!(plated_union, solid.plated_edge_vertices);
    }
}
