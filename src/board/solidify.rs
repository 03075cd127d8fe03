// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Turning a flat outline and its hole tools into one solid board

use super::outline::REMOVE_DOUBLES_DISTANCE;
use crate::error::Result;
use crate::geometry::spatial::{difference, KEY_PRECISION};
use crate::geometry::{
    boolean_difference, clean_boolean_artifacts, extrude, fill_boundary, mark_sharp_edges,
    FillReport, Mesh, Vertex3,
};
use serde::Serialize;
use tracing::{debug, info};

/// Plane the flat board lies in before extrusion
pub const BOARD_PLANE_Z: f64 = 0.0;

/// Dihedral angle of edges marked sharp, and the accepted deviation, in degrees
pub const SHARP_ANGLE: f64 = 90.0;
pub const SHARP_ANGLE_WINDOW: f64 = 5.0;

/// Solid board body plus the vertex sets needed to tell edge regions apart.
///
/// All vertex sets are sampled from the flat board at `KEY_PRECISION`
/// decimals. Since the flat board carries no interior vertices every sampled
/// vertex lies on a board edge.
#[derive(Debug, Clone, Serialize)]
pub struct SolidBoard {
    pub mesh: Mesh,
    pub thickness: f64,
    /// Outline vertices before any hole was cut. Not used to split the edge
    /// regions; kept for the material binder and for diagnostics.
    pub perimeter_vertices: Vec<Vertex3>,
    /// Outline and non-plated hole vertices
    pub bare_edge_vertices: Vec<Vertex3>,
    /// Every edge vertex after all cuts
    pub all_edge_vertices: Vec<Vertex3>,
    /// Vertices introduced by plated holes
    pub plated_edge_vertices: Vec<Vertex3>,
    #[serde(skip)]
    pub fill: FillReport,
}

fn cut(board: &mut Mesh, tool: Mesh) -> Result<()> {
    boolean_difference(board, tool)?;
    clean_boolean_artifacts(board, BOARD_PLANE_Z);
    Ok(())
}

/// Build the solid board from an edges-only outline at Z = 0.
///
/// Holes are optional. Non-plated holes are cut first so that their walls end
/// up in the bare edge set; plated holes are cut last and form the plated set.
/// A boundary that cannot be closed is logged and the remaining geometry is
/// still used.
pub fn solidify(
    mut outline: Mesh,
    plated_holes: Option<Mesh>,
    nonplated_holes: Option<Mesh>,
    thickness: f64,
) -> Result<SolidBoard> {
    let merged = outline.merge_nearby_vertices(REMOVE_DOUBLES_DISTANCE);
    debug!("Merged {} duplicate outline vertices", merged);
    let fill = fill_boundary(&mut outline)?;
    outline.recompute_normals();

    let perimeter_vertices = outline.vertex_keys(KEY_PRECISION);

    if let Some(tool) = nonplated_holes {
        info!("Cutting NPTH holes in board");
        cut(&mut outline, tool)?;
    }
    let bare_edge_vertices = outline.vertex_keys(KEY_PRECISION);

    if let Some(tool) = plated_holes {
        info!("Cutting PTH holes in board");
        cut(&mut outline, tool)?;
    }
    let all_edge_vertices = outline.vertex_keys(KEY_PRECISION);
    let plated_edge_vertices = difference(&all_edge_vertices, &bare_edge_vertices);

    debug!("Number of verts on board perimeter: {}", perimeter_vertices.len());
    debug!("Number of verts on bare board edges: {}", bare_edge_vertices.len());
    debug!("Number of verts on plated board edges: {}", plated_edge_vertices.len());

    let mut mesh = outline;
    extrude(&mut mesh, thickness);
    mesh.recompute_normals();
    let sharp = mark_sharp_edges(&mut mesh, SHARP_ANGLE, SHARP_ANGLE_WINDOW);
    debug!("Marked {} sharp edge(s)", sharp);

    Ok(SolidBoard {
        mesh,
        thickness,
        perimeter_vertices,
        bare_edge_vertices,
        all_edge_vertices,
        plated_edge_vertices,
        fill,
    })
}
