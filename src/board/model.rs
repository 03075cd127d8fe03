// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Positioned multi-layer board handed to material binding and export

use super::classify::{faces_in_region, region_counts, RegionCounts};
use super::layers::LayerSlot;
use crate::geometry::{analyze, BoundingBox, GeometryStats, Mesh, SurfaceRegion};
use nalgebra::Point3;
use serde::Serialize;

/// One positioned layer mesh
#[derive(Debug, Clone, Serialize)]
pub struct BoardLayer {
    pub name: String,
    pub thickness: f64,
    pub z_offset: f64,
    pub mesh: Mesh,
}

impl BoardLayer {
    pub fn new(slot: &LayerSlot, mesh: Mesh) -> Self {
        Self {
            name: slot.layer_name.clone(),
            thickness: slot.thickness,
            z_offset: slot.z_offset,
            mesh,
        }
    }

    pub fn faces(&self, region: SurfaceRegion) -> Vec<usize> {
        faces_in_region(&self.mesh, region)
    }

    pub fn region_counts(&self) -> RegionCounts {
        region_counts(&self.mesh)
    }

    pub fn stats(&self) -> GeometryStats {
        analyze(&self.mesh)
    }
}

/// Ordered layers, bottom first, with the board extent
#[derive(Debug, Clone, Serialize)]
pub struct BoardModel {
    pub layers: Vec<BoardLayer>,
    /// Outline extent in XY, Z from 0 to the total board thickness
    pub bounds: BoundingBox,
    pub thickness: f64,
    /// Solder on both sides, above the top layer and below Z = 0
    #[serde(skip_serializing_if = "Option::is_none")]
    pub solder: Option<Mesh>,
}

impl BoardModel {
    pub fn new(layers: Vec<BoardLayer>, thickness: f64) -> Self {
        let outline = layers
            .first()
            .map(|layer| layer.mesh.bounding_box())
            .unwrap_or_else(BoundingBox::empty);
        let bounds = if outline.is_empty() {
            outline
        } else {
            BoundingBox::new(
                Point3::new(outline.min.x, outline.min.y, 0.0),
                Point3::new(outline.max.x, outline.max.y, thickness),
            )
        };
        Self {
            layers,
            bounds,
            thickness,
            solder: None,
        }
    }

    pub fn with_solder(mut self, solder: Mesh) -> Self {
        self.solder = Some(solder);
        self
    }

    /// Board width, height and thickness
    pub fn dimensions(&self) -> [f64; 3] {
        let size = self.bounds.size();
        [size.x, size.y, size.z]
    }

    pub fn layer(&self, name: &str) -> Option<&BoardLayer> {
        self.layers.iter().find(|layer| layer.name == name)
    }

    /// Layer meshes followed by the solder body
    pub fn meshes(&self) -> impl Iterator<Item = &Mesh> {
        self.layers
            .iter()
            .map(|layer| &layer.mesh)
            .chain(self.solder.iter())
    }

    pub fn vertex_count(&self) -> usize {
        self.meshes().map(Mesh::vertex_count).sum()
    }

    pub fn face_count(&self) -> usize {
        self.meshes().map(Mesh::face_count).sum()
    }

    /// All layers and the solder merged into one mesh
    pub fn combined_mesh(&self) -> Mesh {
        let mut mesh = Mesh::new();
        for part in self.meshes() {
            mesh.merge(part);
        }
        mesh
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
