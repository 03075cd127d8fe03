// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Layer thickness planning and stacking of the layer meshes

use super::model::BoardLayer;
use crate::error::Result;
use crate::geometry::Mesh;
use crate::stackup::StackupInfo;
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Vertices at or above this height belong to the top of a layer
pub const TOP_VERTEX_Z: f64 = 1e-4;

/// Name of the n-th layer mesh, counted from 1
pub fn layer_name(index: usize) -> String {
    format!("PCB_layer{}", index + 1)
}

/// One entry of the layer plan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerSlot {
    pub layer_name: String,
    pub thickness: f64,
    /// Sum of the thicknesses of all slots below this one
    pub z_offset: f64,
}

/// Ordered layer thicknesses, bottom first
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LayerPlan {
    pub slots: Vec<LayerSlot>,
}

impl LayerPlan {
    pub fn from_thicknesses(thicknesses: &[f64]) -> Self {
        let mut z_offset = 0.0;
        let slots = thicknesses
            .iter()
            .enumerate()
            .map(|(i, &thickness)| {
                let slot = LayerSlot {
                    layer_name: layer_name(i),
                    thickness,
                    z_offset,
                };
                z_offset += thickness;
                slot
            })
            .collect();
        Self { slots }
    }

    /// Single layer carrying the whole board
    pub fn single(total_thickness: f64) -> Self {
        Self::from_thicknesses(&[total_thickness])
    }

    /// Even split across the outer layers and `inner_layers` inner layers
    pub fn even_split(total_thickness: f64, inner_layers: usize) -> Self {
        let count = inner_layers + 2;
        Self::from_thicknesses(&vec![total_thickness / count as f64; count])
    }

    /// Back mask, dielectrics from bottom to top, front mask.
    ///
    /// Copper does not get a slot of its own; its total thickness is spread
    /// evenly over all slots.
    pub fn from_stackup(info: &StackupInfo) -> Self {
        let side_sum = |prefix: &str| -> f64 {
            info.layers
                .iter()
                .filter(|l| l.name.starts_with(prefix) && !l.name.ends_with(".Cu"))
                .filter_map(|l| l.thickness)
                .sum()
        };
        let copper: f64 = info
            .layers
            .iter()
            .filter(|l| l.name.contains(".Cu"))
            .filter_map(|l| l.thickness)
            .sum();

        let mut thicknesses = vec![side_sum("B.")];
        thicknesses.extend(
            info.layers
                .iter()
                .rev()
                .filter(|l| l.name.contains("dielectric"))
                .map(|l| l.thickness.unwrap_or(0.0)),
        );
        thicknesses.push(side_sum("F."));

        let correction = copper / thicknesses.len() as f64;
        for thickness in &mut thicknesses {
            *thickness += correction;
        }
        Self::from_thicknesses(&thicknesses)
    }

    /// Pick the thickness policy for a run.
    ///
    /// Without stack-up output the board is one layer. With stack-up output
    /// but no layer data the thickness is split evenly. Otherwise the number
    /// of inner layers in the stack-up must match the discovered artwork.
    pub fn plan(
        info: &StackupInfo,
        stackup_enabled: bool,
        inner_layers: usize,
        inner_marker: &str,
    ) -> Result<Self> {
        let plan = if !stackup_enabled {
            Self::single(info.total_thickness)
        } else if info.is_empty() {
            Self::even_split(info.total_thickness, inner_layers)
        } else {
            info.validate_inner_layers(inner_marker, inner_layers)?;
            Self::from_stackup(info)
        };
        debug!("Thickness of layers: {:?}", plan.thicknesses());
        Ok(plan)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn thicknesses(&self) -> Vec<f64> {
        self.slots.iter().map(|s| s.thickness).collect()
    }

    pub fn total_thickness(&self) -> f64 {
        self.slots.iter().map(|s| s.thickness).sum()
    }

    /// Thickness the base layer is extruded to
    pub fn base_thickness(&self) -> f64 {
        self.slots.first().map_or(0.0, |s| s.thickness)
    }
}

/// Set the top of a layer mesh to `thickness`
fn rescale_top(mesh: &mut Mesh, thickness: f64) {
    for vertex in &mut mesh.vertices {
        if vertex.position.z >= TOP_VERTEX_Z {
            vertex.position.z = thickness;
        }
    }
}

/// Stack copies of the solid base layer according to `plan`.
///
/// The base keeps its place at Z = 0. Every further layer is a copy of the
/// base with its top moved to the layer's thickness, lifted to its offset.
pub fn assemble(base: Mesh, plan: &LayerPlan) -> Vec<BoardLayer> {
    if plan.is_empty() {
        return Vec::new();
    }

    info!("Creating layers ({})", plan.len());
    let mut layers = Vec::with_capacity(plan.len());

    for slot in plan.slots.iter().skip(1) {
        let mut mesh = base.duplicate();
        rescale_top(&mut mesh, slot.thickness);
        mesh.translate(&Vector3::new(0.0, 0.0, slot.z_offset));
        debug!(
            "Created layer {} at Z={:.3} with width={:.3}",
            slot.layer_name, slot.z_offset, slot.thickness
        );
        layers.push(BoardLayer::new(slot, mesh));
    }

    layers.insert(0, BoardLayer::new(&plan.slots[0], base));
    layers
}
