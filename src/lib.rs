// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! PCB solid model generator
//!
//! Turns board fabrication data (outline, drill holes, inner layer artwork and
//! an optional stack-up) into positioned layer meshes with tagged surface
//! regions and optional solder bodies, ready for material binding and export.

pub mod artwork;
pub mod board;
pub mod config;
pub mod error;
pub mod geometry;
pub mod stackup;

pub use artwork::{discover_inner_layers, InnerLayerImage};
pub use board::{BoardLayer, BoardModel, LayerPlan, OutlineLoops, SolidBoard};
pub use config::BoardConfig;
pub use error::{BoardError, Result};
pub use geometry::{Mesh, SurfaceRegion};
pub use stackup::{StackLayer, StackupInfo, StackupModel};

use artwork::{copper_stack, discover_for_stackup};
use board::{
    assemble, center_on_origin, place_solder, prepare_hole_tool, solder_side, solidify,
    tag_regions,
};
use nalgebra::Vector3;
use std::sync::Arc;
use tracing::{debug, info};

/// Geometry inputs of one board, centred on the XY origin
#[derive(Debug, Clone)]
pub struct BoardInputs {
    /// Edges-only board outline at Z = 0
    pub outline: Mesh,
    pub plated_holes: Option<Mesh>,
    pub nonplated_holes: Option<Mesh>,
    /// Inner copper artwork, bottom-most first
    pub inner_layers: Vec<InnerLayerImage>,
    /// Front side solder pads, base at Z = 0
    pub solder_top: Option<Mesh>,
    /// Back side solder pads, base at Z = 0, not yet mirrored
    pub solder_bottom: Option<Mesh>,
    /// Translation applied to move the imported outline onto the origin
    pub offset: Vector3<f64>,
}

impl BoardInputs {
    /// Build the outline mesh and hole tools from imported loops
    pub fn from_loops(
        outline: &OutlineLoops,
        plated: Option<&OutlineLoops>,
        nonplated: Option<&OutlineLoops>,
    ) -> Result<Self> {
        if outline.is_empty() {
            return Err(BoardError::Outline("board outline has no curves".to_string()));
        }
        let mut outline = outline.to_mesh();
        let mut plated_holes = plated.map(prepare_hole_tool).transpose()?;
        let mut nonplated_holes = nonplated.map(prepare_hole_tool).transpose()?;

        let mut tools: Vec<&mut Mesh> = plated_holes
            .iter_mut()
            .chain(nonplated_holes.iter_mut())
            .collect();
        let offset = center_on_origin(&mut outline, &mut tools);
        debug!("Moved board to origin by ({:.3}, {:.3})", offset.x, offset.y);

        Ok(Self {
            outline,
            plated_holes,
            nonplated_holes,
            inner_layers: Vec::new(),
            solder_top: None,
            solder_bottom: None,
            offset,
        })
    }

    /// Build the solder pads of both sides, moved with the outline
    pub fn with_solder(
        mut self,
        top: Option<&OutlineLoops>,
        bottom: Option<&OutlineLoops>,
    ) -> Result<Self> {
        let side = |loops: Option<&OutlineLoops>| -> Result<Option<Mesh>> {
            let Some(loops) = loops else {
                return Ok(None);
            };
            let mut mesh = solder_side(loops)?;
            if let Some(mesh) = mesh.as_mut() {
                mesh.translate(&self.offset);
            }
            Ok(mesh)
        };
        let solder_top = side(top)?;
        let solder_bottom = side(bottom)?;
        self.solder_top = solder_top;
        self.solder_bottom = solder_bottom;
        Ok(self)
    }

    /// Read the outline files and discover inner layer artwork
    pub fn load(config: &BoardConfig) -> Result<Self> {
        let outline_path = config.outline_path(&config.filenames.edge_cuts);
        if !outline_path.is_file() {
            return Err(BoardError::Outline(format!(
                "no board outline found at {}",
                outline_path.display()
            )));
        }
        let outline = OutlineLoops::from_file(&outline_path)?;
        let plated = OutlineLoops::load_optional(&config.outline_path(&config.filenames.pth), "pth")?;
        let nonplated =
            OutlineLoops::load_optional(&config.outline_path(&config.filenames.npth), "npth")?;

        let mut inputs = Self::from_loops(&outline, plated.as_ref(), nonplated.as_ref())?;
        if config.effects.solder {
            let top = OutlineLoops::load_optional(
                &config.outline_path(&config.filenames.solder_top),
                "front solder",
            )?;
            let bottom = OutlineLoops::load_optional(
                &config.outline_path(&config.filenames.solder_bottom),
                "back solder",
            )?;
            inputs = inputs.with_solder(top.as_ref(), bottom.as_ref())?;
        }
        let inner_layers = if config.effects.stackup {
            discover_for_stackup(&config.png_dir(), &config.filenames.inner_prefix)
        } else {
            Vec::new()
        };
        Ok(inputs.with_inner_layers(inner_layers))
    }

    pub fn with_inner_layers(mut self, inner_layers: Vec<InnerLayerImage>) -> Self {
        self.inner_layers = inner_layers;
        self
    }
}

/// Runs the board pipeline for one configuration.
///
/// Keeps the stack-up cache alive between runs.
pub struct BoardGenerator<'a> {
    config: &'a BoardConfig,
    stackups: StackupModel,
}

impl<'a> BoardGenerator<'a> {
    pub fn new(config: &'a BoardConfig) -> Self {
        let stackups = if config.effects.require_stackup_file {
            StackupModel::new()
        } else {
            StackupModel::new().tolerate_missing()
        };
        Self { config, stackups }
    }

    pub fn stackup(&self) -> Result<Arc<StackupInfo>> {
        self.stackups.compute(
            &self.config.stackup_path(),
            self.config.settings.default_board_thickness,
            self.config.effects.stackup,
        )
    }

    /// Layer thickness plan for `inner_layers` discovered inner layers
    pub fn plan(&self, inner_layers: usize) -> Result<LayerPlan> {
        let stackup = self.stackup()?;
        LayerPlan::plan(
            &stackup,
            self.config.effects.stackup,
            inner_layers,
            &self.config.filenames.inner_prefix,
        )
    }

    pub fn generate(&self, inputs: BoardInputs) -> Result<BoardModel> {
        info!("Generating board");

        let stackup = self.stackup()?;
        let plan = self.plan(inputs.inner_layers.len())?;
        if self.config.effects.stackup {
            debug!("Found layer list: {:?}", copper_stack(&inputs.inner_layers));
        }

        let mut solid = solidify(
            inputs.outline,
            inputs.plated_holes,
            inputs.nonplated_holes,
            plan.base_thickness(),
        )?;
        tag_regions(
            &mut solid.mesh,
            &solid.plated_edge_vertices,
            &solid.bare_edge_vertices,
        );

        let layers = assemble(solid.mesh, &plan);
        let mut model = BoardModel::new(layers, stackup.total_thickness);

        if self.config.effects.solder {
            match place_solder(inputs.solder_top, inputs.solder_bottom, plan.total_thickness()) {
                Some(solder) => model = model.with_solder(solder),
                None => info!("No solder pads found"),
            }
        }

        let [x, y, z] = model.dimensions();
        info!("Board dimensions: x:{x:.3} y:{y:.3} z:{z:.3}");
        info!("Board generated");
        Ok(model)
    }
}

/// Stack-up, layer plan, solid board, surface tags and layer stack, in order
pub fn generate_board(config: &BoardConfig, inputs: BoardInputs) -> Result<BoardModel> {
    BoardGenerator::new(config).generate(inputs)
}
