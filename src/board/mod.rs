// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Board synthesis: solid body, surface regions, layer stack and solder

pub mod classify;
pub mod layers;
pub mod model;
pub mod outline;
pub mod solder;
pub mod solidify;

pub use classify::{classify, tag_regions, FaceSets, RegionCounts};
pub use layers::{assemble, LayerPlan, LayerSlot};
pub use model::{BoardLayer, BoardModel};
pub use outline::{center_on_origin, prepare_hole_tool, OutlineLoops};
pub use solder::{place_solder, solder_side, SOLDER_NAME};
pub use solidify::{solidify, SolidBoard};
