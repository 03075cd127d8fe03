// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Geometry module - mesh representation and operations

pub mod analytics;
mod bbox;
pub mod boolean;
mod bvh;
pub mod extrude;
pub mod fill;
mod mesh;
pub mod spatial;

pub use analytics::{analyze, GeometryStats};
pub use bbox::BoundingBox;
pub use boolean::{boolean_difference, clean_boolean_artifacts, union_outline, DifferenceReport};
pub use extrude::{extrude, mark_sharp_edges};
pub use fill::{fill_boundary, FillReport};
pub use mesh::{edge_key, Face, Mesh, SurfaceRegion, Vertex};
pub use spatial::{SpatialVertexIndex, Vertex3};
