// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! End-to-end board generation from an on-disk fabrication directory

use anyhow::Result;
use approx::assert_relative_eq;
use pcbsolid::board::{classify, OutlineLoops};
use pcbsolid::geometry::spatial::{any_coincident, difference};
use pcbsolid::geometry::{analyze, SurfaceRegion};
use pcbsolid::{generate_board, BoardConfig, BoardError, BoardInputs};
use serde_json::json;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

const SEGMENTS: usize = 16;

fn circle(cx: f64, cy: f64, r: f64) -> Vec<[f64; 2]> {
    (0..SEGMENTS)
        .map(|i| {
            let angle = i as f64 / SEGMENTS as f64 * std::f64::consts::TAU;
            [cx + r * angle.cos(), cy + r * angle.sin()]
        })
        .collect()
}

fn write_loops(dir: &Path, name: &str, loops: Vec<Vec<[f64; 2]>>) -> Result<()> {
    fs::create_dir_all(dir.join("outline"))?;
    let content = serde_json::to_string(&OutlineLoops::new(loops))?;
    fs::write(dir.join("outline").join(format!("{name}.json")), content)?;
    Ok(())
}

fn write_inner_images(dir: &Path, count: usize) -> Result<()> {
    fs::create_dir_all(dir.join("PNG"))?;
    for n in 1..=count {
        fs::write(dir.join("PNG").join(format!("In{n}.png")), b"")?;
    }
    Ok(())
}

fn write_stackup(dir: &Path) -> Result<()> {
    let stackup = json!({
        "layers": [
            {"name": "F.SilkS", "thickness": null, "user-name": "F.Silkscreen"},
            {"name": "F.Mask", "thickness": 0.01, "user-name": "F.Mask"},
            {"name": "F.Cu", "thickness": 0.035, "user-name": "F.Cu"},
            {"name": "dielectric 1", "thickness": 0.2, "user-name": "dielectric 1"},
            {"name": "In1.Cu", "thickness": 0.035, "user-name": "In1.Cu"},
            {"name": "dielectric 2 (1/2)", "thickness": 0.5, "user-name": "dielectric 2"},
            {"name": "dielectric 2 (2/2)", "thickness": 0.5, "user-name": "dielectric 2"},
            {"name": "In2.Cu", "thickness": 0.035, "user-name": "In2.Cu"},
            {"name": "dielectric 3", "thickness": 0.2, "user-name": "dielectric 3"},
            {"name": "B.Cu", "thickness": 0.035, "user-name": "B.Cu"},
            {"name": "B.Mask", "thickness": 0.01, "user-name": "B.Mask"},
            {"name": "B.SilkS", "thickness": null, "user-name": "B.Silkscreen"}
        ]
    });
    fs::write(dir.join("stackup.json"), serde_json::to_string_pretty(&stackup)?)?;
    Ok(())
}

/// 40 × 30 board with two plated and one non-plated hole, offset from the origin
fn fab_dir() -> Result<TempDir> {
    let dir = tempfile::tempdir()?;
    let outline = vec![vec![[100.0, 50.0], [140.0, 50.0], [140.0, 80.0], [100.0, 80.0]]];
    write_loops(dir.path(), "Edge_Cuts", outline)?;
    write_loops(
        dir.path(),
        "PTH-drl",
        vec![circle(110.0, 60.0, 0.8), circle(130.0, 70.0, 0.8)],
    )?;
    write_loops(dir.path(), "NPTH-drl", vec![circle(120.0, 65.0, 1.5)])?;
    Ok(dir)
}

fn config_for(dir: &Path) -> BoardConfig {
    let mut config = BoardConfig::default();
    config.settings.fab_dir = dir.to_path_buf();
    config
}

#[test]
fn test_single_layer_board() -> Result<()> {
    let dir = fab_dir()?;
    let config = config_for(dir.path());

    let model = generate_board(&config, BoardInputs::load(&config)?)?;
    assert_eq!(model.layers.len(), 1);

    let [x, y, z] = model.dimensions();
    assert_relative_eq!(x, 40.0, epsilon = 1e-9);
    assert_relative_eq!(y, 30.0, epsilon = 1e-9);
    assert_relative_eq!(z, 1.6, epsilon = 1e-9);
    assert_relative_eq!(model.bounds.center().x, 0.0, epsilon = 1e-9);

    let stats = analyze(&model.layers[0].mesh);
    assert!(stats.is_watertight);
    assert_relative_eq!(stats.bbox[5], 1.6, epsilon = 1e-12);
    assert!(stats.volume < 40.0 * 30.0 * 1.6);

    Ok(())
}

#[test]
fn test_surface_regions_are_tagged() -> Result<()> {
    let dir = fab_dir()?;
    let config = config_for(dir.path());
    let model = generate_board(&config, BoardInputs::load(&config)?)?;
    let base = &model.layers[0];

    let counts = base.region_counts();
    assert_eq!(counts.untagged, 0);
    assert_eq!(counts.plated_edge, 2 * SEGMENTS);
    assert_eq!(counts.bare_edge, 4 + SEGMENTS);
    assert_eq!(counts.top, counts.bottom);

    for i in base.faces(SurfaceRegion::PlatedEdge) {
        assert!(base.mesh.faces[i].normal.z.abs() <= 0.5);
    }
    Ok(())
}

#[test]
fn test_classification_covers_every_face() -> Result<()> {
    let dir = fab_dir()?;
    let config = config_for(dir.path());
    let model = generate_board(&config, BoardInputs::load(&config)?)?;
    let mesh = &model.layers[0].mesh;

    let sets = classify(mesh, None);
    assert_eq!(sets.len(), mesh.face_count());

    let mut seen = vec![0usize; mesh.face_count()];
    for &i in sets.top.iter().chain(&sets.bottom).chain(&sets.edge) {
        seen[i] += 1;
    }
    assert!(seen.iter().all(|&n| n == 1));
    Ok(())
}

#[test]
fn test_plated_and_bare_partition_edge_vertices() -> Result<()> {
    let dir = fab_dir()?;
    let config = config_for(dir.path());
    let inputs = BoardInputs::load(&config)?;
    let solid = pcbsolid::board::solidify(
        inputs.outline,
        inputs.plated_holes,
        inputs.nonplated_holes,
        1.6,
    )?;

    assert_eq!(solid.perimeter_vertices.len(), 4);
    assert_eq!(solid.bare_edge_vertices.len(), 4 + SEGMENTS);
    assert_eq!(solid.plated_edge_vertices.len(), 2 * SEGMENTS);

    // disjoint
    assert!(!any_coincident(&solid.bare_edge_vertices, &solid.plated_edge_vertices));

    // together they make up every edge vertex
    let rest = difference(&solid.all_edge_vertices, &solid.plated_edge_vertices);
    let rest = difference(&rest, &solid.bare_edge_vertices);
    assert!(rest.is_empty());
    assert_eq!(
        solid.all_edge_vertices.len(),
        solid.bare_edge_vertices.len() + solid.plated_edge_vertices.len()
    );
    Ok(())
}

#[test]
fn test_stackup_layers_are_stacked() -> Result<()> {
    let dir = fab_dir()?;
    write_stackup(dir.path())?;
    write_inner_images(dir.path(), 2)?;
    let mut config = config_for(dir.path());
    config.effects.stackup = true;

    let model = generate_board(&config, BoardInputs::load(&config)?)?;
    let total = 0.01 + 0.035 * 4.0 + 0.2 + 1.0 + 0.2 + 0.01;

    assert_eq!(model.layers.len(), 5);
    assert_relative_eq!(model.thickness, total, epsilon = 1e-9);

    let mut expected_offset = 0.0;
    for layer in &model.layers {
        let bbox = layer.mesh.bounding_box();
        assert_relative_eq!(layer.z_offset, expected_offset, epsilon = 1e-9);
        assert_relative_eq!(bbox.min.z, layer.z_offset, epsilon = 1e-9);
        assert_relative_eq!(bbox.max.z, layer.z_offset + layer.thickness, epsilon = 1e-9);
        expected_offset += layer.thickness;

        // duplicates carry the surface tags of the base layer
        assert_eq!(layer.region_counts(), model.layers[0].region_counts());
    }
    assert_relative_eq!(expected_offset, total, epsilon = 1e-6);
    assert_eq!(model.layers[4].name, "PCB_layer5");

    let json = model.to_json()?;
    assert!(json.contains("PCB_layer1"));
    Ok(())
}

#[test]
fn test_even_split_without_stackup_data() -> Result<()> {
    let dir = fab_dir()?;
    write_inner_images(dir.path(), 2)?;
    let mut config = config_for(dir.path());
    config.effects.stackup = true;
    config.effects.require_stackup_file = false;

    let model = generate_board(&config, BoardInputs::load(&config)?)?;
    assert_eq!(model.layers.len(), 4);
    for layer in &model.layers {
        assert_relative_eq!(layer.thickness, 0.4, epsilon = 1e-12);
    }
    let top = model.layers[3].mesh.bounding_box().max.z;
    assert_relative_eq!(top, 1.6, epsilon = 1e-6);
    Ok(())
}

#[test]
fn test_missing_required_stackup_is_fatal() -> Result<()> {
    let dir = fab_dir()?;
    let mut config = config_for(dir.path());
    config.effects.stackup = true;

    let err = generate_board(&config, BoardInputs::load(&config)?).unwrap_err();
    assert!(matches!(err, BoardError::StackupUnavailable { .. }));
    Ok(())
}

#[test]
fn test_inner_layer_mismatch_is_fatal() -> Result<()> {
    let dir = fab_dir()?;
    write_stackup(dir.path())?;
    write_inner_images(dir.path(), 3)?;
    let mut config = config_for(dir.path());
    config.effects.stackup = true;

    let err = generate_board(&config, BoardInputs::load(&config)?).unwrap_err();
    match err {
        BoardError::StackupLayerMismatch { expected, found } => {
            assert_eq!(expected, 3);
            assert_eq!(found, 2);
        }
        other => panic!("unexpected error: {other}"),
    }
    Ok(())
}

#[test]
fn test_missing_outline_is_fatal() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let config = config_for(dir.path());
    let err = BoardInputs::load(&config).unwrap_err();
    assert!(matches!(err, BoardError::Outline(_)));
    Ok(())
}

#[test]
fn test_optional_holes_may_be_missing() -> Result<()> {
    let dir = tempfile::tempdir()?;
    write_loops(
        dir.path(),
        "Edge_Cuts",
        vec![vec![[0.0, 0.0], [10.0, 0.0], [10.0, 10.0], [0.0, 10.0]]],
    )?;
    let config = config_for(dir.path());

    let inputs = BoardInputs::load(&config)?;
    assert!(inputs.plated_holes.is_none());
    assert!(inputs.nonplated_holes.is_none());

    let model = generate_board(&config, inputs)?;
    let counts = model.layers[0].region_counts();
    assert_eq!(counts.plated_edge, 0);
    assert_eq!(counts.bare_edge, 4);
    Ok(())
}

fn square(cx: f64, cy: f64, half: f64) -> Vec<[f64; 2]> {
    vec![
        [cx - half, cy - half],
        [cx + half, cy - half],
        [cx + half, cy + half],
        [cx - half, cy + half],
    ]
}

#[test]
fn test_solder_on_both_sides() -> Result<()> {
    let dir = fab_dir()?;
    write_loops(dir.path(), "F_Solder", vec![square(105.0, 55.0, 1.0), square(135.0, 75.0, 1.0)])?;
    write_loops(dir.path(), "B_Solder", vec![square(105.0, 75.0, 0.3)])?;
    let mut config = config_for(dir.path());
    config.effects.solder = true;

    let model = generate_board(&config, BoardInputs::load(&config)?)?;
    let solder = model.solder.as_ref().expect("solder body");
    let stats = analyze(solder);

    assert!(stats.is_watertight);
    assert!(stats.volume > 0.0);
    // 2 × 2 pads rise 0.39 above the board, the 0.6 × 0.6 back pad hangs 0.1 below
    assert_relative_eq!(stats.bbox[2], -0.1, epsilon = 1e-9);
    assert_relative_eq!(stats.bbox[5], 1.6 + 0.39, epsilon = 1e-9);
    // moved with the outline
    assert_relative_eq!(stats.bbox[0], -16.0, epsilon = 1e-9);
    assert_relative_eq!(stats.bbox[3], 16.0, epsilon = 1e-9);

    // the board extent stays the layer stack
    assert_relative_eq!(model.dimensions()[2], 1.6, epsilon = 1e-9);
    assert_eq!(
        model.face_count(),
        model.layers[0].mesh.face_count() + solder.face_count()
    );
    Ok(())
}

#[test]
fn test_solder_requires_the_effect() -> Result<()> {
    let dir = fab_dir()?;
    write_loops(dir.path(), "F_Solder", vec![square(105.0, 55.0, 1.0)])?;
    let config = config_for(dir.path());

    let inputs = BoardInputs::load(&config)?;
    assert!(inputs.solder_top.is_none());
    let model = generate_board(&config, inputs)?;
    assert!(model.solder.is_none());
    assert!(!model.to_json()?.contains("\"solder\""));
    Ok(())
}

#[test]
fn test_missing_solder_files_are_skipped() -> Result<()> {
    let dir = fab_dir()?;
    let mut config = config_for(dir.path());
    config.effects.solder = true;

    let model = generate_board(&config, BoardInputs::load(&config)?)?;
    assert!(model.solder.is_none());
    Ok(())
}
