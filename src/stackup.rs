// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Stack-up parsing and thickness computation
//!
//! The stack-up file lists physical layers from the front of the board to the
//! back. Dielectrics split into several sub-entries (`dielectric 1 (1/2)`,
//! `dielectric 1 (2/2)`) are folded into one `dielectric 1` entry.

use crate::error::{BoardError, Result};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

const DIELECTRIC_PREFIX: &str = "dielectric ";

/// One physical layer record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StackLayer {
    pub name: String,
    /// `None` marks a non-physical layer (silkscreen, paste) that adds no height
    #[serde(default)]
    pub thickness: Option<f64>,
    #[serde(rename = "user-name", default)]
    pub user_name: String,
}

impl StackLayer {
    pub fn new(name: impl Into<String>, thickness: Option<f64>) -> Self {
        let name = name.into();
        Self {
            user_name: name.clone(),
            name,
            thickness,
        }
    }
}

#[derive(Debug, Deserialize)]
struct StackupFile {
    layers: Vec<StackLayer>,
}

/// Parsed stack-up and the board thickness derived from it
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StackupInfo {
    /// Layer records in file order, dielectric parts merged.
    /// Empty when stack-up generation is disabled.
    pub layers: Vec<StackLayer>,
    pub total_thickness: f64,
}

impl StackupInfo {
    /// Stack-up used when no layer data is available
    pub fn flat(total_thickness: f64) -> Self {
        Self {
            layers: Vec::new(),
            total_thickness,
        }
    }

    pub fn from_layers(layers: Vec<StackLayer>) -> Self {
        let total_thickness = sum_thickness(&layers);
        Self {
            layers: merge_dielectrics(&layers),
            total_thickness,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// Number of entries whose name contains the inner layer token
    pub fn inner_layer_count(&self, marker: &str) -> usize {
        self.layers
            .iter()
            .filter(|layer| layer.name.contains(marker))
            .count()
    }

    /// Check the stack-up against the number of inner layer images found on disk
    pub fn validate_inner_layers(&self, marker: &str, discovered: usize) -> Result<()> {
        let found = self.inner_layer_count(marker);
        if found != discovered {
            return Err(BoardError::StackupLayerMismatch {
                expected: discovered,
                found,
            });
        }
        Ok(())
    }
}

/// Sum of every non-null thickness
pub fn sum_thickness(layers: &[StackLayer]) -> f64 {
    layers.iter().filter_map(|layer| layer.thickness).sum()
}

/// Returns the dielectric number and whether the name is a partial entry
/// (`dielectric 3 (1/2)` -> `(3, true)`, `dielectric 3` -> `(3, false)`).
fn dielectric_group(name: &str) -> Option<(u32, bool)> {
    let rest = name.strip_prefix(DIELECTRIC_PREFIX)?;
    let (number, suffix) = match rest.split_once(' ') {
        Some((number, suffix)) => (number, Some(suffix)),
        None => (rest, None),
    };
    let number: u32 = number.parse().ok()?;

    match suffix {
        None => Some((number, false)),
        Some(suffix) => {
            let inner = suffix.strip_prefix('(')?.strip_suffix(')')?;
            let (part, total) = inner.split_once('/')?;
            part.trim().parse::<u32>().ok()?;
            total.trim().parse::<u32>().ok()?;
            Some((number, true))
        }
    }
}

fn add_thickness(a: Option<f64>, b: Option<f64>) -> Option<f64> {
    match (a, b) {
        (None, None) => None,
        (a, b) => Some(a.unwrap_or(0.0) + b.unwrap_or(0.0)),
    }
}

/// Fold consecutive `dielectric N (i/total)` entries into one `dielectric N`.
///
/// A partial entry is only folded into the entry emitted right before it, and
/// only when that entry carries the same number. A partial entry that starts
/// a new group is emitted as `dielectric N`, even without siblings. Entries
/// that are already merged pass through unchanged.
pub fn merge_dielectrics(layers: &[StackLayer]) -> Vec<StackLayer> {
    let mut merged: Vec<StackLayer> = Vec::with_capacity(layers.len());

    for layer in layers {
        if let Some((number, true)) = dielectric_group(&layer.name) {
            if let Some(previous) = merged.last_mut() {
                if matches!(dielectric_group(&previous.name), Some((n, _)) if n == number) {
                    previous.thickness = add_thickness(previous.thickness, layer.thickness);
                    continue;
                }
            }
            merged.push(StackLayer {
                name: format!("{DIELECTRIC_PREFIX}{number}"),
                ..layer.clone()
            });
            continue;
        }
        merged.push(layer.clone());
    }

    merged
}

/// Read the raw layer records from a stack-up file
pub fn parse_stackup_file(path: &Path) -> Result<Vec<StackLayer>> {
    debug!("Loading stackup data from: {}", path.display());
    let content = std::fs::read_to_string(path).map_err(|source| BoardError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let file: StackupFile =
        serde_json::from_str(&content).map_err(|source| BoardError::StackupParse {
            path: path.to_path_buf(),
            source,
        })?;
    Ok(file.layers)
}

/// Computes `StackupInfo` and memoizes parse results per source path.
///
/// The stack-up file is not expected to change during a run, so each path is
/// parsed at most once.
pub struct StackupModel {
    cache: Arc<DashMap<PathBuf, Arc<StackupInfo>>>,
    require_file: bool,
}

impl StackupModel {
    pub fn new() -> Self {
        Self {
            cache: Arc::new(DashMap::new()),
            require_file: true,
        }
    }

    /// Fall back to a flat stack-up instead of failing when the file is missing
    pub fn tolerate_missing(mut self) -> Self {
        self.require_file = false;
        self
    }

    pub fn compute(
        &self,
        source: &Path,
        default_thickness: f64,
        stackup_enabled: bool,
    ) -> Result<Arc<StackupInfo>> {
        if !stackup_enabled {
            return Ok(Arc::new(StackupInfo::flat(default_thickness)));
        }

        if let Some(info) = self.cache.get(source) {
            return Ok(Arc::clone(info.value()));
        }

        if !source.is_file() {
            if self.require_file {
                return Err(BoardError::StackupUnavailable {
                    path: source.to_path_buf(),
                });
            }
            debug!(
                "No stackup file at {}, using default thickness {}",
                source.display(),
                default_thickness
            );
            return Ok(Arc::new(StackupInfo::flat(default_thickness)));
        }

        let raw = parse_stackup_file(source)?;
        let mut info = StackupInfo::from_layers(raw);
        if info.total_thickness <= 0.0 {
            // a stack-up without any thickness cannot describe a board
            info.total_thickness = default_thickness;
        }

        debug!("Found stackup data: {:?}", info.layers);
        debug!("Calculated thickness: {}", info.total_thickness);

        let info = Arc::new(info);
        self.cache
            .insert(source.to_path_buf(), Arc::clone(&info));
        Ok(info)
    }

    /// Number of parsed stack-up files held in the cache
    pub fn cached_sources(&self) -> usize {
        self.cache.len()
    }
}

impl Default for StackupModel {
    fn default() -> Self {
        Self::new()
    }
}
