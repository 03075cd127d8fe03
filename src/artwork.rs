// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Inner layer artwork discovery

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Outer copper artwork files that sandwich the inner layers
pub const BACK_COPPER_IMAGE: &str = "B_Cu.png";
pub const FRONT_COPPER_IMAGE: &str = "F_Cu.png";

/// A rendered inner copper layer such as `In2.png`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InnerLayerImage {
    pub number: u32,
    pub path: PathBuf,
}

impl InnerLayerImage {
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// Parse `<prefix><N>.png` into `N`
fn inner_layer_number(file_name: &str, prefix: &str) -> Option<u32> {
    file_name
        .strip_prefix(prefix)?
        .strip_suffix(".png")?
        .parse()
        .ok()
}

/// Find inner layer images in `png_dir`, bottom-most (highest number) first.
///
/// A missing directory yields no images.
pub fn discover_inner_layers(png_dir: &Path, prefix: &str) -> Vec<InnerLayerImage> {
    let mut images = Vec::new();

    if !png_dir.is_dir() {
        debug!("No artwork directory at {}", png_dir.display());
        return images;
    }

    for entry in WalkDir::new(png_dir)
        .max_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
    {
        let file_name = entry.file_name().to_string_lossy();
        if let Some(number) = inner_layer_number(&file_name, prefix) {
            images.push(InnerLayerImage {
                number,
                path: entry.path().to_path_buf(),
            });
        }
    }

    images.sort_by(|a, b| b.number.cmp(&a.number));
    debug!("Found {} inner layer image(s) in {}", images.len(), png_dir.display());
    images
}

/// Same as [`discover_inner_layers`], warning when stack-up output expects
/// inner layers and none were found
pub fn discover_for_stackup(png_dir: &Path, prefix: &str) -> Vec<InnerLayerImage> {
    let images = discover_inner_layers(png_dir, prefix);
    if images.is_empty() {
        warn!(
            "Could not find any converted inner layer images in {}; \
             check that the inner layer gerbers were exported",
            png_dir.display()
        );
    }
    images
}

/// Artwork file names from the bottom copper layer up to the top one
pub fn copper_stack(inner: &[InnerLayerImage]) -> Vec<String> {
    let mut names = Vec::with_capacity(inner.len() + 2);
    names.push(BACK_COPPER_IMAGE.to_string());
    names.extend(inner.iter().map(InnerLayerImage::file_name));
    names.push(FRONT_COPPER_IMAGE.to_string());
    names
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;

    #[test]
    fn test_inner_layer_number() {
        assert_eq!(inner_layer_number("In12.png", "In"), Some(12));
        assert_eq!(inner_layer_number("In1.svg", "In"), None);
        assert_eq!(inner_layer_number("F_Cu.png", "In"), None);
        assert_eq!(inner_layer_number("Inner.png", "In"), None);
    }

    #[test]
    fn test_discover_sorts_descending() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["In1.png", "In10.png", "In2.png", "F_Cu.png", "In3.svg"] {
            File::create(dir.path().join(name)).unwrap();
        }
        std::fs::create_dir(dir.path().join("nested")).unwrap();
        File::create(dir.path().join("nested").join("In4.png")).unwrap();

        let images = discover_inner_layers(dir.path(), "In");
        let numbers: Vec<u32> = images.iter().map(|i| i.number).collect();
        assert_eq!(numbers, vec![10, 2, 1]);

        assert_eq!(
            copper_stack(&images),
            vec!["B_Cu.png", "In10.png", "In2.png", "In1.png", "F_Cu.png"]
        );
    }

    #[test]
    fn test_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        assert!(discover_for_stackup(&dir.path().join("PNG"), "In").is_empty());
    }
}
