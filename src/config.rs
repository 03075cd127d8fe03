// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Board generation configuration
//!
//! A `BoardConfig` is loaded once and passed by reference to every stage.
//! Nothing in the pipeline mutates it.

use crate::error::BoardError;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Name of the configuration file looked up in the working directory
pub const CONFIG_FILENAME: &str = "pcbsolid.toml";

/// Name of the stack-up description inside the fabrication directory
pub const STACKUP_FILENAME: &str = "stackup.json";

/// Top-level configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct BoardConfig {
    pub settings: Settings,
    pub effects: Effects,
    pub filenames: Filenames,
}

/// General settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Fabrication data directory
    pub fab_dir: PathBuf,
    /// Board thickness in mm used when no stack-up is available
    pub default_board_thickness: f64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            fab_dir: PathBuf::from("fab"),
            default_board_thickness: 1.6,
        }
    }
}

/// Optional pipeline effects
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Effects {
    /// Build one mesh per physical layer from `stackup.json`
    pub stackup: bool,
    /// Treat a missing `stackup.json` as fatal when `stackup` is enabled.
    /// When false the layer thickness is split evenly instead.
    pub require_stackup_file: bool,
    /// Add solder bodies on the pads of both board sides
    pub solder: bool,
}

impl Default for Effects {
    fn default() -> Self {
        Self {
            stackup: false,
            require_stackup_file: true,
            solder: false,
        }
    }
}

/// Names of the intermediate files produced by the conversion toolchain
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Filenames {
    pub edge_cuts: String,
    pub pth: String,
    pub npth: String,
    /// Pad loops of the front side solder
    pub solder_top: String,
    /// Pad loops of the back side solder
    pub solder_bottom: String,
    /// Prefix of inner copper layer images (`In1.png`, `In2.png`, ...).
    /// Also the token used to count inner layers in the stack-up.
    pub inner_prefix: String,
    /// Directory holding `<name>.json` outline loops, relative to `fab_dir`
    pub outline_dir: PathBuf,
    /// Directory holding rendered layer images, relative to `fab_dir`
    pub png_dir: PathBuf,
}

impl Default for Filenames {
    fn default() -> Self {
        Self {
            edge_cuts: "Edge_Cuts".to_string(),
            pth: "PTH-drl".to_string(),
            npth: "NPTH-drl".to_string(),
            solder_top: "F_Solder".to_string(),
            solder_bottom: "B_Solder".to_string(),
            inner_prefix: "In".to_string(),
            outline_dir: PathBuf::from("outline"),
            png_dir: PathBuf::from("PNG"),
        }
    }
}

impl BoardConfig {
    /// Load configuration from file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {:?}", path.as_ref()))?;
        let config: BoardConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path.as_ref()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration with environment variable overrides.
    ///
    /// Falls back to defaults when `path` does not exist.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let mut config = if path.as_ref().exists() {
            Self::from_file(path.as_ref())?
        } else {
            Self::default()
        };

        if let Ok(fab_dir) = std::env::var("PCBSOLID_FAB_DIR") {
            config.settings.fab_dir = PathBuf::from(fab_dir);
        }

        if let Ok(stackup) = std::env::var("PCBSOLID_STACKUP") {
            config.effects.stackup = stackup
                .parse()
                .with_context(|| format!("PCBSOLID_STACKUP is not a boolean: {stackup}"))?;
        }

        if let Ok(solder) = std::env::var("PCBSOLID_SOLDER") {
            config.effects.solder = solder
                .parse()
                .with_context(|| format!("PCBSOLID_SOLDER is not a boolean: {solder}"))?;
        }

        if let Ok(thickness) = std::env::var("PCBSOLID_THICKNESS") {
            config.settings.default_board_thickness = thickness
                .parse()
                .with_context(|| format!("PCBSOLID_THICKNESS is not a number: {thickness}"))?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(path.as_ref(), content)
            .with_context(|| format!("Failed to write config file: {:?}", path.as_ref()))?;
        Ok(())
    }

    /// Check value ranges that serde cannot express
    pub fn validate(&self) -> std::result::Result<(), BoardError> {
        let thickness = self.settings.default_board_thickness;
        if !thickness.is_finite() || thickness <= 0.0 {
            return Err(BoardError::Config(format!(
                "default_board_thickness must be a positive number, got {thickness}"
            )));
        }
        if self.filenames.inner_prefix.is_empty() {
            return Err(BoardError::Config("inner_prefix must not be empty".to_string()));
        }
        if self.filenames.edge_cuts.is_empty() {
            return Err(BoardError::Config("edge_cuts file name must not be empty".to_string()));
        }
        Ok(())
    }

    pub fn stackup_path(&self) -> PathBuf {
        self.settings.fab_dir.join(STACKUP_FILENAME)
    }

    /// Path of the JSON loops file for an outline layer such as `Edge_Cuts`
    pub fn outline_path(&self, name: &str) -> PathBuf {
        self.settings
            .fab_dir
            .join(&self.filenames.outline_dir)
            .join(format!("{name}.json"))
    }

    pub fn png_dir(&self) -> PathBuf {
        self.settings.fab_dir.join(&self.filenames.png_dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = BoardConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.settings.default_board_thickness, 1.6);
        assert!(!config.effects.stackup);
        assert!(!config.effects.solder);
        assert_eq!(config.filenames.solder_top, "F_Solder");
        assert_eq!(config.stackup_path(), PathBuf::from("fab/stackup.json"));
        assert_eq!(
            config.outline_path("Edge_Cuts"),
            PathBuf::from("fab/outline/Edge_Cuts.json")
        );
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: BoardConfig = toml::from_str(
            r#"
            [effects]
            stackup = true
            "#,
        )
        .unwrap();
        assert!(config.effects.stackup);
        assert!(config.effects.require_stackup_file);
        assert_eq!(config.filenames.inner_prefix, "In");
    }

    #[test]
    fn test_rejects_non_positive_thickness() {
        let mut config = BoardConfig::default();
        config.settings.default_board_thickness = 0.0;
        assert!(matches!(config.validate(), Err(BoardError::Config(_))));
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILENAME);
        let mut config = BoardConfig::default();
        config.effects.stackup = true;
        config.settings.default_board_thickness = 0.8;
        config.save(&path).unwrap();

        let loaded = BoardConfig::from_file(&path).unwrap();
        assert_eq!(loaded, config);
    }
}
