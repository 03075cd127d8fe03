// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Error types for board generation

use std::path::PathBuf;
use thiserror::Error;

/// Fatal errors raised while generating a board.
///
/// Degenerate boolean output is not represented here: it is repaired in place
/// and only reported at debug level.
#[derive(Debug, Error)]
pub enum BoardError {
    #[error("stack-up generation is enabled but no stack-up file was found at {}", path.display())]
    StackupUnavailable { path: PathBuf },

    #[error("could not parse stack-up file {}", path.display())]
    StackupParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error(
        "stack-up layer mismatch: found {expected} inner layer image(s), \
         found {found} inner layer(s) defined in the stack-up"
    )]
    StackupLayerMismatch { expected: usize, found: usize },

    #[error("failed to read {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("board outline unusable: {0}")]
    Outline(String),

    #[error("triangulation failed: {0}")]
    Triangulation(String),
}

pub type Result<T> = std::result::Result<T, BoardError>;
