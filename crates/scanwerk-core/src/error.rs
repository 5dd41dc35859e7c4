// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for Scanwerk.
//
// Expected "not found" conditions (no orientation cluster, a failed paper
// boundary on one stitch segment) are modelled as fallback paths, not errors;
// only conditions that terminate processing for an image appear here.

use thiserror::Error;

/// Top-level error type for all Scanwerk operations.
#[derive(Debug, Error)]
pub enum ScanwerkError {
    // -- Detection errors --
    #[error("insufficient markers: found {found}, need at least {required}")]
    InsufficientMarkers { found: usize, required: usize },

    // -- Geometry errors --
    #[error("degenerate page geometry: {0}")]
    GeometryDegenerate(String),

    // -- Stitching --
    #[error("no usable segments in stitch batch ({attempted} attempted)")]
    NoUsableSegments { attempted: usize },

    // -- Imaging --
    #[error("image processing failed: {0}")]
    ImageError(String),

    // -- Storage / persistence --
    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, ScanwerkError>;
