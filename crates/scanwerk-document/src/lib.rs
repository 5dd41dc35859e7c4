// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// scanwerk-document — Geometric normalization of photographed answer sheets.
//
// Provides fiducial-marker detection, orientation resolution, perspective
// normalization, scan-look enhancement, multi-segment stitching, and the
// alternate grid-marker strategy. Everything is pixel-in → pixel-out: no
// network, no persistence, no shared state between calls.

pub mod grid;
pub mod image;
pub mod markers;
pub mod normalize;
pub mod stitch;

// Re-export the primary entry points so callers can use
// `scanwerk_document::CornerMarkerNormalizer` etc. (The `crate::` prefix
// keeps the local `image` module from colliding with the `image` crate.)
pub use crate::grid::GridMarkerNormalizer;
pub use crate::image::processor::ImageProcessor;
pub use crate::markers::cluster::{BruteForceClusterFinder, BucketedClusterFinder, ClusterFinder};
pub use crate::markers::detect::MarkerDetector;
pub use crate::normalize::{CornerMarkerNormalizer, DocumentNormalizer, normalize_document};
pub use crate::stitch::MultiSegmentStitcher;
