// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Fiducial-marker handling: centroid detection, orientation-cluster search,
// and corner resolution/ordering.

pub mod cluster;
pub mod detect;
pub mod orient;

pub use cluster::{BruteForceClusterFinder, BucketedClusterFinder, ClusterFinder};
pub use detect::MarkerDetector;
pub use orient::{orient_quadrilateral, resolve_corners};
