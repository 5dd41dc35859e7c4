// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Orientation-cluster search.
//
// The sheet prints three small markers in a tight line near one edge; that
// asymmetry is the only thing that distinguishes "top-left" from the other
// three corners after an arbitrary capture rotation. The search enumerates
// 3-point subsets and keeps those whose spread fits the configured band.

use scanwerk_core::config::ClusterConfig;
use scanwerk_core::{ClusterAxis, MarkerCluster, MarkerPoint};
use std::collections::HashMap;
use tracing::debug;

/// Strategy interface for locating the 3-point orientation cluster.
///
/// Implementations must agree on the selection rule: among qualifying
/// subsets, the one with the smallest leading coordinate wins (leftmost
/// first point for a vertical cluster, topmost for a horizontal one), with
/// marker discovery order breaking exact ties.
pub trait ClusterFinder {
    fn find(
        &self,
        markers: &[MarkerPoint],
        axis: ClusterAxis,
        config: &ClusterConfig,
    ) -> Option<MarkerCluster>;
}

/// Spread test for one candidate triple, honoring the search axis.
fn qualifies(triple: [MarkerPoint; 3], axis: ClusterAxis, config: &ClusterConfig) -> bool {
    let cluster = MarkerCluster::new(triple);
    let (x_spread, y_spread) = cluster.spread;
    match axis {
        ClusterAxis::Vertical => {
            x_spread <= config.max_lateral_spread && y_spread <= config.max_axial_spread
        }
        ClusterAxis::Horizontal => {
            y_spread <= config.max_lateral_spread && x_spread <= config.max_axial_spread
        }
    }
}

/// Tie-break key: the leading coordinate of the subset's first point in
/// discovery order.
fn leading_coordinate(triple: &[MarkerPoint; 3], axis: ClusterAxis) -> f32 {
    match axis {
        ClusterAxis::Vertical => triple[0].center.x,
        ClusterAxis::Horizontal => triple[0].center.y,
    }
}

/// Exhaustive O(n³) subset scan.
///
/// Post-filter marker counts are small (typically under a few dozen), so
/// the cubic scan is affordable and has no failure modes.
#[derive(Debug, Default, Clone, Copy)]
pub struct BruteForceClusterFinder;

impl ClusterFinder for BruteForceClusterFinder {
    fn find(
        &self,
        markers: &[MarkerPoint],
        axis: ClusterAxis,
        config: &ClusterConfig,
    ) -> Option<MarkerCluster> {
        find_in_subset(markers, axis, config)
    }
}

/// Brute-force scan over a slice, keeping the best key. Strict `<` keeps
/// the earliest-enumerated subset on exact key ties, matching a stable
/// sort-then-first selection.
fn find_in_subset(
    markers: &[MarkerPoint],
    axis: ClusterAxis,
    config: &ClusterConfig,
) -> Option<MarkerCluster> {
    if markers.len() < 3 {
        return None;
    }

    let mut best: Option<(f32, [MarkerPoint; 3])> = None;
    for i in 0..markers.len() - 2 {
        for j in (i + 1)..markers.len() - 1 {
            for k in (j + 1)..markers.len() {
                let triple = [markers[i], markers[j], markers[k]];
                if !qualifies(triple, axis, config) {
                    continue;
                }
                let key = leading_coordinate(&triple, axis);
                if best.is_none_or(|(best_key, _)| key < best_key) {
                    best = Some((key, triple));
                }
            }
        }
    }

    best.map(|(_, triple)| MarkerCluster::new(triple))
}

/// Spatial-grid-accelerated search.
///
/// Markers are bucketed by a coarse cell sized to the configured spreads;
/// any qualifying triple fits inside a 3×3 cell neighbourhood, so the cubic
/// scan runs per-neighbourhood instead of over the whole set. Overlapping
/// neighbourhoods re-test some triples, which is harmless: the global
/// best-key selection deduplicates.
#[derive(Debug, Default, Clone, Copy)]
pub struct BucketedClusterFinder;

impl ClusterFinder for BucketedClusterFinder {
    fn find(
        &self,
        markers: &[MarkerPoint],
        axis: ClusterAxis,
        config: &ClusterConfig,
    ) -> Option<MarkerCluster> {
        if markers.len() < 3 {
            return None;
        }

        // Cell extents: a qualifying triple spans at most the lateral
        // spread one way and the axial spread the other.
        let (cell_w, cell_h) = match axis {
            ClusterAxis::Vertical => (config.max_lateral_spread, config.max_axial_spread),
            ClusterAxis::Horizontal => (config.max_axial_spread, config.max_lateral_spread),
        };
        if cell_w <= 0.0 || cell_h <= 0.0 {
            return None;
        }

        let mut buckets: HashMap<(i64, i64), Vec<usize>> = HashMap::new();
        for (idx, marker) in markers.iter().enumerate() {
            let cell = (
                (marker.center.x / cell_w).floor() as i64,
                (marker.center.y / cell_h).floor() as i64,
            );
            buckets.entry(cell).or_default().push(idx);
        }

        let mut best: Option<(f32, MarkerCluster)> = None;
        for &(cx, cy) in buckets.keys() {
            // Gather this cell plus its 3×3 neighbourhood, in discovery
            // order so tie-breaking matches the brute-force scan.
            let mut indices: Vec<usize> = Vec::new();
            for dx in -1..=1 {
                for dy in -1..=1 {
                    if let Some(cell_indices) = buckets.get(&(cx + dx, cy + dy)) {
                        indices.extend_from_slice(cell_indices);
                    }
                }
            }
            indices.sort_unstable();
            indices.dedup();
            if indices.len() < 3 {
                continue;
            }

            let subset: Vec<MarkerPoint> = indices.iter().map(|&i| markers[i]).collect();
            if let Some(cluster) = find_in_subset(&subset, axis, config) {
                let key = leading_coordinate(&cluster.points, axis);
                if best
                    .as_ref()
                    .is_none_or(|(best_key, _)| key < *best_key)
                {
                    best = Some((key, cluster));
                }
            }
        }

        debug!(
            buckets = buckets.len(),
            found = best.is_some(),
            "Bucketed cluster search complete"
        );
        best.map(|(_, cluster)| cluster)
    }
}
