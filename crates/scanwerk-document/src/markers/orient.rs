// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Corner resolution and orientation.
//
// The four page corners come from the minimum-area rotated rectangle over
// all detected markers. Orientation is fixed by the 3-point cluster: the
// two corners nearest its centroid form the cluster-adjacent edge, which
// maps to the right side of the output frame. Winding on that edge is
// resolved with a signed cross product, and the opposite edge follows by
// direction alignment.

use imageproc::geometry::min_area_rect;
use imageproc::point::Point;
use scanwerk_core::error::{Result, ScanwerkError};
use scanwerk_core::{MarkerCluster, MarkerPoint, Point2, Quadrilateral};
use tracing::{debug, warn};

/// Markers required to determine a quadrilateral.
const REQUIRED_MARKERS: usize = 4;

/// Resolve the raw (unordered) page-corner quadrilateral from a marker set.
///
/// Fewer than 4 markers cannot determine a quadrilateral — that is a hard
/// precondition, reported as [`ScanwerkError::InsufficientMarkers`].
pub fn resolve_corners(markers: &[MarkerPoint]) -> Result<Quadrilateral> {
    if markers.len() < REQUIRED_MARKERS {
        return Err(ScanwerkError::InsufficientMarkers {
            found: markers.len(),
            required: REQUIRED_MARKERS,
        });
    }

    let points: Vec<Point<i32>> = markers
        .iter()
        .map(|m| Point::new(m.center.x.round() as i32, m.center.y.round() as i32))
        .collect();

    let rect = min_area_rect(&points);
    let corners = rect.map(|p| Point2::new(p.x as f32, p.y as f32));
    debug!(markers = markers.len(), "Corner rectangle resolved");
    Ok(Quadrilateral::new(corners))
}

/// Order a raw quadrilateral as `[TL, TR, BR, BL]`.
///
/// With a cluster, the ordering is rotation-invariant: the cluster-adjacent
/// edge becomes the output's right edge regardless of how the photo was
/// turned. Without one, a degraded (upright-photo) default ordering is used;
/// this path must never fail.
pub fn orient_quadrilateral(
    raw: &Quadrilateral,
    cluster: Option<&MarkerCluster>,
) -> Quadrilateral {
    match cluster {
        Some(cluster) => orient_by_cluster(raw, cluster),
        None => {
            warn!("no qualifying orientation cluster; falling back to default corner ordering");
            order_default(raw)
        }
    }
}

fn orient_by_cluster(raw: &Quadrilateral, cluster: &MarkerCluster) -> Quadrilateral {
    let centroid = cluster.centroid();

    let mut by_distance = raw.corners;
    by_distance.sort_by(|a, b| {
        a.distance_squared(centroid)
            .total_cmp(&b.distance_squared(centroid))
    });
    let [near_a, near_b, far_a, far_b] = by_distance;

    // Winding on the cluster-adjacent edge: the sign of the cross product
    // between (quad centre → edge midpoint) and the edge vector says which
    // endpoint sits "above" the other.
    let quad_center = raw.centroid();
    let near_mid = near_a.midpoint(near_b);
    let out_x = near_mid.x - quad_center.x;
    let out_y = near_mid.y - quad_center.y;
    let edge_x = near_b.x - near_a.x;
    let edge_y = near_b.y - near_a.y;

    let (top_right, bottom_right) = if out_x * edge_y - out_y * edge_x > 0.0 {
        (near_a, near_b)
    } else {
        (near_b, near_a)
    };

    // The opposite edge runs the same way as the resolved one; a positive
    // dot product keeps the pairing, a negative one swaps it.
    let right_x = bottom_right.x - top_right.x;
    let right_y = bottom_right.y - top_right.y;
    let left_x = far_b.x - far_a.x;
    let left_y = far_b.y - far_a.y;

    let (top_left, bottom_left) = if right_x * left_x + right_y * left_y > 0.0 {
        (far_a, far_b)
    } else {
        (far_b, far_a)
    };

    Quadrilateral::new([top_left, top_right, bottom_right, bottom_left])
}

/// Default ordering for the no-cluster fallback: assumes the photo is
/// already close to upright. Sort by y; the upper pair ordered by x gives
/// `[TL, TR]`, the lower pair by descending x gives `[BR, BL]`.
fn order_default(raw: &Quadrilateral) -> Quadrilateral {
    let mut by_y = raw.corners;
    by_y.sort_by(|a, b| a.y.total_cmp(&b.y));

    let (mut top, mut bottom) = ([by_y[0], by_y[1]], [by_y[2], by_y[3]]);
    top.sort_by(|a, b| a.x.total_cmp(&b.x));
    bottom.sort_by(|a, b| b.x.total_cmp(&a.x));

    Quadrilateral::new([top[0], top[1], bottom[0], bottom[1]])
}
