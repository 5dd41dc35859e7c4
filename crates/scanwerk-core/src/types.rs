// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types for the Scanwerk normalization engine.
//
// Everything here is a plain value: created fresh per processing call,
// never shared across invocations, never mutated after construction.

use serde::{Deserialize, Serialize};

/// A point in image coordinates (sub-pixel precision).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point2 {
    pub x: f32,
    pub y: f32,
}

impl Point2 {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Squared Euclidean distance. Cheaper than a true distance when only
    /// comparing.
    pub fn distance_squared(&self, other: Point2) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx * dx + dy * dy
    }

    /// Euclidean distance to another point.
    pub fn distance(&self, other: Point2) -> f32 {
        self.distance_squared(other).sqrt()
    }

    /// Midpoint between this point and another.
    pub fn midpoint(&self, other: Point2) -> Point2 {
        Point2::new((self.x + other.x) / 2.0, (self.y + other.y) / 2.0)
    }
}

/// A detected fiducial-marker candidate: the centroid of an accepted
/// contour plus the contour's measured area in px².
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MarkerPoint {
    pub center: Point2,
    pub area: f32,
}

impl MarkerPoint {
    pub const fn new(center: Point2, area: f32) -> Self {
        Self { center, area }
    }
}

/// Which way the 3-point orientation cluster is expected to run.
///
/// The cluster is printed along the sheet's short axis, so a wide capture
/// searches for a vertically-stacked cluster and a tall capture for a
/// horizontally-stacked one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClusterAxis {
    /// Three markers stacked top-to-bottom (wide / landscape capture).
    Vertical,
    /// Three markers running left-to-right (tall / portrait capture).
    Horizontal,
}

/// The 3-point asymmetric marker cluster used to disambiguate orientation.
///
/// Points keep their discovery order; `spread` is the cluster's bounding-box
/// extent (width, height).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MarkerCluster {
    pub points: [MarkerPoint; 3],
    pub spread: (f32, f32),
}

impl MarkerCluster {
    pub fn new(points: [MarkerPoint; 3]) -> Self {
        let xs = points.map(|p| p.center.x);
        let ys = points.map(|p| p.center.y);
        let min_x = xs.iter().copied().fold(f32::INFINITY, f32::min);
        let max_x = xs.iter().copied().fold(f32::NEG_INFINITY, f32::max);
        let min_y = ys.iter().copied().fold(f32::INFINITY, f32::min);
        let max_y = ys.iter().copied().fold(f32::NEG_INFINITY, f32::max);
        Self {
            points,
            spread: (max_x - min_x, max_y - min_y),
        }
    }

    /// Arithmetic mean of the three member centroids.
    pub fn centroid(&self) -> Point2 {
        let sum_x: f32 = self.points.iter().map(|p| p.center.x).sum();
        let sum_y: f32 = self.points.iter().map(|p| p.center.y).sum();
        Point2::new(sum_x / 3.0, sum_y / 3.0)
    }
}

/// Four page corners.
///
/// A freshly-detected quadrilateral is *unordered*; once orientation is
/// resolved the corners are invariantly `[top-left, top-right, bottom-right,
/// bottom-left]` and every consumer (in particular the perspective warp)
/// assumes that ordering.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quadrilateral {
    pub corners: [Point2; 4],
}

impl Quadrilateral {
    pub const fn new(corners: [Point2; 4]) -> Self {
        Self { corners }
    }

    pub fn top_left(&self) -> Point2 {
        self.corners[0]
    }

    pub fn top_right(&self) -> Point2 {
        self.corners[1]
    }

    pub fn bottom_right(&self) -> Point2 {
        self.corners[2]
    }

    pub fn bottom_left(&self) -> Point2 {
        self.corners[3]
    }

    /// Arithmetic mean of the four corners.
    pub fn centroid(&self) -> Point2 {
        let sum_x: f32 = self.corners.iter().map(|p| p.x).sum();
        let sum_y: f32 = self.corners.iter().map(|p| p.y).sum();
        Point2::new(sum_x / 4.0, sum_y / 4.0)
    }

    /// Signed area via the shoelace formula.
    ///
    /// Positive for clockwise winding in image coordinates (y grows
    /// downward); near zero for collinear corners; sign flips for a
    /// self-intersecting ("bow-tie") ordering.
    pub fn signed_area(&self) -> f32 {
        let c = &self.corners;
        let mut area = 0.0f32;
        for i in 0..4 {
            let j = (i + 1) % 4;
            area += c[i].x * c[j].y;
            area -= c[j].x * c[i].y;
        }
        area / 2.0
    }

    /// Whether this quadrilateral is unsafe to warp: near-zero or inverted
    /// area relative to the `[TL, TR, BR, BL]` winding convention.
    pub fn is_degenerate(&self, min_area: f32) -> bool {
        self.signed_area() < min_area
    }

    /// Corners as `(x, y)` control points for homography estimation.
    pub fn control_points(&self) -> [(f32, f32); 4] {
        self.corners.map(|p| (p.x, p.y))
    }
}

/// Encoded output format for normalized and stitched images.
///
/// WebP encoding in the `image` crate is lossless; the quality knob applies
/// to JPEG only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutputFormat {
    Png,
    Jpeg { quality: u8 },
    WebP,
}

impl OutputFormat {
    /// File extension for this format (no leading dot).
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg { .. } => "jpg",
            Self::WebP => "webp",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Shoelace area of a unit-ordered rectangle is positive and exact.
    #[test]
    fn quadrilateral_signed_area_rectangle() {
        let quad = Quadrilateral::new([
            Point2::new(0.0, 0.0),
            Point2::new(10.0, 0.0),
            Point2::new(10.0, 5.0),
            Point2::new(0.0, 5.0),
        ]);
        assert!((quad.signed_area() - 50.0).abs() < 1e-3);
        assert!(!quad.is_degenerate(1.0));
    }

    /// A bow-tie (self-intersecting) ordering must register as degenerate.
    #[test]
    fn quadrilateral_bowtie_is_degenerate() {
        let quad = Quadrilateral::new([
            Point2::new(0.0, 0.0),
            Point2::new(10.0, 5.0),
            Point2::new(10.0, 0.0),
            Point2::new(0.0, 5.0),
        ]);
        assert!(quad.is_degenerate(1.0));
    }

    /// Collinear corners have near-zero area.
    #[test]
    fn quadrilateral_collinear_is_degenerate() {
        let quad = Quadrilateral::new([
            Point2::new(0.0, 0.0),
            Point2::new(5.0, 0.0),
            Point2::new(10.0, 0.0),
            Point2::new(15.0, 0.0),
        ]);
        assert!(quad.is_degenerate(1.0));
    }

    /// Cluster spread is the bounding-box extent regardless of point order.
    #[test]
    fn cluster_spread_and_centroid() {
        let mk = |x: f32, y: f32| MarkerPoint::new(Point2::new(x, y), 200.0);
        let cluster = MarkerCluster::new([mk(100.0, 500.0), mk(110.0, 100.0), mk(105.0, 300.0)]);
        assert!((cluster.spread.0 - 10.0).abs() < 1e-6);
        assert!((cluster.spread.1 - 400.0).abs() < 1e-6);
        let c = cluster.centroid();
        assert!((c.x - 105.0).abs() < 1e-4);
        assert!((c.y - 300.0).abs() < 1e-4);
    }
}
