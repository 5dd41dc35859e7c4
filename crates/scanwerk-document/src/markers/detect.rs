// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Fiducial marker detection.
//
// The sheet carries solid printed marks; on a binarized image each mark
// becomes one external contour whose polygon moments give its area and
// centroid. The area band rejects print dust below and stray dark regions
// (handwriting blocks, shadows) above. This is a pure filter: an ambiguous
// shape is never guessed into a marker, and "nothing found" is an empty
// result, not an error.

use image::DynamicImage;
use imageproc::contours::{BorderType, find_contours};
use imageproc::contrast::{ThresholdType, otsu_level, threshold};
use imageproc::filter::gaussian_blur_f32;
use imageproc::point::Point;
use scanwerk_core::config::{BinarizeMode, MarkerConfig};
use scanwerk_core::{MarkerPoint, Point2};
use tracing::{debug, instrument};

/// Detects candidate fiducial-marker centroids in a raster image.
pub struct MarkerDetector {
    config: MarkerConfig,
}

impl MarkerDetector {
    pub fn new(config: MarkerConfig) -> Self {
        Self { config }
    }

    /// Find all marker candidates in `image`.
    ///
    /// Pipeline: grayscale → Gaussian blur → inverse binarization →
    /// external contours → per-contour moments → area band filter
    /// (inclusive at both bounds).
    #[instrument(skip_all, fields(width = image.width(), height = image.height()))]
    pub fn detect(&self, image: &DynamicImage) -> Vec<MarkerPoint> {
        let gray = image.to_luma8();
        let blurred = gaussian_blur_f32(&gray, self.config.blur_sigma);

        let level = match self.config.binarize {
            BinarizeMode::FixedInverse(level) => level,
            BinarizeMode::Otsu => otsu_level(&blurred),
        };
        let binary = threshold(&blurred, level, ThresholdType::BinaryInverted);

        let contours = find_contours::<i32>(&binary);
        let mut markers = Vec::new();

        for contour in &contours {
            // Outermost borders only — holes and nested borders belong to
            // the same physical mark.
            if contour.border_type != BorderType::Outer || contour.parent.is_some() {
                continue;
            }

            let Some((area, centroid)) = polygon_moments(&contour.points) else {
                continue; // degenerate contour, zero first-moment denominator
            };

            if area < self.config.min_area || area > self.config.max_area {
                continue;
            }

            markers.push(MarkerPoint::new(centroid, area));
        }

        debug!(
            contours = contours.len(),
            markers = markers.len(),
            level,
            "Marker detection complete"
        );
        markers
    }
}

/// Area and centroid of a closed contour via Green's-theorem polygon
/// moments, matching what image moments give for the filled region.
///
/// Returns `None` when the contour encloses no area (fewer than 3 points or
/// collinear points), which callers must skip rather than divide by zero.
pub(crate) fn polygon_moments(points: &[Point<i32>]) -> Option<(f32, Point2)> {
    if points.len() < 3 {
        return None;
    }

    let n = points.len();
    let mut twice_area = 0.0f64;
    let mut cx = 0.0f64;
    let mut cy = 0.0f64;

    for i in 0..n {
        let p = points[i];
        let q = points[(i + 1) % n];
        let cross = f64::from(p.x) * f64::from(q.y) - f64::from(q.x) * f64::from(p.y);
        twice_area += cross;
        cx += f64::from(p.x + q.x) * cross;
        cy += f64::from(p.y + q.y) * cross;
    }

    if twice_area.abs() < f64::EPSILON {
        return None;
    }

    let centroid = Point2::new(
        (cx / (3.0 * twice_area)) as f32,
        (cy / (3.0 * twice_area)) as f32,
    );
    Some(((twice_area / 2.0).abs() as f32, centroid))
}
