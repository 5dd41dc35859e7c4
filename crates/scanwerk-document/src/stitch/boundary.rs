// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Physical page-boundary detection for stitch segments.
//
// A segment photo has no fiducial markers; the paper edge itself is the
// only geometry available. Edges come from Canny, the paper contour from
// an area-ratio and aspect filter, and the corner quad from polygon
// approximation — with a convex-hull extreme-point fallback for
// over-segmented, non-convex raw contours.

use image::{DynamicImage, GrayImage, Luma};
use imageproc::contours::{BorderType, find_contours};
use imageproc::edges::canny;
use imageproc::filter::gaussian_blur_f32;
use imageproc::geometry::{approximate_polygon_dp, arc_length, convex_hull};
use imageproc::point::Point;
use scanwerk_core::config::StitchConfig;
use scanwerk_core::{Point2, Quadrilateral};
use tracing::debug;

use crate::markers::detect::polygon_moments;

/// A detected paper quadrilateral with the rectangle it should map onto.
pub(crate) struct PageBoundary {
    pub quad: Quadrilateral,
    pub out_width: u32,
    pub out_height: u32,
}

/// Locate the paper boundary in a segment photo.
///
/// Returns `None` whenever no convincing paper quadrilateral exists — the
/// caller degrades to cheaper fallback processing rather than discarding
/// the segment.
pub(crate) fn detect_page_boundary(
    image: &DynamicImage,
    config: &StitchConfig,
) -> Option<PageBoundary> {
    // Work at a bounded resolution; the quad is mapped back afterwards.
    let longest = image.width().max(image.height());
    let scale = if longest > config.max_detect_dim {
        config.max_detect_dim as f32 / longest as f32
    } else {
        1.0
    };
    let working = if scale < 1.0 {
        image.resize_exact(
            ((image.width() as f32 * scale).round() as u32).max(1),
            ((image.height() as f32 * scale).round() as u32).max(1),
            image::imageops::FilterType::Triangle,
        )
    } else {
        image.clone()
    };

    let gray = working.to_luma8();
    let blurred = gaussian_blur_f32(&gray, 1.1);
    let image_area = (gray.width() * gray.height()) as f32;
    let min_area = image_area * config.min_page_area_ratio;

    let edges = canny(&blurred, config.canny_low, config.canny_high);
    let mut contours = find_contours::<i32>(&edges);

    // If nothing page-sized shows up, strengthen the edges with a
    // morphological gradient and retry at higher thresholds.
    let has_candidate = contours.iter().any(|c| {
        c.border_type == BorderType::Outer
            && polygon_moments(&c.points).is_some_and(|(area, _)| area > min_area)
    });
    if !has_candidate {
        debug!("no page-sized contour on first pass; retrying with gradient edges");
        let gradient = morphological_gradient_3x3(&blurred);
        let edges = canny(&gradient, config.retry_canny_low, config.retry_canny_high);
        contours = find_contours::<i32>(&edges);
    }

    // The most paper-like contour: big enough to be the page, small enough
    // not to be the photo border, with a sane aspect ratio.
    let best = contours
        .iter()
        .filter(|c| c.border_type == BorderType::Outer)
        .filter_map(|c| {
            let (area, _) = polygon_moments(&c.points)?;
            if area <= min_area || area >= image_area * config.max_page_area_ratio {
                return None;
            }
            let (bbox_w, bbox_h) = bounding_extent(&c.points)?;
            let aspect = bbox_w as f32 / bbox_h as f32;
            if aspect <= config.min_aspect || aspect >= config.max_aspect {
                return None;
            }
            Some((area, &c.points))
        })
        .max_by(|(a, _), (b, _)| a.total_cmp(b))
        .map(|(_, points)| points)?;

    let epsilon = config.approx_epsilon_ratio * arc_length(best, true);
    let approx = approximate_polygon_dp(best, epsilon, true);

    let quad_points: [Point<i32>; 4] = match approx.len() {
        4 => [approx[0], approx[1], approx[2], approx[3]],
        n if n > 4 => extreme_corner_quad(&approx)?,
        _ => return None,
    };

    // Back to full resolution, then into canonical corner order.
    let inverse = 1.0 / scale;
    let corners = quad_points.map(|p| Point2::new(p.x as f32 * inverse, p.y as f32 * inverse));
    let ordered = order_by_sum_diff(corners);

    let (out_width, out_height) = output_extent(&ordered, config)?;
    debug!(out_width, out_height, "Page boundary detected");
    Some(PageBoundary {
        quad: ordered,
        out_width,
        out_height,
    })
}

/// 3×3 morphological gradient: local max minus local min, the classic
/// edge-thickening preprocessing for weakly-lit paper borders.
fn morphological_gradient_3x3(gray: &GrayImage) -> GrayImage {
    let (w, h) = gray.dimensions();
    GrayImage::from_fn(w, h, |x, y| {
        let mut lo = u8::MAX;
        let mut hi = u8::MIN;
        for dy in -1i64..=1 {
            for dx in -1i64..=1 {
                let nx = (i64::from(x) + dx).clamp(0, i64::from(w) - 1) as u32;
                let ny = (i64::from(y) + dy).clamp(0, i64::from(h) - 1) as u32;
                let v = gray.get_pixel(nx, ny).0[0];
                lo = lo.min(v);
                hi = hi.max(v);
            }
        }
        Luma([hi - lo])
    })
}

/// Width and height of the axis-aligned bounding box of a contour.
fn bounding_extent(points: &[Point<i32>]) -> Option<(i32, i32)> {
    let min_x = points.iter().map(|p| p.x).min()?;
    let max_x = points.iter().map(|p| p.x).max()?;
    let min_y = points.iter().map(|p| p.y).min()?;
    let max_y = points.iter().map(|p| p.y).max()?;
    let w = max_x - min_x;
    let h = max_y - min_y;
    (w > 0 && h > 0).then_some((w, h))
}

/// Reduce an over-approximated polygon to four corners: convex hull, then
/// the extreme points under the sum/difference metrics.
fn extreme_corner_quad(points: &[Point<i32>]) -> Option<[Point<i32>; 4]> {
    let hull = convex_hull(points.to_vec());
    if hull.len() < 4 {
        return None;
    }

    let top_left = *hull.iter().min_by_key(|p| p.x + p.y)?;
    let top_right = *hull.iter().min_by_key(|p| p.y - p.x)?;
    let bottom_right = *hull.iter().max_by_key(|p| p.x + p.y)?;
    let bottom_left = *hull.iter().max_by_key(|p| p.y - p.x)?;

    Some([top_left, top_right, bottom_right, bottom_left])
}

/// Order arbitrary corner points as `[TL, TR, BR, BL]`: the corner sum
/// `x + y` is extremal at TL/BR, the difference `y − x` at TR/BL.
fn order_by_sum_diff(corners: [Point2; 4]) -> Quadrilateral {
    let sum = |p: &Point2| p.x + p.y;
    let diff = |p: &Point2| p.y - p.x;

    let top_left = corners.iter().copied().min_by(|a, b| sum(a).total_cmp(&sum(b)));
    let bottom_right = corners.iter().copied().max_by(|a, b| sum(a).total_cmp(&sum(b)));
    let top_right = corners.iter().copied().min_by(|a, b| diff(a).total_cmp(&diff(b)));
    let bottom_left = corners.iter().copied().max_by(|a, b| diff(a).total_cmp(&diff(b)));

    // The iterator is non-empty by construction.
    Quadrilateral::new([
        top_left.unwrap_or(corners[0]),
        top_right.unwrap_or(corners[1]),
        bottom_right.unwrap_or(corners[2]),
        bottom_left.unwrap_or(corners[3]),
    ])
}

/// Output rectangle for a corrected segment: the longest opposing edge in
/// each direction, preferring portrait, rejecting implausibly small pages.
fn output_extent(quad: &Quadrilateral, config: &StitchConfig) -> Option<(u32, u32)> {
    let width_bottom = quad.bottom_right().distance(quad.bottom_left());
    let width_top = quad.top_right().distance(quad.top_left());
    let mut out_w = width_bottom.max(width_top).round() as u32;

    let height_right = quad.top_right().distance(quad.bottom_right());
    let height_left = quad.top_left().distance(quad.bottom_left());
    let mut out_h = height_right.max(height_left).round() as u32;

    if out_w < config.min_output_side || out_h < config.min_output_side {
        return None;
    }

    // Documents are taller than wide; a landscape result means the corner
    // labelling picked the rotated reading of the page.
    if out_w > out_h {
        std::mem::swap(&mut out_w, &mut out_h);
    }

    Some((out_w, out_h))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(x: i32, y: i32) -> Point<i32> {
        Point::new(x, y)
    }

    /// Extreme-point selection recovers the four corners from a noisy hull.
    #[test]
    fn extreme_corner_quad_recovers_rectangle() {
        // Rectangle corners plus mid-edge noise vertices.
        let points = vec![
            p(10, 10),
            p(150, 12),
            p(80, 8),
            p(152, 200),
            p(78, 204),
            p(12, 198),
        ];
        let quad = extreme_corner_quad(&points).expect("hull has 4+ points");
        assert_eq!(quad[0], p(10, 10));
        assert_eq!(quad[1], p(150, 12));
        assert_eq!(quad[2], p(152, 200));
        assert_eq!(quad[3], p(12, 198));
    }

    /// Sum/diff ordering is stable regardless of input order.
    #[test]
    fn order_by_sum_diff_orders_corners() {
        let corners = [
            Point2::new(152.0, 200.0),
            Point2::new(10.0, 10.0),
            Point2::new(12.0, 198.0),
            Point2::new(150.0, 12.0),
        ];
        let quad = order_by_sum_diff(corners);
        assert_eq!(quad.top_left(), Point2::new(10.0, 10.0));
        assert_eq!(quad.top_right(), Point2::new(150.0, 12.0));
        assert_eq!(quad.bottom_right(), Point2::new(152.0, 200.0));
        assert_eq!(quad.bottom_left(), Point2::new(12.0, 198.0));
    }

    /// A bright paper rectangle on a dark background is found with
    /// near-correct output dimensions.
    #[test]
    fn detects_bright_paper_on_dark_background() {
        let mut img = GrayImage::from_pixel(400, 500, Luma([30u8]));
        for y in 60..440 {
            for x in 50..350 {
                img.put_pixel(x, y, Luma([240u8]));
            }
        }
        let image = DynamicImage::ImageLuma8(img);

        let boundary = detect_page_boundary(&image, &StitchConfig::default())
            .expect("paper rectangle should be detected");
        assert!(boundary.out_width.abs_diff(300) <= 8, "width {}", boundary.out_width);
        assert!(boundary.out_height.abs_diff(380) <= 8, "height {}", boundary.out_height);
    }

    /// A uniform image has no boundary — the caller must fall back.
    #[test]
    fn uniform_image_has_no_boundary() {
        let image = DynamicImage::ImageLuma8(GrayImage::from_pixel(300, 400, Luma([128u8])));
        assert!(detect_page_boundary(&image, &StitchConfig::default()).is_none());
    }

    /// The gradient helper produces zero on flat fields and a response on
    /// edges.
    #[test]
    fn morphological_gradient_highlights_edges() {
        let mut gray = GrayImage::from_pixel(20, 20, Luma([50u8]));
        for y in 0..20 {
            for x in 10..20 {
                gray.put_pixel(x, y, Luma([200u8]));
            }
        }
        let gradient = morphological_gradient_3x3(&gray);
        assert_eq!(gradient.get_pixel(2, 10).0[0], 0, "flat field");
        assert!(gradient.get_pixel(10, 10).0[0] > 100, "edge response");
    }
}
