// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Grid-marker strategy.
//
// An alternative physical layout: many small square "scan-area" markers on
// a regular grid frame the writing columns, and one smaller orientation
// marker breaks the 180° symmetry. Marker classes are told apart by area
// band (relative to image size) plus a 4-vertex polygon check — raw area
// alone cannot separate them from handwriting.

use image::DynamicImage;
use imageproc::contours::{BorderType, find_contours};
use imageproc::edges::canny;
use imageproc::geometry::{approximate_polygon_dp, arc_length};
use imageproc::point::Point;
use scanwerk_core::config::{GridConfig, NormalizeConfig};
use scanwerk_core::error::{Result, ScanwerkError};
use scanwerk_core::Point2;
use tracing::{debug, info, instrument};

use crate::markers::detect::polygon_moments;
use crate::normalize::{DocumentNormalizer, ScanLookEnhancer};

/// Markers required to anchor at least one grid column.
const REQUIRED_SCAN_AREAS: usize = 4;

/// A 4-vertex marker polygon with its precomputed index point (the vertex
/// nearest the origin, used for grid addressing).
struct GridMarker {
    vertices: [Point<i32>; 4],
    index_point: Point2,
}

impl GridMarker {
    fn new(vertices: [Point<i32>; 4]) -> Self {
        let index = vertices
            .iter()
            .copied()
            .min_by_key(|p| p.x + p.y)
            .unwrap_or(vertices[0]);
        Self {
            vertices,
            index_point: Point2::new(index.x as f32, index.y as f32),
        }
    }

    fn vertex_min_sum(&self) -> Point<i32> {
        *self.vertices.iter().min_by_key(|p| p.x + p.y).unwrap_or(&self.vertices[0])
    }

    fn vertex_min_diff(&self) -> Point<i32> {
        *self.vertices.iter().min_by_key(|p| p.x - p.y).unwrap_or(&self.vertices[0])
    }

    fn vertex_max_sum(&self) -> Point<i32> {
        *self.vertices.iter().max_by_key(|p| p.x + p.y).unwrap_or(&self.vertices[0])
    }

    fn vertex_max_diff(&self) -> Point<i32> {
        *self.vertices.iter().max_by_key(|p| p.x - p.y).unwrap_or(&self.vertices[0])
    }
}

/// The grid-of-scan-areas strategy, selectable wherever the corner-marker
/// strategy is.
#[derive(Debug, Default, Clone, Copy)]
pub struct GridMarkerNormalizer;

impl DocumentNormalizer for GridMarkerNormalizer {
    #[instrument(skip_all, fields(width = image.width(), height = image.height()))]
    fn normalize(&self, image: &DynamicImage, config: &NormalizeConfig) -> Result<DynamicImage> {
        let grid = &config.grid;

        let (scan_areas, orientation) = detect_grid_markers(image, grid);
        if scan_areas.len() < REQUIRED_SCAN_AREAS {
            return Err(ScanwerkError::InsufficientMarkers {
                found: scan_areas.len(),
                required: REQUIRED_SCAN_AREAS,
            });
        }
        debug!(
            scan_areas = scan_areas.len(),
            has_orientation = orientation.is_some(),
            "Grid markers classified"
        );

        // Average spacing per axis from sorted index-point gaps above the
        // noise floor — robust to missed and duplicated detections.
        let avg_width = average_gap(
            scan_areas.iter().map(|m| m.index_point.x).collect(),
            grid.min_gap,
        );
        let avg_height = average_gap(
            scan_areas.iter().map(|m| m.index_point.y).collect(),
            grid.min_gap,
        );
        if avg_width <= 0.0 || avg_height <= 0.0 {
            return Err(ScanwerkError::GeometryDegenerate(
                "grid spacing could not be estimated from the detected markers".into(),
            ));
        }

        let composite = extract_and_stack_columns(image, &scan_areas, avg_width, avg_height)?;

        // An orientation marker in the lower half of the grid means the
        // sheet was photographed upside-down. The single-coordinate test is
        // deployment-calibrated, not geometrically validated.
        let upright = match &orientation {
            Some(marker) if marker.vertices[0].y as f32 > avg_height => {
                debug!("Orientation marker below first row; rotating 180°");
                composite.rotate180()
            }
            _ => composite,
        };

        let enhanced = ScanLookEnhancer::new(config.enhance).enhance(&upright);
        info!(
            out_w = enhanced.width(),
            out_h = enhanced.height(),
            "Grid normalization complete"
        );
        Ok(enhanced)
    }
}

/// Find 4-vertex marker polygons and classify them by area band.
fn detect_grid_markers(
    image: &DynamicImage,
    grid: &GridConfig,
) -> (Vec<GridMarker>, Option<GridMarker>) {
    let gray = image.to_luma8();
    let edges = canny(&gray, grid.canny_low, grid.canny_high);
    let contours = find_contours::<i32>(&edges);

    let total_area = f64::from(image.width()) * f64::from(image.height());
    let scan_band = (
        total_area * grid.scan_area_min_ratio,
        total_area * grid.scan_area_max_ratio,
    );
    let orient_band = (
        total_area * grid.orient_min_ratio,
        total_area * grid.orient_max_ratio,
    );

    let mut scan_areas = Vec::new();
    let mut orientation = None;

    for contour in &contours {
        if contour.border_type != BorderType::Outer {
            continue;
        }
        let epsilon = grid.approx_epsilon_ratio * arc_length(&contour.points, true);
        let approx = approximate_polygon_dp(&contour.points, epsilon, true);
        if approx.len() != 4 {
            continue;
        }

        let Some((area, _)) = polygon_moments(&approx) else {
            continue;
        };
        let area = f64::from(area);
        let vertices = [approx[0], approx[1], approx[2], approx[3]];

        if area > orient_band.0 && area < orient_band.1 {
            orientation = Some(GridMarker::new(vertices));
        }
        if area > scan_band.0 && area < scan_band.1 {
            scan_areas.push(GridMarker::new(vertices));
        }
    }

    (scan_areas, orientation)
}

/// Mean of consecutive sorted-coordinate gaps above the noise floor.
fn average_gap(mut coords: Vec<f32>, min_gap: f32) -> f32 {
    coords.sort_by(f32::total_cmp);
    let mut total = 0.0f32;
    let mut count = 0u32;
    for pair in coords.windows(2) {
        let gap = pair[1] - pair[0];
        if gap < min_gap {
            continue;
        }
        total += gap;
        count += 1;
    }
    if count > 0 { total / count as f32 } else { 0.0 }
}

/// Crop each expected grid column (framed by its four nearest markers),
/// resize all columns to the first column's size, and stack vertically.
fn extract_and_stack_columns(
    image: &DynamicImage,
    scan_areas: &[GridMarker],
    avg_width: f32,
    avg_height: f32,
) -> Result<DynamicImage> {
    let origin_anchor = closest_marker(scan_areas, Point2::new(0.0, 0.0)).index_point;

    let column_count = ((scan_areas.len() - 2) / 2).max(1);
    let mut columns = Vec::with_capacity(column_count);

    for i in 0..column_count {
        let anchor = Point2::new(origin_anchor.x + avg_width * i as f32, origin_anchor.y);

        let top_left = closest_marker(scan_areas, anchor).vertex_min_sum();
        let bottom_left =
            closest_marker(scan_areas, Point2::new(anchor.x, anchor.y + avg_height))
                .vertex_min_diff();
        let bottom_right = closest_marker(
            scan_areas,
            Point2::new(anchor.x + avg_width, anchor.y + avg_height),
        )
        .vertex_max_sum();
        let top_right =
            closest_marker(scan_areas, Point2::new(anchor.x + avg_width, anchor.y))
                .vertex_max_diff();

        let left = top_left.x.max(bottom_left.x);
        let right = top_right.x.max(bottom_right.x);
        let top = top_left.y.max(top_right.y);
        let bottom = bottom_left.y.max(bottom_right.y);

        if right <= left || bottom <= top || left < 0 || top < 0 {
            return Err(ScanwerkError::GeometryDegenerate(format!(
                "grid column {i} collapsed to an empty crop"
            )));
        }

        columns.push(image.crop_imm(
            left as u32,
            top as u32,
            (right - left) as u32,
            (bottom - top) as u32,
        ));
    }

    // All columns share the first column's dimensions.
    let (col_w, col_h) = (columns[0].width(), columns[0].height());
    let mut canvas = image::GrayImage::from_pixel(col_w, col_h * columns.len() as u32, image::Luma([255u8]));
    for (i, column) in columns.iter().enumerate() {
        let resized = if (column.width(), column.height()) == (col_w, col_h) {
            column.to_luma8()
        } else {
            column
                .resize_exact(col_w, col_h, image::imageops::FilterType::Lanczos3)
                .to_luma8()
        };
        image::imageops::replace(&mut canvas, &resized, 0, i64::from(col_h) * i as i64);
    }

    Ok(DynamicImage::ImageLuma8(canvas))
}

fn closest_marker(markers: &[GridMarker], target: Point2) -> &GridMarker {
    markers
        .iter()
        .min_by(|a, b| {
            a.index_point
                .distance_squared(target)
                .total_cmp(&b.index_point.distance_squared(target))
        })
        .expect("caller guarantees a non-empty marker set")
}
