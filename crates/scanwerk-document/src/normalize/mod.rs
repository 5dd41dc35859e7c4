// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Single-image normalization: the `DocumentNormalizer` contract and the
// corner-marker strategy composing detection, orientation, warp, and
// enhancement.

pub mod enhance;
pub mod warp;

pub use enhance::ScanLookEnhancer;
pub use warp::{HomographyTransform, PerspectiveNormalizer};

use image::DynamicImage;
use scanwerk_core::config::{MarkerConfig, NormalizeConfig, NormalizeStrategy};
use scanwerk_core::error::Result;
use scanwerk_core::{ClusterAxis, MarkerPoint, Point2};
use tracing::{debug, info, instrument};

use crate::grid::GridMarkerNormalizer;
use crate::markers::cluster::{BruteForceClusterFinder, ClusterFinder};
use crate::markers::detect::MarkerDetector;
use crate::markers::orient::{orient_quadrilateral, resolve_corners};

/// One selectable strategy for turning a raw photograph into an OCR-ready
/// canonical raster. Implementations are stateless across calls and safe
/// to share between threads as long as each call owns its image.
pub trait DocumentNormalizer {
    fn normalize(&self, image: &DynamicImage, config: &NormalizeConfig) -> Result<DynamicImage>;
}

/// Normalize `image` with the strategy selected in `config`.
pub fn normalize_document(image: &DynamicImage, config: &NormalizeConfig) -> Result<DynamicImage> {
    match config.strategy {
        NormalizeStrategy::CornerMarkers => {
            CornerMarkerNormalizer::default().normalize(image, config)
        }
        NormalizeStrategy::MarkerGrid => GridMarkerNormalizer.normalize(image, config),
    }
}

/// The 4-corner-plus-cluster strategy.
///
/// Marker search runs on a downscaled working copy (the expensive part of
/// the pipeline), and the found geometry is mapped back to full resolution
/// before the corner fit and warp.
pub struct CornerMarkerNormalizer {
    cluster_finder: Box<dyn ClusterFinder>,
}

impl CornerMarkerNormalizer {
    pub fn new() -> Self {
        Self {
            cluster_finder: Box::new(BruteForceClusterFinder),
        }
    }

    /// Use a specific cluster-search implementation.
    pub fn with_cluster_finder(cluster_finder: Box<dyn ClusterFinder>) -> Self {
        Self { cluster_finder }
    }

    /// Detect markers on a working copy scaled by `config.detect_scale`,
    /// returning full-resolution marker points.
    fn detect_markers(&self, image: &DynamicImage, config: &NormalizeConfig) -> Vec<MarkerPoint> {
        let scale = config.detect_scale.clamp(0.05, 1.0);

        if scale >= 1.0 {
            return MarkerDetector::new(config.marker).detect(image);
        }

        let working = image.resize_exact(
            ((image.width() as f32 * scale).round() as u32).max(1),
            ((image.height() as f32 * scale).round() as u32).max(1),
            image::imageops::FilterType::Triangle,
        );

        // Areas shrink by scale² on the working copy; the configured band
        // is expressed in full-resolution px².
        let scaled = MarkerConfig {
            min_area: config.marker.min_area * scale * scale,
            max_area: config.marker.max_area * scale * scale,
            ..config.marker
        };

        let inverse = 1.0 / scale;
        MarkerDetector::new(scaled)
            .detect(&working)
            .into_iter()
            .map(|m| MarkerPoint {
                center: Point2::new(m.center.x * inverse, m.center.y * inverse),
                area: m.area * inverse * inverse,
            })
            .collect()
    }
}

impl Default for CornerMarkerNormalizer {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentNormalizer for CornerMarkerNormalizer {
    #[instrument(skip_all, fields(width = image.width(), height = image.height()))]
    fn normalize(&self, image: &DynamicImage, config: &NormalizeConfig) -> Result<DynamicImage> {
        let markers = self.detect_markers(image, config);
        debug!(markers = markers.len(), "Markers mapped to full resolution");

        let raw = resolve_corners(&markers)?;

        // The cluster runs along the sheet's short axis, so a tall capture
        // searches for a horizontal stack and a wide one for a vertical
        // stack.
        let axis = if image.height() > image.width() {
            ClusterAxis::Horizontal
        } else {
            ClusterAxis::Vertical
        };
        let cluster = self.cluster_finder.find(&markers, axis, &config.cluster);
        let ordered = orient_quadrilateral(&raw, cluster.as_ref());

        let warped = PerspectiveNormalizer::new(config.page).normalize(image, &ordered)?;
        let enhanced = ScanLookEnhancer::new(config.enhance).enhance(&warped);

        info!(
            out_w = enhanced.width(),
            out_h = enhanced.height(),
            oriented_by_cluster = cluster.is_some(),
            "Normalization complete"
        );
        Ok(enhanced)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma};
    use scanwerk_core::config::PageConfig;
    use scanwerk_core::error::ScanwerkError;

    /// Wide synthetic sheet: 4 corner marks plus a 3-point cluster by the
    /// right edge.
    fn synthetic_sheet(w: u32, h: u32) -> DynamicImage {
        let mut img = GrayImage::from_pixel(w, h, Luma([255u8]));
        let mut square = |cx: u32, cy: u32, side: u32| {
            for y in cy..(cy + side).min(h) {
                for x in cx..(cx + side).min(w) {
                    img.put_pixel(x, y, Luma([0u8]));
                }
            }
        };
        // corner markers
        square(50, 50, 20);
        square(930, 50, 20);
        square(930, 630, 20);
        square(50, 630, 20);
        // orientation cluster, stacked vertically near the right edge
        square(880, 200, 14);
        square(883, 300, 14);
        square(886, 400, 14);
        DynamicImage::ImageLuma8(img)
    }

    fn test_config() -> NormalizeConfig {
        NormalizeConfig {
            detect_scale: 1.0,
            page: PageConfig {
                long_side: 350,
                short_side: 248,
            },
            ..NormalizeConfig::default()
        }
    }

    /// End-to-end: a clean synthetic sheet normalizes to the canonical
    /// frame with binary output.
    #[test]
    fn corner_strategy_end_to_end() {
        let image = synthetic_sheet(1000, 700);
        let out = CornerMarkerNormalizer::new()
            .normalize(&image, &test_config())
            .expect("pipeline succeeds");
        assert_eq!((out.width(), out.height()), (350, 248));
        let gray = out.to_luma8();
        assert!(gray.pixels().all(|p| p.0[0] == 0 || p.0[0] == 255));
    }

    /// Downscaled detection still finds the sheet and produces the same
    /// canonical frame.
    #[test]
    fn corner_strategy_with_downscaled_detection() {
        let image = synthetic_sheet(1000, 700);
        let config = NormalizeConfig {
            detect_scale: 0.5,
            ..test_config()
        };
        let out = CornerMarkerNormalizer::new()
            .normalize(&image, &config)
            .expect("pipeline succeeds at 50% detection scale");
        assert_eq!((out.width(), out.height()), (350, 248));
    }

    /// A blank page fails fast with the marker-count precondition.
    #[test]
    fn blank_page_reports_insufficient_markers() {
        let image = DynamicImage::ImageLuma8(GrayImage::from_pixel(600, 400, Luma([255u8])));
        let err = CornerMarkerNormalizer::new()
            .normalize(&image, &test_config())
            .unwrap_err();
        assert!(matches!(err, ScanwerkError::InsufficientMarkers { .. }));
    }

    /// Without a qualifying cluster the pipeline degrades to the default
    /// ordering instead of failing.
    #[test]
    fn missing_cluster_still_normalizes() {
        let mut img = GrayImage::from_pixel(1000, 700, Luma([255u8]));
        let mut square = |cx: u32, cy: u32| {
            for y in cy..cy + 20 {
                for x in cx..cx + 20 {
                    img.put_pixel(x, y, Luma([0u8]));
                }
            }
        };
        square(50, 50);
        square(930, 50);
        square(930, 630);
        square(50, 630);
        let image = DynamicImage::ImageLuma8(img);

        let out = CornerMarkerNormalizer::new()
            .normalize(&image, &test_config())
            .expect("fallback ordering must not fail");
        assert_eq!((out.width(), out.height()), (350, 248));
    }

    /// The strategy dispatcher honours the configured strategy.
    #[test]
    fn dispatcher_uses_corner_strategy() {
        let image = synthetic_sheet(1000, 700);
        let out = normalize_document(&image, &test_config()).expect("corner strategy");
        assert_eq!((out.width(), out.height()), (350, 248));
    }
}
