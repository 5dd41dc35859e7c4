// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Pipeline configuration.
//
// Every numeric threshold of the pipeline lives here so deployments can
// calibrate to different printed marker sizes. The caller owns the config
// and passes it into every stage; there is no global state.

use serde::{Deserialize, Serialize};

use crate::types::OutputFormat;

/// Which physical marker layout the sheet carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NormalizeStrategy {
    /// Four corner markers plus a 3-point orientation cluster near one edge.
    CornerMarkers,
    /// A regular grid of small scan-area markers plus one orientation marker.
    MarkerGrid,
}

/// How the marker detector binarizes the blurred grayscale image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinarizeMode {
    /// Inverse threshold at a fixed level: darker-than-level becomes
    /// foreground. Suits dark markers printed on white stock.
    FixedInverse(u8),
    /// Automatic level via Otsu's method, then inverse threshold.
    Otsu,
}

/// Marker detection tunables.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MarkerConfig {
    /// Minimum accepted contour area in px² (inclusive). Rejects print dust.
    pub min_area: f32,
    /// Maximum accepted contour area in px² (inclusive). Rejects stray
    /// regions such as handwriting blocks.
    pub max_area: f32,
    /// Gaussian blur sigma applied before binarization.
    pub blur_sigma: f32,
    /// Binarization mode.
    pub binarize: BinarizeMode,
}

impl Default for MarkerConfig {
    fn default() -> Self {
        Self {
            min_area: 100.0,
            max_area: 5000.0,
            blur_sigma: 1.1,
            binarize: BinarizeMode::FixedInverse(127),
        }
    }
}

/// Orientation-cluster search tunables.
///
/// When several 3-point subsets qualify, the cluster with the smallest
/// leading coordinate wins. That tie-break assumes real sheets carry a
/// single legitimate cluster; it is a calibrated assumption, not a
/// geometric guarantee.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClusterConfig {
    /// Maximum spread across the cluster's narrow direction, px.
    pub max_lateral_spread: f32,
    /// Maximum spread along the cluster's stacking direction, px.
    pub max_axial_spread: f32,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            max_lateral_spread: 150.0,
            max_axial_spread: 600.0,
        }
    }
}

/// Canonical output frame, derived from the reference physical page.
///
/// Defaults to A3 at 300 DPI, long side first — the sheet is printed
/// landscape, so the warp target is wider than tall.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageConfig {
    pub long_side: u32,
    pub short_side: u32,
}

impl Default for PageConfig {
    fn default() -> Self {
        Self {
            long_side: 3508,
            short_side: 2480,
        }
    }
}

/// Scan-look enhancement tunables.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EnhanceConfig {
    /// Contrast-limited histogram equalization clip limit.
    pub clahe_clip_limit: f32,
    /// Tile grid dimension for local equalization (`n` × `n` tiles).
    pub clahe_tiles: u32,
    /// Gaussian sigma of the unsharp-mask blur.
    pub sharpen_sigma: f32,
    /// Unsharp-mask strength: `out = gray + amount · (gray − blurred)`.
    pub sharpen_amount: f32,
    /// Adaptive threshold block radius (block size = 2·radius + 1).
    pub threshold_block_radius: u32,
    /// Constant subtracted from each local mean threshold.
    pub threshold_c: i32,
}

impl Default for EnhanceConfig {
    fn default() -> Self {
        Self {
            clahe_clip_limit: 2.0,
            clahe_tiles: 8,
            sharpen_sigma: 3.0,
            sharpen_amount: 0.5,
            threshold_block_radius: 12,
            threshold_c: 10,
        }
    }
}

/// Grid-strategy tunables. Marker classes are distinguished by area bands
/// expressed as ratios of the full image area, so they hold across capture
/// resolutions.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridConfig {
    /// Scan-area marker band, ratio of image area (exclusive bounds).
    pub scan_area_min_ratio: f64,
    pub scan_area_max_ratio: f64,
    /// Orientation marker band, ratio of image area (exclusive bounds).
    pub orient_min_ratio: f64,
    pub orient_max_ratio: f64,
    /// Canny thresholds for edge extraction.
    pub canny_low: f32,
    pub canny_high: f32,
    /// Polygon approximation epsilon as a fraction of the contour perimeter.
    pub approx_epsilon_ratio: f64,
    /// Gaps below this floor (px) are treated as duplicate detections and
    /// excluded from the average grid spacing.
    pub min_gap: f32,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            scan_area_min_ratio: 0.00014,
            scan_area_max_ratio: 0.00025,
            orient_min_ratio: 0.00005,
            orient_max_ratio: 0.0001,
            canny_low: 50.0,
            canny_high: 150.0,
            approx_epsilon_ratio: 0.05,
            min_gap: 50.0,
        }
    }
}

/// Top-level configuration for single-image normalization.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NormalizeConfig {
    pub strategy: NormalizeStrategy,
    /// Linear scale applied to the working copy used for marker search.
    /// Detected geometry is mapped back to full resolution before the warp.
    pub detect_scale: f32,
    pub marker: MarkerConfig,
    pub cluster: ClusterConfig,
    pub page: PageConfig,
    pub enhance: EnhanceConfig,
    pub grid: GridConfig,
    pub output: OutputFormat,
}

impl Default for NormalizeConfig {
    fn default() -> Self {
        Self {
            strategy: NormalizeStrategy::CornerMarkers,
            detect_scale: 0.25,
            marker: MarkerConfig::default(),
            cluster: ClusterConfig::default(),
            page: PageConfig::default(),
            enhance: EnhanceConfig::default(),
            grid: GridConfig::default(),
            output: OutputFormat::WebP,
        }
    }
}

/// OCR-oriented contrast cleanup applied to each stitch segment.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OcrEnhanceConfig {
    /// Pre-threshold blur sigma.
    pub blur_sigma: f32,
    /// Adaptive threshold block radius (block size = 2·radius + 1).
    pub threshold_block_radius: u32,
    /// Constant subtracted from each local mean threshold.
    pub threshold_c: i32,
}

impl Default for OcrEnhanceConfig {
    fn default() -> Self {
        Self {
            blur_sigma: 0.8,
            threshold_block_radius: 10,
            threshold_c: 8,
        }
    }
}

/// Multi-segment stitching configuration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StitchConfig {
    /// White gap inserted between adjacent segments, px.
    pub gutter: u32,
    /// Working copies for boundary detection are capped at this dimension.
    pub max_detect_dim: u32,
    /// Canny thresholds for the first boundary-detection attempt.
    pub canny_low: f32,
    pub canny_high: f32,
    /// Canny thresholds for the morphological-gradient retry.
    pub retry_canny_low: f32,
    pub retry_canny_high: f32,
    /// A paper contour must cover at least this ratio of the image…
    pub min_page_area_ratio: f32,
    /// …and at most this ratio (a full-frame contour is the photo border).
    pub max_page_area_ratio: f32,
    /// Accepted bounding-box aspect ratio band for a paper contour.
    pub min_aspect: f32,
    pub max_aspect: f32,
    /// Polygon approximation epsilon as a fraction of the contour perimeter.
    pub approx_epsilon_ratio: f64,
    /// Corrected segments smaller than this on either side are rejected.
    pub min_output_side: u32,
    /// Fallback path rotates a segment to portrait when its aspect ratio
    /// exceeds this value.
    pub rotate_aspect_threshold: f32,
    pub enhance: OcrEnhanceConfig,
    pub output: OutputFormat,
}

impl Default for StitchConfig {
    fn default() -> Self {
        Self {
            gutter: 20,
            max_detect_dim: 1500,
            canny_low: 30.0,
            canny_high: 80.0,
            retry_canny_low: 50.0,
            retry_canny_high: 150.0,
            min_page_area_ratio: 0.1,
            max_page_area_ratio: 0.95,
            min_aspect: 0.3,
            max_aspect: 3.0,
            approx_epsilon_ratio: 0.015,
            min_output_side: 100,
            rotate_aspect_threshold: 1.3,
            enhance: OcrEnhanceConfig::default(),
            output: OutputFormat::WebP,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Configs round-trip through JSON so deployments can ship calibration
    /// files.
    #[test]
    fn normalize_config_json_roundtrip() {
        let config = NormalizeConfig::default();
        let json = serde_json::to_string(&config).expect("serialize");
        let back: NormalizeConfig = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, config);
    }

    #[test]
    fn stitch_config_json_roundtrip() {
        let config = StitchConfig {
            gutter: 32,
            ..StitchConfig::default()
        };
        let json = serde_json::to_string(&config).expect("serialize");
        let back: StitchConfig = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, config);
    }
}
