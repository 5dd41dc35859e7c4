// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Scan-look enhancement — turns an unevenly lit handheld photograph into
// the uniform high-contrast raster a flatbed scanner would produce.
//
// Pipeline: grayscale → tiled contrast-limited equalization → unsharp
// mask → adaptive local threshold. Deterministic and side-effect-free.

use image::{DynamicImage, GrayImage, Luma};
use imageproc::filter::sharpen_gaussian;
use scanwerk_core::config::EnhanceConfig;
use tracing::{debug, instrument};

/// Post-processing stage that normalizes lighting and contrast for
/// downstream text recognition.
pub struct ScanLookEnhancer {
    config: EnhanceConfig,
}

impl ScanLookEnhancer {
    pub fn new(config: EnhanceConfig) -> Self {
        Self { config }
    }

    /// Run the full enhancement pipeline and return the binarized result.
    #[instrument(skip_all, fields(width = image.width(), height = image.height()))]
    pub fn enhance(&self, image: &DynamicImage) -> DynamicImage {
        let gray = image.to_luma8();

        let equalized = clahe(
            &gray,
            self.config.clahe_clip_limit,
            self.config.clahe_tiles,
        );
        let sharpened = sharpen_gaussian(
            &equalized,
            self.config.sharpen_sigma,
            self.config.sharpen_amount,
        );
        let binary = adaptive_threshold_mean(
            &sharpened,
            self.config.threshold_block_radius,
            self.config.threshold_c,
        );

        debug!("Scan-look enhancement complete");
        DynamicImage::ImageLuma8(binary)
    }
}

/// Contrast-limited adaptive histogram equalization.
///
/// The image is split into a `grid` × `grid` tile mosaic; each tile gets a
/// clipped, renormalized histogram LUT, and every pixel blends the LUTs of
/// its four nearest tile centres bilinearly. Clipping bounds how much a
/// near-empty tile may amplify noise.
fn clahe(gray: &GrayImage, clip_limit: f32, grid: u32) -> GrayImage {
    let (w, h) = gray.dimensions();
    if w == 0 || h == 0 {
        return gray.clone();
    }
    let grid = grid.clamp(1, w.min(h).max(1));
    let tile_w = w.div_ceil(grid);
    let tile_h = h.div_ceil(grid);
    let tiles_x = w.div_ceil(tile_w);
    let tiles_y = h.div_ceil(tile_h);

    // One equalization LUT per tile.
    let mut luts = vec![[0u8; 256]; (tiles_x * tiles_y) as usize];
    for ty in 0..tiles_y {
        for tx in 0..tiles_x {
            let x0 = tx * tile_w;
            let y0 = ty * tile_h;
            let x1 = (x0 + tile_w).min(w);
            let y1 = (y0 + tile_h).min(h);

            let mut hist = [0u32; 256];
            for y in y0..y1 {
                for x in x0..x1 {
                    hist[gray.get_pixel(x, y).0[0] as usize] += 1;
                }
            }
            let count = (x1 - x0) * (y1 - y0);

            // Clip the histogram and spread the excess across all bins.
            let limit = ((clip_limit * count as f32 / 256.0).max(1.0)) as u32;
            let mut excess = 0u32;
            for bin in hist.iter_mut() {
                if *bin > limit {
                    excess += *bin - limit;
                    *bin = limit;
                }
            }
            let bonus = excess / 256;
            let remainder = excess % 256;
            for (i, bin) in hist.iter_mut().enumerate() {
                *bin += bonus + u32::from((i as u32) < remainder);
            }

            let lut = &mut luts[(ty * tiles_x + tx) as usize];
            let mut cdf = 0u64;
            for (i, &bin) in hist.iter().enumerate() {
                cdf += u64::from(bin);
                lut[i] = ((cdf * 255) / u64::from(count)) as u8;
            }
        }
    }

    // Bilinear blend between neighbouring tile LUTs.
    let lut_at = |tx: i64, ty: i64, value: u8| -> f32 {
        let tx = tx.clamp(0, i64::from(tiles_x) - 1) as u32;
        let ty = ty.clamp(0, i64::from(tiles_y) - 1) as u32;
        f32::from(luts[(ty * tiles_x + tx) as usize][value as usize])
    };

    GrayImage::from_fn(w, h, |x, y| {
        let fx = (x as f32 + 0.5) / tile_w as f32 - 0.5;
        let fy = (y as f32 + 0.5) / tile_h as f32 - 0.5;
        let tx0 = fx.floor() as i64;
        let ty0 = fy.floor() as i64;
        let wx = fx - fx.floor();
        let wy = fy - fy.floor();

        let value = gray.get_pixel(x, y).0[0];
        let top = lut_at(tx0, ty0, value) * (1.0 - wx) + lut_at(tx0 + 1, ty0, value) * wx;
        let bottom =
            lut_at(tx0, ty0 + 1, value) * (1.0 - wx) + lut_at(tx0 + 1, ty0 + 1, value) * wx;
        let blended = top * (1.0 - wy) + bottom * wy;
        Luma([blended.round().clamp(0.0, 255.0) as u8])
    })
}

/// Adaptive mean thresholding over an integral image.
///
/// For each pixel the threshold is the mean intensity of its
/// `(2·radius + 1)²` neighbourhood minus the constant `c`; darker pixels
/// become black, the rest white.
pub(crate) fn adaptive_threshold_mean(gray: &GrayImage, block_radius: u32, c: i32) -> GrayImage {
    let (width, height) = gray.dimensions();
    let integral = compute_integral_image(gray);

    GrayImage::from_fn(width, height, |x, y| {
        let local_mean = region_mean(&integral, width, height, x, y, block_radius);
        let threshold = (local_mean as i32 - c).clamp(0, 255) as u8;
        let value = gray.get_pixel(x, y).0[0];
        Luma([if value < threshold { 0u8 } else { 255u8 }])
    })
}

/// Compute the integral (summed-area table) of a grayscale image.
///
/// `integral[y * (width+1) + x]` contains the sum of all pixel values in
/// the rectangle [0, 0) to (x, y) (exclusive on both axes). The table has
/// dimensions `(width+1) x (height+1)` with a zero-padded border.
fn compute_integral_image(gray: &GrayImage) -> Vec<u64> {
    let (w, h) = gray.dimensions();
    let stride = (w + 1) as usize;
    let mut table = vec![0u64; stride * (h + 1) as usize];

    for y in 0..h {
        let mut row_sum: u64 = 0;
        for x in 0..w {
            row_sum += u64::from(gray.get_pixel(x, y).0[0]);
            let idx = (y + 1) as usize * stride + (x + 1) as usize;
            let above = y as usize * stride + (x + 1) as usize;
            table[idx] = row_sum + table[above];
        }
    }

    table
}

/// Mean pixel value within a square region centred on (cx, cy) with the
/// given radius, using the precomputed integral image.
fn region_mean(
    integral: &[u64],
    img_width: u32,
    img_height: u32,
    cx: u32,
    cy: u32,
    radius: u32,
) -> f64 {
    let stride = (img_width + 1) as usize;

    let x1 = cx.saturating_sub(radius) as usize;
    let y1 = cy.saturating_sub(radius) as usize;
    let x2 = ((cx + radius + 1) as usize).min(img_width as usize);
    let y2 = ((cy + radius + 1) as usize).min(img_height as usize);

    let area = ((x2 - x1) * (y2 - y1)) as f64;
    if area == 0.0 {
        return 128.0;
    }

    let sum = integral[y2 * stride + x2] as f64 - integral[y1 * stride + x2] as f64
        - integral[y2 * stride + x1] as f64
        + integral[y1 * stride + x1] as f64;

    sum / area
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A uniform image stays uniform under CLAHE: every pixel maps through
    /// the same LUT value.
    #[test]
    fn clahe_keeps_uniform_input_uniform() {
        let gray = GrayImage::from_pixel(128, 96, Luma([90u8]));
        let out = clahe(&gray, 2.0, 8);
        let first = out.get_pixel(0, 0).0[0];
        assert!(out.pixels().all(|p| p.0[0] == first));
    }

    /// CLAHE widens the dynamic range of a low-contrast gradient.
    #[test]
    fn clahe_expands_low_contrast_range() {
        let gray = GrayImage::from_fn(160, 160, |x, _| Luma([100 + (x / 8) as u8]));
        let out = clahe(&gray, 2.0, 8);

        let range = |img: &GrayImage| {
            let min = img.pixels().map(|p| p.0[0]).min().unwrap();
            let max = img.pixels().map(|p| p.0[0]).max().unwrap();
            max - min
        };
        assert!(range(&out) > range(&gray));
    }

    /// The full pipeline is deterministic: two runs on the same input
    /// produce byte-identical output.
    #[test]
    fn enhancement_is_deterministic() {
        let img = DynamicImage::ImageLuma8(GrayImage::from_fn(120, 90, |x, y| {
            Luma([((x * 7 + y * 13) % 256) as u8])
        }));
        let enhancer = ScanLookEnhancer::new(scanwerk_core::config::EnhanceConfig::default());
        let a = enhancer.enhance(&img).to_luma8();
        let b = enhancer.enhance(&img).to_luma8();
        assert_eq!(a.as_raw(), b.as_raw());
    }

    /// Enhancement output is strictly binary.
    #[test]
    fn enhancement_output_is_binary() {
        let img = DynamicImage::ImageLuma8(GrayImage::from_fn(100, 80, |x, y| {
            Luma([((x + 2 * y) % 200) as u8])
        }));
        let enhancer = ScanLookEnhancer::new(scanwerk_core::config::EnhanceConfig::default());
        let out = enhancer.enhance(&img).to_luma8();
        assert!(out.pixels().all(|p| p.0[0] == 0 || p.0[0] == 255));
    }

    /// Dark text on a bright field survives adaptive thresholding as black
    /// on white.
    #[test]
    fn adaptive_threshold_separates_ink_from_paper() {
        let mut gray = GrayImage::from_pixel(64, 64, Luma([200u8]));
        for x in 20..44 {
            gray.put_pixel(x, 32, Luma([40u8]));
        }
        let out = adaptive_threshold_mean(&gray, 12, 10);
        assert_eq!(out.get_pixel(32, 32).0[0], 0, "ink must go black");
        assert_eq!(out.get_pixel(5, 5).0[0], 255, "paper must go white");
    }

    /// Integral-image region means match a direct computation.
    #[test]
    fn region_mean_matches_direct_sum() {
        let gray = GrayImage::from_fn(16, 16, |x, y| Luma([(x * 3 + y * 5) as u8]));
        let integral = compute_integral_image(&gray);

        let (cx, cy, radius) = (7u32, 9u32, 3u32);
        let mut sum = 0.0f64;
        let mut n = 0.0f64;
        for y in cy - radius..=cy + radius {
            for x in cx - radius..=cx + radius {
                sum += f64::from(gray.get_pixel(x, y).0[0]);
                n += 1.0;
            }
        }
        let direct = sum / n;
        let fast = region_mean(&integral, 16, 16, cx, cy, radius);
        assert!((direct - fast).abs() < 1e-9);
    }
}
