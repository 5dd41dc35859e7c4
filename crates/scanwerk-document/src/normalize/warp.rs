// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Perspective normalization.
//
// Computes the homography mapping an ordered page quadrilateral onto an
// axis-aligned destination rectangle and resamples the image through it.
// A near-zero or inverted quadrilateral must never be warped: the result
// would be visually meaningless and poisons downstream recognition.

use image::{DynamicImage, Rgba, RgbaImage};
use imageproc::geometric_transformations::{Interpolation, Projection, warp_into};
use scanwerk_core::config::PageConfig;
use scanwerk_core::error::{Result, ScanwerkError};
use scanwerk_core::Quadrilateral;
use tracing::{debug, instrument};

/// Quadrilaterals with less signed area than this are rejected as
/// degenerate. Sub-pixel page areas only arise from collinear or
/// self-intersecting corner sets.
const MIN_QUAD_AREA: f32 = 1.0;

/// A 3×3 projective transform mapping a source quadrilateral onto a
/// destination rectangle. Derived, stateless, used once per image.
pub struct HomographyTransform {
    projection: Projection,
    out_width: u32,
    out_height: u32,
}

impl HomographyTransform {
    /// Build the transform taking `quad` (ordered `[TL, TR, BR, BL]`) onto
    /// the `width` × `height` rectangle.
    ///
    /// Fails with [`ScanwerkError::GeometryDegenerate`] when the
    /// quadrilateral has near-zero or inverted area, or when no projective
    /// solution exists for the control points.
    pub fn map_to_rect(quad: &Quadrilateral, width: u32, height: u32) -> Result<Self> {
        let area = quad.signed_area();
        if area < MIN_QUAD_AREA {
            return Err(ScanwerkError::GeometryDegenerate(format!(
                "quadrilateral area {area:.2} px² is near zero or inverted"
            )));
        }

        let dest = [
            (0.0, 0.0),
            (width as f32 - 1.0, 0.0),
            (width as f32 - 1.0, height as f32 - 1.0),
            (0.0, height as f32 - 1.0),
        ];

        let projection = Projection::from_control_points(quad.control_points(), dest)
            .ok_or_else(|| {
                ScanwerkError::GeometryDegenerate(
                    "no projective transform exists for the detected corners".into(),
                )
            })?;

        Ok(Self {
            projection,
            out_width: width,
            out_height: height,
        })
    }

    /// Resample `image` through the homography onto a white canvas.
    pub fn apply(&self, image: &DynamicImage) -> DynamicImage {
        let input = image.to_rgba8();
        let white = Rgba([255u8, 255, 255, 255]);
        let mut output = RgbaImage::from_pixel(self.out_width, self.out_height, white);
        warp_into(
            &input,
            &self.projection,
            Interpolation::Bilinear,
            white,
            &mut output,
        );
        DynamicImage::ImageRgba8(output)
    }
}

/// Warps detected page corners onto the canonical page rectangle.
pub struct PerspectiveNormalizer {
    page: PageConfig,
}

impl PerspectiveNormalizer {
    pub fn new(page: PageConfig) -> Self {
        Self { page }
    }

    /// Map `quad` onto the canonical page frame (long side horizontal) and
    /// return the warped image.
    #[instrument(skip(self, image, quad), fields(width = image.width(), height = image.height()))]
    pub fn normalize(&self, image: &DynamicImage, quad: &Quadrilateral) -> Result<DynamicImage> {
        let transform =
            HomographyTransform::map_to_rect(quad, self.page.long_side, self.page.short_side)?;
        debug!(
            out_w = self.page.long_side,
            out_h = self.page.short_side,
            "Applying perspective warp"
        );
        Ok(transform.apply(image))
    }
}
