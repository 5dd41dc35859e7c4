// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Image processor — decode, downscale, rotate, crop, grayscale, and encode.
// Operates on in-memory images using the `image` crate.

use image::{DynamicImage, ImageFormat};
use scanwerk_core::OutputFormat;
use scanwerk_core::error::ScanwerkError;
use tracing::{debug, info, instrument};

/// Thin processing wrapper over a single in-memory image.
///
/// All operations are non-destructive: each method consumes `self` and
/// returns a new `ImageProcessor` wrapping the transformed image, enabling
/// method chaining.
///
/// ```ignore
/// let bytes = ImageProcessor::open("capture.jpg")?
///     .downscale(0.25)
///     .grayscale()
///     .encode(OutputFormat::Png)?;
/// ```
pub struct ImageProcessor {
    /// The current working image.
    image: DynamicImage,
}

impl ImageProcessor {
    // -- Construction ---------------------------------------------------------

    /// Load an image from a file path.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<std::path::Path>) -> Result<Self, ScanwerkError> {
        let img = image::open(path.as_ref()).map_err(|err| {
            ScanwerkError::ImageError(format!(
                "failed to open {}: {}",
                path.as_ref().display(),
                err
            ))
        })?;
        info!(width = img.width(), height = img.height(), "Image loaded");
        Ok(Self { image: img })
    }

    /// Create a processor from raw encoded bytes (JPEG, PNG, etc.).
    #[instrument(skip(data), fields(data_len = data.len()))]
    pub fn from_bytes(data: &[u8]) -> Result<Self, ScanwerkError> {
        let img = image::load_from_memory(data)
            .map_err(|err| ScanwerkError::ImageError(format!("failed to decode image: {}", err)))?;
        debug!(
            width = img.width(),
            height = img.height(),
            "Image decoded from bytes"
        );
        Ok(Self { image: img })
    }

    /// Wrap an already-decoded `DynamicImage`.
    pub fn from_dynamic(image: DynamicImage) -> Self {
        Self { image }
    }

    // -- Accessors ------------------------------------------------------------

    /// Current image width in pixels.
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    /// Current image height in pixels.
    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Borrow the underlying `DynamicImage`.
    pub fn as_dynamic(&self) -> &DynamicImage {
        &self.image
    }

    /// Consume the processor and return the underlying `DynamicImage`.
    pub fn into_dynamic(self) -> DynamicImage {
        self.image
    }

    // -- Transformations (consume self, return new Self) ----------------------

    /// Downscale by a linear factor in (0, 1]. Uses triangle filtering —
    /// the result feeds detection, not human eyes, so cheap is fine.
    #[instrument(skip(self), fields(factor))]
    pub fn downscale(self, factor: f32) -> Self {
        if factor >= 1.0 {
            return self;
        }
        let w = ((self.image.width() as f32 * factor).round() as u32).max(1);
        let h = ((self.image.height() as f32 * factor).round() as u32).max(1);
        debug!(w, h, "Downscaling for detection");
        let resized = self
            .image
            .resize_exact(w, h, image::imageops::FilterType::Triangle);
        Self { image: resized }
    }

    /// Resize to exactly `width` × `height`, ignoring aspect ratio.
    pub fn resize_exact(self, width: u32, height: u32) -> Self {
        let resized =
            self.image
                .resize_exact(width, height, image::imageops::FilterType::Lanczos3);
        Self { image: resized }
    }

    /// Lossless 90° clockwise rotation.
    pub fn rotate90(self) -> Self {
        Self {
            image: self.image.rotate90(),
        }
    }

    /// Lossless 180° rotation.
    pub fn rotate180(self) -> Self {
        Self {
            image: self.image.rotate180(),
        }
    }

    /// Crop a rectangular region. `x`/`y` are the top-left corner; values
    /// are clamped to image bounds.
    #[instrument(skip(self), fields(x, y, width, height))]
    pub fn crop(self, x: u32, y: u32, width: u32, height: u32) -> Self {
        let img_w = self.image.width();
        let img_h = self.image.height();

        let safe_x = x.min(img_w.saturating_sub(1));
        let safe_y = y.min(img_h.saturating_sub(1));
        let safe_w = width.min(img_w - safe_x).max(1);
        let safe_h = height.min(img_h - safe_y).max(1);

        let cropped = self.image.crop_imm(safe_x, safe_y, safe_w, safe_h);
        Self { image: cropped }
    }

    /// Convert the image to grayscale (luma).
    pub fn grayscale(self) -> Self {
        Self {
            image: self.image.grayscale(),
        }
    }

    // -- Output ---------------------------------------------------------------

    /// Encode the current image in the requested output format.
    pub fn encode(&self, format: OutputFormat) -> Result<Vec<u8>, ScanwerkError> {
        encode_image(&self.image, format)
    }

    /// Write the image to a file. The format is inferred from the file
    /// extension.
    pub fn save(&self, path: impl AsRef<std::path::Path>) -> Result<(), ScanwerkError> {
        self.image.save(path.as_ref()).map_err(|err| {
            ScanwerkError::ImageError(format!(
                "failed to save image to {}: {}",
                path.as_ref().display(),
                err
            ))
        })
    }
}

/// Encode a `DynamicImage` into the requested output format.
///
/// JPEG honours the configured quality; PNG and WebP are lossless in the
/// `image` crate.
pub fn encode_image(image: &DynamicImage, format: OutputFormat) -> Result<Vec<u8>, ScanwerkError> {
    let mut buffer = Vec::new();
    let mut cursor = std::io::Cursor::new(&mut buffer);
    match format {
        OutputFormat::Png => image
            .write_to(&mut cursor, ImageFormat::Png)
            .map_err(|err| ScanwerkError::ImageError(format!("PNG encoding failed: {}", err)))?,
        OutputFormat::WebP => {
            // The WebP encoder is lossless and only accepts RGB8/RGBA8.
            let rgb = image.to_rgb8();
            let encoder = image::codecs::webp::WebPEncoder::new_lossless(&mut cursor);
            rgb.write_with_encoder(encoder).map_err(|err| {
                ScanwerkError::ImageError(format!("WebP encoding failed: {}", err))
            })?;
        }
        OutputFormat::Jpeg { quality } => {
            let rgb = image.to_rgb8();
            let encoder =
                image::codecs::jpeg::JpegEncoder::new_with_quality(&mut cursor, quality);
            rgb.write_with_encoder(encoder).map_err(|err| {
                ScanwerkError::ImageError(format!("JPEG encoding failed: {}", err))
            })?;
        }
    }
    Ok(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma};
    use scanwerk_core::OutputFormat;

    fn flat_gray(w: u32, h: u32) -> DynamicImage {
        DynamicImage::ImageLuma8(GrayImage::from_pixel(w, h, Luma([180u8])))
    }

    /// Downscaling by 0.25 quarters both dimensions.
    #[test]
    fn downscale_quarters_dimensions() {
        let proc = ImageProcessor::from_dynamic(flat_gray(400, 200)).downscale(0.25);
        assert_eq!(proc.width(), 100);
        assert_eq!(proc.height(), 50);
    }

    /// A factor of 1.0 (or more) must leave the image untouched.
    #[test]
    fn downscale_noop_at_unity() {
        let proc = ImageProcessor::from_dynamic(flat_gray(33, 47)).downscale(1.0);
        assert_eq!((proc.width(), proc.height()), (33, 47));
    }

    /// Crop clamps out-of-bounds requests instead of panicking.
    #[test]
    fn crop_clamps_to_bounds() {
        let proc = ImageProcessor::from_dynamic(flat_gray(100, 100)).crop(90, 90, 50, 50);
        assert_eq!((proc.width(), proc.height()), (10, 10));
    }

    /// Every configured output format produces a decodable buffer.
    #[test]
    fn encode_roundtrips_all_formats() {
        let img = flat_gray(16, 16);
        for format in [
            OutputFormat::Png,
            OutputFormat::WebP,
            OutputFormat::Jpeg { quality: 90 },
        ] {
            let bytes = encode_image(&img, format).expect("encode");
            let back = image::load_from_memory(&bytes).expect("decode");
            assert_eq!((back.width(), back.height()), (16, 16), "{format:?}");
        }
    }
}
