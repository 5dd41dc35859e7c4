// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Multi-segment stitching.
//
// A long sheet photographed in several pieces becomes one composite page:
// each segment is independently boundary-corrected (or fallback-processed),
// contrast-normalized for OCR, height-padded to the tallest segment, and
// concatenated left-to-right with a white gutter. Per-segment failures are
// isolated; only a batch where *every* segment fails is an error.

mod boundary;

use image::{DynamicImage, GrayImage, Luma};
use imageproc::distance_transform::Norm;
use imageproc::filter::{gaussian_blur_f32, sharpen3x3};
use imageproc::morphology::close;
use scanwerk_core::config::StitchConfig;
use scanwerk_core::error::{Result, ScanwerkError};
use scanwerk_core::OutputFormat;
use tracing::{debug, info, instrument, warn};

use crate::image::processor::encode_image;
use crate::normalize::enhance::adaptive_threshold_mean;
use crate::normalize::warp::HomographyTransform;

use self::boundary::detect_page_boundary;

/// One processed piece of a multi-part capture.
pub struct Segment {
    /// Position in the submitted batch (decode-skipped segments keep their
    /// original indices).
    pub index: usize,
    /// The boundary-corrected (or fallback-processed), OCR-enhanced raster.
    pub image: GrayImage,
}

/// The horizontal composite of all usable segments.
#[derive(Debug)]
pub struct StitchedImage {
    pub image: DynamicImage,
    /// How many submitted segments made it into the composite.
    pub segments_used: usize,
}

impl StitchedImage {
    /// Encode the composite in the requested output format.
    pub fn encode(&self, format: OutputFormat) -> Result<Vec<u8>> {
        encode_image(&self.image, format)
    }
}

/// Stitches independently normalized page segments into one image.
pub struct MultiSegmentStitcher {
    config: StitchConfig,
}

impl MultiSegmentStitcher {
    pub fn new(config: StitchConfig) -> Self {
        Self { config }
    }

    /// Stitch a batch of still-encoded segment buffers.
    ///
    /// A segment that fails to decode is logged and skipped; the batch
    /// only fails when nothing remains.
    #[instrument(skip_all, fields(segments = raw_segments.len()))]
    pub fn stitch_encoded(&self, raw_segments: &[Vec<u8>]) -> Result<StitchedImage> {
        let mut decoded = Vec::new();
        for (index, bytes) in raw_segments.iter().enumerate() {
            match image::load_from_memory(bytes) {
                Ok(image) => decoded.push((index, image)),
                Err(err) => {
                    warn!(index, %err, "Could not decode segment; skipping");
                }
            }
        }

        if decoded.is_empty() {
            return Err(ScanwerkError::NoUsableSegments {
                attempted: raw_segments.len(),
            });
        }
        self.stitch_indexed(decoded)
    }

    /// Stitch a batch of already-decoded segments.
    pub fn stitch(&self, segments: &[DynamicImage]) -> Result<StitchedImage> {
        if segments.is_empty() {
            return Err(ScanwerkError::NoUsableSegments { attempted: 0 });
        }
        self.stitch_indexed(
            segments
                .iter()
                .enumerate()
                .map(|(i, img)| (i, img.clone()))
                .collect(),
        )
    }

    fn stitch_indexed(&self, inputs: Vec<(usize, DynamicImage)>) -> Result<StitchedImage> {
        let processed: Vec<Segment> = inputs
            .into_iter()
            .map(|(index, image)| Segment {
                index,
                image: self.process_segment(index, &image),
            })
            .collect();

        info!(count = processed.len(), "Segments processed; compositing");
        Ok(StitchedImage {
            segments_used: processed.len(),
            image: self.compose(&processed),
        })
    }

    /// Normalize one segment: paper-boundary correction when the page edge
    /// is detectable, a cheap geometric fallback otherwise, then OCR
    /// contrast cleanup. This never discards the segment.
    fn process_segment(&self, index: usize, image: &DynamicImage) -> GrayImage {
        let corrected = match detect_page_boundary(image, &self.config) {
            Some(b) => {
                match HomographyTransform::map_to_rect(&b.quad, b.out_width, b.out_height) {
                    Ok(transform) => {
                        debug!(index, w = b.out_width, h = b.out_height, "Segment boundary corrected");
                        transform.apply(image)
                    }
                    Err(err) => {
                        warn!(index, %err, "Degenerate segment boundary; using fallback");
                        self.fallback_segment(image)
                    }
                }
            }
            None => {
                debug!(index, "No paper boundary found; using fallback");
                self.fallback_segment(image)
            }
        };

        self.ocr_enhance(&corrected)
    }

    /// Cheap fallback when no boundary is detectable: bring landscape
    /// captures upright, then sharpen mildly.
    fn fallback_segment(&self, image: &DynamicImage) -> DynamicImage {
        let aspect = image.width() as f32 / image.height() as f32;
        let upright = if aspect > self.config.rotate_aspect_threshold {
            image.rotate90()
        } else {
            image.clone()
        };
        DynamicImage::ImageLuma8(sharpen3x3(&upright.to_luma8()))
    }

    /// Contrast/noise normalization for text recognition: blur, adaptive
    /// threshold, morphological close.
    fn ocr_enhance(&self, image: &DynamicImage) -> GrayImage {
        let gray = image.to_luma8();
        let blurred = gaussian_blur_f32(&gray, self.config.enhance.blur_sigma);
        let binary = adaptive_threshold_mean(
            &blurred,
            self.config.enhance.threshold_block_radius,
            self.config.enhance.threshold_c,
        );
        close(&binary, Norm::LInf, 1)
    }

    /// Pad every segment to the tallest height with white and concatenate
    /// left-to-right with the configured gutter.
    fn compose(&self, segments: &[Segment]) -> DynamicImage {
        let max_height = segments
            .iter()
            .map(|s| s.image.height())
            .max()
            .unwrap_or(1);
        let total_width: u32 = segments.iter().map(|s| s.image.width()).sum::<u32>()
            + self.config.gutter * (segments.len() as u32 - 1);

        let mut canvas = GrayImage::from_pixel(total_width, max_height, Luma([255u8]));
        let mut cursor: i64 = 0;
        for segment in segments {
            image::imageops::replace(&mut canvas, &segment.image, cursor, 0);
            cursor += i64::from(segment.image.width() + self.config.gutter);
        }

        DynamicImage::ImageLuma8(canvas)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Flat portrait-ish gray segment; boundary detection fails on it, the
    /// fallback keeps its dimensions (aspect below the rotate threshold).
    fn flat_segment(w: u32, h: u32) -> DynamicImage {
        DynamicImage::ImageLuma8(GrayImage::from_pixel(w, h, Luma([150u8])))
    }

    fn png_bytes(image: &DynamicImage) -> Vec<u8> {
        encode_image(image, OutputFormat::Png).expect("encode")
    }

    /// Composite width is Σwᵢ + (N−1)·gutter and height is max(hᵢ).
    #[test]
    fn composite_dimensions_follow_formula() {
        let stitcher = MultiSegmentStitcher::new(StitchConfig::default());
        let segments = [
            flat_segment(40, 60),
            flat_segment(50, 80),
            flat_segment(30, 100),
        ];
        let out = stitcher.stitch(&segments).expect("stitch succeeds");

        assert_eq!(out.segments_used, 3);
        assert_eq!(out.image.width(), 40 + 50 + 30 + 2 * 20);
        assert_eq!(out.image.height(), 100);
    }

    /// Padding is white: the area under a short segment stays blank.
    #[test]
    fn padding_below_short_segments_is_white() {
        let stitcher = MultiSegmentStitcher::new(StitchConfig::default());
        let segments = [flat_segment(40, 50), flat_segment(40, 100)];
        let out = stitcher
            .stitch(&segments)
            .expect("stitch succeeds")
            .image
            .to_luma8();

        // Below the first segment (x inside it, y past its height).
        assert_eq!(out.get_pixel(10, 90).0[0], 255);
        // Inside the gutter.
        assert_eq!(out.get_pixel(45, 10).0[0], 255);
    }

    /// One corrupt segment is skipped; the composite is built from the
    /// remaining ones.
    #[test]
    fn corrupt_segment_is_isolated() {
        let stitcher = MultiSegmentStitcher::new(StitchConfig::default());
        let batch = vec![
            png_bytes(&flat_segment(40, 60)),
            b"not an image at all".to_vec(),
            png_bytes(&flat_segment(30, 80)),
        ];
        let out = stitcher.stitch_encoded(&batch).expect("partial success");
        assert_eq!(out.segments_used, 2);
        assert_eq!(out.image.width(), 40 + 30 + 20);
        assert_eq!(out.image.height(), 80);
    }

    /// A batch where every segment is corrupt fails as a whole.
    #[test]
    fn all_corrupt_batch_fails() {
        let stitcher = MultiSegmentStitcher::new(StitchConfig::default());
        let batch = vec![b"garbage".to_vec(), b"more garbage".to_vec()];
        match stitcher.stitch_encoded(&batch) {
            Err(ScanwerkError::NoUsableSegments { attempted: 2 }) => {}
            other => panic!("expected NoUsableSegments, got {other:?}"),
        }
    }

    /// An empty batch is rejected up front.
    #[test]
    fn empty_batch_fails() {
        let stitcher = MultiSegmentStitcher::new(StitchConfig::default());
        match stitcher.stitch(&[]) {
            Err(ScanwerkError::NoUsableSegments { attempted: 0 }) => {}
            other => panic!("expected NoUsableSegments, got {other:?}"),
        }
    }

    /// Landscape fallback segments are rotated upright before compositing.
    #[test]
    fn landscape_fallback_segment_is_rotated() {
        let stitcher = MultiSegmentStitcher::new(StitchConfig::default());
        let out = stitcher
            .stitch(&[flat_segment(130, 80)])
            .expect("stitch succeeds");
        assert_eq!((out.image.width(), out.image.height()), (80, 130));
    }

    /// A segment with a detectable paper boundary is cropped to the paper,
    /// not kept at photo size.
    #[test]
    fn boundary_corrected_segment_shrinks_to_paper() {
        let mut img = GrayImage::from_pixel(400, 500, Luma([30u8]));
        for y in 60..440 {
            for x in 50..350 {
                img.put_pixel(x, y, Luma([240u8]));
            }
        }
        let stitcher = MultiSegmentStitcher::new(StitchConfig::default());
        let out = stitcher
            .stitch(&[DynamicImage::ImageLuma8(img)])
            .expect("stitch succeeds");

        assert!(out.image.width().abs_diff(300) <= 8, "width {}", out.image.width());
        assert!(out.image.height().abs_diff(380) <= 8, "height {}", out.image.height());
    }

    /// The composite encodes in every configured output format.
    #[test]
    fn stitched_image_encodes() {
        let stitcher = MultiSegmentStitcher::new(StitchConfig::default());
        let out = stitcher
            .stitch(&[flat_segment(40, 60)])
            .expect("stitch succeeds");
        for format in [
            OutputFormat::Png,
            OutputFormat::WebP,
            OutputFormat::Jpeg { quality: 90 },
        ] {
            assert!(!out.encode(format).expect("encode").is_empty());
        }
    }
}
