// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Criterion benchmarks for the scanwerk-document crate. Covers the two hot
// stages of the pipeline: marker detection on a synthetic sheet and the
// scan-look enhancement pass.

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use image::{DynamicImage, GrayImage, Luma};

use scanwerk_core::config::{EnhanceConfig, MarkerConfig};
use scanwerk_document::MarkerDetector;
use scanwerk_document::normalize::ScanLookEnhancer;

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

/// A 500x350 synthetic sheet: white field, four 20 px corner marks, and a
/// vertical 3-point cluster near the right edge — the same pattern the
/// detection unit tests use, at a size small enough to iterate quickly.
fn synthetic_sheet() -> DynamicImage {
    let mut img = GrayImage::from_pixel(500, 350, Luma([255u8]));
    let mut square = |cx: u32, cy: u32, side: u32| {
        for y in cy..cy + side {
            for x in cx..cx + side {
                img.put_pixel(x, y, Luma([0u8]));
            }
        }
    };
    square(25, 25, 20);
    square(455, 25, 20);
    square(455, 305, 20);
    square(25, 305, 20);
    square(430, 100, 10);
    square(432, 150, 10);
    square(434, 200, 10);
    DynamicImage::ImageLuma8(img)
}

// ---------------------------------------------------------------------------
// Benchmarks
// ---------------------------------------------------------------------------

/// Benchmark marker detection: grayscale, blur, binarize, contours,
/// moments, and the area filter.
fn bench_marker_detection(c: &mut Criterion) {
    let sheet = synthetic_sheet();
    let detector = MarkerDetector::new(MarkerConfig::default());

    c.bench_function("marker_detection (500x350)", |b| {
        b.iter(|| {
            let markers = detector.detect(black_box(&sheet));
            black_box(markers);
        });
    });
}

/// Benchmark the scan-look enhancement pass (CLAHE, unsharp mask,
/// adaptive threshold) on the same sheet.
fn bench_scan_look_enhancement(c: &mut Criterion) {
    let sheet = synthetic_sheet();
    let enhancer = ScanLookEnhancer::new(EnhanceConfig::default());

    c.bench_function("scan_look_enhancement (500x350)", |b| {
        b.iter(|| {
            let out = enhancer.enhance(black_box(&sheet));
            black_box(out);
        });
    });
}

criterion_group!(benches, bench_marker_detection, bench_scan_look_enhancement);
criterion_main!(benches);
