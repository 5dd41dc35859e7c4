// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// scanwerk — command-line front end.
//
// This is the caller-side edge of the pipeline: file decoding, output
// filename assignment, and configuration loading live here; the core
// stays byte-in → byte-out.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};
use scanwerk_core::config::{NormalizeConfig, NormalizeStrategy, StitchConfig};
use scanwerk_core::error::Result;
use scanwerk_core::human_errors::humanize_error;
use scanwerk_core::OutputFormat;
use scanwerk_document::image::processor::encode_image;
use scanwerk_document::{ImageProcessor, MultiSegmentStitcher, normalize_document};
use tracing::{error, info};
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "scanwerk")]
#[command(about = "Geometric normalization of photographed answer sheets")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Normalize one sheet photo into the canonical OCR-ready frame.
    Normalize {
        /// Path to the input photo.
        input: PathBuf,

        /// Directory for the output file (defaults to the input's directory).
        #[arg(long)]
        out_dir: Option<PathBuf>,

        /// Marker layout printed on the sheet.
        #[arg(long, value_enum, default_value_t = StrategyArg::Corner)]
        strategy: StrategyArg,

        /// JSON calibration file overriding the built-in defaults.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Output encoding.
        #[arg(long, value_enum, default_value_t = FormatArg::Webp)]
        format: FormatArg,

        /// JPEG quality 1-100 (used with --format jpeg).
        #[arg(long, default_value = "90")]
        jpeg_quality: u8,
    },

    /// Stitch several photographed page segments into one composite.
    Stitch {
        /// Segment photos, left to right.
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Directory for the output file (defaults to the first input's directory).
        #[arg(long)]
        out_dir: Option<PathBuf>,

        /// White gap between segments, px.
        #[arg(long, default_value = "20")]
        gutter: u32,

        /// JSON calibration file overriding the built-in defaults.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Output encoding.
        #[arg(long, value_enum, default_value_t = FormatArg::Webp)]
        format: FormatArg,

        /// JPEG quality 1-100 (used with --format jpeg).
        #[arg(long, default_value = "90")]
        jpeg_quality: u8,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum StrategyArg {
    /// Four corner markers plus an orientation cluster.
    Corner,
    /// Regular marker grid plus one orientation marker.
    Grid,
}

impl From<StrategyArg> for NormalizeStrategy {
    fn from(arg: StrategyArg) -> Self {
        match arg {
            StrategyArg::Corner => NormalizeStrategy::CornerMarkers,
            StrategyArg::Grid => NormalizeStrategy::MarkerGrid,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum FormatArg {
    Webp,
    Png,
    Jpeg,
}

impl FormatArg {
    fn to_output(self, jpeg_quality: u8) -> OutputFormat {
        match self {
            Self::Webp => OutputFormat::WebP,
            Self::Png => OutputFormat::Png,
            Self::Jpeg => OutputFormat::Jpeg {
                quality: jpeg_quality.clamp(1, 100),
            },
        }
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    match run(cli.command) {
        Ok(path) => {
            println!("{}", path.display());
            ExitCode::SUCCESS
        }
        Err(err) => {
            let human = humanize_error(&err);
            eprintln!("{}", human.message);
            eprintln!("{}", human.suggestion);
            error!(%err, "processing failed");
            ExitCode::FAILURE
        }
    }
}

fn run(command: Commands) -> Result<PathBuf> {
    match command {
        Commands::Normalize {
            input,
            out_dir,
            strategy,
            config,
            format,
            jpeg_quality,
        } => {
            let mut cfg: NormalizeConfig = load_config(config.as_deref())?;
            cfg.strategy = strategy.into();
            cfg.output = format.to_output(jpeg_quality);

            let image = ImageProcessor::open(&input)?.into_dynamic();
            let normalized = normalize_document(&image, &cfg)?;
            let bytes = encode_image(&normalized, cfg.output)?;

            let path = output_path(out_dir.as_deref(), &input, cfg.output);
            std::fs::write(&path, bytes)?;
            info!(path = %path.display(), "Normalized sheet written");
            Ok(path)
        }

        Commands::Stitch {
            inputs,
            out_dir,
            gutter,
            config,
            format,
            jpeg_quality,
        } => {
            let mut cfg: StitchConfig = load_config(config.as_deref())?;
            cfg.gutter = gutter;
            cfg.output = format.to_output(jpeg_quality);

            // Read the raw bytes; unreadable or corrupt segments are the
            // stitcher's business to skip, not ours to fail on.
            let mut raw = Vec::with_capacity(inputs.len());
            for input in &inputs {
                match std::fs::read(input) {
                    Ok(bytes) => raw.push(bytes),
                    Err(err) => {
                        error!(path = %input.display(), %err, "Could not read segment file");
                        raw.push(Vec::new());
                    }
                }
            }

            let stitched = MultiSegmentStitcher::new(cfg).stitch_encoded(&raw)?;
            let bytes = stitched.encode(cfg.output)?;

            let path = output_path(out_dir.as_deref(), &inputs[0], cfg.output);
            std::fs::write(&path, bytes)?;
            info!(
                path = %path.display(),
                segments_used = stitched.segments_used,
                "Stitched composite written"
            );
            Ok(path)
        }
    }
}

/// Load a JSON calibration file, or fall back to the built-in defaults.
fn load_config<T: serde::de::DeserializeOwned + Default>(path: Option<&Path>) -> Result<T> {
    match path {
        Some(path) => {
            let text = std::fs::read_to_string(path)?;
            Ok(serde_json::from_str(&text)?)
        }
        None => Ok(T::default()),
    }
}

/// Assign an opaque unique output filename next to the input (or in the
/// requested directory).
fn output_path(out_dir: Option<&Path>, input: &Path, format: OutputFormat) -> PathBuf {
    let dir = out_dir
        .map(Path::to_path_buf)
        .unwrap_or_else(|| input.parent().unwrap_or(Path::new(".")).to_path_buf());
    dir.join(format!("{}.{}", Uuid::new_v4(), format.extension()))
}
