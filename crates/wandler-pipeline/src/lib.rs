// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// wandler-pipeline: the conversion pipeline for Wandler.
//
// Provides the dimension policy, raster decode/encode (JPEG, PNG, WebP and,
// behind the `heic` feature, HEIC), PDF wrapping and page extraction, the
// operation dispatcher, and output size estimation.

pub mod convert;
pub mod dimensions;
pub mod estimate;
pub mod pdf;
pub mod raster;

// Re-export the primary items so callers can use `wandler_pipeline::Converter` etc.
pub use convert::{Converter, convert};
pub use dimensions::{DEFAULT_MAX_DIMENSION, DimensionPolicy, clamp};
pub use estimate::{DefaultEstimatePolicy, EstimatePolicy, EstimatedSize, SizeEstimator, estimate};
pub use pdf::{JpegPage, PageExtraction, PdfReader, PdfWriter, RenderOptions, extract_pages};
pub use raster::{EncodedImage, ImageCodec, PixelSurface, RasterCodec};
