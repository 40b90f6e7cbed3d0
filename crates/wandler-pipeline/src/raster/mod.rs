// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Raster module: decode input images into pixel surfaces and encode surfaces
// into JPEG, PNG, WebP, or (with the `heic` feature) HEIC.

pub mod codec;
#[cfg(feature = "heic")]
pub mod heic;
pub mod surface;

pub use codec::{EncodedImage, ImageCodec, RasterCodec};
pub use surface::PixelSurface;
