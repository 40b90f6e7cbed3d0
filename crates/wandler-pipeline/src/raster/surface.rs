// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Decoded pixel surface.

use image::{DynamicImage, Rgb, RgbImage};
use wandler_core::Dimensions;

/// A decoded raster image held in memory.
///
/// Owned by exactly one codec call at a time. Encoding consumes the surface,
/// so its pixel buffer is freed when the encode call returns, whichever way
/// it returns.
#[derive(Debug, Clone)]
pub struct PixelSurface {
    image: DynamicImage,
}

impl PixelSurface {
    pub fn from_dynamic(image: DynamicImage) -> Self {
        Self { image }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn dimensions(&self) -> Dimensions {
        Dimensions {
            width: self.image.width(),
            height: self.image.height(),
        }
    }

    pub fn has_alpha(&self) -> bool {
        self.image.color().has_alpha()
    }

    pub fn as_dynamic(&self) -> &DynamicImage {
        &self.image
    }

    pub fn into_dynamic(self) -> DynamicImage {
        self.image
    }

    /// RGB copy with any transparency composited onto white.
    pub fn flatten_onto_white(&self) -> RgbImage {
        if !self.has_alpha() {
            return self.image.to_rgb8();
        }

        let rgba = self.image.to_rgba8();
        let mut flat = RgbImage::from_pixel(rgba.width(), rgba.height(), Rgb([255, 255, 255]));
        for (x, y, pixel) in rgba.enumerate_pixels() {
            let alpha = pixel[3] as u32;
            let blend = |channel: u8| -> u8 {
                ((channel as u32 * alpha + 255 * (255 - alpha) + 127) / 255) as u8
            };
            flat.put_pixel(x, y, Rgb([blend(pixel[0]), blend(pixel[1]), blend(pixel[2])]));
        }
        flat
    }
}
