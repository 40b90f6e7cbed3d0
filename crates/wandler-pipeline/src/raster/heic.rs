// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// HEIC decode/encode through libheif. Only compiled with the `heic` feature.

use image::{DynamicImage, RgbaImage};
use libheif_rs::{
    Channel, ColorSpace, CompressionFormat, EncoderQuality, HeifContext, Image, LibHeif, RgbChroma,
};
use tracing::{debug, instrument};
use wandler_core::{ConvertError, Quality, Result};

use super::surface::PixelSurface;

const RGBA: usize = 4;

#[instrument(skip_all, fields(bytes_len = bytes.len()))]
pub(crate) fn decode(bytes: &[u8]) -> Result<PixelSurface> {
    let lib_heif = LibHeif::new();
    let context = HeifContext::read_from_bytes(bytes)
        .map_err(|err| ConvertError::Decode(format!("invalid image/heic: {err}")))?;
    let handle = context
        .primary_image_handle()
        .map_err(|err| ConvertError::Decode(format!("image/heic has no primary image: {err}")))?;

    let width = handle.width();
    let height = handle.height();
    let decoded = lib_heif
        .decode(&handle, ColorSpace::Rgb(RgbChroma::Rgba), None)
        .map_err(|err| ConvertError::Decode(format!("image/heic decode failed: {err}")))?;

    let planes = decoded.planes();
    let interleaved = planes
        .interleaved
        .ok_or_else(|| ConvertError::Decode("image/heic has no interleaved RGBA plane".into()))?;

    // Rows may be padded past width * 4.
    let row_len = width as usize * RGBA;
    let mut pixels = Vec::with_capacity(row_len * height as usize);
    for y in 0..height as usize {
        let start = y * interleaved.stride;
        let row = interleaved
            .data
            .get(start..start + row_len)
            .ok_or_else(|| ConvertError::Decode("image/heic plane is truncated".into()))?;
        pixels.extend_from_slice(row);
    }

    let image = RgbaImage::from_raw(width, height, pixels)
        .ok_or_else(|| ConvertError::Decode("image/heic buffer size mismatch".into()))?;
    debug!(width, height, "HEIC decoded");
    Ok(PixelSurface::from_dynamic(DynamicImage::ImageRgba8(image)))
}

#[instrument(skip_all, fields(quality = quality.value()))]
pub(crate) fn encode(surface: &PixelSurface, quality: Quality) -> Result<Vec<u8>> {
    let encode_err =
        |err: libheif_rs::HeifError| ConvertError::Encode(format!("HEIC encoding failed: {err}"));

    let rgba = surface.as_dynamic().to_rgba8();
    let (width, height) = rgba.dimensions();

    let mut image =
        Image::new(width, height, ColorSpace::Rgb(RgbChroma::Rgba)).map_err(encode_err)?;
    image
        .create_plane(Channel::Interleaved, width, height, 8)
        .map_err(encode_err)?;

    {
        let planes = image.planes_mut();
        let plane = planes
            .interleaved
            .ok_or_else(|| ConvertError::Encode("HEIC image has no interleaved plane".into()))?;
        let row_len = width as usize * RGBA;
        for (y, row) in rgba.as_raw().chunks_exact(row_len).enumerate() {
            let start = y * plane.stride;
            plane
                .data
                .get_mut(start..start + row_len)
                .ok_or_else(|| ConvertError::Encode("HEIC plane is smaller than the image".into()))?
                .copy_from_slice(row);
        }
    }

    let lib_heif = LibHeif::new();
    let mut context = HeifContext::new().map_err(encode_err)?;
    let mut encoder = lib_heif
        .encoder_for_format(CompressionFormat::Hevc)
        .map_err(encode_err)?;
    encoder
        .set_quality(EncoderQuality::Lossy(quality.percent()))
        .map_err(encode_err)?;
    context
        .encode_image(&image, &mut encoder, None)
        .map_err(encode_err)?;

    context.write_to_bytes().map_err(encode_err)
}
