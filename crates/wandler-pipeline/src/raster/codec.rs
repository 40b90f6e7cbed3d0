// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Raster codec: decode JPEG/PNG/WebP/HEIC bytes into a pixel surface, and
// encode a surface into a target format after applying the dimension policy.
// The default implementation uses the `image` crate.

use std::io::Cursor;

use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType as PngFilter, PngEncoder};
use image::imageops::FilterType;
use image::{DynamicImage, ImageError, ImageFormat, ImageReader};
use tracing::{debug, instrument};
use wandler_core::{ConvertError, Dimensions, MediaType, Quality, Result};

use super::surface::PixelSurface;
use crate::dimensions::DimensionPolicy;

/// Output of an encode call: the bytes plus the pixel size actually written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedImage {
    pub bytes: Vec<u8>,
    pub dimensions: Dimensions,
    pub media_type: MediaType,
}

/// Swappable raster backend. The dispatcher only talks to this trait.
pub trait RasterCodec: Send + Sync {
    /// Decode `bytes` declared as `media_type` into a surface.
    fn decode(&self, bytes: &[u8], media_type: MediaType) -> Result<PixelSurface>;

    /// Encode `surface` into `target`, clamped by the codec's dimension policy.
    /// The surface is consumed and released on every return path.
    fn encode(&self, surface: PixelSurface, target: MediaType, quality: Quality)
    -> Result<EncodedImage>;
}

/// Default backend built on the `image` crate.
///
/// Downscaling uses Lanczos3. JPEG output is composited onto white first;
/// PNG ignores quality except for picking a stronger deflate level below the
/// conversion default; WebP is lossy at the requested quality and lossless
/// at quality 1.0.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageCodec {
    policy: DimensionPolicy,
}

impl ImageCodec {
    pub fn new(policy: DimensionPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> DimensionPolicy {
        self.policy
    }

    /// Resize to the policy's clamped size if the surface exceeds the bound.
    fn fit(&self, image: DynamicImage) -> DynamicImage {
        let target = self.policy.clamp(image.width(), image.height());
        if target.width == image.width() && target.height == image.height() {
            return image;
        }
        debug!(
            from_w = image.width(),
            from_h = image.height(),
            to_w = target.width,
            to_h = target.height,
            "Downscaling to dimension bound"
        );
        image.resize_exact(target.width, target.height, FilterType::Lanczos3)
    }
}

impl RasterCodec for ImageCodec {
    #[instrument(skip(self, bytes), fields(bytes_len = bytes.len(), media = %media_type))]
    fn decode(&self, bytes: &[u8], media_type: MediaType) -> Result<PixelSurface> {
        if bytes.is_empty() {
            return Err(ConvertError::Decode("input is empty".into()));
        }

        let format = match media_type {
            MediaType::Jpeg => ImageFormat::Jpeg,
            MediaType::Png => ImageFormat::Png,
            MediaType::Webp => ImageFormat::WebP,
            MediaType::Heic => return decode_heic(bytes),
            MediaType::Pdf => {
                return Err(ConvertError::Decode(
                    "application/pdf is a document, not a raster image".into(),
                ));
            }
        };

        // Default reader limits cap the allocation size, so oversized images
        // fail here instead of aborting the process.
        let image = ImageReader::with_format(Cursor::new(bytes), format)
            .decode()
            .map_err(|err| decode_error(media_type, err))?;

        debug!(width = image.width(), height = image.height(), "Image decoded");
        Ok(PixelSurface::from_dynamic(image))
    }

    #[instrument(skip(self, surface), fields(target = %target, quality = quality.value()))]
    fn encode(
        &self,
        surface: PixelSurface,
        target: MediaType,
        quality: Quality,
    ) -> Result<EncodedImage> {
        let encoder: fn(&PixelSurface, Quality) -> Result<Vec<u8>> = match target {
            MediaType::Jpeg => encode_jpeg,
            MediaType::Png => encode_png,
            MediaType::Webp => encode_webp,
            MediaType::Heic => encode_heic,
            MediaType::Pdf => {
                return Err(ConvertError::Encode(
                    "application/pdf is not a raster target".into(),
                ));
            }
        };

        let surface = PixelSurface::from_dynamic(self.fit(surface.into_dynamic()));
        let dimensions = surface.dimensions();
        let bytes = encoder(&surface, quality)?;
        drop(surface);

        if bytes.is_empty() {
            return Err(ConvertError::Encode(format!(
                "{} encoder produced no data",
                target.mime_type()
            )));
        }

        debug!(bytes_len = bytes.len(), %dimensions, "Image encoded");
        Ok(EncodedImage {
            bytes,
            dimensions,
            media_type: target,
        })
    }
}

fn decode_error(media_type: MediaType, err: ImageError) -> ConvertError {
    match err {
        ImageError::Limits(limit) => ConvertError::Decode(format!(
            "{} is too large to decode: {limit}",
            media_type.mime_type()
        )),
        other => ConvertError::Decode(format!("invalid {}: {other}", media_type.mime_type())),
    }
}

fn encode_jpeg(surface: &PixelSurface, quality: Quality) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    let rgb = surface.flatten_onto_white();
    let encoder = JpegEncoder::new_with_quality(&mut buffer, quality.percent());
    rgb.write_with_encoder(encoder)
        .map_err(|err| ConvertError::Encode(format!("JPEG encoding failed: {err}")))?;
    Ok(buffer)
}

fn encode_png(surface: &PixelSurface, quality: Quality) -> Result<Vec<u8>> {
    let compression = if quality >= Quality::CONVERT {
        CompressionType::Default
    } else {
        CompressionType::Best
    };

    let mut buffer = Vec::new();
    let encoder = PngEncoder::new_with_quality(&mut buffer, compression, PngFilter::Adaptive);
    let image = surface.as_dynamic();
    let result = match image {
        // PNG has no float samples.
        DynamicImage::ImageRgb32F(_) | DynamicImage::ImageRgba32F(_) => {
            DynamicImage::ImageRgba8(image.to_rgba8()).write_with_encoder(encoder)
        }
        _ => image.write_with_encoder(encoder),
    };
    result.map_err(|err| ConvertError::Encode(format!("PNG encoding failed: {err}")))?;
    Ok(buffer)
}

/// Lossy at the requested quality; quality 1.0 selects lossless.
fn encode_webp(surface: &PixelSurface, quality: Quality) -> Result<Vec<u8>> {
    let image = surface.as_dynamic();
    let (width, height) = (image.width(), image.height());
    let pixels;
    let encoder = if surface.has_alpha() {
        pixels = image.to_rgba8().into_raw();
        webp::Encoder::from_rgba(&pixels, width, height)
    } else {
        pixels = image.to_rgb8().into_raw();
        webp::Encoder::from_rgb(&pixels, width, height)
    };

    let lossless = quality >= Quality::LOSSLESS;
    let encoded = encoder
        .encode_simple(lossless, f32::from(quality.percent()))
        .map_err(|err| ConvertError::Encode(format!("WebP encoding failed: {err:?}")))?;
    Ok(encoded.to_vec())
}

#[cfg(feature = "heic")]
fn decode_heic(bytes: &[u8]) -> Result<PixelSurface> {
    super::heic::decode(bytes)
}

#[cfg(not(feature = "heic"))]
fn decode_heic(_bytes: &[u8]) -> Result<PixelSurface> {
    Err(ConvertError::FormatNotEnabled(MediaType::Heic))
}

#[cfg(feature = "heic")]
fn encode_heic(surface: &PixelSurface, quality: Quality) -> Result<Vec<u8>> {
    super::heic::encode(surface, quality)
}

#[cfg(not(feature = "heic"))]
fn encode_heic(_surface: &PixelSurface, _quality: Quality) -> Result<Vec<u8>> {
    Err(ConvertError::FormatNotEnabled(MediaType::Heic))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage, Rgba, RgbaImage};

    fn gradient(width: u32, height: u32) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |x, y| {
            Rgb([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8])
        }))
    }

    fn encoded(image: &DynamicImage, format: ImageFormat) -> Vec<u8> {
        let mut buffer = Vec::new();
        image
            .write_to(&mut Cursor::new(&mut buffer), format)
            .expect("encode fixture");
        buffer
    }

    #[test]
    fn decode_reads_dimensions() {
        let codec = ImageCodec::default();
        let png = encoded(&gradient(40, 30), ImageFormat::Png);
        let surface = codec.decode(&png, MediaType::Png).unwrap();
        assert_eq!(surface.dimensions(), Dimensions { width: 40, height: 30 });
    }

    #[test]
    fn decode_garbage_fails() {
        let codec = ImageCodec::default();
        let err = codec.decode(b"definitely not a png", MediaType::Png).unwrap_err();
        assert!(matches!(err, ConvertError::Decode(_)));
    }

    #[test]
    fn decode_wrong_declared_type_fails() {
        let codec = ImageCodec::default();
        let png = encoded(&gradient(8, 8), ImageFormat::Png);
        assert!(matches!(
            codec.decode(&png, MediaType::Jpeg),
            Err(ConvertError::Decode(_))
        ));
    }

    #[test]
    fn decode_empty_and_pdf_fail() {
        let codec = ImageCodec::default();
        assert!(codec.decode(&[], MediaType::Png).is_err());
        assert!(codec.decode(b"%PDF-1.5", MediaType::Pdf).is_err());
    }

    #[test]
    fn same_format_round_trip_keeps_dimensions() {
        let codec = ImageCodec::default();
        for (media, format) in [
            (MediaType::Png, ImageFormat::Png),
            (MediaType::Jpeg, ImageFormat::Jpeg),
            (MediaType::Webp, ImageFormat::WebP),
        ] {
            let source = encoded(&gradient(64, 48), format);
            let surface = codec.decode(&source, media).unwrap();
            let out = codec.encode(surface, media, Quality::LOSSLESS).unwrap();
            let again = codec.decode(&out.bytes, media).unwrap();
            assert_eq!(again.dimensions(), Dimensions { width: 64, height: 48 }, "{media}");
        }
    }

    #[test]
    fn encode_applies_dimension_policy() {
        let codec = ImageCodec::new(DimensionPolicy::new(100));
        let surface = PixelSurface::from_dynamic(gradient(400, 100));
        let out = codec.encode(surface, MediaType::Png, Quality::CONVERT).unwrap();
        assert_eq!(out.dimensions, Dimensions { width: 100, height: 25 });

        let decoded = image::load_from_memory(&out.bytes).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (100, 25));
    }

    #[test]
    fn jpeg_output_has_white_background() {
        let codec = ImageCodec::default();
        let transparent = RgbaImage::from_pixel(16, 16, Rgba([0, 0, 0, 0]));
        let surface = PixelSurface::from_dynamic(DynamicImage::ImageRgba8(transparent));
        let out = codec
            .encode(surface, MediaType::Jpeg, Quality::LOSSLESS)
            .unwrap();

        let decoded = image::load_from_memory_with_format(&out.bytes, ImageFormat::Jpeg)
            .unwrap()
            .to_rgb8();
        let Rgb([r, g, b]) = *decoded.get_pixel(8, 8);
        assert!(r > 245 && g > 245 && b > 245);
    }

    fn noisy(size: u32) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_fn(size, size, |x, y| {
            let v = ((x * 7919 + y * 104_729) % 251) as u8;
            Rgb([v, v.wrapping_mul(3), v.wrapping_add(91)])
        }))
    }

    /// Hash noise that lossless coding cannot predict.
    fn scrambled(size: u32) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_fn(size, size, |x, y| {
            let hash = (x.wrapping_mul(73_856_093) ^ y.wrapping_mul(19_349_663))
                .wrapping_mul(2_654_435_761);
            let [r, g, b, _] = hash.to_be_bytes();
            Rgb([r, g, b])
        }))
    }

    fn encoded_len(codec: &ImageCodec, image: DynamicImage, target: MediaType, q: f32) -> usize {
        let surface = PixelSurface::from_dynamic(image);
        codec.encode(surface, target, Quality::new(q)).unwrap().bytes.len()
    }

    #[test]
    fn lower_jpeg_quality_is_smaller() {
        let codec = ImageCodec::default();
        let high = encoded_len(&codec, noisy(128), MediaType::Jpeg, 1.0);
        let low = encoded_len(&codec, noisy(128), MediaType::Jpeg, 0.3);
        assert!(low < high, "{low} >= {high}");
    }

    #[test]
    fn lower_webp_quality_is_smaller() {
        let codec = ImageCodec::default();
        let lossless = encoded_len(&codec, scrambled(256), MediaType::Webp, 1.0);
        let convert = encoded_len(&codec, scrambled(256), MediaType::Webp, 0.92);
        let low = encoded_len(&codec, scrambled(256), MediaType::Webp, 0.1);
        assert!(convert < lossless, "{convert} >= {lossless}");
        assert!(low < convert, "{low} >= {convert}");
    }

    #[test]
    fn webp_keeps_alpha() {
        let codec = ImageCodec::default();
        let rgba = RgbaImage::from_pixel(10, 10, Rgba([200, 0, 0, 100]));
        let rgba = DynamicImage::ImageRgba8(rgba);
        let out = codec
            .encode(PixelSurface::from_dynamic(rgba), MediaType::Webp, Quality::CONVERT)
            .unwrap();
        let decoded = codec.decode(&out.bytes, MediaType::Webp).unwrap();
        assert!(decoded.has_alpha());
    }

    #[test]
    fn pdf_target_is_rejected() {
        let codec = ImageCodec::default();
        let err = codec
            .encode(PixelSurface::from_dynamic(gradient(4, 4)), MediaType::Pdf, Quality::CONVERT)
            .unwrap_err();
        assert!(matches!(err, ConvertError::Encode(_)));
    }

    #[cfg(not(feature = "heic"))]
    #[test]
    fn heic_without_feature() {
        let codec = ImageCodec::default();
        assert!(matches!(
            codec.decode(b"....ftypheic", MediaType::Heic),
            Err(ConvertError::FormatNotEnabled(MediaType::Heic))
        ));
        let surface = PixelSurface::from_dynamic(gradient(4, 4));
        assert!(matches!(
            codec.encode(surface, MediaType::Heic, Quality::CONVERT),
            Err(ConvertError::FormatNotEnabled(MediaType::Heic))
        ));
    }
}
