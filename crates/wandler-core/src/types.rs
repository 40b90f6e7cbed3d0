// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types for the Wandler conversion pipeline.

use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{ConvertError, Result};

/// Media types the pipeline reads or writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MediaType {
    Jpeg,
    Png,
    Webp,
    Heic,
    Pdf,
}

impl MediaType {
    /// Canonical MIME type string.
    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
            Self::Webp => "image/webp",
            Self::Heic => "image/heic",
            Self::Pdf => "application/pdf",
        }
    }

    /// File extension used for outputs of this type (lowercase, no dot).
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Jpeg => "jpg",
            Self::Png => "png",
            Self::Webp => "webp",
            Self::Heic => "heic",
            Self::Pdf => "pdf",
        }
    }

    /// Parse a MIME type string. Matching is case-insensitive and ignores
    /// parameters such as `; charset=...`.
    pub fn from_mime(mime: &str) -> Option<Self> {
        let essence = mime.split(';').next().unwrap_or("").trim();
        match essence.to_ascii_lowercase().as_str() {
            "image/jpeg" | "image/jpg" | "image/pjpeg" => Some(Self::Jpeg),
            "image/png" => Some(Self::Png),
            "image/webp" => Some(Self::Webp),
            "image/heic" | "image/heif" => Some(Self::Heic),
            "application/pdf" => Some(Self::Pdf),
            _ => None,
        }
    }

    /// Infer media type from file extension.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "jpg" | "jpeg" | "jpe" | "jfif" => Some(Self::Jpeg),
            "png" => Some(Self::Png),
            "webp" => Some(Self::Webp),
            "heic" | "heif" => Some(Self::Heic),
            "pdf" => Some(Self::Pdf),
            _ => None,
        }
    }

    /// Format name as people write it.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Jpeg => "JPEG",
            Self::Png => "PNG",
            Self::Webp => "WebP",
            Self::Heic => "HEIC",
            Self::Pdf => "PDF",
        }
    }

    /// Whether this is a raster image (anything but PDF).
    pub fn is_raster(&self) -> bool {
        !matches!(self, Self::Pdf)
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mime_type())
    }
}

// ---------------------------------------------------------------------------
// Operations
// ---------------------------------------------------------------------------

/// Every conversion the pipeline offers. Serialised as the upper-case tags
/// (`JPG_TO_PNG`, `TO_PDF`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConversionOperation {
    JpgToPng,
    JpgToWebp,
    JpgToHeic,
    PngToJpg,
    PngToWebp,
    PngToHeic,
    WebpToJpg,
    WebpToPng,
    HeicToJpg,
    HeicToPng,
    PdfToJpg,
    PdfToPng,
    ToPdf,
    ReduceSize,
}

/// What an operation does, independent of its tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    /// Raster to raster format change.
    Transcode { from: MediaType, to: MediaType },
    /// Re-encode in the source format at reduced quality.
    ReduceSize,
    /// Wrap any raster image into a single-page PDF.
    WrapAsDocument,
    /// Rasterise every page of a PDF.
    ExtractPages { to: MediaType },
}

/// Grouping used by front-ends to organise the operation picker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationGroup {
    Jpg,
    Png,
    Webp,
    Heic,
    Pdf,
    Other,
}

impl OperationGroup {
    pub const ALL: [OperationGroup; 6] = [
        Self::Jpg,
        Self::Png,
        Self::Webp,
        Self::Heic,
        Self::Pdf,
        Self::Other,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Self::Jpg => "Convert from JPG",
            Self::Png => "Convert from PNG",
            Self::Webp => "Convert from WebP",
            Self::Heic => "Convert from HEIC",
            Self::Pdf => "Convert from PDF",
            Self::Other => "Other Options",
        }
    }

    /// The group a front-end should open for a freshly selected file.
    pub fn for_media(media: MediaType) -> Self {
        match media {
            MediaType::Jpeg => Self::Jpg,
            MediaType::Png => Self::Png,
            MediaType::Webp => Self::Webp,
            MediaType::Heic => Self::Heic,
            MediaType::Pdf => Self::Pdf,
        }
    }
}

impl ConversionOperation {
    pub const ALL: [ConversionOperation; 14] = [
        Self::JpgToPng,
        Self::JpgToWebp,
        Self::JpgToHeic,
        Self::PngToJpg,
        Self::PngToWebp,
        Self::PngToHeic,
        Self::WebpToJpg,
        Self::WebpToPng,
        Self::HeicToJpg,
        Self::HeicToPng,
        Self::PdfToJpg,
        Self::PdfToPng,
        Self::ToPdf,
        Self::ReduceSize,
    ];

    /// The configuration tag, e.g. `JPG_TO_PNG`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::JpgToPng => "JPG_TO_PNG",
            Self::JpgToWebp => "JPG_TO_WEBP",
            Self::JpgToHeic => "JPG_TO_HEIC",
            Self::PngToJpg => "PNG_TO_JPG",
            Self::PngToWebp => "PNG_TO_WEBP",
            Self::PngToHeic => "PNG_TO_HEIC",
            Self::WebpToJpg => "WEBP_TO_JPG",
            Self::WebpToPng => "WEBP_TO_PNG",
            Self::HeicToJpg => "HEIC_TO_JPG",
            Self::HeicToPng => "HEIC_TO_PNG",
            Self::PdfToJpg => "PDF_TO_JPG",
            Self::PdfToPng => "PDF_TO_PNG",
            Self::ToPdf => "TO_PDF",
            Self::ReduceSize => "REDUCE_SIZE",
        }
    }

    pub fn kind(&self) -> OperationKind {
        use MediaType::*;
        let transcode = |from, to| OperationKind::Transcode { from, to };
        match self {
            Self::JpgToPng => transcode(Jpeg, Png),
            Self::JpgToWebp => transcode(Jpeg, Webp),
            Self::JpgToHeic => transcode(Jpeg, Heic),
            Self::PngToJpg => transcode(Png, Jpeg),
            Self::PngToWebp => transcode(Png, Webp),
            Self::PngToHeic => transcode(Png, Heic),
            Self::WebpToJpg => transcode(Webp, Jpeg),
            Self::WebpToPng => transcode(Webp, Png),
            Self::HeicToJpg => transcode(Heic, Jpeg),
            Self::HeicToPng => transcode(Heic, Png),
            Self::PdfToJpg => OperationKind::ExtractPages { to: Jpeg },
            Self::PdfToPng => OperationKind::ExtractPages { to: Png },
            Self::ToPdf => OperationKind::WrapAsDocument,
            Self::ReduceSize => OperationKind::ReduceSize,
        }
    }

    /// Whether the operation can be applied to a source of the given type.
    pub fn accepts(&self, source: MediaType) -> bool {
        match self.kind() {
            OperationKind::Transcode { from, .. } => from == source,
            OperationKind::ExtractPages { .. } => source == MediaType::Pdf,
            OperationKind::ReduceSize | OperationKind::WrapAsDocument => source.is_raster(),
        }
    }

    /// Media type of the produced file(s). Only `REDUCE_SIZE` depends on the
    /// source, since it keeps the input format.
    pub fn output_media(&self, source: MediaType) -> MediaType {
        match self.kind() {
            OperationKind::Transcode { to, .. } | OperationKind::ExtractPages { to } => to,
            OperationKind::WrapAsDocument => MediaType::Pdf,
            OperationKind::ReduceSize => source,
        }
    }

    /// Check the operation against a source, failing with
    /// [`ConvertError::UnsupportedOperation`] on mismatch.
    pub fn check_source(&self, source: MediaType) -> Result<()> {
        if self.accepts(source) {
            Ok(())
        } else {
            Err(ConvertError::UnsupportedOperation(format!(
                "{} cannot be applied to {}",
                self.as_str(),
                source.mime_type()
            )))
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::JpgToPng => "JPG to PNG",
            Self::JpgToWebp => "JPG to WebP",
            Self::JpgToHeic => "JPG to HEIC",
            Self::PngToJpg => "PNG to JPG",
            Self::PngToWebp => "PNG to WebP",
            Self::PngToHeic => "PNG to HEIC",
            Self::WebpToJpg => "WebP to JPG",
            Self::WebpToPng => "WebP to PNG",
            Self::HeicToJpg => "HEIC to JPG",
            Self::HeicToPng => "HEIC to PNG",
            Self::PdfToJpg => "PDF to JPG",
            Self::PdfToPng => "PDF to PNG",
            Self::ToPdf => "Convert to PDF",
            Self::ReduceSize => "Reduce Size",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::JpgToPng => "Convert JPG images to PNG format for better quality",
            Self::JpgToWebp | Self::PngToWebp => "Convert to WebP for better compression",
            Self::JpgToHeic | Self::PngToHeic => "Convert to HEIC for iOS compatibility",
            Self::PngToJpg => "Convert PNG images to JPG format",
            Self::WebpToJpg => "Convert WebP images to JPG format",
            Self::WebpToPng => "Convert WebP images to PNG format",
            Self::HeicToJpg => "Convert HEIC images to JPG format",
            Self::HeicToPng => "Convert HEIC images to PNG format",
            Self::PdfToJpg => "Convert PDF pages to JPG images",
            Self::PdfToPng => "Convert PDF pages to PNG images",
            Self::ToPdf => "Convert your image to PDF format",
            Self::ReduceSize => "Compress image while maintaining quality",
        }
    }

    pub fn group(&self) -> OperationGroup {
        match self {
            Self::JpgToPng | Self::JpgToWebp | Self::JpgToHeic => OperationGroup::Jpg,
            Self::PngToJpg | Self::PngToWebp | Self::PngToHeic => OperationGroup::Png,
            Self::WebpToJpg | Self::WebpToPng => OperationGroup::Webp,
            Self::HeicToJpg | Self::HeicToPng => OperationGroup::Heic,
            Self::PdfToJpg | Self::PdfToPng => OperationGroup::Pdf,
            Self::ToPdf | Self::ReduceSize => OperationGroup::Other,
        }
    }
}

impl fmt::Display for ConversionOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConversionOperation {
    type Err = ConvertError;

    fn from_str(tag: &str) -> Result<Self> {
        let normalised = tag.trim().to_ascii_uppercase().replace('-', "_");
        Self::ALL
            .iter()
            .copied()
            .find(|op| op.as_str() == normalised)
            .ok_or_else(|| {
                ConvertError::UnsupportedOperation(format!("unknown operation tag '{tag}'"))
            })
    }
}

// ---------------------------------------------------------------------------
// Values
// ---------------------------------------------------------------------------

/// Pixel dimensions, both strictly positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    /// Returns `None` if either side is zero.
    pub fn new(width: u32, height: u32) -> Option<Self> {
        (width > 0 && height > 0).then_some(Self { width, height })
    }

    pub fn aspect_ratio(&self) -> f64 {
        self.width as f64 / self.height as f64
    }

    pub fn fits_within(&self, bound: u32) -> bool {
        self.width <= bound && self.height <= bound
    }
}

impl fmt::Display for Dimensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Encoder fidelity in `[0, 1]`. Formats map it onto their own scale.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct Quality(f32);

impl Quality {
    /// Default for plain format conversion.
    pub const CONVERT: Quality = Quality(0.92);
    /// Default for `REDUCE_SIZE`.
    pub const REDUCE: Quality = Quality(0.8);
    /// Maximum fidelity.
    pub const LOSSLESS: Quality = Quality(1.0);

    /// Clamp `value` into `[0, 1]`. NaN becomes the conversion default.
    pub fn new(value: f32) -> Self {
        if value.is_nan() {
            Self::CONVERT
        } else {
            Self(value.clamp(0.0, 1.0))
        }
    }

    pub fn value(&self) -> f32 {
        self.0
    }

    /// Quality on the 1..=100 scale used by JPEG and HEIC encoders.
    pub fn percent(&self) -> u8 {
        ((self.0 * 100.0).round() as u8).clamp(1, 100)
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self::CONVERT
    }
}

/// The input file: immutable bytes plus declared media type.
///
/// Bytes are shared behind an `Arc` so the same asset can be submitted to
/// several concurrent conversions without copying.
#[derive(Debug, Clone)]
pub struct SourceAsset {
    bytes: Arc<[u8]>,
    media_type: MediaType,
}

impl SourceAsset {
    pub fn new(bytes: impl Into<Arc<[u8]>>, media_type: MediaType) -> Self {
        Self {
            bytes: bytes.into(),
            media_type,
        }
    }

    /// Build an asset from a declared MIME type string.
    pub fn from_mime(bytes: impl Into<Arc<[u8]>>, mime: &str) -> Result<Self> {
        let media_type = MediaType::from_mime(mime).ok_or_else(|| {
            ConvertError::UnsupportedOperation(format!("unsupported input type '{mime}'"))
        })?;
        Ok(Self::new(bytes, media_type))
    }

    /// Read a file, declaring its type from the extension.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let media_type = path
            .extension()
            .and_then(|ext| ext.to_str())
            .and_then(MediaType::from_extension)
            .ok_or_else(|| {
                ConvertError::UnsupportedOperation(format!(
                    "cannot determine file type of {}",
                    path.display()
                ))
            })?;
        let bytes = std::fs::read(path)?;
        Ok(Self::new(bytes, media_type))
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn media_type(&self) -> MediaType {
        self.media_type
    }

    pub fn mime_type(&self) -> &'static str {
        self.media_type.mime_type()
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// One produced file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionResult {
    pub bytes: Vec<u8>,
    pub media_type: MediaType,
}

impl ConversionResult {
    pub fn new(bytes: Vec<u8>, media_type: MediaType) -> Self {
        Self { bytes, media_type }
    }

    pub fn mime_type(&self) -> &'static str {
        self.media_type.mime_type()
    }

    pub fn extension(&self) -> &'static str {
        self.media_type.extension()
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Download name: `converted_<stem>.<ext>`, or
    /// `converted_<stem>_page<N>.<ext>` for the N-th (1-based) page.
    pub fn file_name(&self, stem: &str, page: Option<usize>) -> String {
        match page {
            Some(n) => format!("converted_{stem}_page{n}.{}", self.extension()),
            None => format!("converted_{stem}.{}", self.extension()),
        }
    }
}

/// What a dispatch call hands back.
#[derive(Debug)]
pub enum ConversionOutput {
    /// Every operation except PDF page extraction.
    Single(ConversionResult),
    /// One result per page in page order. `failure` holds the first page that
    /// could not be rendered; pages before it are still present.
    Pages {
        pages: Vec<ConversionResult>,
        failure: Option<ConvertError>,
    },
}

impl ConversionOutput {
    pub fn results(&self) -> &[ConversionResult] {
        match self {
            Self::Single(result) => std::slice::from_ref(result),
            Self::Pages { pages, .. } => pages,
        }
    }

    pub fn into_results(self) -> Vec<ConversionResult> {
        match self {
            Self::Single(result) => vec![result],
            Self::Pages { pages, .. } => pages,
        }
    }

    pub fn failure(&self) -> Option<&ConvertError> {
        match self {
            Self::Single(_) => None,
            Self::Pages { failure, .. } => failure.as_ref(),
        }
    }

    /// Combined byte length of every produced file.
    pub fn total_len(&self) -> usize {
        self.results().iter().map(ConversionResult::len).sum()
    }
}
