// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Conversion dispatcher. Maps every operation tag to one of four paths:
//
//   transcode        decode → clamp → encode(target)
//   reduce size      decode → clamp → encode(source format, lower quality)
//   wrap as PDF      decode → clamp → encode(JPEG) → single-page PDF
//   extract pages    render each PDF page → encode(target)
//
// The dispatcher holds no mutable state; calls on different assets may run
// concurrently from any thread.

use std::sync::Arc;

use tracing::{info, instrument, warn};
use wandler_core::{
    ConversionOperation, ConversionOutput, ConversionResult, MediaType, OperationKind,
    PipelineConfig, Quality, Result, SourceAsset,
};

use crate::dimensions::DimensionPolicy;
use crate::pdf::{PdfReader, PdfWriter, RenderOptions};
use crate::raster::{EncodedImage, ImageCodec, RasterCodec};

/// Runs conversions with a raster backend and a configuration.
#[derive(Clone)]
pub struct Converter {
    codec: Arc<dyn RasterCodec>,
    config: PipelineConfig,
}

impl Default for Converter {
    fn default() -> Self {
        Self::new(PipelineConfig::default())
    }
}

impl std::fmt::Debug for Converter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Converter")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Converter {
    /// Converter backed by [`ImageCodec`] with the configured dimension bound.
    pub fn new(config: PipelineConfig) -> Self {
        let codec = ImageCodec::new(DimensionPolicy::new(config.max_dimension));
        Self::with_codec(Arc::new(codec), config)
    }

    /// Converter with a caller-supplied raster backend.
    pub fn with_codec(codec: Arc<dyn RasterCodec>, config: PipelineConfig) -> Self {
        Self { codec, config }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Apply `operation` to `source`.
    ///
    /// Fails with [`wandler_core::ConvertError::UnsupportedOperation`] when the operation
    /// does not start from the source's media type. Page extraction returns
    /// the pages rendered before a failing page together with that failure;
    /// only a failure on the very first page is returned as an error.
    #[instrument(
        skip(self, source),
        fields(op = %operation, source = %source.media_type(), bytes_len = source.len())
    )]
    pub fn convert(
        &self,
        source: &SourceAsset,
        operation: ConversionOperation,
    ) -> Result<ConversionOutput> {
        operation.check_source(source.media_type())?;
        info!("Starting conversion");

        let output = match operation.kind() {
            OperationKind::Transcode { to, .. } => {
                let encoded = self.reencode(source, to, self.config.convert_quality())?;
                ConversionOutput::Single(into_result(encoded))
            }
            OperationKind::ReduceSize => {
                let encoded =
                    self.reencode(source, source.media_type(), self.config.reduce_quality())?;
                ConversionOutput::Single(into_result(encoded))
            }
            OperationKind::WrapAsDocument => {
                let jpeg =
                    self.reencode(source, MediaType::Jpeg, self.config.document_quality())?;
                let pdf = PdfWriter::new().wrap_single_page(
                    &jpeg.bytes,
                    jpeg.dimensions.width,
                    jpeg.dimensions.height,
                )?;
                ConversionOutput::Single(ConversionResult::new(pdf, MediaType::Pdf))
            }
            OperationKind::ExtractPages { to } => self.extract(source, to)?,
        };

        info!(
            outputs = output.results().len(),
            output_bytes = output.total_len(),
            "Conversion finished"
        );
        Ok(output)
    }

    fn reencode(
        &self,
        source: &SourceAsset,
        target: MediaType,
        quality: Quality,
    ) -> Result<EncodedImage> {
        let surface = self.codec.decode(source.bytes(), source.media_type())?;
        self.codec.encode(surface, target, quality)
    }

    fn extract(&self, source: &SourceAsset, target: MediaType) -> Result<ConversionOutput> {
        // PNG pages stay lossless; JPEG pages use the conversion quality.
        let quality = match target {
            MediaType::Png => Quality::LOSSLESS,
            _ => self.config.convert_quality(),
        };
        let options = RenderOptions {
            scale: self.config.page_render_scale,
            // Never rasterise much beyond what the dimension policy keeps.
            max_edge: self
                .config
                .max_render_edge
                .min(self.config.max_dimension.saturating_mul(2)),
        };

        let reader = PdfReader::from_bytes(source.bytes())?;
        let extraction = reader.extract_pages(self.codec.as_ref(), target, quality, &options);

        match extraction.failure {
            Some(failure) if extraction.pages.is_empty() => Err(failure),
            failure => {
                if let Some(err) = &failure {
                    warn!(
                        pages = extraction.pages.len(),
                        total = reader.page_count(),
                        %err,
                        "Returning partial page extraction"
                    );
                }
                Ok(ConversionOutput::Pages {
                    pages: extraction.pages.into_iter().map(into_result).collect(),
                    failure,
                })
            }
        }
    }
}

/// Convert with the default configuration.
pub fn convert(source: &SourceAsset, operation: ConversionOperation) -> Result<ConversionOutput> {
    Converter::default().convert(source, operation)
}

fn into_result(encoded: EncodedImage) -> ConversionResult {
    ConversionResult::new(encoded.bytes, encoded.media_type)
}
