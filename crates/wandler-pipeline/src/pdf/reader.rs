// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PDF reader: open an existing PDF with `lopdf` and turn its pages into
// raster images, one per page, in page order.

use lopdf::{Document, ObjectId};
use tracing::{debug, info, instrument, warn};
use wandler_core::{ConvertError, MediaType, Quality, Result};

use super::render::{RenderOptions, render_page};
use crate::raster::{EncodedImage, ImageCodec, PixelSurface, RasterCodec};

/// Pages produced by an extraction, plus the first page failure if any.
///
/// Pages before the failing one are kept; nothing after it is attempted.
#[derive(Debug, Default)]
pub struct PageExtraction {
    pub pages: Vec<EncodedImage>,
    pub failure: Option<ConvertError>,
}

impl PageExtraction {
    pub fn is_complete(&self) -> bool {
        self.failure.is_none()
    }
}

/// Reads an existing PDF and rasterises its pages.
pub struct PdfReader {
    /// The underlying lopdf document.
    document: Document,
    /// Page object ids in page order.
    page_ids: Vec<ObjectId>,
}

impl PdfReader {
    /// Create a reader from raw PDF bytes already in memory.
    #[instrument(skip_all, fields(bytes_len = data.len()))]
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let document = Document::load_mem(data).map_err(|err| {
            ConvertError::DocumentFormat(format!("failed to load PDF: {err}"))
        })?;

        if document.trailer.get(b"Encrypt").is_ok() {
            return Err(ConvertError::DocumentFormat(
                "encrypted PDFs are not supported".into(),
            ));
        }

        // lopdf pages are keyed by 1-indexed page number, already sorted.
        let page_ids: Vec<ObjectId> = document.get_pages().into_values().collect();
        if page_ids.is_empty() {
            return Err(ConvertError::DocumentFormat("PDF has no pages".into()));
        }

        debug!(pages = page_ids.len(), "PDF loaded from bytes");
        Ok(Self { document, page_ids })
    }

    /// Number of pages in the document.
    pub fn page_count(&self) -> usize {
        self.page_ids.len()
    }

    /// Rasterise one page (0-indexed).
    pub fn render_page(&self, page_index: usize, options: &RenderOptions) -> Result<PixelSurface> {
        let page_id = *self.page_ids.get(page_index).ok_or_else(|| ConvertError::PageRender {
            page_index,
            reason: format!("document has only {} pages", self.page_ids.len()),
        })?;
        render_page(&self.document, page_id, page_index, options)
    }

    /// Lazily rasterise every page in order. Each call starts a fresh pass.
    pub fn render_pages<'a>(
        &'a self,
        options: &'a RenderOptions,
    ) -> impl Iterator<Item = Result<PixelSurface>> + 'a {
        (0..self.page_ids.len()).map(move |index| self.render_page(index, options))
    }

    /// Rasterise and encode every page, stopping at the first failure.
    #[instrument(skip(self, codec, options), fields(pages = self.page_count(), target = %target))]
    pub fn extract_pages(
        &self,
        codec: &dyn RasterCodec,
        target: MediaType,
        quality: Quality,
        options: &RenderOptions,
    ) -> PageExtraction {
        let mut extraction = PageExtraction::default();

        for (index, rendered) in self.render_pages(options).enumerate() {
            let encoded = rendered.and_then(|surface| {
                codec.encode(surface, target, quality).map_err(|err| match err {
                    ConvertError::PageRender { .. } => err,
                    other => ConvertError::PageRender {
                        page_index: index,
                        reason: other.to_string(),
                    },
                })
            });

            match encoded {
                Ok(page) => extraction.pages.push(page),
                Err(err) => {
                    warn!(page_index = index, %err, "Page extraction stopped");
                    extraction.failure = Some(err);
                    break;
                }
            }
        }

        info!(
            extracted = extraction.pages.len(),
            complete = extraction.is_complete(),
            "Page extraction finished"
        );
        extraction
    }
}

/// Extract every page of `data` as PNG at the default render scale.
pub fn extract_pages(data: &[u8]) -> Result<PageExtraction> {
    let reader = PdfReader::from_bytes(data)?;
    Ok(reader.extract_pages(
        &ImageCodec::default(),
        MediaType::Png,
        Quality::LOSSLESS,
        &RenderOptions::default(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdf::writer::{JpegPage, PdfWriter};
    use image::codecs::jpeg::JpegEncoder;
    use image::{Rgb, RgbImage};
    use lopdf::Object;
    use wandler_core::Dimensions;

    fn jpeg(width: u32, height: u32, colour: [u8; 3]) -> Vec<u8> {
        let mut buffer = Vec::new();
        RgbImage::from_pixel(width, height, Rgb(colour))
            .write_with_encoder(JpegEncoder::new_with_quality(&mut buffer, 95))
            .unwrap();
        buffer
    }

    fn three_page_pdf() -> Vec<u8> {
        let red = jpeg(20, 10, [220, 20, 20]);
        let green = jpeg(30, 10, [20, 220, 20]);
        let blue = jpeg(40, 10, [20, 20, 220]);
        let pages: Vec<JpegPage<'_>> = [(&red, 20), (&green, 30), (&blue, 40)]
            .into_iter()
            .map(|(bytes, width)| JpegPage {
                bytes,
                dimensions: Dimensions { width, height: 10 },
            })
            .collect();
        PdfWriter::new().from_jpeg_pages(&pages).unwrap()
    }

    /// Replace the image stream drawn on `page_number` (1-indexed) with junk.
    fn corrupt_page_image(pdf: &[u8], page_number: u32) -> Vec<u8> {
        let mut doc = Document::load_mem(pdf).unwrap();
        let page_id = doc.get_pages()[&page_number];
        let image_id = doc
            .get_dictionary(page_id)
            .unwrap()
            .get(b"Resources")
            .and_then(Object::as_dict)
            .and_then(|resources| resources.get(b"XObject"))
            .and_then(Object::as_dict)
            .and_then(|xobjects| xobjects.get(b"Im0"))
            .and_then(Object::as_reference)
            .unwrap();
        if let Ok(Object::Stream(stream)) = doc.get_object_mut(image_id) {
            stream.set_content(b"this is not a jpeg".to_vec());
        }
        let mut out = Vec::new();
        doc.save_to(&mut out).unwrap();
        out
    }

    #[test]
    fn garbage_is_document_format_error() {
        assert!(matches!(
            PdfReader::from_bytes(b"not a pdf at all"),
            Err(ConvertError::DocumentFormat(_))
        ));
    }

    #[test]
    fn pages_come_back_in_order() {
        let extraction = extract_pages(&three_page_pdf()).unwrap();
        assert!(extraction.is_complete());
        assert_eq!(extraction.pages.len(), 3);

        // Rendered at 2x, so widths are 40, 60, 80.
        let widths: Vec<u32> = extraction.pages.iter().map(|p| p.dimensions.width).collect();
        assert_eq!(widths, vec![40, 60, 80]);
        assert!(extraction.pages.iter().all(|p| p.media_type == MediaType::Png));

        let first = image::load_from_memory(&extraction.pages[0].bytes).unwrap().to_rgb8();
        let Rgb([r, g, b]) = *first.get_pixel(20, 10);
        assert!(r > 180 && g < 80 && b < 80);
    }

    #[test]
    fn render_pages_is_restartable() {
        let reader = PdfReader::from_bytes(&three_page_pdf()).unwrap();
        let options = RenderOptions::default();
        assert_eq!(reader.render_pages(&options).count(), 3);
        assert_eq!(reader.render_pages(&options).filter(|page| page.is_ok()).count(), 3);
    }

    #[test]
    fn corrupt_page_keeps_earlier_pages() {
        let pdf = corrupt_page_image(&three_page_pdf(), 3);
        let extraction = extract_pages(&pdf).unwrap();

        assert_eq!(extraction.pages.len(), 2);
        assert!(matches!(
            extraction.failure,
            Some(ConvertError::PageRender { page_index: 2, .. })
        ));
    }

    #[test]
    fn corrupt_middle_page_stops_there() {
        let pdf = corrupt_page_image(&three_page_pdf(), 2);
        let extraction = extract_pages(&pdf).unwrap();
        assert_eq!(extraction.pages.len(), 1);
        assert!(matches!(
            extraction.failure,
            Some(ConvertError::PageRender { page_index: 1, .. })
        ));
    }

    #[test]
    fn out_of_range_page_is_render_error() {
        let reader = PdfReader::from_bytes(&three_page_pdf()).unwrap();
        assert!(matches!(
            reader.render_page(7, &RenderOptions::default()),
            Err(ConvertError::PageRender { page_index: 7, .. })
        ));
    }
}
