// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PDF writer: wrap JPEG images into a PDF document using `lopdf`.
//
// Each image becomes one page whose MediaBox equals the image's pixel size,
// with the JPEG stream embedded as-is (DCTDecode) and drawn edge to edge.

use lopdf::content::{Content, Operation};
use lopdf::{Document, Object, Stream, dictionary};
use tracing::{debug, info, instrument};
use wandler_core::{ConvertError, Dimensions, Result};

/// One page worth of JPEG data.
#[derive(Debug, Clone, Copy)]
pub struct JpegPage<'a> {
    pub bytes: &'a [u8],
    pub dimensions: Dimensions,
}

/// Builds PDF documents from JPEG images.
#[derive(Debug, Clone)]
pub struct PdfWriter {
    /// Title metadata embedded in the PDF /Info dictionary.
    title: Option<String>,
}

impl Default for PdfWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl PdfWriter {
    pub fn new() -> Self {
        Self { title: None }
    }

    /// Set a title for the PDF metadata.
    pub fn set_title(&mut self, title: impl Into<String>) {
        self.title = Some(title.into());
    }

    /// Wrap a single JPEG into a one-page PDF.
    pub fn wrap_single_page(&self, jpeg: &[u8], width: u32, height: u32) -> Result<Vec<u8>> {
        let dimensions = Dimensions::new(width, height).ok_or_else(|| {
            ConvertError::Encode(format!("cannot wrap a {width}x{height} image into a PDF"))
        })?;
        self.from_jpeg_pages(&[JpegPage {
            bytes: jpeg,
            dimensions,
        }])
    }

    /// Create a PDF with one page per JPEG, in the order given.
    #[instrument(skip(self, pages), fields(page_count = pages.len()))]
    pub fn from_jpeg_pages(&self, pages: &[JpegPage<'_>]) -> Result<Vec<u8>> {
        if pages.is_empty() {
            return Err(ConvertError::Encode("a PDF needs at least one page".into()));
        }

        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let mut kids = Vec::with_capacity(pages.len());

        for (index, page) in pages.iter().enumerate() {
            if !page.bytes.starts_with(&[0xFF, 0xD8]) {
                return Err(ConvertError::Encode(format!(
                    "page {index} is not JPEG data"
                )));
            }

            let Dimensions { width, height } = page.dimensions;
            let image_id = doc.add_object(Stream::new(
                dictionary! {
                    "Type" => "XObject",
                    "Subtype" => "Image",
                    "Width" => width as i64,
                    "Height" => height as i64,
                    "ColorSpace" => "DeviceRGB",
                    "BitsPerComponent" => 8,
                    "Filter" => "DCTDecode",
                },
                page.bytes.to_vec(),
            ));

            let content = Content {
                operations: vec![
                    Operation::new("q", vec![]),
                    Operation::new(
                        "cm",
                        vec![
                            (width as i64).into(),
                            0.into(),
                            0.into(),
                            (height as i64).into(),
                            0.into(),
                            0.into(),
                        ],
                    ),
                    Operation::new("Do", vec![Object::Name(b"Im0".to_vec())]),
                    Operation::new("Q", vec![]),
                ],
            };
            let encoded = content.encode().map_err(|err| {
                ConvertError::Encode(format!("failed to encode page content: {err}"))
            })?;
            let content_id = doc.add_object(Stream::new(dictionary! {}, encoded));

            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "MediaBox" => vec![
                    0.into(),
                    0.into(),
                    (width as i64).into(),
                    (height as i64).into(),
                ],
                "Resources" => dictionary! {
                    "XObject" => dictionary! { "Im0" => image_id },
                },
                "Contents" => content_id,
            });
            kids.push(Object::Reference(page_id));
        }

        let count = kids.len() as i64;
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
            }),
        );

        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        if let Some(title) = &self.title {
            let info_id = doc.add_object(dictionary! {
                "Title" => Object::string_literal(title.as_str()),
                "Producer" => Object::string_literal("Wandler"),
            });
            doc.trailer.set("Info", info_id);
        }

        let mut output = Vec::new();
        doc.save_to(&mut output)
            .map_err(|err| ConvertError::Encode(format!("failed to serialise PDF: {err}")))?;

        info!(pages = count, output_bytes = output.len(), "PDF created");
        debug!(first_page = %pages[0].dimensions, "MediaBox of first page");
        Ok(output)
    }
}
