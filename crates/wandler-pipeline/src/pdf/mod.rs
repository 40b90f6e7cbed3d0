// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PDF module: wrapping JPEGs into PDFs and rasterising PDF pages.

pub mod reader;
pub mod render;
pub mod writer;

pub use reader::{PageExtraction, PdfReader, extract_pages};
pub use render::RenderOptions;
pub use writer::{JpegPage, PdfWriter};
