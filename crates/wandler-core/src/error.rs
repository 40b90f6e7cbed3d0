// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for Wandler.

use thiserror::Error;

use crate::types::MediaType;

/// Top-level error type for all conversion operations.
#[derive(Debug, Error)]
pub enum ConvertError {
    // -- Pipeline errors --
    /// Input bytes are not a valid image of the declared type, or the surface
    /// could not be allocated.
    #[error("failed to decode image: {0}")]
    Decode(String),

    /// Target format unsupported, or the encoder produced no data.
    #[error("failed to encode image: {0}")]
    Encode(String),

    /// The format's codec was compiled out of this build.
    #[error("{0} support is not enabled in this build")]
    FormatNotEnabled(MediaType),

    /// Input is not a well-formed PDF container.
    #[error("malformed document: {0}")]
    DocumentFormat(String),

    /// One page of a multi-page extraction could not be rasterised.
    #[error("failed to render page {page_index}: {reason}")]
    PageRender { page_index: usize, reason: String },

    /// Operation does not apply to the asset, or the tag is unknown.
    #[error("unsupported operation: {0}")]
    UnsupportedOperation(String),

    // -- Configuration / persistence --
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ConvertError {
    /// Short machine-friendly name of the error class, used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Decode(_) => "decode",
            Self::Encode(_) => "encode",
            Self::FormatNotEnabled(_) => "format-not-enabled",
            Self::DocumentFormat(_) => "document-format",
            Self::PageRender { .. } => "page-render",
            Self::UnsupportedOperation(_) => "unsupported-operation",
            Self::Config(_) => "config",
            Self::Io(_) => "io",
            Self::Serialization(_) => "serialization",
        }
    }
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, ConvertError>;
