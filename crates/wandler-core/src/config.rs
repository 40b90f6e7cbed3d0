// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Pipeline configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{ConvertError, Result};
use crate::types::Quality;

/// Tunable pipeline settings. Every field has a default, so a partial JSON
/// file only overrides what it names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Longest allowed output edge in pixels.
    pub max_dimension: u32,
    /// Quality for straight format conversion.
    pub convert_quality: f32,
    /// Quality for `REDUCE_SIZE`.
    pub reduce_quality: f32,
    /// JPEG quality for images wrapped into a PDF.
    pub document_quality: f32,
    /// Upscale factor applied when rasterising PDF pages.
    pub page_render_scale: f32,
    /// Largest rendered page edge in pixels. Larger pages render at a
    /// reduced scale.
    pub max_render_edge: u32,
    /// Maximum number of files a batch conversion accepts.
    pub max_batch_files: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_dimension: 2048,
            convert_quality: Quality::CONVERT.value(),
            reduce_quality: Quality::REDUCE.value(),
            document_quality: Quality::CONVERT.value(),
            page_render_scale: 2.0,
            max_render_edge: 4096,
            max_batch_files: 20,
        }
    }
}

impl PipelineConfig {
    /// Load and validate a JSON configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&raw)?;
        config.validate()?;
        info!(path = %path.display(), "Loaded pipeline configuration");
        Ok(config)
    }

    /// Write the configuration as pretty-printed JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path.as_ref(), json)?;
        debug!(path = %path.as_ref().display(), "Saved pipeline configuration");
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_dimension == 0 {
            return Err(ConvertError::Config("max_dimension must be positive".into()));
        }
        for (name, value) in [
            ("convert_quality", self.convert_quality),
            ("reduce_quality", self.reduce_quality),
            ("document_quality", self.document_quality),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConvertError::Config(format!(
                    "{name} must be within [0, 1], got {value}"
                )));
            }
        }
        if !(self.page_render_scale.is_finite() && self.page_render_scale > 0.0) {
            return Err(ConvertError::Config(format!(
                "page_render_scale must be positive, got {}",
                self.page_render_scale
            )));
        }
        if self.max_render_edge == 0 {
            return Err(ConvertError::Config("max_render_edge must be positive".into()));
        }
        if self.max_batch_files == 0 {
            return Err(ConvertError::Config("max_batch_files must be positive".into()));
        }
        Ok(())
    }

    pub fn convert_quality(&self) -> Quality {
        Quality::new(self.convert_quality)
    }

    pub fn reduce_quality(&self) -> Quality {
        Quality::new(self.reduce_quality)
    }

    pub fn document_quality(&self) -> Quality {
        Quality::new(self.document_quality)
    }
}
