// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Output size estimation: a multiplicative guess shown before a conversion
// runs. Advisory only; never fails.

use std::fmt;

use wandler_core::{ConversionOperation, format_bytes};

const MIB: u64 = 1024 * 1024;

/// Supplies the multiplier applied to an input length for an operation.
pub trait EstimatePolicy: Send + Sync {
    fn multiplier(&self, operation: ConversionOperation, input_len: u64) -> f64;
}

/// Built-in multipliers.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultEstimatePolicy;

impl EstimatePolicy for DefaultEstimatePolicy {
    fn multiplier(&self, operation: ConversionOperation, input_len: u64) -> f64 {
        use ConversionOperation::*;
        match operation {
            JpgToPng => 1.02,
            PngToJpg => 0.95,
            JpgToWebp | PngToWebp => 0.8,
            WebpToJpg => 1.1,
            WebpToPng => 1.15,
            HeicToJpg => 1.2,
            HeicToPng => 1.3,
            ToPdf => 1.01,
            ReduceSize if input_len > 5 * MIB => 0.5,
            ReduceSize if input_len > MIB => 0.6,
            ReduceSize => 0.7,
            JpgToHeic | PngToHeic | PdfToJpg | PdfToPng => 1.0,
        }
    }
}

/// An approximate output size. Displays with a `~` prefix so it is never
/// mistaken for a measured size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct EstimatedSize {
    pub bytes: u64,
}

impl fmt::Display for EstimatedSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.bytes == 0 {
            f.write_str("0 Bytes")
        } else {
            write!(f, "~{}", format_bytes(self.bytes))
        }
    }
}

/// Applies an [`EstimatePolicy`] to input lengths.
#[derive(Debug, Clone, Default)]
pub struct SizeEstimator<P = DefaultEstimatePolicy> {
    policy: P,
}

impl SizeEstimator {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<P: EstimatePolicy> SizeEstimator<P> {
    pub fn with_policy(policy: P) -> Self {
        Self { policy }
    }

    pub fn estimate(&self, input_len: u64, operation: ConversionOperation) -> EstimatedSize {
        let multiplier = self.policy.multiplier(operation, input_len);
        EstimatedSize {
            bytes: (input_len as f64 * multiplier).round() as u64,
        }
    }

    /// Like [`SizeEstimator::estimate`], for a raw tag. Unknown tags keep the
    /// input length.
    pub fn estimate_tag(&self, input_len: u64, tag: &str) -> EstimatedSize {
        match tag.parse::<ConversionOperation>() {
            Ok(operation) => self.estimate(input_len, operation),
            Err(_) => EstimatedSize { bytes: input_len },
        }
    }
}

/// Estimate with the built-in multipliers.
pub fn estimate(input_len: u64, operation: ConversionOperation) -> EstimatedSize {
    SizeEstimator::new().estimate(input_len, operation)
}
