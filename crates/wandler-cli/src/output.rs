// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Terminal output formatting. Every function returns lines so the layout can
// be tested without capturing stdout.

use std::path::Path;

use wandler_core::human_errors::humanize_error;
use wandler_core::{
    ConversionOperation, ConvertError, OperationGroup, UsageStatistics, format_bytes,
};
use wandler_pipeline::EstimatedSize;

use crate::services::batch::FileOutcome;

/// Operation picker, grouped by source format.
pub fn format_operations() -> Vec<String> {
    let mut lines = Vec::new();
    for group in OperationGroup::ALL {
        let operations: Vec<ConversionOperation> = ConversionOperation::ALL
            .into_iter()
            .filter(|operation| operation.group() == group)
            .collect();
        if operations.is_empty() {
            continue;
        }
        lines.push(group.label().to_string());
        for operation in operations {
            lines.push(format!(
                "    {:<12} {:<15} {}",
                operation.as_str(),
                operation.label(),
                operation.description()
            ));
        }
    }
    lines
}

pub fn format_estimate(path: &Path, input_len: u64, estimate: EstimatedSize) -> String {
    format!(
        "{}  {} → {}",
        path.display(),
        format_bytes(input_len),
        estimate
    )
}

/// Result block for one converted file. Sizes here are exact.
pub fn format_outcome(outcome: &FileOutcome) -> Vec<String> {
    let mut lines = vec![format!(
        "{} ({})",
        outcome.source.display(),
        format_bytes(outcome.original_len)
    )];
    for written in &outcome.written {
        lines.push(format!("    → {}", written.display()));
    }
    if outcome.succeeded() {
        lines.push(format!("    Output size: {}", format_bytes(outcome.output_len)));
    }
    if let Some(err) = &outcome.error {
        lines.extend(format_error(err));
    }
    lines
}

pub fn format_error(err: &ConvertError) -> Vec<String> {
    let human = humanize_error(err);
    vec![
        format!("    Error: {}", human.message),
        format!("    {}", human.suggestion),
    ]
}

pub fn format_statistics(stats: &UsageStatistics) -> Vec<String> {
    let formatted = stats.formatted();
    let mut lines = vec![
        format!("Images converted: {}", formatted.images_converted),
        format!("Data saved:       {}", formatted.data_saved),
    ];
    if let Some(updated) = stats.last_updated {
        lines.push(format!("Last conversion:  {}", updated.format("%Y-%m-%d %H:%M UTC")));
    }
    lines
}
