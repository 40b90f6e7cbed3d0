// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Wandler: Core types, errors, configuration and usage statistics shared
// across all crates.

pub mod config;
pub mod error;
pub mod human_errors;
pub mod size;
pub mod statistics;
pub mod types;

pub use config::PipelineConfig;
pub use error::{ConvertError, Result};
pub use size::{format_bytes, format_count};
pub use statistics::{JsonFileStore, MemoryStore, StatisticsStore, UsageStatistics};
pub use types::*;
