// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Usage statistics: images converted and bytes saved across sessions.
//
// The pipeline never touches these counters. Front-ends load them on read and
// write them back after each successful conversion.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::error::{ConvertError, Result};
use crate::size::{format_bytes, format_count};

/// Persisted counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UsageStatistics {
    pub images_converted: u64,
    pub bytes_processed: u64,
    pub bytes_saved: u64,
    pub last_updated: Option<DateTime<Utc>>,
}

/// Display strings for the statistics bar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormattedStatistics {
    pub images_converted: String,
    pub data_saved: String,
}

impl UsageStatistics {
    /// Account for one successful conversion. Growth never counts as
    /// negative savings.
    pub fn record(&mut self, original_size: u64, converted_size: u64) {
        self.images_converted += 1;
        self.bytes_processed = self.bytes_processed.saturating_add(original_size);
        self.bytes_saved = self
            .bytes_saved
            .saturating_add(original_size.saturating_sub(converted_size));
        self.last_updated = Some(Utc::now());
    }

    pub fn formatted(&self) -> FormattedStatistics {
        FormattedStatistics {
            images_converted: format_count(self.images_converted),
            data_saved: format_bytes(self.bytes_saved),
        }
    }
}

/// Where statistics live between sessions.
pub trait StatisticsStore: Send + Sync {
    /// Current counters; zeroed if nothing has been stored yet.
    fn load(&self) -> Result<UsageStatistics>;

    fn save(&self, stats: &UsageStatistics) -> Result<()>;

    /// Load, record one conversion, write back, and return the new counters.
    fn record_conversion(
        &self,
        original_size: u64,
        converted_size: u64,
    ) -> Result<UsageStatistics> {
        let mut stats = self.load()?;
        stats.record(original_size, converted_size);
        self.save(&stats)?;
        Ok(stats)
    }

    fn reset(&self) -> Result<()> {
        self.save(&UsageStatistics::default())
    }
}

/// JSON file on disk.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl StatisticsStore for JsonFileStore {
    #[instrument(skip(self), fields(path = %self.path.display()))]
    fn load(&self) -> Result<UsageStatistics> {
        match std::fs::read_to_string(&self.path) {
            Ok(raw) => Ok(serde_json::from_str(&raw)?),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                debug!("No statistics file yet");
                Ok(UsageStatistics::default())
            }
            Err(err) => Err(err.into()),
        }
    }

    #[instrument(skip(self, stats), fields(path = %self.path.display()))]
    fn save(&self, stats: &UsageStatistics) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(stats)?;
        std::fs::write(&self.path, json)?;
        debug!(images = stats.images_converted, "Statistics written");
        Ok(())
    }
}

/// In-process store, for tests and front-ends without persistence.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<UsageStatistics>,
}

impl StatisticsStore for MemoryStore {
    fn load(&self) -> Result<UsageStatistics> {
        self.inner
            .lock()
            .map(|stats| stats.clone())
            .map_err(|_| poisoned())
    }

    fn save(&self, stats: &UsageStatistics) -> Result<()> {
        let mut guard = self
            .inner
            .lock()
            .map_err(|_| poisoned())?;
        *guard = stats.clone();
        Ok(())
    }
}

/// A writer panicked mid-update; the counters can no longer be trusted.
fn poisoned() -> ConvertError {
    ConvertError::Io(std::io::Error::other("statistics lock poisoned"))
}
