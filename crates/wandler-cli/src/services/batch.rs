// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Batch conversion: runs one conversion per input file on the blocking
// thread pool, writes the outputs, and records usage statistics.
//
// Conversions run concurrently; statistics are recorded afterwards on the
// calling task, one file at a time, so the store sees no concurrent writers.
// Inputs sharing a file stem get numbered output names so no output
// overwrites another from the same batch.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::task::JoinSet;
use tracing::{debug, error, info, instrument, warn};
use wandler_core::{
    ConversionOperation, ConversionOutput, ConvertError, Result, SourceAsset, StatisticsStore,
};
use wandler_pipeline::Converter;

/// What happened to one input file.
#[derive(Debug)]
pub struct FileOutcome {
    pub source: PathBuf,
    pub original_len: u64,
    /// Files written, in page order for PDF extraction.
    pub written: Vec<PathBuf>,
    /// Combined size of everything written.
    pub output_len: u64,
    /// Whole-file failure, or the failing page of a partial extraction.
    pub error: Option<ConvertError>,
}

impl FileOutcome {
    fn failed(source: PathBuf, original_len: u64, error: ConvertError) -> Self {
        Self {
            source,
            original_len,
            written: Vec::new(),
            output_len: 0,
            error: Some(error),
        }
    }

    /// At least one output file was produced.
    pub fn succeeded(&self) -> bool {
        !self.written.is_empty()
    }
}

/// Shared conversion front-end: a converter plus the statistics store.
#[derive(Clone)]
pub struct ConversionService {
    converter: Arc<Converter>,
    stats: Arc<dyn StatisticsStore>,
}

impl ConversionService {
    pub fn new(converter: Converter, stats: Arc<dyn StatisticsStore>) -> Self {
        Self {
            converter: Arc::new(converter),
            stats,
        }
    }

    /// Convert every file in `paths` with `operation`, writing results into
    /// `out_dir`. Outcomes are returned in input order.
    #[instrument(
        skip(self, paths),
        fields(files = paths.len(), op = %operation, out = %out_dir.display())
    )]
    pub async fn convert_files(
        &self,
        paths: Vec<PathBuf>,
        operation: ConversionOperation,
        out_dir: &Path,
    ) -> Result<Vec<FileOutcome>> {
        let limit = self.converter.config().max_batch_files;
        if paths.len() > limit {
            return Err(ConvertError::Config(format!(
                "at most {limit} files can be converted at once, got {}",
                paths.len()
            )));
        }
        std::fs::create_dir_all(out_dir)?;

        let stems = output_stems(&paths);
        let mut tasks = JoinSet::new();
        for (index, (path, stem)) in paths.iter().cloned().zip(stems).enumerate() {
            let converter = Arc::clone(&self.converter);
            let out_dir = out_dir.to_path_buf();
            tasks.spawn_blocking(move || {
                (index, convert_one(&converter, path, &stem, operation, &out_dir))
            });
        }

        let mut slots: Vec<Option<FileOutcome>> = paths.iter().map(|_| None).collect();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, outcome)) => slots[index] = Some(outcome),
                Err(err) => error!(%err, "Conversion task did not complete"),
            }
        }

        let outcomes: Vec<FileOutcome> = slots
            .into_iter()
            .zip(paths)
            .map(|(slot, path)| {
                slot.unwrap_or_else(|| {
                    FileOutcome::failed(
                        path,
                        0,
                        ConvertError::Io(std::io::Error::other("conversion task aborted")),
                    )
                })
            })
            .collect();

        for outcome in outcomes.iter().filter(|outcome| outcome.succeeded()) {
            if let Err(err) = self
                .stats
                .record_conversion(outcome.original_len, outcome.output_len)
            {
                warn!(%err, "Could not record usage statistics");
            }
        }

        let succeeded = outcomes.iter().filter(|o| o.succeeded()).count();
        info!(succeeded, failed = outcomes.len() - succeeded, "Batch finished");
        Ok(outcomes)
    }
}

/// One output stem per input. Repeats of a stem (ignoring case) become
/// `<stem>_2`, `<stem>_3` and so on, in input order.
fn output_stems(paths: &[PathBuf]) -> Vec<String> {
    let mut taken = HashSet::new();
    paths
        .iter()
        .map(|path| {
            let stem = path
                .file_stem()
                .map(|stem| stem.to_string_lossy().into_owned())
                .unwrap_or_else(|| "file".into());
            let mut candidate = stem.clone();
            let mut counter = 2;
            while !taken.insert(candidate.to_lowercase()) {
                candidate = format!("{stem}_{counter}");
                counter += 1;
            }
            if candidate != stem {
                debug!(path = %path.display(), stem = %candidate, "Renamed to avoid a clash");
            }
            candidate
        })
        .collect()
}

/// Read, convert and write one file. Never panics on bad input.
fn convert_one(
    converter: &Converter,
    path: PathBuf,
    stem: &str,
    operation: ConversionOperation,
    out_dir: &Path,
) -> FileOutcome {
    let asset = match SourceAsset::from_path(&path) {
        Ok(asset) => asset,
        Err(err) => return FileOutcome::failed(path, 0, err),
    };
    let original_len = asset.len() as u64;

    let output = match converter.convert(&asset, operation) {
        Ok(output) => output,
        Err(err) => {
            warn!(path = %path.display(), kind = err.kind(), %err, "Conversion failed");
            return FileOutcome::failed(path, original_len, err);
        }
    };

    let (results, page_failure, paged) = match output {
        ConversionOutput::Single(result) => (vec![result], None, false),
        ConversionOutput::Pages { pages, failure } => (pages, failure, true),
    };

    let mut outcome = FileOutcome {
        source: path,
        original_len,
        written: Vec::with_capacity(results.len()),
        output_len: 0,
        error: page_failure,
    };

    for (index, result) in results.iter().enumerate() {
        let page = paged.then_some(index + 1);
        let target = out_dir.join(result.file_name(stem, page));
        if let Err(err) = std::fs::write(&target, &result.bytes) {
            warn!(path = %target.display(), %err, "Could not write output");
            outcome.error = Some(err.into());
            break;
        }
        debug!(path = %target.display(), bytes = result.len(), "Output written");
        outcome.output_len += result.len() as u64;
        outcome.written.push(target);
    }

    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::codecs::jpeg::JpegEncoder;
    use image::{Rgb, RgbImage};
    use wandler_core::{MemoryStore, PipelineConfig};

    fn write_jpeg(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        let mut buffer = Vec::new();
        RgbImage::from_fn(48, 32, |x, y| Rgb([x as u8 * 5, y as u8 * 7, 90]))
            .write_with_encoder(JpegEncoder::new_with_quality(&mut buffer, 90))
            .unwrap();
        std::fs::write(&path, buffer).unwrap();
        path
    }

    fn service(store: Arc<MemoryStore>, config: PipelineConfig) -> ConversionService {
        ConversionService::new(Converter::new(config), store)
    }

    #[tokio::test]
    async fn converts_in_input_order_and_records_stats() {
        let dir = tempfile::tempdir().unwrap();
        let inputs = vec![write_jpeg(dir.path(), "a.jpg"), write_jpeg(dir.path(), "b.jpg")];
        let out = dir.path().join("out");
        let store = Arc::new(MemoryStore::default());

        let outcomes = service(Arc::clone(&store), PipelineConfig::default())
            .convert_files(inputs, ConversionOperation::JpgToPng, &out)
            .await
            .unwrap();

        assert_eq!(outcomes.len(), 2);
        assert_eq!(outcomes[0].written, vec![out.join("converted_a.png")]);
        assert_eq!(outcomes[1].written, vec![out.join("converted_b.png")]);
        assert!(out.join("converted_a.png").is_file());
        assert_eq!(store.load().unwrap().images_converted, 2);
    }

    #[tokio::test]
    async fn failures_are_reported_not_counted() {
        let dir = tempfile::tempdir().unwrap();
        let good = write_jpeg(dir.path(), "good.jpg");
        let bad = dir.path().join("bad.jpg");
        std::fs::write(&bad, b"not an image").unwrap();
        let store = Arc::new(MemoryStore::default());

        let outcomes = service(Arc::clone(&store), PipelineConfig::default())
            .convert_files(vec![bad, good], ConversionOperation::JpgToWebp, dir.path())
            .await
            .unwrap();

        assert!(matches!(outcomes[0].error, Some(ConvertError::Decode(_))));
        assert!(outcomes[1].succeeded());
        assert_eq!(store.load().unwrap().images_converted, 1);
    }

    #[tokio::test]
    async fn pdf_pages_get_numbered_names() {
        let dir = tempfile::tempdir().unwrap();
        let jpeg = write_jpeg(dir.path(), "scan.jpg");
        let store = Arc::new(MemoryStore::default());
        let service = service(store, PipelineConfig::default());

        service
            .convert_files(vec![jpeg], ConversionOperation::ToPdf, dir.path())
            .await
            .unwrap();
        let pdf = dir.path().join("converted_scan.pdf");
        assert!(pdf.is_file());

        let outcomes = service
            .convert_files(vec![pdf], ConversionOperation::PdfToPng, dir.path())
            .await
            .unwrap();
        assert_eq!(
            outcomes[0].written,
            vec![dir.path().join("converted_converted_scan_page1.png")]
        );
    }

    #[tokio::test]
    async fn same_named_inputs_do_not_overwrite_each_other() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("one")).unwrap();
        std::fs::create_dir_all(dir.path().join("two")).unwrap();
        let first = write_jpeg(&dir.path().join("one"), "photo.jpg");
        let second = write_jpeg(&dir.path().join("two"), "photo.jpg");
        let third = write_jpeg(&dir.path().join("two"), "PHOTO.jpeg");
        let out = dir.path().join("out");
        let store = Arc::new(MemoryStore::default());

        let outcomes = service(Arc::clone(&store), PipelineConfig::default())
            .convert_files(vec![first, second, third], ConversionOperation::JpgToPng, &out)
            .await
            .unwrap();

        let written: Vec<_> = outcomes.iter().flat_map(|o| o.written.clone()).collect();
        assert_eq!(
            written,
            vec![
                out.join("converted_photo.png"),
                out.join("converted_photo_2.png"),
                out.join("converted_PHOTO_3.png"),
            ]
        );
        assert!(written.iter().all(|path| path.is_file()));
        assert_eq!(store.load().unwrap().images_converted, 3);
    }

    #[test]
    fn stems_are_numbered_past_existing_suffixes() {
        let paths = [
            PathBuf::from("a/photo.jpg"),
            PathBuf::from("b/photo_2.jpg"),
            PathBuf::from("c/photo.jpg"),
        ];
        assert_eq!(output_stems(&paths), ["photo", "photo_2", "photo_3"]);
    }

    #[tokio::test]
    async fn batch_limit_is_enforced() {
        let config = PipelineConfig {
            max_batch_files: 1,
            ..PipelineConfig::default()
        };
        let err = service(Arc::new(MemoryStore::default()), config)
            .convert_files(
                vec![PathBuf::from("a.jpg"), PathBuf::from("b.jpg")],
                ConversionOperation::JpgToPng,
                Path::new("unused"),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ConvertError::Config(_)));
    }
}
