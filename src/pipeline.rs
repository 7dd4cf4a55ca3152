//! Pipeline orchestration
//!
//! This module provides the public API for Phase Profiler. It runs each trace
//! through decode → classify → aggregate → emit, and drives batches of traces
//! into one cumulative summary table.

use crate::aggregator::StreamingAggregator;
use crate::classifier::{Classification, PhaseClassifier};
use crate::config::AnalyzerConfig;
use crate::decoder::{trace_lines, SampleDecoder};
use crate::emitter::{SummaryEmitter, SUMMARY_HEADER};
use crate::error::ProfileError;
use crate::types::TraceSummaryRecord;
use crate::{PRODUCER_NAME, PROFILER_VERSION};
use chrono::Utc;
use serde::Serialize;
use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Process one trace file with the default configuration.
///
/// # Returns
/// Seven summary records: total first, then the six phases in canonical order
///
/// # Example
/// ```ignore
/// let records = process_trace(Path::new("traces/tls_10_256B.csv"))?;
/// ```
pub fn process_trace(path: &Path) -> Result<Vec<TraceSummaryRecord>, ProfileError> {
    TraceProcessor::default()
        .process_path(path)
        .map(|summary| summary.records)
}

/// Label of a trace: the file name up to its first `.`
pub fn trace_label(path: &Path) -> String {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let stem = name.split('.').next().unwrap_or_default();
    if stem.contains(',') {
        warn!("Trace label {stem:?} contains commas, replacing them with '_'");
        stem.replace(',', "_")
    } else {
        stem.to_string()
    }
}

/// Line-level bookkeeping for one trace
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TraceStats {
    /// Data lines read, header excluded
    pub lines_read: usize,
    pub malformed: usize,
    /// Samples rejected by the running/main gate
    pub excluded: usize,
    pub unclassified: usize,
}

/// Result of processing one trace
#[derive(Debug, Clone)]
pub struct TraceSummary {
    pub label: String,
    pub path: PathBuf,
    pub records: Vec<TraceSummaryRecord>,
    pub stats: TraceStats,
}

/// Stateless per-trace processor; every trace gets a fresh aggregator
#[derive(Debug, Clone, Default)]
pub struct TraceProcessor {
    decoder: SampleDecoder,
    classifier: PhaseClassifier,
    bucket_edges: Option<Vec<f64>>,
}

impl TraceProcessor {
    pub fn new(config: &AnalyzerConfig) -> Self {
        Self {
            decoder: SampleDecoder::new(config.pin_layout.clone()),
            classifier: PhaseClassifier::new(config.sleep_threshold),
            bucket_edges: config.sleep_policy.bucket_edges().map(<[f64]>::to_vec),
        }
    }

    /// Run a trace from any line source. The first line is the header and is discarded.
    pub fn process_reader<R: BufRead>(
        &self,
        label: &str,
        reader: R,
    ) -> Result<(Vec<TraceSummaryRecord>, TraceStats), ProfileError> {
        let mut aggregator = match &self.bucket_edges {
            Some(edges) => StreamingAggregator::with_system_buckets(edges),
            None => StreamingAggregator::new(),
        };
        let mut stats = TraceStats::default();

        for entry in trace_lines(reader) {
            let (line_no, line) = entry?;
            if line_no == 1 {
                debug!("{label}: header {:?}", line.as_deref().map(str::trim));
                continue;
            }
            if line.as_deref().is_ok_and(|l| l.trim().is_empty()) {
                continue;
            }
            stats.lines_read += 1;

            let decoded = line.and_then(|line| self.decoder.decode_line(&line, line_no));
            let sample = match decoded {
                Ok(sample) => sample,
                Err(e) => {
                    warn!("{label}: {e}");
                    stats.malformed += 1;
                    continue;
                }
            };

            let classification = self.classifier.classify(&sample);
            match classification {
                Classification::Excluded => stats.excluded += 1,
                Classification::Unclassified => {
                    let e = ProfileError::UnclassifiablePhase {
                        line: line_no,
                        bits: sample.phase_bits.clone(),
                    };
                    warn!("{label}: {e}");
                    stats.unclassified += 1;
                }
                Classification::Phase(_) => {}
            }
            aggregator.ingest(&sample, classification);
        }

        let totals = aggregator.finish();
        Ok((SummaryEmitter::emit(label, &totals), stats))
    }

    /// Run one trace file
    pub fn process_path(&self, path: &Path) -> Result<TraceSummary, ProfileError> {
        if !path.exists() {
            return Err(ProfileError::TraceNotFound(path.to_path_buf()));
        }
        if !path.is_file() {
            return Err(ProfileError::NotAFile(path.to_path_buf()));
        }

        let file = File::open(path).map_err(|source| ProfileError::TraceIo {
            path: path.to_path_buf(),
            source,
        })?;

        let label = trace_label(path);
        let (records, stats) = self
            .process_reader(&label, BufReader::new(file))
            .map_err(|e| match e {
                ProfileError::Io(source) => ProfileError::TraceIo {
                    path: path.to_path_buf(),
                    source,
                },
                other => other,
            })?;

        Ok(TraceSummary {
            label,
            path: path.to_path_buf(),
            records,
            stats,
        })
    }
}

/// Batch-level switches
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchOptions {
    /// Replace an existing output file instead of refusing to run
    pub overwrite: bool,
    /// Worker threads for trace processing; 1 runs inline
    pub jobs: usize,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            overwrite: false,
            jobs: 1,
        }
    }
}

/// Inputs after directory expansion
#[derive(Debug, Default)]
pub struct ResolvedInputs {
    /// Trace files in processing order
    pub files: Vec<PathBuf>,
    /// Paths that could not be turned into trace files
    pub failures: Vec<(PathBuf, ProfileError)>,
}

/// Expand directories into their trace files, keeping argument order.
///
/// Files inside one directory are sorted by name.
pub fn resolve_inputs(paths: &[PathBuf], extension: &str) -> ResolvedInputs {
    let mut resolved = ResolvedInputs::default();

    for path in paths {
        if path.is_dir() {
            match scan_directory(path, extension) {
                Ok(mut files) => {
                    debug!("{} expanded to {} trace files", path.display(), files.len());
                    resolved.files.append(&mut files);
                }
                Err(e) => resolved.failures.push((path.clone(), e)),
            }
        } else if path.is_file() {
            resolved.files.push(path.clone());
        } else if path.exists() {
            resolved
                .failures
                .push((path.clone(), ProfileError::NotAFile(path.clone())));
        } else {
            resolved
                .failures
                .push((path.clone(), ProfileError::TraceNotFound(path.clone())));
        }
    }

    resolved
}

fn scan_directory(dir: &Path, extension: &str) -> Result<Vec<PathBuf>, ProfileError> {
    let scan_error = |source| ProfileError::DirectoryScan {
        path: dir.to_path_buf(),
        source,
    };

    let mut files = Vec::new();
    for entry in fs::read_dir(dir).map_err(scan_error)? {
        let path = entry.map_err(scan_error)?.path();
        let matches = path
            .extension()
            .is_some_and(|ext| ext.to_string_lossy() == extension);
        if path.is_file() && matches {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Producer metadata attached to batch reports
#[derive(Debug, Clone, Serialize)]
pub struct Producer {
    pub name: String,
    pub version: String,
    pub instance_id: String,
}

/// A trace that made it into the output
#[derive(Debug, Clone, Serialize)]
pub struct TraceOutcome {
    pub label: String,
    pub path: PathBuf,
    pub records: usize,
    #[serde(flatten)]
    pub stats: TraceStats,
}

/// A trace that was aborted
#[derive(Debug, Clone, Serialize)]
pub struct TraceFailure {
    pub path: PathBuf,
    pub error: String,
}

/// What happened during one batch run
#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub producer: Producer,
    pub computed_at_utc: String,
    pub succeeded: Vec<TraceOutcome>,
    pub failed: Vec<TraceFailure>,
}

impl BatchReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn to_json(&self) -> Result<String, ProfileError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Batch driver: many traces, one summary table
pub struct BatchDriver {
    config: AnalyzerConfig,
    processor: TraceProcessor,
    options: BatchOptions,
    instance_id: String,
}

impl Default for BatchDriver {
    fn default() -> Self {
        Self::new(AnalyzerConfig::default(), BatchOptions::default())
    }
}

impl BatchDriver {
    pub fn new(config: AnalyzerConfig, options: BatchOptions) -> Self {
        Self {
            processor: TraceProcessor::new(&config),
            config,
            options,
            instance_id: Uuid::new_v4().to_string(),
        }
    }

    /// Write the summary table for `inputs` to `output`.
    ///
    /// Fails with [`ProfileError::OutputConflict`] before reading any trace when
    /// the output exists and overwriting was not requested. Inputs are resolved
    /// before the output is opened, and the output itself is never read back as
    /// a trace. Per-trace failures are collected in the report instead.
    pub fn run(&self, inputs: &[PathBuf], output: &Path) -> Result<BatchReport, ProfileError> {
        if output.exists() && !self.options.overwrite {
            return Err(ProfileError::OutputConflict(output.to_path_buf()));
        }

        let mut resolved = resolve_inputs(inputs, &self.config.trace_extension);
        if let Ok(target) = fs::canonicalize(output) {
            resolved.files.retain(|path| {
                let is_output = fs::canonicalize(path).is_ok_and(|p| p == target);
                if is_output {
                    warn!("Skipping {}: it is the output file", path.display());
                }
                !is_output
            });
        }

        let file = File::create(output)?;
        let mut sink = BufWriter::new(file);
        let report = self.write_batch(resolved, &mut sink)?;
        sink.flush()?;
        Ok(report)
    }

    /// Write the summary table to any sink. The header is written once; each
    /// trace's rows go out as one contiguous block, in input order.
    pub fn run_to_writer<W: Write>(
        &self,
        inputs: &[PathBuf],
        sink: &mut W,
    ) -> Result<BatchReport, ProfileError> {
        let resolved = resolve_inputs(inputs, &self.config.trace_extension);
        self.write_batch(resolved, sink)
    }

    fn write_batch<W: Write>(
        &self,
        resolved: ResolvedInputs,
        sink: &mut W,
    ) -> Result<BatchReport, ProfileError> {
        let mut failed: Vec<TraceFailure> = resolved
            .failures
            .into_iter()
            .map(|(path, e)| {
                warn!("{e}");
                TraceFailure {
                    path,
                    error: e.to_string(),
                }
            })
            .collect();

        info!("Processing {} trace files", resolved.files.len());
        let results = self.process_all(&resolved.files);

        writeln!(sink, "{SUMMARY_HEADER}")?;

        let total = results.len();
        let mut succeeded = Vec::new();
        for (index, (path, result)) in resolved.files.iter().zip(results).enumerate() {
            match result {
                Ok(summary) => {
                    sink.write_all(SummaryEmitter::render_block(&summary.records).as_bytes())?;
                    info!(
                        "Completed {}: {:.0}% complete",
                        path.display(),
                        (index + 1) as f64 / total as f64 * 100.0
                    );
                    succeeded.push(TraceOutcome {
                        label: summary.label,
                        path: summary.path,
                        records: summary.records.len(),
                        stats: summary.stats,
                    });
                }
                Err(e) => {
                    warn!("{e}");
                    failed.push(TraceFailure {
                        path: path.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }

        Ok(BatchReport {
            producer: Producer {
                name: PRODUCER_NAME.to_string(),
                version: PROFILER_VERSION.to_string(),
                instance_id: self.instance_id.clone(),
            },
            computed_at_utc: Utc::now().to_rfc3339(),
            succeeded,
            failed,
        })
    }

    /// Process traces, inline or on scoped workers; results keep input order
    fn process_all(&self, files: &[PathBuf]) -> Vec<Result<TraceSummary, ProfileError>> {
        let jobs = self.options.jobs.max(1).min(files.len().max(1));
        if jobs == 1 {
            return files
                .iter()
                .map(|path| self.processor.process_path(path))
                .collect();
        }

        let chunk_size = files.len().div_ceil(jobs);
        let processor = &self.processor;
        std::thread::scope(|scope| {
            let handles: Vec<_> = files
                .chunks(chunk_size)
                .map(|chunk| {
                    scope.spawn(move || {
                        chunk
                            .iter()
                            .map(|path| processor.process_path(path))
                            .collect::<Vec<_>>()
                    })
                })
                .collect();

            handles
                .into_iter()
                .flat_map(|handle| match handle.join() {
                    Ok(results) => results,
                    Err(payload) => std::panic::resume_unwind(payload),
                })
                .collect()
        })
    }
}
