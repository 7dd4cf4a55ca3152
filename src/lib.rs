//! Phase Profiler - per-phase current statistics for embedded power traces
//!
//! A trace is a CSV capture of `timestamp, current, pin_state` samples taken
//! from a power analyzer while the firmware under test signals its execution
//! phase on GPIO pins. Each trace flows through a deterministic streaming
//! pipeline: decode → classify → aggregate → emit, producing one summary block
//! per trace.
//!
//! ## Modules
//!
//! - **Core pipeline**: [`decoder`], [`classifier`], [`aggregator`], [`emitter`]
//! - **Batch driver**: [`pipeline`] processes many traces into one summary table
//! - **Noise analysis**: [`noise`] characterizes the sleep noise floor
//! - **Summary analysis**: [`summary`] reads summary tables back and compares
//!   energy, power and time across experiment configurations

pub mod aggregator;
pub mod classifier;
pub mod config;
pub mod decoder;
pub mod emitter;
pub mod error;
pub mod noise;
pub mod pipeline;
pub mod summary;
pub mod types;

pub use aggregator::{PhaseTotals, StreamingAggregator};
pub use classifier::{Classification, PhaseClassifier};
pub use config::{AnalyzerConfig, PinLayout, SleepPolicy};
pub use decoder::SampleDecoder;
pub use emitter::{SummaryEmitter, SUMMARY_HEADER};
pub use error::ProfileError;
pub use noise::{NoiseAnalyzer, NoiseStats};
pub use pipeline::{process_trace, BatchDriver, BatchOptions, BatchReport, TraceProcessor};
pub use types::{DecodedSample, Phase, PhaseAccumulator, RawSample, Section, TraceSummaryRecord};

/// Version recorded in batch reports
pub const PROFILER_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name recorded in batch reports
pub const PRODUCER_NAME: &str = "phase-profiler";
