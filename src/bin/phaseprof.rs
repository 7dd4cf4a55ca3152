//! phaseprof - Command-line interface for Phase Profiler
//!
//! Commands:
//! - analyze: Process trace files into one summary table (batch mode)
//! - noise: Characterize the sleep noise floor of one trace
//! - compare: Compare energy, power or time across experiment configurations
//! - sections: Print the section names and the pin layout they are decoded from

use clap::{Parser, Subcommand, ValueEnum};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::info;
use tracing_subscriber::EnvFilter;

use phase_profiler::config::DEFAULT_SYSTEM_BUCKETS;
use phase_profiler::summary::{Metric, SummaryTable, DEFAULT_COMPARE_SECTIONS};
use phase_profiler::{
    AnalyzerConfig, BatchDriver, BatchOptions, NoiseAnalyzer, Phase, ProfileError, SampleDecoder,
    SleepPolicy, PRODUCER_NAME, PROFILER_VERSION,
};

/// phaseprof - Per-phase current statistics for embedded power traces
#[derive(Parser)]
#[command(name = "phaseprof")]
#[command(version = PROFILER_VERSION)]
#[command(about = "Segment power traces into firmware phases and aggregate their current", long_about = None)]
struct Cli {
    /// Log debug detail to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Process trace files into one summary table (batch mode)
    Analyze {
        /// Trace file or directory of trace files (repeatable)
        #[arg(short, long = "path", required = true)]
        paths: Vec<PathBuf>,

        /// Summary table to write
        #[arg(short, long)]
        output: PathBuf,

        /// Replace the output file if it already exists
        #[arg(long)]
        overwrite: bool,

        /// Analyzer configuration (JSON)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Sleep threshold in µA, overrides the configuration
        #[arg(long)]
        sleep_threshold: Option<f64>,

        /// Split system activity into current buckets
        #[arg(long)]
        bucketed: bool,

        /// Worker threads
        #[arg(short, long, default_value = "1")]
        jobs: usize,

        /// Write a JSON batch report to this file
        #[arg(long)]
        report: Option<PathBuf>,
    },

    /// Characterize the sleep noise floor of one trace
    Noise {
        /// Trace file
        path: PathBuf,

        /// Output file (stdout if omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Replace the output file if it already exists
        #[arg(long)]
        overwrite: bool,

        /// Analyzer configuration (JSON), for its pin layout
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Compare energy, power or time across experiment configurations
    Compare {
        /// Summary table written by `analyze`
        summary: PathBuf,

        /// Metric to compare
        #[arg(long, value_enum, default_value = "energy")]
        metric: MetricArg,

        /// Section to include (repeatable; defaults to total and the four firmware phases)
        #[arg(long = "section")]
        sections: Vec<String>,

        /// Supply voltage in mV
        #[arg(long)]
        supply_mv: Option<f64>,

        /// Analyzer configuration (JSON), for its supply voltage
        #[arg(long)]
        config: Option<PathBuf>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the section names and the pin layout they are decoded from
    Sections {
        /// Analyzer configuration (JSON)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum MetricArg {
    /// Joules
    Energy,
    /// Watts
    Power,
    /// Seconds
    Time,
}

impl From<MetricArg> for Metric {
    fn from(arg: MetricArg) -> Self {
        match arg {
            MetricArg::Energy => Metric::Energy,
            MetricArg::Power => Metric::Power,
            MetricArg::Time => Metric::Time,
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!(
                "{}",
                serde_json::to_string(&CliError::from(e)).unwrap_or_else(|_| "Unknown error".to_string())
            );
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_ansi(atty::is(atty::Stream::Stderr))
        .with_target(false)
        .init();
}

fn run(cli: Cli) -> Result<(), PhaseCliError> {
    match cli.command {
        Commands::Analyze {
            paths,
            output,
            overwrite,
            config,
            sleep_threshold,
            bucketed,
            jobs,
            report,
        } => {
            let mut config = load_config(config.as_deref())?;
            if let Some(threshold) = sleep_threshold {
                config = config.with_sleep_threshold(threshold);
            }
            if bucketed && config.sleep_policy.bucket_edges().is_none() {
                config = config.with_sleep_policy(SleepPolicy::bucketed_default());
            }
            config.validate()?;

            cmd_analyze(
                &paths,
                &output,
                config,
                BatchOptions { overwrite, jobs },
                report.as_deref(),
            )
        }

        Commands::Noise {
            path,
            output,
            overwrite,
            config,
        } => {
            let config = load_config(config.as_deref())?;
            cmd_noise(&path, output.as_deref(), overwrite, config)
        }

        Commands::Compare {
            summary,
            metric,
            sections,
            supply_mv,
            config,
            json,
        } => {
            let config = load_config(config.as_deref())?;
            let supply_mv = supply_mv.unwrap_or(config.supply_voltage_mv);
            if !(supply_mv.is_finite() && supply_mv > 0.0) {
                return Err(ProfileError::InvalidConfig(format!(
                    "supply voltage must be positive, got {supply_mv}"
                ))
                .into());
            }
            cmd_compare(&summary, metric.into(), sections, supply_mv, json)
        }

        Commands::Sections { config, json } => {
            let config = load_config(config.as_deref())?;
            cmd_sections(&config, json)
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<AnalyzerConfig, PhaseCliError> {
    match path {
        Some(path) => {
            info!("Loading configuration from {}", path.display());
            Ok(AnalyzerConfig::from_path(path)?)
        }
        None => Ok(AnalyzerConfig::default()),
    }
}

fn cmd_analyze(
    paths: &[PathBuf],
    output: &Path,
    config: AnalyzerConfig,
    options: BatchOptions,
    report_path: Option<&Path>,
) -> Result<(), PhaseCliError> {
    let driver = BatchDriver::new(config, options);
    let report = driver.run(paths, output)?;

    info!(
        "Wrote {}: {} traces succeeded, {} failed",
        output.display(),
        report.succeeded.len(),
        report.failed.len()
    );

    if let Some(report_path) = report_path {
        fs::write(report_path, report.to_json()?)?;
    }

    if report.is_success() {
        Ok(())
    } else {
        Err(PhaseCliError::TracesFailed(report.failed.len()))
    }
}

fn cmd_noise(
    path: &Path,
    output: Option<&Path>,
    overwrite: bool,
    config: AnalyzerConfig,
) -> Result<(), PhaseCliError> {
    if let Some(output) = output {
        if output.exists() && !overwrite {
            return Err(ProfileError::OutputConflict(output.to_path_buf()).into());
        }
    }

    let analyzer = NoiseAnalyzer::new(SampleDecoder::new(config.pin_layout));
    let stats = analyzer.analyze_path(path)?;
    let csv = stats.to_csv();

    match output {
        Some(output) => fs::write(output, csv)?,
        None => {
            let mut stdout = io::stdout();
            stdout.write_all(csv.as_bytes())?;
            stdout.flush()?;
        }
    }

    info!(
        "Noise floor of {}: {:.3} ± {:.3} µA over {} samples",
        path.display(),
        stats.average_current,
        stats.standard_deviation,
        stats.sample_count
    );
    Ok(())
}

fn cmd_compare(
    summary: &Path,
    metric: Metric,
    sections: Vec<String>,
    supply_mv: f64,
    json: bool,
) -> Result<(), PhaseCliError> {
    let table = SummaryTable::from_path(summary)?;
    if table.is_empty() {
        return Err(PhaseCliError::EmptySummary);
    }

    let sections = if sections.is_empty() {
        DEFAULT_COMPARE_SECTIONS.iter().map(|s| s.to_string()).collect()
    } else {
        sections
    };

    let comparison = table.compare(metric, supply_mv, &sections);
    if json {
        println!("{}", comparison.to_json()?);
    } else {
        print!("{}", comparison.to_text());
    }
    Ok(())
}

fn cmd_sections(config: &AnalyzerConfig, json: bool) -> Result<(), PhaseCliError> {
    let layout = &config.pin_layout;
    let sections: Vec<SectionInfo> = std::iter::once(SectionInfo {
        name: "total".to_string(),
        description: "every qualifying sample".to_string(),
    })
    .chain(Phase::ALL.iter().map(|phase| SectionInfo {
        name: phase.as_str().to_string(),
        description: describe_phase(*phase, config.sleep_threshold),
    }))
    .collect();

    if json {
        let report = SectionsReport {
            producer: PRODUCER_NAME.to_string(),
            version: PROFILER_VERSION.to_string(),
            sections,
            pin_layout: serde_json::to_value(layout)?,
            sleep_policy: serde_json::to_value(&config.sleep_policy)?,
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("Sections");
    println!("========");
    for section in &sections {
        println!("  {:<8} {}", section.name, section.description);
    }
    if let Some(edges) = config.sleep_policy.bucket_edges() {
        let names: Vec<String> = edges.iter().map(|e| format!("system_{e}")).collect();
        println!("  {} system_over", names.join(" "));
    } else {
        let names: Vec<String> = DEFAULT_SYSTEM_BUCKETS.iter().map(|e| format!("system_{e}")).collect();
        println!("  (with --bucketed: {} system_over)", names.join(" "));
    }

    println!();
    println!("Pin layout (minimum width {})", layout.min_width());
    println!("==========");
    println!("  modem    bit {}", layout.modem_pin);
    println!(
        "  health   bits {}..{} (running {:?}, finished {:?})",
        layout.health_start, layout.health_end, layout.running_code, layout.finished_code
    );
    println!("  main     bit {}", layout.main_pin);
    println!("  phase    bits {}..{}", layout.phase_start, layout.phase_end);
    Ok(())
}

fn describe_phase(phase: Phase, threshold: f64) -> String {
    match phase {
        Phase::Setup => "phase bits 00".to_string(),
        Phase::Compute => "phase bits 01".to_string(),
        Phase::Send => "phase bits 10".to_string(),
        Phase::Sleep => format!("phase bits 11, modem off, current <= {threshold} µA"),
        Phase::Modem => "phase bits 11, modem on".to_string(),
        Phase::SystemActivity => format!("phase bits 11, modem off, current > {threshold} µA"),
    }
}

// Error types

#[derive(Debug)]
enum PhaseCliError {
    Io(io::Error),
    Profile(ProfileError),
    Json(serde_json::Error),
    TracesFailed(usize),
    EmptySummary,
}

impl From<io::Error> for PhaseCliError {
    fn from(e: io::Error) -> Self {
        PhaseCliError::Io(e)
    }
}

impl From<ProfileError> for PhaseCliError {
    fn from(e: ProfileError) -> Self {
        PhaseCliError::Profile(e)
    }
}

impl From<serde_json::Error> for PhaseCliError {
    fn from(e: serde_json::Error) -> Self {
        PhaseCliError::Json(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<PhaseCliError> for CliError {
    fn from(e: PhaseCliError) -> Self {
        match e {
            PhaseCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            PhaseCliError::Profile(e) => profile_error(e),
            PhaseCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check JSON syntax".to_string()),
            },
            PhaseCliError::TracesFailed(count) => CliError {
                code: "TRACES_FAILED".to_string(),
                message: format!("{count} traces could not be processed"),
                hint: Some("Pass --report to see which traces failed and why".to_string()),
            },
            PhaseCliError::EmptySummary => CliError {
                code: "EMPTY_SUMMARY".to_string(),
                message: "Summary table contains no rows".to_string(),
                hint: Some("Run 'phaseprof analyze' first".to_string()),
            },
        }
    }
}

fn profile_error(e: ProfileError) -> CliError {
    let (code, hint) = match &e {
        ProfileError::OutputConflict(_) => ("OUTPUT_CONFLICT", "Pass --overwrite or choose another output path"),
        ProfileError::InvalidConfig(_) => ("INVALID_CONFIG", "Run 'phaseprof sections' to inspect the active configuration"),
        ProfileError::SummaryParse { .. } => ("SUMMARY_PARSE_ERROR", "Ensure the file was written by 'phaseprof analyze'"),
        ProfileError::JsonError(_) => ("JSON_ERROR", "Check JSON syntax"),
        ProfileError::SummaryIo { .. } => ("SUMMARY_IO_ERROR", "Check the summary path and permissions"),
        e if e.is_recoverable() => ("RECORD_ERROR", "Check the trace format"),
        e if e.is_trace_error() => ("TRACE_ERROR", "Check file paths and permissions"),
        _ => ("IO_ERROR", "Check file paths and permissions"),
    };
    CliError {
        code: code.to_string(),
        message: e.to_string(),
        hint: Some(hint.to_string()),
    }
}

// Report types

#[derive(serde::Serialize)]
struct SectionsReport {
    producer: String,
    version: String,
    sections: Vec<SectionInfo>,
    pin_layout: serde_json::Value,
    sleep_policy: serde_json::Value,
}

#[derive(serde::Serialize)]
struct SectionInfo {
    name: String,
    description: String,
}
