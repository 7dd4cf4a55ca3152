//! End-to-end batch runs through the public API

use phase_profiler::summary::{Metric, SummaryTable};
use phase_profiler::{
    AnalyzerConfig, BatchDriver, BatchOptions, ProfileError, SleepPolicy, SUMMARY_HEADER,
};
use pretty_assertions::assert_eq;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const TRACE: &str = "\
Timestamp(ms),Current(uA),D0-D7
0,100,00010100
1,120,00010100
2,5,00010110
3,200000,00010111
4,3,00010111
";

fn write_trace(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, TRACE).unwrap();
    path
}

#[test]
fn directory_batch_produces_one_block_per_trace() {
    let dir = TempDir::new().unwrap();
    let traces = dir.path().join("traces");
    fs::create_dir(&traces).unwrap();
    write_trace(&traces, "tls_20_256B.csv");
    write_trace(&traces, "tls_10_256B.csv");
    fs::write(traces.join("notes.txt"), "not a trace").unwrap();
    let output = dir.path().join("summary.csv");

    let report = BatchDriver::default().run(&[traces], &output).unwrap();
    assert!(report.is_success());
    assert_eq!(report.succeeded.len(), 2);

    let text = fs::read_to_string(&output).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 15);
    assert_eq!(lines[0], SUMMARY_HEADER);
    assert_eq!(
        lines[1..8].to_vec(),
        vec![
            "tls_10_256B,total,5,40045.6,200228,4",
            "tls_10_256B,setup,2,110,220,1",
            "tls_10_256B,compute,0,0,0,0",
            "tls_10_256B,send,1,5,5,0",
            "tls_10_256B,sleep,1,3,3,0",
            "tls_10_256B,modem,0,0,0,0",
            "tls_10_256B,system,1,200000,200000,0",
        ]
    );
    assert!(lines[8].starts_with("tls_20_256B,total,"));
}

#[test]
fn missing_inputs_are_reported_and_header_still_written() {
    let dir = TempDir::new().unwrap();
    let output = dir.path().join("summary.csv");

    let report = BatchDriver::default()
        .run(&[dir.path().join("absent.csv")], &output)
        .unwrap();
    assert!(!report.is_success());
    assert_eq!(report.failed.len(), 1);
    assert_eq!(
        fs::read_to_string(&output).unwrap(),
        format!("{SUMMARY_HEADER}\n")
    );

    let err = BatchDriver::default()
        .run(&[dir.path().join("absent.csv")], &output)
        .unwrap_err();
    assert!(matches!(err, ProfileError::OutputConflict(_)));
}

#[test]
fn summary_round_trips_into_comparison() {
    let dir = TempDir::new().unwrap();
    let inputs = vec![
        write_trace(dir.path(), "tls_20_256B.csv"),
        write_trace(dir.path(), "no_tls_10_256B.csv"),
    ];
    let output = dir.path().join("summary.csv");
    let config = AnalyzerConfig::default().with_sleep_policy(SleepPolicy::bucketed_default());
    let options = BatchOptions {
        overwrite: false,
        jobs: 2,
    };

    BatchDriver::new(config, options).run(&inputs, &output).unwrap();

    let table = SummaryTable::from_path(&output).unwrap();
    assert_eq!(table.labels(), &["tls_20_256B".to_string(), "no_tls_10_256B".to_string()]);
    assert_eq!(table.get("tls_20_256B", "system_over").unwrap().sample_count, 1);

    let sections = vec!["total".to_string(), "setup".to_string()];
    let comparison = table.compare(Metric::Time, 3700.0, &sections);
    let order: Vec<&str> = comparison.rows.iter().map(|r| r.label.as_str()).collect();
    assert_eq!(order, vec!["no_tls_10_256B", "tls_20_256B"]);
    assert_eq!(comparison.rows[0].values, vec![Some(0.004), Some(0.001)]);
}
