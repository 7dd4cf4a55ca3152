//! Sleep-noise analysis
//!
//! Characterizes the current drawn while the application reports itself as
//! running, independent of the main bit. Used to pick a sleep threshold: the
//! mean plus three standard deviations bounds the noise floor of a trace that
//! only sleeps.

use crate::decoder::{trace_lines, SampleDecoder};
use crate::error::ProfileError;
use crate::types::Health;
use serde::Serialize;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use tracing::warn;

/// Header row of the noise report
pub const NOISE_HEADER: &str =
    "runtime,sample_count,total_current,average_current,variance,standard_deviation,upper_bound";

/// Running statistics (Welford), population variance
#[derive(Debug, Clone, Copy, Default)]
struct RunningStats {
    n: u64,
    mean: f64,
    m2: f64,
}

impl RunningStats {
    fn update(&mut self, x: f64) {
        self.n += 1;
        let delta = x - self.mean;
        self.mean += delta / self.n as f64;
        self.m2 += delta * (x - self.mean);
    }

    fn variance(&self) -> f64 {
        if self.n == 0 {
            0.0
        } else {
            self.m2 / self.n as f64
        }
    }
}

/// Noise statistics of one trace
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct NoiseStats {
    /// Σ deltas between consecutive running samples (ms)
    pub runtime: f64,
    pub sample_count: u64,
    pub total_current: f64,
    pub average_current: f64,
    pub variance: f64,
    pub standard_deviation: f64,
    /// `average_current + 3σ`
    pub upper_bound: f64,
}

impl NoiseStats {
    /// Header plus one data row
    pub fn to_csv(&self) -> String {
        format!(
            "{NOISE_HEADER}\n{},{},{},{},{},{},{}\n",
            self.runtime,
            self.sample_count,
            self.total_current,
            self.average_current,
            self.variance,
            self.standard_deviation,
            self.upper_bound
        )
    }
}

/// Noise analyzer over running samples
#[derive(Debug, Clone, Default)]
pub struct NoiseAnalyzer {
    decoder: SampleDecoder,
}

impl NoiseAnalyzer {
    pub fn new(decoder: SampleDecoder) -> Self {
        Self { decoder }
    }

    pub fn analyze_reader<R: BufRead>(&self, reader: R) -> Result<NoiseStats, ProfileError> {
        let mut stats = RunningStats::default();
        let mut total_current = 0.0;
        let mut runtime = 0.0;
        let mut previous_timestamp: Option<f64> = None;

        for entry in trace_lines(reader).skip(1) {
            let (line_no, line) = entry?;
            if line.as_deref().is_ok_and(|l| l.trim().is_empty()) {
                continue;
            }
            let decoded = line.and_then(|line| self.decoder.decode_line(&line, line_no));
            let sample = match decoded {
                Ok(sample) => sample,
                Err(e) => {
                    warn!("{e}");
                    continue;
                }
            };

            if sample.health != Health::Running {
                previous_timestamp = None;
                continue;
            }

            if let Some(previous) = previous_timestamp {
                runtime += sample.timestamp - previous;
            }
            previous_timestamp = Some(sample.timestamp);
            total_current += sample.current;
            stats.update(sample.current);
        }

        let variance = stats.variance();
        let standard_deviation = variance.sqrt();
        Ok(NoiseStats {
            runtime,
            sample_count: stats.n,
            total_current,
            average_current: stats.mean,
            variance,
            standard_deviation,
            upper_bound: stats.mean + 3.0 * standard_deviation,
        })
    }

    pub fn analyze_path(&self, path: &Path) -> Result<NoiseStats, ProfileError> {
        if !path.is_file() {
            return Err(if path.exists() {
                ProfileError::NotAFile(path.to_path_buf())
            } else {
                ProfileError::TraceNotFound(path.to_path_buf())
            });
        }
        let io_error = |source| ProfileError::TraceIo {
            path: path.to_path_buf(),
            source,
        };
        let file = File::open(path).map_err(io_error)?;
        self.analyze_reader(BufReader::new(file)).map_err(|e| match e {
            ProfileError::Io(source) => io_error(source),
            other => other,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const RUN: &str = "00010111";
    const RUN_NO_MAIN: &str = "00010011";
    const STOPPED: &str = "00001011";

    fn analyze(text: &str) -> NoiseStats {
        NoiseAnalyzer::default()
            .analyze_reader(Cursor::new(text.to_string()))
            .unwrap()
    }

    #[test]
    fn test_mean_and_deviation() {
        let text = format!("h\n0,2,{RUN}\n1,4,{RUN}\n2,4,{RUN}\n3,4,{RUN}\n4,5,{RUN}\n5,5,{RUN}\n6,7,{RUN}\n7,9,{RUN}\n");
        let stats = analyze(&text);
        assert_eq!(stats.sample_count, 8);
        assert_eq!(stats.total_current, 40.0);
        assert!((stats.average_current - 5.0).abs() < 1e-12);
        assert!((stats.variance - 4.0).abs() < 1e-12);
        assert!((stats.standard_deviation - 2.0).abs() < 1e-12);
        assert!((stats.upper_bound - 11.0).abs() < 1e-12);
        assert_eq!(stats.runtime, 7.0);
    }

    #[test]
    fn test_main_bit_not_required_and_gaps_reset_runtime() {
        let text = format!(
            "h\n0,1,{RUN_NO_MAIN}\n1,1,{RUN}\n2,100,{STOPPED}\n5,1,{RUN}\n6,-3,{RUN}\n"
        );
        let stats = analyze(&text);
        assert_eq!(stats.sample_count, 4);
        // 0 -> 1 and 5 -> 6; the stopped sample breaks the chain
        assert_eq!(stats.runtime, 2.0);
        assert_eq!(stats.total_current, 3.0);
    }

    #[test]
    fn test_invalid_utf8_line_is_skipped() {
        let mut bytes = format!("h\n0,4,{RUN}\n").into_bytes();
        bytes.extend_from_slice(b"1,\xff,00010111\n");
        bytes.extend_from_slice(format!("2,6,{RUN}\n").as_bytes());

        let stats = NoiseAnalyzer::default()
            .analyze_reader(Cursor::new(bytes))
            .unwrap();
        assert_eq!(stats.sample_count, 2);
        assert_eq!(stats.total_current, 10.0);
        assert_eq!(stats.runtime, 2.0);
    }

    #[test]
    fn test_empty_trace_is_all_zero() {
        let stats = analyze("h\n");
        assert_eq!(stats, NoiseStats::default());
        assert_eq!(
            stats.to_csv(),
            format!("{NOISE_HEADER}\n0,0,0,0,0,0,0\n")
        );
    }

    #[test]
    fn test_missing_path() {
        let err = NoiseAnalyzer::default()
            .analyze_path(Path::new("/no/such/trace.csv"))
            .unwrap_err();
        assert!(matches!(err, ProfileError::TraceNotFound(_)));
    }
}
