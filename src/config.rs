//! Analyzer configuration
//!
//! Everything the pipeline needs to know about the capture setup: where the
//! health, main, modem and phase bits sit in the pin string, the sleep current
//! threshold, and how the sleep family is refined. Loaded from JSON with every
//! field defaulted, so an empty object `{}` is a valid configuration.

use crate::error::ProfileError;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Sleep-family samples above this current (µA) count as system activity
pub const DEFAULT_SLEEP_THRESHOLD: f64 = 9.0;

/// Supply voltage of the measured rail (mV)
pub const DEFAULT_SUPPLY_VOLTAGE_MV: f64 = 3700.0;

/// Upper current edges (µA) for the bucketed system-activity breakdown
pub const DEFAULT_SYSTEM_BUCKETS: [f64; 5] = [10.0, 20.0, 40.0, 80.0, 160.0];

/// Extension of trace files picked up when a directory is given
pub const DEFAULT_TRACE_EXTENSION: &str = "csv";

/// Positions of the decoded fields inside the pin string
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PinLayout {
    pub modem_pin: usize,
    /// Health code occupies `health_start..health_end`
    pub health_start: usize,
    pub health_end: usize,
    pub running_code: String,
    pub finished_code: String,
    pub main_pin: usize,
    /// Phase bits occupy `phase_start..phase_end`
    pub phase_start: usize,
    pub phase_end: usize,
}

impl Default for PinLayout {
    fn default() -> Self {
        Self {
            modem_pin: 0,
            health_start: 1,
            health_end: 5,
            running_code: "0010".to_string(),
            finished_code: "0001".to_string(),
            main_pin: 5,
            phase_start: 6,
            phase_end: 8,
        }
    }
}

impl PinLayout {
    /// Shortest pin string the decoder accepts.
    ///
    /// The phase slice only needs its first bit to exist; a shorter slice just
    /// fails to match any phase pattern.
    pub fn min_width(&self) -> usize {
        self.health_end
            .max(self.main_pin + 1)
            .max(self.modem_pin + 1)
            .max(self.phase_start + 1)
    }

    fn validate(&self) -> Result<(), ProfileError> {
        if self.health_start >= self.health_end {
            return Err(ProfileError::InvalidConfig(format!(
                "empty health range {}..{}",
                self.health_start, self.health_end
            )));
        }
        if self.phase_start >= self.phase_end {
            return Err(ProfileError::InvalidConfig(format!(
                "empty phase range {}..{}",
                self.phase_start, self.phase_end
            )));
        }
        let width = self.health_end - self.health_start;
        for code in [&self.running_code, &self.finished_code] {
            if code.len() != width || !code.chars().all(|c| c == '0' || c == '1') {
                return Err(ProfileError::InvalidConfig(format!(
                    "health code {code:?} must be {width} binary digits"
                )));
            }
        }
        if self.running_code == self.finished_code {
            return Err(ProfileError::InvalidConfig(
                "running and finished codes must differ".to_string(),
            ));
        }
        Ok(())
    }
}

/// How sleep-family samples that are not modem activity get refined
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum SleepPolicy {
    /// Modem / system activity / sleep split on a single threshold
    #[default]
    ThreeWay,
    /// Three-way split, plus a per-current-bucket breakdown of system activity
    Bucketed { edges: Vec<f64> },
}

impl SleepPolicy {
    pub fn bucketed_default() -> Self {
        SleepPolicy::Bucketed {
            edges: DEFAULT_SYSTEM_BUCKETS.to_vec(),
        }
    }

    /// Bucket edges when the breakdown is enabled
    pub fn bucket_edges(&self) -> Option<&[f64]> {
        match self {
            SleepPolicy::ThreeWay => None,
            SleepPolicy::Bucketed { edges } => Some(edges),
        }
    }
}

/// Configuration for the trace analyzer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzerConfig {
    pub sleep_threshold: f64,
    pub sleep_policy: SleepPolicy,
    pub pin_layout: PinLayout,
    pub trace_extension: String,
    pub supply_voltage_mv: f64,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            sleep_threshold: DEFAULT_SLEEP_THRESHOLD,
            sleep_policy: SleepPolicy::default(),
            pin_layout: PinLayout::default(),
            trace_extension: DEFAULT_TRACE_EXTENSION.to_string(),
            supply_voltage_mv: DEFAULT_SUPPLY_VOLTAGE_MV,
        }
    }
}

impl AnalyzerConfig {
    /// Parse and validate a configuration from JSON
    pub fn from_json(json: &str) -> Result<Self, ProfileError> {
        let config: AnalyzerConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read a JSON configuration file
    pub fn from_path(path: &Path) -> Result<Self, ProfileError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    pub fn to_json(&self) -> Result<String, ProfileError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn with_sleep_threshold(mut self, threshold: f64) -> Self {
        self.sleep_threshold = threshold;
        self
    }

    pub fn with_sleep_policy(mut self, policy: SleepPolicy) -> Self {
        self.sleep_policy = policy;
        self
    }

    pub fn validate(&self) -> Result<(), ProfileError> {
        if !self.sleep_threshold.is_finite() || self.sleep_threshold < 0.0 {
            return Err(ProfileError::InvalidConfig(format!(
                "sleep_threshold must be a finite, non-negative current, got {}",
                self.sleep_threshold
            )));
        }
        if !self.supply_voltage_mv.is_finite() || self.supply_voltage_mv <= 0.0 {
            return Err(ProfileError::InvalidConfig(format!(
                "supply_voltage_mv must be positive, got {}",
                self.supply_voltage_mv
            )));
        }
        if self.trace_extension.is_empty() || self.trace_extension.contains('.') {
            return Err(ProfileError::InvalidConfig(format!(
                "trace_extension must be a bare extension, got {:?}",
                self.trace_extension
            )));
        }
        if let Some(edges) = self.sleep_policy.bucket_edges() {
            if edges.is_empty() {
                return Err(ProfileError::InvalidConfig(
                    "bucketed sleep policy needs at least one edge".to_string(),
                ));
            }
            if edges.iter().any(|e| !e.is_finite() || *e <= 0.0) {
                return Err(ProfileError::InvalidConfig(
                    "bucket edges must be positive currents".to_string(),
                ));
            }
            if edges.windows(2).any(|w| w[0] >= w[1]) {
                return Err(ProfileError::InvalidConfig(
                    "bucket edges must be strictly increasing".to_string(),
                ));
            }
        }
        self.pin_layout.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_empty_json_is_default() {
        let config = AnalyzerConfig::from_json("{}").unwrap();
        assert_eq!(config, AnalyzerConfig::default());
        assert_eq!(config.sleep_threshold, 9.0);
        assert_eq!(config.sleep_policy, SleepPolicy::ThreeWay);
    }

    #[test]
    fn test_default_min_width_is_seven() {
        assert_eq!(PinLayout::default().min_width(), 7);
    }

    #[test]
    fn test_bucketed_policy_from_json() {
        let config = AnalyzerConfig::from_json(
            r#"{"sleep_threshold": 12.5, "sleep_policy": {"mode": "bucketed", "edges": [10, 20, 40]}}"#,
        )
        .unwrap();
        assert_eq!(config.sleep_threshold, 12.5);
        assert_eq!(config.sleep_policy.bucket_edges(), Some(&[10.0, 20.0, 40.0][..]));
    }

    #[test]
    fn test_round_trip_through_json() {
        let config = AnalyzerConfig::default().with_sleep_policy(SleepPolicy::bucketed_default());
        let json = config.to_json().unwrap();
        assert_eq!(AnalyzerConfig::from_json(&json).unwrap(), config);
    }

    #[test]
    fn test_rejects_bad_values() {
        assert!(AnalyzerConfig::from_json(r#"{"sleep_threshold": -1}"#).is_err());
        assert!(AnalyzerConfig::from_json(r#"{"supply_voltage_mv": 0}"#).is_err());
        assert!(AnalyzerConfig::from_json(r#"{"trace_extension": ".csv"}"#).is_err());
        assert!(AnalyzerConfig::from_json(
            r#"{"sleep_policy": {"mode": "bucketed", "edges": [20, 10]}}"#
        )
        .is_err());
        assert!(AnalyzerConfig::from_json(
            r#"{"pin_layout": {"running_code": "01"}}"#
        )
        .is_err());
        assert!(AnalyzerConfig::from_json("not json").is_err());
    }
}
