//! Core types for the Phase Profiler pipeline
//!
//! This module defines the data structures that flow through each stage of the
//! pipeline: raw samples, decoded samples, per-phase accumulators and the
//! summary records appended to the output table.

use serde::{Deserialize, Serialize, Serializer};
use std::fmt;

/// Application health reported on the health pins
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Health {
    Running,
    Finished,
    Other,
}

/// Firmware execution phase
///
/// `Sleep`, `SystemActivity` and `Modem` all share the same raw pin pattern and
/// are told apart by the modem bit and the sleep current threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Setup,
    Compute,
    Send,
    Sleep,
    SystemActivity,
    Modem,
}

impl Phase {
    /// Canonical emission order
    pub const ALL: [Phase; 6] = [
        Phase::Setup,
        Phase::Compute,
        Phase::Send,
        Phase::Sleep,
        Phase::Modem,
        Phase::SystemActivity,
    ];

    /// Section name used in the summary table
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Setup => "setup",
            Phase::Compute => "compute",
            Phase::Send => "send",
            Phase::Sleep => "sleep",
            Phase::SystemActivity => "system",
            Phase::Modem => "modem",
        }
    }

    /// Position in [`Phase::ALL`]
    pub fn index(&self) -> usize {
        match self {
            Phase::Setup => 0,
            Phase::Compute => 1,
            Phase::Send => 2,
            Phase::Sleep => 3,
            Phase::Modem => 4,
            Phase::SystemActivity => 5,
        }
    }

    pub fn from_section(name: &str) -> Option<Phase> {
        Phase::ALL.into_iter().find(|p| p.as_str() == name)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One raw input line, before clamping and pin decoding
#[derive(Debug, Clone, PartialEq)]
pub struct RawSample {
    /// Device clock timestamp (ms)
    pub timestamp: f64,
    /// Measured current (µA), may be negative
    pub current: f64,
    /// Digital channel levels as `'0'`/`'1'` characters
    pub pin_state: String,
}

/// A sample with the pin state decoded into its fields
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedSample {
    pub timestamp: f64,
    /// Current clamped to be non-negative (µA)
    pub current: f64,
    pub health: Health,
    pub main_active: bool,
    pub modem_active: bool,
    /// Pin characters used for the phase lookup
    pub phase_bits: String,
}

impl DecodedSample {
    /// Only running samples with the main bit set take part in accounting
    pub fn is_qualifying(&self) -> bool {
        self.health == Health::Running && self.main_active
    }
}

/// Running totals for one phase (or for the whole trace)
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PhaseAccumulator {
    pub sample_count: u64,
    /// Σ current over included samples (µA)
    pub current_sum: f64,
    /// Σ adjacent same-phase timestamp deltas (ms)
    pub elapsed_time: f64,
}

impl PhaseAccumulator {
    pub fn add_sample(&mut self, current: f64) {
        self.sample_count += 1;
        self.current_sum += current;
    }

    pub fn add_elapsed(&mut self, delta: f64) {
        self.elapsed_time += delta;
    }

    /// Mean current, 0 when no samples were included
    pub fn average_current(&self) -> f64 {
        if self.sample_count == 0 {
            0.0
        } else {
            self.current_sum / self.sample_count as f64
        }
    }
}

/// Section column of a summary record
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Section {
    Total,
    Phase(Phase),
    /// System-activity sub-bucket; `None` is the overflow bucket above the last edge
    SystemBucket(Option<f64>),
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Section::Total => f.write_str("total"),
            Section::Phase(phase) => f.write_str(phase.as_str()),
            Section::SystemBucket(Some(edge)) => write!(f, "system_{edge}"),
            Section::SystemBucket(None) => f.write_str("system_over"),
        }
    }
}

impl Serialize for Section {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// One row of the output table: a (trace, section) pair
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TraceSummaryRecord {
    pub label: String,
    pub section: Section,
    pub sample_count: u64,
    pub average_current: f64,
    pub current_sum: f64,
    pub elapsed_time: f64,
}

impl TraceSummaryRecord {
    pub fn from_accumulator(label: &str, section: Section, acc: &PhaseAccumulator) -> Self {
        Self {
            label: label.to_string(),
            section,
            sample_count: acc.sample_count,
            average_current: acc.average_current(),
            current_sum: acc.current_sum,
            elapsed_time: acc.elapsed_time,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_order_and_names() {
        let names: Vec<&str> = Phase::ALL.iter().map(|p| p.as_str()).collect();
        assert_eq!(names, vec!["setup", "compute", "send", "sleep", "modem", "system"]);
        for (i, phase) in Phase::ALL.iter().enumerate() {
            assert_eq!(phase.index(), i);
            assert_eq!(Phase::from_section(phase.as_str()), Some(*phase));
        }
        assert_eq!(Phase::from_section("total"), None);
    }

    #[test]
    fn test_average_current_empty_is_zero() {
        let acc = PhaseAccumulator::default();
        assert_eq!(acc.average_current(), 0.0);

        let mut acc = PhaseAccumulator::default();
        acc.add_sample(100.0);
        acc.add_sample(120.0);
        assert!((acc.average_current() - 110.0).abs() < 1e-9);
    }

    #[test]
    fn test_section_display() {
        assert_eq!(Section::Total.to_string(), "total");
        assert_eq!(Section::Phase(Phase::SystemActivity).to_string(), "system");
        assert_eq!(Section::SystemBucket(Some(10.0)).to_string(), "system_10");
        assert_eq!(Section::SystemBucket(None).to_string(), "system_over");
    }

    #[test]
    fn test_qualifying_gate() {
        let mut sample = DecodedSample {
            timestamp: 0.0,
            current: 1.0,
            health: Health::Running,
            main_active: true,
            modem_active: false,
            phase_bits: "00".to_string(),
        };
        assert!(sample.is_qualifying());
        sample.main_active = false;
        assert!(!sample.is_qualifying());
        sample.main_active = true;
        sample.health = Health::Finished;
        assert!(!sample.is_qualifying());
    }
}
