//! Derived metrics and configuration comparison
//!
//! Turns the summary table into a configurations × sections matrix of energy,
//! power or time, ordered by experiment label.

use super::label::ExperimentLabel;
use super::table::{SectionStats, SummaryTable};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Sections compared when none are requested explicitly
pub const DEFAULT_COMPARE_SECTIONS: &[&str] = &["total", "setup", "compute", "send", "sleep"];

/// Metric derived from a summary row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    /// Joules
    Energy,
    /// Watts
    Power,
    /// Seconds
    Time,
}

impl Metric {
    pub fn unit(self) -> &'static str {
        match self {
            Metric::Energy => "J",
            Metric::Power => "W",
            Metric::Time => "s",
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Metric::Energy => "energy",
            Metric::Power => "power",
            Metric::Time => "time",
        })
    }
}

/// W from an average current in µA at a supply voltage in mV
pub fn average_power_w(average_current_ua: f64, supply_mv: f64) -> f64 {
    (average_current_ua / 1000.0) * supply_mv / 1e6
}

/// J from a power in W held for `elapsed_ms`
pub fn energy_j(power_w: f64, elapsed_ms: f64) -> f64 {
    power_w * elapsed_ms / 1000.0
}

impl SectionStats {
    pub fn metric(&self, metric: Metric, supply_mv: f64) -> f64 {
        let power = average_power_w(self.average_current, supply_mv);
        match metric {
            Metric::Energy => energy_j(power, self.elapsed_time),
            Metric::Power => power,
            Metric::Time => self.elapsed_time / 1000.0,
        }
    }
}

/// One configuration's values, aligned with [`Comparison::sections`]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComparisonRow {
    pub label: String,
    pub config: ExperimentLabel,
    /// `None` where the summary has no row for that section
    pub values: Vec<Option<f64>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Comparison {
    pub metric: Metric,
    pub unit: &'static str,
    pub supply_voltage_mv: f64,
    pub sections: Vec<String>,
    pub rows: Vec<ComparisonRow>,
}

impl SummaryTable {
    /// Build a comparison over `sections` for every label, sorted by
    /// (operations, payload, protocol)
    pub fn compare(&self, metric: Metric, supply_mv: f64, sections: &[String]) -> Comparison {
        let mut rows: Vec<ComparisonRow> = self
            .labels()
            .iter()
            .map(|label| ComparisonRow {
                label: label.clone(),
                config: ExperimentLabel::parse(label),
                values: sections
                    .iter()
                    .map(|section| {
                        self.get(label, section)
                            .map(|stats| stats.metric(metric, supply_mv))
                    })
                    .collect(),
            })
            .collect();
        // stable: equal configurations keep table order
        rows.sort_by(|a, b| a.config.cmp(&b.config));

        Comparison {
            metric,
            unit: metric.unit(),
            supply_voltage_mv: supply_mv,
            sections: sections.to_vec(),
            rows,
        }
    }
}

impl Comparison {
    /// Fixed-width text table
    pub fn to_text(&self) -> String {
        let name_width = self
            .rows
            .iter()
            .map(|r| r.config.to_string().len())
            .chain(std::iter::once("configuration".len()))
            .max()
            .unwrap_or(0);

        let mut out = format!("{:<name_width$}", "configuration");
        for section in &self.sections {
            out.push_str(&format!("  {:>14}", format!("{section} ({})", self.unit)));
        }
        out.push('\n');

        for row in &self.rows {
            out.push_str(&format!("{:<name_width$}", row.config.to_string()));
            for value in &row.values {
                let cell = match value {
                    Some(v) => format!("  {v:>14.6}"),
                    None => format!("  {:>14}", "-"),
                };
                out.push_str(&cell);
            }
            out.push('\n');
        }
        out
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::emitter::SUMMARY_HEADER;
    use pretty_assertions::assert_eq;

    fn table() -> SummaryTable {
        SummaryTable::parse(&format!(
            "{SUMMARY_HEADER}\n\
             tls_20_256B,total,10,1000,10000,2000\n\
             tls_10_256B,total,10,500,5000,1000\n\
             tls_10_256B,setup,2,2000,4000,100\n\
             notes,total,1,1,1,1\n"
        ))
        .unwrap()
    }

    #[test]
    fn test_derived_metrics() {
        // 1000 µA at 3700 mV = 3.7 mW
        let power = average_power_w(1000.0, 3700.0);
        assert!((power - 0.0037).abs() < 1e-12);
        assert!((energy_j(power, 2000.0) - 0.0074).abs() < 1e-12);

        let stats = SectionStats {
            sample_count: 1,
            average_current: 1000.0,
            total_current: 1000.0,
            elapsed_time: 2500.0,
        };
        assert_eq!(stats.metric(Metric::Time, 3700.0), 2.5);
    }

    #[test]
    fn test_compare_sorts_and_fills_gaps() {
        let sections = vec!["total".to_string(), "setup".to_string()];
        let comparison = table().compare(Metric::Time, 3700.0, &sections);

        let labels: Vec<&str> = comparison.rows.iter().map(|r| r.label.as_str()).collect();
        assert_eq!(labels, vec!["tls_10_256B", "tls_20_256B", "notes"]);
        assert_eq!(comparison.rows[0].values, vec![Some(1.0), Some(0.1)]);
        assert_eq!(comparison.rows[1].values, vec![Some(2.0), None]);
        assert_eq!(comparison.unit, "s");
    }

    #[test]
    fn test_text_and_json_rendering() {
        let sections = vec!["total".to_string()];
        let comparison = table().compare(Metric::Energy, 3700.0, &sections);

        let text = comparison.to_text();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 4);
        assert!(lines[0].starts_with("configuration"));
        assert!(lines[0].contains("total (J)"));
        assert!(lines[1].starts_with("tls 10 256B"));

        let sections = vec!["total".to_string(), "setup".to_string()];
        let text = table().compare(Metric::Time, 3700.0, &sections).to_text();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[1], "tls 10 256B          1.000000        0.100000");
        assert!(lines[2].ends_with("               -"));

        let json: serde_json::Value = serde_json::from_str(&comparison.to_json().unwrap()).unwrap();
        assert_eq!(json["metric"], "energy");
        assert_eq!(json["rows"][2]["config"]["kind"], "unstructured");
        assert_eq!(json["rows"][0]["config"]["operations"], 10);
    }
}
