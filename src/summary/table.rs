//! Parsing of the summary table

use crate::error::ProfileError;
use serde::Serialize;
use std::collections::HashMap;
use std::path::Path;
use tracing::warn;

const SUMMARY_FIELDS: usize = 6;

/// One (label, section) row of the summary table
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct SectionStats {
    pub sample_count: u64,
    /// µA
    pub average_current: f64,
    /// µA
    pub total_current: f64,
    /// ms
    pub elapsed_time: f64,
}

/// label → section → stats, remembering the order labels first appeared in
#[derive(Debug, Clone, Default)]
pub struct SummaryTable {
    labels: Vec<String>,
    sections: HashMap<String, HashMap<String, SectionStats>>,
}

impl SummaryTable {
    /// Parse summary CSV text. The first line is the header.
    pub fn parse(text: &str) -> Result<Self, ProfileError> {
        let mut table = SummaryTable::default();

        for (index, line) in text.lines().enumerate().skip(1) {
            let line_no = index + 1;
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }

            let fields: Vec<&str> = trimmed.split(',').map(str::trim).collect();
            if fields.len() < SUMMARY_FIELDS {
                warn!("Skipping short summary row at line {line_no}: {trimmed:?}");
                continue;
            }
            if fields.len() > SUMMARY_FIELDS {
                return Err(ProfileError::SummaryParse {
                    line: line_no,
                    reason: format!("expected {SUMMARY_FIELDS} fields, found {}", fields.len()),
                });
            }

            let stats = SectionStats {
                sample_count: fields[2].parse().map_err(|_| {
                    summary_error(line_no, "sample_count", fields[2])
                })?,
                average_current: parse_number(fields[3], "average_current", line_no)?,
                total_current: parse_number(fields[4], "total_current", line_no)?,
                elapsed_time: parse_number(fields[5], "elapsed_time", line_no)?,
            };
            table.insert(fields[0], fields[1], stats);
        }

        Ok(table)
    }

    pub fn from_path(path: &Path) -> Result<Self, ProfileError> {
        let text = std::fs::read_to_string(path).map_err(|source| ProfileError::SummaryIo {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&text)
    }

    pub fn insert(&mut self, label: &str, section: &str, stats: SectionStats) {
        if !self.sections.contains_key(label) {
            self.labels.push(label.to_string());
        }
        let sections = self.sections.entry(label.to_string()).or_default();
        if sections.insert(section.to_string(), stats).is_some() {
            warn!("Duplicate summary row for {label}/{section}, keeping the last one");
        }
    }

    /// Labels in first-appearance order
    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn get(&self, label: &str, section: &str) -> Option<&SectionStats> {
        self.sections.get(label)?.get(section)
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

fn parse_number(field: &str, name: &str, line: usize) -> Result<f64, ProfileError> {
    field
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| summary_error(line, name, field))
}

fn summary_error(line: usize, name: &str, field: &str) -> ProfileError {
    ProfileError::SummaryParse {
        line,
        reason: format!("{name} {field:?} is not a valid number"),
    }
}
