//! Summary emission
//!
//! Converts finalized [`PhaseTotals`] into the ordered record set for one trace
//! and renders records as rows of the summary table.

use crate::aggregator::PhaseTotals;
use crate::types::{Section, TraceSummaryRecord};

/// Header row of the summary table
pub const SUMMARY_HEADER: &str =
    "label,section,sample_count,average_current,total_current,elapsed_time";

/// Emitter for per-trace summary records
pub struct SummaryEmitter;

impl SummaryEmitter {
    /// Total first, then the six phases in canonical order, then any system buckets
    pub fn emit(label: &str, totals: &PhaseTotals) -> Vec<TraceSummaryRecord> {
        let mut records = Vec::with_capacity(7 + totals.system_buckets.len());

        records.push(TraceSummaryRecord::from_accumulator(
            label,
            Section::Total,
            &totals.total,
        ));

        for (phase, acc) in totals.phases() {
            records.push(TraceSummaryRecord::from_accumulator(
                label,
                Section::Phase(phase),
                acc,
            ));
        }

        for (edge, acc) in &totals.system_buckets {
            records.push(TraceSummaryRecord::from_accumulator(
                label,
                Section::SystemBucket(*edge),
                acc,
            ));
        }

        records
    }

    /// One CSV row, without the trailing newline
    pub fn format_record(record: &TraceSummaryRecord) -> String {
        format!(
            "{},{},{},{},{},{}",
            record.label,
            record.section,
            record.sample_count,
            record.average_current,
            record.current_sum,
            record.elapsed_time
        )
    }

    /// All rows of one trace as a single newline-terminated block
    pub fn render_block(records: &[TraceSummaryRecord]) -> String {
        let mut block = String::new();
        for record in records {
            block.push_str(&Self::format_record(record));
            block.push('\n');
        }
        block
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregator::StreamingAggregator;
    use crate::classifier::PhaseClassifier;
    use crate::types::{DecodedSample, Health, Phase};
    use pretty_assertions::assert_eq;

    fn totals(buckets: Option<&[f64]>) -> PhaseTotals {
        let classifier = PhaseClassifier::default();
        let mut aggregator = match buckets {
            Some(edges) => StreamingAggregator::with_system_buckets(edges),
            None => StreamingAggregator::new(),
        };
        for (t, i, bits) in [(0.0, 100.0, "00"), (1.0, 120.0, "00"), (2.0, 50.0, "11")] {
            let s = DecodedSample {
                timestamp: t,
                current: i,
                health: Health::Running,
                main_active: true,
                modem_active: false,
                phase_bits: bits.to_string(),
            };
            aggregator.ingest(&s, classifier.classify(&s));
        }
        aggregator.finish()
    }

    #[test]
    fn test_emits_seven_records_in_order() {
        let records = SummaryEmitter::emit("tls_10_256B", &totals(None));
        let sections: Vec<String> = records.iter().map(|r| r.section.to_string()).collect();
        assert_eq!(
            sections,
            vec!["total", "setup", "compute", "send", "sleep", "modem", "system"]
        );
        assert!(records.iter().all(|r| r.label == "tls_10_256B"));
        assert_eq!(records[1].section, Section::Phase(Phase::Setup));
    }

    #[test]
    fn test_render_block() {
        let records = SummaryEmitter::emit("run", &totals(None));
        let block = SummaryEmitter::render_block(&records);
        let lines: Vec<&str> = block.lines().collect();
        assert_eq!(lines.len(), 7);
        assert_eq!(lines[0], "run,total,3,90,270,2");
        assert_eq!(lines[1], "run,setup,2,110,220,1");
        assert_eq!(lines[2], "run,compute,0,0,0,0");
        assert_eq!(lines[6], "run,system,1,50,50,0");
        assert!(block.ends_with('\n'));
    }

    #[test]
    fn test_bucket_rows_follow_canonical_rows() {
        let records = SummaryEmitter::emit("run", &totals(Some(&[10.0, 80.0])));
        let sections: Vec<String> = records.iter().map(|r| r.section.to_string()).collect();
        assert_eq!(
            sections[7..].to_vec(),
            vec!["system_10", "system_80", "system_over"]
        );
        assert_eq!(records[8].sample_count, 1);
    }

    #[test]
    fn test_emission_is_deterministic() {
        let a = SummaryEmitter::render_block(&SummaryEmitter::emit("x", &totals(None)));
        let b = SummaryEmitter::render_block(&SummaryEmitter::emit("x", &totals(None)));
        assert_eq!(a, b);
    }
}
