//! Streaming aggregation
//!
//! Single-pass state machine over the classified samples of one trace. It keeps
//! one accumulator per phase plus a trace total, and remembers the previous
//! qualifying sample so that elapsed time is attributed to a phase only when two
//! consecutive qualifying samples were classified into that same phase.
//!
//! The total accrues every delta between consecutive qualifying samples, across
//! phase boundaries and unclassified samples alike.

use crate::classifier::Classification;
use crate::types::{DecodedSample, Phase, PhaseAccumulator};

/// The previous qualifying sample, classified or not
#[derive(Debug, Clone, Copy, PartialEq)]
struct PriorSample {
    timestamp: f64,
    phase: Option<Phase>,
    bucket: Option<usize>,
}

/// Current-bucket breakdown of system activity
#[derive(Debug, Clone)]
struct SystemBuckets {
    edges: Vec<f64>,
    /// One per edge plus the overflow bucket
    accumulators: Vec<PhaseAccumulator>,
}

impl SystemBuckets {
    fn new(edges: &[f64]) -> Self {
        Self {
            edges: edges.to_vec(),
            accumulators: vec![PhaseAccumulator::default(); edges.len() + 1],
        }
    }

    /// Smallest edge the current does not exceed, or the overflow bucket
    fn index_for(&self, current: f64) -> usize {
        self.edges
            .iter()
            .position(|edge| current <= *edge)
            .unwrap_or(self.edges.len())
    }
}

/// Finalized totals of one trace
#[derive(Debug, Clone, PartialEq)]
pub struct PhaseTotals {
    pub total: PhaseAccumulator,
    phases: [PhaseAccumulator; 6],
    /// `(upper edge, totals)`; `None` edge is the overflow bucket. Empty unless bucketing is enabled.
    pub system_buckets: Vec<(Option<f64>, PhaseAccumulator)>,
}

impl PhaseTotals {
    pub fn phase(&self, phase: Phase) -> &PhaseAccumulator {
        &self.phases[phase.index()]
    }

    /// Phase accumulators in canonical order
    pub fn phases(&self) -> impl Iterator<Item = (Phase, &PhaseAccumulator)> {
        Phase::ALL.into_iter().map(move |p| (p, &self.phases[p.index()]))
    }

    pub fn classified_samples(&self) -> u64 {
        self.phases.iter().map(|acc| acc.sample_count).sum()
    }
}

/// Per-trace streaming aggregator
#[derive(Debug, Clone, Default)]
pub struct StreamingAggregator {
    total: PhaseAccumulator,
    phases: [PhaseAccumulator; 6],
    prior: Option<PriorSample>,
    buckets: Option<SystemBuckets>,
}

impl StreamingAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Aggregator that also splits system activity by current bucket
    pub fn with_system_buckets(edges: &[f64]) -> Self {
        Self {
            buckets: Some(SystemBuckets::new(edges)),
            ..Self::default()
        }
    }

    /// Feed one classified sample. Returns false when the sample was excluded.
    pub fn ingest(&mut self, sample: &DecodedSample, classification: Classification) -> bool {
        let phase = match classification {
            Classification::Excluded => return false,
            Classification::Unclassified => None,
            Classification::Phase(phase) => Some(phase),
        };

        let delta = self.prior.map(|prior| sample.timestamp - prior.timestamp);

        self.total.add_sample(sample.current);
        if let Some(delta) = delta {
            self.total.add_elapsed(delta);
        }

        let mut bucket = None;
        if let Some(phase) = phase {
            let same_phase = self.prior.is_some_and(|prior| prior.phase == Some(phase));

            let acc = &mut self.phases[phase.index()];
            acc.add_sample(sample.current);
            if same_phase {
                if let Some(delta) = delta {
                    acc.add_elapsed(delta);
                }
            }

            if phase == Phase::SystemActivity {
                if let Some(buckets) = self.buckets.as_mut() {
                    let index = buckets.index_for(sample.current);
                    let same_bucket = self.prior.is_some_and(|prior| prior.bucket == Some(index));
                    let acc = &mut buckets.accumulators[index];
                    acc.add_sample(sample.current);
                    if same_bucket {
                        if let Some(delta) = delta {
                            acc.add_elapsed(delta);
                        }
                    }
                    bucket = Some(index);
                }
            }
        }

        self.prior = Some(PriorSample {
            timestamp: sample.timestamp,
            phase,
            bucket,
        });
        true
    }

    /// Running total so far
    pub fn total(&self) -> &PhaseAccumulator {
        &self.total
    }

    /// Close the trace; the returned totals are read-only
    pub fn finish(self) -> PhaseTotals {
        let system_buckets = match self.buckets {
            Some(buckets) => {
                let edges = buckets.edges.iter().map(|e| Some(*e)).chain(std::iter::once(None));
                edges.zip(buckets.accumulators).collect()
            }
            None => Vec::new(),
        };

        PhaseTotals {
            total: self.total,
            phases: self.phases,
            system_buckets,
        }
    }
}
