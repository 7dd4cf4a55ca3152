//! Phase classification
//!
//! Maps decoded phase bits to an execution [`Phase`]. The lookup table below is
//! the single source of truth for the bit patterns; the shared sleep pattern is
//! refined by the modem bit first and the sleep current threshold second.

use crate::config::DEFAULT_SLEEP_THRESHOLD;
use crate::types::{DecodedSample, Phase};

/// What a phase-bit pattern decodes to before sleep refinement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PatternClass {
    Direct(Phase),
    SleepFamily,
}

const PHASE_PATTERNS: [(&str, PatternClass); 4] = [
    ("00", PatternClass::Direct(Phase::Setup)),
    ("01", PatternClass::Direct(Phase::Compute)),
    ("10", PatternClass::Direct(Phase::Send)),
    ("11", PatternClass::SleepFamily),
];

/// Outcome of classifying one decoded sample
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    /// Not running or main bit clear; takes no part in any accounting
    Excluded,
    /// Qualifying, but the phase bits match no pattern; counts toward the total only
    Unclassified,
    Phase(Phase),
}

impl Classification {
    pub fn phase(&self) -> Option<Phase> {
        match self {
            Classification::Phase(phase) => Some(*phase),
            _ => None,
        }
    }
}

/// Classifier for qualifying samples
#[derive(Debug, Clone, Copy)]
pub struct PhaseClassifier {
    sleep_threshold: f64,
}

impl Default for PhaseClassifier {
    fn default() -> Self {
        Self::new(DEFAULT_SLEEP_THRESHOLD)
    }
}

impl PhaseClassifier {
    pub fn new(sleep_threshold: f64) -> Self {
        Self { sleep_threshold }
    }

    /// Apply the inclusion gate, then decode the phase
    pub fn classify(&self, sample: &DecodedSample) -> Classification {
        if !sample.is_qualifying() {
            return Classification::Excluded;
        }

        let class = PHASE_PATTERNS
            .iter()
            .find(|(pattern, _)| *pattern == sample.phase_bits)
            .map(|(_, class)| *class);

        match class {
            Some(PatternClass::Direct(phase)) => Classification::Phase(phase),
            Some(PatternClass::SleepFamily) => {
                Classification::Phase(self.refine_sleep(sample.modem_active, sample.current))
            }
            None => Classification::Unclassified,
        }
    }

    /// Modem bit wins; otherwise strictly above the threshold is system activity
    pub fn refine_sleep(&self, modem_active: bool, current: f64) -> Phase {
        if modem_active {
            Phase::Modem
        } else if current > self.sleep_threshold {
            Phase::SystemActivity
        } else {
            Phase::Sleep
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Health;

    fn sample(bits: &str, current: f64, modem: bool) -> DecodedSample {
        DecodedSample {
            timestamp: 0.0,
            current,
            health: Health::Running,
            main_active: true,
            modem_active: modem,
            phase_bits: bits.to_string(),
        }
    }

    #[test]
    fn test_direct_patterns() {
        let c = PhaseClassifier::default();
        assert_eq!(c.classify(&sample("00", 1.0, false)), Classification::Phase(Phase::Setup));
        assert_eq!(c.classify(&sample("01", 1.0, false)), Classification::Phase(Phase::Compute));
        assert_eq!(c.classify(&sample("10", 1.0, false)), Classification::Phase(Phase::Send));
    }

    #[test]
    fn test_direct_patterns_ignore_modem_bit() {
        let c = PhaseClassifier::default();
        assert_eq!(c.classify(&sample("10", 500.0, true)), Classification::Phase(Phase::Send));
    }

    #[test]
    fn test_sleep_family_priority() {
        let c = PhaseClassifier::new(9.0);
        assert_eq!(c.classify(&sample("11", 200_000.0, true)), Classification::Phase(Phase::Modem));
        assert_eq!(c.classify(&sample("11", 0.0, true)), Classification::Phase(Phase::Modem));
        assert_eq!(
            c.classify(&sample("11", 200_000.0, false)),
            Classification::Phase(Phase::SystemActivity)
        );
        assert_eq!(c.classify(&sample("11", 3.0, false)), Classification::Phase(Phase::Sleep));
    }

    #[test]
    fn test_threshold_boundary() {
        let c = PhaseClassifier::new(9.0);
        assert_eq!(c.classify(&sample("11", 9.0, false)), Classification::Phase(Phase::Sleep));
        assert_eq!(
            c.classify(&sample("11", 9.000_001, false)),
            Classification::Phase(Phase::SystemActivity)
        );
    }

    #[test]
    fn test_unmatched_bits_are_unclassified() {
        let c = PhaseClassifier::default();
        assert_eq!(c.classify(&sample("1", 1.0, false)), Classification::Unclassified);
        assert_eq!(c.classify(&sample("", 1.0, false)), Classification::Unclassified);
        assert_eq!(c.classify(&sample("011", 1.0, false)), Classification::Unclassified);
        assert_eq!(Classification::Unclassified.phase(), None);
    }

    #[test]
    fn test_gate_excludes_non_qualifying() {
        let c = PhaseClassifier::default();
        let mut s = sample("00", 1.0, false);
        s.main_active = false;
        assert_eq!(c.classify(&s), Classification::Excluded);

        let mut s = sample("00", 1.0, false);
        s.health = Health::Finished;
        assert_eq!(c.classify(&s), Classification::Excluded);

        let mut s = sample("zz", 1.0, false);
        s.health = Health::Other;
        assert_eq!(c.classify(&s), Classification::Excluded);
    }
}
