//! Experiment labels
//!
//! Trace labels name the experiment configuration as
//! `<protocol>_<operations>_<payload>B`, e.g. `no_tls_10_1024B`. The protocol
//! may itself contain underscores.

use serde::Serialize;
use std::cmp::Ordering;
use std::fmt;

/// Configuration encoded in a trace label
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExperimentLabel {
    Structured {
        protocol: String,
        operations: u32,
        payload_bytes: u32,
    },
    /// Labels that do not follow the naming scheme
    Unstructured { label: String },
}

impl ExperimentLabel {
    pub fn parse(label: &str) -> Self {
        Self::parse_structured(label).unwrap_or_else(|| ExperimentLabel::Unstructured {
            label: label.to_string(),
        })
    }

    fn parse_structured(label: &str) -> Option<Self> {
        let mut tokens = label.rsplitn(3, '_');
        let payload = tokens.next()?;
        let operations = tokens.next()?;
        let protocol = tokens.next()?;

        if protocol.is_empty() {
            return None;
        }

        Some(ExperimentLabel::Structured {
            protocol: protocol.to_string(),
            operations: operations.parse().ok()?,
            payload_bytes: payload.strip_suffix('B')?.parse().ok()?,
        })
    }

    /// Sort key: operations, payload, protocol; unstructured labels last
    fn sort_key(&self) -> (u8, u32, u32, &str) {
        match self {
            ExperimentLabel::Structured {
                protocol,
                operations,
                payload_bytes,
            } => (0, *operations, *payload_bytes, protocol.as_str()),
            ExperimentLabel::Unstructured { label } => (1, 0, 0, label.as_str()),
        }
    }
}

impl Ord for ExperimentLabel {
    fn cmp(&self, other: &Self) -> Ordering {
        self.sort_key().cmp(&other.sort_key())
    }
}

impl PartialOrd for ExperimentLabel {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for ExperimentLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExperimentLabel::Structured {
                protocol,
                operations,
                payload_bytes,
            } => write!(f, "{} {operations} {payload_bytes}B", protocol.replace('_', " ")),
            ExperimentLabel::Unstructured { label } => f.write_str(label),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_structured() {
        assert_eq!(
            ExperimentLabel::parse("no_tls_10_1024B"),
            ExperimentLabel::Structured {
                protocol: "no_tls".to_string(),
                operations: 10,
                payload_bytes: 1024,
            }
        );
        assert_eq!(
            ExperimentLabel::parse("tls_25_256B").to_string(),
            "tls 25 256B"
        );
    }

    #[test]
    fn test_parse_unstructured() {
        for label in ["baseline", "tls_10", "_10_256B", "tls_x_256B", "tls_10_256", "tls_10_B"] {
            assert_eq!(
                ExperimentLabel::parse(label),
                ExperimentLabel::Unstructured {
                    label: label.to_string()
                },
                "{label}"
            );
        }
    }

    #[test]
    fn test_ordering() {
        let mut labels: Vec<ExperimentLabel> = [
            "tls_20_256B",
            "zzz",
            "tls_10_1024B",
            "no_tls_10_1024B",
            "tls_10_256B",
            "aaa",
        ]
        .iter()
        .map(|l| ExperimentLabel::parse(l))
        .collect();
        labels.sort();

        let names: Vec<String> = labels.iter().map(|l| l.to_string()).collect();
        assert_eq!(
            names,
            vec![
                "tls 10 256B",
                "no tls 10 1024B",
                "tls 10 1024B",
                "tls 20 256B",
                "aaa",
                "zzz",
            ]
        );
    }
}
