//! Serializable partial-aggregate state
//!
//! A summary carries the pre-noise running state of one estimator plus the
//! configuration fingerprint needed to decide whether two shards may be
//! combined. Summaries are immutable values; merging one into an estimator
//! does not consume it.

use dp_noise::MechanismType;
use serde::{Deserialize, Serialize};

use crate::error::{AggregationError, Result};

/// Partial-aggregate snapshot of a bounded-mean estimator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeanSummary {
    pub normalized_sum: f64,
    pub count: u64,
    pub mechanism: MechanismType,
    pub epsilon: f64,
    pub delta: Option<f64>,
    pub lower: f64,
    pub upper: f64,
    pub max_partitions_contributed: i32,
    pub max_contributions_per_partition: i32,
}

impl MeanSummary {
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        bincode::serialize(self).map_err(|e| AggregationError::MalformedSummary(e.to_string()))
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        bincode::deserialize(bytes).map_err(|e| AggregationError::MalformedSummary(e.to_string()))
    }

    /// Field-by-field configuration check, reporting the first mismatch.
    ///
    /// Floats are compared by bit pattern: the values written into the two
    /// summaries must be identical, not merely numerically close.
    pub fn check_compatible(&self, other: &MeanSummary) -> Result<()> {
        if self.mechanism != other.mechanism {
            return Err(mismatch("mechanism"));
        }
        if !bits_equal(self.epsilon, other.epsilon) {
            return Err(mismatch("epsilon"));
        }
        if !delta_equal(self.delta, other.delta) {
            return Err(mismatch("delta"));
        }
        if self.max_partitions_contributed != other.max_partitions_contributed {
            return Err(mismatch("max_partitions_contributed"));
        }
        if self.max_contributions_per_partition != other.max_contributions_per_partition {
            return Err(mismatch("max_contributions_per_partition"));
        }
        if !bits_equal(self.lower, other.lower) {
            return Err(mismatch("lower"));
        }
        if !bits_equal(self.upper, other.upper) {
            return Err(mismatch("upper"));
        }
        Ok(())
    }
}

fn mismatch(field: &'static str) -> AggregationError {
    AggregationError::IncompatibleMerge { field }
}

fn bits_equal(a: f64, b: f64) -> bool {
    a.to_bits() == b.to_bits()
}

fn delta_equal(a: Option<f64>, b: Option<f64>) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(a), Some(b)) => bits_equal(a, b),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary() -> MeanSummary {
        MeanSummary {
            normalized_sum: 1.5,
            count: 3,
            mechanism: MechanismType::Laplace,
            epsilon: 1.0,
            delta: None,
            lower: 0.0,
            upper: 10.0,
            max_partitions_contributed: 1,
            max_contributions_per_partition: 1,
        }
    }

    #[test]
    fn test_byte_round_trip() {
        let original = summary();
        let bytes = original.to_bytes().unwrap();
        let decoded = MeanSummary::from_bytes(&bytes).unwrap();
        assert_eq!(original, decoded);
    }

    #[test]
    fn test_malformed_bytes_rejected() {
        let err = MeanSummary::from_bytes(&[0x01, 0x02]).unwrap_err();
        assert!(matches!(err, AggregationError::MalformedSummary(_)));
    }

    #[test]
    fn test_identical_summaries_compatible() {
        assert!(summary().check_compatible(&summary()).is_ok());
    }

    #[test]
    fn test_partial_aggregates_do_not_affect_compatibility() {
        let mut other = summary();
        other.normalized_sum = -40.0;
        other.count = 999;
        assert!(summary().check_compatible(&other).is_ok());
    }

    #[test]
    fn test_first_mismatching_field_reported() {
        let cases: Vec<(&'static str, Box<dyn Fn(&mut MeanSummary)>)> = vec![
            ("mechanism", Box::new(|s| s.mechanism = MechanismType::Zero)),
            ("epsilon", Box::new(|s| s.epsilon = 2.0)),
            ("delta", Box::new(|s| s.delta = Some(1e-5))),
            ("max_partitions_contributed", Box::new(|s| s.max_partitions_contributed = 2)),
            (
                "max_contributions_per_partition",
                Box::new(|s| s.max_contributions_per_partition = 2),
            ),
            ("lower", Box::new(|s| s.lower = -1.0)),
            ("upper", Box::new(|s| s.upper = 11.0)),
        ];

        for (field, mutate) in cases {
            let mut other = summary();
            mutate(&mut other);
            match summary().check_compatible(&other) {
                Err(AggregationError::IncompatibleMerge { field: reported }) => {
                    assert_eq!(reported, field)
                }
                other => panic!("expected IncompatibleMerge on {field}, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_delta_compared_by_bits() {
        let mut a = summary();
        let mut b = summary();
        a.delta = Some(0.1);
        b.delta = Some(0.1 + f64::EPSILON);
        let err = a.check_compatible(&b).unwrap_err();
        assert!(matches!(err, AggregationError::IncompatibleMerge { field: "delta" }));
    }
}
