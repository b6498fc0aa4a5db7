//! Typed failures for the aggregation lifecycle

use dp_noise::NoiseError;
use thiserror::Error;

/// Aggregation errors
#[derive(Debug, Error)]
pub enum AggregationError {
    #[error("invalid parameter {field}: {reason}")]
    InvalidParameter {
        field: &'static str,
        reason: String,
    },

    #[error("aggregator already finalized, cannot {0}")]
    AggregatorFinalized(&'static str),

    #[error("confidence interval requested before compute_result")]
    ResultNotYetComputed,

    #[error("incompatible merge: {field} differs between summaries")]
    IncompatibleMerge { field: &'static str },

    #[error("malformed summary: {0}")]
    MalformedSummary(String),
}

impl From<NoiseError> for AggregationError {
    fn from(err: NoiseError) -> Self {
        let field = match err {
            NoiseError::InvalidEpsilon(_) => "epsilon",
            _ => "delta",
        };
        AggregationError::InvalidParameter {
            field,
            reason: err.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, AggregationError>;
