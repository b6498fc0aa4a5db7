//! Differentially private bounded-mean aggregation
//!
//! An estimator ingests a stream of real-valued contributions, clamps each
//! into a configured `[lower, upper]` range, and releases a single noised
//! mean under (epsilon, delta)-differential privacy, with optional
//! confidence intervals. Pre-noise state can instead be serialized and
//! merged across shards, paying the privacy cost only at the final release.
//!
//! Noise is injected through the [`dp_noise::NoiseMechanism`] capability;
//! concrete distributions live in the `dp-noise` crate.

pub mod bounded_mean;
pub mod error;
pub mod summary;

pub use bounded_mean::{BoundedMean, BoundedMeanBuilder};
pub use error::{AggregationError, Result};
pub use summary::MeanSummary;
