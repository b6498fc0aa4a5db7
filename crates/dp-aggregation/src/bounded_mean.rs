//! Differentially private bounded mean
//!
//! The mean release is decomposed into two parallel queries, each holding
//! half the privacy budget: a midpoint-normalized sum (per-entry contribution
//! bounded by `range / 2` after clamping) and an entry count. Noising the two
//! components independently and dividing is what makes the sensitivity
//! analysis tractable; clamping the quotient back into `[lower, upper]` is
//! deterministic post-processing and costs no additional budget.

use dp_noise::{ConfidenceInterval, NoiseMechanism};
use tracing::{debug, trace};

use crate::error::{AggregationError, Result};
use crate::summary::MeanSummary;

/// Lifecycle of an estimator. Each noised artifact spends privacy budget, so
/// both terminal states are absorbing: an estimator produces either one
/// result or one summary, never both and never two of either.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AggregatorState {
    Open,
    ResultReturned,
    Serialized,
}

/// Noised components cached by [`BoundedMean::compute_result`] for later
/// confidence-interval composition.
struct NoisedComponents {
    normalized_sum: f64,
    count: i64,
}

/// Incremental, one-shot estimator of a differentially private mean over
/// values clamped into `[lower, upper]`.
///
/// Single-owner and synchronous: no internal locking, no retries. Construct
/// through [`BoundedMean::builder`].
pub struct BoundedMean {
    noise: Box<dyn NoiseMechanism>,
    epsilon: f64,
    delta: Option<f64>,
    lower: f64,
    upper: f64,
    max_partitions_contributed: i32,
    max_contributions_per_partition: i32,
    normalized_sum: f64,
    count: u64,
    state: AggregatorState,
    noised: Option<NoisedComponents>,
}

impl std::fmt::Debug for BoundedMean {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoundedMean")
            .field("noise", &self.noise.mechanism_type())
            .field("epsilon", &self.epsilon)
            .field("delta", &self.delta)
            .field("lower", &self.lower)
            .field("upper", &self.upper)
            .field(
                "max_partitions_contributed",
                &self.max_partitions_contributed,
            )
            .field(
                "max_contributions_per_partition",
                &self.max_contributions_per_partition,
            )
            .field("normalized_sum", &self.normalized_sum)
            .field("count", &self.count)
            .field("state", &self.state)
            .finish()
    }
}

impl BoundedMean {
    pub fn builder() -> BoundedMeanBuilder {
        BoundedMeanBuilder::new()
    }

    /// Ingest a single contribution. NaN values are dropped silently; values
    /// outside `[lower, upper]` are clamped.
    pub fn add_entry(&mut self, value: f64) -> Result<()> {
        self.ensure_open("add_entry")?;
        self.ingest(value);
        Ok(())
    }

    /// Ingest a batch of contributions, with the same per-value treatment as
    /// [`BoundedMean::add_entry`].
    pub fn add_entries<I>(&mut self, values: I) -> Result<()>
    where
        I: IntoIterator<Item = f64>,
    {
        self.ensure_open("add_entries")?;
        for value in values {
            self.ingest(value);
        }
        Ok(())
    }

    /// Release the noised, clamped mean. Transitions the estimator into its
    /// terminal result state; any further mutation or release fails.
    pub fn compute_result(&mut self) -> Result<f64> {
        self.ensure_open("compute_result")?;
        self.state = AggregatorState::ResultReturned;

        let noised_sum = self.noise.add_noise_f64(
            self.normalized_sum,
            self.max_partitions_contributed,
            self.sum_sensitivity(),
            self.epsilon / 2.0,
            self.split_delta(),
        );
        let noised_count = self.noise.add_noise_i64(
            self.count as i64,
            self.max_partitions_contributed,
            self.count_sensitivity(),
            self.epsilon / 2.0,
            self.split_delta(),
        );

        // A non-positive noised count (including the empty-stream case with
        // no count noise) leaves the mean undefined; fall back to the
        // midpoint, which keeps the release inside the clamping range.
        let mean = if noised_count <= 0 {
            self.midpoint()
        } else {
            self.clamp(noised_sum / noised_count.max(1) as f64 + self.midpoint())
        };

        debug!(noised_count, mean, "bounded mean released");
        self.noised = Some(NoisedComponents {
            normalized_sum: noised_sum,
            count: noised_count,
        });
        Ok(mean)
    }

    /// Confidence interval for the released mean at overall level
    /// `1 - alpha`, splitting the failure probability evenly between the two
    /// noised components.
    pub fn compute_confidence_interval(&self, alpha: f64) -> Result<ConfidenceInterval> {
        self.compute_confidence_interval_with_split(alpha, alpha / 2.0)
    }

    /// Confidence interval with an explicit share `alpha_sum` steered to the
    /// sum component. The count's share is derived so that a union bound
    /// over both components yields overall confidence `1 - alpha`.
    pub fn compute_confidence_interval_with_split(
        &self,
        alpha: f64,
        alpha_sum: f64,
    ) -> Result<ConfidenceInterval> {
        if self.state != AggregatorState::ResultReturned {
            return Err(AggregationError::ResultNotYetComputed);
        }
        let noised = self
            .noised
            .as_ref()
            .ok_or(AggregationError::ResultNotYetComputed)?;

        if !(alpha > 0.0 && alpha < 1.0) {
            return Err(invalid("alpha", format!("must lie in (0, 1), got {alpha}")));
        }
        if !(alpha_sum > 0.0 && alpha_sum < alpha) {
            return Err(invalid(
                "alpha_sum",
                format!("must lie in (0, alpha), got {alpha_sum}"),
            ));
        }
        let alpha_count = (alpha - alpha_sum) / (1.0 - alpha_sum);

        let sum_ci = self.noise.confidence_interval_f64(
            noised.normalized_sum,
            self.max_partitions_contributed,
            self.sum_sensitivity(),
            self.epsilon / 2.0,
            self.split_delta(),
            alpha_sum,
        );
        let count_ci = self.noise.confidence_interval_i64(
            noised.count,
            self.max_partitions_contributed,
            self.count_sensitivity(),
            self.epsilon / 2.0,
            self.split_delta(),
            alpha_count,
        );

        // The count interval must be usable as a positive divisor.
        let count_lower = count_ci.lower.max(1.0);
        let count_upper = count_ci.upper.max(1.0);

        // The mean is monotone in sum and count within each sign orthant, so
        // the extremal endpoints come from the worst-case corner of the
        // sum x count rectangle.
        let mean_upper = if sum_ci.upper >= 0.0 {
            sum_ci.upper / count_lower
        } else {
            sum_ci.upper / count_upper
        } + self.midpoint();
        let mean_lower = if sum_ci.lower >= 0.0 {
            sum_ci.lower / count_upper
        } else {
            sum_ci.lower / count_lower
        } + self.midpoint();

        Ok(ConfidenceInterval::new(
            self.clamp(mean_lower),
            self.clamp(mean_upper),
        ))
    }

    /// Emit the pre-noise partial aggregate for distributed combination.
    /// Transitions the estimator into its terminal serialized state.
    pub fn serializable_summary(&mut self) -> Result<Vec<u8>> {
        self.ensure_open("serializable_summary")?;
        self.state = AggregatorState::Serialized;
        let summary = self.snapshot();
        debug!(count = summary.count, "partial aggregate serialized");
        summary.to_bytes()
    }

    /// Fold another shard's summary into this estimator. The summary must
    /// have been produced under a bit-identical configuration; this
    /// estimator stays open for further ingestion or merging.
    pub fn merge_with(&mut self, summary_bytes: &[u8]) -> Result<()> {
        self.ensure_open("merge_with")?;
        let incoming = MeanSummary::from_bytes(summary_bytes)?;
        self.snapshot().check_compatible(&incoming)?;

        self.normalized_sum += incoming.normalized_sum;
        self.count += incoming.count;
        debug!(
            merged_count = incoming.count,
            total_count = self.count,
            "partial aggregate merged"
        );
        Ok(())
    }

    fn ingest(&mut self, value: f64) {
        if value.is_nan() {
            trace!("dropping NaN contribution");
            return;
        }
        let clamped = self.clamp(value);
        self.normalized_sum += clamped - self.midpoint();
        self.count += 1;
    }

    fn ensure_open(&self, operation: &'static str) -> Result<()> {
        if self.state == AggregatorState::Open {
            Ok(())
        } else {
            Err(AggregationError::AggregatorFinalized(operation))
        }
    }

    fn snapshot(&self) -> MeanSummary {
        MeanSummary {
            normalized_sum: self.normalized_sum,
            count: self.count,
            mechanism: self.noise.mechanism_type(),
            epsilon: self.epsilon,
            delta: self.delta,
            lower: self.lower,
            upper: self.upper,
            max_partitions_contributed: self.max_partitions_contributed,
            max_contributions_per_partition: self.max_contributions_per_partition,
        }
    }

    fn midpoint(&self) -> f64 {
        (self.lower + self.upper) / 2.0
    }

    fn range(&self) -> f64 {
        self.upper - self.lower
    }

    /// After clamping, one entry moves the normalized sum by at most
    /// `range / 2`; one user contributes at most `linf` entries per
    /// partition.
    fn sum_sensitivity(&self) -> f64 {
        self.max_contributions_per_partition as f64 * self.range() / 2.0
    }

    fn count_sensitivity(&self) -> i64 {
        self.max_contributions_per_partition as i64
    }

    fn split_delta(&self) -> Option<f64> {
        self.delta.map(|d| d / 2.0)
    }

    fn clamp(&self, value: f64) -> f64 {
        value.clamp(self.lower, self.upper)
    }
}

/// Validating builder for [`BoundedMean`].
///
/// `epsilon`, both bounds, and the noise mechanism are mandatory; the
/// contribution bounds default to one partition and one contribution per
/// partition.
pub struct BoundedMeanBuilder {
    epsilon: Option<f64>,
    delta: Option<f64>,
    lower: Option<f64>,
    upper: Option<f64>,
    max_partitions_contributed: i32,
    max_contributions_per_partition: i32,
    noise: Option<Box<dyn NoiseMechanism>>,
}

impl BoundedMeanBuilder {
    fn new() -> Self {
        Self {
            epsilon: None,
            delta: None,
            lower: None,
            upper: None,
            max_partitions_contributed: 1,
            max_contributions_per_partition: 1,
            noise: None,
        }
    }

    pub fn epsilon(mut self, epsilon: f64) -> Self {
        self.epsilon = Some(epsilon);
        self
    }

    pub fn delta(mut self, delta: f64) -> Self {
        self.delta = Some(delta);
        self
    }

    /// Clamping range for ingested values.
    pub fn bounds(mut self, lower: f64, upper: f64) -> Self {
        self.lower = Some(lower);
        self.upper = Some(upper);
        self
    }

    /// L0 contribution bound: partitions a single user may affect.
    pub fn max_partitions_contributed(mut self, value: i32) -> Self {
        self.max_partitions_contributed = value;
        self
    }

    /// Linf contribution bound: entries a single user may add to one
    /// partition.
    pub fn max_contributions_per_partition(mut self, value: i32) -> Self {
        self.max_contributions_per_partition = value;
        self
    }

    pub fn noise<N: NoiseMechanism + 'static>(mut self, noise: N) -> Self {
        self.noise = Some(Box::new(noise));
        self
    }

    pub fn build(self) -> Result<BoundedMean> {
        let epsilon = self
            .epsilon
            .ok_or_else(|| invalid("epsilon", "must be set"))?;
        if !epsilon.is_finite() || epsilon <= 0.0 {
            return Err(invalid(
                "epsilon",
                format!("must be positive and finite, got {epsilon}"),
            ));
        }

        let lower = self.lower.ok_or_else(|| invalid("lower", "must be set"))?;
        let upper = self.upper.ok_or_else(|| invalid("upper", "must be set"))?;
        if !lower.is_finite() {
            return Err(invalid("lower", format!("must be finite, got {lower}")));
        }
        if !upper.is_finite() {
            return Err(invalid("upper", format!("must be finite, got {upper}")));
        }
        if lower >= upper {
            return Err(invalid(
                "lower",
                format!("must be strictly below upper, got [{lower}, {upper}]"),
            ));
        }

        if self.max_partitions_contributed <= 0 {
            return Err(invalid(
                "max_partitions_contributed",
                format!("must be positive, got {}", self.max_partitions_contributed),
            ));
        }
        if self.max_contributions_per_partition <= 0 {
            return Err(invalid(
                "max_contributions_per_partition",
                format!(
                    "must be positive, got {}",
                    self.max_contributions_per_partition
                ),
            ));
        }

        let noise = self
            .noise
            .ok_or_else(|| invalid("noise", "a noise mechanism must be supplied"))?;
        // The mechanism decides whether delta is required, forbidden, or out
        // of range.
        noise.validate_budget(epsilon, self.delta)?;

        Ok(BoundedMean {
            noise,
            epsilon,
            delta: self.delta,
            lower,
            upper,
            max_partitions_contributed: self.max_partitions_contributed,
            max_contributions_per_partition: self.max_contributions_per_partition,
            normalized_sum: 0.0,
            count: 0,
            state: AggregatorState::Open,
            noised: None,
        })
    }
}

fn invalid(field: &'static str, reason: impl Into<String>) -> AggregationError {
    AggregationError::InvalidParameter {
        field,
        reason: reason.into(),
    }
}
