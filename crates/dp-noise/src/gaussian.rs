//! Gaussian mechanism for (epsilon, delta)-differential privacy

use rand::Rng;
use statrs::distribution::{ContinuousCDF, Normal};

use crate::{check_epsilon, ConfidenceInterval, MechanismType, NoiseError, NoiseMechanism};

/// Gaussian mechanism: additive N(0, sigma^2) noise with
/// `sigma = sqrt(2 * ln(1.25/delta)) * L2 / epsilon` and
/// `L2 = linf * sqrt(l0)`.
///
/// Requires a delta in `(0, 1)`.
#[derive(Debug, Clone, Copy, Default)]
pub struct GaussianNoise;

impl GaussianNoise {
    pub fn new() -> Self {
        Self
    }

    /// Noise standard deviation, or `None` when the budget is degenerate.
    fn sigma(
        l0_sensitivity: i32,
        linf_sensitivity: f64,
        epsilon: f64,
        delta: Option<f64>,
    ) -> Option<f64> {
        let delta = match delta {
            Some(d) if d > 0.0 && d < 1.0 => d,
            _ => return None,
        };
        // A single user's contribution spreads over l0 coordinates bounded
        // by linf each, so its L2 norm is at most linf * sqrt(l0).
        let l2 = linf_sensitivity * (l0_sensitivity as f64).sqrt();
        let sigma = (2.0 * (1.25 / delta).ln()).sqrt() * l2 / epsilon;
        if sigma.is_finite() && sigma > 0.0 {
            Some(sigma)
        } else {
            None
        }
    }

    fn sample(sigma: f64) -> f64 {
        let mut rng = rand::thread_rng();
        match rand_distr::Normal::new(0.0, sigma) {
            Ok(dist) => rng.sample::<f64, _>(dist),
            Err(_) => 0.0,
        }
    }

    /// Half-width of the two-sided interval at level alpha:
    /// `sigma * z(1 - alpha/2)` with z the standard-normal quantile.
    fn half_width(sigma: f64, alpha: f64) -> Option<f64> {
        if !(alpha > 0.0 && alpha < 1.0) {
            return None;
        }
        match Normal::new(0.0, 1.0) {
            Ok(std_normal) => Some(sigma * std_normal.inverse_cdf(1.0 - alpha / 2.0)),
            Err(_) => None,
        }
    }
}

impl NoiseMechanism for GaussianNoise {
    fn mechanism_type(&self) -> MechanismType {
        MechanismType::Gaussian
    }

    fn validate_budget(&self, epsilon: f64, delta: Option<f64>) -> Result<(), NoiseError> {
        check_epsilon(epsilon)?;
        match delta {
            None => Err(NoiseError::DeltaRequired),
            Some(d) if !(d > 0.0 && d < 1.0) => Err(NoiseError::DeltaOutOfRange(d)),
            Some(_) => Ok(()),
        }
    }

    fn add_noise_f64(
        &self,
        value: f64,
        l0_sensitivity: i32,
        linf_sensitivity: f64,
        epsilon: f64,
        delta: Option<f64>,
    ) -> f64 {
        match Self::sigma(l0_sensitivity, linf_sensitivity, epsilon, delta) {
            Some(sigma) => value + Self::sample(sigma),
            None => value,
        }
    }

    fn add_noise_i64(
        &self,
        value: i64,
        l0_sensitivity: i32,
        linf_sensitivity: i64,
        epsilon: f64,
        delta: Option<f64>,
    ) -> i64 {
        match Self::sigma(l0_sensitivity, linf_sensitivity as f64, epsilon, delta) {
            Some(sigma) => (value as f64 + Self::sample(sigma)).round() as i64,
            None => value,
        }
    }

    fn confidence_interval_f64(
        &self,
        noised_value: f64,
        l0_sensitivity: i32,
        linf_sensitivity: f64,
        epsilon: f64,
        delta: Option<f64>,
        alpha: f64,
    ) -> ConfidenceInterval {
        Self::sigma(l0_sensitivity, linf_sensitivity, epsilon, delta)
            .and_then(|sigma| Self::half_width(sigma, alpha))
            .map(|hw| ConfidenceInterval::new(noised_value - hw, noised_value + hw))
            .unwrap_or_else(|| ConfidenceInterval::point(noised_value))
    }

    fn confidence_interval_i64(
        &self,
        noised_value: i64,
        l0_sensitivity: i32,
        linf_sensitivity: i64,
        epsilon: f64,
        delta: Option<f64>,
        alpha: f64,
    ) -> ConfidenceInterval {
        let value = noised_value as f64;
        Self::sigma(l0_sensitivity, linf_sensitivity as f64, epsilon, delta)
            .and_then(|sigma| Self::half_width(sigma, alpha))
            .map(|hw| ConfidenceInterval::new((value - hw).floor(), (value + hw).ceil()))
            .unwrap_or_else(|| ConfidenceInterval::point(value))
    }
}
