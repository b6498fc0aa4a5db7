//! Pure-epsilon Laplace mechanism

use rand::Rng;

use crate::{check_epsilon, ConfidenceInterval, MechanismType, NoiseError, NoiseMechanism};

/// Laplace mechanism: additive noise with density `exp(-|x|/b) / 2b` where
/// `b = L1 / epsilon` and `L1 = l0 * linf`.
///
/// Provides pure epsilon-differential privacy; a delta is rejected at
/// validation time.
#[derive(Debug, Clone, Copy, Default)]
pub struct LaplaceNoise;

impl LaplaceNoise {
    pub fn new() -> Self {
        Self
    }

    fn scale(l0_sensitivity: i32, linf_sensitivity: f64, epsilon: f64) -> f64 {
        // A single user shifts at most l0 partitions by at most linf each,
        // so the L1 sensitivity of the release is l0 * linf.
        l0_sensitivity as f64 * linf_sensitivity / epsilon
    }

    /// Draw one Laplace(0, scale) sample.
    ///
    /// Laplace(0, b) = sign * Exponential(1/b) with a fair random sign.
    /// Degenerate scales (non-finite or non-positive) produce zero noise
    /// rather than panicking.
    fn sample(scale: f64) -> f64 {
        if !scale.is_finite() || scale <= 0.0 {
            return 0.0;
        }
        let mut rng = rand::thread_rng();
        let sign = if rng.gen::<bool>() { 1.0 } else { -1.0 };
        match rand_distr::Exp::new(1.0 / scale) {
            Ok(dist) => sign * rng.sample::<f64, _>(dist),
            Err(_) => 0.0,
        }
    }

    /// Two-sided tail bound: P(|noise| > z) = exp(-z/b), so the half-width
    /// at level alpha is b * ln(1/alpha).
    fn half_width(scale: f64, alpha: f64) -> Option<f64> {
        if !scale.is_finite() || scale <= 0.0 || !(alpha > 0.0 && alpha < 1.0) {
            return None;
        }
        Some(scale * (1.0 / alpha).ln())
    }
}

impl NoiseMechanism for LaplaceNoise {
    fn mechanism_type(&self) -> MechanismType {
        MechanismType::Laplace
    }

    fn validate_budget(&self, epsilon: f64, delta: Option<f64>) -> Result<(), NoiseError> {
        check_epsilon(epsilon)?;
        if let Some(delta) = delta {
            return Err(NoiseError::DeltaNotSupported(delta));
        }
        Ok(())
    }

    fn add_noise_f64(
        &self,
        value: f64,
        l0_sensitivity: i32,
        linf_sensitivity: f64,
        epsilon: f64,
        _delta: Option<f64>,
    ) -> f64 {
        value + Self::sample(Self::scale(l0_sensitivity, linf_sensitivity, epsilon))
    }

    fn add_noise_i64(
        &self,
        value: i64,
        l0_sensitivity: i32,
        linf_sensitivity: i64,
        epsilon: f64,
        _delta: Option<f64>,
    ) -> i64 {
        let scale = Self::scale(l0_sensitivity, linf_sensitivity as f64, epsilon);
        (value as f64 + Self::sample(scale)).round() as i64
    }

    fn confidence_interval_f64(
        &self,
        noised_value: f64,
        l0_sensitivity: i32,
        linf_sensitivity: f64,
        epsilon: f64,
        _delta: Option<f64>,
        alpha: f64,
    ) -> ConfidenceInterval {
        let scale = Self::scale(l0_sensitivity, linf_sensitivity, epsilon);
        match Self::half_width(scale, alpha) {
            Some(hw) => ConfidenceInterval::new(noised_value - hw, noised_value + hw),
            None => ConfidenceInterval::point(noised_value),
        }
    }

    fn confidence_interval_i64(
        &self,
        noised_value: i64,
        l0_sensitivity: i32,
        linf_sensitivity: i64,
        epsilon: f64,
        _delta: Option<f64>,
        alpha: f64,
    ) -> ConfidenceInterval {
        let scale = Self::scale(l0_sensitivity, linf_sensitivity as f64, epsilon);
        let value = noised_value as f64;
        match Self::half_width(scale, alpha) {
            // Round outward so the integer-domain interval stays conservative.
            Some(hw) => ConfidenceInterval::new((value - hw).floor(), (value + hw).ceil()),
            None => ConfidenceInterval::point(value),
        }
    }
}
