//! Deterministic mechanisms for pipeline testing
//!
//! These add no randomness and provide no privacy. They exist so that
//! aggregation pipelines can be exercised with predictable outputs.

use crate::{check_epsilon, ConfidenceInterval, MechanismType, NoiseError, NoiseMechanism};

fn validate_test_budget(epsilon: f64, delta: Option<f64>) -> Result<(), NoiseError> {
    check_epsilon(epsilon)?;
    if let Some(d) = delta {
        if !(d > 0.0 && d < 1.0) {
            return Err(NoiseError::DeltaOutOfRange(d));
        }
    }
    Ok(())
}

/// Echoes every value unchanged; confidence intervals collapse onto the
/// value itself.
#[derive(Debug, Clone, Copy, Default)]
pub struct ZeroNoise;

impl ZeroNoise {
    pub fn new() -> Self {
        Self
    }
}

impl NoiseMechanism for ZeroNoise {
    fn mechanism_type(&self) -> MechanismType {
        MechanismType::Zero
    }

    fn validate_budget(&self, epsilon: f64, delta: Option<f64>) -> Result<(), NoiseError> {
        validate_test_budget(epsilon, delta)
    }

    fn add_noise_f64(&self, value: f64, _l0: i32, _linf: f64, _eps: f64, _delta: Option<f64>) -> f64 {
        value
    }

    fn add_noise_i64(&self, value: i64, _l0: i32, _linf: i64, _eps: f64, _delta: Option<f64>) -> i64 {
        value
    }

    fn confidence_interval_f64(
        &self,
        noised_value: f64,
        _l0: i32,
        _linf: f64,
        _eps: f64,
        _delta: Option<f64>,
        _alpha: f64,
    ) -> ConfidenceInterval {
        ConfidenceInterval::point(noised_value)
    }

    fn confidence_interval_i64(
        &self,
        noised_value: i64,
        _l0: i32,
        _linf: i64,
        _eps: f64,
        _delta: Option<f64>,
        _alpha: f64,
    ) -> ConfidenceInterval {
        ConfidenceInterval::point(noised_value as f64)
    }
}

/// Adds a fixed offset per numeric domain, so tests can steer the
/// real-valued and integer-valued releases independently.
#[derive(Debug, Clone, Copy, Default)]
pub struct FixedNoise {
    pub real_offset: f64,
    pub integer_offset: i64,
}

impl FixedNoise {
    pub fn new(real_offset: f64, integer_offset: i64) -> Self {
        Self {
            real_offset,
            integer_offset,
        }
    }
}

impl NoiseMechanism for FixedNoise {
    fn mechanism_type(&self) -> MechanismType {
        MechanismType::Zero
    }

    fn validate_budget(&self, epsilon: f64, delta: Option<f64>) -> Result<(), NoiseError> {
        validate_test_budget(epsilon, delta)
    }

    fn add_noise_f64(&self, value: f64, _l0: i32, _linf: f64, _eps: f64, _delta: Option<f64>) -> f64 {
        value + self.real_offset
    }

    fn add_noise_i64(&self, value: i64, _l0: i32, _linf: i64, _eps: f64, _delta: Option<f64>) -> i64 {
        value + self.integer_offset
    }

    fn confidence_interval_f64(
        &self,
        noised_value: f64,
        _l0: i32,
        _linf: f64,
        _eps: f64,
        _delta: Option<f64>,
        _alpha: f64,
    ) -> ConfidenceInterval {
        ConfidenceInterval::point(noised_value)
    }

    fn confidence_interval_i64(
        &self,
        noised_value: i64,
        _l0: i32,
        _linf: i64,
        _eps: f64,
        _delta: Option<f64>,
        _alpha: f64,
    ) -> ConfidenceInterval {
        ConfidenceInterval::point(noised_value as f64)
    }
}
