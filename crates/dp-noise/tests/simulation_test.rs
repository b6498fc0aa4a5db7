//! Simulation tests for the noise mechanisms.
//!
//! Mechanisms are driven through the trait object, the way an aggregator
//! consumes them, and asserted on concrete runtime behavior.

use dp_noise::testing::{FixedNoise, ZeroNoise};
use dp_noise::{GaussianNoise, LaplaceNoise, MechanismType, NoiseMechanism};

fn mechanisms() -> Vec<Box<dyn NoiseMechanism>> {
    vec![
        Box::new(LaplaceNoise::new()),
        Box::new(GaussianNoise::new()),
        Box::new(ZeroNoise::new()),
        Box::new(FixedNoise::new(1.5, 2)),
    ]
}

// ---------------------------------------------------------------------------
// Identity returns
// ---------------------------------------------------------------------------

#[test]
fn simulate_mechanism_identities() {
    let types: Vec<MechanismType> = mechanisms().iter().map(|m| m.mechanism_type()).collect();
    assert_eq!(
        types,
        vec![
            MechanismType::Laplace,
            MechanismType::Gaussian,
            MechanismType::Zero,
            MechanismType::Zero,
        ]
    );
}

// ---------------------------------------------------------------------------
// Budget validation returns
// ---------------------------------------------------------------------------

#[test]
fn simulate_budget_validation_per_mechanism() {
    let laplace = LaplaceNoise::new();
    let gaussian = GaussianNoise::new();

    // Laplace: pure epsilon.
    assert!(laplace.validate_budget(1.0, None).is_ok());
    assert!(laplace.validate_budget(1.0, Some(1e-5)).is_err());

    // Gaussian: approximate DP, delta mandatory.
    assert!(gaussian.validate_budget(1.0, Some(1e-5)).is_ok());
    assert!(gaussian.validate_budget(1.0, None).is_err());

    // Epsilon is checked everywhere.
    for mechanism in mechanisms() {
        assert!(mechanism.validate_budget(-1.0, None).is_err());
    }
}

// ---------------------------------------------------------------------------
// Noise and interval returns
// ---------------------------------------------------------------------------

#[test]
fn simulate_noised_values_are_finite() {
    let delta = Some(1e-5);
    for mechanism in mechanisms() {
        let d = match mechanism.mechanism_type() {
            MechanismType::Laplace => None,
            _ => delta,
        };
        for _ in 0..50 {
            let noised = mechanism.add_noise_f64(10.0, 2, 1.5, 0.5, d);
            assert!(noised.is_finite());
            let ci = mechanism.confidence_interval_f64(noised, 2, 1.5, 0.5, d, 0.05);
            assert!(ci.lower <= noised && noised <= ci.upper);
        }
    }
}

#[test]
fn simulate_integer_intervals_bracket_the_noised_count() {
    for mechanism in mechanisms() {
        let d = match mechanism.mechanism_type() {
            MechanismType::Gaussian => Some(1e-5),
            _ => None,
        };
        let noised = mechanism.add_noise_i64(100, 1, 1, 0.5, d);
        let ci = mechanism.confidence_interval_i64(noised, 1, 1, 0.5, d, 0.05);
        assert!(ci.lower <= noised as f64 && noised as f64 <= ci.upper);
    }
}
