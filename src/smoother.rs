// src/smoother.rs

use crate::types::SmoothingConfig;
use serde::Serialize;

/// Estimate and uncertainty of one scalar signal
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FilterState {
    pub estimate: f64,
    pub variance: f64,
}

impl Default for FilterState {
    fn default() -> Self {
        Self {
            estimate: 0.0,
            variance: 1.0,
        }
    }
}

impl FilterState {
    /// Fold one measurement into the state.
    ///
    /// Static identity process model: the signal is assumed constant
    /// between updates, so prediction only inflates the variance.
    pub fn update(
        self,
        measurement: f64,
        process_noise: f64,
        measurement_noise: f64,
    ) -> (f64, FilterState) {
        let predicted_variance = self.variance + process_noise;
        let gain = predicted_variance / (predicted_variance + measurement_noise);
        let estimate = self.estimate + gain * (measurement - self.estimate);
        let variance = (1.0 - gain) * predicted_variance;

        (estimate, FilterState { estimate, variance })
    }
}

/// One-dimensional Kalman filter for a single tracked signal
/// (optical-flow angle or magnitude).
#[derive(Debug, Clone)]
pub struct ScalarKalman {
    state: FilterState,
    process_noise: f64,
    measurement_noise: f64,
}

impl ScalarKalman {
    pub fn new(process_noise: f64, measurement_noise: f64) -> Self {
        Self {
            state: FilterState::default(),
            process_noise,
            measurement_noise,
        }
    }

    pub fn from_config(config: &SmoothingConfig) -> Self {
        Self::new(config.process_noise, config.measurement_noise)
    }

    /// Compute the filtered value without touching the stored state.
    /// Pair with [`ScalarKalman::commit`] once the frame is accepted.
    pub fn preview(&self, measurement: f64) -> (f64, FilterState) {
        self.state
            .update(measurement, self.process_noise, self.measurement_noise)
    }

    pub fn commit(&mut self, state: FilterState) {
        self.state = state;
    }

    pub fn reset(&mut self) {
        self.state = FilterState::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn step(filter: &mut ScalarKalman, measurement: f64) -> f64 {
        let (estimate, state) = filter.preview(measurement);
        filter.commit(state);
        estimate
    }

    #[test]
    fn test_first_update_from_initial_state() {
        let (estimate, state) = FilterState::default().update(10.0, 0.01, 0.1);

        // P' = 1.01, K = 1.01 / 1.11
        let gain = 1.01 / 1.11;
        assert_abs_diff_eq!(estimate, 10.0 * gain, epsilon = 1e-12);
        assert_abs_diff_eq!(state.variance, (1.0 - gain) * 1.01, epsilon = 1e-12);
        assert_eq!(state.estimate, estimate);
    }

    #[test]
    fn test_constant_measurement_converges_monotonically() {
        let mut filter = ScalarKalman::new(0.01, 0.1);
        let target = 37.5;

        let mut last_error = f64::INFINITY;
        let mut last_variance = filter.state.variance;

        for _ in 0..200 {
            let estimate = step(&mut filter, target);
            let error = (target - estimate).abs();
            let variance = filter.state.variance;

            assert!(error <= last_error, "error grew: {} > {}", error, last_error);
            assert!(
                variance <= last_variance + 1e-15,
                "variance grew: {} > {}",
                variance,
                last_variance
            );
            last_error = error;
            last_variance = variance;
        }

        assert_abs_diff_eq!(filter.state.estimate, target, epsilon = 1e-9);

        // Fixed point of P = (1 - K)(P + q): P² + qP - qr = 0
        let (q, r) = (0.01f64, 0.1f64);
        let fixed_point = (-q + (q * q + 4.0 * q * r).sqrt()) / 2.0;
        assert_abs_diff_eq!(filter.state.variance, fixed_point, epsilon = 1e-9);
    }

    #[test]
    fn test_preview_does_not_mutate() {
        let filter = ScalarKalman::new(0.01, 0.1);
        let (_, next) = filter.preview(5.0);
        assert_eq!(filter.state, FilterState::default());
        assert_ne!(next, FilterState::default());
    }

    #[test]
    fn test_deterministic_for_same_sequence() {
        let measurements = [3.0, -1.5, 12.25, 0.0, 7.0];
        let mut a = ScalarKalman::new(0.01, 0.1);
        let mut b = ScalarKalman::new(0.01, 0.1);
        for m in measurements {
            assert_eq!(step(&mut a, m).to_bits(), step(&mut b, m).to_bits());
        }
    }

    #[test]
    fn test_reset_restores_initial_state() {
        let mut filter = ScalarKalman::new(0.01, 0.1);
        step(&mut filter, 4.0);
        filter.reset();
        assert_eq!(filter.state, FilterState::default());
    }
}
